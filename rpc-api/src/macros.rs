/// Builds a handler from a typed closure.
///
/// Each parameter is decoded from the call arguments by position, falling back
/// to the keyword argument of the same name. Surplus positional arguments are
/// rejected. The body may use `?` and its value is serialized as the result.
///
/// ```ignore
/// server.register("add", operation!(|a: i64, b: i64| a + b));
/// ```
#[macro_export]
macro_rules! operation {
    (|| $body:expr) => {
        $crate::operation!(| | $body)
    };
    (|$($param:ident : $ty:ty),* $(,)?| $body:expr) => {
        move |args: &$crate::Args| -> $crate::__private::anyhow::Result<$crate::__private::serde_json::Value> {
            #[allow(unused_mut, unused_assignments)]
            let mut position = 0usize;
            $(
                let $param: $ty = args.get(position, stringify!($param))?;
                position += 1;
            )*
            args.ensure_arity(position)?;
            let result = (|| -> $crate::__private::anyhow::Result<_> { Ok($body) })()?;
            Ok($crate::__private::serde_json::to_value(result)?)
        }
    };
}
