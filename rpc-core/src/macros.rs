/// Registers plain functions under their own names.
///
/// Each function must have the handler signature
/// `fn(&Args) -> anyhow::Result<Value>`.
///
/// ```ignore
/// register_functions!(server, get_tick, send_order, cancel_order);
/// ```
#[macro_export]
macro_rules! register_functions {
    ($target:expr, $($function:ident),+ $(,)?) => {
        $(
            $target.register(stringify!($function), $function);
        )+
    };
}
