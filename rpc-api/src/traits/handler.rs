use crate::model::args::Args;
use serde_json::Value;

/// A named unit of server-side logic callable by remote clients.
///
/// Any `Fn(&Args) -> anyhow::Result<Value>` closure is a handler, so most
/// operations never implement this trait by hand.
pub trait Handler: Send + Sync {
    /// Executes the operation.
    ///
    /// # Arguments
    ///
    /// * `args` - The positional and named arguments sent by the caller.
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - The result returned to the caller.
    /// * `Err` - Reported to the caller as a failed reply. Never fatal to the server.
    fn call(&self, args: &Args) -> anyhow::Result<Value>;
}

impl<F> Handler for F
where
    F: Fn(&Args) -> anyhow::Result<Value> + Send + Sync,
{
    fn call(&self, args: &Args) -> anyhow::Result<Value> {
        self(args)
    }
}

impl Handler for Box<dyn Handler> {
    fn call(&self, args: &Args) -> anyhow::Result<Value> {
        (**self).call(args)
    }
}
