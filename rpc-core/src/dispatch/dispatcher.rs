use crate::dispatch::registry::{FunctionRegistry, OperationNotFound};
use crate::dispatch::trace::{catch_panic, error_report};
use log::{debug, warn};
use rpc::{Args, CallReply};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Why a single call failed. Rendered into the diagnostic of a failed reply.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    OperationNotFound(#[from] OperationNotFound),

    /// The handler returned an error. `diagnostic` carries the full cause
    /// chain and a backtrace.
    #[error("{name} failed: {diagnostic}")]
    HandlerFailure { name: String, diagnostic: String },

    /// `trace` is the panic location followed by a backtrace.
    #[error("{name} panicked: {message}\n{trace}")]
    HandlerPanicked {
        name: String,
        message: String,
        trace: String,
    },
}

/// Resolves operation names and runs their handlers.
///
/// Every outcome becomes a `CallReply`; nothing a handler does can escape
/// `dispatch`, panics included.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<RwLock<FunctionRegistry>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<RwLock<FunctionRegistry>>) -> Self {
        Self { registry }
    }

    /// Runs operation `name` with `args` and wraps the outcome as a reply.
    ///
    /// # Arguments
    ///
    /// * `name` - The operation to run.
    /// * `args` - Arguments forwarded to the handler untouched.
    ///
    /// # Returns
    ///
    /// * `CallReply::Success` with the handler's value.
    /// * `CallReply::Failure` naming the missing operation or describing the handler failure.
    pub fn dispatch(&self, name: &str, args: &Args) -> CallReply {
        match self.try_dispatch(name, args) {
            Ok(value) => {
                debug!("{} succeeded", name);
                CallReply::Success(value)
            }
            Err(e) => {
                let diagnostic = e.to_string();
                warn!("Call failed: {}", diagnostic.lines().next().unwrap_or_default());
                debug!("{}", diagnostic);
                CallReply::Failure(diagnostic)
            }
        }
    }

    pub fn try_dispatch(&self, name: &str, args: &Args) -> Result<Value, DispatchError> {
        // The read lock is held for the lookup only, never while the handler runs.
        let handler = {
            let registry = self
                .registry
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            registry.lookup(name)?
        };

        match catch_panic(|| handler.call(args)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(DispatchError::HandlerFailure {
                name: name.to_string(),
                diagnostic: error_report(&e),
            }),
            Err(caught) => Err(DispatchError::HandlerPanicked {
                name: name.to_string(),
                message: caught.message,
                trace: caught.trace,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use rpc::prelude::*;

    fn dispatcher() -> Dispatcher {
        let mut registry = FunctionRegistry::new();
        registry.register("add", operation!(|a: i64, b: i64| a + b));
        registry.register("fail", |_: &Args| -> anyhow::Result<Value> {
            let io = std::io::Error::new(std::io::ErrorKind::Other, "disk unplugged");
            Err(io).context("could not load commission table")
        });
        registry.register("explode", |_: &Args| -> anyhow::Result<Value> {
            panic!("index out of range");
        });
        Dispatcher::new(Arc::new(RwLock::new(registry)))
    }

    #[test]
    fn test_success_wraps_value() {
        let reply = dispatcher().dispatch("add", &Args::new().arg(2).arg(3));
        assert_eq!(reply, CallReply::Success(json!(5)));
    }

    #[test]
    fn test_unknown_operation() {
        let reply = dispatcher().dispatch("missingOp", &Args::new());
        assert_eq!(reply, CallReply::Failure("missingOp not registered".into()));
    }

    #[test]
    fn test_handler_error_carries_cause_chain() {
        let reply = dispatcher().dispatch("fail", &Args::new());
        let diagnostic = reply.into_result().unwrap_err();
        assert!(diagnostic.starts_with("fail failed:"));
        assert!(diagnostic.contains("could not load commission table"));
        assert!(diagnostic.contains("disk unplugged"));
    }

    #[test]
    fn test_bad_arguments_are_handler_failures() {
        let reply = dispatcher().dispatch("add", &Args::new().arg("two").arg(3));
        assert!(!reply.is_ok());
    }

    #[test]
    fn test_handler_error_carries_backtrace() {
        let reply = dispatcher().dispatch("fail", &Args::new());
        let diagnostic = reply.into_result().unwrap_err();
        assert!(diagnostic.contains("Stack backtrace:"));
    }

    #[test]
    fn test_panic_is_contained() {
        let dispatcher = dispatcher();
        let diagnostic = dispatcher
            .dispatch("explode", &Args::new())
            .into_result()
            .unwrap_err();
        assert!(diagnostic.starts_with("explode panicked: index out of range\nat "));
        assert!(diagnostic.contains("dispatcher.rs:"));

        // Still usable afterwards.
        let reply = dispatcher.dispatch("add", &Args::new().arg(1).arg(1));
        assert_eq!(reply, CallReply::Success(json!(2)));
    }

    #[test]
    fn test_runtime_panic_reports_location() {
        let mut registry = FunctionRegistry::new();
        registry.register("out_of_bounds", |_: &Args| -> anyhow::Result<Value> {
            let empty: Vec<i64> = Vec::new();
            Ok(json!(empty[3]))
        });
        let dispatcher = Dispatcher::new(Arc::new(RwLock::new(registry)));

        let diagnostic = dispatcher
            .dispatch("out_of_bounds", &Args::new())
            .into_result()
            .unwrap_err();
        assert!(diagnostic.contains("index out of bounds"));
        assert!(diagnostic.contains(".rs:"));
    }
}
