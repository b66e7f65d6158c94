use rpc::Handler;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0} not registered")]
pub struct OperationNotFound(pub String);

/// Mapping from operation name to the handler serving it.
///
/// Registering a name twice replaces the earlier handler. There is no removal.
/// Handlers are stored behind `Arc` so a caller can clone one out and release
/// whatever lock guards the registry before invoking it.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Handler>>,
}

impl FunctionRegistry {
    /// Creates a new, empty FunctionRegistry.
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Registers `handler` under `name`, replacing any previous handler.
    ///
    /// # Arguments
    ///
    /// * `name` - The operation name callers will use.
    /// * `handler` - A closure `Fn(&Args) -> anyhow::Result<Value>` or any `Handler`.
    pub fn register<H>(&mut self, name: &str, handler: H)
    where
        H: Handler + 'static,
    {
        self.register_arc(name, Arc::new(handler));
    }

    pub fn register_arc(&mut self, name: &str, handler: Arc<dyn Handler>) {
        self.functions.insert(name.to_string(), handler);
    }

    /// Looks up the handler registered under `name`.
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<dyn Handler>)` if found.
    /// * `Err(OperationNotFound)` otherwise.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Handler>, OperationNotFound> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| OperationNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered operation names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc::prelude::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = FunctionRegistry::new();
        registry.register("add", operation!(|a: i64, b: i64| a + b));

        let handler = registry.lookup("add").unwrap();
        assert_eq!(handler.call(&Args::new().arg(2).arg(3)).unwrap(), json!(5));
        assert!(registry.contains("add"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_missing_names_operation() {
        let registry = FunctionRegistry::new();
        let err = registry.lookup("missingOp").err().unwrap();
        assert_eq!(err.to_string(), "missingOp not registered");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = FunctionRegistry::new();
        registry.register("version", operation!(|| 1));
        registry.register("version", operation!(|| 2));

        let handler = registry.lookup("version").unwrap();
        assert_eq!(handler.call(&Args::new()).unwrap(), json!(2));
        assert_eq!(registry.names(), vec!["version".to_string()]);
    }
}
