//! Call request envelope.

use crate::model::args::Args;
use serde::{Deserialize, Serialize};

/// A single call: operation name plus its arguments.
///
/// On the wire this is `{"name": .., "args": [..], "kwargs": {..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    name: String,
    #[serde(flatten)]
    args: Args,
}

impl CallRequest {
    /// Creates a new request.
    ///
    /// # Arguments
    ///
    /// * `name` - The registered operation name.
    /// * `args` - Positional and named arguments.
    pub fn new(name: &str, args: Args) -> Self {
        Self {
            name: name.to_string(),
            args,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_args(&self) -> &Args {
        &self.args
    }

    pub fn into_parts(self) -> (String, Args) {
        (self.name, self.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = CallRequest::new("add", Args::new().arg(2).arg(3));
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(
            encoded,
            json!({"name": "add", "args": [2, 3], "kwargs": {}})
        );
    }

    #[test]
    fn test_request_without_arguments_decodes() {
        let request: CallRequest = serde_json::from_str(r#"{"name": "ping"}"#).unwrap();
        assert_eq!(request.get_name(), "ping");
        assert!(request.get_args().is_empty());
    }
}
