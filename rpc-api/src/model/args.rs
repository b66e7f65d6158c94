//! Argument bundle handed to every operation handler.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Failure while decoding the arguments of a call.
#[derive(Error, Debug)]
pub enum ArgumentError {
    /// No positional argument at `index` and no named argument `name`.
    #[error("missing argument '{name}' (position {index})")]
    Missing { index: usize, name: String },

    /// The argument exists but does not decode into the requested type.
    #[error("invalid argument '{name}': {source}")]
    Invalid {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// More positional arguments than the operation accepts.
    #[error("takes {expected} positional arguments but {given} were given")]
    TooMany { expected: usize, given: usize },
}

/// Positional and named arguments of a call.
///
/// Both halves are plain JSON values so any caller can build them without
/// knowing the handler's Rust signature. Handlers decode what they need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Args {
    #[serde(rename = "args", default)]
    positional: Vec<Value>,
    #[serde(rename = "kwargs", default)]
    named: Map<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an argument bundle from already collected parts.
    ///
    /// # Arguments
    ///
    /// * `positional` - Ordered positional arguments.
    /// * `named` - Keyword arguments.
    pub fn from_parts(positional: Vec<Value>, named: Map<String, Value>) -> Self {
        Self { positional, named }
    }

    /// Appends a positional argument (builder style).
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets a named argument (builder style).
    pub fn kwarg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.named.insert(name.to_string(), value.into());
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn named(&self) -> &Map<String, Value> {
        &self.named
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Decodes the argument at `index`, falling back to the named argument `name`.
    ///
    /// # Arguments
    ///
    /// * `index` - Position of the parameter in the operation signature.
    /// * `name` - Name of the parameter, used when fewer positional arguments were given.
    ///
    /// # Returns
    ///
    /// * `Ok(T)` with the decoded value.
    /// * `Err(ArgumentError::Missing)` if the argument was supplied neither way.
    /// * `Err(ArgumentError::Invalid)` if it does not decode into `T`.
    pub fn get<T: DeserializeOwned>(&self, index: usize, name: &str) -> Result<T, ArgumentError> {
        let value = self
            .positional
            .get(index)
            .or_else(|| self.named.get(name))
            .ok_or_else(|| ArgumentError::Missing {
                index,
                name: name.to_string(),
            })?;
        Self::decode(name, value)
    }

    /// Decodes an optional named argument.
    ///
    /// Returns `Ok(None)` when the name is absent or explicitly `null`.
    pub fn get_named<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ArgumentError> {
        match self.named.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Self::decode(name, value).map(Some),
        }
    }

    /// Rejects calls carrying more positional arguments than `expected`.
    pub fn ensure_arity(&self, expected: usize) -> Result<(), ArgumentError> {
        if self.positional.len() > expected {
            return Err(ArgumentError::TooMany {
                expected,
                given: self.positional.len(),
            });
        }
        Ok(())
    }

    fn decode<T: DeserializeOwned>(name: &str, value: &Value) -> Result<T, ArgumentError> {
        T::deserialize(value).map_err(|source| ArgumentError::Invalid {
            name: name.to_string(),
            source,
        })
    }
}

impl From<Vec<Value>> for Args {
    fn from(positional: Vec<Value>) -> Self {
        Self::from_parts(positional, Map::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_positional_takes_precedence_over_named() {
        let args = Args::new().arg(2).kwarg("a", 7);
        let a: i64 = args.get(0, "a").unwrap();
        assert_eq!(a, 2);
    }

    #[test]
    fn test_falls_back_to_named() {
        let args = Args::new().arg(2).kwarg("b", 3);
        let b: i64 = args.get(1, "b").unwrap();
        assert_eq!(b, 3);
    }

    #[test]
    fn test_missing_argument_names_parameter() {
        let args = Args::new();
        let err = args.get::<i64>(0, "volume").unwrap_err();
        assert!(matches!(err, ArgumentError::Missing { index: 0, .. }));
        assert!(err.to_string().contains("volume"));
    }

    #[test]
    fn test_invalid_type() {
        let args = Args::new().arg("not a number");
        let err = args.get::<f64>(0, "price").unwrap_err();
        assert!(matches!(err, ArgumentError::Invalid { .. }));
    }

    #[test]
    fn test_optional_named() {
        let args = Args::new().kwarg("limit", json!(null)).kwarg("offset", 5);
        assert_eq!(args.get_named::<u32>("limit").unwrap(), None);
        assert_eq!(args.get_named::<u32>("offset").unwrap(), Some(5));
        assert_eq!(args.get_named::<u32>("absent").unwrap(), None);
    }

    #[test]
    fn test_arity() {
        let args = Args::from(vec![json!(1), json!(2), json!(3)]);
        assert!(args.ensure_arity(3).is_ok());
        let err = args.ensure_arity(2).unwrap_err();
        assert_eq!(err.to_string(), "takes 2 positional arguments but 3 were given");
    }

    #[test]
    fn test_wire_shape() {
        let args = Args::new().arg(1).kwarg("x", "y");
        let encoded = serde_json::to_value(&args).unwrap();
        assert_eq!(encoded, json!({"args": [1], "kwargs": {"x": "y"}}));

        let decoded: Args = serde_json::from_value(json!({"args": [1]})).unwrap();
        assert!(decoded.named().is_empty());
    }
}
