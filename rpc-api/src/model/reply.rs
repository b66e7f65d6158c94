//! Call reply envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a call.
///
/// Serialized as the two-element array `[ok, value-or-diagnostic]` so any
/// client can tell success from failure by the first element alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ReplyFrame", try_from = "ReplyFrame")]
pub enum CallReply {
    /// The handler returned normally.
    Success(Value),
    /// Unknown operation or handler failure, with a human-readable diagnostic.
    Failure(String),
}

impl CallReply {
    pub fn is_ok(&self) -> bool {
        matches!(self, CallReply::Success(_))
    }

    /// Converts into a `Result`, keeping the diagnostic as the error.
    pub fn into_result(self) -> Result<Value, String> {
        match self {
            CallReply::Success(value) => Ok(value),
            CallReply::Failure(diagnostic) => Err(diagnostic),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ReplyFrame(bool, Value);

impl From<CallReply> for ReplyFrame {
    fn from(reply: CallReply) -> Self {
        match reply {
            CallReply::Success(value) => ReplyFrame(true, value),
            CallReply::Failure(diagnostic) => ReplyFrame(false, Value::String(diagnostic)),
        }
    }
}

impl TryFrom<ReplyFrame> for CallReply {
    type Error = String;

    fn try_from(frame: ReplyFrame) -> Result<Self, Self::Error> {
        match frame {
            ReplyFrame(true, value) => Ok(CallReply::Success(value)),
            ReplyFrame(false, Value::String(diagnostic)) => Ok(CallReply::Failure(diagnostic)),
            ReplyFrame(false, other) => Err(format!("failure reply without diagnostic text: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_wire_shape() {
        let ok = serde_json::to_value(CallReply::Success(json!(5))).unwrap();
        assert_eq!(ok, json!([true, 5]));

        let failed = serde_json::to_value(CallReply::Failure("boom".into())).unwrap();
        assert_eq!(failed, json!([false, "boom"]));
    }

    #[test]
    fn test_reply_decodes_from_frame() {
        let reply: CallReply = serde_json::from_str(r#"[false, "missingOp not registered"]"#).unwrap();
        assert_eq!(reply.into_result().unwrap_err(), "missingOp not registered");
    }

    #[test]
    fn test_failure_frame_requires_text() {
        let decoded = serde_json::from_str::<CallReply>("[false, 3]");
        assert!(decoded.is_err());
    }
}
