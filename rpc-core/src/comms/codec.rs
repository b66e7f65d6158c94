//! JSON framing for requests, replies and broadcast payloads.

use crate::comms::error::CommsError;
use serde::{de::DeserializeOwned, Serialize};

/// Serializes a message into a single frame.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, CommsError> {
    Ok(serde_json::to_vec(message)?)
}

/// Deserializes a single frame.
pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, CommsError> {
    Ok(serde_json::from_slice(frame)?)
}

/// Decodes a broadcast topic frame.
pub fn decode_topic(frame: &[u8]) -> Result<String, CommsError> {
    String::from_utf8(frame.to_vec())
        .map_err(|e| CommsError::MalformedFrame(format!("topic is not UTF-8: {}", e)))
}
