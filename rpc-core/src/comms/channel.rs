//! Typed channel abstractions.
//!
//! Provides `ReplyChannel` and `BroadcastChannel` which handle the wire
//! encoding and the call/response cadence on top of the raw transports.

use crate::comms::address::Address;
use crate::comms::builder::{bind_publisher, bind_replier};
use crate::comms::codec;
use crate::comms::error::CommsError;
use crate::comms::transport::{PublishTransport, ReplyTransport};
use rpc::{CallReply, CallRequest};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyState {
    Idle,
    RequestReceived,
}

/// The server end of the call channel.
///
/// Enforces strict alternation: every received request must be answered
/// before the next one is read.
pub struct ReplyChannel {
    transport: Box<dyn ReplyTransport>,
    state: ReplyState,
}

impl ReplyChannel {
    /// Binds a new call channel.
    ///
    /// # Arguments
    ///
    /// * `address` - Where callers will connect.
    pub fn bind(address: &Address) -> Result<Self, CommsError> {
        Ok(Self::from_transport(bind_replier(address)?))
    }

    /// Wraps an already bound transport.
    pub fn from_transport(transport: Box<dyn ReplyTransport>) -> Self {
        Self {
            transport,
            state: ReplyState::Idle,
        }
    }

    /// Waits up to `timeout` for a request. Returns immediately while a
    /// received request is still unanswered.
    pub fn poll(&mut self, timeout: Duration) -> Result<bool, CommsError> {
        if self.state == ReplyState::RequestReceived {
            return Ok(false);
        }
        self.transport.poll(timeout)
    }

    /// Reads and decodes the pending request.
    ///
    /// A frame that fails to decode still counts as received and must be
    /// answered with `send_reply`.
    ///
    /// # Returns
    ///
    /// * `Ok(CallRequest)` on success.
    /// * `Err(CommsError::ProtocolViolation)` if the previous request is unanswered.
    /// * `Err(CommsError::Codec)` if the frame is not a valid request.
    pub fn receive_request(&mut self) -> Result<CallRequest, CommsError> {
        if self.state == ReplyState::RequestReceived {
            return Err(CommsError::ProtocolViolation(
                "request received before the previous one was answered",
            ));
        }
        let frame = self.transport.recv_bytes()?;
        self.state = ReplyState::RequestReceived;
        codec::decode(&frame)
    }

    /// Sends the reply to the request last received.
    pub fn send_reply(&mut self, reply: &CallReply) -> Result<(), CommsError> {
        if self.state != ReplyState::RequestReceived {
            return Err(CommsError::ProtocolViolation("reply sent without a request"));
        }
        let frame = codec::encode(reply)?;
        self.state = ReplyState::Idle;
        self.transport.send_bytes(&frame)
    }

    /// Releases the bound address.
    pub fn unbind(&mut self) -> Result<(), CommsError> {
        self.transport.unbind()
    }
}

/// The server end of the broadcast channel.
///
/// Shared between the server worker and any thread calling `publish`; the
/// mutex guards only the physical send so one message's topic and payload
/// are never interleaved with another's.
pub struct BroadcastChannel {
    transport: Mutex<Box<dyn PublishTransport>>,
}

impl BroadcastChannel {
    /// Binds a new broadcast channel.
    ///
    /// # Arguments
    ///
    /// * `address` - Where subscribers will connect.
    pub fn bind(address: &Address) -> Result<Self, CommsError> {
        Ok(Self::from_transport(bind_publisher(address)?))
    }

    /// Wraps an already bound transport.
    pub fn from_transport(transport: Box<dyn PublishTransport>) -> Self {
        Self {
            transport: Mutex::new(transport),
        }
    }

    /// Publishes `payload` under `topic`.
    ///
    /// Not having any subscriber is not an error; the message is simply lost.
    pub fn publish(&self, topic: &str, payload: &Value) -> Result<(), CommsError> {
        let frame = codec::encode(payload)?;
        self.transport().send_message(topic, &frame)
    }

    /// Releases the bound address.
    pub fn unbind(&self) -> Result<(), CommsError> {
        self.transport().unbind()
    }

    fn transport(&self) -> MutexGuard<'_, Box<dyn PublishTransport>> {
        self.transport
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
