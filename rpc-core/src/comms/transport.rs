use crate::comms::error::CommsError;
use std::time::Duration;

/// Server side of the call channel (reading requests, writing replies).
/// Implementation details (ZMQ, Memory) are hidden behind this trait.
pub trait ReplyTransport: Send {
    /// Waits up to `timeout` for an incoming request.
    ///
    /// Returns `true` if a request can be read without blocking.
    fn poll(&mut self, timeout: Duration) -> Result<bool, CommsError>;

    /// Receive the next full request frame.
    fn recv_bytes(&mut self) -> Result<Vec<u8>, CommsError>;

    /// Send the reply to the last received request.
    fn send_bytes(&mut self, data: &[u8]) -> Result<(), CommsError>;

    /// Release the bound address.
    fn unbind(&mut self) -> Result<(), CommsError>;
}

/// Sending side of the broadcast channel.
pub trait PublishTransport: Send {
    /// Send a topic and its payload as one message.
    fn send_message(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError>;

    /// Release the bound address.
    fn unbind(&mut self) -> Result<(), CommsError>;
}

/// Client side of the call channel.
pub trait RequestTransport: Send {
    fn send_bytes(&mut self, data: &[u8]) -> Result<(), CommsError>;

    /// Waits up to `timeout` for the reply. `Ok(None)` means it timed out.
    fn recv_bytes(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, CommsError>;

    /// Drops any half-finished exchange and reconnects.
    ///
    /// Needed after a timeout: a request/reply socket that never got its
    /// reply refuses to send again.
    fn reset(&mut self) -> Result<(), CommsError>;
}

/// Receiving side of the broadcast channel.
pub trait SubscribeTransport: Send {
    /// Starts receiving messages whose topic begins with `prefix`.
    fn subscribe(&mut self, prefix: &str) -> Result<(), CommsError>;

    /// Waits up to `timeout` for the next message. `Ok(None)` means it timed out.
    fn recv_message(&mut self, timeout: Duration)
        -> Result<Option<(String, Vec<u8>)>, CommsError>;
}
