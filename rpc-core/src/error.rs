use crate::comms::error::CommsError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the server lifecycle and the client.
///
/// Per-call failures never show up here on the server side: they travel back
/// to the caller as a failed `CallReply`.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Failed to bind {channel} channel at {address}: {source}")]
    TransportBind {
        channel: &'static str,
        address: String,
        #[source]
        source: CommsError,
    },

    #[error("Failed to unbind {channel} channel: {source}")]
    TransportUnbind {
        channel: &'static str,
        #[source]
        source: CommsError,
    },

    #[error("Transport error: {0}")]
    Comms(#[from] CommsError),

    #[error("Server is not running")]
    NotRunning,

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    #[error("Worker thread panicked")]
    WorkerPanicked,

    #[error("Client is not connected")]
    NotConnected,

    #[error("Call to {name} timed out after {timeout:?}")]
    CallTimeout { name: String, timeout: Duration },

    /// The server answered with a failed reply.
    #[error("{0}")]
    Remote(String),
}
