use thiserror::Error;
use zmq::Error as ZmqError;

#[derive(Error, Debug)]
pub enum CommsError {
    #[error("ZMQ Error: {0}")]
    Zmq(#[from] ZmqError),
    #[error("Address already bound: {0}")]
    AddressInUse(String),
    #[error("Nothing bound at {0}")]
    NotBound(String),
    #[error("Channel closed")]
    ChannelClosed,
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
    #[error("Protocol violation: {0}")]
    ProtocolViolation(&'static str),
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
