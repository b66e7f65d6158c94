//! Factory functions for creating communication endpoints.
//!
//! Abstracts the creation of the four socket roles based on `Address`.

use super::address::Address;
use super::error::CommsError;
use super::transport::{PublishTransport, ReplyTransport, RequestTransport, SubscribeTransport};
use super::transports::memory::{MemoryPublisher, MemoryReplier, MemoryRequester, MemorySubscriber};
use super::transports::zmq::{ZmqPublisher, ZmqReplier, ZmqRequester, ZmqSubscriber};

/// Binds the server side of a call channel.
///
/// # Arguments
///
/// * `address` - The address to bind to (e.g., "tcp://*:2014").
///
/// # Returns
///
/// * `Ok(Box<dyn ReplyTransport>)` if binding succeeded.
/// * `Err` if the address is taken or the transport fails to initialize.
pub fn bind_replier(address: &Address) -> Result<Box<dyn ReplyTransport>, CommsError> {
    let transport: Box<dyn ReplyTransport> = match address {
        Address::Zmq(endpoint) => Box::new(ZmqReplier::bind(endpoint)?),
        Address::Memory(name) => Box::new(MemoryReplier::bind(name)?),
    };
    Ok(transport)
}

/// Binds the server side of a broadcast channel.
///
/// # Arguments
///
/// * `address` - The address to bind to (e.g., "tcp://*:4102").
pub fn bind_publisher(address: &Address) -> Result<Box<dyn PublishTransport>, CommsError> {
    let transport: Box<dyn PublishTransport> = match address {
        Address::Zmq(endpoint) => Box::new(ZmqPublisher::bind(endpoint)?),
        Address::Memory(name) => Box::new(MemoryPublisher::bind(name)?),
    };
    Ok(transport)
}

/// Connects a client to a call channel.
pub fn connect_requester(address: &Address) -> Result<Box<dyn RequestTransport>, CommsError> {
    let transport: Box<dyn RequestTransport> = match address {
        Address::Zmq(endpoint) => Box::new(ZmqRequester::connect(endpoint)?),
        Address::Memory(name) => Box::new(MemoryRequester::connect(name)?),
    };
    Ok(transport)
}

/// Connects a client to a broadcast channel.
///
/// # Arguments
///
/// * `address` - The address to connect to.
/// * `topics` - Topic prefixes to subscribe to right away. More can be added later.
pub fn connect_subscriber(
    address: &Address,
    topics: &[&str],
) -> Result<Box<dyn SubscribeTransport>, CommsError> {
    let mut transport: Box<dyn SubscribeTransport> = match address {
        Address::Zmq(endpoint) => Box::new(ZmqSubscriber::connect(endpoint)?),
        Address::Memory(name) => Box::new(MemorySubscriber::connect(name)?),
    };
    for topic in topics {
        transport.subscribe(topic)?;
    }
    Ok(transport)
}
