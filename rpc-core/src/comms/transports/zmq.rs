use crate::comms::error::CommsError;
use crate::comms::transport::{
    PublishTransport, ReplyTransport, RequestTransport, SubscribeTransport,
};
use log::debug;
use std::time::Duration;
use zmq::{Context as ZmqContext, Socket, SocketType};

fn timeout_ms(timeout: Duration) -> i64 {
    timeout.as_millis().min(i64::MAX as u128) as i64
}

/// Endpoint actually bound, as reported by ZMQ (resolves wildcards like `tcp://*:port`).
fn last_endpoint(socket: &Socket, requested: &str) -> String {
    match socket.get_last_endpoint() {
        Ok(Ok(endpoint)) => endpoint,
        _ => requested.to_string(),
    }
}

/// ZMQ REP socket serving the call channel.
pub(crate) struct ZmqReplier {
    socket: Socket,
    endpoint: Option<String>,
}

impl ZmqReplier {
    pub fn bind(address: &str) -> Result<Self, CommsError> {
        let context = ZmqContext::new();
        let socket = context.socket(SocketType::REP)?;
        socket.set_linger(0)?;
        socket.bind(address)?;
        let endpoint = last_endpoint(&socket, address);
        debug!("REP socket bound to {}", endpoint);
        Ok(Self {
            socket,
            endpoint: Some(endpoint),
        })
    }
}

impl ReplyTransport for ZmqReplier {
    fn poll(&mut self, timeout: Duration) -> Result<bool, CommsError> {
        let ready = self.socket.poll(zmq::POLLIN, timeout_ms(timeout))?;
        Ok(ready > 0)
    }

    fn recv_bytes(&mut self) -> Result<Vec<u8>, CommsError> {
        Ok(self.socket.recv_bytes(0)?)
    }

    fn send_bytes(&mut self, data: &[u8]) -> Result<(), CommsError> {
        self.socket.send(data, 0)?;
        Ok(())
    }

    fn unbind(&mut self) -> Result<(), CommsError> {
        if let Some(endpoint) = self.endpoint.take() {
            self.socket.unbind(&endpoint)?;
            debug!("REP socket unbound from {}", endpoint);
        }
        Ok(())
    }
}

/// ZMQ PUB socket serving the broadcast channel.
///
/// Topic and payload travel as one multipart message, which ZMQ delivers
/// atomically: a subscriber sees both frames or neither.
pub(crate) struct ZmqPublisher {
    socket: Socket,
    endpoint: Option<String>,
}

impl ZmqPublisher {
    pub fn bind(address: &str) -> Result<Self, CommsError> {
        let context = ZmqContext::new();
        let socket = context.socket(SocketType::PUB)?;
        socket.set_linger(0)?;
        socket.bind(address)?;
        let endpoint = last_endpoint(&socket, address);
        debug!("PUB socket bound to {}", endpoint);
        Ok(Self {
            socket,
            endpoint: Some(endpoint),
        })
    }
}

impl PublishTransport for ZmqPublisher {
    fn send_message(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        self.socket.send_multipart(vec![topic.as_bytes(), payload], 0)?;
        Ok(())
    }

    fn unbind(&mut self) -> Result<(), CommsError> {
        if let Some(endpoint) = self.endpoint.take() {
            self.socket.unbind(&endpoint)?;
            debug!("PUB socket unbound from {}", endpoint);
        }
        Ok(())
    }
}

/// ZMQ REQ socket used by clients of the call channel.
pub(crate) struct ZmqRequester {
    context: ZmqContext,
    socket: Socket,
    address: String,
}

impl ZmqRequester {
    pub fn connect(address: &str) -> Result<Self, CommsError> {
        let context = ZmqContext::new();
        let socket = Self::open(&context, address)?;
        Ok(Self {
            context,
            socket,
            address: address.to_string(),
        })
    }

    fn open(context: &ZmqContext, address: &str) -> Result<Socket, CommsError> {
        let socket = context.socket(SocketType::REQ)?;
        socket.set_linger(0)?;
        socket.connect(address)?;
        Ok(socket)
    }
}

impl RequestTransport for ZmqRequester {
    fn send_bytes(&mut self, data: &[u8]) -> Result<(), CommsError> {
        self.socket.send(data, 0)?;
        Ok(())
    }

    fn recv_bytes(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, CommsError> {
        if self.socket.poll(zmq::POLLIN, timeout_ms(timeout))? == 0 {
            return Ok(None);
        }
        Ok(Some(self.socket.recv_bytes(0)?))
    }

    fn reset(&mut self) -> Result<(), CommsError> {
        // The old socket is closed on drop; linger 0 discards the stuck request.
        self.socket = Self::open(&self.context, &self.address)?;
        debug!("REQ socket reconnected to {}", self.address);
        Ok(())
    }
}

/// ZMQ SUB socket used by clients of the broadcast channel.
pub(crate) struct ZmqSubscriber {
    socket: Socket,
}

impl ZmqSubscriber {
    pub fn connect(address: &str) -> Result<Self, CommsError> {
        let context = ZmqContext::new();
        let socket = context.socket(SocketType::SUB)?;
        socket.set_linger(0)?;
        socket.connect(address)?;
        Ok(Self { socket })
    }
}

impl SubscribeTransport for ZmqSubscriber {
    fn subscribe(&mut self, prefix: &str) -> Result<(), CommsError> {
        self.socket.set_subscribe(prefix.as_bytes())?;
        Ok(())
    }

    fn recv_message(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(String, Vec<u8>)>, CommsError> {
        if self.socket.poll(zmq::POLLIN, timeout_ms(timeout))? == 0 {
            return Ok(None);
        }
        let mut frames = self.socket.recv_multipart(0)?;
        if frames.len() != 2 {
            return Err(CommsError::MalformedFrame(format!(
                "expected topic and payload frames, got {}",
                frames.len()
            )));
        }
        let payload = frames.pop().unwrap_or_default();
        let topic = crate::comms::codec::decode_topic(&frames[0])?;
        Ok(Some((topic, payload)))
    }
}
