//! In-process transport for testing/threading.
//!
//! Endpoints are named channels registered in a process-wide hub. A server
//! binds a name, clients connect to it. Unlike ZMQ, connecting to a name
//! nobody has bound yet is an error.

use crate::comms::error::CommsError;
use crate::comms::transport::{
    PublishTransport, ReplyTransport, RequestTransport, SubscribeTransport,
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A request travelling to a replier, with the route back to its caller.
struct MemoryCall {
    request: Vec<u8>,
    reply_to: Sender<Vec<u8>>,
}

type SubscriberList = Arc<Mutex<Vec<Sender<(String, Vec<u8>)>>>>;

lazy_static! {
    static ref REPLY_ENDPOINTS: Mutex<HashMap<String, Sender<MemoryCall>>> =
        Mutex::new(HashMap::new());
    static ref PUBLISH_ENDPOINTS: Mutex<HashMap<String, SubscriberList>> =
        Mutex::new(HashMap::new());
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) struct MemoryReplier {
    name: Option<String>,
    incoming: Receiver<MemoryCall>,
    pending: Option<MemoryCall>,
    reply_to: Option<Sender<Vec<u8>>>,
}

impl MemoryReplier {
    pub fn bind(name: &str) -> Result<Self, CommsError> {
        let mut endpoints = lock(&REPLY_ENDPOINTS);
        if endpoints.contains_key(name) {
            return Err(CommsError::AddressInUse(name.to_string()));
        }
        let (tx, rx) = mpsc::channel();
        endpoints.insert(name.to_string(), tx);
        Ok(Self {
            name: Some(name.to_string()),
            incoming: rx,
            pending: None,
            reply_to: None,
        })
    }
}

impl ReplyTransport for MemoryReplier {
    fn poll(&mut self, timeout: Duration) -> Result<bool, CommsError> {
        if self.pending.is_some() {
            return Ok(true);
        }
        match self.incoming.recv_timeout(timeout) {
            Ok(call) => {
                self.pending = Some(call);
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(CommsError::ChannelClosed),
        }
    }

    fn recv_bytes(&mut self) -> Result<Vec<u8>, CommsError> {
        let call = match self.pending.take() {
            Some(call) => call,
            None => self
                .incoming
                .recv()
                .map_err(|_| CommsError::ChannelClosed)?,
        };
        self.reply_to = Some(call.reply_to);
        Ok(call.request)
    }

    fn send_bytes(&mut self, data: &[u8]) -> Result<(), CommsError> {
        let reply_to = self
            .reply_to
            .take()
            .ok_or(CommsError::ProtocolViolation("reply sent without a request"))?;
        // A caller that gave up waiting is not an error for the server.
        let _ = reply_to.send(data.to_vec());
        Ok(())
    }

    fn unbind(&mut self) -> Result<(), CommsError> {
        if let Some(name) = self.name.take() {
            lock(&REPLY_ENDPOINTS).remove(&name);
        }
        Ok(())
    }
}

impl Drop for MemoryReplier {
    fn drop(&mut self) {
        let _ = self.unbind();
    }
}

pub(crate) struct MemoryPublisher {
    name: Option<String>,
    subscribers: SubscriberList,
}

impl MemoryPublisher {
    pub fn bind(name: &str) -> Result<Self, CommsError> {
        let mut endpoints = lock(&PUBLISH_ENDPOINTS);
        if endpoints.contains_key(name) {
            return Err(CommsError::AddressInUse(name.to_string()));
        }
        let subscribers: SubscriberList = Arc::new(Mutex::new(Vec::new()));
        endpoints.insert(name.to_string(), subscribers.clone());
        Ok(Self {
            name: Some(name.to_string()),
            subscribers,
        })
    }
}

impl PublishTransport for MemoryPublisher {
    fn send_message(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        let mut subscribers = lock(&self.subscribers);
        // Drop subscribers that have gone away.
        subscribers.retain(|tx| tx.send((topic.to_string(), payload.to_vec())).is_ok());
        Ok(())
    }

    fn unbind(&mut self) -> Result<(), CommsError> {
        if let Some(name) = self.name.take() {
            lock(&PUBLISH_ENDPOINTS).remove(&name);
            lock(&self.subscribers).clear();
        }
        Ok(())
    }
}

impl Drop for MemoryPublisher {
    fn drop(&mut self) {
        let _ = self.unbind();
    }
}

pub(crate) struct MemoryRequester {
    name: String,
    server: Sender<MemoryCall>,
    awaiting: Option<Receiver<Vec<u8>>>,
}

impl MemoryRequester {
    pub fn connect(name: &str) -> Result<Self, CommsError> {
        let server = lock(&REPLY_ENDPOINTS)
            .get(name)
            .cloned()
            .ok_or_else(|| CommsError::NotBound(name.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            server,
            awaiting: None,
        })
    }
}

impl RequestTransport for MemoryRequester {
    fn send_bytes(&mut self, data: &[u8]) -> Result<(), CommsError> {
        if self.awaiting.is_some() {
            return Err(CommsError::ProtocolViolation(
                "request sent before the previous reply arrived",
            ));
        }
        let (reply_to, reply) = mpsc::channel();
        self.server
            .send(MemoryCall {
                request: data.to_vec(),
                reply_to,
            })
            .map_err(|_| CommsError::ChannelClosed)?;
        self.awaiting = Some(reply);
        Ok(())
    }

    fn recv_bytes(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, CommsError> {
        let reply = self
            .awaiting
            .as_ref()
            .ok_or(CommsError::ProtocolViolation("receive without a pending request"))?;
        match reply.recv_timeout(timeout) {
            Ok(data) => {
                self.awaiting = None;
                Ok(Some(data))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                self.awaiting = None;
                Err(CommsError::ChannelClosed)
            }
        }
    }

    fn reset(&mut self) -> Result<(), CommsError> {
        self.awaiting = None;
        if let Some(server) = lock(&REPLY_ENDPOINTS).get(&self.name) {
            self.server = server.clone();
        }
        Ok(())
    }
}

pub(crate) struct MemorySubscriber {
    prefixes: Vec<String>,
    incoming: Receiver<(String, Vec<u8>)>,
}

impl MemorySubscriber {
    pub fn connect(name: &str) -> Result<Self, CommsError> {
        let subscribers = lock(&PUBLISH_ENDPOINTS)
            .get(name)
            .cloned()
            .ok_or_else(|| CommsError::NotBound(name.to_string()))?;
        let (tx, rx) = mpsc::channel();
        lock(&subscribers).push(tx);
        Ok(Self {
            prefixes: Vec::new(),
            incoming: rx,
        })
    }

    fn accepts(&self, topic: &str) -> bool {
        self.prefixes.iter().any(|prefix| topic.starts_with(prefix.as_str()))
    }
}

impl SubscribeTransport for MemorySubscriber {
    fn subscribe(&mut self, prefix: &str) -> Result<(), CommsError> {
        self.prefixes.push(prefix.to_string());
        Ok(())
    }

    fn recv_message(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(String, Vec<u8>)>, CommsError> {
        // Filtering happens here rather than at the publisher; same observable result.
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.incoming.recv_timeout(remaining) {
                Ok((topic, payload)) if self.accepts(&topic) => return Ok(Some((topic, payload))),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    // The publisher went away. To a subscriber that is just silence.
                    std::thread::sleep(deadline.saturating_duration_since(std::time::Instant::now()));
                    return Ok(None);
                }
            }
        }
    }
}
