//! Client side of the protocol: calls over the call channel, broadcasts and
//! heartbeat tracking over the broadcast channel.

use crate::comms::codec;
use crate::comms::transport::{RequestTransport, SubscribeTransport};
use crate::comms::{connect_requester, connect_subscriber, Address, CommsError};
use crate::config::ClientConfig;
use crate::error::RpcError;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rpc::{Args, CallReply, CallRequest};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Receives the broadcasts a client subscribed to.
///
/// Called from the client's subscriber thread, one message at a time.
pub trait BroadcastListener: Send + Sync {
    /// A non-heartbeat broadcast arrived.
    fn on_message(&self, topic: &str, payload: Value);

    /// No heartbeat arrived within the configured tolerance.
    ///
    /// Called once per outage; a later heartbeat re-arms it.
    fn on_disconnected(&self) {}
}

impl<F> BroadcastListener for F
where
    F: Fn(&str, Value) + Send + Sync,
{
    fn on_message(&self, topic: &str, payload: Value) {
        self(topic, payload)
    }
}

/// Calls operations on an `RpcServer` and listens to its broadcasts.
pub struct RpcClient {
    config: ClientConfig,
    listener: Arc<dyn BroadcastListener>,
    requester: Mutex<Option<Box<dyn RequestTransport>>>,
    topics: Arc<Mutex<Vec<String>>>,
    last_heartbeat: Arc<Mutex<Option<DateTime<Utc>>>>,
    active: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RpcClient {
    pub fn new<L>(listener: L) -> Self
    where
        L: BroadcastListener + 'static,
    {
        Self::with_config(ClientConfig::default(), listener)
    }

    /// Creates a client using the timeouts and heartbeat settings of `config`.
    pub fn with_config<L>(config: ClientConfig, listener: L) -> Self
    where
        L: BroadcastListener + 'static,
    {
        Self {
            config,
            listener: Arc::new(listener),
            requester: Mutex::new(None),
            topics: Arc::new(Mutex::new(Vec::new())),
            last_heartbeat: Arc::new(Mutex::new(None)),
            active: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Server time carried by the most recent heartbeat.
    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_heartbeat)
    }

    /// Connects both channels and starts the subscriber thread.
    ///
    /// # Arguments
    ///
    /// * `request_address` - The server's call channel (e.g. "tcp://127.0.0.1:2014").
    /// * `subscribe_address` - The server's broadcast channel (e.g. "tcp://127.0.0.1:4102").
    pub fn start(
        &self,
        request_address: &Address,
        subscribe_address: &Address,
    ) -> Result<(), RpcError> {
        let mut worker = lock(&self.worker);
        if self.is_active() {
            return Ok(());
        }
        if let Some(previous) = worker.take() {
            if previous.join().is_err() {
                warn!("Previous RPC client subscriber thread panicked");
            }
        }

        let requester = connect_requester(request_address)?;
        let subscriber =
            connect_subscriber(subscribe_address, &[self.config.heartbeat_topic.as_str()])?;
        *lock(&self.requester) = Some(requester);
        *lock(&self.last_heartbeat) = None;
        self.active.store(true, Ordering::SeqCst);

        let task = SubscriberWorker {
            subscriber,
            listener: self.listener.clone(),
            topics: self.topics.clone(),
            last_heartbeat: self.last_heartbeat.clone(),
            active: self.active.clone(),
            heartbeat_topic: self.config.heartbeat_topic.clone(),
            heartbeat_tolerance: self.config.heartbeat_tolerance(),
            poll_timeout: self.config.poll_timeout(),
        };

        let handle = thread::Builder::new()
            .name("rpc-client".to_string())
            .spawn(move || task.run());
        match handle {
            Ok(handle) => {
                *worker = Some(handle);
                info!(
                    "RPC client connected: request {} subscribe {}",
                    request_address, subscribe_address
                );
                Ok(())
            }
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                *lock(&self.requester) = None;
                Err(RpcError::WorkerSpawn(e))
            }
        }
    }

    /// Subscribes to broadcasts whose topic starts with `topic`.
    ///
    /// May be called before or after `start`; `""` subscribes to everything.
    pub fn subscribe_topic(&self, topic: &str) {
        lock(&self.topics).push(topic.to_string());
    }

    /// Calls `name` and returns its value.
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - The operation's result.
    /// * `Err(RpcError::Remote)` - The server replied with a failure diagnostic.
    /// * `Err(RpcError::CallTimeout)` - No reply within the configured timeout.
    pub fn call(&self, name: &str, args: Args) -> Result<Value, RpcError> {
        self.call_raw(name, args)?
            .into_result()
            .map_err(RpcError::Remote)
    }

    /// Calls `name` and returns the reply as sent by the server.
    ///
    /// Calls from several threads are serialized: the call channel carries
    /// one request at a time. After a timeout or a transport error the call
    /// channel is reset, so the next call starts clean.
    pub fn call_raw(&self, name: &str, args: Args) -> Result<CallReply, RpcError> {
        let mut requester = lock(&self.requester);
        let requester = requester.as_mut().ok_or(RpcError::NotConnected)?;

        let frame = codec::encode(&CallRequest::new(name, args))?;
        let timeout = self.config.call_timeout();

        match Self::exchange(requester, &frame, timeout) {
            Ok(Some(frame)) => Ok(codec::decode(&frame)?),
            Ok(None) => {
                warn!("Call to {} timed out after {:?}", name, timeout);
                requester.reset()?;
                Err(RpcError::CallTimeout {
                    name: name.to_string(),
                    timeout,
                })
            }
            Err(e) => {
                warn!("Call to {} failed: {}", name, e);
                if let Err(reset) = requester.reset() {
                    error!("Failed to reset call channel: {}", reset);
                }
                Err(e.into())
            }
        }
    }

    fn exchange(
        requester: &mut Box<dyn RequestTransport>,
        frame: &[u8],
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, CommsError> {
        requester.send_bytes(frame)?;
        requester.recv_bytes(timeout)
    }

    /// Asks the subscriber thread to exit. Calls fail with `NotConnected` after `join`.
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Waits for the subscriber thread and disconnects the call channel.
    pub fn join(&self) -> Result<(), RpcError> {
        let handle = lock(&self.worker).take();
        let result = match handle {
            Some(handle) => handle.join().map_err(|_| RpcError::WorkerPanicked),
            None => Ok(()),
        };
        *lock(&self.requester) = None;
        result
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.stop();
        if let Err(e) = self.join() {
            error!("RPC client shutdown failed: {}", e);
        }
    }
}

/// Marks the client inactive when the subscriber thread ends, panics included.
struct ClearOnExit(Arc<AtomicBool>);

impl Drop for ClearOnExit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct SubscriberWorker {
    subscriber: Box<dyn SubscribeTransport>,
    listener: Arc<dyn BroadcastListener>,
    topics: Arc<Mutex<Vec<String>>>,
    last_heartbeat: Arc<Mutex<Option<DateTime<Utc>>>>,
    active: Arc<AtomicBool>,
    heartbeat_topic: String,
    heartbeat_tolerance: Duration,
    poll_timeout: Duration,
}

impl SubscriberWorker {
    fn run(mut self) {
        info!("=== RPC Client Loop Starting ===");
        let _active = ClearOnExit(self.active.clone());
        let mut subscribed = 0;
        let mut last_seen = Instant::now();
        let mut disconnected = false;

        while self.active.load(Ordering::SeqCst) {
            subscribed = self.apply_subscriptions(subscribed);

            match self.subscriber.recv_message(self.poll_timeout) {
                Ok(Some((topic, frame))) => {
                    let payload: Value = match codec::decode(&frame) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("Dropping undecodable broadcast on {}: {}", topic, e);
                            continue;
                        }
                    };
                    if topic == self.heartbeat_topic {
                        last_seen = Instant::now();
                        self.record_heartbeat(&payload);
                        if disconnected {
                            info!("Server heartbeat is back");
                            disconnected = false;
                        }
                    } else {
                        self.listener.on_message(&topic, payload);
                    }
                }
                Ok(None) | Err(CommsError::Zmq(zmq::Error::EINTR)) => {}
                Err(CommsError::MalformedFrame(reason)) => {
                    warn!("Dropping malformed broadcast: {}", reason);
                }
                Err(e) => {
                    error!("Broadcast channel failed: {}", e);
                    break;
                }
            }

            if !disconnected && last_seen.elapsed() > self.heartbeat_tolerance {
                warn!(
                    "No heartbeat for {:?}, server considered disconnected",
                    last_seen.elapsed()
                );
                disconnected = true;
                self.listener.on_disconnected();
            }
        }
        info!("=== RPC Client Loop Stopped ===");
    }

    /// Subscribes to topics added since the last pass. Returns how many are applied.
    fn apply_subscriptions(&mut self, applied: usize) -> usize {
        let topics = lock(&self.topics);
        for topic in topics.iter().skip(applied) {
            match self.subscriber.subscribe(topic) {
                Ok(()) => debug!("Subscribed to '{}'", topic),
                Err(e) => warn!("Failed to subscribe to '{}': {}", topic, e),
            }
        }
        topics.len()
    }

    fn record_heartbeat(&self, payload: &Value) {
        let at = payload.as_f64().and_then(|seconds| {
            DateTime::<Utc>::from_timestamp(seconds.trunc() as i64, (seconds.fract() * 1e9) as u32)
        });
        *lock(&self.last_heartbeat) = at;
    }
}
