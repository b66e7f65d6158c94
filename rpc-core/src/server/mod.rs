//! The RPC server: registry, call channel worker, broadcast channel and heartbeat.

pub mod heartbeat;
pub mod state;

pub use heartbeat::Heartbeat;
pub use state::ServerState;

use crate::comms::{Address, BroadcastChannel, CommsError, ReplyChannel};
use crate::config::ServerConfig;
use crate::dispatch::{Dispatcher, FunctionRegistry};
use crate::error::RpcError;
use log::{debug, error, info, warn};
use rpc::{CallReply, Handler};
use serde_json::Value;
use state::SharedState;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type BroadcastSlot = Arc<Mutex<Option<Arc<BroadcastChannel>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Serves registered operations over a call channel and publishes broadcasts
/// (heartbeats included) over a publish channel.
///
/// All methods take `&self`, so the server can be shared behind an `Arc`
/// between the thread that started it, the threads publishing on it and the
/// one that eventually stops it.
pub struct RpcServer {
    config: ServerConfig,
    registry: Arc<RwLock<FunctionRegistry>>,
    state: Arc<SharedState>,
    broadcast: BroadcastSlot,
    worker: Mutex<Option<JoinHandle<Result<(), RpcError>>>>,
}

impl RpcServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Creates a server using the heartbeat and polling settings of `config`.
    ///
    /// The addresses in `config` are not used here; they are passed to `start`.
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            registry: Arc::new(RwLock::new(FunctionRegistry::new())),
            state: Arc::new(SharedState::new()),
            broadcast: Arc::new(Mutex::new(None)),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registers `handler` under `name`, replacing any previous handler.
    ///
    /// Safe while the server is running: the next call to `name` uses the
    /// new handler, a call already in flight finishes with the old one.
    pub fn register<H>(&self, name: &str, handler: H)
    where
        H: Handler + 'static,
    {
        self.registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .register(name, handler);
        debug!("Registered operation {}", name);
    }

    pub fn registry(&self) -> Arc<RwLock<FunctionRegistry>> {
        self.registry.clone()
    }

    pub fn operation_names(&self) -> Vec<String> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .names()
    }

    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    pub fn is_active(&self) -> bool {
        self.state.get() == ServerState::Running
    }

    /// Binds both channels and spawns the worker thread.
    ///
    /// Does nothing if the server is already starting or running. If a
    /// previous run is still shutting down, waits for its worker first.
    ///
    /// # Arguments
    ///
    /// * `reply_address` - Where the call channel is bound (e.g. "tcp://*:2014").
    /// * `publish_address` - Where the broadcast channel is bound (e.g. "tcp://*:4102").
    ///
    /// # Returns
    ///
    /// * `Ok(())` once the server is `Running`.
    /// * `Err(RpcError::TransportBind)` if either channel fails to bind. The
    ///   server is left `Stopped` with nothing bound.
    pub fn start(&self, reply_address: &Address, publish_address: &Address) -> Result<(), RpcError> {
        let mut worker = lock(&self.worker);

        match self.state.get() {
            ServerState::Starting | ServerState::Running => {
                debug!("RPC server already running, start ignored");
                return Ok(());
            }
            ServerState::Stopped | ServerState::Stopping => {}
        }

        if let Some(previous) = worker.take() {
            if let Err(e) = Self::wait(previous, &self.state) {
                warn!("Previous RPC server run ended with error: {}", e);
            }
        }

        self.state.set(ServerState::Starting);

        let mut reply = match ReplyChannel::bind(reply_address) {
            Ok(channel) => channel,
            Err(source) => {
                self.state.set(ServerState::Stopped);
                return Err(RpcError::TransportBind {
                    channel: "reply",
                    address: reply_address.to_string(),
                    source,
                });
            }
        };

        let broadcast = match BroadcastChannel::bind(publish_address) {
            Ok(channel) => Arc::new(channel),
            Err(source) => {
                if let Err(e) = reply.unbind() {
                    warn!("Failed to release reply channel after bind failure: {}", e);
                }
                self.state.set(ServerState::Stopped);
                return Err(RpcError::TransportBind {
                    channel: "publish",
                    address: publish_address.to_string(),
                    source,
                });
            }
        };

        *lock(&self.broadcast) = Some(broadcast.clone());

        let task = Worker {
            reply,
            broadcast,
            broadcast_slot: self.broadcast.clone(),
            dispatcher: Dispatcher::new(self.registry.clone()),
            heartbeat: Heartbeat::new(
                &self.config.heartbeat_topic,
                self.config.heartbeat_interval(),
                Instant::now(),
            ),
            poll_timeout: self.config.poll_timeout(),
            state: self.state.clone(),
        };

        self.state.set(ServerState::Running);

        let handle = thread::Builder::new()
            .name("rpc-server".to_string())
            .spawn(move || task.run());

        match handle {
            Ok(handle) => {
                *worker = Some(handle);
                info!(
                    "RPC server running: reply {} publish {}",
                    reply_address, publish_address
                );
                Ok(())
            }
            Err(e) => {
                // The channels were moved into the dropped task and are closed with it.
                *lock(&self.broadcast) = None;
                self.state.set(ServerState::Stopped);
                error!("Failed to spawn RPC server worker: {}", e);
                Err(RpcError::WorkerSpawn(e))
            }
        }
    }

    /// Asks the worker to exit. Returns immediately; the worker notices on
    /// its next poll timeout. Does nothing unless the server is running.
    pub fn stop(&self) {
        if self.state.transition(ServerState::Running, ServerState::Stopping) {
            info!("RPC server stopping");
        }
    }

    /// Blocks until the worker thread has exited.
    ///
    /// Idempotent, and fine to call on a server that never started.
    ///
    /// # Returns
    ///
    /// * `Ok(())` after a clean shutdown.
    /// * `Err(RpcError::TransportUnbind)` if releasing a channel failed.
    /// * `Err(RpcError::WorkerPanicked)` if the worker thread panicked.
    pub fn join(&self) -> Result<(), RpcError> {
        let mut worker = lock(&self.worker);
        match worker.take() {
            Some(handle) => Self::wait(handle, &self.state),
            None => Ok(()),
        }
    }

    /// Publishes `payload` under `topic` on the broadcast channel.
    ///
    /// Callable from any thread. Concurrent publishes are serialized, so each
    /// message reaches subscribers whole.
    ///
    /// # Returns
    ///
    /// * `Ok(())` once handed to the transport, whether or not anyone is subscribed.
    /// * `Err(RpcError::NotRunning)` if the broadcast channel is not bound.
    pub fn publish(&self, topic: &str, payload: &Value) -> Result<(), RpcError> {
        let channel = lock(&self.broadcast).clone().ok_or(RpcError::NotRunning)?;
        channel.publish(topic, payload)?;
        Ok(())
    }

    fn wait(
        handle: JoinHandle<Result<(), RpcError>>,
        state: &SharedState,
    ) -> Result<(), RpcError> {
        match handle.join() {
            Ok(result) => result,
            Err(_) => {
                state.set(ServerState::Stopped);
                Err(RpcError::WorkerPanicked)
            }
        }
    }
}

impl Default for RpcServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RpcServer {
    fn drop(&mut self) {
        self.stop();
        if let Err(e) = self.join() {
            error!("RPC server shutdown failed: {}", e);
        }
    }
}

/// Everything the worker thread owns.
struct Worker {
    reply: ReplyChannel,
    broadcast: Arc<BroadcastChannel>,
    broadcast_slot: BroadcastSlot,
    dispatcher: Dispatcher,
    heartbeat: Heartbeat,
    poll_timeout: Duration,
    state: Arc<SharedState>,
}

impl Worker {
    fn run(mut self) -> Result<(), RpcError> {
        info!("=== RPC Server Loop Starting ===");
        let mut result = Ok(());

        while self.state.get() == ServerState::Running {
            let ready = match self.reply.poll(self.poll_timeout) {
                Ok(ready) => ready,
                // A signal interrupted the poll; just go round again.
                Err(CommsError::Zmq(zmq::Error::EINTR)) => false,
                Err(e) => {
                    error!("Reply channel poll failed: {}", e);
                    result = Err(e.into());
                    break;
                }
            };

            self.check_heartbeat();

            if !ready {
                continue;
            }

            if let Err(e) = self.serve_one() {
                error!("Reply channel failed: {}", e);
                result = Err(e.into());
                break;
            }
        }

        let shutdown = self.shutdown();
        info!("=== RPC Server Loop Stopped ===");
        result.and(shutdown)
    }

    fn check_heartbeat(&mut self) {
        if let Some(payload) = self.heartbeat.check(Instant::now()) {
            if let Err(e) = self.broadcast.publish(self.heartbeat.topic(), &payload) {
                warn!("Failed to publish heartbeat: {}", e);
            }
        }
    }

    /// Receives one request, dispatches it and sends the reply.
    fn serve_one(&mut self) -> Result<(), CommsError> {
        let reply = match self.reply.receive_request() {
            Ok(request) => {
                let (name, args) = request.into_parts();
                debug!("Dispatching {}", name);
                self.dispatcher.dispatch(&name, &args)
            }
            Err(CommsError::Codec(e)) => {
                warn!("Malformed request: {}", e);
                CallReply::Failure(format!("Malformed request: {}", e))
            }
            Err(e) => return Err(e),
        };
        self.reply.send_reply(&reply)
    }

    /// Releases both channels. Both are attempted even if the first fails;
    /// the first failure is returned.
    fn shutdown(&mut self) -> Result<(), RpcError> {
        *lock(&self.broadcast_slot) = None;

        let publish = self.broadcast.unbind().map_err(|source| {
            error!("Failed to unbind publish channel: {}", source);
            RpcError::TransportUnbind {
                channel: "publish",
                source,
            }
        });
        let reply = self.reply.unbind().map_err(|source| {
            error!("Failed to unbind reply channel: {}", source);
            RpcError::TransportUnbind {
                channel: "reply",
                source,
            }
        });

        self.state.set(ServerState::Stopped);
        publish.and(reply)
    }
}
