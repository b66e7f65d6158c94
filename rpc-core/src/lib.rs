//! # RPC Core Library
//!
//! A request/reply server exposing named operations to remote callers, with a
//! broadcast channel for fire-and-forget messages and a periodic heartbeat.
//!
//! ## Modules
//! - `comms`: Addresses, transports (ZMQ, Memory) and the typed reply/broadcast channels.
//! - `dispatch`: Function registry and the dispatcher turning every outcome into a reply.
//! - `server`: Lifecycle, worker loop and heartbeat.
//! - `client`: Caller side, with broadcast listening and heartbeat tracking.
//! - `config`: Layered configuration (defaults, file, environment).
//! - `args`: Standardized command-line arguments.

pub mod args;
pub mod client;
pub mod comms;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod macros;
pub mod server;

pub use client::{BroadcastListener, RpcClient};
pub use comms::Address;
pub use error::RpcError;
pub use server::{RpcServer, ServerState};
