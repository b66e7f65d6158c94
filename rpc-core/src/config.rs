//! Runtime configuration for servers and clients.
//!
//! Values come from the built-in defaults, then an optional TOML file, then
//! `RPC_` environment variables (`RPC_SERVER__HEARTBEAT_INTERVAL_MS=500`).

use crate::comms::Address;
use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File};
use rpc::{HEARTBEAT_INTERVAL, HEARTBEAT_TOLERANCE, HEARTBEAT_TOPIC};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn parse_address(value: &str) -> Result<Address> {
    value.parse::<Address>().map_err(|e| anyhow!(e))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub reply_address: String,
    pub publish_address: String,
    pub heartbeat_topic: String,
    pub heartbeat_interval_ms: u64,
    /// Upper bound on heartbeat jitter and on shutdown latency.
    pub poll_timeout_ms: u64,
}

impl ServerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn reply_address(&self) -> Result<Address> {
        parse_address(&self.reply_address)
    }

    pub fn publish_address(&self) -> Result<Address> {
        parse_address(&self.publish_address)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            reply_address: "tcp://*:2014".to_string(),
            publish_address: "tcp://*:4102".to_string(),
            heartbeat_topic: HEARTBEAT_TOPIC.to_string(),
            heartbeat_interval_ms: HEARTBEAT_INTERVAL.as_millis() as u64,
            poll_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub request_address: String,
    pub subscribe_address: String,
    pub heartbeat_topic: String,
    /// Silence after which the listener is told the server is gone.
    pub heartbeat_tolerance_ms: u64,
    pub call_timeout_ms: u64,
    pub poll_timeout_ms: u64,
}

impl ClientConfig {
    pub fn heartbeat_tolerance(&self) -> Duration {
        Duration::from_millis(self.heartbeat_tolerance_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn request_address(&self) -> Result<Address> {
        parse_address(&self.request_address)
    }

    pub fn subscribe_address(&self) -> Result<Address> {
        parse_address(&self.subscribe_address)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_address: "tcp://127.0.0.1:2014".to_string(),
            subscribe_address: "tcp://127.0.0.1:4102".to_string(),
            heartbeat_topic: HEARTBEAT_TOPIC.to_string(),
            heartbeat_tolerance_ms: HEARTBEAT_TOLERANCE.as_millis() as u64,
            call_timeout_ms: 30_000,
            poll_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

impl RpcConfig {
    /// Loads the configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional configuration file. Its format follows the extension
    ///   (`.toml`, `.json`, `.yaml`). When given, the file must exist.
    ///
    /// # Returns
    ///
    /// * `Ok(RpcConfig)` with every field not set by a source left at its default.
    /// * `Err` if the file is unreadable or a value has the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix("RPC")
                .prefix_separator("_")
                .separator("__"),
        );

        builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }
}
