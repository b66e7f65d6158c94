//! Command-line arguments shared by every binary built on this crate.
//!
//! Values given on the command line override the configuration file, which
//! overrides the defaults.

use crate::config::RpcConfig;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// Options common to all node commands.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Name of the service (used for logging)
    #[arg(long, global = true, default_value = "rpc-node")]
    service_name: String,
}

impl CommonArgs {
    /// Loads the configuration file named by `--config`, if any, plus
    /// `RPC_` environment overrides.
    pub fn load_config(&self) -> Result<RpcConfig> {
        RpcConfig::load(self.config.as_deref())
    }

    pub fn get_service_name(&self) -> &str {
        &self.service_name
    }
}

/// Server overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct ServerArgs {
    /// Address of the call channel (e.g. tcp://*:2014)
    #[arg(long)]
    reply_address: Option<String>,

    /// Address of the broadcast channel (e.g. tcp://*:4102)
    #[arg(long)]
    publish_address: Option<String>,

    /// Heartbeat cadence in milliseconds
    #[arg(long)]
    heartbeat_interval_ms: Option<u64>,
}

impl ServerArgs {
    pub fn apply(&self, config: &mut RpcConfig) {
        if let Some(address) = &self.reply_address {
            config.server.reply_address = address.clone();
        }
        if let Some(address) = &self.publish_address {
            config.server.publish_address = address.clone();
        }
        if let Some(interval) = self.heartbeat_interval_ms {
            config.server.heartbeat_interval_ms = interval;
        }
    }
}

/// Client overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct ClientArgs {
    /// Address of the server's call channel (e.g. tcp://127.0.0.1:2014)
    #[arg(long)]
    request_address: Option<String>,

    /// Address of the server's broadcast channel (e.g. tcp://127.0.0.1:4102)
    #[arg(long)]
    subscribe_address: Option<String>,

    /// Call timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl ClientArgs {
    pub fn apply(&self, config: &mut RpcConfig) {
        if let Some(address) = &self.request_address {
            config.client.request_address = address.clone();
        }
        if let Some(address) = &self.subscribe_address {
            config.client.subscribe_address = address.clone();
        }
        if let Some(timeout) = self.timeout_ms {
            config.client.call_timeout_ms = timeout;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        server: ServerArgs,
    }

    #[test]
    fn test_overrides_apply_on_top_of_config() {
        let cli = TestCli::parse_from([
            "rpc-node",
            "--reply-address",
            "mem:args-test",
            "--heartbeat-interval-ms",
            "500",
        ]);
        let mut config = RpcConfig::default();
        cli.server.apply(&mut config);

        assert_eq!(config.server.reply_address, "mem:args-test");
        assert_eq!(config.server.heartbeat_interval_ms, 500);
        assert_eq!(config.server.publish_address, "tcp://*:4102");
        assert_eq!(cli.common.get_service_name(), "rpc-node");
    }
}
