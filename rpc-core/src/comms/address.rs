//! Address models for network configuration.
//!
//! Defines the `Address` enum for abstracting over the transports the server
//! can bind its channels to (ZMQ, Memory).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents a network address for communication endpoints.
///
/// This enum shields the server and client from specific transport implementations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    /// ZeroMQ Transport (Inter-Process)
    /// Format: "tcp://ip:port" or "ipc://path"
    Zmq(String),

    /// Internal Memory Channel (Intra-Process)
    /// Format: "channel_name"
    Memory(String),
}

impl Address {
    /// Creates a new ZMQ TCP address.
    ///
    /// # Arguments
    ///
    /// * `ip` - The IP address (e.g., "127.0.0.1", or "*" to bind all interfaces).
    /// * `port` - The TCP port.
    ///
    /// # Returns
    ///
    /// A `Address::Zmq` variant.
    pub fn zmq_tcp(ip: &str, port: u16) -> Self {
        Address::Zmq(format!("tcp://{}:{}", ip, port))
    }

    /// Creates a new Memory Channel address.
    ///
    /// # Arguments
    ///
    /// * `name` - The unique name of the memory channel.
    ///
    /// # Returns
    ///
    /// A `Address::Memory` variant.
    pub fn memory(name: &str) -> Self {
        Address::Memory(name.to_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Zmq(addr) => write!(f, "zmq:{}", addr),
            Address::Memory(name) => write!(f, "mem:{}", name),
        }
    }
}

impl Default for Address {
    fn default() -> Self {
        Address::Zmq("tcp://127.0.0.1:2014".to_string())
    }
}

/// Schemes the ZMQ transport can serve. Every socket owns its own context,
/// so `inproc://` endpoints would never find each other.
const ZMQ_SCHEMES: [&str; 2] = ["tcp://", "ipc://"];

fn zmq_endpoint(endpoint: &str) -> Result<Address, String> {
    if ZMQ_SCHEMES.iter().any(|scheme| endpoint.starts_with(scheme)) {
        Ok(Address::Zmq(endpoint.to_string()))
    } else {
        Err(format!("Unsupported ZMQ endpoint: {}", endpoint))
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(stripped) = s.strip_prefix("zmq:") {
            zmq_endpoint(stripped)
        } else if let Some(stripped) = s.strip_prefix("mem:") {
            Ok(Address::Memory(stripped.to_string()))
        } else if s.contains("://") {
            zmq_endpoint(s)
        } else {
            Err(format!("Unknown address format: {}", s))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_addresses() {
        assert_eq!(
            "tcp://*:2014".parse::<Address>().unwrap(),
            Address::Zmq("tcp://*:2014".into())
        );
        assert_eq!(
            "zmq:ipc:///tmp/rpc".parse::<Address>().unwrap(),
            Address::Zmq("ipc:///tmp/rpc".into())
        );
        assert_eq!("mem:orders".parse::<Address>().unwrap(), Address::memory("orders"));
        assert!("udp://host:1".parse::<Address>().is_err());
        assert!("orders".parse::<Address>().is_err());
    }

    #[test]
    fn test_inproc_is_rejected() {
        assert!("inproc://rpc".parse::<Address>().is_err());
        assert!("zmq:inproc://rpc".parse::<Address>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        let address = Address::zmq_tcp("127.0.0.1", 4102);
        assert_eq!(address.to_string(), "zmq:tcp://127.0.0.1:4102");
        assert_eq!(address.to_string().parse::<Address>().unwrap(), address);
    }
}
