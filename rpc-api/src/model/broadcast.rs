//! Heartbeat constants of the broadcast channel.

use std::time::Duration;

/// Reserved topic carrying the server liveness signal.
pub const HEARTBEAT_TOPIC: &str = "heartbeat";

/// Cadence at which the server publishes heartbeats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Silence after which a client considers the server gone.
pub const HEARTBEAT_TOLERANCE: Duration = Duration::from_secs(30);
