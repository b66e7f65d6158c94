use chrono::Utc;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Current Unix time in fractional seconds, the heartbeat payload.
pub fn unix_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Cooperative heartbeat timer, checked once per worker-loop iteration.
///
/// Not a thread of its own: a heartbeat can only go out between two polls,
/// so a slow handler delays it.
#[derive(Debug)]
pub struct Heartbeat {
    topic: String,
    interval: Duration,
    next_deadline: Instant,
}

impl Heartbeat {
    /// Creates a timer whose first beat is due one `interval` after `now`.
    pub fn new(topic: &str, interval: Duration, now: Instant) -> Self {
        Self {
            topic: topic.to_string(),
            interval,
            next_deadline: now + interval,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    /// Returns the payload to publish if a beat is due at `now`, and pushes
    /// the deadline to `now + interval`.
    pub fn check(&mut self, now: Instant) -> Option<Value> {
        if now < self.next_deadline {
            return None;
        }
        self.next_deadline = now + self.interval;
        Some(Value::from(unix_timestamp()))
    }
}
