use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of an `RpcServer`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl ServerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ServerState::Starting,
            2 => ServerState::Running,
            3 => ServerState::Stopping,
            _ => ServerState::Stopped,
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Stopped => "stopped",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// State shared between the thread calling `stop()` and the worker.
#[derive(Debug)]
pub(crate) struct SharedState(AtomicU8);

impl SharedState {
    pub fn new() -> Self {
        Self(AtomicU8::new(ServerState::Stopped as u8))
    }

    pub fn get(&self) -> ServerState {
        ServerState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: ServerState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Moves from `from` to `to` only if currently in `from`.
    pub fn transition(&self, from: ServerState, to: ServerState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_only_from_expected_state() {
        let state = SharedState::new();
        assert_eq!(state.get(), ServerState::Stopped);
        assert!(!state.transition(ServerState::Running, ServerState::Stopping));
        assert_eq!(state.get(), ServerState::Stopped);

        state.set(ServerState::Running);
        assert!(state.transition(ServerState::Running, ServerState::Stopping));
        assert_eq!(state.get(), ServerState::Stopping);
        assert_eq!(state.get().to_string(), "stopping");
    }
}
