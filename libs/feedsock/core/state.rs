//! Connection state and health reporting.
//!
//! The supervisor is the only writer; everything else reads. State is a
//! single atomic so health checks never contend with the session loop.

use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

/// Lifecycle of one feed's connection, as driven by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FeedState {
    Disconnected = 0,
    Connecting = 1,
    Subscribing = 2,
    Live = 3,
    Closing = 4,
}

impl FeedState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => FeedState::Connecting,
            2 => FeedState::Subscribing,
            3 => FeedState::Live,
            4 => FeedState::Closing,
            _ => FeedState::Disconnected,
        }
    }
}

/// Lock-free shared status for one feed.
pub struct FeedStatus {
    state: AtomicU8,
    last_receive_ms: AtomicI64,
}

impl FeedStatus {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(FeedState::Disconnected as u8),
            last_receive_ms: AtomicI64::new(0),
        }
    }

    pub fn set(&self, state: FeedState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn get(&self) -> FeedState {
        FeedState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_live(&self) -> bool {
        self.get() == FeedState::Live
    }

    /// Record an inbound frame observation (epoch milliseconds).
    pub fn mark_receive(&self, epoch_ms: i64) {
        self.last_receive_ms.store(epoch_ms, Ordering::Release);
    }

    /// Epoch milliseconds of the most recent inbound frame, 0 if none yet.
    pub fn last_receive_ms(&self) -> i64 {
        self.last_receive_ms.load(Ordering::Acquire)
    }

    pub fn health(&self) -> FeedHealth {
        let state = self.get();
        FeedHealth {
            state,
            connected: state == FeedState::Live,
            last_receive_ms: self.last_receive_ms(),
        }
    }
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time health signal exposed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedHealth {
    pub state: FeedState,
    pub connected: bool,
    /// Epoch milliseconds of the last inbound frame, 0 before the first.
    pub last_receive_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle_transitions() {
        let status = FeedStatus::new();
        assert_eq!(status.get(), FeedState::Disconnected);

        status.set(FeedState::Connecting);
        assert_eq!(status.get(), FeedState::Connecting);

        status.set(FeedState::Subscribing);
        assert_eq!(status.get(), FeedState::Subscribing);

        status.set(FeedState::Live);
        assert!(status.is_live());

        status.set(FeedState::Closing);
        status.set(FeedState::Disconnected);
        assert_eq!(status.get(), FeedState::Disconnected);
        assert!(!status.is_live());
    }

    #[test]
    fn health_reflects_state_and_receive_time() {
        let status = FeedStatus::new();
        assert_eq!(status.health().last_receive_ms, 0);
        assert!(!status.health().connected);

        status.set(FeedState::Live);
        status.mark_receive(1_700_000_000_123);

        let health = status.health();
        assert!(health.connected);
        assert_eq!(health.state, FeedState::Live);
        assert_eq!(health.last_receive_ms, 1_700_000_000_123);
    }
}
