//! Heartbeat scheduling for streaming sessions.
//!
//! The timer tracks the last moment the link was active (an inbound frame
//! arrived or a ping went out) and exposes the deadline at which the next
//! ping is due. The supervisor races that deadline against frame arrival,
//! so a busy connection never pings and a silent one pings within one
//! interval.

use std::time::{Duration, Instant};
use tokio::time::Instant as TokioInstant;

/// Deadline bookkeeping for one session's keep-alive pings.
#[derive(Debug)]
pub struct HeartbeatTimer {
    interval: Duration,
    last_activity: Instant,
}

impl HeartbeatTimer {
    /// Start the timer; the session is considered active as of now.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_activity: Instant::now(),
        }
    }

    /// Record link activity (inbound frame or outbound ping), pushing the
    /// deadline out by one full interval.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// When the next ping is due.
    pub fn deadline(&self) -> TokioInstant {
        TokioInstant::from_std(self.last_activity + self.interval)
    }

    /// Time the link has been silent.
    pub fn idle(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
