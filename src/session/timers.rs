//! Countdown state for the silence and auto-stop timers.
//!
//! The session used to be expressible as scattered timeout callbacks, each
//! closure re-capturing the previous handle; here cancellation is
//! centralized instead: one state object holds at most one live deadline per
//! timer, mutated only through named methods, and the session loop turns
//! the deadlines into sleep branches. A timer can therefore never fire
//! "stale" relative to the latest fragment — rearming moves the deadline
//! before any expiry decision is made.

use std::time::Duration;
use tokio::time::Instant;

/// The two independent, restartable countdowns of a session.
#[derive(Debug, Clone)]
pub struct SessionTimers {
    silence_threshold: Duration,
    auto_stop_threshold: Duration,
    silence_deadline: Option<Instant>,
    auto_stop_deadline: Option<Instant>,
    silence_cancels: u64,
    auto_stop_cancels: u64,
}

impl SessionTimers {
    /// Creates the timer pair. `auto_stop_threshold` must be strictly
    /// greater than `silence_threshold`; the session config validates this.
    pub fn new(silence_threshold: Duration, auto_stop_threshold: Duration) -> Self {
        Self {
            silence_threshold,
            auto_stop_threshold,
            silence_deadline: None,
            auto_stop_deadline: None,
            silence_cancels: 0,
            auto_stop_cancels: 0,
        }
    }

    /// Arms (or cancels-and-rearms) the silence timer from `now`.
    pub fn arm_silence(&mut self, now: Instant) {
        if self.silence_deadline.is_some() {
            self.silence_cancels += 1;
        }
        self.silence_deadline = Some(now + self.silence_threshold);
    }

    /// Arms (or cancels-and-rearms) the auto-stop timer from `now`.
    pub fn arm_auto_stop(&mut self, now: Instant) {
        if self.auto_stop_deadline.is_some() {
            self.auto_stop_cancels += 1;
        }
        self.auto_stop_deadline = Some(now + self.auto_stop_threshold);
    }

    /// Disarms the silence timer without counting a cancel — used after a
    /// flush, when the timer has consumed its deadline and must stay quiet
    /// until the next fragment.
    pub fn clear_silence(&mut self) {
        self.silence_deadline = None;
    }

    /// Cancels both timers. After this returns no deadline is live, so no
    /// further expiry can be observed.
    pub fn cancel_all(&mut self) {
        if self.silence_deadline.take().is_some() {
            self.silence_cancels += 1;
        }
        if self.auto_stop_deadline.take().is_some() {
            self.auto_stop_cancels += 1;
        }
    }

    /// The pending silence deadline, if armed.
    pub fn silence_deadline(&self) -> Option<Instant> {
        self.silence_deadline
    }

    /// The pending auto-stop deadline, if armed.
    pub fn auto_stop_deadline(&self) -> Option<Instant> {
        self.auto_stop_deadline
    }

    /// How many times the silence timer was canceled while live.
    pub fn silence_cancel_count(&self) -> u64 {
        self.silence_cancels
    }

    /// How many times the auto-stop timer was canceled while live.
    pub fn auto_stop_cancel_count(&self) -> u64 {
        self.auto_stop_cancels
    }

    /// Number of live deadlines (0 to 2).
    pub fn live_count(&self) -> usize {
        usize::from(self.silence_deadline.is_some())
            + usize::from(self.auto_stop_deadline.is_some())
    }
}
