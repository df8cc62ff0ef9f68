//! Session notices and reporting.
//!
//! Operational conditions the caller's UI should know about: a transient
//! backend failure that triggered a failover (brief transitional notice),
//! and fatal conditions that end the session (exactly one human-readable
//! notification each, after which the UI returns to a retryable ready
//! state).

use std::fmt;
use std::sync::{Arc, Mutex};

/// A user-relevant session event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// The active backend failed; a failover is being attempted.
    BackendFailed {
        backend: &'static str,
        message: String,
    },
    /// The fallback backend took over. Transient — recognition continues.
    FailedOver { backend: &'static str },
    /// No usable backend on this platform. Fatal.
    Unavailable { message: String },
    /// Primary and fallback both failed. Fatal.
    DoubleFailover,
    /// The session auto-stopped after prolonged silence.
    AutoStopped,
}

impl fmt::Display for SessionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionNotice::BackendFailed { backend, message } => {
                write!(f, "Recognition backend '{}' failed: {}", backend, message)
            }
            SessionNotice::FailedOver { backend } => {
                write!(f, "Switched to the {} recognition backend", backend)
            }
            SessionNotice::Unavailable { message } => {
                write!(f, "Speech recognition is not available: {}", message)
            }
            SessionNotice::DoubleFailover => {
                write!(f, "Speech recognition failed on both backends")
            }
            SessionNotice::AutoStopped => {
                write!(f, "Stopped listening after prolonged silence")
            }
        }
    }
}

/// Trait for delivering session notices to the embedding application.
pub trait SessionReporter: Send + Sync {
    /// Reports one notice. Fatal notices are reported exactly once.
    fn report(&self, notice: &SessionNotice);
}

/// Simple reporter that logs notices to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl SessionReporter for LogReporter {
    fn report(&self, notice: &SessionNotice) {
        eprintln!("[session] {}", notice);
    }
}

/// Reporter that records notices in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct CollectingReporter {
    notices: Arc<Mutex<Vec<SessionNotice>>>,
}

impl CollectingReporter {
    /// Creates an empty collecting reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the notices reported so far.
    pub fn notices(&self) -> Vec<SessionNotice> {
        self.notices
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl SessionReporter for CollectingReporter {
    fn report(&self, notice: &SessionNotice) {
        if let Ok(mut guard) = self.notices.lock() {
            guard.push(notice.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_display() {
        let failed = SessionNotice::BackendFailed {
            backend: "cloud",
            message: "timeout".to_string(),
        };
        assert_eq!(
            failed.to_string(),
            "Recognition backend 'cloud' failed: timeout"
        );

        let switched = SessionNotice::FailedOver { backend: "local" };
        assert_eq!(
            switched.to_string(),
            "Switched to the local recognition backend"
        );

        assert_eq!(
            SessionNotice::DoubleFailover.to_string(),
            "Speech recognition failed on both backends"
        );
    }

    #[test]
    fn test_collecting_reporter_records_in_order() {
        let reporter = CollectingReporter::new();
        reporter.report(&SessionNotice::FailedOver { backend: "local" });
        reporter.report(&SessionNotice::AutoStopped);

        let notices = reporter.notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[1], SessionNotice::AutoStopped);
    }

    #[test]
    fn test_log_reporter_does_not_panic() {
        LogReporter.report(&SessionNotice::AutoStopped);
    }
}
