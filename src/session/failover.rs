//! Backend supervision and one-time failover.
//!
//! The controller owns the active backend and an optional, not-yet-started
//! fallback. When the active backend reports an error, the dead backend is
//! torn down completely (stopped, detached) *before* the fallback starts —
//! the capture handle is exclusively owned, so the two must never be active
//! concurrently. Exactly one failover is permitted per session.

use crate::backend::{BackendEvent, RecognitionBackend};
use crate::error::{KikitoriError, Result};
use tokio::sync::mpsc;

/// Supervises backend health and performs the one-time fallback switch.
pub struct FailoverController {
    active: Option<Box<dyn RecognitionBackend>>,
    fallback: Option<Box<dyn RecognitionBackend>>,
    failed_over: bool,
}

impl FailoverController {
    /// Creates a controller from a primary backend and optional fallback.
    pub fn new(
        primary: Box<dyn RecognitionBackend>,
        fallback: Option<Box<dyn RecognitionBackend>>,
    ) -> Self {
        Self {
            active: Some(primary),
            fallback,
            failed_over: false,
        }
    }

    /// Attaches the event channel to the primary and starts it.
    pub async fn start(&mut self, events: mpsc::Sender<BackendEvent>) {
        if let Some(backend) = self.active.as_mut() {
            backend.attach(events);
            backend.start().await;
        }
    }

    /// Tears the dead backend down and starts the fallback.
    ///
    /// Returns the fallback's name on success. Fails with
    /// [`KikitoriError::DoubleFailover`] if a failover already happened this
    /// session, or [`KikitoriError::BackendUnavailable`] if no fallback was
    /// configured (local-only platforms).
    pub async fn fail_over(&mut self, events: mpsc::Sender<BackendEvent>) -> Result<&'static str> {
        // Stop the dead backend before even deciding whether a fallback
        // exists: its engine handle must be released either way, and its
        // detached sender guarantees the session never hears from it again.
        if let Some(mut dead) = self.active.take() {
            dead.stop();
            dead.detach();
        }

        if self.failed_over {
            return Err(KikitoriError::DoubleFailover);
        }
        let Some(mut next) = self.fallback.take() else {
            return Err(KikitoriError::BackendUnavailable {
                message: "no fallback backend configured".to_string(),
            });
        };

        self.failed_over = true;
        next.attach(events);
        next.start().await;
        let name = next.name();
        self.active = Some(next);
        Ok(name)
    }

    /// Stops and detaches the active backend, if any.
    pub fn shutdown(&mut self) {
        if let Some(mut backend) = self.active.take() {
            backend.stop();
            backend.detach();
        }
    }

    /// Whether the one permitted failover has been used.
    pub fn has_failed_over(&self) -> bool {
        self.failed_over
    }

    /// Name of the currently active backend, if one is running.
    pub fn active_name(&self) -> Option<&'static str> {
        self.active.as_ref().map(|b| b.name())
    }
}
