//! Interchangeable speech-recognition backends.
//!
//! A [`RecognitionBackend`] captures audio through an underlying engine and
//! emits [`BackendEvent`]s: text fragments for the in-progress utterance and
//! errors. Failures are only ever reported through the event channel, never
//! as return values — the session needs no defensive catch-all to stay
//! alive.
//!
//! Two concrete variants exist: [`CloudBackend`] (hosted engine with
//! explicit silence timeouts) and [`LocalBackend`] (on-device engine in
//! continuous mode with auto-restart). [`plan_backends`] picks the pair for
//! the current platform.

pub mod cloud;
pub mod engine;
pub mod local;

pub use cloud::{CloudBackend, CloudBackendConfig};
pub use engine::{
    EngineOpenError, EngineOptions, EngineSignal, ScriptStep, ScriptedEngine, SpeechEngine,
};
pub use local::{LocalBackend, LocalBackendConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// One raw text payload for the current in-progress utterance.
///
/// Carries the *current full text* of the utterance as the engine hears it,
/// not an increment; a later fragment may replace this one with a longer or
/// corrected version of the same phrase. Consumed immediately by the
/// accumulator, never persisted.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Raw recognized text.
    pub text: String,
    /// When the fragment arrived from the backend.
    pub received_at: Instant,
}

impl Fragment {
    /// Creates a fragment stamped with the current time.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Instant::now(),
        }
    }
}

/// A backend-level failure, delivered through the event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendFailure {
    /// The platform lacks this recognition capability entirely.
    Unavailable { message: String },
    /// The backend failed mid-session.
    Runtime { message: String },
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendFailure::Unavailable { message } => {
                write!(f, "backend unavailable: {}", message)
            }
            BackendFailure::Runtime { message } => write!(f, "backend error: {}", message),
        }
    }
}

/// Events a backend delivers to its single subscriber.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    /// A recognized text fragment for the in-progress utterance.
    Fragment(Fragment),
    /// A backend failure. The backend is unusable after sending this.
    Error(BackendFailure),
}

/// An interchangeable speech-to-text capability.
///
/// Lifecycle contract:
/// - [`attach`] installs the single event subscriber; [`detach`] removes it.
///   A backend with no subscriber stays inert.
/// - [`start`] begins continuous capture. It is asynchronous and reports
///   failure only through a [`BackendEvent::Error`], never a return value.
///   A `start` that completes after `stop` was already issued must release
///   the engine immediately without becoming active.
/// - [`stop`] is synchronous and idempotent; it releases the underlying
///   engine resources. At most one backend instance holds the capture
///   handle at any time.
///
/// [`attach`]: RecognitionBackend::attach
/// [`detach`]: RecognitionBackend::detach
/// [`start`]: RecognitionBackend::start
/// [`stop`]: RecognitionBackend::stop
#[async_trait]
pub trait RecognitionBackend: Send {
    /// Installs the event subscriber. Replaces any previous one.
    fn attach(&mut self, events: mpsc::Sender<BackendEvent>);

    /// Removes the event subscriber; no further events are delivered.
    fn detach(&mut self);

    /// Begins continuous capture.
    async fn start(&mut self);

    /// Stops capture and releases engine resources. Idempotent.
    fn stop(&mut self);

    /// True between a successful `start` and `stop` (or backend failure).
    fn is_active(&self) -> bool;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

/// Reports whether only the local/on-device backend is usable here.
///
/// Pure platform probe: reads nothing but compile-time target identifiers.
/// Apple platforms route speech recognition through the system engine and
/// do not expose the hosted SDK's audio stack.
pub fn local_backend_only() -> bool {
    cfg!(target_os = "ios") || cfg!(target_os = "macos")
}

/// Which backend variant to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Cloud,
    Local,
}

/// Configured backend preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Probe the platform: cloud primary with local fallback where possible.
    #[default]
    Auto,
    /// Cloud primary with local fallback.
    Cloud,
    /// Local only, no fallback.
    Local,
}

/// A primary backend choice plus optional fallback for failover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendPlan {
    pub primary: BackendKind,
    pub fallback: Option<BackendKind>,
}

/// Maps a preference to the backend pair for the current platform.
///
/// Selection happens here, at construction time, not by inspecting backend
/// types at runtime.
pub fn plan_backends(prefer: BackendPreference) -> BackendPlan {
    match prefer {
        BackendPreference::Auto if local_backend_only() => BackendPlan {
            primary: BackendKind::Local,
            fallback: None,
        },
        BackendPreference::Auto | BackendPreference::Cloud => BackendPlan {
            primary: BackendKind::Cloud,
            fallback: Some(BackendKind::Local),
        },
        BackendPreference::Local => BackendPlan {
            primary: BackendKind::Local,
            fallback: None,
        },
    }
}

/// Maps an engine open failure to the backend failure taxonomy.
pub(crate) fn map_open_error(err: EngineOpenError) -> BackendFailure {
    match err {
        EngineOpenError::Unavailable(message) => BackendFailure::Unavailable { message },
        EngineOpenError::Failed(message) => BackendFailure::Runtime { message },
    }
}
