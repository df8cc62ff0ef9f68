//! kikitori — real-time speech capture and utterance segmentation.
//!
//! Sits between streaming speech-recognition engines and a consumer that
//! wants clean, finalized utterances: it accumulates partial hypotheses,
//! suppresses the near-duplicate re-emissions streaming recognizers produce,
//! detects utterance boundaries with a restartable silence timer, and fails
//! over from a cloud engine to an on-device one at most once per session.
//!
//! ```no_run
//! use kikitori::{
//!     CloudBackend, CloudBackendConfig, FailoverController, SessionConfig, StdoutSink,
//!     TranscriptionSession,
//! };
//! # use kikitori::ScriptedEngine;
//!
//! # async fn demo(engine: ScriptedEngine) -> kikitori::Result<()> {
//! let backend = Box::new(CloudBackend::new(CloudBackendConfig::default(), engine));
//! let backends = FailoverController::new(backend, None);
//! let session =
//!     TranscriptionSession::new(SessionConfig::default(), backends, Box::new(StdoutSink))?;
//! let mut handle = session.start();
//! // ... speech flows; finalized utterances land on stdout ...
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod backend;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod report;
pub mod session;
pub mod sink;

pub use backend::{
    BackendEvent, BackendFailure, BackendKind, BackendPlan, BackendPreference, CloudBackend,
    CloudBackendConfig, EngineOpenError, EngineOptions, EngineSignal, Fragment, LocalBackend,
    LocalBackendConfig, RecognitionBackend, ScriptStep, ScriptedEngine, SpeechEngine,
    local_backend_only, plan_backends,
};
pub use config::Config;
pub use error::{KikitoriError, Result};
pub use report::{CollectingReporter, LogReporter, SessionNotice, SessionReporter};
pub use session::{
    DedupConfig, FailoverController, SessionConfig, SessionHandle, SessionState,
    TranscriptionSession, UtteranceAccumulator,
};
pub use sink::{ChannelSink, CollectorSink, StdoutSink, Utterance, UtteranceSink};
