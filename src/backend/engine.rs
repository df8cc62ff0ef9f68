//! The speech-engine seam between a backend and its vendor SDK.
//!
//! A [`SpeechEngine`] represents one continuous-recognition session on an
//! underlying engine (a cloud SDK connection, an on-device recognizer). The
//! engine delivers raw hypotheses over a channel; the backends in
//! [`crate::backend`] turn those into the session-facing event contract.
//!
//! This trait allows swapping implementations (real SDK vs scripted mock).

use crate::defaults;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Options handed to the engine when opening a recognition session.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Recognition language as a BCP-47 tag (e.g. "ja-JP").
    pub language: String,
    /// How long to wait for the first speech before the engine gives up on
    /// the current turn. `None` keeps the engine's own default.
    pub initial_silence_timeout_ms: Option<u32>,
    /// Trailing silence before the engine finalizes the current phrase.
    pub end_silence_timeout_ms: Option<u32>,
    /// Silence treated as a segmentation boundary between phrases.
    pub segmentation_silence_ms: Option<u32>,
    /// Whether the engine should keep recognizing across phrase boundaries.
    pub continuous: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            initial_silence_timeout_ms: None,
            end_silence_timeout_ms: None,
            segmentation_silence_ms: None,
            continuous: true,
        }
    }
}

/// A raw signal from an open engine session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSignal {
    /// The engine's current hypothesis for the in-progress utterance.
    ///
    /// Always the full text so far, not an increment; a later hypothesis may
    /// replace an earlier one with a longer or corrected version.
    Hypothesis(String),
    /// The engine ended the session on its own (on-device engines do this
    /// after every recognition turn).
    Halted,
    /// The engine failed mid-session.
    Failed(String),
}

/// Failure opening an engine session.
#[derive(Debug, Clone, Error)]
pub enum EngineOpenError {
    /// The platform has no usable engine of this kind at all.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    /// The engine exists but the session could not be established.
    #[error("engine open failed: {0}")]
    Failed(String),
}

/// One continuous-recognition session on an underlying speech engine.
#[async_trait]
pub trait SpeechEngine: Send + 'static {
    /// Opens a recognition session and returns the signal stream.
    ///
    /// The engine keeps the returned channel open until [`close`] is called
    /// or the engine halts/fails on its own.
    ///
    /// [`close`]: SpeechEngine::close
    async fn open(
        &mut self,
        options: &EngineOptions,
    ) -> Result<mpsc::Receiver<EngineSignal>, EngineOpenError>;

    /// Releases the engine session and any underlying audio resources.
    async fn close(&mut self);

    /// Name of the engine for logging.
    fn name(&self) -> &'static str {
        "engine"
    }
}

/// One step of a [`ScriptedEngine`] script.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Wait before the next step.
    Wait(Duration),
    /// Deliver a hypothesis.
    Hypothesis(String),
    /// Halt the session (what on-device engines do after a turn).
    Halt,
    /// Fail the session mid-stream.
    Fail(String),
}

/// Scripted engine for testing backends and sessions without a real SDK.
///
/// Each `open` replays the script from the beginning, which also exercises
/// the local backend's auto-restart path. Open/close calls are counted so
/// tests can assert resource lifecycles.
pub struct ScriptedEngine {
    script: Vec<ScriptStep>,
    open_error: Option<EngineOpenError>,
    open_delay: Duration,
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    feeder: Option<JoinHandle<()>>,
}

impl ScriptedEngine {
    /// Creates a scripted engine that delivers the given steps per open.
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            open_error: None,
            open_delay: Duration::ZERO,
            opens: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            feeder: None,
        }
    }

    /// Creates an engine that emits each text once, with a pause before each.
    pub fn hypotheses<I, S>(texts: I, gap: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut script = Vec::new();
        for text in texts {
            script.push(ScriptStep::Wait(gap));
            script.push(ScriptStep::Hypothesis(text.into()));
        }
        Self::new(script)
    }

    /// Configures every `open` to fail with a mid-session-style error.
    pub fn with_open_failure(mut self, message: &str) -> Self {
        self.open_error = Some(EngineOpenError::Failed(message.to_string()));
        self
    }

    /// Configures every `open` to report the engine as unavailable.
    pub fn with_unavailable(mut self, message: &str) -> Self {
        self.open_error = Some(EngineOpenError::Unavailable(message.to_string()));
        self
    }

    /// Delays `open` completion, for exercising stop-during-start races.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Shared counter of successful `open` calls.
    pub fn open_count(&self) -> Arc<AtomicUsize> {
        self.opens.clone()
    }

    /// Shared counter of `close` calls.
    pub fn close_count(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }
}

#[async_trait]
impl SpeechEngine for ScriptedEngine {
    async fn open(
        &mut self,
        _options: &EngineOptions,
    ) -> Result<mpsc::Receiver<EngineSignal>, EngineOpenError> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        self.opens.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(16);
        let script = self.script.clone();
        self.feeder = Some(tokio::spawn(async move {
            for step in script {
                match step {
                    ScriptStep::Wait(d) => tokio::time::sleep(d).await,
                    ScriptStep::Hypothesis(text) => {
                        if tx.send(EngineSignal::Hypothesis(text)).await.is_err() {
                            return;
                        }
                    }
                    ScriptStep::Halt => {
                        let _ = tx.send(EngineSignal::Halted).await;
                        return;
                    }
                    ScriptStep::Fail(message) => {
                        let _ = tx.send(EngineSignal::Failed(message)).await;
                        return;
                    }
                }
            }
            // Script exhausted: keep the session open (silence) until closed.
            std::future::pending::<()>().await;
        }));

        Ok(rx)
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_engine_replays_hypotheses() {
        let mut engine = ScriptedEngine::hypotheses(["こんにちは", "テスト"], Duration::ZERO);
        let mut rx = engine
            .open(&EngineOptions::default())
            .await
            .expect("open should succeed");

        assert_eq!(
            rx.recv().await,
            Some(EngineSignal::Hypothesis("こんにちは".to_string()))
        );
        assert_eq!(
            rx.recv().await,
            Some(EngineSignal::Hypothesis("テスト".to_string()))
        );
        engine.close().await;
    }

    #[tokio::test]
    async fn test_scripted_engine_open_failure() {
        let mut engine = ScriptedEngine::new(vec![]).with_open_failure("no network");
        let result = engine.open(&EngineOptions::default()).await;
        assert!(matches!(result, Err(EngineOpenError::Failed(_))));
        assert_eq!(engine.open_count().load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scripted_engine_halt_ends_stream() {
        let mut engine = ScriptedEngine::new(vec![
            ScriptStep::Hypothesis("a".to_string()),
            ScriptStep::Halt,
        ]);
        let mut rx = engine
            .open(&EngineOptions::default())
            .await
            .expect("open should succeed");

        assert_eq!(
            rx.recv().await,
            Some(EngineSignal::Hypothesis("a".to_string()))
        );
        assert_eq!(rx.recv().await, Some(EngineSignal::Halted));
        assert_eq!(rx.recv().await, None);
        engine.close().await;
    }

    #[tokio::test]
    async fn test_scripted_engine_counts_opens_and_closes() {
        let mut engine = ScriptedEngine::new(vec![]);
        let opens = engine.open_count();
        let closes = engine.close_count();

        let _rx = engine
            .open(&EngineOptions::default())
            .await
            .expect("open should succeed");
        engine.close().await;

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
