//! The transcription session: one capture from `start` to `stop`.
//!
//! A session owns the backend pair, the accumulator, and both countdown
//! timers, and drives them from a single task. Because every fragment,
//! error, timer expiry, and stop request is handled in one `select!` loop,
//! the ordering guarantees fall out of the structure: a fragment and a
//! simultaneously-ready timer expiry resolve in favor of the fragment, and a
//! canceled timer can never flush, because the deadline it would have fired
//! from has already been replaced.

use crate::backend::BackendEvent;
use crate::defaults;
use crate::error::{KikitoriError, Result};
use crate::report::{LogReporter, SessionNotice, SessionReporter};
use crate::session::accumulator::{DedupConfig, UtteranceAccumulator};
use crate::session::failover::FailoverController;
use crate::session::timers::SessionTimers;
use crate::sink::{Utterance, UtteranceSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Lifecycle state of a transcription session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created but not yet started.
    #[default]
    Idle,
    /// Capturing; fragments and timers are live.
    Listening,
    /// Terminal. A stopped session is never restarted; create a new one.
    Stopped,
}

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause after the last fragment before the utterance is flushed.
    pub silence_threshold: Duration,
    /// Total silence before the session force-stops.
    pub auto_stop_threshold: Duration,
    /// Flushes with fewer characters than this emit nothing.
    pub min_utterance_length: usize,
    /// Duplicate-suppression thresholds for the accumulator.
    pub dedup: DedupConfig,
    /// Backend event channel capacity.
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            silence_threshold: Duration::from_millis(defaults::SILENCE_THRESHOLD_MS),
            auto_stop_threshold: Duration::from_millis(defaults::AUTO_STOP_THRESHOLD_MS),
            min_utterance_length: defaults::MIN_UTTERANCE_LENGTH,
            dedup: DedupConfig::default(),
            event_buffer: defaults::EVENT_BUFFER,
        }
    }
}

impl SessionConfig {
    /// Validates cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.auto_stop_threshold <= self.silence_threshold {
            return Err(KikitoriError::ConfigInvalidValue {
                key: "auto_stop_threshold".to_string(),
                message: format!(
                    "must be greater than the silence threshold ({:?})",
                    self.silence_threshold
                ),
            });
        }
        if self.min_utterance_length == 0 {
            return Err(KikitoriError::ConfigInvalidValue {
                key: "min_utterance_length".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !(self.dedup.similarity_threshold > 0.0 && self.dedup.similarity_threshold <= 1.0) {
            return Err(KikitoriError::ConfigInvalidValue {
                key: "dedup_similarity".to_string(),
                message: "must be within (0.0, 1.0]".to_string(),
            });
        }
        Ok(())
    }
}

/// A speech-capture session, from construction through its terminal stop.
pub struct TranscriptionSession {
    config: SessionConfig,
    backends: FailoverController,
    accumulator: UtteranceAccumulator,
    sink: Box<dyn UtteranceSink>,
    reporter: Arc<dyn SessionReporter>,
}

impl TranscriptionSession {
    /// Creates an idle session. Fails if the config is inconsistent.
    pub fn new(
        config: SessionConfig,
        backends: FailoverController,
        sink: Box<dyn UtteranceSink>,
    ) -> Result<Self> {
        config.validate()?;
        let accumulator = UtteranceAccumulator::with_config(config.dedup);
        Ok(Self {
            config,
            backends,
            accumulator,
            sink,
            reporter: Arc::new(LogReporter),
        })
    }

    /// Replaces the stderr reporter with a custom one.
    pub fn with_reporter(mut self, reporter: Arc<dyn SessionReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Starts capturing and returns the control handle.
    pub fn start(self) -> SessionHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let task = tokio::spawn(self.run(stop_rx, state_tx));
        SessionHandle {
            stop_tx,
            state_rx,
            task: Some(task),
        }
    }

    async fn run(mut self, mut stop_rx: watch::Receiver<bool>, state_tx: watch::Sender<SessionState>) {
        let (events_tx, mut events_rx) = mpsc::channel(self.config.event_buffer);
        self.backends.start(events_tx.clone()).await;
        let _ = state_tx.send(SessionState::Listening);

        let mut timers = SessionTimers::new(
            self.config.silence_threshold,
            self.config.auto_stop_threshold,
        );
        // The silence timer waits for the first fragment; auto-stop covers
        // the case where no speech ever arrives.
        timers.arm_auto_stop(Instant::now());

        loop {
            tokio::select! {
                // Fragment and stop handling win over a simultaneously-ready
                // timer expiry, so a fragment that races its own deadline
                // always lands before the flush decision.
                biased;

                _ = stop_rx.changed() => {
                    self.flush(&mut timers);
                    break;
                }

                event = events_rx.recv() => match event {
                    Some(BackendEvent::Fragment(fragment)) => {
                        if fragment.text.trim().is_empty() {
                            continue;
                        }
                        self.accumulator.append(&fragment.text);
                        timers.arm_silence(fragment.received_at);
                        timers.arm_auto_stop(fragment.received_at);
                    }
                    Some(BackendEvent::Error(failure)) => {
                        self.reporter.report(&SessionNotice::BackendFailed {
                            backend: self.backends.active_name().unwrap_or("backend"),
                            message: failure.to_string(),
                        });
                        match self.backends.fail_over(events_tx.clone()).await {
                            Ok(backend) => {
                                self.reporter.report(&SessionNotice::FailedOver { backend });
                                // Fragments from the dead backend describe a
                                // capture the new backend never heard. As at
                                // session start, the silence timer waits for
                                // the first fragment.
                                self.accumulator.reset();
                                timers.clear_silence();
                                timers.arm_auto_stop(Instant::now());
                            }
                            Err(KikitoriError::DoubleFailover) => {
                                self.reporter.report(&SessionNotice::DoubleFailover);
                                break;
                            }
                            Err(err) => {
                                self.reporter.report(&SessionNotice::Unavailable {
                                    message: err.to_string(),
                                });
                                break;
                            }
                        }
                    }
                    // The session holds its own sender clone, so this only
                    // happens if the runtime is tearing down around us.
                    None => break,
                },

                _ = tokio::time::sleep_until(deadline_or_far(timers.silence_deadline())),
                    if timers.silence_deadline().is_some() =>
                {
                    timers.clear_silence();
                    self.emit_if_long_enough();
                }

                _ = tokio::time::sleep_until(deadline_or_far(timers.auto_stop_deadline())),
                    if timers.auto_stop_deadline().is_some() =>
                {
                    self.flush(&mut timers);
                    self.reporter.report(&SessionNotice::AutoStopped);
                    break;
                }
            }
        }

        timers.cancel_all();
        self.backends.shutdown();
        let _ = state_tx.send(SessionState::Stopped);
    }

    /// Final flush: emit whatever qualifies, then disarm everything.
    fn flush(&mut self, timers: &mut SessionTimers) {
        self.emit_if_long_enough();
        timers.cancel_all();
    }

    /// Emits the combined text if it meets the minimum length; otherwise the
    /// fragments stay pending for the next flush.
    fn emit_if_long_enough(&mut self) {
        let combined = self.accumulator.combined_text();
        if combined.chars().count() >= self.config.min_utterance_length {
            self.sink.emit(Utterance::new(combined));
            self.accumulator.reset();
        }
    }
}

/// Sentinel deadline for a disarmed timer; the branch guard keeps the sleep
/// from ever being polled, but `select!` still evaluates the expression.
fn deadline_or_far(deadline: Option<Instant>) -> Instant {
    deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400))
}

/// Control handle for a running session.
pub struct SessionHandle {
    stop_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<SessionState>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// True once the session has reached its terminal state.
    pub fn is_finished(&self) -> bool {
        self.state() == SessionState::Stopped
    }

    /// Waits until the session reaches [`SessionState::Stopped`], whether by
    /// explicit stop, auto-stop, or a fatal backend failure.
    pub async fn wait(&mut self) {
        while *self.state_rx.borrow_and_update() != SessionState::Stopped {
            if self.state_rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Stops the session: flushes pending text, releases the backend, and
    /// waits for the session task to finish. Idempotent.
    pub async fn stop(&mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::engine::ScriptedEngine;
    use crate::backend::{CloudBackend, CloudBackendConfig, RecognitionBackend};
    use crate::report::CollectingReporter;
    use crate::sink::CollectorSink;

    fn session_over(
        engine: ScriptedEngine,
        config: SessionConfig,
        sink: CollectorSink,
    ) -> TranscriptionSession {
        let backend: Box<dyn RecognitionBackend> =
            Box::new(CloudBackend::new(CloudBackendConfig::default(), engine));
        let backends = FailoverController::new(backend, None);
        TranscriptionSession::new(config, backends, Box::new(sink)).expect("valid config")
    }

    fn quick_config() -> SessionConfig {
        SessionConfig {
            silence_threshold: Duration::from_millis(200),
            auto_stop_threshold: Duration::from_secs(5),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_config_rejects_auto_stop_not_exceeding_silence() {
        let config = SessionConfig {
            silence_threshold: Duration::from_secs(2),
            auto_stop_threshold: Duration::from_secs(2),
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(KikitoriError::ConfigInvalidValue { .. })
        ));
    }

    #[test]
    fn test_config_rejects_out_of_range_similarity() {
        let mut config = SessionConfig::default();
        config.dedup.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
        config.dedup.similarity_threshold = 0.0;
        assert!(config.validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_pause_flushes_one_utterance() {
        let sink = CollectorSink::new();
        let engine = ScriptedEngine::hypotheses(
            ["ブレーキ", "ブレーキが効かない"],
            Duration::from_millis(50),
        );
        let mut handle = session_over(engine, quick_config(), sink.clone()).start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sink.texts(), vec!["ブレーキが効かない"]);
        assert_eq!(handle.state(), SessionState::Listening);

        handle.stop().await;
        assert_eq!(handle.state(), SessionState::Stopped);
        // Already flushed; stop must not re-emit.
        assert_eq!(sink.texts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_stop_fires_on_total_silence() {
        let sink = CollectorSink::new();
        let reporter = CollectingReporter::new();
        let engine = ScriptedEngine::new(vec![]);
        let session = session_over(engine, quick_config(), sink.clone())
            .with_reporter(Arc::new(reporter.clone()));
        let mut handle = session.start();

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(handle.state(), SessionState::Stopped);
        assert!(sink.texts().is_empty());
        assert!(reporter.notices().contains(&SessionNotice::AutoStopped));

        // Stopping an already-stopped session is a no-op.
        handle.stop().await;
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_below_minimum_flush_emits_nothing() {
        let sink = CollectorSink::new();
        let engine = ScriptedEngine::hypotheses(["あ"], Duration::from_millis(10));
        let mut handle = session_over(engine, quick_config(), sink.clone()).start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(sink.texts().is_empty());
        handle.stop().await;
        assert!(sink.texts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_flushes_pending_text() {
        let sink = CollectorSink::new();
        let config = SessionConfig {
            silence_threshold: Duration::from_secs(60),
            auto_stop_threshold: Duration::from_secs(120),
            ..SessionConfig::default()
        };
        let engine = ScriptedEngine::hypotheses(["エンジンがかからない"], Duration::from_millis(10));
        let mut handle = session_over(engine, config, sink.clone()).start();

        // Silence timer is far away; stop() performs the flush.
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop().await;
        assert_eq!(sink.texts(), vec!["エンジンがかからない"]);
    }
}
