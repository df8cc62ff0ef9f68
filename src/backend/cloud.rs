//! Cloud-hosted recognition backend.
//!
//! Wraps a hosted speech engine session with explicitly configured silence
//! timeouts. The hosted engine is expected to stay up for the whole session;
//! an unexpected halt is surfaced as a runtime failure so the session can
//! fail over.

use crate::backend::engine::{EngineOptions, EngineSignal, SpeechEngine};
use crate::backend::{BackendEvent, BackendFailure, Fragment, RecognitionBackend, map_open_error};
use crate::defaults;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

/// Configuration for the cloud backend.
#[derive(Debug, Clone)]
pub struct CloudBackendConfig {
    /// Recognition language as a BCP-47 tag.
    pub language: String,
    /// How long the engine waits for the first speech in a turn (ms).
    pub initial_silence_timeout_ms: u32,
    /// Trailing silence before the engine finalizes a phrase (ms).
    pub end_silence_timeout_ms: u32,
    /// Silence treated as a phrase segmentation boundary (ms).
    pub segmentation_silence_ms: u32,
}

impl Default for CloudBackendConfig {
    fn default() -> Self {
        Self {
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            initial_silence_timeout_ms: defaults::CLOUD_INITIAL_SILENCE_TIMEOUT_MS,
            end_silence_timeout_ms: defaults::CLOUD_END_SILENCE_TIMEOUT_MS,
            segmentation_silence_ms: defaults::CLOUD_SEGMENTATION_SILENCE_MS,
        }
    }
}

/// Cloud-hosted recognition backend over a [`SpeechEngine`].
pub struct CloudBackend<E: SpeechEngine> {
    config: CloudBackendConfig,
    engine: Option<E>,
    events: Option<mpsc::Sender<BackendEvent>>,
    stopping: Arc<AtomicBool>,
    stop_signal: Arc<Notify>,
    active: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<E: SpeechEngine> CloudBackend<E> {
    /// Creates a cloud backend around an unopened engine session.
    pub fn new(config: CloudBackendConfig, engine: E) -> Self {
        Self {
            config,
            engine: Some(engine),
            events: None,
            stopping: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(Notify::new()),
            active: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            language: self.config.language.clone(),
            initial_silence_timeout_ms: Some(self.config.initial_silence_timeout_ms),
            end_silence_timeout_ms: Some(self.config.end_silence_timeout_ms),
            segmentation_silence_ms: Some(self.config.segmentation_silence_ms),
            continuous: true,
        }
    }
}

#[async_trait]
impl<E: SpeechEngine> RecognitionBackend for CloudBackend<E> {
    fn attach(&mut self, events: mpsc::Sender<BackendEvent>) {
        self.events = Some(events);
    }

    fn detach(&mut self) {
        self.events = None;
    }

    async fn start(&mut self) {
        let Some(events) = self.events.clone() else {
            return;
        };
        let Some(mut engine) = self.engine.take() else {
            return;
        };
        // stop() may already have been issued; the engine still has to be
        // released through close(), not silently dropped.
        if self.stopping.load(Ordering::SeqCst) {
            engine.close().await;
            return;
        }

        let options = self.engine_options();
        let signals = match engine.open(&options).await {
            Ok(rx) => rx,
            Err(err) => {
                let _ = events
                    .send(BackendEvent::Error(map_open_error(err)))
                    .await;
                return;
            }
        };

        // stop() may have been issued while open() was in flight; release
        // the engine immediately instead of becoming active.
        if self.stopping.load(Ordering::SeqCst) {
            engine.close().await;
            return;
        }

        self.active.store(true, Ordering::SeqCst);
        let stopping = self.stopping.clone();
        let stop_signal = self.stop_signal.clone();
        let active = self.active.clone();
        self.worker = Some(tokio::spawn(pump(
            engine,
            signals,
            events,
            stopping,
            stop_signal,
            active,
        )));
    }

    fn stop(&mut self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        self.active.store(false, Ordering::SeqCst);
        self.stop_signal.notify_one();
        // The worker closes the engine on its way out; detach its handle.
        drop(self.worker.take());
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "cloud"
    }
}

/// Forwards engine signals to the subscriber until stop or failure.
async fn pump<E: SpeechEngine>(
    mut engine: E,
    mut signals: mpsc::Receiver<EngineSignal>,
    events: mpsc::Sender<BackendEvent>,
    stopping: Arc<AtomicBool>,
    stop_signal: Arc<Notify>,
    active: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            _ = stop_signal.notified() => break,
            sig = signals.recv() => match sig {
                Some(EngineSignal::Hypothesis(text)) => {
                    if events
                        .send(BackendEvent::Fragment(Fragment::new(text)))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Some(EngineSignal::Failed(message)) => {
                    let _ = events
                        .send(BackendEvent::Error(BackendFailure::Runtime { message }))
                        .await;
                    break;
                }
                Some(EngineSignal::Halted) | None => {
                    // A hosted engine ending the session on its own is a
                    // failure unless we asked for it.
                    if !stopping.load(Ordering::SeqCst) {
                        let _ = events
                            .send(BackendEvent::Error(BackendFailure::Runtime {
                                message: "engine halted unexpectedly".to_string(),
                            }))
                            .await;
                    }
                    break;
                }
            },
        }
    }
    engine.close().await;
    active.store(false, Ordering::SeqCst);
}
