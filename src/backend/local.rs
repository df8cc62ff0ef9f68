//! Local/on-device recognition backend.
//!
//! On-device engines run in continuous mode but still halt themselves after
//! a recognition turn or an idle period. This backend restarts the engine
//! after such a halt so capture keeps going — and suppresses the restart
//! permanently once `stop()` has been called, otherwise the engine would be
//! re-acquired forever and leak.

use crate::backend::engine::{EngineOptions, EngineSignal, SpeechEngine};
use crate::backend::{BackendEvent, BackendFailure, Fragment, RecognitionBackend, map_open_error};
use crate::defaults;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

/// Configuration for the local backend.
#[derive(Debug, Clone)]
pub struct LocalBackendConfig {
    /// Recognition language as a BCP-47 tag.
    pub language: String,
    /// Restart the engine after an unexpected halt.
    pub auto_restart: bool,
    /// Delay before each auto-restart.
    pub restart_delay: Duration,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            auto_restart: true,
            restart_delay: Duration::from_millis(defaults::LOCAL_RESTART_DELAY_MS),
        }
    }
}

/// Local/on-device recognition backend over a [`SpeechEngine`].
pub struct LocalBackend<E: SpeechEngine> {
    config: LocalBackendConfig,
    engine: Option<E>,
    events: Option<mpsc::Sender<BackendEvent>>,
    stopping: Arc<AtomicBool>,
    stop_signal: Arc<Notify>,
    active: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<E: SpeechEngine> LocalBackend<E> {
    /// Creates a local backend around an unopened engine session.
    pub fn new(config: LocalBackendConfig, engine: E) -> Self {
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
            initial_silence_timeout_ms: None,
            end_silence_timeout_ms: None,
            segmentation_silence_ms: None,
            continuous: true,
        }
    }
}

#[async_trait]
impl<E: SpeechEngine> RecognitionBackend for LocalBackend<E> {
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
        let auto_restart = self.config.auto_restart;
        let restart_delay = self.config.restart_delay;
        self.worker = Some(tokio::spawn(pump(
            engine,
            signals,
            options,
            events,
            stopping,
            stop_signal,
            active,
            auto_restart,
            restart_delay,
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
        "local"
    }
}

/// Forwards engine signals, restarting the engine after unexpected halts
/// until stop or a hard failure.
#[allow(clippy::too_many_arguments)]
async fn pump<E: SpeechEngine>(
    mut engine: E,
    mut signals: mpsc::Receiver<EngineSignal>,
    options: EngineOptions,
    events: mpsc::Sender<BackendEvent>,
    stopping: Arc<AtomicBool>,
    stop_signal: Arc<Notify>,
    active: Arc<AtomicBool>,
    auto_restart: bool,
    restart_delay: Duration,
) {
    'session: loop {
        // One engine turn: forward hypotheses until the engine halts.
        'turn: loop {
            tokio::select! {
                _ = stop_signal.notified() => break 'session,
                sig = signals.recv() => match sig {
                    Some(EngineSignal::Hypothesis(text)) => {
                        if events
                            .send(BackendEvent::Fragment(Fragment::new(text)))
                            .await
                            .is_err()
                        {
                            break 'session;
                        }
                    }
                    Some(EngineSignal::Failed(message)) => {
                        let _ = events
                            .send(BackendEvent::Error(BackendFailure::Runtime { message }))
                            .await;
                        break 'session;
                    }
                    Some(EngineSignal::Halted) | None => break 'turn,
                },
            }
        }

        if !auto_restart || stopping.load(Ordering::SeqCst) {
            break;
        }

        // Let the engine finish its own teardown before re-acquiring it,
        // and stay responsive to stop() while waiting.
        tokio::select! {
            _ = stop_signal.notified() => break,
            _ = tokio::time::sleep(restart_delay) => {}
        }
        if stopping.load(Ordering::SeqCst) {
            break;
        }

        match engine.open(&options).await {
            Ok(rx) => signals = rx,
            Err(err) => {
                let _ = events
                    .send(BackendEvent::Error(map_open_error(err)))
                    .await;
                break;
            }
        }
        if stopping.load(Ordering::SeqCst) {
            break;
        }
    }

    engine.close().await;
    active.store(false, Ordering::SeqCst);
}
