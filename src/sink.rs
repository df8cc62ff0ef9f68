//! Utterance output handlers.
//!
//! The session hands each finalized utterance to a [`UtteranceSink`] exactly
//! once per flush and never retains it; what happens downstream (sending the
//! chat message, rendering) is the sink's business.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// A finalized, deduplicated utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Combined, deduplicated text.
    pub text: String,
}

impl Utterance {
    /// Creates an utterance from finalized text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Pluggable utterance output handler. Pairs with the backend event stream
/// for input — this handles the finalized end of the pipeline.
pub trait UtteranceSink: Send + 'static {
    /// Handles one finalized utterance. Called exactly once per flush.
    fn emit(&mut self, utterance: Utterance);

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Prints utterances to stdout. Useful for the CLI harness.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl UtteranceSink for StdoutSink {
    fn emit(&mut self, utterance: Utterance) {
        println!("{}", utterance.text);
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

/// Forwards utterances over a channel — the production hand-off into a chat
/// pipeline running elsewhere.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Utterance>,
}

impl ChannelSink {
    /// Creates the sink and the receiving end for the chat pipeline.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Utterance>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl UtteranceSink for ChannelSink {
    fn emit(&mut self, utterance: Utterance) {
        // Receiver gone means the chat pipeline shut down first; the
        // utterance has nowhere to go.
        let _ = self.tx.send(utterance);
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

/// Collects utterances in memory, with timestamps. Test sink.
#[derive(Debug, Clone, Default)]
pub struct CollectorSink {
    collected: Arc<Mutex<Vec<(Utterance, Instant)>>>,
}

impl CollectorSink {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the collected utterances.
    pub fn collected(&self) -> Arc<Mutex<Vec<(Utterance, Instant)>>> {
        self.collected.clone()
    }

    /// Snapshot of the collected texts.
    pub fn texts(&self) -> Vec<String> {
        self.collected
            .lock()
            .map(|guard| guard.iter().map(|(u, _)| u.text.clone()).collect())
            .unwrap_or_default()
    }
}

impl UtteranceSink for CollectorSink {
    fn emit(&mut self, utterance: Utterance) {
        if let Ok(mut guard) = self.collected.lock() {
            guard.push((utterance, Instant::now()));
        }
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}
