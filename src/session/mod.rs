//! Session layer: accumulation, timers, failover, and the state machine.

pub mod accumulator;
pub mod failover;
pub mod timers;
pub mod transcription;

pub use accumulator::{DedupConfig, UtteranceAccumulator};
pub use failover::FailoverController;
pub use timers::SessionTimers;
pub use transcription::{SessionConfig, SessionHandle, SessionState, TranscriptionSession};
