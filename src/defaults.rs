//! Default configuration constants for kikitori.
//!
//! This module provides the named, tunable constants shared across the
//! session, accumulator, and backend configuration types. The "right" values
//! differ by language and recognition engine, so everything here is
//! overridable through [`crate::config::Config`].

/// Default silence threshold in milliseconds.
///
/// How long the session waits after the last fragment before flushing the
/// accumulated text as a finalized utterance. 1500ms allows for natural
/// pauses in speech without splitting one sentence into two utterances.
pub const SILENCE_THRESHOLD_MS: u64 = 1500;

/// Default auto-stop threshold in milliseconds.
///
/// If no fragment at all arrives for this long, the session force-stops as a
/// safety net against an indefinitely open capture (e.g. the user walked
/// away with the microphone live). Measured from the last fragment, not from
/// session start. Must be strictly greater than [`SILENCE_THRESHOLD_MS`] or
/// auto-stop could preempt a natural flush and drop the last utterance.
pub const AUTO_STOP_THRESHOLD_MS: u64 = 30_000;

/// Minimum finalized utterance length in characters.
///
/// A flush whose combined text is shorter than this emits nothing. Counted
/// in characters rather than bytes: the primary deployment language is
/// Japanese, where a meaningful utterance can be three characters long but a
/// one- or two-character flush is almost always a recognition artifact.
pub const MIN_UTTERANCE_LENGTH: usize = 3;

/// Similarity threshold for judging a fragment a refinement of the previous
/// one (0.0 to 1.0).
///
/// Applied both to the prefix-overlap check and to the shared-token ratio.
/// 0.7 is a recall/precision trade-off: streaming recognizers re-emit a
/// growing or self-corrected version of the same phrase before a pause, and
/// lower values start merging genuinely distinct utterances.
pub const DEDUP_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Minimum length in characters before the prefix-overlap check applies.
///
/// Very short strings match each other's prefixes too easily; below this
/// length only exact/containment matching is trusted.
pub const DEDUP_MIN_PREFIX_CHARS: usize = 3;

/// Minimum whitespace-delimited token count before the shared-token check
/// applies.
///
/// With two or fewer tokens the ratio is too coarse (0, 0.5, or 1.0), so
/// short strings fall back to containment matching only.
pub const DEDUP_MIN_TOKENS: usize = 2;

/// Default recognition language (BCP-47 tag) for both backends.
pub const DEFAULT_LANGUAGE: &str = "ja-JP";

/// Cloud backend: how long the engine waits for the first speech before
/// giving up on the current recognition turn, in milliseconds.
pub const CLOUD_INITIAL_SILENCE_TIMEOUT_MS: u32 = 8000;

/// Cloud backend: trailing silence before the engine finalizes the current
/// phrase, in milliseconds.
pub const CLOUD_END_SILENCE_TIMEOUT_MS: u32 = 3000;

/// Cloud backend: silence the engine treats as a segmentation boundary
/// between phrases, in milliseconds.
pub const CLOUD_SEGMENTATION_SILENCE_MS: u32 = 3000;

/// Local backend: delay before auto-restarting a halted engine, in
/// milliseconds.
///
/// On-device engines stop themselves after a recognition turn; restarting
/// immediately can race the engine's own teardown, so back off briefly.
pub const LOCAL_RESTART_DELAY_MS: u64 = 250;

/// Buffer size for the backend → session event channel.
///
/// Fragments are small and consumed immediately; this only needs to absorb
/// short bursts while the session is mid-flush.
pub const EVENT_BUFFER: usize = 32;
