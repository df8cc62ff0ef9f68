//! Utterance accumulator with fuzzy duplicate suppression.
//!
//! Streaming recognizers repeatedly re-emit a growing or self-corrected
//! version of the same phrase before a natural pause; naive concatenation
//! would duplicate nearly the whole utterance on every callback. The
//! accumulator keeps an ordered list of accepted fragments and, for each
//! candidate, decides whether it refines the previous fragment (replace) or
//! starts a distinct one (append).

use crate::defaults;

/// Configuration for the duplicate-suppression checks.
#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    /// Ratio used by both the prefix-overlap and shared-token checks.
    pub similarity_threshold: f64,
    /// Prefix check only applies to strings longer than this (chars).
    pub min_prefix_chars: usize,
    /// Token check only applies when both sides have more tokens than this.
    pub min_tokens: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: defaults::DEDUP_SIMILARITY_THRESHOLD,
            min_prefix_chars: defaults::DEDUP_MIN_PREFIX_CHARS,
            min_tokens: defaults::DEDUP_MIN_TOKENS,
        }
    }
}

impl DedupConfig {
    /// Judges whether `candidate` is a refinement of `previous` — the same
    /// utterance re-emitted in a longer or corrected form.
    ///
    /// Checks in order:
    /// 1. case-insensitive exact match or substring containment;
    /// 2. prefix overlap of at least `similarity_threshold` of the shorter
    ///    string's length (strings longer than `min_prefix_chars` only);
    /// 3. shared-token ratio of at least `similarity_threshold` (both sides
    ///    need more than `min_tokens` whitespace-delimited tokens).
    ///
    /// Comparisons are character-based, not byte-based: the deployment
    /// language is Japanese.
    pub fn is_refinement(&self, previous: &str, candidate: &str) -> bool {
        let prev = previous.trim().to_lowercase();
        let cand = candidate.trim().to_lowercase();
        if prev.is_empty() || cand.is_empty() {
            return false;
        }

        // Exact match or containment: one side already carries the other.
        if prev == cand || prev.contains(&cand) || cand.contains(&prev) {
            return true;
        }

        // Prefix overlap: the shorter string's head matches the other's.
        let prev_chars: Vec<char> = prev.chars().collect();
        let cand_chars: Vec<char> = cand.chars().collect();
        let min_len = prev_chars.len().min(cand_chars.len());
        if min_len > self.min_prefix_chars {
            let overlap = (min_len as f64 * self.similarity_threshold).floor() as usize;
            if overlap > 0 && prev_chars[..overlap] == cand_chars[..overlap] {
                return true;
            }
        }

        // Shared tokens: mostly the same words in either order.
        let prev_tokens: Vec<&str> = prev.split_whitespace().collect();
        let cand_tokens: Vec<&str> = cand.split_whitespace().collect();
        if prev_tokens.len() > self.min_tokens && cand_tokens.len() > self.min_tokens {
            let common = prev_tokens
                .iter()
                .filter(|token| cand_tokens.contains(token))
                .count();
            let ratio = common as f64 / prev_tokens.len().max(cand_tokens.len()) as f64;
            if ratio >= self.similarity_threshold {
                return true;
            }
        }

        false
    }
}

/// Collects and deduplicates fragments into one pending utterance.
#[derive(Debug, Clone, Default)]
pub struct UtteranceAccumulator {
    dedup: DedupConfig,
    fragments: Vec<String>,
}

impl UtteranceAccumulator {
    /// Creates an accumulator with the default dedup thresholds.
    pub fn new() -> Self {
        Self::with_config(DedupConfig::default())
    }

    /// Creates an accumulator with custom dedup thresholds.
    pub fn with_config(dedup: DedupConfig) -> Self {
        Self {
            dedup,
            fragments: Vec::new(),
        }
    }

    /// Accepts a candidate fragment.
    ///
    /// A candidate judged a refinement of the last accepted fragment
    /// replaces it; anything else is appended in arrival order.
    /// Whitespace-only candidates are ignored.
    pub fn append(&mut self, candidate: &str) {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            return;
        }

        match self.fragments.last() {
            Some(last) if self.dedup.is_refinement(last, trimmed) => {
                // Same utterance, newer rendition: keep only the latest.
                let last_index = self.fragments.len() - 1;
                self.fragments[last_index] = trimmed.to_string();
            }
            _ => self.fragments.push(trimmed.to_string()),
        }
    }

    /// Returns the fragments joined with single spaces, trimmed.
    pub fn combined_text(&self) -> String {
        self.fragments.join(" ").trim().to_string()
    }

    /// Clears all fragments. Called on flush and on failover.
    pub fn reset(&mut self) {
        self.fragments.clear();
    }

    /// Number of accepted fragments.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// True when no fragments are pending.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}
