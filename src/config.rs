//! TOML configuration with environment overrides.
//!
//! Every field has a default, so an absent file or an empty table is valid.
//! Precedence, lowest to highest: built-in defaults, the config file,
//! `KIKITORI_*` environment variables, CLI flags (applied by the binary).

use crate::backend::{BackendPreference, CloudBackendConfig, LocalBackendConfig};
use crate::defaults;
use crate::error::{KikitoriError, Result};
use crate::session::{DedupConfig, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub session: SessionTuning,
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub cloud: CloudTuning,
}

/// `[session]` table: segmentation behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionTuning {
    /// Pause after the last fragment before flushing, in milliseconds.
    #[serde(default = "default_silence_ms")]
    pub silence_threshold_ms: u64,
    /// Total silence before the session force-stops, in milliseconds.
    #[serde(default = "default_auto_stop_ms")]
    pub auto_stop_threshold_ms: u64,
    /// Minimum finalized utterance length in characters.
    #[serde(default = "default_min_length")]
    pub min_utterance_length: usize,
    /// Similarity ratio for duplicate suppression, in (0.0, 1.0].
    #[serde(default = "default_similarity")]
    pub dedup_similarity: f64,
}

/// `[backend]` table: which recognition backend to use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendSection {
    /// Backend preference; `auto` probes the platform.
    #[serde(default)]
    pub prefer: BackendPreference,
    /// Recognition language as a BCP-47 tag.
    #[serde(default = "default_language")]
    pub language: String,
}

/// `[cloud]` table: hosted-engine silence timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloudTuning {
    /// Wait for the first speech in a turn, in milliseconds.
    #[serde(default = "default_cloud_initial")]
    pub initial_silence_timeout_ms: u32,
    /// Trailing silence before a phrase is finalized, in milliseconds.
    #[serde(default = "default_cloud_end")]
    pub end_silence_timeout_ms: u32,
    /// Phrase segmentation boundary, in milliseconds.
    #[serde(default = "default_cloud_segmentation")]
    pub segmentation_silence_ms: u32,
}

fn default_silence_ms() -> u64 {
    defaults::SILENCE_THRESHOLD_MS
}

fn default_auto_stop_ms() -> u64 {
    defaults::AUTO_STOP_THRESHOLD_MS
}

fn default_min_length() -> usize {
    defaults::MIN_UTTERANCE_LENGTH
}

fn default_similarity() -> f64 {
    defaults::DEDUP_SIMILARITY_THRESHOLD
}

fn default_language() -> String {
    defaults::DEFAULT_LANGUAGE.to_string()
}

fn default_cloud_initial() -> u32 {
    defaults::CLOUD_INITIAL_SILENCE_TIMEOUT_MS
}

fn default_cloud_end() -> u32 {
    defaults::CLOUD_END_SILENCE_TIMEOUT_MS
}

fn default_cloud_segmentation() -> u32 {
    defaults::CLOUD_SEGMENTATION_SILENCE_MS
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            silence_threshold_ms: default_silence_ms(),
            auto_stop_threshold_ms: default_auto_stop_ms(),
            min_utterance_length: default_min_length(),
            dedup_similarity: default_similarity(),
        }
    }
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            prefer: BackendPreference::default(),
            language: default_language(),
        }
    }
}

impl Default for CloudTuning {
    fn default() -> Self {
        Self {
            initial_silence_timeout_ms: default_cloud_initial(),
            end_silence_timeout_ms: default_cloud_end(),
            segmentation_silence_ms: default_cloud_segmentation(),
        }
    }
}

impl Config {
    /// Loads and parses a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file, falling back to defaults if it does not exist.
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Applies `KIKITORI_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(language) = std::env::var("KIKITORI_LANGUAGE") {
            self.backend.language = language;
        }
        if let Ok(prefer) = std::env::var("KIKITORI_BACKEND") {
            self.backend.prefer = match prefer.to_lowercase().as_str() {
                "auto" => BackendPreference::Auto,
                "cloud" => BackendPreference::Cloud,
                "local" => BackendPreference::Local,
                other => {
                    return Err(KikitoriError::ConfigInvalidValue {
                        key: "KIKITORI_BACKEND".to_string(),
                        message: format!("unknown backend '{}'", other),
                    });
                }
            };
        }
        if let Ok(ms) = std::env::var("KIKITORI_SILENCE_MS") {
            self.session.silence_threshold_ms = parse_ms("KIKITORI_SILENCE_MS", &ms)?;
        }
        if let Ok(ms) = std::env::var("KIKITORI_AUTO_STOP_MS") {
            self.session.auto_stop_threshold_ms = parse_ms("KIKITORI_AUTO_STOP_MS", &ms)?;
        }
        self.validate()
    }

    /// Validates the assembled configuration.
    pub fn validate(&self) -> Result<()> {
        self.session_config().validate()
    }

    /// Builds the session tunables.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            silence_threshold: Duration::from_millis(self.session.silence_threshold_ms),
            auto_stop_threshold: Duration::from_millis(self.session.auto_stop_threshold_ms),
            min_utterance_length: self.session.min_utterance_length,
            dedup: DedupConfig {
                similarity_threshold: self.session.dedup_similarity,
                ..DedupConfig::default()
            },
            ..SessionConfig::default()
        }
    }

    /// Builds the cloud backend configuration.
    pub fn cloud_config(&self) -> CloudBackendConfig {
        CloudBackendConfig {
            language: self.backend.language.clone(),
            initial_silence_timeout_ms: self.cloud.initial_silence_timeout_ms,
            end_silence_timeout_ms: self.cloud.end_silence_timeout_ms,
            segmentation_silence_ms: self.cloud.segmentation_silence_ms,
        }
    }

    /// Builds the local backend configuration.
    pub fn local_config(&self) -> LocalBackendConfig {
        LocalBackendConfig {
            language: self.backend.language.clone(),
            ..LocalBackendConfig::default()
        }
    }
}

fn parse_ms(key: &str, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|_| KikitoriError::ConfigInvalidValue {
            key: key.to_string(),
            message: format!("expected milliseconds as an integer, got '{}'", value),
        })
}
