//! Command-line interface for kikitori
//!
//! Provides argument parsing using clap derive macros.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Real-time speech capture and utterance segmentation
#[derive(Parser, Debug)]
#[command(
    name = "kikitori",
    version,
    about = "Segment streaming speech hypotheses into finalized utterances"
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress session notices (quiet mode)
    #[arg(short, long)]
    pub quiet: bool,

    /// Silence before a flush (default: 1500ms). Examples: 1500ms, 2s
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_ms)]
    pub silence: Option<u64>,

    /// Total silence before auto-stop (default: 30s). Examples: 30s, 1m
    #[arg(long = "auto-stop", value_name = "DURATION", value_parser = parse_duration_ms)]
    pub auto_stop: Option<u64>,

    /// Minimum finalized utterance length in characters
    #[arg(long = "min-length", value_name = "CHARS")]
    pub min_length: Option<usize>,

    /// Duplicate-suppression similarity ratio, in (0.0, 1.0]
    #[arg(long, value_name = "RATIO")]
    pub similarity: Option<f64>,

    /// Recognition language (BCP-47 tag, e.g. ja-JP)
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Backend preference (auto, cloud, local)
    #[arg(long, value_name = "BACKEND")]
    pub backend: Option<String>,
}

/// Parse a duration string into milliseconds.
///
/// Supports any duration format accepted by `humantime`: bare numbers
/// (milliseconds), single-unit (`1500ms`, `2s`), and compound (`1m30s`).
fn parse_duration_ms(s: &str) -> Result<u64, String> {
    let s = s.trim();
    // Bare number → milliseconds
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(ms);
    }
    humantime::parse_duration(s)
        .map(|d| Duration::as_millis(&d) as u64)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_bare_number_is_ms() {
        assert_eq!(parse_duration_ms("1500"), Ok(1500));
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration_ms("2s"), Ok(2000));
        assert_eq!(parse_duration_ms("1m30s"), Ok(90_000));
        assert_eq!(parse_duration_ms("250ms"), Ok(250));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration_ms("soon").is_err());
    }

    #[test]
    fn test_cli_parses_overrides() {
        let cli = Cli::parse_from([
            "kikitori",
            "--silence",
            "2s",
            "--min-length",
            "5",
            "--language",
            "ja-JP",
        ]);
        assert_eq!(cli.silence, Some(2000));
        assert_eq!(cli.min_length, Some(5));
        assert_eq!(cli.language.as_deref(), Some("ja-JP"));
    }
}
