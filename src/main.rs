use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use kikitori::backend::{BackendKind, BackendPreference, RecognitionBackend, plan_backends};
use kikitori::cli::Cli;
use kikitori::config::Config;
use kikitori::{
    CloudBackend, EngineOpenError, EngineOptions, EngineSignal, FailoverController, LocalBackend,
    LocalBackendConfig, SessionNotice, SessionReporter, SpeechEngine, StdoutSink,
    TranscriptionSession, Utterance, UtteranceSink,
};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Engine that replays hypotheses from stdin, one per line.
///
/// Stands in for a microphone-backed recognizer so segmentation behavior can
/// be exercised from a terminal or a piped transcript. EOF is treated as
/// ongoing silence; the session's own timers flush the tail and auto-stop.
struct ReplayEngine {
    reader: Option<JoinHandle<()>>,
}

impl ReplayEngine {
    fn new() -> Self {
        Self { reader: None }
    }
}

#[async_trait]
impl SpeechEngine for ReplayEngine {
    async fn open(
        &mut self,
        _options: &EngineOptions,
    ) -> std::result::Result<mpsc::Receiver<EngineSignal>, EngineOpenError> {
        let (tx, rx) = mpsc::channel(16);
        self.reader = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(EngineSignal::Hypothesis(line)).await.is_err() {
                    return;
                }
            }
            // Keep the signal channel open so EOF reads as silence rather
            // than an engine halt; close() aborts this task.
            std::future::pending::<()>().await;
        }));
        Ok(rx)
    }

    async fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}

/// Prints utterances with a highlight so they stand out from notices.
struct ColorSink;

impl UtteranceSink for ColorSink {
    fn emit(&mut self, utterance: Utterance) {
        println!("{}", utterance.text.green().bold());
    }

    fn name(&self) -> &'static str {
        "color"
    }
}

/// Stderr reporter with colored severity.
struct CliReporter {
    quiet: bool,
}

impl SessionReporter for CliReporter {
    fn report(&self, notice: &SessionNotice) {
        if self.quiet {
            return;
        }
        match notice {
            SessionNotice::FailedOver { .. } | SessionNotice::AutoStopped => {
                eprintln!("{} {}", "note:".yellow(), notice);
            }
            _ => eprintln!("{} {}", "error:".red().bold(), notice),
        }
    }
}

fn config_path(cli: &Cli) -> Option<PathBuf> {
    cli.config
        .clone()
        .or_else(|| dirs::config_dir().map(|dir| dir.join("kikitori").join("config.toml")))
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match config_path(cli) {
        Some(path) => Config::load_or_default(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env_overrides()?;

    if let Some(ms) = cli.silence {
        config.session.silence_threshold_ms = ms;
    }
    if let Some(ms) = cli.auto_stop {
        config.session.auto_stop_threshold_ms = ms;
    }
    if let Some(chars) = cli.min_length {
        config.session.min_utterance_length = chars;
    }
    if let Some(ratio) = cli.similarity {
        config.session.dedup_similarity = ratio;
    }
    if let Some(language) = &cli.language {
        config.backend.language = language.clone();
    }
    if let Some(backend) = &cli.backend {
        config.backend.prefer = match backend.to_lowercase().as_str() {
            "auto" => BackendPreference::Auto,
            "cloud" => BackendPreference::Cloud,
            "local" => BackendPreference::Local,
            other => anyhow::bail!("unknown backend '{}'", other),
        };
    }
    config.validate()?;
    Ok(config)
}

/// Wraps the replay engine in the backend variant the plan's primary names.
/// Stdin can only be consumed once, so no fallback is configured.
fn replay_backend(config: &Config) -> Box<dyn RecognitionBackend> {
    let plan = plan_backends(config.backend.prefer);
    match plan.primary {
        BackendKind::Cloud => Box::new(CloudBackend::new(
            config.cloud_config(),
            ReplayEngine::new(),
        )),
        BackendKind::Local => Box::new(LocalBackend::new(
            LocalBackendConfig {
                // A replayed stdin cannot be reopened after EOF.
                auto_restart: false,
                ..config.local_config()
            },
            ReplayEngine::new(),
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let backends = FailoverController::new(replay_backend(&config), None);
    let sink: Box<dyn UtteranceSink> = if cli.quiet {
        Box::new(StdoutSink)
    } else {
        Box::new(ColorSink)
    };
    let session = TranscriptionSession::new(config.session_config(), backends, sink)?
        .with_reporter(Arc::new(CliReporter { quiet: cli.quiet }));

    let mut handle = session.start();
    tokio::select! {
        _ = handle.wait() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    handle.stop().await;

    Ok(())
}
