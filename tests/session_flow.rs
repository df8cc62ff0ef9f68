//! Integration tests for the full capture pipeline: scripted engine through
//! backend, failover, accumulation, timers, and sink.

use kikitori::backend::{
    CloudBackend, CloudBackendConfig, LocalBackend, LocalBackendConfig, RecognitionBackend,
    ScriptStep, ScriptedEngine,
};
use kikitori::{
    CollectingReporter, CollectorSink, FailoverController, SessionConfig, SessionNotice,
    SessionState, TranscriptionSession,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn cloud(engine: ScriptedEngine) -> Box<dyn RecognitionBackend> {
    Box::new(CloudBackend::new(CloudBackendConfig::default(), engine))
}

fn local(engine: ScriptedEngine) -> Box<dyn RecognitionBackend> {
    Box::new(LocalBackend::new(LocalBackendConfig::default(), engine))
}

fn config() -> SessionConfig {
    SessionConfig {
        silence_threshold: Duration::from_millis(500),
        auto_stop_threshold: Duration::from_secs(10),
        ..SessionConfig::default()
    }
}

struct Harness {
    sink: CollectorSink,
    reporter: CollectingReporter,
    handle: kikitori::SessionHandle,
}

fn start_session(
    primary: Box<dyn RecognitionBackend>,
    fallback: Option<Box<dyn RecognitionBackend>>,
    config: SessionConfig,
) -> Harness {
    let sink = CollectorSink::new();
    let reporter = CollectingReporter::new();
    let session = TranscriptionSession::new(
        config,
        FailoverController::new(primary, fallback),
        Box::new(sink.clone()),
    )
    .expect("valid config")
    .with_reporter(Arc::new(reporter.clone()));
    Harness {
        sink,
        reporter,
        handle: session.start(),
    }
}

#[tokio::test(start_paused = true)]
async fn growing_hypotheses_collapse_to_one_utterance() {
    // The canonical streaming pattern: the recognizer re-emits the same
    // phrase longer each time, then pauses.
    let engine = ScriptedEngine::hypotheses(
        ["ブレーキ", "ブレーキが", "ブレーキが効かない"],
        Duration::from_millis(100),
    );
    let mut h = start_session(cloud(engine), None, config());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.sink.texts(), vec!["ブレーキが効かない"]);
    h.handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn distinct_fragments_join_with_spaces() {
    let engine = ScriptedEngine::hypotheses(["エンジン", "冷却水"], Duration::from_millis(100));
    let mut h = start_session(cloud(engine), None, config());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.sink.texts(), vec!["エンジン 冷却水"]);
    h.handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn pauses_split_speech_into_separate_utterances() {
    // Two phrases separated by a pause longer than the silence threshold
    // must arrive as two utterances.
    let engine = ScriptedEngine::new(vec![
        ScriptStep::Wait(Duration::from_millis(100)),
        ScriptStep::Hypothesis("ブレーキが効かない".to_string()),
        ScriptStep::Wait(Duration::from_secs(1)),
        ScriptStep::Hypothesis("エンジンがかからない".to_string()),
    ]);
    let mut h = start_session(cloud(engine), None, config());

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(
        h.sink.texts(),
        vec!["ブレーキが効かない", "エンジンがかからない"]
    );
    h.handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn below_minimum_flush_holds_fragments_for_the_next_one() {
    // "あ" alone is under the minimum; after the next fragment arrives the
    // combined text qualifies and both are emitted together.
    let engine = ScriptedEngine::new(vec![
        ScriptStep::Wait(Duration::from_millis(100)),
        ScriptStep::Hypothesis("あ".to_string()),
        ScriptStep::Wait(Duration::from_secs(1)),
        ScriptStep::Hypothesis("ブレーキ".to_string()),
    ]);
    let mut h = start_session(cloud(engine), None, config());

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(h.sink.texts(), vec!["あ ブレーキ"]);
    h.handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn auto_stop_ends_a_silent_session() {
    let engine = ScriptedEngine::new(vec![]);
    let mut h = start_session(cloud(engine), None, config());

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(h.handle.state(), SessionState::Stopped);
    assert!(h.sink.texts().is_empty());
    assert_eq!(
        h.reporter
            .notices()
            .iter()
            .filter(|n| **n == SessionNotice::AutoStopped)
            .count(),
        1
    );
    h.handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_primary_hands_off_to_fallback_once() {
    let primary = ScriptedEngine::new(vec![]).with_open_failure("quota exceeded");
    let fallback = ScriptedEngine::hypotheses(["冷却水が漏れている"], Duration::from_millis(100));
    let mut h = start_session(cloud(primary), Some(local(fallback)), config());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.sink.texts(), vec!["冷却水が漏れている"]);

    let notices = h.reporter.notices();
    assert_eq!(
        notices
            .iter()
            .filter(|n| matches!(n, SessionNotice::FailedOver { backend: "local" }))
            .count(),
        1
    );
    h.handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn silent_fallback_waits_for_speech_until_auto_stop() {
    // After a failover the accumulator is empty, so as at session start only
    // the auto-stop countdown runs; a fallback that never hears anything
    // produces no utterances and the session ends by auto-stop alone.
    let primary = ScriptedEngine::new(vec![]).with_open_failure("down");
    let fallback = ScriptedEngine::new(vec![]);
    let mut h = start_session(cloud(primary), Some(local(fallback)), config());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.handle.state(), SessionState::Listening);
    assert!(h.sink.texts().is_empty());

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(h.handle.state(), SessionState::Stopped);
    assert!(h.sink.texts().is_empty());
    assert_eq!(
        h.reporter
            .notices()
            .iter()
            .filter(|n| **n == SessionNotice::AutoStopped)
            .count(),
        1
    );
    h.handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn fragments_from_the_dead_backend_are_discarded() {
    // The primary hears something, then dies mid-session; what it heard
    // describes a capture the fallback never saw and must not leak into the
    // fallback's first utterance.
    let primary = ScriptedEngine::new(vec![
        ScriptStep::Wait(Duration::from_millis(100)),
        ScriptStep::Hypothesis("ブレーキ".to_string()),
        ScriptStep::Wait(Duration::from_millis(100)),
        ScriptStep::Fail("connection reset".to_string()),
    ]);
    let fallback = ScriptedEngine::hypotheses(["エンジン音がする"], Duration::from_millis(100));
    let mut h = start_session(cloud(primary), Some(local(fallback)), config());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(h.sink.texts(), vec!["エンジン音がする"]);
    h.handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn second_backend_failure_is_fatal() {
    let primary = ScriptedEngine::new(vec![]).with_open_failure("down");
    let fallback = ScriptedEngine::new(vec![]).with_open_failure("also down");
    let mut h = start_session(cloud(primary), Some(local(fallback)), config());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.handle.state(), SessionState::Stopped);
    assert!(h.sink.texts().is_empty());

    let notices = h.reporter.notices();
    assert_eq!(
        notices
            .iter()
            .filter(|n| **n == SessionNotice::DoubleFailover)
            .count(),
        1
    );
    h.handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failure_with_no_fallback_is_fatal() {
    let primary = ScriptedEngine::new(vec![]).with_unavailable("no speech api");
    let mut h = start_session(local(primary), None, config());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.handle.state(), SessionState::Stopped);
    assert!(
        h.reporter
            .notices()
            .iter()
            .any(|n| matches!(n, SessionNotice::Unavailable { .. }))
    );
    h.handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_releases_the_engine_once() {
    let engine = ScriptedEngine::hypotheses(["テスト"], Duration::from_millis(100));
    let closes = engine.close_count();
    let mut h = start_session(cloud(engine), None, config());

    tokio::time::sleep(Duration::from_millis(200)).await;
    h.handle.stop().await;
    h.handle.stop().await;
    h.handle.stop().await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(h.handle.state(), SessionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn stop_flushes_the_pending_utterance() {
    let engine = ScriptedEngine::hypotheses(["エンジンがかからない"], Duration::from_millis(100));
    let slow = SessionConfig {
        silence_threshold: Duration::from_secs(60),
        auto_stop_threshold: Duration::from_secs(120),
        ..SessionConfig::default()
    };
    let mut h = start_session(cloud(engine), None, slow);

    tokio::time::sleep(Duration::from_millis(300)).await;
    h.handle.stop().await;
    assert_eq!(h.sink.texts(), vec!["エンジンがかからない"]);
}

#[tokio::test(start_paused = true)]
async fn local_backend_survives_engine_turn_boundaries() {
    // On-device engines halt after each recognition turn; auto-restart must
    // keep the session listening across the boundary. Each reopen replays
    // the script, so the same phrase arrives once per turn.
    let engine = ScriptedEngine::new(vec![
        ScriptStep::Wait(Duration::from_millis(100)),
        ScriptStep::Hypothesis("ブレーキが効かない".to_string()),
        ScriptStep::Wait(Duration::from_secs(1)),
        ScriptStep::Halt,
    ]);
    let opens = engine.open_count();
    let mut h = start_session(local(engine), None, config());

    tokio::time::sleep(Duration::from_secs(3)).await;
    let texts = h.sink.texts();
    assert!(texts.len() >= 2, "expected one utterance per engine turn");
    assert!(texts.iter().all(|t| t == "ブレーキが効かない"));
    assert!(opens.load(Ordering::SeqCst) >= 2);
    h.handle.stop().await;
}
