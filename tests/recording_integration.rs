//! Integration tests for capture and replay.
//!
//! These tests launch real Chrome instances in headless mode against the
//! pages under `tests/fixtures/`.
//!
//! Run with: cargo test --test recording_integration -- --ignored --test-threads=1

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

use extranet_recorder::browser::{ChromeLauncher, ControlledSession, ElementHandle, Lookup, SessionLauncher};
use extranet_recorder::config::Config;
use extranet_recorder::models::{Action, ActionKind, RunData, StepOutcome};
use extranet_recorder::recording::CaptureOutcome;
use extranet_recorder::RecordingEngine;

fn fixture_url(page: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    format!("file://{}/tests/fixtures/{}", manifest_dir, page)
}

/// Wait for page load, binding delivery and the navigation poller
async fn wait_for_events(ms: u64) {
    sleep(Duration::from_millis(ms)).await;
}

/// Chrome launcher that keeps the last session so the test can drive it.
#[derive(Default)]
struct DrivingLauncher {
    inner: ChromeLauncher,
    last: Mutex<Option<Arc<dyn ControlledSession>>>,
}

impl DrivingLauncher {
    fn session(&self) -> Arc<dyn ControlledSession> {
        self.last
            .lock()
            .unwrap()
            .clone()
            .expect("no session launched yet")
    }
}

#[async_trait]
impl SessionLauncher for DrivingLauncher {
    async fn launch(&self, url: &str, headless: bool, timeout: Duration) -> Result<Arc<dyn ControlledSession>> {
        let session = self.inner.launch(url, headless, timeout).await?;
        *self.last.lock().unwrap() = Some(Arc::clone(&session));
        Ok(session)
    }
}

fn engine(launcher: Arc<DrivingLauncher>, dir: &tempfile::TempDir) -> RecordingEngine {
    let mut config = Config {
        recordings_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    config.capture.poll_interval = Duration::from_millis(200);
    config.replay.settle_delay = Duration::from_millis(300);
    RecordingEngine::new(config, launcher)
}

async fn by_id(session: &dyn ControlledSession, id: &str) -> ElementHandle {
    session
        .find_candidates(&Lookup::ElementId(id.to_string()))
        .await
        .unwrap()
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("#{id} not on the page"))
}

// ============================================================================
// Test 1: Capture of clicks, typing and selections
// ============================================================================

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_capture_records_form_interactions() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(DrivingLauncher::default());
    let engine = engine(Arc::clone(&launcher), &dir);

    let info = engine
        .start_capture("ostrovok", &fixture_url("login.html"), true)
        .await
        .unwrap();
    assert!(info.instrumented, "in-page capture should install on a local page");
    wait_for_events(1000).await;

    let session = launcher.session();
    let email = by_id(session.as_ref(), "email").await;
    session.type_text(&email, "ops@grand-hotel.test").await.unwrap();
    wait_for_events(600).await;

    let hotel_type = by_id(session.as_ref(), "hotel-type").await;
    session.select_by_value(&hotel_type, "hostel").await.unwrap();
    wait_for_events(300).await;

    let login = by_id(session.as_ref(), "login-btn").await;
    session.click(&login).await.unwrap();
    wait_for_events(800).await;

    let outcome = engine.stop_capture(&info.capture_id).await.unwrap();
    let CaptureOutcome::Saved { recording, .. } = outcome else {
        panic!("expected a saved recording");
    };

    let kinds: Vec<_> = recording.actions().iter().map(|r| r.kind()).collect();
    assert!(kinds.contains(&ActionKind::Input), "kinds: {kinds:?}");
    assert!(kinds.contains(&ActionKind::Select), "kinds: {kinds:?}");
    assert!(kinds.contains(&ActionKind::Click), "kinds: {kinds:?}");

    // Typing collapses to the final value
    let inputs: Vec<_> = recording
        .actions()
        .iter()
        .filter_map(|r| match &r.action {
            Action::Input(input) => Some(input.value.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(inputs, vec!["ops@grand-hotel.test"]);

    let select = recording
        .actions()
        .iter()
        .find_map(|r| match &r.action {
            Action::Select(select) => Some(select),
            _ => None,
        })
        .unwrap();
    assert_eq!(select.value, "hostel");
    assert_eq!(select.selected_label.as_deref(), Some("Hostel"));
    assert_eq!(select.target.element_id.as_deref(), Some("hotel-type"));
}

// ============================================================================
// Test 1b: Typing followed at once by a submit keeps the typed value
// ============================================================================

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_capture_keeps_input_submitted_without_pause() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(DrivingLauncher::default());
    let engine = engine(Arc::clone(&launcher), &dir);

    let info = engine
        .start_capture("ostrovok", &fixture_url("login.html"), true)
        .await
        .unwrap();
    wait_for_events(1000).await;

    let session = launcher.session();
    let password = by_id(session.as_ref(), "password").await;
    let login = by_id(session.as_ref(), "login-btn").await;
    session.type_text(&password, "s3cret").await.unwrap();
    session.click(&login).await.unwrap();
    wait_for_events(800).await;

    let outcome = engine.stop_capture(&info.capture_id).await.unwrap();
    let CaptureOutcome::Saved { recording, .. } = outcome else {
        panic!("expected a saved recording");
    };

    let kinds: Vec<_> = recording.actions().iter().map(|r| r.kind()).collect();
    let input_at = kinds.iter().position(|k| *k == ActionKind::Input);
    let click_at = kinds.iter().position(|k| *k == ActionKind::Click);
    assert!(
        matches!((input_at, click_at), (Some(i), Some(c)) if i < c),
        "kinds: {kinds:?}"
    );
    let typed = recording.actions().iter().find_map(|r| match &r.action {
        Action::Input(input) => Some(input.value.as_str()),
        _ => None,
    });
    assert_eq!(typed, Some("s3cret"));
}

// ============================================================================
// Test 2: Full page loads are recorded by the poller
// ============================================================================

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_capture_records_page_loads() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(DrivingLauncher::default());
    let engine = engine(Arc::clone(&launcher), &dir);

    let info = engine
        .start_capture("bronevik", &fixture_url("login.html"), true)
        .await
        .unwrap();
    wait_for_events(1000).await;

    let session = launcher.session();
    let link = by_id(session.as_ref(), "rooms-link").await;
    session.click(&link).await.unwrap();
    wait_for_events(1200).await;

    let outcome = engine.stop_capture(&info.capture_id).await.unwrap();
    let CaptureOutcome::Saved { recording, .. } = outcome else {
        panic!("expected a saved recording");
    };

    let navigations: Vec<_> = recording
        .actions()
        .iter()
        .filter(|r| r.is_navigation())
        .map(|r| r.url.as_str())
        .collect();
    assert_eq!(navigations.len(), 1, "navigations: {navigations:?}");
    assert!(navigations[0].ends_with("rooms.html"));
}

// ============================================================================
// Test 3: Pause drops interactions, cancel writes nothing
// ============================================================================

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_paused_capture_then_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(DrivingLauncher::default());
    let engine = engine(Arc::clone(&launcher), &dir);

    let info = engine
        .start_capture("101hotels", &fixture_url("login.html"), true)
        .await
        .unwrap();
    wait_for_events(1000).await;

    engine.pause_capture(&info.capture_id).await.unwrap();
    let session = launcher.session();
    let login = by_id(session.as_ref(), "login-btn").await;
    session.click(&login).await.unwrap();
    wait_for_events(500).await;
    engine.resume_capture(&info.capture_id).await.unwrap();

    engine.cancel_capture(&info.capture_id).await.unwrap();
    assert!(engine.list_recordings("101hotels").unwrap().is_empty());
}

// ============================================================================
// Test 4: Replay with placeholder substitution
// ============================================================================

#[tokio::test]
#[ignore = "requires a local Chrome install"]
async fn test_replay_fills_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(DrivingLauncher::default());
    let engine = engine(Arc::clone(&launcher), &dir);

    // Record a template: type a placeholder, pick a hotel type
    let info = engine
        .start_capture("ostrovok", &fixture_url("login.html"), true)
        .await
        .unwrap();
    wait_for_events(1000).await;
    let session = launcher.session();
    let email = by_id(session.as_ref(), "email").await;
    session.type_text(&email, "{{email}}").await.unwrap();
    wait_for_events(600).await;
    let hotel_type = by_id(session.as_ref(), "hotel-type").await;
    session.select_by_value(&hotel_type, "apartment").await.unwrap();
    wait_for_events(300).await;

    let CaptureOutcome::Saved { id, .. } = engine.stop_capture(&info.capture_id).await.unwrap() else {
        panic!("expected a saved recording");
    };

    let mut data = RunData::new();
    data.insert("email", "reservations@seaside.test");
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let result = engine.replay(&id, &data, true, cancel_rx).await.unwrap();

    assert!(result.completed);
    assert!(
        result.all_succeeded(),
        "failed steps: {:?}",
        result.failed_steps()
    );
    let input_step = result
        .steps
        .iter()
        .find(|s| s.kind == ActionKind::Input)
        .unwrap();
    assert_eq!(input_step.outcome, StepOutcome::Acted);
    assert_eq!(input_step.strategy.as_deref(), Some("structural_path"));
}
