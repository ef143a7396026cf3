use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use super::merge::merge_buffers;
use super::poller::NavigationPoller;
use crate::browser::{ControlledSession, SessionLauncher};
use crate::config::CaptureConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{ActionRecord, Recording, RecordingId, RecordingType};
use crate::store::RecordingStore;

/// What a stopped capture produced.
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    Saved {
        id: RecordingId,
        recording: Recording,
    },
    /// No interactions were captured; nothing was written
    NothingCaptured,
    /// The session is gone but writing failed; the recording is handed back
    /// so the caller can retry [`RecordingStore::save`].
    Unsaved { recording: Recording, error: String },
}

impl CaptureOutcome {
    /// Persist `recording`, keeping it in the outcome when the write fails.
    pub(crate) fn persist(store: &RecordingStore, capture_id: &str, recording: Recording) -> Self {
        match store.save(&recording) {
            Ok(id) => {
                tracing::info!(
                    "Capture {}: {} actions saved as {}",
                    capture_id,
                    recording.total_actions(),
                    id
                );
                CaptureOutcome::Saved { id, recording }
            }
            Err(e) => {
                tracing::error!("Capture {}: recording kept in memory, save failed: {}", capture_id, e);
                let error = match e {
                    EngineError::StoreWriteFailure(message) => message,
                    other => other.to_string(),
                };
                CaptureOutcome::Unsaved { recording, error }
            }
        }
    }
}

/// A running automatic capture. Owns its session exclusively until it is
/// stopped or cancelled.
pub struct CaptureHandle {
    id: String,
    platform: String,
    start_url: String,
    session: Arc<dyn ControlledSession>,
    poller: NavigationPoller,
    pause_tx: watch::Sender<bool>,
    instrumented: bool,
}

impl CaptureHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    /// False when the in-page listeners could not be installed and only
    /// navigations are being recorded.
    pub fn is_instrumented(&self) -> bool {
        self.instrumented
    }

    pub fn is_paused(&self) -> bool {
        *self.pause_tx.borrow()
    }

    /// Stop both producers from appending until [`CaptureHandle::resume`].
    pub async fn pause(&self) {
        self.set_paused(true).await;
        tracing::info!("Capture {} paused", self.id);
    }

    pub async fn resume(&self) {
        self.set_paused(false).await;
        tracing::info!("Capture {} resumed", self.id);
    }

    async fn set_paused(&self, paused: bool) {
        self.pause_tx.send_replace(paused);
        if self.instrumented {
            if let Err(e) = self.session.set_instrumentation_paused(paused).await {
                tracing::warn!("Failed to toggle in-page capture for {}: {}", self.id, e);
            }
        }
    }
}

/// Turns live interactions in a browser session into a stored recording.
///
/// Two producers run during a capture: the in-page listeners, which push
/// click/input/select/history events through the session, and a host-side
/// [`NavigationPoller`]. Each owns its buffer; they only meet in
/// [`merge_buffers`] after the poller has been joined.
pub struct CaptureCoordinator {
    launcher: Arc<dyn SessionLauncher>,
    store: Arc<RecordingStore>,
    config: CaptureConfig,
}

impl CaptureCoordinator {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        store: Arc<RecordingStore>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            launcher,
            store,
            config,
        }
    }

    pub async fn start_capture(
        &self,
        platform: &str,
        target_url: &str,
        headless: bool,
    ) -> EngineResult<CaptureHandle> {
        let session = self
            .launcher
            .launch(target_url, headless, self.config.session_start_timeout)
            .await
            .map_err(|e| EngineError::SessionStartFailure(e.to_string()))?;

        // Redirects on open (e.g. to a login page) are part of the start, not captured actions
        let start_url = match session.current_url().await {
            Ok(url) if !url.is_empty() => url,
            _ => target_url.to_string(),
        };

        let instrumented = match session.install_instrumentation().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "In-page capture unavailable ({}), recording navigations only",
                    e
                );
                false
            }
        };

        let (pause_tx, pause_rx) = watch::channel(false);
        let poller = NavigationPoller::spawn(
            Arc::clone(&session),
            start_url.clone(),
            self.config.poll_interval,
            pause_rx,
        );

        let handle = CaptureHandle {
            id: Uuid::new_v4().to_string(),
            platform: platform.to_string(),
            start_url,
            session,
            poller,
            pause_tx,
            instrumented,
        };

        tracing::info!(
            "Capture {} started for {} at {}",
            handle.id,
            handle.platform,
            handle.start_url
        );
        Ok(handle)
    }

    /// Join the poller, collect the in-page buffer, close the session, then
    /// merge and persist. Nothing is written when no action was captured.
    pub async fn stop_capture(&self, handle: CaptureHandle) -> EngineResult<CaptureOutcome> {
        let CaptureHandle {
            id,
            platform,
            start_url,
            session,
            poller,
            instrumented,
            ..
        } = handle;

        let polled = poller.stop(self.config.poller_join_timeout).await;

        let in_session = if instrumented {
            match session.take_captured().await {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!("In-page buffer unavailable for {}: {}", id, e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close capture session {}: {}", id, e);
        }

        tracing::debug!(
            "Capture {}: {} in-page records, {} polled navigations",
            id,
            in_session.len(),
            polled.len()
        );

        let in_session = in_session
            .into_iter()
            .map(|record| ActionRecord {
                action: record.action.normalized(),
                ..record
            })
            .collect();
        let actions = merge_buffers(in_session, polled, Some(&start_url));

        if actions.is_empty() {
            tracing::info!("Capture {} stopped with nothing captured", id);
            return Ok(CaptureOutcome::NothingCaptured);
        }

        let recording = Recording::new(
            platform,
            RecordingType::Automatic,
            start_url,
            Utc::now(),
            actions,
        );
        Ok(CaptureOutcome::persist(&self.store, &id, recording))
    }

    /// Tear the capture down without writing anything.
    pub async fn cancel_capture(&self, handle: CaptureHandle) {
        let CaptureHandle {
            id, session, poller, ..
        } = handle;

        let discarded = poller.stop(self.config.poller_join_timeout).await;
        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close capture session {}: {}", id, e);
        }
        tracing::info!(
            "Capture {} cancelled, {} polled navigations discarded",
            id,
            discarded.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{FakeLauncher, FakeSession};
    use crate::models::{Action, InputAction, SelectAction, TargetDescriptor};
    use std::time::Duration;

    const LOGIN: &str = "https://extranet.example/login";
    const DASHBOARD: &str = "https://extranet.example/dashboard";

    fn config() -> CaptureConfig {
        CaptureConfig {
            poll_interval: Duration::from_millis(10),
            poller_join_timeout: Duration::from_millis(500),
            session_start_timeout: Duration::from_secs(1),
        }
    }

    fn coordinator(
        session: &Arc<FakeSession>,
        dir: &tempfile::TempDir,
    ) -> (CaptureCoordinator, Arc<RecordingStore>) {
        let store = Arc::new(RecordingStore::new(dir.path()));
        let coordinator = CaptureCoordinator::new(
            Arc::new(FakeLauncher::new(session.clone())),
            store.clone(),
            config(),
        );
        (coordinator, store)
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn login_field(value: &str) -> ActionRecord {
        let mut target = TargetDescriptor::new("input", "/html[1]/body[1]/form[1]/input[1]");
        target.element_id = Some("login".to_string());
        target.css_classes = vec![String::new(), "field".to_string()];
        target.source_url = LOGIN.to_string();
        ActionRecord::new(
            Action::Input(InputAction {
                target,
                value: value.to_string(),
            }),
            LOGIN,
            now_ms(),
        )
    }

    fn submit_click() -> ActionRecord {
        let mut target = TargetDescriptor::new("button", "/html[1]/body[1]/form[1]/button[1]");
        target.visible_text = Some("Sign in".to_string());
        target.element_id = Some(String::new());
        ActionRecord::new(Action::Click(target), LOGIN, now_ms())
    }

    #[tokio::test]
    async fn test_server_rendered_navigation_recorded_once() {
        let dir = tempfile::tempdir().unwrap();
        let session = FakeSession::new(LOGIN);
        let (coordinator, store) = coordinator(&session, &dir);

        let handle = coordinator.start_capture("ostrovok", LOGIN, true).await.unwrap();
        assert!(handle.is_instrumented());
        assert_eq!(handle.start_url(), LOGIN);

        session.push_captured(login_field("{{email}}"));
        tokio::time::sleep(Duration::from_millis(5)).await;
        session.push_captured(submit_click());
        tokio::time::sleep(Duration::from_millis(5)).await;

        // Form post: full page load, nothing reported from inside the page
        session.set_url(DASHBOARD);
        tokio::time::sleep(Duration::from_millis(80)).await;

        let outcome = coordinator.stop_capture(handle).await.unwrap();
        let CaptureOutcome::Saved { id, recording } = outcome else {
            panic!("expected a saved recording");
        };

        let navigations: Vec<_> = recording
            .actions()
            .iter()
            .filter(|r| r.is_navigation())
            .collect();
        assert_eq!(navigations.len(), 1);
        assert_eq!(navigations[0].url, DASHBOARD);

        let kinds: Vec<_> = recording.actions().iter().map(|r| r.kind().to_string()).collect();
        assert_eq!(kinds, vec!["input", "click", "navigation"]);
        assert_eq!(recording.start_url(), LOGIN);
        assert!(session.is_closed());

        // Descriptors were normalized on the way in
        let click_target = recording.actions()[1].action.target().unwrap();
        assert!(click_target.element_id.is_none());
        let input_target = recording.actions()[0].action.target().unwrap();
        assert_eq!(input_target.css_classes, vec!["field".to_string()]);

        assert_eq!(store.load(&id).unwrap(), recording);
    }

    #[tokio::test]
    async fn test_immediate_stop_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let session = FakeSession::new(LOGIN);
        let (coordinator, store) = coordinator(&session, &dir);

        let handle = coordinator.start_capture("ostrovok", LOGIN, true).await.unwrap();
        let outcome = coordinator.stop_capture(handle).await.unwrap();

        assert!(matches!(outcome, CaptureOutcome::NothingCaptured));
        assert!(store.list("ostrovok").unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_blocked_instrumentation_degrades_to_navigation_only() {
        let dir = tempfile::tempdir().unwrap();
        let session = FakeSession::new(LOGIN);
        session.fail_instrumentation();
        let (coordinator, _store) = coordinator(&session, &dir);

        let handle = coordinator.start_capture("bronevik", LOGIN, true).await.unwrap();
        assert!(!handle.is_instrumented());

        session.set_url(DASHBOARD);
        tokio::time::sleep(Duration::from_millis(60)).await;

        let CaptureOutcome::Saved { recording, .. } = coordinator.stop_capture(handle).await.unwrap()
        else {
            panic!("expected a saved recording");
        };
        assert_eq!(recording.total_actions(), 1);
        assert!(recording.actions()[0].is_navigation());
    }

    #[tokio::test]
    async fn test_pause_suppresses_both_producers() {
        let dir = tempfile::tempdir().unwrap();
        let session = FakeSession::new(LOGIN);
        let (coordinator, _store) = coordinator(&session, &dir);

        let handle = coordinator.start_capture("ostrovok", LOGIN, true).await.unwrap();
        handle.pause().await;
        assert!(handle.is_paused());

        session.push_captured(submit_click());
        tokio::time::sleep(Duration::from_millis(40)).await;

        handle.resume().await;
        let mut target = TargetDescriptor::new("select", "/html[1]/body[1]/select[1]");
        target.source_url = LOGIN.to_string();
        session.push_captured(ActionRecord::new(
            Action::Select(SelectAction {
                target,
                value: "RU".to_string(),
                selected_label: Some("Russia".to_string()),
            }),
            LOGIN,
            now_ms(),
        ));

        let CaptureOutcome::Saved { recording, .. } = coordinator.stop_capture(handle).await.unwrap()
        else {
            panic!("expected a saved recording");
        };
        assert_eq!(recording.total_actions(), 1);
        assert_eq!(recording.actions()[0].action.captured_value(), Some("RU"));
    }

    #[tokio::test]
    async fn test_cancel_discards_everything() {
        let dir = tempfile::tempdir().unwrap();
        let session = FakeSession::new(LOGIN);
        let (coordinator, store) = coordinator(&session, &dir);

        let handle = coordinator.start_capture("ostrovok", LOGIN, true).await.unwrap();
        session.push_captured(submit_click());
        session.set_url(DASHBOARD);
        tokio::time::sleep(Duration::from_millis(40)).await;

        coordinator.cancel_capture(handle).await;
        assert!(session.is_closed());
        assert!(store.list("ostrovok").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quick_submit_after_typing_keeps_input_first() {
        let dir = tempfile::tempdir().unwrap();
        let session = FakeSession::new(LOGIN);
        let (coordinator, _store) = coordinator(&session, &dir);

        let handle = coordinator.start_capture("ostrovok", LOGIN, true).await.unwrap();

        // One event per keystroke, then the submit click and page load right away
        for typed in ["s", "se", "secret"] {
            session.push_captured(login_field(typed));
        }
        session.push_captured(submit_click());
        session.set_url(DASHBOARD);
        tokio::time::sleep(Duration::from_millis(60)).await;

        let CaptureOutcome::Saved { recording, .. } = coordinator.stop_capture(handle).await.unwrap()
        else {
            panic!("expected a saved recording");
        };
        let kinds: Vec<_> = recording.actions().iter().map(|r| r.kind().to_string()).collect();
        assert_eq!(kinds, vec!["input", "click", "navigation"]);
        assert_eq!(recording.actions()[0].action.captured_value(), Some("secret"));
    }

    #[tokio::test]
    async fn test_page_loaded_while_paused_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let session = FakeSession::new(LOGIN);
        let (coordinator, _store) = coordinator(&session, &dir);

        let handle = coordinator.start_capture("ostrovok", LOGIN, true).await.unwrap();
        handle.pause().await;

        // Full page load during the pause, then activity on the new page
        session.set_url(DASHBOARD);
        tokio::time::sleep(Duration::from_millis(40)).await;
        session.push_captured(submit_click());
        session.push_captured(login_field("typed while paused"));

        let outcome = coordinator.stop_capture(handle).await.unwrap();
        assert!(matches!(outcome, CaptureOutcome::NothingCaptured));
    }

    #[tokio::test]
    async fn test_failed_save_hands_recording_back() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the store directory should be
        let blocked = dir.path().join("recordings");
        std::fs::write(&blocked, b"").unwrap();
        let session = FakeSession::new(LOGIN);
        let coordinator = CaptureCoordinator::new(
            Arc::new(FakeLauncher::new(session.clone())),
            Arc::new(RecordingStore::new(&blocked)),
            config(),
        );

        let handle = coordinator.start_capture("ostrovok", LOGIN, true).await.unwrap();
        session.push_captured(submit_click());

        let outcome = coordinator.stop_capture(handle).await.unwrap();
        let CaptureOutcome::Unsaved { recording, error } = outcome else {
            panic!("expected the recording to be handed back");
        };
        assert_eq!(recording.total_actions(), 1);
        assert!(!error.is_empty());
        assert!(session.is_closed());

        std::fs::remove_file(&blocked).unwrap();
        let id = RecordingStore::new(&blocked).save(&recording).unwrap();
        assert!(id.as_str().starts_with("ostrovok_actions_"));
    }

    #[tokio::test]
    async fn test_session_start_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordingStore::new(dir.path()));
        let coordinator =
            CaptureCoordinator::new(Arc::new(FakeLauncher::failing()), store, config());

        let err = coordinator
            .start_capture("ostrovok", LOGIN, true)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::SessionStartFailure(_)));
    }
}
