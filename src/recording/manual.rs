use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::recorder::CaptureOutcome;
use crate::browser::{ControlledSession, SessionLauncher};
use crate::config::CaptureConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{Action, ActionRecord, Recording, RecordingType};
use crate::store::RecordingStore;

/// Operator-driven capture for pages that block in-page listeners: the
/// operator asks for navigations and page snapshots to be recorded.
pub struct ManualCapture {
    id: String,
    platform: String,
    start_url: String,
    session: Arc<dyn ControlledSession>,
    actions: Vec<ActionRecord>,
}

impl ManualCapture {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    pub fn total_actions(&self) -> usize {
        self.actions.len()
    }

    /// Record the session's current URL. Returns `None` when it equals the
    /// last recorded navigation.
    pub async fn record_navigation(&mut self) -> EngineResult<Option<ActionRecord>> {
        let url = self
            .session
            .current_url()
            .await
            .map_err(|e| EngineError::ActionExecutionFailure(e.to_string()))?;

        let last_navigation = self
            .actions
            .iter()
            .rev()
            .find(|record| record.is_navigation())
            .map(|record| record.url.as_str());
        if last_navigation == Some(url.as_str()) {
            tracing::debug!("Manual capture {}: still on {}", self.id, url);
            return Ok(None);
        }

        let record = ActionRecord::navigation(url, Utc::now().timestamp_millis());
        tracing::info!("Manual capture {}: navigation to {}", self.id, record.url);
        self.actions.push(record.clone());
        Ok(Some(record))
    }

    /// Snapshot the visible inputs, buttons, links and selects of the current page.
    pub async fn record_page_state(&mut self) -> EngineResult<ActionRecord> {
        let mut state = self
            .session
            .page_state()
            .await
            .map_err(|e| EngineError::ActionExecutionFailure(e.to_string()))?;
        let url = match self.session.current_url().await {
            Ok(url) => url,
            Err(_) => self.last_url().to_string(),
        };

        state.elements = state
            .elements
            .into_iter()
            .map(|mut element| {
                element.target = element.target.normalized();
                element
            })
            .collect();

        tracing::info!(
            "Manual capture {}: page state '{}' with {} elements",
            self.id,
            state.title,
            state.elements.len()
        );
        let record = ActionRecord::new(Action::PageState(state), url, Utc::now().timestamp_millis());
        self.actions.push(record.clone());
        Ok(record)
    }

    fn last_url(&self) -> &str {
        self.actions
            .last()
            .map(|record| record.url.as_str())
            .unwrap_or(&self.start_url)
    }
}

pub struct ManualRecorder {
    launcher: Arc<dyn SessionLauncher>,
    store: Arc<RecordingStore>,
    config: CaptureConfig,
}

impl ManualRecorder {
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

    /// Open a session on `url` and seed the capture with a navigation to it.
    pub async fn start(&self, platform: &str, url: &str, headless: bool) -> EngineResult<ManualCapture> {
        let session = self
            .launcher
            .launch(url, headless, self.config.session_start_timeout)
            .await
            .map_err(|e| EngineError::SessionStartFailure(e.to_string()))?;

        let capture = ManualCapture {
            id: Uuid::new_v4().to_string(),
            platform: platform.to_string(),
            start_url: url.to_string(),
            session,
            actions: vec![ActionRecord::navigation(url, Utc::now().timestamp_millis())],
        };

        tracing::info!("Manual capture {} started for {} at {}", capture.id, platform, url);
        Ok(capture)
    }

    /// Close the session and persist what was recorded.
    pub async fn stop(&self, capture: ManualCapture) -> EngineResult<CaptureOutcome> {
        let ManualCapture {
            id,
            platform,
            start_url,
            session,
            actions,
        } = capture;

        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close manual capture session {}: {}", id, e);
        }

        if actions.is_empty() {
            return Ok(CaptureOutcome::NothingCaptured);
        }

        let recording = Recording::new(
            platform,
            RecordingType::Manual,
            start_url,
            Utc::now(),
            actions,
        );
        Ok(CaptureOutcome::persist(&self.store, &id, recording))
    }
}
