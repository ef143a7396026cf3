use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::browser::SessionLauncher;
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::models::{ActionRecord, Recording, RecordingId, RecordingSummary, ReplayResult, RunData};
use crate::recording::{CaptureCoordinator, CaptureHandle, CaptureOutcome, ManualCapture, ManualRecorder};
use crate::replay::ReplayOrchestrator;
use crate::store::RecordingStore;

/// A capture slot. Emptied by whoever stops or cancels the capture first.
type Slot<T> = Arc<Mutex<Option<T>>>;

/// What a freshly started capture looks like to the caller.
#[derive(Debug, Clone)]
pub struct CaptureInfo {
    pub capture_id: String,
    pub platform: String,
    pub start_url: String,
    pub instrumented: bool,
}

/// Owns the store and every live capture. The HTTP layer and tests drive
/// the engine only through this type.
pub struct RecordingEngine {
    config: Config,
    launcher: Arc<dyn SessionLauncher>,
    store: Arc<RecordingStore>,
    coordinator: CaptureCoordinator,
    manual: ManualRecorder,
    captures: DashMap<String, Slot<CaptureHandle>>,
    manual_captures: DashMap<String, Slot<ManualCapture>>,
    /// Stopped captures whose recording could not be written yet
    unsaved: DashMap<String, Recording>,
}

impl RecordingEngine {
    pub fn new(config: Config, launcher: Arc<dyn SessionLauncher>) -> Self {
        let store = Arc::new(RecordingStore::new(config.recordings_dir.clone()));
        Self {
            coordinator: CaptureCoordinator::new(
                Arc::clone(&launcher),
                Arc::clone(&store),
                config.capture.clone(),
            ),
            manual: ManualRecorder::new(
                Arc::clone(&launcher),
                Arc::clone(&store),
                config.capture.clone(),
            ),
            captures: DashMap::new(),
            manual_captures: DashMap::new(),
            unsaved: DashMap::new(),
            launcher,
            store,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &RecordingStore {
        &self.store
    }

    // ------------------------------------------------------------------
    // Automatic capture
    // ------------------------------------------------------------------

    pub async fn start_capture(
        &self,
        platform: &str,
        target_url: &str,
        headless: bool,
    ) -> EngineResult<CaptureInfo> {
        let handle = self
            .coordinator
            .start_capture(platform, target_url, headless)
            .await?;

        let info = CaptureInfo {
            capture_id: handle.id().to_string(),
            platform: handle.platform().to_string(),
            start_url: handle.start_url().to_string(),
            instrumented: handle.is_instrumented(),
        };
        self.captures
            .insert(info.capture_id.clone(), Arc::new(Mutex::new(Some(handle))));
        Ok(info)
    }

    /// Stop and persist. When the write fails the recording is kept and a
    /// later stop with the same id retries the save.
    pub async fn stop_capture(&self, capture_id: &str) -> EngineResult<CaptureOutcome> {
        if let Some(retried) = self.retry_unsaved(capture_id) {
            return retried;
        }
        let handle = take_slot(&self.captures, capture_id).await?;
        let outcome = self.coordinator.stop_capture(handle).await?;
        self.settle(capture_id, outcome)
    }

    pub async fn cancel_capture(&self, capture_id: &str) -> EngineResult<()> {
        let handle = take_slot(&self.captures, capture_id).await?;
        self.coordinator.cancel_capture(handle).await;
        Ok(())
    }

    pub async fn pause_capture(&self, capture_id: &str) -> EngineResult<()> {
        let slot = slot(&self.captures, capture_id)?;
        let guard = slot.lock().await;
        let handle = guard
            .as_ref()
            .ok_or_else(|| EngineError::NoActiveCapture(capture_id.to_string()))?;
        handle.pause().await;
        Ok(())
    }

    pub async fn resume_capture(&self, capture_id: &str) -> EngineResult<()> {
        let slot = slot(&self.captures, capture_id)?;
        let guard = slot.lock().await;
        let handle = guard
            .as_ref()
            .ok_or_else(|| EngineError::NoActiveCapture(capture_id.to_string()))?;
        handle.resume().await;
        Ok(())
    }

    pub async fn is_capture_paused(&self, capture_id: &str) -> EngineResult<bool> {
        let slot = slot(&self.captures, capture_id)?;
        let guard = slot.lock().await;
        guard
            .as_ref()
            .map(CaptureHandle::is_paused)
            .ok_or_else(|| EngineError::NoActiveCapture(capture_id.to_string()))
    }

    pub fn active_captures(&self) -> usize {
        self.captures.len() + self.manual_captures.len()
    }

    // ------------------------------------------------------------------
    // Manual capture
    // ------------------------------------------------------------------

    pub async fn start_manual(
        &self,
        platform: &str,
        target_url: &str,
        headless: bool,
    ) -> EngineResult<CaptureInfo> {
        let capture = self.manual.start(platform, target_url, headless).await?;
        let info = CaptureInfo {
            capture_id: capture.id().to_string(),
            platform: capture.platform().to_string(),
            start_url: capture.start_url().to_string(),
            instrumented: false,
        };
        self.manual_captures
            .insert(info.capture_id.clone(), Arc::new(Mutex::new(Some(capture))));
        Ok(info)
    }

    /// Returns the snapshot record and the capture's running total.
    pub async fn manual_record_state(&self, capture_id: &str) -> EngineResult<(ActionRecord, usize)> {
        let slot = slot(&self.manual_captures, capture_id)?;
        let mut guard = slot.lock().await;
        let capture = guard
            .as_mut()
            .ok_or_else(|| EngineError::NoActiveCapture(capture_id.to_string()))?;
        let record = capture.record_page_state().await?;
        Ok((record, capture.total_actions()))
    }

    pub async fn manual_record_navigation(
        &self,
        capture_id: &str,
    ) -> EngineResult<(Option<ActionRecord>, usize)> {
        let slot = slot(&self.manual_captures, capture_id)?;
        let mut guard = slot.lock().await;
        let capture = guard
            .as_mut()
            .ok_or_else(|| EngineError::NoActiveCapture(capture_id.to_string()))?;
        let record = capture.record_navigation().await?;
        Ok((record, capture.total_actions()))
    }

    pub async fn stop_manual(&self, capture_id: &str) -> EngineResult<CaptureOutcome> {
        if let Some(retried) = self.retry_unsaved(capture_id) {
            return retried;
        }
        let capture = take_slot(&self.manual_captures, capture_id).await?;
        let outcome = self.manual.stop(capture).await?;
        self.settle(capture_id, outcome)
    }

    fn retry_unsaved(&self, capture_id: &str) -> Option<EngineResult<CaptureOutcome>> {
        let (_, recording) = self.unsaved.remove(capture_id)?;
        tracing::info!("Retrying save of capture {}", capture_id);
        let outcome = CaptureOutcome::persist(&self.store, capture_id, recording);
        Some(self.settle(capture_id, outcome))
    }

    fn settle(&self, capture_id: &str, outcome: CaptureOutcome) -> EngineResult<CaptureOutcome> {
        match outcome {
            CaptureOutcome::Unsaved { recording, error } => {
                self.unsaved.insert(capture_id.to_string(), recording);
                Err(EngineError::StoreWriteFailure(error))
            }
            other => Ok(other),
        }
    }

    // ------------------------------------------------------------------
    // Stored recordings
    // ------------------------------------------------------------------

    pub fn list_recordings(&self, platform: &str) -> EngineResult<Vec<RecordingSummary>> {
        self.store.list(platform)
    }

    pub fn load_recording(&self, id: &RecordingId) -> EngineResult<Recording> {
        self.store.load(id)
    }

    pub fn preview(&self, id: &RecordingId) -> EngineResult<String> {
        self.store.preview(id)
    }

    // ------------------------------------------------------------------
    // Replay
    // ------------------------------------------------------------------

    /// A fresh orchestrator whose report stream carries only its own run.
    pub fn replay_runner(&self) -> ReplayOrchestrator {
        ReplayOrchestrator::new(Arc::clone(&self.launcher), self.config.replay.clone())
    }

    /// Load `recording_id` and replay it with `data`.
    pub async fn replay(
        &self,
        recording_id: &RecordingId,
        data: &RunData,
        headless: bool,
        cancel: watch::Receiver<bool>,
    ) -> EngineResult<ReplayResult> {
        let recording = self.store.load(recording_id)?;
        self.replay_runner()
            .replay(&recording, Some(recording_id.clone()), data, headless, cancel)
            .await
    }
}

fn slot<T>(map: &DashMap<String, Slot<T>>, id: &str) -> EngineResult<Slot<T>> {
    map.get(id)
        .map(|entry| Arc::clone(entry.value()))
        .ok_or_else(|| EngineError::NoActiveCapture(id.to_string()))
}

/// Remove the capture from the map and take ownership of it. Waits for any
/// in-flight operation on the same capture to finish first.
async fn take_slot<T>(map: &DashMap<String, Slot<T>>, id: &str) -> EngineResult<T> {
    let (_, slot) = map
        .remove(id)
        .ok_or_else(|| EngineError::NoActiveCapture(id.to_string()))?;
    let taken = slot.lock().await.take();
    taken.ok_or_else(|| EngineError::NoActiveCapture(id.to_string()))
}
