use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};

use super::resolver::ElementResolver;
use super::substitution::Substitutor;
use crate::browser::{ControlledSession, ElementHandle, SessionLauncher};
use crate::config::ReplayConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Action, ActionRecord, Recording, RecordingId, ReplayResult, RunData, StepOutcome, StepReport,
};

const BLANK_PAGE: &str = "about:blank";

/// Replays a recording against a fresh session, one step at a time.
///
/// Per-step failures never abort the run: they are reported as `not_found` or
/// `error` outcomes and the next step runs. Only a failure to open the session
/// fails the replay as a whole.
pub struct ReplayOrchestrator {
    launcher: Arc<dyn SessionLauncher>,
    config: ReplayConfig,
    resolver: ElementResolver,
    substitutor: Substitutor,
    report_sender: broadcast::Sender<StepReport>,
}

impl ReplayOrchestrator {
    pub fn new(launcher: Arc<dyn SessionLauncher>, config: ReplayConfig) -> Self {
        let (report_tx, _) = broadcast::channel(256);
        Self {
            resolver: ElementResolver::new(config.resolve_timeout),
            substitutor: Substitutor::new(&config.extra_placeholders, config.placeholder_policy),
            launcher,
            config,
            report_sender: report_tx,
        }
    }

    /// Step reports as they are produced
    pub fn subscribe(&self) -> broadcast::Receiver<StepReport> {
        self.report_sender.subscribe()
    }

    /// Run every action of `recording` in order.
    ///
    /// `cancel` is checked before each step; flipping it to `true` ends the run
    /// with `cancelled = true`. The session is closed on every path after it
    /// was opened.
    pub async fn replay(
        &self,
        recording: &Recording,
        recording_id: Option<RecordingId>,
        data: &RunData,
        headless: bool,
        mut cancel: watch::Receiver<bool>,
    ) -> EngineResult<ReplayResult> {
        let started_at = Utc::now();
        let entry_url = recording.entry_url().unwrap_or(BLANK_PAGE);

        let session = self
            .launcher
            .launch(entry_url, headless, self.config.session_start_timeout)
            .await
            .map_err(|e| EngineError::SessionStartFailure(e.to_string()))?;

        tracing::info!(
            "Starting replay of {} ({} actions) at {}",
            recording_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| recording.platform().to_string()),
            recording.total_actions(),
            entry_url
        );

        let total = recording.total_actions();
        let mut steps = Vec::with_capacity(total);
        let mut cancelled = false;

        for (index, record) in recording.actions().iter().enumerate() {
            if *cancel.borrow() {
                tracing::info!("Replay cancelled before step {}/{}", index + 1, total);
                cancelled = true;
                break;
            }

            let step_started = Instant::now();
            let (outcome, strategy) = self.run_step(session.as_ref(), record, data).await;

            match &outcome {
                StepOutcome::NotFound => tracing::warn!(
                    "Step {}/{} ({}): target not found",
                    index + 1,
                    total,
                    record.kind()
                ),
                StepOutcome::Error { message } => tracing::warn!(
                    "Step {}/{} ({}) failed: {}",
                    index + 1,
                    total,
                    record.kind(),
                    message
                ),
                other => tracing::info!(
                    "Step {}/{} ({}): {:?}",
                    index + 1,
                    total,
                    record.kind(),
                    other
                ),
            }

            let acted = outcome == StepOutcome::Acted;
            let report = StepReport {
                index,
                kind: record.kind(),
                outcome,
                strategy: strategy.map(str::to_string),
                duration_ms: step_started.elapsed().as_millis() as u64,
            };
            let _ = self.report_sender.send(report.clone());
            steps.push(report);

            if acted {
                settle(&mut cancel, self.config.settle_delay).await;
            }
        }

        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close replay session: {}", e);
        }

        let result = ReplayResult {
            recording_id,
            platform: recording.platform().to_string(),
            completed: !cancelled,
            cancelled,
            steps,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            "Replay finished: {} steps run, {} failed, cancelled={}",
            result.steps.len(),
            result.failed_steps().len(),
            result.cancelled
        );

        Ok(result)
    }

    async fn run_step(
        &self,
        session: &dyn ControlledSession,
        record: &ActionRecord,
        data: &RunData,
    ) -> (StepOutcome, Option<&'static str>) {
        let target = match &record.action {
            Action::Navigation => return (navigate(session, &record.url).await, None),
            Action::PageState(_) => {
                return (
                    StepOutcome::Skipped {
                        reason: "page state snapshot".to_string(),
                    },
                    None,
                )
            }
            Action::Click(target) => target,
            Action::Input(input) => &input.target,
            Action::Select(select) => &select.target,
        };

        let resolved = match self.resolver.resolve(session, target).await {
            Ok(resolved) => resolved,
            Err(_) => return (StepOutcome::NotFound, None),
        };

        let outcome = match self.act(session, &record.action, &resolved.element, data).await {
            Ok(outcome) => outcome,
            Err(e) => StepOutcome::Error {
                message: e.to_string(),
            },
        };
        (outcome, Some(resolved.strategy))
    }

    async fn act(
        &self,
        session: &dyn ControlledSession,
        action: &Action,
        element: &ElementHandle,
        data: &RunData,
    ) -> EngineResult<StepOutcome> {
        match action {
            Action::Click(_) => {
                if let Err(e) = session.scroll_into_view(element).await {
                    tracing::debug!("Scroll into view failed: {}", e);
                }
                session.click(element).await.map_err(action_failed)?;
                Ok(StepOutcome::Acted)
            }
            Action::Input(input) => {
                // Nothing to enter leaves the field untouched
                let value = self.substitutor.substitute(&input.value, data)?;
                if value.is_empty() {
                    return Ok(StepOutcome::Found);
                }
                session.clear(element).await.map_err(action_failed)?;
                session
                    .type_text(element, &value)
                    .await
                    .map_err(action_failed)?;
                Ok(StepOutcome::Acted)
            }
            Action::Select(select) => {
                let value = self.substitutor.substitute(&select.value, data)?;
                if value.is_empty() {
                    return Ok(StepOutcome::Found);
                }
                if let Err(by_value) = session.select_by_value(element, &value).await {
                    tracing::debug!("Select by value failed ({}), trying label", by_value);
                    session
                        .select_by_label(element, &value)
                        .await
                        .map_err(action_failed)?;
                }
                Ok(StepOutcome::Acted)
            }
            Action::Navigation | Action::PageState(_) => Ok(StepOutcome::Skipped {
                reason: "no target".to_string(),
            }),
        }
    }
}

async fn navigate(session: &dyn ControlledSession, url: &str) -> StepOutcome {
    match session.current_url().await {
        Ok(current) if current == url => {
            return StepOutcome::Skipped {
                reason: "already on url".to_string(),
            }
        }
        Ok(_) => {}
        Err(e) => tracing::debug!("Could not read current URL: {}", e),
    }

    match session.navigate(url).await {
        Ok(()) => StepOutcome::Acted,
        Err(e) => StepOutcome::Error {
            message: action_failed(e).to_string(),
        },
    }
}

/// Wait out the settle delay, waking early on cancellation.
async fn settle(cancel: &mut watch::Receiver<bool>, delay: Duration) {
    if delay.is_zero() {
        return;
    }
    tokio::select! {
        biased;
        Ok(()) = cancel.changed() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}

fn action_failed(e: anyhow::Error) -> EngineError {
    EngineError::ActionExecutionFailure(e.to_string())
}
