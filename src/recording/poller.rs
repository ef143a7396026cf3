use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::browser::ControlledSession;
use crate::models::ActionRecord;

/// Consecutive URL read failures after which the session is considered gone
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Host-side producer that samples the session URL and emits a navigation
/// record whenever it changes. Catches full page loads (form posts,
/// redirects) that in-page listeners cannot report.
pub struct NavigationPoller {
    handle: JoinHandle<()>,
    stop_tx: watch::Sender<bool>,
    records: mpsc::UnboundedReceiver<ActionRecord>,
}

impl NavigationPoller {
    /// Start sampling. `last_url` is the URL already known, so the page the
    /// session opened on is not reported as a navigation.
    pub fn spawn(
        session: Arc<dyn ControlledSession>,
        last_url: String,
        interval: Duration,
        paused: watch::Receiver<bool>,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (tx, records) = mpsc::unbounded_channel();
        let handle = tokio::spawn(poll_loop(session, last_url, interval, paused, stop_rx, tx));

        Self {
            handle,
            stop_tx,
            records,
        }
    }

    /// Signal the poller, wait up to `join_timeout` for it to exit, then hand
    /// over whatever it produced. A poller that does not exit in time is
    /// aborted and its buffer taken as-is.
    pub async fn stop(self, join_timeout: Duration) -> Vec<ActionRecord> {
        let Self {
            mut handle,
            stop_tx,
            mut records,
        } = self;

        let _ = stop_tx.send(true);

        match tokio::time::timeout(join_timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Navigation poller task failed: {}", e),
            Err(_) => {
                tracing::warn!(
                    "Navigation poller did not stop within {:?}, using partial buffer",
                    join_timeout
                );
                handle.abort();
            }
        }

        let mut navigations = Vec::new();
        while let Ok(record) = records.try_recv() {
            navigations.push(record);
        }
        navigations
    }
}

async fn poll_loop(
    session: Arc<dyn ControlledSession>,
    mut last_url: String,
    interval: Duration,
    paused: watch::Receiver<bool>,
    mut stop_rx: watch::Receiver<bool>,
    tx: mpsc::UnboundedSender<ActionRecord>,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    let mut failures = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        if *paused.borrow() {
            continue;
        }

        match session.current_url().await {
            Ok(url) => {
                failures = 0;
                if url != last_url {
                    tracing::debug!("Navigation detected: {} -> {}", last_url, url);
                    let record = ActionRecord::navigation(url.clone(), Utc::now().timestamp_millis());
                    if tx.send(record).is_err() {
                        break;
                    }
                    last_url = url;
                }
            }
            Err(e) => {
                failures += 1;
                tracing::debug!("Failed to read session URL ({}/{}): {}", failures, MAX_CONSECUTIVE_FAILURES, e);
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    tracing::warn!("Session URL unreadable, navigation polling stopped");
                    break;
                }
            }
        }
    }

    tracing::debug!("Navigation poller stopped");
}
