use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::{Element, Page};
use futures_util::{Stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::scripts::{self, CAPTURE_BINDING};
use super::{ControlledSession, ElementHandle, Lookup, SessionLauncher, Viewport};
use crate::models::{ActionRecord, PageState};

/// Time allowed for in-flight binding events after instrumentation is disabled
const CAPTURE_DRAIN_GRACE: Duration = Duration::from_millis(150);

/// Launches headless or headed Chrome in a fresh incognito context.
pub struct ChromeLauncher {
    viewport: Viewport,
    incognito: bool,
}

impl ChromeLauncher {
    pub fn new() -> Self {
        Self {
            viewport: Viewport::default(),
            incognito: true,
        }
    }
}

impl Default for ChromeLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(
        &self,
        url: &str,
        headless: bool,
        launch_timeout: Duration,
    ) -> Result<Arc<dyn ControlledSession>> {
        let session = ChromeSession::launch(url, headless, &self.viewport, self.incognito, launch_timeout).await?;
        Ok(Arc::new(session))
    }
}

/// A Chrome tab driven over CDP.
pub struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler_task: JoinHandle<()>,
    capture_rx: Mutex<Option<mpsc::UnboundedReceiver<ActionRecord>>>,
    capture_task: Mutex<Option<JoinHandle<()>>>,
    /// Host-side pause gate; pages loaded during a pause start unpaused
    capture_paused: Arc<AtomicBool>,
}

impl ChromeSession {
    pub async fn launch(
        url: &str,
        headless: bool,
        viewport: &Viewport,
        incognito: bool,
        launch_timeout: Duration,
    ) -> Result<Self> {
        let mut config = BrowserConfig::builder()
            .window_size(viewport.width as u32, viewport.height as u32);

        if !headless {
            config = config.with_head();
        }

        // NOTE: Do NOT use --incognito flag! It creates TWO windows.
        // The CDP browser context API below gives an isolated context instead.
        config = config
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-default-apps")
            .arg("--disable-extensions");

        let config = config
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {}", e))?;

        let (mut browser, mut handler) = timeout(launch_timeout, Browser::launch(config))
            .await
            .map_err(|_| {
                anyhow!(
                    "Browser launch timeout ({}s) - Chrome may not be installed or is unresponsive",
                    launch_timeout.as_secs()
                )
            })?
            .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                tracing::trace!("Browser event: {:?}", event);
            }
        });

        // Close the default pages only after our own page exists, so a window stays up
        let default_pages = browser
            .pages()
            .await
            .map_err(|e| anyhow!("Failed to get pages: {}", e))?;

        if incognito {
            tracing::info!("Creating incognito browser context via CDP");
            browser
                .start_incognito_context()
                .await
                .map_err(|e| anyhow!("Failed to start incognito context: {}", e))?;
        }

        let page = timeout(launch_timeout, browser.new_page(url))
            .await
            .map_err(|_| anyhow!("Timed out opening {}", url))?
            .map_err(|e| anyhow!("Failed to create page: {}", e))?;

        for default_page in default_pages {
            if let Err(e) = default_page.close().await {
                tracing::warn!("Failed to close default page: {}", e);
            }
        }

        let emulation_params =
            chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams::builder()
                .width(viewport.width as i64)
                .height(viewport.height as i64)
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(|e| anyhow!("Failed to build viewport params: {}", e))?;

        page.execute(emulation_params)
            .await
            .map_err(|e| anyhow!("Failed to set viewport: {}", e))?;

        tracing::info!(
            "Browser launched{} and navigated to {}",
            if incognito { " (incognito context)" } else { "" },
            url
        );

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            handler_task,
            capture_rx: Mutex::new(None),
            capture_task: Mutex::new(None),
            capture_paused: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn evaluate<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| anyhow!("Failed to evaluate script: {}", e))?
            .into_value()
            .map_err(|e| anyhow!("Failed to parse script result: {}", e))
    }

    async fn element(&self, element: &ElementHandle) -> Result<Element> {
        let selector = scripts::handle_selector(&element.handle);
        self.page
            .find_element(selector.as_str())
            .await
            .map_err(|e| anyhow!("Element {} is gone: {}", element.handle, e))
    }

    fn spawn_capture_listener(
        events: EventStream<EventBindingCalled>,
        paused: Arc<AtomicBool>,
        tx: mpsc::UnboundedSender<ActionRecord>,
    ) -> JoinHandle<()> {
        let payloads = events.map(|event| (event.name.clone(), event.payload.clone()));
        tokio::spawn(async move {
            forward_captured(payloads, &paused, &tx).await;
            tracing::debug!("CDP capture stream ended");
        })
    }
}

/// Forward capture binding payloads into `tx` until the stream ends, dropping
/// everything that arrives while `paused` is set.
async fn forward_captured<S>(mut payloads: S, paused: &AtomicBool, tx: &mpsc::UnboundedSender<ActionRecord>)
where
    S: Stream<Item = (String, String)> + Unpin,
{
    while let Some((name, payload)) = payloads.next().await {
        if name != CAPTURE_BINDING {
            continue;
        }
        if paused.load(Ordering::SeqCst) {
            tracing::trace!("Capture paused, dropping event");
            continue;
        }
        match serde_json::from_str::<ActionRecord>(&payload) {
            Ok(record) => {
                tracing::debug!("Captured {} on {}", record.kind(), record.url);
                if tx.send(record).is_err() {
                    break;
                }
            }
            Err(e) => tracing::debug!("Ignoring unparseable capture payload: {}", e),
        }
    }
}

#[async_trait]
impl ControlledSession for ChromeSession {
    async fn current_url(&self) -> Result<String> {
        self.page
            .url()
            .await
            .map_err(|e| anyhow!("Failed to get URL: {}", e))?
            .ok_or_else(|| anyhow!("URL is None"))
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| anyhow!("Failed to navigate to {}: {}", url, e))?;
        Ok(())
    }

    async fn find_candidates(&self, lookup: &Lookup) -> Result<Vec<ElementHandle>> {
        self.evaluate(scripts::find_script(lookup.strategy_name(), lookup.value()))
            .await
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()> {
        self.element(element)
            .await?
            .scroll_into_view()
            .await
            .map_err(|e| anyhow!("Failed to scroll to element {}: {}", element.handle, e))?;
        Ok(())
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        self.element(element)
            .await?
            .click()
            .await
            .map_err(|e| anyhow!("Failed to click element {}: {}", element.handle, e))?;
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<()> {
        let cleared: bool = self.evaluate(scripts::clear_script(&element.handle)).await?;
        if !cleared {
            return Err(anyhow!("Element {} is gone", element.handle));
        }
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<()> {
        let el = self.element(element).await?;
        el.click()
            .await
            .map_err(|e| anyhow!("Failed to focus element {}: {}", element.handle, e))?;
        el.type_str(text)
            .await
            .map_err(|e| anyhow!("Failed to type into element {}: {}", element.handle, e))?;
        Ok(())
    }

    async fn select_by_value(&self, element: &ElementHandle, value: &str) -> Result<()> {
        let selected: bool = self
            .evaluate(scripts::select_script(&element.handle, value, false))
            .await?;
        if !selected {
            return Err(anyhow!("No option with value '{}'", value));
        }
        Ok(())
    }

    async fn select_by_label(&self, element: &ElementHandle, label: &str) -> Result<()> {
        let selected: bool = self
            .evaluate(scripts::select_script(&element.handle, label, true))
            .await?;
        if !selected {
            return Err(anyhow!("No option labelled '{}'", label));
        }
        Ok(())
    }

    async fn install_instrumentation(&self) -> Result<()> {
        self.page
            .execute(AddBindingParams::new(CAPTURE_BINDING))
            .await
            .map_err(|e| anyhow!("Failed to add binding '{}': {}", CAPTURE_BINDING, e))?;

        let events = self
            .page
            .event_listener::<EventBindingCalled>()
            .await
            .map_err(|e| anyhow!("Failed to create event listener: {}", e))?;

        // Re-injected on every new document, so full page loads keep recording
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(scripts::recording_script()))
            .await
            .map_err(|e| anyhow!("Failed to register recording script: {}", e))?;
        let _: bool = self.evaluate(scripts::recording_script()).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.capture_paused.store(false, Ordering::SeqCst);
        *self.capture_task.lock().await = Some(Self::spawn_capture_listener(
            events,
            Arc::clone(&self.capture_paused),
            tx,
        ));
        *self.capture_rx.lock().await = Some(rx);

        tracing::info!("Recording instrumentation installed via CDP binding");
        Ok(())
    }

    async fn set_instrumentation_paused(&self, paused: bool) -> Result<()> {
        self.capture_paused.store(paused, Ordering::SeqCst);
        // The page flag only saves binding round trips; the host gate decides
        if let Err(e) = self.evaluate::<bool>(scripts::pause_script(paused)).await {
            tracing::debug!("Failed to set page pause flag: {}", e);
        }
        Ok(())
    }

    async fn take_captured(&self) -> Result<Vec<ActionRecord>> {
        let mut rx = self
            .capture_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("Instrumentation was never installed"))?;

        if let Err(e) = self.evaluate::<bool>(scripts::STOP_RECORDING_SCRIPT.to_string()).await {
            tracing::warn!("Failed to disable page instrumentation: {}", e);
        }
        tokio::time::sleep(CAPTURE_DRAIN_GRACE).await;

        if let Some(task) = self.capture_task.lock().await.take() {
            task.abort();
        }

        let mut records = Vec::new();
        while let Ok(record) = rx.try_recv() {
            records.push(record);
        }
        Ok(records)
    }

    async fn page_state(&self) -> Result<PageState> {
        self.evaluate(scripts::page_state_script()).await
    }

    async fn close(&self) -> Result<()> {
        if let Some(task) = self.capture_task.lock().await.take() {
            task.abort();
        }

        let _ = self.page.clone().close().await;

        if let Some(mut browser) = self.browser.lock().await.take() {
            let _ = browser.close().await;
        }
        self.handler_task.abort();

        tracing::info!("Browser closed");
        Ok(())
    }
}
