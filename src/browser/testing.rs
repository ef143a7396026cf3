//! In-memory [`ControlledSession`] with a scripted document, for unit tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ControlledSession, ElementHandle, Lookup, SessionLauncher};
use crate::models::{ActionRecord, PageState};

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub handle: String,
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub text: Option<String>,
    pub placeholder: Option<String>,
    pub path: String,
    pub visible: bool,
    pub enabled: bool,
    /// `(value, label)` pairs for select elements
    pub options: Vec<(String, String)>,
}

impl FakeElement {
    pub fn new(handle: &str, tag: &str, path: &str) -> Self {
        Self {
            handle: handle.to_string(),
            tag: tag.to_string(),
            id: None,
            classes: Vec::new(),
            text: None,
            placeholder: None,
            path: path.to_string(),
            visible: true,
            enabled: true,
            options: Vec::new(),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn option(mut self, value: &str, label: &str) -> Self {
        self.options.push((value.to_string(), label.to_string()));
        self
    }

    fn matches(&self, lookup: &Lookup) -> bool {
        match lookup {
            Lookup::StructuralPath(path) => &self.path == path,
            Lookup::ElementId(id) => self.id.as_deref() == Some(id.as_str()),
            Lookup::TextContains(text) => self
                .text
                .as_deref()
                .is_some_and(|own| own.contains(text.as_str())),
            Lookup::PlaceholderEquals(hint) => self.placeholder.as_deref() == Some(hint.as_str()),
            Lookup::ClassToken(class) => self.classes.iter().any(|c| c == class),
        }
    }

    fn to_handle(&self) -> ElementHandle {
        ElementHandle {
            handle: self.handle.clone(),
            tag: self.tag.clone(),
            visible: self.visible,
            enabled: self.enabled,
        }
    }
}

/// Side effects the session performed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Navigate(String),
    Scroll(String),
    Click(String),
    Clear(String),
    Type(String, String),
    SelectByValue(String, String),
    SelectByLabel(String, String),
    Close,
}

#[derive(Default)]
struct FakeState {
    url: String,
    elements: Vec<FakeElement>,
    captured: Vec<ActionRecord>,
    installed: bool,
    paused: bool,
    fail_instrumentation: bool,
    fail_url: bool,
    page_state: PageState,
    effects: Vec<Effect>,
}

#[derive(Default)]
pub struct FakeSession {
    state: Mutex<FakeState>,
}

impl FakeSession {
    pub fn new(url: &str) -> Arc<Self> {
        let session = Self::default();
        session.set_url(url);
        Arc::new(session)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_elements(self: Arc<Self>, elements: Vec<FakeElement>) -> Arc<Self> {
        self.lock().elements = elements;
        self
    }

    pub fn set_url(&self, url: &str) {
        self.lock().url = url.to_string();
    }

    pub fn url(&self) -> String {
        self.lock().url.clone()
    }

    pub fn set_elements(&self, elements: Vec<FakeElement>) {
        self.lock().elements = elements;
    }

    /// Simulate an event the in-page instrumentation observed.
    pub fn push_captured(&self, record: ActionRecord) {
        let mut state = self.lock();
        if state.installed && !state.paused {
            state.captured.push(record);
        }
    }

    pub fn fail_instrumentation(&self) {
        self.lock().fail_instrumentation = true;
    }

    pub fn fail_url(&self, fail: bool) {
        self.lock().fail_url = fail;
    }

    pub fn set_page_state(&self, page_state: PageState) {
        self.lock().page_state = page_state;
    }

    pub fn effects(&self) -> Vec<Effect> {
        self.lock().effects.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().effects.contains(&Effect::Close)
    }

    fn record(&self, effect: Effect) {
        self.lock().effects.push(effect);
    }

    fn element(&self, handle: &ElementHandle) -> Result<FakeElement> {
        self.lock()
            .elements
            .iter()
            .find(|el| el.handle == handle.handle)
            .cloned()
            .ok_or_else(|| anyhow!("stale element {}", handle.handle))
    }
}

#[async_trait]
impl ControlledSession for FakeSession {
    async fn current_url(&self) -> Result<String> {
        let state = self.lock();
        if state.fail_url {
            return Err(anyhow!("session unreachable"));
        }
        Ok(state.url.clone())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.set_url(url);
        self.record(Effect::Navigate(url.to_string()));
        Ok(())
    }

    async fn find_candidates(&self, lookup: &Lookup) -> Result<Vec<ElementHandle>> {
        Ok(self
            .lock()
            .elements
            .iter()
            .filter(|el| el.matches(lookup))
            .map(FakeElement::to_handle)
            .collect())
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()> {
        self.element(element)?;
        self.record(Effect::Scroll(element.handle.clone()));
        Ok(())
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        self.element(element)?;
        self.record(Effect::Click(element.handle.clone()));
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<()> {
        self.element(element)?;
        self.record(Effect::Clear(element.handle.clone()));
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<()> {
        self.element(element)?;
        self.record(Effect::Type(element.handle.clone(), text.to_string()));
        Ok(())
    }

    async fn select_by_value(&self, element: &ElementHandle, value: &str) -> Result<()> {
        let el = self.element(element)?;
        if !el.options.iter().any(|(v, _)| v == value) {
            return Err(anyhow!("No option with value '{}'", value));
        }
        self.record(Effect::SelectByValue(element.handle.clone(), value.to_string()));
        Ok(())
    }

    async fn select_by_label(&self, element: &ElementHandle, label: &str) -> Result<()> {
        let el = self.element(element)?;
        if !el.options.iter().any(|(_, l)| l == label) {
            return Err(anyhow!("No option labelled '{}'", label));
        }
        self.record(Effect::SelectByLabel(element.handle.clone(), label.to_string()));
        Ok(())
    }

    async fn install_instrumentation(&self) -> Result<()> {
        let mut state = self.lock();
        if state.fail_instrumentation {
            return Err(anyhow!("script injection blocked"));
        }
        state.installed = true;
        Ok(())
    }

    async fn set_instrumentation_paused(&self, paused: bool) -> Result<()> {
        self.lock().paused = paused;
        Ok(())
    }

    async fn take_captured(&self) -> Result<Vec<ActionRecord>> {
        let mut state = self.lock();
        if !state.installed {
            return Err(anyhow!("Instrumentation was never installed"));
        }
        state.installed = false;
        Ok(std::mem::take(&mut state.captured))
    }

    async fn page_state(&self) -> Result<PageState> {
        Ok(self.lock().page_state.clone())
    }

    async fn close(&self) -> Result<()> {
        self.record(Effect::Close);
        Ok(())
    }
}

/// Hands out one shared [`FakeSession`], optionally failing instead.
pub struct FakeLauncher {
    pub session: Arc<FakeSession>,
    pub fail: bool,
}

impl FakeLauncher {
    pub fn new(session: Arc<FakeSession>) -> Self {
        Self {
            session,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            session: FakeSession::new("about:blank"),
            fail: true,
        }
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(
        &self,
        url: &str,
        _headless: bool,
        _timeout: Duration,
    ) -> Result<Arc<dyn ControlledSession>> {
        if self.fail {
            return Err(anyhow!("Chrome not installed"));
        }
        self.session.set_url(url);
        Ok(self.session.clone())
    }
}
