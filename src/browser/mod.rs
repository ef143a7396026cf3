//! The controlled browser session the engine drives.
//!
//! The engine only ever talks to [`ControlledSession`]; the Chrome
//! implementation lives in [`chrome`] and tests use an in-memory fake.

pub mod chrome;
pub mod scripts;

#[cfg(test)]
pub mod testing;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{ActionRecord, PageState};

pub use chrome::{ChromeLauncher, ChromeSession};

/// One element lookup the session knows how to run against its live document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Exact positional XPath
    StructuralPath(String),
    ElementId(String),
    /// Elements whose own text nodes contain the value
    TextContains(String),
    /// Elements whose `placeholder` attribute equals the value
    PlaceholderEquals(String),
    /// Elements carrying the class token
    ClassToken(String),
}

impl Lookup {
    /// Stable name used in logs and step reports
    pub fn strategy_name(&self) -> &'static str {
        match self {
            Lookup::StructuralPath(_) => "structural_path",
            Lookup::ElementId(_) => "element_id",
            Lookup::TextContains(_) => "text",
            Lookup::PlaceholderEquals(_) => "placeholder",
            Lookup::ClassToken(_) => "class",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Lookup::StructuralPath(v)
            | Lookup::ElementId(v)
            | Lookup::TextContains(v)
            | Lookup::PlaceholderEquals(v)
            | Lookup::ClassToken(v) => v,
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy_name(), self.value())
    }
}

/// Reference to an element found by a lookup, valid until the page changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Session-specific token used to address the element again
    pub handle: String,
    #[serde(default)]
    pub tag: String,
    pub visible: bool,
    pub enabled: bool,
}

impl ElementHandle {
    pub fn is_interactable(&self) -> bool {
        self.visible && self.enabled
    }
}

/// A live, exclusively owned browser session.
#[async_trait]
pub trait ControlledSession: Send + Sync {
    async fn current_url(&self) -> Result<String>;

    async fn navigate(&self, url: &str) -> Result<()>;

    /// Matches in document order
    async fn find_candidates(&self, lookup: &Lookup) -> Result<Vec<ElementHandle>>;

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<()>;

    async fn click(&self, element: &ElementHandle) -> Result<()>;

    async fn clear(&self, element: &ElementHandle) -> Result<()>;

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<()>;

    /// Fails when no option carries `value`
    async fn select_by_value(&self, element: &ElementHandle, value: &str) -> Result<()>;

    /// Fails when no option's displayed text equals `label`
    async fn select_by_label(&self, element: &ElementHandle, label: &str) -> Result<()>;

    /// Start recording click/input/select/history events inside the page.
    async fn install_instrumentation(&self) -> Result<()>;

    async fn set_instrumentation_paused(&self, paused: bool) -> Result<()>;

    /// Disable instrumentation and hand over everything it buffered, in
    /// capture order.
    async fn take_captured(&self) -> Result<Vec<ActionRecord>>;

    /// Title plus the visible interactive elements of the current page
    async fn page_state(&self) -> Result<PageState>;

    async fn close(&self) -> Result<()>;
}

/// Opens new controlled sessions.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Open a session on `url`, failing if it is not ready within `timeout`.
    async fn launch(
        &self,
        url: &str,
        headless: bool,
        timeout: Duration,
    ) -> Result<Arc<dyn ControlledSession>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}
