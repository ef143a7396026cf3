use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Location-independent description of the element an action touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
    /// Lower-case tag name (`input`, `button`, ...)
    pub tag_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    /// Class tokens, split on whitespace
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub css_classes: Vec<String>,
    /// Trimmed inner text, capped at capture time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder_hint: Option<String>,
    /// Positional XPath from the document root, e.g. `/html[1]/body[1]/form[1]/input[2]`
    pub structural_path: String,
    pub source_url: String,
}

impl TargetDescriptor {
    pub fn new(tag_kind: impl Into<String>, structural_path: impl Into<String>) -> Self {
        Self {
            tag_kind: tag_kind.into(),
            element_id: None,
            css_classes: Vec::new(),
            visible_text: None,
            placeholder_hint: None,
            structural_path: structural_path.into(),
            source_url: String::new(),
        }
    }

    /// Drop empty strings captured from the page so that "absent" has one spelling.
    pub fn normalized(mut self) -> Self {
        fn non_empty(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        self.element_id = non_empty(self.element_id);
        self.visible_text = non_empty(self.visible_text);
        self.placeholder_hint = non_empty(self.placeholder_hint);
        self.css_classes.retain(|class| !class.trim().is_empty());
        self
    }

    pub fn first_class(&self) -> Option<&str> {
        self.css_classes.first().map(String::as_str)
    }

    /// Short label used in logs and previews
    pub fn label(&self) -> String {
        if let Some(id) = &self.element_id {
            return format!("{}#{}", self.tag_kind, id);
        }
        if let Some(text) = &self.visible_text {
            return format!("{} '{}'", self.tag_kind, truncate(text, 30));
        }
        if let Some(placeholder) = &self.placeholder_hint {
            return format!("{} [{}]", self.tag_kind, truncate(placeholder, 30));
        }
        self.structural_path.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputAction {
    #[serde(flatten)]
    pub target: TargetDescriptor,
    /// Raw text as typed, possibly containing `{{placeholder}}` tokens
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectAction {
    #[serde(flatten)]
    pub target: TargetDescriptor,
    /// Option value chosen at capture time
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_label: Option<String>,
}

/// Snapshot of the interactive elements on a page, taken on demand by the
/// manual recorder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub elements: Vec<ElementSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    /// `input`, `button`, `link` or `select`
    pub role: String,
    #[serde(flatten)]
    pub target: TargetDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

/// Kind-specific payload of an action record. Serialized with a `type`
/// discriminator and the target descriptor fields flattened alongside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Navigation,
    Click(TargetDescriptor),
    Input(InputAction),
    Select(SelectAction),
    PageState(PageState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Navigation,
    Click,
    Input,
    Select,
    PageState,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Navigation => "navigation",
            ActionKind::Click => "click",
            ActionKind::Input => "input",
            ActionKind::Select => "select",
            ActionKind::PageState => "page_state",
        };
        f.write_str(name)
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Navigation => ActionKind::Navigation,
            Action::Click(_) => ActionKind::Click,
            Action::Input(_) => ActionKind::Input,
            Action::Select(_) => ActionKind::Select,
            Action::PageState(_) => ActionKind::PageState,
        }
    }

    pub fn target(&self) -> Option<&TargetDescriptor> {
        match self {
            Action::Click(target) => Some(target),
            Action::Input(input) => Some(&input.target),
            Action::Select(select) => Some(&select.target),
            Action::Navigation | Action::PageState(_) => None,
        }
    }

    /// Apply [`TargetDescriptor::normalized`] to the target, if any.
    pub fn normalized(self) -> Self {
        match self {
            Action::Click(target) => Action::Click(target.normalized()),
            Action::Input(mut input) => {
                input.target = input.target.normalized();
                Action::Input(input)
            }
            Action::Select(mut select) => {
                select.target = select.target.normalized();
                Action::Select(select)
            }
            other => other,
        }
    }

    pub fn captured_value(&self) -> Option<&str> {
        match self {
            Action::Input(input) => Some(&input.value),
            Action::Select(select) => Some(&select.value),
            _ => None,
        }
    }
}

/// One captured interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    #[serde(flatten)]
    pub action: Action,
    /// Milliseconds since the Unix epoch. Ordering and diagnostics only.
    #[serde(default)]
    pub timestamp: i64,
    /// Page active when the action happened; the destination for navigations
    pub url: String,
}

impl ActionRecord {
    pub fn navigation(url: impl Into<String>, timestamp: i64) -> Self {
        Self {
            action: Action::Navigation,
            timestamp,
            url: url.into(),
        }
    }

    pub fn new(action: Action, url: impl Into<String>, timestamp: i64) -> Self {
        Self {
            action,
            timestamp,
            url: url.into(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    pub fn is_navigation(&self) -> bool {
        matches!(self.action, Action::Navigation)
    }

    /// One-line description for previews
    pub fn describe(&self) -> String {
        match &self.action {
            Action::Navigation => format!("navigation: {}", truncate(&self.url, 60)),
            Action::Click(target) => format!("click: {}", target.label()),
            Action::Input(input) => format!(
                "input: {} <- '{}'",
                input.target.label(),
                truncate(&input.value, 50)
            ),
            Action::Select(select) => format!(
                "select: {} <- '{}'",
                select.target.label(),
                truncate(select.selected_label.as_deref().unwrap_or(&select.value), 50)
            ),
            Action::PageState(state) => format!(
                "page_state: '{}' ({} elements)",
                truncate(&state.title, 40),
                state.elements.len()
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordingType {
    #[default]
    Automatic,
    Manual,
}

/// A frozen, ordered sequence of action records plus metadata.
///
/// Built once when capture stops and never mutated afterwards; `total_actions`
/// is always derived from the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RecordingFile", try_from = "RecordingFile")]
pub struct Recording {
    platform: String,
    recording_type: RecordingType,
    start_url: String,
    created_at: DateTime<Utc>,
    actions: Vec<ActionRecord>,
}

impl Recording {
    pub fn new(
        platform: impl Into<String>,
        recording_type: RecordingType,
        start_url: impl Into<String>,
        created_at: DateTime<Utc>,
        actions: Vec<ActionRecord>,
    ) -> Self {
        Self {
            platform: platform.into(),
            recording_type,
            start_url: start_url.into(),
            created_at,
            actions,
        }
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn recording_type(&self) -> RecordingType {
        self.recording_type
    }

    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn actions(&self) -> &[ActionRecord] {
        &self.actions
    }

    pub fn total_actions(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// URL a replay session should open first: the recorded start URL, else the
    /// first navigation target.
    pub fn entry_url(&self) -> Option<&str> {
        if !self.start_url.is_empty() {
            return Some(&self.start_url);
        }
        self.actions
            .iter()
            .find(|record| record.is_navigation())
            .map(|record| record.url.as_str())
    }

    /// Human-readable summary listing the first ten actions.
    pub fn preview(&self, id: &RecordingId) -> String {
        let mut lines = vec![
            format!("Recording: {}", id),
            format!("Platform: {}", self.platform),
            format!("Created: {}", self.created_at.to_rfc3339()),
            format!("Actions: {}", self.total_actions()),
            String::new(),
        ];

        for (i, record) in self.actions.iter().take(PREVIEW_LIMIT).enumerate() {
            lines.push(format!("{}. {}", i + 1, record.describe()));
        }

        if self.actions.len() > PREVIEW_LIMIT {
            lines.push(format!(
                "... and {} more actions",
                self.actions.len() - PREVIEW_LIMIT
            ));
        }

        lines.join("\n")
    }
}

const PREVIEW_LIMIT: usize = 10;

/// On-disk shape of a recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingFile {
    pub platform: String,
    #[serde(default)]
    pub recording_type: RecordingType,
    #[serde(default)]
    pub start_url: String,
    pub created_at: DateTime<Utc>,
    pub total_actions: usize,
    pub actions: Vec<ActionRecord>,
}

impl From<Recording> for RecordingFile {
    fn from(recording: Recording) -> Self {
        Self {
            total_actions: recording.actions.len(),
            platform: recording.platform,
            recording_type: recording.recording_type,
            start_url: recording.start_url,
            created_at: recording.created_at,
            actions: recording.actions,
        }
    }
}

impl TryFrom<RecordingFile> for Recording {
    type Error = String;

    fn try_from(file: RecordingFile) -> Result<Self, Self::Error> {
        if file.total_actions != file.actions.len() {
            return Err(format!(
                "totalActions is {} but {} actions are stored",
                file.total_actions,
                file.actions.len()
            ));
        }
        Ok(Self {
            platform: file.platform,
            recording_type: file.recording_type,
            start_url: file.start_url,
            created_at: file.created_at,
            actions: file.actions,
        })
    }
}

/// Persisted identity of a recording (the file stem in the store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(String);

impl RecordingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordingId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Listing entry; built without deserializing the action bodies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingSummary {
    pub id: RecordingId,
    pub platform: String,
    pub recording_type: RecordingType,
    pub start_url: String,
    pub created_at: DateTime<Utc>,
    pub total_actions: usize,
}

/// Per-replay mapping of placeholder names to literal values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunData(HashMap<String, String>);

impl RunData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts arbitrary JSON values; non-strings are rendered with their JSON text.
    pub fn from_json(values: HashMap<String, Value>) -> Self {
        values
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RunData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
