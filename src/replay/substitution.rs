use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::error::{EngineError, EngineResult};
use crate::models::RunData;

/// Placeholder names every replay recognizes, whether or not run data supplies them.
pub const DEFAULT_VOCABULARY: &[&str] = &[
    "email",
    "password",
    "hotel_name",
    "hotel_address",
    "hotel_type",
    "city",
    "phone",
    "website",
    "contact_name",
    "contact_email",
];

/// What to do with a `{{token}}` that is neither in the vocabulary nor in run data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderPolicy {
    /// Leave the token in the value verbatim
    #[default]
    PassThrough,
    /// Fail the step with [`EngineError::Substitution`]
    Strict,
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").expect("placeholder pattern is valid")
    })
}

/// Rewrites captured values with run data.
#[derive(Debug, Clone)]
pub struct Substitutor {
    vocabulary: HashSet<String>,
    policy: PlaceholderPolicy,
}

impl Substitutor {
    pub fn new(extra_placeholders: &[String], policy: PlaceholderPolicy) -> Self {
        let vocabulary = DEFAULT_VOCABULARY
            .iter()
            .map(|name| name.to_string())
            .chain(extra_placeholders.iter().cloned())
            .collect();
        Self { vocabulary, policy }
    }

    /// Replace every recognized token in one pass. Substituted text is never
    /// rescanned, so run data containing `{{...}}` is entered literally.
    pub fn substitute(&self, captured: &str, data: &RunData) -> EngineResult<String> {
        if !placeholder_regex().is_match(captured) {
            return Ok(captured.to_string());
        }

        let mut unknown = Vec::new();
        let result = placeholder_regex().replace_all(captured, |caps: &regex::Captures| {
            let name = &caps[1];
            if let Some(value) = data.get(name) {
                value.to_string()
            } else if self.vocabulary.contains(name) {
                String::new()
            } else {
                if !unknown.iter().any(|u| u == name) {
                    unknown.push(name.to_string());
                }
                caps[0].to_string()
            }
        });

        if !unknown.is_empty() {
            match self.policy {
                PlaceholderPolicy::Strict => return Err(EngineError::Substitution(unknown)),
                PlaceholderPolicy::PassThrough => {
                    tracing::debug!("Leaving unknown placeholders in place: {}", unknown.join(", "));
                }
            }
        }

        Ok(result.into_owned())
    }

}

impl Default for Substitutor {
    fn default() -> Self {
        Self::new(&[], PlaceholderPolicy::PassThrough)
    }
}
