//! Re-locates a recorded target in the live document.
//!
//! Strategies run in a fixed order, most precise first. Each strategy turns the
//! descriptor into at most one [`Lookup`]; only the first document-order match
//! of a lookup is considered, and it must be visible and enabled to win.

use std::time::{Duration, Instant};

use crate::browser::{ControlledSession, ElementHandle, Lookup};
use crate::error::{EngineError, EngineResult};
use crate::models::TargetDescriptor;

/// Text shorter than this is too generic to identify an element
const MIN_TEXT_LEN: usize = 3;
/// Long text is usually a container's content, not a label
const MAX_TEXT_LEN: usize = 80;

const RETRY_INTERVAL: Duration = Duration::from_millis(100);

pub type Strategy = fn(&TargetDescriptor) -> Option<Lookup>;

/// Resolution order.
pub const STRATEGY_CHAIN: &[Strategy] = &[
    by_structural_path,
    by_element_id,
    by_visible_text,
    by_placeholder,
    by_first_class,
];

fn by_structural_path(target: &TargetDescriptor) -> Option<Lookup> {
    let path = target.structural_path.trim();
    (!path.is_empty()).then(|| Lookup::StructuralPath(path.to_string()))
}

fn by_element_id(target: &TargetDescriptor) -> Option<Lookup> {
    target.element_id.clone().map(Lookup::ElementId)
}

fn by_visible_text(target: &TargetDescriptor) -> Option<Lookup> {
    let text = target.visible_text.as_deref()?.trim();
    let len = text.chars().count();
    (len >= MIN_TEXT_LEN && len <= MAX_TEXT_LEN).then(|| Lookup::TextContains(text.to_string()))
}

fn by_placeholder(target: &TargetDescriptor) -> Option<Lookup> {
    target.placeholder_hint.clone().map(Lookup::PlaceholderEquals)
}

fn by_first_class(target: &TargetDescriptor) -> Option<Lookup> {
    target.first_class().map(|class| Lookup::ClassToken(class.to_string()))
}

/// Lookups for a descriptor, in the order they will be tried.
pub fn lookups_for(target: &TargetDescriptor) -> Vec<Lookup> {
    STRATEGY_CHAIN
        .iter()
        .filter_map(|strategy| strategy(target))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub element: ElementHandle,
    /// Name of the winning strategy
    pub strategy: &'static str,
}

#[derive(Debug, Clone)]
pub struct ElementResolver {
    timeout: Duration,
}

impl ElementResolver {
    /// `timeout` bounds the wait for a candidate to appear; zero means one pass.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn resolve(
        &self,
        session: &dyn ControlledSession,
        target: &TargetDescriptor,
    ) -> EngineResult<Resolved> {
        let lookups = lookups_for(target);
        let started = Instant::now();

        loop {
            if let Some(resolved) = Self::resolve_once(session, &lookups).await {
                tracing::debug!(
                    "Resolved {} via {}",
                    target.label(),
                    resolved.strategy
                );
                return Ok(resolved);
            }

            if started.elapsed() >= self.timeout {
                return Err(EngineError::ElementNotFound(target.label()));
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    async fn resolve_once(session: &dyn ControlledSession, lookups: &[Lookup]) -> Option<Resolved> {
        for lookup in lookups {
            let candidates = match session.find_candidates(lookup).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::debug!("Lookup {} failed: {}", lookup, e);
                    continue;
                }
            };

            match candidates.into_iter().next() {
                Some(first) if first.is_interactable() => {
                    return Some(Resolved {
                        element: first,
                        strategy: lookup.strategy_name(),
                    });
                }
                Some(_) => tracing::debug!("Lookup {} matched a hidden or disabled element", lookup),
                None => {}
            }
        }
        None
    }
}
