//! Combines the in-session and poller buffers into one action sequence.

use crate::models::{Action, ActionRecord};

/// Merge both buffers into the final recorded sequence.
///
/// 1. Interleave by timestamp. Each buffer keeps its own order; on equal
///    timestamps the in-session record comes first.
/// 2. Collapse consecutive inputs on the same element to the last value.
/// 3. Drop navigations to the URL of the most recently retained navigation
///    (seeded with `start_url`), keeping the first occurrence.
pub fn merge_buffers(
    in_session: Vec<ActionRecord>,
    polled: Vec<ActionRecord>,
    start_url: Option<&str>,
) -> Vec<ActionRecord> {
    let merged = interleave_by_timestamp(in_session, polled);
    let consolidated = consolidate_inputs(merged);
    dedup_navigations(consolidated, start_url)
}

fn interleave_by_timestamp(first: Vec<ActionRecord>, second: Vec<ActionRecord>) -> Vec<ActionRecord> {
    let mut merged = Vec::with_capacity(first.len() + second.len());
    let mut first = first.into_iter().peekable();
    let mut second = second.into_iter().peekable();

    loop {
        let take_second = match (first.peek(), second.peek()) {
            (Some(a), Some(b)) => b.timestamp < a.timestamp,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_second { second.next() } else { first.next() };
        merged.extend(next);
    }

    merged
}

/// Typing produces one event per keystroke; keep only the final value.
fn consolidate_inputs(records: Vec<ActionRecord>) -> Vec<ActionRecord> {
    let mut result: Vec<ActionRecord> = Vec::with_capacity(records.len());

    for record in records {
        let same_field = match (result.last().map(|prev| &prev.action), &record.action) {
            (Some(Action::Input(previous)), Action::Input(current)) => {
                previous.target.structural_path == current.target.structural_path
            }
            _ => false,
        };
        if same_field {
            result.pop();
        }
        result.push(record);
    }

    result
}

fn dedup_navigations(records: Vec<ActionRecord>, start_url: Option<&str>) -> Vec<ActionRecord> {
    let mut last_url: Option<String> = start_url.map(str::to_string);

    records
        .into_iter()
        .filter(|record| {
            if !record.is_navigation() {
                return true;
            }
            if last_url.as_deref() == Some(record.url.as_str()) {
                tracing::debug!("Dropping duplicate navigation to {}", record.url);
                return false;
            }
            last_url = Some(record.url.clone());
            true
        })
        .collect()
}
