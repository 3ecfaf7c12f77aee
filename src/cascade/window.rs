// src/cascade/window.rs
//! Time-window filter with the unknown-timestamp recovery rule.

use crate::api::Story;

const HOUR_MS: i64 = 3_600_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOutcome {
    pub stories: Vec<Story>,
    /// True when the recovery rule produced `stories`.
    pub recovered: bool,
    /// Stories dropped (input size minus output size).
    pub dropped: usize,
}

fn is_fresh(story: &Story, cutoff_ms: i64) -> bool {
    story
        .articles
        .iter()
        .filter_map(|a| a.published_at_ms)
        .any(|ts| ts >= cutoff_ms)
}

/// Keep stories with at least one article published at or after `now - window`.
///
/// If that leaves nothing, restore (once) the stories whose articles all have
/// unknown timestamps, capped at `recovery_cap`.
pub fn apply_window(
    stories: Vec<Story>,
    window_hours: u32,
    now_ms: i64,
    recovery_cap: usize,
) -> WindowOutcome {
    let total = stories.len();
    let cutoff_ms = now_ms.saturating_sub(i64::from(window_hours).saturating_mul(HOUR_MS));

    let (fresh, rest): (Vec<Story>, Vec<Story>) =
        stories.into_iter().partition(|s| is_fresh(s, cutoff_ms));
    if !fresh.is_empty() {
        return WindowOutcome {
            dropped: total - fresh.len(),
            stories: fresh,
            recovered: false,
        };
    }

    let restored: Vec<Story> = rest
        .into_iter()
        .filter(Story::has_only_unknown_times)
        .take(recovery_cap)
        .collect();
    let recovered = !restored.is_empty();
    if recovered {
        tracing::debug!(
            target: "harvest",
            restored = restored.len(),
            "window filter emptied result; restored stories without timestamps"
        );
    }
    WindowOutcome {
        dropped: total - restored.len(),
        stories: restored,
        recovered,
    }
}
