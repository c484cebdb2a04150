//! Windowed log aggregation
//!
//! Pulls one user's logs from the trailing window and drops the ones whose
//! task no longer resolves. The output is oldest first with ties broken by log
//! id; context-switch counting depends on that order.

use crate::analytics::store::AnalyticsStore;
use crate::error::Result;
use crate::types::ResolvedLog;
use chrono::{DateTime, Duration, Utc};

/// Default trailing window length in days.
pub const DEFAULT_WINDOW_DAYS: i64 = 14;

/// Fetch the user's scored logs in `[now - window, now]`.
///
/// Logs with a dangling task reference are skipped, not reported as errors.
pub fn aggregate<S: AnalyticsStore + ?Sized>(
    store: &S,
    user_id: &str,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<Vec<ResolvedLog>> {
    let start = now - window;
    let fetched = store.fetch_logs_in_window(user_id, start, now)?;
    let fetched_count = fetched.len();

    let mut resolved: Vec<ResolvedLog> = fetched
        .into_iter()
        .filter(|w| w.log.user_id == user_id)
        .filter(|w| w.log.created_at >= start && w.log.created_at <= now)
        .filter_map(|w| w.task.map(|task| ResolvedLog { log: w.log, task }))
        .collect();

    resolved.sort_by(|a, b| {
        a.log
            .created_at
            .cmp(&b.log.created_at)
            .then(a.log.id.cmp(&b.log.id))
    });

    let excluded = fetched_count - resolved.len();
    if excluded > 0 {
        tracing::debug!(
            user_id,
            excluded,
            "Skipping logs outside the window or with unresolved tasks"
        );
    }

    Ok(resolved)
}
