//! Storage seam for the analytics engine
//!
//! The engine never talks SQL directly; it reads windowed logs and writes
//! snapshots through [`AnalyticsStore`]. The SQLite layer implements it for
//! both [`Database`](crate::db::Database) and a bare `rusqlite::Connection`
//! (which is what a transaction derefs to).

use crate::error::Result;
use crate::types::{AnalyticsSnapshot, WindowedLog};
use chrono::{DateTime, Utc};

/// Data access the analytics engine needs.
pub trait AnalyticsStore {
    /// Logs of `user_id` created within `[start, end]`, each with its task if
    /// the task still exists.
    ///
    /// Implementations should return them oldest first; the aggregator sorts
    /// again regardless.
    fn fetch_logs_in_window(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WindowedLog>>;

    /// Replace the user's snapshot. All fields must become visible together.
    fn write_snapshot(&self, user_id: &str, snapshot: &AnalyticsSnapshot) -> Result<()>;

    /// The user's current snapshot, or `None` if it was never computed.
    fn get_snapshot(&self, user_id: &str) -> Result<Option<AnalyticsSnapshot>>;
}

impl<S: AnalyticsStore + ?Sized> AnalyticsStore for &S {
    fn fetch_logs_in_window(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WindowedLog>> {
        (**self).fetch_logs_in_window(user_id, start, end)
    }

    fn write_snapshot(&self, user_id: &str, snapshot: &AnalyticsSnapshot) -> Result<()> {
        (**self).write_snapshot(user_id, snapshot)
    }

    fn get_snapshot(&self, user_id: &str) -> Result<Option<AnalyticsSnapshot>> {
        (**self).get_snapshot(user_id)
    }
}

impl<S: AnalyticsStore + ?Sized> AnalyticsStore for std::sync::Arc<S> {
    fn fetch_logs_in_window(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WindowedLog>> {
        (**self).fetch_logs_in_window(user_id, start, end)
    }

    fn write_snapshot(&self, user_id: &str, snapshot: &AnalyticsSnapshot) -> Result<()> {
        (**self).write_snapshot(user_id, snapshot)
    }

    fn get_snapshot(&self, user_id: &str) -> Result<Option<AnalyticsSnapshot>> {
        (**self).get_snapshot(user_id)
    }
}
