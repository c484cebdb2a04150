//! Database layer for pvi
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository functions for users, tasks, logs and snapshots
//! - The SQLite implementation of [`AnalyticsStore`](crate::analytics::AnalyticsStore)

pub mod repo;
pub mod schema;

pub use repo::{to_db_time, Database, LogFilter, LogListing};
