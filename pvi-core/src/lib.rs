//! # pvi-core
//!
//! Core library for pvi - a procrastination tracker that scores logged
//! avoidance against intended tasks.
//!
//! This library provides:
//! - Domain types for users, intended tasks, log entries and snapshots
//! - Database storage layer with SQLite
//! - The analytics engine (windowed aggregation, PVI score, root cause)
//! - The mutation layer that keeps each user's snapshot current
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through two layers:
//! - **Records:** users, tasks and logs, written through [`Tracker`]
//! - **Snapshot:** one derived analytics row per user, rebuilt by the
//!   [`analytics`] engine after every log mutation
//!
//! ## Example
//!
//! ```rust,no_run
//! use pvi_core::{ActivityCategory, Config, NewLog, NewTask, Tracker};
//!
//! let config = Config::load().expect("failed to load config");
//! let tracker = Tracker::open(&config).expect("failed to open database");
//!
//! let user = tracker.create_user("Ada").expect("failed to create user");
//! let task = tracker
//!     .create_task(&user.id, NewTask { title: "Write report".into(), difficulty: 4 })
//!     .expect("failed to create task");
//! let (_, snapshot) = tracker
//!     .create_log(
//!         &user.id,
//!         NewLog {
//!             task_id: task.id,
//!             duration_minutes: 45,
//!             category: ActivityCategory::Video,
//!             detail: None,
//!             logged_at: None,
//!         },
//!     )
//!     .expect("failed to log");
//! println!("PVI {} ({})", snapshot.normalized_score, snapshot.root_cause);
//! ```

// Re-export commonly used items at the crate root
pub use analytics::{AnalyticsResult, AnalyticsSummary, ChartData};
pub use config::Config;
pub use db::{Database, LogFilter, LogListing};
pub use error::{Error, Result};
pub use tracker::{LogUpdate, NewLog, NewTask, TaskUpdate, Tracker};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod tracker;
pub mod types;
