//! Analytics engine for pvi
//!
//! Turns a user's log history into the persisted snapshot:
//!
//! - [`window`] pulls the trailing window and resolves each log's task
//! - [`normalizer`] reduces Σ duration × difficulty to a 0–99 score
//! - [`classifier`] assigns one root cause with an ordered rule list
//! - [`recompute`] runs the three and writes the snapshot back as one unit
//!
//! Storage is reached only through the [`AnalyticsStore`] trait. [`summary`]
//! holds the history-wide stats and chart series shown next to the snapshot.

pub mod classifier;
pub mod normalizer;
pub mod recompute;
pub mod store;
pub mod summary;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::{classify, RootCauseFeatures, Rule, MIN_LOGS_FOR_DIAGNOSIS, RULES};
pub use normalizer::{normalize, PviScore, MAX_SCORE, SATURATION_K};
pub use recompute::{recompute_with, AnalyticsRecomputer, AnalyticsResult, UserLocks};
pub use store::AnalyticsStore;
pub use summary::{AnalyticsSummary, ChartData, LogStats, TimeOfDay};
pub use window::{aggregate, DEFAULT_WINDOW_DAYS};
