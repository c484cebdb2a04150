//! Core domain types for pvi
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **User** | The person whose avoidance behavior is tracked; owns tasks, logs and one snapshot |
//! | **IntendedTask** | Something the user meant to work on, with a 1–5 difficulty |
//! | **LogEntry** | A stretch of avoidance activity logged against an intended task |
//! | **Window** | The trailing period (14 days by default) the analytics look at |
//! | **PVI** | The behavioral score: an unbounded raw sum and its 0–99 projection |
//! | **RootCause** | The diagnosis assigned by the ordered rule set |
//! | **Snapshot** | The single current analytics row per user, always replaced as a unit |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

// ============================================
// Users
// ============================================

/// A tracked user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// UUID v4 string
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// ============================================
// Intended tasks
// ============================================

/// Lowest allowed task difficulty.
pub const MIN_DIFFICULTY: u8 = 1;
/// Highest allowed task difficulty.
pub const MAX_DIFFICULTY: u8 = 5;

/// Lifecycle state of an intended task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Active,
    Completed,
    Archived,
}

impl TaskStatus {
    /// Convert to string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::Completed => "completed",
            TaskStatus::Archived => "archived",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TaskStatus::Active),
            "completed" => Ok(TaskStatus::Completed),
            "archived" => Ok(TaskStatus::Archived),
            other => Err(Error::InvalidInput(format!("unknown task status: {other}"))),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task the user intended to work on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntendedTask {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    /// 1 (trivial) to 5 (daunting)
    pub difficulty: u8,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

// ============================================
// Log entries
// ============================================

/// What the user did instead of the intended task.
///
/// The variant order is the canonical category order used for tie-breaks and
/// for fixed-size per-category tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    Social,
    Video,
    Gaming,
    Browsing,
    Messaging,
    Other,
}

impl ActivityCategory {
    /// All categories in canonical order.
    pub const ALL: [ActivityCategory; 6] = [
        ActivityCategory::Social,
        ActivityCategory::Video,
        ActivityCategory::Gaming,
        ActivityCategory::Browsing,
        ActivityCategory::Messaging,
        ActivityCategory::Other,
    ];

    /// Position in [`ActivityCategory::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Convert to string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityCategory::Social => "social",
            ActivityCategory::Video => "video",
            ActivityCategory::Gaming => "gaming",
            ActivityCategory::Browsing => "browsing",
            ActivityCategory::Messaging => "messaging",
            ActivityCategory::Other => "other",
        }
    }
}

impl FromStr for ActivityCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown activity category: {s}")))
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged stretch of avoidance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Row id; increases with insertion order
    pub id: i64,
    pub user_id: String,
    /// Referenced task; may no longer exist
    pub task_id: i64,
    /// Minutes spent, at least 1
    pub duration_minutes: u32,
    pub category: ActivityCategory,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A log joined with its task, if the task still resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedLog {
    pub log: LogEntry,
    pub task: Option<IntendedTask>,
}

/// A log whose task resolved; the unit the analytics stages work on.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLog {
    pub log: LogEntry,
    pub task: IntendedTask,
}

impl ResolvedLog {
    /// Effort weight of this entry: minutes times task difficulty.
    pub fn weighted_effort(&self) -> u64 {
        u64::from(self.log.duration_minutes) * u64::from(self.task.difficulty)
    }
}

// ============================================
// Analytics results
// ============================================

/// Diagnosed root cause of avoidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RootCause {
    /// Fewer than three scored logs in the window
    InsufficientData,
    /// Hard tasks fled into social/video feeds
    OverwhelmAvoidance,
    /// Passive consumption dominates regardless of task
    DoomscrollLoop,
    /// Activity keeps hopping between categories
    ContextSwitching,
    /// Easy tasks traded for games or browsing
    BoredomEscape,
    /// Very hard tasks paired with endless browsing
    PerfectionismDelay,
    /// Nothing stands out
    UnclearNextStep,
}

impl RootCause {
    /// Convert to string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            RootCause::InsufficientData => "INSUFFICIENT_DATA",
            RootCause::OverwhelmAvoidance => "OVERWHELM_AVOIDANCE",
            RootCause::DoomscrollLoop => "DOOMSCROLL_LOOP",
            RootCause::ContextSwitching => "CONTEXT_SWITCHING",
            RootCause::BoredomEscape => "BOREDOM_ESCAPE",
            RootCause::PerfectionismDelay => "PERFECTIONISM_DELAY",
            RootCause::UnclearNextStep => "UNCLEAR_NEXT_STEP",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            RootCause::InsufficientData => "Not enough data yet",
            RootCause::OverwhelmAvoidance => "Overwhelm-driven avoidance",
            RootCause::DoomscrollLoop => "Passive-consumption loop",
            RootCause::ContextSwitching => "Context-switching pattern",
            RootCause::BoredomEscape => "Boredom escape",
            RootCause::PerfectionismDelay => "Perfectionism-driven delay",
            RootCause::UnclearNextStep => "Unclear next step",
        }
    }

    /// Whether this label is an actual diagnosis rather than a fallback.
    pub fn is_diagnosis(&self) -> bool {
        !matches!(
            self,
            RootCause::InsufficientData | RootCause::UnclearNextStep
        )
    }
}

impl FromStr for RootCause {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSUFFICIENT_DATA" => Ok(RootCause::InsufficientData),
            "OVERWHELM_AVOIDANCE" => Ok(RootCause::OverwhelmAvoidance),
            "DOOMSCROLL_LOOP" => Ok(RootCause::DoomscrollLoop),
            "CONTEXT_SWITCHING" => Ok(RootCause::ContextSwitching),
            "BOREDOM_ESCAPE" => Ok(RootCause::BoredomEscape),
            "PERFECTIONISM_DELAY" => Ok(RootCause::PerfectionismDelay),
            "UNCLEAR_NEXT_STEP" => Ok(RootCause::UnclearNextStep),
            other => Err(Error::Corrupt {
                column: "root_cause",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for RootCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted analytics row for one user.
///
/// Produced whole by one recomputation and written whole; there is no API to
/// change a single field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    /// Σ duration × difficulty over the window
    pub raw_score: f64,
    /// Saturated projection of `raw_score`, 0..=99
    pub normalized_score: u8,
    pub root_cause: RootCause,
    pub computed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_storage_names() {
        for category in ActivityCategory::ALL {
            assert_eq!(category.as_str().parse::<ActivityCategory>().unwrap(), category);
            assert_eq!(ActivityCategory::ALL[category.index()], category);
        }
        assert!("podcasts".parse::<ActivityCategory>().is_err());
    }

    #[test]
    fn test_root_cause_serde_matches_storage_name() {
        let json = serde_json::to_string(&RootCause::OverwhelmAvoidance).unwrap();
        assert_eq!(json, "\"OVERWHELM_AVOIDANCE\"");
        assert_eq!(
            "DOOMSCROLL_LOOP".parse::<RootCause>().unwrap(),
            RootCause::DoomscrollLoop
        );
        assert!(matches!(
            "LAZINESS".parse::<RootCause>(),
            Err(Error::Corrupt { .. })
        ));
    }

    #[test]
    fn test_fallback_labels_are_not_diagnoses() {
        assert!(!RootCause::InsufficientData.is_diagnosis());
        assert!(!RootCause::UnclearNextStep.is_diagnosis());
        assert!(RootCause::BoredomEscape.is_diagnosis());
    }

    #[test]
    fn test_task_status_default_is_active() {
        assert_eq!(TaskStatus::default(), TaskStatus::Active);
        assert_eq!("archived".parse::<TaskStatus>().unwrap(), TaskStatus::Archived);
    }
}
