//! Root-cause classification
//!
//! Computes a small feature set over a window of resolved logs and runs an
//! ordered rule list over it. The first rule that matches decides the label;
//! later rules are never consulted, so an input that satisfies several rules is
//! always labeled by the earliest one.
//!
//! ## Features
//!
//! | Feature | Definition |
//! |---------|------------|
//! | `count` | Number of resolved logs |
//! | `fraction(c)` | Logs in category `c` / `count` (by entry, not by minutes) |
//! | `average_difficulty` | Mean task difficulty over entries |
//! | `context_switch_ratio` | Adjacent pairs whose category differs / `count` |
//!
//! ## Rules
//!
//! | # | Condition | Label |
//! |---|-----------|-------|
//! | 1 | `count < 3` | `InsufficientData` |
//! | 2 | `avg ≥ 3.5` and `social + video > 0.6` | `OverwhelmAvoidance` |
//! | 3 | `social + video + browsing > 0.7` | `DoomscrollLoop` |
//! | 4 | `context_switch_ratio > 0.6` | `ContextSwitching` |
//! | 5 | `avg < 2.5` and `gaming + browsing > 0.5` | `BoredomEscape` |
//! | 6 | `avg > 4` and `browsing > 0.5` | `PerfectionismDelay` |
//! | – | otherwise | `UnclearNextStep` |

use crate::types::{ActivityCategory, ResolvedLog, RootCause};
use serde::Serialize;

/// Minimum number of logs before any diagnosis is attempted.
pub const MIN_LOGS_FOR_DIAGNOSIS: usize = 3;

/// Aggregate features the rules look at.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RootCauseFeatures {
    pub count: usize,
    /// Per-category entry counts, indexed by [`ActivityCategory::index`]
    pub category_counts: [usize; 6],
    pub average_difficulty: f64,
    pub context_switches: usize,
}

impl RootCauseFeatures {
    /// Derive features from a chronologically ordered window.
    pub fn from_logs(logs: &[ResolvedLog]) -> Self {
        let mut category_counts = [0usize; 6];
        for entry in logs {
            category_counts[entry.log.category.index()] += 1;
        }

        let context_switches = logs
            .windows(2)
            .filter(|pair| pair[0].log.category != pair[1].log.category)
            .count();

        let average_difficulty = if logs.is_empty() {
            0.0
        } else {
            let total: u64 = logs.iter().map(|l| u64::from(l.task.difficulty)).sum();
            total as f64 / logs.len() as f64
        };

        Self {
            count: logs.len(),
            category_counts,
            average_difficulty,
            context_switches,
        }
    }

    /// Share of entries in `category`; zero when there are no entries.
    pub fn fraction(&self, category: ActivityCategory) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.category_counts[category.index()] as f64 / self.count as f64
    }

    /// Summed share of several categories.
    pub fn combined_fraction(&self, categories: &[ActivityCategory]) -> f64 {
        categories.iter().map(|c| self.fraction(*c)).sum()
    }

    /// Category changes between neighbours, per entry.
    pub fn context_switch_ratio(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.context_switches as f64 / self.count as f64
    }
}

/// One diagnostic rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    TooFewLogs,
    Overwhelm,
    PassiveConsumption,
    HighSwitching,
    Boredom,
    Perfectionism,
}

/// Evaluation order. Reordering changes labels for ambiguous inputs.
pub const RULES: [Rule; 6] = [
    Rule::TooFewLogs,
    Rule::Overwhelm,
    Rule::PassiveConsumption,
    Rule::HighSwitching,
    Rule::Boredom,
    Rule::Perfectionism,
];

impl Rule {
    /// Whether this rule fires for `f`.
    pub fn matches(&self, f: &RootCauseFeatures) -> bool {
        use crate::types::ActivityCategory::*;

        match self {
            Rule::TooFewLogs => f.count < MIN_LOGS_FOR_DIAGNOSIS,
            Rule::Overwhelm => {
                f.average_difficulty >= 3.5 && f.combined_fraction(&[Social, Video]) > 0.6
            }
            Rule::PassiveConsumption => f.combined_fraction(&[Social, Video, Browsing]) > 0.7,
            Rule::HighSwitching => f.context_switch_ratio() > 0.6,
            Rule::Boredom => {
                f.average_difficulty < 2.5 && f.combined_fraction(&[Gaming, Browsing]) > 0.5
            }
            Rule::Perfectionism => f.average_difficulty > 4.0 && f.fraction(Browsing) > 0.5,
        }
    }

    /// Label assigned when this rule fires.
    pub fn label(&self) -> RootCause {
        match self {
            Rule::TooFewLogs => RootCause::InsufficientData,
            Rule::Overwhelm => RootCause::OverwhelmAvoidance,
            Rule::PassiveConsumption => RootCause::DoomscrollLoop,
            Rule::HighSwitching => RootCause::ContextSwitching,
            Rule::Boredom => RootCause::BoredomEscape,
            Rule::Perfectionism => RootCause::PerfectionismDelay,
        }
    }
}

/// Label a feature set with the first matching rule.
pub fn classify_features(features: &RootCauseFeatures) -> RootCause {
    RULES
        .iter()
        .find(|rule| rule.matches(features))
        .map(Rule::label)
        .unwrap_or(RootCause::UnclearNextStep)
}

/// Label a chronologically ordered window of logs.
pub fn classify(logs: &[ResolvedLog]) -> RootCause {
    classify_features(&RootCauseFeatures::from_logs(logs))
}
