//! Summary statistics and chart series over a user's logs.
//!
//! Unlike the scoring pipeline these look at every log the user has, not just
//! the trailing window, and they do not need the task to resolve.

use crate::types::{ActivityCategory, AnalyticsSnapshot, LogEntry};
use chrono::{NaiveDate, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of most recent active days in the minutes trend.
pub const TREND_DAYS: usize = 14;

/// Totals over a user's full log history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogStats {
    /// Number of logs
    pub total_logs: usize,
    /// Sum of logged minutes
    pub total_minutes: u64,
    /// Mean minutes per log, rounded; 0 with no logs
    pub average_session_minutes: u64,
    /// Most frequent category; ties go to the earlier category
    pub top_activity: Option<ActivityCategory>,
}

impl LogStats {
    pub fn from_logs(logs: &[LogEntry]) -> Self {
        let total_logs = logs.len();
        let total_minutes: u64 = logs.iter().map(|l| u64::from(l.duration_minutes)).sum();

        let average_session_minutes = if total_logs == 0 {
            0
        } else {
            (total_minutes as f64 / total_logs as f64).round() as u64
        };

        let counts = category_counts(logs);
        let mut top_activity: Option<(ActivityCategory, usize)> = None;
        for category in ActivityCategory::ALL {
            let count = counts[category.index()];
            if count == 0 {
                continue;
            }
            match top_activity {
                Some((_, best)) if best >= count => {}
                _ => top_activity = Some((category, count)),
            }
        }

        Self {
            total_logs,
            total_minutes,
            average_session_minutes,
            top_activity: top_activity.map(|(c, _)| c),
        }
    }
}

/// Current snapshot together with history totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    /// `None` until the first recomputation
    pub snapshot: Option<AnalyticsSnapshot>,
    pub stats: LogStats,
}

/// Coarse time-of-day bucket, by UTC hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    /// 00:00–05:59
    Night,
    /// 06:00–11:59
    Morning,
    /// 12:00–17:59
    Afternoon,
    /// 18:00–23:59
    Evening,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 4] = [
        TimeOfDay::Night,
        TimeOfDay::Morning,
        TimeOfDay::Afternoon,
        TimeOfDay::Evening,
    ];

    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=5 => TimeOfDay::Night,
            6..=11 => TimeOfDay::Morning,
            12..=17 => TimeOfDay::Afternoon,
            _ => TimeOfDay::Evening,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeOfDay::Night => "Night (0-6)",
            TimeOfDay::Morning => "Morning (6-12)",
            TimeOfDay::Afternoon => "Afternoon (12-18)",
            TimeOfDay::Evening => "Evening (18-24)",
        }
    }

    fn index(&self) -> usize {
        match self {
            TimeOfDay::Night => 0,
            TimeOfDay::Morning => 1,
            TimeOfDay::Afternoon => 2,
            TimeOfDay::Evening => 3,
        }
    }
}

/// Number of logs recorded in one activity category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: ActivityCategory,
    pub count: usize,
}

/// Number of logs that fell in one time-of-day bucket (UTC).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeOfDayCount {
    pub bucket: TimeOfDay,
    pub count: usize,
}

/// Total minutes logged on one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyMinutes {
    pub date: NaiveDate,
    pub minutes: u64,
}

/// Series for the activity charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartData {
    /// Logs per category, categories without logs omitted
    pub activity_breakdown: Vec<CategoryCount>,
    /// Logs per bucket, all four buckets present
    pub time_of_day: Vec<TimeOfDayCount>,
    /// Minutes per UTC day, oldest first, at most [`TREND_DAYS`] days
    pub daily_trend: Vec<DailyMinutes>,
}

impl ChartData {
    pub fn from_logs(logs: &[LogEntry]) -> Self {
        let counts = category_counts(logs);
        let activity_breakdown = ActivityCategory::ALL
            .iter()
            .filter(|c| counts[c.index()] > 0)
            .map(|c| CategoryCount {
                category: *c,
                count: counts[c.index()],
            })
            .collect();

        let mut buckets = [0usize; 4];
        for log in logs {
            buckets[TimeOfDay::from_hour(log.created_at.hour()).index()] += 1;
        }
        let time_of_day = TimeOfDay::ALL
            .iter()
            .map(|b| TimeOfDayCount {
                bucket: *b,
                count: buckets[b.index()],
            })
            .collect();

        let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for log in logs {
            *per_day.entry(log.created_at.date_naive()).or_default() +=
                u64::from(log.duration_minutes);
        }
        let skip = per_day.len().saturating_sub(TREND_DAYS);
        let daily_trend = per_day
            .into_iter()
            .skip(skip)
            .map(|(date, minutes)| DailyMinutes { date, minutes })
            .collect();

        Self {
            activity_breakdown,
            time_of_day,
            daily_trend,
        }
    }
}

fn category_counts(logs: &[LogEntry]) -> [usize; 6] {
    let mut counts = [0usize; 6];
    for log in logs {
        counts[log.category.index()] += 1;
    }
    counts
}
