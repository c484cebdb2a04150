//! Text and JSON rendering for command results.

use anyhow::Result;
use pvi_core::{
    AnalyticsResult, AnalyticsSummary, ChartData, IntendedTask, LogEntry, LogListing, User,
};
use serde::Serialize;
use serde_json::json;

use crate::Format;

/// Width of the longest bar in text charts.
const BAR_WIDTH: usize = 30;

pub struct Printer {
    format: Format,
}

impl Printer {
    pub fn new(format: Format) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        self.format == Format::Json
    }

    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn user(&self, user: &User) -> Result<()> {
        if self.is_json() {
            return self.json(user);
        }
        println!("{}  {}", user.id, user.name);
        Ok(())
    }

    pub fn task(&self, task: &IntendedTask) -> Result<()> {
        if self.is_json() {
            return self.json(task);
        }
        println!("{}", task_line(task));
        Ok(())
    }

    pub fn tasks(&self, tasks: &[IntendedTask]) -> Result<()> {
        if self.is_json() {
            return self.json(tasks);
        }
        if tasks.is_empty() {
            println!("No tasks.");
            return Ok(());
        }
        for task in tasks {
            println!("{}", task_line(task));
        }
        Ok(())
    }

    pub fn deleted(&self, entity: &str, id: i64) -> Result<()> {
        if self.is_json() {
            return self.json(&json!({ "deleted": id }));
        }
        println!("Deleted {entity} {id}");
        Ok(())
    }

    /// A created or edited log with the snapshot it produced.
    pub fn logged(&self, log: &LogEntry, analytics: &AnalyticsResult) -> Result<()> {
        if self.is_json() {
            return self.json(&json!({ "log": log, "analytics": analytics }));
        }
        println!(
            "#{} {} min {} (task {})",
            log.id, log.duration_minutes, log.category, log.task_id
        );
        self.snapshot(Some(analytics))
    }

    pub fn logs(&self, logs: &[LogListing]) -> Result<()> {
        if self.is_json() {
            return self.json(logs);
        }
        if logs.is_empty() {
            println!("No logs.");
            return Ok(());
        }
        for entry in logs {
            let log = &entry.log;
            let task = match (&entry.task_title, entry.task_difficulty) {
                (Some(title), Some(difficulty)) => format!("{title} [{difficulty}]"),
                _ => format!("task {} (deleted)", log.task_id),
            };
            let detail = log
                .detail
                .as_deref()
                .map(|d| format!("  \"{d}\""))
                .unwrap_or_default();
            println!(
                "#{:<5} {}  {:>4} min  {:<9}  {}{}",
                log.id,
                log.created_at.format("%Y-%m-%d %H:%M"),
                log.duration_minutes,
                log.category.as_str(),
                task,
                detail
            );
        }
        Ok(())
    }

    pub fn snapshot(&self, snapshot: Option<&AnalyticsResult>) -> Result<()> {
        if self.is_json() {
            return self.json(&snapshot);
        }
        match snapshot {
            Some(s) => {
                println!("PVI score:  {} / 100 (raw {:.0})", s.normalized_score, s.raw_score);
                println!("Root cause: {} ({})", s.root_cause.display_name(), s.root_cause);
                println!("Computed:   {}", s.computed_at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            None => println!("No analytics yet. Log some activity first."),
        }
        Ok(())
    }

    pub fn summary(&self, summary: &AnalyticsSummary) -> Result<()> {
        if self.is_json() {
            return self.json(summary);
        }
        self.snapshot(summary.snapshot.as_ref())?;
        let stats = &summary.stats;
        println!();
        println!("Total logs:       {}", stats.total_logs);
        println!("Total minutes:    {}", stats.total_minutes);
        println!("Average session:  {} min", stats.average_session_minutes);
        println!(
            "Top activity:     {}",
            stats
                .top_activity
                .map(|c| c.as_str())
                .unwrap_or("-")
        );
        Ok(())
    }

    pub fn charts(&self, charts: &ChartData) -> Result<()> {
        if self.is_json() {
            return self.json(charts);
        }

        println!("Activity breakdown");
        let max = charts.activity_breakdown.iter().map(|c| c.count as u64).max();
        for c in &charts.activity_breakdown {
            println!("  {:<10} {:>4}  {}", c.category.as_str(), c.count, bar(c.count as u64, max));
        }

        println!("\nTime of day (UTC)");
        let max = charts.time_of_day.iter().map(|b| b.count as u64).max();
        for b in &charts.time_of_day {
            println!("  {:<18} {:>4}  {}", b.bucket.label(), b.count, bar(b.count as u64, max));
        }

        println!("\nMinutes per day");
        let max = charts.daily_trend.iter().map(|d| d.minutes).max();
        for d in &charts.daily_trend {
            println!("  {}  {:>5}  {}", d.date, d.minutes, bar(d.minutes, max));
        }
        Ok(())
    }
}

fn task_line(task: &IntendedTask) -> String {
    format!(
        "#{:<5} [{}] {:<9} {}",
        task.id, task.difficulty, task.status, task.title
    )
}

fn bar(value: u64, max: Option<u64>) -> String {
    match max {
        Some(max) if max > 0 => "#".repeat((value * BAR_WIDTH as u64 / max) as usize),
        _ => String::new(),
    }
}
