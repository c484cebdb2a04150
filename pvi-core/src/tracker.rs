//! Mutation layer
//!
//! [`Tracker`] is the entry point for everything that changes user data. Task
//! operations are plain validated writes. Log operations also recompute the
//! owner's analytics snapshot inside the same transaction as the write, so a
//! log change and the snapshot it produced commit together or not at all.
//!
//! Lock order is always the per-user analytics lock first, then the database
//! connection.

use crate::analytics::{
    recompute_with, AnalyticsRecomputer, AnalyticsResult, AnalyticsSummary, ChartData, LogStats,
};
use crate::config::Config;
use crate::db::{repo, Database, LogFilter, LogListing};
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

/// Input for [`Tracker::create_task`].
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub difficulty: u8,
}

/// Partial update for [`Tracker::update_task`]; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub difficulty: Option<u8>,
    pub status: Option<TaskStatus>,
}

/// Input for [`Tracker::create_log`].
#[derive(Debug, Clone)]
pub struct NewLog {
    pub task_id: i64,
    pub duration_minutes: u32,
    pub category: ActivityCategory,
    pub detail: Option<String>,
    /// Backdate the entry; defaults to now. Must not be in the future.
    pub logged_at: Option<DateTime<Utc>>,
}

/// Partial update for [`Tracker::update_log`].
#[derive(Debug, Clone, Default)]
pub struct LogUpdate {
    pub task_id: Option<i64>,
    pub duration_minutes: Option<u32>,
    pub category: Option<ActivityCategory>,
    /// `Some(None)` clears the detail
    pub detail: Option<Option<String>>,
}

/// Owns the database and keeps every user's snapshot in step with their logs.
pub struct Tracker {
    analytics: AnalyticsRecomputer<Database>,
}

impl Tracker {
    /// Wrap an already migrated database.
    pub fn new(db: Database, window: Duration) -> Self {
        Self {
            analytics: AnalyticsRecomputer::with_window(db, window),
        }
    }

    /// Open and migrate the configured database.
    pub fn open(config: &Config) -> Result<Self> {
        let path = config.resolved_database_path();
        let db = Database::open(&path)?;
        db.migrate()?;
        tracing::debug!(path = %path.display(), "Opened tracker database");
        Ok(Self {
            analytics: AnalyticsRecomputer::new(db, &config.analytics),
        })
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        self.analytics.store()
    }

    /// The scoring window in use.
    pub fn window(&self) -> Duration {
        self.analytics.window()
    }

    // ============================================
    // Users
    // ============================================

    pub fn create_user(&self, name: &str) -> Result<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("user name must not be empty".to_string()));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.database().insert_user(&user)?;

        tracing::info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    pub fn get_user(&self, user_id: &str) -> Result<User> {
        self.database()
            .get_user(user_id)?
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))
    }

    // ============================================
    // Tasks
    // ============================================

    pub fn create_task(&self, user_id: &str, new: NewTask) -> Result<IntendedTask> {
        let title = validate_title(&new.title)?;
        validate_difficulty(new.difficulty)?;

        self.database().transaction(|conn| {
            require_user(conn, user_id)?;

            let mut task = IntendedTask {
                id: 0,
                user_id: user_id.to_string(),
                title,
                difficulty: new.difficulty,
                status: TaskStatus::Active,
                created_at: Utc::now(),
            };
            task.id = repo::insert_task(conn, &task)?;

            tracing::info!(user_id, task_id = task.id, "Created task");
            Ok(task)
        })
    }

    pub fn list_tasks(&self, user_id: &str, status: Option<TaskStatus>) -> Result<Vec<IntendedTask>> {
        self.get_user(user_id)?;
        self.database().list_tasks(user_id, status)
    }

    pub fn update_task(&self, user_id: &str, task_id: i64, update: TaskUpdate) -> Result<IntendedTask> {
        let title = update.title.as_deref().map(validate_title).transpose()?;
        if let Some(difficulty) = update.difficulty {
            validate_difficulty(difficulty)?;
        }

        self.database().transaction(|conn| {
            let mut task = owned_task(conn, user_id, task_id)?;
            if let Some(title) = title {
                task.title = title;
            }
            if let Some(difficulty) = update.difficulty {
                task.difficulty = difficulty;
            }
            if let Some(status) = update.status {
                task.status = status;
            }
            repo::update_task(conn, &task)?;

            tracing::info!(user_id, task_id, "Updated task");
            Ok(task)
        })
    }

    /// Delete a task. Its logs stay and drop out of scoring on the next
    /// recomputation.
    pub fn delete_task(&self, user_id: &str, task_id: i64) -> Result<()> {
        self.database().transaction(|conn| {
            owned_task(conn, user_id, task_id)?;
            repo::delete_task(conn, task_id)?;

            tracing::info!(user_id, task_id, "Deleted task");
            Ok(())
        })
    }

    // ============================================
    // Logs
    // ============================================

    /// Record a log and return it with the owner's fresh snapshot.
    pub fn create_log(&self, user_id: &str, new: NewLog) -> Result<(LogEntry, AnalyticsResult)> {
        validate_duration(new.duration_minutes)?;
        let detail = normalize_detail(new.detail);

        self.write_and_recompute(user_id, |conn, now| {
            let created_at = new.logged_at.unwrap_or(now);
            if created_at > now {
                return Err(Error::InvalidInput(
                    "log time must not be in the future".to_string(),
                ));
            }
            require_user(conn, user_id)?;
            owned_task(conn, user_id, new.task_id)?;

            let mut log = LogEntry {
                id: 0,
                user_id: user_id.to_string(),
                task_id: new.task_id,
                duration_minutes: new.duration_minutes,
                category: new.category,
                detail,
                created_at,
                updated_at: now,
            };
            log.id = repo::insert_log(conn, &log)?;

            tracing::info!(user_id, log_id = log.id, task_id = log.task_id, "Created log");
            Ok(log)
        })
    }

    /// Change a log's task, duration, category or detail.
    pub fn update_log(
        &self,
        user_id: &str,
        log_id: i64,
        update: LogUpdate,
    ) -> Result<(LogEntry, AnalyticsResult)> {
        if let Some(minutes) = update.duration_minutes {
            validate_duration(minutes)?;
        }

        self.write_and_recompute(user_id, |conn, now| {
            let mut log = owned_log(conn, user_id, log_id)?;

            if let Some(task_id) = update.task_id {
                if task_id != log.task_id {
                    owned_task(conn, user_id, task_id)?;
                }
                log.task_id = task_id;
            }
            if let Some(minutes) = update.duration_minutes {
                log.duration_minutes = minutes;
            }
            if let Some(category) = update.category {
                log.category = category;
            }
            if let Some(detail) = update.detail {
                log.detail = normalize_detail(detail);
            }
            log.updated_at = now;

            repo::update_log(conn, &log)?;

            tracing::info!(user_id, log_id, "Updated log");
            Ok(log)
        })
    }

    /// Delete a log and return the owner's fresh snapshot.
    pub fn delete_log(&self, user_id: &str, log_id: i64) -> Result<AnalyticsResult> {
        let ((), snapshot) = self.write_and_recompute(user_id, |conn, _| {
            owned_log(conn, user_id, log_id)?;
            repo::delete_log(conn, log_id)?;

            tracing::info!(user_id, log_id, "Deleted log");
            Ok(())
        })?;
        Ok(snapshot)
    }

    /// The user's logs with task context, newest first.
    pub fn list_logs(&self, user_id: &str, filter: &LogFilter) -> Result<Vec<LogListing>> {
        self.get_user(user_id)?;
        self.database().list_logs(user_id, filter)
    }

    /// Apply a write and recompute `user_id` in one transaction.
    ///
    /// The clock is read after the user lock is taken, so snapshots are
    /// written in the same order as the times they were computed for.
    fn write_and_recompute<T>(
        &self,
        user_id: &str,
        mutation: impl FnOnce(&Connection, DateTime<Utc>) -> Result<T>,
    ) -> Result<(T, AnalyticsResult)> {
        self.analytics.with_user_lock(user_id, |db, window| {
            db.transaction(|conn| {
                let now = Utc::now();
                let value = mutation(conn, now)?;
                let snapshot = recompute_with(conn, user_id, window, now)?;
                Ok((value, snapshot))
            })
        })
    }

    // ============================================
    // Analytics
    // ============================================

    /// Current snapshot; `None` until the first log mutation or recompute.
    pub fn snapshot(&self, user_id: &str) -> Result<Option<AnalyticsResult>> {
        self.get_user(user_id)?;
        self.analytics.current_snapshot(user_id)
    }

    /// Recompute the snapshot on demand, e.g. after the window has moved.
    pub fn recompute(&self, user_id: &str) -> Result<AnalyticsResult> {
        self.get_user(user_id)?;
        let ((), snapshot) = self.write_and_recompute(user_id, |_, _| Ok(()))?;
        Ok(snapshot)
    }

    pub fn summary(&self, user_id: &str) -> Result<AnalyticsSummary> {
        let snapshot = self.snapshot(user_id)?;
        let logs = self.database().user_logs(user_id)?;
        Ok(AnalyticsSummary {
            snapshot,
            stats: LogStats::from_logs(&logs),
        })
    }

    pub fn charts(&self, user_id: &str) -> Result<ChartData> {
        self.get_user(user_id)?;
        let logs = self.database().user_logs(user_id)?;
        Ok(ChartData::from_logs(&logs))
    }
}

// ============================================
// Validation and ownership
// ============================================

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput("task title must not be empty".to_string()));
    }
    Ok(title.to_string())
}

fn validate_difficulty(difficulty: u8) -> Result<()> {
    if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty) {
        return Err(Error::InvalidInput(format!(
            "difficulty must be between {MIN_DIFFICULTY} and {MAX_DIFFICULTY}, got {difficulty}"
        )));
    }
    Ok(())
}

fn validate_duration(minutes: u32) -> Result<()> {
    if minutes < 1 {
        return Err(Error::InvalidInput(
            "duration must be at least 1 minute".to_string(),
        ));
    }
    Ok(())
}

fn normalize_detail(detail: Option<String>) -> Option<String> {
    detail
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

fn require_user(conn: &Connection, user_id: &str) -> Result<User> {
    repo::get_user(conn, user_id)?.ok_or_else(|| Error::UserNotFound(user_id.to_string()))
}

fn owned_task(conn: &Connection, user_id: &str, task_id: i64) -> Result<IntendedTask> {
    let task = repo::get_task(conn, task_id)?.ok_or(Error::TaskNotFound(task_id))?;
    if task.user_id != user_id {
        return Err(Error::NotOwner {
            entity: "task",
            id: task_id,
            user_id: user_id.to_string(),
        });
    }
    Ok(task)
}

fn owned_log(conn: &Connection, user_id: &str, log_id: i64) -> Result<LogEntry> {
    let log = repo::get_log(conn, log_id)?.ok_or(Error::LogNotFound(log_id))?;
    if log.user_id != user_id {
        return Err(Error::NotOwner {
            entity: "log",
            id: log_id,
            user_id: user_id.to_string(),
        });
    }
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> Tracker {
        crate::logging::init_test();
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        Tracker::new(db, Duration::days(14))
    }

    fn task(t: &Tracker, user_id: &str, difficulty: u8) -> IntendedTask {
        t.create_task(
            user_id,
            NewTask {
                title: format!("level {difficulty}"),
                difficulty,
            },
        )
        .unwrap()
    }

    fn log(task_id: i64, minutes: u32, category: ActivityCategory, ago: Duration) -> NewLog {
        NewLog {
            task_id,
            duration_minutes: minutes,
            category,
            detail: None,
            logged_at: Some(Utc::now() - ago),
        }
    }

    #[test]
    fn test_create_user_rejects_blank_name() {
        let t = tracker();
        assert!(matches!(t.create_user("  "), Err(Error::InvalidInput(_))));

        let user = t.create_user(" Ada ").unwrap();
        assert_eq!(user.name, "Ada");
        assert_eq!(uuid::Uuid::parse_str(&user.id).unwrap().get_version_num(), 4);
        assert_eq!(t.get_user(&user.id).unwrap(), user);
    }

    #[test]
    fn test_task_validation() {
        let t = tracker();
        let user = t.create_user("Ada").unwrap();

        for difficulty in [0, 6] {
            let err = t
                .create_task(
                    &user.id,
                    NewTask {
                        title: "x".to_string(),
                        difficulty,
                    },
                )
                .unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)));
        }

        let err = t
            .create_task(
                &user.id,
                NewTask {
                    title: "   ".to_string(),
                    difficulty: 3,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = t
            .create_task(
                "nobody",
                NewTask {
                    title: "x".to_string(),
                    difficulty: 3,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::UserNotFound(_)));
    }

    #[test]
    fn test_task_mutations_do_not_recompute() {
        let t = tracker();
        let user = t.create_user("Ada").unwrap();
        let created = task(&t, &user.id, 2);

        let updated = t
            .update_task(
                &user.id,
                created.id,
                TaskUpdate {
                    difficulty: Some(5),
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.difficulty, 5);
        assert_eq!(updated.title, created.title);
        t.delete_task(&user.id, created.id).unwrap();

        assert_eq!(t.snapshot(&user.id).unwrap(), None);
    }

    #[test]
    fn test_overwhelm_scenario() {
        let t = tracker();
        let user = t.create_user("Ada").unwrap();
        let hard = task(&t, &user.id, 5);

        let mut last = None;
        for i in 0..3 {
            let (_, snapshot) = t
                .create_log(
                    &user.id,
                    log(hard.id, 60, ActivityCategory::Video, Duration::hours(3 - i)),
                )
                .unwrap();
            last = Some(snapshot);
        }

        let snapshot = last.unwrap();
        assert_eq!(snapshot.raw_score, 900.0);
        assert_eq!(snapshot.normalized_score, 83);
        assert_eq!(snapshot.root_cause, RootCause::OverwhelmAvoidance);
        assert_eq!(t.snapshot(&user.id).unwrap(), Some(snapshot));
    }

    #[test]
    fn test_every_log_mutation_refreshes_snapshot() {
        let t = tracker();
        let user = t.create_user("Ada").unwrap();
        let easy = task(&t, &user.id, 1);

        let (first, snapshot) = t
            .create_log(&user.id, log(easy.id, 10, ActivityCategory::Gaming, Duration::hours(1)))
            .unwrap();
        assert_eq!(snapshot.raw_score, 10.0);
        assert_eq!(snapshot.root_cause, RootCause::InsufficientData);

        let (edited, snapshot) = t
            .update_log(
                &user.id,
                first.id,
                LogUpdate {
                    duration_minutes: Some(40),
                    detail: Some(Some("chess".to_string())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.detail.as_deref(), Some("chess"));
        assert_eq!(edited.created_at, first.created_at);
        assert_eq!(snapshot.raw_score, 40.0);

        let snapshot = t.delete_log(&user.id, first.id).unwrap();
        assert_eq!(snapshot.raw_score, 0.0);
        assert_eq!(snapshot.normalized_score, 0);
    }

    #[test]
    fn test_log_validation_and_ownership() {
        let t = tracker();
        let ada = t.create_user("Ada").unwrap();
        let grace = t.create_user("Grace").unwrap();
        let adas = task(&t, &ada.id, 3);

        let zero = NewLog {
            duration_minutes: 0,
            ..log(adas.id, 1, ActivityCategory::Other, Duration::zero())
        };
        assert!(matches!(t.create_log(&ada.id, zero), Err(Error::InvalidInput(_))));

        let future = NewLog {
            logged_at: Some(Utc::now() + Duration::hours(1)),
            ..log(adas.id, 5, ActivityCategory::Other, Duration::zero())
        };
        assert!(matches!(t.create_log(&ada.id, future), Err(Error::InvalidInput(_))));

        let err = t
            .create_log(&ada.id, log(999, 5, ActivityCategory::Other, Duration::zero()))
            .unwrap_err();
        assert!(matches!(err, Error::TaskNotFound(999)));

        let err = t
            .create_log(&grace.id, log(adas.id, 5, ActivityCategory::Other, Duration::zero()))
            .unwrap_err();
        assert!(matches!(err, Error::NotOwner { entity: "task", .. }));

        let (entry, _) = t
            .create_log(&ada.id, log(adas.id, 5, ActivityCategory::Other, Duration::zero()))
            .unwrap();
        let err = t.delete_log(&grace.id, entry.id).unwrap_err();
        assert!(matches!(err, Error::NotOwner { entity: "log", .. }));
        assert!(matches!(t.delete_log(&ada.id, 12345), Err(Error::LogNotFound(12345))));

        // Grace never mutated anything, so she has no snapshot.
        assert_eq!(t.snapshot(&grace.id).unwrap(), None);
    }

    #[test]
    fn test_deleted_task_drops_out_on_next_mutation() {
        let t = tracker();
        let user = t.create_user("Ada").unwrap();
        let keep = task(&t, &user.id, 2);
        let gone = task(&t, &user.id, 5);

        t.create_log(&user.id, log(gone.id, 100, ActivityCategory::Video, Duration::hours(2)))
            .unwrap();
        t.delete_task(&user.id, gone.id).unwrap();
        let (_, snapshot) = t
            .create_log(&user.id, log(keep.id, 10, ActivityCategory::Video, Duration::hours(1)))
            .unwrap();

        assert_eq!(snapshot.raw_score, 20.0);
        // The orphaned log is still listed, without task context.
        let listed = t.list_logs(&user.id, &LogFilter::default()).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].task_title, None);
    }

    #[test]
    fn test_failed_recompute_rolls_back_mutation() {
        let t = tracker();
        let user = t.create_user("Ada").unwrap();
        let good = task(&t, &user.id, 2);
        let bad = task(&t, &user.id, 3);
        let (_, before) = t
            .create_log(&user.id, log(bad.id, 30, ActivityCategory::Social, Duration::hours(2)))
            .unwrap();

        t.database()
            .connection()
            .unwrap()
            .execute(
                "UPDATE intended_tasks SET status = 'bogus' WHERE id = ?",
                [bad.id],
            )
            .unwrap();

        let result = t.create_log(&user.id, log(good.id, 10, ActivityCategory::Social, Duration::hours(1)));
        assert!(result.is_err());

        assert_eq!(t.database().user_logs(&user.id).unwrap().len(), 1);
        assert_eq!(t.snapshot(&user.id).unwrap(), Some(before));
    }

    #[test]
    fn test_summary_and_charts() {
        let t = tracker();
        let user = t.create_user("Ada").unwrap();
        let empty = t.summary(&user.id).unwrap();
        assert_eq!(empty.snapshot, None);
        assert_eq!(empty.stats.total_logs, 0);
        assert_eq!(empty.stats.top_activity, None);

        let task = task(&t, &user.id, 3);
        for (minutes, category) in [
            (10, ActivityCategory::Social),
            (20, ActivityCategory::Social),
            (31, ActivityCategory::Gaming),
        ] {
            t.create_log(&user.id, log(task.id, minutes, category, Duration::hours(1)))
                .unwrap();
        }

        let summary = t.summary(&user.id).unwrap();
        assert_eq!(summary.stats.total_logs, 3);
        assert_eq!(summary.stats.total_minutes, 61);
        assert_eq!(summary.stats.average_session_minutes, 20);
        assert_eq!(summary.stats.top_activity, Some(ActivityCategory::Social));
        assert!(summary.snapshot.is_some());

        let charts = t.charts(&user.id).unwrap();
        assert_eq!(charts.activity_breakdown.len(), 2);
        assert_eq!(charts.time_of_day.iter().map(|b| b.count).sum::<usize>(), 3);
    }

    #[test]
    fn test_unknown_user_is_reported() {
        let t = tracker();
        assert!(matches!(t.snapshot("ghost"), Err(Error::UserNotFound(_))));
        assert!(matches!(t.recompute("ghost"), Err(Error::UserNotFound(_))));
        assert!(matches!(t.charts("ghost"), Err(Error::UserNotFound(_))));
    }
}
