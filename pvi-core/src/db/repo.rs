//! Database repository layer
//!
//! Query and insert operations for users, intended tasks, log entries and the
//! analytics snapshot.
//!
//! Every operation exists as a free function over a `&Connection`, so the
//! mutation layer can run several of them inside one transaction, and as a
//! method on [`Database`] that takes the connection lock for a single call.

use crate::analytics::AnalyticsStore;
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

/// Filter for [`Database::list_logs`].
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Only logs created at or after this instant
    pub from: Option<DateTime<Utc>>,
    /// Only logs created at or before this instant
    pub to: Option<DateTime<Utc>>,
    /// Only logs in this category
    pub category: Option<ActivityCategory>,
    /// Maximum number of rows
    pub limit: Option<usize>,
}

/// A log entry with its task's title and difficulty, for list views.
///
/// Both task fields are `None` when the task was deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogListing {
    #[serde(flatten)]
    pub log: LogEntry,
    pub task_title: Option<String>,
    pub task_difficulty: Option<u8>,
}

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.connection()?;
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::LockPoisoned(e.to_string()))
    }

    /// Run `f` inside one transaction.
    ///
    /// Commits if `f` returns `Ok`, rolls back otherwise. The connection lock
    /// is held throughout, so no other operation on this handle interleaves.
    /// The transaction is IMMEDIATE: other processes writing the same file
    /// wait on the busy timeout instead of racing the read-then-write.
    pub fn transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ============================================
    // User operations
    // ============================================

    /// Insert a user
    pub fn insert_user(&self, user: &User) -> Result<()> {
        insert_user(&*self.connection()?, user)
    }

    /// Get a user by ID
    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        get_user(&*self.connection()?, id)
    }

    // ============================================
    // Task operations
    // ============================================

    /// Insert a task, returning its new ID
    pub fn insert_task(&self, task: &IntendedTask) -> Result<i64> {
        insert_task(&*self.connection()?, task)
    }

    /// Get a task by ID
    pub fn get_task(&self, id: i64) -> Result<Option<IntendedTask>> {
        get_task(&*self.connection()?, id)
    }

    /// List a user's tasks, newest first
    pub fn list_tasks(&self, user_id: &str, status: Option<TaskStatus>) -> Result<Vec<IntendedTask>> {
        list_tasks(&*self.connection()?, user_id, status)
    }

    /// Update a task's title, difficulty and status
    pub fn update_task(&self, task: &IntendedTask) -> Result<()> {
        update_task(&*self.connection()?, task)
    }

    /// Delete a task; its logs are left in place
    pub fn delete_task(&self, id: i64) -> Result<bool> {
        delete_task(&*self.connection()?, id)
    }

    // ============================================
    // Log operations
    // ============================================

    /// Insert a log entry, returning its new ID
    pub fn insert_log(&self, log: &LogEntry) -> Result<i64> {
        insert_log(&*self.connection()?, log)
    }

    /// Get a log entry by ID
    pub fn get_log(&self, id: i64) -> Result<Option<LogEntry>> {
        get_log(&*self.connection()?, id)
    }

    /// List a user's logs with task context, newest first
    pub fn list_logs(&self, user_id: &str, filter: &LogFilter) -> Result<Vec<LogListing>> {
        list_logs(&*self.connection()?, user_id, filter)
    }

    /// All of a user's logs, oldest first
    pub fn user_logs(&self, user_id: &str) -> Result<Vec<LogEntry>> {
        user_logs(&*self.connection()?, user_id)
    }
}

// ============================================
// Row mapping
// ============================================

/// Format a timestamp for storage.
///
/// Fixed width (nanoseconds, `Z` suffix) so that string comparison in SQL
/// agrees with time order, and lossless so a value read back equals the one
/// written.
pub fn to_db_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error(
    row: &Row,
    name: &str,
    err: Box<dyn std::error::Error + Send + Sync>,
) -> rusqlite::Error {
    let idx = row.as_ref().column_index(name).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err)
}

fn time_column(row: &Row, name: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(row, name, Box::new(e)))
}

fn parsed_column<T: FromStr<Err = Error>>(row: &Row, name: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(name)?;
    raw.parse().map_err(|e: Error| conversion_error(row, name, Box::new(e)))
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: time_column(row, "created_at")?,
    })
}

fn row_to_task(row: &Row) -> rusqlite::Result<IntendedTask> {
    Ok(IntendedTask {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        difficulty: row.get("difficulty")?,
        status: parsed_column(row, "status")?,
        created_at: time_column(row, "created_at")?,
    })
}

fn row_to_log(row: &Row) -> rusqlite::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        task_id: row.get("task_id")?,
        duration_minutes: row.get("duration_minutes")?,
        category: parsed_column(row, "activity_category")?,
        detail: row.get("activity_detail")?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

/// Task half of the window join; `None` when the reference dangles.
fn row_to_joined_task(row: &Row) -> rusqlite::Result<Option<IntendedTask>> {
    let id: Option<i64> = row.get("t_id")?;
    let Some(id) = id else {
        return Ok(None);
    };
    Ok(Some(IntendedTask {
        id,
        user_id: row.get("t_user_id")?,
        title: row.get("t_title")?,
        difficulty: row.get("t_difficulty")?,
        status: parsed_column(row, "t_status")?,
        created_at: time_column(row, "t_created_at")?,
    }))
}

fn row_to_snapshot(row: &Row) -> rusqlite::Result<AnalyticsSnapshot> {
    Ok(AnalyticsSnapshot {
        raw_score: row.get("raw_score")?,
        normalized_score: row.get("normalized_score")?,
        root_cause: parsed_column(row, "root_cause")?,
        computed_at: time_column(row, "computed_at")?,
    })
}

// ============================================
// Users
// ============================================

pub fn insert_user(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, created_at) VALUES (?1, ?2, ?3)",
        params![user.id, user.name, to_db_time(&user.created_at)],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, name, created_at FROM users WHERE id = ?",
        [id],
        row_to_user,
    )
    .optional()
    .map_err(Error::from)
}

// ============================================
// Intended tasks
// ============================================

pub fn insert_task(conn: &Connection, task: &IntendedTask) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO intended_tasks (user_id, title, difficulty, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            task.user_id,
            task.title,
            task.difficulty,
            task.status.as_str(),
            to_db_time(&task.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_task(conn: &Connection, id: i64) -> Result<Option<IntendedTask>> {
    conn.query_row(
        "SELECT * FROM intended_tasks WHERE id = ?",
        [id],
        row_to_task,
    )
    .optional()
    .map_err(Error::from)
}

pub fn list_tasks(
    conn: &Connection,
    user_id: &str,
    status: Option<TaskStatus>,
) -> Result<Vec<IntendedTask>> {
    let mut sql = String::from("SELECT * FROM intended_tasks WHERE user_id = ?");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

    if let Some(status) = status {
        sql.push_str(" AND status = ?");
        params.push(Box::new(status.as_str()));
    }

    sql.push_str(" ORDER BY created_at DESC, id DESC");

    let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(params_refs.as_slice(), row_to_task)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(tasks)
}

pub fn update_task(conn: &Connection, task: &IntendedTask) -> Result<()> {
    let changed = conn.execute(
        "UPDATE intended_tasks SET title = ?1, difficulty = ?2, status = ?3 WHERE id = ?4",
        params![task.title, task.difficulty, task.status.as_str(), task.id],
    )?;
    if changed == 0 {
        return Err(Error::TaskNotFound(task.id));
    }
    Ok(())
}

pub fn delete_task(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM intended_tasks WHERE id = ?", [id])?;
    Ok(changed > 0)
}

// ============================================
// Log entries
// ============================================

pub fn insert_log(conn: &Connection, log: &LogEntry) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO log_entries (user_id, task_id, duration_minutes, activity_category,
                                 activity_detail, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            log.user_id,
            log.task_id,
            log.duration_minutes,
            log.category.as_str(),
            log.detail,
            to_db_time(&log.created_at),
            to_db_time(&log.updated_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_log(conn: &Connection, id: i64) -> Result<Option<LogEntry>> {
    conn.query_row("SELECT * FROM log_entries WHERE id = ?", [id], row_to_log)
        .optional()
        .map_err(Error::from)
}

/// Rewrite a log's mutable fields. Owner and creation time never change.
pub fn update_log(conn: &Connection, log: &LogEntry) -> Result<()> {
    let changed = conn.execute(
        r#"
        UPDATE log_entries
        SET task_id = ?1, duration_minutes = ?2, activity_category = ?3,
            activity_detail = ?4, updated_at = ?5
        WHERE id = ?6
        "#,
        params![
            log.task_id,
            log.duration_minutes,
            log.category.as_str(),
            log.detail,
            to_db_time(&log.updated_at),
            log.id,
        ],
    )?;
    if changed == 0 {
        return Err(Error::LogNotFound(log.id));
    }
    Ok(())
}

pub fn delete_log(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM log_entries WHERE id = ?", [id])?;
    Ok(changed > 0)
}

pub fn list_logs(conn: &Connection, user_id: &str, filter: &LogFilter) -> Result<Vec<LogListing>> {
    let mut sql = String::from(
        r#"
        SELECT l.*, t.title AS task_title, t.difficulty AS task_difficulty
        FROM log_entries l
        LEFT JOIN intended_tasks t ON t.id = l.task_id
        WHERE l.user_id = ?
        "#,
    );
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

    if let Some(from) = &filter.from {
        sql.push_str(" AND l.created_at >= ?");
        params.push(Box::new(to_db_time(from)));
    }

    if let Some(to) = &filter.to {
        sql.push_str(" AND l.created_at <= ?");
        params.push(Box::new(to_db_time(to)));
    }

    if let Some(category) = &filter.category {
        sql.push_str(" AND l.activity_category = ?");
        params.push(Box::new(category.as_str()));
    }

    sql.push_str(" ORDER BY l.created_at DESC, l.id DESC");

    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let logs = stmt
        .query_map(params_refs.as_slice(), |row| {
            Ok(LogListing {
                log: row_to_log(row)?,
                task_title: row.get("task_title")?,
                task_difficulty: row.get("task_difficulty")?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(logs)
}

pub fn user_logs(conn: &Connection, user_id: &str) -> Result<Vec<LogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM log_entries WHERE user_id = ? ORDER BY created_at ASC, id ASC",
    )?;
    let logs = stmt
        .query_map([user_id], row_to_log)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(logs)
}

// ============================================
// Analytics store
// ============================================

impl AnalyticsStore for Connection {
    fn fetch_logs_in_window(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WindowedLog>> {
        let mut stmt = self.prepare(
            r#"
            SELECT l.*,
                   t.id AS t_id,
                   t.user_id AS t_user_id,
                   t.title AS t_title,
                   t.difficulty AS t_difficulty,
                   t.status AS t_status,
                   t.created_at AS t_created_at
            FROM log_entries l
            LEFT JOIN intended_tasks t ON t.id = l.task_id
            WHERE l.user_id = ?1 AND l.created_at >= ?2 AND l.created_at <= ?3
            ORDER BY l.created_at ASC, l.id ASC
            "#,
        )?;

        let logs = stmt
            .query_map(
                params![user_id, to_db_time(&start), to_db_time(&end)],
                |row| {
                    Ok(WindowedLog {
                        log: row_to_log(row)?,
                        task: row_to_joined_task(row)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(logs)
    }

    fn write_snapshot(&self, user_id: &str, snapshot: &AnalyticsSnapshot) -> Result<()> {
        self.execute(
            r#"
            INSERT INTO user_analytics (user_id, raw_score, normalized_score, root_cause, computed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                raw_score = excluded.raw_score,
                normalized_score = excluded.normalized_score,
                root_cause = excluded.root_cause,
                computed_at = excluded.computed_at
            "#,
            params![
                user_id,
                snapshot.raw_score,
                snapshot.normalized_score,
                snapshot.root_cause.as_str(),
                to_db_time(&snapshot.computed_at),
            ],
        )?;
        Ok(())
    }

    fn get_snapshot(&self, user_id: &str) -> Result<Option<AnalyticsSnapshot>> {
        self.query_row(
            "SELECT * FROM user_analytics WHERE user_id = ?",
            [user_id],
            row_to_snapshot,
        )
        .optional()
        .map_err(Error::from)
    }
}

impl AnalyticsStore for Database {
    fn fetch_logs_in_window(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WindowedLog>> {
        self.connection()?.fetch_logs_in_window(user_id, start, end)
    }

    fn write_snapshot(&self, user_id: &str, snapshot: &AnalyticsSnapshot) -> Result<()> {
        self.connection()?.write_snapshot(user_id, snapshot)
    }

    fn get_snapshot(&self, user_id: &str) -> Result<Option<AnalyticsSnapshot>> {
        self.connection()?.get_snapshot(user_id)
    }
}
