//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id               TEXT PRIMARY KEY,
        name             TEXT NOT NULL,
        created_at       TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS intended_tasks (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id          TEXT NOT NULL REFERENCES users(id),
        title            TEXT NOT NULL,
        difficulty       INTEGER NOT NULL CHECK (difficulty BETWEEN 1 AND 5),
        status           TEXT NOT NULL DEFAULT 'active',
        created_at       TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_tasks_user ON intended_tasks(user_id);

    -- task_id deliberately carries no foreign key: deleting a task leaves its
    -- logs behind with a dangling reference, which analytics skip.
    CREATE TABLE IF NOT EXISTS log_entries (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id           TEXT NOT NULL REFERENCES users(id),
        task_id           INTEGER NOT NULL,
        duration_minutes  INTEGER NOT NULL CHECK (duration_minutes >= 1),
        activity_category TEXT NOT NULL,
        activity_detail   TEXT,
        created_at        TEXT NOT NULL,
        updated_at        TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_logs_user_created ON log_entries(user_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_logs_user_category ON log_entries(user_id, activity_category);
    "#,
    // Version 2: Per-user analytics snapshot
    r#"
    CREATE TABLE IF NOT EXISTS user_analytics (
        user_id          TEXT PRIMARY KEY REFERENCES users(id),
        raw_score        REAL NOT NULL,
        normalized_score INTEGER NOT NULL CHECK (normalized_score BETWEEN 0 AND 99),
        root_cause       TEXT NOT NULL,
        computed_at      TEXT NOT NULL
    );
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables = ["users", "intended_tasks", "log_entries", "user_analytics"];

        for table in tables {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_log_task_reference_has_no_foreign_key() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        run_migrations(&conn).unwrap();

        let fk_targets: Vec<String> = conn
            .prepare("PRAGMA foreign_key_list(log_entries)")
            .unwrap()
            .query_map([], |row| row.get::<_, String>(2))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert_eq!(fk_targets, vec!["users".to_string()]);
    }
}
