//! In-memory fixtures shared by the analytics unit tests.

use crate::analytics::store::AnalyticsStore;
use crate::error::{Error, Result};
use crate::types::{
    ActivityCategory, AnalyticsSnapshot, IntendedTask, LogEntry, ResolvedLog, TaskStatus,
    WindowedLog,
};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn task(id: i64, user_id: &str, difficulty: u8) -> IntendedTask {
    IntendedTask {
        id,
        user_id: user_id.to_string(),
        title: format!("task {id}"),
        difficulty,
        status: TaskStatus::Active,
        created_at: base_time(),
    }
}

pub fn log_at(
    id: i64,
    user_id: &str,
    task_id: i64,
    minutes: u32,
    category: ActivityCategory,
    at: DateTime<Utc>,
) -> LogEntry {
    LogEntry {
        id,
        user_id: user_id.to_string(),
        task_id,
        duration_minutes: minutes,
        category,
        detail: None,
        created_at: at,
        updated_at: at,
    }
}

/// A resolved log `id` minutes after [`base_time`].
pub fn resolved(id: i64, minutes: u32, difficulty: u8, category: ActivityCategory) -> ResolvedLog {
    let at = base_time() + chrono::Duration::minutes(id);
    ResolvedLog {
        log: log_at(id, "u1", id, minutes, category, at),
        task: task(id, "u1", difficulty),
    }
}

/// Store backed by plain collections, with failure and overlap instrumentation.
#[derive(Default)]
pub struct MemoryStore {
    logs: Mutex<Vec<LogEntry>>,
    tasks: Mutex<HashMap<i64, IntendedTask>>,
    snapshots: Mutex<HashMap<String, AnalyticsSnapshot>>,
    pub fail_fetch: AtomicBool,
    pub fail_write: AtomicBool,
    pub fetch_delay_ms: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub writes: AtomicUsize,
}

impl MemoryStore {
    pub fn add_task(&self, task: IntendedTask) {
        self.tasks.lock().unwrap().insert(task.id, task);
    }

    pub fn add_log(&self, log: LogEntry) {
        self.logs.lock().unwrap().push(log);
    }

    pub fn remove_task(&self, id: i64) {
        self.tasks.lock().unwrap().remove(&id);
    }
}

impl AnalyticsStore for MemoryStore {
    fn fetch_logs_in_window(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WindowedLog>> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if self.fail_fetch.load(Ordering::SeqCst) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "fetch failed")));
        }

        let delay = self.fetch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(std::time::Duration::from_millis(delay as u64));
        }

        let tasks = self.tasks.lock().unwrap();
        let mut out: Vec<WindowedLog> = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.user_id == user_id && l.created_at >= start && l.created_at <= end)
            .map(|l| WindowedLog {
                log: l.clone(),
                task: tasks.get(&l.task_id).cloned(),
            })
            .collect();
        out.sort_by_key(|w| (w.log.created_at, w.log.id));
        Ok(out)
    }

    fn write_snapshot(&self, user_id: &str, snapshot: &AnalyticsSnapshot) -> Result<()> {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "write failed")));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.snapshots
            .lock()
            .unwrap()
            .insert(user_id.to_string(), *snapshot);
        Ok(())
    }

    fn get_snapshot(&self, user_id: &str) -> Result<Option<AnalyticsSnapshot>> {
        Ok(self.snapshots.lock().unwrap().get(user_id).copied())
    }
}
