//! Snapshot recomputation
//!
//! Runs the pipeline for one user and writes the result back in one piece:
//!
//! ```text
//! fetch window ─► aggregate ─┬─► normalize ─┐
//!                            └─► classify  ─┴─► AnalyticsSnapshot ─► write_snapshot
//! ```
//!
//! [`compute`] is pure. [`recompute_with`] adds the store round trip and is
//! what the mutation layer calls inside its transaction. [`AnalyticsRecomputer`]
//! wraps a shared store and serializes recomputations per user, so two
//! concurrent recomputes for the same user never interleave their read and
//! write.

use crate::analytics::classifier;
use crate::analytics::normalizer;
use crate::analytics::store::AnalyticsStore;
use crate::analytics::window;
use crate::config::AnalyticsConfig;
use crate::error::{Error, Result};
use crate::types::{AnalyticsSnapshot, ResolvedLog};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Outcome of one recomputation; the same value that was persisted.
pub type AnalyticsResult = AnalyticsSnapshot;

/// Lock table size above which idle entries are pruned.
const LOCK_TABLE_PRUNE_THRESHOLD: usize = 1024;

/// Score and classify an already aggregated window.
pub fn compute(logs: &[ResolvedLog], now: DateTime<Utc>) -> AnalyticsResult {
    let score = normalizer::score(logs);
    let root_cause = classifier::classify(logs);

    AnalyticsSnapshot {
        raw_score: score.raw,
        normalized_score: score.normalized,
        root_cause,
        computed_at: now,
    }
}

/// Aggregate, compute and persist the snapshot for `user_id`.
///
/// Nothing is written unless every stage succeeds.
pub fn recompute_with<S: AnalyticsStore + ?Sized>(
    store: &S,
    user_id: &str,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<AnalyticsResult> {
    let logs = window::aggregate(store, user_id, window, now).map_err(|e| {
        tracing::error!(user_id, error = %e, "Failed to fetch analytics window");
        e
    })?;

    let snapshot = compute(&logs, now);

    store.write_snapshot(user_id, &snapshot).map_err(|e| {
        tracing::error!(user_id, error = %e, "Failed to write analytics snapshot");
        e
    })?;

    tracing::info!(
        user_id,
        logs = logs.len(),
        raw_score = snapshot.raw_score,
        score = snapshot.normalized_score,
        root_cause = %snapshot.root_cause,
        "Recomputed analytics"
    );

    Ok(snapshot)
}

/// Per-user mutexes.
///
/// Recomputations for the same user take turns; different users do not
/// contend beyond the short table lookup.
#[derive(Debug, Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    /// The mutex guarding `user_id`, created on first use.
    pub fn lock_for(&self, user_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut table = self
            .locks
            .lock()
            .map_err(|e| Error::LockPoisoned(e.to_string()))?;

        if table.len() > LOCK_TABLE_PRUNE_THRESHOLD {
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        Ok(table
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }
}

/// Recomputes snapshots against a shared store.
pub struct AnalyticsRecomputer<S> {
    store: S,
    window: Duration,
    locks: UserLocks,
}

impl<S: AnalyticsStore> AnalyticsRecomputer<S> {
    /// Create a recomputer using the configured window.
    pub fn new(store: S, config: &AnalyticsConfig) -> Self {
        Self::with_window(store, config.window())
    }

    /// Create a recomputer with an explicit window.
    pub fn with_window(store: S, window: Duration) -> Self {
        Self {
            store,
            window,
            locks: UserLocks::default(),
        }
    }

    /// The trailing window in use.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Borrow the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Recompute `user_id`'s snapshot as of now.
    pub fn recompute(&self, user_id: &str) -> Result<AnalyticsResult> {
        self.with_user_lock(user_id, |store, window| {
            recompute_with(store, user_id, window, Utc::now())
        })
    }

    /// Recompute `user_id`'s snapshot as of `now`.
    pub fn recompute_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<AnalyticsResult> {
        self.with_user_lock(user_id, |store, window| {
            recompute_with(store, user_id, window, now)
        })
    }

    /// Run `f` with exclusive access to `user_id`'s analytics.
    ///
    /// Mutations that recompute inside their own transaction go through here
    /// so they serialize with [`recompute`](Self::recompute) for the same user.
    pub fn with_user_lock<T>(
        &self,
        user_id: &str,
        f: impl FnOnce(&S, Duration) -> Result<T>,
    ) -> Result<T> {
        let lock = self.locks.lock_for(user_id)?;
        let _guard = lock
            .lock()
            .map_err(|e| Error::LockPoisoned(e.to_string()))?;

        f(&self.store, self.window)
    }

    /// Current persisted snapshot; `None` means no signal yet.
    pub fn current_snapshot(&self, user_id: &str) -> Result<Option<AnalyticsSnapshot>> {
        self.store.get_snapshot(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::testing::{base_time, log_at, task, MemoryStore};
    use crate::types::{ActivityCategory, RootCause};
    use std::sync::atomic::Ordering;

    fn now() -> DateTime<Utc> {
        base_time() + Duration::days(1)
    }

    fn recomputer(store: MemoryStore) -> AnalyticsRecomputer<MemoryStore> {
        AnalyticsRecomputer::with_window(store, Duration::days(14))
    }

    #[test]
    fn test_overwhelm_scenario_end_to_end() {
        let store = MemoryStore::default();
        store.add_task(task(1, "u1", 5));
        for i in 0..3 {
            store.add_log(log_at(
                i + 1,
                "u1",
                1,
                60,
                ActivityCategory::Video,
                base_time() + Duration::minutes(i),
            ));
        }
        let r = recomputer(store);

        let snapshot = r.recompute_at("u1", now()).unwrap();
        assert_eq!(snapshot.raw_score, 900.0);
        assert_eq!(snapshot.normalized_score, 83);
        assert_eq!(snapshot.root_cause, RootCause::OverwhelmAvoidance);
        assert_eq!(snapshot.computed_at, now());

        assert_eq!(r.current_snapshot("u1").unwrap(), Some(snapshot));
    }

    #[test]
    fn test_empty_window_scores_zero() {
        let r = recomputer(MemoryStore::default());
        let snapshot = r.recompute_at("u1", now()).unwrap();

        assert_eq!(snapshot.raw_score, 0.0);
        assert_eq!(snapshot.normalized_score, 0);
        assert_eq!(snapshot.root_cause, RootCause::InsufficientData);
    }

    #[test]
    fn test_deleted_task_is_skipped_not_fatal() {
        let store = MemoryStore::default();
        store.add_task(task(1, "u1", 2));
        store.add_task(task(2, "u1", 5));
        store.add_log(log_at(1, "u1", 1, 10, ActivityCategory::Gaming, base_time()));
        store.add_log(log_at(
            2,
            "u1",
            2,
            100,
            ActivityCategory::Gaming,
            base_time() + Duration::minutes(5),
        ));
        store.remove_task(2);
        let r = recomputer(store);

        let snapshot = r.recompute_at("u1", now()).unwrap();
        assert_eq!(snapshot.raw_score, 20.0);
        assert_eq!(snapshot.root_cause, RootCause::InsufficientData);
    }

    #[test]
    fn test_fetch_failure_writes_nothing() {
        let store = MemoryStore::default();
        store.fail_fetch.store(true, Ordering::SeqCst);
        let r = recomputer(store);

        assert!(r.recompute_at("u1", now()).is_err());
        assert_eq!(r.store().writes.load(Ordering::SeqCst), 0);
        assert_eq!(r.current_snapshot("u1").unwrap(), None);
    }

    #[test]
    fn test_write_failure_propagates() {
        let store = MemoryStore::default();
        store.fail_write.store(true, Ordering::SeqCst);
        let r = recomputer(store);

        assert!(r.recompute_at("u1", now()).is_err());
        assert_eq!(r.current_snapshot("u1").unwrap(), None);
    }

    #[test]
    fn test_same_user_recomputes_do_not_overlap() {
        let store = MemoryStore::default();
        store.add_task(task(1, "u1", 3));
        store.add_log(log_at(1, "u1", 1, 30, ActivityCategory::Social, base_time()));
        store.fetch_delay_ms.store(20, Ordering::SeqCst);
        let r = Arc::new(recomputer(store));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let r = Arc::clone(&r);
                std::thread::spawn(move || r.recompute_at("u1", now()).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(r.store().max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(r.store().writes.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_user_locks_are_per_user() {
        let locks = UserLocks::default();
        let a1 = locks.lock_for("a").unwrap();
        let a2 = locks.lock_for("a").unwrap();
        let b = locks.lock_for("b").unwrap();

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(locks.locks.lock().unwrap().len(), 2);

        let _held = a1.lock().unwrap();
        assert!(b.try_lock().is_ok());
    }

    #[test]
    fn test_poisoned_lock_table_is_reported() {
        let locks = Arc::new(UserLocks::default());
        let poisoner = Arc::clone(&locks);
        let _ = std::thread::spawn(move || {
            let _table = poisoner.locks.lock().unwrap();
            panic!("poison the lock table");
        })
        .join();

        assert!(matches!(locks.lock_for("a"), Err(Error::LockPoisoned(_))));
    }

    #[test]
    fn test_compute_is_pure() {
        let snapshot = compute(&[], now());
        assert_eq!(snapshot, compute(&[], now()));
        assert_eq!(snapshot.root_cause, RootCause::InsufficientData);
    }
}
