//! In-memory sync-status ledger mirroring the Postgres adapter's semantics.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mockable::{Clock, DefaultClock};

use crate::domain::SyncStatus;
use crate::domain::ports::{CommitInfo, SyncStatusRepository, SyncStatusRepositoryError};

#[derive(Default)]
struct LedgerState {
    rows: Vec<SyncStatus>,
    failure: Option<String>,
}

/// Vector-backed ledger; rows keep insertion order.
#[derive(Clone)]
pub struct InMemorySyncStatusRepository {
    state: Arc<Mutex<LedgerState>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemorySyncStatusRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySyncStatusRepository {
    /// Empty ledger stamping rows with the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }

    /// Empty ledger stamping rows with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::default())),
            clock,
        }
    }

    /// Seed a row directly.
    pub fn insert(&self, row: SyncStatus) {
        self.lock().rows.push(row);
    }

    /// Snapshot of every row.
    pub fn rows(&self) -> Vec<SyncStatus> {
        self.lock().rows.clone()
    }

    /// Row for `(repo, commit)`, if present.
    pub fn row(&self, repo: &str, commit: &str) -> Option<SyncStatus> {
        self.lock()
            .rows
            .iter()
            .find(|row| row.repo == repo && row.commit == commit)
            .cloned()
    }

    /// Make every subsequent call fail with a query error.
    pub fn fail_queries(&self, message: &str) {
        self.lock().failure = Some(message.to_owned());
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("ledger mutex"),
        }
    }

    fn with_state<T>(
        &self,
        action: impl FnOnce(&mut LedgerState) -> T,
    ) -> Result<T, SyncStatusRepositoryError> {
        let mut state = self.lock();
        if let Some(message) = state.failure.clone() {
            return Err(SyncStatusRepositoryError::query(message));
        }
        Ok(action(&mut state))
    }

    fn update(
        &self,
        repo: &str,
        commit: &str,
        action: impl FnOnce(&mut SyncStatus),
    ) -> Result<(), SyncStatusRepositoryError> {
        self.with_state(|state| {
            if let Some(row) = state
                .rows
                .iter_mut()
                .find(|row| row.repo == repo && row.commit == commit)
            {
                action(row);
            }
        })
    }
}

#[async_trait]
impl SyncStatusRepository for InMemorySyncStatusRepository {
    async fn last_synced_commit(
        &self,
        repo: &str,
    ) -> Result<Option<SyncStatus>, SyncStatusRepositoryError> {
        self.with_state(|state| {
            state
                .rows
                .iter()
                .filter(|row| row.repo == repo && row.applied_at.is_some())
                .max_by_key(|row| row.applied_at)
                .cloned()
        })
    }

    async fn create_if_not_exists(
        &self,
        repo: &str,
        commit: &CommitInfo,
    ) -> Result<bool, SyncStatusRepositoryError> {
        self.with_state(|state| {
            let exists = state
                .rows
                .iter()
                .any(|row| row.repo == repo && row.commit == commit.sha);
            if !exists {
                state.rows.push(SyncStatus::pending(repo, commit));
            }
            !exists
        })
    }

    async fn mark_error(
        &self,
        repo: &str,
        commit: &str,
        message: &str,
    ) -> Result<(), SyncStatusRepositoryError> {
        self.update(repo, commit, |row| {
            row.error_message = Some(message.to_owned());
            row.is_active = false;
        })
    }

    async fn set_manifest(
        &self,
        repo: &str,
        commit: &str,
        manifest: &str,
    ) -> Result<(), SyncStatusRepositoryError> {
        let now = self.clock.utc();
        self.update(repo, commit, |row| {
            row.manifest = Some(manifest.to_owned());
            row.applied_at = Some(now);
        })
    }

    async fn set_applied_migration(
        &self,
        repo: &str,
        commit: &str,
        applied_migration: &str,
    ) -> Result<(), SyncStatusRepositoryError> {
        self.update(repo, commit, |row| {
            row.applied_migration = Some(applied_migration.to_owned());
        })
    }

    async fn mark_as_active(
        &self,
        repo: &str,
        commit: &str,
    ) -> Result<(), SyncStatusRepositoryError> {
        self.with_state(|state| {
            for row in state.rows.iter_mut().filter(|row| row.repo == repo) {
                row.is_active = row.commit == commit;
            }
        })
    }

    async fn mark_as_skipped(
        &self,
        repo: &str,
        commit: &str,
    ) -> Result<(), SyncStatusRepositoryError> {
        let now = self.clock.utc();
        self.update(repo, commit, |row| {
            row.is_skipped = true;
            row.applied_at = Some(now);
        })
    }

    async fn active_migration(
        &self,
        repo: &str,
    ) -> Result<Option<SyncStatus>, SyncStatusRepositoryError> {
        self.with_state(|state| {
            state
                .rows
                .iter()
                .find(|row| row.repo == repo && row.is_active)
                .cloned()
        })
    }

    async fn recent_statuses(
        &self,
        limit: usize,
    ) -> Result<Vec<SyncStatus>, SyncStatusRepositoryError> {
        self.with_state(|state| {
            let mut rows = state.rows.clone();
            rows.sort_by(|left, right| right.commit_date.cmp(&left.commit_date));
            rows.truncate(limit);
            rows
        })
    }
}
