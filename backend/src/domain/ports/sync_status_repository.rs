//! Port abstraction for the sync-status ledger.
//!
//! One row exists per `(repo, commit)` pair. Rows are created once and only
//! ever updated; at most one row per repository is active at a time.

use async_trait::async_trait;

use crate::domain::SyncStatus;

use super::{CommitInfo, define_port_error};

define_port_error! {
    /// Persistence errors raised by sync-status ledger adapters.
    pub enum SyncStatusRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "sync status connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "sync status query failed: {message}",
    }
}

/// Port for reading and mutating the sync-status ledger.
///
/// Implementations must:
/// - Make `create_if_not_exists` idempotent per `(repo, commit)`.
/// - Flip the active flag in `mark_as_active` with a single statement so no
///   reader observes two active rows for one repository.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncStatusRepository: Send + Sync {
    /// Return the most recently processed row (the latest row with
    /// `applied_at` set) for `repo`.
    async fn last_synced_commit(
        &self,
        repo: &str,
    ) -> Result<Option<SyncStatus>, SyncStatusRepositoryError>;

    /// Insert a pending row for `commit` unless one already exists.
    ///
    /// Returns `true` when a row was inserted.
    async fn create_if_not_exists(
        &self,
        repo: &str,
        commit: &CommitInfo,
    ) -> Result<bool, SyncStatusRepositoryError>;

    /// Record `message` against the row and clear its active flag.
    async fn mark_error(
        &self,
        repo: &str,
        commit: &str,
        message: &str,
    ) -> Result<(), SyncStatusRepositoryError>;

    /// Store the fetched schema document and stamp `applied_at`.
    async fn set_manifest(
        &self,
        repo: &str,
        commit: &str,
        manifest: &str,
    ) -> Result<(), SyncStatusRepositoryError>;

    /// Store the serialised SQL IR the database is being migrated to.
    async fn set_applied_migration(
        &self,
        repo: &str,
        commit: &str,
        applied_migration: &str,
    ) -> Result<(), SyncStatusRepositoryError>;

    /// Make `commit` the only active row for `repo`.
    async fn mark_as_active(&self, repo: &str, commit: &str)
    -> Result<(), SyncStatusRepositoryError>;

    /// Flag the row as skipped and stamp `applied_at`.
    async fn mark_as_skipped(
        &self,
        repo: &str,
        commit: &str,
    ) -> Result<(), SyncStatusRepositoryError>;

    /// Return the active row for `repo`, if any.
    async fn active_migration(
        &self,
        repo: &str,
    ) -> Result<Option<SyncStatus>, SyncStatusRepositoryError>;

    /// Return up to `limit` rows across all repositories, newest commit first.
    async fn recent_statuses(
        &self,
        limit: usize,
    ) -> Result<Vec<SyncStatus>, SyncStatusRepositoryError>;
}
