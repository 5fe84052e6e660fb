//! PostgreSQL-backed `SyncStatusRepository` implementation using Diesel ORM.
//!
//! Rows are keyed by `(repo, commit)`; a unique index makes
//! `create_if_not_exists` a single idempotent insert. Activation is one
//! `UPDATE` over every row of the repository so at most one row is ever
//! active.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel_async::RunQueryDsl;
use mockable::{Clock, DefaultClock};
use tracing::debug;

use crate::domain::SyncStatus;
use crate::domain::ports::{CommitInfo, SyncStatusRepository, SyncStatusRepositoryError};

use super::diesel_helpers::{classify_diesel_error, map_pool_error_message};
use super::models::{NewSyncStatusRow, SyncStatusRow};
use super::pool::{DbPool, PoolError};
use super::schema::sync_status;

const MARK_AS_ACTIVE_SQL: &str = "UPDATE sync_status \
     SET is_active = CASE WHEN commit = $2 THEN true ELSE false END \
     WHERE repo = $1";

/// Diesel-backed implementation of the `SyncStatusRepository` port.
#[derive(Clone)]
pub struct DieselSyncStatusRepository {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl DieselSyncStatusRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self::with_clock(pool, Arc::new(DefaultClock))
    }

    /// Create a repository stamping `applied_at` from `clock`.
    pub fn with_clock(pool: DbPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

fn map_pool_error(error: PoolError) -> SyncStatusRepositoryError {
    SyncStatusRepositoryError::connection(map_pool_error_message(error))
}

fn query_failed(
    operation: &'static str,
) -> impl FnOnce(diesel::result::Error) -> SyncStatusRepositoryError {
    move |error| {
        classify_diesel_error(error, operation).into_port_error(
            SyncStatusRepositoryError::connection,
            SyncStatusRepositoryError::query,
        )
    }
}

#[async_trait]
impl SyncStatusRepository for DieselSyncStatusRepository {
    async fn last_synced_commit(
        &self,
        repo: &str,
    ) -> Result<Option<SyncStatus>, SyncStatusRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<SyncStatusRow> = sync_status::table
            .filter(sync_status::repo.eq(repo))
            .filter(sync_status::applied_at.is_not_null())
            .order(sync_status::applied_at.desc())
            .select(SyncStatusRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(query_failed("load last synced commit"))?;

        Ok(row.map(SyncStatus::from))
    }

    async fn create_if_not_exists(
        &self,
        repo: &str,
        commit: &CommitInfo,
    ) -> Result<bool, SyncStatusRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let new_row = NewSyncStatusRow {
            repo,
            commit: &commit.sha,
            commit_message: &commit.message,
            commit_date: commit.date,
            is_active: false,
            is_skipped: false,
        };
        let inserted = diesel::insert_into(sync_status::table)
            .values(&new_row)
            .on_conflict((sync_status::repo, sync_status::commit))
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(query_failed("create sync status"))?;

        debug!(repo, commit = %commit.sha, inserted, "ensured sync status row");
        Ok(inserted > 0)
    }

    async fn mark_error(
        &self,
        repo: &str,
        commit: &str,
        message: &str,
    ) -> Result<(), SyncStatusRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::update(sync_status::table)
            .filter(sync_status::repo.eq(repo))
            .filter(sync_status::commit.eq(commit))
            .set((
                sync_status::error_message.eq(Some(message)),
                sync_status::is_active.eq(false),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(query_failed("mark sync error"))
    }

    async fn set_manifest(
        &self,
        repo: &str,
        commit: &str,
        manifest: &str,
    ) -> Result<(), SyncStatusRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::update(sync_status::table)
            .filter(sync_status::repo.eq(repo))
            .filter(sync_status::commit.eq(commit))
            .set((
                sync_status::manifest.eq(Some(manifest)),
                sync_status::applied_at.eq(Some(self.clock.utc())),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(query_failed("store manifest"))
    }

    async fn set_applied_migration(
        &self,
        repo: &str,
        commit: &str,
        applied_migration: &str,
    ) -> Result<(), SyncStatusRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::update(sync_status::table)
            .filter(sync_status::repo.eq(repo))
            .filter(sync_status::commit.eq(commit))
            .set(sync_status::applied_migration.eq(Some(applied_migration)))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(query_failed("store applied migration"))
    }

    async fn mark_as_active(
        &self,
        repo: &str,
        commit: &str,
    ) -> Result<(), SyncStatusRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let updated = diesel::sql_query(MARK_AS_ACTIVE_SQL)
            .bind::<Text, _>(repo)
            .bind::<Text, _>(commit)
            .execute(&mut conn)
            .await
            .map_err(query_failed("mark active"))?;

        debug!(repo, commit, updated, "activated sync status row");
        Ok(())
    }

    async fn mark_as_skipped(
        &self,
        repo: &str,
        commit: &str,
    ) -> Result<(), SyncStatusRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::update(sync_status::table)
            .filter(sync_status::repo.eq(repo))
            .filter(sync_status::commit.eq(commit))
            .set((
                sync_status::is_skipped.eq(true),
                sync_status::applied_at.eq(Some(self.clock.utc())),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(query_failed("mark skipped"))
    }

    async fn active_migration(
        &self,
        repo: &str,
    ) -> Result<Option<SyncStatus>, SyncStatusRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<SyncStatusRow> = sync_status::table
            .filter(sync_status::repo.eq(repo))
            .filter(sync_status::is_active.eq(true))
            .select(SyncStatusRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(query_failed("load active migration"))?;

        Ok(row.map(SyncStatus::from))
    }

    async fn recent_statuses(
        &self,
        limit: usize,
    ) -> Result<Vec<SyncStatus>, SyncStatusRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows: Vec<SyncStatusRow> = sync_status::table
            .order(sync_status::commit_date.desc())
            .limit(limit)
            .select(SyncStatusRow::as_select())
            .load(&mut conn)
            .await
            .map_err(query_failed("load recent statuses"))?;

        Ok(rows.into_iter().map(SyncStatus::from).collect())
    }
}
