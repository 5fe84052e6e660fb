//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::SyncStatus;

use super::schema::{collection, migrations, sync_status};

// ---------------------------------------------------------------------------
// Sync-status ledger
// ---------------------------------------------------------------------------

/// Row struct for reading from the sync_status table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = sync_status)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SyncStatusRow {
    pub repo: String,
    pub commit: String,
    pub commit_message: String,
    pub commit_date: DateTime<Utc>,
    pub manifest: Option<String>,
    pub applied_migration: Option<String>,
    pub applied_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_skipped: bool,
    pub error_message: Option<String>,
}

impl From<SyncStatusRow> for SyncStatus {
    fn from(row: SyncStatusRow) -> Self {
        Self {
            repo: row.repo,
            commit: row.commit,
            commit_message: row.commit_message,
            commit_date: row.commit_date,
            manifest: row.manifest,
            applied_migration: row.applied_migration,
            applied_at: row.applied_at,
            is_active: row.is_active,
            is_skipped: row.is_skipped,
            error_message: row.error_message,
        }
    }
}

/// Insertable struct for a freshly observed commit.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = sync_status)]
pub(crate) struct NewSyncStatusRow<'a> {
    pub repo: &'a str,
    pub commit: &'a str,
    pub commit_message: &'a str,
    pub commit_date: DateTime<Utc>,
    pub is_active: bool,
    pub is_skipped: bool,
}

// ---------------------------------------------------------------------------
// Collection registry
// ---------------------------------------------------------------------------

/// Insertable struct for upserting collection registry entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = collection)]
pub(crate) struct NewCollectionRow<'a> {
    pub slug: &'a str,
    pub name: &'a str,
    pub fields: &'a serde_json::Value,
    pub is_global: bool,
}

// ---------------------------------------------------------------------------
// Migration engine state
// ---------------------------------------------------------------------------

/// Row struct for reading the engine's open migration.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = migrations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct MigrationRow {
    pub name: String,
    pub migration: serde_json::Value,
}

/// Insertable struct for recording a started migration.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = migrations)]
pub(crate) struct NewMigrationRow<'a> {
    pub name: &'a str,
    pub migration: &'a serde_json::Value,
    pub done: bool,
}
