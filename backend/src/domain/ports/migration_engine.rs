//! Driven port for the expand/contract migration engine.
//!
//! The engine owns the live collections schema and a state store recording
//! applied migrations. A session pins one connection so that `start` and
//! `complete` bracket the same active period.

use std::time::Duration;

use async_trait::async_trait;
use content_schema::Migration;

use super::define_port_error;

/// Batch settings forwarded to the engine's backfill machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillConfig {
    /// Rows copied per backfill batch.
    pub batch_size: u32,
    /// Pause between backfill batches.
    pub batch_delay: Duration,
}

impl BackfillConfig {
    /// Rows per batch when nothing else is configured.
    pub const DEFAULT_BATCH_SIZE: u32 = 1000;
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::DEFAULT_BATCH_SIZE,
            batch_delay: Duration::ZERO,
        }
    }
}

define_port_error! {
    /// Errors raised by migration engine adapters.
    pub enum MigrationEngineError {
        /// The engine could not open a connection.
        Connection { message: String } => "migration engine connection failed: {message}",
        /// Reading the migration state store failed.
        State { message: String } => "migration state query failed: {message}",
        /// Executing migration DDL failed.
        Execution { message: String } => "migration execution failed: {message}",
        /// `complete` was called with no open active period.
        NoActiveMigration => "no migration is active",
    }
}

/// Read side of the engine's state store.
#[async_trait]
pub trait MigrationState: Send + Sync {
    /// Return whether the state store has been provisioned.
    async fn is_initialized(&mut self) -> Result<bool, MigrationEngineError>;

    /// Return the name of the most recently started migration.
    async fn latest_migration(&mut self) -> Result<Option<String>, MigrationEngineError>;

    /// Return whether a migration has been started but not completed.
    async fn is_active_migration_period(&mut self) -> Result<bool, MigrationEngineError>;
}

/// Write side of the engine: one expand/contract window at a time.
#[async_trait]
pub trait Migrator: Send + Sync {
    /// Open an active period and run the expand phase of `migration`.
    async fn start(
        &mut self,
        migration: &Migration,
        backfill: &BackfillConfig,
    ) -> Result<(), MigrationEngineError>;

    /// Run the contract phase and close the active period.
    async fn complete(&mut self) -> Result<(), MigrationEngineError>;

    /// Release the session's connection.
    async fn close(&mut self) -> Result<(), MigrationEngineError>;
}

/// A connected engine session exposing both state and migrator.
pub trait MigrationSession: MigrationState + Migrator {}

impl<T> MigrationSession for T where T: MigrationState + Migrator {}

/// Port for opening migration engine sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MigrationEngine: Send + Sync {
    /// Open a session against the target schema.
    async fn connect(&self) -> Result<Box<dyn MigrationSession>, MigrationEngineError>;
}
