//! Applies an operation batch through the expand/contract migration engine.
//!
//! The runner enforces the engine's state machine:
//! `Uninitialized -> Idle -> ActivePeriod -> Idle`. Only one migration may be
//! in flight per schema, and the engine session is always closed on exit.

use std::sync::Arc;

use content_schema::{Migration, Operation};
use tracing::{debug, info, warn};

use crate::domain::ports::{BackfillConfig, MigrationEngine, MigrationEngineError, MigrationSession};

/// Errors returned by [`MigrationRunner::run`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationRunError {
    /// The engine's state store has never been provisioned.
    #[error("migration state is not initialized")]
    NotInitialized,

    /// Another migration holds the active period.
    #[error("migration {} is active", .name.as_deref().unwrap_or("<unknown>"))]
    MigrationInProgress {
        /// Name of the in-flight migration, when the engine reports it.
        name: Option<String>,
    },

    /// The engine failed while querying state or executing DDL.
    #[error(transparent)]
    Engine(#[from] MigrationEngineError),
}

/// Domain service driving one migration batch through the engine.
#[derive(Clone)]
pub struct MigrationRunner {
    engine: Arc<dyn MigrationEngine>,
    backfill: BackfillConfig,
}

impl MigrationRunner {
    /// Build a runner with default backfill settings.
    pub fn new(engine: Arc<dyn MigrationEngine>) -> Self {
        Self::with_backfill(engine, BackfillConfig::default())
    }

    /// Build a runner forwarding `backfill` to every `start` call.
    pub fn with_backfill(engine: Arc<dyn MigrationEngine>, backfill: BackfillConfig) -> Self {
        Self { engine, backfill }
    }

    /// Apply `operations` as one migration called `name`.
    ///
    /// Returns the number of migrations applied: `1` for a started and
    /// completed batch, `0` when `operations` is empty or `name` is already
    /// the latest migration.
    ///
    /// # Errors
    ///
    /// - [`MigrationRunError::NotInitialized`] when the state store is absent.
    /// - [`MigrationRunError::MigrationInProgress`] when an active period is
    ///   already open.
    /// - [`MigrationRunError::Engine`] when the engine fails, including a
    ///   failed `close` after an otherwise successful run.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let runner = MigrationRunner::new(engine);
    /// let applied = runner.run(operations, "Add posts (hash:0123abcd)").await?;
    /// ```
    pub async fn run(
        &self,
        operations: Vec<Operation>,
        name: &str,
    ) -> Result<usize, MigrationRunError> {
        let mut session = self.engine.connect().await?;
        let outcome = self.run_in_session(session.as_mut(), operations, name).await;
        let closed = session.close().await;

        match (outcome, closed) {
            (Ok(count), Ok(())) => Ok(count),
            (Ok(_), Err(close_error)) => Err(close_error.into()),
            (Err(error), Ok(())) => Err(error),
            (Err(error), Err(close_error)) => {
                warn!(%close_error, migration = name, "failed to close migration session");
                Err(error)
            }
        }
    }

    async fn run_in_session(
        &self,
        session: &mut dyn MigrationSession,
        operations: Vec<Operation>,
        name: &str,
    ) -> Result<usize, MigrationRunError> {
        if !session.is_initialized().await? {
            return Err(MigrationRunError::NotInitialized);
        }

        let latest = session.latest_migration().await?;
        if session.is_active_migration_period().await? {
            return Err(MigrationRunError::MigrationInProgress { name: latest });
        }

        if latest.as_deref() == Some(name) {
            info!(migration = name, "migration already applied");
            return Ok(0);
        }
        if operations.is_empty() {
            debug!(migration = name, "no operations to apply");
            return Ok(0);
        }

        let migration = Migration {
            name: name.to_owned(),
            operations,
        };
        info!(
            migration = name,
            operations = migration.operations.len(),
            batch_size = self.backfill.batch_size,
            "starting migration"
        );
        session.start(&migration, &self.backfill).await?;
        session.complete().await?;
        info!(migration = name, "migration completed");
        Ok(1)
    }
}
