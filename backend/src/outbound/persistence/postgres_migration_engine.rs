//! Expand/contract migration engine over a dedicated PostgreSQL connection.
//!
//! The state store is `mimsy_collections_roll.migrations`. `start` runs the
//! additive operations of a migration against `mimsy_collections` and records
//! the migration as open (`done = false`); `complete` runs its drops and
//! closes it. Each phase is one transaction, so a failed phase leaves the
//! schema and the state store untouched.

use std::sync::Arc;

use async_trait::async_trait;
use content_schema::{COLLECTIONS_SCHEMA, Migration, Operation};
use diesel::prelude::*;
use diesel::sql_types::Bool;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl, SimpleAsyncConnection};
use mockable::{Clock, DefaultClock};
use tracing::{debug, info};

use crate::domain::ports::{
    BackfillConfig, MigrationEngine, MigrationEngineError, MigrationSession, MigrationState,
    Migrator,
};

use super::diesel_helpers::map_pool_error_message;
use super::models::{MigrationRow, NewMigrationRow};
use super::pool::DbPool;
use super::schema::migrations;

const STATE_TABLE_PRESENT_SQL: &str =
    "SELECT to_regclass('mimsy_collections_roll.migrations') IS NOT NULL AS present";

#[derive(QueryableByName)]
struct StateTablePresent {
    #[diesel(sql_type = Bool)]
    present: bool,
}

/// Opens [`PostgresMigrationSession`]s on the shared pool.
#[derive(Clone)]
pub struct PostgresMigrationEngine {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl PostgresMigrationEngine {
    /// Create an engine drawing session connections from `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self::with_clock(pool, Arc::new(DefaultClock))
    }

    /// Create an engine whose sessions stamp completions from `clock`.
    pub fn with_clock(pool: DbPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl MigrationEngine for PostgresMigrationEngine {
    async fn connect(&self) -> Result<Box<dyn MigrationSession>, MigrationEngineError> {
        let conn = self
            .pool
            .get_owned()
            .await
            .map_err(|err| MigrationEngineError::connection(map_pool_error_message(err)))?;
        Ok(Box::new(PostgresMigrationSession {
            conn: Some(conn),
            clock: Arc::clone(&self.clock),
        }))
    }
}

/// One pinned connection bracketing a start/complete pair.
pub struct PostgresMigrationSession {
    conn: Option<PooledConnection<'static, AsyncPgConnection>>,
    clock: Arc<dyn Clock>,
}

impl PostgresMigrationSession {
    fn conn(&mut self) -> Result<&mut AsyncPgConnection, MigrationEngineError> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| MigrationEngineError::connection("session is closed"))
    }
}

fn state_error(error: diesel::result::Error) -> MigrationEngineError {
    MigrationEngineError::state(error.to_string())
}

fn execution_error(error: diesel::result::Error) -> MigrationEngineError {
    MigrationEngineError::execution(error.to_string())
}

async fn run_operations<'a>(
    conn: &mut AsyncPgConnection,
    operations: impl Iterator<Item = &'a Operation>,
) -> Result<(), diesel::result::Error> {
    for operation in operations {
        let statement = operation.to_sql(COLLECTIONS_SCHEMA);
        debug!(%statement, "executing migration operation");
        conn.batch_execute(&statement).await?;
    }
    Ok(())
}

#[async_trait]
impl MigrationState for PostgresMigrationSession {
    async fn is_initialized(&mut self) -> Result<bool, MigrationEngineError> {
        let row: StateTablePresent = diesel::sql_query(STATE_TABLE_PRESENT_SQL)
            .get_result(self.conn()?)
            .await
            .map_err(state_error)?;
        Ok(row.present)
    }

    async fn latest_migration(&mut self) -> Result<Option<String>, MigrationEngineError> {
        migrations::table
            .order(migrations::created_at.desc())
            .select(migrations::name)
            .first::<String>(self.conn()?)
            .await
            .optional()
            .map_err(state_error)
    }

    async fn is_active_migration_period(&mut self) -> Result<bool, MigrationEngineError> {
        diesel::select(diesel::dsl::exists(
            migrations::table.filter(migrations::done.eq(false)),
        ))
        .get_result::<bool>(self.conn()?)
        .await
        .map_err(state_error)
    }
}

#[async_trait]
impl Migrator for PostgresMigrationSession {
    async fn start(
        &mut self,
        migration: &Migration,
        backfill: &BackfillConfig,
    ) -> Result<(), MigrationEngineError> {
        let document = serde_json::to_value(migration)
            .map_err(|err| MigrationEngineError::execution(err.to_string()))?;
        info!(
            migration = %migration.name,
            operations = migration.operations.len(),
            batch_size = backfill.batch_size,
            batch_delay = ?backfill.batch_delay,
            "starting migration"
        );

        self.conn()?
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    run_operations(
                        conn,
                        migration.operations.iter().filter(|op| !op.is_contracting()),
                    )
                    .await?;
                    diesel::insert_into(migrations::table)
                        .values(&NewMigrationRow {
                            name: &migration.name,
                            migration: &document,
                            done: false,
                        })
                        .execute(conn)
                        .await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await
            .map_err(execution_error)
    }

    async fn complete(&mut self) -> Result<(), MigrationEngineError> {
        let open: Option<MigrationRow> = migrations::table
            .filter(migrations::done.eq(false))
            .order(migrations::created_at.desc())
            .select(MigrationRow::as_select())
            .first(self.conn()?)
            .await
            .optional()
            .map_err(state_error)?;
        let MigrationRow { name, migration } =
            open.ok_or_else(MigrationEngineError::no_active_migration)?;
        let migration: Migration = serde_json::from_value(migration)
            .map_err(|err| MigrationEngineError::state(err.to_string()))?;
        let open_name = name.as_str();
        let completed_at = self.clock.utc();

        self.conn()?
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    run_operations(
                        conn,
                        migration.operations.iter().filter(|op| op.is_contracting()),
                    )
                    .await?;
                    diesel::update(migrations::table.filter(migrations::name.eq(open_name)))
                        .set((
                            migrations::done.eq(true),
                            migrations::updated_at.eq(completed_at),
                        ))
                        .execute(conn)
                        .await?;
                    Ok(())
                }
                .scope_boxed()
            })
            .await
            .map_err(execution_error)?;

        info!(migration = %name, "completed migration");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), MigrationEngineError> {
        drop(self.conn.take());
        Ok(())
    }
}
