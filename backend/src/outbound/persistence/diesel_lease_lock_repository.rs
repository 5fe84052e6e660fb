//! PostgreSQL-backed `LeaseLockRepository` using the `cron_locks` table.
//!
//! Acquisition is a single `INSERT ... ON CONFLICT DO UPDATE ... WHERE`
//! statement: the row is written when the key is free or its lease has
//! expired, and `RETURNING key` yields nothing when another holder's lease
//! is still live. Expiry is judged against the database clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::QueryableByName;
use diesel::sql_types::{Timestamptz, Varchar};
use diesel_async::RunQueryDsl;

use crate::domain::ports::{LeaseLockRepository, LeaseLockRepositoryError};

use super::diesel_helpers::{classify_diesel_error, map_pool_error_message};
use super::pool::{DbPool, PoolError};

const ACQUIRE_SQL: &str = "INSERT INTO cron_locks (key, locked_by, locked_at, expires_at) \
     VALUES ($1, $2, CURRENT_TIMESTAMP, $3) \
     ON CONFLICT (key) DO UPDATE \
     SET locked_by = EXCLUDED.locked_by, locked_at = CURRENT_TIMESTAMP, expires_at = EXCLUDED.expires_at \
     WHERE cron_locks.expires_at < CURRENT_TIMESTAMP \
     RETURNING key";

const RELEASE_SQL: &str = "DELETE FROM cron_locks WHERE key = $1 AND locked_by = $2";

#[derive(QueryableByName)]
struct LockedKey {
    #[diesel(sql_type = Varchar)]
    #[expect(dead_code, reason = "only the presence of a returned row matters")]
    key: String,
}

/// Diesel-backed implementation of the `LeaseLockRepository` port.
#[derive(Clone)]
pub struct DieselLeaseLockRepository {
    pool: DbPool,
}

impl DieselLeaseLockRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> LeaseLockRepositoryError {
    LeaseLockRepositoryError::connection(map_pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error, operation: &str) -> LeaseLockRepositoryError {
    classify_diesel_error(error, operation).into_port_error(
        LeaseLockRepositoryError::connection,
        LeaseLockRepositoryError::query,
    )
}

#[async_trait]
impl LeaseLockRepository for DieselLeaseLockRepository {
    async fn acquire(
        &self,
        key: &str,
        holder: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, LeaseLockRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let returned: Vec<LockedKey> = diesel::sql_query(ACQUIRE_SQL)
            .bind::<Varchar, _>(key)
            .bind::<Varchar, _>(holder)
            .bind::<Timestamptz, _>(expires_at)
            .get_results(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "acquire lease"))?;

        Ok(!returned.is_empty())
    }

    async fn release(&self, key: &str, holder: &str) -> Result<bool, LeaseLockRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let deleted = diesel::sql_query(RELEASE_SQL)
            .bind::<Varchar, _>(key)
            .bind::<Varchar, _>(holder)
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "release lease"))?;

        Ok(deleted > 0)
    }
}
