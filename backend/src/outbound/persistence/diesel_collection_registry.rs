//! PostgreSQL-backed `CollectionRegistry` writing the `collection` table.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use mockable::{Clock, DefaultClock};
use tracing::debug;

use crate::domain::ports::{CollectionRecord, CollectionRegistry, CollectionRegistryError};

use super::diesel_helpers::{classify_diesel_error, map_pool_error_message};
use super::models::NewCollectionRow;
use super::pool::DbPool;
use super::schema::collection;

/// Diesel-backed implementation of the `CollectionRegistry` port.
#[derive(Clone)]
pub struct DieselCollectionRegistry {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl DieselCollectionRegistry {
    /// Create a new registry with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self::with_clock(pool, Arc::new(DefaultClock))
    }

    /// Create a registry stamping `updated_at` from `clock`.
    pub fn with_clock(pool: DbPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl CollectionRegistry for DieselCollectionRegistry {
    async fn upsert_collections(
        &self,
        records: &[CollectionRecord],
    ) -> Result<(), CollectionRegistryError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| CollectionRegistryError::connection(map_pool_error_message(err)))?;

        let rows: Vec<NewCollectionRow<'_>> = records
            .iter()
            .map(|record| NewCollectionRow {
                slug: &record.slug,
                name: &record.name,
                fields: &record.fields,
                is_global: record.is_global,
            })
            .collect();
        let updated_at = self.clock.utc();

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                for row in &rows {
                    diesel::insert_into(collection::table)
                        .values(row)
                        .on_conflict(collection::slug)
                        .do_update()
                        .set((
                            collection::name.eq(excluded(collection::name)),
                            collection::fields.eq(excluded(collection::fields)),
                            collection::is_global.eq(excluded(collection::is_global)),
                            collection::updated_at.eq(updated_at),
                        ))
                        .execute(conn)
                        .await?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(|err| {
            classify_diesel_error(err, "upsert collections").into_port_error(
                CollectionRegistryError::connection,
                CollectionRegistryError::query,
            )
        })?;

        debug!(count = records.len(), "upserted collection registry");
        Ok(())
    }
}
