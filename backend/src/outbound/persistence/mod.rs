//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the sync ledger, lease lock, collection
//! registry and migration engine ports, backed by `diesel-async` with `bb8`
//! connection pooling.
//!
//! # Architecture
//!
//! - **Thin adapters**: repositories translate between Diesel rows and domain
//!   types; sync decisions stay in the domain.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Strongly typed errors**: pool and Diesel failures map onto each port's
//!   `connection` / `query` variants.
//!
//! # Example
//!
//! ```ignore
//! use backend::outbound::persistence::{DbPool, DieselSyncStatusRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/mimsy")).await?;
//! let ledger = DieselSyncStatusRepository::new(pool.clone());
//! ```

mod diesel_collection_registry;
mod diesel_helpers;
mod diesel_lease_lock_repository;
mod diesel_sync_status_repository;
mod models;
mod pool;
mod postgres_migration_engine;
mod schema;
mod schema_migrations;

pub use diesel_collection_registry::DieselCollectionRegistry;
pub use diesel_lease_lock_repository::DieselLeaseLockRepository;
pub use diesel_sync_status_repository::DieselSyncStatusRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
pub use postgres_migration_engine::{PostgresMigrationEngine, PostgresMigrationSession};
pub use schema_migrations::{SchemaMigrationError, apply_schema_migrations};
