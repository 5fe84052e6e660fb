//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod collection_registry;
mod lease_lock_repository;
mod migration_engine;
mod scheduled_task;
mod source_repository;
mod sync_status_repository;

#[cfg(test)]
pub use collection_registry::MockCollectionRegistry;
pub use collection_registry::{CollectionRecord, CollectionRegistry, CollectionRegistryError};
#[cfg(test)]
pub use lease_lock_repository::MockLeaseLockRepository;
pub use lease_lock_repository::{LeaseLockRepository, LeaseLockRepositoryError};
#[cfg(test)]
pub use migration_engine::MockMigrationEngine;
pub use migration_engine::{
    BackfillConfig, MigrationEngine, MigrationEngineError, MigrationSession, MigrationState,
    Migrator,
};
#[cfg(test)]
pub use scheduled_task::MockScheduledTask;
pub use scheduled_task::{ScheduledTask, ScheduledTaskError};
#[cfg(test)]
pub use source_repository::MockSourceRepository;
pub use source_repository::{CommitInfo, SourceError, SourceRepository};
#[cfg(test)]
pub use sync_status_repository::MockSyncStatusRepository;
pub use sync_status_repository::{SyncStatusRepository, SyncStatusRepositoryError};
