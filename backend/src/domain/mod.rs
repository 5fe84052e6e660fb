//! Domain services and ledger types for content-schema synchronisation.
//!
//! Purpose: keep the live collections database in step with the schema
//! committed to a tracked repository. Services here depend only on the
//! ports in [`ports`]; adapters live under `crate::outbound`.
//!
//! Public surface:
//! - SyncOrchestrator: fetch, compile, diff and apply for one repository.
//! - MigrationRunner: guarded submission of operations to the engine.
//! - Scheduler: periodic jobs under fleet-wide lease locks.
//! - SyncStatus: one row of the sync-status ledger.

pub mod ports;

mod migration_runner;
mod scheduler;
mod sync_orchestrator;
mod sync_status;

pub use self::migration_runner::{MigrationRunError, MigrationRunner};
pub use self::scheduler::{
    DEFAULT_LEASE, JobStatus, LeaseGuard, LeaseLocker, LockError, RunOutcome, ScheduleSpec,
    Scheduler, SchedulerError,
};
pub use self::sync_orchestrator::{
    DEFAULT_SYNC_SCHEDULE, SyncConfig, SyncError, SyncFailure, SyncOrchestrator, SyncOutcome,
    SyncPorts,
};
pub use self::sync_status::{StatusPageRequest, SyncStatus};
