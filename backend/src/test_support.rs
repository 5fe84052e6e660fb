//! Test utilities for the backend crate.
//!
//! In-memory implementations of the domain ports shared by unit tests (in
//! `src/`) and behaviour tests (in `tests/`). Compiled for tests and when the
//! `test-support` feature is enabled.

mod clock;
mod lease_locks;
mod migration_engine;
mod source;
mod sync_ledger;

pub use clock::MutableClock;
pub use lease_locks::{InMemoryLeaseLockRepository, LeaseRow};
pub use migration_engine::InMemoryMigrationEngine;
pub use source::{RecordingCollectionRegistry, StaticSourceRepository};
pub use sync_ledger::InMemorySyncStatusRepository;
