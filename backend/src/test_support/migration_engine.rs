//! In-memory migration engine with scriptable failures.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use content_schema::Migration;

use crate::domain::ports::{
    BackfillConfig, MigrationEngine, MigrationEngineError, MigrationSession, MigrationState,
    Migrator,
};

#[derive(Debug, Default)]
struct EngineState {
    initialized: bool,
    applied: Vec<Migration>,
    active: Option<String>,
    pending: Option<Migration>,
    last_backfill: Option<BackfillConfig>,
    start_failure: Option<String>,
    close_failure: Option<String>,
    connects: usize,
    closes: usize,
}

/// Migration engine that records applied migrations in memory.
#[derive(Clone, Default)]
pub struct InMemoryMigrationEngine {
    state: Arc<Mutex<EngineState>>,
}

impl InMemoryMigrationEngine {
    /// Engine with an initialized state store and no history.
    pub fn new() -> Self {
        let engine = Self::default();
        engine.lock().initialized = true;
        engine
    }

    /// Engine whose state store was never provisioned.
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// Leave `name` open as an in-flight migration.
    pub fn open_active_period(&self, name: &str) {
        self.lock().active = Some(name.to_owned());
    }

    /// Make the next `start` call fail with an execution error.
    pub fn fail_start(&self, message: &str) {
        self.lock().start_failure = Some(message.to_owned());
    }

    /// Make every `close` call fail with a connection error.
    pub fn fail_close(&self, message: &str) {
        self.lock().close_failure = Some(message.to_owned());
    }

    /// Names of completed migrations in application order.
    pub fn applied_names(&self) -> Vec<String> {
        self.lock()
            .applied
            .iter()
            .map(|migration| migration.name.clone())
            .collect()
    }

    /// Completed migrations in application order.
    pub fn applied(&self) -> Vec<Migration> {
        self.lock().applied.clone()
    }

    /// Whether an active period is open.
    pub fn is_active(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Number of sessions opened.
    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    /// Number of sessions closed.
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    /// Backfill settings passed to the most recent `start`.
    pub fn last_backfill(&self) -> Option<BackfillConfig> {
        self.lock().last_backfill
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("engine state mutex"),
        }
    }
}

#[async_trait]
impl MigrationEngine for InMemoryMigrationEngine {
    async fn connect(&self) -> Result<Box<dyn MigrationSession>, MigrationEngineError> {
        self.lock().connects += 1;
        Ok(Box::new(InMemorySession {
            engine: self.clone(),
        }))
    }
}

struct InMemorySession {
    engine: InMemoryMigrationEngine,
}

#[async_trait]
impl MigrationState for InMemorySession {
    async fn is_initialized(&mut self) -> Result<bool, MigrationEngineError> {
        Ok(self.engine.lock().initialized)
    }

    async fn latest_migration(&mut self) -> Result<Option<String>, MigrationEngineError> {
        let state = self.engine.lock();
        Ok(state.active.clone().or_else(|| {
            state
                .applied
                .last()
                .map(|migration| migration.name.clone())
        }))
    }

    async fn is_active_migration_period(&mut self) -> Result<bool, MigrationEngineError> {
        Ok(self.engine.lock().active.is_some())
    }
}

#[async_trait]
impl Migrator for InMemorySession {
    async fn start(
        &mut self,
        migration: &Migration,
        backfill: &BackfillConfig,
    ) -> Result<(), MigrationEngineError> {
        let mut state = self.engine.lock();
        state.last_backfill = Some(*backfill);
        if let Some(message) = state.start_failure.take() {
            return Err(MigrationEngineError::execution(message));
        }
        state.active = Some(migration.name.clone());
        state.pending = Some(migration.clone());
        Ok(())
    }

    async fn complete(&mut self) -> Result<(), MigrationEngineError> {
        let mut state = self.engine.lock();
        let migration = state
            .pending
            .take()
            .ok_or_else(MigrationEngineError::no_active_migration)?;
        state.active = None;
        state.applied.push(migration);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), MigrationEngineError> {
        let mut state = self.engine.lock();
        state.closes += 1;
        match state.close_failure.clone() {
            Some(message) => Err(MigrationEngineError::connection(message)),
            None => Ok(()),
        }
    }
}
