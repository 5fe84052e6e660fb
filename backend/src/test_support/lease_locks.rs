//! In-memory lease table with the same steal-on-expiry rule as `cron_locks`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;

use crate::domain::ports::{LeaseLockRepository, LeaseLockRepositoryError};

/// Stored lease row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRow {
    /// Holder token of the current owner.
    pub locked_by: String,
    /// When the current owner acquired the row.
    pub locked_at: DateTime<Utc>,
    /// When the lease may be stolen.
    pub expires_at: DateTime<Utc>,
}

/// Mutex-guarded lease table; each call is atomic with respect to others.
#[derive(Clone)]
pub struct InMemoryLeaseLockRepository {
    rows: Arc<Mutex<HashMap<String, LeaseRow>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryLeaseLockRepository {
    /// Empty table judging expiry against `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Current row for `key`, if any.
    pub fn row(&self, key: &str) -> Option<LeaseRow> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, LeaseRow>> {
        match self.rows.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("lease table mutex"),
        }
    }
}

#[async_trait]
impl LeaseLockRepository for InMemoryLeaseLockRepository {
    async fn acquire(
        &self,
        key: &str,
        holder: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, LeaseLockRepositoryError> {
        let now = self.clock.utc();
        let mut rows = self.lock();
        let free = rows.get(key).is_none_or(|row| row.expires_at < now);
        if free {
            rows.insert(
                key.to_owned(),
                LeaseRow {
                    locked_by: holder.to_owned(),
                    locked_at: now,
                    expires_at,
                },
            );
        }
        Ok(free)
    }

    async fn release(&self, key: &str, holder: &str) -> Result<bool, LeaseLockRepositoryError> {
        let mut rows = self.lock();
        let owned = rows.get(key).is_some_and(|row| row.locked_by == holder);
        if owned {
            rows.remove(key);
        }
        Ok(owned)
    }
}
