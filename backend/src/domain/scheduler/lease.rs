//! Fleet-wide mutual exclusion over the lease lock port.
//!
//! A lease is a time-bounded claim on a key. It is only as correct as the
//! participants' clocks: replicas must agree on "now" to within the lease
//! margin.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use tracing::debug;

use crate::domain::ports::{LeaseLockRepository, LeaseLockRepositoryError};

/// Lease length used when none is configured.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(30);

const UNKNOWN_HOST: &str = "unknown-host";

/// Errors returned by [`LeaseLocker`] and [`LeaseGuard`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// An unexpired lease for the key belongs to someone else.
    #[error("failed to acquire lock: lock is held by another process")]
    HeldByAnotherProcess {
        /// Contended key.
        key: String,
    },

    /// The lease row was missing or owned by another holder on unlock.
    #[error("lock not found or not owned by this instance")]
    NotOwned {
        /// Key being released.
        key: String,
    },

    /// The configured lease does not fit a timestamp offset.
    #[error("invalid lease duration: {message}")]
    InvalidLease {
        /// Conversion failure detail.
        message: String,
    },

    /// The lease table could not be reached or queried.
    #[error(transparent)]
    Repository(#[from] LeaseLockRepositoryError),
}

/// Acquires leases for named keys on behalf of this process.
#[derive(Clone)]
pub struct LeaseLocker {
    repository: Arc<dyn LeaseLockRepository>,
    clock: Arc<dyn Clock>,
    lease: Duration,
    hostname: String,
}

impl LeaseLocker {
    /// Build a locker using the machine hostname and the default lease.
    pub fn new(repository: Arc<dyn LeaseLockRepository>, clock: Arc<dyn Clock>) -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| UNKNOWN_HOST.to_owned());
        Self {
            repository,
            clock,
            lease: DEFAULT_LEASE,
            hostname,
        }
    }

    /// Override the lease length.
    #[must_use]
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Override the hostname used in holder tokens.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Configured lease length.
    pub const fn lease(&self) -> Duration {
        self.lease
    }

    /// Acquire the lease for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::HeldByAnotherProcess`] when an unexpired lease
    /// exists, which callers treat as "skip this tick".
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let guard = locker.lock("sync-repo-acme/site").await?;
    /// // ... exclusive work ...
    /// guard.unlock().await?;
    /// ```
    pub async fn lock(&self, key: &str) -> Result<LeaseGuard, LockError> {
        let now = self.clock.utc();
        let lease = TimeDelta::from_std(self.lease).map_err(|err| LockError::InvalidLease {
            message: err.to_string(),
        })?;
        let expires_at = now + lease;
        let holder = holder_token(&self.hostname, now);

        if !self.repository.acquire(key, &holder, expires_at).await? {
            debug!(key, "lease held by another process");
            return Err(LockError::HeldByAnotherProcess {
                key: key.to_owned(),
            });
        }

        debug!(key, %holder, %expires_at, "lease acquired");
        Ok(LeaseGuard {
            repository: Arc::clone(&self.repository),
            key: key.to_owned(),
            holder,
            expires_at,
        })
    }
}

/// Holder tokens are `<hostname>-<unix nanos>`.
fn holder_token(hostname: &str, now: DateTime<Utc>) -> String {
    let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros());
    format!("{hostname}-{nanos}")
}

/// Proof of a held lease. Dropping the guard does not release the row; the
/// lease then expires on its own.
pub struct LeaseGuard {
    repository: Arc<dyn LeaseLockRepository>,
    key: String,
    holder: String,
    expires_at: DateTime<Utc>,
}

impl LeaseGuard {
    /// Locked key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Holder token stored in the lease row.
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// When the lease becomes stealable.
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Release the lease if this guard still owns it.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::NotOwned`] when the row was deleted or stolen
    /// after expiry; the stored row is left untouched in that case.
    pub async fn unlock(self) -> Result<(), LockError> {
        if self.repository.release(&self.key, &self.holder).await? {
            debug!(key = %self.key, "lease released");
            Ok(())
        } else {
            Err(LockError::NotOwned { key: self.key })
        }
    }
}
