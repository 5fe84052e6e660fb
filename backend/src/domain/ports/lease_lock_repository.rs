//! Port abstraction for fleet-wide lease locks.
//!
//! A lease row exists only while some holder believes it owns the key.
//! Acquisition succeeds when no row exists or the stored lease has expired.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by lease lock adapters.
    pub enum LeaseLockRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "lease lock connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "lease lock query failed: {message}",
    }
}

/// Port for atomically acquiring and releasing lease rows.
///
/// Implementations must perform each call as one atomic statement; a
/// read-then-write sequence would let two holders acquire the same key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LeaseLockRepository: Send + Sync {
    /// Insert or steal the lease for `key`, owned by `holder` until
    /// `expires_at`.
    ///
    /// Returns `false` when an unexpired lease is held by someone else.
    async fn acquire(
        &self,
        key: &str,
        holder: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, LeaseLockRepositoryError>;

    /// Delete the lease for `key` if `holder` still owns it.
    ///
    /// Returns `false` when the row is gone or owned by another holder.
    async fn release(&self, key: &str, holder: &str) -> Result<bool, LeaseLockRepositoryError>;
}
