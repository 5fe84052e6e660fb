//! Shared error mapping for Diesel-backed adapters.
//!
//! Every port error generated by `define_port_error!` in this crate carries
//! a `connection` and a `query` constructor, so adapters classify failures
//! once here and pick the constructor at the call site.

use tracing::debug;

use super::pool::PoolError;

/// Coarse classification of a persistence failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DieselFailure {
    /// The database could not be reached or dropped the connection.
    Connection(String),
    /// The statement was rejected or returned an unexpected shape.
    Query(String),
}

impl DieselFailure {
    /// Convert into a port error using its connection and query constructors.
    pub(crate) fn into_port_error<E>(
        self,
        connection: impl FnOnce(String) -> E,
        query: impl FnOnce(String) -> E,
    ) -> E {
        match self {
            Self::Connection(message) => connection(message),
            Self::Query(message) => query(message),
        }
    }
}

/// Extract a readable message from a pool error.
pub(crate) fn map_pool_error_message(error: PoolError) -> String {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    }
}

/// Classify a Diesel error and emit debug context for `operation`.
pub(crate) fn classify_diesel_error(
    error: diesel::result::Error,
    operation: &str,
) -> DieselFailure {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), operation, "diesel operation failed");
        }
        _ => debug!(%error, operation, "diesel operation failed"),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _)
        | DieselError::BrokenTransactionManager => {
            DieselFailure::Connection(format!("{operation}: database connection error"))
        }
        DieselError::NotFound => DieselFailure::Query(format!("{operation}: record not found")),
        other => DieselFailure::Query(format!("{operation}: {other}")),
    }
}
