//! Embedded Diesel migrations for the service's own tables.
//!
//! Applied once at startup over a blocking `PgConnection`; callers on an
//! async runtime should run [`apply_schema_migrations`] inside
//! `spawn_blocking`.

use diesel::{Connection, PgConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Errors raised while applying embedded migrations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaMigrationError {
    /// The database could not be reached.
    #[error("failed to connect for schema migrations: {message}")]
    Connect {
        /// Connection failure detail.
        message: String,
    },
    /// A migration failed to apply.
    #[error("failed to apply schema migrations: {message}")]
    Apply {
        /// Migration failure detail.
        message: String,
    },
}

/// Apply pending migrations and return how many ran.
///
/// # Errors
///
/// Returns [`SchemaMigrationError`] when the connection or a migration fails.
pub fn apply_schema_migrations(database_url: &str) -> Result<usize, SchemaMigrationError> {
    let mut conn =
        PgConnection::establish(database_url).map_err(|err| SchemaMigrationError::Connect {
            message: err.to_string(),
        })?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|err| SchemaMigrationError::Apply {
            message: err.to_string(),
        })?;
    for version in &applied {
        info!(%version, "applied schema migration");
    }
    Ok(applied.len())
}
