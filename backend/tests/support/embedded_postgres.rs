//! Embedded PostgreSQL bootstrap for adapter tests.
//!
//! Each test gets its own database on the cluster, migrated with the same
//! embedded migrations the binary applies at startup. Databases are created
//! through `postgres` rather than Diesel so `CREATE DATABASE` runs outside a
//! transaction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use backend::outbound::persistence::apply_schema_migrations;
use pg_embedded_setup_unpriv::TestCluster;
use postgres::{Client, NoTls};

use super::format_postgres_error;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

static DATABASE_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn is_transient_error(err: &str) -> bool {
    let err = err.to_lowercase();
    [
        "error decoding response body",
        "connection reset",
        "connection refused",
        "timed out",
        "temporarily unavailable",
        "dns error",
    ]
    .iter()
    .any(|pattern| err.contains(pattern))
}

/// Start an embedded cluster, retrying transient download failures.
pub fn embedded_cluster() -> Result<TestCluster, String> {
    let mut last_error = String::new();
    for attempt in 0..=MAX_RETRIES {
        match TestCluster::new() {
            Ok(cluster) => return Ok(cluster),
            Err(err) => {
                last_error = format!("{err:?}");
                if attempt == MAX_RETRIES || !is_transient_error(&last_error) {
                    break;
                }
                eprintln!("pg-embed: transient error on attempt {}, retrying", attempt + 1);
                std::thread::sleep(RETRY_DELAY * (1 << attempt));
            }
        }
    }
    Err(last_error)
}

/// Create a fresh migrated database and return its URL.
pub fn provision_database(cluster: &TestCluster) -> Result<String, String> {
    let connection = cluster.connection();
    let name = format!(
        "mimsy_test_{}_{}",
        std::process::id(),
        DATABASE_COUNTER.fetch_add(1, Ordering::Relaxed)
    );

    let mut admin = Client::connect(&connection.database_url("postgres"), NoTls)
        .map_err(|err| format!("connect: {}", format_postgres_error(&err)))?;
    admin
        .batch_execute(&format!("CREATE DATABASE \"{name}\""))
        .map_err(|err| format!("create database: {}", format_postgres_error(&err)))?;

    let url = connection.database_url(&name);
    apply_schema_migrations(&url).map_err(|err| err.to_string())?;
    Ok(url)
}
