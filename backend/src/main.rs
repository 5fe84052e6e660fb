//! `mimsy-sync` entry point: applies content schemas from a tracked
//! repository on a schedule, or once on demand.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use backend::config::SyncSettings;
use backend::domain::{
    LeaseLocker, Scheduler, StatusPageRequest, SyncOrchestrator, SyncOutcome, SyncPorts,
};
use backend::outbound::github::GithubSourceRepository;
use backend::outbound::persistence::{
    DbPool, DieselCollectionRegistry, DieselLeaseLockRepository, DieselSyncStatusRepository,
    PoolConfig, PostgresMigrationEngine, apply_schema_migrations,
};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

const GITHUB_TIMEOUT: Duration = Duration::from_secs(30);

/// `mimsy-sync` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mimsy-sync",
    about = "Synchronise content schemas from a Git repository into PostgreSQL",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the scheduled sync job until interrupted (default).
    Serve,
    /// Sync the repository head once and exit.
    SyncOnce,
    /// Print recent sync ledger rows as JSON.
    Status {
        /// Number of rows to print.
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let cli = Cli::try_parse().unwrap_or_else(|err| err.exit());
    let settings = SyncSettings::load_from_iter([OsString::from("mimsy-sync")])
        .map_err(|err| eyre!("failed to load configuration: {err}"))?;

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build Tokio runtime")?;
    runtime.block_on(run(cli.command.unwrap_or(Command::Serve), settings))
}

async fn run(command: Command, settings: SyncSettings) -> Result<()> {
    let database_url = settings.database_url()?.to_owned();
    let migration_url = database_url.clone();
    let applied = tokio::task::spawn_blocking(move || apply_schema_migrations(&migration_url))
        .await
        .wrap_err("schema migration task panicked")??;
    info!(applied, "service schema ready");

    let pool = DbPool::new(PoolConfig::new(database_url))
        .await
        .wrap_err("failed to build database pool")?;
    let orchestrator = Arc::new(build_orchestrator(&settings, &pool)?);

    match command {
        Command::Serve => serve(orchestrator, &settings, pool).await,
        Command::SyncOnce => sync_once(&orchestrator).await,
        Command::Status { limit } => print_status(&orchestrator, limit).await,
    }
}

fn build_orchestrator(settings: &SyncSettings, pool: &DbPool) -> Result<SyncOrchestrator> {
    let api_url = Url::parse(settings.github_api_url())
        .with_context(|| format!("invalid GitHub API URL {}", settings.github_api_url()))?;
    let source = GithubSourceRepository::new(
        api_url,
        settings.github_token().map(str::to_owned),
        GITHUB_TIMEOUT,
    )
    .wrap_err("failed to build GitHub client")?;

    let ports = SyncPorts::new(
        Arc::new(source),
        Arc::new(DieselSyncStatusRepository::new(pool.clone())),
        Arc::new(DieselCollectionRegistry::new(pool.clone())),
        Arc::new(PostgresMigrationEngine::new(pool.clone())),
    );
    Ok(SyncOrchestrator::new(ports, settings.sync_config()?))
}

async fn serve(
    orchestrator: Arc<SyncOrchestrator>,
    settings: &SyncSettings,
    pool: DbPool,
) -> Result<()> {
    let clock = Arc::new(DefaultClock);
    let locker = LeaseLocker::new(Arc::new(DieselLeaseLockRepository::new(pool)), clock.clone())
        .with_lease(settings.lock_lease());
    let scheduler = Scheduler::new(locker, clock);
    orchestrator
        .register_sync_job(&scheduler)
        .wrap_err("failed to register sync job")?;

    scheduler.start();
    info!(
        repository = %orchestrator.config().repository,
        schedule = %orchestrator.config().schedule,
        "sync scheduler running"
    );
    tokio::signal::ctrl_c()
        .await
        .wrap_err("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    scheduler.stop().await;
    Ok(())
}

async fn sync_once(orchestrator: &SyncOrchestrator) -> Result<()> {
    match orchestrator.sync_repository().await? {
        SyncOutcome::UpToDate { commit } => println!("{commit}: already up to date"),
        SyncOutcome::Skipped { commit } => println!("{commit}: schema unchanged, skipped"),
        SyncOutcome::Applied {
            commit,
            migration,
            operations,
        } => println!("{commit}: applied {migration} ({operations} operations)"),
    }
    Ok(())
}

async fn print_status(orchestrator: &SyncOrchestrator, limit: Option<usize>) -> Result<()> {
    let statuses = orchestrator
        .recent_statuses(StatusPageRequest::new(limit))
        .await
        .wrap_err("failed to read sync ledger")?;
    let json = serde_json::to_string_pretty(&statuses).wrap_err("failed to render statuses")?;
    println!("{json}");
    Ok(())
}
