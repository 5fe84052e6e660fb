//! Keeps the live collections schema in step with the tracked repository.
//!
//! One call to [`SyncOrchestrator::sync_repository`] runs the pipeline
//! fetch → create-if-absent → manifest → compile/diff/apply → activate, in
//! that order. The orchestrator is the only component that decides how the
//! ledger row for a commit ends up: active, skipped, or carrying an error.
//! Failed commits are retried on the next tick because the ledger never
//! advances past them.

use std::sync::Arc;

use async_trait::async_trait;
use content_schema::{
    CompileError, Migration, PROJECT_CONFIG_FILE_NAME, ProjectConfig, Schema, compile, diff,
};
use tracing::{info, warn};

use crate::domain::migration_runner::{MigrationRunError, MigrationRunner};
use crate::domain::ports::{
    CollectionRecord, CollectionRegistry, CollectionRegistryError, CommitInfo, MigrationEngine,
    ScheduledTask, ScheduledTaskError, SourceError, SourceRepository, SyncStatusRepository,
    SyncStatusRepositoryError,
};
use crate::domain::scheduler::{Scheduler, SchedulerError};
use crate::domain::{StatusPageRequest, SyncStatus};

/// Schedule used for the sync job when none is configured.
pub const DEFAULT_SYNC_SCHEDULE: &str = "*/1 * * * *";

/// Port bundle required by the orchestrator.
pub struct SyncPorts {
    /// Tracked content repository.
    pub source: Arc<dyn SourceRepository>,
    /// Sync-status ledger.
    pub ledger: Arc<dyn SyncStatusRepository>,
    /// Collection registry updated after each applied schema.
    pub registry: Arc<dyn CollectionRegistry>,
    /// Expand/contract migration engine.
    pub engine: Arc<dyn MigrationEngine>,
}

impl SyncPorts {
    /// Build a strongly-typed port bundle.
    pub fn new(
        source: Arc<dyn SourceRepository>,
        ledger: Arc<dyn SyncStatusRepository>,
        registry: Arc<dyn CollectionRegistry>,
        engine: Arc<dyn MigrationEngine>,
    ) -> Self {
        Self {
            source,
            ledger,
            registry,
            engine,
        }
    }
}

/// Which repository to track and how often.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Repository reference, for example `owner/name`.
    pub repository: String,
    /// Prefix prepended to the project and default schema file names.
    pub project_path: String,
    /// Schedule text for the sync job.
    pub schedule: String,
}

impl SyncConfig {
    /// Track `repository` at its root on the default schedule.
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            project_path: String::new(),
            schedule: DEFAULT_SYNC_SCHEDULE.to_owned(),
        }
    }

    /// Name of the scheduler job driving this repository.
    pub fn job_name(&self) -> String {
        format!("sync-repo-{}", self.repository)
    }
}

/// How a sync call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The head commit is already active.
    UpToDate {
        /// Head commit SHA.
        commit: String,
    },
    /// The schema matched the active one; the commit was marked skipped.
    Skipped {
        /// Head commit SHA.
        commit: String,
    },
    /// A migration was applied and the commit is now active.
    Applied {
        /// Head commit SHA.
        commit: String,
        /// Migration name submitted to the engine.
        migration: String,
        /// Number of operations in the migration.
        operations: usize,
    },
}

/// Reason a commit could not be synced; recorded on its ledger row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncFailure {
    /// The project configuration file could not be fetched.
    #[error("failed to open manifest file: {0}")]
    ManifestFetch(SourceError),
    /// The project configuration file is not valid JSON.
    #[error("failed to unmarshal config file: {0}")]
    ManifestParse(String),
    /// The schema file could not be fetched.
    #[error("failed to fetch schema: {0}")]
    SchemaFetch(SourceError),
    /// The schema file is not a valid schema document.
    #[error("failed to unmarshal schema file: {0}")]
    SchemaParse(String),
    /// The schema does not compile.
    #[error("failed to generate sql migration: {0}")]
    Compile(CompileError),
    /// A document could not be serialised for storage.
    #[error("failed to serialize sync state: {0}")]
    Serialize(String),
    /// The active row's stored SQL IR could not be decoded.
    #[error("failed to unmarshal active schema: {0}")]
    Baseline(String),
    /// The schema produced no structural change.
    #[error("no migrations were run")]
    NoMigrations,
    /// The migration engine rejected or failed the migration.
    #[error("failed to run migration: {0}")]
    Migration(MigrationRunError),
}

/// Errors returned by [`SyncOrchestrator::sync_repository`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The head commit could not be fetched; no row was touched.
    #[error("failed to fetch latest commit for repository {repo}: {source}")]
    LatestCommit {
        /// Repository reference.
        repo: String,
        /// Source failure.
        source: SourceError,
    },

    /// The ledger could not be read or updated.
    #[error("sync status ledger failed for repository {repo}: {source}")]
    Ledger {
        /// Repository reference.
        repo: String,
        /// Ledger failure.
        source: SyncStatusRepositoryError,
    },

    /// The commit failed and the failure was recorded on its row.
    #[error("sync of repository {repo} at {commit} failed: {failure}")]
    Commit {
        /// Repository reference.
        repo: String,
        /// Commit SHA.
        commit: String,
        /// Recorded failure.
        failure: SyncFailure,
    },

    /// The commit was activated but the collection registry was not updated.
    #[error("failed to update collection registry for repository {repo}: {source}")]
    Registry {
        /// Repository reference.
        repo: String,
        /// Registry failure.
        source: CollectionRegistryError,
    },
}

enum StepError {
    Failure(SyncFailure),
    Ledger(SyncStatusRepositoryError),
    Registry(CollectionRegistryError),
}

impl From<SyncFailure> for StepError {
    fn from(failure: SyncFailure) -> Self {
        Self::Failure(failure)
    }
}

impl From<SyncStatusRepositoryError> for StepError {
    fn from(error: SyncStatusRepositoryError) -> Self {
        Self::Ledger(error)
    }
}

/// Drives compile, diff and apply for one tracked repository.
pub struct SyncOrchestrator {
    source: Arc<dyn SourceRepository>,
    ledger: Arc<dyn SyncStatusRepository>,
    registry: Arc<dyn CollectionRegistry>,
    runner: MigrationRunner,
    config: SyncConfig,
}

impl SyncOrchestrator {
    /// Build an orchestrator with a default migration runner.
    pub fn new(ports: SyncPorts, config: SyncConfig) -> Self {
        let runner = MigrationRunner::new(Arc::clone(&ports.engine));
        Self::with_runner(ports, runner, config)
    }

    /// Build an orchestrator around a preconfigured runner.
    pub fn with_runner(ports: SyncPorts, runner: MigrationRunner, config: SyncConfig) -> Self {
        Self {
            source: ports.source,
            ledger: ports.ledger,
            registry: ports.registry,
            runner,
            config,
        }
    }

    /// Tracked repository settings.
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Sync the tracked repository to its head commit.
    ///
    /// # Errors
    ///
    /// Fetch, parse, compile and migration failures are recorded on the
    /// commit's row and returned as [`SyncError::Commit`]; the previously
    /// active row stays active. Ledger and head-fetch failures are returned
    /// without touching any row.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let orchestrator = SyncOrchestrator::new(ports, SyncConfig::new("acme/site"));
    /// match orchestrator.sync_repository().await? {
    ///     SyncOutcome::Applied { migration, .. } => println!("applied {migration}"),
    ///     other => println!("{other:?}"),
    /// }
    /// ```
    pub async fn sync_repository(&self) -> Result<SyncOutcome, SyncError> {
        let repo = self.config.repository.as_str();
        info!(repository = repo, "starting sync");

        let head = self
            .source
            .last_commit(repo)
            .await
            .map_err(|source| SyncError::LatestCommit {
                repo: repo.to_owned(),
                source,
            })?;

        let last = self
            .ledger
            .last_synced_commit(repo)
            .await
            .map_err(|source| self.ledger_error(source))?;
        if last.is_some_and(|row| row.commit == head.sha && row.is_active) {
            info!(repository = repo, commit = %head.sha, "repository is up to date");
            return Ok(SyncOutcome::UpToDate { commit: head.sha });
        }

        self.ledger
            .create_if_not_exists(repo, &head)
            .await
            .map_err(|source| self.ledger_error(source))?;

        match self.process_commit(&head).await {
            Ok(outcome) => Ok(outcome),
            Err(StepError::Ledger(source)) => Err(self.ledger_error(source)),
            Err(StepError::Registry(source)) => Err(SyncError::Registry {
                repo: repo.to_owned(),
                source,
            }),
            Err(StepError::Failure(failure)) => {
                warn!(repository = repo, commit = %head.sha, error = %failure, "sync failed");
                self.ledger
                    .mark_error(repo, &head.sha, &failure.to_string())
                    .await
                    .map_err(|source| self.ledger_error(source))?;
                Err(SyncError::Commit {
                    repo: repo.to_owned(),
                    commit: head.sha,
                    failure,
                })
            }
        }
    }

    async fn process_commit(&self, head: &CommitInfo) -> Result<SyncOutcome, StepError> {
        let repo = self.config.repository.as_str();
        let sha = head.sha.as_str();

        let schema = self.fetch_schema(sha).await?;
        let manifest = schema
            .to_json()
            .map_err(|err| SyncFailure::Serialize(err.to_string()))?;
        let active = self.ledger.active_migration(repo).await?;

        let unchanged = active
            .as_ref()
            .and_then(SyncStatus::manifest_schema)
            .is_some_and(|active_schema| active_schema.same_collections(&schema));
        if unchanged {
            info!(repository = repo, commit = sha, "schema unchanged; marking as skipped");
            self.ledger.set_manifest(repo, sha, &manifest).await?;
            self.ledger.mark_as_skipped(repo, sha).await?;
            return Ok(SyncOutcome::Skipped {
                commit: sha.to_owned(),
            });
        }

        self.ledger.set_manifest(repo, sha, &manifest).await?;

        let compiled = compile(&schema).map_err(SyncFailure::Compile)?;
        let compiled_json = compiled
            .to_json()
            .map_err(|err| SyncFailure::Serialize(err.to_string()))?;
        let records = collection_records(&schema)?;
        self.ledger
            .set_applied_migration(repo, sha, &compiled_json)
            .await?;

        let baseline = active
            .map(|row| row.applied_schema())
            .transpose()
            .map_err(|err| SyncFailure::Baseline(err.to_string()))?
            .unwrap_or_default();
        let operations = diff(&baseline, &compiled);
        if operations.is_empty() {
            return Err(SyncFailure::NoMigrations.into());
        }

        let name = Migration::name_for_commit(&head.message, sha);
        let operation_count = operations.len();
        let applied = self
            .runner
            .run(operations, &name)
            .await
            .map_err(SyncFailure::Migration)?;
        if applied == 0 {
            info!(repository = repo, migration = %name, "migration already applied; activating");
        }

        self.ledger.mark_as_active(repo, sha).await?;
        self.registry
            .upsert_collections(&records)
            .await
            .map_err(StepError::Registry)?;

        info!(
            repository = repo,
            commit = sha,
            migration = %name,
            operations = operation_count,
            "completed sync"
        );
        Ok(SyncOutcome::Applied {
            commit: sha.to_owned(),
            migration: name,
            operations: operation_count,
        })
    }

    async fn fetch_schema(&self, sha: &str) -> Result<Schema, SyncFailure> {
        let repo = self.config.repository.as_str();
        let prefix = self.config.project_path.as_str();

        let config_path = format!("{prefix}{PROJECT_CONFIG_FILE_NAME}");
        let config_bytes = self
            .source
            .file_content(repo, sha, &config_path)
            .await
            .map_err(SyncFailure::ManifestFetch)?;
        let project = decode(&config_bytes)
            .and_then(|text| ProjectConfig::from_json(text).map_err(|err| err.to_string()))
            .map_err(SyncFailure::ManifestParse)?;

        let schema_path = project.schema_file_path(prefix);
        let schema_bytes = self
            .source
            .file_content(repo, sha, &schema_path)
            .await
            .map_err(SyncFailure::SchemaFetch)?;
        decode(&schema_bytes)
            .and_then(|text| Schema::from_json(text).map_err(|err| err.to_string()))
            .map_err(SyncFailure::SchemaParse)
    }

    fn ledger_error(&self, source: SyncStatusRepositoryError) -> SyncError {
        SyncError::Ledger {
            repo: self.config.repository.clone(),
            source,
        }
    }

    /// Recent ledger rows across repositories, newest commit first.
    ///
    /// # Errors
    ///
    /// Returns the ledger failure.
    pub async fn recent_statuses(
        &self,
        page: StatusPageRequest,
    ) -> Result<Vec<SyncStatus>, SyncStatusRepositoryError> {
        self.ledger.recent_statuses(page.limit()).await
    }

    /// The active row for the tracked repository.
    ///
    /// # Errors
    ///
    /// Returns the ledger failure.
    pub async fn active_migration(&self) -> Result<Option<SyncStatus>, SyncStatusRepositoryError> {
        self.ledger.active_migration(&self.config.repository).await
    }

    /// Register the periodic sync job for the tracked repository.
    ///
    /// # Errors
    ///
    /// Returns the scheduler's rejection, for example a duplicate job name or
    /// invalid schedule text.
    pub fn register_sync_job(self: &Arc<Self>, scheduler: &Scheduler) -> Result<(), SchedulerError> {
        scheduler.register_job(
            &self.config.job_name(),
            &self.config.schedule,
            Arc::new(SyncJob(Arc::clone(self))),
        )?;
        info!(
            repository = %self.config.repository,
            schedule = %self.config.schedule,
            "registered sync job"
        );
        Ok(())
    }
}

fn decode(bytes: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(bytes).map_err(|err| err.to_string())
}

fn collection_records(schema: &Schema) -> Result<Vec<CollectionRecord>, SyncFailure> {
    schema
        .collections
        .iter()
        .map(|collection| {
            let fields = serde_json::to_value(&collection.schema)
                .map_err(|err| SyncFailure::Serialize(err.to_string()))?;
            Ok(CollectionRecord {
                slug: collection.name.clone(),
                name: collection.name.clone(),
                fields,
                is_global: collection.is_global,
            })
        })
        .collect()
}

/// Scheduler adapter running one sync per tick.
struct SyncJob(Arc<SyncOrchestrator>);

#[async_trait]
impl ScheduledTask for SyncJob {
    async fn run(&self) -> Result<(), ScheduledTaskError> {
        self.0
            .sync_repository()
            .await
            .map(|_| ())
            .map_err(|err| ScheduledTaskError::failed(err.to_string()))
    }
}

#[cfg(test)]
mod tests;
