//! Orchestration tests against the in-memory adapters.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use mockable::Clock;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::MockCollectionRegistry;
use crate::test_support::{
    InMemoryMigrationEngine, InMemorySyncStatusRepository, MutableClock,
    RecordingCollectionRegistry, StaticSourceRepository,
};

const REPO: &str = "acme/site";

const POSTS: &str = r#"{"collections":[{"name":"posts","schema":{
    "title":{"type":"string","options":{"constraints":{"required":true}}}
}}]}"#;

const POSTS_DESCRIBED: &str = r#"{"collections":[{"name":"posts","schema":{
    "title":{"type":"string","options":{"description":"Headline","constraints":{"required":true}}}
}}]}"#;

const POSTS_AND_SETTINGS: &str = r#"{"collections":[
    {"name":"posts","schema":{"title":{"type":"string"}}},
    {"name":"settings","isGlobal":true,"schema":{"site_name":{"type":"string"}}}
]}"#;

struct Harness {
    clock: Arc<MutableClock>,
    source: StaticSourceRepository,
    ledger: InMemorySyncStatusRepository,
    registry: RecordingCollectionRegistry,
    engine: InMemoryMigrationEngine,
}

impl Harness {
    fn orchestrator(&self, config: SyncConfig) -> Arc<SyncOrchestrator> {
        let ports = SyncPorts::new(
            Arc::new(self.source.clone()),
            Arc::new(self.ledger.clone()),
            Arc::new(self.registry.clone()),
            Arc::new(self.engine.clone()),
        );
        Arc::new(SyncOrchestrator::new(ports, config))
    }

    fn default_orchestrator(&self) -> Arc<SyncOrchestrator> {
        self.orchestrator(SyncConfig::new(REPO))
    }

    /// Publish a commit whose project config points at the default schema.
    fn publish(&self, sha: &str, message: &str, schema: &str) {
        self.clock.advance_seconds(60);
        self.source
            .set_head(CommitInfo::new(sha, message, self.clock.utc()));
        self.source.put_file(sha, "mimsy.config.json", "{}");
        self.source.put_file(sha, "mimsy.schema.json", schema);
    }
}

#[fixture]
fn harness() -> Harness {
    let start = Utc
        .with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
        .single()
        .expect("valid start");
    let clock = Arc::new(MutableClock::new(start));
    Harness {
        ledger: InMemorySyncStatusRepository::with_clock(clock.clone()),
        clock,
        source: StaticSourceRepository::new(),
        registry: RecordingCollectionRegistry::new(),
        engine: InMemoryMigrationEngine::new(),
    }
}

#[rstest]
#[tokio::test]
async fn first_commit_is_applied_and_activated(harness: Harness) {
    harness.publish("abcdef0123456789", "Add posts", POSTS);

    let outcome = harness
        .default_orchestrator()
        .sync_repository()
        .await
        .expect("sync succeeds");

    assert_eq!(
        outcome,
        SyncOutcome::Applied {
            commit: "abcdef0123456789".to_owned(),
            migration: "Add posts (hash:abcdef01)".to_owned(),
            operations: 1,
        }
    );
    let row = harness
        .ledger
        .row(REPO, "abcdef0123456789")
        .expect("row recorded");
    assert!(row.is_active);
    assert!(row.error_message.is_none());
    assert!(row.applied_migration.is_some());
    assert_eq!(harness.engine.applied_names(), ["Add posts (hash:abcdef01)"]);
}

#[rstest]
#[tokio::test]
async fn second_sync_of_the_same_head_is_a_no_op(harness: Harness) {
    harness.publish("c1", "Add posts", POSTS);
    let orchestrator = harness.default_orchestrator();
    orchestrator.sync_repository().await.expect("first sync");
    let requests_after_first = harness.source.file_requests().len();

    let outcome = orchestrator.sync_repository().await.expect("second sync");

    assert_eq!(
        outcome,
        SyncOutcome::UpToDate {
            commit: "c1".to_owned()
        }
    );
    assert_eq!(harness.source.file_requests().len(), requests_after_first);
    assert_eq!(harness.engine.connect_count(), 1);
    assert_eq!(harness.ledger.rows().len(), 1);
}

#[rstest]
#[tokio::test]
async fn unchanged_schema_is_skipped(harness: Harness) {
    let orchestrator = harness.default_orchestrator();
    harness.publish("c1", "Add posts", POSTS);
    orchestrator.sync_repository().await.expect("first sync");

    harness.publish("c2", "Fix typo in README", POSTS);
    let outcome = orchestrator.sync_repository().await.expect("second sync");

    assert_eq!(
        outcome,
        SyncOutcome::Skipped {
            commit: "c2".to_owned()
        }
    );
    let skipped = harness.ledger.row(REPO, "c2").expect("row recorded");
    assert!(skipped.is_skipped);
    assert!(!skipped.is_active);
    assert!(skipped.manifest.is_some());
    assert!(harness.ledger.row(REPO, "c1").expect("row").is_active);
    assert_eq!(harness.engine.connect_count(), 1);
}

#[rstest]
#[tokio::test]
async fn schema_change_diffs_against_the_active_baseline(harness: Harness) {
    let orchestrator = harness.default_orchestrator();
    harness.publish("c1", "Add posts", POSTS);
    orchestrator.sync_repository().await.expect("first sync");

    harness.publish("c2", "Add settings", POSTS_AND_SETTINGS);
    let outcome = orchestrator.sync_repository().await.expect("second sync");

    assert!(matches!(outcome, SyncOutcome::Applied { .. }));
    assert!(!harness.ledger.row(REPO, "c1").expect("row").is_active);
    assert!(harness.ledger.row(REPO, "c2").expect("row").is_active);
    assert_eq!(harness.engine.applied_names().len(), 2);
}

#[rstest]
#[tokio::test]
async fn failure_is_recorded_and_previous_row_stays_active(harness: Harness) {
    let orchestrator = harness.default_orchestrator();
    harness.publish("c1", "Add posts", POSTS);
    orchestrator.sync_repository().await.expect("first sync");

    harness.publish("c2", "Break schema", "{not json");
    let error = orchestrator
        .sync_repository()
        .await
        .expect_err("invalid schema");

    assert!(matches!(
        error,
        SyncError::Commit {
            failure: SyncFailure::SchemaParse(_),
            ..
        }
    ));
    let failed = harness.ledger.row(REPO, "c2").expect("row recorded");
    assert!(!failed.is_active);
    let message = failed.error_message.expect("error recorded");
    assert!(message.starts_with("failed to unmarshal schema file"));
    let active = orchestrator
        .active_migration()
        .await
        .expect("ledger reachable")
        .expect("active row");
    assert_eq!(active.commit, "c1");
}

#[rstest]
#[tokio::test]
async fn failed_commit_is_retried_on_the_next_tick(harness: Harness) {
    let orchestrator = harness.default_orchestrator();
    harness.publish("c1", "Add posts", POSTS);
    harness.engine.fail_start("deadlock detected");

    let first = orchestrator.sync_repository().await.expect_err("start fails");
    assert!(matches!(
        first,
        SyncError::Commit {
            failure: SyncFailure::Migration(_),
            ..
        }
    ));

    let second = orchestrator.sync_repository().await.expect("retry succeeds");
    assert!(matches!(second, SyncOutcome::Applied { .. }));
    assert!(harness.ledger.row(REPO, "c1").expect("row").is_active);
}

#[rstest]
#[tokio::test]
async fn description_only_change_is_recorded_as_no_migrations(harness: Harness) {
    let orchestrator = harness.default_orchestrator();
    harness.publish("c1", "Add posts", POSTS);
    orchestrator.sync_repository().await.expect("first sync");

    harness.publish("c2", "Describe title", POSTS_DESCRIBED);
    let error = orchestrator
        .sync_repository()
        .await
        .expect_err("nothing to migrate");

    assert!(matches!(
        error,
        SyncError::Commit {
            failure: SyncFailure::NoMigrations,
            ..
        }
    ));
    let row = harness.ledger.row(REPO, "c2").expect("row recorded");
    assert_eq!(row.error_message.as_deref(), Some("no migrations were run"));
}

#[rstest]
#[case::explicit_manifest(r#"{"manifestPath":"schema/site.json"}"#, "schema/site.json")]
#[case::base_path(r#"{"basePath":"cms"}"#, "cms/mimsy.schema.json")]
#[case::project_prefix("{}", "site/mimsy.schema.json")]
#[tokio::test]
async fn schema_path_follows_project_config(
    harness: Harness,
    #[case] project_config: &str,
    #[case] expected_path: &str,
) {
    let config = SyncConfig {
        project_path: "site/".to_owned(),
        ..SyncConfig::new(REPO)
    };
    harness
        .source
        .set_head(CommitInfo::new("c1", "Add posts", harness.clock.utc()));
    harness
        .source
        .put_file("c1", "site/mimsy.config.json", project_config);
    harness.source.put_file("c1", expected_path, POSTS);

    harness
        .orchestrator(config)
        .sync_repository()
        .await
        .expect("sync succeeds");

    assert_eq!(
        harness.source.file_requests(),
        ["site/mimsy.config.json", expected_path]
    );
}

#[rstest]
#[tokio::test]
async fn missing_project_config_is_a_manifest_failure(harness: Harness) {
    harness
        .source
        .set_head(CommitInfo::new("c1", "Init", harness.clock.utc()));

    let error = harness
        .default_orchestrator()
        .sync_repository()
        .await
        .expect_err("no config");

    assert!(matches!(
        error,
        SyncError::Commit {
            failure: SyncFailure::ManifestFetch(ref source),
            ..
        } if source.is_not_found()
    ));
}

#[rstest]
#[tokio::test]
async fn head_failure_touches_no_rows(harness: Harness) {
    harness
        .source
        .fail_head(SourceError::unauthorized("bad credentials"));

    let error = harness
        .default_orchestrator()
        .sync_repository()
        .await
        .expect_err("head unavailable");

    assert!(matches!(error, SyncError::LatestCommit { .. }));
    assert!(harness.ledger.rows().is_empty());
}

#[rstest]
#[tokio::test]
async fn registry_receives_compiled_collections(harness: Harness) {
    harness.publish("c1", "Add settings", POSTS_AND_SETTINGS);

    harness
        .default_orchestrator()
        .sync_repository()
        .await
        .expect("sync succeeds");

    let batches = harness.registry.batches();
    assert_eq!(batches.len(), 1);
    let slugs: Vec<(&str, bool)> = batches[0]
        .iter()
        .map(|record| (record.slug.as_str(), record.is_global))
        .collect();
    assert_eq!(slugs, [("posts", false), ("settings", true)]);
    assert_eq!(batches[0][1].fields["site_name"]["type"], "string");
}

#[rstest]
#[tokio::test]
async fn registry_failure_keeps_the_commit_active(harness: Harness) {
    harness.publish("c1", "Add posts", POSTS);
    let mut registry = MockCollectionRegistry::new();
    registry
        .expect_upsert_collections()
        .times(1)
        .returning(|_| Err(CollectionRegistryError::query("relation missing")));
    let ports = SyncPorts::new(
        Arc::new(harness.source.clone()),
        Arc::new(harness.ledger.clone()),
        Arc::new(registry),
        Arc::new(harness.engine.clone()),
    );
    let orchestrator = SyncOrchestrator::new(ports, SyncConfig::new(REPO));

    let error = orchestrator.sync_repository().await.expect_err("registry fails");

    assert!(matches!(error, SyncError::Registry { .. }));
    let row = harness.ledger.row(REPO, "c1").expect("row recorded");
    assert!(row.is_active);
    assert!(row.error_message.is_none());
}

#[rstest]
#[tokio::test]
async fn ledger_failure_is_not_recorded_as_a_commit_error(harness: Harness) {
    harness.publish("c1", "Add posts", POSTS);
    harness.ledger.fail_queries("connection reset");

    let error = harness
        .default_orchestrator()
        .sync_repository()
        .await
        .expect_err("ledger down");

    assert_eq!(
        error,
        SyncError::Ledger {
            repo: REPO.to_owned(),
            source: SyncStatusRepositoryError::query("connection reset"),
        }
    );
}

#[rstest]
#[tokio::test]
async fn recent_statuses_are_paged(harness: Harness) {
    let orchestrator = harness.default_orchestrator();
    for index in 0..4 {
        harness.publish(&format!("c{index}"), "Add posts", POSTS);
        let _ = orchestrator.sync_repository().await;
    }

    let page = orchestrator
        .recent_statuses(StatusPageRequest::new(Some(3)))
        .await
        .expect("ledger reachable");

    let commits: Vec<&str> = page.iter().map(|row| row.commit.as_str()).collect();
    assert_eq!(commits, ["c3", "c2", "c1"]);
}

#[rstest]
#[tokio::test]
async fn sync_job_is_registered_under_the_repository_name(harness: Harness) {
    harness.publish("c1", "Add posts", POSTS);
    let orchestrator = harness.default_orchestrator();
    let locker = crate::domain::LeaseLocker::new(
        Arc::new(crate::test_support::InMemoryLeaseLockRepository::new(
            harness.clock.clone(),
        )),
        harness.clock.clone(),
    );
    let scheduler = Scheduler::new(locker, harness.clock.clone());

    orchestrator
        .register_sync_job(&scheduler)
        .expect("job registered");

    assert_eq!(scheduler.list_jobs(), ["sync-repo-acme/site"]);
    let outcome = scheduler
        .run_job_now("sync-repo-acme/site")
        .await
        .expect("known job");
    assert_eq!(outcome, crate::domain::RunOutcome::Completed);
    assert!(harness.ledger.row(REPO, "c1").expect("row").is_active);
}
