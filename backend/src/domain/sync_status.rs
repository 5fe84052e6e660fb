//! Sync-status ledger rows and read-model paging.
//!
//! A [`SyncStatus`] is recorded once per observed `(repo, commit)` pair. The
//! active row's `applied_migration` is the SQL IR the live database matches
//! and is the diff baseline for the next sync.

use chrono::{DateTime, Utc};
use content_schema::{Schema, SqlSchema};
use serde::Serialize;

use super::ports::CommitInfo;

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Repository reference, for example `owner/name`.
    pub repo: String,
    /// Commit SHA the row tracks.
    pub commit: String,
    /// Commit message recorded at creation.
    pub commit_message: String,
    /// Commit date recorded at creation.
    pub commit_date: DateTime<Utc>,
    /// Schema document fetched for this commit.
    pub manifest: Option<String>,
    /// Serialised SQL IR the commit migrates to.
    pub applied_migration: Option<String>,
    /// When the row was last processed.
    pub applied_at: Option<DateTime<Utc>>,
    /// Whether this row is the live baseline for its repository.
    pub is_active: bool,
    /// Whether the commit was skipped because its schema was unchanged.
    pub is_skipped: bool,
    /// Failure recorded for the commit, if any.
    pub error_message: Option<String>,
}

impl SyncStatus {
    /// Build a fresh pending row for `commit`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use backend::domain::SyncStatus;
    /// use backend::domain::ports::CommitInfo;
    /// use chrono::Utc;
    ///
    /// let commit = CommitInfo::new("abc123", "Add posts", Utc::now());
    /// let row = SyncStatus::pending("acme/site", &commit);
    /// assert!(!row.is_active);
    /// assert!(row.applied_at.is_none());
    /// ```
    pub fn pending(repo: impl Into<String>, commit: &CommitInfo) -> Self {
        Self {
            repo: repo.into(),
            commit: commit.sha.clone(),
            commit_message: commit.message.clone(),
            commit_date: commit.date,
            manifest: None,
            applied_migration: None,
            applied_at: None,
            is_active: false,
            is_skipped: false,
            error_message: None,
        }
    }

    /// Decode the stored SQL IR, treating an absent value as an empty schema.
    ///
    /// # Errors
    ///
    /// Returns the decode error when the stored JSON is malformed.
    pub fn applied_schema(&self) -> Result<SqlSchema, serde_json::Error> {
        self.applied_migration
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .map_or_else(|| Ok(SqlSchema::default()), SqlSchema::from_json)
    }

    /// Decode the stored schema document, ignoring absent or malformed values.
    pub fn manifest_schema(&self) -> Option<Schema> {
        self.manifest
            .as_deref()
            .and_then(|raw| Schema::from_json(raw).ok())
    }
}

/// Bounded page request for the recent-statuses read model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPageRequest {
    limit: usize,
}

impl StatusPageRequest {
    /// Page size used when the caller does not ask for one.
    pub const DEFAULT_LIMIT: usize = 5;
    /// Largest page size a caller may request.
    pub const MAX_LIMIT: usize = 10;

    /// Clamp a requested page size; `None` and `0` fall back to the default.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use backend::domain::StatusPageRequest;
    ///
    /// assert_eq!(StatusPageRequest::new(None).limit(), 5);
    /// assert_eq!(StatusPageRequest::new(Some(50)).limit(), 10);
    /// ```
    pub fn new(requested: Option<usize>) -> Self {
        let limit = match requested {
            None | Some(0) => Self::DEFAULT_LIMIT,
            Some(size) => size.min(Self::MAX_LIMIT),
        };
        Self { limit }
    }

    /// Effective page size.
    pub const fn limit(self) -> usize {
        self.limit
    }
}

impl Default for StatusPageRequest {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn row() -> SyncStatus {
        let date = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
            .single()
            .expect("valid date");
        SyncStatus::pending("acme/site", &CommitInfo::new("deadbeef", "init", date))
    }

    #[rstest]
    #[case(None, 5)]
    #[case(Some(0), 5)]
    #[case(Some(3), 3)]
    #[case(Some(10), 10)]
    #[case(Some(11), 10)]
    fn page_size_is_clamped(#[case] requested: Option<usize>, #[case] expected: usize) {
        assert_eq!(StatusPageRequest::new(requested).limit(), expected);
    }

    #[rstest]
    fn missing_applied_migration_is_empty_schema() {
        let schema = row().applied_schema().expect("empty baseline");
        assert!(schema.tables.is_empty());
    }

    #[rstest]
    fn malformed_applied_migration_is_reported() {
        let mut status = row();
        status.applied_migration = Some("{not json".to_owned());
        assert!(status.applied_schema().is_err());
    }

    #[rstest]
    fn malformed_manifest_is_ignored() {
        let mut status = row();
        status.manifest = Some("[]".to_owned());
        assert!(status.manifest_schema().is_none());
    }
}
