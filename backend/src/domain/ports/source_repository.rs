//! Driven port for reading the tracked content repository.
//!
//! The orchestrator only needs the head commit and raw file bytes at a given
//! commit. Adapters own authentication and transport.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::define_port_error;

/// Head commit metadata reported by the source repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full commit SHA.
    pub sha: String,
    /// Commit message.
    pub message: String,
    /// Author or committer date.
    pub date: DateTime<Utc>,
}

impl CommitInfo {
    /// Build commit metadata.
    pub fn new(sha: impl Into<String>, message: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            sha: sha.into(),
            message: message.into(),
            date,
        }
    }
}

define_port_error! {
    /// Errors surfaced while reading the content repository.
    pub enum SourceError {
        /// The requested path does not exist at the given commit.
        NotFound { path: String } => "file not found in repository: {path}",
        /// Credentials were rejected by the remote host.
        Unauthorized { message: String } => "source repository rejected credentials: {message}",
        /// Network transport failed or the host returned an unexpected status.
        Transport { message: String } => "source repository request failed: {message}",
        /// The response body could not be decoded.
        Decode { message: String } => "source repository response decode failed: {message}",
    }
}

impl SourceError {
    /// Return whether the error means the file is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Port for reading commits and files from the tracked repository.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Fetch the latest commit on the default branch of `repo`.
    async fn last_commit(&self, repo: &str) -> Result<CommitInfo, SourceError>;

    /// Fetch the raw bytes of `path` at commit `sha`.
    ///
    /// Returns [`SourceError::NotFound`] when the path does not exist.
    async fn file_content(&self, repo: &str, sha: &str, path: &str)
    -> Result<Vec<u8>, SourceError>;
}
