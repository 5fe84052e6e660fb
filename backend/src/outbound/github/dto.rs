//! DTOs for decoding GitHub REST responses.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::ports::CommitInfo;

#[derive(Debug, Deserialize)]
pub(super) struct CommitResponseDto {
    pub(super) sha: String,
    pub(super) commit: CommitDetailDto,
}

#[derive(Debug, Deserialize)]
pub(super) struct CommitDetailDto {
    #[serde(default)]
    pub(super) message: String,
    pub(super) author: Option<SignatureDto>,
    pub(super) committer: Option<SignatureDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SignatureDto {
    pub(super) date: Option<DateTime<Utc>>,
}

impl CommitResponseDto {
    /// Prefer the committer date; fall back to the author date.
    pub(super) fn into_commit_info(self) -> Result<CommitInfo, String> {
        let date = [self.commit.committer, self.commit.author]
            .into_iter()
            .flatten()
            .find_map(|signature| signature.date)
            .ok_or_else(|| format!("commit {} carries no date", self.sha))?;
        Ok(CommitInfo::new(self.sha, self.commit.message, date))
    }
}
