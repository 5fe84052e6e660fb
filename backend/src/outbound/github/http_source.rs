//! Reqwest-backed GitHub source adapter.
//!
//! This adapter owns transport details only: URL building, authentication
//! headers, HTTP status mapping and JSON decoding into [`CommitInfo`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use tracing::debug;

use super::dto::CommitResponseDto;
use crate::domain::ports::{CommitInfo, SourceError, SourceRepository};

/// Public GitHub REST endpoint.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

const DEFAULT_USER_AGENT: &str = "mimsy-sync/0.1";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";
const API_VERSION: &str = "2022-11-28";

/// Source repository adapter backed by the GitHub REST API.
pub struct GithubSourceRepository {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl GithubSourceRepository {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        base_url: Url,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            token: token.filter(|value| !value.is_empty()),
        })
    }

    fn request(&self, url: Url, accept: &str) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .header(USER_AGENT, DEFAULT_USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    fn endpoint(&self, repo: &str, tail: &[&str]) -> Result<Url, SourceError> {
        let (owner, name) = parse_repository(repo)?;
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| SourceError::transport("GitHub API URL cannot be a base"))?;
            segments.pop_if_empty().extend(["repos", owner, name]);
            for part in tail {
                segments.extend(part.split('/').filter(|piece| !piece.is_empty()));
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl SourceRepository for GithubSourceRepository {
    async fn last_commit(&self, repo: &str) -> Result<CommitInfo, SourceError> {
        let url = self.endpoint(repo, &["commits", "HEAD"])?;
        debug!(%url, "fetching head commit");
        let response = self
            .request(url, JSON_MEDIA_TYPE)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, "HEAD", body.as_ref()));
        }
        parse_commit(body.as_ref())
    }

    async fn file_content(
        &self,
        repo: &str,
        sha: &str,
        path: &str,
    ) -> Result<Vec<u8>, SourceError> {
        let mut url = self.endpoint(repo, &["contents", path])?;
        url.query_pairs_mut().append_pair("ref", sha);
        debug!(%url, "fetching file content");
        let response = self
            .request(url, RAW_MEDIA_TYPE)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, path, body.as_ref()));
        }
        Ok(body.to_vec())
    }
}

/// Split `owner/name`, rejecting anything else.
fn parse_repository(repository: &str) -> Result<(&str, &str), SourceError> {
    let invalid = || {
        SourceError::transport(format!(
            "invalid repository format: expected 'owner/repo', got '{repository}'"
        ))
    };
    let (owner, name) = repository.split_once('/').ok_or_else(invalid)?;
    let (owner, name) = (owner.trim(), name.trim());
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return Err(invalid());
    }
    Ok((owner, name))
}

fn parse_commit(body: &[u8]) -> Result<CommitInfo, SourceError> {
    let decoded: CommitResponseDto = serde_json::from_slice(body).map_err(|error| {
        SourceError::decode(format!("invalid GitHub commit payload: {error}"))
    })?;
    decoded.into_commit_info().map_err(SourceError::decode)
}

fn map_transport_error(error: reqwest::Error) -> SourceError {
    SourceError::transport(error.to_string())
}

fn map_status_error(status: StatusCode, path: &str, body: &[u8]) -> SourceError {
    let message = format!(
        "status {}: {}",
        status.as_u16(),
        String::from_utf8_lossy(body).chars().take(160).collect::<String>()
    );
    match status {
        StatusCode::NOT_FOUND => SourceError::not_found(path),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::unauthorized(message),
        _ => SourceError::transport(message),
    }
}
