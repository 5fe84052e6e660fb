//! Scripted content repository and recording collection registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::ports::{
    CollectionRecord, CollectionRegistry, CollectionRegistryError, CommitInfo, SourceError,
    SourceRepository,
};

#[derive(Default)]
struct SourceState {
    head: Option<CommitInfo>,
    files: HashMap<(String, String), Vec<u8>>,
    head_failure: Option<SourceError>,
    head_requests: usize,
    file_requests: Vec<String>,
}

/// Source repository serving one head commit and a fixed file map.
#[derive(Clone, Default)]
pub struct StaticSourceRepository {
    state: Arc<Mutex<SourceState>>,
}

impl StaticSourceRepository {
    /// Empty repository with no head commit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the head at `commit`.
    pub fn set_head(&self, commit: CommitInfo) {
        self.lock().head = Some(commit);
    }

    /// Serve `contents` for `path` at commit `sha`.
    pub fn put_file(&self, sha: &str, path: &str, contents: impl Into<Vec<u8>>) {
        self.lock()
            .files
            .insert((sha.to_owned(), path.to_owned()), contents.into());
    }

    /// Fail head lookups with `error`.
    pub fn fail_head(&self, error: SourceError) {
        self.lock().head_failure = Some(error);
    }

    /// Number of head lookups served.
    pub fn head_requests(&self) -> usize {
        self.lock().head_requests
    }

    /// Paths requested so far, in order.
    pub fn file_requests(&self) -> Vec<String> {
        self.lock().file_requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SourceState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("source mutex"),
        }
    }
}

#[async_trait]
impl SourceRepository for StaticSourceRepository {
    async fn last_commit(&self, _repo: &str) -> Result<CommitInfo, SourceError> {
        let mut state = self.lock();
        state.head_requests += 1;
        if let Some(error) = state.head_failure.clone() {
            return Err(error);
        }
        state
            .head
            .clone()
            .ok_or_else(|| SourceError::transport("repository has no commits"))
    }

    async fn file_content(
        &self,
        _repo: &str,
        sha: &str,
        path: &str,
    ) -> Result<Vec<u8>, SourceError> {
        let mut state = self.lock();
        state.file_requests.push(path.to_owned());
        state
            .files
            .get(&(sha.to_owned(), path.to_owned()))
            .cloned()
            .ok_or_else(|| SourceError::not_found(path))
    }
}

/// Collection registry that records every upserted batch.
#[derive(Clone, Default)]
pub struct RecordingCollectionRegistry {
    batches: Arc<Mutex<Vec<Vec<CollectionRecord>>>>,
}

impl RecordingCollectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches received so far.
    pub fn batches(&self) -> Vec<Vec<CollectionRecord>> {
        match self.batches.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => panic!("registry mutex"),
        }
    }
}

#[async_trait]
impl CollectionRegistry for RecordingCollectionRegistry {
    async fn upsert_collections(
        &self,
        records: &[CollectionRecord],
    ) -> Result<(), CollectionRegistryError> {
        match self.batches.lock() {
            Ok(mut guard) => guard.push(records.to_vec()),
            Err(_) => panic!("registry mutex"),
        }
        Ok(())
    }
}
