//! Port for the collection registry read by the content API.
//!
//! After a schema is applied, each collection is recorded with its field
//! definitions so the rest of the CMS can discover it without reparsing the
//! schema document.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised by collection registry adapters.
    pub enum CollectionRegistryError {
        /// Repository connection could not be established.
        Connection { message: String } => "collection registry connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "collection registry query failed: {message}",
    }
}

/// One registry entry derived from a schema collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRecord {
    /// Registry key; equal to the collection name.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Field map serialised as JSON.
    pub fields: serde_json::Value,
    /// Whether the collection is a singleton.
    pub is_global: bool,
}

/// Port for upserting collection registry entries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CollectionRegistry: Send + Sync {
    /// Insert or update each record keyed by slug.
    async fn upsert_collections(
        &self,
        records: &[CollectionRecord],
    ) -> Result<(), CollectionRegistryError>;
}
