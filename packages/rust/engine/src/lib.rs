//! Backing search engine collaborator.
//!
//! [`SearchBackend`] is the narrow surface the revision protocol needs from
//! the engine: collections, aliases, bulk import, presets, search and a
//! liveness probe. Two implementations ship with the crate:
//!
//! - [`TypesenseClient`]: HTTP client for a Typesense-compatible server
//! - [`MemoryBackend`]: in-process engine with fault injection, for tests
//!   and dry runs

mod memory;
mod typesense;

use std::time::Duration;

use async_trait::async_trait;
use reindex_shared::{CollectionSchema, Result};
use serde::{Deserialize, Serialize};

pub use memory::MemoryBackend;
pub use typesense::TypesenseClient;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A collection as listed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    #[serde(default)]
    pub num_documents: u64,
}

/// An alias and the collection it currently targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasInfo {
    pub name: String,
    pub collection_name: String,
}

/// Per-document result of a bulk import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Offending document as echoed back by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

/// Query parameters for a collection search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub found: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub document: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_match_info: Option<TextMatchInfo>,
}

/// Relevance details of a hit. The engine reports the score as a string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextMatchInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
}

// ---------------------------------------------------------------------------
// SearchBackend trait
// ---------------------------------------------------------------------------

/// Operations the revision protocol and search facade need from the engine.
///
/// Errors follow [`reindex_shared::ReindexError`]: transport failures are
/// `Network`, rejected calls are `Backend { status, .. }` (409 means the
/// resource already exists) and missing resources are `NotFound`.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Liveness probe bounded by `timeout`.
    async fn health(&self, timeout: Duration) -> Result<()>;

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;

    /// Create a collection named `schema.name`.
    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()>;

    async fn delete_collection(&self, name: &str) -> Result<()>;

    async fn list_aliases(&self) -> Result<Vec<AliasInfo>>;

    /// Create or atomically repoint `alias` at `collection`.
    async fn upsert_alias(&self, alias: &str, collection: &str) -> Result<()>;

    /// Bulk upsert. Returns one result per input document, in input order.
    /// Only a rejection of the whole call is an error.
    async fn import_documents(
        &self,
        collection: &str,
        documents: &[serde_json::Value],
    ) -> Result<Vec<ImportResult>>;

    async fn upsert_preset(&self, name: &str, value: &serde_json::Value) -> Result<()>;

    /// Search a collection or alias.
    async fn search(&self, collection: &str, params: &SearchParams) -> Result<SearchResponse>;
}
