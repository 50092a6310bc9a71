//! Content source collaborator, tree extraction and document assembly.
//!
//! The content source serves one hierarchical tree per dimension (an
//! [`IndexId`] names the dimension). Indexing an index is two steps:
//!
//! 1. [`extract_descriptors`] flattens the tree and keeps the nodes that
//!    should be searchable.
//! 2. A [`DocumentProvider`] (normally [`ContentServerProvider`]) resolves
//!    URIs and asks the [`TypeProvider`] registered for each document type
//!    to build the document.

mod assemble;
mod client;
mod extract;
#[cfg(any(test, feature = "test-util"))]
mod fixture;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use reindex_shared::{IndexId, Result};
use serde::{Deserialize, Serialize};

pub use assemble::{
    BasicDocument, BasicDocumentBuilder, ContentServerProvider, Provided, TypeProvider,
    TypeProviderRegistry,
};
pub use client::ContentServerClient;
pub use extract::{ExtractOptions, extract_descriptors, flatten, is_indexable};
#[cfg(any(test, feature = "test-util"))]
pub use fixture::StaticContentSource;

// ---------------------------------------------------------------------------
// RepoNode
// ---------------------------------------------------------------------------

/// One node of a content tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoNode {
    pub id: String,
    #[serde(default)]
    pub mime_type: String,
    /// Hidden from navigation. Not the same as excluded from search.
    #[serde(default)]
    pub hidden: bool,
    /// Free-form metadata bag.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    /// Children keyed by id.
    #[serde(default)]
    pub nodes: BTreeMap<String, RepoNode>,
}

impl RepoNode {
    pub fn new(id: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mime_type: mime_type.into(),
            ..Self::default()
        }
    }

    /// Add a child, keyed by its id.
    pub fn with_child(mut self, child: RepoNode) -> Self {
        self.nodes.insert(child.id.clone(), child);
        self
    }

    pub fn with_data(mut self, key: &str, value: serde_json::Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Remote source of content trees.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Tree root for `dimension`, or `None` if the dimension does not exist.
    async fn get_tree(&self, dimension: &str) -> Result<Option<RepoNode>>;

    /// Resolve document ids to URIs within `dimension`. Unknown ids are omitted.
    async fn get_uris(&self, dimension: &str, ids: &[String]) -> Result<HashMap<String, String>>;
}

/// Produces the documents of one index.
#[async_trait]
pub trait DocumentProvider<D>: Send + Sync {
    /// All documents of `index_id`, one slot per selected descriptor.
    async fn provide(&self, index_id: &IndexId) -> Result<Provided<D>>;

    /// Page-wise provision starting at `offset`; returns the next offset.
    async fn provide_paged(&self, index_id: &IndexId, offset: usize)
    -> Result<(Provided<D>, usize)>;
}
