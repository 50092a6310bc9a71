//! In-memory [`ContentSource`] for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reindex_shared::{ReindexError, Result};

use crate::{ContentSource, RepoNode};

/// Content source backed by fixed trees and URI tables.
#[derive(Debug, Default)]
pub struct StaticContentSource {
    trees: HashMap<String, RepoNode>,
    uris: HashMap<String, HashMap<String, String>>,
    failing_uris: Vec<String>,
    uri_calls: AtomicUsize,
}

impl StaticContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(mut self, dimension: &str, root: RepoNode) -> Self {
        self.trees.insert(dimension.to_string(), root);
        self
    }

    pub fn with_uri(mut self, dimension: &str, id: &str, uri: &str) -> Self {
        self.uris
            .entry(dimension.to_string())
            .or_default()
            .insert(id.to_string(), uri.to_string());
        self
    }

    /// Make URI resolution fail for `dimension`.
    pub fn with_failing_uris(mut self, dimension: &str) -> Self {
        self.failing_uris.push(dimension.to_string());
        self
    }

    /// Number of `get_uris` calls served so far.
    pub fn uri_calls(&self) -> usize {
        self.uri_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for StaticContentSource {
    async fn get_tree(&self, dimension: &str) -> Result<Option<RepoNode>> {
        Ok(self.trees.get(dimension).cloned())
    }

    async fn get_uris(&self, dimension: &str, ids: &[String]) -> Result<HashMap<String, String>> {
        self.uri_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_uris.iter().any(|d| d == dimension) {
            return Err(ReindexError::Network(format!(
                "resolving uris for {dimension} failed"
            )));
        }
        let table = self.uris.get(dimension);
        Ok(ids
            .iter()
            .filter_map(|id| {
                table
                    .and_then(|t| t.get(id))
                    .map(|uri| (id.clone(), uri.clone()))
            })
            .collect())
    }
}
