//! In-process [`SearchBackend`] for tests and dry runs.
//!
//! State lives in `BTreeMap`s behind a `std::sync::Mutex`. Failures can be
//! injected per operation so callers can exercise error paths without a
//! server. Search is a case-insensitive substring match over the
//! `query_by` fields; `filter_by` and `sort_by` are ignored.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reindex_shared::{CollectionSchema, ReindexError, Result};

use crate::{
    AliasInfo, CollectionInfo, ImportResult, SearchBackend, SearchHit, SearchParams,
    SearchResponse, TextMatchInfo,
};

#[derive(Debug, Default)]
struct Collection {
    schema: CollectionSchema,
    documents: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default)]
struct Faults {
    unhealthy: bool,
    list_collections: bool,
    create: HashSet<String>,
    delete: HashSet<String>,
    alias: HashSet<String>,
    import: HashSet<String>,
    rejected_documents: HashSet<String>,
    preset: bool,
}

#[derive(Debug, Default)]
struct State {
    collections: BTreeMap<String, Collection>,
    aliases: BTreeMap<String, String>,
    presets: BTreeMap<String, serde_json::Value>,
    faults: Faults,
    calls: Vec<String>,
}

/// In-memory search engine.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- seeding ------------------------------------------------------------

    /// Add an empty collection.
    pub fn with_collection(self, name: &str) -> Self {
        self.state().collections.insert(
            name.to_string(),
            Collection {
                schema: CollectionSchema::default().named(name),
                documents: BTreeMap::new(),
            },
        );
        self
    }

    /// Point `alias` at `collection` (the collection need not exist).
    pub fn with_alias(self, alias: &str, collection: &str) -> Self {
        self.state()
            .aliases
            .insert(alias.to_string(), collection.to_string());
        self
    }

    // -- fault injection ----------------------------------------------------

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.state().faults.unhealthy = unhealthy;
    }

    pub fn fail_list_collections(&self) {
        self.state().faults.list_collections = true;
    }

    pub fn fail_create(&self, collection: &str) {
        self.state().faults.create.insert(collection.to_string());
    }

    pub fn fail_delete(&self, collection: &str) {
        self.state().faults.delete.insert(collection.to_string());
    }

    pub fn fail_alias(&self, alias: &str) {
        self.state().faults.alias.insert(alias.to_string());
    }

    /// Reject whole import calls into `collection`.
    pub fn fail_import(&self, collection: &str) {
        self.state().faults.import.insert(collection.to_string());
    }

    /// Report a per-document failure for documents with this id.
    pub fn reject_document(&self, id: &str) {
        self.state().faults.rejected_documents.insert(id.to_string());
    }

    pub fn fail_preset(&self) {
        self.state().faults.preset = true;
    }

    // -- inspection ---------------------------------------------------------

    pub fn collection_names(&self) -> Vec<String> {
        self.state().collections.keys().cloned().collect()
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.state().collections.contains_key(name)
    }

    pub fn alias_target(&self, alias: &str) -> Option<String> {
        self.state().aliases.get(alias).cloned()
    }

    /// Documents stored in `collection`, ordered by id.
    pub fn documents(&self, collection: &str) -> Vec<serde_json::Value> {
        self.state()
            .collections
            .get(collection)
            .map(|c| c.documents.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn schema(&self, collection: &str) -> Option<CollectionSchema> {
        self.state()
            .collections
            .get(collection)
            .map(|c| c.schema.clone())
    }

    pub fn preset(&self, name: &str) -> Option<serde_json::Value> {
        self.state().presets.get(name).cloned()
    }

    /// Mutating calls in the order they were made, e.g. `alias docs -> docs-...`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }
}

fn backend_error(message: impl Into<String>) -> ReindexError {
    ReindexError::Backend {
        status: 500,
        message: message.into(),
    }
}

/// Resolve an alias to its collection, or treat the name as a collection.
fn resolve<'a>(state: &'a State, name: &'a str) -> &'a str {
    state.aliases.get(name).map(String::as_str).unwrap_or(name)
}

fn matches_query(doc: &serde_json::Value, q: &str, fields: &[&str]) -> bool {
    if q == "*" || q.is_empty() {
        return true;
    }
    let needle = q.to_lowercase();
    fields.iter().any(|field| {
        doc.get(*field)
            .and_then(|v| v.as_str())
            .is_some_and(|v| v.to_lowercase().contains(&needle))
    })
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn health(&self, _timeout: Duration) -> Result<()> {
        if self.state().faults.unhealthy {
            return Err(ReindexError::Network(
                "health check failed: engine unavailable".into(),
            ));
        }
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let state = self.state();
        if state.faults.list_collections {
            return Err(backend_error("listing collections failed"));
        }
        Ok(state
            .collections
            .iter()
            .map(|(name, c)| CollectionInfo {
                name: name.clone(),
                num_documents: c.documents.len() as u64,
            })
            .collect())
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let mut state = self.state();
        if state.faults.create.contains(&schema.name) {
            return Err(backend_error(format!("creating {} failed", schema.name)));
        }
        if state.collections.contains_key(&schema.name) {
            return Err(ReindexError::Backend {
                status: 409,
                message: format!("A collection with name `{}` already exists.", schema.name),
            });
        }
        state.calls.push(format!("create {}", schema.name));
        state.collections.insert(
            schema.name.clone(),
            Collection {
                schema: schema.clone(),
                documents: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        if state.faults.delete.contains(name) {
            return Err(backend_error(format!("deleting {name} failed")));
        }
        if state.collections.remove(name).is_none() {
            return Err(ReindexError::NotFound(format!("collection {name}")));
        }
        state.calls.push(format!("delete {name}"));
        Ok(())
    }

    async fn list_aliases(&self) -> Result<Vec<AliasInfo>> {
        Ok(self
            .state()
            .aliases
            .iter()
            .map(|(name, collection)| AliasInfo {
                name: name.clone(),
                collection_name: collection.clone(),
            })
            .collect())
    }

    async fn upsert_alias(&self, alias: &str, collection: &str) -> Result<()> {
        let mut state = self.state();
        if state.faults.alias.contains(alias) {
            return Err(backend_error(format!("updating alias {alias} failed")));
        }
        state.calls.push(format!("alias {alias} -> {collection}"));
        state
            .aliases
            .insert(alias.to_string(), collection.to_string());
        Ok(())
    }

    async fn import_documents(
        &self,
        collection: &str,
        documents: &[serde_json::Value],
    ) -> Result<Vec<ImportResult>> {
        let mut state = self.state();
        if state.faults.import.contains(collection) {
            return Err(backend_error(format!("import into {collection} failed")));
        }
        let rejected = state.faults.rejected_documents.clone();
        state
            .calls
            .push(format!("import {collection} ({})", documents.len()));
        let target = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| ReindexError::NotFound(format!("collection {collection}")))?;

        let results = documents
            .iter()
            .map(|doc| {
                let Some(id) = doc.get("id").and_then(|v| v.as_str()) else {
                    return ImportResult {
                        success: false,
                        error: Some("document has no string `id`".into()),
                        document: Some(doc.to_string()),
                    };
                };
                if rejected.contains(id) {
                    return ImportResult {
                        success: false,
                        error: Some(format!("document {id} rejected")),
                        document: Some(doc.to_string()),
                    };
                }
                target.documents.insert(id.to_string(), doc.clone());
                ImportResult {
                    success: true,
                    error: None,
                    document: None,
                }
            })
            .collect();
        Ok(results)
    }

    async fn upsert_preset(&self, name: &str, value: &serde_json::Value) -> Result<()> {
        let mut state = self.state();
        if state.faults.preset {
            return Err(backend_error(format!("upserting preset {name} failed")));
        }
        state.calls.push(format!("preset {name}"));
        state.presets.insert(name.to_string(), value.clone());
        Ok(())
    }

    async fn search(&self, collection: &str, params: &SearchParams) -> Result<SearchResponse> {
        let state = self.state();
        let name = resolve(&state, collection);
        let target = state
            .collections
            .get(name)
            .ok_or_else(|| ReindexError::NotFound(format!("collection {collection}")))?;

        let query_by = params.query_by.as_deref().unwrap_or("");
        let fields: Vec<&str> = query_by.split(',').map(str::trim).collect();
        let matched: Vec<&serde_json::Value> = target
            .documents
            .values()
            .filter(|doc| matches_query(doc, &params.q, &fields))
            .collect();

        let page = params.page.unwrap_or(1).max(1);
        let per_page = params.per_page.unwrap_or(10) as usize;
        let skip = (page as usize - 1) * per_page;

        let hits = matched
            .iter()
            .skip(skip)
            .take(per_page)
            .map(|doc| SearchHit {
                document: doc.as_object().cloned().unwrap_or_default(),
                text_match_info: Some(TextMatchInfo {
                    score: Some("1".into()),
                }),
            })
            .collect();

        Ok(SearchResponse {
            found: matched.len() as u64,
            page,
            hits,
        })
    }
}
