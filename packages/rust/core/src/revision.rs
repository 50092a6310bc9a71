//! Revision lifecycle: create a fresh generation of every index, fill it,
//! then swap aliases to it (commit) or delete it (revert).
//!
//! Consumers only ever query aliases. An alias is repointed in place by
//! [`RevisionManager::commit_revision`] and is never deleted, so a
//! committed index always has exactly one live generation. Only one build
//! may drive a given set of indices at a time; nothing here enforces that.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reindex_engine::SearchBackend;
use reindex_shared::{AppConfig, IndexConfig, IndexId, PresetConfig, ReindexError, Result, RevisionId};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::naming::{extract_revision_id, format_generation_name};

// ---------------------------------------------------------------------------
// Outcomes and state
// ---------------------------------------------------------------------------

/// Counts from one bulk upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Result of pruning old generations of one index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Previous generation kept as rollback target, if any.
    pub kept: Option<String>,
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Where the current attempt is in its lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RevisionState {
    #[default]
    Uninitialized,
    Initialized(RevisionId),
    Committed(RevisionId),
    Reverted(RevisionId),
}

impl std::fmt::Display for RevisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Initialized(rev) => write!(f, "initialized({rev})"),
            Self::Committed(rev) => write!(f, "committed({rev})"),
            Self::Reverted(rev) => write!(f, "reverted({rev})"),
        }
    }
}

// ---------------------------------------------------------------------------
// RevisionApi
// ---------------------------------------------------------------------------

/// Revision protocol driven by the build orchestrator.
#[async_trait]
pub trait RevisionApi<D>: Send + Sync {
    /// Probe the engine, mint a revision and create its generations.
    async fn initialize(&self) -> Result<RevisionId>;

    /// Configured indices, in configuration order.
    fn indices(&self) -> Result<Vec<IndexId>>;

    /// Bulk upsert into the generation of `index_id` for `revision`.
    async fn upsert_documents(
        &self,
        revision: &RevisionId,
        index_id: &IndexId,
        documents: Vec<D>,
    ) -> Result<ImportOutcome>;

    /// Point every alias at `revision` and prune old generations.
    async fn commit_revision(&self, revision: &RevisionId) -> Result<()>;

    /// Delete every generation of `revision`.
    async fn revert_revision(&self, revision: &RevisionId) -> Result<()>;

    /// Engine liveness.
    async fn healthz(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// RevisionManager
// ---------------------------------------------------------------------------

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// [`RevisionApi`] over a [`SearchBackend`].
pub struct RevisionManager<B> {
    backend: Arc<B>,
    indices: Vec<IndexConfig>,
    preset: Option<PresetConfig>,
    health_timeout: Duration,
    clock: Clock,
    state: Mutex<RevisionState>,
}

impl<B: SearchBackend> RevisionManager<B> {
    pub fn new(
        backend: Arc<B>,
        indices: Vec<IndexConfig>,
        preset: Option<PresetConfig>,
        health_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            indices,
            preset,
            health_timeout,
            clock: Box::new(Utc::now),
            state: Mutex::new(RevisionState::Uninitialized),
        }
    }

    pub fn from_config(backend: Arc<B>, config: &AppConfig) -> Self {
        Self::new(
            backend,
            config.indices.clone(),
            config.preset.clone(),
            config.engine.health_timeout(),
        )
    }

    /// Replace the wall clock used to mint revision ids.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> RevisionState {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, RevisionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: RevisionState) {
        *self.lock_state() = state;
    }

    fn ensure_initialized(&self, revision: &RevisionId) -> Result<()> {
        let state = self.lock_state();
        match &*state {
            RevisionState::Initialized(current) if current == revision => Ok(()),
            other => Err(ReindexError::validation(format!(
                "revision {revision} is not the initialized revision (state: {other})"
            ))),
        }
    }

    pub async fn healthz(&self) -> Result<()> {
        self.backend.health(self.health_timeout).await
    }

    pub fn indices(&self) -> Result<Vec<IndexId>> {
        if self.indices.is_empty() {
            return Err(ReindexError::config("no indices configured"));
        }
        Ok(self.indices.iter().map(|i| i.id.clone()).collect())
    }

    #[instrument(skip_all)]
    pub async fn initialize(&self) -> Result<RevisionId> {
        info!("initializing revision");

        self.healthz().await.inspect_err(|e| {
            error!(error = %e, "engine health check failed");
        })?;

        let aliases = self.backend.list_aliases().await?;
        let existing: HashSet<String> = self
            .backend
            .list_collections()
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();

        for alias in &aliases {
            let live = IndexId::parse(alias.name.as_str())
                .ok()
                .and_then(|index| extract_revision_id(&alias.collection_name, &index));
            match live {
                Some(rev) if existing.contains(&alias.collection_name) => {
                    debug!(alias = %alias.name, revision = %rev, "alias is live");
                }
                _ => {
                    warn!(
                        alias = %alias.name,
                        collection = %alias.collection_name,
                        "alias points to a missing collection; next commit will repoint it"
                    );
                }
            }
        }

        if let RevisionState::Initialized(previous) = self.state() {
            warn!(%previous, "previous revision was neither committed nor reverted");
        }

        let revision = RevisionId::from_datetime((self.clock)());
        info!(%revision, "generated new revision");

        for index in &self.indices {
            let name = format_generation_name(&index.id, &revision);
            if existing.contains(&name) {
                info!(collection = %name, "collection already exists, reusing");
                continue;
            }
            match self.backend.create_collection(&index.schema.named(name.as_str())).await {
                Ok(()) => info!(index = %index.id, collection = %name, "created collection"),
                Err(e) if e.is_conflict() => {
                    info!(collection = %name, "collection already exists, reusing");
                }
                Err(e) => {
                    error!(collection = %name, error = %e, "failed to create collection");
                    return Err(e);
                }
            }
        }

        if let Some(preset) = &self.preset {
            self.backend
                .upsert_preset(&preset.name, &preset.value)
                .await
                .inspect_err(|e| error!(preset = %preset.name, error = %e, "failed to upsert preset"))?;
            debug!(preset = %preset.name, "preset ensured");
        }

        self.set_state(RevisionState::Initialized(revision.clone()));
        info!(%revision, "initialization completed");
        Ok(revision)
    }

    #[instrument(skip_all, fields(revision = %revision, index = %index_id, documents = documents.len()))]
    pub async fn upsert_documents<D: Serialize>(
        &self,
        revision: &RevisionId,
        index_id: &IndexId,
        documents: &[D],
    ) -> Result<ImportOutcome> {
        if documents.is_empty() {
            warn!("no documents provided for upsert");
            return Ok(ImportOutcome::default());
        }

        let collection = format_generation_name(index_id, revision);
        let mut outcome = ImportOutcome {
            attempted: documents.len(),
            ..ImportOutcome::default()
        };

        let mut payload = Vec::with_capacity(documents.len());
        for document in documents {
            match serde_json::to_value(document) {
                Ok(value) => payload.push(value),
                Err(e) => {
                    warn!(%collection, error = %e, "document could not be serialized");
                    outcome.failed += 1;
                }
            }
        }

        if payload.is_empty() {
            warn!(%collection, failed = outcome.failed, "no serializable documents to upsert");
            return Ok(outcome);
        }

        let results = self
            .backend
            .import_documents(&collection, &payload)
            .await
            .inspect_err(|e| error!(%collection, error = %e, "bulk upsert failed"))?;

        for result in &results {
            if result.success {
                outcome.succeeded += 1;
            } else {
                outcome.failed += 1;
                warn!(
                    %collection,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "document failed to upsert"
                );
            }
        }
        if results.len() != payload.len() {
            warn!(
                %collection,
                sent = payload.len(),
                results = results.len(),
                "engine returned a different number of import results"
            );
            outcome.failed = outcome.attempted - outcome.succeeded.min(outcome.attempted);
        }

        info!(
            %collection,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            "bulk upsert completed"
        );
        Ok(outcome)
    }

    #[instrument(skip_all, fields(revision = %revision))]
    pub async fn commit_revision(&self, revision: &RevisionId) -> Result<()> {
        self.ensure_initialized(revision)?;

        for index in &self.indices {
            let collection = format_generation_name(&index.id, revision);

            self.backend
                .upsert_alias(index.id.as_str(), &collection)
                .await
                .inspect_err(|e| error!(alias = %index.id, error = %e, "failed to update alias"))?;
            info!(alias = %index.id, %collection, "updated alias");

            match self.prune(&index.id, &collection).await {
                Ok(pruned) => debug!(
                    alias = %index.id,
                    kept = pruned.kept.as_deref().unwrap_or("-"),
                    deleted = pruned.deleted.len(),
                    failed = pruned.failed.len(),
                    "pruned old collections"
                ),
                Err(e) => error!(alias = %index.id, error = %e, "failed to clean up old collections"),
            }
        }

        self.set_state(RevisionState::Committed(revision.clone()));
        info!("revision committed");
        Ok(())
    }

    #[instrument(skip_all, fields(revision = %revision))]
    pub async fn revert_revision(&self, revision: &RevisionId) -> Result<()> {
        self.ensure_initialized(revision)?;
        self.delete_generations(revision).await?;
        self.set_state(RevisionState::Reverted(revision.clone()));
        info!("revision reverted");
        Ok(())
    }

    /// Delete the generations of a revision left behind by an earlier run.
    ///
    /// Unlike [`Self::revert_revision`] this does not require the revision to
    /// be the initialized one, but it refuses to touch a generation that an
    /// alias still serves. Missing generations are skipped.
    #[instrument(skip_all, fields(revision = %revision))]
    pub async fn discard_revision(&self, revision: &RevisionId) -> Result<Vec<String>> {
        let aliased = self.aliased_collections().await?;
        let existing: HashSet<String> = self
            .backend
            .list_collections()
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();

        let mut deleted = Vec::new();
        for index in &self.indices {
            let collection = format_generation_name(&index.id, revision);
            if aliased.contains(&collection) {
                return Err(ReindexError::validation(format!(
                    "{collection} is live behind alias {}; refusing to delete it",
                    index.id
                )));
            }
            if !existing.contains(&collection) {
                debug!(%collection, "generation not present, skipping");
                continue;
            }
            self.backend.delete_collection(&collection).await?;
            info!(%collection, "deleted collection");
            deleted.push(collection);
        }
        Ok(deleted)
    }

    /// Generations of `revision` that an alias currently serves.
    pub async fn live_generations(&self, revision: &RevisionId) -> Result<Vec<String>> {
        let aliased = self.aliased_collections().await?;
        Ok(self
            .indices
            .iter()
            .map(|index| format_generation_name(&index.id, revision))
            .filter(|collection| aliased.contains(collection))
            .collect())
    }

    async fn aliased_collections(&self) -> Result<HashSet<String>> {
        Ok(self
            .backend
            .list_aliases()
            .await?
            .into_iter()
            .map(|a| a.collection_name)
            .collect())
    }

    async fn delete_generations(&self, revision: &RevisionId) -> Result<()> {
        // A same-minute rebuild shares its generation with the last commit.
        match self.live_generations(revision).await {
            Ok(live) => {
                for collection in &live {
                    warn!(%collection, "reverting a generation that an alias still serves");
                }
            }
            Err(e) => debug!(error = %e, "could not list aliases before revert"),
        }

        for index in &self.indices {
            let collection = format_generation_name(&index.id, revision);
            self.backend
                .delete_collection(&collection)
                .await
                .inspect_err(|e| error!(%collection, error = %e, "failed to delete collection"))?;
            info!(%collection, "reverted and deleted collection");
        }
        Ok(())
    }

    /// Keep `current` plus the newest older generation of `index_id`;
    /// delete the rest. Names that do not parse as a generation of this
    /// index are left alone. Individual deletion failures are logged.
    pub async fn prune(&self, index_id: &IndexId, current: &str) -> Result<PruneOutcome> {
        let collections = self.backend.list_collections().await?;

        let mut older: Vec<(RevisionId, String)> = collections
            .into_iter()
            .filter(|c| c.name != current)
            .filter_map(|c| extract_revision_id(&c.name, index_id).map(|rev| (rev, c.name)))
            .collect();
        older.sort_by(|a, b| b.0.cmp(&a.0));

        let mut outcome = PruneOutcome::default();
        let mut older = older.into_iter().map(|(_, name)| name);
        outcome.kept = older.next();

        for name in older {
            match self.backend.delete_collection(&name).await {
                Ok(()) => {
                    info!(collection = %name, "deleted old collection");
                    outcome.deleted.push(name);
                }
                Err(e) => {
                    error!(collection = %name, error = %e, "failed to delete collection");
                    outcome.failed.push(name);
                }
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl<B, D> RevisionApi<D> for RevisionManager<B>
where
    B: SearchBackend + 'static,
    D: Serialize + Send + Sync + 'static,
{
    async fn initialize(&self) -> Result<RevisionId> {
        RevisionManager::initialize(self).await
    }

    fn indices(&self) -> Result<Vec<IndexId>> {
        RevisionManager::indices(self)
    }

    async fn upsert_documents(
        &self,
        revision: &RevisionId,
        index_id: &IndexId,
        documents: Vec<D>,
    ) -> Result<ImportOutcome> {
        RevisionManager::upsert_documents(self, revision, index_id, documents.as_slice()).await
    }

    async fn commit_revision(&self, revision: &RevisionId) -> Result<()> {
        RevisionManager::commit_revision(self, revision).await
    }

    async fn revert_revision(&self, revision: &RevisionId) -> Result<()> {
        RevisionManager::revert_revision(self, revision).await
    }

    async fn healthz(&self) -> Result<()> {
        RevisionManager::healthz(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reindex_engine::MemoryBackend;
    use reindex_shared::{CollectionSchema, FieldSchema};
    use serde_json::json;

    fn index(id: &str) -> IndexConfig {
        IndexConfig {
            id: IndexId::parse(id).unwrap(),
            schema: CollectionSchema {
                fields: vec![FieldSchema {
                    name: "title".into(),
                    field_type: "string".into(),
                    facet: None,
                    optional: None,
                    index: None,
                    sort: None,
                }],
                ..CollectionSchema::default()
            },
        }
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, minute, 0).unwrap()
    }

    fn manager(backend: Arc<MemoryBackend>, ids: &[&str]) -> RevisionManager<MemoryBackend> {
        RevisionManager::new(
            backend,
            ids.iter().map(|id| index(id)).collect(),
            None,
            Duration::from_secs(1),
        )
        .with_clock(|| at(1, 12, 30))
    }

    fn rev(s: &str) -> RevisionId {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn initialize_creates_generations_without_touching_aliases() {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_collection("a-2024-04-30-08-00")
                .with_alias("a", "a-2024-04-30-08-00"),
        );
        let mgr = manager(backend.clone(), &["a", "b"]);

        let revision = mgr.initialize().await.unwrap();

        assert_eq!(revision, rev("2024-05-01-12-30"));
        assert!(backend.has_collection("a-2024-05-01-12-30"));
        assert!(backend.has_collection("b-2024-05-01-12-30"));
        assert_eq!(
            backend.schema("a-2024-05-01-12-30").unwrap().fields[0].name,
            "title"
        );
        assert_eq!(backend.alias_target("a").as_deref(), Some("a-2024-04-30-08-00"));
        assert_eq!(backend.alias_target("b"), None);
        assert_eq!(mgr.state(), RevisionState::Initialized(revision));
    }

    #[tokio::test]
    async fn initialize_reuses_existing_generation() {
        let backend = Arc::new(MemoryBackend::new().with_collection("a-2024-05-01-12-30"));
        let mgr = manager(backend.clone(), &["a"]);

        mgr.initialize().await.unwrap();
        assert!(!backend.calls().iter().any(|c| c.starts_with("create")));
    }

    #[tokio::test]
    async fn initialize_tolerates_dangling_alias() {
        let backend = Arc::new(MemoryBackend::new().with_alias("a", "a-2024-01-01-00-00"));
        let mgr = manager(backend.clone(), &["a"]);

        mgr.initialize().await.unwrap();
        assert!(backend.has_collection("a-2024-05-01-12-30"));
    }

    #[tokio::test]
    async fn initialize_fails_when_engine_unhealthy() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_unhealthy(true);
        let mgr = manager(backend.clone(), &["a"]);

        let err = mgr.initialize().await.unwrap_err();
        assert!(matches!(err, ReindexError::Network(_)));
        assert!(backend.collection_names().is_empty());
        assert_eq!(mgr.state(), RevisionState::Uninitialized);
    }

    #[tokio::test]
    async fn initialize_fails_when_create_fails() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_create("b-2024-05-01-12-30");
        let mgr = manager(backend.clone(), &["a", "b"]);

        assert!(mgr.initialize().await.is_err());
        assert_eq!(mgr.state(), RevisionState::Uninitialized);
    }

    #[tokio::test]
    async fn initialize_upserts_preset() {
        let backend = Arc::new(MemoryBackend::new());
        let preset = PresetConfig {
            name: "listing".into(),
            value: json!({"value": {"q": "*"}}),
        };
        let mgr = RevisionManager::new(backend.clone(), vec![index("a")], Some(preset), Duration::from_secs(1));

        mgr.initialize().await.unwrap();
        assert_eq!(backend.preset("listing"), Some(json!({"value": {"q": "*"}})));
    }

    #[tokio::test]
    async fn initialize_fails_when_preset_fails() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_preset();
        let preset = PresetConfig {
            name: "default".into(),
            value: json!({}),
        };
        let mgr = RevisionManager::new(backend, vec![index("a")], Some(preset), Duration::from_secs(1));

        assert!(mgr.initialize().await.is_err());
    }

    #[test]
    fn indices_keep_configuration_order() {
        let mgr = manager(Arc::new(MemoryBackend::new()), &["zeta", "alpha"]);
        let ids: Vec<String> = mgr.indices().unwrap().iter().map(|i| i.to_string()).collect();
        assert_eq!(ids, ["zeta", "alpha"]);

        let empty = manager(Arc::new(MemoryBackend::new()), &[]);
        assert!(matches!(empty.indices(), Err(ReindexError::Config { .. })));
    }

    #[tokio::test]
    async fn upsert_counts_partial_failures() {
        let backend = Arc::new(MemoryBackend::new());
        backend.reject_document("2");
        let mgr = manager(backend.clone(), &["a"]);
        let revision = mgr.initialize().await.unwrap();

        let docs = vec![json!({"id": "1"}), json!({"id": "2"}), json!({"id": "3"})];
        let outcome = mgr
            .upsert_documents(&revision, &IndexId::parse("a").unwrap(), &docs)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ImportOutcome {
                attempted: 3,
                succeeded: 2,
                failed: 1
            }
        );
        assert_eq!(backend.documents("a-2024-05-01-12-30").len(), 2);
    }

    #[tokio::test]
    async fn upsert_empty_is_a_no_op() {
        let backend = Arc::new(MemoryBackend::new());
        let mgr = manager(backend.clone(), &["a"]);
        let revision = mgr.initialize().await.unwrap();

        let outcome = mgr
            .upsert_documents::<serde_json::Value>(&revision, &IndexId::parse("a").unwrap(), &[])
            .await
            .unwrap();
        assert_eq!(outcome, ImportOutcome::default());
        assert!(!backend.calls().iter().any(|c| c.starts_with("import")));
    }

    #[tokio::test]
    async fn upsert_whole_call_failure_is_an_error() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_import("a-2024-05-01-12-30");
        let mgr = manager(backend, &["a"]);
        let revision = mgr.initialize().await.unwrap();

        let result = mgr
            .upsert_documents(&revision, &IndexId::parse("a").unwrap(), &[json!({"id": "1"})])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn commit_swaps_aliases_and_prunes_to_two_generations() {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_collection("a-2024-04-28-00-00")
                .with_collection("a-2024-04-29-00-00")
                .with_collection("a-2024-04-30-00-00")
                .with_collection("a-archive")
                .with_collection("ab-2024-04-01-00-00")
                .with_alias("a", "a-2024-04-30-00-00"),
        );
        let mgr = manager(backend.clone(), &["a"]);
        let revision = mgr.initialize().await.unwrap();

        mgr.commit_revision(&revision).await.unwrap();

        assert_eq!(backend.alias_target("a").as_deref(), Some("a-2024-05-01-12-30"));
        assert_eq!(
            backend.collection_names(),
            [
                "a-2024-04-30-00-00",
                "a-2024-05-01-12-30",
                "a-archive",
                "ab-2024-04-01-00-00"
            ]
        );
        assert_eq!(mgr.state(), RevisionState::Committed(revision));
    }

    #[tokio::test]
    async fn prune_failures_do_not_fail_commit() {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_collection("a-2024-04-29-00-00")
                .with_collection("a-2024-04-30-00-00"),
        );
        backend.fail_delete("a-2024-04-29-00-00");
        let mgr = manager(backend.clone(), &["a"]);
        let revision = mgr.initialize().await.unwrap();

        mgr.commit_revision(&revision).await.unwrap();
        assert!(backend.has_collection("a-2024-04-29-00-00"));

        let outcome = mgr
            .prune(&IndexId::parse("a").unwrap(), "a-2024-05-01-12-30")
            .await
            .unwrap();
        assert_eq!(outcome.kept.as_deref(), Some("a-2024-04-30-00-00"));
        assert_eq!(outcome.failed, ["a-2024-04-29-00-00"]);
    }

    #[tokio::test]
    async fn alias_failure_aborts_commit() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_alias("b");
        let mgr = manager(backend.clone(), &["a", "b", "c"]);
        let revision = mgr.initialize().await.unwrap();

        assert!(mgr.commit_revision(&revision).await.is_err());
        // partial commit: a swapped, c untouched
        assert_eq!(backend.alias_target("a").as_deref(), Some("a-2024-05-01-12-30"));
        assert_eq!(backend.alias_target("c"), None);
        assert_eq!(mgr.state(), RevisionState::Initialized(revision));
    }

    #[tokio::test]
    async fn revert_deletes_generations_and_keeps_aliases() {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_collection("a-2024-04-30-00-00")
                .with_alias("a", "a-2024-04-30-00-00"),
        );
        let mgr = manager(backend.clone(), &["a", "b"]);
        let revision = mgr.initialize().await.unwrap();

        mgr.revert_revision(&revision).await.unwrap();

        assert_eq!(backend.collection_names(), ["a-2024-04-30-00-00"]);
        assert_eq!(backend.alias_target("a").as_deref(), Some("a-2024-04-30-00-00"));
        assert_eq!(mgr.state(), RevisionState::Reverted(revision));
    }

    #[tokio::test]
    async fn revert_failure_is_an_error() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_delete("a-2024-05-01-12-30");
        let mgr = manager(backend, &["a"]);
        let revision = mgr.initialize().await.unwrap();

        assert!(mgr.revert_revision(&revision).await.is_err());
    }

    #[tokio::test]
    async fn commit_and_revert_require_the_initialized_revision() {
        let backend = Arc::new(MemoryBackend::new());
        let mgr = manager(backend, &["a"]);

        let stray = rev("2020-01-01-00-00");
        assert!(mgr.commit_revision(&stray).await.is_err());
        assert!(mgr.revert_revision(&stray).await.is_err());

        let revision = mgr.initialize().await.unwrap();
        assert!(mgr.commit_revision(&stray).await.is_err());

        mgr.commit_revision(&revision).await.unwrap();
        // terminal
        assert!(mgr.revert_revision(&revision).await.is_err());
    }

    #[tokio::test]
    async fn discard_refuses_live_generation() {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_collection("a-2024-04-30-00-00")
                .with_collection("b-2024-04-30-00-00")
                .with_alias("a", "a-2024-04-30-00-00"),
        );
        let mgr = manager(backend.clone(), &["a", "b"]);

        assert!(mgr.discard_revision(&rev("2024-04-30-00-00")).await.is_err());

        backend.upsert_alias("a", "a-2024-05-01-00-00").await.unwrap();
        let deleted = mgr.discard_revision(&rev("2024-04-30-00-00")).await.unwrap();
        assert_eq!(deleted, ["a-2024-04-30-00-00", "b-2024-04-30-00-00"]);
    }

    #[tokio::test]
    async fn same_minute_rebuild_reuses_generation() {
        let backend = Arc::new(MemoryBackend::new());
        let mgr = manager(backend.clone(), &["a"]);

        let first = mgr.initialize().await.unwrap();
        mgr.commit_revision(&first).await.unwrap();
        let second = mgr.initialize().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.collection_names(), ["a-2024-05-01-12-30"]);
        assert_eq!(mgr.live_generations(&second).await.unwrap(), ["a-2024-05-01-12-30"]);

        // reverting the shared generation still deletes it
        mgr.revert_revision(&second).await.unwrap();
        assert!(backend.collection_names().is_empty());
        assert_eq!(backend.alias_target("a").as_deref(), Some("a-2024-05-01-12-30"));
    }

    #[tokio::test]
    async fn fresh_generation_is_not_live() {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_collection("a-2024-04-30-08-00")
                .with_alias("a", "a-2024-04-30-08-00"),
        );
        let mgr = manager(backend, &["a"]);
        let revision = mgr.initialize().await.unwrap();

        assert!(mgr.live_generations(&revision).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unserializable_documents_skip_the_import() {
        let backend = Arc::new(MemoryBackend::new());
        let mgr = manager(backend.clone(), &["a"]);
        let revision = mgr.initialize().await.unwrap();

        // tuple keys cannot become JSON object keys
        let doc: std::collections::HashMap<(u8, u8), u8> = [((1, 2), 3)].into_iter().collect();
        let outcome = mgr
            .upsert_documents(&revision, &IndexId::parse("a").unwrap(), &[doc])
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ImportOutcome {
                attempted: 1,
                succeeded: 0,
                failed: 1
            }
        );
        assert!(!backend.calls().iter().any(|c| c.starts_with("import")));
    }
}
