//! Build orchestration: one revision per run, committed only when every
//! index was built cleanly.
//!
//! 1. Initialize a revision
//! 2. For each index: provide documents, upsert them
//! 3. Commit if nothing failed and something was indexed, otherwise revert

use std::sync::Arc;
use std::time::{Duration, Instant};

use reindex_content::DocumentProvider;
use reindex_shared::{IndexId, Result, RevisionId};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::revision::RevisionApi;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Why a run was reverted instead of committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertReason {
    /// At least one index failed to provide or upsert.
    Tainted,
    /// The run was cancelled before all indices were processed.
    Cancelled,
    /// Nothing was indexed.
    NoDocuments,
}

impl std::fmt::Display for RevertReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tainted => f.write_str("tainted"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::NoDocuments => f.write_str("no documents indexed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Committed,
    Reverted { reason: RevertReason },
}

/// Per-index result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub index_id: IndexId,
    /// Documents assembled (filled slots).
    pub documents_provided: usize,
    /// Documents the engine accepted.
    pub documents_indexed: usize,
    /// Assembly failures plus per-document import failures.
    pub documents_failed: usize,
    /// Set when the index tainted the run.
    pub error: Option<String>,
}

impl IndexReport {
    fn new(index_id: IndexId) -> Self {
        Self {
            index_id,
            documents_provided: 0,
            documents_indexed: 0,
            documents_failed: 0,
            error: None,
        }
    }
}

/// Result of [`Indexer::run`].
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub revision_id: RevisionId,
    pub outcome: BuildOutcome,
    pub documents_indexed: usize,
    pub documents_failed: usize,
    pub indices: Vec<IndexReport>,
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn committed(&self) -> bool {
        self.outcome == BuildOutcome::Committed
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting build status.
pub trait BuildProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before an index is built.
    fn index_started(&self, index_id: &IndexId, current: usize, total: usize);
    /// Called after an index is built, successfully or not.
    fn index_finished(&self, report: &IndexReport);
    /// Called when the run completes.
    fn done(&self, report: &BuildReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl BuildProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn index_started(&self, _index_id: &IndexId, _current: usize, _total: usize) {}
    fn index_finished(&self, _report: &IndexReport) {}
    fn done(&self, _report: &BuildReport) {}
}

// ---------------------------------------------------------------------------
// Indexer
// ---------------------------------------------------------------------------

/// Drives one build across all configured indices.
pub struct Indexer<D> {
    revisions: Arc<dyn RevisionApi<D>>,
    provider: Arc<dyn DocumentProvider<D>>,
}

impl<D: Send + 'static> Indexer<D> {
    pub fn new(revisions: Arc<dyn RevisionApi<D>>, provider: Arc<dyn DocumentProvider<D>>) -> Self {
        Self {
            revisions,
            provider,
        }
    }

    /// Run a full build.
    ///
    /// Only failures of initialize, commit and revert are returned as
    /// errors. Per-index failures and cancellation revert the revision and
    /// are reported through [`BuildReport::outcome`].
    #[instrument(skip_all)]
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        progress: &dyn BuildProgress,
    ) -> Result<BuildReport> {
        let start = Instant::now();

        // --- Phase 1: Revision ---
        progress.phase("Initializing revision");
        let revision = self.revisions.initialize().await?;

        let indices = match self.revisions.indices() {
            Ok(indices) => indices,
            Err(e) => {
                error!(error = %e, "could not list indices");
                self.revisions.revert_revision(&revision).await?;
                return Err(e);
            }
        };

        // --- Phase 2: Indices ---
        let mut reports = Vec::with_capacity(indices.len());
        let mut tainted = false;
        let mut cancelled = false;

        for (i, index_id) in indices.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(remaining = indices.len() - i, "build cancelled");
                cancelled = true;
                break;
            }

            progress.index_started(index_id, i + 1, indices.len());
            let report = self.build_index(&revision, index_id).await;
            if report.error.is_some() {
                tainted = true;
            }
            progress.index_finished(&report);
            reports.push(report);
        }

        let documents_indexed: usize = reports.iter().map(|r| r.documents_indexed).sum();
        let documents_failed: usize = reports.iter().map(|r| r.documents_failed).sum();

        // --- Phase 3: Commit or revert ---
        let revert_reason = if cancelled {
            Some(RevertReason::Cancelled)
        } else if tainted {
            Some(RevertReason::Tainted)
        } else if documents_indexed == 0 {
            Some(RevertReason::NoDocuments)
        } else {
            None
        };

        let outcome = match revert_reason {
            None => {
                progress.phase("Committing revision");
                self.revisions.commit_revision(&revision).await?;
                BuildOutcome::Committed
            }
            Some(reason) => {
                progress.phase("Reverting revision");
                warn!(%revision, %reason, "reverting revision");
                self.revisions.revert_revision(&revision).await?;
                BuildOutcome::Reverted { reason }
            }
        };

        let report = BuildReport {
            revision_id: revision,
            outcome,
            documents_indexed,
            documents_failed,
            indices: reports,
            elapsed: start.elapsed(),
        };

        info!(
            revision = %report.revision_id,
            committed = report.committed(),
            documents_indexed,
            documents_failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "build complete"
        );
        progress.done(&report);
        Ok(report)
    }

    #[instrument(skip_all, fields(index = %index_id))]
    async fn build_index(&self, revision: &RevisionId, index_id: &IndexId) -> IndexReport {
        let mut report = IndexReport::new(index_id.clone());

        let provided = match self.provider.provide(index_id).await {
            Ok(provided) => provided,
            Err(e) => {
                error!(error = %e, "failed to provide documents");
                report.error = Some(e.to_string());
                return report;
            }
        };

        report.documents_provided = provided.present();
        report.documents_failed = provided.failed;
        let documents = provided.into_documents();

        match self
            .revisions
            .upsert_documents(revision, index_id, documents)
            .await
        {
            Ok(outcome) => {
                report.documents_indexed = outcome.succeeded;
                report.documents_failed += outcome.failed;
            }
            Err(e) => {
                error!(error = %e, "failed to upsert documents");
                report.error = Some(e.to_string());
            }
        }

        report
    }
}
