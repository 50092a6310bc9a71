//! Revision protocol, build orchestration and search for reindex.
//!
//! A build writes a fresh generation of every configured index next to the
//! live one, then either swaps the public aliases over (commit) or drops the
//! new generation (revert). Readers never see a half-built index.

pub mod indexer;
pub mod naming;
pub mod revision;
pub mod search;

pub use indexer::{
    BuildOutcome, BuildProgress, BuildReport, IndexReport, Indexer, RevertReason, SilentProgress,
};
pub use naming::{extract_revision_id, format_generation_name};
pub use revision::{ImportOutcome, PruneOutcome, RevisionApi, RevisionManager, RevisionState};
pub use search::{SearchParams, Searcher, build_search_params, format_filter_query};
