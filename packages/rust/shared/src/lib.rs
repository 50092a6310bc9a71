//! Shared types, error model, and configuration for reindex.
//!
//! This crate is the foundation depended on by all other reindex crates.
//! It provides:
//! - [`ReindexError`]: the unified error type
//! - Domain types ([`IndexId`], [`RevisionId`], [`DocumentDescriptor`], [`Scores`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ContentConfig, EngineConfig, IndexConfig, PresetConfig, SearchConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{ReindexError, Result};
pub use types::{
    CollectionSchema, DocumentDescriptor, DocumentId, DocumentType, FieldSchema, IndexId,
    REVISION_ID_FORMAT, REVISION_ID_LEN, RevisionId, Score, Scores,
};
