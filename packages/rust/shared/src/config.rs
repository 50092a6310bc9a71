//! Application configuration for reindex.
//!
//! User config lives at `~/.reindex/reindex.toml` unless a path is given
//! explicitly. CLI flags override config file values, which override defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ReindexError, Result};
use crate::types::{CollectionSchema, IndexId};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "reindex.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".reindex";

// ---------------------------------------------------------------------------
// Config structs (matching reindex.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backing search engine.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Content source the documents are extracted from.
    #[serde(default)]
    pub content: ContentConfig,

    /// Search defaults.
    #[serde(default)]
    pub search: SearchConfig,

    /// Reusable query preset ensured on every initialize.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<PresetConfig>,

    /// Configured indices, in build order.
    #[serde(default)]
    pub indices: Vec<IndexConfig>,
}

/// `[engine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the search engine API.
    #[serde(default = "default_engine_url")]
    pub url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout.
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,

    /// Timeout for the health probe run before every build.
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_engine_timeout(),
            health_timeout_secs: default_health_timeout(),
        }
    }
}

fn default_engine_url() -> String {
    "http://localhost:8108".into()
}
fn default_api_key_env() -> String {
    "TYPESENSE_API_KEY".into()
}
fn default_engine_timeout() -> u64 {
    30
}
fn default_health_timeout() -> u64 {
    5
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    /// Check the engine section on its own (enough for `health` and `search`).
    pub fn validate(&self) -> Result<()> {
        validate_url("engine.url", &self.url)?;
        if self.timeout_secs == 0 || self.health_timeout_secs == 0 {
            return Err(ReindexError::config("engine timeouts must be > 0"));
        }
        Ok(())
    }
}

/// `[content]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Base URL of the content server.
    #[serde(default = "default_content_url")]
    pub url: String,

    /// Per-request timeout.
    #[serde(default = "default_content_timeout")]
    pub timeout_secs: u64,

    /// Node mime types eligible for indexing.
    #[serde(default)]
    pub supported_mime_types: Vec<String>,

    /// Node data attribute that, when truthy, excludes the node from indexing.
    #[serde(default = "default_exclude_attribute")]
    pub exclude_attribute: String,

    /// Also skip nodes flagged hidden in navigation.
    #[serde(default)]
    pub skip_hidden: bool,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            url: default_content_url(),
            timeout_secs: default_content_timeout(),
            supported_mime_types: Vec::new(),
            exclude_attribute: default_exclude_attribute(),
            skip_hidden: false,
        }
    }
}

fn default_content_url() -> String {
    "http://localhost:8080/contentserver".into()
}
fn default_content_timeout() -> u64 {
    60
}
fn default_exclude_attribute() -> String {
    "excludeFromSearch".into()
}

impl ContentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Field(s) queried by simple search.
    #[serde(default = "default_query_by")]
    pub default_query_by: String,

    /// Default page size.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_query_by: default_query_by(),
            per_page: default_per_page(),
        }
    }
}

fn default_query_by() -> String {
    "title".into()
}
fn default_per_page() -> u32 {
    10
}

/// `[preset]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetConfig {
    #[serde(default = "default_preset_name")]
    pub name: String,

    /// Preset body as understood by the engine (e.g. `{ value = { q = "*" } }`).
    pub value: serde_json::Value,
}

fn default_preset_name() -> String {
    "default".into()
}

/// `[[indices]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Logical index id, also the alias name and the content dimension.
    pub id: IndexId,

    /// Schema applied to every generation of this index.
    #[serde(default)]
    pub schema: CollectionSchema,
}

impl AppConfig {
    /// Configured index ids in declaration order.
    pub fn index_ids(&self) -> Vec<IndexId> {
        self.indices.iter().map(|i| i.id.clone()).collect()
    }

    /// Full validation required before a build.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        validate_url("content.url", &self.content.url)?;

        if self.content.timeout_secs == 0 {
            return Err(ReindexError::config("content.timeout_secs must be > 0"));
        }
        if self.content.supported_mime_types.is_empty() {
            return Err(ReindexError::config(
                "content.supported_mime_types must list at least one mime type",
            ));
        }
        if self.indices.is_empty() {
            return Err(ReindexError::config("no indices configured"));
        }

        let mut seen = HashSet::new();
        for index in &self.indices {
            if !seen.insert(index.id.as_str()) {
                return Err(ReindexError::config(format!(
                    "index '{}' is configured more than once",
                    index.id
                )));
            }
        }

        if let Some(preset) = &self.preset {
            if preset.name.trim().is_empty() {
                return Err(ReindexError::config("preset.name must not be empty"));
            }
        }
        Ok(())
    }
}

fn validate_url(key: &str, value: &str) -> Result<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| ReindexError::config(format!("{key} '{value}' is not a valid URL: {e}")))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.reindex/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ReindexError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.reindex/reindex.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ReindexError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ReindexError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ReindexError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ReindexError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ReindexError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the engine API key from the env var named in the config.
pub fn resolve_api_key(config: &EngineConfig) -> Result<String> {
    let var_name = &config.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ReindexError::config(format!(
            "search engine API key not found. Set the {var_name} environment variable."
        ))),
    }
}
