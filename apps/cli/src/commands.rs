//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use reindex_content::{BasicDocument, BasicDocumentBuilder, ContentServerClient, ContentServerProvider};
use reindex_core::{
    BuildOutcome, BuildProgress, BuildReport, IndexReport, Indexer, RevisionManager, Searcher,
};
use reindex_engine::{MemoryBackend, SearchBackend, TypesenseClient};
use reindex_shared::{
    AppConfig, DocumentId, IndexId, RevisionId, init_config, load_config, load_config_from, resolve_api_key,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// reindex: rebuild search indices without downtime.
#[derive(Parser)]
#[command(
    name = "reindex",
    version,
    about = "Rebuild search indices from a content source and swap aliases atomically.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.reindex/reindex.toml).
    #[arg(long, global = true, env = "REINDEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build a new revision of every configured index.
    Run {
        /// Build against an in-memory engine; nothing is written remotely.
        #[arg(long)]
        dry_run: bool,
    },

    /// Check that the search engine is reachable.
    Health,

    /// Query an index through its alias.
    Search {
        /// Index id (alias name).
        index: String,

        /// Query text; "*" matches everything.
        query: String,

        /// Filter as field=value (repeatable; repeated fields match any value).
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        #[arg(long, default_value = "1")]
        page: u32,

        /// Defaults to [search] per_page.
        #[arg(long)]
        per_page: Option<u32>,

        #[arg(long)]
        sort_by: Option<String>,
    },

    /// Delete the generations of a revision left behind by an earlier run.
    Revert {
        /// Revision id (YYYY-MM-DD-HH-MM).
        revision: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "reindex=info",
        1 => "reindex=debug",
        _ => "reindex=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Run { dry_run } => cmd_run(config_path, dry_run).await,
        Command::Health => cmd_health(config_path).await,
        Command::Search {
            index,
            query,
            filters,
            page,
            per_page,
            sort_by,
        } => cmd_search(config_path, &index, &query, &filters, page, per_page, sort_by.as_deref()).await,
        Command::Revert { revision } => cmd_revert(config_path, &revision).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(&path)?,
        None => load_config()?,
    };
    Ok(config)
}

fn engine_client(config: &AppConfig) -> Result<TypesenseClient> {
    config.engine.validate()?;
    let api_key = resolve_api_key(&config.engine)?;
    Ok(TypesenseClient::new(
        &config.engine.url,
        api_key,
        config.engine.timeout(),
    )?)
}

/// Parse repeated `field=value` flags into a filter map.
fn parse_filters(raw: &[String]) -> Result<BTreeMap<String, Vec<String>>> {
    let mut filters: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in raw {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| eyre!("invalid filter '{item}': expected field=value"))?;
        if key.is_empty() {
            return Err(eyre!("invalid filter '{item}': empty field name"));
        }
        filters
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
    }
    Ok(filters)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    config.validate()?;

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current index then reverting");
            watcher.cancel();
        }
    });

    info!(
        indices = config.indices.len(),
        dry_run,
        engine = %config.engine.url,
        content = %config.content.url,
        "starting build"
    );

    let report = if dry_run {
        build(Arc::new(MemoryBackend::new()), &config, &cancel).await?
    } else {
        build(Arc::new(engine_client(&config)?), &config, &cancel).await?
    };

    print_report(&report);

    match report.outcome {
        BuildOutcome::Committed => Ok(()),
        BuildOutcome::Reverted { reason } => Err(eyre!(
            "revision {} reverted ({reason}); previous generations stay live",
            report.revision_id
        )),
    }
}

async fn build<B: SearchBackend + 'static>(
    backend: Arc<B>,
    config: &AppConfig,
    cancel: &CancellationToken,
) -> Result<BuildReport> {
    let content = ContentServerClient::new(&config.content.url, config.content.timeout())?;
    let provider = ContentServerProvider::<_, BasicDocument>::new(
        Arc::new(content),
        BasicDocumentBuilder::registry(&config.content.supported_mime_types),
        (&config.content).into(),
    );
    let manager = RevisionManager::from_config(backend, config);
    let indexer = Indexer::new(Arc::new(manager), Arc::new(provider));

    let reporter = CliProgress::new();
    let report = indexer
        .run(cancel, &reporter)
        .await
        .wrap_err("build failed")?;
    Ok(report)
}

fn print_report(report: &BuildReport) {
    println!();
    match report.outcome {
        BuildOutcome::Committed => println!("  Revision {} committed", report.revision_id),
        BuildOutcome::Reverted { reason } => {
            println!("  Revision {} reverted ({reason})", report.revision_id)
        }
    }
    for index in &report.indices {
        let status = index.error.as_deref().unwrap_or("ok");
        println!(
            "  {:<32} indexed {:>6}  failed {:>4}  {status}",
            index.index_id.as_str(),
            index.documents_indexed,
            index.documents_failed,
        );
    }
    println!("  Indexed: {}", report.documents_indexed);
    println!("  Failed:  {}", report.documents_failed);
    println!("  Time:    {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

async fn cmd_health(config_path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let client = engine_client(&config)?;
    client.health(config.engine.health_timeout()).await?;
    println!("engine at {} is healthy", config.engine.url);
    Ok(())
}

async fn cmd_search(
    config_path: Option<PathBuf>,
    index: &str,
    query: &str,
    filters: &[String],
    page: u32,
    per_page: Option<u32>,
    sort_by: Option<&str>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let index = IndexId::parse(index)?;
    let filters = parse_filters(filters)?;
    let per_page = per_page.unwrap_or(config.search.per_page);

    let searcher = Searcher::new(
        Arc::new(engine_client(&config)?),
        config.search.default_query_by.clone(),
    );
    let (hits, scores) = searcher
        .simple_search::<serde_json::Value>(&index, query, &filters, page, per_page, sort_by)
        .await?;

    for hit in &hits {
        let score = hit
            .get("id")
            .and_then(|id| id.as_str())
            .and_then(|id| scores.get(&DocumentId::from(id)))
            .map(|s| s.index)
            .unwrap_or_default();
        println!("{score:>20}  {}", serde_json::to_string(hit)?);
    }
    println!("{} result(s)", hits.len());
    Ok(())
}

async fn cmd_revert(config_path: Option<PathBuf>, revision: &str) -> Result<()> {
    let config = resolve_config(config_path)?;
    config.validate()?;
    let revision: RevisionId = revision.parse()?;

    let manager = RevisionManager::from_config(Arc::new(engine_client(&config)?), &config);
    let deleted = manager.discard_revision(&revision).await?;

    if deleted.is_empty() {
        println!("nothing to delete for revision {revision}");
    }
    for name in deleted {
        println!("deleted {name}");
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl BuildProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn index_started(&self, index_id: &IndexId, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Indexing [{current}/{total}] {index_id}"));
    }

    fn index_finished(&self, report: &IndexReport) {
        if let Some(error) = &report.error {
            self.spinner
                .println(format!("  {} failed: {error}", report.index_id));
        }
    }

    fn done(&self, _report: &BuildReport) {
        self.spinner.finish_and_clear();
    }
}
