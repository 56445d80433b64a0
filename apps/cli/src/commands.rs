//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use contentkit_core::{
    ContentService, FragmentSet, PersistedAdapter, RelationReason, SourceStatus, StaticRegistry,
    related_matches,
};
use contentkit_shared::{
    AppConfig, Capability, FeatureFlagSet, init_config, load_config, load_config_from,
};
use contentkit_storage::{ImportBundle, Storage};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ContentKit: merged article content, related suggestions and flag-aware fragments.
#[derive(Parser)]
#[command(
    name = "contentkit",
    version,
    about = "Inspect the merged article collection and capability-filtered fragments.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.contentkit/contentkit.toml.
    #[arg(long, global = true, env = "CONTENTKIT_CONFIG")]
    pub config: Option<PathBuf>,

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
    /// List merged articles, newest first.
    List {
        /// Only articles in this category.
        #[arg(long)]
        category: Option<String>,

        /// Only articles carrying this tag.
        #[arg(long)]
        tag: Option<String>,
    },

    /// Print one article as JSON.
    Show {
        /// Article slug.
        slug: String,
    },

    /// Suggest related articles.
    Related {
        /// Article slug.
        slug: String,

        /// Maximum number of suggestions (defaults to `[related] default_limit`).
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List categories with article counts.
    Categories,

    /// List all tags.
    Tags,

    /// Print the fragment set filtered by the current capability flags.
    Fragments {
        /// Fragment file (defaults to `[content] fragments_path`).
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Show resolved capability flags.
    Flags,

    /// Import authors and articles from a JSON bundle into the store.
    Import {
        /// Path to the import bundle.
        path: PathBuf,
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
        0 => "contentkit=info",
        1 => "contentkit=debug",
        _ => "contentkit=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so JSON output on stdout stays clean.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::List { category, tag } => {
            cmd_list(&config, category.as_deref(), tag.as_deref()).await
        }
        Command::Show { slug } => cmd_show(&config, &slug).await,
        Command::Related { slug, limit } => cmd_related(&config, &slug, limit).await,
        Command::Categories => cmd_categories(&config).await,
        Command::Tags => cmd_tags(&config).await,
        Command::Fragments { file } => cmd_fragments(&config, file.as_deref()),
        Command::Flags => cmd_flags(),
        Command::Import { path } => cmd_import(&config, &path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// Service wiring
// ---------------------------------------------------------------------------

/// Build the content service from config. A store that cannot be opened is
/// logged and treated as absent.
async fn build_service(config: &AppConfig) -> Result<ContentService<Option<Storage>>> {
    let registry = StaticRegistry::load(Path::new(&config.content.static_path))?;

    let storage = match &config.store.database_path {
        Some(path) => match Storage::open_readonly(Path::new(path)).await {
            Ok(storage) => Some(storage),
            Err(e) => {
                warn!(error = %e, path, "could not open article store");
                None
            }
        },
        None => None,
    };

    let adapter = PersistedAdapter::new(storage, config.store.timeout());
    Ok(ContentService::new(Arc::new(registry), adapter)
        .with_default_limit(config.related.default_limit))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_list(config: &AppConfig, category: Option<&str>, tag: Option<&str>) -> Result<()> {
    let service = build_service(config).await?;
    let snapshot = service.snapshot().await;
    if let SourceStatus::Degraded { reason } = &snapshot.persisted {
        info!(reason, "listing static content only");
    }

    let items = snapshot.collection.iter().filter(|item| {
        category.is_none_or(|c| item.category == c)
            && tag.is_none_or(|t| item.tags.iter().any(|x| x == t))
    });

    let mut count = 0;
    for item in items {
        count += 1;
        println!(
            "  {}  {:<40} {:<14} {}",
            item.published_at.format("%Y-%m-%d"),
            item.slug,
            item.category,
            item.provenance
        );
    }
    println!();
    println!("  {count} article(s)");
    Ok(())
}

async fn cmd_show(config: &AppConfig, slug: &str) -> Result<()> {
    let service = build_service(config).await?;
    let item = service
        .get_by_slug(slug)
        .await
        .ok_or_else(|| eyre!("no article with slug '{slug}'"))?;
    print_json(&item)
}

async fn cmd_related(config: &AppConfig, slug: &str, limit: Option<usize>) -> Result<()> {
    let service = build_service(config).await?;
    let collection = service.get_all_content().await;
    let item = collection
        .by_slug(slug)
        .ok_or_else(|| eyre!("no article with slug '{slug}'"))?;

    let limit = limit.unwrap_or(config.related.default_limit);
    let matches = related_matches(item, collection.items(), limit);
    if matches.is_empty() {
        println!("  no related articles for '{slug}'");
        return Ok(());
    }
    for m in matches {
        let reason = match m.reason {
            RelationReason::Explicit => "explicit".to_string(),
            RelationReason::Scored(score) => format!("score {score}"),
        };
        println!("  {:<40} {:<14} {reason}", m.item.slug, m.item.category);
    }
    Ok(())
}

async fn cmd_categories(config: &AppConfig) -> Result<()> {
    let service = build_service(config).await?;
    let collection = service.get_all_content().await;
    for (category, count) in collection.category_counts() {
        println!("  {category:<24} {count}");
    }
    Ok(())
}

async fn cmd_tags(config: &AppConfig) -> Result<()> {
    let service = build_service(config).await?;
    for tag in service.get_all_content().await.all_tags() {
        println!("  {tag}");
    }
    Ok(())
}

fn cmd_fragments(config: &AppConfig, file: Option<&Path>) -> Result<()> {
    let path = file.unwrap_or_else(|| Path::new(&config.content.fragments_path));
    let fragments = FragmentSet::load(path)?;
    let flags = FeatureFlagSet::from_env();
    let disabled: Vec<Capability> = flags.disabled().collect();
    info!(?disabled, "filtering fragments");
    print_json(&fragments.filter(&flags))
}

fn cmd_flags() -> Result<()> {
    let flags = FeatureFlagSet::from_env();
    for capability in Capability::ALL {
        let state = if flags.is_enabled(capability) { "enabled" } else { "disabled" };
        println!("  {:<10} {:<28} {state}", capability.as_str(), capability.env_var());
    }
    Ok(())
}

async fn cmd_import(config: &AppConfig, path: &Path) -> Result<()> {
    let database_path = config
        .store
        .database_path
        .as_deref()
        .ok_or_else(|| eyre!("no [store] database_path configured"))?;

    let raw = std::fs::read_to_string(path)
        .map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?;
    let bundle: ImportBundle = serde_json::from_str(&raw)
        .map_err(|e| eyre!("invalid import bundle '{}': {e}", path.display()))?;

    let storage = Storage::open(Path::new(database_path)).await?;
    let stats = storage.import_bundle(&bundle).await?;
    let published = storage.count_published().await?;

    println!();
    println!("  Import finished!");
    println!("  Authors:   {}", stats.authors);
    println!("  Articles:  {}", stats.articles);
    println!("  Published: {published}");
    println!();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
