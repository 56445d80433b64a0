//! Application configuration for ContentKit.
//!
//! User config lives at `~/.contentkit/contentkit.toml`.
//! CLI flags override config file values, which override defaults.
//! Capability flags are not part of this file; see [`crate::flags`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ContentKitError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "contentkit.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".contentkit";

// ---------------------------------------------------------------------------
// Config structs (matching contentkit.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Static content and fragment locations.
    #[serde(default)]
    pub content: ContentConfig,

    /// Persisted article store.
    #[serde(default)]
    pub store: StoreConfig,

    /// Relatedness defaults.
    #[serde(default)]
    pub related: RelatedConfig,
}

/// `[content]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// JSON file holding the compiled static article registry.
    #[serde(default = "default_static_path")]
    pub static_path: String,

    /// JSON file holding the marketing fragment set.
    #[serde(default = "default_fragments_path")]
    pub fragments_path: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            static_path: default_static_path(),
            fragments_path: default_fragments_path(),
        }
    }
}

fn default_static_path() -> String {
    "content/articles.json".into()
}
fn default_fragments_path() -> String {
    "content/fragments.json".into()
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// libSQL database file. Unset means the site runs on static content only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,

    /// Upper bound for one `list_published` call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    3000
}

/// `[related]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedConfig {
    /// How many related articles to show when the caller does not say.
    #[serde(default = "default_related_limit")]
    pub default_limit: usize,
}

impl Default for RelatedConfig {
    fn default() -> Self {
        Self {
            default_limit: default_related_limit(),
        }
    }
}

fn default_related_limit() -> usize {
    3
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.contentkit/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ContentKitError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.contentkit/contentkit.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| ContentKitError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ContentKitError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject settings that cannot work at all.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.content.static_path.trim().is_empty() {
        return Err(ContentKitError::config("content.static_path must not be empty"));
    }
    if config.store.timeout_ms == 0 {
        return Err(ContentKitError::config("store.timeout_ms must be greater than zero"));
    }
    if config.related.default_limit == 0 {
        return Err(ContentKitError::config("related.default_limit must be at least 1"));
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ContentKitError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ContentKitError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ContentKitError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
