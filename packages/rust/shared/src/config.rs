//! Application configuration for relnotes.
//!
//! User config lives at `~/.relnotes/relnotes.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RelnotesError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "relnotes.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".relnotes";

// ---------------------------------------------------------------------------
// Config structs (matching relnotes.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// External agent CLI used as the classification/investigation oracle.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Code-hosting API settings for fetching release notes.
    #[serde(default)]
    pub github: GithubConfig,

    /// Changelog documents to fetch per release.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,

    /// Work-list query settings for batch investigation.
    #[serde(default)]
    pub worklist: WorklistConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            oracle: OracleConfig::default(),
            github: GithubConfig::default(),
            sources: default_sources(),
            worklist: WorklistConfig::default(),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root of the per-release cache (`<cache_dir>/v<version>/...`).
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Items per grouping batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Issues per batch investigation when no count is given.
    #[serde(default = "default_investigate_count")]
    pub investigate_count: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            batch_size: default_batch_size(),
            investigate_count: default_investigate_count(),
        }
    }
}

fn default_cache_dir() -> String {
    ".cache/releases".into()
}
fn default_batch_size() -> usize {
    50
}
fn default_investigate_count() -> usize {
    5
}

/// `[oracle]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Agent CLI executable.
    #[serde(default = "default_oracle_command")]
    pub command: String,

    /// Model passed with `--model`; omitted when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Pass `--trust-all-tools` so the agent can write files unattended.
    #[serde(default = "default_true")]
    pub trust_all_tools: bool,

    /// Hard limit for a single non-interactive oracle invocation.
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            command: default_oracle_command(),
            model: None,
            trust_all_tools: true,
            timeout_secs: default_oracle_timeout(),
        }
    }
}

fn default_oracle_command() -> String {
    "kiro-cli".into()
}
fn default_true() -> bool {
    true
}
fn default_oracle_timeout() -> u64 {
    3600
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// REST API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: Url,

    /// Name of the env var holding an API token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Per-request timeout.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Project prefix used in component headers (`## OpenSearch k-NN`).
    #[serde(default = "default_root_name")]
    pub root_name: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_env: default_token_env(),
            timeout_secs: default_http_timeout(),
            root_name: default_root_name(),
        }
    }
}

fn default_api_base() -> Url {
    Url::parse("https://api.github.com").expect("static URL")
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_http_timeout() -> u64 {
    30
}
fn default_root_name() -> String {
    "opensearch".into()
}

/// `[[sources]]` entry: one release-notes document per release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub owner: String,
    pub repo: String,
    /// Path inside the repo; `{version}` is substituted.
    pub path_template: String,
}

impl SourceConfig {
    fn new(owner: &str, repo: &str, path_template: &str) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            path_template: path_template.into(),
        }
    }
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new(
            "opensearch-project",
            "opensearch-build",
            "release-notes/opensearch-release-notes-{version}.md",
        ),
        SourceConfig::new(
            "opensearch-project",
            "OpenSearch",
            "release-notes/opensearch.release-notes-{version}.md",
        ),
        SourceConfig::new(
            "opensearch-project",
            "OpenSearch-Dashboards",
            "release-notes/opensearch-dashboards.release-notes-{version}.md",
        ),
    ]
}

/// `[worklist]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorklistConfig {
    /// Issue-tracker CLI executable.
    #[serde(default = "default_worklist_command")]
    pub command: String,

    /// Labels every queued investigation issue carries.
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,

    #[serde(default = "default_worklist_timeout")]
    pub timeout_secs: u64,
}

impl Default for WorklistConfig {
    fn default() -> Self {
        Self {
            command: default_worklist_command(),
            labels: default_labels(),
            timeout_secs: default_worklist_timeout(),
        }
    }
}

fn default_worklist_command() -> String {
    "gh".into()
}
fn default_labels() -> Vec<String> {
    vec!["status/todo".into()]
}
fn default_worklist_timeout() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.relnotes/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RelnotesError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.relnotes/relnotes.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| RelnotesError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        RelnotesError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RelnotesError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RelnotesError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RelnotesError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configurations the pipeline cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.defaults.batch_size == 0 {
        return Err(RelnotesError::config("defaults.batch_size must be at least 1"));
    }
    if config.oracle.timeout_secs == 0 || config.worklist.timeout_secs == 0 {
        return Err(RelnotesError::config("timeouts must be at least 1 second"));
    }
    if let Some(source) = config
        .sources
        .iter()
        .find(|s| !s.path_template.contains("{version}"))
    {
        return Err(RelnotesError::config(format!(
            "source {}/{} path_template has no {{version}} placeholder",
            source.owner, source.repo
        )));
    }
    Ok(())
}

/// Read the API token from the configured env var, if set and non-empty.
pub fn github_token(config: &AppConfig) -> Option<String> {
    std::env::var(&config.github.token_env)
        .ok()
        .filter(|val| !val.is_empty())
}
