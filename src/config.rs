//! Configuration for the nozomi client.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (NOZOMI_DOWNLOAD_DIR, NOZOMI_MAX_CONCURRENCY,
//!    NOZOMI_TIMEOUT_SECONDS)
//! 2. Config file (.nozomi/config.yaml)
//! 3. Defaults (~/Downloads/nozomi, 8 concurrent fetches, 30s timeout)
//!
//! Config file discovery:
//! - Searches current directory and parents for .nozomi/config.yaml
//! - Relative download paths are resolved against the directory holding .nozomi/

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::DEFAULT_MAX_CONCURRENT_FETCHES;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const ENV_DOWNLOAD_DIR: &str = "NOZOMI_DOWNLOAD_DIR";
const ENV_MAX_CONCURRENCY: &str = "NOZOMI_MAX_CONCURRENCY";
const ENV_TIMEOUT_SECONDS: &str = "NOZOMI_TIMEOUT_SECONDS";

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadConfig {
    /// Media download directory (relative to the project root)
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpConfig {
    pub max_concurrency: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Where downloaded media is written
    pub download_dir: PathBuf,
    /// Upper bound on simultaneous catalog requests
    pub max_concurrent_fetches: usize,
    /// Per-request timeout
    pub timeout_seconds: u64,
    pub user_agent: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

fn default_user_agent() -> String {
    format!("nozomi/{}", env!("CARGO_PKG_VERSION"))
}

fn default_download_dir() -> Result<PathBuf> {
    let base = match dirs::download_dir() {
        Some(dir) => dir,
        None => dirs::home_dir()
            .context("Failed to determine home directory")?
            .join("Downloads"),
    };
    Ok(base.join("nozomi"))
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".nozomi").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Parse a numeric environment override, naming the variable on failure
fn parse_env<T: std::str::FromStr>(name: &str, value: Option<String>) -> Result<Option<T>> {
    match value {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a number, got '{}'", name, raw)),
        None => Ok(None),
    }
}

/// Merge environment, config file and defaults
fn resolve_config(
    config_file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let (config_path, file) = match config_file {
        Some((path, file)) => (Some(path), Some(file)),
        None => (None, None),
    };
    let http = file.as_ref().map(|f| f.http.clone()).unwrap_or_default();

    let download_dir = if let Some(env_dir) = env(ENV_DOWNLOAD_DIR) {
        PathBuf::from(env_dir)
    } else if let (Some(path), Some(dir)) = (
        config_path.as_ref(),
        file.as_ref().and_then(|f| f.download.dir.as_ref()),
    ) {
        // Base directory is the parent of .nozomi/ (i.e., grandparent of config.yaml)
        let base_dir = path
            .parent()
            .and_then(|p| p.parent())
            .unwrap_or(Path::new("."));
        resolve_path(base_dir, dir)
    } else {
        default_download_dir()?
    };

    let max_concurrent_fetches = parse_env(ENV_MAX_CONCURRENCY, env(ENV_MAX_CONCURRENCY))?
        .or(http.max_concurrency)
        .unwrap_or(DEFAULT_MAX_CONCURRENT_FETCHES)
        .max(1);

    let timeout_seconds = parse_env(ENV_TIMEOUT_SECONDS, env(ENV_TIMEOUT_SECONDS))?
        .or(http.timeout_seconds)
        .unwrap_or(DEFAULT_TIMEOUT_SECONDS);

    let user_agent = http.user_agent.unwrap_or_else(default_user_agent);

    Ok(ResolvedConfig {
        download_dir,
        max_concurrent_fetches,
        timeout_seconds,
        user_agent,
        config_file: config_path,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let config_file = match find_config_file() {
        Some(path) => {
            let file = load_config_file(&path)?;
            Some((path, file))
        }
        None => None,
    };

    resolve_config(config_file, |name| std::env::var(name).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
