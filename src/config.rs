//! Configuration for media-digest.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (MEDIA_DIGEST_HOME, MEDIA_DIGEST_VAULT)
//! 2. Config file (.media-digest/config.yaml)
//! 3. Defaults (~/.media-digest)
//!
//! Config file discovery:
//! - Searches current directory and parents for .media-digest/config.yaml
//! - `paths.home` is relative to the .media-digest/ directory, `paths.vault`
//!   to the project root containing it

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::core::retry::RetryPolicy;
use crate::digest::DigestSettings;
use crate::domain::MAX_TAGS;

/// Directory holding the config file
pub const CONFIG_DIR: &str = ".media-digest";

/// Config schema version this build understands
pub const CONFIG_VERSION: &str = "1";

pub const ENV_HOME: &str = "MEDIA_DIGEST_HOME";
pub const ENV_VAULT: &str = "MEDIA_DIGEST_VAULT";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Schema version; absent means the current one
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub export: Option<ExportConfig>,
    #[serde(default)]
    pub digest: Option<DigestConfig>,
    #[serde(default)]
    pub collaborators: CollaboratorConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .media-digest/)
    pub home: Option<String>,
    /// Obsidian vault root (relative to the project root)
    pub vault: Option<String>,
    /// Export folder inside the vault
    pub export_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_retries_audio: Option<u32>,
    pub max_retries_newsletters: Option<u32>,
    /// Seconds
    pub backoff_base: Option<u64>,
    /// Seconds
    pub max_backoff: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    pub max_tags_per_doc: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    /// Three-letter weekday the weekly digest ends on (FRI)
    pub weekly_day: Option<String>,
    pub takeaways_per_item: Option<usize>,
    pub highlight_limit: Option<usize>,
}

/// Command lines of the external collaborators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    #[serde(default)]
    pub discover: Vec<String>,
    #[serde(default)]
    pub process_episode: Vec<String>,
    #[serde(default)]
    pub process_newsletter: Vec<String>,
    #[serde(default)]
    pub summarize: Vec<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Engine state: database, locks
    pub home: PathBuf,
    /// Obsidian vault root
    pub vault: PathBuf,
    /// Folder inside the vault that notes and digests are written to
    pub export_dir: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub retry: RetryPolicy,
    pub max_tags_per_doc: usize,
    pub digest: DigestSettings,
    pub weekly_day: Weekday,
    pub collaborators: CollaboratorConfig,
    pub collaborator_timeout: Duration,
}

impl ResolvedConfig {
    /// Defaults for a given home directory
    pub fn with_home(home: PathBuf) -> Self {
        Self {
            vault: home.join("vault"),
            home,
            export_dir: paths::DEFAULT_EXPORT_DIR.to_string(),
            config_file: None,
            retry: RetryPolicy::default(),
            max_tags_per_doc: MAX_TAGS,
            digest: DigestSettings::default(),
            weekly_day: Weekday::Fri,
            collaborators: CollaboratorConfig::default(),
            collaborator_timeout: Duration::from_secs(paths::DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Root of everything the exporter writes
    pub fn export_root(&self) -> PathBuf {
        self.vault.join(&self.export_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        paths::database(&self.home)
    }

    pub fn lock_dir(&self) -> PathBuf {
        paths::locks(&self.home)
    }
}

/// Environment overrides, captured once so resolution is testable
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub home: Option<PathBuf>,
    pub vault: Option<PathBuf>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            home: std::env::var(ENV_HOME).ok().map(PathBuf::from),
            vault: std::env::var(ENV_VAULT).ok().map(PathBuf::from),
        }
    }
}

/// Find config file by searching a directory and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
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

/// Resolve a path that may be relative to a base directory
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

fn parse_weekday(value: &str) -> Result<Weekday> {
    value
        .trim()
        .parse::<Weekday>()
        .map_err(|_| anyhow::anyhow!("Invalid digest.weekly_day '{}': expected MON..SUN", value))
}

/// Merge a config file (if any), environment overrides and defaults
pub fn resolve_config(
    config_file: Option<&Path>,
    env: &EnvOverrides,
    default_home: PathBuf,
) -> Result<ResolvedConfig> {
    let Some(config_path) = config_file else {
        let home = env.home.clone().unwrap_or(default_home);
        let mut resolved = ResolvedConfig::with_home(home);
        if let Some(vault) = &env.vault {
            resolved.vault = vault.clone();
        }
        return Ok(resolved);
    };

    let config = load_config_file(config_path)?;
    if let Some(version) = config.version.as_deref() {
        if version.trim() != CONFIG_VERSION {
            anyhow::bail!(
                "Unsupported config version '{}' in {} (expected \"{}\")",
                version,
                config_path.display(),
                CONFIG_VERSION
            );
        }
    }

    // .media-digest/ and the project root above it
    let config_dir = config_path.parent().unwrap_or(Path::new("."));
    let base_dir = config_dir.parent().unwrap_or(Path::new("."));

    let home = if let Some(env_home) = &env.home {
        env_home.clone()
    } else if let Some(home_path) = &config.paths.home {
        resolve_path(config_dir, home_path)
    } else {
        default_home
    };

    let mut resolved = ResolvedConfig::with_home(home);
    resolved.config_file = Some(config_path.to_path_buf());

    resolved.vault = if let Some(env_vault) = &env.vault {
        env_vault.clone()
    } else if let Some(vault_path) = &config.paths.vault {
        resolve_path(base_dir, vault_path)
    } else {
        resolved.vault
    };

    if let Some(export_dir) = config.paths.export_dir {
        resolved.export_dir = export_dir;
    }

    if let Some(retry) = config.retry {
        let defaults = RetryPolicy::default();
        resolved.retry = RetryPolicy {
            episode_ceiling: retry.max_retries_audio.unwrap_or(defaults.episode_ceiling),
            newsletter_ceiling: retry
                .max_retries_newsletters
                .unwrap_or(defaults.newsletter_ceiling),
            backoff_base_secs: retry.backoff_base.unwrap_or(defaults.backoff_base_secs),
            max_backoff_secs: retry.max_backoff.unwrap_or(defaults.max_backoff_secs),
        };
    }

    if let Some(max_tags) = config.export.and_then(|e| e.max_tags_per_doc) {
        resolved.max_tags_per_doc = max_tags.min(MAX_TAGS);
    }

    if let Some(digest) = config.digest {
        if let Some(day) = &digest.weekly_day {
            resolved.weekly_day = parse_weekday(day)?;
        }
        if let Some(n) = digest.takeaways_per_item {
            resolved.digest.takeaways_per_item = n;
        }
        if let Some(n) = digest.highlight_limit {
            resolved.digest.highlight_limit = n;
        }
    }

    if let Some(secs) = config.collaborators.timeout_seconds {
        resolved.collaborator_timeout = Duration::from_secs(secs);
    }
    resolved.collaborators = config.collaborators;

    Ok(resolved)
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(paths::DEFAULT_HOME_DIR);

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let config_file = find_config_file(&cwd);

    resolve_config(config_file.as_deref(), &EnvOverrides::from_env(), default_home)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
