use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::ContentKind;
use crate::storage::BackupPolicy;

pub const USERNAME_VAR: &str = "AIDS_USERNAME";
pub const PASSWORD_VAR: &str = "AIDS_PASSWORD";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            user_agent: None,
        }
    }
}

fn default_url() -> String {
    "https://api.aidungeon.io/graphql".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct HarvestConfig {
    /// Default pinned title; empty harvests everything.
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_min_actions")]
    pub min_actions: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            min_actions: default_min_actions(),
        }
    }
}

fn default_min_actions() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_stories_path")]
    pub stories_path: PathBuf,
    #[serde(default = "default_scenarios_path")]
    pub scenarios_path: PathBuf,
    #[serde(default = "default_backups_dir")]
    pub backups_dir: PathBuf,
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            stories_path: default_stories_path(),
            scenarios_path: default_scenarios_path(),
            backups_dir: default_backups_dir(),
            max_backups: default_max_backups(),
        }
    }
}

impl StorageConfig {
    /// Output file for containers of `kind`.
    pub fn path_for(&self, kind: ContentKind) -> &Path {
        match kind {
            ContentKind::Story => &self.stories_path,
            ContentKind::Scenario => &self.scenarios_path,
        }
    }

    pub fn backup_policy(&self) -> BackupPolicy {
        BackupPolicy {
            dir: self.backups_dir.clone(),
            max_backups: self.max_backups,
        }
    }
}

fn default_stories_path() -> PathBuf {
    PathBuf::from("stories.json")
}
fn default_scenarios_path() -> PathBuf {
    PathBuf::from("scenarios.json")
}
fn default_backups_dir() -> PathBuf {
    PathBuf::from("backups")
}
fn default_max_backups() -> usize {
    crate::storage::DEFAULT_MAX_BACKUPS
}

/// Login credentials, read from the environment only.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        let username = std::env::var(USERNAME_VAR)
            .with_context(|| format!("{} environment variable not set", USERNAME_VAR))?;
        let password = std::env::var(PASSWORD_VAR)
            .with_context(|| format!("{} environment variable not set", PASSWORD_VAR))?;
        Ok(Self { username, password })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.api.url.trim().is_empty() {
        anyhow::bail!("api.url must not be empty");
    }

    if config.api.timeout_secs == 0 {
        anyhow::bail!("api.timeout_secs must be >= 1");
    }

    if config.storage.max_backups == 0 {
        anyhow::bail!("storage.max_backups must be >= 1");
    }

    Ok(())
}
