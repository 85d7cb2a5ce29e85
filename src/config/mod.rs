//! # Configuration Management Module
//!
//! Runtime settings for the guild registry, loaded from a TOML file. Every
//! section has defaults so a partial file (or none at all, via
//! [`Config::default`]) is usable.
//!
//! ## Configuration Structure
//!
//! - [`StorageConfig`] - where the sled database lives
//! - [`CatalogConfig`] - paths of the role and tier reference tables
//! - [`GuildSettings`] - name rules, blacklist, chat templates
//! - [`VaultSettings`] - shape of newly created vaults
//! - [`PermissionSettings`] - sync/async permission propagation
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use guildhall::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Data dir: {}", config.storage.data_dir);
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [storage]
//! data_dir = "./data"
//!
//! [catalogs]
//! roles_file = "roles.toml"
//! tiers_file = "tiers.toml"
//!
//! [guild]
//! name_requirements = "[a-zA-Z0-9]{1,64}"
//! blacklist_words = ["admin"]
//!
//! [permissions]
//! run_async = true
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub catalogs: CatalogConfig,
    #[serde(default)]
    pub guild: GuildSettings,
    #[serde(default)]
    pub vault: VaultSettings,
    #[serde(default)]
    pub permissions: PermissionSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Optional override for the sled database path; defaults to `<data_dir>/guilds`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
    /// Namespace prefix for cooldown containers, if several servers share one database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_prefix: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            db_path: None,
            cooldown_prefix: None,
        }
    }
}

impl StorageConfig {
    pub fn resolved_db_path(&self) -> PathBuf {
        match &self.db_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.data_dir).join("guilds"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub roles_file: String,
    pub tiers_file: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            roles_file: "roles.toml".to_string(),
            tiers_file: "tiers.toml".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildSettings {
    /// Regex a guild name must fully match.
    #[serde(default = "default_name_requirements")]
    pub name_requirements: String,
    /// Regex a guild prefix must fully match.
    #[serde(default = "default_prefix_requirements")]
    pub prefix_requirements: String,
    /// When false, color codes are stripped before the requirement patterns run.
    #[serde(default)]
    pub include_color_codes: bool,
    #[serde(default)]
    pub blacklist_words: Vec<String>,
    /// False: substring match ignoring case. True: whole-name match ignoring case.
    #[serde(default)]
    pub blacklist_case_sensitive: bool,
    #[serde(default = "default_guild_chat_format")]
    pub guild_chat_format: String,
    #[serde(default = "default_ally_chat_format")]
    pub ally_chat_format: String,
    #[serde(default = "default_spy_chat_format")]
    pub spy_chat_format: String,
    #[serde(default)]
    pub log_guild_chat: bool,
    #[serde(default)]
    pub log_ally_chat: bool,
    #[serde(default = "default_bracket_left")]
    pub format_bracket_left: String,
    #[serde(default = "default_format_content")]
    pub format_content: String,
    #[serde(default = "default_bracket_right")]
    pub format_bracket_right: String,
    #[serde(default)]
    pub format_no_guild: String,
}

fn default_name_requirements() -> String {
    "[a-zA-Z0-9]{1,64}".to_string()
}

fn default_prefix_requirements() -> String {
    "[a-zA-Z0-9&]{1,20}".to_string()
}

fn default_guild_chat_format() -> String {
    "&7&l[Guild Chat]&r &b[{role}&b]&b {player}: {message}".to_string()
}

fn default_ally_chat_format() -> String {
    "&7&l[Ally Chat]&r &b[{guild}&b]&b {player}: {message}".to_string()
}

fn default_spy_chat_format() -> String {
    "&7&l[Spy]&r &b[{guild}&b][{role}&b]&b {player}: {message}".to_string()
}

fn default_bracket_left() -> String {
    "[".to_string()
}

fn default_format_content() -> String {
    "{name}".to_string()
}

fn default_bracket_right() -> String {
    "]".to_string()
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            name_requirements: default_name_requirements(),
            prefix_requirements: default_prefix_requirements(),
            include_color_codes: false,
            blacklist_words: Vec::new(),
            blacklist_case_sensitive: false,
            guild_chat_format: default_guild_chat_format(),
            ally_chat_format: default_ally_chat_format(),
            spy_chat_format: default_spy_chat_format(),
            log_guild_chat: false,
            log_ally_chat: false,
            format_bracket_left: default_bracket_left(),
            format_content: default_format_content(),
            format_bracket_right: default_bracket_right(),
            format_no_guild: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSettings {
    pub vault_name: String,
    /// Number of item slots in a freshly created vault.
    pub vault_size: usize,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            vault_name: "Guild Vault".to_string(),
            vault_size: 54,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionSettings {
    /// Apply permission grants on background workers instead of the caller's thread.
    pub run_async: bool,
    pub workers: usize,
    /// Maximum queued grant/revoke jobs before callers apply them inline.
    pub queue_capacity: usize,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            run_async: false,
            workers: 2,
            queue_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("guildhall.log".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Catalog paths are resolved relative to the data directory unless absolute.
    pub fn roles_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir).join(&self.catalogs.roles_file)
    }

    pub fn tiers_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir).join(&self.catalogs.tiers_file)
    }
}
