use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::KeyCacheConfig;
use crate::crypto::kdf::VaultConfig;
use crate::errors::{PryxVaultError, Result};
use crate::storage::{default_backup_dir, MAX_BACKUPS};

/// Local configuration, loaded from `.pryx-vault.toml`.
///
/// Every field has a default, so no config file is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Vault file, relative to the config directory unless absolute.
    #[serde(default = "default_vault_file")]
    pub vault_file: String,

    /// Backup directory (default: `~/.pryx/vault-backups`).
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,

    /// Argon2 memory cost in KiB (default: 64 MiB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// Maximum lifetime of a cached key in seconds (default: 1800).
    #[serde(default = "default_cache_max_age_secs")]
    pub cache_max_age_secs: u64,

    /// Maximum idle time of a cached key in seconds (default: 300).
    #[serde(default = "default_cache_max_idle_secs")]
    pub cache_max_idle_secs: u64,

    /// Maximum number of cached keys (default: 10).
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Backups kept per vault file (default: 5).
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_file() -> String {
    "vault.json".to_string()
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MiB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

fn default_cache_max_age_secs() -> u64 {
    30 * 60
}

fn default_cache_max_idle_secs() -> u64 {
    5 * 60
}

fn default_cache_max_entries() -> usize {
    10
}

fn default_max_backups() -> usize {
    MAX_BACKUPS
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_file: default_vault_file(),
            backup_dir: None,
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            cache_max_age_secs: default_cache_max_age_secs(),
            cache_max_idle_secs: default_cache_max_idle_secs(),
            cache_max_entries: default_cache_max_entries(),
            max_backups: default_max_backups(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for.
    pub const FILE_NAME: &'static str = ".pryx-vault.toml";

    /// Load settings from `<dir>/.pryx-vault.toml`.
    ///
    /// If the file does not exist, defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            PryxVaultError::Config(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        settings.vault_config().validate().map_err(|e| {
            PryxVaultError::Config(format!("{}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Full path to the vault file.
    ///
    /// Example: `dir/vault.json`
    pub fn vault_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.vault_file)
    }

    /// Configured backup directory, or `~/.pryx/vault-backups`.
    pub fn backup_dir(&self) -> Result<PathBuf> {
        self.backup_dir
            .clone()
            .or_else(default_backup_dir)
            .ok_or_else(|| PryxVaultError::Config("cannot determine backup directory".into()))
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn vault_config(&self) -> VaultConfig {
        VaultConfig {
            time_cost: self.argon2_iterations,
            memory_cost: self.argon2_memory_kib,
            parallelism: self.argon2_parallelism,
            ..VaultConfig::default()
        }
    }

    pub fn key_cache_config(&self) -> KeyCacheConfig {
        KeyCacheConfig {
            max_age: Duration::from_secs(self.cache_max_age_secs),
            max_idle: Duration::from_secs(self.cache_max_idle_secs),
            max_entries: self.cache_max_entries,
            ..KeyCacheConfig::default()
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
