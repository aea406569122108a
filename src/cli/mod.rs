//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use serde_json::{Map, Value};
use zeroize::Zeroizing;

use crate::cache::KeyCache;
use crate::config::Settings;
use crate::errors::{PryxVaultError, Result, StorageError};
use crate::storage::{EntryType, VaultFile, VaultStorage};

/// Environment variable checked before prompting for the password.
pub const PASSWORD_ENV: &str = "PRYX_VAULT_PASSWORD";

/// pryx-vault: local password-protected secret store.
#[derive(Parser)]
#[command(
    name = "pryx-vault",
    about = "Local password-protected secret store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault file (default: vault.json next to .pryx-vault.toml)
    #[arg(long, global = true, env = "PRYX_VAULT_FILE")]
    pub vault: Option<PathBuf>,

    /// Backup directory (default: ~/.pryx/vault-backups)
    #[arg(long, global = true, env = "PRYX_VAULT_BACKUP_DIR")]
    pub backup_dir: Option<PathBuf>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new, empty vault file
    Init,

    /// Add an encrypted entry
    Add {
        /// Display name (e.g. "OpenAI")
        name: String,
        /// Entry type: credential, api-key, token or note
        #[arg(short = 't', long = "type", default_value = "note")]
        entry_type: EntryType,
        /// Entry id (default: random UUID)
        #[arg(long)]
        id: Option<String>,
        /// Payload as a JSON object (omit for an interactive prompt)
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Decrypt and print an entry's payload
    Get {
        /// Entry id
        id: String,
        /// Print only this payload field
        #[arg(short, long)]
        field: Option<String>,
    },

    /// List entries (no decryption)
    List,

    /// Rename an entry or replace its payload
    Update {
        /// Entry id
        id: String,
        /// New display name
        #[arg(short, long)]
        name: Option<String>,
        /// New payload as a JSON object
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Delete an entry
    Delete {
        /// Entry id
        id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Check the vault's structure and decrypt every entry
    Verify,

    /// Snapshot the vault file
    Backup,

    /// List snapshots of the vault file
    Backups,

    /// Replace the vault file with a snapshot
    Restore {
        /// Backup file (default: the newest one)
        backup: Option<PathBuf>,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolved settings, vault path and storage for one invocation.
pub struct Context {
    pub settings: Settings,
    pub vault_path: PathBuf,
    pub storage: VaultStorage,
}

/// Load `.pryx-vault.toml` from the working directory and apply the
/// global flags on top of it.
pub fn context(cli: &Cli) -> Result<Context> {
    let cwd = std::env::current_dir()?;
    let settings = Settings::load(&cwd)?;

    let vault_path = match &cli.vault {
        Some(path) => path.clone(),
        None => settings.vault_path(&cwd),
    };
    let backup_dir = match &cli.backup_dir {
        Some(dir) => dir.clone(),
        None => settings.backup_dir()?,
    };

    // One process runs several entry operations against the same file,
    // so derived keys are shared across them.
    let key_cache = Arc::new(KeyCache::new(settings.key_cache_config()));
    let storage = VaultStorage::new(backup_dir)
        .with_vault_config(settings.vault_config())
        .with_max_backups(settings.max_backups)
        .with_key_cache(key_cache);

    Ok(Context {
        settings,
        vault_path,
        storage,
    })
}

/// Get the vault password, trying in order:
/// 1. `PRYX_VAULT_PASSWORD` env var (CI/CD)
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env() {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter vault password")
        .interact()
        .map_err(|e| PryxVaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation (used for the first entry).
///
/// Also respects `PRYX_VAULT_PASSWORD` for scripted/CI usage.
pub fn prompt_new_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env() {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Choose vault password")
        .with_confirmation(
            "Confirm vault password",
            "Passwords do not match, try again",
        )
        .interact()
        .map_err(|e| PryxVaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// `true` if the vault file at `path` holds no entries yet.
pub fn vault_is_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Err(StorageError::FileNotFound(path.to_path_buf()).into());
    }
    let json = std::fs::read_to_string(path)?;
    Ok(VaultFile::from_json(&json)?.entries.is_empty())
}

fn password_from_env() -> Option<Zeroizing<String>> {
    std::env::var(PASSWORD_ENV)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

/// Parse a `--data` argument into a JSON object payload.
pub fn parse_payload(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(PryxVaultError::CommandFailed(
            "entry data must be a JSON object".into(),
        )),
        Err(e) => Err(PryxVaultError::CommandFailed(format!(
            "entry data is not valid JSON: {e}"
        ))),
    }
}

/// Ask for a single secret value and wrap it as `{"value": ...}`.
pub fn prompt_payload() -> Result<Map<String, Value>> {
    let value = Zeroizing::new(
        dialoguer::Password::new()
            .with_prompt("Secret value")
            .interact()
            .map_err(|e| PryxVaultError::CommandFailed(format!("value prompt: {e}")))?,
    );

    let mut map = Map::new();
    map.insert("value".to_string(), Value::String(value.to_string()));
    Ok(map)
}

/// Ask a yes/no question, defaulting to "no".
pub fn confirm(prompt: &str) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| PryxVaultError::CommandFailed(format!("confirm prompt: {e}")))
}
