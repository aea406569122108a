//! Multi-entry vault files: load, save and per-entry encryption.
//!
//! `VaultStorage` is stateless with respect to any particular file: every
//! entry operation takes the in-memory `VaultFile` plus the password and
//! derives the file key from the salt stored in the file's metadata.  A
//! shared `KeyCache` can be plugged in to avoid re-running Argon2 on
//! every call.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::cache::KeyCache;
use crate::crypto::encryption::{decrypt, encrypt, generate_iv};
use crate::crypto::kdf::{derive_key_blocking, generate_salt, VaultConfig};
use crate::crypto::secure::DerivedKey;
use crate::errors::{StorageError, StorageResult};

use super::backup::{file_name, BackupInfo, BackupManager};
use super::entry::{EntryData, EntryMetadata, EntryUpdate};
use super::format::{
    write_atomic, VaultEntry, VaultFile, VaultMetadata, ALGORITHM, VAULT_FORMAT_VERSION,
};

/// Result of `verify_integrity`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub valid: bool,
    /// Human-readable problems, one per line.
    pub errors: Vec<String>,
    pub entry_count: usize,
    /// Ids of entries that failed to decrypt.
    pub corrupted_entries: Vec<String>,
}

/// Reads, writes and edits vault files.
pub struct VaultStorage {
    backups: BackupManager,
    vault_config: VaultConfig,
    key_cache: Option<Arc<KeyCache>>,
    backup_on_save: bool,
}

impl VaultStorage {
    /// Storage that keeps backups in `backup_dir`.
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backups: BackupManager::new(backup_dir),
            vault_config: VaultConfig::default(),
            key_cache: None,
            backup_on_save: true,
        }
    }

    /// Storage with backups under `~/.pryx/vault-backups`.
    pub fn with_default_backup_dir() -> StorageResult<Self> {
        let dir = default_backup_dir().ok_or_else(|| {
            StorageError::Backup("cannot determine home directory for backups".into())
        })?;
        Ok(Self::new(dir))
    }

    /// KDF parameters for newly created files.  Existing files always use
    /// the iterations and memory cost recorded in their metadata.
    pub fn with_vault_config(mut self, config: VaultConfig) -> Self {
        self.vault_config = config;
        self
    }

    /// Reuse derived keys through `cache` instead of re-deriving on
    /// every entry operation.
    pub fn with_key_cache(mut self, cache: Arc<KeyCache>) -> Self {
        self.key_cache = Some(cache);
        self
    }

    /// Whether `save` and `restore_from_backup` snapshot the target
    /// file before replacing it (default: on).
    pub fn with_backup_on_save(mut self, enabled: bool) -> Self {
        self.backup_on_save = enabled;
        self
    }

    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.backups = self.backups.with_max_backups(max_backups);
        self
    }

    pub fn backup_manager(&self) -> &BackupManager {
        &self.backups
    }

    pub fn vault_config(&self) -> &VaultConfig {
        &self.vault_config
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// A new, empty vault with a fresh salt.  Nothing is written to disk.
    pub fn create_empty_vault(&self) -> VaultFile {
        let now = Utc::now();
        VaultFile {
            version: VAULT_FORMAT_VERSION,
            created_at: now,
            updated_at: now,
            metadata: VaultMetadata {
                salt: BASE64.encode(generate_salt(self.vault_config.salt_length)),
                algorithm: ALGORITHM.to_string(),
                iterations: self.vault_config.time_cost,
                memory_cost: self.vault_config.memory_cost,
            },
            entries: Vec::new(),
        }
    }

    /// Read and validate the vault at `path`.
    ///
    /// The file must parse, have the expected shape and version, and at
    /// least one of its entries (if it has any) must decrypt under
    /// `password`.  Individually damaged entries do not fail the load;
    /// they show up in `verify_integrity` and in `get_entry`.
    pub async fn load(&self, path: &Path, password: &[u8]) -> StorageResult<VaultFile> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let vault = VaultFile::from_json(&json)?;

        if vault.version != VAULT_FORMAT_VERSION {
            return Err(StorageError::Migration {
                from: vault.version,
                to: VAULT_FORMAT_VERSION,
            });
        }

        let report = self.verify_integrity(&vault, Some(password)).await;
        let all_entries_failed =
            report.entry_count > 0 && report.corrupted_entries.len() == report.entry_count;
        let structural: Vec<&String> = report
            .errors
            .iter()
            .filter(|e| !e.starts_with("Entry "))
            .collect();

        if all_entries_failed || !structural.is_empty() {
            let detail = if structural.is_empty() {
                format!(
                    "no entry could be decrypted (wrong password?): {}",
                    report.corrupted_entries.join(", ")
                )
            } else {
                structural
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            return Err(StorageError::CorruptedVault(detail));
        }

        if !report.corrupted_entries.is_empty() {
            warn!(
                entries = %report.corrupted_entries.join(", "),
                "vault loaded with corrupted entries"
            );
        }

        debug!(path = %path.display(), entries = vault.entries.len(), "vault loaded");
        Ok(vault)
    }

    /// Write `vault` to `path` atomically, stamping `updated_at`.
    ///
    /// An existing file at `path` is backed up first unless backups on
    /// save are disabled.
    pub fn save(&self, path: &Path, vault: &mut VaultFile) -> StorageResult<()> {
        vault.updated_at = Utc::now();

        if self.backup_on_save && path.exists() {
            self.backups.create_backup(path)?;
        }

        let json = vault.to_json()?;
        write_atomic(path, json.as_bytes())?;

        info!(path = %path.display(), entries = vault.entries.len(), "vault saved");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------

    /// Encrypt `data` and append it as a new entry.
    ///
    /// A caller-supplied id must be unique; otherwise a UUID is generated.
    pub async fn add_entry(
        &self,
        vault: &mut VaultFile,
        data: EntryData,
        password: &[u8],
    ) -> StorageResult<VaultEntry> {
        let id = match data.id {
            Some(id) if vault.contains_entry(&id) => {
                return Err(StorageError::DuplicateEntry(id));
            }
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        let key = self.file_key(vault, password).await?;
        let sealed = seal_payload(&data.data, &key, self.vault_config.iv_length)?;

        let now = Utc::now();
        let entry = VaultEntry {
            id,
            entry_type: data.entry_type,
            name: data.name,
            encrypted_data: sealed.ciphertext,
            iv: sealed.iv,
            tag: sealed.tag,
            created_at: now,
            updated_at: now,
            access_count: 0,
            last_accessed_at: None,
        };

        vault.entries.push(entry.clone());
        debug!(id = %entry.id, entry_type = %entry.entry_type, "entry added");
        Ok(entry)
    }

    /// Apply `updates` to entry `id`.  A new payload is encrypted under a
    /// fresh IV.  `updated_at` is always bumped.
    pub async fn update_entry(
        &self,
        vault: &mut VaultFile,
        id: &str,
        updates: EntryUpdate,
        password: &[u8],
    ) -> StorageResult<()> {
        if !vault.contains_entry(id) {
            return Err(StorageError::EntryNotFound(id.to_string()));
        }

        let sealed = match &updates.data {
            Some(data) => {
                let key = self.file_key(vault, password).await?;
                Some(seal_payload(data, &key, self.vault_config.iv_length)?)
            }
            None => None,
        };

        let entry = vault
            .entry_mut(id)
            .ok_or_else(|| StorageError::EntryNotFound(id.to_string()))?;

        if let Some(name) = updates.name {
            entry.name = name;
        }
        if let Some(sealed) = sealed {
            entry.encrypted_data = sealed.ciphertext;
            entry.iv = sealed.iv;
            entry.tag = sealed.tag;
        }
        entry.updated_at = Utc::now();

        debug!(id, "entry updated");
        Ok(())
    }

    /// Remove entry `id`.
    pub fn delete_entry(&self, vault: &mut VaultFile, id: &str) -> StorageResult<()> {
        let position = vault
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| StorageError::EntryNotFound(id.to_string()))?;

        vault.entries.remove(position);
        debug!(id, "entry deleted");
        Ok(())
    }

    /// Decrypt entry `id`, bumping its access count and last-access time
    /// in memory.  Save the vault to persist the bump.
    ///
    /// Any decryption failure is reported as `CorruptedVault` naming the
    /// entry, without saying why it failed.
    pub async fn get_entry(
        &self,
        vault: &mut VaultFile,
        id: &str,
        password: &[u8],
    ) -> StorageResult<EntryData> {
        let entry = vault
            .entry(id)
            .ok_or_else(|| StorageError::EntryNotFound(id.to_string()))?;

        let key = self
            .file_key(vault, password)
            .await
            .map_err(|_| entry_corrupted(id))?;
        let data = open_payload(entry, &key).ok_or_else(|| entry_corrupted(id))?;

        let result = EntryData {
            id: Some(entry.id.clone()),
            entry_type: entry.entry_type,
            name: entry.name.clone(),
            data,
        };

        if let Some(entry) = vault.entry_mut(id) {
            entry.access_count += 1;
            entry.last_accessed_at = Some(Utc::now());
        }
        Ok(result)
    }

    /// Metadata of every entry, in file order.  Nothing is decrypted.
    pub fn list_entries(&self, vault: &VaultFile) -> Vec<EntryMetadata> {
        vault.entries.iter().map(EntryMetadata::from).collect()
    }

    /// Check version and metadata, and with a password, try to decrypt
    /// every entry.
    pub async fn verify_integrity(
        &self,
        vault: &VaultFile,
        password: Option<&[u8]>,
    ) -> IntegrityReport {
        let mut report = IntegrityReport {
            entry_count: vault.entries.len(),
            ..IntegrityReport::default()
        };

        if vault.version != VAULT_FORMAT_VERSION {
            report.errors.push(format!(
                "Unsupported vault version: {}. Expected: {}",
                vault.version, VAULT_FORMAT_VERSION
            ));
        }

        let metadata_ok = !vault.metadata.algorithm.is_empty()
            && vault.metadata.iterations > 0
            && decode_salt(vault).is_ok();
        if !metadata_ok {
            report
                .errors
                .push("Missing or invalid vault metadata".to_string());
        }

        if let (Some(password), true) = (password, metadata_ok) {
            match self.file_key(vault, password).await {
                Ok(key) => {
                    for entry in &vault.entries {
                        if open_payload(entry, &key).is_none() {
                            report.corrupted_entries.push(entry.id.clone());
                            report
                                .errors
                                .push(format!("Entry {} failed to decrypt", entry.id));
                        }
                    }
                }
                Err(e) => report.errors.push(format!("Key derivation failed: {e}")),
            }
        }

        report.valid = report.errors.is_empty();
        report
    }

    // ------------------------------------------------------------------
    // Backups
    // ------------------------------------------------------------------

    /// Snapshot the file at `path`.
    pub fn create_backup(&self, path: &Path) -> StorageResult<PathBuf> {
        if !path.exists() {
            return Err(StorageError::FileNotFound(path.to_path_buf()));
        }
        self.backups.create_backup(path)
    }

    /// Backups of the file at `path`, newest first.
    pub fn list_backups(&self, path: &Path) -> StorageResult<Vec<BackupInfo>> {
        Ok(self.backups.list_backups(&file_name(path)?))
    }

    /// Replace `target_path` with the backup at `backup_path`.
    ///
    /// The backup must be a structurally valid vault.  The current target,
    /// if present, is backed up first unless backups on save are disabled.
    pub fn restore_from_backup(
        &self,
        backup_path: &Path,
        target_path: &Path,
    ) -> StorageResult<VaultFile> {
        let json = match fs::read_to_string(backup_path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::FileNotFound(backup_path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let vault = VaultFile::from_json(&json)?;

        if self.backup_on_save && target_path.exists() {
            self.backups.create_backup(target_path)?;
        }
        self.backups.restore_backup(backup_path, target_path)?;
        Ok(vault)
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    /// KDF parameters recorded in `vault`, with our parallelism.
    fn file_config(&self, vault: &VaultFile, salt_len: usize) -> VaultConfig {
        VaultConfig {
            time_cost: vault.metadata.iterations,
            memory_cost: vault.metadata.memory_cost,
            salt_length: salt_len,
            ..self.vault_config
        }
    }

    async fn file_key(&self, vault: &VaultFile, password: &[u8]) -> StorageResult<DerivedKey> {
        let salt = decode_salt(vault)?;
        let config = self.file_config(vault, salt.len());

        let key = match &self.key_cache {
            Some(cache) => cache.get_key(password, &salt, &config).await?,
            None => derive_key_blocking(password, &salt, &config).await?,
        };
        Ok(key)
    }
}

/// `~/.pryx/vault-backups`, if a home directory is known.
pub fn default_backup_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pryx").join("vault-backups"))
}

/// Base64 ciphertext, IV and tag of one entry payload.
struct SealedPayload {
    ciphertext: String,
    iv: String,
    tag: String,
}

fn seal_payload(
    data: &Map<String, Value>,
    key: &DerivedKey,
    iv_len: usize,
) -> StorageResult<SealedPayload> {
    let plaintext = Zeroizing::new(
        serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?,
    );
    let iv = generate_iv(iv_len);
    let (ciphertext, tag) = encrypt(&plaintext, key.as_bytes(), &iv)?;

    Ok(SealedPayload {
        ciphertext: BASE64.encode(ciphertext),
        iv: BASE64.encode(iv),
        tag: BASE64.encode(tag),
    })
}

/// Decrypt and parse one entry payload.  `None` on any failure.
fn open_payload(entry: &VaultEntry, key: &DerivedKey) -> Option<Map<String, Value>> {
    let ciphertext = BASE64.decode(&entry.encrypted_data).ok()?;
    let iv = BASE64.decode(&entry.iv).ok()?;
    let tag = BASE64.decode(&entry.tag).ok()?;

    let plaintext = Zeroizing::new(decrypt(&ciphertext, key.as_bytes(), &iv, &tag).ok()?);
    serde_json::from_slice(&plaintext).ok()
}

fn decode_salt(vault: &VaultFile) -> StorageResult<Vec<u8>> {
    match BASE64.decode(&vault.metadata.salt) {
        Ok(salt) if !salt.is_empty() => Ok(salt),
        _ => Err(StorageError::CorruptedVault(
            "Missing or invalid vault metadata".into(),
        )),
    }
}

fn entry_corrupted(id: &str) -> StorageError {
    StorageError::CorruptedVault(format!("failed to decrypt entry {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::format::EntryType;
    use serde_json::json;
    use tempfile::TempDir;

    const PASSWORD: &[u8] = b"correct horse battery staple";

    fn fast_storage(dir: &TempDir) -> VaultStorage {
        VaultStorage::new(dir.path().join("backups")).with_vault_config(VaultConfig {
            time_cost: 1,
            memory_cost: 8_192,
            parallelism: 1,
            ..VaultConfig::default()
        })
    }

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_vault_records_kdf_parameters() {
        let dir = TempDir::new().unwrap();
        let storage = fast_storage(&dir);
        let vault = storage.create_empty_vault();

        assert_eq!(vault.version, VAULT_FORMAT_VERSION);
        assert_eq!(vault.metadata.algorithm, ALGORITHM);
        assert_eq!(vault.metadata.iterations, 1);
        assert_eq!(vault.metadata.memory_cost, 8_192);
        assert_eq!(BASE64.decode(&vault.metadata.salt).unwrap().len(), 32);
        assert!(vault.entries.is_empty());
    }

    #[tokio::test]
    async fn add_entry_generates_uuid_and_zero_access_count() {
        let dir = TempDir::new().unwrap();
        let storage = fast_storage(&dir);
        let mut vault = storage.create_empty_vault();

        let entry = storage
            .add_entry(
                &mut vault,
                EntryData::new(EntryType::ApiKey, "OpenAI", payload(json!({"key": "sk"}))),
                PASSWORD,
            )
            .await
            .unwrap();

        assert!(Uuid::parse_str(&entry.id).is_ok());
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.created_at, entry.updated_at);
        assert!(!entry.encrypted_data.contains("sk"));
    }

    #[tokio::test]
    async fn update_data_changes_iv_and_bumps_updated_at() {
        let dir = TempDir::new().unwrap();
        let storage = fast_storage(&dir);
        let mut vault = storage.create_empty_vault();
        let entry = storage
            .add_entry(
                &mut vault,
                EntryData::new(EntryType::Token, "t", payload(json!({"v": 1}))),
                PASSWORD,
            )
            .await
            .unwrap();

        storage
            .update_entry(
                &mut vault,
                &entry.id,
                EntryUpdate {
                    data: Some(payload(json!({"v": 2}))),
                    ..Default::default()
                },
                PASSWORD,
            )
            .await
            .unwrap();

        let updated = vault.entry(&entry.id).unwrap().clone();
        assert_ne!(updated.iv, entry.iv);
        assert!(updated.updated_at >= entry.updated_at);
        assert_eq!(updated.name, "t");

        let data = storage
            .get_entry(&mut vault, &entry.id, PASSWORD)
            .await
            .unwrap();
        assert_eq!(data.data["v"], 2);
    }

    #[tokio::test]
    async fn rename_only_keeps_ciphertext() {
        let dir = TempDir::new().unwrap();
        let storage = fast_storage(&dir);
        let mut vault = storage.create_empty_vault();
        let entry = storage
            .add_entry(
                &mut vault,
                EntryData::new(EntryType::Note, "old", payload(json!({"x": 1}))),
                PASSWORD,
            )
            .await
            .unwrap();

        // No payload means no key derivation, so any password works.
        storage
            .update_entry(
                &mut vault,
                &entry.id,
                EntryUpdate {
                    name: Some("new".into()),
                    ..Default::default()
                },
                b"unused",
            )
            .await
            .unwrap();

        let updated = vault.entry(&entry.id).unwrap();
        assert_eq!(updated.name, "new");
        assert_eq!(updated.encrypted_data, entry.encrypted_data);
        assert_eq!(updated.iv, entry.iv);
    }

    #[tokio::test]
    async fn wrong_password_is_entry_scoped_corruption() {
        let dir = TempDir::new().unwrap();
        let storage = fast_storage(&dir);
        let mut vault = storage.create_empty_vault();
        let entry = storage
            .add_entry(
                &mut vault,
                EntryData::new(EntryType::Note, "n", payload(json!({"x": 1}))),
                PASSWORD,
            )
            .await
            .unwrap();

        let err = storage
            .get_entry(&mut vault, &entry.id, b"wrong")
            .await
            .unwrap_err();
        match err {
            StorageError::CorruptedVault(msg) => assert!(msg.contains(&entry.id)),
            other => panic!("expected CorruptedVault, got {other:?}"),
        }
        assert_eq!(vault.entry(&entry.id).unwrap().access_count, 0);
    }

    #[tokio::test]
    async fn verify_reports_metadata_and_version_without_password() {
        let dir = TempDir::new().unwrap();
        let storage = fast_storage(&dir);
        let mut vault = storage.create_empty_vault();
        vault.version = 2;
        vault.metadata.salt = String::new();

        let report = storage.verify_integrity(&vault, None).await;
        assert!(!report.valid);
        assert!(report
            .errors
            .contains(&"Unsupported vault version: 2. Expected: 1".to_string()));
        assert!(report
            .errors
            .contains(&"Missing or invalid vault metadata".to_string()));
    }

    #[tokio::test]
    async fn shared_key_cache_derives_once() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(KeyCache::default());
        let storage = fast_storage(&dir).with_key_cache(Arc::clone(&cache));
        let mut vault = storage.create_empty_vault();

        for name in ["a", "b", "c"] {
            storage
                .add_entry(
                    &mut vault,
                    EntryData::new(EntryType::Note, name, Map::new()),
                    PASSWORD,
                )
                .await
                .unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.total_access_count, 3);
    }

    #[tokio::test]
    async fn save_backs_up_existing_file() {
        let dir = TempDir::new().unwrap();
        let storage = fast_storage(&dir);
        let path = dir.path().join("vault.json");
        let mut vault = storage.create_empty_vault();

        storage.save(&path, &mut vault).unwrap();
        assert!(storage.list_backups(&path).unwrap().is_empty());

        storage.save(&path, &mut vault).unwrap();
        assert_eq!(storage.list_backups(&path).unwrap().len(), 1);

        let quiet = fast_storage(&dir).with_backup_on_save(false);
        quiet.save(&path, &mut vault).unwrap();
        assert_eq!(storage.list_backups(&path).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_backup_of_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = fast_storage(&dir);
        assert!(matches!(
            storage.create_backup(&dir.path().join("missing.json")),
            Err(StorageError::FileNotFound(_))
        ));
    }
}
