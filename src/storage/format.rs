//! JSON vault file format and crash-safe writes.
//!
//! A vault file looks like this (version 1):
//!
//! ```text
//! {
//!   "version": 1,
//!   "createdAt": "2026-01-02T03:04:05.678Z",
//!   "updatedAt": "2026-01-02T03:04:05.678Z",
//!   "metadata": { "salt": "<base64>", "algorithm": "argon2id+aes-256-gcm",
//!                 "iterations": 3, "memoryCost": 65536 },
//!   "entries": [ { "id", "type", "name", "encryptedData", "iv", "tag",
//!                  "createdAt", "updatedAt", "accessCount", "lastAccessedAt"? } ]
//! }
//! ```
//!
//! One salt is shared by every entry.  Binary fields are base64 strings,
//! so a single damaged entry can be reported on its own instead of
//! failing the whole file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{StorageError, StorageResult};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// File format version this build reads and writes.
pub const VAULT_FORMAT_VERSION: u64 = 1;

/// Algorithm label recorded in the metadata.
pub const ALGORITHM: &str = "argon2id+aes-256-gcm";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What kind of secret an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    Credential,
    ApiKey,
    Token,
    Note,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::ApiKey => "api-key",
            Self::Token => "token",
            Self::Note => "note",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credential" => Ok(Self::Credential),
            "api-key" => Ok(Self::ApiKey),
            "token" => Ok(Self::Token),
            "note" => Ok(Self::Note),
            other => Err(format!(
                "unknown entry type '{other}' (expected credential, api-key, token or note)"
            )),
        }
    }
}

/// KDF parameters recorded when the file was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultMetadata {
    /// Base64 salt shared by every entry.
    pub salt: String,
    pub algorithm: String,
    /// Argon2 time cost.
    pub iterations: u32,
    /// Argon2 memory cost in KiB.
    pub memory_cost: u32,
}

/// One encrypted entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultEntry {
    /// Unique within the file.
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub name: String,
    /// Base64 ciphertext of the JSON-encoded payload.
    pub encrypted_data: String,
    /// Base64 IV used for this entry only.
    pub iv: String,
    /// Base64 authentication tag.
    pub tag: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    pub access_count: u64,
    #[serde(
        default,
        with = "optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_accessed_at: Option<DateTime<Utc>>,
}

/// The whole persisted vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultFile {
    pub version: u64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    pub metadata: VaultMetadata,
    pub entries: Vec<VaultEntry>,
}

impl VaultFile {
    /// Parse and structurally validate vault JSON.
    ///
    /// No password is involved: entries are not decrypted here.
    pub fn from_json(json: &str) -> StorageResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|_| StorageError::CorruptedVault("Invalid JSON format".into()))?;

        validate_structure(&value)?;

        serde_json::from_value(value).map_err(|e| StorageError::CorruptedVault(e.to_string()))
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> StorageResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StorageError::Serialization(format!("vault: {e}")))
    }

    pub fn entry(&self, id: &str) -> Option<&VaultEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entry_mut(&mut self, id: &str) -> Option<&mut VaultEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    pub fn contains_entry(&self, id: &str) -> bool {
        self.entry(id).is_some()
    }
}

/// Check the shape of the top-level object before typed deserialization,
/// so the error names the field that is wrong.
fn validate_structure(value: &Value) -> StorageResult<()> {
    let Some(object) = value.as_object() else {
        return Err(StorageError::CorruptedVault("Vault is not an object".into()));
    };

    if !object.get("version").is_some_and(Value::is_number) {
        return Err(StorageError::CorruptedVault(
            "Missing or invalid version".into(),
        ));
    }
    if !object.get("createdAt").is_some_and(Value::is_string) {
        return Err(StorageError::CorruptedVault(
            "Missing or invalid createdAt".into(),
        ));
    }
    if !object.get("updatedAt").is_some_and(Value::is_string) {
        return Err(StorageError::CorruptedVault(
            "Missing or invalid updatedAt".into(),
        ));
    }
    if !object.get("metadata").is_some_and(Value::is_object) {
        return Err(StorageError::CorruptedVault(
            "Missing or invalid metadata".into(),
        ));
    }
    if !object.get("entries").is_some_and(Value::is_array) {
        return Err(StorageError::CorruptedVault(
            "Missing or invalid entries array".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Atomic write
// ---------------------------------------------------------------------------

/// Write `contents` to `path` **atomically**.
///
/// 1. Write to a uniquely named temp file in the same directory.
/// 2. Flush it to disk.
/// 3. Rename it over the target path.
///
/// The rename ensures readers never see a half-written file.  If any
/// step fails the temp file is removed and the target is untouched.
pub fn write_atomic(path: &Path, contents: &[u8]) -> StorageResult<()> {
    let tmp_path = write_temp(path, contents)?;

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(StorageError::SaveFailed(e.to_string()));
    }

    Ok(())
}

/// First half of `write_atomic`: produce a fully written temp file next
/// to `path` and return its location.
pub(crate) fn write_temp(path: &Path, contents: &[u8]) -> StorageResult<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| StorageError::SaveFailed(e.to_string()))?;

    let tmp_path = parent.join(format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        Uuid::new_v4().simple()
    ));

    let written = open_owner_only(&tmp_path).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(StorageError::SaveFailed(e.to_string()));
    }

    Ok(tmp_path)
}

/// Create a new file readable and writable by the owner only.
fn open_owner_only(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path)
}

// ---------------------------------------------------------------------------
// Serde helpers for ISO-8601 timestamps (millisecond precision, `Z` suffix)
// ---------------------------------------------------------------------------

pub(crate) mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

pub(crate) mod optional_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => super::timestamp::serialize(dt, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}
