//! Caller-facing entry types: plaintext payloads in, metadata out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::format::{EntryType, VaultEntry};

/// A decrypted entry, or the input to `add_entry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryData {
    /// Generated when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub name: String,
    /// Secret payload, stored encrypted as JSON.
    pub data: Map<String, Value>,
}

impl EntryData {
    pub fn new(entry_type: EntryType, name: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: None,
            entry_type,
            name: name.into(),
            data,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Partial update for `update_entry`.  `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryUpdate {
    pub name: Option<String>,
    pub data: Option<Map<String, Value>>,
}

impl EntryUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.data.is_none()
    }
}

/// Everything about an entry except its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl From<&VaultEntry> for EntryMetadata {
    fn from(entry: &VaultEntry) -> Self {
        Self {
            id: entry.id.clone(),
            entry_type: entry.entry_type,
            name: entry.name.clone(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            access_count: entry.access_count,
            last_accessed_at: entry.last_accessed_at,
        }
    }
}
