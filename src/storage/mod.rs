//! Persistent multi-entry vault files.
//!
//! This module provides:
//! - The JSON file format and atomic writes (`format`)
//! - Caller-facing entry payloads and metadata (`entry`)
//! - `VaultStorage`, the load/save/entry API (`store`)
//! - `BackupManager`, timestamped snapshots with retention (`backup`)

pub mod backup;
pub mod entry;
pub mod format;
pub mod store;

// Re-export the most commonly used items.
pub use backup::{BackupInfo, BackupManager, MAX_BACKUPS};
pub use entry::{EntryData, EntryMetadata, EntryUpdate};
pub use format::{EntryType, VaultEntry, VaultFile, VaultMetadata, VAULT_FORMAT_VERSION};
pub use store::{default_backup_dir, IntegrityReport, VaultStorage};
