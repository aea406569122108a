//! Timestamped snapshot copies of a vault file with retention pruning.
//!
//! Backups live in one directory and are named
//! `<file-name>.<timestamp>.backup`, e.g.
//! `vault.json.2026-01-02T03-04-05-678901Z.backup`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use crate::errors::{StorageError, StorageResult};

/// Default number of backups kept per original file.
pub const MAX_BACKUPS: usize = 5;

const BACKUP_SUFFIX: &str = ".backup";
const STAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%6fZ";

/// A backup on disk, described from filesystem metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size: u64,
}

/// Creates, lists, prunes and restores backups in one directory.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
    max_backups: usize,
}

impl BackupManager {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            max_backups: MAX_BACKUPS,
        }
    }

    /// Keep at most `max_backups` per original file.
    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Copy `file_path` into the backup directory, then prune older
    /// backups of the same file.  Returns the new backup's path.
    pub fn create_backup(&self, file_path: &Path) -> StorageResult<PathBuf> {
        let name = file_name(file_path)?;

        fs::create_dir_all(&self.backup_dir).map_err(|e| {
            StorageError::Backup(format!(
                "cannot create backup directory {}: {e}",
                self.backup_dir.display()
            ))
        })?;

        let stamp = Utc::now().format(STAMP_FORMAT);
        let backup_path = self
            .backup_dir
            .join(format!("{name}.{stamp}{BACKUP_SUFFIX}"));

        fs::copy(file_path, &backup_path).map_err(|e| {
            StorageError::Backup(format!("cannot back up {}: {e}", file_path.display()))
        })?;

        info!(backup = %backup_path.display(), "vault backup created");
        self.cleanup_old_backups(&name);
        Ok(backup_path)
    }

    /// Backups of `original_name`, newest first.  An unreadable backup
    /// directory yields an empty list.
    pub fn list_backups(&self, original_name: &str) -> Vec<BackupInfo> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.backup_dir.display(), error = %e, "backup directory not readable");
                return Vec::new();
            }
        };

        let mut backups: Vec<BackupInfo> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| is_backup_of(&entry.file_name().to_string_lossy(), original_name))
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                let modified = metadata.modified().ok()?;
                Some(BackupInfo {
                    path: entry.path(),
                    created_at: DateTime::<Utc>::from(modified),
                    size: metadata.len(),
                })
            })
            .collect();

        // Names embed the timestamp, so they break mtime ties in order.
        backups.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.path.cmp(&a.path))
        });
        backups
    }

    /// Delete all but the newest `max_backups` backups of
    /// `original_name`.  Individual failures are logged and skipped.
    pub fn cleanup_old_backups(&self, original_name: &str) {
        for stale in self
            .list_backups(original_name)
            .into_iter()
            .skip(self.max_backups)
        {
            match fs::remove_file(&stale.path) {
                Ok(()) => debug!(backup = %stale.path.display(), "old backup removed"),
                Err(e) => warn!(backup = %stale.path.display(), error = %e, "failed to remove old backup"),
            }
        }
    }

    /// Copy `backup_path` over `target_path`, creating the target's
    /// directory if needed.
    pub fn restore_backup(&self, backup_path: &Path, target_path: &Path) -> StorageResult<()> {
        if !backup_path.exists() {
            return Err(StorageError::FileNotFound(backup_path.to_path_buf()));
        }

        if let Some(parent) = target_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        fs::copy(backup_path, target_path).map_err(|e| {
            StorageError::Backup(format!("cannot restore {}: {e}", backup_path.display()))
        })?;

        info!(
            backup = %backup_path.display(),
            target = %target_path.display(),
            "vault restored from backup"
        );
        Ok(())
    }

    /// Newest backup of `original_name`, if any.
    pub fn latest_backup(&self, original_name: &str) -> Option<BackupInfo> {
        self.list_backups(original_name).into_iter().next()
    }
}

/// `true` if `candidate` is exactly `<original_name>.<timestamp>.backup`.
fn is_backup_of(candidate: &str, original_name: &str) -> bool {
    candidate
        .strip_prefix(original_name)
        .and_then(|rest| rest.strip_prefix('.'))
        .and_then(|rest| rest.strip_suffix(BACKUP_SUFFIX))
        .is_some_and(|stamp| NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).is_ok())
}

/// File name component of `path`, as used in backup names.
pub(crate) fn file_name(path: &Path) -> StorageResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| StorageError::Backup(format!("{} has no file name", path.display())))
}
