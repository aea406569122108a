use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the crypto core, `Vault` and `PasswordManager`.
///
/// Decryption failures are deliberately uniform: a wrong key and a
/// tampered ciphertext produce the same `Decryption` variant.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Failed to unlock vault: invalid password")]
    InvalidPassword,

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("Decryption failed: wrong password or corrupted data")]
    Decryption,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Invalid IV length: expected {expected} bytes, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },

    #[error("Invalid vault config: {0}")]
    InvalidConfig(String),

    #[error("Vault is locked. Call unlock() first.")]
    Locked,

    #[error("Vault is not initialized")]
    NotInitialized,
}

/// Convenience alias for crypto / vault results.
pub type VaultResult<T> = std::result::Result<T, VaultError>;

/// Errors raised while persisting or reading a vault file.
///
/// Unlike `VaultError`, these carry operator context (entry id, path)
/// but never the reason a decryption failed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Vault file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Vault file appears to be corrupted: {0}")]
    CorruptedVault(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Entry already exists: {0}")]
    DuplicateEntry(String),

    #[error("Migration failed from version {from} to {to}")]
    Migration { from: u64, to: u64 },

    #[error("Failed to save vault: {0}")]
    SaveFailed(String),

    #[error("Backup error: {0}")]
    Backup(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Crypto(#[from] VaultError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for storage results.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Application-level errors (configuration and the command-line front end).
#[derive(Debug, Error)]
pub enum PryxVaultError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Config file error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,
}

/// Convenience type alias for application results.
pub type Result<T> = std::result::Result<T, PryxVaultError>;
