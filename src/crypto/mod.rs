//! Cryptographic primitives.
//!
//! This module provides:
//! - Argon2id password-based key derivation and `VaultConfig` (`kdf`)
//! - AES-256-GCM encryption with detached tags (`encryption`)
//! - Erasable key buffers, secure wipe and constant-time compare (`secure`)
//! - Self-describing encrypted payloads (`envelope`)

pub mod encryption;
pub mod envelope;
pub mod kdf;
pub mod secure;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, derive_key, ...};
pub use encryption::{decrypt, encrypt, generate_iv};
pub use envelope::{
    decrypt_with_password, encrypt_with_password, EncryptedData, SerializedEncryptedData,
};
pub use kdf::{derive_key, derive_key_blocking, generate_salt, VaultConfig};
pub use secure::{secure_clear, secure_compare, DerivedKey};
