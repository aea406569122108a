//! Password-based key derivation using Argon2id.
//!
//! Argon2id is a memory-hard KDF that protects against brute-force and
//! GPU-based attacks.  Its cost parameters, together with the framing
//! lengths used by AES-256-GCM, live in `VaultConfig`, which must be the
//! same for encryption and decryption of any given ciphertext.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::secure::DerivedKey;
use crate::errors::{VaultError, VaultResult};

/// Length of the derived key in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// Default salt length in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// AES-GCM nonce length in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Shortest salt we accept.
const MIN_SALT_LEN: usize = 8;

/// Key-derivation and framing parameters.
///
/// `memory_cost` is in KiB, the unit Argon2 itself uses; vault files
/// record the same number in their `memoryCost` metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Number of Argon2 passes (default: 3).
    pub time_cost: u32,
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_cost: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
    /// Derived key length in bytes.
    pub key_length: usize,
    /// Salt length in bytes.
    pub salt_length: usize,
    /// IV length in bytes.
    pub iv_length: usize,
    /// Authentication tag length in bytes.
    pub tag_length: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            time_cost: 3,
            memory_cost: 65_536,
            parallelism: 4,
            key_length: KEY_LEN,
            salt_length: SALT_LEN,
            iv_length: IV_LEN,
            tag_length: TAG_LEN,
        }
    }
}

impl VaultConfig {
    /// Reject parameter sets that are either dangerously weak or that
    /// AES-256-GCM cannot use.
    pub fn validate(&self) -> VaultResult<()> {
        if self.memory_cost < MIN_MEMORY_KIB {
            return Err(VaultError::InvalidConfig(format!(
                "Argon2 memory cost must be at least {MIN_MEMORY_KIB} KiB (got {})",
                self.memory_cost
            )));
        }
        if self.time_cost < 1 {
            return Err(VaultError::InvalidConfig(
                "Argon2 time cost must be at least 1".into(),
            ));
        }
        if self.parallelism < 1 {
            return Err(VaultError::InvalidConfig(
                "Argon2 parallelism must be at least 1".into(),
            ));
        }
        if self.key_length != KEY_LEN {
            return Err(VaultError::InvalidConfig(format!(
                "key length must be {KEY_LEN} bytes for AES-256-GCM (got {})",
                self.key_length
            )));
        }
        if self.iv_length != IV_LEN {
            return Err(VaultError::InvalidConfig(format!(
                "IV length must be {IV_LEN} bytes for AES-256-GCM (got {})",
                self.iv_length
            )));
        }
        if self.tag_length != TAG_LEN {
            return Err(VaultError::InvalidConfig(format!(
                "tag length must be {TAG_LEN} bytes (got {})",
                self.tag_length
            )));
        }
        if self.salt_length < MIN_SALT_LEN {
            return Err(VaultError::InvalidConfig(format!(
                "salt length must be at least {MIN_SALT_LEN} bytes (got {})",
                self.salt_length
            )));
        }
        Ok(())
    }
}

/// Derive a key from a password and salt using Argon2id.
///
/// The same password + salt + config will always produce the same key.
/// Running time is dominated by the configured cost, not by the
/// password contents.
pub fn derive_key(password: &[u8], salt: &[u8], config: &VaultConfig) -> VaultResult<DerivedKey> {
    config.validate()?;

    let params = Params::new(
        config.memory_cost,
        config.time_cost,
        config.parallelism,
        Some(config.key_length),
    )
    .map_err(|e| VaultError::KeyDerivation(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new(vec![0u8; config.key_length]);
    argon2
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| VaultError::KeyDerivation(format!("Argon2id hashing failed: {e}")))?;

    Ok(DerivedKey::from_slice(&key))
}

/// Run `derive_key` on the blocking thread pool.
///
/// Argon2 deliberately burns CPU and memory for the configured cost;
/// doing that inline would stall every other task on the worker.
pub async fn derive_key_blocking(
    password: &[u8],
    salt: &[u8],
    config: &VaultConfig,
) -> VaultResult<DerivedKey> {
    let password = Zeroizing::new(password.to_vec());
    let salt = salt.to_vec();
    let config = *config;

    tokio::task::spawn_blocking(move || derive_key(&password, &salt, &config))
        .await
        .map_err(|e| VaultError::KeyDerivation(format!("derivation task failed: {e}")))?
}

/// Generate `len` cryptographically random bytes for use as a salt.
pub fn generate_salt(len: usize) -> Vec<u8> {
    random_bytes(len)
}

pub(crate) fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::rng().fill_bytes(&mut buf);
    buf
}
