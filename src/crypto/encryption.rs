//! AES-256-GCM authenticated encryption with a detached tag.
//!
//! Callers supply the IV and store it alongside the ciphertext and tag.
//! An IV must never repeat under the same key; `generate_iv` draws a
//! fresh random one for every message.

use aes_gcm::aead::AeadInPlace;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce, Tag};

use super::kdf::{random_bytes, IV_LEN, KEY_LEN, TAG_LEN};
use crate::errors::{VaultError, VaultResult};

/// Encrypt `plaintext` with a 32-byte `key` and 12-byte `iv`.
///
/// Returns `(ciphertext, tag)`; the ciphertext has the same length as
/// the plaintext.
pub fn encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> VaultResult<(Vec<u8>, Vec<u8>)> {
    if key.len() != KEY_LEN {
        return Err(VaultError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        });
    }
    if iv.len() != IV_LEN {
        return Err(VaultError::InvalidIvLength {
            expected: IV_LEN,
            actual: iv.len(),
        });
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::Encryption(format!("invalid key: {e}")))?;

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(iv), b"", &mut buffer)
        .map_err(|e| VaultError::Encryption(format!("encryption error: {e}")))?;

    Ok((buffer, tag.to_vec()))
}

/// Decrypt data produced by `encrypt`.
///
/// The tag is verified before any plaintext is released.  Every failure
/// that depends on the stored data (wrong key, flipped bit, truncated
/// IV or tag) is reported as the same `VaultError::Decryption`.
pub fn decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8], tag: &[u8]) -> VaultResult<Vec<u8>> {
    if key.len() != KEY_LEN {
        return Err(VaultError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        });
    }
    if iv.len() != IV_LEN || tag.len() != TAG_LEN {
        return Err(VaultError::Decryption);
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::Decryption)?;

    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(iv),
            b"",
            &mut buffer,
            Tag::from_slice(tag),
        )
        .map_err(|_| VaultError::Decryption)?;

    Ok(buffer)
}

/// Generate a random IV of `len` bytes.
pub fn generate_iv(len: usize) -> Vec<u8> {
    random_bytes(len)
}
