//! Self-describing encrypted payloads for ad-hoc secrets.
//!
//! `EncryptedData` bundles everything needed to decrypt one message
//! except the key: ciphertext, IV, tag and the salt the key was derived
//! from.  `SerializedEncryptedData` is the same thing as base64 text,
//! suitable for config files or environment variables.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::encryption::{decrypt, encrypt, generate_iv};
use super::kdf::{derive_key_blocking, generate_salt, VaultConfig};
use crate::errors::{VaultError, VaultResult};

/// Current version of the serialized envelope.
pub const ENVELOPE_VERSION: u32 = 1;

/// The output of one authenticated encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub tag: Vec<u8>,
    /// Salt of the key that produced this ciphertext.
    pub salt: Vec<u8>,
}

/// Base64 form of `EncryptedData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedEncryptedData {
    pub version: u32,
    pub ciphertext: String,
    pub iv: String,
    pub tag: String,
    pub salt: String,
}

impl EncryptedData {
    pub fn to_serialized(&self) -> SerializedEncryptedData {
        SerializedEncryptedData {
            version: ENVELOPE_VERSION,
            ciphertext: BASE64.encode(&self.ciphertext),
            iv: BASE64.encode(&self.iv),
            tag: BASE64.encode(&self.tag),
            salt: BASE64.encode(&self.salt),
        }
    }

    pub fn from_serialized(serialized: &SerializedEncryptedData) -> VaultResult<Self> {
        if serialized.version != ENVELOPE_VERSION {
            return Err(VaultError::CorruptedData(format!(
                "unsupported envelope version {}, expected {ENVELOPE_VERSION}",
                serialized.version
            )));
        }

        let field = |name: &str, value: &str| {
            BASE64
                .decode(value)
                .map_err(|e| VaultError::CorruptedData(format!("{name} is not valid base64: {e}")))
        };

        Ok(Self {
            ciphertext: field("ciphertext", &serialized.ciphertext)?,
            iv: field("iv", &serialized.iv)?,
            tag: field("tag", &serialized.tag)?,
            salt: field("salt", &serialized.salt)?,
        })
    }
}

/// Encrypt `plaintext` under a key derived from `password` and a fresh salt.
///
/// The salt travels inside the result, so `decrypt_with_password` needs
/// nothing but the password.
pub async fn encrypt_with_password(
    plaintext: &[u8],
    password: &[u8],
    config: &VaultConfig,
) -> VaultResult<EncryptedData> {
    let salt = generate_salt(config.salt_length);
    let key = derive_key_blocking(password, &salt, config).await?;
    let iv = generate_iv(config.iv_length);
    let (ciphertext, tag) = encrypt(plaintext, key.as_bytes(), &iv)?;

    Ok(EncryptedData {
        ciphertext,
        iv,
        tag,
        salt,
    })
}

/// Decrypt data produced by `encrypt_with_password`, re-deriving the key
/// from the embedded salt.
pub async fn decrypt_with_password(
    data: &EncryptedData,
    password: &[u8],
    config: &VaultConfig,
) -> VaultResult<Vec<u8>> {
    let key = derive_key_blocking(password, &data.salt, config).await?;
    decrypt(&data.ciphertext, key.as_bytes(), &data.iv, &data.tag)
}
