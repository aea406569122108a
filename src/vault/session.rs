//! A single unlocked key and the operations that use it.
//!
//! `Vault` starts uninitialized.  `initialize` generates a salt, derives
//! a key from the password and holds it until `clear_key` wipes it.
//! Encryption and decryption only read the key, so any number of them
//! may run concurrently through a shared reference.

use tracing::debug;

use crate::cache::KeyCache;
use crate::crypto::encryption::{decrypt, encrypt, generate_iv};
use crate::crypto::envelope::EncryptedData;
use crate::crypto::kdf::{derive_key_blocking, generate_salt, VaultConfig};
use crate::crypto::secure::{secure_compare, DerivedKey};
use crate::errors::{VaultError, VaultResult};

/// Holds at most one derived key.
pub struct Vault {
    config: VaultConfig,
    salt: Vec<u8>,
    key: Option<DerivedKey>,
}

impl Vault {
    /// Create an uninitialized vault.
    pub fn new(config: VaultConfig) -> Self {
        Self {
            config,
            salt: Vec::new(),
            key: None,
        }
    }

    /// Create a vault and initialize it with `password` in one step.
    pub async fn create(password: &[u8], config: VaultConfig) -> VaultResult<Self> {
        let mut vault = Self::new(config);
        vault.initialize(password).await?;
        Ok(vault)
    }

    /// Generate a fresh salt and derive the vault key from `password`.
    ///
    /// Any previously held key is wiped first.
    pub async fn initialize(&mut self, password: &[u8]) -> VaultResult<()> {
        self.config.validate()?;
        self.clear_key();

        let salt = generate_salt(self.config.salt_length);
        let key = derive_key_blocking(password, &salt, &self.config).await?;
        self.install(salt, key);
        Ok(())
    }

    /// Like `initialize`, but obtains the key through `cache`.
    pub async fn initialize_with_cache(
        &mut self,
        password: &[u8],
        cache: &KeyCache,
    ) -> VaultResult<()> {
        self.config.validate()?;
        self.clear_key();

        let salt = generate_salt(self.config.salt_length);
        let key = cache.get_key(password, &salt, &self.config).await?;
        self.install(salt, key);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.key.is_some()
    }

    /// Salt the current key was derived from (empty when uninitialized).
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Encrypt `plaintext` under the vault key with a fresh random IV.
    pub fn encrypt(&self, plaintext: &[u8]) -> VaultResult<EncryptedData> {
        let key = self.key()?;
        let iv = generate_iv(self.config.iv_length);
        let (ciphertext, tag) = encrypt(plaintext, key.as_bytes(), &iv)?;

        Ok(EncryptedData {
            ciphertext,
            iv,
            tag,
            salt: self.salt.clone(),
        })
    }

    /// Decrypt data previously produced by `encrypt` under this key.
    pub fn decrypt(&self, data: &EncryptedData) -> VaultResult<Vec<u8>> {
        let key = self.key()?;
        decrypt(&data.ciphertext, key.as_bytes(), &data.iv, &data.tag)
    }

    /// Constant-time check that `candidate` equals the held key.
    pub fn verify_key(&self, candidate: &DerivedKey) -> bool {
        self.key
            .as_ref()
            .is_some_and(|key| secure_compare(key.as_bytes(), candidate.as_bytes()))
    }

    /// Wipe the held key and return to the uninitialized state.
    pub fn clear_key(&mut self) {
        if let Some(mut key) = self.key.take() {
            key.wipe();
            debug!("vault key cleared");
        }
        self.salt.clear();
    }

    fn install(&mut self, salt: Vec<u8>, key: DerivedKey) {
        self.salt = salt;
        self.key = Some(key);
    }

    fn key(&self) -> VaultResult<&DerivedKey> {
        self.key.as_ref().ok_or(VaultError::NotInitialized)
    }
}

impl Drop for Vault {
    fn drop(&mut self) {
        self.clear_key();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> VaultConfig {
        VaultConfig {
            time_cost: 1,
            memory_cost: 8_192,
            parallelism: 1,
            ..VaultConfig::default()
        }
    }

    #[test]
    fn uninitialized_vault_refuses_to_encrypt() {
        let vault = Vault::new(fast_config());
        assert!(!vault.is_initialized());
        assert!(matches!(
            vault.encrypt(b"data"),
            Err(VaultError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn clear_key_returns_to_uninitialized() {
        let mut vault = Vault::create(b"password", fast_config()).await.unwrap();
        let encrypted = vault.encrypt(b"data").unwrap();
        assert_eq!(encrypted.salt, vault.salt());

        vault.clear_key();
        assert!(!vault.is_initialized());
        assert!(vault.salt().is_empty());
        assert!(matches!(
            vault.decrypt(&encrypted),
            Err(VaultError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn reinitialize_uses_a_new_salt() {
        let mut vault = Vault::create(b"password", fast_config()).await.unwrap();
        let first_salt = vault.salt().to_vec();
        vault.initialize(b"password").await.unwrap();
        assert_ne!(first_salt, vault.salt());
    }

    #[tokio::test]
    async fn initialize_with_cache_populates_cache() {
        let cache = KeyCache::default();
        let mut vault = Vault::new(fast_config());
        vault
            .initialize_with_cache(b"password", &cache)
            .await
            .unwrap();

        assert!(vault.is_initialized());
        assert!(cache.contains_salt(vault.salt()));
    }
}
