//! Lock/unlock façade over `Vault` and `KeyCache`.
//!
//! `PasswordManager` is the entry point for ad-hoc secret encryption.
//! It moves through `Locked -> Unlocking -> Unlocked -> Locked`; every
//! successful `encrypt`/`decrypt` pushes the auto-lock deadline back, and
//! reaching the deadline locks the manager, wiping the vault key and the
//! key cache.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use super::session::Vault;
use super::timer::AutoLockTimer;
use crate::cache::{KeyCache, KeyCacheConfig};
use crate::crypto::envelope::EncryptedData;
use crate::crypto::kdf::{derive_key_blocking, VaultConfig};
use crate::errors::{VaultError, VaultResult};

/// Default idle time before an automatic lock (5 minutes).
pub const DEFAULT_AUTO_LOCK: Duration = Duration::from_secs(5 * 60);

/// `PasswordManager` settings.  Override individual fields with
/// struct-update syntax: `PasswordManagerConfig { auto_lock, ..Default::default() }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordManagerConfig {
    pub vault: VaultConfig,
    pub cache: KeyCacheConfig,
    /// Idle time before an automatic lock; `Duration::ZERO` disables it.
    pub auto_lock: Duration,
}

impl Default for PasswordManagerConfig {
    fn default() -> Self {
        Self {
            vault: VaultConfig::default(),
            cache: KeyCacheConfig::default(),
            auto_lock: DEFAULT_AUTO_LOCK,
        }
    }
}

/// Observable lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocking,
    Unlocked,
}

enum Phase {
    Locked,
    Unlocking,
    Unlocked(Vault),
}

struct ManagerState {
    phase: Phase,
    /// Bumped on every lock so in-flight unlocks can detect they lost.
    epoch: u64,
}

struct Inner {
    config: PasswordManagerConfig,
    key_cache: KeyCache,
    state: Mutex<ManagerState>,
    timer: AutoLockTimer,
}

/// Lock/unlock state machine with idle auto-lock.
///
/// Must be created and used from within a Tokio runtime: the key cache
/// sweep and the auto-lock deadline run as Tokio tasks.
pub struct PasswordManager {
    inner: Arc<Inner>,
}

impl PasswordManager {
    /// Create a locked manager and start its key cache sweep.
    pub fn new(config: PasswordManagerConfig) -> Self {
        let key_cache = KeyCache::new(config.cache);
        key_cache.start();

        Self {
            inner: Arc::new(Inner {
                config,
                key_cache,
                state: Mutex::new(ManagerState {
                    phase: Phase::Locked,
                    epoch: 0,
                }),
                timer: AutoLockTimer::new(),
            }),
        }
    }

    /// Derive the vault key from `password` and unlock.
    ///
    /// Does nothing if already unlocked (the auto-lock deadline is left
    /// alone).  Any derivation failure is reported as `InvalidPassword`.
    /// If `lock` is called while the key is still being derived, the
    /// lock wins and this returns `Locked`.
    pub async fn unlock(&self, password: &[u8]) -> VaultResult<()> {
        let epoch = {
            let mut state = self.inner.lock_state();
            if matches!(state.phase, Phase::Unlocked(_)) {
                return Ok(());
            }
            state.phase = Phase::Unlocking;
            state.epoch
        };
        let pending = PendingUnlock {
            inner: &self.inner,
            epoch,
            settled: false,
        };

        let mut vault = Vault::new(self.inner.config.vault);
        let derived = vault
            .initialize_with_cache(password, &self.inner.key_cache)
            .await;
        pending.settle();

        let mut state = self.inner.lock_state();
        let superseded = state.epoch != epoch || matches!(state.phase, Phase::Unlocked(_));
        if superseded && derived.is_ok() {
            // The cache stored this key after any lock had emptied it.
            self.inner.key_cache.invalidate(password, vault.salt());
        }
        if state.epoch != epoch {
            return Err(VaultError::Locked);
        }
        if matches!(state.phase, Phase::Unlocked(_)) {
            // A concurrent unlock finished first.
            return Ok(());
        }
        if derived.is_err() {
            state.phase = Phase::Locked;
            return Err(VaultError::InvalidPassword);
        }

        state.phase = Phase::Unlocked(vault);
        Inner::arm_auto_lock(&self.inner);
        info!("vault unlocked");
        Ok(())
    }

    /// Wipe the vault key and the key cache and cancel the auto-lock
    /// deadline.  Safe to call in any state.
    pub fn lock(&self) {
        let mut state = self.inner.lock_state();
        self.inner.lock_with(&mut state);
    }

    /// Encrypt `plaintext` with the unlocked vault and reset the
    /// auto-lock deadline.
    pub fn encrypt(&self, plaintext: &[u8]) -> VaultResult<EncryptedData> {
        let state = self.inner.lock_state();
        let Phase::Unlocked(vault) = &state.phase else {
            return Err(VaultError::Locked);
        };
        Inner::arm_auto_lock(&self.inner);
        vault.encrypt(plaintext)
    }

    /// Decrypt `encrypted` with the unlocked vault and reset the
    /// auto-lock deadline.
    pub fn decrypt(&self, encrypted: &EncryptedData) -> VaultResult<Vec<u8>> {
        let state = self.inner.lock_state();
        let Phase::Unlocked(vault) = &state.phase else {
            return Err(VaultError::Locked);
        };
        Inner::arm_auto_lock(&self.inner);
        vault.decrypt(encrypted)
    }

    /// Replace the vault with one derived from `new_password`.
    ///
    /// `old_password` must re-derive the current key, otherwise this
    /// fails with `InvalidPassword`.  The key cache is emptied and the
    /// auto-lock deadline reset.
    pub async fn change_password(
        &self,
        old_password: &[u8],
        new_password: &[u8],
    ) -> VaultResult<()> {
        let (epoch, salt) = {
            let state = self.inner.lock_state();
            let Phase::Unlocked(vault) = &state.phase else {
                return Err(VaultError::Locked);
            };
            (state.epoch, vault.salt().to_vec())
        };

        let old_key = derive_key_blocking(old_password, &salt, &self.inner.config.vault)
            .await
            .map_err(|_| VaultError::InvalidPassword)?;

        {
            let state = self.inner.lock_state();
            match &state.phase {
                Phase::Unlocked(vault) if state.epoch == epoch => {
                    if !vault.verify_key(&old_key) {
                        return Err(VaultError::InvalidPassword);
                    }
                }
                _ => return Err(VaultError::Locked),
            }
        }

        let mut new_vault = Vault::new(self.inner.config.vault);
        new_vault
            .initialize_with_cache(new_password, &self.inner.key_cache)
            .await
            .map_err(|e| VaultError::KeyDerivation(format!("failed to change password: {e}")))?;

        let mut state = self.inner.lock_state();
        if state.epoch != epoch || !matches!(state.phase, Phase::Unlocked(_)) {
            return Err(VaultError::Locked);
        }
        // The replaced vault wipes its key on drop.
        state.phase = Phase::Unlocked(new_vault);
        self.inner.key_cache.invalidate_all();
        Inner::arm_auto_lock(&self.inner);
        info!("vault password changed");
        Ok(())
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self.inner.lock_state().phase, Phase::Unlocked(_))
    }

    pub fn is_locked(&self) -> bool {
        !self.is_unlocked()
    }

    pub fn state(&self) -> LockState {
        match self.inner.lock_state().phase {
            Phase::Locked => LockState::Locked,
            Phase::Unlocking => LockState::Unlocking,
            Phase::Unlocked(_) => LockState::Unlocked,
        }
    }

    /// Time left before the automatic lock; `None` when locked or when
    /// auto-lock is disabled.
    pub fn get_remaining_lock_time(&self) -> Option<Duration> {
        let state = self.inner.lock_state();
        match state.phase {
            Phase::Unlocked(_) => self.inner.timer.remaining(),
            _ => None,
        }
    }

    pub fn config(&self) -> &PasswordManagerConfig {
        &self.inner.config
    }

    pub fn key_cache(&self) -> &KeyCache {
        &self.inner.key_cache
    }

    /// Lock and release the key cache.  Call once at end of life.
    pub fn destroy(&self) {
        self.lock();
        self.inner.key_cache.destroy();
    }
}

impl Default for PasswordManager {
    fn default() -> Self {
        Self::new(PasswordManagerConfig::default())
    }
}

/// Resets `Unlocking` to `Locked` when an `unlock` future is dropped
/// before its key derivation completes.
struct PendingUnlock<'a> {
    inner: &'a Inner,
    epoch: u64,
    settled: bool,
}

impl PendingUnlock<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PendingUnlock<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.inner.lock_state();
        if state.epoch == self.epoch && matches!(state.phase, Phase::Unlocking) {
            state.phase = Phase::Locked;
            debug!("unlock abandoned before key derivation finished");
        }
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Caller holds the state lock.
    fn lock_with(&self, state: &mut ManagerState) {
        if let Phase::Unlocked(mut vault) = std::mem::replace(&mut state.phase, Phase::Locked) {
            vault.clear_key();
            info!("vault locked");
        }
        state.epoch = state.epoch.wrapping_add(1);
        self.key_cache.invalidate_all();
        self.timer.cancel();
    }

    /// Caller holds the state lock, which the expiry callback also takes
    /// before checking that its deadline is still current.
    fn arm_auto_lock(this: &Arc<Self>) {
        let after = this.config.auto_lock;
        if after.is_zero() {
            return;
        }

        let weak = Arc::downgrade(this);
        this.timer.arm(after, move |generation| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut state = inner.lock_state();
            if inner.timer.is_current(generation) {
                debug!("auto-lock deadline reached");
                inner.lock_with(&mut state);
            }
        });
    }
}
