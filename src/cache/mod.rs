//! In-memory cache of derived keys.
//!
//! Argon2 is expensive on purpose, so repeated operations against the
//! same password + salt reuse a cached key.  Every entry is bounded by a
//! maximum age, a maximum idle time and a capacity limit (LRU on last
//! access), and a background sweep evicts expired entries even when the
//! cache is never touched again.
//!
//! Map keys are SHA-256 fingerprints of `(password, salt)`; the raw
//! password is never stored.  Callers always receive a copy of the
//! cached key, so eviction can wipe the cached buffer without affecting
//! keys already handed out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::crypto::kdf::{derive_key_blocking, VaultConfig};
use crate::crypto::secure::DerivedKey;
use crate::errors::VaultResult;

/// Cache limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCacheConfig {
    /// Entries older than this are never reused (default: 30 min).
    pub max_age: Duration,
    /// Entries unused for this long are never reused (default: 5 min).
    pub max_idle: Duration,
    /// Maximum number of resident keys (default: 10).
    pub max_entries: usize,
    /// Period of the background sweep (default: 60 s);
    /// `Duration::ZERO` disables the sweep.
    pub cleanup_interval: Duration,
}

impl Default for KeyCacheConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(30 * 60),
            max_idle: Duration::from_secs(5 * 60),
            max_entries: 10,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// One cached key.
struct KeyCacheEntry {
    /// Wiped on drop, which happens as the entry leaves the map.
    key: DerivedKey,
    salt: Vec<u8>,
    created_at: Instant,
    last_accessed_at: Instant,
    access_count: u64,
}

impl KeyCacheEntry {
    fn is_live(&self, now: Instant, config: &KeyCacheConfig) -> bool {
        now.duration_since(self.created_at) < config.max_age
            && now.duration_since(self.last_accessed_at) < config.max_idle
    }
}

type Fingerprint = [u8; 32];

/// Observability snapshot.  Contains no key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub total_access_count: u64,
    pub oldest_entry: Option<Instant>,
    pub newest_entry: Option<Instant>,
}

/// Cache of derived keys with age, idle and capacity limits.
pub struct KeyCache {
    config: KeyCacheConfig,
    entries: Arc<Mutex<HashMap<Fingerprint, KeyCacheEntry>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl KeyCache {
    /// Create an empty cache.  The background sweep is not running until
    /// `start` is called.
    pub fn new(config: KeyCacheConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
            sweeper: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &KeyCacheConfig {
        &self.config
    }

    /// Return the key for `password` + `salt`, deriving it on a miss.
    ///
    /// A hit bumps the entry's access time and count.  The returned key
    /// is always a copy owned by the caller.
    pub async fn get_key(
        &self,
        password: &[u8],
        salt: &[u8],
        vault_config: &VaultConfig,
    ) -> VaultResult<DerivedKey> {
        let fingerprint = fingerprint(password, salt);

        if let Some(key) = self.lookup(&fingerprint) {
            debug!("key cache hit");
            return Ok(key);
        }

        debug!("key cache miss, deriving");
        let key = derive_key_blocking(password, salt, vault_config).await?;
        self.store(fingerprint, &key, salt);
        Ok(key)
    }

    /// Wipe and remove the entry for `password` + `salt`, if any.
    pub fn invalidate(&self, password: &[u8], salt: &[u8]) {
        if self.lock_entries().remove(&fingerprint(password, salt)).is_some() {
            debug!("key cache entry invalidated");
        }
    }

    /// Wipe and remove every entry.
    pub fn invalidate_all(&self) {
        let mut entries = self.lock_entries();
        if !entries.is_empty() {
            debug!(count = entries.len(), "key cache cleared");
        }
        entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.lock_entries();
        CacheStats {
            size: entries.len(),
            total_access_count: entries.values().map(|e| e.access_count).sum(),
            oldest_entry: entries.values().map(|e| e.created_at).min(),
            newest_entry: entries.values().map(|e| e.created_at).max(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Returns `true` if an entry exists for `salt`, live or not.
    pub fn contains_salt(&self, salt: &[u8]) -> bool {
        self.lock_entries().values().any(|e| e.salt == salt)
    }

    /// Run one expiration pass now.  Returns the number of evicted entries.
    pub fn sweep(&self) -> usize {
        sweep_expired(&self.entries, &self.config)
    }

    // ------------------------------------------------------------------
    // Background sweep lifecycle
    // ------------------------------------------------------------------

    /// Start the periodic sweep.  No-op if it is already running or the
    /// cleanup interval is zero.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        if self.config.cleanup_interval.is_zero() {
            debug!("key cache sweep disabled");
            return;
        }
        let mut sweeper = lock(&self.sweeper);
        if sweeper.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let entries: Weak<Mutex<HashMap<Fingerprint, KeyCacheEntry>>> =
            Arc::downgrade(&self.entries);
        let config = self.config;

        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.cleanup_interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(entries) = entries.upgrade() else {
                    break;
                };
                sweep_expired(&entries, &config);
            }
        }));
    }

    /// Stop the periodic sweep.  Cached entries are kept.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.sweeper).take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.sweeper)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Stop the sweep and wipe every entry.  Safe to call more than once.
    pub fn destroy(&self) {
        self.stop();
        self.invalidate_all();
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn lookup(&self, fingerprint: &Fingerprint) -> Option<DerivedKey> {
        let now = Instant::now();
        let mut entries = self.lock_entries();

        match entries.get_mut(fingerprint) {
            Some(entry) if entry.is_live(now, &self.config) => {
                entry.last_accessed_at = now;
                entry.access_count += 1;
                Some(entry.key.clone())
            }
            Some(_) => {
                // Expired: drop it now rather than waiting for the sweep.
                entries.remove(fingerprint);
                None
            }
            None => None,
        }
    }

    fn store(&self, fingerprint: Fingerprint, key: &DerivedKey, salt: &[u8]) {
        let now = Instant::now();
        let mut entries = self.lock_entries();

        if !entries.contains_key(&fingerprint) {
            while !entries.is_empty() && entries.len() >= self.config.max_entries {
                evict_lru(&mut entries);
            }
        }

        if self.config.max_entries == 0 {
            return;
        }

        entries.insert(
            fingerprint,
            KeyCacheEntry {
                key: key.clone(),
                salt: salt.to_vec(),
                created_at: now,
                last_accessed_at: now,
                access_count: 1,
            },
        );
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<Fingerprint, KeyCacheEntry>> {
        lock(&self.entries)
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new(KeyCacheConfig::default())
    }
}

impl Drop for KeyCache {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Cache fingerprint: SHA-256 over the length-prefixed password and the salt.
///
/// The length prefix keeps `("ab", "c")` and `("a", "bc")` apart.  This is
/// a lookup key only and never stands in for the KDF.
fn fingerprint(password: &[u8], salt: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update((password.len() as u64).to_le_bytes());
    hasher.update(password);
    hasher.update(salt);
    hasher.finalize().into()
}

fn evict_lru(entries: &mut HashMap<Fingerprint, KeyCacheEntry>) {
    let oldest = entries
        .iter()
        .min_by_key(|(_, e)| (e.last_accessed_at, e.created_at))
        .map(|(fp, _)| *fp);

    if let Some(fp) = oldest {
        entries.remove(&fp);
        debug!("key cache full, evicted least recently used entry");
    }
}

fn sweep_expired(
    entries: &Mutex<HashMap<Fingerprint, KeyCacheEntry>>,
    config: &KeyCacheConfig,
) -> usize {
    let now = Instant::now();
    let mut entries = lock(entries);
    let before = entries.len();
    entries.retain(|_, entry| entry.is_live(now, config));
    let evicted = before - entries.len();
    if evicted > 0 {
        debug!(evicted, "key cache sweep evicted expired entries");
    }
    evicted
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
