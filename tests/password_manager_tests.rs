//! Integration tests for `PasswordManager`: lock state, auto-lock and
//! password changes.

use std::sync::Arc;
use std::time::Duration;

use pryx_vault::crypto::VaultConfig;
use pryx_vault::errors::VaultError;
use pryx_vault::vault::{LockState, PasswordManager, PasswordManagerConfig};

fn config(auto_lock_ms: u64) -> PasswordManagerConfig {
    PasswordManagerConfig {
        vault: VaultConfig {
            time_cost: 1,
            memory_cost: 8_192,
            parallelism: 1,
            ..VaultConfig::default()
        },
        auto_lock: Duration::from_millis(auto_lock_ms),
        ..PasswordManagerConfig::default()
    }
}

#[tokio::test]
async fn encrypt_while_locked_fails() {
    let manager = PasswordManager::new(config(60_000));

    assert!(matches!(manager.encrypt(b"x"), Err(VaultError::Locked)));
    manager.destroy();
}

#[tokio::test]
async fn unlock_encrypt_decrypt_lock() {
    let manager = PasswordManager::new(config(60_000));
    manager.unlock(b"pw").await.unwrap();
    assert!(manager.is_unlocked());
    assert_eq!(manager.state(), LockState::Unlocked);

    let encrypted = manager.encrypt(b"secret").unwrap();
    assert_eq!(manager.decrypt(&encrypted).unwrap(), b"secret");

    manager.lock();
    assert!(!manager.is_unlocked());
    assert!(matches!(
        manager.decrypt(&encrypted),
        Err(VaultError::Locked)
    ));

    // Locking twice is fine.
    manager.lock();
    manager.destroy();
}

#[tokio::test]
async fn unlock_is_idempotent() {
    let manager = PasswordManager::new(config(60_000));
    manager.unlock(b"pw").await.unwrap();
    let encrypted = manager.encrypt(b"secret").unwrap();

    // A second unlock keeps the existing vault, even with another password.
    manager.unlock(b"other").await.unwrap();
    assert_eq!(manager.decrypt(&encrypted).unwrap(), b"secret");
    manager.destroy();
}

#[tokio::test]
async fn data_from_another_session_fails_with_decryption_error() {
    let first = PasswordManager::new(config(60_000));
    first.unlock(b"password-a").await.unwrap();
    let encrypted = first.encrypt(b"secret").unwrap();
    first.destroy();

    let second = PasswordManager::new(config(60_000));
    second.unlock(b"password-b").await.unwrap();
    assert!(matches!(
        second.decrypt(&encrypted),
        Err(VaultError::Decryption)
    ));
    second.destroy();
}

#[tokio::test(start_paused = true)]
async fn idle_manager_locks_itself() {
    let manager = PasswordManager::new(config(100));
    manager.unlock(b"pw").await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(manager.is_unlocked());
    let remaining = manager.get_remaining_lock_time().unwrap();
    assert!(remaining <= Duration::from_millis(50));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(manager.is_locked());
    assert!(manager.get_remaining_lock_time().is_none());
    assert!(manager.key_cache().is_empty());
    manager.destroy();
}

#[tokio::test(start_paused = true)]
async fn activity_postpones_auto_lock() {
    let manager = PasswordManager::new(config(200));
    manager.unlock(b"pw").await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    let encrypted = manager.encrypt(b"keep alive").unwrap();

    // 300ms after unlock, but only 150ms after the last activity.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(manager.is_unlocked());
    manager.decrypt(&encrypted).unwrap();

    tokio::time::sleep(Duration::from_millis(210)).await;
    assert!(manager.is_locked());
    manager.destroy();
}

#[tokio::test]
async fn change_password_requires_old_password() {
    let manager = PasswordManager::new(config(60_000));
    manager.unlock(b"old").await.unwrap();

    assert!(matches!(
        manager.change_password(b"wrong", b"new").await,
        Err(VaultError::InvalidPassword)
    ));
    assert!(manager.is_unlocked());
    manager.destroy();
}

#[tokio::test]
async fn change_password_replaces_key() {
    let manager = PasswordManager::new(config(60_000));
    manager.unlock(b"old").await.unwrap();
    let before = manager.encrypt(b"under old key").unwrap();

    manager.change_password(b"old", b"new").await.unwrap();
    assert!(manager.is_unlocked());
    assert!(manager.key_cache().is_empty());

    // Old ciphertexts belong to the replaced key.
    assert!(matches!(
        manager.decrypt(&before),
        Err(VaultError::Decryption)
    ));
    let after = manager.encrypt(b"under new key").unwrap();
    assert_eq!(manager.decrypt(&after).unwrap(), b"under new key");
    manager.destroy();
}

#[tokio::test]
async fn change_password_while_locked_fails() {
    let manager = PasswordManager::new(config(60_000));
    assert!(matches!(
        manager.change_password(b"a", b"b").await,
        Err(VaultError::Locked)
    ));
    manager.destroy();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lock_during_unlock_wins_and_discards_the_key() {
    let manager = Arc::new(PasswordManager::new(PasswordManagerConfig {
        vault: VaultConfig {
            time_cost: 3,
            memory_cost: 65_536,
            parallelism: 1,
            ..VaultConfig::default()
        },
        ..config(60_000)
    }));

    let unlocking = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.unlock(b"pw").await })
    };
    while manager.state() != LockState::Unlocking {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    manager.lock();

    let result = unlocking.await.unwrap();
    assert!(matches!(result, Err(VaultError::Locked)));
    assert_eq!(manager.state(), LockState::Locked);
    assert!(manager.key_cache().is_empty());
    manager.destroy();
}
