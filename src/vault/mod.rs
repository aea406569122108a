//! Vault module: in-memory key lifecycle.
//!
//! This module provides:
//! - `Vault`, the holder of one derived key (`session`)
//! - `PasswordManager`, the lock/unlock façade with idle auto-lock (`manager`)

pub mod manager;
pub mod session;
mod timer;

// Re-export the most commonly used items.
pub use manager::{LockState, PasswordManager, PasswordManagerConfig, DEFAULT_AUTO_LOCK};
pub use session::Vault;
