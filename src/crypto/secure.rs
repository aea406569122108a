//! Key buffers and helpers for handling secret material.

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An owned derived key that wipes its memory when dropped.
///
/// `clone()` produces an independent buffer: wiping or dropping one
/// copy never touches another.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: Vec<u8>,
}

impl DerivedKey {
    /// Copy raw key bytes into a new `DerivedKey`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// Access the raw key bytes (e.g. to build a cipher).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Overwrite the key with zeros now rather than at drop.
    pub fn wipe(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// Overwrite `buffer` with zeros in place.
///
/// `zeroize` uses volatile writes, so the compiler cannot elide them.
pub fn secure_clear(buffer: &mut [u8]) {
    buffer.zeroize();
}

/// Constant-time equality for secret values.
///
/// Different lengths compare unequal; the comparison time depends only
/// on the lengths, never on where the contents differ.
pub fn secure_compare(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
