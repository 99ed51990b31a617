//! # Secret Buffers
//!
//! Owned byte buffers for key material that are wiped when they go out of
//! scope, on every exit path.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SECRET BUFFER LIFETIME                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   seal()/open() entry                                                  │
//! │        │                                                                │
//! │        ├──► master session key  ─┐                                     │
//! │        ├──► ECDH shared secret   ├── SecretBuffer (heap, zeroized)     │
//! │        ├──► wrapping keys       ─┘                                     │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   return Ok / return Err / `?` early exit                              │
//! │        │                                                                │
//! │        └──► Drop ──► zeroize() ──► bytes overwritten before free       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Heap buffer for secret bytes, zeroized on drop
///
/// Deliberately not `Clone`: a copy of a secret has to be made explicitly
/// with [`SecretBuffer::from_slice`].
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretBuffer {
    bytes: Vec<u8>,
}

impl SecretBuffer {
    /// Allocate a zero-filled buffer of `len` bytes
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
        }
    }

    /// Allocate `len` bytes from the operating system's CSPRNG
    pub fn random(len: usize) -> Result<Self> {
        let mut buffer = Self::new(len);
        rand::rngs::OsRng
            .try_fill_bytes(&mut buffer.bytes)
            .map_err(|_| Error::RngFailed)?;
        Ok(buffer)
    }

    /// Take ownership of an existing vector
    ///
    /// The vector is moved, not copied, so no unzeroized duplicate remains.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Copy secret bytes from a slice
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// Borrow the secret bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutably borrow the secret bytes
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Shorten to `len` bytes, wiping the discarded tail
    pub fn truncate(&mut self, len: usize) {
        if len < self.bytes.len() {
            self.bytes[len..].zeroize();
            self.bytes.truncate(len);
        }
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBuffer([REDACTED; {}])", self.bytes.len())
    }
}

impl PartialEq for SecretBuffer {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.bytes, &other.bytes)
    }
}

impl Eq for SecretBuffer {}

/// Length-revealing, content-constant-time comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ============================================================================
// TESTS
// ============================================================================
