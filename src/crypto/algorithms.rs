//! # Algorithm Tables
//!
//! Symmetric modes and hash functions, with their wire names and the fixed
//! size table every caller must honor.
//!
//! | Mode | Key | IV | Tag | Wire name |
//! |------|-----|----|-----|-----------|
//! | AES-128-GCM | 16 | 12 | 16 | `aes-128-gcm` |
//! | AES-256-GCM | 32 | 12 | 16 | `aes-256-gcm` |
//! | ChaCha20-Poly1305 | 32 | 12 | 16 | `chacha20-poly1305` |
//!
//! | Hash | Digest | Wire name |
//! |------|--------|-----------|
//! | SHA-256 | 32 | `sha256` |
//! | SHA-512 | 64 | `sha512` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Symmetric encryption mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymmetricMode {
    /// AES-128 in Galois/Counter Mode
    #[serde(rename = "aes-128-gcm")]
    Aes128Gcm,
    /// AES-256 in Galois/Counter Mode
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    /// ChaCha20 stream cipher with Poly1305 authenticator
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

impl SymmetricMode {
    /// All modes the general backend can instantiate
    pub const ALL: [SymmetricMode; 3] = [
        SymmetricMode::Aes128Gcm,
        SymmetricMode::Aes256Gcm,
        SymmetricMode::ChaCha20Poly1305,
    ];

    /// Name used on the wire and in configuration
    pub fn name(&self) -> &'static str {
        match self {
            SymmetricMode::Aes128Gcm => "aes-128-gcm",
            SymmetricMode::Aes256Gcm => "aes-256-gcm",
            SymmetricMode::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }

    /// Required key size in bytes
    pub fn key_size(&self) -> usize {
        match self {
            SymmetricMode::Aes128Gcm => 16,
            SymmetricMode::Aes256Gcm | SymmetricMode::ChaCha20Poly1305 => 32,
        }
    }

    /// Required IV (nonce) size in bytes
    pub fn iv_size(&self) -> usize {
        12
    }

    /// Authentication tag size in bytes (0 for unauthenticated modes)
    pub fn tag_size(&self) -> usize {
        if self.is_authenticated() {
            16
        } else {
            0
        }
    }

    /// Whether the mode produces and verifies an authentication tag
    pub fn is_authenticated(&self) -> bool {
        match self {
            SymmetricMode::Aes128Gcm
            | SymmetricMode::Aes256Gcm
            | SymmetricMode::ChaCha20Poly1305 => true,
        }
    }
}

impl fmt::Display for SymmetricMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SymmetricMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SymmetricMode::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| Error::UnsupportedCipherMode(s.to_string()))
    }
}

/// Hash function
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashType {
    /// SHA-256
    #[serde(rename = "sha256")]
    Sha256,
    /// SHA-512
    #[serde(rename = "sha512")]
    Sha512,
}

impl HashType {
    /// All supported hash functions
    pub const ALL: [HashType; 2] = [HashType::Sha256, HashType::Sha512];

    /// Name used on the wire and in configuration
    pub fn name(&self) -> &'static str {
        match self {
            HashType::Sha256 => "sha256",
            HashType::Sha512 => "sha512",
        }
    }

    /// Digest size in bytes
    pub fn digest_size(&self) -> usize {
        match self {
            HashType::Sha256 => 32,
            HashType::Sha512 => 64,
        }
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HashType::ALL
            .into_iter()
            .find(|hash| hash.name() == s)
            .ok_or_else(|| Error::ConfigError(format!("unknown hash type '{}'", s)))
    }
}

// ============================================================================
// TESTS
// ============================================================================
