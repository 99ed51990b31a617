//! # Configuration
//!
//! Algorithm defaults and backend enablement for the registry.
//!
//! ```json
//! {
//!   "plaintext_mode": "aes-256-gcm",
//!   "session_key_mode": "aes-256-gcm",
//!   "ecdh_hmac": "sha256",
//!   "signature_hash": "sha256",
//!   "rsa_key_bits": 2048,
//!   "enable_secp256k1": true,
//!   "enable_legacy_rsa": true
//! }
//! ```
//!
//! Every field is optional in JSON; missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto::{HashType, SymmetricMode};
use crate::error::{Error, Result};

/// Smallest RSA modulus accepted for generated legacy keys
pub const MIN_RSA_KEY_BITS: usize = 1024;

/// Crypto configuration consumed by [`BackendRegistry`](crate::crypto::BackendRegistry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Mode encrypting the document body
    pub plaintext_mode: SymmetricMode,
    /// Mode wrapping the master key for elliptic-curve recipients
    pub session_key_mode: SymmetricMode,
    /// HMAC hash deriving per-recipient wrapping keys
    pub ecdh_hmac: HashType,
    /// Default hash for contract signatures
    pub signature_hash: HashType,
    /// Modulus size for RSA keys from `BackendRegistry::generate_keypair`
    pub rsa_key_bits: usize,
    /// Register the secp256k1 backend
    pub enable_secp256k1: bool,
    /// Offer RSA capabilities from the general backend
    pub enable_legacy_rsa: bool,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            plaintext_mode: SymmetricMode::Aes256Gcm,
            session_key_mode: SymmetricMode::Aes256Gcm,
            ecdh_hmac: HashType::Sha256,
            signature_hash: HashType::Sha256,
            rsa_key_bits: 2048,
            enable_secp256k1: true,
            enable_legacy_rsa: true,
        }
    }
}

impl CryptoConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), "Loading crypto config");
        Self::from_json(&json)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        for (field, mode) in [
            ("plaintext_mode", self.plaintext_mode),
            ("session_key_mode", self.session_key_mode),
        ] {
            if !mode.is_authenticated() {
                return Err(Error::ConfigError(format!(
                    "{} must be an authenticated mode, got {}",
                    field, mode
                )));
            }
        }

        // Wrapping keys are cut from one HMAC output
        if self.session_key_mode.key_size() > self.ecdh_hmac.digest_size() {
            return Err(Error::ConfigError(format!(
                "ecdh_hmac {} is too short to key {}",
                self.ecdh_hmac, self.session_key_mode
            )));
        }

        if self.rsa_key_bits < MIN_RSA_KEY_BITS {
            return Err(Error::ConfigError(format!(
                "rsa_key_bits must be at least {}, got {}",
                MIN_RSA_KEY_BITS, self.rsa_key_bits
            )));
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = CryptoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.plaintext_mode, SymmetricMode::Aes256Gcm);
        assert!(config.enable_secp256k1 && config.enable_legacy_rsa);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            CryptoConfig::from_json(r#"{ "plaintext_mode": "chacha20-poly1305" }"#).unwrap();
        assert_eq!(config.plaintext_mode, SymmetricMode::ChaCha20Poly1305);
        assert_eq!(config.session_key_mode, SymmetricMode::Aes256Gcm);
        assert_eq!(config.rsa_key_bits, 2048);
    }

    #[test]
    fn test_unknown_names_rejected() {
        let result = CryptoConfig::from_json(r#"{ "plaintext_mode": "des-ede3-cbc" }"#);
        assert!(matches!(result, Err(Error::ConfigError(_))));

        let result = CryptoConfig::from_json(r#"{ "ecdh_hmac": "md5" }"#);
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_small_rsa_rejected() {
        let result = CryptoConfig::from_json(r#"{ "rsa_key_bits": 512 }"#);
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "enable_legacy_rsa": false, "signature_hash": "sha512" }}"#).unwrap();

        let config = CryptoConfig::load(file.path()).unwrap();
        assert!(!config.enable_legacy_rsa);
        assert_eq!(config.signature_hash, HashType::Sha512);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = CryptoConfig::load(dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_json_round_trip() {
        let config = CryptoConfig {
            session_key_mode: SymmetricMode::Aes128Gcm,
            ..CryptoConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(CryptoConfig::from_json(&json).unwrap(), config);
    }
}
