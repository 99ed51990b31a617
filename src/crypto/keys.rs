//! # Key Management
//!
//! Recipient and signer key material.
//!
//! ## Key Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KEY TYPES                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyType::Secp256k1 (elliptic curve)                            │   │
//! │  │  ────────────────────────────────────                            │   │
//! │  │  • ECDSA signatures                                             │   │
//! │  │  • ECDH session-key wrapping (one entry per recipient)          │   │
//! │  │  • Public key: 33-byte compressed SEC1 point                    │   │
//! │  │  • Private key: 32-byte scalar (zeroized on drop)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyType::LegacyRsa                                             │   │
//! │  │  ──────────────────                                              │   │
//! │  │  • PKCS#1 v1.5 signatures                                       │   │
//! │  │  • OAEP batch session-key wrapping (one entry for all)          │   │
//! │  │  • Public key: PKCS#1 DER                                       │   │
//! │  │  • Private key: CRT components (zeroized on drop)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are supplied by the identity layer; nothing here persists them.

use std::fmt;

use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Key type tag carried by every public and private key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyType {
    /// secp256k1 elliptic-curve key
    Secp256k1,
    /// RSA key from the legacy credential format
    LegacyRsa,
}

impl KeyType {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            KeyType::Secp256k1 => "secp256k1",
            KeyType::LegacyRsa => "legacy-rsa",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A public key plus its type tag
///
/// Public keys carry no secrets and can be cloned, logged by fingerprint,
/// and serialized freely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    /// secp256k1 point
    Secp256k1(k256::PublicKey),
    /// RSA modulus and exponent
    LegacyRsa(RsaPublicKey),
}

impl PublicKey {
    /// The key's type tag
    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Secp256k1(_) => KeyType::Secp256k1,
            PublicKey::LegacyRsa(_) => KeyType::LegacyRsa,
        }
    }

    /// Serialize: compressed SEC1 for secp256k1, PKCS#1 DER for RSA
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            PublicKey::Secp256k1(key) => Ok(key.to_encoded_point(true).as_bytes().to_vec()),
            PublicKey::LegacyRsa(key) => key
                .to_pkcs1_der()
                .map(|doc| doc.as_bytes().to_vec())
                .map_err(|e| Error::InvalidKey(format!("RSA public key encoding: {}", e))),
        }
    }

    /// Parse a serialized public key of the given type
    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self> {
        match key_type {
            KeyType::Secp256k1 => k256::PublicKey::from_sec1_bytes(bytes)
                .map(PublicKey::Secp256k1)
                .map_err(|_| Error::InvalidKey("Invalid secp256k1 public key".into())),
            KeyType::LegacyRsa => RsaPublicKey::from_pkcs1_der(bytes)
                .map(PublicKey::LegacyRsa)
                .map_err(|e| Error::InvalidKey(format!("Invalid RSA public key: {}", e))),
        }
    }

    /// Encode as hex string
    pub fn to_hex(&self) -> Result<String> {
        Ok(hex::encode(self.to_bytes()?))
    }

    /// Decode from hex string
    pub fn from_hex(key_type: KeyType, hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)?;
        Self::from_bytes(key_type, &bytes)
    }

    /// Short identifier for logs: first 8 bytes of SHA-256 over the encoding
    pub fn fingerprint(&self) -> String {
        match self.to_bytes() {
            Ok(bytes) => hex::encode(&Sha256::digest(&bytes)[..8]),
            Err(_) => "unencodable".to_string(),
        }
    }
}

/// A private key plus its type tag
///
/// Both variants wipe their secret material when dropped.
#[derive(Clone)]
pub enum PrivateKey {
    /// secp256k1 scalar
    Secp256k1(k256::SecretKey),
    /// RSA private key
    LegacyRsa(RsaPrivateKey),
}

impl PrivateKey {
    /// The key's type tag
    pub fn key_type(&self) -> KeyType {
        match self {
            PrivateKey::Secp256k1(_) => KeyType::Secp256k1,
            PrivateKey::LegacyRsa(_) => KeyType::LegacyRsa,
        }
    }

    /// Derive the matching public key
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Secp256k1(key) => PublicKey::Secp256k1(key.public_key()),
            PrivateKey::LegacyRsa(key) => PublicKey::LegacyRsa(key.to_public_key()),
        }
    }

    /// Load a secp256k1 scalar from 32 raw bytes
    pub fn secp256k1_from_bytes(bytes: &[u8]) -> Result<Self> {
        k256::SecretKey::from_slice(bytes)
            .map(PrivateKey::Secp256k1)
            .map_err(|_| Error::InvalidKey("Invalid secp256k1 private key".into()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey::{}([REDACTED])", self.key_type())
    }
}

/// Matching private and public key
#[derive(Clone, Debug)]
pub struct Keypair {
    private: PrivateKey,
    public: PublicKey,
}

impl Keypair {
    /// Generate a new random secp256k1 keypair
    pub fn generate_secp256k1() -> Self {
        let secret = k256::SecretKey::random(&mut OsRng);
        Self::from_private(PrivateKey::Secp256k1(secret))
    }

    /// Generate a new random RSA keypair with a `bits`-bit modulus
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let secret = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| Error::KeyGenerationFailed(format!("RSA-{}: {}", bits, e)))?;
        Ok(Self::from_private(PrivateKey::LegacyRsa(secret)))
    }

    /// Build a keypair around an existing private key
    pub fn from_private(private: PrivateKey) -> Self {
        let public = private.public_key();
        Self { private, public }
    }

    /// Key type of both halves
    pub fn key_type(&self) -> KeyType {
        self.public.key_type()
    }

    /// The private half
    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    /// The public half
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let kp1 = Keypair::generate_secp256k1();
        let kp2 = Keypair::generate_secp256k1();

        assert_eq!(kp1.key_type(), KeyType::Secp256k1);
        assert_ne!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_secp256k1_public_key_hex() {
        let kp = Keypair::generate_secp256k1();

        let hex = kp.public_key().to_hex().unwrap();
        assert_eq!(hex.len(), 66);

        let restored = PublicKey::from_hex(KeyType::Secp256k1, &hex).unwrap();
        assert_eq!(&restored, kp.public_key());
    }

    #[test]
    fn test_rsa_public_key_der() {
        let kp = Keypair::generate_rsa(1024).unwrap();

        let der = kp.public_key().to_bytes().unwrap();
        let restored = PublicKey::from_bytes(KeyType::LegacyRsa, &der).unwrap();
        assert_eq!(&restored, kp.public_key());
    }

    #[test]
    fn test_private_key_from_bytes() {
        let key = PrivateKey::secp256k1_from_bytes(&[7u8; 32]).unwrap();
        let again = PrivateKey::secp256k1_from_bytes(&[7u8; 32]).unwrap();
        assert_eq!(key.public_key(), again.public_key());

        assert!(PrivateKey::secp256k1_from_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_garbage_public_key_rejected() {
        assert!(PublicKey::from_bytes(KeyType::Secp256k1, &[1, 2, 3]).is_err());
        assert!(PublicKey::from_bytes(KeyType::LegacyRsa, &[1, 2, 3]).is_err());
        assert!(PublicKey::from_hex(KeyType::Secp256k1, "zz").is_err());
    }

    #[test]
    fn test_private_key_debug_redacted() {
        let kp = Keypair::generate_secp256k1();
        let rendered = format!("{:?}", kp.private_key());
        assert_eq!(rendered, "PrivateKey::secp256k1([REDACTED])");
    }

    #[test]
    fn test_fingerprint_stable() {
        let kp = Keypair::generate_secp256k1();
        assert_eq!(kp.public_key().fingerprint(), kp.public_key().fingerprint());
        assert_eq!(kp.public_key().fingerprint().len(), 16);
    }
}
