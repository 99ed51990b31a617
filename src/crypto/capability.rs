//! # Capability Interfaces
//!
//! Each cryptographic concern is its own trait. A backend implements the
//! subset it supports and the registry composes them by capability, never
//! by concrete backend type.
//!
//! ```text
//! ┌───────────────────┬───────────────────────────┬──────────────────────┐
//! │ Capability        │ Keyed by                  │ Provided by          │
//! ├───────────────────┼───────────────────────────┼──────────────────────┤
//! │ Hasher            │ (none)                    │ general              │
//! │ SymmetricCipher   │ (none)                    │ general              │
//! │ Util              │ (none)                    │ general              │
//! │ Signer            │ KeyType                   │ general, secp256k1   │
//! │ KeyAgreement      │ KeyType                   │ secp256k1            │
//! │ KeyWrap           │ KeyType                   │ general (legacy RSA) │
//! └───────────────────┴───────────────────────────┴──────────────────────┘
//! ```
//!
//! All capability objects are `Send + Sync` and may be called concurrently.

use std::fmt;
use std::sync::Arc;

use crate::crypto::encoding::base58check_encode;
use crate::crypto::{HashType, Keypair, PrivateKey, PublicKey, SecretBuffer, SymmetricMode};
use crate::error::Result;

/// Names each capability for lookup and error reporting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    /// Digests, HMAC, key derivation
    Hasher,
    /// Authenticated symmetric encryption
    SymmetricCipher,
    /// Signing and verification
    Signer,
    /// Diffie-Hellman shared secrets
    KeyAgreement,
    /// Single-call multi-recipient key wrapping
    KeyWrap,
    /// Randomness and nonces
    Util,
}

impl CapabilityKind {
    /// Whether lookups for this capability depend on the key type
    pub fn is_keyed(&self) -> bool {
        matches!(
            self,
            CapabilityKind::Signer | CapabilityKind::KeyAgreement | CapabilityKind::KeyWrap
        )
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapabilityKind::Hasher => "Hasher",
            CapabilityKind::SymmetricCipher => "SymmetricCipher",
            CapabilityKind::Signer => "Signer",
            CapabilityKind::KeyAgreement => "KeyAgreement",
            CapabilityKind::KeyWrap => "KeyWrap",
            CapabilityKind::Util => "Util",
        };
        f.write_str(name)
    }
}

/// Digest, HMAC and key derivation
pub trait Hasher: Send + Sync {
    /// Hash `data`
    fn digest(&self, hash: HashType, data: &[u8]) -> Result<Vec<u8>>;

    /// Keyed hash of `data` under `key`
    ///
    /// Returned as a secret because callers use it as key material.
    fn hmac(&self, hash: HashType, key: &[u8], data: &[u8]) -> Result<SecretBuffer>;

    /// HKDF extract-and-expand to `len` bytes
    fn derive_key(
        &self,
        hash: HashType,
        ikm: &[u8],
        salt: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<SecretBuffer>;
}

/// Output of a symmetric encryption
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymmetricCiphertext {
    /// Encrypted bytes, tag excluded
    pub ciphertext: Vec<u8>,
    /// Authentication tag, present for authenticated modes
    pub tag: Option<Vec<u8>>,
}

/// Symmetric encryption with detached authentication tags
pub trait SymmetricCipher: Send + Sync {
    /// Whether `mode` can be instantiated by this backend
    fn supports(&self, mode: SymmetricMode) -> bool;

    /// Encrypt `plaintext`
    ///
    /// Key and IV must match the mode's size table exactly, otherwise
    /// `InvalidKeyOrIvSize` is returned.
    fn encrypt(
        &self,
        mode: SymmetricMode,
        key: &SecretBuffer,
        iv: &[u8],
        plaintext: &[u8],
    ) -> Result<SymmetricCiphertext>;

    /// Decrypt `ciphertext`, verifying `tag` before any plaintext is returned
    ///
    /// A tag mismatch yields `AeadDecryptFailed`, never garbage output.
    fn decrypt(
        &self,
        mode: SymmetricMode,
        key: &SecretBuffer,
        iv: &[u8],
        tag: Option<&[u8]>,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;
}

/// Signing and verification for one or more key types
pub trait Signer: Send + Sync {
    /// Hash `plaintext` with `hash` and sign it
    fn sign(&self, plaintext: &[u8], key: &PrivateKey, hash: HashType) -> Result<Vec<u8>>;

    /// Verify `signature` over `plaintext`
    ///
    /// `Ok(false)` for a well-formed but wrong signature; `Err` only when
    /// the inputs cannot be interpreted at all.
    fn verify(
        &self,
        plaintext: &[u8],
        key: &PublicKey,
        signature: &[u8],
        hash: HashType,
    ) -> Result<bool>;
}

/// Diffie-Hellman key agreement
pub trait KeyAgreement: Send + Sync {
    /// Generate a fresh keypair usable with [`KeyAgreement::derive_shared_secret`]
    fn generate_keypair(&self) -> Result<Keypair>;

    /// Combine our private key with their public key
    ///
    /// Symmetric: `derive(a, B) == derive(b, A)`.
    fn derive_shared_secret(&self, ours: &PrivateKey, theirs: &PublicKey) -> Result<SecretBuffer>;
}

/// Wrap one session key to many recipients in a single operation
pub trait KeyWrap: Send + Sync {
    /// Produce one opaque blob any listed recipient can unwrap
    fn wrap(&self, recipients: &[&PublicKey], session_key: &SecretBuffer) -> Result<Vec<u8>>;

    /// Recover the session key with a recipient's private key
    ///
    /// Fails with `SessionKeyUnwrapFailed` when the key is not among the
    /// recipients or the blob is corrupted; the two are indistinguishable.
    fn unwrap(&self, blob: &[u8], key: &PrivateKey) -> Result<SecretBuffer>;
}

/// Randomness
pub trait Util: Send + Sync {
    /// `len` random secret bytes
    fn random_secret(&self, len: usize) -> Result<SecretBuffer>;

    /// `len` random public bytes (IVs, nonces)
    fn nonce(&self, len: usize) -> Result<Vec<u8>>;

    /// A nonce together with its Base58Check text form
    fn nonce_with_text(&self, len: usize) -> Result<(Vec<u8>, String)> {
        let nonce = self.nonce(len)?;
        let text = base58check_encode(&nonce);
        Ok((nonce, text))
    }
}

/// A resolved capability, as returned by the generic registry lookup
#[derive(Clone)]
pub enum Capability {
    /// See [`Hasher`]
    Hasher(Arc<dyn Hasher>),
    /// See [`SymmetricCipher`]
    SymmetricCipher(Arc<dyn SymmetricCipher>),
    /// See [`Signer`]
    Signer(Arc<dyn Signer>),
    /// See [`KeyAgreement`]
    KeyAgreement(Arc<dyn KeyAgreement>),
    /// See [`KeyWrap`]
    KeyWrap(Arc<dyn KeyWrap>),
    /// See [`Util`]
    Util(Arc<dyn Util>),
}

impl Capability {
    /// Which capability this is
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::Hasher(_) => CapabilityKind::Hasher,
            Capability::SymmetricCipher(_) => CapabilityKind::SymmetricCipher,
            Capability::Signer(_) => CapabilityKind::Signer,
            Capability::KeyAgreement(_) => CapabilityKind::KeyAgreement,
            Capability::KeyWrap(_) => CapabilityKind::KeyWrap,
            Capability::Util(_) => CapabilityKind::Util,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability::{}", self.kind())
    }
}
