//! # General Backend
//!
//! The workhorse engine: hashing, authenticated symmetric encryption,
//! randomness, and everything for legacy RSA keys (PKCS#1 v1.5 signatures
//! and OAEP batch key wrapping).
//!
//! ## Batch Wrap Blob
//!
//! ```text
//! ┌──────────────┬──────────────┬─────────────────────┬─────┐
//! │ count (u32)  │ len_1 (u32)  │ OAEP(pub_1, key)    │ ... │
//! │ big-endian   │ big-endian   │ len_1 bytes         │     │
//! └──────────────┴──────────────┴─────────────────────┴─────┘
//! ```
//!
//! The blob names no recipients; an opener trial-decrypts every slot.

use std::sync::Arc;

use aes_gcm::aead::{AeadInPlace, KeyInit, Nonce, Tag};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::ChaCha20Poly1305;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1v15;
use rsa::signature::{SignatureEncoding, Signer as _, Verifier as _};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroize;

use super::{Backend, Lifecycle};
use crate::crypto::{
    HashType, Hasher, KeyType, KeyWrap, PrivateKey, PublicKey, SecretBuffer, Signer,
    SymmetricCipher, SymmetricCiphertext, SymmetricMode, Util,
};
use crate::error::{Error, Result};

const NAME: &str = "general";

/// Upper bound on recipients in one batch blob
const MAX_BATCH_RECIPIENTS: usize = 4096;

/// Hashing, AEAD, randomness and legacy RSA
pub struct GeneralBackend {
    lifecycle: Lifecycle,
    legacy_rsa: bool,
}

impl GeneralBackend {
    /// Create the backend; `legacy_rsa` controls whether RSA capabilities
    /// are offered
    pub fn new(legacy_rsa: bool) -> Self {
        Self {
            lifecycle: Lifecycle::new(NAME),
            legacy_rsa,
        }
    }
}

impl Backend for GeneralBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn key_types(&self) -> Vec<KeyType> {
        if self.legacy_rsa {
            vec![KeyType::LegacyRsa]
        } else {
            Vec::new()
        }
    }

    fn init(&self) -> Result<()> {
        self.lifecycle.start(|| {
            // Fail early if the OS entropy source is unusable
            let mut probe = [0u8; 16];
            OsRng
                .try_fill_bytes(&mut probe)
                .map_err(|e| Error::BackendInitFailed {
                    backend: NAME.to_string(),
                    reason: format!("entropy source unavailable: {}", e),
                })
        })
    }

    fn shutdown(&self) {
        self.lifecycle.stop(|| {});
    }

    fn hasher(self: Arc<Self>) -> Option<Arc<dyn Hasher>> {
        Some(self)
    }

    fn symmetric(self: Arc<Self>) -> Option<Arc<dyn SymmetricCipher>> {
        Some(self)
    }

    fn util(self: Arc<Self>) -> Option<Arc<dyn Util>> {
        Some(self)
    }

    fn signer(self: Arc<Self>, key_type: KeyType) -> Option<Arc<dyn Signer>> {
        (self.legacy_rsa && key_type == KeyType::LegacyRsa).then(|| self as Arc<dyn Signer>)
    }

    fn key_wrap(self: Arc<Self>, key_type: KeyType) -> Option<Arc<dyn KeyWrap>> {
        (self.legacy_rsa && key_type == KeyType::LegacyRsa).then(|| self as Arc<dyn KeyWrap>)
    }
}

// ============================================================================
// HASHING
// ============================================================================

impl Hasher for GeneralBackend {
    fn digest(&self, hash: HashType, data: &[u8]) -> Result<Vec<u8>> {
        self.lifecycle.ensure_running()?;
        Ok(match hash {
            HashType::Sha256 => Sha256::digest(data).to_vec(),
            HashType::Sha512 => Sha512::digest(data).to_vec(),
        })
    }

    fn hmac(&self, hash: HashType, key: &[u8], data: &[u8]) -> Result<SecretBuffer> {
        self.lifecycle.ensure_running()?;
        let invalid = |_| Error::HashFailed("HMAC key rejected".into());

        let mut out = match hash {
            HashType::Sha256 => {
                let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(invalid)?;
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            HashType::Sha512 => {
                let mut mac = <Hmac<Sha512> as Mac>::new_from_slice(key).map_err(invalid)?;
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
        };
        let secret = SecretBuffer::from_slice(&out);
        out.zeroize();
        Ok(secret)
    }

    fn derive_key(
        &self,
        hash: HashType,
        ikm: &[u8],
        salt: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<SecretBuffer> {
        self.lifecycle.ensure_running()?;
        let mut okm = SecretBuffer::new(len);
        let expanded = match hash {
            HashType::Sha256 => {
                Hkdf::<Sha256>::new(Some(salt), ikm).expand(info, okm.as_mut_bytes())
            }
            HashType::Sha512 => {
                Hkdf::<Sha512>::new(Some(salt), ikm).expand(info, okm.as_mut_bytes())
            }
        };
        expanded.map_err(|_| {
            Error::HashFailed(format!("HKDF-{} cannot expand to {} bytes", hash, len))
        })?;
        Ok(okm)
    }
}

// ============================================================================
// SYMMETRIC ENCRYPTION
// ============================================================================

fn check_sizes(mode: SymmetricMode, key_len: usize, iv_len: usize) -> Result<()> {
    if key_len != mode.key_size() {
        return Err(Error::InvalidKeyOrIvSize {
            what: "key",
            mode: mode.name(),
            expected: mode.key_size(),
            actual: key_len,
        });
    }
    if iv_len != mode.iv_size() {
        return Err(Error::InvalidKeyOrIvSize {
            what: "iv",
            mode: mode.name(),
            expected: mode.iv_size(),
            actual: iv_len,
        });
    }
    Ok(())
}

fn seal_detached<C>(key: &[u8], iv: &[u8], buffer: &mut Vec<u8>) -> Result<Vec<u8>>
where
    C: KeyInit + AeadInPlace,
{
    let cipher = C::new_from_slice(key)
        .map_err(|e| Error::EncryptionFailed(format!("cipher key: {}", e)))?;
    let tag = cipher
        .encrypt_in_place_detached(Nonce::<C>::from_slice(iv), b"", buffer)
        .map_err(|e| Error::EncryptionFailed(format!("AEAD: {}", e)))?;
    Ok(tag.to_vec())
}

fn open_detached<C>(key: &[u8], iv: &[u8], tag: &[u8], buffer: &mut Vec<u8>) -> Result<()>
where
    C: KeyInit + AeadInPlace,
{
    let cipher = C::new_from_slice(key).map_err(|_| Error::AeadDecryptFailed)?;
    cipher
        .decrypt_in_place_detached(
            Nonce::<C>::from_slice(iv),
            b"",
            buffer,
            Tag::<C>::from_slice(tag),
        )
        .map_err(|_| Error::AeadDecryptFailed)
}

impl SymmetricCipher for GeneralBackend {
    fn supports(&self, mode: SymmetricMode) -> bool {
        SymmetricMode::ALL.contains(&mode)
    }

    fn encrypt(
        &self,
        mode: SymmetricMode,
        key: &SecretBuffer,
        iv: &[u8],
        plaintext: &[u8],
    ) -> Result<SymmetricCiphertext> {
        self.lifecycle.ensure_running()?;
        check_sizes(mode, key.len(), iv.len())?;

        let mut buffer = plaintext.to_vec();
        let sealed = match mode {
            SymmetricMode::Aes128Gcm => seal_detached::<Aes128Gcm>(key.as_bytes(), iv, &mut buffer),
            SymmetricMode::Aes256Gcm => seal_detached::<Aes256Gcm>(key.as_bytes(), iv, &mut buffer),
            SymmetricMode::ChaCha20Poly1305 => {
                seal_detached::<ChaCha20Poly1305>(key.as_bytes(), iv, &mut buffer)
            }
        };

        match sealed {
            Ok(tag) => Ok(SymmetricCiphertext {
                ciphertext: buffer,
                tag: Some(tag),
            }),
            Err(e) => {
                // The buffer may still hold plaintext
                buffer.zeroize();
                Err(e)
            }
        }
    }

    fn decrypt(
        &self,
        mode: SymmetricMode,
        key: &SecretBuffer,
        iv: &[u8],
        tag: Option<&[u8]>,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        self.lifecycle.ensure_running()?;
        check_sizes(mode, key.len(), iv.len())?;

        let tag = tag.unwrap_or_default();
        if tag.len() != mode.tag_size() {
            return Err(Error::InvalidKeyOrIvSize {
                what: "tag",
                mode: mode.name(),
                expected: mode.tag_size(),
                actual: tag.len(),
            });
        }

        let mut buffer = ciphertext.to_vec();
        let opened = match mode {
            SymmetricMode::Aes128Gcm => {
                open_detached::<Aes128Gcm>(key.as_bytes(), iv, tag, &mut buffer)
            }
            SymmetricMode::Aes256Gcm => {
                open_detached::<Aes256Gcm>(key.as_bytes(), iv, tag, &mut buffer)
            }
            SymmetricMode::ChaCha20Poly1305 => {
                open_detached::<ChaCha20Poly1305>(key.as_bytes(), iv, tag, &mut buffer)
            }
        };

        match opened {
            Ok(()) => Ok(buffer),
            Err(e) => {
                // Some AEADs decrypt before comparing tags; never leave that output around
                buffer.zeroize();
                Err(e)
            }
        }
    }
}

// ============================================================================
// RANDOMNESS
// ============================================================================

impl Util for GeneralBackend {
    fn random_secret(&self, len: usize) -> Result<SecretBuffer> {
        self.lifecycle.ensure_running()?;
        SecretBuffer::random(len)
    }

    fn nonce(&self, len: usize) -> Result<Vec<u8>> {
        self.lifecycle.ensure_running()?;
        let mut bytes = vec![0u8; len];
        OsRng.try_fill_bytes(&mut bytes).map_err(|_| Error::RngFailed)?;
        Ok(bytes)
    }
}

// ============================================================================
// LEGACY RSA: SIGNATURES
// ============================================================================

fn rsa_private(key: &PrivateKey) -> Result<&RsaPrivateKey> {
    match key {
        PrivateKey::LegacyRsa(key) => Ok(key),
        other => Err(Error::UnsupportedKeyType(other.key_type())),
    }
}

fn rsa_public(key: &PublicKey) -> Result<&RsaPublicKey> {
    match key {
        PublicKey::LegacyRsa(key) => Ok(key),
        other => Err(Error::UnsupportedKeyType(other.key_type())),
    }
}

impl Signer for GeneralBackend {
    fn sign(&self, plaintext: &[u8], key: &PrivateKey, hash: HashType) -> Result<Vec<u8>> {
        self.lifecycle.ensure_running()?;
        let key = rsa_private(key)?.clone();

        let signature = match hash {
            HashType::Sha256 => pkcs1v15::SigningKey::<Sha256>::new(key)
                .try_sign(plaintext)
                .map(|sig| sig.to_vec()),
            HashType::Sha512 => pkcs1v15::SigningKey::<Sha512>::new(key)
                .try_sign(plaintext)
                .map(|sig| sig.to_vec()),
        };
        signature.map_err(|e| Error::SigningFailed(format!("RSA: {}", e)))
    }

    fn verify(
        &self,
        plaintext: &[u8],
        key: &PublicKey,
        signature: &[u8],
        hash: HashType,
    ) -> Result<bool> {
        self.lifecycle.ensure_running()?;
        let key = rsa_public(key)?.clone();

        let Ok(signature) = pkcs1v15::Signature::try_from(signature) else {
            return Ok(false);
        };

        let verified = match hash {
            HashType::Sha256 => {
                pkcs1v15::VerifyingKey::<Sha256>::new(key).verify(plaintext, &signature)
            }
            HashType::Sha512 => {
                pkcs1v15::VerifyingKey::<Sha512>::new(key).verify(plaintext, &signature)
            }
        };
        Ok(verified.is_ok())
    }
}

// ============================================================================
// LEGACY RSA: BATCH KEY WRAP
// ============================================================================

/// Split a batch blob into its OAEP slots
fn parse_batch(blob: &[u8]) -> Option<Vec<&[u8]>> {
    fn take_u32(input: &mut &[u8]) -> Option<usize> {
        if input.len() < 4 {
            return None;
        }
        let (head, rest) = input.split_at(4);
        *input = rest;
        let value = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
        usize::try_from(value).ok()
    }

    let mut input = blob;
    let count = take_u32(&mut input)?;
    if count == 0 || count > MAX_BATCH_RECIPIENTS {
        return None;
    }

    let mut slots = Vec::with_capacity(count);
    for _ in 0..count {
        let len = take_u32(&mut input)?;
        if len > input.len() {
            return None;
        }
        let (slot, rest) = input.split_at(len);
        slots.push(slot);
        input = rest;
    }
    input.is_empty().then_some(slots)
}

impl KeyWrap for GeneralBackend {
    fn wrap(&self, recipients: &[&PublicKey], session_key: &SecretBuffer) -> Result<Vec<u8>> {
        self.lifecycle.ensure_running()?;
        if recipients.is_empty() || recipients.len() > MAX_BATCH_RECIPIENTS {
            return Err(Error::SessionKeyWrapFailed(format!(
                "batch wrap needs 1..={} recipients, got {}",
                MAX_BATCH_RECIPIENTS,
                recipients.len()
            )));
        }

        let mut blob = Vec::new();
        blob.extend_from_slice(&(recipients.len() as u32).to_be_bytes());

        for recipient in recipients {
            let public = rsa_public(recipient)?;
            let slot = public
                .encrypt(&mut OsRng, Oaep::new::<Sha256>(), session_key.as_bytes())
                .map_err(|e| Error::SessionKeyWrapFailed(format!("RSA-OAEP: {}", e)))?;
            blob.extend_from_slice(&(slot.len() as u32).to_be_bytes());
            blob.extend_from_slice(&slot);
        }

        Ok(blob)
    }

    fn unwrap(&self, blob: &[u8], key: &PrivateKey) -> Result<SecretBuffer> {
        self.lifecycle.ensure_running()?;
        let private = rsa_private(key)?;
        let slots = parse_batch(blob).ok_or(Error::SessionKeyUnwrapFailed)?;

        slots
            .into_iter()
            .find_map(|slot| private.decrypt(Oaep::new::<Sha256>(), slot).ok())
            .map(SecretBuffer::from_vec)
            .ok_or(Error::SessionKeyUnwrapFailed)
    }
}

// ============================================================================
// TESTS
// ============================================================================
