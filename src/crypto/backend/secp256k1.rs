//! # secp256k1 Backend
//!
//! ECDSA signatures and ECDH key agreement on secp256k1.
//!
//! Signing hashes through the injected [`Hasher`] and signs the digest, so
//! the configured signature hash applies uniformly across backends.
//! Signatures are 64-byte fixed-width `r || s`.

use std::sync::Arc;

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};

use super::{Backend, Lifecycle};
use crate::crypto::{
    HashType, Hasher, KeyAgreement, KeyType, Keypair, PrivateKey, PublicKey, SecretBuffer, Signer,
};
use crate::error::{Error, Result};

const NAME: &str = "secp256k1";

/// ECDSA and ECDH for secp256k1 keys
pub struct Secp256k1Backend {
    lifecycle: Lifecycle,
    hasher: Arc<dyn Hasher>,
}

impl Secp256k1Backend {
    /// Create the backend around the hasher used for signature digests
    pub fn new(hasher: Arc<dyn Hasher>) -> Self {
        Self {
            lifecycle: Lifecycle::new(NAME),
            hasher,
        }
    }
}

impl Backend for Secp256k1Backend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn key_types(&self) -> Vec<KeyType> {
        vec![KeyType::Secp256k1]
    }

    fn init(&self) -> Result<()> {
        self.lifecycle.start(|| Ok(()))
    }

    fn shutdown(&self) {
        self.lifecycle.stop(|| {});
    }

    fn signer(self: Arc<Self>, key_type: KeyType) -> Option<Arc<dyn Signer>> {
        (key_type == KeyType::Secp256k1).then(|| self as Arc<dyn Signer>)
    }

    fn key_agreement(self: Arc<Self>, key_type: KeyType) -> Option<Arc<dyn KeyAgreement>> {
        (key_type == KeyType::Secp256k1).then(|| self as Arc<dyn KeyAgreement>)
    }
}

fn ec_private(key: &PrivateKey) -> Result<&k256::SecretKey> {
    match key {
        PrivateKey::Secp256k1(key) => Ok(key),
        other => Err(Error::UnsupportedKeyType(other.key_type())),
    }
}

fn ec_public(key: &PublicKey) -> Result<&k256::PublicKey> {
    match key {
        PublicKey::Secp256k1(key) => Ok(key),
        other => Err(Error::UnsupportedKeyType(other.key_type())),
    }
}

impl Signer for Secp256k1Backend {
    fn sign(&self, plaintext: &[u8], key: &PrivateKey, hash: HashType) -> Result<Vec<u8>> {
        self.lifecycle.ensure_running()?;
        let signing_key = SigningKey::from(ec_private(key)?);
        let digest = self.hasher.digest(hash, plaintext)?;

        let signature: Signature = signing_key
            .sign_prehash(&digest)
            .map_err(|e| Error::SigningFailed(format!("ECDSA: {}", e)))?;
        Ok(signature.to_bytes().to_vec())
    }

    fn verify(
        &self,
        plaintext: &[u8],
        key: &PublicKey,
        signature: &[u8],
        hash: HashType,
    ) -> Result<bool> {
        self.lifecycle.ensure_running()?;
        let verifying_key = VerifyingKey::from(ec_public(key)?);

        let Ok(signature) = Signature::from_slice(signature) else {
            return Ok(false);
        };

        let digest = self.hasher.digest(hash, plaintext)?;
        Ok(verifying_key.verify_prehash(&digest, &signature).is_ok())
    }
}

impl KeyAgreement for Secp256k1Backend {
    fn generate_keypair(&self) -> Result<Keypair> {
        self.lifecycle.ensure_running()?;
        Ok(Keypair::generate_secp256k1())
    }

    fn derive_shared_secret(&self, ours: &PrivateKey, theirs: &PublicKey) -> Result<SecretBuffer> {
        self.lifecycle.ensure_running()?;
        let ours = ec_private(ours)?;
        let theirs = ec_public(theirs)?;

        let shared = k256::ecdh::diffie_hellman(ours.to_nonzero_scalar(), theirs.as_affine());
        Ok(SecretBuffer::from_slice(shared.raw_secret_bytes()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::GeneralBackend;

    fn backend() -> Arc<Secp256k1Backend> {
        let general = Arc::new(GeneralBackend::new(false));
        general.init().unwrap();
        let hasher = general.hasher().unwrap();

        let backend = Arc::new(Secp256k1Backend::new(hasher));
        backend.init().unwrap();
        backend
    }

    #[test]
    fn test_ecdh_is_symmetric() {
        let backend = backend();
        let alice = backend.generate_keypair().unwrap();
        let bob = backend.generate_keypair().unwrap();

        let ab = backend
            .derive_shared_secret(alice.private_key(), bob.public_key())
            .unwrap();
        let ba = backend
            .derive_shared_secret(bob.private_key(), alice.public_key())
            .unwrap();

        assert_eq!(ab, ba);
        assert_eq!(ab.len(), 32);
    }

    #[test]
    fn test_sign_verify() {
        let backend = backend();
        let kp = Keypair::generate_secp256k1();

        for hash in HashType::ALL {
            let sig = backend.sign(b"agreement", kp.private_key(), hash).unwrap();
            assert_eq!(sig.len(), 64);
            assert!(backend.verify(b"agreement", kp.public_key(), &sig, hash).unwrap());
            assert!(!backend.verify(b"agreemenT", kp.public_key(), &sig, hash).unwrap());
        }
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let backend = backend();
        let signer = Keypair::generate_secp256k1();
        let other = Keypair::generate_secp256k1();

        let sig = backend
            .sign(b"message", signer.private_key(), HashType::Sha256)
            .unwrap();
        assert!(!backend
            .verify(b"message", other.public_key(), &sig, HashType::Sha256)
            .unwrap());
        assert!(!backend
            .verify(b"message", signer.public_key(), &[0u8; 12], HashType::Sha256)
            .unwrap());
    }

    #[test]
    fn test_rsa_keys_rejected() {
        let backend = backend();
        let rsa = Keypair::generate_rsa(1024).unwrap();
        let ec = Keypair::generate_secp256k1();

        assert!(matches!(
            backend.sign(b"x", rsa.private_key(), HashType::Sha256),
            Err(Error::UnsupportedKeyType(KeyType::LegacyRsa))
        ));
        assert!(matches!(
            backend.derive_shared_secret(ec.private_key(), rsa.public_key()),
            Err(Error::UnsupportedKeyType(KeyType::LegacyRsa))
        ));
    }

    #[test]
    fn test_not_initialized() {
        let general = Arc::new(GeneralBackend::new(false));
        general.init().unwrap();
        let backend = Secp256k1Backend::new(general.hasher().unwrap());

        assert!(matches!(
            backend.generate_keypair(),
            Err(Error::NotInitialized(_))
        ));
    }
}
