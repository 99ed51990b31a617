//! # Contract Signing
//!
//! Signs and verifies the canonical unsigned text of a document.
//!
//! ## Signed Bytes
//!
//! ```text
//! ┌──────────────────────────────────────────────┬──────┐
//! │ unsigned_contents() as UTF-8                 │ 0x00 │
//! └──────────────────────────────────────────────┴──────┘
//! ```
//!
//! The terminating zero byte is always covered by the signature, so the
//! signed region is unambiguous even when the text later passes through
//! C-string handling. Sign and verify share [`signing_plaintext`]; nothing
//! else builds these bytes.

use crate::crypto::{armor, dearmor, BackendRegistry, HashType, PrivateKey, PublicKey};
use crate::error::Result;

/// A document with a canonical unsigned serialization
pub trait CanonicalDocument {
    /// The exact text that signatures cover
    fn unsigned_contents(&self) -> String;
}

impl CanonicalDocument for str {
    fn unsigned_contents(&self) -> String {
        self.to_string()
    }
}

impl CanonicalDocument for String {
    fn unsigned_contents(&self) -> String {
        self.clone()
    }
}

/// Bytes handed to the signer for `document`
pub fn signing_plaintext<D: CanonicalDocument + ?Sized>(document: &D) -> Vec<u8> {
    let mut bytes = document.unsigned_contents().into_bytes();
    bytes.push(0);
    bytes
}

/// A detached signature over a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSignature {
    hash: HashType,
    bytes: Vec<u8>,
}

impl ContractSignature {
    /// Wrap raw signature bytes produced under `hash`
    pub fn new(hash: HashType, bytes: Vec<u8>) -> Self {
        Self { hash, bytes }
    }

    /// Hash the signature was made with
    pub fn hash(&self) -> HashType {
        self.hash
    }

    /// Raw signature bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Armored text form, as stored inside signed documents
    pub fn to_armored(&self) -> String {
        armor(&self.bytes)
    }

    /// Parse the armored text form
    pub fn from_armored(hash: HashType, text: &str) -> Result<Self> {
        Ok(Self::new(hash, dearmor(text)?))
    }
}

/// Drives the key-type-appropriate signer over canonical document bytes
pub struct ContractSigner<'a> {
    registry: &'a BackendRegistry,
}

impl<'a> ContractSigner<'a> {
    /// Create a signer resolving backends through `registry`
    pub fn new(registry: &'a BackendRegistry) -> Self {
        Self { registry }
    }

    /// Sign with the configured default hash
    pub fn sign_contract<D: CanonicalDocument + ?Sized>(
        &self,
        document: &D,
        key: &PrivateKey,
    ) -> Result<ContractSignature> {
        self.sign_contract_with(document, key, self.registry.config().signature_hash)
    }

    /// Sign with an explicit hash
    pub fn sign_contract_with<D: CanonicalDocument + ?Sized>(
        &self,
        document: &D,
        key: &PrivateKey,
        hash: HashType,
    ) -> Result<ContractSignature> {
        let signer = self.registry.signer(key.key_type())?;
        let plaintext = signing_plaintext(document);

        let bytes = signer.sign(&plaintext, key, hash)?;
        tracing::debug!(
            key_type = %key.key_type(),
            signer = %key.public_key().fingerprint(),
            %hash,
            "Signed contract"
        );
        Ok(ContractSignature::new(hash, bytes))
    }

    /// Check `signature` against the document as it is now
    ///
    /// `Ok(false)` means the document or signature was altered, or the key
    /// did not sign it.
    pub fn verify_contract_signature<D: CanonicalDocument + ?Sized>(
        &self,
        document: &D,
        key: &PublicKey,
        signature: &ContractSignature,
    ) -> Result<bool> {
        let signer = self.registry.signer(key.key_type())?;
        let plaintext = signing_plaintext(document);

        let valid = signer.verify(&plaintext, key, signature.as_bytes(), signature.hash())?;
        if !valid {
            tracing::debug!(signer = %key.fingerprint(), "Contract signature did not verify");
        }
        Ok(valid)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CryptoConfig;
    use crate::crypto::Keypair;
    use crate::error::Error;
    use proptest::prelude::*;

    const CONTRACT: &str = concat!(
        "<contract version=\"1\">\n",
        "  <terms>Pay 10 units on demand</terms>\n",
        "</contract>\n"
    );

    fn registry() -> BackendRegistry {
        BackendRegistry::new(&CryptoConfig::default()).unwrap()
    }

    #[test]
    fn test_signing_plaintext_appends_terminator() {
        let bytes = signing_plaintext("abc");
        assert_eq!(bytes, b"abc\0");
        assert_eq!(signing_plaintext(&String::from("abc")), bytes);
    }

    #[test]
    fn test_golden_round_trip_secp256k1() {
        let registry = registry();
        let signer = ContractSigner::new(&registry);
        let kp = Keypair::generate_secp256k1();

        let sig = signer.sign_contract(CONTRACT, kp.private_key()).unwrap();
        assert_eq!(sig.hash(), HashType::Sha256);

        // Verify from a separately built String with the same text
        let reloaded = String::from(CONTRACT);
        assert!(signer
            .verify_contract_signature(&reloaded, kp.public_key(), &sig)
            .unwrap());
    }

    #[test]
    fn test_golden_round_trip_rsa() {
        let registry = registry();
        let signer = ContractSigner::new(&registry);
        let kp = Keypair::generate_rsa(1024).unwrap();

        let sig = signer
            .sign_contract_with(CONTRACT, kp.private_key(), HashType::Sha512)
            .unwrap();
        assert!(signer
            .verify_contract_signature(CONTRACT, kp.public_key(), &sig)
            .unwrap());
        assert!(!signer
            .verify_contract_signature("<contract/>", kp.public_key(), &sig)
            .unwrap());
    }

    #[test]
    fn test_signature_covers_terminator() {
        let registry = registry();
        let kp = Keypair::generate_secp256k1();
        let backend = registry.signer(kp.key_type()).unwrap();

        // A signature over the bare text, without the terminator, must not verify
        let bare = backend
            .sign(CONTRACT.as_bytes(), kp.private_key(), HashType::Sha256)
            .unwrap();
        let sig = ContractSignature::new(HashType::Sha256, bare);
        assert!(!ContractSigner::new(&registry)
            .verify_contract_signature(CONTRACT, kp.public_key(), &sig)
            .unwrap());
    }

    #[test]
    fn test_armored_signature() {
        let registry = registry();
        let signer = ContractSigner::new(&registry);
        let kp = Keypair::generate_secp256k1();

        let sig = signer.sign_contract(CONTRACT, kp.private_key()).unwrap();
        let restored =
            ContractSignature::from_armored(HashType::Sha256, &sig.to_armored()).unwrap();
        assert_eq!(restored, sig);
        assert!(signer
            .verify_contract_signature(CONTRACT, kp.public_key(), &restored)
            .unwrap());
    }

    #[test]
    fn test_unsupported_key_type() {
        let config = CryptoConfig {
            enable_legacy_rsa: false,
            ..CryptoConfig::default()
        };
        let registry = BackendRegistry::new(&config).unwrap();
        let kp = Keypair::generate_rsa(1024).unwrap();

        let result = ContractSigner::new(&registry).sign_contract(CONTRACT, kp.private_key());
        assert!(matches!(result, Err(Error::UnsupportedKeyType(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_any_byte_mutation_breaks_signature(
            index in 0..CONTRACT.len(),
            replacement in b'!'..=b'~',
        ) {
            let registry = registry();
            let signer = ContractSigner::new(&registry);
            let kp = Keypair::generate_secp256k1();
            let sig = signer.sign_contract(CONTRACT, kp.private_key()).unwrap();

            let mut mutated = CONTRACT.as_bytes().to_vec();
            prop_assume!(mutated[index] != replacement);
            mutated[index] = replacement;
            let mutated = String::from_utf8(mutated).unwrap();

            prop_assert!(!signer
                .verify_contract_signature(&mutated, kp.public_key(), &sig)
                .unwrap());
        }
    }
}
