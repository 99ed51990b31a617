//! Seal and open.

use std::collections::BTreeMap;

use crate::crypto::{
    armor, base58check_decode, base58check_encode, dearmor, BackendRegistry, KeyType, PrivateKey,
    PublicKey, SymmetricMode,
};
use crate::error::{Error, Result};

use super::session_key::wrapper_for;
use super::{fold_error, Letter};

impl Letter {
    /// Encrypt `plaintext` once and address it to every key in `recipients`
    ///
    /// Returns the armored letter. Fails without producing output if any
    /// recipient group cannot be served; recipients are never silently
    /// dropped.
    pub fn seal(
        registry: &BackendRegistry,
        recipients: &[PublicKey],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        if recipients.is_empty() {
            return Err(Error::NoRecipients);
        }
        if plaintext.is_empty() {
            return Err(Error::EncryptionFailed("plaintext is empty".into()));
        }

        let mut groups: BTreeMap<KeyType, Vec<&PublicKey>> = BTreeMap::new();
        for recipient in recipients {
            groups.entry(recipient.key_type()).or_default().push(recipient);
        }

        let mode = registry.config().plaintext_mode;
        tracing::debug!(
            recipients = recipients.len(),
            groups = groups.len(),
            %mode,
            "Sealing letter"
        );

        let util = registry.util()?;
        let master = util.random_secret(mode.key_size())?;
        let (iv, iv_text) = util.nonce_with_text(mode.iv_size())?;

        let sealed = registry
            .symmetric()?
            .encrypt(mode, &master, &iv, plaintext)
            .map_err(|e| fold_error(e, Error::EncryptionFailed))?;
        let tag = sealed
            .tag
            .ok_or_else(|| Error::EncryptionFailed(format!("{} produced no tag", mode)))?;

        let mut ephemeral_key = None;
        let mut session_keys = Vec::new();
        for (key_type, group) in &groups {
            let output = wrapper_for(*key_type)
                .wrap(registry, &master, group)
                .map_err(|e| fold_error(e, Error::SessionKeyWrapFailed))?;
            tracing::debug!(
                %key_type,
                recipients = group.len(),
                entries = output.entries.len(),
                "Wrapped session key for recipient group"
            );

            if output.ephemeral_key.is_some() {
                ephemeral_key = output.ephemeral_key;
            }
            session_keys.extend(output.entries);
        }

        let letter = Letter::new(
            ephemeral_key,
            iv_text,
            base58check_encode(&tag),
            mode.name().to_string(),
            armor(&sealed.ciphertext),
            session_keys,
        );
        Ok(letter.to_bytes())
    }

    /// Open an armored letter with one recipient's private key
    ///
    /// `SessionKeyUnwrapFailed` means the key is not a recipient (or its
    /// entry is corrupted); `AeadDecryptFailed` means the body was tampered
    /// with.
    pub fn open(registry: &BackendRegistry, envelope: &[u8], key: &PrivateKey) -> Result<Vec<u8>> {
        let letter = Letter::parse(envelope)?;

        let mode = letter.mode()?;
        let symmetric = registry.symmetric()?;
        if !symmetric.supports(mode) {
            return Err(Error::UnsupportedCipherMode(mode.name().to_string()));
        }

        let iv = base58check_decode(letter.iv())?;
        let tag = base58check_decode(letter.aead_tag())?;
        let ciphertext = dearmor(letter.ciphertext())?;
        check_size("iv", mode, iv.len(), mode.iv_size())?;
        check_size("tag", mode, tag.len(), mode.tag_size())?;

        tracing::debug!(
            key_type = %key.key_type(),
            entries = letter.session_keys().len(),
            %mode,
            "Opening letter"
        );

        let master = wrapper_for(key.key_type())
            .unwrap(registry, &letter, key)
            .map_err(|e| {
                if matches!(e, Error::SessionKeyUnwrapFailed) {
                    tracing::debug!(
                        recipient = %key.public_key().fingerprint(),
                        "No session key entry opened with this key"
                    );
                }
                e
            })?;

        symmetric
            .decrypt(mode, &master, &iv, Some(&tag), &ciphertext)
            .map_err(|e| {
                if matches!(e, Error::AeadDecryptFailed) {
                    tracing::warn!("Letter body failed authentication");
                }
                e
            })
    }
}

/// Header fields must fit the body mode before any key material is used
fn check_size(what: &str, mode: SymmetricMode, actual: usize, expected: usize) -> Result<()> {
    if actual == expected {
        return Ok(());
    }
    Err(Error::MalformedEnvelope(format!(
        "{} is {} bytes, {} needs {}",
        what, actual, mode, expected
    )))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::CryptoConfig;
    use crate::crypto::{Backend, Keypair, SecretBuffer, SymmetricCipher, SymmetricCiphertext};

    fn registry() -> BackendRegistry {
        BackendRegistry::new(&CryptoConfig::default()).unwrap()
    }

    /// Cipher engine that rejects one mode and delegates the rest
    struct FaultyCipher {
        inner: Arc<dyn SymmetricCipher>,
        broken: SymmetricMode,
    }

    impl Backend for FaultyCipher {
        fn name(&self) -> &'static str {
            "faulty"
        }

        fn key_types(&self) -> Vec<KeyType> {
            Vec::new()
        }

        fn init(&self) -> Result<()> {
            Ok(())
        }

        fn shutdown(&self) {}

        fn symmetric(self: Arc<Self>) -> Option<Arc<dyn SymmetricCipher>> {
            Some(self)
        }
    }

    impl SymmetricCipher for FaultyCipher {
        fn supports(&self, mode: SymmetricMode) -> bool {
            self.inner.supports(mode)
        }

        fn encrypt(
            &self,
            mode: SymmetricMode,
            key: &SecretBuffer,
            iv: &[u8],
            plaintext: &[u8],
        ) -> Result<SymmetricCiphertext> {
            if mode == self.broken {
                return Err(Error::InvalidKey("engine rejected key".into()));
            }
            self.inner.encrypt(mode, key, iv, plaintext)
        }

        fn decrypt(
            &self,
            mode: SymmetricMode,
            key: &SecretBuffer,
            iv: &[u8],
            tag: Option<&[u8]>,
            ciphertext: &[u8],
        ) -> Result<Vec<u8>> {
            self.inner.decrypt(mode, key, iv, tag, ciphertext)
        }
    }

    /// Registry whose cipher fails for `broken`; body in chacha, keys in aes-128
    fn faulty_registry(broken: SymmetricMode) -> BackendRegistry {
        let config = CryptoConfig {
            plaintext_mode: SymmetricMode::ChaCha20Poly1305,
            session_key_mode: SymmetricMode::Aes128Gcm,
            ..CryptoConfig::default()
        };
        let registry = BackendRegistry::new(&config).unwrap();
        let inner = registry.symmetric().unwrap();
        registry
            .with_backend(Arc::new(FaultyCipher { inner, broken }))
            .unwrap()
    }

    #[test]
    fn test_hello_world_ec() {
        let registry = registry();
        let r = Keypair::generate_secp256k1();
        let s = Keypair::generate_secp256k1();

        let envelope = Letter::seal(&registry, &[r.public_key().clone()], b"hello world").unwrap();
        assert!(!envelope.is_empty());

        let opened = Letter::open(&registry, &envelope, r.private_key()).unwrap();
        assert_eq!(opened, b"hello world");

        assert!(matches!(
            Letter::open(&registry, &envelope, s.private_key()),
            Err(Error::SessionKeyUnwrapFailed)
        ));
    }

    #[test]
    fn test_rsa_round_trip() {
        let registry = registry();
        let a = Keypair::generate_rsa(1024).unwrap();
        let b = Keypair::generate_rsa(1024).unwrap();
        let recipients = [a.public_key().clone(), b.public_key().clone()];

        let envelope = Letter::seal(&registry, &recipients, b"legacy recipients").unwrap();
        let letter = Letter::parse(&envelope).unwrap();
        assert_eq!(letter.ephemeral_key(), None);
        assert_eq!(letter.session_keys().len(), 1);

        for kp in [&a, &b] {
            assert_eq!(
                Letter::open(&registry, &envelope, kp.private_key()).unwrap(),
                b"legacy recipients"
            );
        }
    }

    #[test]
    fn test_mixed_recipients_layout() {
        let registry = registry();
        let ec1 = Keypair::generate_secp256k1();
        let ec2 = Keypair::generate_secp256k1();
        let rsa = Keypair::generate_rsa(1024).unwrap();
        let recipients = [
            ec1.public_key().clone(),
            rsa.public_key().clone(),
            ec2.public_key().clone(),
        ];

        let envelope = Letter::seal(&registry, &recipients, b"mixed").unwrap();
        let letter = Letter::parse(&envelope).unwrap();

        let ec_entries = letter.session_keys().iter().filter(|e| e.is_ecdh()).count();
        let rsa_entries = letter.session_keys().len() - ec_entries;
        assert_eq!(ec_entries, 2);
        assert_eq!(rsa_entries, 1);
        assert!(letter.ephemeral_key().is_some());

        for kp in [&ec1, &ec2, &rsa] {
            assert_eq!(Letter::open(&registry, &envelope, kp.private_key()).unwrap(), b"mixed");
        }
    }

    #[test]
    fn test_no_recipients() {
        let registry = registry();
        assert!(matches!(
            Letter::seal(&registry, &[], b"nobody"),
            Err(Error::NoRecipients)
        ));
    }

    #[test]
    fn test_empty_plaintext_rejected() {
        let registry = registry();
        let kp = Keypair::generate_secp256k1();
        assert!(matches!(
            Letter::seal(&registry, &[kp.public_key().clone()], b""),
            Err(Error::EncryptionFailed(_))
        ));
    }

    #[test]
    fn test_disabled_backend_fails_whole_seal() {
        let config = CryptoConfig {
            enable_legacy_rsa: false,
            ..CryptoConfig::default()
        };
        let registry = BackendRegistry::new(&config).unwrap();
        let ec = Keypair::generate_secp256k1();
        let rsa = Keypair::generate_rsa(1024).unwrap();

        let result = Letter::seal(
            &registry,
            &[ec.public_key().clone(), rsa.public_key().clone()],
            b"partial",
        );
        assert!(matches!(result, Err(Error::UnsupportedKeyType(KeyType::LegacyRsa))));
    }

    #[test]
    fn test_ec_opener_needs_ephemeral_key() {
        let registry = registry();
        let rsa = Keypair::generate_rsa(1024).unwrap();
        let ec = Keypair::generate_secp256k1();

        let envelope = Letter::seal(&registry, &[rsa.public_key().clone()], b"rsa only").unwrap();
        assert!(matches!(
            Letter::open(&registry, &envelope, ec.private_key()),
            Err(Error::MissingEphemeralKey)
        ));
    }

    #[test]
    fn test_unknown_mode_checked_before_keys() {
        let registry = registry();
        let kp = Keypair::generate_secp256k1();
        let envelope = Letter::seal(&registry, &[kp.public_key().clone()], b"x").unwrap();

        let mut letter = Letter::parse(&envelope).unwrap();
        letter.mode = "des-cbc".into();
        assert!(matches!(
            Letter::open(&registry, &letter.to_bytes(), kp.private_key()),
            Err(Error::UnsupportedCipherMode(_))
        ));
    }

    #[test]
    fn test_bad_iv_encoding() {
        let registry = registry();
        let kp = Keypair::generate_secp256k1();
        let envelope = Letter::seal(&registry, &[kp.public_key().clone()], b"x").unwrap();

        let mut letter = Letter::parse(&envelope).unwrap();
        letter.iv = "0OIl".into();
        assert!(matches!(
            Letter::open(&registry, &letter.to_bytes(), kp.private_key()),
            Err(Error::EncodingError(_))
        ));
    }

    #[test]
    fn test_configured_modes_are_used() {
        let config = CryptoConfig {
            plaintext_mode: SymmetricMode::ChaCha20Poly1305,
            session_key_mode: SymmetricMode::Aes128Gcm,
            ..CryptoConfig::default()
        };
        let custom = BackendRegistry::new(&config).unwrap();
        let kp = Keypair::generate_secp256k1();

        let envelope = Letter::seal(&custom, &[kp.public_key().clone()], b"modes").unwrap();
        let letter = Letter::parse(&envelope).unwrap();
        assert_eq!(letter.mode_name(), "chacha20-poly1305");
        assert_eq!(letter.session_keys()[0].algo(), "aes-128-gcm");

        // Opening only depends on what the letter says, not the opener's defaults
        assert_eq!(
            Letter::open(&registry(), &envelope, kp.private_key()).unwrap(),
            b"modes"
        );
    }

    #[test]
    fn test_wrong_iv_size_rejected_before_unwrap() {
        let registry = registry();
        let kp = Keypair::generate_secp256k1();
        let outsider = Keypair::generate_secp256k1();
        let envelope = Letter::seal(&registry, &[kp.public_key().clone()], b"x").unwrap();

        let mut letter = Letter::parse(&envelope).unwrap();
        letter.iv = base58check_encode(&[7u8; 16]);
        let tampered = letter.to_bytes();

        // Same answer for a recipient and an outsider: no key is tried
        for key in [kp.private_key(), outsider.private_key()] {
            assert!(matches!(
                Letter::open(&registry, &tampered, key),
                Err(Error::MalformedEnvelope(_))
            ));
        }
    }

    #[test]
    fn test_wrong_tag_size_rejected_before_unwrap() {
        let registry = registry();
        let kp = Keypair::generate_rsa(1024).unwrap();
        let envelope = Letter::seal(&registry, &[kp.public_key().clone()], b"x").unwrap();

        let mut letter = Letter::parse(&envelope).unwrap();
        let tag = base58check_decode(letter.aead_tag()).unwrap();
        letter.tag = base58check_encode(&tag[..8]);

        assert!(matches!(
            Letter::open(&registry, &letter.to_bytes(), kp.private_key()),
            Err(Error::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_body_cipher_failure_is_encryption_failed() {
        let registry = faulty_registry(SymmetricMode::ChaCha20Poly1305);
        let kp = Keypair::generate_secp256k1();

        assert!(matches!(
            Letter::seal(&registry, &[kp.public_key().clone()], b"body"),
            Err(Error::EncryptionFailed(_))
        ));
    }

    #[test]
    fn test_wrap_cipher_failure_is_session_key_wrap_failed() {
        let registry = faulty_registry(SymmetricMode::Aes128Gcm);
        let kp = Keypair::generate_secp256k1();

        assert!(matches!(
            Letter::seal(&registry, &[kp.public_key().clone()], b"body"),
            Err(Error::SessionKeyWrapFailed(_))
        ));
    }

    #[test]
    fn test_seal_on_closed_registry_reports_lifecycle() {
        let registry = registry();
        let kp = Keypair::generate_secp256k1();
        registry.close();

        assert!(matches!(
            Letter::seal(&registry, &[kp.public_key().clone()], b"late"),
            Err(Error::NotInitialized(_))
        ));
    }
}
