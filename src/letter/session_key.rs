//! # Session-Key Wrapping
//!
//! Per key type strategies for getting the master session key to each
//! recipient group.
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┬─────────────────────────┐
//! │ Key type     │ Strategy                     │ Entries per letter      │
//! ├──────────────┼──────────────────────────────┼─────────────────────────┤
//! │ secp256k1    │ EcdhWrap                     │ one per recipient       │
//! │ legacy-rsa   │ RsaBatchWrap                 │ one for all recipients  │
//! └──────────────┴──────────────────────────────┴─────────────────────────┘
//! ```
//!
//! ## ECDH Wrap
//!
//! ```text
//!   ephemeral_priv ──┐
//!                    ├─► ECDH ──► shared ──► HMAC(shared, nonce) ──► wrap key
//!   recipient_pub ───┘                                                 │
//!                                                                      ▼
//!   master key ──────────────────────────► AEAD(wrap key, iv = nonce) ──► entry
//! ```
//!
//! One ephemeral keypair serves every EC recipient of a letter, so an
//! opener derives the shared secret once and then tries each entry. Entry
//! order means nothing and is never used to identify a recipient.

use crate::crypto::{
    armor, base58check_decode, base58check_encode, dearmor, BackendRegistry, HashType, Hasher,
    KeyType, PrivateKey, PublicKey, SecretBuffer, SymmetricMode,
};
use crate::error::{Error, Result};

use super::Letter;

/// One wrapped copy of the master session key
///
/// ECDH entries carry the wrap mode, HMAC hash, Base58Check nonce and tag.
/// Batch RSA entries leave all four empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedSessionKey {
    pub(crate) algo: String,
    pub(crate) hmac: String,
    pub(crate) nonce: String,
    pub(crate) tag: String,
    pub(crate) blob: String,
}

impl WrappedSessionKey {
    /// Wrap mode name (`algo` attribute)
    pub fn algo(&self) -> &str {
        &self.algo
    }

    /// HMAC hash name (`hmac` attribute)
    pub fn hmac(&self) -> &str {
        &self.hmac
    }

    /// Base58Check nonce
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Base58Check AEAD tag
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Armored wrapped key
    pub fn armored_blob(&self) -> &str {
        &self.blob
    }

    /// Whether this entry was produced by the ECDH path
    pub fn is_ecdh(&self) -> bool {
        !self.algo.is_empty()
    }

    fn decode_blob(&self) -> Result<Vec<u8>> {
        dearmor(&self.blob)
    }
}

/// Entries (and the ephemeral key, if any) produced for one recipient group
pub(crate) struct WrapOutput {
    pub(crate) ephemeral_key: Option<String>,
    pub(crate) entries: Vec<WrappedSessionKey>,
}

/// Wrap/unwrap behavior for one key type
pub(crate) trait SessionKeyWrapper: Sync {
    /// Wrap `session_key` to every key in `recipients`
    fn wrap(
        &self,
        registry: &BackendRegistry,
        session_key: &SecretBuffer,
        recipients: &[&PublicKey],
    ) -> Result<WrapOutput>;

    /// Recover the session key from `letter` with `key`
    ///
    /// Fails with `SessionKeyUnwrapFailed` after every candidate entry has
    /// been tried.
    fn unwrap(
        &self,
        registry: &BackendRegistry,
        letter: &Letter,
        key: &PrivateKey,
    ) -> Result<SecretBuffer>;
}

/// Dispatch table from key type to wrapping strategy
pub(crate) fn wrapper_for(key_type: KeyType) -> &'static dyn SessionKeyWrapper {
    match key_type {
        KeyType::Secp256k1 => &EcdhWrap,
        KeyType::LegacyRsa => &RsaBatchWrap,
    }
}

/// Errors that end a trial loop instead of moving on to the next entry
fn is_fatal(err: &Error) -> bool {
    matches!(err, Error::NotInitialized(_))
}

// ============================================================================
// ECDH (secp256k1 recipients)
// ============================================================================

pub(crate) struct EcdhWrap;

impl EcdhWrap {
    fn wrapping_key(
        hasher: &dyn Hasher,
        hash: HashType,
        shared: &SecretBuffer,
        nonce: &[u8],
        mode: SymmetricMode,
    ) -> Result<SecretBuffer> {
        let mut key = hasher.hmac(hash, shared.as_bytes(), nonce)?;
        if key.len() < mode.key_size() {
            return Err(Error::InvalidKeyOrIvSize {
                what: "key",
                mode: mode.name(),
                expected: mode.key_size(),
                actual: key.len(),
            });
        }
        key.truncate(mode.key_size());
        Ok(key)
    }

    fn try_entry(
        registry: &BackendRegistry,
        entry: &WrappedSessionKey,
        shared: &SecretBuffer,
    ) -> Result<SecretBuffer> {
        let mode: SymmetricMode = entry.algo.parse()?;
        let hash: HashType = entry.hmac.parse()?;
        let nonce = base58check_decode(&entry.nonce)?;
        let tag = base58check_decode(&entry.tag)?;
        let blob = entry.decode_blob()?;

        let hasher = registry.hasher()?;
        let wrap_key = Self::wrapping_key(hasher.as_ref(), hash, shared, &nonce, mode)?;
        let master = registry
            .symmetric()?
            .decrypt(mode, &wrap_key, &nonce, Some(&tag), &blob)?;
        Ok(SecretBuffer::from_vec(master))
    }
}

impl SessionKeyWrapper for EcdhWrap {
    fn wrap(
        &self,
        registry: &BackendRegistry,
        session_key: &SecretBuffer,
        recipients: &[&PublicKey],
    ) -> Result<WrapOutput> {
        let agreement = registry.key_agreement(KeyType::Secp256k1)?;
        let hasher = registry.hasher()?;
        let symmetric = registry.symmetric()?;
        let util = registry.util()?;

        let mode = registry.config().session_key_mode;
        let hash = registry.config().ecdh_hmac;

        // One ephemeral keypair for every EC recipient of this letter
        let ephemeral = agreement.generate_keypair()?;

        let mut entries = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let shared = agreement.derive_shared_secret(ephemeral.private_key(), recipient)?;
            let (nonce, nonce_text) = util.nonce_with_text(mode.iv_size())?;
            let wrap_key = Self::wrapping_key(hasher.as_ref(), hash, &shared, &nonce, mode)?;

            let sealed = symmetric
                .encrypt(mode, &wrap_key, &nonce, session_key.as_bytes())?;
            let tag = sealed
                .tag
                .ok_or_else(|| Error::SessionKeyWrapFailed(format!("{} produced no tag", mode)))?;

            tracing::trace!(recipient = %recipient.fingerprint(), "Wrapped session key via ECDH");
            entries.push(WrappedSessionKey {
                algo: mode.name().to_string(),
                hmac: hash.name().to_string(),
                nonce: nonce_text,
                tag: base58check_encode(&tag),
                blob: armor(&sealed.ciphertext),
            });
        }

        Ok(WrapOutput {
            ephemeral_key: Some(ephemeral.public_key().to_hex()?),
            entries,
        })
    }

    fn unwrap(
        &self,
        registry: &BackendRegistry,
        letter: &Letter,
        key: &PrivateKey,
    ) -> Result<SecretBuffer> {
        let agreement = registry.key_agreement(KeyType::Secp256k1)?;
        let ephemeral_hex = letter.ephemeral_key().ok_or(Error::MissingEphemeralKey)?;
        let ephemeral = PublicKey::from_hex(KeyType::Secp256k1, ephemeral_hex)
            .map_err(|e| Error::MalformedEnvelope(format!("ephemeral key: {}", e)))?;

        let shared = agreement.derive_shared_secret(key, &ephemeral)?;

        let candidates = letter.session_keys().iter().filter(|entry| entry.is_ecdh());
        for (index, entry) in candidates.enumerate() {
            match Self::try_entry(registry, entry, &shared) {
                Ok(master) => {
                    tracing::debug!(entry = index, "Unwrapped session key via ECDH");
                    return Ok(master);
                }
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) => tracing::trace!(entry = index, error = %e, "Entry not for this key"),
            }
        }

        Err(Error::SessionKeyUnwrapFailed)
    }
}

// ============================================================================
// BATCH RSA (legacy recipients)
// ============================================================================

pub(crate) struct RsaBatchWrap;

impl SessionKeyWrapper for RsaBatchWrap {
    fn wrap(
        &self,
        registry: &BackendRegistry,
        session_key: &SecretBuffer,
        recipients: &[&PublicKey],
    ) -> Result<WrapOutput> {
        let blob = registry
            .key_wrap(KeyType::LegacyRsa)?
            .wrap(recipients, session_key)?;

        Ok(WrapOutput {
            ephemeral_key: None,
            entries: vec![WrappedSessionKey {
                algo: String::new(),
                hmac: String::new(),
                nonce: String::new(),
                tag: String::new(),
                blob: armor(&blob),
            }],
        })
    }

    fn unwrap(
        &self,
        registry: &BackendRegistry,
        letter: &Letter,
        key: &PrivateKey,
    ) -> Result<SecretBuffer> {
        let key_wrap = registry.key_wrap(KeyType::LegacyRsa)?;

        // Normally a single entry, but every batch entry is tried
        let candidates = letter.session_keys().iter().filter(|entry| !entry.is_ecdh());
        for (index, entry) in candidates.enumerate() {
            let attempt = entry
                .decode_blob()
                .and_then(|blob| key_wrap.unwrap(&blob, key));
            match attempt {
                Ok(master) => {
                    tracing::debug!(entry = index, "Unwrapped session key via RSA batch");
                    return Ok(master);
                }
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) => tracing::trace!(entry = index, error = %e, "Entry not for this key"),
            }
        }

        Err(Error::SessionKeyUnwrapFailed)
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

    fn registry() -> BackendRegistry {
        BackendRegistry::new(&CryptoConfig::default()).unwrap()
    }

    fn letter_with(output: WrapOutput) -> Letter {
        Letter::new(
            output.ephemeral_key,
            "iv".into(),
            "tag".into(),
            "aes-256-gcm".into(),
            "ciphertext".into(),
            output.entries,
        )
    }

    #[test]
    fn test_dispatch_table() {
        let registry = registry();
        let master = SecretBuffer::random(32).unwrap();
        let ec = Keypair::generate_secp256k1();

        let output = wrapper_for(KeyType::Secp256k1)
            .wrap(&registry, &master, &[ec.public_key()])
            .unwrap();
        assert!(output.ephemeral_key.is_some());
        assert!(output.entries.iter().all(WrappedSessionKey::is_ecdh));
    }

    #[test]
    fn test_ecdh_each_recipient_finds_its_entry() {
        let registry = registry();
        let master = SecretBuffer::random(32).unwrap();
        let recipients: Vec<Keypair> = (0..3).map(|_| Keypair::generate_secp256k1()).collect();
        let publics: Vec<&PublicKey> = recipients.iter().map(Keypair::public_key).collect();

        let output = EcdhWrap.wrap(&registry, &master, &publics).unwrap();
        assert_eq!(output.entries.len(), 3);
        let entry = &output.entries[0];
        assert_eq!(entry.algo(), "aes-256-gcm");
        assert_eq!(entry.hmac(), "sha256");
        let letter = letter_with(output);

        for recipient in &recipients {
            let recovered = EcdhWrap
                .unwrap(&registry, &letter, recipient.private_key())
                .unwrap();
            assert_eq!(recovered, master);
        }

        let outsider = Keypair::generate_secp256k1();
        assert!(matches!(
            EcdhWrap.unwrap(&registry, &letter, outsider.private_key()),
            Err(Error::SessionKeyUnwrapFailed)
        ));
    }

    #[test]
    fn test_ecdh_entries_use_distinct_nonces() {
        let registry = registry();
        let master = SecretBuffer::random(32).unwrap();
        let kp = Keypair::generate_secp256k1();

        let output = EcdhWrap
            .wrap(&registry, &master, &[kp.public_key(), kp.public_key()])
            .unwrap();
        assert_ne!(output.entries[0].nonce(), output.entries[1].nonce());
        assert_ne!(output.entries[0].armored_blob(), output.entries[1].armored_blob());
    }

    #[test]
    fn test_ecdh_requires_ephemeral_key() {
        let registry = registry();
        let master = SecretBuffer::random(32).unwrap();
        let kp = Keypair::generate_secp256k1();

        let mut output = EcdhWrap.wrap(&registry, &master, &[kp.public_key()]).unwrap();
        output.ephemeral_key = None;
        let letter = letter_with(output);

        assert!(matches!(
            EcdhWrap.unwrap(&registry, &letter, kp.private_key()),
            Err(Error::MissingEphemeralKey)
        ));
    }

    #[test]
    fn test_rsa_batch_single_entry() {
        let registry = registry();
        let master = SecretBuffer::random(32).unwrap();
        let alice = Keypair::generate_rsa(1024).unwrap();
        let bob = Keypair::generate_rsa(1024).unwrap();

        let output = RsaBatchWrap
            .wrap(&registry, &master, &[alice.public_key(), bob.public_key()])
            .unwrap();
        assert!(output.ephemeral_key.is_none());
        assert_eq!(output.entries.len(), 1);
        assert!(!output.entries[0].is_ecdh());
        assert!(output.entries[0].nonce().is_empty() && output.entries[0].tag().is_empty());

        let letter = letter_with(output);
        for kp in [&alice, &bob] {
            let recovered = RsaBatchWrap.unwrap(&registry, &letter, kp.private_key()).unwrap();
            assert_eq!(recovered, master);
        }
    }

    #[test]
    fn test_wrap_after_close_is_fatal() {
        let registry = registry();
        let master = SecretBuffer::random(32).unwrap();
        let kp = Keypair::generate_secp256k1();
        let letter = letter_with(EcdhWrap.wrap(&registry, &master, &[kp.public_key()]).unwrap());

        registry.close();
        assert!(matches!(
            EcdhWrap.unwrap(&registry, &letter, kp.private_key()),
            Err(Error::NotInitialized(_))
        ));
    }
}
