//! # Letters
//!
//! A letter is a document encrypted once and addressed to any mix of
//! secp256k1 and legacy RSA recipients. Any single recipient can open it
//! with only their own private key, and nothing in the letter says which
//! wrapped key belongs to whom.
//!
//! ## Wire Format
//!
//! ```text
//! <letter ephemeralkey="HEX|" iv="BASE58CHECK" tag="BASE58CHECK" mode="aes-256-gcm">
//! <sessionkey algo="aes-256-gcm" hmac="sha256" nonce="BASE58CHECK" tag="BASE58CHECK">
//! ARMOR
//! </sessionkey>
//! <sessionkey algo="" hmac="" nonce="" tag="">      ◄── batch RSA entry
//! ARMOR
//! </sessionkey>
//! <ciphertext>
//! ARMOR
//! </ciphertext>
//! </letter>
//! ```
//!
//! The whole document is armored once more; callers only ever see opaque
//! bytes from [`Letter::seal`] and hand the same bytes to [`Letter::open`].
//!
//! ## Seal / Open
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                             SEAL                                        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  recipients ──► partition by KeyType                                    │
//! │  master key + IV ──► AEAD(plaintext) ──► ciphertext, tag                │
//! │  secp256k1 group ──► EcdhWrap ──► N entries + ephemeral key             │
//! │  legacy-rsa group ──► RsaBatchWrap ──► 1 entry                          │
//! │  assemble ──► tag tree ──► armor ──► bytes                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                             OPEN                                        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  bytes ──► dearmor ──► tag tree ──► Letter    (MalformedEnvelope)       │
//! │  mode check                                   (UnsupportedCipherMode)   │
//! │  decode IV, tag, ciphertext                   (EncodingError)           │
//! │  IV and tag sizes match the mode              (MalformedEnvelope)       │
//! │  wrapper_for(key type).unwrap, trying entries (SessionKeyUnwrapFailed)  │
//! │  AEAD decrypt                                 (AeadDecryptFailed)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both directions fail closed: the first error aborts the call, and no
//! partial letter or plaintext is ever returned.

mod protocol;
mod session_key;
mod tag;

pub use session_key::WrappedSessionKey;

use crate::contract::CanonicalDocument;
use crate::crypto::{armor, dearmor, SymmetricMode};
use crate::error::{Error, Result};

use tag::Tag;

/// A parsed (or freshly assembled) letter
///
/// Fields hold their wire text; decoding happens when the letter is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Letter {
    ephemeral_key: Option<String>,
    iv: String,
    tag: String,
    mode: String,
    ciphertext: String,
    session_keys: Vec<WrappedSessionKey>,
}

impl Letter {
    pub(crate) fn new(
        ephemeral_key: Option<String>,
        iv: String,
        tag: String,
        mode: String,
        ciphertext: String,
        session_keys: Vec<WrappedSessionKey>,
    ) -> Self {
        Self {
            ephemeral_key,
            iv,
            tag,
            mode,
            ciphertext,
            session_keys,
        }
    }

    /// Hex-encoded ephemeral secp256k1 public key, present iff the letter
    /// has elliptic-curve recipients
    pub fn ephemeral_key(&self) -> Option<&str> {
        self.ephemeral_key.as_deref()
    }

    /// Base58Check IV
    pub fn iv(&self) -> &str {
        &self.iv
    }

    /// Base58Check AEAD tag
    pub fn aead_tag(&self) -> &str {
        &self.tag
    }

    /// Symmetric mode of the body
    pub fn mode(&self) -> Result<SymmetricMode> {
        self.mode.parse()
    }

    /// Mode name exactly as written on the wire
    pub fn mode_name(&self) -> &str {
        &self.mode
    }

    /// Wrapped session keys in wire order
    pub fn session_keys(&self) -> &[WrappedSessionKey] {
        &self.session_keys
    }

    /// Armored ciphertext
    pub fn ciphertext(&self) -> &str {
        &self.ciphertext
    }

    // ========================================================================
    // SERIALIZATION
    // ========================================================================

    fn to_tag(&self) -> Tag {
        let mut root = Tag::new("letter");
        root.add_attribute("ephemeralkey", self.ephemeral_key.as_deref().unwrap_or(""));
        root.add_attribute("iv", self.iv.as_str());
        root.add_attribute("tag", self.tag.as_str());
        root.add_attribute("mode", self.mode.as_str());

        for entry in &self.session_keys {
            let mut node = Tag::new("sessionkey");
            node.add_attribute("algo", entry.algo.as_str());
            node.add_attribute("hmac", entry.hmac.as_str());
            node.add_attribute("nonce", entry.nonce.as_str());
            node.add_attribute("tag", entry.tag.as_str());
            node.set_text(entry.blob.as_str());
            root.add_child(node);
        }

        root.add_child(Tag::with_text("ciphertext", self.ciphertext.as_str()));
        root
    }

    fn from_tag(root: &Tag) -> Result<Self> {
        if root.name() != "letter" {
            return Err(Error::MalformedEnvelope(format!(
                "expected <letter>, found <{}>",
                root.name()
            )));
        }

        let required = |name: &str| {
            root.attribute(name)
                .map(str::to_string)
                .ok_or_else(|| Error::MalformedEnvelope(format!("missing '{}' attribute", name)))
        };
        let iv = required("iv")?;
        let tag = required("tag")?;
        let mode = required("mode")?;
        let ephemeral_key = root
            .attribute("ephemeralkey")
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        let mut ciphertexts = root.children_named("ciphertext");
        let ciphertext = match (ciphertexts.next(), ciphertexts.next()) {
            (Some(node), None) if !node.text().is_empty() => node.text().to_string(),
            (Some(_), None) => return Err(Error::MalformedEnvelope("empty ciphertext".into())),
            (None, _) => return Err(Error::MalformedEnvelope("no ciphertext".into())),
            (Some(_), Some(_)) => {
                return Err(Error::MalformedEnvelope("more than one ciphertext".into()))
            }
        };

        let session_keys = root
            .children_named("sessionkey")
            .map(|node| {
                if node.text().is_empty() {
                    return Err(Error::MalformedEnvelope("empty session key".into()));
                }
                let field = |name: &str| node.attribute(name).unwrap_or("").to_string();
                Ok(WrappedSessionKey {
                    algo: field("algo"),
                    hmac: field("hmac"),
                    nonce: field("nonce"),
                    tag: field("tag"),
                    blob: node.text().to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if session_keys.is_empty() {
            return Err(Error::MalformedEnvelope("no session keys".into()));
        }

        Ok(Self::new(ephemeral_key, iv, tag, mode, ciphertext, session_keys))
    }

    /// Tag-tree text of the letter, before the outer armor
    pub fn to_xml(&self) -> String {
        self.to_tag().to_xml()
    }

    /// Parse tag-tree text
    pub fn from_xml(xml: &str) -> Result<Self> {
        Self::from_tag(&Tag::parse(xml)?)
    }

    /// Serialize to the opaque armored form exchanged with callers
    pub fn to_bytes(&self) -> Vec<u8> {
        armor(self.to_xml().as_bytes()).into_bytes()
    }

    /// Parse the opaque armored form
    ///
    /// Every structural problem, including a broken outer armor, is
    /// reported as `MalformedEnvelope`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| Error::MalformedEnvelope("envelope is not text".into()))?;
        let xml = dearmor(text)
            .map_err(|e| Error::MalformedEnvelope(format!("outer armor: {}", e)))?;
        let xml = String::from_utf8(xml)
            .map_err(|_| Error::MalformedEnvelope("letter is not UTF-8".into()))?;

        Self::from_xml(&xml)
    }
}

/// Keep lifecycle and configuration errors; fold the rest into `into`
pub(crate) fn fold_error(err: Error, into: fn(String) -> Error) -> Error {
    match err {
        err if err.is_configuration_error() => err,
        Error::EncryptionFailed(reason) | Error::SessionKeyWrapFailed(reason) => into(reason),
        err => into(err.to_string()),
    }
}

impl CanonicalDocument for Letter {
    fn unsigned_contents(&self) -> String {
        self.to_xml()
    }
}

// ============================================================================
// TESTS
// ============================================================================
