//! # Error Handling
//!
//! Error types for Vellum Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Lifecycle / Config (100-199)                                      │
//! │  │   ├── NotInitialized        - Registry or backend not running       │
//! │  │   ├── BackendInitFailed     - A backend refused to start            │
//! │  │   └── ConfigError           - Invalid configuration                 │
//! │  │                                                                      │
//! │  ├── Backend / Capability (200-299)                                    │
//! │  │   ├── UnsupportedKeyType    - No backend for this key type          │
//! │  │   ├── UnsupportedCapability - Backend lacks the capability          │
//! │  │   └── UnsupportedCipherMode - Unknown symmetric mode                │
//! │  │                                                                      │
//! │  ├── Primitive Failures (300-399)                                      │
//! │  │   ├── InvalidKeyOrIvSize    - Key/IV length does not fit the mode   │
//! │  │   ├── InvalidKey            - Malformed key material                │
//! │  │   ├── KeyGenerationFailed   - Keypair generation failed             │
//! │  │   ├── EncodingError         - base58/armor/hex decode failed        │
//! │  │   ├── EncryptionFailed      - Symmetric encryption failed           │
//! │  │   ├── SigningFailed         - Signature creation failed             │
//! │  │   ├── HashFailed            - Digest/HMAC/KDF failed                │
//! │  │   └── RngFailed             - Entropy source failed                 │
//! │  │                                                                      │
//! │  └── Envelope Protocol (400-499)                                       │
//! │      ├── NoRecipients          - Seal called with no recipients        │
//! │      ├── MalformedEnvelope     - Wire structure is invalid             │
//! │      ├── MissingEphemeralKey   - EC opener, no ephemeral key           │
//! │      ├── SessionKeyWrapFailed  - Could not wrap the session key        │
//! │      ├── SessionKeyUnwrapFailed- Not a recipient, or corrupted         │
//! │      └── AeadDecryptFailed     - Ciphertext or tag was tampered        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Recoverable vs Fatal
//!
//! | Error | Caller action |
//! |-------|---------------|
//! | `SessionKeyUnwrapFailed` | Try another private key, or treat as "not for me" |
//! | `AeadDecryptFailed` | Abort; do not retry with the same inputs |
//! | `UnsupportedKeyType` / `UnsupportedCapability` | Fix the deployment |
//!
//! Nothing inside this crate retries.

use thiserror::Error;

use crate::crypto::{CapabilityKind, KeyType};

/// Result type alias for Vellum Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Vellum Core
///
/// Backend library errors are converted into these variants at the
/// capability boundary; nothing from `aes-gcm`, `k256` or `rsa` leaks
/// through the public API.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Lifecycle / Config Errors (100-199)
    // ========================================================================

    /// The registry or a backend is not initialized (or already shut down)
    #[error("Crypto backend '{0}' is not initialized. Call BackendRegistry::init() first.")]
    NotInitialized(String),

    /// A backend failed to initialize
    #[error("Backend '{backend}' failed to initialize: {reason}")]
    BackendInitFailed {
        /// Backend name
        backend: String,
        /// Why it failed
        reason: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    // ========================================================================
    // Backend / Capability Errors (200-299)
    // ========================================================================

    /// No configured backend handles this key type
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(KeyType),

    /// No backend offers the capability (for this key type, when keyed)
    #[error("Capability {capability} is not available{}", for_key_type(.key_type))]
    UnsupportedCapability {
        /// Requested capability
        capability: CapabilityKind,
        /// Key type it was requested for; `None` for unkeyed capabilities
        key_type: Option<KeyType>,
    },

    /// The symmetric mode is unknown or cannot be instantiated
    #[error("Unsupported cipher mode: {0}")]
    UnsupportedCipherMode(String),

    // ========================================================================
    // Primitive Failures (300-399)
    // ========================================================================

    /// Key or IV length does not match the mode's table
    #[error("Invalid {what} size for {mode}: expected {expected} bytes, got {actual}")]
    InvalidKeyOrIvSize {
        /// "key", "iv" or "tag"
        what: &'static str,
        /// Mode name
        mode: &'static str,
        /// Size required by the mode
        expected: usize,
        /// Size supplied
        actual: usize,
    },

    /// Malformed key material
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Keypair generation failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// base58-check, armor or hex decoding failed
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Symmetric encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Signature creation failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Digest, HMAC or key derivation failed
    #[error("Hash operation failed: {0}")]
    HashFailed(String),

    /// Random number generation failed
    #[error("Random number generation failed")]
    RngFailed,

    // ========================================================================
    // Envelope Protocol Errors (400-499)
    // ========================================================================

    /// Seal was called with an empty recipient set
    #[error("Cannot seal a letter with no recipients")]
    NoRecipients,

    /// The envelope could not be parsed
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// An elliptic-curve opener needs the ephemeral key, and the letter has none
    #[error("Letter has no ephemeral public key for ECDH")]
    MissingEphemeralKey,

    /// The session key could not be wrapped for a recipient group
    #[error("Session key wrap failed: {0}")]
    SessionKeyWrapFailed(String),

    /// No wrapped session key could be opened with the supplied private key
    #[error(
        "Could not decrypt any session key. Message not intended for this recipient, or corrupted."
    )]
    SessionKeyUnwrapFailed,

    /// The AEAD tag did not verify
    #[error("Authenticated decryption failed: ciphertext or tag was modified")]
    AeadDecryptFailed,
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Lifecycle and configuration
    /// - 200-299: Backend and capability lookup
    /// - 300-399: Primitive failures
    /// - 400-499: Envelope protocol
    pub fn code(&self) -> i32 {
        match self {
            // Lifecycle (100-199)
            Error::NotInitialized(_) => 100,
            Error::BackendInitFailed { .. } => 101,
            Error::ConfigError(_) => 102,

            // Backend (200-299)
            Error::UnsupportedKeyType(_) => 200,
            Error::UnsupportedCapability { .. } => 201,
            Error::UnsupportedCipherMode(_) => 202,

            // Primitives (300-399)
            Error::InvalidKeyOrIvSize { .. } => 300,
            Error::InvalidKey(_) => 301,
            Error::KeyGenerationFailed(_) => 302,
            Error::EncodingError(_) => 303,
            Error::EncryptionFailed(_) => 304,
            Error::SigningFailed(_) => 305,
            Error::HashFailed(_) => 306,
            Error::RngFailed => 307,

            // Envelope (400-499)
            Error::NoRecipients => 400,
            Error::MalformedEnvelope(_) => 401,
            Error::MissingEphemeralKey => 402,
            Error::SessionKeyWrapFailed(_) => 403,
            Error::SessionKeyUnwrapFailed => 404,
            Error::AeadDecryptFailed => 405,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Only a failed session-key unwrap qualifies: the caller may try a
    /// different private key or conclude the letter was not addressed to it.
    /// An AEAD failure means tampering and must not be retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::SessionKeyUnwrapFailed)
    }

    /// Check if this error points at a misconfigured deployment
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedKeyType(_)
                | Error::UnsupportedCapability { .. }
                | Error::NotInitialized(_)
                | Error::BackendInitFailed { .. }
                | Error::ConfigError(_)
        )
    }
}

fn for_key_type(key_type: &Option<KeyType>) -> String {
    match key_type {
        Some(key_type) => format!(" for key type {}", key_type),
        None => String::new(),
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<bs58::decode::Error> for Error {
    fn from(err: bs58::decode::Error) -> Self {
        Error::EncodingError(format!("base58check: {}", err))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::EncodingError(format!("base64: {}", err))
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Self {
        Error::EncodingError(format!("hex: {}", err))
    }
}

// ============================================================================
// TESTS
// ============================================================================
