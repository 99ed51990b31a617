//! # Cryptographic Primitives
//!
//! Everything the letter protocol and contract signer build on.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      CRYPTOGRAPHIC ARCHITECTURE                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   Letter / ContractSigner                                               │
//! │            │                                                            │
//! │            ▼                                                            │
//! │   ┌─────────────────────────────────────────────────────────────────┐   │
//! │   │  BackendRegistry                                                │   │
//! │   │  get(capability, key type) ──► Arc<dyn Capability>              │   │
//! │   └───────────────┬─────────────────────────────┬───────────────────┘   │
//! │                   │                             │                       │
//! │                   ▼                             ▼                       │
//! │   ┌───────────────────────────┐   ┌───────────────────────────┐        │
//! │   │ GeneralBackend            │   │ Secp256k1Backend          │        │
//! │   │ SHA-2, HMAC, HKDF         │   │ ECDSA                     │        │
//! │   │ AES-GCM, ChaCha20-Poly1305│   │ ECDH                      │        │
//! │   │ OS RNG                    │   │                           │        │
//! │   │ RSA PKCS#1 v1.5, OAEP     │   │                           │        │
//! │   └───────────────────────────┘   └───────────────────────────┘        │
//! │                                                                         │
//! │   Shared types: SecretBuffer, SymmetricMode, HashType, keys, encoding   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Considerations
//!
//! - Key material lives in [`SecretBuffer`] or zeroizing key types and is
//!   wiped on drop, including on error paths
//! - AEAD tags are verified before any plaintext is released
//! - Public keys are logged only as fingerprints

mod algorithms;
mod backend;
mod capability;
pub mod encoding;
mod keys;
mod registry;
mod secret;

pub use algorithms::{HashType, SymmetricMode};
pub use backend::{Backend, GeneralBackend, Secp256k1Backend};
pub use capability::{
    Capability, CapabilityKind, Hasher, KeyAgreement, KeyWrap, Signer, SymmetricCipher,
    SymmetricCiphertext, Util,
};
pub use encoding::{armor, base58check_decode, base58check_encode, dearmor};
pub use keys::{KeyType, Keypair, PrivateKey, PublicKey};
pub use registry::BackendRegistry;
pub use secret::SecretBuffer;
