//! # Vellum Core
//!
//! Sealed multi-recipient letters and contract signatures on top of a
//! pluggable cryptographic backend registry.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         VELLUM CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────┐     ┌─────────────────────────────┐    │
//! │  │           Letter            │     │       ContractSigner        │    │
//! │  │                             │     │                             │    │
//! │  │ - seal / open               │     │ - canonical bytes + NUL     │    │
//! │  │ - ECDH wrap (secp256k1)     │     │ - sign / verify             │    │
//! │  │ - batch wrap (legacy RSA)   │     │ - armored signatures        │    │
//! │  └──────────────┬──────────────┘     └──────────────┬──────────────┘    │
//! │                 │                                   │                   │
//! │                 └─────────────────┬─────────────────┘                   │
//! │                                   ▼                                     │
//! │  ┌───────────────────────────────────────────────────────────────────┐  │
//! │  │                     Crypto (BackendRegistry)                      │  │
//! │  │                                                                   │  │
//! │  │  Hasher · SymmetricCipher · Signer · KeyAgreement · KeyWrap · Util│  │
//! │  │        general backend            secp256k1 backend               │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`config`] - Algorithm defaults and backend enablement
//! - [`crypto`] - Keys, capability traits, backends and the registry
//! - [`contract`] - Contract signing over canonical document bytes
//! - [`letter`] - The sealed-envelope protocol
//!
//! ## Example
//!
//! ```no_run
//! use vellum_core::{BackendRegistry, CryptoConfig, Keypair, Letter};
//!
//! # fn main() -> vellum_core::Result<()> {
//! let registry = BackendRegistry::init(&CryptoConfig::default())?;
//! let recipient = Keypair::generate_secp256k1();
//!
//! let sealed = Letter::seal(&registry, &[recipient.public_key().clone()], b"hello world")?;
//! let opened = Letter::open(&registry, &sealed, recipient.private_key())?;
//! assert_eq!(opened, b"hello world");
//!
//! BackendRegistry::shutdown();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod config;
pub mod contract;
pub mod crypto;
pub mod error;
pub mod letter;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::CryptoConfig;
pub use contract::{CanonicalDocument, ContractSignature, ContractSigner};
pub use crypto::{BackendRegistry, KeyType, Keypair, PrivateKey, PublicKey};
pub use error::{Error, Result};
pub use letter::Letter;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Vellum Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
