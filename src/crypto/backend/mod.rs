//! # Crypto Backends
//!
//! A backend is an engine that implements some subset of the capability
//! traits. The registry asks each backend which capabilities it offers and
//! for which key types, so no code outside this module names a concrete
//! backend.
//!
//! ```text
//! ┌──────────────────────────┐        ┌──────────────────────────┐
//! │     GeneralBackend       │        │    Secp256k1Backend      │
//! │                          │        │                          │
//! │  Hasher                  │◄───────│  (hashes via Hasher)     │
//! │  SymmetricCipher         │        │                          │
//! │  Util                    │        │  Signer      [secp256k1] │
//! │  Signer     [legacy-rsa] │        │  KeyAgreement[secp256k1] │
//! │  KeyWrap    [legacy-rsa] │        │                          │
//! └──────────────────────────┘        └──────────────────────────┘
//! ```

mod general;
mod secp256k1;

pub use general::GeneralBackend;
pub use secp256k1::Secp256k1Backend;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::crypto::{Hasher, KeyAgreement, KeyType, KeyWrap, Signer, SymmetricCipher, Util};
use crate::error::{Error, Result};

/// A pluggable cryptographic engine
///
/// Capability accessors return `None` for anything the backend does not
/// implement. Keyed accessors are only consulted for the key types listed
/// by [`Backend::key_types`].
pub trait Backend: Send + Sync {
    /// Stable name for logs and errors
    fn name(&self) -> &'static str;

    /// Key types served by this backend's keyed capabilities
    fn key_types(&self) -> Vec<KeyType>;

    /// Library-level setup; must be idempotent
    fn init(&self) -> Result<()>;

    /// Release library-level state; must be idempotent
    fn shutdown(&self);

    /// Hashing, if offered
    fn hasher(self: Arc<Self>) -> Option<Arc<dyn Hasher>> {
        None
    }

    /// Symmetric encryption, if offered
    fn symmetric(self: Arc<Self>) -> Option<Arc<dyn SymmetricCipher>> {
        None
    }

    /// Randomness, if offered
    fn util(self: Arc<Self>) -> Option<Arc<dyn Util>> {
        None
    }

    /// Signing for `key_type`, if offered
    fn signer(self: Arc<Self>, _key_type: KeyType) -> Option<Arc<dyn Signer>> {
        None
    }

    /// Key agreement for `key_type`, if offered
    fn key_agreement(self: Arc<Self>, _key_type: KeyType) -> Option<Arc<dyn KeyAgreement>> {
        None
    }

    /// Batch key wrapping for `key_type`, if offered
    fn key_wrap(self: Arc<Self>, _key_type: KeyType) -> Option<Arc<dyn KeyWrap>> {
        None
    }
}

/// Running/stopped state shared by the built-in backends
///
/// Transitions are serialized by a mutex; capability calls only read the
/// flag, so independent operations never contend.
pub(crate) struct Lifecycle {
    name: &'static str,
    running: AtomicBool,
    transition: Mutex<()>,
}

impl Lifecycle {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            running: AtomicBool::new(false),
            transition: Mutex::new(()),
        }
    }

    /// Run `setup` once; later calls are no-ops while running
    pub(crate) fn start(&self, setup: impl FnOnce() -> Result<()>) -> Result<()> {
        let _guard = self.transition.lock();
        if self.running.load(Ordering::Acquire) {
            return Ok(());
        }
        setup()?;
        self.running.store(true, Ordering::Release);
        tracing::debug!(backend = self.name, "backend started");
        Ok(())
    }

    /// Run `teardown` once; later calls are no-ops while stopped
    pub(crate) fn stop(&self, teardown: impl FnOnce()) {
        let _guard = self.transition.lock();
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        teardown();
        tracing::debug!(backend = self.name, "backend stopped");
    }

    pub(crate) fn ensure_running(&self) -> Result<()> {
        if self.running.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::NotInitialized(self.name.to_string()))
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_idempotent() {
        let lifecycle = Lifecycle::new("test");
        let mut setups = 0;

        assert!(lifecycle.ensure_running().is_err());

        for _ in 0..2 {
            lifecycle
                .start(|| {
                    setups += 1;
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(setups, 1);
        assert!(lifecycle.is_running());

        lifecycle.stop(|| {});
        lifecycle.stop(|| {});
        assert!(matches!(
            lifecycle.ensure_running(),
            Err(Error::NotInitialized(name)) if name == "test"
        ));
    }

    #[test]
    fn test_failed_setup_stays_stopped() {
        let lifecycle = Lifecycle::new("flaky");
        let result = lifecycle.start(|| {
            Err(Error::BackendInitFailed {
                backend: "flaky".into(),
                reason: "no entropy".into(),
            })
        });

        assert!(result.is_err());
        assert!(!lifecycle.is_running());
    }
}
