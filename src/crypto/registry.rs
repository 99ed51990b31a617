//! # Backend Registry
//!
//! Owns the configured backends and resolves capabilities by
//! (capability, key type). Protocol code never names a backend; it asks the
//! registry.
//!
//! ## Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        REGISTRY LIFECYCLE                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  BackendRegistry::init(config)                                          │
//! │     ├──► validate config                                                │
//! │     ├──► GeneralBackend::init()       Hasher, Cipher, Util, [RSA]       │
//! │     ├──► Secp256k1Backend::init()     [if enable_secp256k1]             │
//! │     └──► publish as the process-wide registry                           │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │  BackendRegistry::global()  ◄──►  concurrent capability calls           │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │  BackendRegistry::shutdown()                                            │
//! │     └──► every backend stopped; held capabilities now fail with         │
//! │          NotInitialized                                                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Registries can also be built locally with [`BackendRegistry::new`] and
//! passed around explicitly; the global one is a convenience for hosts.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::config::CryptoConfig;
use crate::crypto::{
    Backend, Capability, CapabilityKind, GeneralBackend, Hasher, KeyAgreement, KeyType, KeyWrap,
    Keypair, Secp256k1Backend, Signer, SymmetricCipher, Util,
};
use crate::error::{Error, Result};

/// Process-wide registry slot
static GLOBAL_REGISTRY: Lazy<RwLock<Option<Arc<BackendRegistry>>>> =
    Lazy::new(|| RwLock::new(None));

/// A composed set of backends, immutable once built
///
/// Safe to share across threads; lookups take no locks.
pub struct BackendRegistry {
    config: CryptoConfig,
    backends: Vec<Arc<dyn Backend>>,
    key_types: BTreeSet<KeyType>,
    hasher: Option<Arc<dyn Hasher>>,
    symmetric: Option<Arc<dyn SymmetricCipher>>,
    util: Option<Arc<dyn Util>>,
    signers: HashMap<KeyType, Arc<dyn Signer>>,
    key_agreements: HashMap<KeyType, Arc<dyn KeyAgreement>>,
    key_wraps: HashMap<KeyType, Arc<dyn KeyWrap>>,
}

impl BackendRegistry {
    /// Build a registry with the built-in backends `config` enables
    pub fn new(config: &CryptoConfig) -> Result<Self> {
        config.validate()?;

        let general = Arc::new(GeneralBackend::new(config.enable_legacy_rsa));
        let mut registry = Self::empty(config.clone()).with_backend(general)?;

        if config.enable_secp256k1 {
            let hasher = registry.hasher()?;
            registry = registry.with_backend(Arc::new(Secp256k1Backend::new(hasher)))?;
        }

        Ok(registry)
    }

    /// A registry with no backends; add them with [`with_backend`](Self::with_backend)
    pub fn empty(config: CryptoConfig) -> Self {
        Self {
            config,
            backends: Vec::new(),
            key_types: BTreeSet::new(),
            hasher: None,
            symmetric: None,
            util: None,
            signers: HashMap::new(),
            key_agreements: HashMap::new(),
            key_wraps: HashMap::new(),
        }
    }

    /// Initialize `backend` and register every capability it offers
    ///
    /// Later registrations replace earlier ones for the same capability and
    /// key type.
    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Result<Self> {
        backend.init()?;

        if let Some(hasher) = backend.clone().hasher() {
            self.hasher = Some(hasher);
        }
        if let Some(symmetric) = backend.clone().symmetric() {
            self.symmetric = Some(symmetric);
        }
        if let Some(util) = backend.clone().util() {
            self.util = Some(util);
        }

        let key_types = backend.key_types();
        for &key_type in &key_types {
            self.key_types.insert(key_type);
            if let Some(signer) = backend.clone().signer(key_type) {
                self.signers.insert(key_type, signer);
            }
            if let Some(agreement) = backend.clone().key_agreement(key_type) {
                self.key_agreements.insert(key_type, agreement);
            }
            if let Some(wrap) = backend.clone().key_wrap(key_type) {
                self.key_wraps.insert(key_type, wrap);
            }
        }

        tracing::info!(
            backend = backend.name(),
            key_types = ?key_types,
            "Registered crypto backend"
        );
        self.backends.push(backend);
        Ok(self)
    }

    /// The configuration this registry was built with
    pub fn config(&self) -> &CryptoConfig {
        &self.config
    }

    /// Key types served by at least one backend
    pub fn key_types(&self) -> impl Iterator<Item = KeyType> + '_ {
        self.key_types.iter().copied()
    }

    /// Whether any backend serves `key_type`
    pub fn supports_key_type(&self, key_type: KeyType) -> bool {
        self.key_types.contains(&key_type)
    }

    /// Generate a recipient keypair; RSA moduli use `rsa_key_bits`
    pub fn generate_keypair(&self, key_type: KeyType) -> Result<Keypair> {
        if !self.supports_key_type(key_type) {
            return Err(Error::UnsupportedKeyType(key_type));
        }
        match key_type {
            KeyType::Secp256k1 => Ok(Keypair::generate_secp256k1()),
            KeyType::LegacyRsa => Keypair::generate_rsa(self.config.rsa_key_bits),
        }
    }

    // ========================================================================
    // CAPABILITY LOOKUP
    // ========================================================================

    /// Resolve any capability; `key_type` is required for keyed capabilities
    /// and ignored otherwise
    pub fn get(&self, kind: CapabilityKind, key_type: Option<KeyType>) -> Result<Capability> {
        if !kind.is_keyed() {
            return match kind {
                CapabilityKind::Hasher => self.hasher().map(Capability::Hasher),
                CapabilityKind::SymmetricCipher => {
                    self.symmetric().map(Capability::SymmetricCipher)
                }
                _ => self.util().map(Capability::Util),
            };
        }

        let key_type = key_type.ok_or(Error::UnsupportedCapability {
            capability: kind,
            key_type: None,
        })?;
        match kind {
            CapabilityKind::Signer => self.signer(key_type).map(Capability::Signer),
            CapabilityKind::KeyAgreement => {
                self.key_agreement(key_type).map(Capability::KeyAgreement)
            }
            _ => self.key_wrap(key_type).map(Capability::KeyWrap),
        }
    }

    /// Hashing
    pub fn hasher(&self) -> Result<Arc<dyn Hasher>> {
        unkeyed(&self.hasher, CapabilityKind::Hasher)
    }

    /// Symmetric encryption
    pub fn symmetric(&self) -> Result<Arc<dyn SymmetricCipher>> {
        unkeyed(&self.symmetric, CapabilityKind::SymmetricCipher)
    }

    /// Randomness
    pub fn util(&self) -> Result<Arc<dyn Util>> {
        unkeyed(&self.util, CapabilityKind::Util)
    }

    /// Signer for `key_type`
    pub fn signer(&self, key_type: KeyType) -> Result<Arc<dyn Signer>> {
        self.keyed(&self.signers, CapabilityKind::Signer, key_type)
    }

    /// Key agreement for `key_type`
    pub fn key_agreement(&self, key_type: KeyType) -> Result<Arc<dyn KeyAgreement>> {
        self.keyed(&self.key_agreements, CapabilityKind::KeyAgreement, key_type)
    }

    /// Batch key wrapping for `key_type`
    pub fn key_wrap(&self, key_type: KeyType) -> Result<Arc<dyn KeyWrap>> {
        self.keyed(&self.key_wraps, CapabilityKind::KeyWrap, key_type)
    }

    fn keyed<T: ?Sized>(
        &self,
        table: &HashMap<KeyType, Arc<T>>,
        capability: CapabilityKind,
        key_type: KeyType,
    ) -> Result<Arc<T>> {
        if let Some(found) = table.get(&key_type) {
            return Ok(found.clone());
        }
        if self.key_types.contains(&key_type) {
            Err(Error::UnsupportedCapability {
                capability,
                key_type: Some(key_type),
            })
        } else {
            Err(Error::UnsupportedKeyType(key_type))
        }
    }

    /// Stop every backend; capabilities already handed out start failing
    /// with `NotInitialized`
    pub fn close(&self) {
        for backend in self.backends.iter().rev() {
            backend.shutdown();
        }
    }

    // ========================================================================
    // PROCESS-WIDE INSTANCE
    // ========================================================================

    /// Build and publish the process-wide registry
    ///
    /// Idempotent: if a registry is already running it is returned as-is and
    /// `config` is ignored.
    pub fn init(config: &CryptoConfig) -> Result<Arc<Self>> {
        let mut slot = GLOBAL_REGISTRY.write();
        if let Some(existing) = slot.as_ref() {
            if existing.config() != config {
                tracing::warn!("Crypto registry already initialized with a different config");
            }
            return Ok(existing.clone());
        }

        tracing::info!("Initializing crypto registry v{}", env!("CARGO_PKG_VERSION"));
        let registry = Arc::new(Self::new(config)?);
        *slot = Some(registry.clone());

        tracing::info!("Crypto registry initialized successfully");
        Ok(registry)
    }

    /// The process-wide registry
    pub fn global() -> Result<Arc<Self>> {
        GLOBAL_REGISTRY
            .read()
            .clone()
            .ok_or_else(|| Error::NotInitialized("registry".into()))
    }

    /// Whether [`init`](Self::init) has run without a matching shutdown
    pub fn is_initialized() -> bool {
        GLOBAL_REGISTRY.read().is_some()
    }

    /// Tear down the process-wide registry; a no-op when not initialized
    pub fn shutdown() {
        let Some(registry) = GLOBAL_REGISTRY.write().take() else {
            return;
        };

        tracing::info!("Shutting down crypto registry");
        registry.close();
        tracing::info!("Crypto registry shutdown complete");
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.backends.iter().map(|b| b.name()).collect();
        f.debug_struct("BackendRegistry")
            .field("backends", &names)
            .field("key_types", &self.key_types)
            .finish()
    }
}

fn unkeyed<T: ?Sized>(slot: &Option<Arc<T>>, kind: CapabilityKind) -> Result<Arc<T>> {
    slot.clone().ok_or(Error::UnsupportedCapability {
        capability: kind,
        key_type: None,
    })
}

// ============================================================================
// TESTS
// ============================================================================
