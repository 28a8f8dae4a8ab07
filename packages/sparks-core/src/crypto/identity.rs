//! # Device Identity
//!
//! The long-lived RSA key pair that lets other devices wrap content keys for
//! this one.
//!
//! ## Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       IDENTITY LIFECYCLE                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  First login / signup                                                  │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  ensure_key_pair()                                           │       │
//! │  │    ├── stored key?  yes → load (PKCS#8 DER) → public key    │       │
//! │  │    └── no → RSA keygen → SecureStore::store → public key    │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                              │                                          │
//! │                              ▼                                          │
//! │  Public key string = base64(SubjectPublicKeyInfo DER)                  │
//! │  → published to the user profile `publicKey` field                     │
//! │                                                                         │
//! │  Private key                                                           │
//! │  → never leaves this module; only used for PKCS#1 unwrapping           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The key pair is never rotated. Losing the secure store means losing the
//! ability to read every message that was wrapped for this device.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use parking_lot::{Mutex, RwLock};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::config::{EncryptionConfig, MIN_RSA_KEY_BITS};
use crate::error::{Error, Result};
use crate::storage::SecureStore;

/// Short hex fingerprint of a DER-encoded public key, safe to log
pub fn fingerprint(public_key_der: &[u8]) -> String {
    let digest = Sha256::digest(public_key_der);
    hex::encode(&digest[..8])
}

/// A peer's parsed public key, ready for wrapping
#[derive(Clone)]
pub struct RecipientPublicKey {
    key: RsaPublicKey,
    der: Vec<u8>,
}

impl RecipientPublicKey {
    /// Underlying RSA key
    pub(crate) fn rsa(&self) -> &RsaPublicKey {
        &self.key
    }

    /// Modulus size in bits
    pub fn bits(&self) -> usize {
        self.key.size() * 8
    }

    /// Log-safe fingerprint
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.der)
    }

    /// Transport form (base64 SPKI DER)
    pub fn encode(&self) -> String {
        BASE64.encode(&self.der)
    }
}

impl fmt::Debug for RecipientPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecipientPublicKey")
            .field("bits", &self.bits())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Loaded key pair plus its cached public encoding
struct LoadedKey {
    private: RsaPrivateKey,
    public_encoded: String,
    fingerprint: String,
}

impl LoadedKey {
    fn from_private(private: RsaPrivateKey) -> Result<Self> {
        let der = private
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| Error::KeyFormat(format!("public key encoding failed: {}", e)))?;
        Ok(Self {
            public_encoded: BASE64.encode(der.as_bytes()),
            fingerprint: fingerprint(der.as_bytes()),
            private,
        })
    }
}

/// The device's asymmetric identity
///
/// Cheap to share behind an `Arc`. The parsed private key is cached after
/// the first load so unwrapping does not re-parse DER on every message.
pub struct AsymmetricIdentity {
    store: Arc<SecureStore>,
    key_alias: String,
    key_bits: usize,
    /// Serializes first-time generation
    create_lock: Mutex<()>,
    loaded: RwLock<Option<Arc<LoadedKey>>>,
}

impl AsymmetricIdentity {
    /// Bind an identity to a secure store
    ///
    /// Nothing is generated or loaded until first use.
    pub fn new(store: Arc<SecureStore>, config: &EncryptionConfig) -> Self {
        Self {
            store,
            key_alias: config.key_alias.clone(),
            key_bits: config.rsa_key_bits,
            create_lock: Mutex::new(()),
            loaded: RwLock::new(None),
        }
    }

    /// Create the key pair if absent and return the public key string
    ///
    /// Idempotent. Concurrent first-time callers all observe the same key
    /// pair: the existence check and the generation happen under one lock.
    pub fn ensure_key_pair(&self) -> Result<String> {
        if let Some(loaded) = self.load()? {
            return Ok(loaded.public_encoded.clone());
        }

        let _guard = self.create_lock.lock();

        // Another caller may have won the race while we waited
        if let Some(loaded) = self.load()? {
            return Ok(loaded.public_encoded.clone());
        }

        let private = RsaPrivateKey::new(&mut OsRng, self.key_bits)
            .map_err(|e| Error::KeyGenerationFailed(e.to_string()))?;
        let pkcs8 = private
            .to_pkcs8_der()
            .map_err(|e| Error::KeyGenerationFailed(format!("PKCS#8 encoding failed: {}", e)))?;
        self.store.store(&self.key_alias, pkcs8.as_bytes())?;

        let loaded = Arc::new(LoadedKey::from_private(private)?);
        tracing::info!(
            fingerprint = %loaded.fingerprint,
            bits = self.key_bits,
            "Created device identity"
        );
        *self.loaded.write() = Some(loaded.clone());

        Ok(loaded.public_encoded.clone())
    }

    /// The stored public key, or `None` if no identity exists yet
    pub fn export_public_key(&self) -> Result<Option<String>> {
        Ok(self.load()?.map(|loaded| loaded.public_encoded.clone()))
    }

    /// Whether a key pair exists on this device
    pub fn has_key_pair(&self) -> Result<bool> {
        if self.loaded.read().is_some() {
            return Ok(true);
        }
        self.store.exists(&self.key_alias)
    }

    /// Parse a peer's published public key
    ///
    /// Rejects bad base64, bad DER and keys below the minimum modulus size
    /// with [`Error::KeyFormat`].
    pub fn import_public_key(encoded: &str) -> Result<RecipientPublicKey> {
        let der = BASE64
            .decode(encoded.trim())
            .map_err(|e| Error::KeyFormat(format!("invalid base64: {}", e)))?;
        let key = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| Error::KeyFormat(format!("invalid public key DER: {}", e)))?;

        let bits = key.size() * 8;
        if bits < MIN_RSA_KEY_BITS {
            return Err(Error::KeyFormat(format!(
                "{}-bit key is below the {}-bit minimum",
                bits, MIN_RSA_KEY_BITS
            )));
        }

        Ok(RecipientPublicKey { key, der })
    }

    /// PKCS#1 v1.5 decrypt with the device private key
    ///
    /// `None` when there is no identity, the stored key is unreadable, or
    /// the ciphertext was not produced for this key.
    pub(crate) fn decrypt_with_private_key(&self, ciphertext: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
        let loaded = match self.load() {
            Ok(Some(loaded)) => loaded,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Device private key unavailable");
                return None;
            }
        };

        loaded
            .private
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .ok()
            .map(Zeroizing::new)
    }

    /// Load the key pair from cache or the secure store
    fn load(&self) -> Result<Option<Arc<LoadedKey>>> {
        if let Some(loaded) = self.loaded.read().as_ref() {
            return Ok(Some(loaded.clone()));
        }

        let Some(pkcs8) = self.store.retrieve(&self.key_alias)? else {
            return Ok(None);
        };
        let private = RsaPrivateKey::from_pkcs8_der(&pkcs8)
            .map_err(|e| Error::KeyFormat(format!("stored private key is corrupt: {}", e)))?;
        let loaded = Arc::new(LoadedKey::from_private(private)?);

        tracing::info!(fingerprint = %loaded.fingerprint, "Loaded device identity");

        let mut slot = self.loaded.write();
        // Keep whichever copy landed first
        let loaded = slot.get_or_insert(loaded).clone();
        Ok(Some(loaded))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use std::thread;

    #[test]
    fn test_ensure_key_pair_idempotent() {
        let identity =
            AsymmetricIdentity::new(Arc::new(SecureStore::new()), &EncryptionConfig::default());

        assert_eq!(identity.export_public_key().unwrap(), None);
        assert!(!identity.has_key_pair().unwrap());

        let first = identity.ensure_key_pair().unwrap();
        let second = identity.ensure_key_pair().unwrap();

        assert_eq!(first, second);
        assert_eq!(identity.export_public_key().unwrap(), Some(first.clone()));

        let imported = AsymmetricIdentity::import_public_key(&first).unwrap();
        assert_eq!(imported.bits(), 2048);
    }

    #[test]
    fn test_concurrent_first_time_callers_share_one_key() {
        let identity = Arc::new(AsymmetricIdentity::new(
            Arc::new(SecureStore::new()),
            &EncryptionConfig::default(),
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let identity = identity.clone();
                thread::spawn(move || identity.ensure_key_pair().unwrap())
            })
            .collect();
        let keys: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(keys.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn test_loads_existing_key_from_store() {
        let store = test_support::seeded_store(0);
        let expected = test_support::public_key(0);

        let identity = AsymmetricIdentity::new(store.clone(), &EncryptionConfig::default());
        assert!(identity.has_key_pair().unwrap());
        assert_eq!(identity.export_public_key().unwrap(), Some(expected.clone()));
        assert_eq!(identity.ensure_key_pair().unwrap(), expected);

        // A second handle on the same store sees the same identity
        let again = AsymmetricIdentity::new(store, &EncryptionConfig::default());
        assert_eq!(again.ensure_key_pair().unwrap(), expected);
    }

    #[test]
    fn test_custom_key_alias() {
        let store = test_support::seeded_store(0);
        let config = EncryptionConfig {
            key_alias: "other.alias".into(),
            ..Default::default()
        };

        let identity = AsymmetricIdentity::new(store, &config);
        assert_eq!(identity.export_public_key().unwrap(), None);
    }

    #[test]
    fn test_corrupt_stored_key() {
        let store = Arc::new(SecureStore::new());
        store.store(crate::config::DEFAULT_KEY_ALIAS, b"not a key").unwrap();

        let identity = AsymmetricIdentity::new(store, &EncryptionConfig::default());
        assert!(matches!(identity.ensure_key_pair(), Err(Error::KeyFormat(_))));
        assert!(identity.decrypt_with_private_key(&[0u8; 256]).is_none());
    }

    #[test]
    fn test_import_rejects_malformed() {
        assert!(matches!(
            AsymmetricIdentity::import_public_key("%%% not base64 %%%"),
            Err(Error::KeyFormat(_))
        ));
        assert!(matches!(
            AsymmetricIdentity::import_public_key(&BASE64.encode(b"not der")),
            Err(Error::KeyFormat(_))
        ));
        assert!(matches!(
            AsymmetricIdentity::import_public_key(""),
            Err(Error::KeyFormat(_))
        ));
    }

    #[test]
    fn test_import_rejects_small_key() {
        let small = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let der = small.to_public_key().to_public_key_der().unwrap();

        let result = AsymmetricIdentity::import_public_key(&BASE64.encode(der.as_bytes()));
        assert!(matches!(result, Err(Error::KeyFormat(_))));
    }

    #[test]
    fn test_decrypt_without_identity() {
        let identity =
            AsymmetricIdentity::new(Arc::new(SecureStore::new()), &EncryptionConfig::default());
        assert!(identity.decrypt_with_private_key(&[0u8; 256]).is_none());
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let key = AsymmetricIdentity::import_public_key(&test_support::public_key(1)).unwrap();

        assert_eq!(key.fingerprint(), key.fingerprint());
        assert_eq!(key.fingerprint().len(), 16);
        assert_eq!(key.encode(), test_support::public_key(1));
        assert!(!format!("{:?}", key).contains(&key.encode()));
    }
}
