//! # Secure Storage
//!
//! Platform-specific secure storage for the device private key.
//!
//! ## Platform Implementations
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SECURE STORAGE                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  • store(key, value)   - Store (optionally encrypted) data              │
//! │  • retrieve(key)       - Retrieve and decrypt data                      │
//! │  • delete(key)         - Delete data                                    │
//! │  • exists(key)         - Check if key exists                            │
//! │                                                                         │
//! │  ┌───────────────┐  ┌───────────────┐  ┌───────────────┐              │
//! │  │     iOS       │  │   Android     │  │  Desktop /    │              │
//! │  │   Keychain    │  │   in-memory   │  │  tests        │              │
//! │  │ (hardware-    │  │ (host app     │  │  in-memory    │              │
//! │  │  backed)      │  │  persists)    │  │               │              │
//! │  └───────────────┘  └───────────────┘  └───────────────┘              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Written exactly once per installation (identity creation) and read on
//! every unwrap, so reads take a shared lock and never block each other.

#[cfg(not(target_os = "ios"))]
use parking_lot::RwLock;
#[cfg(not(target_os = "ios"))]
use std::collections::HashMap;
use zeroize::Zeroizing;

use crate::crypto::envelope::{
    open_with_aad, seal_with_aad, ContentKey, EncryptedPayload, Nonce, NONCE_SIZE,
};
use crate::error::{Error, Result};

/// Secure storage
///
/// The in-memory backing is what tests and desktop builds use; mobile
/// hosts either use the Keychain backing or persist through their own
/// keystore bridge.
pub struct SecureStore {
    #[cfg(not(target_os = "ios"))]
    memory: RwLock<HashMap<String, Vec<u8>>>,

    /// Optional at-rest key; entries are sealed with their name as AAD
    encryption_key: Option<ContentKey>,
}

impl SecureStore {
    /// Create a new secure store
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "ios"))]
            memory: RwLock::new(HashMap::new()),
            encryption_key: None,
        }
    }

    /// Create a secure store that encrypts every entry at rest
    pub fn with_encryption(key: [u8; 32]) -> Self {
        Self {
            #[cfg(not(target_os = "ios"))]
            memory: RwLock::new(HashMap::new()),
            encryption_key: Some(ContentKey::from_bytes(key)),
        }
    }

    /// Store data securely
    pub fn store(&self, key: &str, value: &[u8]) -> Result<()> {
        let data = match self.encryption_key {
            Some(ref enc_key) => {
                let sealed = seal_with_aad(value, key.as_bytes(), enc_key)?;
                let mut result = sealed.nonce().as_bytes().to_vec();
                result.extend_from_slice(sealed.ciphertext());
                result
            }
            None => value.to_vec(),
        };

        self.store_raw(key, &data)
    }

    /// Retrieve data securely
    pub fn retrieve(&self, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let data = match self.retrieve_raw(key)? {
            Some(d) => Zeroizing::new(d),
            None => return Ok(None),
        };

        let Some(ref enc_key) = self.encryption_key else {
            return Ok(Some(data));
        };

        if data.len() < NONCE_SIZE {
            return Err(Error::StorageReadError("Stored data too short".into()));
        }
        let sealed = EncryptedPayload::new(
            Nonce::from_slice(&data[..NONCE_SIZE])?,
            data[NONCE_SIZE..].to_vec(),
        );
        let plaintext = open_with_aad(&sealed, key.as_bytes(), enc_key)
            .map_err(|_| Error::StorageReadError(format!("Entry {} failed authentication", key)))?;

        Ok(Some(Zeroizing::new(plaintext)))
    }

    /// Delete data from secure storage
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.delete_raw(key)
    }

    /// Check if a key exists
    pub fn exists(&self, key: &str) -> Result<bool> {
        self.exists_raw(key)
    }

    // ========================================================================
    // PLATFORM-SPECIFIC IMPLEMENTATIONS
    // ========================================================================

    #[cfg(not(target_os = "ios"))]
    fn store_raw(&self, key: &str, value: &[u8]) -> Result<()> {
        self.memory.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    #[cfg(not(target_os = "ios"))]
    fn retrieve_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.memory.read().get(key).cloned())
    }

    #[cfg(not(target_os = "ios"))]
    fn delete_raw(&self, key: &str) -> Result<bool> {
        Ok(self.memory.write().remove(key).is_some())
    }

    #[cfg(not(target_os = "ios"))]
    fn exists_raw(&self, key: &str) -> Result<bool> {
        Ok(self.memory.read().contains_key(key))
    }

    #[cfg(target_os = "ios")]
    fn store_raw(&self, key: &str, value: &[u8]) -> Result<()> {
        use security_framework::passwords::{delete_generic_password, set_generic_password};

        // Keychain has no upsert
        let _ = delete_generic_password(KEYCHAIN_SERVICE, key);

        set_generic_password(KEYCHAIN_SERVICE, key, value)
            .map_err(|e| Error::StorageWriteError(format!("Keychain write failed: {}", e)))
    }

    #[cfg(target_os = "ios")]
    fn retrieve_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        use security_framework::passwords::get_generic_password;

        match get_generic_password(KEYCHAIN_SERVICE, key) {
            Ok(data) => Ok(Some(data.to_vec())),
            Err(e) if is_item_not_found(&e) => Ok(None),
            Err(e) => Err(Error::StorageReadError(format!("Keychain read failed: {}", e))),
        }
    }

    #[cfg(target_os = "ios")]
    fn delete_raw(&self, key: &str) -> Result<bool> {
        use security_framework::passwords::delete_generic_password;

        match delete_generic_password(KEYCHAIN_SERVICE, key) {
            Ok(_) => Ok(true),
            Err(e) if is_item_not_found(&e) => Ok(false),
            Err(e) => Err(Error::StorageWriteError(format!("Keychain delete failed: {}", e))),
        }
    }

    #[cfg(target_os = "ios")]
    fn exists_raw(&self, key: &str) -> Result<bool> {
        Ok(self.retrieve_raw(key)?.is_some())
    }
}

#[cfg(target_os = "ios")]
const KEYCHAIN_SERVICE: &str = "com.example.sparks.keychain";

/// errSecItemNotFound
#[cfg(target_os = "ios")]
fn is_item_not_found(err: &security_framework::base::Error) -> bool {
    err.code() == -25300
}

impl Default for SecureStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_retrieve() {
        let store = SecureStore::new();

        store.store("test-key", b"test-value").unwrap();

        let value = store.retrieve("test-key").unwrap().unwrap();
        assert_eq!(&*value, b"test-value");

        assert!(store.delete("test-key").unwrap());
        assert!(store.retrieve("test-key").unwrap().is_none());
        assert!(!store.delete("test-key").unwrap());
    }

    #[test]
    fn test_store_with_encryption() {
        let store = SecureStore::with_encryption([42u8; 32]);

        store.store("secret", b"very secret data").unwrap();

        let raw = store.retrieve_raw("secret").unwrap().unwrap();
        assert_ne!(&raw[NONCE_SIZE..], b"very secret data");

        let value = store.retrieve("secret").unwrap().unwrap();
        assert_eq!(&*value, b"very secret data");
    }

    #[test]
    fn test_encrypted_entry_bound_to_name() {
        let store = SecureStore::with_encryption([7u8; 32]);
        store.store("entry-a", b"payload").unwrap();

        // Move the sealed bytes under a different name
        let raw = store.retrieve_raw("entry-a").unwrap().unwrap();
        store.store_raw("entry-b", &raw).unwrap();

        assert!(matches!(
            store.retrieve("entry-b"),
            Err(Error::StorageReadError(_))
        ));
    }

    #[test]
    fn test_exists() {
        let store = SecureStore::new();

        assert!(!store.exists("nonexistent").unwrap());

        store.store("exists", b"data").unwrap();
        assert!(store.exists("exists").unwrap());
    }
}
