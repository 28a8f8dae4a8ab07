//! Shared fixtures for unit tests.
//!
//! RSA key generation dominates test time, so a handful of key pairs are
//! generated once per test binary and handed out by index.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};
use rsa::RsaPrivateKey;

use crate::config::{EncryptionConfig, DEFAULT_KEY_ALIAS};
use crate::crypto::AsymmetricIdentity;
use crate::service::EncryptionService;
use crate::storage::SecureStore;

/// Number of pre-generated identities
pub(crate) const KEY_COUNT: usize = 3;

pub(crate) static KEYS: Lazy<Vec<RsaPrivateKey>> = Lazy::new(|| {
    (0..KEY_COUNT)
        .map(|_| RsaPrivateKey::new(&mut OsRng, 2048).expect("test key generation"))
        .collect()
});

static PUBLIC_KEYS: Lazy<Vec<String>> = Lazy::new(|| {
    KEYS.iter()
        .map(|key| {
            let der = key.to_public_key().to_public_key_der().expect("public key DER");
            BASE64.encode(der.as_bytes())
        })
        .collect()
});

/// Published form of fixture key `index`
pub(crate) fn public_key(index: usize) -> String {
    PUBLIC_KEYS[index].clone()
}

/// A fresh secure store already holding fixture key `index`
pub(crate) fn seeded_store(index: usize) -> Arc<SecureStore> {
    let store = Arc::new(SecureStore::new());
    let pkcs8 = KEYS[index].to_pkcs8_der().expect("PKCS#8 DER");
    store.store(DEFAULT_KEY_ALIAS, pkcs8.as_bytes()).expect("seed store");
    store
}

/// Identity backed by fixture key `index`
pub(crate) fn identity(index: usize) -> AsymmetricIdentity {
    AsymmetricIdentity::new(seeded_store(index), &EncryptionConfig::default())
}

/// Service backed by fixture key `index`
pub(crate) fn service(index: usize) -> EncryptionService {
    EncryptionService::new(seeded_store(index), EncryptionConfig::default())
        .expect("default config")
}
