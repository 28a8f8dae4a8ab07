//! Per-recipient content key wrapping (RSA with PKCS#1 v1.5 padding).
//!
//! A wrapped key is `base64(RSA-PKCS1(recipient_public_key, content_key))`,
//! the `RSA/ECB/PKCS1Padding` form the mobile clients write and read.
//! One is produced for every intended reader of a message, including the
//! sender's own device.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::rngs::OsRng;
use rsa::Pkcs1v15Encrypt;

use super::envelope::ContentKey;
use super::identity::{AsymmetricIdentity, RecipientPublicKey};
use crate::error::{Error, Result};

/// Wrap a content key for one recipient
pub fn wrap(key: &ContentKey, recipient: &RecipientPublicKey) -> Result<String> {
    let wrapped = recipient
        .rsa()
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, key.as_bytes())
        .map_err(|e| Error::EncryptionFailed(format!("key wrap failed: {}", e)))?;
    Ok(BASE64.encode(wrapped))
}

/// Recover a content key with this device's private key
///
/// Never fails loudly: bad base64, a key wrapped for someone else, or a
/// missing identity all come back as `None`.
pub fn unwrap(wrapped: &str, identity: &AsymmetricIdentity) -> Option<ContentKey> {
    let ciphertext = BASE64.decode(wrapped.trim()).ok()?;
    let raw = identity.decrypt_with_private_key(&ciphertext)?;
    ContentKey::from_slice(&raw).ok()
}
