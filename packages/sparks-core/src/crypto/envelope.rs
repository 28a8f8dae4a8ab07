//! # Symmetric Envelope
//!
//! One-time content keys and AES-256-GCM sealing for message text and media.
//!
//! ## Sealing Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      CONTENT ENCRYPTION                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Step 1: Generate Content Key (once per message / media item)          │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  32 random bytes from CSPRNG → ContentKey                    │       │
//! │  │  (zeroized on drop, never persisted)                        │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 2: Generate Nonce (unique per seal call)                         │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  Random 12 bytes from CSPRNG                                 │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 3: Encrypt                                                       │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  AES-256-GCM(key, nonce, plaintext) → ciphertext ‖ 16B tag  │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Output (text):  base64(nonce) ":" base64(ciphertext)                  │
//! │  Output (media): nonce ‖ ciphertext   (raw bytes)                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use crate::crypto::codec;
use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of a content key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// A nonce (number used once) for AES-GCM encryption
///
/// **Never reuse a nonce with the same key.** Every seal draws a fresh
/// random nonce; with one key per message the birthday bound is irrelevant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a cryptographically random nonce
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse from a slice, rejecting the wrong length
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; NONCE_SIZE] = bytes.try_into().map_err(|_| {
            Error::Format(format!(
                "nonce must be {} bytes, got {}",
                NONCE_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// A one-time AES-256-GCM content key
///
/// Lives only in memory for the duration of a send or a read and is
/// zeroized when dropped.
#[derive(ZeroizeOnDrop)]
pub struct ContentKey([u8; KEY_SIZE]);

impl ContentKey {
    /// Generate a fresh random content key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Rebuild from an unwrapped slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::KeyFormat(format!(
                "content key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Raw key bytes, for wrapping only
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    fn cipher(&self) -> Aes256Gcm {
        // A 32-byte array is always a valid AES-256 key.
        Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

/// Ciphertext plus the nonce it was sealed with
///
/// Serializes to and from the `base64(nonce):base64(ciphertext)` string
/// stored in the message document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EncryptedPayload {
    nonce: Nonce,
    ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Assemble from parts
    pub fn new(nonce: Nonce, ciphertext: Vec<u8>) -> Self {
        Self { nonce, ciphertext }
    }

    /// Parse the transport string
    pub fn parse(encoded: &str) -> Result<Self> {
        let (nonce, ciphertext) = codec::decode(encoded)?;
        Ok(Self {
            nonce: Nonce::from_slice(&nonce)?,
            ciphertext,
        })
    }

    /// Render the transport string
    pub fn encode(&self) -> String {
        codec::encode(self.nonce.as_bytes(), &self.ciphertext)
    }

    /// The nonce
    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Ciphertext including the authentication tag
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }
}

impl fmt::Display for EncryptedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for EncryptedPayload {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EncryptedPayload {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<EncryptedPayload> for String {
    fn from(payload: EncryptedPayload) -> Self {
        payload.encode()
    }
}

/// Generate a fresh content key for one message or media item
pub fn generate_key() -> ContentKey {
    ContentKey::generate()
}

/// Encrypt bytes under a content key with a fresh random nonce
pub fn seal(plaintext: &[u8], key: &ContentKey) -> Result<EncryptedPayload> {
    seal_with_aad(plaintext, &[], key)
}

/// Encrypt with additional authenticated data bound to the ciphertext
pub fn seal_with_aad(plaintext: &[u8], aad: &[u8], key: &ContentKey) -> Result<EncryptedPayload> {
    let nonce = Nonce::random();
    let payload = Payload {
        msg: plaintext,
        aad,
    };
    let ciphertext = key
        .cipher()
        .encrypt(AesNonce::from_slice(nonce.as_bytes()), payload)
        .map_err(|e| Error::EncryptionFailed(format!("AES-GCM seal failed: {}", e)))?;

    Ok(EncryptedPayload { nonce, ciphertext })
}

/// Decrypt and authenticate a payload
///
/// ## Errors
///
/// Returns [`Error::Authentication`] if the ciphertext was tampered with or
/// the key is wrong.
pub fn open(payload: &EncryptedPayload, key: &ContentKey) -> Result<Vec<u8>> {
    open_with_aad(payload, &[], key)
}

/// Decrypt a payload sealed with [`seal_with_aad`]; the AAD must match
pub fn open_with_aad(payload: &EncryptedPayload, aad: &[u8], key: &ContentKey) -> Result<Vec<u8>> {
    let aead_payload = Payload {
        msg: payload.ciphertext.as_slice(),
        aad,
    };
    key.cipher()
        .decrypt(AesNonce::from_slice(payload.nonce.as_bytes()), aead_payload)
        .map_err(|_| Error::Authentication)
}

/// Parse a transport string and decrypt it
///
/// [`Error::Format`] for a malformed string, [`Error::Authentication`] for
/// a tag mismatch.
pub fn open_str(encoded: &str, key: &ContentKey) -> Result<Vec<u8>> {
    let payload = EncryptedPayload::parse(encoded)?;
    open(&payload, key)
}

// ============================================================================
// BINARY (MEDIA) FORM
// ============================================================================

/// Encrypt a media blob into `nonce ‖ ciphertext`
pub fn seal_bytes(data: &[u8], key: &ContentKey) -> Result<Vec<u8>> {
    let payload = seal(data, key)?;
    let mut out = Vec::with_capacity(NONCE_SIZE + payload.ciphertext.len());
    out.extend_from_slice(payload.nonce.as_bytes());
    out.extend_from_slice(&payload.ciphertext);
    Ok(out)
}

/// Decrypt a `nonce ‖ ciphertext` media blob
pub fn open_bytes(blob: &[u8], key: &ContentKey) -> Result<Vec<u8>> {
    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Format(format!(
            "media blob too short: {} bytes",
            blob.len()
        )));
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);
    let payload = EncryptedPayload {
        nonce: Nonce::from_slice(nonce)?,
        ciphertext: ciphertext.to_vec(),
    };
    open(&payload, key)
}

// ============================================================================
// TESTS
// ============================================================================
