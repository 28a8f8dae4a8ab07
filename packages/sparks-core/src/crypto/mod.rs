//! # Cryptography Module
//!
//! Primitives behind Sparks' hybrid end-to-end encryption.
//!
//! ## Encryption Scheme
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    HYBRID ENCRYPTION                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Sender                                                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  ContentKey (AES-256, fresh per message)                        │   │
//! │  │        │                                                        │   │
//! │  │        ├──► AES-256-GCM(plaintext) ──► "b64(nonce):b64(ct)"     │   │
//! │  │        │                                   [envelope, codec]    │   │
//! │  │        │                                                        │   │
//! │  │        └──► RSA-PKCS1 v1.5 per recipient ──► WrappedKeyMap      │   │
//! │  │             (alice, bob, ..., self)              [wrap]         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Recipient                                                             │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  WrappedKeyMap[my_id] ──► RSA private key ──► ContentKey         │   │
//! │  │                              [identity]                         │   │
//! │  │  ContentKey + payload ──► AES-256-GCM open ──► plaintext         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Submodules
//!
//! - [`identity`] - Device RSA key pair and peer public keys
//! - [`envelope`] - Content keys and AES-256-GCM sealing
//! - [`wrap`] - Per-recipient content key wrapping
//! - [`codec`] - The `nonce:ciphertext` transport string
//!
//! There is no key rotation and no forward secrecy: a compromised device
//! private key exposes every message ever wrapped for it.

pub mod codec;
pub mod envelope;
pub mod identity;
pub mod wrap;

pub use envelope::{
    generate_key, open, open_bytes, open_str, seal, seal_bytes, ContentKey, EncryptedPayload,
    Nonce, KEY_SIZE, NONCE_SIZE, TAG_SIZE,
};
pub use identity::{fingerprint, AsymmetricIdentity, RecipientPublicKey};
