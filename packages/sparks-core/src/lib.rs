//! # Sparks Core
//!
//! End-to-end encryption for the Sparks chat app: messages, media and push
//! previews are encrypted on the sending device and only readable by the
//! devices they were wrapped for. The shared document store, blob store and
//! push channel only ever see ciphertext.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SPARKS CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌───────────────────────────────────────────────────────────────────┐ │
//! │  │                     EncryptionService                             │ │
//! │  │  encrypt_for_recipients · decrypt_for_me · encrypt/decrypt_media  │ │
//! │  │  read_message · preview_notification · publish_identity           │ │
//! │  └───────┬───────────────────────┬────────────────────────┬──────────┘ │
//! │          │                       │                        │            │
//! │  ┌───────▼───────┐  ┌────────────▼──────────┐  ┌──────────▼─────────┐  │
//! │  │    Crypto     │  │   Document / Message  │  │   Notification     │  │
//! │  │               │  │                       │  │                    │  │
//! │  │ - identity    │  │ - text/encryptionKeys │  │ - PushPayload      │  │
//! │  │ - envelope    │  │ - publicKey directory │  │ - recipient pick   │  │
//! │  │ - wrap        │  │ - ReadState           │  │ - preview          │  │
//! │  │ - codec       │  │                       │  │                    │  │
//! │  └───────┬───────┘  └───────────────────────┘  └────────────────────┘  │
//! │          │                                                              │
//! │  ┌───────▼───────┐                                                      │
//! │  │   Storage     │                                                      │
//! │  │ - SecureStore │  (device private key only)                          │
//! │  └───────────────┘                                                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types and the tagged decryption outcome
//! - [`config`] - Service configuration
//! - [`crypto`] - RSA identity, AES-GCM envelope, key wrapping, codec
//! - [`storage`] - Secure storage for the device private key
//! - [`message`] - Sealed message types and per-message read state
//! - [`document`] - Typed views of store documents, public key directory
//! - [`notification`] - Push payloads and previews
//! - [`service`] - The [`EncryptionService`] orchestrator
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use sparks_core::{EncryptionConfig, EncryptionService, Recipient, SecureStore};
//!
//! # fn main() -> sparks_core::Result<()> {
//! let service = EncryptionService::new(Arc::new(SecureStore::new()), EncryptionConfig::default())?;
//! service.ensure_key_pair()?;
//!
//! # let bob_key = String::new();
//! let sealed = service.encrypt_for_recipients(b"hello", &[Recipient::new("bob", bob_key)], "alice")?;
//! let text = sealed.payload.encode();
//! let plaintext = service.decrypt_for_me(&text, &sealed.wrapped_keys, "alice");
//! # let _ = plaintext;
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SECURITY LAYERS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Content: AES-256-GCM, fresh key and nonce per message / media item    │
//! │  Keys:    RSA (PKCS#1 v1.5) wrap of the content key per recipient      │
//! │  Device:  RSA private key in the platform secure store, never exported │
//! │                                                                         │
//! │  Not provided: key rotation, forward secrecy, multi-device identities. │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod config;
pub mod crypto;
pub mod document;
pub mod error;
pub mod message;
pub mod notification;
pub mod service;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::EncryptionConfig;
pub use crypto::{AsymmetricIdentity, ContentKey, EncryptedPayload, RecipientPublicKey};
pub use document::{EncryptedMessageFields, InMemoryDirectory, MessageDocument, PublicKeyDirectory};
pub use error::{DecryptResult, DecryptionFailure, Error, Result};
pub use message::{
    MediaKind, MessageStatus, MessageType, ReadState, Recipient, SealedMedia, SealedMessage,
    SkipReason, SkippedRecipient, WrappedKeyMap,
};
pub use notification::{NotificationPreview, PushPayload};
pub use service::EncryptionService;
pub use storage::SecureStore;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Get the library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
