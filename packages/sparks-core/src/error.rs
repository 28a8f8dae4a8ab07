//! # Error Handling
//!
//! Error types for Sparks Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (internal, propagated with `?`)                                 │
//! │  │                                                                      │
//! │  ├── Identity Errors                                                   │
//! │  │   ├── NoIdentity            - No device key pair yet                │
//! │  │   └── KeyGenerationFailed   - RSA key generation failed             │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── KeyFormat             - Public/wrapped key string malformed   │
//! │  │   ├── Authentication        - AEAD tag mismatch                     │
//! │  │   ├── Format                - Payload not `nonce:ciphertext`        │
//! │  │   ├── NoKeyForRecipient     - Wrapped key map lacks our entry       │
//! │  │   ├── UnwrapFailed          - Private key could not unwrap          │
//! │  │   └── EncryptionFailed      - Sealing or wrapping failed            │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                    │
//! │  │   ├── StorageReadError      - Secure store read failed              │
//! │  │   ├── StorageWriteError     - Secure store write failed             │
//! │  │   └── InvalidDocument       - Store document failed validation      │
//! │  │                                                                      │
//! │  ├── Configuration Errors                                              │
//! │  │   └── InvalidConfig         - Rejected configuration value          │
//! │  │                                                                      │
//! │  └── Internal Errors                                                   │
//! │                                                                         │
//! │  DecryptionFailure (returned across the EncryptionService boundary)    │
//! │  ├── NoKeyForRecipient   "no-key-for-recipient"                        │
//! │  ├── UnwrapFailed        "unwrap-failed"                               │
//! │  ├── AuthFailed          "auth-failed"                                 │
//! │  └── MalformedPayload    "malformed-payload"                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal code returns `Result<T, Error>`. The service boundary folds every
//! decryption error into a [`DecryptionFailure`] so callers only ever see a
//! tagged outcome, never a panic.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Sparks Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of reading one message on this device
pub type DecryptResult<T> = std::result::Result<T, DecryptionFailure>;

/// Main error type for Sparks Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Identity Errors (200-299)
    // ========================================================================

    /// No device key pair has been created yet
    #[error("No identity key pair on this device. Call ensure_key_pair() first.")]
    NoIdentity,

    /// Key pair generation failed
    #[error("Failed to generate key pair: {0}")]
    KeyGenerationFailed(String),

    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================

    /// A public or wrapped key string is malformed
    #[error("Malformed key: {0}")]
    KeyFormat(String),

    /// AEAD tag mismatch (tampered ciphertext or wrong key)
    #[error("Authentication failed: ciphertext was modified or the key is wrong")]
    Authentication,

    /// Payload does not parse into the nonce/ciphertext shape
    #[error("Malformed payload: {0}")]
    Format(String),

    /// The wrapped key map has no entry for the requesting identity
    #[error("Message was not encrypted for {0}")]
    NoKeyForRecipient(String),

    /// The wrapped content key could not be recovered
    #[error("Failed to unwrap content key")]
    UnwrapFailed,

    /// Sealing or wrapping failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// Failed to read from secure storage
    #[error("Failed to read from storage: {0}")]
    StorageReadError(String),

    /// Failed to write to secure storage
    #[error("Failed to write to storage: {0}")]
    StorageWriteError(String),

    /// A document read from the external store failed validation
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    // ========================================================================
    // Configuration Errors (800-899)
    // ========================================================================

    /// Configuration value rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Numeric error code for platform bindings
    ///
    /// - 200-299: Identity
    /// - 300-399: Crypto
    /// - 400-499: Storage
    /// - 800-899: Configuration
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            Error::NoIdentity => 200,
            Error::KeyGenerationFailed(_) => 201,

            Error::KeyFormat(_) => 300,
            Error::Authentication => 301,
            Error::Format(_) => 302,
            Error::NoKeyForRecipient(_) => 303,
            Error::UnwrapFailed => 304,
            Error::EncryptionFailed(_) => 305,

            Error::StorageReadError(_) => 400,
            Error::StorageWriteError(_) => 401,
            Error::InvalidDocument(_) => 402,

            Error::InvalidConfig(_) => 800,

            Error::Internal(_) => 900,
            Error::SerializationError(_) => 901,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Cryptographic faults are deterministic for the same inputs, so
    /// only storage I/O is worth retrying, and retrying is the caller's job.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::StorageReadError(_) | Error::StorageWriteError(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Format(format!("invalid base64: {}", err))
    }
}

// ============================================================================
// DECRYPTION OUTCOME
// ============================================================================

/// Why a message could not be read on this device
///
/// This is the failure half of every decryption result returned by
/// [`crate::EncryptionService`]. It is terminal for the message on this
/// device: the UI shows a placeholder and never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "kebab-case")]
pub enum DecryptionFailure {
    /// Not encrypted for this identity
    #[error("no-key-for-recipient")]
    NoKeyForRecipient,
    /// Our private key could not recover the content key
    #[error("unwrap-failed")]
    UnwrapFailed,
    /// AEAD authentication failed
    #[error("auth-failed")]
    AuthFailed,
    /// Payload string or blob has the wrong shape
    #[error("malformed-payload")]
    MalformedPayload,
}

impl DecryptionFailure {
    /// Stable reason tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoKeyForRecipient => "no-key-for-recipient",
            Self::UnwrapFailed => "unwrap-failed",
            Self::AuthFailed => "auth-failed",
            Self::MalformedPayload => "malformed-payload",
        }
    }

    /// Whether the message was never meant for us, as opposed to broken
    pub fn is_not_for_us(&self) -> bool {
        matches!(self, Self::NoKeyForRecipient)
    }
}

impl From<Error> for DecryptionFailure {
    fn from(err: Error) -> Self {
        match err {
            Error::NoKeyForRecipient(_) => Self::NoKeyForRecipient,
            Error::Authentication => Self::AuthFailed,
            Error::Format(_) | Error::InvalidDocument(_) => Self::MalformedPayload,
            // The content key never became usable, whatever the local cause
            Error::UnwrapFailed
            | Error::KeyFormat(_)
            | Error::NoIdentity
            | Error::KeyGenerationFailed(_)
            | Error::EncryptionFailed(_)
            | Error::StorageReadError(_)
            | Error::StorageWriteError(_)
            | Error::InvalidConfig(_)
            | Error::Internal(_)
            | Error::SerializationError(_) => Self::UnwrapFailed,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
