//! # Message Model
//!
//! Types shared between the encryption service and the chat UI: what a
//! sealed message looks like before it is written to the store, and what a
//! received message turns into on this device.
//!
//! ## Read State
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      PER-MESSAGE READ STATE                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   Encrypted ──── decrypt_for_me ──┬── Ok ──────► Plaintext(text)        │
//! │                                   │                                     │
//! │                                   └── Err ─────► Unreadable(reason)     │
//! │                                                                         │
//! │   Unreadable is terminal on this device: no retry, fixed placeholder.  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::EncryptionConfig;
use crate::crypto::EncryptedPayload;
use crate::error::DecryptionFailure;

/// Chat-list preview for any encrypted message
pub const LAST_MESSAGE_PREVIEW: &str = "🔒 Encrypted Message";

/// Shown in place of a message that failed to decrypt
pub const UNREADABLE_PLACEHOLDER: &str = "🔒 Decryption Failed";

/// Shown for a message that carries no key for this device
pub const NOT_FOR_US_PLACEHOLDER: &str = "🔒 Encrypted Message";

/// Kind of chat message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    /// Text message
    #[default]
    Text,
    /// Photo
    Image,
    /// Voice message
    Audio,
    /// Video clip
    Video,
}

impl MessageType {
    /// The media kind, for non-text messages
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            Self::Text => None,
            Self::Image => Some(MediaKind::Photo),
            Self::Audio => Some(MediaKind::Audio),
            Self::Video => Some(MediaKind::Video),
        }
    }
}

/// Delivery status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageStatus {
    /// Written to the store
    #[default]
    Sent,
    /// Reached the recipient's device
    Delivered,
    /// Opened by the recipient
    Read,
}

/// Media category of an encrypted blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Photo
    Photo,
    /// Voice message
    Audio,
    /// Video clip
    Video,
}

impl MediaKind {
    /// Caption sealed into the message text alongside the blob
    pub fn caption(&self) -> &'static str {
        match self {
            Self::Photo => "📷 Encrypted Photo",
            Self::Audio => "🎤 Encrypted Audio",
            Self::Video => "🎥 Encrypted Video",
        }
    }

    /// Label for the conversation summary
    pub fn summary_label(&self) -> &'static str {
        match self {
            Self::Photo => "📷 Photo",
            Self::Audio => "🎤 Voice Message",
            Self::Video => "🎥 Video",
        }
    }

    /// Matching message type
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Photo => MessageType::Image,
            Self::Audio => MessageType::Audio,
            Self::Video => MessageType::Video,
        }
    }
}

/// Recipient id → base64 RSA-wrapped content key
///
/// Built once when a message is sealed and never mutated afterwards, so
/// only the crate can insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WrappedKeyMap(BTreeMap<String, String>);

impl WrappedKeyMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, recipient_id: impl Into<String>, wrapped: String) {
        self.0.insert(recipient_id.into(), wrapped);
    }

    /// Wrapped key for one recipient
    pub fn get(&self, recipient_id: &str) -> Option<&str> {
        self.0.get(recipient_id).map(String::as_str)
    }

    /// Whether the recipient has an entry
    pub fn contains(&self, recipient_id: &str) -> bool {
        self.0.contains_key(recipient_id)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Recipient ids with an entry
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate `(recipient_id, wrapped_key)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Consume into the underlying map
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl From<BTreeMap<String, String>> for WrappedKeyMap {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, String)> for WrappedKeyMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An intended reader and their published key, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// User id
    pub id: String,
    /// Published public key (base64 SPKI DER)
    pub public_key: Option<String>,
}

impl Recipient {
    /// Recipient with a published key
    pub fn new(id: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            public_key: Some(public_key.into()),
        }
    }

    /// Recipient who never published a key
    pub fn without_key(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            public_key: None,
        }
    }
}

/// Why a recipient got no wrapped key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// No public key published
    MissingPublicKey,
    /// Published key failed to parse
    InvalidPublicKey,
    /// RSA encryption failed
    WrapFailed,
}

/// A recipient left out of a send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecipient {
    /// User id
    pub id: String,
    /// Why it was skipped
    pub reason: SkipReason,
}

/// A sealed text message ready for the store
#[derive(Debug, Clone)]
pub struct SealedMessage {
    /// Goes in the `text` field
    pub payload: EncryptedPayload,
    /// Goes in the `encryptionKeys` field
    pub wrapped_keys: WrappedKeyMap,
    /// Recipients who will not be able to read this message
    pub skipped_recipients: Vec<SkippedRecipient>,
}

impl SealedMessage {
    /// Whether every requested recipient got a key
    pub fn is_complete(&self) -> bool {
        self.skipped_recipients.is_empty()
    }
}

/// A sealed media item: the blob for the blob store plus its message fields
#[derive(Debug, Clone)]
pub struct SealedMedia {
    /// `nonce ‖ ciphertext`, uploaded as-is
    pub blob: Vec<u8>,
    /// Caption sealed under the same content key, for the `text` field
    pub caption: EncryptedPayload,
    /// Media kind
    pub kind: MediaKind,
    /// Goes in the `encryptionKeys` field
    pub wrapped_keys: WrappedKeyMap,
    /// Recipients who will not be able to open the blob
    pub skipped_recipients: Vec<SkippedRecipient>,
}

/// What this device can show for a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadState {
    /// Not decrypted yet
    Encrypted,
    /// Decrypted text
    Plaintext(String),
    /// Decryption failed; terminal
    Unreadable(DecryptionFailure),
}

impl ReadState {
    /// Text to render, using the default placeholders
    pub fn display_text(&self) -> &str {
        match self {
            Self::Encrypted => LAST_MESSAGE_PREVIEW,
            Self::Plaintext(text) => text.as_str(),
            Self::Unreadable(reason) if reason.is_not_for_us() => NOT_FOR_US_PLACEHOLDER,
            Self::Unreadable(_) => UNREADABLE_PLACEHOLDER,
        }
    }

    /// Text to render, using configured placeholders
    pub fn display_text_with<'a>(&'a self, config: &'a EncryptionConfig) -> &'a str {
        match self {
            Self::Encrypted => LAST_MESSAGE_PREVIEW,
            Self::Plaintext(text) => text.as_str(),
            Self::Unreadable(reason) if reason.is_not_for_us() => {
                config.not_for_us_placeholder.as_str()
            }
            Self::Unreadable(_) => config.unreadable_placeholder.as_str(),
        }
    }

    /// Whether no further decryption attempt should be made
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Encrypted)
    }
}

impl From<Result<String, DecryptionFailure>> for ReadState {
    fn from(result: Result<String, DecryptionFailure>) -> Self {
        match result {
            Ok(text) => Self::Plaintext(text),
            Err(reason) => Self::Unreadable(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_wire_names() {
        assert_eq!(serde_json::to_string(&MessageType::Image).unwrap(), "\"IMAGE\"");
        assert_eq!(
            serde_json::from_str::<MessageStatus>("\"DELIVERED\"").unwrap(),
            MessageStatus::Delivered
        );
        assert_eq!(MessageType::default(), MessageType::Text);
    }

    #[test]
    fn test_media_captions() {
        assert_eq!(MediaKind::Photo.caption(), "📷 Encrypted Photo");
        assert_eq!(MediaKind::Audio.caption(), "🎤 Encrypted Audio");
        assert_eq!(MediaKind::Video.caption(), "🎥 Encrypted Video");
        assert_eq!(MediaKind::Audio.summary_label(), "🎤 Voice Message");

        for kind in [MediaKind::Photo, MediaKind::Audio, MediaKind::Video] {
            assert_eq!(kind.message_type().media_kind(), Some(kind));
        }
        assert_eq!(MessageType::Text.media_kind(), None);
    }

    #[test]
    fn test_read_state_display() {
        assert_eq!(ReadState::Encrypted.display_text(), LAST_MESSAGE_PREVIEW);
        assert_eq!(ReadState::Plaintext("hi".into()).display_text(), "hi");
        assert_eq!(
            ReadState::Unreadable(DecryptionFailure::AuthFailed).display_text(),
            UNREADABLE_PLACEHOLDER
        );
        assert_eq!(
            ReadState::Unreadable(DecryptionFailure::NoKeyForRecipient).display_text(),
            NOT_FOR_US_PLACEHOLDER
        );
    }

    #[test]
    fn test_read_state_configured_placeholders() {
        let config = EncryptionConfig {
            unreadable_placeholder: "[unreadable]".into(),
            ..Default::default()
        };
        let state = ReadState::Unreadable(DecryptionFailure::UnwrapFailed);

        assert_eq!(state.display_text_with(&config), "[unreadable]");
        assert!(state.is_terminal());
        assert!(!ReadState::Encrypted.is_terminal());
    }

    #[test]
    fn test_wrapped_key_map_serializes_flat() {
        let map: WrappedKeyMap = [
            ("bob".to_string(), "k2".to_string()),
            ("alice".to_string(), "k1".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"alice":"k1","bob":"k2"}"#);
        assert_eq!(map.get("alice"), Some("k1"));
        assert!(!map.contains("carol"));
        assert_eq!(map.recipients().collect::<Vec<_>>(), vec!["alice", "bob"]);
    }
}
