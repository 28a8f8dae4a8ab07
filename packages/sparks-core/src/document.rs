//! # Store Documents
//!
//! Typed views of the loosely-typed documents the app reads and writes in
//! its shared document store. Everything is validated here, at the
//! boundary, so the crypto core only ever sees strings and wrapped key maps.
//!
//! ```text
//! chats/{chatId}/messages/{messageId}
//!   text            : "b64(nonce):b64(ciphertext)"
//!   encryptionKeys  : { userId: "b64(RSA-PKCS1(contentKey))", ... }
//!   ...other fields untouched by this crate
//!
//! users/{userId}
//!   publicKey       : "b64(SubjectPublicKeyInfo DER)"
//! ```

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::message::{
    MessageStatus, MessageType, SealedMedia, SealedMessage, WrappedKeyMap, LAST_MESSAGE_PREVIEW,
};

/// Message field holding the encrypted payload
pub const TEXT_FIELD: &str = "text";

/// Message field holding the wrapped key map
pub const ENCRYPTION_KEYS_FIELD: &str = "encryptionKeys";

/// User profile field holding the published public key
pub const PUBLIC_KEY_FIELD: &str = "publicKey";

/// The two encryption-related fields of a message document
///
/// `text` stays a raw string: a malformed payload is a decryption outcome,
/// not a document error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedMessageFields {
    /// Encrypted payload string
    #[serde(default)]
    pub text: String,
    /// Recipient id → wrapped content key
    #[serde(default)]
    pub encryption_keys: WrappedKeyMap,
}

impl EncryptedMessageFields {
    /// Extract and validate the fields from a message document
    ///
    /// Other fields are ignored. Fails with [`Error::InvalidDocument`] when
    /// either field has the wrong type.
    pub fn from_document(document: &Map<String, Value>) -> Result<Self> {
        let text = match document.get(TEXT_FIELD) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(Error::InvalidDocument(format!(
                    "{} must be a string, got {}",
                    TEXT_FIELD,
                    json_type(other)
                )))
            }
        };

        let encryption_keys = match document.get(ENCRYPTION_KEYS_FIELD) {
            None | Some(Value::Null) => WrappedKeyMap::new(),
            Some(Value::Object(entries)) => entries
                .iter()
                .map(|(id, wrapped)| match wrapped {
                    Value::String(s) => Ok((id.clone(), s.clone())),
                    other => Err(Error::InvalidDocument(format!(
                        "{}.{} must be a string, got {}",
                        ENCRYPTION_KEYS_FIELD,
                        id,
                        json_type(other)
                    ))),
                })
                .collect::<Result<WrappedKeyMap>>()?,
            Some(other) => {
                return Err(Error::InvalidDocument(format!(
                    "{} must be a map, got {}",
                    ENCRYPTION_KEYS_FIELD,
                    json_type(other)
                )))
            }
        };

        Ok(Self {
            text,
            encryption_keys,
        })
    }

    /// Parse from a JSON value holding a message document
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(document) => Self::from_document(document),
            other => Err(Error::InvalidDocument(format!(
                "message document must be an object, got {}",
                json_type(other)
            ))),
        }
    }

    /// Render as document fields, ready to merge into a message write
    pub fn to_document(&self) -> Map<String, Value> {
        let mut document = Map::new();
        document.insert(TEXT_FIELD.into(), Value::String(self.text.clone()));
        document.insert(
            ENCRYPTION_KEYS_FIELD.into(),
            Value::Object(
                self.encryption_keys
                    .iter()
                    .map(|(id, wrapped)| (id.to_string(), Value::String(wrapped.to_string())))
                    .collect(),
            ),
        );
        document
    }

    /// Wrapped key for one recipient
    pub fn key_for(&self, recipient_id: &str) -> Option<&str> {
        self.encryption_keys.get(recipient_id)
    }
}

impl From<&SealedMessage> for EncryptedMessageFields {
    fn from(sealed: &SealedMessage) -> Self {
        Self {
            text: sealed.payload.encode(),
            encryption_keys: sealed.wrapped_keys.clone(),
        }
    }
}

impl From<&SealedMedia> for EncryptedMessageFields {
    fn from(sealed: &SealedMedia) -> Self {
        Self {
            text: sealed.caption.encode(),
            encryption_keys: sealed.wrapped_keys.clone(),
        }
    }
}

/// A complete message document as written to `chats/{chatId}/messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDocument {
    /// Document id
    pub id: String,
    /// Encrypted payload (or sealed caption for media)
    pub text: String,
    /// Author
    pub sender_id: String,
    /// Unix milliseconds
    pub timestamp: i64,
    /// Message kind
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Download URL of the encrypted blob, for media
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Delivery status
    #[serde(default)]
    pub status: MessageStatus,
    /// Recipient id → wrapped content key
    #[serde(default)]
    pub encryption_keys: WrappedKeyMap,
}

impl MessageDocument {
    /// New outgoing text message
    pub fn text(sealed: &SealedMessage, sender_id: impl Into<String>) -> Self {
        Self::outgoing(
            EncryptedMessageFields::from(sealed),
            sender_id.into(),
            MessageType::Text,
            None,
        )
    }

    /// New outgoing media message pointing at the uploaded blob
    pub fn media(
        sealed: &SealedMedia,
        sender_id: impl Into<String>,
        blob_url: impl Into<String>,
    ) -> Self {
        Self::outgoing(
            EncryptedMessageFields::from(sealed),
            sender_id.into(),
            sealed.kind.message_type(),
            Some(blob_url.into()),
        )
    }

    fn outgoing(
        fields: EncryptedMessageFields,
        sender_id: String,
        message_type: MessageType,
        image_url: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: fields.text,
            sender_id,
            timestamp: Utc::now().timestamp_millis(),
            message_type,
            image_url,
            status: MessageStatus::Sent,
            encryption_keys: fields.encryption_keys,
        }
    }

    /// The encryption-related fields
    pub fn encrypted_fields(&self) -> EncryptedMessageFields {
        EncryptedMessageFields {
            text: self.text.clone(),
            encryption_keys: self.encryption_keys.clone(),
        }
    }

    /// Plaintext summary for the conversation list
    ///
    /// Never contains message content.
    pub fn summary(&self) -> &'static str {
        match self.message_type.media_kind() {
            Some(kind) => kind.summary_label(),
            None => LAST_MESSAGE_PREVIEW,
        }
    }

    /// Serialize to a document map
    pub fn to_document(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(document) => Ok(document),
            _ => Err(Error::Internal("message document did not serialize to an object".into())),
        }
    }

    /// Parse a stored message document
    pub fn from_document(document: &Map<String, Value>) -> Result<Self> {
        // Validate the encrypted fields first for a precise error
        EncryptedMessageFields::from_document(document)?;
        serde_json::from_value(Value::Object(document.clone()))
            .map_err(|e| Error::InvalidDocument(e.to_string()))
    }
}

/// Published public key from a user profile document
///
/// Missing, empty or non-string values all read as "no key".
pub fn public_key_from_profile(profile: &Map<String, Value>) -> Option<String> {
    profile
        .get(PUBLIC_KEY_FIELD)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// PUBLIC KEY DIRECTORY
// ============================================================================

/// Where user public keys are published and looked up
///
/// Implemented by the embedder over its user-profile store.
pub trait PublicKeyDirectory: Send + Sync {
    /// A user's published public key, if any
    fn public_key(&self, user_id: &str) -> Result<Option<String>>;

    /// Publish (or overwrite) a user's public key
    fn publish(&self, user_id: &str, public_key: &str) -> Result<()>;
}

/// Directory backed by user profile documents held in memory
#[derive(Default)]
pub struct InMemoryDirectory {
    profiles: RwLock<HashMap<String, Map<String, Value>>>,
}

impl InMemoryDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw profile document
    pub fn insert_profile(&self, user_id: impl Into<String>, profile: Map<String, Value>) {
        self.profiles.write().insert(user_id.into(), profile);
    }

    /// A copy of a profile document
    pub fn profile(&self, user_id: &str) -> Option<Map<String, Value>> {
        self.profiles.read().get(user_id).cloned()
    }
}

impl PublicKeyDirectory for InMemoryDirectory {
    fn public_key(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self
            .profiles
            .read()
            .get(user_id)
            .and_then(public_key_from_profile))
    }

    fn publish(&self, user_id: &str, public_key: &str) -> Result<()> {
        self.profiles
            .write()
            .entry(user_id.to_string())
            .or_default()
            .insert(PUBLIC_KEY_FIELD.into(), Value::String(public_key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_from_document() {
        let document = as_map(json!({
            "text": "AQID:BAUG",
            "senderId": "alice",
            "encryptionKeys": { "alice": "k1", "bob": "k2" }
        }));

        let fields = EncryptedMessageFields::from_document(&document).unwrap();
        assert_eq!(fields.text, "AQID:BAUG");
        assert_eq!(fields.key_for("bob"), Some("k2"));
        assert_eq!(fields.encryption_keys.len(), 2);
    }

    #[test]
    fn test_missing_fields_default() {
        let fields = EncryptedMessageFields::from_document(&Map::new()).unwrap();
        assert!(fields.text.is_empty());
        assert!(fields.encryption_keys.is_empty());
    }

    #[test]
    fn test_wrong_types_rejected() {
        let bad_text = as_map(json!({ "text": 42 }));
        assert!(matches!(
            EncryptedMessageFields::from_document(&bad_text),
            Err(Error::InvalidDocument(_))
        ));

        let bad_keys = as_map(json!({ "text": "a:b", "encryptionKeys": ["k1"] }));
        assert!(matches!(
            EncryptedMessageFields::from_document(&bad_keys),
            Err(Error::InvalidDocument(_))
        ));

        let bad_entry = as_map(json!({ "text": "a:b", "encryptionKeys": { "bob": 7 } }));
        assert!(matches!(
            EncryptedMessageFields::from_document(&bad_entry),
            Err(Error::InvalidDocument(_))
        ));

        assert!(EncryptedMessageFields::from_value(&json!("text")).is_err());
    }

    #[test]
    fn test_to_document_matches_serde() {
        let document = as_map(json!({
            "text": "AQID:BAUG",
            "encryptionKeys": { "alice": "k1" }
        }));
        let fields = EncryptedMessageFields::from_document(&document).unwrap();

        assert_eq!(fields.to_document(), document);
        assert_eq!(serde_json::to_value(&fields).unwrap(), Value::Object(document));
    }

    fn sealed_fixture() -> SealedMessage {
        SealedMessage {
            payload: crate::crypto::EncryptedPayload::parse("AAAAAAAAAAAAAAAA:AQID").unwrap(),
            wrapped_keys: [("alice".to_string(), "k1".to_string())].into_iter().collect(),
            skipped_recipients: Vec::new(),
        }
    }

    #[test]
    fn test_message_document_text() {
        let doc = MessageDocument::text(&sealed_fixture(), "alice");

        assert_eq!(doc.text, "AAAAAAAAAAAAAAAA:AQID");
        assert_eq!(doc.message_type, MessageType::Text);
        assert_eq!(doc.status, MessageStatus::Sent);
        assert!(doc.timestamp > 0);
        assert!(Uuid::parse_str(&doc.id).is_ok());
        assert_eq!(doc.summary(), LAST_MESSAGE_PREVIEW);

        let document = doc.to_document().unwrap();
        assert_eq!(document.get("type"), Some(&json!("TEXT")));
        assert_eq!(document.get("senderId"), Some(&json!("alice")));
        assert!(!document.contains_key("imageUrl"));
        assert_eq!(MessageDocument::from_document(&document).unwrap(), doc);
    }

    #[test]
    fn test_message_document_media() {
        let sealed = SealedMedia {
            blob: vec![0u8; 40],
            caption: crate::crypto::EncryptedPayload::parse("AAAAAAAAAAAAAAAA:AQID").unwrap(),
            kind: crate::message::MediaKind::Audio,
            wrapped_keys: WrappedKeyMap::new(),
            skipped_recipients: Vec::new(),
        };
        let doc = MessageDocument::media(&sealed, "alice", "https://blobs.example/a1");

        assert_eq!(doc.message_type, MessageType::Audio);
        assert_eq!(doc.image_url.as_deref(), Some("https://blobs.example/a1"));
        assert_eq!(doc.summary(), "🎤 Voice Message");
    }

    #[test]
    fn test_message_document_ignores_unknown_fields() {
        let document = as_map(json!({
            "id": "m1",
            "text": "a:b",
            "senderId": "bob",
            "timestamp": 1700000000000i64,
            "type": "IMAGE",
            "reactions": { "alice": "❤️" },
            "deletedFor": []
        }));

        let doc = MessageDocument::from_document(&document).unwrap();
        assert_eq!(doc.message_type, MessageType::Image);
        assert!(doc.encryption_keys.is_empty());
        assert_eq!(doc.encrypted_fields().text, "a:b");

        let bad = as_map(json!({
            "id": "m1",
            "text": "a:b",
            "senderId": "bob",
            "timestamp": 1,
            "type": "GIF"
        }));
        assert!(matches!(MessageDocument::from_document(&bad), Err(Error::InvalidDocument(_))));
    }

    #[test]
    fn test_public_key_from_profile() {
        assert_eq!(
            public_key_from_profile(&as_map(json!({ "publicKey": "MIIB" }))),
            Some("MIIB".to_string())
        );
        assert_eq!(public_key_from_profile(&as_map(json!({ "publicKey": "  " }))), None);
        assert_eq!(public_key_from_profile(&as_map(json!({ "publicKey": 1 }))), None);
        assert_eq!(public_key_from_profile(&as_map(json!({ "firstName": "Bob" }))), None);
    }

    #[test]
    fn test_in_memory_directory() {
        let directory = InMemoryDirectory::new();
        directory.insert_profile("bob", as_map(json!({ "firstName": "Bob" })));

        assert_eq!(directory.public_key("bob").unwrap(), None);
        assert_eq!(directory.public_key("nobody").unwrap(), None);

        directory.publish("bob", "MIIB").unwrap();
        assert_eq!(directory.public_key("bob").unwrap(), Some("MIIB".into()));

        // Publishing keeps the rest of the profile
        let profile = directory.profile("bob").unwrap();
        assert_eq!(profile.get("firstName"), Some(&json!("Bob")));
    }
}
