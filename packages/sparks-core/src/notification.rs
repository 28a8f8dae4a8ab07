//! Push notification payloads.
//!
//! The server-side trigger picks one recipient for a new message and sends
//! it the ciphertext together with *that recipient's* wrapped key. The
//! receiving device decrypts the preview through the single-recipient path
//! ([`crate::EncryptionService::preview_notification`]).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::document::EncryptedMessageFields;
use crate::error::{Error, Result};

/// Sender name used when the profile has none
pub const DEFAULT_SENDER_NAME: &str = "Someone";

/// Body shown when the push carries no ciphertext or no key
pub const NEW_MESSAGE_BODY: &str = "🔒 New Message";

/// Body shown when the push could not be decrypted
pub const ENCRYPTED_MESSAGE_BODY: &str = "🔒 Encrypted Message";

/// The data section of a chat push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    /// Conversation id
    pub chat_id: String,
    /// Sender user id
    pub sender_id: String,
    /// Display name of the sender
    pub sender_name: String,
    /// The message `text` field, verbatim
    pub encrypted_content: String,
    /// The recipient's entry from `encryptionKeys`
    pub encrypted_key: String,
}

impl PushPayload {
    /// Parse the data map of an incoming push
    ///
    /// `chatId` and `senderId` are required; everything else has a default.
    pub fn from_data(data: &HashMap<String, String>) -> Result<Self> {
        let required = |field: &str| {
            data.get(field)
                .cloned()
                .ok_or_else(|| Error::InvalidDocument(format!("push data is missing {}", field)))
        };

        Ok(Self {
            chat_id: required("chatId")?,
            sender_id: required("senderId")?,
            sender_name: data
                .get("senderName")
                .cloned()
                .unwrap_or_else(|| DEFAULT_SENDER_NAME.to_string()),
            encrypted_content: data.get("encryptedContent").cloned().unwrap_or_default(),
            encrypted_key: data.get("encryptedKey").cloned().unwrap_or_default(),
        })
    }

    /// Render as a push data map
    pub fn to_data(&self) -> HashMap<String, String> {
        HashMap::from([
            ("chatId".to_string(), self.chat_id.clone()),
            ("senderId".to_string(), self.sender_id.clone()),
            ("senderName".to_string(), self.sender_name.clone()),
            ("encryptedContent".to_string(), self.encrypted_content.clone()),
            ("encryptedKey".to_string(), self.encrypted_key.clone()),
        ])
    }

    /// Build the push for one recipient of a stored message
    ///
    /// The key is empty when the message was not wrapped for the recipient;
    /// the device then shows a generic body.
    pub fn for_recipient(
        chat_id: impl Into<String>,
        sender_id: impl Into<String>,
        sender_name: Option<&str>,
        fields: &EncryptedMessageFields,
        recipient_id: &str,
    ) -> Self {
        let sender_name = sender_name
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SENDER_NAME);

        Self {
            chat_id: chat_id.into(),
            sender_id: sender_id.into(),
            sender_name: sender_name.to_string(),
            encrypted_content: fields.text.clone(),
            encrypted_key: fields.key_for(recipient_id).unwrap_or_default().to_string(),
        }
    }

    /// Whether both the ciphertext and the wrapped key are present
    pub fn has_ciphertext(&self) -> bool {
        !self.encrypted_content.is_empty() && !self.encrypted_key.is_empty()
    }
}

/// First conversation member who is not the sender
pub fn select_recipient<'a, S: AsRef<str>>(user_ids: &'a [S], sender_id: &str) -> Option<&'a str> {
    user_ids
        .iter()
        .map(AsRef::as_ref)
        .find(|id| *id != sender_id)
}

/// What the device shows for an incoming push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreview {
    /// Conversation to open on tap
    pub chat_id: String,
    /// Notification title (the sender name)
    pub title: String,
    /// Notification body
    pub body: String,
    /// Whether `body` is decrypted message text
    pub decrypted: bool,
}
