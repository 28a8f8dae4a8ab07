//! # Encryption Service
//!
//! The one object the rest of the app talks to. It composes the device
//! identity, content sealing and key wrapping into "encrypt for these
//! recipients" and "decrypt with my key".
//!
//! ## Send / Receive
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          MESSAGE FLOW                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  encrypt_for_recipients(plaintext, [alice, bob], me)                   │
//! │    1. ContentKey::generate()                                           │
//! │    2. seal(plaintext)              → text                              │
//! │    3. wrap(key, pk) for alice, bob → encryptionKeys                    │
//! │       and for me                      (bad/missing keys → skipped)     │
//! │                                                                         │
//! │  decrypt_for_me(text, encryptionKeys, me)                              │
//! │    encryptionKeys[me] missing      → no-key-for-recipient              │
//! │    text not "nonce:ciphertext"     → malformed-payload                 │
//! │    unwrap with private key fails   → unwrap-failed                     │
//! │    AES-GCM tag mismatch            → auth-failed                       │
//! │    otherwise                       → plaintext                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Construct one service per signed-in device and pass it to whoever needs
//! it. Cloning is cheap. All crypto is synchronous and CPU-bound; the
//! `*_async` variants run it on tokio's blocking pool so UI-facing tasks are
//! never stalled by RSA.

use std::sync::Arc;

use crate::config::EncryptionConfig;
use crate::crypto::envelope::{self, ContentKey, EncryptedPayload};
use crate::crypto::identity::AsymmetricIdentity;
use crate::crypto::wrap;
use crate::document::{EncryptedMessageFields, PublicKeyDirectory};
use crate::error::{DecryptResult, DecryptionFailure, Error, Result};
use crate::message::{
    MediaKind, ReadState, Recipient, SealedMedia, SealedMessage, SkipReason, SkippedRecipient,
    WrappedKeyMap,
};
use crate::notification::{
    NotificationPreview, PushPayload, ENCRYPTED_MESSAGE_BODY, NEW_MESSAGE_BODY,
};
use crate::storage::SecureStore;

struct ServiceInner {
    identity: AsymmetricIdentity,
    config: EncryptionConfig,
}

/// End-to-end encryption for messages, media and push previews
#[derive(Clone)]
pub struct EncryptionService {
    inner: Arc<ServiceInner>,
}

impl EncryptionService {
    /// Create a service over a secure store
    ///
    /// The config is validated here; no key is generated until
    /// [`ensure_key_pair`](Self::ensure_key_pair) or the first send.
    pub fn new(store: Arc<SecureStore>, config: EncryptionConfig) -> Result<Self> {
        config.validate()?;
        let identity = AsymmetricIdentity::new(store, &config);
        Ok(Self {
            inner: Arc::new(ServiceInner { identity, config }),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &EncryptionConfig {
        &self.inner.config
    }

    /// The device identity
    pub fn identity(&self) -> &AsymmetricIdentity {
        &self.inner.identity
    }

    /// Create the device key pair if needed and return the public key
    pub fn ensure_key_pair(&self) -> Result<String> {
        self.inner.identity.ensure_key_pair()
    }

    /// The device public key, if an identity exists
    pub fn export_public_key(&self) -> Result<Option<String>> {
        self.inner.identity.export_public_key()
    }

    // ========================================================================
    // SENDING
    // ========================================================================

    /// Seal a message for a set of recipients and this device
    ///
    /// Recipients with a missing or unusable public key are skipped and
    /// reported in [`SealedMessage::skipped_recipients`]; they never abort
    /// the send. Failing to wrap for ourselves does.
    pub fn encrypt_for_recipients(
        &self,
        plaintext: &[u8],
        recipients: &[Recipient],
        self_id: &str,
    ) -> Result<SealedMessage> {
        let key = envelope::generate_key();
        let payload = envelope::seal(plaintext, &key)?;
        let (wrapped_keys, skipped_recipients) = self.wrap_for_all(&key, recipients, self_id)?;

        tracing::debug!(
            recipients = wrapped_keys.len(),
            skipped = skipped_recipients.len(),
            "Sealed message"
        );

        Ok(SealedMessage {
            payload,
            wrapped_keys,
            skipped_recipients,
        })
    }

    /// Seal a media blob and its caption for a set of recipients
    ///
    /// The blob is `nonce ‖ ciphertext` for the blob store. The caption for
    /// `kind` is sealed under the same content key and goes in the message
    /// text field.
    pub fn encrypt_media(
        &self,
        data: &[u8],
        kind: MediaKind,
        recipients: &[Recipient],
        self_id: &str,
    ) -> Result<SealedMedia> {
        let key = envelope::generate_key();
        let blob = envelope::seal_bytes(data, &key)?;
        let caption = envelope::seal(kind.caption().as_bytes(), &key)?;
        let (wrapped_keys, skipped_recipients) = self.wrap_for_all(&key, recipients, self_id)?;

        tracing::debug!(
            kind = ?kind,
            size = data.len(),
            recipients = wrapped_keys.len(),
            skipped = skipped_recipients.len(),
            "Sealed media"
        );

        Ok(SealedMedia {
            blob,
            caption,
            kind,
            wrapped_keys,
            skipped_recipients,
        })
    }

    fn wrap_for_all(
        &self,
        key: &ContentKey,
        recipients: &[Recipient],
        self_id: &str,
    ) -> Result<(WrappedKeyMap, Vec<SkippedRecipient>)> {
        let mut wrapped_keys = WrappedKeyMap::new();
        let mut skipped = Vec::new();

        for recipient in recipients.iter().filter(|r| r.id != self_id) {
            match wrap_for_recipient(key, recipient) {
                Ok(wrapped) => wrapped_keys.insert(recipient.id.clone(), wrapped),
                Err(reason) => {
                    tracing::warn!(
                        recipient = %recipient.id,
                        reason = ?reason,
                        "Skipping recipient"
                    );
                    skipped.push(SkippedRecipient {
                        id: recipient.id.clone(),
                        reason,
                    });
                }
            }
        }

        let own_key = AsymmetricIdentity::import_public_key(&self.ensure_key_pair()?)?;
        wrapped_keys.insert(self_id, wrap::wrap(key, &own_key)?);

        Ok((wrapped_keys, skipped))
    }

    // ========================================================================
    // RECEIVING
    // ========================================================================

    /// Decrypt a message payload with this device's entry in the key map
    pub fn decrypt_for_me(
        &self,
        payload: &str,
        wrapped_keys: &WrappedKeyMap,
        my_id: &str,
    ) -> DecryptResult<Vec<u8>> {
        let wrapped = wrapped_keys
            .get(my_id)
            .ok_or(DecryptionFailure::NoKeyForRecipient)?;
        self.decrypt_single(payload, wrapped)
    }

    /// Decrypt a payload with one wrapped key (the push notification path)
    ///
    /// The key is unwrapped before the payload is parsed, so a message that
    /// is broken in both places reports `unwrap-failed`.
    pub fn decrypt_single(&self, payload: &str, wrapped_key: &str) -> DecryptResult<Vec<u8>> {
        let key = self.unwrap_key(wrapped_key)?;
        let payload = EncryptedPayload::parse(payload).map_err(DecryptionFailure::from)?;
        envelope::open(&payload, &key).map_err(DecryptionFailure::from)
    }

    /// Decrypt a media blob downloaded from the blob store
    pub fn decrypt_media(
        &self,
        blob: &[u8],
        wrapped_keys: &WrappedKeyMap,
        my_id: &str,
    ) -> DecryptResult<Vec<u8>> {
        let wrapped = wrapped_keys
            .get(my_id)
            .ok_or(DecryptionFailure::NoKeyForRecipient)?;
        let key = self.unwrap_key(wrapped)?;
        envelope::open_bytes(blob, &key).map_err(DecryptionFailure::from)
    }

    /// Turn a stored message into what this device can display
    ///
    /// Never fails: every problem ends in [`ReadState::Unreadable`].
    pub fn read_message(&self, fields: &EncryptedMessageFields, my_id: &str) -> ReadState {
        let result = self
            .decrypt_for_me(&fields.text, &fields.encryption_keys, my_id)
            .and_then(utf8);

        if let Err(reason) = &result {
            tracing::warn!(reason = %reason, "Message unreadable on this device");
        }
        ReadState::from(result)
    }

    /// Build the notification for an incoming push
    pub fn preview_notification(&self, payload: &PushPayload) -> NotificationPreview {
        let (body, decrypted) = if !payload.has_ciphertext() {
            (NEW_MESSAGE_BODY.to_string(), false)
        } else {
            match self
                .decrypt_single(&payload.encrypted_content, &payload.encrypted_key)
                .and_then(utf8)
            {
                Ok(text) => (text, true),
                Err(reason) => {
                    tracing::warn!(
                        chat_id = %payload.chat_id,
                        reason = %reason,
                        "Push preview unreadable"
                    );
                    let body = match reason {
                        DecryptionFailure::AuthFailed => {
                            self.inner.config.unreadable_placeholder.clone()
                        }
                        _ => ENCRYPTED_MESSAGE_BODY.to_string(),
                    };
                    (body, false)
                }
            }
        };

        NotificationPreview {
            chat_id: payload.chat_id.clone(),
            title: payload.sender_name.clone(),
            body,
            decrypted,
        }
    }

    fn unwrap_key(&self, wrapped: &str) -> DecryptResult<ContentKey> {
        wrap::unwrap(wrapped, &self.inner.identity).ok_or(DecryptionFailure::UnwrapFailed)
    }

    // ========================================================================
    // DIRECTORY
    // ========================================================================

    /// Ensure the key pair exists and publish it for `user_id`
    ///
    /// Runs on login and signup.
    pub fn publish_identity(
        &self,
        user_id: &str,
        directory: &dyn PublicKeyDirectory,
    ) -> Result<String> {
        let public_key = self.ensure_key_pair()?;
        directory.publish(user_id, &public_key)?;
        tracing::info!(user_id = %user_id, "Published public key");
        Ok(public_key)
    }

    /// Look up every member's published key
    ///
    /// Members without a key come back with `public_key: None` so that the
    /// send reports them as skipped.
    pub fn resolve_recipients<S: AsRef<str>>(
        &self,
        directory: &dyn PublicKeyDirectory,
        member_ids: &[S],
    ) -> Result<Vec<Recipient>> {
        member_ids
            .iter()
            .map(|id| {
                let id = id.as_ref();
                Ok(Recipient {
                    id: id.to_string(),
                    public_key: directory.public_key(id)?,
                })
            })
            .collect()
    }

    // ========================================================================
    // ASYNC VARIANTS
    // ========================================================================

    /// [`ensure_key_pair`](Self::ensure_key_pair) on the blocking pool
    pub async fn ensure_key_pair_async(&self) -> Result<String> {
        let service = self.clone();
        run_blocking(move || service.ensure_key_pair()).await?
    }

    /// [`encrypt_for_recipients`](Self::encrypt_for_recipients) on the blocking pool
    pub async fn encrypt_for_recipients_async(
        &self,
        plaintext: Vec<u8>,
        recipients: Vec<Recipient>,
        self_id: String,
    ) -> Result<SealedMessage> {
        let service = self.clone();
        run_blocking(move || service.encrypt_for_recipients(&plaintext, &recipients, &self_id))
            .await?
    }

    /// [`encrypt_media`](Self::encrypt_media) on the blocking pool
    pub async fn encrypt_media_async(
        &self,
        data: Vec<u8>,
        kind: MediaKind,
        recipients: Vec<Recipient>,
        self_id: String,
    ) -> Result<SealedMedia> {
        let service = self.clone();
        run_blocking(move || service.encrypt_media(&data, kind, &recipients, &self_id)).await?
    }

    /// [`decrypt_media`](Self::decrypt_media) on the blocking pool
    ///
    /// The outer error only reports a failed worker task.
    pub async fn decrypt_media_async(
        &self,
        blob: Vec<u8>,
        wrapped_keys: WrappedKeyMap,
        my_id: String,
    ) -> Result<DecryptResult<Vec<u8>>> {
        let service = self.clone();
        run_blocking(move || service.decrypt_media(&blob, &wrapped_keys, &my_id)).await
    }

    /// [`read_message`](Self::read_message) on the blocking pool
    ///
    /// A failed worker task leaves the message [`ReadState::Encrypted`].
    pub async fn read_message_async(
        &self,
        fields: EncryptedMessageFields,
        my_id: String,
    ) -> ReadState {
        let service = self.clone();
        run_blocking(move || service.read_message(&fields, &my_id))
            .await
            .unwrap_or(ReadState::Encrypted)
    }

    /// [`preview_notification`](Self::preview_notification) on the blocking pool
    pub async fn preview_notification_async(&self, payload: PushPayload) -> NotificationPreview {
        let service = self.clone();
        let fallback = NotificationPreview {
            chat_id: payload.chat_id.clone(),
            title: payload.sender_name.clone(),
            body: ENCRYPTED_MESSAGE_BODY.to_string(),
            decrypted: false,
        };
        run_blocking(move || service.preview_notification(&payload))
            .await
            .unwrap_or(fallback)
    }
}

fn wrap_for_recipient(
    key: &ContentKey,
    recipient: &Recipient,
) -> std::result::Result<String, SkipReason> {
    let encoded = recipient
        .public_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or(SkipReason::MissingPublicKey)?;
    let public_key =
        AsymmetricIdentity::import_public_key(encoded).map_err(|_| SkipReason::InvalidPublicKey)?;
    wrap::wrap(key, &public_key).map_err(|_| SkipReason::WrapFailed)
}

fn utf8(bytes: Vec<u8>) -> DecryptResult<String> {
    String::from_utf8(bytes).map_err(|_| DecryptionFailure::MalformedPayload)
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "Blocking crypto task failed");
        Error::Internal(format!("blocking task failed: {}", e))
    })
}

// ============================================================================
// TESTS
// ============================================================================
