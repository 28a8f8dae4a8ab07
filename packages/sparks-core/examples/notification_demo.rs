//! # Notification Demo
//!
//! Follows one message from the store trigger to the lock screen: the
//! server builds a push for the recipient, the recipient's device decrypts
//! the preview with the same key it would use in the chat screen.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example notification_demo
//! ```

use std::sync::Arc;

use sparks_core::notification::select_recipient;
use sparks_core::{
    EncryptionConfig, EncryptionService, InMemoryDirectory, MessageDocument, PushPayload,
    SecureStore,
};

#[tokio::main]
async fn main() -> sparks_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sparks_core=debug".into()),
        )
        .init();

    println!("=== Sparks Core: Push Notification Demo ===\n");

    let directory = InMemoryDirectory::new();
    let alice = EncryptionService::new(Arc::new(SecureStore::new()), EncryptionConfig::default())?;
    let bob = EncryptionService::new(Arc::new(SecureStore::new()), EncryptionConfig::default())?;

    alice.publish_identity("alice", &directory)?;
    bob.publish_identity("bob", &directory)?;

    // Alice's device: seal and write the message
    let members = ["alice", "bob"];
    let recipients = alice.resolve_recipients(&directory, &members)?;
    let sealed = alice
        .encrypt_for_recipients_async(b"Running late, 10 min".to_vec(), recipients, "alice".into())
        .await?;
    let document = MessageDocument::text(&sealed, "alice");
    println!("Stored message {} ({})", document.id, document.summary());

    // Server trigger: pick the recipient and forward only their key
    let Some(recipient_id) = select_recipient(&members, &document.sender_id) else {
        println!("No recipient found");
        return Ok(());
    };
    let push = PushPayload::for_recipient(
        "chat-42",
        &document.sender_id,
        Some("Alice"),
        &document.encrypted_fields(),
        recipient_id,
    );
    println!("Push to {}: {:?}", recipient_id, push.to_data().keys().collect::<Vec<_>>());

    // Bob's device: parse the push data and build the notification
    let received = PushPayload::from_data(&push.to_data())?;
    let preview = bob.preview_notification_async(received).await;
    println!();
    println!("  ┌──────────────────────────────────────────┐");
    println!("  │ {:<40} │", preview.title);
    println!("  │ {:<40} │", preview.body);
    println!("  └──────────────────────────────────────────┘");
    println!();

    // Opening the chat shows the same text
    let state = bob
        .read_message_async(document.encrypted_fields(), "bob".into())
        .await;
    println!("In-app: {}", state.display_text());

    println!("\n=== Demo Complete ===");
    Ok(())
}
