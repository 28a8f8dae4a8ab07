//! # Encryption Demo
//!
//! Demonstrates a group message sealed once and read by every member.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example encryption_demo
//! ```

use std::sync::Arc;

use sparks_core::{
    EncryptionConfig, EncryptionService, InMemoryDirectory, MediaKind, MessageDocument, SecureStore,
};

fn device() -> EncryptionService {
    EncryptionService::new(Arc::new(SecureStore::new()), EncryptionConfig::default())
        .expect("default config is valid")
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sparks_core=debug".into()),
        )
        .init();

    println!("=== Sparks Core: End-to-End Encryption Demo ===\n");

    // Step 1: Every device creates its identity and publishes the public key
    println!("Step 1: Creating identities (RSA-2048, this takes a moment)...");

    let directory = InMemoryDirectory::new();
    let alice = device();
    let bob = device();
    let carol = device();

    for (id, service) in [("alice", &alice), ("bob", &bob), ("carol", &carol)] {
        let public_key = service
            .publish_identity(id, &directory)
            .expect("Failed to publish identity");
        println!("  {} published a {}-byte public key", id, public_key.len());
    }
    println!();

    // Step 2: Alice seals one message for the group
    println!("Step 2: Alice encrypts a message for bob, carol and dave...");
    println!();
    println!("  ┌─────────────────────────────────────────────────────────────┐");
    println!("  │                    HYBRID ENCRYPTION                        │");
    println!("  ├─────────────────────────────────────────────────────────────┤");
    println!("  │                                                             │");
    println!("  │   \"Meet at 8?\" ──AES-256-GCM(content key)──► text          │");
    println!("  │                                                             │");
    println!("  │   content key ──RSA-PKCS1(bob)───►  encryptionKeys.bob      │");
    println!("  │               ──RSA-PKCS1(carol)─►  encryptionKeys.carol    │");
    println!("  │               ──RSA-PKCS1(alice)─►  encryptionKeys.alice    │");
    println!("  │                                                             │");
    println!("  └─────────────────────────────────────────────────────────────┘");
    println!();

    let recipients = alice
        .resolve_recipients(&directory, &["bob", "carol", "dave"])
        .expect("Directory lookup failed");
    let sealed = alice
        .encrypt_for_recipients(b"Meet at 8?", &recipients, "alice")
        .expect("Encryption failed");
    let document = MessageDocument::text(&sealed, "alice");

    println!("  text:           {}", document.text);
    println!(
        "  encryptionKeys: {:?}",
        sealed.wrapped_keys.recipients().collect::<Vec<_>>()
    );
    for skipped in &sealed.skipped_recipients {
        println!("  skipped:        {} ({:?})", skipped.id, skipped.reason);
    }
    println!("  chat list:      {}", document.summary());
    println!();

    // Step 3: Each member reads it with their own key
    println!("Step 3: Each device decrypts with its own private key...");
    let fields = document.encrypted_fields();
    for (id, service) in [("alice", &alice), ("bob", &bob), ("carol", &carol)] {
        let state = service.read_message(&fields, id);
        println!("  {:<6} sees: {}", id, state.display_text());
    }

    // A device that was never a recipient gets the placeholder, not an error
    let stranger = device();
    let state = stranger.read_message(&fields, "mallory");
    println!("  {:<6} sees: {}", "mallory", state.display_text());
    println!();

    // Step 4: Media uses the same pattern on raw bytes
    println!("Step 4: Alice sends a 10 KB photo...");
    let photo: Vec<u8> = (0..10 * 1024).map(|i| (i % 256) as u8).collect();
    let media = alice
        .encrypt_media(&photo, MediaKind::Photo, &recipients, "alice")
        .expect("Media encryption failed");
    println!("  encrypted blob: {} bytes", media.blob.len());

    let opened = bob
        .decrypt_media(&media.blob, &media.wrapped_keys, "bob")
        .expect("Bob could not open the photo");
    println!("  bob recovered the photo byte-for-byte: {}", opened == photo);
    println!();

    println!("=== Demo Complete ===");
}
