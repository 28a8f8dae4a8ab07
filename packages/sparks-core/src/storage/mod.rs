//! # Storage Module
//!
//! Local persistence owned by the encryption core. Only the device private
//! key lives here; messages, profiles and media blobs belong to the external
//! document and blob stores.

mod secure_store;

pub use secure_store::SecureStore;
