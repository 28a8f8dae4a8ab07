//! Configuration for the encryption core.
//!
//! Constructed once at process start (usually `EncryptionConfig::default()`)
//! and handed to [`crate::EncryptionService::new`]. Embedders that ship a
//! config file can load it with [`EncryptionConfig::from_json`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Smallest RSA modulus accepted for identities and peer keys
pub const MIN_RSA_KEY_BITS: usize = 2048;

/// Largest RSA modulus accepted when parsing public keys
pub const MAX_RSA_KEY_BITS: usize = 4096;

/// Secure-store entry holding the device private key
pub const DEFAULT_KEY_ALIAS: &str = "sparks.identity.private_key";

/// Encryption core configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Secure-store entry name for the device private key
    pub key_alias: String,
    /// RSA modulus size for newly generated identities
    pub rsa_key_bits: usize,
    /// Text shown in place of a message that cannot be decrypted
    pub unreadable_placeholder: String,
    /// Text shown for a message that was never encrypted for this device
    pub not_for_us_placeholder: String,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            key_alias: DEFAULT_KEY_ALIAS.to_string(),
            rsa_key_bits: MIN_RSA_KEY_BITS,
            unreadable_placeholder: crate::message::UNREADABLE_PLACEHOLDER.to_string(),
            not_for_us_placeholder: crate::message::NOT_FOR_US_PLACEHOLDER.to_string(),
        }
    }
}

impl EncryptionConfig {
    /// Parse and validate a JSON config
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would weaken or break the protocol
    pub fn validate(&self) -> Result<()> {
        if self.key_alias.trim().is_empty() {
            return Err(Error::InvalidConfig("key_alias must not be empty".into()));
        }
        if self.rsa_key_bits < MIN_RSA_KEY_BITS {
            return Err(Error::InvalidConfig(format!(
                "rsa_key_bits {} is below the minimum of {}",
                self.rsa_key_bits, MIN_RSA_KEY_BITS
            )));
        }
        if self.rsa_key_bits > MAX_RSA_KEY_BITS || self.rsa_key_bits % 8 != 0 {
            return Err(Error::InvalidConfig(format!(
                "rsa_key_bits {} is not a supported modulus size",
                self.rsa_key_bits
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EncryptionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rsa_key_bits, 2048);
        assert_eq!(config.key_alias, DEFAULT_KEY_ALIAS);
    }

    #[test]
    fn test_from_json_partial() {
        let config = EncryptionConfig::from_json(r#"{ "rsa_key_bits": 3072 }"#).unwrap();
        assert_eq!(config.rsa_key_bits, 3072);
        assert_eq!(config.key_alias, DEFAULT_KEY_ALIAS);
    }

    #[test]
    fn test_rejects_small_keys() {
        let result = EncryptionConfig::from_json(r#"{ "rsa_key_bits": 1024 }"#);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_unsupported_sizes() {
        assert!(EncryptionConfig::from_json(r#"{ "rsa_key_bits": 8192 }"#).is_err());
        assert!(EncryptionConfig::from_json(r#"{ "rsa_key_bits": 2049 }"#).is_err());
        assert!(EncryptionConfig::from_json(r#"{ "rsa_key_bits": 4096 }"#).is_ok());
    }

    #[test]
    fn test_rejects_empty_alias() {
        let config = EncryptionConfig {
            key_alias: "  ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_garbage_json() {
        assert!(matches!(
            EncryptionConfig::from_json("not json"),
            Err(Error::InvalidConfig(_))
        ));
    }
}
