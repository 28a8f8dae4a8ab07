//! # Message Codec
//!
//! Pure serialization of the two-part payload representation stored in a
//! message's text field:
//!
//! ```text
//! base64(nonce) ":" base64(ciphertext_with_tag)
//! ```
//!
//! Standard base64 never produces `:`, so exactly one delimiter is expected.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::{Error, Result};

/// Separator between the nonce and ciphertext parts
pub const DELIMITER: char = ':';

/// Join a nonce and ciphertext into the transport string
pub fn encode(nonce: &[u8], ciphertext: &[u8]) -> String {
    format!("{}{}{}", BASE64.encode(nonce), DELIMITER, BASE64.encode(ciphertext))
}

/// Split a transport string back into `(nonce, ciphertext)`
///
/// Fails with [`Error::Format`] when the delimiter is missing or repeated,
/// or when either half is not valid base64.
pub fn decode(encoded: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut parts = encoded.split(DELIMITER);
    let (nonce, ciphertext) = match (parts.next(), parts.next(), parts.next()) {
        (Some(nonce), Some(ciphertext), None) => (nonce, ciphertext),
        _ => {
            return Err(Error::Format(format!(
                "expected exactly two '{}'-separated parts",
                DELIMITER
            )))
        }
    };

    let nonce = BASE64.decode(nonce)?;
    let ciphertext = BASE64.decode(ciphertext)?;
    Ok((nonce, ciphertext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_shape() {
        let encoded = encode(&[1, 2, 3], &[4, 5, 6, 7]);
        assert_eq!(encoded, "AQID:BAUGBw==");
    }

    #[test]
    fn test_decode_round_trip() {
        let (nonce, ct) = decode(&encode(&[9u8; 12], b"ciphertext")).unwrap();
        assert_eq!(nonce, vec![9u8; 12]);
        assert_eq!(ct, b"ciphertext");
    }

    #[test]
    fn test_missing_delimiter() {
        assert!(matches!(decode("AQIDBAUGBw=="), Err(Error::Format(_))));
    }

    #[test]
    fn test_duplicated_delimiter() {
        assert!(matches!(decode("AQID:BAUG:Bw=="), Err(Error::Format(_))));
    }

    #[test]
    fn test_invalid_base64() {
        assert!(matches!(decode("not base64!:AQID"), Err(Error::Format(_))));
    }

    #[test]
    fn test_empty_parts_decode_empty() {
        let (nonce, ct) = decode(":").unwrap();
        assert!(nonce.is_empty());
        assert!(ct.is_empty());
    }
}
