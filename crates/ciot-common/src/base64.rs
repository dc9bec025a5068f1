//! Standard-alphabet Base64 with `=` padding.
//!
//! Wraps the `base64` crate's `STANDARD` engine. Token segments are encoded
//! with this alphabet (not the URL-safe one), matching what the Cloud IoT
//! MQTT bridge has always accepted from constrained devices.

use ::base64::engine::general_purpose::STANDARD;
use ::base64::Engine;

pub use ::base64::DecodeError;

/// Encodes bytes to padded standard Base64.
///
/// # Examples
///
/// ```
/// assert_eq!(ciot_common::base64::encode(b"fo"), "Zm8=");
/// ```
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes padded standard Base64.
///
/// # Errors
///
/// Returns `DecodeError` on characters outside the alphabet or bad padding.
///
/// # Examples
///
/// ```
/// let decoded = ciot_common::base64::decode("Zm9vYg==").unwrap();
/// assert_eq!(decoded, b"foob");
/// ```
pub fn decode(s: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD.decode(s)
}

/// Length of the encoding of `len` input bytes: `4 * ceil(len / 3)`.
#[must_use]
pub const fn encoded_len(len: usize) -> usize {
    len.div_ceil(3) * 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rfc4648_vectors() {
        let cases: [(&[u8], &str); 7] = [
            (b"", ""),
            (b"f", "Zg=="),
            (b"fo", "Zm8="),
            (b"foo", "Zm9v"),
            (b"foob", "Zm9vYg=="),
            (b"fooba", "Zm9vYmE="),
            (b"foobar", "Zm9vYmFy"),
        ];
        for (raw, text) in cases {
            assert_eq!(encode(raw), text);
            assert_eq!(decode(text).unwrap(), raw);
        }
    }

    #[test]
    fn uses_standard_alphabet() {
        assert_eq!(encode(&[0xfb, 0xff]), "+/8=");
    }

    #[test]
    fn jwt_header_encoding() {
        assert_eq!(
            encode(br#"{"alg":"ES256","typ":"JWT"}"#),
            "eyJhbGciOiJFUzI1NiIsInR5cCI6IkpXVCJ9"
        );
    }

    #[test]
    fn rejects_url_safe_characters() {
        assert!(decode("-_8=").is_err());
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(bytes in proptest::collection::vec(any::<u8>(), 0..200)) {
            let text = encode(&bytes);
            prop_assert_eq!(text.len(), encoded_len(bytes.len()));
            prop_assert_eq!(decode(&text).unwrap(), bytes);
        }
    }
}
