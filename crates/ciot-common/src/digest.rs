//! SHA-256 message digest and the HMAC built on it.
//!
//! Wraps the `sha2` crate behind a small streaming interface: any number of
//! [`Sha256Digest::update`] calls followed by one [`Sha256Digest::finalize`].
//! The HMAC comes from the `hmac` crate over the same hash.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// Output size of SHA-256 in bytes.
pub const DIGEST_LEN: usize = 32;

/// Streaming SHA-256 state.
///
/// # Examples
///
/// ```
/// use ciot_common::digest::{sha256, Sha256Digest};
///
/// let mut h = Sha256Digest::new();
/// h.update(b"header.");
/// h.update(b"claims");
/// assert_eq!(h.finalize(), sha256(b"header.claims"));
/// ```
#[derive(Clone, Default)]
pub struct Sha256Digest(Sha256);

impl Sha256Digest {
    /// Starts a new digest.
    #[must_use]
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    /// Absorbs more input.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.0.update(data);
        self
    }

    /// Consumes the state and returns the 32-byte digest.
    #[must_use]
    pub fn finalize(self) -> [u8; DIGEST_LEN] {
        self.0.finalize().into()
    }
}

/// One-shot SHA-256.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut h = Sha256Digest::new();
    h.update(data);
    h.finalize()
}

/// HMAC-SHA256 (RFC 2104) over the concatenation of `parts`.
#[must_use]
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any length");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}
