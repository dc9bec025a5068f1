//! ECDSA over P-256 with SHA-256 digests.
//!
//! Signing accepts a precomputed 32-byte digest. The per-signature nonce is
//! derived deterministically (RFC 6979, HMAC-SHA256) unless the caller asks
//! for [`NonceStrategy::Random`]. Signatures are emitted exactly as computed:
//! no low-s normalization is applied, so roughly half of all signatures carry
//! an `s` above `n/2`. Verifiers that insist on low-s form will reject those.

use crate::bignum::{U256, BYTES};
use crate::digest::{hmac_sha256, sha256, DIGEST_LEN};
use crate::ec::{mul_generator, AffinePoint, ORDER};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Length of the colon-separated hex encoding of a private key
/// (`32 * 2` digits plus 31 separators).
pub const PRIVATE_KEY_HEX_LEN: usize = BYTES * 3 - 1;

/// Length of a raw `r ‖ s` signature.
pub const SIGNATURE_LEN: usize = BYTES * 2;

/// Length of an uncompressed SEC1 public key (`0x04 ‖ X ‖ Y`).
pub const PUBLIC_KEY_LEN: usize = BYTES * 2 + 1;

/// A private key string or byte buffer could not be used.
///
/// Returned before any arithmetic is attempted; no partially decoded key
/// is ever produced.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedKey {
    /// The input does not have the one accepted length.
    #[error("private key must be exactly {expected} characters/bytes, got {got}")]
    WrongLength {
        /// The accepted length.
        expected: usize,
        /// The length supplied.
        got: usize,
    },
    /// A character that should be a hex digit is not one.
    #[error("invalid hex digit at offset {0}")]
    InvalidHex(usize),
    /// A byte separator is not `:`.
    #[error("expected ':' separator at offset {0}")]
    InvalidSeparator(usize),
}

/// How the per-signature secret nonce `k` is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NonceStrategy {
    /// RFC 6979 derivation from the key and digest. Same inputs, same signature.
    #[default]
    Deterministic,
    /// Uniform `k` from the operating system RNG.
    Random,
}

/// A P-256 signing key: a scalar reduced modulo the group order.
pub struct PrivateKey {
    d: U256,
}

impl PrivateKey {
    /// Parses the colon-separated hex form printed by `openssl ec -text`,
    /// e.g. `"c9:af:a9:...:21"`: 32 bytes, most significant first.
    ///
    /// # Errors
    ///
    /// [`MalformedKey`] if the string is not exactly
    /// [`PRIVATE_KEY_HEX_LEN`] characters of hex pairs separated by `:`.
    pub fn from_hex(text: &str) -> Result<Self, MalformedKey> {
        let input = text.as_bytes();
        if input.len() != PRIVATE_KEY_HEX_LEN {
            return Err(MalformedKey::WrongLength {
                expected: PRIVATE_KEY_HEX_LEN,
                got: input.len(),
            });
        }

        let mut raw = Zeroizing::new([0u8; BYTES]);
        for (i, byte) in raw.iter_mut().enumerate() {
            let at = i * 3;
            let hi = hex_value(input[at]).ok_or(MalformedKey::InvalidHex(at))?;
            let lo = hex_value(input[at + 1]).ok_or(MalformedKey::InvalidHex(at + 1))?;
            if i + 1 < BYTES && input[at + 2] != b':' {
                return Err(MalformedKey::InvalidSeparator(at + 2));
            }
            *byte = (hi << 4) | lo;
        }
        Ok(Self::from_be_array(&raw))
    }

    /// Builds a key from exactly 32 big-endian bytes.
    ///
    /// # Errors
    ///
    /// [`MalformedKey::WrongLength`] for any other length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MalformedKey> {
        let raw: &[u8; BYTES] = bytes.try_into().map_err(|_| MalformedKey::WrongLength {
            expected: BYTES,
            got: bytes.len(),
        })?;
        Ok(Self::from_be_array(raw))
    }

    fn from_be_array(raw: &[u8; BYTES]) -> Self {
        Self {
            d: ORDER.reduce(&U256::from_be_bytes(raw)),
        }
    }

    /// Derives the public point `d·G`.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            point: mul_generator(&self.d).to_affine(),
        }
    }

    /// Signs a digest with the deterministic nonce.
    #[must_use]
    pub fn sign_digest(&self, digest: &[u8; DIGEST_LEN]) -> Signature {
        sign(digest, self)
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.d.zeroize();
    }
}

impl core::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// A P-256 public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey {
    point: AffinePoint,
}

impl PublicKey {
    /// Uncompressed SEC1 encoding, `0x04 ‖ X ‖ Y`.
    #[must_use]
    pub fn to_uncompressed(&self) -> [u8; PUBLIC_KEY_LEN] {
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out[0] = 0x04;
        out[1..=BYTES].copy_from_slice(&self.point.x.to_be_bytes());
        out[BYTES + 1..].copy_from_slice(&self.point.y.to_be_bytes());
        out
    }

    /// Parses an uncompressed SEC1 point, rejecting anything off the curve.
    #[must_use]
    pub fn from_uncompressed(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != PUBLIC_KEY_LEN || bytes[0] != 0x04 {
            return None;
        }
        let x: &[u8; BYTES] = bytes[1..=BYTES].try_into().ok()?;
        let y: &[u8; BYTES] = bytes[BYTES + 1..].try_into().ok()?;
        let point = AffinePoint {
            x: U256::from_be_bytes(x),
            y: U256::from_be_bytes(y),
            infinity: false,
        };
        point.is_on_curve().then_some(Self { point })
    }

    /// The affine point.
    #[must_use]
    pub const fn point(&self) -> &AffinePoint {
        &self.point
    }

    /// Checks `signature` over `digest`.
    #[must_use]
    pub fn verify_digest(&self, digest: &[u8; DIGEST_LEN], signature: &Signature) -> bool {
        verify(self, digest, signature)
    }
}

/// An ECDSA signature `(r, s)` with both components in `[1, n-1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    r: U256,
    s: U256,
}

impl Signature {
    /// The `r` component.
    #[must_use]
    pub const fn r(&self) -> &U256 {
        &self.r
    }

    /// The `s` component.
    #[must_use]
    pub const fn s(&self) -> &U256 {
        &self.s
    }

    /// Raw `r ‖ s`, each 32 bytes big-endian.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..BYTES].copy_from_slice(&self.r.to_be_bytes());
        out[BYTES..].copy_from_slice(&self.s.to_be_bytes());
        out
    }

    /// Parses raw `r ‖ s`; `None` unless both are in `[1, n-1]`.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != SIGNATURE_LEN {
            return None;
        }
        let r = U256::from_be_bytes(bytes[..BYTES].try_into().ok()?);
        let s = U256::from_be_bytes(bytes[BYTES..].try_into().ok()?);
        let in_range = |v: &U256| !v.is_zero() && ORDER.contains(v);
        (in_range(&r) && in_range(&s)).then_some(Self { r, s })
    }
}

/// RFC 6979 section 3.2 nonce generator for qlen = hlen = 256.
struct Rfc6979 {
    k: Zeroizing<[u8; DIGEST_LEN]>,
    v: Zeroizing<[u8; DIGEST_LEN]>,
    started: bool,
}

impl Rfc6979 {
    fn new(key: &PrivateKey, z: &U256) -> Self {
        let x = Zeroizing::new(key.d.to_be_bytes());
        let h1 = z.to_be_bytes();
        let mut k = Zeroizing::new([0x00u8; DIGEST_LEN]);
        let mut v = Zeroizing::new([0x01u8; DIGEST_LEN]);

        *k = hmac_sha256(&*k, &[&*v, &[0x00], &*x, &h1]);
        *v = hmac_sha256(&*k, &[&*v]);
        *k = hmac_sha256(&*k, &[&*v, &[0x01], &*x, &h1]);
        *v = hmac_sha256(&*k, &[&*v]);

        Self {
            k,
            v,
            started: false,
        }
    }

    /// Next candidate in `[1, n-1]`. Later calls continue the same
    /// HMAC-DRBG stream, as the RFC requires when a nonce is unusable.
    fn next_nonce(&mut self) -> U256 {
        loop {
            if self.started {
                *self.k = hmac_sha256(&*self.k, &[&*self.v, &[0x00]]);
                *self.v = hmac_sha256(&*self.k, &[&*self.v]);
            }
            self.started = true;
            *self.v = hmac_sha256(&*self.k, &[&*self.v]);
            let candidate = U256::from_be_bytes(&self.v);
            if !candidate.is_zero() && ORDER.contains(&candidate) {
                return candidate;
            }
        }
    }
}

enum NonceSource {
    Deterministic(Rfc6979),
    Random,
}

impl NonceSource {
    fn next_nonce(&mut self) -> U256 {
        match self {
            Self::Deterministic(drbg) => drbg.next_nonce(),
            Self::Random => loop {
                let mut bytes = Zeroizing::new([0u8; BYTES]);
                OsRng.fill_bytes(&mut *bytes);
                let candidate = U256::from_be_bytes(&bytes);
                if !candidate.is_zero() && ORDER.contains(&candidate) {
                    return candidate;
                }
            },
        }
    }
}

/// Signs `digest` with `key` using the deterministic nonce.
#[must_use]
pub fn sign(digest: &[u8; DIGEST_LEN], key: &PrivateKey) -> Signature {
    sign_with(digest, key, NonceStrategy::Deterministic)
}

/// Signs `digest` with `key`, drawing nonces per `strategy`.
///
/// A nonce yielding `r = 0` or `s = 0` is discarded and a fresh one drawn;
/// the returned signature always has both components in `[1, n-1]`.
#[must_use]
pub fn sign_with(digest: &[u8; DIGEST_LEN], key: &PrivateKey, strategy: NonceStrategy) -> Signature {
    let z = ORDER.reduce(&U256::from_be_bytes(digest));
    let mut nonces = match strategy {
        NonceStrategy::Deterministic => NonceSource::Deterministic(Rfc6979::new(key, &z)),
        NonceStrategy::Random => NonceSource::Random,
    };

    loop {
        let mut k = nonces.next_nonce();
        let point = mul_generator(&k).to_affine();
        let r = ORDER.reduce(&point.x);
        let k_inv = ORDER.inv_mod(&k);
        k.zeroize();
        let Some(mut k_inv) = k_inv else { continue };
        if r.is_zero() {
            k_inv.zeroize();
            continue;
        }
        let s = ORDER.mul_mod(&k_inv, &ORDER.add_mod(&z, &ORDER.mul_mod(&r, &key.d)));
        k_inv.zeroize();
        if s.is_zero() {
            continue;
        }
        return Signature { r, s };
    }
}

/// SHA-256 hashes `message` and signs the digest deterministically.
#[must_use]
pub fn sign_message(message: &[u8], key: &PrivateKey) -> Signature {
    sign(&sha256(message), key)
}

/// Verifies `signature` over `digest` under `public_key`.
#[must_use]
pub fn verify(public_key: &PublicKey, digest: &[u8; DIGEST_LEN], signature: &Signature) -> bool {
    let Signature { r, s } = signature;
    if r.is_zero() || s.is_zero() || !ORDER.contains(r) || !ORDER.contains(s) {
        return false;
    }
    if public_key.point.infinity || !public_key.point.is_on_curve() {
        return false;
    }
    let Some(w) = ORDER.inv_mod(s) else {
        return false;
    };
    let z = ORDER.reduce(&U256::from_be_bytes(digest));
    let u1 = ORDER.mul_mod(&z, &w);
    let u2 = ORDER.mul_mod(r, &w);
    let q = public_key.point.to_jacobian();
    let sum = mul_generator(&u1).add(&q.mul(&u2)).to_affine();
    if sum.infinity {
        return false;
    }
    // x is a field element; compare it modulo n.
    ORDER.reduce(&sum.x) == *r
}
