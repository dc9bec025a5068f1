//! Cryptographic primitives for minting Cloud IoT device tokens.
//!
//! This crate provides:
//! - Fixed-width 256-bit integers and Montgomery modular arithmetic ([`bignum`])
//! - NIST P-256 curve points and scalar multiplication ([`ec`])
//! - SHA-256 and HMAC-SHA256 ([`digest`])
//! - ECDSA signing with deterministic or random nonces ([`ecdsa`])
//! - Standard-alphabet Base64 ([`base64`])

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod base64;
pub mod bignum;
pub mod digest;
pub mod ec;
pub mod ecdsa;

pub use bignum::U256;
pub use ecdsa::{MalformedKey, NonceStrategy, PrivateKey, PublicKey, Signature};
