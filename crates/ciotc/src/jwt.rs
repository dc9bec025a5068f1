use ciot_common::base64;
use ciot_common::digest::sha256;
use ciot_common::ecdsa::{sign_with, verify, NonceStrategy, PrivateKey, PublicKey, Signature};
use serde::{Deserialize, Serialize};

/// The only header this client emits.
pub const JWT_HEADER: &str = r#"{"alg":"ES256","typ":"JWT"}"#;

/// Token claims. Field order is the serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
    /// Audience: the cloud project id.
    pub aud: String,
}

impl Claims {
    /// Claims for a token issued at `iat` that lives `lifetime_secs`.
    #[must_use]
    pub fn new(project_id: &str, iat: i64, lifetime_secs: i64) -> Self {
        Self {
            iat,
            exp: iat.saturating_add(lifetime_secs),
            aud: project_id.to_owned(),
        }
    }
}

/// Assembles `b64(header).b64(claims).b64(r‖s)`.
///
/// The signature covers exactly the header and claims segments built in this
/// call.
///
/// # Errors
///
/// Returns the serializer error if the claims cannot be encoded.
pub fn create_jwt(
    claims: &Claims,
    key: &PrivateKey,
    nonce: NonceStrategy,
) -> Result<String, serde_json::Error> {
    let claims_json = serde_json::to_vec(claims)?;

    let mut token = base64::encode(JWT_HEADER.as_bytes());
    token.push('.');
    token.push_str(&base64::encode(&claims_json));

    let signature = sign_with(&sha256(token.as_bytes()), key, nonce);
    token.push('.');
    token.push_str(&base64::encode(&signature.to_bytes()));
    Ok(token)
}

/// Checks a token minted by [`create_jwt`] against `public_key` and returns
/// its claims. `None` if the header, signature or claims do not check out.
#[must_use]
pub fn verify_jwt(token: &str, public_key: &PublicKey) -> Option<Claims> {
    let (signed, signature_b64) = token.rsplit_once('.')?;
    let (header_b64, claims_b64) = signed.split_once('.')?;

    if base64::decode(header_b64).ok()? != JWT_HEADER.as_bytes() {
        return None;
    }
    let signature = Signature::from_bytes(&base64::decode(signature_b64).ok()?)?;
    if !verify(public_key, &sha256(signed.as_bytes()), &signature) {
        return None;
    }
    serde_json::from_slice(&base64::decode(claims_b64).ok()?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str =
        "c9:af:a9:d8:45:ba:75:16:6b:5c:21:57:67:b1:d6:93:4e:50:c3:db:36:e8:9b:12:7b:8a:62:2b:12:0f:67:21";

    fn key() -> PrivateKey {
        PrivateKey::from_hex(KEY_HEX).unwrap()
    }

    #[test]
    fn token_segments_have_expected_contents() {
        let claims = Claims::new("p1", 1_000_000_000, 3600);
        let token = create_jwt(&claims, &key(), NonceStrategy::Deterministic).unwrap();

        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], "eyJhbGciOiJFUzI1NiIsInR5cCI6IkpXVCJ9");
        assert_eq!(
            segments[1],
            "eyJpYXQiOjEwMDAwMDAwMDAsImV4cCI6MTAwMDAwMzYwMCwiYXVkIjoicDEifQ=="
        );
        assert_eq!(base64::decode(segments[2]).unwrap().len(), 64);
    }

    #[test]
    fn minted_token_verifies_and_yields_claims() {
        let claims = Claims::new("my-project", 1_700_000_000, 3600);
        let token = create_jwt(&claims, &key(), NonceStrategy::Random).unwrap();
        assert_eq!(verify_jwt(&token, &key().public_key()), Some(claims));
    }

    #[test]
    fn deterministic_tokens_repeat() {
        let claims = Claims::new("p1", 1_000_000_000, 3600);
        let a = create_jwt(&claims, &key(), NonceStrategy::Deterministic).unwrap();
        let b = create_jwt(&claims, &key(), NonceStrategy::Deterministic).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let claims = Claims::new("p1", 1_000_000_000, 3600);
        let token = create_jwt(&claims, &key(), NonceStrategy::Deterministic).unwrap();
        let forged_claims = base64::encode(br#"{"iat":1000000000,"exp":2000000000,"aud":"p1"}"#);
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged_claims;
        assert!(verify_jwt(&parts.join("."), &key().public_key()).is_none());
    }

    #[test]
    fn wrong_key_and_garbage_are_rejected() {
        let claims = Claims::new("p1", 1_000_000_000, 3600);
        let token = create_jwt(&claims, &key(), NonceStrategy::Deterministic).unwrap();
        let other = PrivateKey::from_bytes(&[9u8; 32]).unwrap();
        assert!(verify_jwt(&token, &other.public_key()).is_none());
        assert!(verify_jwt("not-a-token", &key().public_key()).is_none());
    }
}
