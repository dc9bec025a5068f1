mod common;

use ciot_common::base64;
use ciot_common::digest::sha256;
use ciot_common::ecdsa::{verify, Signature};
use ciotc::device::DeviceIdentity;
use common::KEY_HEX;

#[test]
fn minted_token_matches_reference_claims_and_verifies() {
    let mut device = DeviceIdentity::from_hex_key("p1", "us-central1", "reg", "dev", KEY_HEX).unwrap();
    let token = device.jwt(1_000_000_000).unwrap().to_owned();

    let (signed, signature_b64) = token.rsplit_once('.').unwrap();
    let (header_b64, claims_b64) = signed.split_once('.').unwrap();

    assert_eq!(
        base64::decode(header_b64).unwrap(),
        br#"{"alg":"ES256","typ":"JWT"}"#
    );
    assert_eq!(
        String::from_utf8(base64::decode(claims_b64).unwrap()).unwrap(),
        r#"{"iat":1000000000,"exp":1000003600,"aud":"p1"}"#
    );

    let signature = Signature::from_bytes(&base64::decode(signature_b64).unwrap()).unwrap();
    assert!(verify(
        &device.public_key(),
        &sha256(signed.as_bytes()),
        &signature
    ));
}

#[test]
fn token_is_reused_until_refresh_margin() {
    let mut device = DeviceIdentity::from_hex_key("p1", "l", "r", "d", KEY_HEX).unwrap();
    let first = device.jwt(1_000_000_000).unwrap().to_owned();
    assert_eq!(device.jwt(1_000_003_539).unwrap(), first);

    let refreshed = device.jwt(1_000_003_540).unwrap().to_owned();
    assert_ne!(refreshed, first);
    assert_eq!(device.issued_at(), Some(1_000_003_540));
}
