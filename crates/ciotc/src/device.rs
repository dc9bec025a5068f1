use ciot_common::ecdsa::{NonceStrategy, PrivateKey, PublicKey};
use ciot_common::MalformedKey;
use tracing::{debug, info};

use crate::clock::check_plausible;
use crate::error::CiotError;
use crate::jwt::{create_jwt, Claims};

/// Default token lifetime in seconds.
pub const DEFAULT_JWT_EXP_SECS: i64 = 3600;

/// A cached token is replaced this many seconds before it expires.
pub const JWT_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Copy)]
struct Validity {
    iat: i64,
    exp: i64,
}

/// One registered device: its registry path, signing key and token cache.
pub struct DeviceIdentity {
    project_id: String,
    location: String,
    registry_id: String,
    device_id: String,
    private_key: PrivateKey,
    nonce: NonceStrategy,
    jwt_exp_secs: i64,
    jwt: String,
    validity: Option<Validity>,
    last_iat: Option<i64>,
}

impl DeviceIdentity {
    /// Creates an identity with no token minted yet.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        registry_id: impl Into<String>,
        device_id: impl Into<String>,
        private_key: PrivateKey,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            registry_id: registry_id.into(),
            device_id: device_id.into(),
            private_key,
            nonce: NonceStrategy::Deterministic,
            jwt_exp_secs: DEFAULT_JWT_EXP_SECS,
            jwt: String::new(),
            validity: None,
            last_iat: None,
        }
    }

    /// Like [`new`](Self::new), parsing the key from its colon-separated hex form.
    ///
    /// # Errors
    ///
    /// [`MalformedKey`] if the key text is not exactly 32 hex bytes.
    pub fn from_hex_key(
        project_id: impl Into<String>,
        location: impl Into<String>,
        registry_id: impl Into<String>,
        device_id: impl Into<String>,
        private_key: &str,
    ) -> Result<Self, MalformedKey> {
        let key = PrivateKey::from_hex(private_key)?;
        Ok(Self::new(project_id, location, registry_id, device_id, key))
    }

    /// Chooses how signature nonces are drawn.
    #[must_use]
    pub fn with_nonce_strategy(mut self, nonce: NonceStrategy) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the lifetime of tokens minted from now on.
    pub fn set_jwt_exp_secs(&mut self, secs: i64) {
        self.jwt_exp_secs = secs;
    }

    /// Lifetime of newly minted tokens, in seconds.
    #[must_use]
    pub const fn jwt_exp_secs(&self) -> i64 {
        self.jwt_exp_secs
    }

    /// Returns a token valid at `now`, minting a new one if the cache is
    /// empty, invalidated, or within [`JWT_REFRESH_MARGIN_SECS`] of expiry.
    ///
    /// A new token's `iat` is always later than every earlier one: if `now`
    /// has not moved past the previous `iat` (a re-mint within the same
    /// second after [`invalidate_jwt`](Self::invalidate_jwt), or a clock
    /// stepped backwards), the token is issued one second after it.
    ///
    /// # Errors
    ///
    /// [`CiotError::Clock`] if `now` is implausibly early; the cache is left
    /// untouched.
    pub fn jwt(&mut self, now: i64) -> Result<&str, CiotError> {
        let now = check_plausible(now)?;
        let fresh = self
            .validity
            .is_some_and(|v| now < v.exp - JWT_REFRESH_MARGIN_SECS);
        if !fresh {
            self.mint(now)?;
        }
        Ok(&self.jwt)
    }

    fn mint(&mut self, now: i64) -> Result<(), CiotError> {
        let iat = match self.last_iat {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        let claims = Claims::new(&self.project_id, iat, self.jwt_exp_secs);
        info!(iat = claims.iat, exp = claims.exp, "refreshing JWT");
        self.jwt = create_jwt(&claims, &self.private_key, self.nonce)?;
        debug!(jwt = %self.jwt, "minted token");
        self.validity = Some(Validity {
            iat: claims.iat,
            exp: claims.exp,
        });
        self.last_iat = Some(claims.iat);
        Ok(())
    }

    /// Forgets the cached token's validity so the next [`jwt`](Self::jwt)
    /// call mints a new one regardless of the clock.
    pub fn invalidate_jwt(&mut self) {
        self.validity = None;
    }

    /// Issued-at of the cached token, if one is valid.
    #[must_use]
    pub fn issued_at(&self) -> Option<i64> {
        self.validity.map(|v| v.iat)
    }

    /// Expiry of the cached token, if one is valid.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.validity.map(|v| v.exp)
    }

    /// The device's public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key()
    }

    /// Cloud project id (the token audience).
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Device id within the registry.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// `projects/{p}/locations/{l}/registries/{r}/devices/{d}`
    #[must_use]
    pub fn client_id(&self) -> String {
        format!(
            "projects/{}/locations/{}/registries/{}/devices/{}",
            self.project_id, self.location, self.registry_id, self.device_id
        )
    }

    /// Topic the broker delivers configuration updates on.
    #[must_use]
    pub fn config_topic(&self) -> String {
        format!("/devices/{}/config", self.device_id)
    }

    /// Wildcard topic for commands.
    #[must_use]
    pub fn commands_topic(&self) -> String {
        format!("/devices/{}/commands/#", self.device_id)
    }

    /// Telemetry topic.
    #[must_use]
    pub fn events_topic(&self) -> String {
        format!("/devices/{}/events", self.device_id)
    }

    /// Telemetry topic with `subtopic` appended verbatim (include the leading `/`).
    #[must_use]
    pub fn events_subtopic(&self, subtopic: &str) -> String {
        let mut topic = self.events_topic();
        topic.push_str(subtopic);
        topic
    }

    /// Device state topic.
    #[must_use]
    pub fn state_topic(&self) -> String {
        format!("/devices/{}/state", self.device_id)
    }

    /// REST path of this device with `suffix` appended.
    #[must_use]
    pub fn full_path(&self, suffix: &str) -> String {
        format!(
            "/v1/projects/{}/locations/{}/registries/{}/devices/{}{suffix}",
            self.project_id, self.location, self.registry_id, self.device_id
        )
    }

    /// REST path for fetching configuration newer than `version`.
    #[must_use]
    pub fn config_path(&self, version: u32) -> String {
        self.full_path(&format!("/config?local_version={version}"))
    }

    /// REST path for publishing telemetry.
    #[must_use]
    pub fn send_telemetry_path(&self) -> String {
        self.full_path(":publishEvent")
    }

    /// REST path for reporting state.
    #[must_use]
    pub fn set_state_path(&self) -> String {
        self.full_path(":setState")
    }
}

impl std::fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("client_id", &self.client_id())
            .field("jwt_exp_secs", &self.jwt_exp_secs)
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClockError;
    use crate::jwt::verify_jwt;

    const KEY_HEX: &str =
        "c9:af:a9:d8:45:ba:75:16:6b:5c:21:57:67:b1:d6:93:4e:50:c3:db:36:e8:9b:12:7b:8a:62:2b:12:0f:67:21";
    const T0: i64 = 1_700_000_000;

    fn device() -> DeviceIdentity {
        DeviceIdentity::from_hex_key("p1", "us-central1", "reg", "dev-7", KEY_HEX).unwrap()
    }

    #[test]
    fn derives_client_id_topics_and_paths() {
        let d = device();
        assert_eq!(
            d.client_id(),
            "projects/p1/locations/us-central1/registries/reg/devices/dev-7"
        );
        assert_eq!(d.config_topic(), "/devices/dev-7/config");
        assert_eq!(d.commands_topic(), "/devices/dev-7/commands/#");
        assert_eq!(d.events_topic(), "/devices/dev-7/events");
        assert_eq!(d.events_subtopic("/alerts"), "/devices/dev-7/events/alerts");
        assert_eq!(d.state_topic(), "/devices/dev-7/state");
        assert_eq!(
            d.config_path(3),
            "/v1/projects/p1/locations/us-central1/registries/reg/devices/dev-7/config?local_version=3"
        );
        assert_eq!(
            d.send_telemetry_path(),
            "/v1/projects/p1/locations/us-central1/registries/reg/devices/dev-7:publishEvent"
        );
        assert_eq!(
            d.set_state_path(),
            "/v1/projects/p1/locations/us-central1/registries/reg/devices/dev-7:setState"
        );
    }

    #[test]
    fn malformed_key_is_rejected_at_construction() {
        let err = DeviceIdentity::from_hex_key("p1", "l", "r", "d", "c9:af").unwrap_err();
        assert_eq!(err, MalformedKey::WrongLength { expected: 95, got: 5 });
    }

    #[test]
    fn token_is_cached_within_validity_window() {
        let mut d = device();
        let first = d.jwt(T0).unwrap().to_owned();
        let second = d.jwt(T0 + 3600 - 61).unwrap().to_owned();
        assert_eq!(first, second);
        assert_eq!(d.issued_at(), Some(T0));
        assert_eq!(d.expires_at(), Some(T0 + 3600));
    }

    #[test]
    fn token_is_refreshed_inside_margin() {
        let mut d = device();
        let first = d.jwt(T0).unwrap().to_owned();
        let later = T0 + 3600 - JWT_REFRESH_MARGIN_SECS;
        let second = d.jwt(later).unwrap().to_owned();
        assert_ne!(first, second);
        assert_eq!(d.issued_at(), Some(later));
    }

    #[test]
    fn invalidate_forces_regeneration() {
        let mut d = device();
        let first = d.jwt(T0).unwrap().to_owned();
        d.invalidate_jwt();
        assert_eq!(d.issued_at(), None);
        assert_eq!(d.expires_at(), None);

        let second = d.jwt(T0 + 1).unwrap().to_owned();
        assert_ne!(first, second);
        assert_eq!(d.issued_at(), Some(T0 + 1));
    }

    #[test]
    fn invalidate_within_the_same_second_still_advances_iat() {
        let mut d = device();
        let first = d.jwt(T0).unwrap().to_owned();
        d.invalidate_jwt();

        let second = d.jwt(T0).unwrap().to_owned();
        assert_ne!(first, second);
        assert_eq!(d.issued_at(), Some(T0 + 1));
        let claims = verify_jwt(&second, &d.public_key()).unwrap();
        assert_eq!(claims.iat, T0 + 1);
        assert_eq!(claims.exp, T0 + 1 + DEFAULT_JWT_EXP_SECS);

        d.invalidate_jwt();
        d.jwt(T0).unwrap();
        assert_eq!(d.issued_at(), Some(T0 + 2));

        d.invalidate_jwt();
        d.jwt(T0 + 10).unwrap();
        assert_eq!(d.issued_at(), Some(T0 + 10));
    }

    #[test]
    fn implausible_clock_mints_nothing() {
        let mut d = device();
        let err = d.jwt(100).unwrap_err();
        assert!(matches!(
            err,
            CiotError::Clock(ClockError::Implausible { now: 100 })
        ));
        assert_eq!(d.issued_at(), None);
    }

    #[test]
    fn custom_lifetime_applies_to_next_token() {
        let mut d = device();
        d.set_jwt_exp_secs(600);
        let token = d.jwt(T0).unwrap().to_owned();
        let claims = verify_jwt(&token, &d.public_key()).unwrap();
        assert_eq!(claims.exp - claims.iat, 600);
        assert_eq!(claims.aud, "p1");
    }

    #[test]
    fn random_nonce_tokens_verify() {
        let mut d = device().with_nonce_strategy(NonceStrategy::Random);
        let token = d.jwt(T0).unwrap().to_owned();
        assert!(verify_jwt(&token, &d.public_key()).is_some());
    }
}
