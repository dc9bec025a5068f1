use ciot_common::NonceStrategy;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backoff::ExponentialBackoff;
use crate::clock::Clock;
use crate::device::{DeviceIdentity, JWT_REFRESH_MARGIN_SECS};
use crate::mqtt::DeviceSession;
use crate::session::MqttSession;

/// Longest token lifetime the bridge accepts.
const MAX_JWT_EXP_SECS: i64 = 24 * 60 * 60;

/// CLI interface for the device client.
#[derive(Parser)]
#[command(name = "ciotc", about = "Cloud IoT device client")]
#[command(version)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a custom configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the device private key file, overriding the configuration.
    #[arg(long, global = true)]
    pub key: Option<PathBuf>,

    /// Increase log verbosity (repeat for more detail).
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to a file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Mint a device token and print it.
    Token {
        /// Issue the token at this Unix time instead of now.
        #[arg(long)]
        at: Option<i64>,
    },
    /// Print the device public key (uncompressed SEC1, hex).
    Identity,
    /// Print the client id, MQTT topics and REST paths.
    Topics,
}

/// Runtime configuration loaded from file, env, and defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClientConfig {
    /// Registry path of the device.
    pub device: DeviceConfig,
    /// Token minting settings.
    pub jwt: JwtConfig,
    /// Broker selection and connect behaviour.
    pub mqtt: MqttConfig,
    /// Reconnection backoff settings.
    pub backoff: BackoffConfig,
}

/// Where the device lives in Cloud IoT.
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    /// Cloud project id; also the token audience.
    pub project_id: String,
    /// Cloud region of the registry.
    pub location: String,
    /// Registry id.
    pub registry_id: String,
    /// Device id.
    pub device_id: String,
    /// Private key file. Defaults to `device.key` in the config directory.
    pub private_key_file: Option<PathBuf>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: "us-central1".to_string(),
            registry_id: String::new(),
            device_id: String::new(),
            private_key_file: None,
        }
    }
}

/// Signature nonce source, as written in configuration.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NonceMode {
    /// RFC 6979 derivation.
    #[default]
    Deterministic,
    /// Operating system RNG.
    Random,
}

impl From<NonceMode> for NonceStrategy {
    fn from(mode: NonceMode) -> Self {
        match mode {
            NonceMode::Deterministic => Self::Deterministic,
            NonceMode::Random => Self::Random,
        }
    }
}

/// Token settings.
#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Token lifetime in seconds.
    pub exp_secs: i64,
    /// How signature nonces are drawn.
    pub nonce: NonceMode,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            exp_secs: 3600,
            nonce: NonceMode::Deterministic,
        }
    }
}

/// Broker settings.
#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    /// Use the long-term-support bridge host.
    pub use_lts: bool,
    /// Publish `connected` to the state topic after connecting.
    pub log_connect: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            use_lts: false,
            log_connect: true,
        }
    }
}

/// Reconnect backoff parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct BackoffConfig {
    /// First and minimum delay, in milliseconds.
    pub min_ms: u64,
    /// Maximum delay, in milliseconds.
    pub max_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub factor: f64,
    /// Upper bound (exclusive) of the random jitter added per step, in milliseconds.
    pub jitter_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_ms: 1000,
            max_ms: 60_000,
            factor: 2.5,
            jitter_ms: 500,
        }
    }
}

impl BackoffConfig {
    /// Builds the backoff this configuration describes.
    #[must_use]
    pub const fn build(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.min_ms),
            Duration::from_millis(self.max_ms),
            self.factor,
            Duration::from_millis(self.jitter_ms),
        )
    }
}

impl ClientConfig {
    /// Validates the configuration values are within acceptable bounds.
    /// Returns Ok(()) if valid, Err with description otherwise.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("device.project_id", &self.device.project_id),
            ("device.location", &self.device.location),
            ("device.registry_id", &self.device.registry_id),
            ("device.device_id", &self.device.device_id),
        ] {
            if value.is_empty() {
                return Err(format!("{name} must not be empty"));
            }
            if value.contains('/') {
                return Err(format!("{name} must not contain '/', got: {value}"));
            }
        }

        if self.jwt.exp_secs <= JWT_REFRESH_MARGIN_SECS || self.jwt.exp_secs > MAX_JWT_EXP_SECS {
            return Err(format!(
                "jwt.exp_secs must be in ({JWT_REFRESH_MARGIN_SECS}, {MAX_JWT_EXP_SECS}], got: {}",
                self.jwt.exp_secs
            ));
        }

        if self.backoff.min_ms == 0 {
            return Err("backoff.min_ms must be greater than 0".to_string());
        }
        if self.backoff.max_ms < self.backoff.min_ms {
            return Err("backoff.max_ms must be >= min_ms".to_string());
        }
        if !self.backoff.factor.is_finite() || self.backoff.factor < 1.0 {
            return Err("backoff.factor must be a finite number >= 1".to_string());
        }

        Ok(())
    }

    /// Creates the device identity this configuration describes.
    #[must_use]
    pub fn device_identity(&self, key: ciot_common::PrivateKey) -> DeviceIdentity {
        let mut device = DeviceIdentity::new(
            self.device.project_id.as_str(),
            self.device.location.as_str(),
            self.device.registry_id.as_str(),
            self.device.device_id.as_str(),
            key,
        )
        .with_nonce_strategy(self.jwt.nonce.into());
        device.set_jwt_exp_secs(self.jwt.exp_secs);
        device
    }

    /// Wraps `session` in a connection manager for this device, with the
    /// configured broker host, connect announcement and reconnect backoff.
    #[must_use]
    pub fn device_session<S: MqttSession, C: Clock>(
        &self,
        session: S,
        clock: C,
        key: ciot_common::PrivateKey,
    ) -> DeviceSession<S, C> {
        let mut ds = DeviceSession::new(
            session,
            self.device_identity(key),
            clock,
            self.backoff.build(),
        );
        ds.set_use_lts(self.mqtt.use_lts);
        ds.set_log_connect(self.mqtt.log_connect);
        ds
    }
}

/// # Errors
///
/// Returns an error if the configuration file cannot be read or parsed.
#[allow(clippy::cast_possible_wrap)]
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ClientConfig> {
    let defaults = ClientConfig::default();
    let mut builder = config::Config::builder()
        .set_default("device.project_id", defaults.device.project_id.as_str())?
        .set_default("device.location", defaults.device.location.as_str())?
        .set_default("device.registry_id", defaults.device.registry_id.as_str())?
        .set_default("device.device_id", defaults.device.device_id.as_str())?
        .set_default("jwt.exp_secs", defaults.jwt.exp_secs)?
        .set_default("jwt.nonce", "deterministic")?
        .set_default("mqtt.use_lts", defaults.mqtt.use_lts)?
        .set_default("mqtt.log_connect", defaults.mqtt.log_connect)?
        .set_default("backoff.min_ms", defaults.backoff.min_ms as i64)?
        .set_default("backoff.max_ms", defaults.backoff.max_ms as i64)?
        .set_default("backoff.factor", defaults.backoff.factor)?
        .set_default("backoff.jitter_ms", defaults.backoff.jitter_ms as i64)?;

    if let Some(config_path) = path {
        if config_path.exists() {
            builder = builder.add_source(config::File::from(config_path));
        }
    } else if let Some(config_path) = default_path("config.toml").filter(|p| p.exists()) {
        builder = builder.add_source(config::File::from(config_path));
    }

    // Keys contain underscores, so nesting uses a double underscore:
    // CIOTC_DEVICE__PROJECT_ID, CIOTC_BACKOFF__MIN_MS, ...
    builder = builder.add_source(
        config::Environment::with_prefix("CIOTC")
            .prefix_separator("_")
            .separator("__"),
    );

    let settings = builder.build()?;
    let config: ClientConfig = settings.try_deserialize()?;

    Ok(config)
}

/// `<config dir>/ciotc/<filename>`, e.g. `~/.config/ciotc/config.toml`.
#[must_use]
pub fn default_path(filename: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ciotc").join(filename))
}
