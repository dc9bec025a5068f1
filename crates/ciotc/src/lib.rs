//! Cloud IoT device client: short-lived ES256 device tokens and an MQTT
//! connection manager that backs off on failure and re-mints its token when
//! the broker rejects it.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Exponential backoff with jitter for reconnection.
pub mod backoff;
/// Wall-clock sources and the plausibility check for token timestamps.
pub mod clock;
/// CLI parsing and TOML configuration.
pub mod config;
/// Device registry path, derived topics, and the token cache.
pub mod device;
/// Error types.
pub mod error;
/// Token assembly and verification.
pub mod jwt;
/// Loading the device private key from disk.
pub mod keyfile;
/// MQTT connection manager.
pub mod mqtt;
/// The MQTT client session interface the connection manager drives.
pub mod session;

pub use error::{CiotError, ClockError, ConnectError};
pub use mqtt::{ConnStatus, DeviceSession};
