use ciot_common::MalformedKey;
use thiserror::Error;

/// The wall clock cannot be trusted to date a token.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    /// The clock reads earlier than 2000-01-01T00:00:00Z, which on a device
    /// almost always means time has not been synchronized yet.
    #[error("clock reads {now}, before 2000-01-01; time is not synchronized")]
    Implausible {
        /// The rejected reading, in Unix seconds.
        now: i64,
    },
}

/// A connect loop ended without establishing a session.
///
/// Transport failures and credential rejections are retried inside the loop
/// and never surface here.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    /// The shutdown signal fired while connecting or waiting to retry.
    #[error("connect aborted by shutdown")]
    Shutdown,
}

/// Errors surfaced to callers of the device client.
#[derive(Debug, Error)]
pub enum CiotError {
    /// The configured private key could not be parsed.
    #[error("malformed private key: {0}")]
    Key(#[from] MalformedKey),
    /// No token can be minted at the current time.
    #[error(transparent)]
    Clock(#[from] ClockError),
    /// The claims object could not be serialized.
    #[error("failed to encode token claims: {0}")]
    Claims(#[from] serde_json::Error),
    /// A publish was attempted without a live session.
    #[error("not connected")]
    NotConnected,
    /// The session refused or failed to send a publish.
    #[error("publish to {topic} failed")]
    PublishFailed {
        /// Destination topic of the failed publish.
        topic: String,
    },
    /// Connecting was abandoned.
    #[error(transparent)]
    Connect(#[from] ConnectError),
}
