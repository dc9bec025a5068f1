use std::fmt;
use std::future::Future;

/// MQTT delivery guarantee for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    /// Fire and forget.
    AtMostOnce = 0,
    /// Acknowledged delivery, possibly repeated.
    AtLeastOnce = 1,
    /// Exactly-once handshake.
    ExactlyOnce = 2,
}

/// Low-level error reported by the session after an operation.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LwmqttError {
    /// The last operation succeeded.
    #[default]
    Success,
    BufferTooShort,
    VarnumOverflow,
    NetworkFailedConnect,
    NetworkTimeout,
    NetworkFailedRead,
    NetworkFailedWrite,
    RemainingLengthOverflow,
    RemainingLengthMismatch,
    MissingOrWrongPacket,
    ConnectionDenied,
    FailedSubscription,
    SubackArrayOverflow,
    PongTimeout,
}

impl LwmqttError {
    /// Symbolic name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Success => "LWMQTT_SUCCESS",
            Self::BufferTooShort => "LWMQTT_BUFFER_TOO_SHORT",
            Self::VarnumOverflow => "LWMQTT_VARNUM_OVERFLOW",
            Self::NetworkFailedConnect => "LWMQTT_NETWORK_FAILED_CONNECT",
            Self::NetworkTimeout => "LWMQTT_NETWORK_TIMEOUT",
            Self::NetworkFailedRead => "LWMQTT_NETWORK_FAILED_READ",
            Self::NetworkFailedWrite => "LWMQTT_NETWORK_FAILED_WRITE",
            Self::RemainingLengthOverflow => "LWMQTT_REMAINING_LENGTH_OVERFLOW",
            Self::RemainingLengthMismatch => "LWMQTT_REMAINING_LENGTH_MISMATCH",
            Self::MissingOrWrongPacket => "LWMQTT_MISSING_OR_WRONG_PACKET",
            Self::ConnectionDenied => "LWMQTT_CONNECTION_DENIED",
            Self::FailedSubscription => "LWMQTT_FAILED_SUBSCRIPTION",
            Self::SubackArrayOverflow => "LWMQTT_SUBACK_ARRAY_OVERFLOW",
            Self::PongTimeout => "LWMQTT_PONG_TIMEOUT",
        }
    }
}

impl fmt::Display for LwmqttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// CONNACK return code from the broker.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnCode {
    /// The broker accepted the connection.
    #[default]
    ConnectionAccepted,
    UnacceptableProtocol,
    IdentifierRejected,
    ServerUnavailable,
    /// The password (the device token) was not accepted.
    BadUsernameOrPassword,
    /// The device is not allowed to connect with these credentials.
    NotAuthorized,
    UnknownReturnCode,
}

impl ReturnCode {
    /// Symbolic name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ConnectionAccepted => "LWMQTT_CONNECTION_ACCEPTED",
            Self::UnacceptableProtocol => "LWMQTT_UNACCEPTABLE_PROTOCOL",
            Self::IdentifierRejected => "LWMQTT_IDENTIFIER_REJECTED",
            Self::ServerUnavailable => "LWMQTT_SERVER_UNAVAILABLE",
            Self::BadUsernameOrPassword => "LWMQTT_BAD_USERNAME_OR_PASSWORD",
            Self::NotAuthorized => "LWMQTT_NOT_AUTHORIZED",
            Self::UnknownReturnCode => "LWMQTT_UNKNOWN_RETURN_CODE",
        }
    }

    /// `true` when the broker rejected the presented token, so a fresh one
    /// must be minted before the next attempt.
    #[must_use]
    pub const fn is_credential_rejection(self) -> bool {
        matches!(self, Self::BadUsernameOrPassword | Self::NotAuthorized)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Topic the message arrived on.
    pub topic: String,
    /// Raw payload.
    pub payload: Vec<u8>,
}

/// An MQTT client session over some transport.
///
/// TCP, TLS and MQTT framing live behind this trait. The connection manager
/// only decides when to connect, with which credentials, and what to do when
/// the broker says no.
///
/// After every `connect` the manager reads [`last_error`](Self::last_error)
/// and [`return_code`](Self::return_code) to classify the outcome.
pub trait MqttSession: Send {
    /// Configures the broker endpoint. Called once before the first connect.
    fn begin(&mut self, host: &str, port: u16) -> impl Future<Output = ()> + Send;

    /// Opens the session. Returns `true` if the broker accepted it.
    fn connect(
        &mut self,
        client_id: &str,
        username: &str,
        password: &str,
        clean_session: bool,
    ) -> impl Future<Output = bool> + Send;

    /// Error from the most recent operation.
    fn last_error(&self) -> LwmqttError;

    /// Return code from the most recent CONNACK.
    fn return_code(&self) -> ReturnCode;

    /// Subscribes to `topic`. Returns `false` if the subscription failed.
    fn subscribe(&mut self, topic: &str, qos: QoS) -> impl Future<Output = bool> + Send;

    /// Publishes `payload` to `topic`. Returns `false` if it was not sent.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> impl Future<Output = bool> + Send;

    /// Closes the session and resets the transport.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;

    /// Whether the session is currently open.
    fn connected(&self) -> bool;

    /// Services the connection until the next inbound message arrives.
    ///
    /// Resolves to `None` once the connection has been lost.
    fn process(&mut self) -> impl Future<Output = Option<IncomingMessage>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_auth_codes_are_credential_rejections() {
        let rejecting = [ReturnCode::BadUsernameOrPassword, ReturnCode::NotAuthorized];
        let others = [
            ReturnCode::ConnectionAccepted,
            ReturnCode::UnacceptableProtocol,
            ReturnCode::IdentifierRejected,
            ReturnCode::ServerUnavailable,
            ReturnCode::UnknownReturnCode,
        ];
        assert!(rejecting.iter().all(|c| c.is_credential_rejection()));
        assert!(!others.iter().any(|c| c.is_credential_rejection()));
    }

    #[test]
    fn names_match_library_constants() {
        assert_eq!(LwmqttError::NetworkTimeout.to_string(), "LWMQTT_NETWORK_TIMEOUT");
        assert_eq!(
            ReturnCode::BadUsernameOrPassword.to_string(),
            "LWMQTT_BAD_USERNAME_OR_PASSWORD"
        );
        assert_eq!(QoS::AtLeastOnce as u8, 1);
    }
}
