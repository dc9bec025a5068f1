#![allow(dead_code)]

use ciotc::backoff::ExponentialBackoff;
use ciotc::clock::Clock;
use ciotc::device::DeviceIdentity;
use ciotc::session::{IncomingMessage, LwmqttError, MqttSession, QoS, ReturnCode};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

pub const KEY_HEX: &str =
    "c9:af:a9:d8:45:ba:75:16:6b:5c:21:57:67:b1:d6:93:4e:50:c3:db:36:e8:9b:12:7b:8a:62:2b:12:0f:67:21";

pub const T0: i64 = 1_700_000_000;

pub fn test_device() -> DeviceIdentity {
    DeviceIdentity::from_hex_key("p1", "us-central1", "reg", "dev-1", KEY_HEX).unwrap()
}

pub fn zero_jitter_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(1000),
        Duration::from_millis(60_000),
        2.5,
        Duration::ZERO,
    )
}

/// Unix time that advances with tokio's (paused) clock.
pub struct PausedClock {
    base: i64,
    start: Instant,
}

impl PausedClock {
    pub fn new(base: i64) -> Self {
        Self {
            base,
            start: Instant::now(),
        }
    }
}

impl Clock for PausedClock {
    fn now_unix(&self) -> i64 {
        self.base + i64::try_from(self.start.elapsed().as_secs()).unwrap()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ConnectOutcome {
    Accept,
    Fail(LwmqttError, ReturnCode),
    /// Never completes.
    Hang,
}

impl ConnectOutcome {
    pub const fn credential_rejected() -> Self {
        Self::Fail(
            LwmqttError::ConnectionDenied,
            ReturnCode::BadUsernameOrPassword,
        )
    }

    pub const fn network_down() -> Self {
        Self::Fail(
            LwmqttError::NetworkFailedConnect,
            ReturnCode::ServerUnavailable,
        )
    }
}

#[derive(Debug, Clone)]
pub enum ProcessStep {
    Message(IncomingMessage),
    Drop,
}

#[derive(Debug, Clone)]
pub struct ConnectAttempt {
    pub at: Instant,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub clean_session: bool,
}

/// Scripted session. Connects succeed once `connect_script` runs out;
/// `process` blocks forever once `process_script` runs out.
#[derive(Debug, Default)]
pub struct FakeSession {
    pub connect_script: VecDeque<ConnectOutcome>,
    pub process_script: VecDeque<ProcessStep>,
    pub endpoint: Option<(String, u16)>,
    pub attempts: Vec<ConnectAttempt>,
    pub subscriptions: Vec<(String, QoS)>,
    pub published: Vec<(String, Vec<u8>)>,
    pub disconnects: usize,
    connected: bool,
    last_error: LwmqttError,
    return_code: ReturnCode,
}

impl FakeSession {
    pub fn with_connects(outcomes: impl IntoIterator<Item = ConnectOutcome>) -> Self {
        Self {
            connect_script: outcomes.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn passwords(&self) -> Vec<&str> {
        self.attempts.iter().map(|a| a.password.as_str()).collect()
    }

    /// Milliseconds between consecutive connect attempts.
    pub fn gaps_ms(&self) -> Vec<u128> {
        self.attempts
            .windows(2)
            .map(|w| (w[1].at - w[0].at).as_millis())
            .collect()
    }
}

impl MqttSession for FakeSession {
    async fn begin(&mut self, host: &str, port: u16) {
        self.endpoint = Some((host.to_owned(), port));
    }

    async fn connect(
        &mut self,
        client_id: &str,
        username: &str,
        password: &str,
        clean_session: bool,
    ) -> bool {
        self.attempts.push(ConnectAttempt {
            at: Instant::now(),
            client_id: client_id.to_owned(),
            username: username.to_owned(),
            password: password.to_owned(),
            clean_session,
        });
        match self.connect_script.pop_front().unwrap_or(ConnectOutcome::Accept) {
            ConnectOutcome::Accept => {
                self.last_error = LwmqttError::Success;
                self.return_code = ReturnCode::ConnectionAccepted;
                self.connected = true;
                true
            }
            ConnectOutcome::Fail(error, code) => {
                self.last_error = error;
                self.return_code = code;
                self.connected = false;
                false
            }
            ConnectOutcome::Hang => std::future::pending().await,
        }
    }

    fn last_error(&self) -> LwmqttError {
        self.last_error
    }

    fn return_code(&self) -> ReturnCode {
        self.return_code
    }

    async fn subscribe(&mut self, topic: &str, qos: QoS) -> bool {
        self.subscriptions.push((topic.to_owned(), qos));
        true
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        self.published.push((topic.to_owned(), payload.to_vec()));
        true
    }

    async fn disconnect(&mut self) {
        self.disconnects += 1;
        self.connected = false;
    }

    fn connected(&self) -> bool {
        self.connected
    }

    async fn process(&mut self) -> Option<IncomingMessage> {
        match self.process_script.pop_front() {
            Some(ProcessStep::Message(msg)) => Some(msg),
            Some(ProcessStep::Drop) => {
                self.connected = false;
                self.last_error = LwmqttError::NetworkFailedRead;
                None
            }
            None => std::future::pending().await,
        }
    }
}
