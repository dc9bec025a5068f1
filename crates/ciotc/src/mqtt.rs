use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::backoff::ExponentialBackoff;
use crate::clock::Clock;
use crate::device::DeviceIdentity;
use crate::error::{CiotError, ConnectError};
use crate::session::{IncomingMessage, LwmqttError, MqttSession, QoS};

/// Cloud IoT MQTT bridge host.
pub const MQTT_HOST: &str = "mqtt.googleapis.com";
/// Long-term-support MQTT bridge host.
pub const MQTT_HOST_LTS: &str = "mqtt.2030.ltsapis.goog";
/// MQTT over TLS.
pub const MQTT_PORT: u16 = 8883;
/// The bridge ignores the username; the token goes in the password.
pub const MQTT_USERNAME: &str = "unused";

const INBOX_CAPACITY: usize = 64;

/// Connection status of the device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    /// No session open.
    Disconnected,
    /// Attempting to connect or waiting out a backoff delay.
    Connecting,
    /// Connected and subscribed.
    Connected,
}

/// Outcome of a single connect attempt.
enum Attempt {
    Accepted,
    Failed,
    Shutdown,
}

/// Owns one device's MQTT session and keeps it connected.
///
/// Shutdown is signalled through a `watch::Receiver<()>`: any change, or the
/// sender being dropped, stops the connect loop and [`run`](Self::run).
pub struct DeviceSession<S, C> {
    session: S,
    device: DeviceIdentity,
    clock: C,
    backoff: ExponentialBackoff,
    use_lts: bool,
    log_connect: bool,
    status_tx: watch::Sender<ConnStatus>,
    inbox_tx: broadcast::Sender<IncomingMessage>,
}

impl<S: MqttSession, C: Clock> DeviceSession<S, C> {
    /// Wraps `session` for `device`. Nothing is sent until [`start`](Self::start).
    pub fn new(session: S, device: DeviceIdentity, clock: C, backoff: ExponentialBackoff) -> Self {
        let (status_tx, _) = watch::channel(ConnStatus::Disconnected);
        let (inbox_tx, _) = broadcast::channel(INBOX_CAPACITY);
        Self {
            session,
            device,
            clock,
            backoff,
            use_lts: false,
            log_connect: true,
            status_tx,
            inbox_tx,
        }
    }

    /// Connect to the long-term-support host instead of the default one.
    pub fn set_use_lts(&mut self, enabled: bool) {
        self.use_lts = enabled;
    }

    /// Publish `connected` to the state topic after each successful connect.
    pub fn set_log_connect(&mut self, enabled: bool) {
        self.log_connect = enabled;
    }

    /// Broker endpoint for the current settings.
    #[must_use]
    pub fn endpoint(&self) -> (&'static str, u16) {
        if self.use_lts {
            (MQTT_HOST_LTS, MQTT_PORT)
        } else {
            (MQTT_HOST, MQTT_PORT)
        }
    }

    /// Watches connection status changes.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<ConnStatus> {
        self.status_tx.subscribe()
    }

    /// Receives messages arriving on the config and commands topics.
    #[must_use]
    pub fn subscribe_inbound(&self) -> broadcast::Receiver<IncomingMessage> {
        self.inbox_tx.subscribe()
    }

    /// The device identity.
    #[must_use]
    pub const fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    /// The device identity, mutably.
    pub fn device_mut(&mut self) -> &mut DeviceIdentity {
        &mut self.device
    }

    /// The underlying session.
    #[must_use]
    pub const fn session(&self) -> &S {
        &self.session
    }

    /// Points the session at the broker.
    pub async fn start(&mut self) {
        let (host, port) = self.endpoint();
        info!(host, port, "starting MQTT session");
        self.session.begin(host, port).await;
    }

    /// Connects, retrying with backoff until the broker accepts the session.
    ///
    /// The first attempt uses `clean_session`; retries resume the session.
    /// A rejected credential invalidates the cached token so the next attempt
    /// presents a freshly minted one. On success the config topic is
    /// subscribed at QoS 1 and commands at QoS 0.
    ///
    /// # Errors
    ///
    /// [`ConnectError::Shutdown`] if `shutdown` fires first. All other
    /// failures are retried.
    pub async fn connect(
        &mut self,
        clean_session: bool,
        shutdown: &mut watch::Receiver<()>,
    ) -> Result<(), ConnectError> {
        let client_id = self.device.client_id();
        let mut clean_session = clean_session;
        self.status_tx.send_replace(ConnStatus::Connecting);
        info!(client_id = %client_id, "connecting");

        loop {
            match self.attempt(&client_id, clean_session, shutdown).await {
                Attempt::Accepted => break,
                Attempt::Shutdown => {
                    self.session.disconnect().await;
                    self.status_tx.send_replace(ConnStatus::Disconnected);
                    return Err(ConnectError::Shutdown);
                }
                Attempt::Failed => {}
            }

            self.session.disconnect().await;
            clean_session = false;

            let delay = self.backoff.next_delay();
            info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "delaying before reconnect"
            );
            let cancelled = tokio::select! {
                () = tokio::time::sleep(delay) => false,
                _ = shutdown.changed() => true,
            };
            if cancelled {
                self.status_tx.send_replace(ConnStatus::Disconnected);
                return Err(ConnectError::Shutdown);
            }
        }

        self.backoff.reset();
        self.status_tx.send_replace(ConnStatus::Connected);
        info!("connected");
        self.on_connect().await;
        Ok(())
    }

    async fn attempt(
        &mut self,
        client_id: &str,
        clean_session: bool,
        shutdown: &mut watch::Receiver<()>,
    ) -> Attempt {
        let password = match self.device.jwt(self.clock.now_unix()) {
            Ok(token) => token.to_owned(),
            Err(e) => {
                warn!(error = %e, "cannot mint token, skipping connect attempt");
                return Attempt::Failed;
            }
        };

        let accepted = tokio::select! {
            accepted = self.session.connect(client_id, MQTT_USERNAME, &password, clean_session) => Some(accepted),
            _ = shutdown.changed() => None,
        };
        let Some(accepted) = accepted else {
            return Attempt::Shutdown;
        };

        let error = self.session.last_error();
        let code = self.session.return_code();
        if accepted && error == LwmqttError::Success && !code.is_credential_rejection() {
            return Attempt::Accepted;
        }

        warn!(error = %error, return_code = %code, "connect failed");
        if code.is_credential_rejection() {
            info!("credentials rejected, invalidating token");
            self.device.invalidate_jwt();
        }
        Attempt::Failed
    }

    async fn on_connect(&mut self) {
        let config_topic = self.device.config_topic();
        if !self.session.subscribe(&config_topic, QoS::AtLeastOnce).await {
            warn!(topic = %config_topic, "subscribe failed");
        }
        let commands_topic = self.device.commands_topic();
        if !self.session.subscribe(&commands_topic, QoS::AtMostOnce).await {
            warn!(topic = %commands_topic, "subscribe failed");
        }

        if self.log_connect {
            if let Err(e) = self.publish_state(b"connected").await {
                warn!(error = %e, "failed to publish connect state");
            }
        }
    }

    /// Keeps the session connected until `shutdown` fires, forwarding inbound
    /// messages to [`subscribe_inbound`](Self::subscribe_inbound) receivers.
    pub async fn run(&mut self, shutdown: &mut watch::Receiver<()>) {
        self.start().await;
        let mut clean_session = true;

        loop {
            if self.connect(clean_session, shutdown).await.is_err() {
                info!("shutdown requested");
                return;
            }
            clean_session = false;

            while self.session.connected() {
                let event = tokio::select! {
                    msg = self.session.process() => Some(msg),
                    _ = shutdown.changed() => None,
                };
                match event {
                    None => {
                        info!("shutdown requested, disconnecting");
                        self.session.disconnect().await;
                        self.status_tx.send_replace(ConnStatus::Disconnected);
                        return;
                    }
                    Some(Some(msg)) => self.deliver(msg),
                    Some(None) => break,
                }
            }

            warn!(error = %self.session.last_error(), "connection lost");
            self.status_tx.send_replace(ConnStatus::Disconnected);
            self.session.disconnect().await;
        }
    }

    fn deliver(&self, msg: IncomingMessage) {
        debug!(topic = %msg.topic, len = msg.payload.len(), "message received");
        if self.inbox_tx.send(msg).is_err() {
            debug!("inbound message dropped: no active subscribers");
        }
    }

    /// Publishes telemetry to the events topic.
    ///
    /// # Errors
    ///
    /// [`CiotError::NotConnected`] or [`CiotError::PublishFailed`].
    pub async fn publish_telemetry(&mut self, payload: &[u8]) -> Result<(), CiotError> {
        let topic = self.device.events_topic();
        self.publish(topic, payload).await
    }

    /// Publishes telemetry to `events{subtopic}`.
    ///
    /// # Errors
    ///
    /// [`CiotError::NotConnected`] or [`CiotError::PublishFailed`].
    pub async fn publish_telemetry_subtopic(
        &mut self,
        subtopic: &str,
        payload: &[u8],
    ) -> Result<(), CiotError> {
        let topic = self.device.events_subtopic(subtopic);
        self.publish(topic, payload).await
    }

    /// Publishes to the state topic.
    ///
    /// # Errors
    ///
    /// [`CiotError::NotConnected`] or [`CiotError::PublishFailed`].
    pub async fn publish_state(&mut self, payload: &[u8]) -> Result<(), CiotError> {
        let topic = self.device.state_topic();
        self.publish(topic, payload).await
    }

    async fn publish(&mut self, topic: String, payload: &[u8]) -> Result<(), CiotError> {
        if !self.session.connected() {
            return Err(CiotError::NotConnected);
        }
        if self.session.publish(&topic, payload).await {
            Ok(())
        } else {
            Err(CiotError::PublishFailed { topic })
        }
    }

    /// Current backoff delay, for diagnostics.
    #[must_use]
    pub fn backoff_delay(&self) -> Duration {
        self.backoff.current()
    }
}
