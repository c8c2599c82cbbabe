//! MQTT session to the hub.
//!
//! Built on `rumqttc`. A fresh client and event loop are created on every
//! `connect`, so a reconnect after a reset never inherits stale state. The
//! event loop is only driven from `connect` and `poll`; publishes are queued
//! on the client and flushed by the next `poll`.

use std::time::Duration;

use roomwatch_core::{SessionError, SessionPort};
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
    Transport,
};
use tracing::{debug, info, trace, warn};

/// Maximum time to wait for the broker's CONNACK.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Keep-alive interval negotiated with the broker.
pub const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Time slice given to each event-loop step while draining in `poll`.
const POLL_SLICE: Duration = Duration::from_millis(10);

/// Upper bound on events handled per `poll`.
const POLL_BUDGET: usize = 32;

/// Queued requests between the client and the event loop.
const REQUEST_CAPACITY: usize = 16;

/// PEM marker every usable trust anchor bundle contains.
const PEM_CERTIFICATE: &[u8] = b"-----BEGIN CERTIFICATE-----";

/// Whether `pem` holds at least one PEM certificate.
#[must_use]
pub fn contains_certificate(pem: &[u8]) -> bool {
    pem.windows(PEM_CERTIFICATE.len())
        .any(|window| window == PEM_CERTIFICATE)
}

/// [`SessionPort`] over MQTT 3.1.1 with TLS.
pub struct MqttSession {
    trust_anchors: Option<Vec<u8>>,
    server: Option<(String, u16)>,
    buffer_size: usize,
    client: Option<AsyncClient>,
    eventloop: Option<EventLoop>,
    connected: bool,
}

impl std::fmt::Debug for MqttSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSession")
            .field("server", &self.server)
            .field("buffer_size", &self.buffer_size)
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

impl Default for MqttSession {
    fn default() -> Self {
        Self {
            trust_anchors: None,
            server: None,
            buffer_size: 1024,
            client: None,
            eventloop: None,
            connected: false,
        }
    }
}

impl MqttSession {
    /// An unconfigured session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn options(
        &self,
        client_id: &str,
        username: &str,
        password: &str,
    ) -> Result<MqttOptions, SessionError> {
        let (host, port) = self
            .server
            .clone()
            .ok_or_else(|| SessionError::InvalidServer("no server configured".into()))?;
        let ca = self
            .trust_anchors
            .clone()
            .ok_or_else(|| SessionError::InvalidTrustAnchors("no trust anchors installed".into()))?;

        let mut options = MqttOptions::new(client_id, host, port);
        options
            .set_credentials(username, password)
            .set_keep_alive(KEEP_ALIVE)
            .set_clean_session(true)
            .set_max_packet_size(self.buffer_size, self.buffer_size)
            .set_transport(Transport::tls(ca, None, None));
        Ok(options)
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.client = None;
        self.eventloop = None;
    }
}

fn map_connection_error(err: ConnectionError) -> SessionError {
    match err {
        ConnectionError::ConnectionRefused(code) => SessionError::Rejected(format!("{code:?}")),
        other => SessionError::Transport(other.to_string()),
    }
}

async fn await_connack(eventloop: &mut EventLoop) -> Result<(), SessionError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(SessionError::Rejected(format!("{:?}", ack.code)))
                };
            }
            Ok(event) => trace!(?event, "pre-connack event"),
            Err(e) => return Err(map_connection_error(e)),
        }
    }
}

impl SessionPort for MqttSession {
    fn set_trust_anchors(&mut self, pem: &[u8]) -> Result<(), SessionError> {
        if !contains_certificate(pem) {
            return Err(SessionError::InvalidTrustAnchors(
                "no PEM certificate found".into(),
            ));
        }
        self.trust_anchors = Some(pem.to_vec());
        Ok(())
    }

    fn set_server(&mut self, host: &str, port: u16) -> Result<(), SessionError> {
        if host.is_empty() || port == 0 {
            return Err(SessionError::InvalidServer(format!("{host}:{port}")));
        }
        self.server = Some((host.to_string(), port));
        Ok(())
    }

    fn set_buffer_size(&mut self, bytes: usize) {
        self.buffer_size = bytes;
    }

    async fn connect(
        &mut self,
        client_id: &str,
        username: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        self.disconnect();
        let options = self.options(client_id, username, password)?;
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        match tokio::time::timeout(CONNECT_TIMEOUT, await_connack(&mut eventloop)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(SessionError::Transport(format!(
                    "no CONNACK within {}s",
                    CONNECT_TIMEOUT.as_secs()
                )))
            }
        }

        info!(client_id, "mqtt session established");
        self.client = Some(client);
        self.eventloop = Some(eventloop);
        self.connected = true;
        Ok(())
    }

    fn connected(&self) -> bool {
        self.connected
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), SessionError> {
        let client = match (&self.client, self.connected) {
            (Some(client), true) => client,
            _ => return Err(SessionError::NotConnected),
        };
        client
            .try_publish(topic, QoS::AtMostOnce, retain, payload.to_vec())
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn poll(&mut self) {
        let Some(eventloop) = self.eventloop.as_mut() else {
            return;
        };

        for _ in 0..POLL_BUDGET {
            let step = tokio::time::timeout(POLL_SLICE, eventloop.poll()).await;
            match step {
                Err(_) => break,
                Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                    warn!("broker closed the session");
                    self.disconnect();
                    return;
                }
                Ok(Ok(event)) => trace!(?event, "mqtt event"),
                Ok(Err(e)) => {
                    warn!(error = %e, "mqtt connection lost");
                    self.disconnect();
                    return;
                }
            }
        }
        debug!("mqtt poll done");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEM: &[u8] = b"-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

    #[test]
    fn test_trust_anchors_must_be_pem() {
        let mut session = MqttSession::new();
        assert!(matches!(
            session.set_trust_anchors(b"not a certificate"),
            Err(SessionError::InvalidTrustAnchors(_))
        ));
        assert!(session.set_trust_anchors(PEM).is_ok());
    }

    #[test]
    fn test_set_server_rejects_empty_endpoint() {
        let mut session = MqttSession::new();
        assert!(session.set_server("", 8883).is_err());
        assert!(session.set_server("hub.example.net", 0).is_err());
        assert!(session.set_server("hub.example.net", 8883).is_ok());
    }

    #[tokio::test]
    async fn test_connect_requires_server_and_anchors() {
        let mut session = MqttSession::new();
        let err = session.connect("dev", "user", "pass").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidServer(_)));

        session.set_server("hub.example.net", 8883).unwrap();
        let err = session.connect("dev", "user", "pass").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidTrustAnchors(_)));
        assert!(!session.connected());
    }

    #[tokio::test]
    async fn test_publish_without_session_fails() {
        let mut session = MqttSession::new();
        let err = session.publish("t", b"{}", false).await.unwrap_err();
        assert_eq!(err, SessionError::NotConnected);
        session.poll().await;
    }
}
