//! Connectivity lifecycle.
//!
//! [`ConnectivityManager`] owns the network link, the clock and the hub
//! session and drives them through a strictly ordered sequence:
//!
//! ```text
//! Disconnected -> NetworkJoining -> TimeSyncing -> SessionInitializing
//!              -> SessionConnecting -> Connected
//! ```
//!
//! Any failure after `Connected` resets to `Disconnected`, and the next call
//! to [`ConnectivityManager::ensure_connected`] restarts from the top. There
//! is no partial resume. Only a session initialization failure returns
//! without connecting; every other step retries until it succeeds.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::clock::ClockSynchronizer;
use crate::config::{is_valid_device_id, is_valid_hostname, AgentConfig};
use crate::ports::{Delay, NetworkPort, SessionError, SessionPort, TimeSource};
use crate::telemetry::TelemetrySink;
use crate::types::{ConnectionState, Credential, LinkStatus};

/// Number of state transitions kept for diagnostics.
pub const TRANSITION_HISTORY: usize = 16;

/// Errors that abort a connect attempt.
#[derive(Debug, Error)]
pub enum ConnectivityError {
    /// The hub hostname is not usable.
    #[error("Invalid hub endpoint: {0}")]
    InvalidEndpoint(String),

    /// The device or client identity is not usable.
    #[error("Invalid device identity: {0}")]
    InvalidIdentity(String),

    /// No trust anchors were supplied.
    #[error("No trust anchors configured")]
    MissingTrustAnchors,

    /// The session layer refused the configuration.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Everything the connect sequence needs, resolved from configuration.
#[derive(Clone)]
pub struct ConnectivitySettings {
    /// Network name.
    pub ssid: String,
    /// Network passphrase.
    pub password: String,
    /// Delay between join attempts and link polls.
    pub join_backoff: Duration,
    /// Hub hostname.
    pub host: String,
    /// Hub port.
    pub port: u16,
    /// Session client id.
    pub client_id: String,
    /// Session username.
    pub username: String,
    /// Session credential.
    pub credential: Credential,
    /// PEM trust anchors for the hub.
    pub trust_anchors: Vec<u8>,
    /// Session packet size.
    pub packet_size: usize,
    /// Delay between session connect attempts.
    pub connect_backoff: Duration,
}

impl ConnectivitySettings {
    /// Resolve settings from the agent configuration and loaded trust anchors.
    #[must_use]
    pub fn from_config(config: &AgentConfig, trust_anchors: Vec<u8>) -> Self {
        Self {
            ssid: config.network.ssid.clone(),
            password: config.network.password.clone(),
            join_backoff: config.network.join_backoff(),
            host: config.hub.host.clone(),
            port: config.hub.port,
            client_id: config.hub.client_id().to_string(),
            username: config.hub.username(),
            credential: config.hub.credential.clone(),
            trust_anchors,
            packet_size: config.hub.packet_size,
            connect_backoff: config.hub.connect_backoff(),
        }
    }
}

impl fmt::Debug for ConnectivitySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivitySettings")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .field("join_backoff", &self.join_backoff)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("credential", &self.credential)
            .field("trust_anchors", &format_args!("{} bytes", self.trust_anchors.len()))
            .field("packet_size", &self.packet_size)
            .field("connect_backoff", &self.connect_backoff)
            .finish()
    }
}

/// Drives the link, clock and session through the connection lifecycle.
#[derive(Debug)]
pub struct ConnectivityManager<N, T, S, D> {
    network: N,
    clock: ClockSynchronizer<T>,
    session: S,
    delay: D,
    settings: ConnectivitySettings,
    state: ConnectionState,
    history: VecDeque<ConnectionState>,
    local_address: Option<String>,
}

impl<N, T, S, D> ConnectivityManager<N, T, S, D>
where
    N: NetworkPort,
    T: TimeSource,
    S: SessionPort,
    D: Delay,
{
    /// Create a manager in the `Disconnected` state.
    pub fn new(
        network: N,
        clock: ClockSynchronizer<T>,
        session: S,
        delay: D,
        settings: ConnectivitySettings,
    ) -> Self {
        Self {
            network,
            clock,
            session,
            delay,
            settings,
            state: ConnectionState::Disconnected,
            history: VecDeque::with_capacity(TRANSITION_HISTORY),
            local_address: None,
        }
    }

    /// Run the connect sequence until the session is up.
    ///
    /// Returns immediately if already connected. May block for an unbounded
    /// time while the network, clock or hub are unreachable. Returns
    /// `Disconnected` only when session initialization fails, after one
    /// join backoff so the next attempt is paced.
    pub async fn ensure_connected(&mut self) -> ConnectionState {
        if self.state.is_connected() {
            if self.session.connected() {
                return self.state;
            }
            warn!("session lost, restarting connect sequence");
        }
        if self.state != ConnectionState::Disconnected {
            self.reset();
        }

        self.transition(ConnectionState::NetworkJoining);
        self.join_network().await;

        self.transition(ConnectionState::TimeSyncing);
        self.clock.synchronize(&mut self.delay).await;

        self.transition(ConnectionState::SessionInitializing);
        if let Err(e) = self.initialize_session() {
            error!(error = %e, host = %self.settings.host, "session initialization failed");
            self.reset();
            self.delay.pause(self.settings.join_backoff).await;
            return self.state;
        }

        self.transition(ConnectionState::SessionConnecting);
        self.connect_session().await;

        self.transition(ConnectionState::Connected);
        self.state
    }

    /// Drain session I/O and detect a dropped session.
    ///
    /// Resets to `Disconnected` if the session is no longer up.
    pub async fn service(&mut self) -> ConnectionState {
        if !self.state.is_connected() {
            return self.state;
        }
        if self.session.connected() {
            self.session.poll().await;
        }
        if !self.session.connected() {
            warn!("session dropped");
            self.reset();
        }
        self.state
    }

    /// Return to `Disconnected` and forget the clock synchronization.
    pub fn reset(&mut self) {
        self.clock.invalidate();
        self.local_address = None;
        self.transition(ConnectionState::Disconnected);
    }

    async fn join_network(&mut self) {
        let backoff = self.settings.join_backoff;
        info!(ssid = %self.settings.ssid, "joining network");

        while let Err(e) = self
            .network
            .join(&self.settings.ssid, &self.settings.password)
            .await
        {
            warn!(error = %e, "network join failed, retrying");
            self.delay.pause(backoff).await;
        }

        while self.network.status().await != LinkStatus::Up {
            debug!("waiting for link");
            self.delay.pause(backoff).await;
        }

        self.local_address = self.network.local_address().await;
        info!(
            address = self.local_address.as_deref().unwrap_or("unknown"),
            "network link up"
        );
    }

    fn initialize_session(&mut self) -> Result<(), ConnectivityError> {
        let settings = &self.settings;
        if !is_valid_hostname(&settings.host) {
            return Err(ConnectivityError::InvalidEndpoint(settings.host.clone()));
        }
        if !is_valid_device_id(&settings.client_id) {
            return Err(ConnectivityError::InvalidIdentity(settings.client_id.clone()));
        }
        if settings.trust_anchors.is_empty() {
            return Err(ConnectivityError::MissingTrustAnchors);
        }

        self.session.set_trust_anchors(&settings.trust_anchors)?;
        self.session.set_server(&settings.host, settings.port)?;
        debug!(host = %settings.host, port = settings.port, "session bound");
        Ok(())
    }

    async fn connect_session(&mut self) {
        self.session.set_buffer_size(self.settings.packet_size);

        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            info!(
                attempt,
                client_id = %self.settings.client_id,
                "connecting to hub"
            );
            match self
                .session
                .connect(
                    &self.settings.client_id,
                    &self.settings.username,
                    self.settings.credential.expose(),
                )
                .await
            {
                Ok(()) if self.session.connected() => return,
                Ok(()) => warn!(attempt, "connect returned without a session"),
                Err(e) => warn!(attempt, error = %e, "hub connect failed"),
            }
            self.delay.pause(self.settings.connect_backoff).await;
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        info!(from = %self.state, to = %next, "connection state");
        self.state = next;
        if self.history.len() == TRANSITION_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(next);
    }

    /// Current state.
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// The most recent states entered, oldest first.
    pub fn recent_transitions(&self) -> Vec<ConnectionState> {
        self.history.iter().copied().collect()
    }

    /// Epoch observed by the last time sync, cleared on reset.
    pub const fn last_synchronized_epoch(&self) -> Option<i64> {
        self.clock.synchronized_at()
    }

    /// Local address reported when the link came up.
    pub fn local_address(&self) -> Option<&str> {
        self.local_address.as_deref()
    }

    /// The clock synchronizer.
    pub const fn clock(&self) -> &ClockSynchronizer<T> {
        &self.clock
    }

    /// The network adapter.
    pub const fn network(&self) -> &N {
        &self.network
    }

    /// The session adapter.
    pub const fn session(&self) -> &S {
        &self.session
    }

    /// Mutable access to the session adapter.
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// The delay used for backoff.
    pub const fn delay(&self) -> &D {
        &self.delay
    }
}

impl<N, T, S, D> TelemetrySink for ConnectivityManager<N, T, S, D>
where
    N: NetworkPort,
    T: TimeSource,
    S: SessionPort,
    D: Delay,
{
    fn is_connected(&self) -> bool {
        self.state.is_connected() && self.session.connected()
    }

    async fn send(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        self.session.publish(topic, payload, retain).await
    }
}
