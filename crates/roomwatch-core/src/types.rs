//! Shared types and OpenAPI schemas.
//!
//! This module contains the value types that cross component boundaries:
//! the connection lifecycle state, sensor readings, and the status snapshot
//! exposed by the agent's status API.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle state of the hub connection.
///
/// Transitions only move forward on success, or reset to
/// [`ConnectionState::Disconnected`] on any failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No link, no session.
    #[default]
    Disconnected,
    /// Waiting for the network link to come up.
    NetworkJoining,
    /// Waiting for the wall clock to become plausible.
    TimeSyncing,
    /// Binding the session to the endpoint and device identity.
    SessionInitializing,
    /// Opening the authenticated session.
    SessionConnecting,
    /// Session established.
    Connected,
}

impl ConnectionState {
    /// Returns `true` only for [`ConnectionState::Connected`].
    #[inline]
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Short machine-readable name, matching the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::NetworkJoining => "network_joining",
            Self::TimeSyncing => "time_syncing",
            Self::SessionInitializing => "session_initializing",
            Self::SessionConnecting => "session_connecting",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network link status reported by the network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Associated and addressed.
    Up,
    /// Anything else.
    Down,
}

/// A single temperature reading.
///
/// Superseded by the next reading, never accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SensorReading {
    /// Temperature in degrees Celsius. Meaningless when `valid` is false.
    #[schema(example = 21.5)]
    pub temperature: f32,

    /// Whether the driver produced a usable value.
    pub valid: bool,
}

impl SensorReading {
    /// A valid reading.
    #[must_use]
    pub const fn new(temperature: f32) -> Self {
        Self {
            temperature,
            valid: true,
        }
    }

    /// A reading flagged as unusable.
    #[must_use]
    pub const fn invalid() -> Self {
        Self {
            temperature: f32::NAN,
            valid: false,
        }
    }

    /// The temperature, or `None` if the reading is invalid.
    #[must_use]
    pub fn value(&self) -> Option<f32> {
        self.valid.then_some(self.temperature)
    }
}

/// Opaque, time-bounded authorization token used to open the session.
///
/// The core never inspects or regenerates it. `Debug` output is redacted so
/// the token never ends up in logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap an externally generated token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for handing to the session layer.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether no token has been supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Credential(<empty>)")
        } else {
            f.write_str("Credential(<redacted>)")
        }
    }
}

/// Snapshot of the agent's state, refreshed after every tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "connection": "connected",
    "temperature": 21.5,
    "presence": true,
    "messages_published": 42,
    "publish_failures": 1,
    "messages_suppressed": 0,
    "last_published_at": "2025-01-15 03:30:00"
}))]
pub struct AgentStatus {
    /// Current connection state.
    pub connection: ConnectionState,

    /// Last valid temperature, if any.
    pub temperature: Option<f32>,

    /// Last presence verdict, if a window has completed.
    pub presence: Option<bool>,

    /// Messages handed to the session successfully.
    pub messages_published: u64,

    /// Messages that could not be sent.
    pub publish_failures: u64,

    /// Messages skipped because the reading was invalid.
    pub messages_suppressed: u64,

    /// Timestamp of the last successful publish.
    pub last_published_at: Option<String>,
}
