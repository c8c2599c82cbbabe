//! Ports defining the boundaries between the core and the device.
//!
//! Everything the core cannot own is reached through one of these traits:
//!
//! - [`NetworkPort`]: link association and status
//! - [`TimeSource`]: wall-clock synchronization
//! - [`SessionPort`]: the secure messaging session to the hub
//! - [`TemperatureSensor`] / [`PresenceSensor`]: raw sensor drivers
//! - [`Indicator`]: the binary output that mirrors the presence verdict
//! - [`Delay`]: the backoff primitive used between retries
//!
//! The async ports return `impl Future` so they can be implemented with plain
//! `async fn` and consumed generically; nothing here needs dynamic dispatch.
//!
//! # Example Implementation
//!
//! ```ignore
//! struct TokioDelay;
//!
//! impl Delay for TokioDelay {
//!     async fn pause(&mut self, duration: Duration) {
//!         tokio::time::sleep(duration).await;
//!     }
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::types::LinkStatus;

/// Error returned by the network layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// The association request was refused or could not be issued.
    #[error("Network join failed: {0}")]
    JoinFailed(String),

    /// The network tooling is not available on this system.
    #[error("Network backend unavailable: {0}")]
    Unavailable(String),
}

/// Error returned by the session layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The trust anchors could not be parsed or installed.
    #[error("Invalid trust anchors: {0}")]
    InvalidTrustAnchors(String),

    /// The server endpoint was rejected by the transport.
    #[error("Invalid server endpoint: {0}")]
    InvalidServer(String),

    /// The broker refused the connection (bad or expired credential, etc).
    #[error("Connection rejected: {0}")]
    Rejected(String),

    /// Transport-level failure (DNS, TCP, TLS).
    #[error("Transport error: {0}")]
    Transport(String),

    /// An operation that requires a live session was attempted without one.
    #[error("Session is not connected")]
    NotConnected,
}

/// Port for network association.
pub trait NetworkPort {
    /// Begin associating with the given network.
    ///
    /// Returning `Ok` means the request was accepted, not that the link is up;
    /// callers poll [`NetworkPort::status`] for that.
    fn join(
        &mut self,
        ssid: &str,
        password: &str,
    ) -> impl Future<Output = Result<(), NetworkError>>;

    /// Current link status.
    fn status(&mut self) -> impl Future<Output = LinkStatus>;

    /// The device's local address, if the link is up.
    fn local_address(&mut self) -> impl Future<Output = Option<String>>;
}

/// Port for wall-clock time.
pub trait TimeSource {
    /// Request synchronization against the given servers.
    ///
    /// This only starts synchronization; callers poll [`TimeSource::now`]
    /// until it returns a plausible value.
    fn sync(&mut self, offset_secs: i32, servers: &[String]) -> impl Future<Output = ()>;

    /// Current wall-clock time in seconds since the Unix epoch.
    fn now(&self) -> i64;
}

/// Port for the secure messaging session.
pub trait SessionPort {
    /// Install the PEM-encoded trust anchors used to verify the server.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTrustAnchors`] if the bundle is unusable.
    fn set_trust_anchors(&mut self, pem: &[u8]) -> Result<(), SessionError>;

    /// Bind the session to a server endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidServer`] if the endpoint is unusable.
    fn set_server(&mut self, host: &str, port: u16) -> Result<(), SessionError>;

    /// Set the maximum packet size the session will send or accept.
    fn set_buffer_size(&mut self, bytes: usize);

    /// Open the session.
    fn connect(
        &mut self,
        client_id: &str,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<(), SessionError>>;

    /// Whether the session currently reports connected.
    fn connected(&self) -> bool;

    /// Send a payload at most-once quality.
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> impl Future<Output = Result<(), SessionError>>;

    /// Drain pending incoming and outgoing traffic without blocking.
    fn poll(&mut self) -> impl Future<Output = ()>;
}

/// Port for the temperature driver.
pub trait TemperatureSensor {
    /// Read the temperature in degrees Celsius.
    ///
    /// Drivers report errors with a non-finite value (`f32::NAN`).
    fn read_temperature(&mut self) -> f32;
}

/// Port for the digital presence (motion) input.
pub trait PresenceSensor {
    /// Instantaneous presence reading.
    fn read_presence(&mut self) -> bool;
}

/// Port for the binary presence indicator (e.g. an LED).
pub trait Indicator {
    /// Turn the indicator on or off.
    fn set(&mut self, on: bool);
}

/// Port for the backoff primitive.
pub trait Delay {
    /// Wait for `duration` before returning.
    fn pause(&mut self, duration: Duration) -> impl Future<Output = ()>;
}
