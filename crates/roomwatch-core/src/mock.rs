//! In-memory implementations of every port.
//!
//! Used by the unit tests and by the agent's simulation mode
//! (`mock-hardware` feature). Scripted values are consumed in order; once a
//! script runs out the fake settles on a steady fallback.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use tracing::info;

use crate::ports::{
    Delay, Indicator, NetworkError, NetworkPort, PresenceSensor, SessionError, SessionPort,
    TemperatureSensor, TimeSource,
};
use crate::types::LinkStatus;

/// Scripted network layer.
#[derive(Debug)]
pub struct MockNetwork {
    join_results: VecDeque<Result<(), NetworkError>>,
    statuses: VecDeque<LinkStatus>,
    fallback: LinkStatus,
    address: String,
    join_calls: u32,
}

impl MockNetwork {
    /// A network whose link is always up.
    #[must_use]
    pub fn up() -> Self {
        Self::with_statuses([])
    }

    /// A network reporting `statuses` in order, then up.
    #[must_use]
    pub fn with_statuses(statuses: impl IntoIterator<Item = LinkStatus>) -> Self {
        Self {
            join_results: VecDeque::new(),
            statuses: statuses.into_iter().collect(),
            fallback: LinkStatus::Up,
            address: "192.168.1.50".to_string(),
            join_calls: 0,
        }
    }

    /// Reject the next `count` join requests.
    #[must_use]
    pub fn failing_joins(mut self, count: usize) -> Self {
        self.join_results.extend(
            std::iter::repeat_with(|| Err(NetworkError::JoinFailed("no such network".into())))
                .take(count),
        );
        self
    }

    /// Number of join requests issued.
    #[must_use]
    pub const fn join_calls(&self) -> u32 {
        self.join_calls
    }
}

impl NetworkPort for MockNetwork {
    async fn join(&mut self, _ssid: &str, _password: &str) -> Result<(), NetworkError> {
        self.join_calls += 1;
        self.join_results.pop_front().unwrap_or(Ok(()))
    }

    async fn status(&mut self) -> LinkStatus {
        self.statuses.pop_front().unwrap_or(self.fallback)
    }

    async fn local_address(&mut self) -> Option<String> {
        Some(self.address.clone())
    }
}

/// Scripted time source.
#[derive(Debug)]
pub struct MockClock {
    readings: RefCell<VecDeque<i64>>,
    current: Cell<i64>,
    sync_calls: u32,
}

impl MockClock {
    /// A clock that already reads `epoch`.
    #[must_use]
    pub fn synchronized(epoch: i64) -> Self {
        Self::with_readings([epoch])
    }

    /// A clock returning `readings` in order, then repeating the last one.
    #[must_use]
    pub fn with_readings(readings: impl IntoIterator<Item = i64>) -> Self {
        Self {
            readings: RefCell::new(readings.into_iter().collect()),
            current: Cell::new(0),
            sync_calls: 0,
        }
    }

    /// Number of sync requests issued.
    #[must_use]
    pub const fn sync_calls(&self) -> u32 {
        self.sync_calls
    }
}

impl TimeSource for MockClock {
    async fn sync(&mut self, _offset_secs: i32, _servers: &[String]) {
        self.sync_calls += 1;
    }

    fn now(&self) -> i64 {
        if let Some(next) = self.readings.borrow_mut().pop_front() {
            self.current.set(next);
        }
        self.current.get()
    }
}

/// A message captured by [`MockSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Topic it was sent to.
    pub topic: String,
    /// Raw payload.
    pub payload: Vec<u8>,
    /// Retain flag.
    pub retain: bool,
}

impl PublishedMessage {
    /// Payload as UTF-8 text.
    #[must_use]
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or("<binary>")
    }
}

/// Scripted session layer.
#[derive(Debug, Default)]
pub struct MockSession {
    connect_results: VecDeque<Result<(), SessionError>>,
    connected: bool,
    reject_trust_anchors: bool,
    fail_publish: bool,
    log_publishes: bool,
    server: Option<(String, u16)>,
    buffer_size: Option<usize>,
    connect_attempts: u32,
    polls: u32,
    published: Vec<PublishedMessage>,
}

impl MockSession {
    /// A session that accepts every connect.
    #[must_use]
    pub fn accepting() -> Self {
        Self::default()
    }

    /// A session that rejects the first `failures` connects, then accepts.
    #[must_use]
    pub fn failing_then_accepting(failures: usize) -> Self {
        let mut session = Self::default();
        session.connect_results.extend(
            std::iter::repeat_with(|| Err(SessionError::Rejected("not authorized".into())))
                .take(failures),
        );
        session
    }

    /// Reject the trust anchor bundle during session initialization.
    #[must_use]
    pub const fn rejecting_trust_anchors(mut self) -> Self {
        self.reject_trust_anchors = true;
        self
    }

    /// Fail every publish with a transport error.
    #[must_use]
    pub const fn failing_publishes(mut self) -> Self {
        self.fail_publish = true;
        self
    }

    /// Log published payloads at `info` (simulation mode).
    #[must_use]
    pub const fn logging_publishes(mut self) -> Self {
        self.log_publishes = true;
        self
    }

    /// Simulate the broker dropping the session.
    pub fn drop_connection(&mut self) {
        self.connected = false;
    }

    /// Messages published so far.
    #[must_use]
    pub fn published(&self) -> &[PublishedMessage] {
        &self.published
    }

    /// Connect attempts so far.
    #[must_use]
    pub const fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    /// Poll calls so far.
    #[must_use]
    pub const fn polls(&self) -> u32 {
        self.polls
    }

    /// Endpoint bound by `set_server`.
    #[must_use]
    pub fn server(&self) -> Option<(&str, u16)> {
        self.server.as_ref().map(|(host, port)| (host.as_str(), *port))
    }

    /// Buffer size set by `set_buffer_size`.
    #[must_use]
    pub const fn buffer_size(&self) -> Option<usize> {
        self.buffer_size
    }
}

impl SessionPort for MockSession {
    fn set_trust_anchors(&mut self, _pem: &[u8]) -> Result<(), SessionError> {
        if self.reject_trust_anchors {
            return Err(SessionError::InvalidTrustAnchors("no certificates found".into()));
        }
        Ok(())
    }

    fn set_server(&mut self, host: &str, port: u16) -> Result<(), SessionError> {
        self.server = Some((host.to_string(), port));
        Ok(())
    }

    fn set_buffer_size(&mut self, bytes: usize) {
        self.buffer_size = Some(bytes);
    }

    async fn connect(
        &mut self,
        _client_id: &str,
        _username: &str,
        _password: &str,
    ) -> Result<(), SessionError> {
        self.connect_attempts += 1;
        let result = self.connect_results.pop_front().unwrap_or(Ok(()));
        self.connected = result.is_ok();
        result
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
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        if self.fail_publish {
            return Err(SessionError::Transport("broken pipe".into()));
        }
        let message = PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retain,
        };
        if self.log_publishes {
            info!(topic, payload = message.text(), "simulated publish");
        }
        self.published.push(message);
        Ok(())
    }

    async fn poll(&mut self) {
        self.polls += 1;
    }
}

/// Delay that records requested pauses and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pauses: Vec<Duration>,
}

impl RecordingDelay {
    /// Pauses requested so far.
    #[must_use]
    pub fn pauses(&self) -> &[Duration] {
        &self.pauses
    }
}

impl Delay for RecordingDelay {
    async fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}

/// Temperature driver cycling through a fixed sequence.
#[derive(Debug)]
pub struct MockTemperature {
    values: VecDeque<f32>,
    reads: u32,
}

impl MockTemperature {
    /// Always reads `value`.
    #[must_use]
    pub fn fixed(value: f32) -> Self {
        Self::cycling([value])
    }

    /// Reads `values` in order, wrapping around.
    #[must_use]
    pub fn cycling(values: impl IntoIterator<Item = f32>) -> Self {
        Self {
            values: values.into_iter().collect(),
            reads: 0,
        }
    }

    /// Number of reads so far.
    #[must_use]
    pub const fn reads(&self) -> u32 {
        self.reads
    }
}

impl TemperatureSensor for MockTemperature {
    fn read_temperature(&mut self) -> f32 {
        self.reads += 1;
        match self.values.pop_front() {
            Some(value) => {
                self.values.push_back(value);
                value
            }
            None => f32::NAN,
        }
    }
}

/// Presence input cycling through a fixed pattern.
#[derive(Debug)]
pub struct MockPresence {
    pattern: VecDeque<bool>,
}

impl MockPresence {
    /// Reads `pattern` in order, wrapping around.
    #[must_use]
    pub fn cycling(pattern: impl IntoIterator<Item = bool>) -> Self {
        Self {
            pattern: pattern.into_iter().collect(),
        }
    }
}

impl PresenceSensor for MockPresence {
    fn read_presence(&mut self) -> bool {
        self.pattern.pop_front().is_some_and(|value| {
            self.pattern.push_back(value);
            value
        })
    }
}

/// Indicator that records every state it was set to.
#[derive(Debug, Default)]
pub struct MockIndicator {
    history: Vec<bool>,
}

impl MockIndicator {
    /// Every state set so far.
    #[must_use]
    pub fn history(&self) -> &[bool] {
        &self.history
    }

    /// Current state.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.history.last().copied().unwrap_or(false)
    }
}

impl Indicator for MockIndicator {
    fn set(&mut self, on: bool) {
        self.history.push(on);
    }
}
