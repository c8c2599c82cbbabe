//! Telemetry formatting and publishing.
//!
//! One message is built per completed debounce window and handed to the
//! session fire-and-forget. Nothing is queued or retried: the next window
//! produces a fresh message.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PublishConfig;
use crate::ports::SessionError;
use crate::types::SensorReading;

/// What to do with a window whose temperature reading is invalid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidReadingPolicy {
    /// Publish with `"temperature": null`.
    #[default]
    Sentinel,
    /// Skip the message entirely.
    Suppress,
}

/// Errors produced while encoding a message.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The encoded payload does not fit the configured bound.
    #[error("Payload of {size} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge {
        /// Encoded size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Serialization failed.
    #[error("Failed to encode telemetry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The wire message. Built right before publish and dropped right after.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryMessage {
    /// `YYYY-MM-DD HH:MM:SS` in the configured offset.
    pub timestamp: String,
    /// Degrees Celsius, `None` for an invalid reading.
    pub temperature: Option<f32>,
    /// Debounced presence verdict.
    pub presence: bool,
}

impl TelemetryMessage {
    /// Build a message from a reading and a verdict.
    #[must_use]
    pub fn new(timestamp: impl Into<String>, reading: SensorReading, presence: bool) -> Self {
        Self {
            timestamp: timestamp.into(),
            temperature: reading.value(),
            presence,
        }
    }

    /// Encode as UTF-8 JSON, rejecting anything longer than `max_bytes`.
    pub fn to_payload(&self, max_bytes: usize) -> Result<Vec<u8>, TelemetryError> {
        let payload = serde_json::to_vec(self)?;
        if payload.len() > max_bytes {
            return Err(TelemetryError::PayloadTooLarge {
                size: payload.len(),
                max: max_bytes,
            });
        }
        Ok(payload)
    }
}

/// Where telemetry goes. Implemented by the connectivity manager.
pub trait TelemetrySink {
    /// Whether a session is currently established.
    fn is_connected(&self) -> bool;

    /// Hand a payload to the session without waiting for delivery.
    fn send(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> impl Future<Output = Result<(), SessionError>>;
}

/// Result of a single publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Handed to the session.
    Sent,
    /// No session; nothing was sent.
    NotConnected,
    /// The session refused the send.
    SendFailed,
    /// The payload could not be encoded within the size bound.
    Rejected,
    /// Skipped by [`InvalidReadingPolicy::Suppress`].
    Suppressed,
}

impl PublishOutcome {
    /// Whether the message reached the session.
    #[must_use]
    pub const fn is_sent(self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Running publish counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    /// Messages handed to the session.
    pub published: u64,
    /// Messages dropped because of the connection, the send or the encoding.
    pub failed: u64,
    /// Messages skipped for an invalid reading.
    pub suppressed: u64,
}

/// Formats and emits telemetry messages.
#[derive(Debug)]
pub struct TelemetryPublisher {
    topic: String,
    max_payload_bytes: usize,
    retain: bool,
    policy: InvalidReadingPolicy,
    stats: PublishStats,
}

impl TelemetryPublisher {
    /// A publisher sending to `topic`.
    pub fn new(topic: impl Into<String>, config: &PublishConfig) -> Self {
        Self {
            topic: topic.into(),
            max_payload_bytes: config.max_payload_bytes,
            retain: config.retain,
            policy: config.invalid_reading,
            stats: PublishStats::default(),
        }
    }

    /// Publish one message. Returns `true` only if it reached the session.
    pub async fn publish<S: TelemetrySink>(
        &mut self,
        sink: &mut S,
        reading: SensorReading,
        presence: bool,
        timestamp: &str,
    ) -> bool {
        self.try_publish(sink, reading, presence, timestamp)
            .await
            .is_sent()
    }

    /// Publish one message and report exactly what happened.
    pub async fn try_publish<S: TelemetrySink>(
        &mut self,
        sink: &mut S,
        reading: SensorReading,
        presence: bool,
        timestamp: &str,
    ) -> PublishOutcome {
        let outcome = self.attempt(sink, reading, presence, timestamp).await;
        match outcome {
            PublishOutcome::Sent => self.stats.published += 1,
            PublishOutcome::Suppressed => self.stats.suppressed += 1,
            PublishOutcome::NotConnected
            | PublishOutcome::SendFailed
            | PublishOutcome::Rejected => self.stats.failed += 1,
        }
        outcome
    }

    async fn attempt<S: TelemetrySink>(
        &self,
        sink: &mut S,
        reading: SensorReading,
        presence: bool,
        timestamp: &str,
    ) -> PublishOutcome {
        if !sink.is_connected() {
            warn!("not connected, telemetry dropped");
            return PublishOutcome::NotConnected;
        }
        if !reading.valid && self.policy == InvalidReadingPolicy::Suppress {
            debug!("invalid reading, telemetry suppressed");
            return PublishOutcome::Suppressed;
        }

        let message = TelemetryMessage::new(timestamp, reading, presence);
        let payload = match message.to_payload(self.max_payload_bytes) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "telemetry rejected");
                return PublishOutcome::Rejected;
            }
        };

        match sink.send(&self.topic, &payload, self.retain).await {
            Ok(()) => {
                debug!(topic = %self.topic, bytes = payload.len(), presence, "telemetry sent");
                PublishOutcome::Sent
            }
            Err(e) => {
                warn!(error = %e, "telemetry send failed");
                PublishOutcome::SendFailed
            }
        }
    }

    /// Counters since startup.
    #[must_use]
    pub const fn stats(&self) -> PublishStats {
        self.stats
    }

    /// Topic messages are sent to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CapturingSink {
        connected: bool,
        fail: bool,
        sent: Vec<(String, String, bool)>,
    }

    impl CapturingSink {
        fn connected() -> Self {
            Self {
                connected: true,
                ..Self::default()
            }
        }
    }

    impl TelemetrySink for CapturingSink {
        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn send(
            &mut self,
            topic: &str,
            payload: &[u8],
            retain: bool,
        ) -> Result<(), SessionError> {
            if self.fail {
                return Err(SessionError::Transport("reset by peer".into()));
            }
            self.sent.push((
                topic.to_string(),
                String::from_utf8(payload.to_vec()).unwrap(),
                retain,
            ));
            Ok(())
        }
    }

    const TS: &str = "2023-11-14 22:13:20";

    fn publisher(policy: InvalidReadingPolicy) -> TelemetryPublisher {
        let config = PublishConfig {
            invalid_reading: policy,
            ..PublishConfig::default()
        };
        TelemetryPublisher::new("devices/lab-1/messages/events/", &config)
    }

    #[test]
    fn test_payload_format() {
        let message = TelemetryMessage::new(TS, SensorReading::new(21.5), true);
        let payload = message.to_payload(256).unwrap();
        assert_eq!(
            String::from_utf8(payload).unwrap(),
            r#"{"timestamp":"2023-11-14 22:13:20","temperature":21.5,"presence":true}"#
        );
    }

    #[test]
    fn test_oversized_payload_is_rejected() {
        let message = TelemetryMessage::new("x".repeat(300), SensorReading::new(21.5), false);
        let err = message.to_payload(256).unwrap_err();
        assert!(matches!(err, TelemetryError::PayloadTooLarge { max: 256, .. }));
    }

    #[tokio::test]
    async fn test_publish_sends_when_connected() {
        let mut sink = CapturingSink::connected();
        let mut publisher = publisher(InvalidReadingPolicy::Sentinel);

        assert!(publisher.publish(&mut sink, SensorReading::new(19.0), false, TS).await);

        let (topic, payload, retain) = &sink.sent[0];
        assert_eq!(topic, "devices/lab-1/messages/events/");
        assert!(payload.contains(r#""presence":false"#));
        assert!(!retain);
        assert_eq!(publisher.stats().published, 1);
    }

    #[tokio::test]
    async fn test_publish_returns_false_when_not_connected() {
        let mut sink = CapturingSink::default();
        let mut publisher = publisher(InvalidReadingPolicy::Sentinel);

        assert!(!publisher.publish(&mut sink, SensorReading::new(19.0), true, TS).await);
        assert!(sink.sent.is_empty());
        assert_eq!(publisher.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_send_failure_is_counted() {
        let mut sink = CapturingSink {
            fail: true,
            ..CapturingSink::connected()
        };
        let mut publisher = publisher(InvalidReadingPolicy::Sentinel);

        let outcome = publisher
            .try_publish(&mut sink, SensorReading::new(19.0), true, TS)
            .await;
        assert_eq!(outcome, PublishOutcome::SendFailed);
        assert_eq!(publisher.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_oversized_message_is_not_sent() {
        let mut sink = CapturingSink::connected();
        let config = PublishConfig {
            max_payload_bytes: 32,
            ..PublishConfig::default()
        };
        let mut publisher = TelemetryPublisher::new("devices/lab-1/messages/events/", &config);

        let outcome = publisher
            .try_publish(&mut sink, SensorReading::new(19.0), true, TS)
            .await;
        assert_eq!(outcome, PublishOutcome::Rejected);
        assert!(!publisher.publish(&mut sink, SensorReading::new(19.0), true, TS).await);
        assert!(sink.sent.is_empty());
        assert_eq!(publisher.stats().failed, 2);
        assert_eq!(publisher.stats().published, 0);
    }

    #[tokio::test]
    async fn test_invalid_reading_sentinel_publishes_null() {
        let mut sink = CapturingSink::connected();
        let mut publisher = publisher(InvalidReadingPolicy::Sentinel);

        assert!(publisher.publish(&mut sink, SensorReading::invalid(), true, TS).await);
        assert!(sink.sent[0].1.contains(r#""temperature":null"#));
    }

    #[tokio::test]
    async fn test_invalid_reading_suppress_publishes_nothing() {
        let mut sink = CapturingSink::connected();
        let mut publisher = publisher(InvalidReadingPolicy::Suppress);

        let outcome = publisher
            .try_publish(&mut sink, SensorReading::invalid(), true, TS)
            .await;
        assert_eq!(outcome, PublishOutcome::Suppressed);
        assert!(sink.sent.is_empty());
        assert_eq!(publisher.stats().suppressed, 1);

        // valid readings still go through
        assert!(publisher.publish(&mut sink, SensorReading::new(20.0), true, TS).await);
    }
}
