//! Wall-clock synchronization and timestamp formatting.
//!
//! Session handshakes and credential expiry checks need correct time, so the
//! connect sequence blocks here until the time source reports a value no
//! earlier than a known plausible epoch.

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info};

use crate::config::TimeConfig;
use crate::ports::{Delay, TimeSource};

/// Format used for telemetry timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format `epoch_secs` as `YYYY-MM-DD HH:MM:SS` in the given UTC offset.
///
/// Returns `None` if the offset or the instant is out of range.
#[must_use]
pub fn format_timestamp(epoch_secs: i64, utc_offset_secs: i32) -> Option<String> {
    let offset = FixedOffset::east_opt(utc_offset_secs)?;
    let utc = DateTime::from_timestamp(epoch_secs, 0)?;
    Some(utc.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string())
}

/// Blocks until the wall clock is usable and formats timestamps from it.
#[derive(Debug)]
pub struct ClockSynchronizer<T> {
    source: T,
    settings: TimeConfig,
    synchronized_at: Option<i64>,
}

impl<T: TimeSource> ClockSynchronizer<T> {
    /// Create a synchronizer over `source`.
    pub fn new(source: T, settings: TimeConfig) -> Self {
        Self {
            source,
            settings,
            synchronized_at: None,
        }
    }

    /// Request synchronization and poll until the clock is plausible.
    ///
    /// Polls with the configured fixed backoff and never gives up. Returns
    /// the first plausible reading.
    pub async fn synchronize<D: Delay>(&mut self, delay: &mut D) -> i64 {
        info!(
            servers = ?self.settings.servers,
            utc_offset_secs = self.settings.utc_offset_secs,
            "requesting time sync"
        );
        self.source
            .sync(self.settings.utc_offset_secs, &self.settings.servers)
            .await;

        let mut polls = 0_u32;
        loop {
            let now = self.source.now();
            if now >= self.settings.plausible_epoch {
                info!(epoch = now, polls, "clock synchronized");
                self.synchronized_at = Some(now);
                return now;
            }
            polls += 1;
            debug!(
                now,
                threshold = self.settings.plausible_epoch,
                "clock not yet plausible"
            );
            delay.pause(self.settings.poll_backoff()).await;
        }
    }

    /// Whether the clock currently reads a plausible value.
    pub fn is_plausible(&self) -> bool {
        self.source.now() >= self.settings.plausible_epoch
    }

    /// The epoch observed by the last successful [`synchronize`](Self::synchronize).
    pub const fn synchronized_at(&self) -> Option<i64> {
        self.synchronized_at
    }

    /// Forget the last synchronization. Called when the connection resets.
    pub fn invalidate(&mut self) {
        self.synchronized_at = None;
    }

    /// Current time formatted with [`TIMESTAMP_FORMAT`] in the configured offset.
    pub fn timestamp(&self) -> Option<String> {
        format_timestamp(self.source.now(), self.settings.utc_offset_secs)
    }

    /// The underlying time source.
    pub const fn source(&self) -> &T {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockClock, RecordingDelay};
    use std::time::Duration;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp(1_510_592_825, 0).as_deref(),
            Some("2017-11-13 17:07:05")
        );
        assert_eq!(
            format_timestamp(1_669_797_755, -5 * 3600).as_deref(),
            Some("2022-11-30 03:42:35")
        );
        assert_eq!(
            format_timestamp(1_700_000_000, 3600).as_deref(),
            Some("2023-11-14 23:13:20")
        );
    }

    #[test]
    fn test_format_timestamp_rejects_bad_offset() {
        assert!(format_timestamp(0, 90_000).is_none());
    }

    #[tokio::test]
    async fn test_synchronize_polls_until_plausible() {
        let clock = MockClock::with_readings([0, 1_000, 1_600_000_000]);
        let mut sync = ClockSynchronizer::new(clock, TimeConfig::default());
        let mut delay = RecordingDelay::default();

        let epoch = sync.synchronize(&mut delay).await;

        assert_eq!(epoch, 1_600_000_000);
        assert_eq!(sync.synchronized_at(), Some(1_600_000_000));
        assert_eq!(delay.pauses(), &[Duration::from_millis(500); 2]);
        assert_eq!(sync.source().sync_calls(), 1);
        assert!(sync.is_plausible());
    }

    #[tokio::test]
    async fn test_synchronize_returns_immediately_when_plausible() {
        let mut sync = ClockSynchronizer::new(
            MockClock::synchronized(1_700_000_000),
            TimeConfig::default(),
        );
        let mut delay = RecordingDelay::default();

        sync.synchronize(&mut delay).await;

        assert!(delay.pauses().is_empty());
        assert_eq!(sync.timestamp().as_deref(), Some("2023-11-14 22:13:20"));
    }

    #[tokio::test]
    async fn test_invalidate_forgets_sync() {
        let mut sync = ClockSynchronizer::new(
            MockClock::synchronized(1_700_000_000),
            TimeConfig::default(),
        );
        sync.synchronize(&mut RecordingDelay::default()).await;
        sync.invalidate();
        assert_eq!(sync.synchronized_at(), None);
    }
}
