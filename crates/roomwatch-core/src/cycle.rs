//! The main sampling cycle.
//!
//! Each [`MainCycle::tick`] runs, in order: connect, sample, debounce,
//! publish (when a window completes), service. Ticks are paced by the caller.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::SamplingConfig;
use crate::connectivity::ConnectivityManager;
use crate::debounce::MotionDebouncer;
use crate::ports::{
    Delay, Indicator, NetworkPort, PresenceSensor, SessionPort, TemperatureSensor, TimeSource,
};
use crate::sensor::SensorSampler;
use crate::telemetry::TelemetryPublisher;
use crate::types::{AgentStatus, ConnectionState, SensorReading};

/// What happened during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Connection state at the end of the tick.
    pub state: ConnectionState,
    /// Whether the temperature sensor was read.
    pub temperature_sampled: bool,
    /// Presence verdict, if a window completed.
    pub verdict: Option<bool>,
    /// Whether a message reached the session.
    pub published: bool,
}

/// Orchestrates connectivity, sampling and publishing.
#[derive(Debug)]
pub struct MainCycle<N, T, S, D, TS, PS, I> {
    connectivity: ConnectivityManager<N, T, S, D>,
    sampler: SensorSampler<TS, PS>,
    debouncer: MotionDebouncer,
    publisher: TelemetryPublisher,
    indicator: I,
    temperature_interval: Duration,
    last_temperature_at: Option<Instant>,
    status: AgentStatus,
}

impl<N, T, S, D, TS, PS, I> MainCycle<N, T, S, D, TS, PS, I>
where
    N: NetworkPort,
    T: TimeSource,
    S: SessionPort,
    D: Delay,
    TS: TemperatureSensor,
    PS: PresenceSensor,
    I: Indicator,
{
    /// Assemble a cycle from its components.
    pub fn new(
        connectivity: ConnectivityManager<N, T, S, D>,
        sampler: SensorSampler<TS, PS>,
        publisher: TelemetryPublisher,
        indicator: I,
        config: &SamplingConfig,
    ) -> Self {
        Self {
            connectivity,
            sampler,
            debouncer: MotionDebouncer::new(),
            publisher,
            indicator,
            temperature_interval: config.temperature_interval(),
            last_temperature_at: None,
            status: AgentStatus::default(),
        }
    }

    /// Run one iteration.
    ///
    /// Blocks inside [`ConnectivityManager::ensure_connected`] for as long as
    /// the connect sequence needs. Nothing is sampled unless that returns
    /// `Connected`.
    pub async fn tick(&mut self, now: Instant) -> TickReport {
        let state = self.connectivity.ensure_connected().await;
        if !state.is_connected() {
            debug!(%state, "offline, skipping sampling");
            self.status.connection = state;
            return TickReport {
                state,
                ..TickReport::default()
            };
        }

        let temperature_sampled = self.temperature_due(now);
        if temperature_sampled {
            let reading = self.sampler.sample_temperature();
            self.last_temperature_at = Some(now);
            if let Some(value) = reading.value() {
                self.status.temperature = Some(value);
            }
        }

        let motion = self.sampler.sample_motion();
        self.debouncer.accumulate(motion);

        let mut verdict = None;
        let mut published = false;
        if self.debouncer.is_window_complete() {
            let presence = self.debouncer.resolve_and_reset();
            self.indicator.set(presence);
            self.status.presence = Some(presence);
            verdict = Some(presence);

            let reading = self
                .sampler
                .last_reading()
                .unwrap_or_else(SensorReading::invalid);
            let timestamp = self.connectivity.clock().timestamp().unwrap_or_default();
            published = self
                .publisher
                .publish(&mut self.connectivity, reading, presence, &timestamp)
                .await;
            if published {
                info!(presence, temperature = ?reading.value(), "telemetry published");
                self.status.last_published_at = Some(timestamp);
            }
        }

        let state = self.connectivity.service().await;
        self.refresh_status(state);

        TickReport {
            state,
            temperature_sampled,
            verdict,
            published,
        }
    }

    fn temperature_due(&self, now: Instant) -> bool {
        self.last_temperature_at
            .map_or(true, |at| now.saturating_duration_since(at) >= self.temperature_interval)
    }

    fn refresh_status(&mut self, state: ConnectionState) {
        let stats = self.publisher.stats();
        self.status.connection = state;
        self.status.messages_published = stats.published;
        self.status.publish_failures = stats.failed;
        self.status.messages_suppressed = stats.suppressed;
    }

    /// Snapshot of the agent's state after the last tick.
    pub const fn status(&self) -> &AgentStatus {
        &self.status
    }

    /// The connectivity manager.
    pub const fn connectivity(&self) -> &ConnectivityManager<N, T, S, D> {
        &self.connectivity
    }

    /// Mutable access to the connectivity manager.
    pub fn connectivity_mut(&mut self) -> &mut ConnectivityManager<N, T, S, D> {
        &mut self.connectivity
    }

    /// The sensor sampler.
    pub const fn sampler(&self) -> &SensorSampler<TS, PS> {
        &self.sampler
    }

    /// The motion debouncer.
    pub const fn debouncer(&self) -> &MotionDebouncer {
        &self.debouncer
    }

    /// The telemetry publisher.
    pub const fn publisher(&self) -> &TelemetryPublisher {
        &self.publisher
    }

    /// The presence indicator.
    pub const fn indicator(&self) -> &I {
        &self.indicator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockSynchronizer;
    use crate::config::{AgentConfig, PublishConfig};
    use crate::connectivity::ConnectivitySettings;
    use crate::mock::{
        MockClock, MockIndicator, MockNetwork, MockPresence, MockSession, MockTemperature,
        RecordingDelay,
    };
    use crate::telemetry::InvalidReadingPolicy;
    use crate::types::Credential;

    type TestCycle = MainCycle<
        MockNetwork,
        MockClock,
        MockSession,
        RecordingDelay,
        MockTemperature,
        MockPresence,
        MockIndicator,
    >;

    const TICK: Duration = Duration::from_millis(250);

    fn cycle_with(
        session: MockSession,
        temperature: MockTemperature,
        presence: impl IntoIterator<Item = bool>,
        policy: InvalidReadingPolicy,
    ) -> TestCycle {
        let mut config = AgentConfig::default();
        config.network.ssid = "lab".into();
        config.hub.host = "lab-hub.azure-devices.net".into();
        config.hub.device_id = "lab-1".into();
        config.hub.credential = Credential::new("token");

        let connectivity = ConnectivityManager::new(
            MockNetwork::up(),
            ClockSynchronizer::new(MockClock::synchronized(1_700_000_000), config.time.clone()),
            session,
            RecordingDelay::default(),
            ConnectivitySettings::from_config(&config, b"anchors".to_vec()),
        );
        let sampler = SensorSampler::new(
            temperature,
            MockPresence::cycling(presence),
            &config.sampling,
        );
        let publish = PublishConfig {
            invalid_reading: policy,
            ..config.publish.clone()
        };
        let publisher = TelemetryPublisher::new(config.hub.topic(), &publish);

        MainCycle::new(
            connectivity,
            sampler,
            publisher,
            MockIndicator::default(),
            &config.sampling,
        )
    }

    fn cycle(presence: impl IntoIterator<Item = bool>) -> TestCycle {
        cycle_with(
            MockSession::accepting(),
            MockTemperature::fixed(21.5),
            presence,
            InvalidReadingPolicy::Sentinel,
        )
    }

    async fn run(cycle: &mut TestCycle, ticks: u32) -> Vec<TickReport> {
        let start = Instant::now();
        let mut reports = Vec::new();
        for i in 0..ticks {
            reports.push(cycle.tick(start + TICK * i).await);
        }
        reports
    }

    #[tokio::test]
    async fn test_majority_window_turns_indicator_on() {
        let mut cycle = cycle([true, false, true]);
        let reports = run(&mut cycle, 3).await;

        assert_eq!(reports[0].verdict, None);
        assert_eq!(reports[1].verdict, None);
        assert_eq!(reports[2].verdict, Some(true));
        assert!(reports[2].published);
        assert!(cycle.indicator().is_on());
        assert_eq!(cycle.debouncer().window().samples(), 0);

        let published = cycle.connectivity().session().published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "devices/lab-1/messages/events/");
        assert_eq!(
            published[0].text(),
            r#"{"timestamp":"2023-11-14 22:13:20","temperature":21.5,"presence":true}"#
        );
    }

    #[tokio::test]
    async fn test_minority_window_turns_indicator_off() {
        let mut cycle = cycle([false, false, true]);
        let reports = run(&mut cycle, 3).await;

        assert_eq!(reports[2].verdict, Some(false));
        assert!(!cycle.indicator().is_on());
        assert_eq!(cycle.indicator().history(), &[false]);
        assert!(cycle.connectivity().session().published()[0]
            .text()
            .contains(r#""presence":false"#));
    }

    #[tokio::test]
    async fn test_one_publish_per_window() {
        let mut cycle = cycle([true]);
        let reports = run(&mut cycle, 9).await;

        let windows: Vec<_> = reports.iter().filter_map(|r| r.verdict).collect();
        assert_eq!(windows, vec![true, true, true]);
        assert_eq!(cycle.connectivity().session().published().len(), 3);
        assert_eq!(cycle.status().messages_published, 3);
    }

    #[tokio::test]
    async fn test_temperature_is_rate_limited() {
        let mut cycle = cycle([false]);
        let reports = run(&mut cycle, 9).await;

        let sampled: Vec<_> = reports.iter().map(|r| r.temperature_sampled).collect();
        assert!(sampled[0]);
        assert!(sampled[1..8].iter().all(|s| !s));
        assert!(sampled[8]);
        assert_eq!(cycle.sampler().temperature_sensor().reads(), 2);
    }

    #[tokio::test]
    async fn test_service_runs_once_per_tick() {
        let mut cycle = cycle([true, false]);
        run(&mut cycle, 5).await;
        assert_eq!(cycle.connectivity().session().polls(), 5);
    }

    #[tokio::test]
    async fn test_no_sampling_while_offline() {
        let mut cycle = cycle_with(
            MockSession::accepting().rejecting_trust_anchors(),
            MockTemperature::fixed(21.5),
            [true],
            InvalidReadingPolicy::Sentinel,
        );
        let reports = run(&mut cycle, 3).await;

        assert!(reports.iter().all(|r| r.state == ConnectionState::Disconnected));
        assert!(reports.iter().all(|r| !r.temperature_sampled && r.verdict.is_none()));
        assert_eq!(cycle.sampler().temperature_sensor().reads(), 0);
        assert!(cycle.indicator().history().is_empty());
        assert_eq!(cycle.status().connection, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_offline_ticks_back_off_between_attempts() {
        let mut cycle = cycle_with(
            MockSession::accepting().rejecting_trust_anchors(),
            MockTemperature::fixed(21.5),
            [true],
            InvalidReadingPolicy::Sentinel,
        );
        run(&mut cycle, 8).await;

        let connectivity = cycle.connectivity();
        assert_eq!(connectivity.network().join_calls(), 8);
        assert_eq!(connectivity.delay().pauses(), &[Duration::from_millis(500); 8]);
    }

    #[tokio::test]
    async fn test_invalid_reading_publishes_null_temperature() {
        let mut cycle = cycle_with(
            MockSession::accepting(),
            MockTemperature::fixed(f32::NAN),
            [true],
            InvalidReadingPolicy::Sentinel,
        );
        run(&mut cycle, 3).await;

        let published = cycle.connectivity().session().published();
        assert!(published[0].text().contains(r#""temperature":null"#));
        assert_eq!(cycle.status().temperature, None);
    }

    #[tokio::test]
    async fn test_invalid_reading_suppressed() {
        let mut cycle = cycle_with(
            MockSession::accepting(),
            MockTemperature::fixed(f32::NAN),
            [true],
            InvalidReadingPolicy::Suppress,
        );
        let reports = run(&mut cycle, 3).await;

        assert_eq!(reports[2].verdict, Some(true));
        assert!(!reports[2].published);
        assert!(cycle.indicator().is_on());
        assert!(cycle.connectivity().session().published().is_empty());
        assert_eq!(cycle.status().messages_suppressed, 1);
    }

    #[tokio::test]
    async fn test_publish_failure_is_counted_not_retried() {
        let mut cycle = cycle_with(
            MockSession::accepting().failing_publishes(),
            MockTemperature::fixed(21.5),
            [true],
            InvalidReadingPolicy::Sentinel,
        );
        let reports = run(&mut cycle, 6).await;

        assert!(reports.iter().all(|r| !r.published));
        assert_eq!(cycle.status().publish_failures, 2);
        assert_eq!(cycle.status().last_published_at, None);
    }

    #[tokio::test]
    async fn test_session_drop_reconnects_next_tick() {
        let mut cycle = cycle([true]);
        run(&mut cycle, 1).await;

        cycle.connectivity_mut().session_mut().drop_connection();
        let report = cycle.tick(Instant::now()).await;

        assert_eq!(report.state, ConnectionState::Connected);
        assert_eq!(cycle.connectivity().session().connect_attempts(), 2);
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let mut cycle = cycle([true]);
        run(&mut cycle, 3).await;

        let status = cycle.status();
        assert_eq!(status.connection, ConnectionState::Connected);
        assert_eq!(status.temperature, Some(21.5));
        assert_eq!(status.presence, Some(true));
        assert_eq!(status.last_published_at.as_deref(), Some("2023-11-14 22:13:20"));
    }
}
