//! Assembly of a [`MainCycle`] from configuration and adapters.

use std::path::Path;

use roomwatch_core::{
    AgentConfig, ClockSynchronizer, ConnectivityManager, ConnectivitySettings, Delay, Indicator,
    MainCycle, NetworkPort, PresenceSensor, RoomwatchError, SensorSampler, SessionPort,
    TelemetryPublisher, TemperatureSensor, TimeSource,
};
use tracing::info;

use crate::adapters::session::contains_certificate;
use crate::adapters::{
    MqttSession, NmcliNetwork, SysfsIndicator, SysfsPresence, SysfsTemperature, SystemClock,
    TokioDelay,
};

/// The cycle wired to real device adapters.
pub type DeviceCycle = MainCycle<
    NmcliNetwork,
    SystemClock,
    MqttSession,
    TokioDelay,
    SysfsTemperature,
    SysfsPresence,
    SysfsIndicator,
>;

/// One adapter per port.
#[derive(Debug)]
pub struct Hardware<N, T, S, D, TS, PS, I> {
    /// Network layer.
    pub network: N,
    /// Time source.
    pub clock: T,
    /// Hub session.
    pub session: S,
    /// Backoff primitive.
    pub delay: D,
    /// Temperature driver.
    pub temperature: TS,
    /// Presence input.
    pub presence: PS,
    /// Presence indicator.
    pub indicator: I,
}

/// Read the hub trust anchor bundle.
///
/// # Errors
///
/// Returns [`RoomwatchError::TrustAnchorsNotFound`] if the file is missing,
/// [`RoomwatchError::TrustAnchorsInvalid`] if it holds no PEM certificate,
/// or an I/O error if it cannot be read.
pub fn load_trust_anchors(path: &Path) -> roomwatch_core::Result<Vec<u8>> {
    if !path.exists() {
        return Err(RoomwatchError::TrustAnchorsNotFound(path.to_path_buf()));
    }
    let pem = std::fs::read(path)?;
    if !contains_certificate(&pem) {
        return Err(RoomwatchError::TrustAnchorsInvalid(path.to_path_buf()));
    }
    info!(path = %path.display(), bytes = pem.len(), "trust anchors loaded");
    Ok(pem)
}

/// Build a cycle over the given adapters.
pub fn assemble<N, T, S, D, TS, PS, I>(
    config: &AgentConfig,
    trust_anchors: Vec<u8>,
    hardware: Hardware<N, T, S, D, TS, PS, I>,
) -> MainCycle<N, T, S, D, TS, PS, I>
where
    N: NetworkPort,
    T: TimeSource,
    S: SessionPort,
    D: Delay,
    TS: TemperatureSensor,
    PS: PresenceSensor,
    I: Indicator,
{
    let connectivity = ConnectivityManager::new(
        hardware.network,
        ClockSynchronizer::new(hardware.clock, config.time.clone()),
        hardware.session,
        hardware.delay,
        ConnectivitySettings::from_config(config, trust_anchors),
    );
    let sampler = SensorSampler::new(hardware.temperature, hardware.presence, &config.sampling);
    let publisher = TelemetryPublisher::new(config.hub.topic(), &config.publish);

    MainCycle::new(
        connectivity,
        sampler,
        publisher,
        hardware.indicator,
        &config.sampling,
    )
}

/// Build the cycle for real hardware.
///
/// # Errors
///
/// Fails if the trust anchors cannot be loaded.
pub fn device_cycle(config: &AgentConfig) -> roomwatch_core::Result<DeviceCycle> {
    let trust_anchors = load_trust_anchors(&config.hub.trust_anchors_path)?;
    let hardware = Hardware {
        network: NmcliNetwork::default(),
        clock: SystemClock::default(),
        session: MqttSession::new(),
        delay: TokioDelay,
        temperature: SysfsTemperature::new(&config.hardware.temperature_path),
        presence: SysfsPresence::new(&config.hardware.presence_path),
        indicator: SysfsIndicator::new(&config.hardware.indicator_path),
    };
    Ok(assemble(config, trust_anchors, hardware))
}

/// Simulated hardware: in-memory network, session and sensors.
#[cfg(feature = "mock-hardware")]
pub mod simulated {
    use roomwatch_core::mock::{
        MockIndicator, MockNetwork, MockPresence, MockSession, MockTemperature,
    };
    use roomwatch_core::{AgentConfig, MainCycle};

    use super::{assemble, Hardware};
    use crate::adapters::{SystemClock, TokioDelay};

    /// The cycle wired to simulated hardware.
    pub type SimulatedCycle = MainCycle<
        MockNetwork,
        SystemClock,
        MockSession,
        TokioDelay,
        MockTemperature,
        MockPresence,
        MockIndicator,
    >;

    /// Build a cycle whose publishes are logged instead of sent.
    #[must_use]
    pub fn simulated_cycle(config: &AgentConfig) -> SimulatedCycle {
        let hardware = Hardware {
            network: MockNetwork::up(),
            clock: SystemClock::passive(),
            session: MockSession::accepting().logging_publishes(),
            delay: TokioDelay,
            temperature: MockTemperature::cycling([21.0, 21.5, 22.0, 21.5]),
            presence: MockPresence::cycling([true, true, false, false, false, true]),
            indicator: MockIndicator::default(),
        };
        assemble(config, b"simulated".to_vec(), hardware)
    }
}
