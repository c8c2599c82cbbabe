//! # roomwatch-core
//!
//! Core logic for the roomwatch room telemetry agent.
//!
//! This crate provides:
//! - The connectivity lifecycle (network join, time sync, hub session)
//! - Temperature and presence sampling with majority-vote debouncing
//! - Bounded JSON telemetry publishing
//! - Configuration loading and validation
//!
//! All device access goes through the traits in [`ports`]; the agent crate
//! supplies the real adapters.
//!
//! ## Architecture
//!
//! - [`connectivity`] - Connection state machine and session ownership
//! - [`clock`] - Wall-clock synchronization and timestamp formatting
//! - [`sensor`] - Temperature and presence sampling
//! - [`debounce`] - Majority-vote presence windows
//! - [`telemetry`] - Message formatting and publishing
//! - [`cycle`] - The per-tick orchestration loop
//! - [`config`] - Configuration loading and validation
//! - [`ports`] - Traits at the device boundary
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared types and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod connectivity;
pub mod cycle;
pub mod debounce;
pub mod error;
#[cfg(any(test, feature = "mock-hardware"))]
pub mod mock;
pub mod ports;
pub mod sensor;
pub mod telemetry;
pub mod types;

// Re-export primary types for convenience
pub use clock::{format_timestamp, ClockSynchronizer, TIMESTAMP_FORMAT};
pub use config::{
    is_valid_device_id, is_valid_hostname, AgentConfig, ConfigError, ConfigResult, HardwareConfig,
    HubConfig, NetworkConfig, PublishConfig, SamplingConfig, StatusConfig, TimeConfig,
};
pub use connectivity::{ConnectivityError, ConnectivityManager, ConnectivitySettings};
pub use cycle::{MainCycle, TickReport};
pub use debounce::{DebounceWindow, MotionDebouncer, WINDOW_SIZE};
pub use error::{Result, RoomwatchError};
pub use ports::{
    Delay, Indicator, NetworkError, NetworkPort, PresenceSensor, SessionError, SessionPort,
    TemperatureSensor, TimeSource,
};
pub use sensor::SensorSampler;
pub use telemetry::{
    InvalidReadingPolicy, PublishOutcome, PublishStats, TelemetryError, TelemetryMessage,
    TelemetryPublisher, TelemetrySink,
};
pub use types::{AgentStatus, ConnectionState, Credential, LinkStatus, SensorReading};
