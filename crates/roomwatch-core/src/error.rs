//! Unified error types for the roomwatch core library.
//!
//! This module provides a unified error type [`RoomwatchError`] that covers the
//! failure modes that can escape a component. Each module also has its own
//! specific error type (`ConfigError`, `ConnectivityError`, `NetworkError`,
//! `SessionError`, `TelemetryError`) for internal use.
//!
//! Most of these never reach the top of the agent: connectivity failures are
//! retried inside the connectivity manager and publish failures are counted
//! and dropped. The unified type exists for startup paths and diagnostics.
//!
//! # Example
//!
//! ```rust
//! use roomwatch_core::error::{RoomwatchError, Result};
//! use std::path::PathBuf;
//!
//! fn read_anchors(path: &PathBuf) -> Result<Vec<u8>> {
//!     if !path.exists() {
//!         return Err(RoomwatchError::TrustAnchorsNotFound(path.clone()));
//!     }
//!     Ok(std::fs::read(path)?)
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for roomwatch operations.
#[derive(Debug, Error)]
pub enum RoomwatchError {
    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {0}")]
    ConfigNotFound(String),

    /// The configuration could not be read or deserialized.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    /// The trust anchor bundle referenced by the configuration is missing.
    #[error("Trust anchors not found at: {}. Install the hub CA bundle or set hub.trust_anchors_path.", .0.display())]
    TrustAnchorsNotFound(PathBuf),

    /// The trust anchor bundle holds no PEM certificate.
    #[error("Trust anchors at {} contain no PEM certificate", .0.display())]
    TrustAnchorsInvalid(PathBuf),

    // =========================================================================
    // CONNECTIVITY ERRORS
    // =========================================================================
    /// The session context could not be built for the configured endpoint.
    #[error("Session initialization failed: {0}")]
    SessionInitFailed(String),

    /// The network layer reported an error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The session layer reported an error.
    #[error("Session error: {0}")]
    SessionError(String),

    // =========================================================================
    // TELEMETRY ERRORS
    // =========================================================================
    /// The formatted payload exceeds the configured bound.
    #[error("Telemetry payload of {size} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge {
        /// Serialized size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The telemetry message could not be serialized.
    #[error("Failed to encode telemetry: {0}")]
    EncodeError(String),

    // =========================================================================
    // I/O ERRORS
    // =========================================================================
    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for roomwatch operations.
pub type Result<T> = std::result::Result<T, RoomwatchError>;

impl RoomwatchError {
    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_)
                | Self::ConfigParseError(_)
                | Self::ConfigValidationError(_)
                | Self::TrustAnchorsNotFound(_)
                | Self::TrustAnchorsInvalid(_)
        )
    }

    /// Returns `true` if this error is related to connectivity.
    #[inline]
    #[must_use]
    pub const fn is_connectivity_error(&self) -> bool {
        matches!(
            self,
            Self::SessionInitFailed(_) | Self::NetworkError(_) | Self::SessionError(_)
        )
    }

    /// Returns `true` if this error is related to telemetry encoding.
    #[inline]
    #[must_use]
    pub const fn is_telemetry_error(&self) -> bool {
        matches!(self, Self::PayloadTooLarge { .. } | Self::EncodeError(_))
    }

    /// Returns `true` if the agent recovers from this error on its own by
    /// restarting the connect sequence or waiting for the next window.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        self.is_connectivity_error() || self.is_telemetry_error()
    }

    /// Returns a machine-readable error code.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::TrustAnchorsNotFound(_) => "TRUST_ANCHORS_NOT_FOUND",
            Self::TrustAnchorsInvalid(_) => "TRUST_ANCHORS_INVALID",
            Self::SessionInitFailed(_) => "SESSION_INIT_FAILED",
            Self::NetworkError(_) => "NETWORK_ERROR",
            Self::SessionError(_) => "SESSION_ERROR",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::EncodeError(_) => "ENCODE_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for RoomwatchError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::LoadError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<crate::connectivity::ConnectivityError> for RoomwatchError {
    fn from(err: crate::connectivity::ConnectivityError) -> Self {
        Self::SessionInitFailed(err.to_string())
    }
}

impl From<crate::ports::NetworkError> for RoomwatchError {
    fn from(err: crate::ports::NetworkError) -> Self {
        Self::NetworkError(err.to_string())
    }
}

impl From<crate::ports::SessionError> for RoomwatchError {
    fn from(err: crate::ports::SessionError) -> Self {
        Self::SessionError(err.to_string())
    }
}

impl From<crate::telemetry::TelemetryError> for RoomwatchError {
    fn from(err: crate::telemetry::TelemetryError) -> Self {
        use crate::telemetry::TelemetryError;
        match err {
            TelemetryError::PayloadTooLarge { size, max } => Self::PayloadTooLarge { size, max },
            TelemetryError::Encode(e) => Self::EncodeError(e.to_string()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
