//! Application configuration management.
//!
//! Handles loading and validating roomwatch configuration including:
//! - Network credentials and join backoff
//! - Time synchronization servers and plausibility threshold
//! - Hub endpoint, device identity and session credential
//! - Sampling cadence and plausible temperature range
//! - Publish policy and payload bound
//! - Hardware paths and the status API
//!
//! Configuration is layered: a TOML file (default
//! [`DEFAULT_CONFIG_PATH`]) overridden by `ROOMWATCH_<SECTION>__<KEY>`
//! environment variables, e.g. `ROOMWATCH_HUB__CREDENTIAL`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Environment, File, FileFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::telemetry::InvalidReadingPolicy;
use crate::types::Credential;

/// Default location of the configuration file on the device.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/roomwatch/config.toml";

/// Environment variable that overrides the configuration file path.
pub const CONFIG_PATH_ENV: &str = "ROOMWATCH_CONFIG";

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "ROOMWATCH";

/// Smallest backoff accepted for any retry loop.
pub const MIN_BACKOFF_MS: u64 = 500;

/// Smallest payload bound that still fits a telemetry message.
pub const MIN_PAYLOAD_BYTES: usize = 96;

/// Largest UTC offset accepted, in seconds (UTC+14).
pub const MAX_UTC_OFFSET_SECS: i32 = 14 * 3600;

/// API version appended to the default session username.
pub const HUB_API_VERSION: &str = "2021-04-12";

static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*$")
        .expect("hostname regex is valid")
});

static DEVICE_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9\-.%_*?!(),:=@$']{1,128}$").expect("device id regex is valid")
});

/// Returns `true` if `host` is a syntactically valid DNS hostname.
#[must_use]
pub fn is_valid_hostname(host: &str) -> bool {
    host.len() <= 253 && HOSTNAME_RE.is_match(host)
}

/// Returns `true` if `id` is a valid device identity.
#[must_use]
pub fn is_valid_device_id(id: &str) -> bool {
    DEVICE_ID_RE.is_match(id)
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// The file or environment could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] ::config::ConfigError),

    /// A single field failed validation.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields failed validation.
    #[error("{} configuration errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Network association settings.
    pub network: NetworkConfig,
    /// Time synchronization settings.
    pub time: TimeConfig,
    /// Hub endpoint and identity.
    pub hub: HubConfig,
    /// Sampling cadence.
    pub sampling: SamplingConfig,
    /// Publish policy.
    pub publish: PublishConfig,
    /// Device paths for sensors and the indicator.
    pub hardware: HardwareConfig,
    /// Local status API.
    pub status: StatusConfig,
}

/// Network association settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network SSID.
    pub ssid: String,

    /// Network password.
    #[serde(skip_serializing)]
    pub password: String,

    /// Delay between link status polls.
    pub join_backoff_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            join_backoff_ms: 500,
        }
    }
}

impl NetworkConfig {
    /// Join backoff as a [`Duration`].
    #[must_use]
    pub const fn join_backoff(&self) -> Duration {
        Duration::from_millis(self.join_backoff_ms)
    }
}

/// Time synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Offset from UTC applied to formatted timestamps.
    pub utc_offset_secs: i32,

    /// Time servers, in preference order. The device adapter writes them to
    /// a systemd-timesyncd drop-in.
    pub servers: Vec<String>,

    /// Clock readings earlier than this are considered unsynchronized.
    pub plausible_epoch: i64,

    /// Delay between clock polls.
    pub poll_backoff_ms: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            utc_offset_secs: 0,
            servers: vec!["pool.ntp.org".to_string(), "time.nist.gov".to_string()],
            plausible_epoch: 1_510_592_825,
            poll_backoff_ms: 500,
        }
    }
}

impl TimeConfig {
    /// Poll backoff as a [`Duration`].
    #[must_use]
    pub const fn poll_backoff(&self) -> Duration {
        Duration::from_millis(self.poll_backoff_ms)
    }
}

/// Hub endpoint, identity and session parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Fully qualified hub hostname.
    pub host: String,

    /// Secure session port.
    pub port: u16,

    /// Device identity registered with the hub.
    pub device_id: String,

    /// Session client id; defaults to the device id.
    pub client_id: Option<String>,

    /// Session username; defaults to `{host}/{device_id}/?api-version=...`.
    pub username: Option<String>,

    /// Telemetry topic; defaults to `devices/{device_id}/messages/events/`.
    pub topic: Option<String>,

    /// Session credential, generated externally.
    #[serde(skip_serializing)]
    pub credential: Credential,

    /// PEM bundle used to verify the hub.
    pub trust_anchors_path: PathBuf,

    /// Maximum session packet size.
    pub packet_size: usize,

    /// Delay between session connect attempts.
    pub connect_backoff_ms: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8883,
            device_id: "roomwatch".to_string(),
            client_id: None,
            username: None,
            topic: None,
            credential: Credential::default(),
            trust_anchors_path: PathBuf::from("/etc/roomwatch/ca.pem"),
            packet_size: 1024,
            connect_backoff_ms: 5000,
        }
    }
}

impl HubConfig {
    /// The session client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.client_id.as_deref().unwrap_or(&self.device_id)
    }

    /// The session username.
    #[must_use]
    pub fn username(&self) -> String {
        self.username.clone().unwrap_or_else(|| {
            format!(
                "{}/{}/?api-version={HUB_API_VERSION}",
                self.host, self.device_id
            )
        })
    }

    /// The telemetry topic.
    #[must_use]
    pub fn topic(&self) -> String {
        self.topic
            .clone()
            .unwrap_or_else(|| format!("devices/{}/messages/events/", self.device_id))
    }

    /// Connect backoff as a [`Duration`].
    #[must_use]
    pub const fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }
}

/// Sampling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Delay between cycle ticks.
    pub tick_interval_ms: u64,

    /// Minimum interval between temperature samples.
    pub temperature_interval_ms: u64,

    /// Lowest temperature accepted as valid.
    pub temperature_min_c: f32,

    /// Highest temperature accepted as valid.
    pub temperature_max_c: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            temperature_interval_ms: 2000,
            temperature_min_c: -40.0,
            temperature_max_c: 125.0,
        }
    }
}

impl SamplingConfig {
    /// Tick interval as a [`Duration`].
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Temperature interval as a [`Duration`].
    #[must_use]
    pub const fn temperature_interval(&self) -> Duration {
        Duration::from_millis(self.temperature_interval_ms)
    }
}

/// Publish policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Upper bound on the serialized payload.
    pub max_payload_bytes: usize,

    /// Retain flag passed to the session.
    pub retain: bool,

    /// What to do when the temperature reading is invalid.
    pub invalid_reading: InvalidReadingPolicy,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 256,
            retain: false,
            invalid_reading: InvalidReadingPolicy::default(),
        }
    }
}

/// Device paths for sensors and the indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// File holding the temperature in millidegrees Celsius.
    pub temperature_path: PathBuf,

    /// GPIO value file for the presence sensor.
    pub presence_path: PathBuf,

    /// Brightness file for the indicator LED.
    pub indicator_path: PathBuf,

    /// Use in-memory fakes instead of real hardware and network.
    pub simulate: bool,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            temperature_path: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
            presence_path: PathBuf::from("/sys/class/gpio/gpio5/value"),
            indicator_path: PathBuf::from("/sys/class/leds/led0/brightness"),
            simulate: false,
        }
    }
}

/// Local status API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Whether to serve the status API.
    pub enabled: bool,

    /// Listen address.
    pub bind: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AgentConfig {
    /// Resolve the configuration file path from [`CONFIG_PATH_ENV`].
    #[must_use]
    pub fn config_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    }

    /// Load configuration from `path`, which must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be parsed, or fails
    /// validation.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        Self::load_layered(path, true, Self::environment(None))
    }

    /// Load configuration from `path`, falling back to defaults if the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// result fails validation.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::load_layered(path.as_ref(), false, Self::environment(None))
    }

    /// Load configuration from `path` with an explicit set of environment
    /// overrides instead of the process environment.
    ///
    /// # Errors
    ///
    /// Same as [`AgentConfig::load_or_default`].
    pub fn load_with_overrides(
        path: impl AsRef<Path>,
        overrides: HashMap<String, String>,
    ) -> ConfigResult<Self> {
        Self::load_layered(path.as_ref(), false, Self::environment(Some(overrides)))
    }

    fn environment(source: Option<HashMap<String, String>>) -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("time.servers")
            .source(source)
    }

    fn load_layered(path: &Path, required: bool, env: Environment) -> ConfigResult<Self> {
        let config: Self = ::config::Config::builder()
            .add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(required),
            )
            .add_source(env)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, collecting every problem found.
    ///
    /// # Errors
    ///
    /// Returns a single [`ConfigError::ValidationError`] or
    /// [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &'static str, message: String| {
            if !ok {
                errors.push(ConfigError::ValidationError { field, message });
            }
        };

        check(
            self.hardware.simulate || !self.network.ssid.is_empty(),
            "network.ssid",
            "must be set unless hardware.simulate is enabled".to_string(),
        );
        check(
            is_valid_hostname(&self.hub.host),
            "hub.host",
            format!("'{}' is not a valid hostname", self.hub.host),
        );
        check(
            is_valid_device_id(&self.hub.device_id),
            "hub.device_id",
            format!("'{}' is not a valid device id", self.hub.device_id),
        );
        check(self.hub.port != 0, "hub.port", "must be non-zero".to_string());

        for (field, value) in [
            ("network.join_backoff_ms", self.network.join_backoff_ms),
            ("time.poll_backoff_ms", self.time.poll_backoff_ms),
            ("hub.connect_backoff_ms", self.hub.connect_backoff_ms),
        ] {
            check(
                value >= MIN_BACKOFF_MS,
                field,
                format!("{value} is below the minimum of {MIN_BACKOFF_MS} ms"),
            );
        }

        check(
            self.time.utc_offset_secs.abs() <= MAX_UTC_OFFSET_SECS,
            "time.utc_offset_secs",
            format!("must be within +/-{MAX_UTC_OFFSET_SECS} seconds"),
        );
        check(
            !self.time.servers.is_empty(),
            "time.servers",
            "at least one server is required".to_string(),
        );
        check(
            self.sampling.tick_interval_ms > 0,
            "sampling.tick_interval_ms",
            "must be greater than zero".to_string(),
        );
        check(
            self.sampling.temperature_min_c < self.sampling.temperature_max_c,
            "sampling.temperature_min_c",
            format!(
                "{} must be below temperature_max_c ({})",
                self.sampling.temperature_min_c, self.sampling.temperature_max_c
            ),
        );
        check(
            self.publish.max_payload_bytes >= MIN_PAYLOAD_BYTES,
            "publish.max_payload_bytes",
            format!("must be at least {MIN_PAYLOAD_BYTES}"),
        );
        check(
            self.hub.packet_size >= self.publish.max_payload_bytes,
            "hub.packet_size",
            format!(
                "{} cannot hold a {}-byte payload",
                self.hub.packet_size, self.publish.max_payload_bytes
            ),
        );
        check(
            !self.status.enabled || self.status.bind.parse::<SocketAddr>().is_ok(),
            "status.bind",
            format!("'{}' is not a socket address", self.status.bind),
        );

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const SAMPLE: &str = r#"
[network]
ssid = "home"
password = "hunter2"

[time]
utc_offset_secs = -18000

[hub]
host = "iot-hub.azure-devices.net"
device_id = "NodeMCUv3_ESP8266"
credential = "SharedAccessSignature sr=x&sig=y&se=1"

[publish]
invalid_reading = "suppress"
"#;

    #[test]
    fn test_load_sample_config() {
        let file = write_config(SAMPLE);
        let config = AgentConfig::load_with_overrides(file.path(), HashMap::new()).unwrap();

        assert_eq!(config.network.ssid, "home");
        assert_eq!(config.time.utc_offset_secs, -18000);
        assert_eq!(config.hub.port, 8883);
        assert_eq!(config.hub.client_id(), "NodeMCUv3_ESP8266");
        assert_eq!(
            config.hub.username(),
            "iot-hub.azure-devices.net/NodeMCUv3_ESP8266/?api-version=2021-04-12"
        );
        assert_eq!(config.hub.topic(), "devices/NodeMCUv3_ESP8266/messages/events/");
        assert_eq!(config.publish.invalid_reading, InvalidReadingPolicy::Suppress);
        assert_eq!(config.sampling.tick_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_shipped_example_config_is_valid() {
        let file = write_config(include_str!("../../../config/roomwatch.example.toml"));
        let config = AgentConfig::load_with_overrides(file.path(), HashMap::new()).unwrap();
        assert_eq!(config.hub.device_id, "livingroom-1");
        assert_eq!(config.publish.invalid_reading, InvalidReadingPolicy::Sentinel);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_config(SAMPLE);
        let overrides = HashMap::from([
            (
                "ROOMWATCH_HUB__CREDENTIAL".to_string(),
                "SharedAccessSignature fresh".to_string(),
            ),
            ("ROOMWATCH_HUB__PORT".to_string(), "443".to_string()),
        ]);
        let config = AgentConfig::load_with_overrides(file.path(), overrides).unwrap();

        assert_eq!(config.hub.credential.expose(), "SharedAccessSignature fresh");
        assert_eq!(config.hub.port, 443);
    }

    #[test]
    fn test_load_requires_existing_file() {
        let result = AgentConfig::load("/nonexistent/roomwatch.toml");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_default_requires_ssid_unless_simulated() {
        let mut config = AgentConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError {
                field: "network.ssid",
                ..
            })
        ));

        config.hardware.simulate = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = AgentConfig::default();
        config.hardware.simulate = true;
        config.hub.host = "not a host".to_string();
        config.network.join_backoff_ms = 10;
        config.sampling.temperature_min_c = 50.0;
        config.sampling.temperature_max_c = 0.0;

        match config.validate() {
            Err(ConfigError::MultipleValidationErrors(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }

    #[test]
    fn test_packet_size_must_hold_payload() {
        let mut config = AgentConfig::default();
        config.hardware.simulate = true;
        config.hub.packet_size = 128;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError {
                field: "hub.packet_size",
                ..
            })
        ));
    }

    #[test]
    fn test_hostname_and_device_id_validation() {
        assert!(is_valid_hostname("iot-hub-proyecto.azure-devices.net"));
        assert!(!is_valid_hostname("-bad.example.com"));
        assert!(!is_valid_hostname(""));

        assert!(is_valid_device_id("NodeMCUv3_ESP8266"));
        assert!(!is_valid_device_id("has space"));
        assert!(!is_valid_device_id(""));
    }
}
