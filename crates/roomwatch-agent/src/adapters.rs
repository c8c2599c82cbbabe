//! Device adapters implementing the core ports.
//!
//! - `network` - Wi-Fi association through NetworkManager (`nmcli`)
//! - `clock` - System clock backed by the host's NTP client
//! - `session` - MQTT over TLS to the hub (`rumqttc`)
//! - `sysfs` - Temperature, presence and indicator through sysfs files
//! - `delay` - Tokio timer backoff

pub mod clock;
pub mod delay;
pub mod network;
pub mod session;
pub mod sysfs;

pub use clock::SystemClock;
pub use delay::TokioDelay;
pub use network::NmcliNetwork;
pub use session::MqttSession;
pub use sysfs::{SysfsIndicator, SysfsPresence, SysfsTemperature};
