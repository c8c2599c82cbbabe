//! Sensor and indicator access through sysfs-style files.
//!
//! Read failures never propagate: the temperature driver reports NaN and the
//! presence input reads as absent, both logged at `warn`.

use std::fs;
use std::path::{Path, PathBuf};

use roomwatch_core::{Indicator, PresenceSensor, TemperatureSensor};
use tracing::warn;

fn read_trimmed(path: &Path) -> std::io::Result<String> {
    fs::read_to_string(path).map(|s| s.trim().to_string())
}

/// Temperature from a thermal-zone style file holding millidegrees Celsius.
#[derive(Debug, Clone)]
pub struct SysfsTemperature {
    path: PathBuf,
}

impl SysfsTemperature {
    /// Read from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TemperatureSensor for SysfsTemperature {
    fn read_temperature(&mut self) -> f32 {
        match read_trimmed(&self.path).map(|raw| raw.parse::<f32>()) {
            Ok(Ok(millidegrees)) => millidegrees / 1000.0,
            Ok(Err(e)) => {
                warn!(path = %self.path.display(), error = %e, "unparseable temperature");
                f32::NAN
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "temperature read failed");
                f32::NAN
            }
        }
    }
}

/// Presence from a GPIO `value` file (`1` means motion).
#[derive(Debug, Clone)]
pub struct SysfsPresence {
    path: PathBuf,
}

impl SysfsPresence {
    /// Read from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PresenceSensor for SysfsPresence {
    fn read_presence(&mut self) -> bool {
        match read_trimmed(&self.path) {
            Ok(value) => value == "1",
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "presence read failed");
                false
            }
        }
    }
}

/// Indicator driven through an LED `brightness` file.
#[derive(Debug, Clone)]
pub struct SysfsIndicator {
    path: PathBuf,
    on: Option<bool>,
}

impl SysfsIndicator {
    /// Write to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            on: None,
        }
    }
}

impl Indicator for SysfsIndicator {
    fn set(&mut self, on: bool) {
        if self.on == Some(on) {
            return;
        }
        match fs::write(&self.path, if on { "1" } else { "0" }) {
            Ok(()) => self.on = Some(on),
            Err(e) => warn!(path = %self.path.display(), error = %e, "indicator write failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temperature_reads_millidegrees() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp");
        fs::write(&path, "21500\n").unwrap();

        let mut sensor = SysfsTemperature::new(&path);
        assert!((sensor.read_temperature() - 21.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_temperature_errors_read_as_nan() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp");

        let mut sensor = SysfsTemperature::new(&path);
        assert!(sensor.read_temperature().is_nan());

        fs::write(&path, "garbage").unwrap();
        assert!(sensor.read_temperature().is_nan());
    }

    #[test]
    fn test_presence_reads_gpio_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("value");
        let mut sensor = SysfsPresence::new(&path);

        assert!(!sensor.read_presence());
        fs::write(&path, "1\n").unwrap();
        assert!(sensor.read_presence());
        fs::write(&path, "0\n").unwrap();
        assert!(!sensor.read_presence());
    }

    #[test]
    fn test_indicator_writes_brightness() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("brightness");
        let mut indicator = SysfsIndicator::new(&path);

        indicator.set(true);
        assert_eq!(fs::read_to_string(&path).unwrap(), "1");
        indicator.set(false);
        assert_eq!(fs::read_to_string(&path).unwrap(), "0");
    }
}
