//! Sensor sampling.
//!
//! Wraps the raw temperature and presence drivers. Temperature readings are
//! checked against the configured plausible range; anything outside it (or a
//! driver sentinel such as NaN) is flagged invalid instead of being passed on.

use tracing::{debug, warn};

use crate::config::SamplingConfig;
use crate::ports::{PresenceSensor, TemperatureSensor};
use crate::types::SensorReading;

/// Reads the sensors and keeps the most recent temperature.
#[derive(Debug)]
pub struct SensorSampler<T, P> {
    temperature: T,
    presence: P,
    min_c: f32,
    max_c: f32,
    last: Option<SensorReading>,
}

impl<T: TemperatureSensor, P: PresenceSensor> SensorSampler<T, P> {
    /// Create a sampler over the given drivers.
    pub fn new(temperature: T, presence: P, config: &SamplingConfig) -> Self {
        Self {
            temperature,
            presence,
            min_c: config.temperature_min_c,
            max_c: config.temperature_max_c,
            last: None,
        }
    }

    /// Read the temperature sensor once.
    ///
    /// The result replaces the previous reading.
    pub fn sample_temperature(&mut self) -> SensorReading {
        let raw = self.temperature.read_temperature();
        let reading = if raw.is_finite() && (self.min_c..=self.max_c).contains(&raw) {
            debug!(temperature = raw, "temperature sampled");
            SensorReading::new(raw)
        } else {
            warn!(
                raw,
                min = self.min_c,
                max = self.max_c,
                "temperature reading invalid"
            );
            SensorReading::invalid()
        };
        self.last = Some(reading);
        reading
    }

    /// Read the presence input once.
    pub fn sample_motion(&mut self) -> bool {
        self.presence.read_presence()
    }

    /// The most recent temperature reading, if one was taken.
    pub const fn last_reading(&self) -> Option<SensorReading> {
        self.last
    }

    /// The temperature driver.
    pub const fn temperature_sensor(&self) -> &T {
        &self.temperature
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockPresence, MockTemperature};

    fn sampler(values: impl IntoIterator<Item = f32>) -> SensorSampler<MockTemperature, MockPresence> {
        SensorSampler::new(
            MockTemperature::cycling(values),
            MockPresence::cycling([true, false]),
            &SamplingConfig::default(),
        )
    }

    #[test]
    fn test_valid_reading_passes_through() {
        let mut sampler = sampler([21.5]);
        let reading = sampler.sample_temperature();
        assert!(reading.valid);
        assert_eq!(reading.value(), Some(21.5));
        assert_eq!(sampler.last_reading(), Some(reading));
    }

    #[test]
    fn test_nan_is_flagged_invalid() {
        let mut sampler = sampler([f32::NAN]);
        let reading = sampler.sample_temperature();
        assert!(!reading.valid);
        assert_eq!(reading.value(), None);
    }

    #[test]
    fn test_out_of_range_is_flagged_invalid() {
        let mut sampler = sampler([-273.0, 400.0, f32::INFINITY]);
        for _ in 0..3 {
            assert!(!sampler.sample_temperature().valid);
        }
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let mut sampler = sampler([-40.0, 125.0]);
        assert!(sampler.sample_temperature().valid);
        assert!(sampler.sample_temperature().valid);
    }

    #[test]
    fn test_new_reading_supersedes_old() {
        let mut sampler = sampler([20.0, f32::NAN]);
        sampler.sample_temperature();
        sampler.sample_temperature();
        assert_eq!(sampler.last_reading().and_then(|r| r.value()), None);
    }

    #[test]
    fn test_sample_motion_reads_presence() {
        let mut sampler = sampler([20.0]);
        assert!(sampler.sample_motion());
        assert!(!sampler.sample_motion());
        assert!(sampler.sample_motion());
    }
}
