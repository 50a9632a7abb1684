//! Normalization domains per sensor

use serde::Serialize;

use super::{SensorFamily, SensorKey};
use crate::error::ConfigError;
use crate::mapper::normalize;

/// Closed interval a sensor value is rescaled from. Always `min < max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorRange {
    min: f64,
    max: f64,
}

impl SensorRange {
    pub fn new(key: SensorKey, min: f64, max: f64) -> Result<Self, ConfigError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(ConfigError::NonFiniteRange { key, min, max });
        }
        if max <= min {
            return Err(ConfigError::DegenerateRange { key, min, max });
        }
        Ok(Self { min, max })
    }

    /// Range used when the config does not override it
    pub fn default_for(key: SensorKey) -> Self {
        let (min, max) = match key {
            SensorKey::Co => (0.0, 1.0),
            SensorKey::Co2 => (350.0, 500.0),
            SensorKey::Nh3 => (0.0, 1.5),
            SensorKey::No2 => (0.0, 1.0),
            SensorKey::Pm2_5 => (0.0, 100.0),
            SensorKey::Pm10 => (0.0, 150.0),
            SensorKey::Humidity => (0.0, 100.0),
            SensorKey::BmpTemp => (15.0, 30.0),
        };
        Self { min, max }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn normalize(&self, value: f64) -> f64 {
        normalize(value, self.min, self.max)
    }
}

/// Ordered, non-empty set of configured sensors and their ranges
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRanges {
    entries: Vec<(SensorKey, SensorRange)>,
}

impl SensorRanges {
    pub fn new(entries: Vec<(SensorKey, SensorRange)>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::NoSensors);
        }
        for (i, (key, _)) in entries.iter().enumerate() {
            if entries[..i].iter().any(|(k, _)| k == key) {
                return Err(ConfigError::DuplicateSensor(*key));
            }
        }
        Ok(Self { entries })
    }

    /// Default ranges for every key of a family
    pub fn for_family(family: SensorFamily) -> Self {
        Self {
            entries: family
                .keys()
                .into_iter()
                .map(|k| (k, SensorRange::default_for(k)))
                .collect(),
        }
    }

    pub fn get(&self, key: SensorKey) -> Option<&SensorRange> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, r)| r)
    }

    pub fn keys(&self) -> impl Iterator<Item = SensorKey> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SensorKey, &SensorRange)> + '_ {
        self.entries.iter().map(|(k, r)| (*k, r))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
