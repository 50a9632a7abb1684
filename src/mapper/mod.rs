//! Sensor value mapper: raw value → normalized 0..=1 → visual encoding
//!
//! Everything here is pure. The poll loop calls it once per cell per tick and
//! throws the output away after the sink has drawn it.

pub mod aqi;
pub mod color;
pub mod curve;

use serde::Serialize;

use crate::sensors::{SensorKey, SensorRange, SensorRanges, SensorReading};
pub use aqi::AqiScore;
pub use color::{threshold_color, ColorPolicy, Palette, Rgb};
pub use curve::Curve;

/// Clamp `(value - min) / (max - min)` into 0..=1.
///
/// Returns exactly 0 at or below `min` and exactly 1 at or above `max`.
/// A degenerate domain (`max <= min`) or a NaN value yields 0.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() || !(max > min) {
        return 0.0;
    }
    if value <= min {
        return 0.0;
    }
    if value >= max {
        return 1.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Presentation properties for one sensor value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisualEncoding {
    pub normalized: f64,
    pub color: Rgb,
    pub opacity: f64,
    pub blur_radius: f64,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mapper {
    ranges: SensorRanges,
    policy: ColorPolicy,
    palette: Palette,
    opacity: Curve,
    blur: Curve,
    size: Curve,
}

impl Mapper {
    pub fn new(ranges: SensorRanges, policy: ColorPolicy) -> Self {
        Self {
            ranges,
            policy,
            palette: Palette::default(),
            opacity: Curve::OPACITY,
            blur: Curve::BLUR,
            size: Curve::SIZE,
        }
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_curves(mut self, opacity: Curve, blur: Curve, size: Curve) -> Self {
        self.opacity = opacity;
        self.blur = blur;
        self.size = size;
        self
    }

    pub fn ranges(&self) -> &SensorRanges {
        &self.ranges
    }

    pub fn policy(&self) -> ColorPolicy {
        self.policy
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn opacity_curve(&self) -> Curve {
        self.opacity
    }

    pub fn blur_curve(&self) -> Curve {
        self.blur
    }

    /// Configured range, or the built-in default for a key outside the config
    pub fn range(&self, key: SensorKey) -> SensorRange {
        self.ranges
            .get(key)
            .copied()
            .unwrap_or_else(|| SensorRange::default_for(key))
    }

    pub fn normalize(&self, key: SensorKey, value: f64) -> f64 {
        self.range(key).normalize(value)
    }

    pub fn value_to_color(&self, key: SensorKey, value: f64) -> Rgb {
        match self.policy {
            ColorPolicy::Threshold => threshold_color(self.normalize(key, value)),
            ColorPolicy::Palette => self.palette.base_color(key),
        }
    }

    pub fn value_to_opacity(&self, key: SensorKey, value: f64) -> f64 {
        self.opacity.at(self.normalize(key, value))
    }

    pub fn value_to_blur(&self, key: SensorKey, value: f64, reference_size: f64) -> f64 {
        reference_size * self.blur.at(self.normalize(key, value))
    }

    pub fn value_to_size(&self, key: SensorKey, value: f64, reference_size: f64) -> f64 {
        reference_size * self.size.at(self.normalize(key, value))
    }

    pub fn encode(&self, key: SensorKey, value: f64, reference_size: f64) -> VisualEncoding {
        VisualEncoding {
            normalized: self.normalize(key, value),
            color: self.value_to_color(key, value),
            opacity: self.value_to_opacity(key, value),
            blur_radius: self.value_to_blur(key, value, reference_size),
            size: self.value_to_size(key, value, reference_size),
        }
    }

    /// Mean normalized value over the configured sensors, scaled to 0..=300.
    ///
    /// Sensors are visited in configuration order, so the key order of the
    /// incoming JSON never affects the result.
    pub fn compute_aqi(&self, reading: &SensorReading) -> AqiScore {
        AqiScore::from_mean(self.mean_normalized(reading))
    }

    /// Normalized-weighted average of the palette colours
    pub fn compute_mixed_color(&self, reading: &SensorReading) -> Rgb {
        let count = self.ranges.len() as f64;
        let mut sum = [0.0f64; 3];
        for (key, range) in self.ranges.iter() {
            let norm = range.normalize(reading.value(key));
            let base = self.palette.base_color(key).channels();
            for (acc, c) in sum.iter_mut().zip(base) {
                *acc += norm * c;
            }
        }
        Rgb::from_channels(sum[0] / count, sum[1] / count, sum[2] / count)
    }

    fn mean_normalized(&self, reading: &SensorReading) -> f64 {
        let total: f64 = self
            .ranges
            .iter()
            .map(|(key, range)| range.normalize(reading.value(key)))
            .sum();
        total / self.ranges.len() as f64
    }
}
