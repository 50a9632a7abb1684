//! RGB colour type and the two sensor colouring strategies

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::sensors::SensorKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0x00, 0xff, 0x00);
    pub const YELLOW: Rgb = Rgb::new(0xff, 0xff, 0x00);
    pub const ORANGE: Rgb = Rgb::new(0xff, 0x80, 0x00);
    pub const RED: Rgb = Rgb::new(0xff, 0x00, 0x40);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from float channels in 0..=255, rounding and clamping each
    pub fn from_channels(r: f64, g: f64, b: f64) -> Self {
        fn channel(c: f64) -> u8 {
            if c.is_nan() {
                0
            } else {
                c.round().clamp(0.0, 255.0) as u8
            }
        }
        Self::new(channel(r), channel(g), channel(b))
    }

    pub fn channels(self) -> [f64; 3] {
        [self.r as f64, self.g as f64, self.b as f64]
    }

    /// Every channel multiplied by `factor`
    pub fn scale(self, factor: f64) -> Self {
        let [r, g, b] = self.channels();
        Self::from_channels(r * factor, g * factor, b * factor)
    }

    /// Screen-blend `top` over `self` at the given opacity (0..=1)
    pub fn screen(self, top: Rgb, opacity: f64) -> Self {
        let alpha = opacity.clamp(0.0, 1.0);
        let blend = |base: u8, over: u8| {
            let (a, b) = (base as f64 / 255.0, over as f64 / 255.0);
            let screened = 1.0 - (1.0 - a) * (1.0 - b);
            (a + alpha * (screened - a)) * 255.0
        };
        Self::from_channels(
            blend(self.r, top.r),
            blend(self.g, top.g),
            blend(self.b, top.b),
        )
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidColor(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self::new(byte(0)?, byte(2)?, byte(4)?))
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Four-bucket colour over a normalized value
pub fn threshold_color(normalized: f64) -> Rgb {
    if normalized < 0.25 {
        Rgb::GREEN
    } else if normalized < 0.5 {
        Rgb::YELLOW
    } else if normalized < 0.75 {
        Rgb::ORANGE
    } else {
        Rgb::RED
    }
}

/// Fixed base colour per sensor
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    overrides: BTreeMap<SensorKey, Rgb>,
}

impl Palette {
    pub fn new(overrides: BTreeMap<SensorKey, Rgb>) -> Self {
        Self { overrides }
    }

    pub fn base_color(&self, key: SensorKey) -> Rgb {
        if let Some(c) = self.overrides.get(&key) {
            return *c;
        }
        match key {
            SensorKey::Co => Rgb::new(0xff, 0x52, 0x52),
            SensorKey::Co2 => Rgb::new(0xff, 0xb3, 0x00),
            SensorKey::Nh3 => Rgb::new(0x8b, 0xc3, 0x4a),
            SensorKey::No2 => Rgb::new(0xab, 0x47, 0xbc),
            SensorKey::Pm2_5 => Rgb::new(0x8d, 0x6e, 0x63),
            SensorKey::Pm10 => Rgb::new(0x78, 0x90, 0x9c),
            SensorKey::Humidity => Rgb::new(0x29, 0xb6, 0xf6),
            SensorKey::BmpTemp => Rgb::new(0xff, 0x70, 0x43),
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

/// How a sensor value becomes a colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorPolicy {
    /// green / yellow / orange / red by normalized quarter
    #[default]
    Threshold,
    /// the sensor's palette colour regardless of value
    Palette,
}
