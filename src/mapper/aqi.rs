//! Local air-quality index: mean normalized value scaled to 0..=300
//!
//! Not the EPA formula. Every configured sensor weighs the same, so the score
//! only says how far the room sits toward the top of its configured ranges.

use serde::Serialize;

use super::color::Rgb;

pub const AQI_MAX: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiBand {
    Good,
    Moderate,
    UnhealthyForSensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiBand {
    pub fn from_score(score: f64) -> Self {
        if score <= 50.0 {
            AqiBand::Good
        } else if score <= 100.0 {
            AqiBand::Moderate
        } else if score <= 150.0 {
            AqiBand::UnhealthyForSensitive
        } else if score <= 200.0 {
            AqiBand::Unhealthy
        } else if score <= 300.0 {
            AqiBand::VeryUnhealthy
        } else {
            AqiBand::Hazardous
        }
    }

    pub fn color(self) -> Rgb {
        match self {
            AqiBand::Good => Rgb::new(0x00, 0xe4, 0x00),
            AqiBand::Moderate => Rgb::new(0xff, 0xff, 0x00),
            AqiBand::UnhealthyForSensitive => Rgb::new(0xff, 0x7e, 0x00),
            AqiBand::Unhealthy => Rgb::new(0xff, 0x00, 0x00),
            AqiBand::VeryUnhealthy => Rgb::new(0x8f, 0x3f, 0x97),
            AqiBand::Hazardous => Rgb::new(0x7e, 0x00, 0x23),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AqiBand::Good => "Good",
            AqiBand::Moderate => "Moderate",
            AqiBand::UnhealthyForSensitive => "Unhealthy for sensitive groups",
            AqiBand::Unhealthy => "Unhealthy",
            AqiBand::VeryUnhealthy => "Very unhealthy",
            AqiBand::Hazardous => "Hazardous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AqiScore {
    pub value: f64,
    pub band: AqiBand,
}

impl AqiScore {
    /// Score from the mean normalized value (0..=1)
    pub fn from_mean(mean: f64) -> Self {
        let value = (mean.clamp(0.0, 1.0) * AQI_MAX).clamp(0.0, AQI_MAX);
        Self {
            value,
            band: AqiBand::from_score(value),
        }
    }
}
