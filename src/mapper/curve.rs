//! Affine `floor + span * normalized` curves for opacity, blur and size

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub floor: f64,
    pub span: f64,
}

impl Curve {
    /// Opacity 0.3 → 1.0
    pub const OPACITY: Curve = Curve {
        floor: 0.3,
        span: 0.7,
    };
    /// Blur as a fraction of the cell: 5px → 25px on an 80px cell
    pub const BLUR: Curve = Curve {
        floor: 0.0625,
        span: 0.25,
    };
    /// Blobs fill the cell regardless of value
    pub const SIZE: Curve = Curve {
        floor: 1.0,
        span: 0.0,
    };

    pub fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        let ok = self.floor.is_finite() && self.span.is_finite() && self.floor >= 0.0 && self.span >= 0.0;
        if ok {
            Ok(())
        } else {
            Err(ConfigError::InvalidCurve {
                curve: name,
                floor: self.floor,
                span: self.span,
            })
        }
    }

    /// Evaluate at a normalized value, clamped to 0..=1 first
    pub fn at(&self, normalized: f64) -> f64 {
        let t = if normalized.is_nan() {
            0.0
        } else {
            normalized.clamp(0.0, 1.0)
        };
        self.floor + self.span * t
    }

    pub fn ceiling(&self) -> f64 {
        self.floor + self.span
    }
}
