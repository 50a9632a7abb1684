//! Sensor model: keys, families, ranges and typed readings

pub mod keys;
pub mod range;
pub mod reading;

pub use keys::{SensorFamily, SensorKey};
pub use range::{SensorRange, SensorRanges};
pub use reading::SensorReading;
