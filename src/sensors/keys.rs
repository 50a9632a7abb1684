//! Sensor keys and the fixed key sets deployed together

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One measured quantity, named as the sensor feed names it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SensorKey {
    #[serde(rename = "co")]
    Co,
    #[serde(rename = "co2")]
    Co2,
    #[serde(rename = "nh3")]
    Nh3,
    #[serde(rename = "no2")]
    No2,
    #[serde(rename = "pm2_5")]
    Pm2_5,
    #[serde(rename = "pm10")]
    Pm10,
    #[serde(rename = "humidity")]
    Humidity,
    #[serde(rename = "bmp_temp")]
    BmpTemp,
}

impl SensorKey {
    pub const ALL: [SensorKey; 8] = [
        SensorKey::Co,
        SensorKey::Co2,
        SensorKey::Nh3,
        SensorKey::No2,
        SensorKey::Pm2_5,
        SensorKey::Pm10,
        SensorKey::Humidity,
        SensorKey::BmpTemp,
    ];

    /// Field name in the sensor feed
    pub fn as_str(self) -> &'static str {
        match self {
            SensorKey::Co => "co",
            SensorKey::Co2 => "co2",
            SensorKey::Nh3 => "nh3",
            SensorKey::No2 => "no2",
            SensorKey::Pm2_5 => "pm2_5",
            SensorKey::Pm10 => "pm10",
            SensorKey::Humidity => "humidity",
            SensorKey::BmpTemp => "bmp_temp",
        }
    }

    /// Unit the feed reports the value in
    pub fn unit(self) -> &'static str {
        match self {
            SensorKey::Co | SensorKey::Co2 | SensorKey::Nh3 | SensorKey::No2 => "ppm",
            SensorKey::Pm2_5 | SensorKey::Pm10 => "µg/m³",
            SensorKey::Humidity => "%",
            SensorKey::BmpTemp => "°C",
        }
    }
}

impl fmt::Display for SensorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = SensorKey::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown sensor '{}' (known: {})", s, known.join(", "))
            })
    }
}

/// The two key sets seen in deployments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorFamily {
    /// co, co2, nh3, no2, humidity, bmp_temp
    #[default]
    Gas,
    /// pm2_5, pm10, nh3, no2, humidity, bmp_temp
    Particulate,
}

impl SensorFamily {
    pub fn keys(self) -> [SensorKey; 6] {
        match self {
            SensorFamily::Gas => [
                SensorKey::Co,
                SensorKey::Co2,
                SensorKey::Nh3,
                SensorKey::No2,
                SensorKey::Humidity,
                SensorKey::BmpTemp,
            ],
            SensorFamily::Particulate => [
                SensorKey::Pm2_5,
                SensorKey::Pm10,
                SensorKey::Nh3,
                SensorKey::No2,
                SensorKey::Humidity,
                SensorKey::BmpTemp,
            ],
        }
    }
}
