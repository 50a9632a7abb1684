//! Configuration: endpoint, sensors, ranges and presentation curves
//!
//! Reads ~/.config/aqgrid/config.toml. A missing file falls back to defaults.
//! A file that cannot be read or parsed is an error, and one that parses but
//! describes an unusable setup (for example a sensor range with `min == max`)
//! is rejected by [`Config::validate`]. Both happen before the first poll.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::mapper::{ColorPolicy, Curve, Mapper, Palette, Rgb};
use crate::poll::WindowMode;
use crate::sensors::{SensorFamily, SensorKey, SensorRange, SensorRanges};
use crate::sinks::{GridSpec, Layout};

pub const DEFAULT_ENDPOINT: &str = "https://server-online-1.onrender.com/sensor";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
    pub layout: Layout,
    /// Width the grid is laid out in, in pixels
    pub viewport_width: f64,
    /// Upper bound on a cell's edge, in pixels
    pub max_cell_size: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 12,
            cols: 12,
            layout: Layout::default(),
            viewport_width: 1280.0,
            max_cell_size: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    pub poll_interval_secs: u64,
    /// Per-request deadline; defaults to the poll interval
    pub request_timeout_secs: Option<u64>,
    /// Key set used when `sensors` is empty
    pub family: SensorFamily,
    /// Explicit sensor list, overrides `family`
    pub sensors: Vec<SensorKey>,
    pub color_policy: ColorPolicy,
    pub window: WindowMode,
    pub grid: GridConfig,
    pub opacity: Curve,
    pub blur: Curve,
    pub size: Curve,
    /// Per-sensor range overrides, keyed by sensor name
    pub ranges: BTreeMap<String, RangeConfig>,
    /// Per-sensor palette overrides, keyed by sensor name, values `#rrggbb`
    pub palette: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: None,
            family: SensorFamily::default(),
            sensors: Vec::new(),
            color_policy: ColorPolicy::default(),
            window: WindowMode::default(),
            grid: GridConfig::default(),
            opacity: Curve::OPACITY,
            blur: Curve::BLUR,
            size: Curve::SIZE,
            ranges: BTreeMap::new(),
            palette: BTreeMap::new(),
        }
    }
}

/// Validated configuration, ready to drive a poll loop
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub window: WindowMode,
    pub grid: GridSpec,
    pub mapper: Mapper,
}

impl Config {
    /// Get the config file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("aqgrid").join("config.toml"))
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Result<Self, ConfigError> {
        let Some(path) = Self::path() else {
            tracing::warn!("Could not determine config directory, using defaults");
            return Ok(Self::default());
        };
        Self::load_from(&path)
    }

    /// Load config from `path`, or return default if there is no file there
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Configured sensor keys, in order
    pub fn sensor_keys(&self) -> Vec<SensorKey> {
        if self.sensors.is_empty() {
            self.family.keys().to_vec()
        } else {
            self.sensors.clone()
        }
    }

    /// Check every invariant and build the runtime settings
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.grid.rows == 0 || self.grid.cols == 0 {
            return Err(ConfigError::EmptyGrid {
                rows: self.grid.rows,
                cols: self.grid.cols,
            });
        }

        self.opacity.validate("opacity")?;
        self.blur.validate("blur")?;
        self.size.validate("size")?;
        if self.opacity.ceiling() > 1.0 {
            return Err(ConfigError::InvalidCurve {
                curve: "opacity",
                floor: self.opacity.floor,
                span: self.opacity.span,
            });
        }

        let keys = self.sensor_keys();
        for name in self.ranges.keys().chain(self.palette.keys()) {
            let key: SensorKey = name.parse().map_err(ConfigError::UnknownSensor)?;
            if !keys.contains(&key) {
                tracing::warn!("Config mentions sensor {} which is not enabled", key);
            }
        }

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let range = match self.ranges.get(key.as_str()) {
                Some(r) => SensorRange::new(key, r.min, r.max)?,
                None => SensorRange::default_for(key),
            };
            entries.push((key, range));
        }
        let ranges = SensorRanges::new(entries)?;

        let mut overrides = BTreeMap::new();
        for (name, hex) in &self.palette {
            let key: SensorKey = name.parse().map_err(ConfigError::UnknownSensor)?;
            overrides.insert(key, hex.parse::<Rgb>()?);
        }

        let mapper = Mapper::new(ranges, self.color_policy)
            .with_palette(Palette::new(overrides))
            .with_curves(self.opacity, self.blur, self.size);

        Ok(Settings {
            endpoint: self.endpoint.clone(),
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.request_timeout_secs.unwrap_or(self.poll_interval_secs)),
            window: self.window,
            grid: GridSpec {
                rows: self.grid.rows,
                cols: self.grid.cols,
                layout: self.grid.layout,
                viewport_width: self.grid.viewport_width,
                max_cell_size: self.grid.max_cell_size,
            },
            mapper,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.sensor_keys(), SensorFamily::Gas.keys().to_vec());

        let settings = config.validate().unwrap();
        assert_eq!(settings.interval, Duration::from_secs(5));
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(settings.grid.capacity(), 144);
        assert_eq!(settings.mapper.ranges().len(), 6);
    }

    #[test]
    fn test_degenerate_range_fails_validation() {
        let mut config = Config::default();
        config
            .ranges
            .insert("co".to_string(), RangeConfig { min: 5.0, max: 5.0 });
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::DegenerateRange {
                key: SensorKey::Co,
                min: 5.0,
                max: 5.0
            }
        );
    }

    #[test]
    fn test_unknown_sensor_rejected() {
        let mut config = Config::default();
        config.palette.insert("ozone".to_string(), "#ffffff".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownSensor(_))
        ));
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r##"
            endpoint = "http://localhost:3000/sensor"
            family = "particulate"
            color_policy = "palette"
            window = "newest"

            [grid]
            rows = 6
            layout = "fused"

            [opacity]
            floor = 0.2
            span = 0.8

            [ranges.pm2_5]
            min = 0
            max = 55.5

            [palette]
            pm10 = "#123456"
            "##,
        )
        .unwrap();

        assert_eq!(config.grid.cols, 12);
        let settings = config.validate().unwrap();
        assert_eq!(settings.window, WindowMode::Newest);
        assert_eq!(settings.grid.capacity(), 72);
        assert_eq!(settings.grid.layout, Layout::Fused);
        assert_eq!(settings.mapper.policy(), ColorPolicy::Palette);
        assert_eq!(settings.mapper.range(SensorKey::Pm2_5).max(), 55.5);
        assert_eq!(
            settings.mapper.palette().base_color(SensorKey::Pm10),
            Rgb::new(0x12, 0x34, 0x56)
        );
        assert_eq!(settings.mapper.value_to_opacity(SensorKey::Pm10, 0.0), 0.2);
    }

    #[test]
    fn test_opacity_ceiling_above_one_rejected() {
        let config = Config {
            opacity: Curve {
                floor: 0.5,
                span: 0.7,
            },
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCurve { curve: "opacity", .. })
        ));
    }

    #[test]
    fn test_zero_interval_and_empty_grid() {
        let mut config = Config::default();
        config.poll_interval_secs = 0;
        assert_eq!(config.validate().unwrap_err(), ConfigError::ZeroInterval);

        let mut config = Config::default();
        config.grid.cols = 0;
        assert!(matches!(config.validate(), Err(ConfigError::EmptyGrid { .. })));

        let mut config = Config::default();
        config.request_timeout_secs = Some(0);
        assert_eq!(config.validate().unwrap_err(), ConfigError::ZeroTimeout);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "endpoint = \"http://localhost:3000/sensor\"\n[ranges.co]\nmin = 5.0\n").unwrap();

        match Config::load_from(&path) {
            Err(ConfigError::Parse { message, .. }) => assert!(message.contains("max")),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll_interval_secs = 10\nrequest_timeout_secs = 3\n").unwrap();

        let settings = Config::load_from(&path).unwrap().validate().unwrap();
        assert_eq!(settings.interval, Duration::from_secs(10));
        assert_eq!(settings.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_template_parses() {
        let config: Config = toml::from_str(include_str!("../config.toml.example")).unwrap();
        assert!(config.validate().is_ok());
    }
}
