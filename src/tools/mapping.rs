//! Direct access to the value mapper, independent of the poll loop

use rmcp::{model::*, ErrorData as McpError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::mapper::{Mapper, VisualEncoding};
use crate::sensors::SensorKey;
use crate::shared::{internal_error, invalid_params};

// === Parameter Types ===

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EncodeParams {
    #[schemars(description = "Sensor name, e.g. 'co2', 'pm2_5', 'humidity'")]
    pub sensor: String,
    #[schemars(description = "Raw sensor value in the sensor's own unit")]
    pub value: f64,
    #[schemars(description = "Cell size in pixels used to scale blur and size (default: the grid's cell size)")]
    #[serde(default)]
    pub reference_size: Option<f64>,
}

#[derive(Debug, Serialize)]
struct EncodeResult {
    sensor: SensorKey,
    value: f64,
    min: f64,
    max: f64,
    configured: bool,
    #[serde(flatten)]
    encoding: VisualEncoding,
}

#[derive(Debug, Serialize)]
struct RangeEntry {
    sensor: SensorKey,
    unit: &'static str,
    min: f64,
    max: f64,
    base_color: String,
}

// === Tool Functions ===

pub async fn encode_value(
    mapper: &Mapper,
    default_size: f64,
    params: EncodeParams,
) -> Result<CallToolResult, McpError> {
    let key: SensorKey = params.sensor.parse().map_err(invalid_params)?;
    let reference = params.reference_size.unwrap_or(default_size);
    if !reference.is_finite() || reference < 0.0 {
        return Err(invalid_params("reference_size must be a non-negative number"));
    }

    let range = mapper.range(key);
    let result = EncodeResult {
        sensor: key,
        value: params.value,
        min: range.min(),
        max: range.max(),
        configured: mapper.ranges().get(key).is_some(),
        encoding: mapper.encode(key, params.value, reference),
    };

    let json = serde_json::to_string_pretty(&result)
        .map_err(|e| internal_error(format!("Serialization error: {}", e)))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

pub async fn get_sensor_ranges(mapper: &Mapper) -> Result<CallToolResult, McpError> {
    let entries: Vec<RangeEntry> = mapper
        .ranges()
        .iter()
        .map(|(key, range)| RangeEntry {
            sensor: key,
            unit: key.unit(),
            min: range.min(),
            max: range.max(),
            base_color: mapper.palette().base_color(key).to_hex(),
        })
        .collect();

    let json = serde_json::to_string_pretty(&serde_json::json!({
        "color_policy": mapper.policy(),
        "opacity": mapper.opacity_curve(),
        "blur": mapper.blur_curve(),
        "sensors": entries,
    }))
    .map_err(|e| internal_error(format!("Serialization error: {}", e)))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
