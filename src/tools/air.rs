//! Air-quality tools backed by the poll loop's latest snapshot

use chrono::{DateTime, Utc};
use rmcp::{model::*, ErrorData as McpError};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::fmt::Write as _;
use std::time::Duration;

use crate::poll::{PollControl, PollStats};
use crate::shared::{format_age, internal_error, invalid_params};
use crate::sinks::{CellFrame, Frame, SharedSnapshot};

// === Parameter Types ===

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GridParams {
    #[schemars(description = "Cell index (row-major, 0-based). Omit for an overview of the whole grid")]
    #[serde(default)]
    pub cell: Option<usize>,
}

// === Formatting ===

pub fn describe_cell(cell: &CellFrame, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    match cell.timestamp {
        Some(ts) => {
            let _ = writeln!(out, "Reading at {} ({})", ts.to_rfc3339(), format_age(ts, now));
        }
        None => out.push_str("Reading (no timestamp)\n"),
    }
    let _ = writeln!(
        out,
        "AQI: {:.0} - {} (band colour {})",
        cell.aqi.value,
        cell.aqi.band.label(),
        cell.aqi.band.color()
    );
    let _ = writeln!(out, "Mixed colour: {}\n", cell.mixed);

    for s in &cell.sensors {
        let _ = writeln!(
            out,
            "{:<9} {:>9.2} {:<6} {:>4.0}%  {}  opacity {:.2}{}",
            s.key.as_str(),
            s.value,
            s.key.unit(),
            s.encoding.normalized * 100.0,
            s.encoding.color,
            s.encoding.opacity,
            if s.present { "" } else { "  (missing)" }
        );
    }
    out
}

pub fn grid_overview(frame: &Frame) -> String {
    let mut out = format!(
        "{}x{} grid, {} of {} cells filled, layout {:?}\nAQI per cell:\n",
        frame.rows,
        frame.cols,
        frame.filled(),
        frame.cells.len(),
        frame.layout
    );
    for row in frame.cells.chunks(frame.cols.max(1)) {
        let line: Vec<String> = row
            .iter()
            .map(|c| match c.reading_index {
                Some(_) => format!("{:>3.0}", c.aqi.value),
                None => "  .".to_string(),
            })
            .collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

fn no_data(stats: &PollStats) -> String {
    match &stats.last_error {
        Some(err) => format!("No readings yet. Last poll error: {}", err),
        None => "No readings yet, the first poll has not completed.".to_string(),
    }
}

// === Tool Functions ===

pub async fn get_air_quality(snapshot: &SharedSnapshot) -> Result<CallToolResult, McpError> {
    let text = snapshot.read(|s| {
        let latest = s.frame.as_ref().and_then(|f| f.latest());
        match latest {
            Some(cell) => {
                let mut text = describe_cell(cell, Utc::now());
                if s.stats.last_tick_failed {
                    if let Some(err) = &s.stats.last_error {
                        let _ = write!(text, "\nWarning: data may be stale, last poll failed: {}", err);
                    }
                }
                text
            }
            None => no_data(&s.stats),
        }
    });

    Ok(CallToolResult::success(vec![Content::text(text)]))
}

pub async fn get_grid(snapshot: &SharedSnapshot, params: GridParams) -> Result<CallToolResult, McpError> {
    let result = snapshot.read(|s| {
        let Some(frame) = &s.frame else {
            return Ok(no_data(&s.stats));
        };
        match params.cell {
            None => Ok(grid_overview(frame)),
            Some(i) => {
                let cell = frame.cells.get(i).ok_or_else(|| {
                    invalid_params(format!("cell {} out of range (0..{})", i, frame.cells.len()))
                })?;
                serde_json::to_string_pretty(cell)
                    .map_err(|e| internal_error(format!("Serialization error: {}", e)))
            }
        }
    })?;

    Ok(CallToolResult::success(vec![Content::text(result)]))
}

pub async fn get_poll_status(
    snapshot: &SharedSnapshot,
    endpoint: &str,
    interval: Duration,
) -> Result<CallToolResult, McpError> {
    let status = snapshot.read(|s| {
        json!({
            "endpoint": endpoint,
            "interval_secs": interval.as_secs(),
            "stats": s.stats,
            "frame_built_at": s.frame.as_ref().map(|f| f.built_at),
        })
    });

    let json = serde_json::to_string_pretty(&status)
        .map_err(|e| internal_error(format!("Serialization error: {}", e)))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

pub async fn reset_buffer(control: &PollControl) -> Result<CallToolResult, McpError> {
    if control.reset().await {
        Ok(CallToolResult::success(vec![Content::text(
            "Reading buffer cleared; the grid refills on the next poll",
        )]))
    } else {
        Err(internal_error("Poll loop is not running"))
    }
}
