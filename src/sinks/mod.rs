//! Presentation sinks: where finished frames go

pub mod frame;
pub mod snapshot;
#[cfg(feature = "terminal")]
pub mod terminal;

use serde::{Deserialize, Serialize};

use crate::poll::PollStats;
pub use frame::{CellFrame, Frame};
pub use snapshot::{SharedSnapshot, SnapshotSink};

/// Fraction of the viewport the grid may occupy
const VIEWPORT_FILL: f64 = 0.9;

/// How the sensors of one cell are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "terminal", derive(clap::ValueEnum))]
pub enum Layout {
    /// One blob per sensor, stacked with screen blending
    #[default]
    Overlay,
    /// One small tile per sensor side by side
    Subgrid,
    /// A single blob in the mixed colour
    Fused,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridSpec {
    pub rows: usize,
    pub cols: usize,
    pub layout: Layout,
    pub viewport_width: f64,
    pub max_cell_size: f64,
}

impl GridSpec {
    pub fn capacity(&self) -> usize {
        self.rows * self.cols
    }

    /// Edge of one cell: 90% of the viewport split across columns, capped
    pub fn cell_size(&self) -> f64 {
        let fitted = self.viewport_width * VIEWPORT_FILL / self.cols.max(1) as f64;
        fitted.min(self.max_cell_size).max(0.0)
    }
}

/// Receives every frame the poll loop builds
pub trait PresentationSink: Send {
    fn apply(&mut self, frame: &Frame) -> anyhow::Result<()>;

    /// Called once per tick. A successful tick reports before its frame is
    /// applied; a failed one reports after the failure is recorded.
    fn report(&mut self, _stats: &PollStats) {}
}
