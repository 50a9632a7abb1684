//! Latest frame and poll stats, shared with the MCP tools

use std::sync::{Arc, Mutex, MutexGuard};

use super::{Frame, PresentationSink};
use crate::poll::PollStats;

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub frame: Option<Frame>,
    pub stats: PollStats,
}

#[derive(Debug, Clone, Default)]
pub struct SharedSnapshot(Arc<Mutex<Snapshot>>);

impl SharedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the current snapshot
    pub fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        f(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        // a panicking writer can only leave a stale frame behind
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sink that keeps the newest frame for later queries
#[derive(Debug, Clone)]
pub struct SnapshotSink {
    shared: SharedSnapshot,
}

impl SnapshotSink {
    pub fn new(shared: SharedSnapshot) -> Self {
        Self { shared }
    }
}

impl PresentationSink for SnapshotSink {
    fn apply(&mut self, frame: &Frame) -> anyhow::Result<()> {
        self.shared.lock().frame = Some(frame.clone());
        Ok(())
    }

    fn report(&mut self, stats: &PollStats) {
        self.shared.lock().stats = stats.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{ColorPolicy, Mapper};
    use crate::sensors::{SensorFamily, SensorRanges, SensorReading};
    use crate::sinks::{GridSpec, Layout};

    #[test]
    fn test_sink_publishes_frame_and_stats() {
        let shared = SharedSnapshot::new();
        let mut sink = SnapshotSink::new(shared.clone());
        assert!(shared.read(|s| s.frame.is_none()));

        let mapper = Mapper::new(SensorRanges::for_family(SensorFamily::Gas), ColorPolicy::Threshold);
        let grid = GridSpec {
            rows: 1,
            cols: 2,
            layout: Layout::Fused,
            viewport_width: 200.0,
            max_cell_size: 80.0,
        };
        let frame = Frame::build(&mapper, &grid, &[SensorReading::empty()]);
        sink.apply(&frame).unwrap();

        let stats = PollStats {
            ticks: 3,
            failures: 1,
            ..PollStats::default()
        };
        sink.report(&stats);

        assert_eq!(shared.read(|s| s.frame.as_ref().map(|f| f.cells.len())), Some(2));
        assert_eq!(shared.read(|s| s.stats.ticks), 3);
    }
}
