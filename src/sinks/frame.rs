//! One fully encoded grid, ready for any sink

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{GridSpec, Layout};
use crate::mapper::{AqiScore, Mapper, Rgb, VisualEncoding};
use crate::sensors::{SensorKey, SensorReading};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorCell {
    pub key: SensorKey,
    pub value: f64,
    /// False when the reading did not carry this sensor and `value` is the default
    pub present: bool,
    #[serde(flatten)]
    pub encoding: VisualEncoding,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellFrame {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    /// Position of the reading in the session buffer; `None` for an idle cell
    pub reading_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub sensors: Vec<SensorCell>,
    pub aqi: AqiScore,
    pub mixed: Rgb,
}

impl CellFrame {
    /// All sensor blobs screen-blended over black at their own opacity
    pub fn overlay_color(&self) -> Rgb {
        self.sensors
            .iter()
            .fold(Rgb::BLACK, |acc, s| acc.screen(s.encoding.color, s.encoding.opacity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub rows: usize,
    pub cols: usize,
    pub layout: Layout,
    pub cell_size: f64,
    pub built_at: DateTime<Utc>,
    pub cells: Vec<CellFrame>,
}

impl Frame {
    /// Encode `readings` into a `rows * cols` grid, row-major, oldest first.
    ///
    /// Cells past the end of `readings` encode the empty reading, so a short
    /// buffer draws as calm cells rather than stale ones.
    pub fn build(mapper: &Mapper, grid: &GridSpec, readings: &[SensorReading]) -> Self {
        let cell_size = grid.cell_size();
        let empty = SensorReading::empty();

        let cells = (0..grid.capacity())
            .map(|index| {
                let (reading_index, reading) = match readings.get(index) {
                    Some(r) => (Some(index), r),
                    None => (None, &empty),
                };
                let sensors = mapper
                    .ranges()
                    .keys()
                    .map(|key| {
                        let value = reading.value(key);
                        SensorCell {
                            key,
                            value,
                            present: reading.has(key),
                            encoding: mapper.encode(key, value, cell_size),
                        }
                    })
                    .collect();

                CellFrame {
                    index,
                    row: index / grid.cols,
                    col: index % grid.cols,
                    reading_index,
                    timestamp: reading.timestamp(),
                    sensors,
                    aqi: mapper.compute_aqi(reading),
                    mixed: mapper.compute_mixed_color(reading),
                }
            })
            .collect();

        Self {
            rows: grid.rows,
            cols: grid.cols,
            layout: grid.layout,
            cell_size,
            built_at: Utc::now(),
            cells,
        }
    }

    /// Cell holding the newest reading
    pub fn latest(&self) -> Option<&CellFrame> {
        self.cells.iter().rev().find(|c| c.reading_index.is_some())
    }

    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|c| c.reading_index.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::ColorPolicy;
    use crate::sensors::{SensorFamily, SensorRanges};

    fn grid() -> GridSpec {
        GridSpec {
            rows: 2,
            cols: 3,
            layout: Layout::Overlay,
            viewport_width: 1280.0,
            max_cell_size: 80.0,
        }
    }

    fn mapper() -> Mapper {
        Mapper::new(SensorRanges::for_family(SensorFamily::Gas), ColorPolicy::Threshold)
    }

    #[test]
    fn test_build_fills_row_major() {
        let readings: Vec<_> = (0..4)
            .map(|i| SensorReading::empty().with(SensorKey::Co, i as f64 / 4.0))
            .collect();
        let frame = Frame::build(&mapper(), &grid(), &readings);

        assert_eq!(frame.cells.len(), 6);
        assert_eq!(frame.filled(), 4);
        assert_eq!(frame.cell_size, 80.0);
        assert_eq!((frame.cells[4].row, frame.cells[4].col), (1, 1));
        assert_eq!(frame.cells[4].reading_index, None);
        assert_eq!(frame.latest().map(|c| c.index), Some(3));
        assert_eq!(frame.cells[3].sensors[0].key, SensorKey::Co);
        assert_eq!(frame.cells[3].sensors[0].value, 0.75);
    }

    #[test]
    fn test_idle_cells_match_empty_reading() {
        let frame = Frame::build(&mapper(), &grid(), &[]);
        let explicit = Frame::build(&mapper(), &grid(), &[SensorReading::empty()]);
        assert_eq!(frame.cells[0].sensors, explicit.cells[0].sensors);
        assert_eq!(frame.cells[0].aqi, explicit.cells[0].aqi);
        assert!(frame.latest().is_none());
    }

    #[test]
    fn test_overlay_color_brightens_with_values() {
        let calm = Frame::build(&mapper(), &grid(), &[SensorReading::empty()]);
        let busy = Frame::build(
            &mapper(),
            &grid(),
            &[SensorReading::empty().with(SensorKey::Co, 1.0).with(SensorKey::No2, 1.0)],
        );
        assert_ne!(calm.cells[0].overlay_color(), busy.cells[0].overlay_color());
    }
}
