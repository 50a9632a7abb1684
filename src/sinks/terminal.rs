//! Truecolor grid renderer for `aqgrid watch`
//!
//! Each cell is two glyphs wide whatever the configured pixel cell size, so a
//! terminal resize only needs a full redraw.

use colored::Colorize;
use std::fmt::Write as _;
use std::io::Write;

use super::{CellFrame, Frame, Layout, PresentationSink};
use crate::mapper::Rgb;
use crate::poll::PollStats;

const CLEAR: &str = "\x1b[2J\x1b[H";
const BLOCK: char = '█';

pub struct TerminalSink<W: Write + Send> {
    out: W,
    last_status: String,
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_status: String::new(),
        }
    }
}

impl<W: Write + Send> PresentationSink for TerminalSink<W> {
    fn apply(&mut self, frame: &Frame) -> anyhow::Result<()> {
        let mut screen = String::from(CLEAR);
        screen.push_str(&render(frame));
        screen.push_str(&self.last_status);
        self.out.write_all(screen.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn report(&mut self, stats: &PollStats) {
        self.last_status = match &stats.last_error {
            Some(err) if stats.last_tick_failed => format!(
                "poll #{}: {} failures so far, last: {}\n",
                stats.ticks, stats.failures, err
            ),
            _ => format!("poll #{}: ok ({} failures)\n", stats.ticks, stats.failures),
        };
    }
}

fn paint(out: &mut String, color: Rgb, glyphs: &str) {
    let _ = write!(out, "{}", glyphs.truecolor(color.r, color.g, color.b));
}

fn render_cell(out: &mut String, cell: &CellFrame, layout: Layout) {
    match layout {
        Layout::Overlay => paint(out, cell.overlay_color(), "██"),
        Layout::Fused => paint(out, cell.mixed, "██"),
        Layout::Subgrid => {
            for s in &cell.sensors {
                paint(out, s.encoding.color.scale(s.encoding.opacity), &BLOCK.to_string());
            }
        }
    }
}

/// Grid text without the leading clear-screen sequence
pub fn render(frame: &Frame) -> String {
    let mut out = String::new();
    for row in frame.cells.chunks(frame.cols.max(1)) {
        for cell in row {
            render_cell(&mut out, cell, frame.layout);
            out.push(' ');
        }
        out.push('\n');
    }

    match frame.latest() {
        Some(cell) => {
            let band = cell.aqi.band;
            paint(&mut out, band.color(), &format!("AQI {:.0}", cell.aqi.value));
            let _ = write!(out, " {}", band.label());
            if let Some(ts) = cell.timestamp {
                let _ = write!(out, " at {}", ts.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            let _ = writeln!(out, " ({} readings)", frame.filled());
        }
        None => out.push_str("waiting for readings\n"),
    }
    out
}
