//! Bounded buffer of recent readings owned by one poll loop

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::sensors::SensorReading;

/// What each tick takes from the response array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Replace the buffer with the newest `capacity` readings
    #[default]
    Tail,
    /// Append only the newest reading, evicting the oldest when full
    Newest,
}

#[derive(Debug, Clone)]
pub struct PollSession {
    window: WindowMode,
    capacity: usize,
    buffer: VecDeque<SensorReading>,
}

impl PollSession {
    pub fn new(window: WindowMode, capacity: usize) -> Self {
        Self {
            window,
            capacity,
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    /// Take one tick's readings (oldest first) according to the window mode
    pub fn absorb(&mut self, mut readings: Vec<SensorReading>) {
        match self.window {
            WindowMode::Tail => {
                let skip = readings.len().saturating_sub(self.capacity);
                self.buffer = readings.drain(skip..).collect();
            }
            WindowMode::Newest => {
                if let Some(newest) = readings.pop() {
                    if self.buffer.len() == self.capacity {
                        self.buffer.pop_front();
                    }
                    self.buffer.push_back(newest);
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn readings(&mut self) -> &[SensorReading] {
        self.buffer.make_contiguous()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn window(&self) -> WindowMode {
        self.window
    }
}
