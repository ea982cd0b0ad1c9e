// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Fractional-position sample reading with loop handling.

use crate::config::instrument::LoopMode;
use crate::instrument::Region;

/// Reads interpolated frames from a region's sample window.
#[derive(Debug, Clone)]
pub struct SampleReader {
    position: f64,
    step: f64,
    start: usize,
    end: usize,
    loop_mode: LoopMode,
    loop_start: usize,
    loop_end: usize,
    released: bool,
}

impl SampleReader {
    /// Creates a reader positioned at the start of the region's window that
    /// advances `step` frames per call.
    pub fn new(region: &Region, step: f64) -> Self {
        let (start, end) = region.window();
        let (loop_start, loop_end) = region.loop_points();
        Self {
            position: start as f64,
            step,
            start,
            end,
            loop_mode: region.loop_mode(),
            loop_start,
            loop_end,
            released: false,
        }
    }

    /// Moves back to the start of the window and re-arms sustain looping.
    pub fn restart(&mut self) {
        self.position = self.start as f64;
        self.released = false;
    }

    /// Stops sustain looping. Continuous loops are unaffected.
    pub fn release(&mut self) {
        self.released = true;
    }

    /// Returns the current fractional frame position.
    pub fn position(&self) -> f64 {
        self.position
    }

    fn looping(&self) -> bool {
        match self.loop_mode {
            LoopMode::NoLoop => false,
            LoopMode::LoopContinuous => true,
            LoopMode::LoopSustain => !self.released,
        }
    }

    /// Reads the next interpolated frame and advances. Returns `None` once the
    /// position passes the end of the window.
    #[inline]
    pub fn next(&mut self, frames: &[f32]) -> Option<f32> {
        let looping = self.looping();
        if looping && self.position >= self.loop_end as f64 {
            let length = (self.loop_end - self.loop_start) as f64;
            self.position =
                self.loop_start as f64 + (self.position - self.loop_start as f64) % length;
        }
        if self.position >= self.end as f64 {
            return None;
        }

        let index = self.position as usize;
        let fraction = (self.position - index as f64) as f32;
        let current = *frames.get(index)?;
        let next_index = index + 1;
        let next = if looping && next_index >= self.loop_end {
            frames.get(self.loop_start).copied().unwrap_or(current)
        } else if next_index < self.end {
            frames.get(next_index).copied().unwrap_or(current)
        } else {
            current
        };

        self.position += self.step;
        Some(current + (next - current) * fraction)
    }
}
