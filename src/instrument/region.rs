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

//! Regions map a key/velocity range onto a window of sample data.

use std::sync::Arc;

use crate::config::instrument::{LoopMode, DEFAULT_PITCH_KEYCENTER};
use crate::envelope::EnvelopeSettings;

/// Decoded mono sample data. Shared between every region that references the same file.
#[derive(Clone, Debug)]
pub struct SampleData {
    frames: Arc<Vec<f32>>,
    sample_rate: u32,
}

impl SampleData {
    pub fn new(frames: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            frames: Arc::new(frames),
            sample_rate,
        }
    }

    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The rate the sample was recorded at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.frames.len() * std::mem::size_of::<f32>()
    }

    /// Returns true if both handles point at the same decoded buffer.
    pub fn shares_frames_with(&self, other: &SampleData) -> bool {
        Arc::ptr_eq(&self.frames, &other.frames)
    }
}

/// One sample-selection rule inside an instrument.
#[derive(Clone, Debug)]
pub struct Region {
    lo_key: u8,
    hi_key: u8,
    lo_vel: u8,
    hi_vel: u8,
    pitch_keycenter: u8,
    volume: f32,
    sample: SampleData,
    start: usize,
    end: usize,
    loop_mode: LoopMode,
    loop_start: usize,
    loop_end: usize,
    envelope: EnvelopeSettings,
}

impl Region {
    /// Creates a region that covers every key and velocity and plays the whole sample.
    pub fn new(sample: SampleData) -> Self {
        let end = sample.len();
        Self {
            lo_key: 0,
            hi_key: 127,
            lo_vel: 0,
            hi_vel: 127,
            pitch_keycenter: DEFAULT_PITCH_KEYCENTER,
            volume: 1.0,
            sample,
            start: 0,
            end,
            loop_mode: LoopMode::NoLoop,
            loop_start: 0,
            loop_end: end,
            envelope: EnvelopeSettings::default(),
        }
    }

    pub fn with_keys(mut self, lo: u8, hi: u8) -> Self {
        self.lo_key = lo;
        self.hi_key = hi;
        self
    }

    pub fn with_velocities(mut self, lo: u8, hi: u8) -> Self {
        self.lo_vel = lo;
        self.hi_vel = hi;
        self
    }

    pub fn with_pitch_keycenter(mut self, key: u8) -> Self {
        self.pitch_keycenter = key;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// Restricts playback to frames `start..end` of the sample.
    pub fn with_window(mut self, start: usize, end: usize) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_loop(mut self, mode: LoopMode, start: usize, end: usize) -> Self {
        self.loop_mode = mode;
        self.loop_start = start;
        self.loop_end = end;
        self
    }

    pub fn with_envelope(mut self, envelope: EnvelopeSettings) -> Self {
        self.envelope = envelope;
        self
    }

    /// Returns true if the note and velocity fall within this region's ranges.
    pub fn matches(&self, note: u8, velocity: u8) -> bool {
        (self.lo_key..=self.hi_key).contains(&note) && (self.lo_vel..=self.hi_vel).contains(&velocity)
    }

    /// The frequency ratio for playing `note` relative to the pitch center.
    pub fn pitch_ratio(&self, note: u8) -> f64 {
        2.0_f64.powf((note as f64 - self.pitch_keycenter as f64) / 12.0)
    }

    /// The number of sample frames to advance per output frame.
    pub fn playback_step(&self, note: u8, output_rate: u32) -> f64 {
        self.pitch_ratio(note) * self.sample.sample_rate() as f64 / output_rate as f64
    }

    pub fn key_range(&self) -> (u8, u8) {
        (self.lo_key, self.hi_key)
    }

    pub fn velocity_range(&self) -> (u8, u8) {
        (self.lo_vel, self.hi_vel)
    }

    pub fn pitch_keycenter(&self) -> u8 {
        self.pitch_keycenter
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn sample(&self) -> &SampleData {
        &self.sample
    }

    /// The playback window as `(start, end)` frame indices, end exclusive.
    pub fn window(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    /// The loop points as `(start, end)` frame indices, end exclusive.
    pub fn loop_points(&self) -> (usize, usize) {
        (self.loop_start, self.loop_end)
    }

    pub fn envelope(&self) -> &EnvelopeSettings {
        &self.envelope
    }

    /// Checks the region for internal consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.lo_key > self.hi_key {
            return Err(format!("lo_key {} above hi_key {}", self.lo_key, self.hi_key));
        }
        if self.hi_key > 127 || self.pitch_keycenter > 127 {
            return Err("keys must be within 0-127".to_string());
        }
        if self.lo_vel > self.hi_vel {
            return Err(format!("lo_vel {} above hi_vel {}", self.lo_vel, self.hi_vel));
        }
        if self.hi_vel > 127 {
            return Err("velocities must be within 0-127".to_string());
        }
        if self.start >= self.end || self.end > self.sample.len() {
            return Err(format!(
                "window {}..{} outside sample of {} frames",
                self.start,
                self.end,
                self.sample.len()
            ));
        }
        if self.loop_mode != LoopMode::NoLoop
            && (self.loop_start < self.start
                || self.loop_start >= self.loop_end
                || self.loop_end > self.end)
        {
            return Err(format!(
                "loop {}..{} outside window {}..{}",
                self.loop_start, self.loop_end, self.start, self.end
            ));
        }
        let envelope = &self.envelope;
        let times = [
            envelope.attack_ms,
            envelope.hold_ms,
            envelope.decay_ms,
            envelope.release_ms,
            envelope.hold2_ms.unwrap_or(0.0),
        ];
        if times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err("envelope times must be non-negative".to_string());
        }
        if !(0.0..=1.0).contains(&envelope.sustain_level) {
            return Err(format!(
                "sustain level {} outside 0.0-1.0",
                envelope.sustain_level
            ));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(format!("invalid volume {}", self.volume));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(frames: usize, sample_rate: u32) -> SampleData {
        SampleData::new(vec![0.0; frames], sample_rate)
    }

    #[test]
    fn test_region_matching() {
        let region = Region::new(sample(100, 44100))
            .with_keys(48, 60)
            .with_velocities(64, 127);

        assert!(region.matches(48, 64));
        assert!(region.matches(60, 127));
        assert!(!region.matches(47, 100));
        assert!(!region.matches(61, 100));
        assert!(!region.matches(50, 63));
    }

    #[test]
    fn test_pitch_ratio() {
        let region = Region::new(sample(100, 44100)).with_pitch_keycenter(60);
        assert_eq!(region.pitch_ratio(60), 1.0);
        assert!((region.pitch_ratio(72) - 2.0).abs() < 1e-12);
        assert!((region.pitch_ratio(48) - 0.5).abs() < 1e-12);
        assert!((region.pitch_ratio(67) - 1.498307).abs() < 1e-6);
    }

    #[test]
    fn test_playback_step_accounts_for_native_rate() {
        let region = Region::new(sample(100, 22050)).with_pitch_keycenter(60);
        assert!((region.playback_step(60, 44100) - 0.5).abs() < 1e-12);
        assert!((region.playback_step(72, 44100) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate() {
        assert!(Region::new(sample(100, 44100)).validate().is_ok());
        assert!(Region::new(sample(100, 44100))
            .with_keys(70, 60)
            .validate()
            .is_err());
        assert!(Region::new(sample(100, 44100))
            .with_velocities(100, 10)
            .validate()
            .is_err());
        assert!(Region::new(sample(100, 44100))
            .with_window(0, 200)
            .validate()
            .is_err());
        assert!(Region::new(sample(100, 44100))
            .with_loop(LoopMode::LoopContinuous, 50, 40)
            .validate()
            .is_err());
        assert!(Region::new(sample(100, 44100))
            .with_loop(LoopMode::LoopSustain, 10, 90)
            .validate()
            .is_ok());
        assert!(Region::new(sample(0, 44100)).validate().is_err());
    }
}
