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

//! Single-voice chorus: a sine-modulated delay line mixed with the dry signal.

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use super::Effect;

const MIN_DELAY_MS: f32 = 7.0;
const MAX_DELAY_MS: f32 = 30.0;
const MIN_RATE_HZ: f32 = 0.1;
const MAX_RATE_HZ: f32 = 5.0;
const DRY_GAIN: f32 = 0.7;
const WET_GAIN: f32 = 0.5;

/// Chorus parameters, normalized to 0.0..=1.0.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct ChorusSettings {
    pub enabled: bool,
    /// Modulation depth. Also scales the wet level.
    pub depth: f32,
    /// LFO rate, mapped linearly onto 0.1..=5 Hz.
    pub rate: f32,
}

impl Default for ChorusSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            depth: 0.5,
            rate: 0.2,
        }
    }
}

/// Maps a normalized rate onto the LFO frequency in Hz.
pub fn rate_hz(rate: f32) -> f32 {
    MIN_RATE_HZ + (MAX_RATE_HZ - MIN_RATE_HZ) * rate.clamp(0.0, 1.0)
}

#[derive(Debug)]
pub struct Chorus {
    settings: ChorusSettings,
    sample_rate: f32,
    buffer: Vec<f32>,
    write_pos: usize,
    lfo_phase: f32,
    lfo_increment: f32,
}

impl Chorus {
    pub fn new(sample_rate: u32, settings: ChorusSettings) -> Self {
        let sample_rate = sample_rate as f32;
        // Two extra slots so the interpolated read never touches the write slot.
        let length = (MAX_DELAY_MS * 0.001 * sample_rate).ceil() as usize + 2;
        let mut chorus = Self {
            settings,
            sample_rate,
            buffer: vec![0.0; length],
            write_pos: 0,
            lfo_phase: 0.0,
            lfo_increment: 0.0,
        };
        chorus.set_settings(settings);
        chorus
    }

    pub fn settings(&self) -> ChorusSettings {
        self.settings
    }

    /// Applies new settings. Re-enabling starts from a clean delay line.
    pub fn set_settings(&mut self, settings: ChorusSettings) {
        if settings.enabled && !self.settings.enabled {
            self.reset();
        }
        self.settings = settings;
        self.lfo_increment = TAU * rate_hz(settings.rate) / self.sample_rate;
    }

    /// Reads the delay line `delay` samples behind the write position.
    #[inline]
    fn read(&self, delay: f32) -> f32 {
        let len = self.buffer.len();
        let position = self.write_pos as f32 - delay + len as f32;
        let index = position.floor();
        let frac = position - index;
        let i0 = index as usize % len;
        let i1 = (i0 + 1) % len;
        self.buffer[i0] * (1.0 - frac) + self.buffer[i1] * frac
    }
}

impl Effect for Chorus {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.settings.enabled {
            return;
        }
        let depth = self.settings.depth.clamp(0.0, 1.0);
        let sweep_ms = (MAX_DELAY_MS - MIN_DELAY_MS) * depth;
        let ms_to_samples = 0.001 * self.sample_rate;
        let len = self.buffer.len();

        for sample in buffer.iter_mut() {
            let dry = *sample;
            self.buffer[self.write_pos] = dry;

            let lfo = 0.5 + 0.5 * self.lfo_phase.sin();
            let delay = (MIN_DELAY_MS + sweep_ms * lfo) * ms_to_samples;
            let wet = self.read(delay);

            self.lfo_phase += self.lfo_increment;
            if self.lfo_phase >= TAU {
                self.lfo_phase -= TAU;
            }
            self.write_pos = (self.write_pos + 1) % len;

            *sample = dry * DRY_GAIN + wet * WET_GAIN * depth;
        }
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.lfo_phase = 0.0;
    }
}
