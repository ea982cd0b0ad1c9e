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

//! Schroeder reverb: four damped feedback combs in parallel followed by two
//! all-pass diffusers in series.

use serde::{Deserialize, Serialize};

use super::Effect;

/// Base comb delays in milliseconds, before the preset multiplier.
const COMB_DELAYS_MS: [f32; 4] = [29.7, 37.1, 41.1, 43.7];

/// All-pass delays in milliseconds.
const ALLPASS_DELAYS_MS: [f32; 2] = [5.0, 1.7];

const ALLPASS_GAIN: f32 = 0.5;

/// Comb writes are clamped to this magnitude.
const COMB_LIMIT: f32 = 2.0;

/// Reverb character. Each preset sets delay scaling, feedback and damping together.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReverbType {
    #[default]
    Room,
    Hall,
    Plate,
    Church,
}

/// The coupled parameters behind a reverb preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbPreset {
    pub delay_multiplier: f32,
    pub feedback: f32,
    pub damping: f32,
}

impl ReverbType {
    pub const ALL: [ReverbType; 4] = [
        ReverbType::Room,
        ReverbType::Hall,
        ReverbType::Plate,
        ReverbType::Church,
    ];

    pub fn preset(self) -> ReverbPreset {
        match self {
            ReverbType::Room => ReverbPreset {
                delay_multiplier: 0.8,
                feedback: 0.70,
                damping: 0.40,
            },
            ReverbType::Hall => ReverbPreset {
                delay_multiplier: 1.2,
                feedback: 0.80,
                damping: 0.30,
            },
            ReverbType::Plate => ReverbPreset {
                delay_multiplier: 0.6,
                feedback: 0.75,
                damping: 0.10,
            },
            ReverbType::Church => ReverbPreset {
                delay_multiplier: 1.5,
                feedback: 0.86,
                damping: 0.25,
            },
        }
    }

    /// The largest delay multiplier of any preset, used to size the comb buffers.
    fn max_delay_multiplier() -> f32 {
        Self::ALL
            .iter()
            .map(|t| t.preset().delay_multiplier)
            .fold(0.0, f32::max)
    }
}

impl std::str::FromStr for ReverbType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "room" => Ok(ReverbType::Room),
            "hall" => Ok(ReverbType::Hall),
            "plate" => Ok(ReverbType::Plate),
            "church" => Ok(ReverbType::Church),
            _ => Err(format!("unknown reverb type {}", s)),
        }
    }
}

/// Reverb parameters.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct ReverbSettings {
    pub enabled: bool,
    /// Wet level, 0.0..=1.0.
    pub level: f32,
    #[serde(rename = "type")]
    pub reverb_type: ReverbType,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: 0.3,
            reverb_type: ReverbType::Room,
        }
    }
}

/// A feedback comb with a one-pole low-pass in the loop.
#[derive(Debug)]
struct CombFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    delay_length: usize,
    damping_state: f32,
}

impl CombFilter {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            write_pos: 0,
            delay_length: capacity.max(1),
            damping_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damping: f32) -> f32 {
        let len = self.buffer.len();
        let read_pos = (self.write_pos + len - self.delay_length) % len;
        let output = self.buffer[read_pos];
        self.damping_state = output * (1.0 - damping) + self.damping_state * damping;
        self.buffer[self.write_pos] =
            (input + self.damping_state * feedback).clamp(-COMB_LIMIT, COMB_LIMIT);
        self.write_pos = (self.write_pos + 1) % len;
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.damping_state = 0.0;
    }
}

#[derive(Debug)]
struct AllPassFilter {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl AllPassFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length.max(1)],
            write_pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.write_pos];
        let w = input + ALLPASS_GAIN * delayed;
        self.buffer[self.write_pos] = w;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        delayed - ALLPASS_GAIN * w
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[derive(Debug)]
pub struct Reverb {
    settings: ReverbSettings,
    sample_rate: f32,
    combs: [CombFilter; 4],
    all_passes: [AllPassFilter; 2],
    preset: ReverbPreset,
}

impl Reverb {
    pub fn new(sample_rate: u32, settings: ReverbSettings) -> Self {
        let sample_rate = sample_rate as f32;
        let max_multiplier = ReverbType::max_delay_multiplier();
        let mut reverb = Self {
            settings,
            sample_rate,
            combs: std::array::from_fn(|i| {
                CombFilter::new(
                    (COMB_DELAYS_MS[i] * max_multiplier * 0.001 * sample_rate).ceil() as usize,
                )
            }),
            all_passes: std::array::from_fn(|i| {
                AllPassFilter::new((ALLPASS_DELAYS_MS[i] * 0.001 * sample_rate).round() as usize)
            }),
            preset: settings.reverb_type.preset(),
        };
        reverb.set_settings(settings);
        reverb
    }

    pub fn settings(&self) -> ReverbSettings {
        self.settings
    }

    /// Applies new settings. Re-enabling starts from empty delay lines.
    pub fn set_settings(&mut self, settings: ReverbSettings) {
        if settings.enabled && !self.settings.enabled {
            self.reset();
        }
        self.settings = settings;
        self.preset = settings.reverb_type.preset();
        for (i, comb) in self.combs.iter_mut().enumerate() {
            let length = (COMB_DELAYS_MS[i] * self.preset.delay_multiplier * 0.001
                * self.sample_rate)
                .round() as usize;
            comb.delay_length = length.clamp(1, comb.buffer.len());
        }
    }

    /// Returns the comb delay lengths in samples.
    pub fn comb_lengths(&self) -> [usize; 4] {
        std::array::from_fn(|i| self.combs[i].delay_length)
    }
}

impl Effect for Reverb {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.settings.enabled {
            return;
        }
        let level = self.settings.level.clamp(0.0, 1.0);
        let ReverbPreset {
            feedback, damping, ..
        } = self.preset;

        for sample in buffer.iter_mut() {
            let input = *sample;
            let combed = self
                .combs
                .iter_mut()
                .map(|comb| comb.process(input, feedback, damping))
                .sum::<f32>()
                * 0.25;
            let wet = self
                .all_passes
                .iter_mut()
                .fold(combed, |acc, all_pass| all_pass.process(acc));
            *sample = input + wet * level;
        }
    }

    fn reset(&mut self) {
        for comb in self.combs.iter_mut() {
            comb.reset();
        }
        for all_pass in self.all_passes.iter_mut() {
            all_pass.reset();
        }
    }
}
