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
use std::path::Path;

use config::{Config, File};
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::envelope::EnvelopeSettings;

/// How a region's sample data loops during playback.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// Play straight through once.
    #[default]
    NoLoop,
    /// Loop between the loop points for as long as the voice sounds.
    LoopContinuous,
    /// Loop between the loop points until release, then play through to the end.
    LoopSustain,
}

/// A YAML representation of an instrument.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct InstrumentDefinition {
    /// The display name of the instrument.
    name: Option<String>,

    /// The default envelope for every region.
    #[serde(default)]
    envelope: EnvelopeDefinition,

    /// The sample regions, in match order.
    regions: Vec<RegionDefinition>,
}

impl InstrumentDefinition {
    /// Parse an instrument definition from a YAML file.
    pub fn deserialize(path: &Path) -> Result<InstrumentDefinition, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<InstrumentDefinition>()?)
    }

    /// Gets the instrument name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Gets the default envelope settings, merged over the built-in defaults.
    pub fn envelope(&self) -> EnvelopeSettings {
        self.envelope.apply(EnvelopeSettings::default())
    }

    /// Gets the region definitions.
    pub fn regions(&self) -> &[RegionDefinition] {
        &self.regions
    }
}

/// Envelope times in milliseconds. Any unset field keeps the value it overrides.
#[derive(Deserialize, Clone, Serialize, Debug, Default)]
pub struct EnvelopeDefinition {
    attack: Option<f32>,
    hold: Option<f32>,
    decay: Option<f32>,
    sustain: Option<f32>,
    /// Unset means hold the sustain level until note-off.
    hold2: Option<f32>,
    release: Option<f32>,
}

impl EnvelopeDefinition {
    /// Applies these values over the given base settings.
    pub fn apply(&self, base: EnvelopeSettings) -> EnvelopeSettings {
        EnvelopeSettings {
            attack_ms: self.attack.unwrap_or(base.attack_ms),
            hold_ms: self.hold.unwrap_or(base.hold_ms),
            decay_ms: self.decay.unwrap_or(base.decay_ms),
            sustain_level: self.sustain.unwrap_or(base.sustain_level),
            hold2_ms: self.hold2.or(base.hold2_ms),
            release_ms: self.release.unwrap_or(base.release_ms),
        }
    }
}

/// A YAML representation of a single region.
#[derive(Deserialize, Clone, Serialize, Debug)]
pub struct RegionDefinition {
    /// The sample file, relative to the instrument definition.
    sample: String,

    /// A single key. Sets the key range and the pitch center at once.
    key: Option<u8>,

    /// The lowest key this region responds to (default: 0).
    lo_key: Option<u8>,

    /// The highest key this region responds to (default: 127).
    hi_key: Option<u8>,

    /// The lowest velocity this region responds to (default: 0).
    lo_vel: Option<u8>,

    /// The highest velocity this region responds to (default: 127).
    hi_vel: Option<u8>,

    /// The key at which the sample plays at its recorded pitch (default: 60).
    pitch_keycenter: Option<u8>,

    /// First frame of the sample to play (default: 0).
    offset: Option<usize>,

    /// One past the last frame of the sample to play (default: end of file).
    end: Option<usize>,

    /// How the region loops.
    #[serde(default)]
    loop_mode: LoopMode,

    /// Loop start frame (default: offset).
    loop_start: Option<usize>,

    /// Loop end frame, exclusive (default: end).
    loop_end: Option<usize>,

    /// Linear gain applied to the region (default: 1.0).
    volume: Option<f32>,

    /// Envelope overrides for this region.
    envelope: Option<EnvelopeDefinition>,
}

/// Default pitch center when none is given.
pub const DEFAULT_PITCH_KEYCENTER: u8 = 60;

impl RegionDefinition {
    /// Gets the sample file.
    pub fn sample(&self) -> &str {
        &self.sample
    }

    /// Gets the inclusive key range.
    pub fn key_range(&self) -> (u8, u8) {
        match self.key {
            Some(key) => (self.lo_key.unwrap_or(key), self.hi_key.unwrap_or(key)),
            None => (self.lo_key.unwrap_or(0), self.hi_key.unwrap_or(127)),
        }
    }

    /// Gets the inclusive velocity range.
    pub fn velocity_range(&self) -> (u8, u8) {
        (self.lo_vel.unwrap_or(0), self.hi_vel.unwrap_or(127))
    }

    /// Gets the pitch center. A single `key` doubles as the pitch center.
    pub fn pitch_keycenter(&self) -> u8 {
        self.pitch_keycenter
            .or(self.key)
            .unwrap_or(DEFAULT_PITCH_KEYCENTER)
    }

    /// Gets the playback window, resolving the end against the sample length.
    pub fn window(&self, frames: usize) -> (usize, usize) {
        (self.offset.unwrap_or(0), self.end.unwrap_or(frames))
    }

    /// Gets the loop mode.
    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    /// Gets the loop points, defaulting to the playback window.
    pub fn loop_points(&self, window: (usize, usize)) -> (usize, usize) {
        (
            self.loop_start.unwrap_or(window.0),
            self.loop_end.unwrap_or(window.1),
        )
    }

    /// Gets the region gain.
    pub fn volume(&self) -> f32 {
        self.volume.unwrap_or(1.0)
    }

    /// Gets the region envelope, merged over the instrument default.
    pub fn envelope(&self, default: EnvelopeSettings) -> EnvelopeSettings {
        match &self.envelope {
            Some(envelope) => envelope.apply(default),
            None => default,
        }
    }
}

#[cfg(test)]
impl RegionDefinition {
    /// Creates a region covering the full key and velocity range (test only).
    pub fn new(sample: &str) -> RegionDefinition {
        RegionDefinition {
            sample: sample.to_string(),
            key: None,
            lo_key: None,
            hi_key: None,
            lo_vel: None,
            hi_vel: None,
            pitch_keycenter: None,
            offset: None,
            end: None,
            loop_mode: LoopMode::NoLoop,
            loop_start: None,
            loop_end: None,
            volume: None,
            envelope: None,
        }
    }
}
