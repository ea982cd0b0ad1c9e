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
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::effects::EffectsSettings;
use crate::schedule::{ArpPattern, HarmonyType};
use crate::synth::SynthSettings;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_BUFFER_SIZE: usize = 512;
pub const DEFAULT_MAX_VOICES: usize = 32;
pub const DEFAULT_MASTER_GAIN: f32 = 0.8;
pub const DEFAULT_ARP_INTERVAL: Duration = Duration::from_millis(125);

/// A YAML representation of the synthesizer configuration.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct SynthConfig {
    /// The output device. Uses the system default when unset.
    device: Option<String>,

    /// Output sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// Frames rendered per block (default: 512).
    buffer_size: Option<usize>,

    /// Voices allowed before the oldest is released (default: 32).
    max_voices: Option<usize>,

    /// Gain applied after the effects chain (default: 0.8).
    master_gain: Option<f32>,

    /// Initial effect settings. Every effect is disabled by default.
    #[serde(default)]
    effects: EffectsSettings,

    /// Initial harmony type (default: none).
    #[serde(default)]
    harmony: HarmonyType,

    /// Initial arpeggiator settings.
    #[serde(default)]
    arpeggiator: ArpeggiatorConfig,
}

impl SynthConfig {
    /// Parse a synthesizer configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<SynthConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<SynthConfig>()?)
    }

    /// Returns the configured device name, if any.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Returns the output sample rate (default: 44100).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the block size in frames (default: 512).
    pub fn buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE).max(1)
    }

    /// Returns the voice limit (default: 32).
    pub fn max_voices(&self) -> usize {
        self.max_voices.unwrap_or(DEFAULT_MAX_VOICES).max(1)
    }

    /// Returns the master gain (default: 0.8).
    pub fn master_gain(&self) -> f32 {
        self.master_gain.unwrap_or(DEFAULT_MASTER_GAIN)
    }

    pub fn effects(&self) -> &EffectsSettings {
        &self.effects
    }

    pub fn harmony(&self) -> HarmonyType {
        self.harmony
    }

    pub fn arpeggiator(&self) -> &ArpeggiatorConfig {
        &self.arpeggiator
    }

    /// Resolves the configuration into engine settings.
    pub fn settings(&self) -> Result<SynthSettings, ConfigError> {
        if self.sample_rate() == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sample_rate",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(SynthSettings {
            sample_rate: self.sample_rate(),
            buffer_size: self.buffer_size(),
            max_voices: self.max_voices(),
            master_gain: self.master_gain(),
            effects: self.effects,
            harmony: self.harmony,
            arp_enabled: self.arpeggiator.enabled(),
            arp_pattern: self.arpeggiator.pattern(),
            arp_interval: self.arpeggiator.interval()?,
        })
    }
}

/// A YAML representation of the arpeggiator settings.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ArpeggiatorConfig {
    /// Whether the arpeggiator starts enabled (default: false).
    enabled: Option<bool>,

    /// The note order (default: up).
    pattern: Option<ArpPattern>,

    /// Time between steps, such as "125ms" (default: 125ms).
    interval: Option<String>,
}

impl ArpeggiatorConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn pattern(&self) -> ArpPattern {
        self.pattern.unwrap_or_default()
    }

    /// Returns the step interval (default: 125ms).
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        match &self.interval {
            Some(interval) => Ok(DurationString::from_string(interval.clone())
                .map_err(|e| ConfigError::InvalidDuration {
                    value: interval.clone(),
                    reason: e.to_string(),
                })?
                .into()),
            None => Ok(DEFAULT_ARP_INTERVAL),
        }
    }
}
