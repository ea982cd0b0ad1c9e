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

//! Instrument loading and sample caching.
//!
//! Samples are decoded entirely into memory before an instrument is handed to
//! the audio thread. The cache only holds the samples of the most recently
//! loaded instrument, so a replaced instrument's data is freed once it is
//! dropped.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};
use tracing::{debug, info};

use super::error::InstrumentError;
use super::region::{Region, SampleData};
use super::Instrument;
use crate::config::instrument::InstrumentDefinition;

/// Loads instruments from definitions, caching decoded samples by path.
#[derive(Default)]
pub struct InstrumentLoader {
    cache: HashMap<PathBuf, SampleData>,
}

impl InstrumentLoader {
    /// Creates a new loader with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an instrument definition file and every sample it references.
    /// Sample paths are resolved relative to the definition's directory.
    pub fn load(&mut self, path: &Path) -> Result<Instrument, InstrumentError> {
        let definition = InstrumentDefinition::deserialize(path)?;
        let base_path = path.parent().unwrap_or_else(|| Path::new("."));
        let fallback_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.load_definition(&definition, base_path, &fallback_name)
    }

    /// Builds an instrument from an already parsed definition. On success, cached
    /// samples that the new instrument doesn't use are evicted.
    pub fn load_definition(
        &mut self,
        definition: &InstrumentDefinition,
        base_path: &Path,
        fallback_name: &str,
    ) -> Result<Instrument, InstrumentError> {
        let default_envelope = definition.envelope();
        let mut regions = Vec::with_capacity(definition.regions().len());
        let mut used = HashSet::new();

        for region_definition in definition.regions() {
            let file = Path::new(region_definition.sample());
            let full_path = if file.is_absolute() {
                file.to_path_buf()
            } else {
                base_path.join(file)
            };
            let sample = self.load_sample(&full_path)?;
            used.insert(full_path);

            let (lo_key, hi_key) = region_definition.key_range();
            let (lo_vel, hi_vel) = region_definition.velocity_range();
            let window = region_definition.window(sample.len());
            let (loop_start, loop_end) = region_definition.loop_points(window);

            regions.push(
                Region::new(sample)
                    .with_keys(lo_key, hi_key)
                    .with_velocities(lo_vel, hi_vel)
                    .with_pitch_keycenter(region_definition.pitch_keycenter())
                    .with_volume(region_definition.volume())
                    .with_window(window.0, window.1)
                    .with_loop(region_definition.loop_mode(), loop_start, loop_end)
                    .with_envelope(region_definition.envelope(default_envelope)),
            );
        }

        let name = definition.name().unwrap_or(fallback_name);
        let instrument = Instrument::new(name, regions)?;

        let cached = self.cache.len();
        self.cache.retain(|path, _| used.contains(path));
        if self.cache.len() < cached {
            debug!(evicted = cached - self.cache.len(), "Evicted unused samples");
        }

        info!(
            name = instrument.name(),
            regions = instrument.regions().len(),
            memory_kb = self.total_memory_usage() / 1024,
            "Instrument loaded"
        );
        Ok(instrument)
    }

    /// Decodes a WAV file into mono sample data. Returns a cached copy if the
    /// path has already been loaded.
    pub fn load_sample(&mut self, path: &Path) -> Result<SampleData, InstrumentError> {
        if let Some(sample) = self.cache.get(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(sample.clone());
        }

        if !path.exists() {
            return Err(InstrumentError::MissingSample {
                path: path.to_path_buf(),
            });
        }

        let decode_error = |source| InstrumentError::Decode {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = WavReader::open(path).map_err(decode_error)?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(decode_error)?,
            SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|s| s as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(decode_error)?
            }
        };

        let frames = downmix(&interleaved, spec.channels as usize);
        if frames.is_empty() {
            return Err(InstrumentError::EmptySample {
                path: path.to_path_buf(),
            });
        }

        let sample = SampleData::new(frames, spec.sample_rate);
        info!(
            path = ?path,
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            frames = sample.len(),
            memory_kb = sample.memory_size() / 1024,
            "Sample loaded"
        );
        self.cache.insert(path.to_path_buf(), sample.clone());
        Ok(sample)
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(|s| s.memory_size()).sum()
    }

    /// Drops every cached sample. Instruments already built keep their data.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

/// Averages interleaved channels into a single channel.
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
