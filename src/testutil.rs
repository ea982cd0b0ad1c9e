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

/// Audio test utilities for generating test signals and validating results
pub mod audio_test_utils {
    use std::error::Error;
    use std::f32::consts::PI;
    use std::fs::File;
    use std::path::Path;
    use std::sync::Arc;

    use hound::{SampleFormat, WavSpec, WavWriter};

    use crate::config::instrument::LoopMode;
    use crate::instrument::{Instrument, Region, SampleData};

    /// Generate a sine wave
    pub fn generate_sine(
        frequency: f32,
        amplitude: f32,
        sample_rate: u32,
        duration_seconds: f32,
    ) -> Vec<f32> {
        let sample_count = (sample_rate as f32 * duration_seconds) as usize;
        (0..sample_count)
            .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    /// A deterministic broadband signal in [-0.5, 0.5] with no silent stretches.
    pub fn test_signal(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32;
                0.25 * (t * 0.05).sin() + 0.15 * (t * 0.31).sin() + 0.1 * (t * 1.7).cos()
            })
            .collect()
    }

    /// Calculate RMS (Root Mean Square) of a signal
    pub fn calculate_rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }

        let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
        (sum_squares / samples.len() as f32).sqrt()
    }

    /// Total signal energy (sum of squares)
    pub fn energy(samples: &[f32]) -> f64 {
        samples.iter().map(|&x| (x as f64) * (x as f64)).sum()
    }

    /// Writes mono frames as a 32-bit float WAV, copying each frame to every channel.
    pub fn write_wav(
        path: &Path,
        frames: &[f32],
        sample_rate: u32,
        channels: u16,
    ) -> Result<(), Box<dyn Error>> {
        let mut writer = WavWriter::new(
            File::create(path)?,
            WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            },
        )?;
        for frame in frames {
            for _ in 0..channels {
                writer.write_sample(*frame)?;
            }
        }
        writer.finalize()?;
        Ok(())
    }

    fn instrument(name: &str, region: Region) -> Arc<Instrument> {
        Arc::new(Instrument::new(name, vec![region]).expect("valid test instrument"))
    }

    /// One second of looping sine spanning the whole keyboard, centered on note 60.
    pub fn sine_instrument(frequency: f32, sample_rate: u32) -> Arc<Instrument> {
        let frames = generate_sine(frequency, 0.5, sample_rate, 1.0);
        let len = frames.len();
        instrument(
            "sine",
            Region::new(SampleData::new(frames, sample_rate)).with_loop(
                LoopMode::LoopContinuous,
                0,
                len,
            ),
        )
    }

    /// A non-looping constant signal spanning the whole keyboard.
    pub fn constant_instrument(value: f32, frames: u32, sample_rate: u32) -> Arc<Instrument> {
        instrument(
            "constant",
            Region::new(SampleData::new(vec![value; frames as usize], sample_rate)),
        )
    }

    /// A looping sine that only answers to one key.
    pub fn single_key_instrument(key: u8, sample_rate: u32) -> Arc<Instrument> {
        let frames = generate_sine(440.0, 0.5, sample_rate, 0.5);
        let len = frames.len();
        instrument(
            "single",
            Region::new(SampleData::new(frames, sample_rate))
                .with_keys(key, key)
                .with_pitch_keycenter(key)
                .with_loop(LoopMode::LoopContinuous, 0, len),
        )
    }
}
