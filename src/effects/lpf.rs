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

//! Resonant low-pass filter effect.

use serde::{Deserialize, Serialize};

use super::biquad::{Biquad, BiquadCoefficients};
use super::Effect;

const MIN_CUTOFF_HZ: f32 = 20.0;
const MAX_CUTOFF_HZ: f32 = 20_000.0;
const MIN_Q: f32 = 0.707;
const MAX_Q: f32 = 10.0;

/// Low-pass filter parameters, all normalized to 0.0..=1.0.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct LpfSettings {
    pub enabled: bool,
    /// Cutoff, mapped logarithmically from 20 Hz to the top of the usable band.
    pub cutoff: f32,
    /// Resonance, mapped linearly onto Q 0.707..=10.
    pub resonance: f32,
}

impl Default for LpfSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            cutoff: 1.0,
            resonance: 0.0,
        }
    }
}

/// Maps a normalized cutoff onto Hz. The top is capped at 0.45x the sample rate.
pub fn cutoff_hz(cutoff: f32, sample_rate: f32) -> f32 {
    let max = MAX_CUTOFF_HZ.min(0.45 * sample_rate);
    MIN_CUTOFF_HZ * (max / MIN_CUTOFF_HZ).powf(cutoff.clamp(0.0, 1.0))
}

/// Maps a normalized resonance onto filter Q.
pub fn resonance_q(resonance: f32) -> f32 {
    MIN_Q + (MAX_Q - MIN_Q) * resonance.clamp(0.0, 1.0)
}

/// A 2-pole low-pass filter.
#[derive(Debug)]
pub struct LowPassFilter {
    settings: LpfSettings,
    sample_rate: f32,
    biquad: Biquad,
}

impl LowPassFilter {
    pub fn new(sample_rate: u32, settings: LpfSettings) -> Self {
        let mut filter = Self {
            settings,
            sample_rate: sample_rate as f32,
            biquad: Biquad::default(),
        };
        filter.update_coefficients();
        filter
    }

    pub fn settings(&self) -> LpfSettings {
        self.settings
    }

    /// Applies new settings. Re-enabling starts from clean filter memory.
    pub fn set_settings(&mut self, settings: LpfSettings) {
        if settings.enabled && !self.settings.enabled {
            self.biquad.reset();
        }
        self.settings = settings;
        self.update_coefficients();
    }

    fn update_coefficients(&mut self) {
        self.biquad.set_coefficients(BiquadCoefficients::low_pass(
            cutoff_hz(self.settings.cutoff, self.sample_rate),
            resonance_q(self.settings.resonance),
            self.sample_rate,
        ));
    }
}

impl Effect for LowPassFilter {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.settings.enabled {
            return;
        }
        for sample in buffer.iter_mut() {
            *sample = self.biquad.process_sample(*sample);
        }
    }

    fn reset(&mut self) {
        self.biquad.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::audio_test_utils::{calculate_rms, generate_sine, test_signal};

    #[test]
    fn test_cutoff_mapping() {
        assert!((cutoff_hz(0.0, 44100.0) - 20.0).abs() < 1e-3);
        assert!((cutoff_hz(1.0, 44100.0) - 19845.0).abs() < 1.0);
        assert!((cutoff_hz(1.0, 96000.0) - 20000.0).abs() < 1.0);
        // Logarithmic: the midpoint is the geometric mean.
        let mid = cutoff_hz(0.5, 96000.0);
        assert!((mid - (20.0f32 * 20000.0).sqrt()).abs() < 1.0);
    }

    #[test]
    fn test_resonance_mapping() {
        assert_eq!(resonance_q(0.0), MIN_Q);
        assert_eq!(resonance_q(1.0), MAX_Q);
        assert_eq!(resonance_q(2.0), MAX_Q);
    }

    #[test]
    fn test_disabled_is_identity() {
        let mut filter = LowPassFilter::new(
            44100,
            LpfSettings {
                enabled: true,
                cutoff: 0.2,
                resonance: 0.8,
            },
        );
        let input = test_signal(1024);
        let mut buffer = input.clone();
        filter.process(&mut buffer);
        assert_ne!(buffer, input);

        filter.set_settings(LpfSettings {
            enabled: false,
            ..filter.settings()
        });
        let mut buffer = input.clone();
        filter.process(&mut buffer);
        assert_eq!(buffer, input);
    }

    #[test]
    fn test_low_cutoff_removes_highs() {
        let mut filter = LowPassFilter::new(
            44100,
            LpfSettings {
                enabled: true,
                cutoff: 0.3,
                resonance: 0.0,
            },
        );
        let mut buffer = generate_sine(10000.0, 0.5, 44100, 0.1);
        filter.process(&mut buffer);
        assert!(calculate_rms(&buffer[500..]) < 0.01);
    }

    #[test]
    fn test_reset_then_silence() {
        let mut filter = LowPassFilter::new(
            44100,
            LpfSettings {
                enabled: true,
                cutoff: 0.5,
                resonance: 1.0,
            },
        );
        let mut buffer = test_signal(2048);
        filter.process(&mut buffer);
        filter.reset();

        let mut silence = vec![0.0; 512];
        filter.process(&mut silence);
        assert!(silence.iter().all(|s| s.abs() < 1e-9));
    }
}
