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

//! The master effects chain.
//!
//! Effects always run in the order LPF -> EQ -> Chorus -> Delay -> Reverb. The delay
//! and reverb feedback paths are tuned for filtered input, so the order is fixed.

mod biquad;
mod chorus;
mod delay;
mod equalizer;
mod lpf;
mod reverb;

use serde::{Deserialize, Serialize};

pub use biquad::{Biquad, BiquadCoefficients};
pub use chorus::{Chorus, ChorusSettings};
pub use delay::{Delay, DelaySettings};
pub use equalizer::{Equalizer, EqualizerSettings, BAND_FREQUENCIES};
pub use lpf::{LowPassFilter, LpfSettings};
pub use reverb::{Reverb, ReverbPreset, ReverbSettings, ReverbType};

/// A buffer processor with private state.
pub trait Effect: Send {
    /// Processes the buffer in place. A disabled effect leaves it untouched.
    fn process(&mut self, buffer: &mut [f32]);

    /// Clears all internal state (filter memory, delay lines).
    fn reset(&mut self);
}

/// Settings for every effect in the chain.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EffectsSettings {
    pub lpf: LpfSettings,
    pub equalizer: EqualizerSettings,
    pub chorus: ChorusSettings,
    pub delay: DelaySettings,
    pub reverb: ReverbSettings,
}

/// The fixed-order effects chain. Each instance owns its own DSP state.
#[derive(Debug)]
pub struct EffectsChain {
    lpf: LowPassFilter,
    equalizer: Equalizer,
    chorus: Chorus,
    delay: Delay,
    reverb: Reverb,
}

impl EffectsChain {
    /// Creates the chain. All delay lines are allocated here, never while processing.
    pub fn new(sample_rate: u32, settings: &EffectsSettings) -> Self {
        Self {
            lpf: LowPassFilter::new(sample_rate, settings.lpf),
            equalizer: Equalizer::new(sample_rate, settings.equalizer),
            chorus: Chorus::new(sample_rate, settings.chorus),
            delay: Delay::new(sample_rate, settings.delay),
            reverb: Reverb::new(sample_rate, settings.reverb),
        }
    }

    pub fn settings(&self) -> EffectsSettings {
        EffectsSettings {
            lpf: self.lpf.settings(),
            equalizer: self.equalizer.settings(),
            chorus: self.chorus.settings(),
            delay: self.delay.settings(),
            reverb: self.reverb.settings(),
        }
    }

    pub fn set_lpf(&mut self, settings: LpfSettings) {
        self.lpf.set_settings(settings);
    }

    pub fn set_equalizer(&mut self, settings: EqualizerSettings) {
        self.equalizer.set_settings(settings);
    }

    pub fn set_chorus(&mut self, settings: ChorusSettings) {
        self.chorus.set_settings(settings);
    }

    pub fn set_delay(&mut self, settings: DelaySettings) {
        self.delay.set_settings(settings);
    }

    pub fn set_reverb(&mut self, settings: ReverbSettings) {
        self.reverb.set_settings(settings);
    }
}

impl Effect for EffectsChain {
    fn process(&mut self, buffer: &mut [f32]) {
        self.lpf.process(buffer);
        self.equalizer.process(buffer);
        self.chorus.process(buffer);
        self.delay.process(buffer);
        self.reverb.process(buffer);
    }

    fn reset(&mut self) {
        self.lpf.reset();
        self.equalizer.reset();
        self.chorus.reset();
        self.delay.reset();
        self.reverb.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::audio_test_utils::test_signal;

    fn all_enabled() -> EffectsSettings {
        EffectsSettings {
            lpf: LpfSettings {
                enabled: true,
                cutoff: 0.7,
                resonance: 0.3,
            },
            equalizer: EqualizerSettings {
                enabled: true,
                gains: [0.5, -0.25, 0.0, 0.75],
            },
            chorus: ChorusSettings {
                enabled: true,
                ..Default::default()
            },
            delay: DelaySettings {
                enabled: true,
                ..Default::default()
            },
            reverb: ReverbSettings {
                enabled: true,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_default_chain_is_identity() {
        let mut chain = EffectsChain::new(44100, &EffectsSettings::default());
        let input = test_signal(2048);
        let mut buffer = input.clone();
        chain.process(&mut buffer);
        assert_eq!(buffer, input);
    }

    #[test]
    fn test_chain_order_matches_manual_cascade() {
        let settings = all_enabled();
        let mut chain = EffectsChain::new(44100, &settings);

        let mut lpf = LowPassFilter::new(44100, settings.lpf);
        let mut equalizer = Equalizer::new(44100, settings.equalizer);
        let mut chorus = Chorus::new(44100, settings.chorus);
        let mut delay = Delay::new(44100, settings.delay);
        let mut reverb = Reverb::new(44100, settings.reverb);

        let input = test_signal(4096);
        let mut chained = input.clone();
        chain.process(&mut chained);

        let mut manual = input.clone();
        lpf.process(&mut manual);
        equalizer.process(&mut manual);
        chorus.process(&mut manual);
        delay.process(&mut manual);
        reverb.process(&mut manual);

        assert_eq!(chained, manual);
    }

    #[test]
    fn test_reset_then_silence() {
        let mut chain = EffectsChain::new(44100, &all_enabled());
        let mut buffer = test_signal(8192);
        chain.process(&mut buffer);
        chain.reset();

        let mut silence = vec![0.0; 4096];
        chain.process(&mut silence);
        assert!(silence.iter().all(|s| s.abs() < 1e-9));
    }

    #[test]
    fn test_disabling_every_effect_restores_identity() {
        let mut chain = EffectsChain::new(44100, &all_enabled());
        let mut warmup = test_signal(4096);
        chain.process(&mut warmup);

        let mut settings = chain.settings();
        settings.lpf.enabled = false;
        settings.equalizer.enabled = false;
        settings.chorus.enabled = false;
        settings.delay.enabled = false;
        settings.reverb.enabled = false;
        chain.set_lpf(settings.lpf);
        chain.set_equalizer(settings.equalizer);
        chain.set_chorus(settings.chorus);
        chain.set_delay(settings.delay);
        chain.set_reverb(settings.reverb);

        let input = test_signal(1024);
        let mut buffer = input.clone();
        chain.process(&mut buffer);
        assert_eq!(buffer, input);
    }
}
