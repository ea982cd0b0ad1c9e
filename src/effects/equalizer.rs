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

//! Four-band peaking equalizer.

use serde::{Deserialize, Serialize};

use super::biquad::{Biquad, BiquadCoefficients};
use super::Effect;

/// Center frequencies of the bands, low to high.
pub const BAND_FREQUENCIES: [f32; 4] = [100.0, 500.0, 2000.0, 8000.0];

/// Gain in dB at a normalized band gain of +/-1.0.
pub const MAX_GAIN_DB: f32 = 12.0;

/// Bands with less gain than this are skipped entirely.
pub const GAIN_EPSILON_DB: f32 = 0.01;

const BAND_Q: f32 = 1.0;

/// Equalizer parameters. Each gain is normalized to -1.0..=1.0.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Default)]
#[serde(default)]
pub struct EqualizerSettings {
    pub enabled: bool,
    pub gains: [f32; 4],
}

/// Maps a normalized band gain onto dB.
pub fn gain_db(gain: f32) -> f32 {
    gain.clamp(-1.0, 1.0) * MAX_GAIN_DB
}

#[derive(Debug)]
struct Band {
    biquad: Biquad,
    active: bool,
}

/// Four peaking biquads in series.
#[derive(Debug)]
pub struct Equalizer {
    settings: EqualizerSettings,
    sample_rate: f32,
    bands: [Band; 4],
}

impl Equalizer {
    pub fn new(sample_rate: u32, settings: EqualizerSettings) -> Self {
        let mut equalizer = Self {
            settings,
            sample_rate: sample_rate as f32,
            bands: std::array::from_fn(|_| Band {
                biquad: Biquad::default(),
                active: false,
            }),
        };
        equalizer.update_bands();
        equalizer
    }

    pub fn settings(&self) -> EqualizerSettings {
        self.settings
    }

    /// Applies new settings. Re-enabling starts from clean filter memory.
    pub fn set_settings(&mut self, settings: EqualizerSettings) {
        if settings.enabled && !self.settings.enabled {
            self.reset();
        }
        self.settings = settings;
        self.update_bands();
    }

    /// Returns which bands currently do any filtering.
    pub fn active_bands(&self) -> [bool; 4] {
        std::array::from_fn(|i| self.bands[i].active)
    }

    fn update_bands(&mut self) {
        let nyquist = self.sample_rate / 2.0;
        for (i, band) in self.bands.iter_mut().enumerate() {
            let frequency = BAND_FREQUENCIES[i];
            let db = gain_db(self.settings.gains[i]);
            let was_active = band.active;
            band.active = db.abs() >= GAIN_EPSILON_DB && frequency < nyquist;
            if band.active {
                band.biquad.set_coefficients(BiquadCoefficients::peaking(
                    frequency,
                    BAND_Q,
                    db,
                    self.sample_rate,
                ));
                if !was_active {
                    band.biquad.reset();
                }
            }
        }
    }
}

impl Effect for Equalizer {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.settings.enabled {
            return;
        }
        for band in self.bands.iter_mut().filter(|band| band.active) {
            for sample in buffer.iter_mut() {
                *sample = band.biquad.process_sample(*sample);
            }
        }
    }

    fn reset(&mut self) {
        for band in self.bands.iter_mut() {
            band.biquad.reset();
        }
    }
}
