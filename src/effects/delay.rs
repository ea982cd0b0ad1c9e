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

//! Feedback delay.

use serde::{Deserialize, Serialize};

use super::Effect;

const MIN_TIME_MS: f32 = 50.0;
const MAX_TIME_MS: f32 = 1000.0;

/// Feedback is scaled by this factor so the loop gain stays below one.
const FEEDBACK_SCALE: f32 = 0.9;

/// Every sample written into the delay line is clamped to this magnitude.
const WRITE_LIMIT: f32 = 2.0;

/// Delay parameters, normalized to 0.0..=1.0.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct DelaySettings {
    pub enabled: bool,
    /// Delay time, mapped linearly onto 50..=1000 ms.
    pub time: f32,
    /// Amount of the delayed signal fed back into the line.
    pub feedback: f32,
    /// Level of the delayed signal in the output.
    pub level: f32,
}

impl Default for DelaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            time: 0.25,
            feedback: 0.4,
            level: 0.35,
        }
    }
}

/// Maps a normalized time onto milliseconds.
pub fn time_ms(time: f32) -> f32 {
    MIN_TIME_MS + (MAX_TIME_MS - MIN_TIME_MS) * time.clamp(0.0, 1.0)
}

#[derive(Debug)]
pub struct Delay {
    settings: DelaySettings,
    sample_rate: f32,
    buffer: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,
}

impl Delay {
    pub fn new(sample_rate: u32, settings: DelaySettings) -> Self {
        let sample_rate = sample_rate as f32;
        let length = ((MAX_TIME_MS * 0.001 * sample_rate).ceil() as usize + 1).max(2);
        let mut delay = Self {
            settings,
            sample_rate,
            buffer: vec![0.0; length],
            write_pos: 0,
            delay_samples: 1,
        };
        delay.set_settings(settings);
        delay
    }

    pub fn settings(&self) -> DelaySettings {
        self.settings
    }

    /// Applies new settings. Re-enabling starts from a clean delay line.
    pub fn set_settings(&mut self, settings: DelaySettings) {
        if settings.enabled && !self.settings.enabled {
            self.reset();
        }
        self.settings = settings;
        self.delay_samples = ((time_ms(settings.time) * 0.001 * self.sample_rate).round()
            as usize)
            .clamp(1, self.buffer.len() - 1);
    }

    /// Returns the current delay length in samples.
    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }
}

impl Effect for Delay {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.settings.enabled {
            return;
        }
        let feedback = self.settings.feedback.clamp(0.0, 1.0) * FEEDBACK_SCALE;
        let level = self.settings.level.clamp(0.0, 1.0);
        let len = self.buffer.len();

        for sample in buffer.iter_mut() {
            let read_pos = (self.write_pos + len - self.delay_samples) % len;
            let delayed = self.buffer[read_pos];
            let input = *sample;
            self.buffer[self.write_pos] = (input + delayed * feedback).clamp(-WRITE_LIMIT, WRITE_LIMIT);
            self.write_pos = (self.write_pos + 1) % len;
            *sample = input + delayed * level;
        }
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::audio_test_utils::test_signal;

    fn enabled(time: f32, feedback: f32) -> DelaySettings {
        DelaySettings {
            enabled: true,
            time,
            feedback,
            level: 1.0,
        }
    }

    #[test]
    fn test_time_mapping() {
        assert_eq!(time_ms(0.0), 50.0);
        assert_eq!(time_ms(1.0), 1000.0);
        let delay = Delay::new(1000, enabled(0.0, 0.0));
        assert_eq!(delay.delay_samples(), 50);
    }

    #[test]
    fn test_tiny_sample_rate_keeps_a_usable_line() {
        for sample_rate in [0, 1] {
            let mut delay = Delay::new(sample_rate, enabled(0.5, 0.5));
            assert_eq!(delay.delay_samples(), 1);
            let mut buffer = vec![1.0; 8];
            delay.process(&mut buffer);
            assert!(buffer.iter().all(|s| s.is_finite()));
        }
    }

    #[test]
    fn test_echo_arrives_after_delay() {
        let mut delay = Delay::new(1000, enabled(0.0, 0.5));
        let mut buffer = vec![0.0; 200];
        buffer[0] = 1.0;
        delay.process(&mut buffer);

        assert_eq!(buffer[0], 1.0);
        assert_eq!(buffer[50], 1.0);
        // Feedback is 0.5 * 0.9.
        assert!((buffer[100] - 0.45).abs() < 1e-6);
        assert!((buffer[150] - 0.45 * 0.45).abs() < 1e-6);
        assert_eq!(buffer[25], 0.0);
    }

    #[test]
    fn test_full_feedback_stays_bounded() {
        let mut delay = Delay::new(1000, enabled(0.0, 1.0));
        let mut buffer = vec![1.0; 20_000];
        delay.process(&mut buffer);
        assert!(buffer.iter().all(|s| s.is_finite() && s.abs() <= 3.0));
    }

    #[test]
    fn test_disabled_is_identity() {
        let mut delay = Delay::new(44100, enabled(0.3, 0.7));
        let input = test_signal(4096);
        let mut buffer = input.clone();
        delay.process(&mut buffer);

        delay.set_settings(DelaySettings {
            enabled: false,
            ..delay.settings()
        });
        let mut buffer = input.clone();
        delay.process(&mut buffer);
        assert_eq!(buffer, input);
    }

    #[test]
    fn test_reset_then_silence() {
        let mut delay = Delay::new(44100, enabled(0.1, 0.9));
        let mut buffer = test_signal(8192);
        delay.process(&mut buffer);
        delay.reset();

        let mut silence = vec![0.0; 44100];
        delay.process(&mut silence);
        assert!(silence.iter().all(|s| s.abs() < 1e-9));
    }
}
