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

//! Per-voice AHDSHR amplitude envelope.
//!
//! The envelope walks Attack -> Hold1 -> Decay -> Sustain/Hold2 -> Release -> Idle.
//! All ramps are linear and advance one step per output sample.

/// Level below which an envelope is considered silent.
pub const SILENCE_THRESHOLD: f32 = 1.0e-5;

/// Tolerance used when a linear ramp lands on its target.
const RAMP_EPSILON: f32 = 1.0e-6;

/// Timing and level settings for an envelope. Times are in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeSettings {
    /// Time to ramp from the start level to full scale.
    pub attack_ms: f32,
    /// Time to hold at full scale after the attack.
    pub hold_ms: f32,
    /// Time to ramp from full scale down to the sustain level.
    pub decay_ms: f32,
    /// Sustain level (0.0 to 1.0).
    pub sustain_level: f32,
    /// Time to hold the sustain level before releasing on its own.
    /// `None` holds until note-off.
    pub hold2_ms: Option<f32>,
    /// Time to ramp from the current level down to silence.
    pub release_ms: f32,
}

impl Default for EnvelopeSettings {
    fn default() -> Self {
        Self {
            attack_ms: 2.0,
            hold_ms: 0.0,
            decay_ms: 100.0,
            sustain_level: 1.0,
            hold2_ms: None,
            release_ms: 200.0,
        }
    }
}

/// The current phase of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopePhase {
    Attack,
    Hold1,
    Decay,
    Sustain,
    Hold2,
    Release,
    Idle,
}

/// Converts a duration in milliseconds to a whole number of samples.
fn ms_to_samples(ms: f32, sample_rate: f32) -> u32 {
    (ms.max(0.0) * 0.001 * sample_rate).round() as u32
}

/// Runtime state of a single envelope.
#[derive(Debug, Clone)]
pub struct Envelope {
    phase: EnvelopePhase,
    level: f32,
    /// Samples elapsed in the current phase (used by the hold phases).
    elapsed: u32,
    /// Level at which the release began.
    release_start: f32,

    attack_samples: u32,
    hold_samples: u32,
    decay_samples: u32,
    sustain_level: f32,
    hold2_samples: Option<u32>,
    release_samples: u32,
    /// Shortened release length set by a forced fade-out.
    forced_release: Option<u32>,
}

impl Envelope {
    /// Creates an idle envelope for the given settings.
    pub fn new(settings: &EnvelopeSettings, sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        Self {
            phase: EnvelopePhase::Idle,
            level: 0.0,
            elapsed: 0,
            release_start: 0.0,
            attack_samples: ms_to_samples(settings.attack_ms, sr),
            hold_samples: ms_to_samples(settings.hold_ms, sr),
            decay_samples: ms_to_samples(settings.decay_ms, sr),
            sustain_level: settings.sustain_level.clamp(0.0, 1.0),
            hold2_samples: settings.hold2_ms.map(|ms| ms_to_samples(ms, sr)),
            release_samples: ms_to_samples(settings.release_ms, sr),
            forced_release: None,
        }
    }

    /// Starts the attack from the current level.
    ///
    /// A fresh envelope starts from zero. An envelope that is releasing restarts
    /// from wherever the release has brought it, so the output stays continuous.
    pub fn trigger(&mut self) {
        self.phase = EnvelopePhase::Attack;
        self.elapsed = 0;
        self.forced_release = None;
    }

    /// Moves the envelope into its release phase.
    pub fn release(&mut self) {
        if matches!(self.phase, EnvelopePhase::Release | EnvelopePhase::Idle) {
            return;
        }
        self.phase = EnvelopePhase::Release;
        self.release_start = self.level;
        self.elapsed = 0;
    }

    /// Ramps to silence within at most `samples`, from the current level.
    ///
    /// Unlike [`Envelope::release`] this also shortens a release that is
    /// already in progress.
    pub fn release_within(&mut self, samples: u32) {
        if self.phase == EnvelopePhase::Idle {
            return;
        }
        let remaining = match self.forced_release {
            Some(forced) => forced.min(samples),
            None => self.release_samples.min(samples),
        };
        self.phase = EnvelopePhase::Release;
        self.release_start = self.level;
        self.elapsed = 0;
        self.forced_release = Some(remaining);
    }

    /// Returns the current phase.
    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    /// Returns the most recently produced level.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Returns true once the envelope has fully decayed.
    pub fn is_idle(&self) -> bool {
        self.phase == EnvelopePhase::Idle
    }

    /// Returns true if the envelope is in its release phase.
    pub fn is_releasing(&self) -> bool {
        self.phase == EnvelopePhase::Release
    }

    /// Advances the envelope by one sample and returns the new level.
    #[inline]
    pub fn next_level(&mut self) -> f32 {
        match self.phase {
            EnvelopePhase::Idle => {
                self.level = 0.0;
            }
            EnvelopePhase::Attack => {
                if self.attack_samples == 0 {
                    self.level = 1.0;
                } else {
                    self.level += 1.0 / self.attack_samples as f32;
                }
                if self.level >= 1.0 - RAMP_EPSILON {
                    self.level = 1.0;
                    if self.hold_samples == 0 {
                        self.enter(EnvelopePhase::Decay);
                    } else {
                        self.enter(EnvelopePhase::Hold1);
                    }
                }
            }
            EnvelopePhase::Hold1 => {
                self.level = 1.0;
                self.elapsed += 1;
                if self.elapsed >= self.hold_samples {
                    self.enter(EnvelopePhase::Decay);
                }
            }
            EnvelopePhase::Decay => {
                if self.decay_samples == 0 {
                    self.level = self.sustain_level;
                } else {
                    self.level -= (1.0 - self.sustain_level) / self.decay_samples as f32;
                }
                if self.level <= self.sustain_level + RAMP_EPSILON {
                    self.level = self.sustain_level;
                    match self.hold2_samples {
                        Some(0) => self.release(),
                        Some(_) => self.enter(EnvelopePhase::Hold2),
                        None => self.enter(EnvelopePhase::Sustain),
                    }
                }
                if self.level < SILENCE_THRESHOLD {
                    self.finish();
                }
            }
            EnvelopePhase::Sustain => {
                self.level = self.sustain_level;
                if self.level < SILENCE_THRESHOLD {
                    self.finish();
                }
            }
            EnvelopePhase::Hold2 => {
                self.level = self.sustain_level;
                self.elapsed += 1;
                if self.hold2_samples.is_some_and(|hold| self.elapsed >= hold) {
                    self.release();
                }
            }
            EnvelopePhase::Release => {
                let release_samples = self.forced_release.unwrap_or(self.release_samples);
                if release_samples == 0 {
                    self.level = 0.0;
                } else {
                    self.level -= self.release_start / release_samples as f32;
                }
                if self.level < SILENCE_THRESHOLD {
                    self.finish();
                }
            }
        }
        self.level
    }

    fn enter(&mut self, phase: EnvelopePhase) {
        self.phase = phase;
        self.elapsed = 0;
    }

    fn finish(&mut self) {
        self.phase = EnvelopePhase::Idle;
        self.level = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 1000;

    fn settings() -> EnvelopeSettings {
        EnvelopeSettings {
            attack_ms: 10.0,
            hold_ms: 5.0,
            decay_ms: 10.0,
            sustain_level: 0.5,
            hold2_ms: None,
            release_ms: 20.0,
        }
    }

    fn run(env: &mut Envelope, samples: usize) -> Vec<f32> {
        (0..samples).map(|_| env.next_level()).collect()
    }

    #[test]
    fn test_idle_until_triggered() {
        let mut env = Envelope::new(&settings(), SAMPLE_RATE);
        assert!(env.is_idle());
        assert_eq!(env.next_level(), 0.0);
    }

    #[test]
    fn test_attack_is_linear() {
        let mut env = Envelope::new(&settings(), SAMPLE_RATE);
        env.trigger();
        let levels = run(&mut env, 10);
        assert!((levels[0] - 0.1).abs() < 1e-6);
        assert!((levels[4] - 0.5).abs() < 1e-6);
        assert_eq!(levels[9], 1.0);
        assert_eq!(env.phase(), EnvelopePhase::Hold1);
    }

    #[test]
    fn test_full_shape_reaches_sustain() {
        let mut env = Envelope::new(&settings(), SAMPLE_RATE);
        env.trigger();
        // Attack (10) + hold (5) + decay (10).
        run(&mut env, 25);
        assert_eq!(env.phase(), EnvelopePhase::Sustain);
        assert!((env.level() - 0.5).abs() < 1e-6);

        // Sustain holds indefinitely until note-off.
        run(&mut env, 1000);
        assert_eq!(env.phase(), EnvelopePhase::Sustain);
        assert!((env.level() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_release_ramps_to_idle() {
        let mut env = Envelope::new(&settings(), SAMPLE_RATE);
        env.trigger();
        run(&mut env, 30);
        env.release();
        assert!(env.is_releasing());

        let levels = run(&mut env, 20);
        assert!(levels.windows(2).all(|w| w[1] <= w[0]));
        assert!(env.is_idle());
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn test_finite_hold2_releases_on_its_own() {
        let mut s = settings();
        s.hold2_ms = Some(5.0);
        let mut env = Envelope::new(&s, SAMPLE_RATE);
        env.trigger();
        run(&mut env, 25);
        assert_eq!(env.phase(), EnvelopePhase::Hold2);
        run(&mut env, 5);
        assert_eq!(env.phase(), EnvelopePhase::Release);
        run(&mut env, 20);
        assert!(env.is_idle());
    }

    #[test]
    fn test_retrigger_during_release_starts_from_current_level() {
        let mut env = Envelope::new(&settings(), SAMPLE_RATE);
        env.trigger();
        run(&mut env, 30);
        env.release();
        run(&mut env, 10);
        let level_before = env.level();
        assert!(level_before > 0.0);

        env.trigger();
        let next = env.next_level();
        assert_eq!(env.phase(), EnvelopePhase::Attack);
        // The attack continues upward from the release level instead of jumping to zero.
        assert!(next > level_before);
        assert!(next - level_before < 0.2);
    }

    #[test]
    fn test_zero_hold_goes_straight_to_decay() {
        let s = EnvelopeSettings {
            attack_ms: 2.0,
            hold_ms: 0.0,
            decay_ms: 4.0,
            sustain_level: 0.0,
            hold2_ms: None,
            release_ms: 10.0,
        };
        let mut env = Envelope::new(&s, SAMPLE_RATE);
        env.trigger();
        let levels = run(&mut env, 3);
        assert!((levels[0] - 0.5).abs() < 1e-6);
        assert_eq!(levels[1], 1.0);
        assert!((levels[2] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_zero_hold2_releases_after_decay() {
        let mut s = settings();
        s.hold_ms = 0.0;
        s.hold2_ms = Some(0.0);
        let mut env = Envelope::new(&s, SAMPLE_RATE);
        env.trigger();
        // Attack (10) + decay (10).
        let levels = run(&mut env, 20);
        assert!((levels[19] - 0.5).abs() < 1e-6);
        assert_eq!(env.phase(), EnvelopePhase::Release);
        assert!(env.next_level() < 0.5);
    }

    #[test]
    fn test_release_within_shortens_release() {
        let mut env = Envelope::new(&settings(), SAMPLE_RATE);
        env.trigger();
        run(&mut env, 30);
        env.release();
        run(&mut env, 2);
        let start = env.level();

        env.release_within(4);
        let levels = run(&mut env, 4);
        assert!(levels.windows(2).all(|w| w[1] <= w[0]));
        assert!(start - levels[0] <= start / 4.0 + 1e-6);
        assert!(env.is_idle());

        // A new attack goes back to the configured release length.
        env.trigger();
        run(&mut env, 30);
        env.release();
        run(&mut env, 4);
        assert!(env.is_releasing());
    }

    #[test]
    fn test_zero_sustain_goes_idle_after_decay() {
        let mut s = settings();
        s.sustain_level = 0.0;
        let mut env = Envelope::new(&s, SAMPLE_RATE);
        env.trigger();
        run(&mut env, 25);
        assert!(env.is_idle());
    }

    #[test]
    fn test_zero_length_phases() {
        let s = EnvelopeSettings {
            attack_ms: 0.0,
            hold_ms: 0.0,
            decay_ms: 0.0,
            sustain_level: 0.8,
            hold2_ms: None,
            release_ms: 0.0,
        };
        let mut env = Envelope::new(&s, SAMPLE_RATE);
        env.trigger();
        assert_eq!(env.next_level(), 1.0);
        run(&mut env, 3);
        assert!((env.level() - 0.8).abs() < 1e-6);
        env.release();
        assert_eq!(env.next_level(), 0.0);
        assert!(env.is_idle());
    }
}
