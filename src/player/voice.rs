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

//! A single sounding instance of a triggered region.

use crate::envelope::Envelope;
use crate::instrument::Region;
use crate::reader::SampleReader;

/// Represents an active voice playing one region.
pub struct Voice {
    /// Creation order, used to pick the oldest voice when stealing.
    serial: u64,
    /// The note that triggered this voice (for note-off matching).
    note: u8,
    /// Index of the region in the current instrument.
    region: usize,
    /// Region volume scaled by velocity.
    gain: f32,
    envelope: Envelope,
    reader: SampleReader,
    /// Set once the voice has been forced out with a short fade.
    fading: bool,
    finished: bool,
}

impl Voice {
    /// Creates a voice and starts its attack.
    pub fn new(
        serial: u64,
        note: u8,
        velocity: u8,
        region_index: usize,
        region: &Region,
        sample_rate: u32,
    ) -> Self {
        let mut envelope = Envelope::new(region.envelope(), sample_rate);
        envelope.trigger();
        Self {
            serial,
            note,
            region: region_index,
            gain: region.volume() * velocity as f32 / 127.0,
            envelope,
            reader: SampleReader::new(region, region.playback_step(note, sample_rate)),
            fading: false,
            finished: false,
        }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn region(&self) -> usize {
        self.region
    }

    /// Returns true once the envelope has started (or finished) releasing.
    pub fn is_releasing(&self) -> bool {
        self.envelope.is_releasing() || self.envelope.is_idle()
    }

    /// Returns true if the voice is being faded out to free its slot.
    pub fn is_fading(&self) -> bool {
        self.fading
    }

    /// Returns true once the voice can be removed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn envelope_level(&self) -> f32 {
        self.envelope.level()
    }

    /// Moves the voice into release.
    pub fn release(&mut self) {
        self.envelope.release();
        self.reader.release();
    }

    /// Fades the voice to silence within `samples`, shortening any release
    /// already in progress.
    pub fn fade_out(&mut self, samples: u32) {
        self.envelope.release_within(samples);
        self.reader.release();
        self.fading = true;
    }

    /// Restarts the attack from the current envelope level and rewinds the sample.
    pub fn retrigger(&mut self, velocity: u8, region: &Region) {
        self.fading = false;
        self.gain = region.volume() * velocity as f32 / 127.0;
        self.envelope.trigger();
        self.reader.restart();
    }

    /// Mixes this voice into `out`. Marks the voice finished when the sample
    /// runs out or the envelope goes idle.
    #[inline]
    pub fn render(&mut self, frames: &[f32], out: &mut [f32]) {
        if self.finished {
            return;
        }
        for sample in out.iter_mut() {
            if self.envelope.is_releasing() {
                self.reader.release();
            }
            let Some(value) = self.reader.next(frames) else {
                self.finished = true;
                return;
            };
            let level = self.envelope.next_level();
            if self.envelope.is_idle() {
                self.finished = true;
                return;
            }
            *sample += value * level * self.gain;
        }
    }
}

impl std::fmt::Debug for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Voice")
            .field("serial", &self.serial)
            .field("note", &self.note)
            .field("region", &self.region)
            .field("phase", &self.envelope.phase())
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EnvelopeSettings;
    use crate::instrument::SampleData;

    fn region(frames: usize) -> Region {
        Region::new(SampleData::new(vec![1.0; frames], 1000)).with_envelope(EnvelopeSettings {
            attack_ms: 0.0,
            hold_ms: 0.0,
            decay_ms: 0.0,
            sustain_level: 1.0,
            hold2_ms: None,
            release_ms: 10.0,
        })
    }

    #[test]
    fn test_voice_gain_follows_velocity() {
        let region = region(100);
        let mut voice = Voice::new(1, 60, 127, 0, &region, 1000);
        let mut out = vec![0.0; 4];
        voice.render(region.sample().frames(), &mut out);
        assert_eq!(out, vec![1.0; 4]);

        let mut quiet = Voice::new(2, 60, 0, 0, &region.clone().with_volume(0.5), 1000);
        let mut out = vec![0.0; 4];
        quiet.render(region.sample().frames(), &mut out);
        assert_eq!(out, vec![0.0; 4]);
    }

    #[test]
    fn test_voice_finishes_at_end_of_data() {
        let region = region(10);
        let mut voice = Voice::new(1, 60, 127, 0, &region, 1000);
        let mut out = vec![0.0; 32];
        voice.render(region.sample().frames(), &mut out);
        assert!(voice.is_finished());
        assert!(out[..10].iter().all(|s| *s == 1.0));
        assert!(out[10..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_voice_finishes_after_release() {
        let region = region(1000);
        let mut voice = Voice::new(1, 60, 127, 0, &region, 1000);
        let mut out = vec![0.0; 16];
        voice.render(region.sample().frames(), &mut out);
        assert!(!voice.is_finished());

        voice.release();
        assert!(voice.is_releasing());
        let mut out = vec![0.0; 16];
        voice.render(region.sample().frames(), &mut out);
        assert!(voice.is_finished());
        assert!(out.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_fade_out_cuts_release_short() {
        let region = region(1000);
        let mut voice = Voice::new(1, 60, 127, 0, &region, 1000);
        let mut out = vec![0.0; 4];
        voice.render(region.sample().frames(), &mut out);

        voice.release();
        voice.fade_out(2);
        assert!(voice.is_fading());
        let mut out = vec![0.0; 4];
        voice.render(region.sample().frames(), &mut out);
        assert_eq!(out[0], 0.5);
        assert!(voice.is_finished());
        assert!(out[1..].iter().all(|s| *s == 0.0));

        let mut again = Voice::new(2, 60, 127, 0, &region, 1000);
        again.fade_out(2);
        again.retrigger(127, &region);
        assert!(!again.is_fading());
    }
}
