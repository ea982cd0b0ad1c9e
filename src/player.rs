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

//! The polyphonic voice mixer.
//!
//! The player is owned by the audio thread. Its voice list is preallocated so
//! note events and rendering never allocate.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::instrument::Instrument;

mod voice;

pub use voice::Voice;

/// Length of the fade applied to a voice forced out at the hard voice limit.
const FADE_OUT_MS: f32 = 5.0;

/// Read-only view of the player state, safe to query from any thread.
/// Values are published once per rendered buffer and may be slightly stale.
pub struct VoiceMeters {
    levels: [AtomicU32; 128],
    active_voices: AtomicUsize,
}

impl VoiceMeters {
    fn new() -> Self {
        Self {
            levels: std::array::from_fn(|_| AtomicU32::new(0)),
            active_voices: AtomicUsize::new(0),
        }
    }

    /// The peak envelope level across every voice sounding the note.
    pub fn envelope_level(&self, note: u8) -> f32 {
        self.levels
            .get(note as usize)
            .map(|level| f32::from_bits(level.load(Ordering::Relaxed)))
            .unwrap_or(0.0)
    }

    /// The number of voices that were alive at the end of the last buffer.
    pub fn active_voices(&self) -> usize {
        self.active_voices.load(Ordering::Relaxed)
    }

    fn publish(&self, peaks: &[f32; 128], active_voices: usize) {
        for (level, peak) in self.levels.iter().zip(peaks.iter()) {
            level.store(peak.to_bits(), Ordering::Relaxed);
        }
        self.active_voices.store(active_voices, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for VoiceMeters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceMeters")
            .field("active_voices", &self.active_voices())
            .finish()
    }
}

/// Owns the active voice set and mixes it into output buffers.
pub struct Player {
    sample_rate: u32,
    max_voices: usize,
    /// Voice count above which the oldest voice is faded out quickly.
    voice_limit: usize,
    /// Preallocated slots. New voices are refused once every slot is taken.
    capacity: usize,
    fade_samples: u32,
    instrument: Option<Arc<Instrument>>,
    /// Active voices in creation order.
    voices: Vec<Voice>,
    next_serial: u64,
    meters: Arc<VoiceMeters>,
    peaks: [f32; 128],
}

impl Player {
    /// Creates a new player. Stolen voices keep sounding through their release
    /// and faded voices through their fade, so room for three times
    /// `max_voices` is reserved up front.
    pub fn new(sample_rate: u32, max_voices: usize) -> Self {
        let max_voices = max_voices.max(1);
        let capacity = max_voices * 3;
        Self {
            sample_rate,
            max_voices,
            voice_limit: max_voices * 2,
            capacity,
            fade_samples: ((FADE_OUT_MS * 0.001 * sample_rate as f32).round() as u32).max(1),
            instrument: None,
            voices: Vec::with_capacity(capacity),
            next_serial: 0,
            meters: Arc::new(VoiceMeters::new()),
            peaks: [0.0; 128],
        }
    }

    /// Gets a shared handle to the published voice meters.
    pub fn meters(&self) -> Arc<VoiceMeters> {
        self.meters.clone()
    }

    /// Gets the current instrument, if any.
    pub fn instrument(&self) -> Option<&Arc<Instrument>> {
        self.instrument.as_ref()
    }

    /// Swaps in a new instrument, discarding every current voice. Returns the
    /// previous instrument so the caller can drop it off the audio thread.
    pub fn load_instrument(&mut self, instrument: Arc<Instrument>) -> Option<Arc<Instrument>> {
        self.voices.clear();
        self.peaks = [0.0; 128];
        self.meters.publish(&self.peaks, 0);
        debug!(name = instrument.name(), "Instrument swapped");
        self.instrument.replace(instrument)
    }

    /// Starts one voice per matching region. A velocity of zero is a note-off.
    pub fn note_on(&mut self, note: u8, velocity: u8) {
        if velocity == 0 {
            self.note_off(note);
            return;
        }
        let Some(instrument) = self.instrument.clone() else {
            return;
        };

        for index in instrument.matching(note, velocity) {
            let region = &instrument.regions()[index];

            // A releasing voice for the same note and region is picked back up
            // so the attack continues from its current level.
            if let Some(voice) = self
                .voices
                .iter_mut()
                .find(|v| v.note() == note && v.region() == index && v.is_releasing())
            {
                voice.retrigger(velocity, region);
                continue;
            }

            if !self.make_room() {
                debug!(note, "No voice slot free, dropping note");
                continue;
            }
            let serial = self.next_serial;
            self.next_serial += 1;
            self.voices.push(Voice::new(
                serial,
                note,
                velocity,
                index,
                region,
                self.sample_rate,
            ));
        }
    }

    /// Frees a slot for a new voice and returns whether one is available.
    ///
    /// The oldest held voice is released once `max_voices` is reached. Past the
    /// hard voice limit the oldest voice still sounding normally is faded out
    /// over a few milliseconds. Voices are never cut off mid-sample, so when
    /// every slot is taken the new voice is refused.
    fn make_room(&mut self) -> bool {
        if self.voices.len() >= self.capacity {
            return false;
        }
        if self.voices.len() >= self.max_voices {
            if let Some(oldest) = self
                .voices
                .iter_mut()
                .filter(|v| !v.is_releasing())
                .min_by_key(|v| v.serial())
            {
                debug!(
                    note = oldest.note(),
                    max_voices = self.max_voices,
                    "Voice limit reached, releasing oldest"
                );
                oldest.release();
            }
        }
        if self.voices.len() >= self.voice_limit {
            if let Some(oldest) = self
                .voices
                .iter_mut()
                .filter(|v| !v.is_fading())
                .min_by_key(|v| v.serial())
            {
                debug!(note = oldest.note(), "Hard voice limit reached, fading oldest");
                oldest.fade_out(self.fade_samples);
            }
        }
        true
    }

    /// Releases every voice triggered by the note.
    pub fn note_off(&mut self, note: u8) {
        for voice in self.voices.iter_mut().filter(|v| v.note() == note) {
            voice.release();
        }
    }

    /// Releases every voice.
    pub fn stop_all(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.release();
        }
    }

    /// Renders every active voice into `out`, overwriting it, and removes
    /// voices that have finished.
    pub fn generate_samples(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        if let Some(instrument) = self.instrument.as_ref() {
            let regions = instrument.regions();
            for voice in self.voices.iter_mut() {
                if let Some(region) = regions.get(voice.region()) {
                    voice.render(region.sample().frames(), out);
                }
            }
        }
        self.voices.retain(|v| !v.is_finished());

        self.peaks = [0.0; 128];
        for voice in self.voices.iter() {
            let peak = &mut self.peaks[voice.note() as usize & 0x7f];
            *peak = peak.max(voice.envelope_level());
        }
        self.meters.publish(&self.peaks, self.voices.len());
    }

    /// The number of voices currently alive.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// The peak envelope level for the note as of the last rendered buffer.
    pub fn envelope_level(&self, note: u8) -> f32 {
        self.meters.envelope_level(note)
    }

    #[cfg(test)]
    fn voices(&self) -> &[Voice] {
        &self.voices
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("instrument", &self.instrument)
            .field("active_voices", &self.voices.len())
            .field("max_voices", &self.max_voices)
            .finish()
    }
}
