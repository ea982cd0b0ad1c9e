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

//! Sample-accurate arpeggiator driven by the audio thread.
//!
//! Time only moves when a buffer is processed, so triggers land on exact sample
//! positions no matter how the output device sizes its buffers.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Shortest allowed step between triggers.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// The order in which held notes are played.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArpPattern {
    #[default]
    Up,
    Down,
    UpDown,
    Random,
}

impl ArpPattern {
    pub const ALL: [ArpPattern; 4] = [
        ArpPattern::Up,
        ArpPattern::Down,
        ArpPattern::UpDown,
        ArpPattern::Random,
    ];
}

impl fmt::Display for ArpPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArpPattern::Up => "up",
            ArpPattern::Down => "down",
            ArpPattern::UpDown => "up_down",
            ArpPattern::Random => "random",
        };
        f.write_str(name)
    }
}

impl FromStr for ArpPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArpPattern::ALL
            .into_iter()
            .find(|p| p.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown arpeggiator pattern {s}"))
    }
}

/// A note event due inside the buffer being processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArpEvent {
    NoteOn { note: u8, velocity: u8, offset: usize },
    NoteOff { note: u8, offset: usize },
}

impl ArpEvent {
    /// The frame within the buffer at which the event applies.
    pub fn offset(&self) -> usize {
        match self {
            ArpEvent::NoteOn { offset, .. } | ArpEvent::NoteOff { offset, .. } => *offset,
        }
    }
}

struct ArpState {
    sample_rate: u32,
    enabled: bool,
    /// The enabled flag as of the last processed buffer.
    was_enabled: bool,
    pattern: ArpPattern,
    interval_samples: u64,
    velocity: u8,
    held: BTreeSet<u8>,
    /// Total frames processed.
    position: u64,
    next_trigger: Option<u64>,
    index: usize,
    ascending: bool,
    current: Option<u8>,
    rng: StdRng,
}

impl ArpState {
    /// Picks the next note according to the pattern and advances the index.
    fn advance(&mut self) -> Option<u8> {
        let count = self.held.len();
        if count == 0 {
            return None;
        }
        let slot = match self.pattern {
            ArpPattern::Up => {
                let slot = self.index % count;
                self.index = (slot + 1) % count;
                slot
            }
            ArpPattern::Down => {
                let step = self.index % count;
                self.index = (step + 1) % count;
                count - 1 - step
            }
            ArpPattern::UpDown => {
                let slot = self.index.min(count - 1);
                if count == 1 {
                    self.index = 0;
                } else if self.ascending {
                    if slot + 1 >= count {
                        self.ascending = false;
                        self.index = count - 2;
                    } else {
                        self.index = slot + 1;
                    }
                } else if slot == 0 {
                    self.ascending = true;
                    self.index = 1;
                } else {
                    self.index = slot - 1;
                }
                slot
            }
            ArpPattern::Random => self.rng.gen_range(0..count),
        };
        self.held.iter().nth(slot).copied()
    }

    fn restart_pattern(&mut self) {
        self.index = 0;
        self.ascending = true;
    }
}

/// Plays held notes one at a time at a fixed interval.
pub struct Arpeggiator {
    state: Mutex<ArpState>,
}

impl Arpeggiator {
    pub fn new(sample_rate: u32, enabled: bool, pattern: ArpPattern, interval: Duration) -> Self {
        Self::with_rng(
            sample_rate,
            enabled,
            pattern,
            interval,
            StdRng::from_entropy(),
        )
    }

    fn with_rng(
        sample_rate: u32,
        enabled: bool,
        pattern: ArpPattern,
        interval: Duration,
        rng: StdRng,
    ) -> Self {
        Self {
            state: Mutex::new(ArpState {
                sample_rate,
                enabled,
                was_enabled: false,
                pattern,
                interval_samples: interval_samples(interval, sample_rate),
                velocity: 100,
                held: BTreeSet::new(),
                position: 0,
                next_trigger: None,
                index: 0,
                ascending: true,
                current: None,
                rng,
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Takes effect at the start of the next processed buffer.
    pub fn set_enabled(&self, enabled: bool) {
        self.state.lock().enabled = enabled;
    }

    pub fn pattern(&self) -> ArpPattern {
        self.state.lock().pattern
    }

    pub fn set_pattern(&self, pattern: ArpPattern) {
        let mut state = self.state.lock();
        state.pattern = pattern;
        state.restart_pattern();
    }

    /// Changes the step length. A trigger that is already scheduled keeps its
    /// time; the new interval applies from the one after it.
    pub fn set_interval(&self, interval: Duration) {
        let mut state = self.state.lock();
        state.interval_samples = interval_samples(interval, state.sample_rate);
    }

    pub fn interval_samples(&self) -> u64 {
        self.state.lock().interval_samples
    }

    /// Adds a held note. The velocity is used for every following step.
    pub fn note_on(&self, note: u8, velocity: u8) {
        let mut state = self.state.lock();
        state.held.insert(note);
        state.velocity = velocity;
    }

    /// Removes a held note.
    pub fn note_off(&self, note: u8) {
        self.state.lock().held.remove(&note);
    }

    /// Removes every held note. The sounding note stops on the next buffer.
    pub fn clear(&self) {
        self.state.lock().held.clear();
    }

    /// The held notes, ascending.
    pub fn held_notes(&self) -> Vec<u8> {
        self.state.lock().held.iter().copied().collect()
    }

    /// Total frames processed so far.
    pub fn position(&self) -> u64 {
        self.state.lock().position
    }

    /// The most events a single `process_buffer` call over `frames` frames can
    /// produce: one note-off and one note-on per step, plus a stop note-off.
    pub fn event_capacity(frames: usize, sample_rate: u32) -> usize {
        let min_interval = interval_samples(MIN_INTERVAL, sample_rate) as usize;
        2 * (frames / min_interval + 1) + 1
    }

    /// Computes the events due within the next `frames` frames and appends them
    /// to `events`, then advances time by `frames`.
    pub fn process_buffer(&self, frames: usize, events: &mut Vec<ArpEvent>) {
        let mut state = self.state.lock();
        let start = state.position;
        let end = start + frames as u64;

        if state.enabled != state.was_enabled {
            state.was_enabled = state.enabled;
            if state.enabled {
                state.restart_pattern();
                state.next_trigger = Some(start);
            } else {
                if let Some(note) = state.current.take() {
                    events.push(ArpEvent::NoteOff { note, offset: 0 });
                }
                state.next_trigger = None;
            }
        }

        if state.enabled {
            if state.held.is_empty() {
                if let Some(note) = state.current.take() {
                    events.push(ArpEvent::NoteOff { note, offset: 0 });
                }
                state.next_trigger = None;
            } else if state.next_trigger.is_none() {
                state.restart_pattern();
                state.next_trigger = Some(start);
            }

            while let Some(trigger) = state.next_trigger.filter(|t| *t < end) {
                let offset = (trigger.max(start) - start) as usize;
                if let Some(note) = state.current.take() {
                    events.push(ArpEvent::NoteOff { note, offset });
                }
                if let Some(note) = state.advance() {
                    events.push(ArpEvent::NoteOn {
                        note,
                        velocity: state.velocity,
                        offset,
                    });
                    state.current = Some(note);
                }
                state.next_trigger = Some(trigger + state.interval_samples);
            }
        }

        state.position = end;
    }
}

fn interval_samples(interval: Duration, sample_rate: u32) -> u64 {
    let interval = interval.max(MIN_INTERVAL);
    ((interval.as_secs_f64() * sample_rate as f64).round() as u64).max(1)
}

impl fmt::Debug for Arpeggiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Arpeggiator")
            .field("enabled", &state.enabled)
            .field("pattern", &state.pattern)
            .field("interval_samples", &state.interval_samples)
            .field("held", &state.held)
            .field("position", &state.position)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;

    fn arp(pattern: ArpPattern) -> Arpeggiator {
        Arpeggiator::with_rng(
            SAMPLE_RATE,
            true,
            pattern,
            Duration::from_millis(100),
            StdRng::seed_from_u64(7),
        )
    }

    #[test]
    fn test_event_capacity_covers_large_buffers() {
        let arp = Arpeggiator::with_rng(
            SAMPLE_RATE,
            true,
            ArpPattern::Up,
            Duration::from_millis(1),
            StdRng::seed_from_u64(7),
        );
        arp.note_on(60, 100);
        arp.note_on(64, 100);

        let frames = 65536;
        let capacity = Arpeggiator::event_capacity(frames, SAMPLE_RATE);
        let mut events = Vec::new();
        arp.process_buffer(frames, &mut events);
        assert!(events.len() > 64);
        assert!(events.len() <= capacity);

        arp.set_enabled(false);
        events.clear();
        arp.process_buffer(frames, &mut events);
        assert!(events.len() <= capacity);
    }

    /// Runs the arpeggiator for `total` frames in `buffer` sized blocks and
    /// returns every event with its absolute frame position.
    fn run(arp: &Arpeggiator, buffer: usize, total: usize) -> Vec<(u64, ArpEvent)> {
        let mut all = Vec::new();
        let mut events = Vec::with_capacity(16);
        let mut processed = 0;
        while processed < total {
            let frames = buffer.min(total - processed);
            let start = arp.position();
            events.clear();
            arp.process_buffer(frames, &mut events);
            all.extend(events.iter().map(|e| (start + e.offset() as u64, *e)));
            processed += frames;
        }
        all
    }

    fn note_ons(events: &[(u64, ArpEvent)]) -> Vec<(u64, u8)> {
        events
            .iter()
            .filter_map(|(at, e)| match e {
                ArpEvent::NoteOn { note, .. } => Some((*at, *note)),
                ArpEvent::NoteOff { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_triggers_independent_of_buffer_size() {
        let expected: Vec<u64> = (0..10).map(|i| i * 4410).collect();
        for buffer in [64, 100, 128, 256, 333, 512, 1000, 1024] {
            let arp = arp(ArpPattern::Up);
            arp.note_on(60, 100);
            arp.note_on(64, 100);
            let triggers: Vec<u64> = note_ons(&run(&arp, buffer, 44100))
                .into_iter()
                .map(|(at, _)| at)
                .collect();
            assert_eq!(triggers, expected, "buffer size {buffer}");
        }
    }

    #[test]
    fn test_note_off_precedes_next_note_on() {
        let arp = arp(ArpPattern::Up);
        arp.note_on(60, 90);
        arp.note_on(67, 90);
        let events = run(&arp, 512, 4410 * 2 + 1);
        assert_eq!(
            events,
            vec![
                (
                    0,
                    ArpEvent::NoteOn {
                        note: 60,
                        velocity: 90,
                        offset: 0
                    }
                ),
                (4410, ArpEvent::NoteOff { note: 60, offset: 314 }),
                (
                    4410,
                    ArpEvent::NoteOn {
                        note: 67,
                        velocity: 90,
                        offset: 314
                    }
                ),
                (8820, ArpEvent::NoteOff { note: 67, offset: 116 }),
                (
                    8820,
                    ArpEvent::NoteOn {
                        note: 60,
                        velocity: 90,
                        offset: 116
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_disable_forces_note_off() {
        let arp = arp(ArpPattern::Up);
        arp.note_on(60, 100);
        let mut events = Vec::new();
        arp.process_buffer(512, &mut events);
        assert_eq!(events.len(), 1);

        arp.set_enabled(false);
        events.clear();
        arp.process_buffer(512, &mut events);
        assert_eq!(events, vec![ArpEvent::NoteOff { note: 60, offset: 0 }]);

        // Nothing more while disabled.
        events.clear();
        for _ in 0..20 {
            arp.process_buffer(512, &mut events);
        }
        assert!(events.is_empty());
    }

    #[test]
    fn test_enable_triggers_immediately() {
        let arp = Arpeggiator::new(SAMPLE_RATE, false, ArpPattern::Up, Duration::from_millis(100));
        arp.note_on(60, 100);
        let mut events = Vec::new();
        arp.process_buffer(1000, &mut events);
        assert!(events.is_empty());

        arp.set_enabled(true);
        arp.process_buffer(512, &mut events);
        assert_eq!(
            events,
            vec![ArpEvent::NoteOn {
                note: 60,
                velocity: 100,
                offset: 0
            }]
        );
    }

    #[test]
    fn test_first_held_note_triggers_immediately() {
        let arp = arp(ArpPattern::Up);
        let mut events = Vec::new();
        for _ in 0..5 {
            arp.process_buffer(512, &mut events);
        }
        assert!(events.is_empty());

        arp.note_on(62, 80);
        arp.process_buffer(512, &mut events);
        assert_eq!(
            events,
            vec![ArpEvent::NoteOn {
                note: 62,
                velocity: 80,
                offset: 0
            }]
        );

        // Releasing every key stops the sounding note.
        arp.note_off(62);
        events.clear();
        arp.process_buffer(512, &mut events);
        assert_eq!(events, vec![ArpEvent::NoteOff { note: 62, offset: 0 }]);
    }

    #[test]
    fn test_interval_change_applies_after_scheduled_trigger() {
        let arp = arp(ArpPattern::Up);
        arp.note_on(60, 100);
        let mut events = Vec::new();
        arp.process_buffer(1000, &mut events);

        // Trigger at 4410 was already scheduled with the old interval.
        arp.set_interval(Duration::from_millis(50));
        let events = run(&arp, 1000, 10100);
        let triggers: Vec<u64> = note_ons(&events).into_iter().map(|(at, _)| at).collect();
        assert_eq!(triggers, vec![4410, 6615, 8820, 11025]);
    }

    #[test]
    fn test_patterns() {
        let sequence = |pattern: ArpPattern| {
            let arp = arp(pattern);
            for note in [60, 64, 67] {
                arp.note_on(note, 100);
            }
            note_ons(&run(&arp, 512, 4410 * 8))
                .into_iter()
                .map(|(_, note)| note)
                .collect::<Vec<_>>()
        };

        assert_eq!(sequence(ArpPattern::Up), vec![60, 64, 67, 60, 64, 67, 60, 64]);
        assert_eq!(sequence(ArpPattern::Down), vec![67, 64, 60, 67, 64, 60, 67, 64]);
        assert_eq!(
            sequence(ArpPattern::UpDown),
            vec![60, 64, 67, 64, 60, 64, 67, 64]
        );

        let random = sequence(ArpPattern::Random);
        assert_eq!(random.len(), 8);
        assert!(random.iter().all(|n| [60, 64, 67].contains(n)));
    }

    #[test]
    fn test_up_down_with_two_notes_alternates() {
        let arp = arp(ArpPattern::UpDown);
        arp.note_on(60, 100);
        arp.note_on(72, 100);
        let notes: Vec<u8> = note_ons(&run(&arp, 256, 4410 * 6))
            .into_iter()
            .map(|(_, note)| note)
            .collect();
        assert_eq!(notes, vec![60, 72, 60, 72, 60, 72]);
    }

    #[test]
    fn test_parse_pattern() {
        assert_eq!("up_down".parse::<ArpPattern>(), Ok(ArpPattern::UpDown));
        assert_eq!("Random".parse::<ArpPattern>(), Ok(ArpPattern::Random));
        assert!("sideways".parse::<ArpPattern>().is_err());
    }
}
