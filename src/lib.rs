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

//! A real-time polyphonic sample-playback synthesizer.
//!
//! Instruments map note and velocity ranges onto decoded samples. Notes are
//! shaped by an AHDSHR envelope, mixed across voices, and run through a fixed
//! effects chain. Harmony and an audio-thread arpeggiator sit in front of the
//! voice mixer.

pub mod audio;
pub mod config;
pub mod effects;
pub mod envelope;
pub mod events;
pub mod instrument;
pub mod player;
pub mod reader;
pub mod schedule;
pub mod synth;
#[cfg(test)]
mod testutil;

pub use events::SynthEvent;
pub use instrument::{Instrument, InstrumentError, InstrumentLoader};
pub use synth::{Synth, SynthHandle, SynthSettings};
