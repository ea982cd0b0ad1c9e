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

//! The synthesizer engine and its thread-safe control handle.
//!
//! [`Synth`] lives on the audio thread and does all rendering. [`SynthHandle`]
//! is cloned freely across control threads. State changes reach the audio
//! thread through a command channel that is drained at the start of each render.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::synth::{
    DEFAULT_ARP_INTERVAL, DEFAULT_BUFFER_SIZE, DEFAULT_MASTER_GAIN, DEFAULT_MAX_VOICES,
    DEFAULT_SAMPLE_RATE,
};
use crate::effects::{
    ChorusSettings, DelaySettings, Effect, EffectsChain, EffectsSettings, EqualizerSettings,
    LpfSettings, ReverbSettings,
};
use crate::events::{EventBus, SynthEvent};
use crate::instrument::{Instrument, InstrumentError, InstrumentLoader};
use crate::player::{Player, VoiceMeters};
use crate::schedule::{ArpEvent, ArpPattern, Arpeggiator, Harmony, HarmonyType};

/// Retired instruments waiting to be dropped by a control thread.
const RETIRED_CAPACITY: usize = 8;

/// Resolved engine settings.
#[derive(Clone, Debug, PartialEq)]
pub struct SynthSettings {
    pub sample_rate: u32,
    /// Frames rendered per block. Larger renders are split into blocks.
    pub buffer_size: usize,
    pub max_voices: usize,
    pub master_gain: f32,
    pub effects: EffectsSettings,
    pub harmony: HarmonyType,
    pub arp_enabled: bool,
    pub arp_pattern: ArpPattern,
    pub arp_interval: Duration,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_voices: DEFAULT_MAX_VOICES,
            master_gain: DEFAULT_MASTER_GAIN,
            effects: EffectsSettings::default(),
            harmony: HarmonyType::None,
            arp_enabled: false,
            arp_pattern: ArpPattern::Up,
            arp_interval: DEFAULT_ARP_INTERVAL,
        }
    }
}

/// State changes applied by the audio thread.
enum Command {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    StopAll,
    LoadInstrument(Arc<Instrument>),
    SetLpf(LpfSettings),
    SetEqualizer(EqualizerSettings),
    SetChorus(ChorusSettings),
    SetDelay(DelaySettings),
    SetReverb(ReverbSettings),
    ResetEffects,
    SetMasterGain(f32),
}

/// Where the notes of a held root were sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    Player,
    Arpeggiator,
}

#[derive(Clone, Copy, Debug)]
struct HeldRoot {
    route: Route,
    velocity: u8,
}

/// State shared between the engine and every handle.
struct Shared {
    harmony: Harmony,
    arpeggiator: Arpeggiator,
    /// Routing of every externally held root. Locked around harmony updates so
    /// a root's note-on and note-off always agree on their destination.
    routes: Mutex<HashMap<u8, HeldRoot>>,
    meters: Arc<VoiceMeters>,
    events: EventBus,
    loader: Mutex<InstrumentLoader>,
}

/// The audio-thread side of the synthesizer.
pub struct Synth {
    sample_rate: u32,
    buffer_size: usize,
    master_gain: f32,
    player: Player,
    effects: EffectsChain,
    commands: Receiver<Command>,
    retired: Sender<Arc<Instrument>>,
    shared: Arc<Shared>,
    arp_events: Vec<ArpEvent>,
}

impl Synth {
    /// Creates the engine and a handle for controlling it.
    pub fn new(settings: SynthSettings) -> (Synth, SynthHandle) {
        let mut settings = settings;
        if settings.sample_rate == 0 {
            warn!("Sample rate of zero requested, using 1");
            settings.sample_rate = 1;
        }
        settings.buffer_size = settings.buffer_size.max(1);

        let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
        let (retired_tx, retired_rx) = crossbeam_channel::bounded(RETIRED_CAPACITY);

        let player = Player::new(settings.sample_rate, settings.max_voices);
        let shared = Arc::new(Shared {
            harmony: Harmony::new(settings.harmony),
            arpeggiator: Arpeggiator::new(
                settings.sample_rate,
                settings.arp_enabled,
                settings.arp_pattern,
                settings.arp_interval,
            ),
            routes: Mutex::new(HashMap::new()),
            meters: player.meters(),
            events: EventBus::new(),
            loader: Mutex::new(InstrumentLoader::new()),
        });

        info!(
            sample_rate = settings.sample_rate,
            buffer_size = settings.buffer_size,
            max_voices = settings.max_voices,
            "Synth created"
        );

        let synth = Synth {
            sample_rate: settings.sample_rate,
            buffer_size: settings.buffer_size,
            master_gain: settings.master_gain,
            player,
            effects: EffectsChain::new(settings.sample_rate, &settings.effects),
            commands: commands_rx,
            retired: retired_tx,
            shared: shared.clone(),
            arp_events: Vec::with_capacity(Arpeggiator::event_capacity(
                settings.buffer_size,
                settings.sample_rate,
            )),
        };
        let handle = SynthHandle {
            commands: commands_tx,
            retired: retired_rx,
            shared,
        };
        (synth, handle)
    }

    /// Fills `out` with the next block of mono audio.
    pub fn render(&mut self, out: &mut [f32]) {
        self.drain_commands();
        for block in out.chunks_mut(self.buffer_size) {
            self.render_block(block);
        }
    }

    /// Renders a fixed number of frames into a new buffer.
    pub fn render_offline(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        self.render(&mut out);
        out
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The current effect settings as seen by the audio thread.
    pub fn effects(&self) -> EffectsSettings {
        self.effects.settings()
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::NoteOn { note, velocity } => self.player.note_on(note, velocity),
                Command::NoteOff { note } => self.player.note_off(note),
                Command::StopAll => self.player.stop_all(),
                Command::LoadInstrument(instrument) => {
                    if let Some(previous) = self.player.load_instrument(instrument) {
                        self.retire(previous);
                    }
                    self.effects.reset();
                }
                Command::SetLpf(settings) => self.effects.set_lpf(settings),
                Command::SetEqualizer(settings) => self.effects.set_equalizer(settings),
                Command::SetChorus(settings) => self.effects.set_chorus(settings),
                Command::SetDelay(settings) => self.effects.set_delay(settings),
                Command::SetReverb(settings) => self.effects.set_reverb(settings),
                Command::ResetEffects => self.effects.reset(),
                Command::SetMasterGain(gain) => self.master_gain = gain,
            }
        }
    }

    /// Hands an instrument back to the control side so its sample data is not
    /// freed on the audio thread.
    fn retire(&mut self, instrument: Arc<Instrument>) {
        if let Err(TrySendError::Full(instrument) | TrySendError::Disconnected(instrument)) =
            self.retired.try_send(instrument)
        {
            warn!(
                name = instrument.name(),
                "Retired instrument queue unavailable, dropping on audio thread"
            );
        }
    }

    /// Renders one block, splitting it at each arpeggiator event so notes start
    /// on their exact frame.
    fn render_block(&mut self, out: &mut [f32]) {
        self.arp_events.clear();
        self.shared
            .arpeggiator
            .process_buffer(out.len(), &mut self.arp_events);

        let mut cursor = 0;
        for index in 0..self.arp_events.len() {
            let event = self.arp_events[index];
            let offset = event.offset().min(out.len());
            if offset > cursor {
                self.player.generate_samples(&mut out[cursor..offset]);
                cursor = offset;
            }
            match event {
                ArpEvent::NoteOn { note, velocity, .. } => self.player.note_on(note, velocity),
                ArpEvent::NoteOff { note, .. } => self.player.note_off(note),
            }
        }
        if cursor < out.len() {
            self.player.generate_samples(&mut out[cursor..]);
        }

        self.effects.process(out);
        for sample in out.iter_mut() {
            *sample = (*sample * self.master_gain).tanh();
        }
    }
}

impl std::fmt::Debug for Synth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synth")
            .field("sample_rate", &self.sample_rate)
            .field("buffer_size", &self.buffer_size)
            .field("master_gain", &self.master_gain)
            .field("player", &self.player)
            .finish()
    }
}

/// The control side of the synthesizer. Every method is safe to call from any
/// thread and never waits on the audio thread.
#[derive(Clone)]
pub struct SynthHandle {
    commands: Sender<Command>,
    retired: Receiver<Arc<Instrument>>,
    shared: Arc<Shared>,
}

impl SynthHandle {
    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Synth is gone, dropping command");
        }
    }

    /// Starts a note. The note is expanded by the harmony and then either held
    /// by the arpeggiator or played directly. A velocity of zero stops the note.
    pub fn note_on(&self, note: u8, velocity: u8) {
        if velocity == 0 {
            self.note_off(note);
            return;
        }
        let note = note.min(127);
        let velocity = velocity.min(127);

        let mut routes = self.shared.routes.lock();
        let notes = self.shared.harmony.note_on(note);
        let route = if self.shared.arpeggiator.is_enabled() {
            Route::Arpeggiator
        } else {
            Route::Player
        };
        routes.insert(note, HeldRoot { route, velocity });
        self.start_notes(route, &notes, velocity);
        debug!(note, velocity, route = ?route, "Note on");
    }

    /// Stops a note and every harmony note that was issued for it.
    pub fn note_off(&self, note: u8) {
        let note = note.min(127);
        let mut routes = self.shared.routes.lock();
        let notes = self.shared.harmony.note_off(note);
        let route = match routes.remove(&note) {
            Some(held) => held.route,
            None => Route::Player,
        };
        self.stop_notes(route, &notes);
        debug!(note, route = ?route, "Note off");
    }

    fn start_notes(&self, route: Route, notes: &[u8], velocity: u8) {
        for note in notes {
            match route {
                Route::Player => self.send(Command::NoteOn {
                    note: *note,
                    velocity,
                }),
                Route::Arpeggiator => self.shared.arpeggiator.note_on(*note, velocity),
            }
        }
    }

    fn stop_notes(&self, route: Route, notes: &[u8]) {
        for note in notes {
            match route {
                Route::Player => self.send(Command::NoteOff { note: *note }),
                Route::Arpeggiator => self.shared.arpeggiator.note_off(*note),
            }
        }
    }

    /// Releases every voice and forgets every held note.
    pub fn stop_all(&self) {
        let mut routes = self.shared.routes.lock();
        routes.clear();
        self.shared.harmony.clear();
        self.shared.arpeggiator.clear();
        self.send(Command::StopAll);
        info!("All notes stopped");
    }

    /// Swaps in a new instrument. Every sounding voice is discarded.
    pub fn load_instrument(&self, instrument: Arc<Instrument>) {
        self.collect_retired();
        let event = SynthEvent::InstrumentLoaded {
            name: instrument.name().to_string(),
            regions: instrument.regions().len(),
        };
        self.send(Command::LoadInstrument(instrument));
        self.shared.events.publish(event);
    }

    /// Loads an instrument definition and swaps it in. On failure the current
    /// instrument stays active and a failure event is published.
    pub fn load_instrument_from_path(&self, path: &Path) -> Result<(), InstrumentError> {
        let result = self.shared.loader.lock().load(path);
        match result {
            Ok(instrument) => {
                self.load_instrument(Arc::new(instrument));
                Ok(())
            }
            Err(e) => {
                error!(path = ?path, err = %e, "Failed to load instrument");
                self.shared.events.publish(SynthEvent::InstrumentLoadFailed {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Drops instruments the audio thread has finished with.
    pub fn collect_retired(&self) {
        for instrument in self.retired.try_iter() {
            debug!(name = instrument.name(), "Dropping retired instrument");
        }
    }

    pub fn set_lpf(&self, settings: LpfSettings) {
        self.send(Command::SetLpf(settings));
    }

    pub fn set_equalizer(&self, settings: EqualizerSettings) {
        self.send(Command::SetEqualizer(settings));
    }

    pub fn set_chorus(&self, settings: ChorusSettings) {
        self.send(Command::SetChorus(settings));
    }

    pub fn set_delay(&self, settings: DelaySettings) {
        self.send(Command::SetDelay(settings));
    }

    pub fn set_reverb(&self, settings: ReverbSettings) {
        self.send(Command::SetReverb(settings));
    }

    /// Clears every effect's delay lines and filter memory.
    pub fn reset_effects(&self) {
        self.send(Command::ResetEffects);
    }

    pub fn set_master_gain(&self, gain: f32) {
        self.send(Command::SetMasterGain(gain.max(0.0)));
    }

    pub fn harmony_type(&self) -> HarmonyType {
        self.shared.harmony.harmony_type()
    }

    /// Changes the harmony type. Held notes are reharmonized in place: only
    /// the notes that differ are stopped or started.
    pub fn set_harmony_type(&self, harmony_type: HarmonyType) {
        let routes = self.shared.routes.lock();
        let changes = self.shared.harmony.set_type(harmony_type);
        for change in changes {
            let Some(held) = routes.get(&change.root) else {
                continue;
            };
            self.stop_notes(held.route, &change.to_remove);
            self.start_notes(held.route, &change.to_add, held.velocity);
        }
        info!(harmony = %harmony_type, "Harmony changed");
    }

    pub fn arp_enabled(&self) -> bool {
        self.shared.arpeggiator.is_enabled()
    }

    /// Turns the arpeggiator on or off. Turning it off stops its sounding note
    /// on the next block. Notes already held keep their routing.
    pub fn set_arp_enabled(&self, enabled: bool) {
        self.shared.arpeggiator.set_enabled(enabled);
        info!(enabled, "Arpeggiator toggled");
    }

    pub fn set_arp_pattern(&self, pattern: ArpPattern) {
        self.shared.arpeggiator.set_pattern(pattern);
    }

    pub fn set_arp_interval(&self, interval: Duration) {
        self.shared.arpeggiator.set_interval(interval);
    }

    /// The peak envelope level for the note. Never blocks; the value may be up
    /// to one block old.
    pub fn envelope_level(&self, note: u8) -> f32 {
        self.shared.meters.envelope_level(note)
    }

    /// The number of sounding voices as of the last block.
    pub fn active_voices(&self) -> usize {
        self.shared.meters.active_voices()
    }

    /// Returns a receiver for synthesizer events.
    pub fn subscribe(&self) -> Receiver<SynthEvent> {
        self.shared.events.subscribe()
    }
}

impl std::fmt::Debug for SynthHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthHandle")
            .field("harmony", &self.shared.harmony)
            .field("arpeggiator", &self.shared.arpeggiator)
            .field("active_voices", &self.active_voices())
            .finish()
    }
}
