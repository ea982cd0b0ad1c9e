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
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;
use tracing_subscriber::EnvFilter;

use polysampler::audio;
use polysampler::config::SynthConfig;
use polysampler::effects::{ReverbSettings, ReverbType};
use polysampler::schedule::{ArpPattern, HarmonyType};
use polysampler::{InstrumentLoader, Synth, SynthHandle};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A polyphonic sample-playback synthesizer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Loads and verifies an instrument definition.
    Instrument {
        /// The path to the instrument definition.
        path: PathBuf,
    },
    /// Renders notes through an instrument into a WAV file.
    Render {
        /// The path to the instrument definition.
        instrument: PathBuf,
        /// The WAV file to write.
        output: PathBuf,
        /// The path to the synth config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The notes to hold, comma separated.
        #[arg(short, long, default_value = "60")]
        notes: String,
        /// The note velocity.
        #[arg(short, long, default_value_t = 100)]
        velocity: u8,
        /// How long to hold the notes, in seconds.
        #[arg(short, long, default_value_t = 2.0)]
        seconds: f32,
        /// How long to keep rendering after the notes are released, in seconds.
        #[arg(short, long, default_value_t = 1.0)]
        tail: f32,
    },
    /// Plays an instrument live, reading commands from stdin.
    Play {
        /// The path to the instrument definition.
        instrument: PathBuf,
        /// The path to the synth config.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Instrument { path } => {
            let mut loader = InstrumentLoader::new();
            let instrument = loader.load(&path)?;

            println!(
                "{} (regions: {}, sample memory: {} KB):",
                instrument.name(),
                instrument.regions().len(),
                loader.total_memory_usage() / 1024
            );
            for region in instrument.regions() {
                let (lo_key, hi_key) = region.key_range();
                let (lo_vel, hi_vel) = region.velocity_range();
                let (start, end) = region.window();
                println!(
                    "- keys {}-{} (center {}), velocity {}-{}, frames {}..{} @ {} Hz, {:?}",
                    lo_key,
                    hi_key,
                    region.pitch_keycenter(),
                    lo_vel,
                    hi_vel,
                    start,
                    end,
                    region.sample().sample_rate(),
                    region.loop_mode()
                );
            }
        }
        Commands::Render {
            instrument,
            output,
            config,
            notes,
            velocity,
            seconds,
            tail,
        } => {
            let config = load_config(config.as_deref())?;
            let settings = config.settings()?;
            let sample_rate = settings.sample_rate;
            let (mut synth, handle) = Synth::new(settings);
            handle.load_instrument_from_path(&instrument)?;

            let notes = parse_notes(&notes)?;
            for note in notes.iter() {
                handle.note_on(*note, velocity);
            }
            let mut rendered = synth.render_offline(seconds_to_frames(seconds, sample_rate));
            for note in notes.iter() {
                handle.note_off(*note);
            }
            rendered.extend(synth.render_offline(seconds_to_frames(tail, sample_rate)));

            write_wav(&output, &rendered, sample_rate)?;
            info!(
                path = ?output,
                frames = rendered.len(),
                sample_rate,
                "Render complete"
            );
        }
        Commands::Play { instrument, config } => {
            let config = load_config(config.as_deref())?;
            let (synth, handle) = Synth::new(config.settings()?);
            handle.load_instrument_from_path(&instrument)?;
            let output = audio::start_output(config.device(), synth)?;
            println!(
                "Playing {} through {} ({} Hz). Type \"help\" for commands.",
                instrument.display(),
                output.name(),
                output.sample_rate()
            );

            for line in io::stdin().lock().lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(PlayCommand::Quit) => break,
                    Ok(PlayCommand::Help) => println!("{}", HELP),
                    Ok(command) => apply_command(&handle, command),
                    Err(e) => println!("{}", e),
                }
            }
            handle.stop_all();
        }
    }

    Ok(())
}

const HELP: &str = "\
on <note> [velocity]   start a note
off <note>             stop a note
stop                   stop everything
harmony <type>         none, octave, fifth, major, minor
arp on|off             toggle the arpeggiator
arp pattern <pattern>  up, down, up_down, random
arp interval <time>    step length, such as 125ms
reverb off|<type>      room, hall, plate, church
gain <value>           master gain
quit                   exit";

fn load_config(path: Option<&Path>) -> Result<SynthConfig, Box<dyn Error>> {
    match path {
        Some(path) => Ok(SynthConfig::deserialize(path)?),
        None => Ok(SynthConfig::default()),
    }
}

fn seconds_to_frames(seconds: f32, sample_rate: u32) -> usize {
    (seconds.max(0.0) * sample_rate as f32) as usize
}

fn parse_notes(notes: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    notes
        .split(',')
        .map(|note| parse_note(note.trim()).map_err(Box::<dyn Error>::from))
        .collect()
}

fn parse_note(note: &str) -> Result<u8, String> {
    match note.parse::<u8>() {
        Ok(note) if note <= 127 => Ok(note),
        _ => Err(format!("invalid note {note}")),
    }
}

fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), Box<dyn Error>> {
    let mut writer = WavWriter::new(
        BufWriter::new(File::create(path)?),
        WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;
    for sample in samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// A command typed at the live prompt.
#[derive(Debug, PartialEq)]
enum PlayCommand {
    NoteOn(u8, u8),
    NoteOff(u8),
    Stop,
    Harmony(HarmonyType),
    Arp(bool),
    ArpPattern(ArpPattern),
    ArpInterval(Duration),
    Reverb(Option<ReverbType>),
    Gain(f32),
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<PlayCommand, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["on", note] => Ok(PlayCommand::NoteOn(parse_note(note)?, 100)),
        ["on", note, velocity] => {
            let velocity = parse_note(velocity).map_err(|_| format!("invalid velocity {velocity}"))?;
            Ok(PlayCommand::NoteOn(parse_note(note)?, velocity))
        }
        ["off", note] => Ok(PlayCommand::NoteOff(parse_note(note)?)),
        ["stop"] => Ok(PlayCommand::Stop),
        ["harmony", harmony] => Ok(PlayCommand::Harmony(harmony.parse()?)),
        ["arp", "on"] => Ok(PlayCommand::Arp(true)),
        ["arp", "off"] => Ok(PlayCommand::Arp(false)),
        ["arp", "pattern", pattern] => Ok(PlayCommand::ArpPattern(pattern.parse()?)),
        ["arp", "interval", interval] => {
            let interval = DurationString::from_string(interval.to_string())
                .map_err(|e| format!("invalid interval {interval}: {e}"))?;
            Ok(PlayCommand::ArpInterval(interval.into()))
        }
        ["reverb", "off"] => Ok(PlayCommand::Reverb(None)),
        ["reverb", reverb] => Ok(PlayCommand::Reverb(Some(reverb.parse()?))),
        ["gain", gain] => gain
            .parse()
            .map(PlayCommand::Gain)
            .map_err(|_| format!("invalid gain {gain}")),
        ["help"] => Ok(PlayCommand::Help),
        ["quit"] | ["exit"] => Ok(PlayCommand::Quit),
        _ => Err(format!("unknown command: {line}")),
    }
}

fn apply_command(handle: &SynthHandle, command: PlayCommand) {
    match command {
        PlayCommand::NoteOn(note, velocity) => handle.note_on(note, velocity),
        PlayCommand::NoteOff(note) => handle.note_off(note),
        PlayCommand::Stop => handle.stop_all(),
        PlayCommand::Harmony(harmony) => handle.set_harmony_type(harmony),
        PlayCommand::Arp(enabled) => handle.set_arp_enabled(enabled),
        PlayCommand::ArpPattern(pattern) => handle.set_arp_pattern(pattern),
        PlayCommand::ArpInterval(interval) => handle.set_arp_interval(interval),
        PlayCommand::Reverb(reverb_type) => handle.set_reverb(ReverbSettings {
            enabled: reverb_type.is_some(),
            reverb_type: reverb_type.unwrap_or_default(),
            ..ReverbSettings::default()
        }),
        PlayCommand::Gain(gain) => handle.set_master_gain(gain),
        PlayCommand::Help | PlayCommand::Quit => {}
    }
}
