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
use std::fmt;

use crate::synth::Synth;

pub mod cpal;

/// Errors raised while opening audio output. Nothing here is raised from
/// inside the audio callback.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("No output device found with name {name}")]
    DeviceNotFound { name: String },

    #[error("No default output device available")]
    NoDefaultDevice,

    #[error("Unsupported output sample format {0}")]
    UnsupportedFormat(String),

    #[error("Audio host unavailable: {0}")]
    Host(#[from] ::cpal::HostUnavailable),

    #[error("Unable to enumerate devices: {0}")]
    Devices(#[from] ::cpal::DevicesError),

    #[error("Unable to read device name: {0}")]
    DeviceName(#[from] ::cpal::DeviceNameError),

    #[error("Unable to read device configuration: {0}")]
    DefaultConfig(#[from] ::cpal::DefaultStreamConfigError),

    #[error("Unable to build output stream: {0}")]
    BuildStream(#[from] ::cpal::BuildStreamError),

    #[error("Unable to start output stream: {0}")]
    PlayStream(#[from] ::cpal::PlayStreamError),
}

/// An output device as reported by the audio host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub channels: u16,
    pub is_default: bool,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({}){}",
            self.name,
            self.channels,
            self.host,
            if self.is_default { " [default]" } else { "" }
        )
    }
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<DeviceInfo>, AudioError> {
    cpal::list_devices()
}

/// Opens the named output device (or the default one) and starts pulling audio
/// from the synth.
pub fn start_output(device: Option<&str>, synth: Synth) -> Result<cpal::Output, AudioError> {
    cpal::Output::start(device, synth)
}
