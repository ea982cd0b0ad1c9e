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
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use tracing::{error, info};

use super::{AudioError, DeviceInfo};
use crate::synth::Synth;

/// Frames rendered per pass inside the callback. The scratch buffer is
/// allocated once when the stream is built.
const SCRATCH_FRAMES: usize = 4096;

/// Lists output devices across every available host.
pub fn list_devices() -> Result<Vec<DeviceInfo>, AudioError> {
    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host = cpal::host_from_id(host_id)?;
        let default_name = host
            .default_output_device()
            .and_then(|device| device.name().ok());

        let host_devices = match host.output_devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(config) = device.default_output_config() else {
                continue;
            };
            let name = device.name()?;
            devices.push(DeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                host: host_id.name().to_string(),
                channels: config.channels(),
            });
        }
    }

    devices.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(devices)
}

fn find_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    match name {
        Some(name) => {
            for device in host.output_devices()? {
                if device.name()?.trim() == name {
                    return Ok(device);
                }
            }
            Err(AudioError::DeviceNotFound {
                name: name.to_string(),
            })
        }
        None => host.default_output_device().ok_or(AudioError::NoDefaultDevice),
    }
}

/// A running output stream. Audio stops when this is dropped.
pub struct Output {
    name: String,
    channels: u16,
    sample_rate: u32,
    _stream: cpal::Stream,
}

impl Output {
    /// Opens the device and moves the synth into the audio callback. The synth
    /// renders mono audio which is copied to every output channel.
    pub fn start(device_name: Option<&str>, synth: Synth) -> Result<Output, AudioError> {
        let device = find_device(device_name)?;
        let name = device.name()?;
        let default_config = device.default_output_config()?;
        let sample_rate = synth.sample_rate();
        let config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, synth)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, synth)?,
            cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, synth)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, synth)?,
            format => return Err(AudioError::UnsupportedFormat(format!("{format:?}"))),
        };
        stream.play()?;

        info!(
            device = name,
            channels = config.channels,
            sample_rate,
            format = ?default_config.sample_format(),
            "Output stream started"
        );

        Ok(Output {
            name,
            channels: config.channels,
            sample_rate,
            _stream: stream,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output")
            .field("name", &self.name)
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut synth: Synth,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    let mut scratch = vec![0.0f32; SCRATCH_FRAMES];

    Ok(device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for block in data.chunks_mut(SCRATCH_FRAMES * channels) {
                let frames = block.len().div_ceil(channels);
                let mono = &mut scratch[..frames];
                synth.render(mono);
                for (frame, sample) in block.chunks_mut(channels).zip(mono.iter()) {
                    frame.fill(T::from_sample(*sample));
                }
            }
        },
        |err| error!(err = %err, "Output stream error"),
        None,
    )?)
}
