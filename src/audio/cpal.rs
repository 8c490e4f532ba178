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
use std::{error::Error, fmt, sync::mpsc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use crate::{
    audio::{Device as AudioDevice, Frame, OutputFormat, SampleFormat, SharedPlayback, SILENCE},
    config::{self, StreamBufferSize},
};

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// Audio configuration for the output stream.
    audio_config: config::Audio,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Writes stereo frames into an interleaved device buffer. Mono devices get the
/// average of both sides; channels past the second are left silent.
fn write_frames<T>(frames: &[Frame], output: &mut [T], channels: usize)
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    for (frame, out) in frames.iter().zip(output.chunks_mut(channels)) {
        match out {
            [] => {}
            [mono] => *mono = T::from_sample((frame[0] + frame[1]) * 0.5),
            [left, right, rest @ ..] => {
                *left = T::from_sample(frame[0]);
                *right = T::from_sample(frame[1]);
                rest.fill(T::EQUILIBRIUM);
            }
        }
    }
}

/// Creates the output callback. Each device buffer is filled in blocks of at most
/// `block_frames`, taking the playback lock once per block.
fn create_callback<T>(
    playback: SharedPlayback,
    channels: usize,
    block_frames: usize,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    let mut scratch = vec![SILENCE; block_frames];
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        for chunk in data.chunks_mut(block_frames * channels) {
            let frames = chunk.len() / channels;
            playback.lock().fill(&mut scratch[..frames]);
            write_frames(&scratch[..frames], chunk, channels);
        }
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
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
                let output_configs = match device.supported_output_configs() {
                    Ok(output_configs) => output_configs,
                    Err(_) => continue,
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    // The configured device is matched against this name.
                    #[allow(deprecated)]
                    let name = device.name()?;
                    devices.push(Device {
                        name,
                        max_channels,
                        host_id,
                        device,
                        audio_config: config::Audio::new("default"),
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        match Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
        {
            Some(mut device) => {
                device.audio_config = config.clone();
                Ok(device)
            }
            None => Err(format!("no device found with name {}", name).into()),
        }
    }

    /// Resolves the configured stream buffer size against what the device supports.
    fn buffer_size(
        &self,
        channels: u16,
        sample_rate: u32,
    ) -> Result<cpal::BufferSize, Box<dyn Error>> {
        Ok(match self.audio_config.stream_buffer_size()? {
            StreamBufferSize::Default => cpal::BufferSize::Default,
            StreamBufferSize::Fixed(frames) => cpal::BufferSize::Fixed(frames),
            StreamBufferSize::Min => {
                let min = self
                    .device
                    .supported_output_configs()?
                    .filter(|range| {
                        range.channels() >= channels
                            && range.min_sample_rate() <= sample_rate
                            && sample_rate <= range.max_sample_rate()
                    })
                    .filter_map(|range| match range.buffer_size() {
                        cpal::SupportedBufferSize::Range { min, .. } => Some(*min),
                        cpal::SupportedBufferSize::Unknown => None,
                    })
                    .min();
                match min {
                    Some(min) => cpal::BufferSize::Fixed(min),
                    None => cpal::BufferSize::Default,
                }
            }
        })
    }
}

impl AudioDevice for Device {
    fn start(&self, playback: SharedPlayback) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "start output (cpal)");
        let _enter = span.enter();

        let sample_rate = playback.lock().sample_rate();
        let format = OutputFormat::new(
            sample_rate,
            self.audio_config.sample_format()?,
            self.audio_config.bits_per_sample(),
        )?;
        let block_frames = format.frames_for(self.audio_config.buffer_duration()?);
        let channels = self.max_channels;
        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate,
            buffer_size: self.buffer_size(channels, sample_rate)?,
        };

        info!(
            device = self.name,
            format = %format,
            channels,
            block_frames,
            buffer_size = ?stream_config.buffer_size,
            "Starting output."
        );

        // The stream has to live on the thread that created it, so the output
        // thread builds it, reports back, and then keeps it alive forever.
        let device = self.device.clone();
        let (started_tx, started_rx) = mpsc::channel::<Result<(), String>>();
        thread::spawn(move || {
            let err_fn = |err: cpal::StreamError| error!("CPAL output stream error: {}", err);
            let channels = stream_config.channels as usize;
            let stream = match (format.sample_format, format.bits_per_sample) {
                (SampleFormat::Float, _) => device.build_output_stream(
                    &stream_config,
                    create_callback::<f32>(playback, channels, block_frames),
                    err_fn,
                    None,
                ),
                (SampleFormat::Int, 16) => device.build_output_stream(
                    &stream_config,
                    create_callback::<i16>(playback, channels, block_frames),
                    err_fn,
                    None,
                ),
                (SampleFormat::Int, _) => device.build_output_stream(
                    &stream_config,
                    create_callback::<i32>(playback, channels, block_frames),
                    err_fn,
                    None,
                ),
            };

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = started_tx.send(Err(format!("Failed to create CPAL stream: {}", e)));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = started_tx.send(Err(format!("Failed to start CPAL stream: {}", e)));
                return;
            }
            let _ = started_tx.send(Ok(()));

            loop {
                thread::park();
            }
        });

        started_rx
            .recv()
            .map_err(|_| "output thread exited before the stream started")??;
        info!("CPAL output stream started successfully");
        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<std::sync::Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}
