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
use std::{error::Error, fmt, sync::Arc};

use crate::config;

pub mod bank;
pub mod cpal;
pub mod effects;
pub mod format;
pub mod mock;
pub mod playback;
pub mod sample_source;
pub mod streamer;

pub use format::{OutputFormat, SampleFormat};
pub use playback::{Playback, SharedPlayback};

use sample_source::SampleSourceError;

/// A stereo frame: left, then right.
pub type Frame = [f32; 2];

/// The silent frame.
pub const SILENCE: Frame = [0.0, 0.0];

/// A pull-based source of stereo frames.
pub trait Streamer: Send {
    /// Fills `frames` from the front. Returns how many frames were written and
    /// whether the stream is still healthy. When it returns false, [`Streamer::err`]
    /// explains why.
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool);

    /// Takes the error that made the last call to [`Streamer::stream`] fail, if any.
    fn err(&mut self) -> Option<SampleSourceError>;
}

pub trait Device: fmt::Display + Send + Sync {
    /// Starts pulling blocks from the playback and sending them to the output.
    /// Returns once output is running; output continues for the life of the process.
    fn start(&self, playback: SharedPlayback) -> Result<(), Box<dyn Error>>;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets the device named in the configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device, config.buffer_duration()?)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
