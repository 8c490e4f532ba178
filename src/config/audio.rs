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
use std::{str::FromStr, time::Duration};

use serde::Deserialize;

use super::error::ConfigError;
use crate::audio::SampleFormat;

/// One block every video frame at 30 fps.
const DEFAULT_BUFFER_DURATION: Duration = Duration::from_nanos(1_000_000_000 / 30);
const DEFAULT_BITS_PER_SAMPLE: u16 = 32;

/// How to choose the CPAL stream buffer size (period size). Affects latency vs underrun tolerance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamBufferSize {
    /// Use the backend's default (may be high latency on some systems).
    Default,
    /// Use the device's minimum supported period size (lowest latency, most jitter-sensitive).
    Min,
    /// Use a fixed size in frames.
    Fixed(u32),
}

impl FromStr for StreamBufferSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(StreamBufferSize::Default),
            "min" => Ok(StreamBufferSize::Min),
            other => match other.parse::<u32>() {
                Ok(frames) if frames > 0 => Ok(StreamBufferSize::Fixed(frames)),
                _ => Err(ConfigError::InvalidValue {
                    field: "stream_buffer_size",
                    value: s.to_string(),
                }),
            },
        }
    }
}

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// The audio device.
    device: String,

    /// Output sample format (default: "float")
    sample_format: Option<String>,

    /// Output bits per sample (default: 32)
    bits_per_sample: Option<u16>,

    /// How much audio is pulled from the simulator per lock (default: 1/30 s).
    buffer_duration: Option<String>,

    /// CPAL stream buffer: "default" (backend default), "min" (lowest latency), or a number (frames).
    stream_buffer_size: Option<String>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            sample_format: None,
            bits_per_sample: None,
            buffer_duration: None,
            stream_buffer_size: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the output sample format (default: Float)
    pub fn sample_format(&self) -> Result<SampleFormat, ConfigError> {
        match self.sample_format.as_deref() {
            Some(format) => {
                SampleFormat::from_str(format).map_err(|_| ConfigError::InvalidValue {
                    field: "sample_format",
                    value: format.to_string(),
                })
            }
            None => Ok(SampleFormat::Float),
        }
    }

    /// Returns the output bits per sample (default: 32)
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample.unwrap_or(DEFAULT_BITS_PER_SAMPLE)
    }

    /// Returns the duration of audio produced per block.
    pub fn buffer_duration(&self) -> Result<Duration, ConfigError> {
        let duration = super::parse_duration(
            "buffer_duration",
            self.buffer_duration.as_deref(),
            DEFAULT_BUFFER_DURATION,
        )?;
        if duration.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "buffer_duration",
                value: format!("{:?}", duration),
            });
        }
        Ok(duration)
    }

    /// Returns the stream buffer size choice for CPAL (default/min/fixed).
    pub fn stream_buffer_size(&self) -> Result<StreamBufferSize, ConfigError> {
        match self.stream_buffer_size.as_deref() {
            Some(size) => size.parse(),
            None => Ok(StreamBufferSize::Default),
        }
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Audio {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let audio = parse("device: mock-device");
        assert_eq!(audio.device(), "mock-device");
        assert_eq!(audio.sample_format().unwrap(), SampleFormat::Float);
        assert_eq!(audio.bits_per_sample(), 32);
        assert_eq!(audio.buffer_duration().unwrap(), DEFAULT_BUFFER_DURATION);
        assert_eq!(audio.stream_buffer_size().unwrap(), StreamBufferSize::Default);
    }

    #[test]
    fn test_explicit_values() {
        let audio = parse(
            r#"
            device: speakers
            sample_format: INT
            bits_per_sample: 16
            buffer_duration: 10ms
            stream_buffer_size: 256
            "#,
        );
        assert_eq!(audio.sample_format().unwrap(), SampleFormat::Int);
        assert_eq!(audio.bits_per_sample(), 16);
        assert_eq!(audio.buffer_duration().unwrap(), Duration::from_millis(10));
        assert_eq!(
            audio.stream_buffer_size().unwrap(),
            StreamBufferSize::Fixed(256)
        );
    }

    #[test]
    fn test_invalid_values() {
        let audio = parse(
            r#"
            device: speakers
            sample_format: double
            buffer_duration: 0ms
            stream_buffer_size: huge
            "#,
        );
        assert!(audio.sample_format().is_err());
        assert!(audio.buffer_duration().is_err());
        assert!(audio.stream_buffer_size().is_err());
    }

    #[test]
    fn test_stream_buffer_size_from_str() {
        assert_eq!("min".parse::<StreamBufferSize>().unwrap(), StreamBufferSize::Min);
        assert_eq!(
            " Default ".parse::<StreamBufferSize>().unwrap(),
            StreamBufferSize::Default
        );
        assert!("0".parse::<StreamBufferSize>().is_err());
        assert!("-5".parse::<StreamBufferSize>().is_err());
    }
}
