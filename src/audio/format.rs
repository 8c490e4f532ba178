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

use std::{error::Error, fmt, str::FromStr, time::Duration};

/// Sample format of the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Integer samples (16 or 32 bit)
    Int,
    /// 32-bit floating point samples
    Float,
}

impl FromStr for SampleFormat {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float" => Ok(SampleFormat::Float),
            "int" => Ok(SampleFormat::Int),
            _ => Err(format!("Unsupported sample format: {}", s).into()),
        }
    }
}

impl SampleFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The format the output device is opened with. The sample rate always comes
/// from the sample bank; notes are never converted to another rate.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Sample format (integer or float)
    pub sample_format: SampleFormat,
    /// Bits per sample
    pub bits_per_sample: u16,
}

impl OutputFormat {
    /// Creates a new OutputFormat. Supported combinations are 32-bit float and
    /// 16 or 32-bit integer.
    pub fn new(
        sample_rate: u32,
        sample_format: SampleFormat,
        bits_per_sample: u16,
    ) -> Result<Self, Box<dyn Error>> {
        if sample_rate == 0 {
            return Err("Sample rate must be greater than 0".into());
        }

        match (sample_format, bits_per_sample) {
            (SampleFormat::Float, 32) | (SampleFormat::Int, 16) | (SampleFormat::Int, 32) => {}
            _ => {
                return Err(format!(
                    "Unsupported output format: {}-bit {}",
                    bits_per_sample, sample_format
                )
                .into())
            }
        }

        Ok(OutputFormat {
            sample_rate,
            sample_format,
            bits_per_sample,
        })
    }

    /// The number of frames that make up the given duration, at least one.
    pub fn frames_for(&self, duration: Duration) -> usize {
        ((duration.as_secs_f64() * self.sample_rate as f64).round() as usize).max(1)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz {}-bit {}",
            self.sample_rate, self.bits_per_sample, self.sample_format
        )
    }
}
