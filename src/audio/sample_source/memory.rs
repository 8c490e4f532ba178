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
use crate::audio::bank::NoteBuffer;
use crate::audio::Frame;

use super::error::SampleSourceError;
use super::traits::SampleSource;

#[cfg(test)]
use std::time::Duration;

/// Number of frames pulled from a source per chunk while decoding a whole note.
const DECODE_CHUNK_FRAMES: usize = 4096;

/// A fully decoded note held in memory as stereo frames.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryBuffer {
    frames: Vec<Frame>,
}

impl MemoryBuffer {
    /// Creates a buffer from stereo frames.
    pub fn new(frames: Vec<Frame>) -> MemoryBuffer {
        MemoryBuffer { frames }
    }

    /// Decodes the whole source into memory. Mono sources are copied to both
    /// sides; sources with more than two channels are rejected.
    pub fn from_source<S: SampleSource + ?Sized>(
        source: &mut S,
    ) -> Result<MemoryBuffer, SampleSourceError> {
        let channels = source.channel_count() as usize;
        if channels == 0 || channels > 2 {
            return Err(SampleSourceError::SampleConversionFailed(format!(
                "{} channels, notes must be mono or stereo",
                channels
            )));
        }

        let expected = source
            .duration()
            .map(|duration| (duration.as_secs_f64() * source.sample_rate() as f64) as usize)
            .unwrap_or(0);
        let mut frames = Vec::with_capacity(expected);
        let mut chunk = vec![Vec::with_capacity(DECODE_CHUNK_FRAMES); channels];

        loop {
            let read = source.next_chunk(&mut chunk, DECODE_CHUNK_FRAMES)?;
            if read == 0 {
                break;
            }

            match chunk.as_slice() {
                [mono] => frames.extend(mono.iter().map(|sample| [*sample, *sample])),
                [left, right] => frames.extend(
                    left.iter()
                        .zip(right.iter())
                        .map(|(left, right)| [*left, *right]),
                ),
                _ => {
                    return Err(SampleSourceError::SampleConversionFailed(format!(
                        "source changed from {} channels mid-stream",
                        channels
                    )))
                }
            }
        }

        Ok(MemoryBuffer { frames })
    }

    /// Returns the decoded frames.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

impl NoteBuffer for MemoryBuffer {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn read(&self, position: usize, output: &mut [Frame]) -> Result<usize, SampleSourceError> {
        let length = self.frames.len();
        if position > length {
            return Err(SampleSourceError::OutOfBounds { position, length });
        }

        let to_copy = (length - position).min(output.len());
        output[..to_copy].copy_from_slice(&self.frames[position..position + to_copy]);
        Ok(to_copy)
    }
}

/// A sample source that produces samples from memory in planar format.
///
/// Input samples are provided as interleaved for convenience but stored planar internally.
#[cfg(test)]
pub struct MemorySampleSource {
    planar_samples: Vec<Vec<f32>>,
    current_frame: usize,
    channel_count: u16,
    sample_rate: u32,
}

#[cfg(test)]
impl MemorySampleSource {
    /// Creates a new memory sample source from interleaved samples.
    pub fn new(interleaved_samples: Vec<f32>, channel_count: u16, sample_rate: u32) -> Self {
        let num_channels = channel_count as usize;
        let num_frames = if num_channels > 0 {
            interleaved_samples.len() / num_channels
        } else {
            0
        };

        let mut planar_samples = vec![Vec::with_capacity(num_frames); num_channels];
        for frame in interleaved_samples.chunks_exact(num_channels.max(1)) {
            for (ch, sample) in frame.iter().enumerate() {
                planar_samples[ch].push(*sample);
            }
        }

        Self {
            planar_samples,
            current_frame: 0,
            channel_count,
            sample_rate,
        }
    }

    fn total_frames(&self) -> usize {
        self.planar_samples.first().map(|c| c.len()).unwrap_or(0)
    }
}

#[cfg(test)]
impl SampleSource for MemorySampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        if output.len() != self.channel_count as usize {
            return Err(SampleSourceError::SampleConversionFailed(format!(
                "Output has {} channels, expected {}",
                output.len(),
                self.channel_count
            )));
        }

        for ch in output.iter_mut() {
            ch.clear();
        }

        let available = self.total_frames().saturating_sub(self.current_frame);
        let to_copy = available.min(max_frames);
        for (out_ch, plane) in output.iter_mut().zip(self.planar_samples.iter()) {
            out_ch.extend_from_slice(&plane[self.current_frame..self.current_frame + to_copy]);
        }
        self.current_frame += to_copy;

        Ok(to_copy)
    }

    fn channel_count(&self) -> u16 {
        self.channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn bits_per_sample(&self) -> u16 {
        32
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(
            self.total_frames() as f64 / self.sample_rate as f64,
        ))
    }
}
