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

//! Effects applied on top of a [`Streamer`].

use std::collections::VecDeque;

use rubato::{SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use tracing::{debug, error};

// Brings process_into_buffer and friends into scope.
use rubato::Resampler as _;

use crate::audio::sample_source::SampleSourceError;
use crate::audio::{Frame, Streamer, SILENCE};

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Changes the playback speed of a streamer. A ratio of 2.0 plays twice as fast
/// (and an octave higher). A ratio of 1.0 passes frames straight through.
pub struct Resampler<S: Streamer> {
    source: S,
    ratio: f64,
    resampler: Option<SincState>,
    error: Option<SampleSourceError>,
}

struct SincState {
    sinc: SincFixedIn<f32>,
    ratio: f64,
    /// Frames pulled from the source for the next chunk.
    input_frames: Vec<Frame>,
    /// The same frames in planar form, as rubato wants them.
    input_planar: Vec<Vec<f32>>,
    output_planar: Vec<Vec<f32>>,
    /// Resampled frames not yet handed out.
    output: VecDeque<Frame>,
}

impl<S: Streamer> Resampler<S> {
    /// Wraps the source. The ratio must be finite and positive.
    pub fn new(source: S, ratio: f64) -> Result<Resampler<S>, SampleSourceError> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(SampleSourceError::ResamplingFailed(
                ratio,
                "ratio must be finite and positive".to_string(),
            ));
        }

        let resampler = if ratio == 1.0 {
            None
        } else {
            let sinc_params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                oversampling_factor: 128,
                interpolation: SincInterpolationType::Linear,
                window: WindowFunction::BlackmanHarris2,
            };
            // Rubato's ratio is output frames per input frame.
            let sinc = SincFixedIn::<f32>::new(1.0 / ratio, 1.0, sinc_params, INPUT_BLOCK_SIZE, 2)
                .map_err(|e| SampleSourceError::ResamplingFailed(ratio, e.to_string()))?;
            let output_planar = sinc.output_buffer_allocate(true);
            let output_capacity = output_planar.first().map_or(0, |plane| plane.len());
            debug!(ratio, "Resampling playback.");

            Some(SincState {
                sinc,
                ratio,
                input_frames: vec![SILENCE; INPUT_BLOCK_SIZE],
                input_planar: vec![Vec::with_capacity(INPUT_BLOCK_SIZE); 2],
                output_planar,
                output: VecDeque::with_capacity(output_capacity * 2),
            })
        };

        Ok(Resampler {
            source,
            ratio,
            resampler,
            error: None,
        })
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Drops queued output and the filter history, so the next frames come only
    /// from what the source produces from now on.
    pub fn reset(&mut self) {
        if let Some(state) = self.resampler.as_mut() {
            state.output.clear();
            state.sinc.reset();
        }
    }

    pub fn inner(&self) -> &S {
        &self.source
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl SincState {
    /// Pulls one chunk from the source and resamples it into the output queue.
    /// A source that runs short is padded with silence.
    fn refill<S: Streamer>(&mut self, source: &mut S) -> Result<bool, SampleSourceError> {
        let needed = self.sinc.input_frames_next();
        self.input_frames.resize(needed, SILENCE);
        let (read, ok) = source.stream(&mut self.input_frames[..needed]);
        if !ok {
            return Ok(false);
        }
        self.input_frames[read..needed].fill(SILENCE);

        for (ch, plane) in self.input_planar.iter_mut().enumerate() {
            plane.clear();
            plane.extend(self.input_frames[..needed].iter().map(|frame| frame[ch]));
        }

        let (_, produced) = self
            .sinc
            .process_into_buffer(&self.input_planar, &mut self.output_planar, None)
            .map_err(|e| SampleSourceError::ResamplingFailed(self.ratio, e.to_string()))?;

        let (left, right) = (&self.output_planar[0], &self.output_planar[1]);
        self.output.extend(
            left[..produced]
                .iter()
                .zip(right[..produced].iter())
                .map(|(left, right)| [*left, *right]),
        );
        Ok(true)
    }
}

impl<S: Streamer> Streamer for Resampler<S> {
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool) {
        let Some(state) = self.resampler.as_mut() else {
            return self.source.stream(frames);
        };

        let mut written = 0;
        while written < frames.len() {
            let available = state.output.len().min(frames.len() - written);
            for (dst, src) in frames[written..written + available]
                .iter_mut()
                .zip(state.output.drain(..available))
            {
                *dst = src;
            }
            written += available;
            if written == frames.len() {
                break;
            }

            match state.refill(&mut self.source) {
                Ok(true) => {}
                Ok(false) => return (written, false),
                Err(e) => {
                    error!(err = %e, "Resampling failed.");
                    self.error = Some(e);
                    return (written, false);
                }
            }
        }

        (written, true)
    }

    fn err(&mut self) -> Option<SampleSourceError> {
        self.error.take().or_else(|| self.source.err())
    }
}

/// Scales the amplitude of a streamer by `base ^ volume`.
///
/// A volume of 0 leaves the signal unchanged. With a base of 2, every step of
/// 1 doubles or halves the amplitude. Silent mutes regardless of volume.
pub struct Volume<S: Streamer> {
    source: S,
    base: f64,
    volume: f64,
    silent: bool,
}

impl<S: Streamer> Volume<S> {
    pub fn new(source: S, base: f64, volume: f64) -> Volume<S> {
        Volume {
            source,
            base,
            volume,
            silent: false,
        }
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    /// Changes the volume by the given step and returns the new volume.
    pub fn adjust(&mut self, step: f64) -> f64 {
        self.volume += step;
        self.volume
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    /// The current linear gain.
    pub fn gain(&self) -> f32 {
        if self.silent {
            0.0
        } else {
            self.base.powf(self.volume) as f32
        }
    }

    pub fn inner(&self) -> &S {
        &self.source
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: Streamer> Streamer for Volume<S> {
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool) {
        let (written, ok) = self.source.stream(frames);
        let gain = self.gain();
        for frame in frames[..written].iter_mut() {
            frame[0] *= gain;
            frame[1] *= gain;
        }
        (written, ok)
    }

    fn err(&mut self) -> Option<SampleSourceError> {
        self.source.err()
    }
}
