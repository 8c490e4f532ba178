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

//! The playback state shared between input handling and audio output.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::audio::effects::{Resampler, Volume};
use crate::audio::sample_source::SampleSourceError;
use crate::audio::streamer::SelectStreamer;
use crate::audio::{Frame, Streamer, SILENCE};

/// The playback state, shared by everything that touches it. Every access goes
/// through the one lock.
pub type SharedPlayback = Arc<Mutex<Playback>>;

type Chain = Volume<Resampler<SelectStreamer>>;

/// The select-streamer behind its effects: resampled first, then gain.
pub struct Playback {
    chain: Chain,
    sample_rate: u32,
}

impl Playback {
    /// Builds the effect chain around the streamer.
    pub fn new(
        streamer: SelectStreamer,
        playback_ratio: f64,
        volume_base: f64,
        initial_volume: f64,
    ) -> Result<Playback, SampleSourceError> {
        let sample_rate = streamer.bank().sample_rate();
        let resampler = Resampler::new(streamer, playback_ratio)?;
        Ok(Playback {
            chain: Volume::new(resampler, volume_base, initial_volume),
            sample_rate,
        })
    }

    /// Wraps the playback in its lock.
    pub fn shared(self) -> SharedPlayback {
        Arc::new(Mutex::new(self))
    }

    /// Selects the note for the given fingering key. See [`SelectStreamer::select`].
    /// When the active note changes, frames the resampler already holds for the
    /// old note are dropped.
    pub fn select(&mut self, key: &str) -> bool {
        let before = self.streamer().active_key().cloned();
        let selected = self.streamer_mut().select(key);
        if self.streamer().active_key() != before.as_ref() {
            self.chain.inner_mut().reset();
        }
        selected
    }

    pub fn streamer(&self) -> &SelectStreamer {
        self.chain.inner().inner()
    }

    fn streamer_mut(&mut self) -> &mut SelectStreamer {
        self.chain.inner_mut().inner_mut()
    }

    /// Changes the volume by the given step and returns the new volume.
    pub fn adjust_volume(&mut self, step: f64) -> f64 {
        let volume = self.chain.adjust(step);
        debug!(volume, gain = self.chain.gain(), "Volume changed.");
        volume
    }

    pub fn volume(&self) -> f64 {
        self.chain.volume()
    }

    pub fn set_silent(&mut self, silent: bool) {
        self.chain.set_silent(silent);
    }

    /// The sample rate of the frames this playback produces.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Fills a whole block. Anything the chain doesn't produce is silence.
    /// Stream errors are logged and the failed note is dropped.
    pub fn fill(&mut self, frames: &mut [Frame]) -> usize {
        let (written, ok) = self.chain.stream(frames);
        frames[written..].fill(SILENCE);
        if !ok {
            match self.chain.err() {
                Some(e) => error!(err = %e, "Error while streaming note."),
                None => error!("Streaming failed without an error."),
            }
        }
        written
    }
}
