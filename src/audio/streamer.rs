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

//! The select-streamer: a pull source that plays whichever note is selected.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::audio::bank::{NoteBuffer, SampleBank};
use crate::audio::sample_source::SampleSourceError;
use crate::audio::{Frame, Streamer, SILENCE};
use crate::fingering::FingeringKey;

/// The note currently being played and the read position within it.
struct ActiveNote {
    key: FingeringKey,
    buffer: Arc<dyn NoteBuffer>,
    position: usize,
}

/// Streams the selected note from the sample bank, or silence when nothing is selected.
///
/// Switching from one note straight to another skips the new note's attack by
/// starting it at the sustain offset. Starting from silence plays the note from
/// the beginning. A note that runs out is not looped: the streamer goes silent.
pub struct SelectStreamer {
    bank: Arc<SampleBank>,
    sustain_offset: Duration,
    sustain_frames: usize,
    active: Option<ActiveNote>,
    error: Option<SampleSourceError>,
}

impl SelectStreamer {
    /// Creates an idle streamer over the given bank.
    pub fn new(bank: Arc<SampleBank>, sustain_offset: Duration) -> SelectStreamer {
        let sustain_frames = bank.frames_for(sustain_offset);
        SelectStreamer {
            bank,
            sustain_offset,
            sustain_frames,
            active: None,
            error: None,
        }
    }

    /// Selects the note for the given key. Returns false, and goes silent, if the
    /// bank has no such note. Selecting the note that is already playing does nothing.
    pub fn select(&mut self, key: &str) -> bool {
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.key.as_str() == key)
        {
            return true;
        }

        match self.bank.get_entry(key) {
            Some((key, buffer)) => {
                let position = if self.active.is_some() {
                    self.sustain_frames.min(buffer.len())
                } else {
                    0
                };
                debug!(key = %key, position, "Note selected.");
                self.active = Some(ActiveNote {
                    key: key.clone(),
                    buffer: buffer.clone(),
                    position,
                });
                true
            }
            None => {
                if let Some(active) = self.active.take() {
                    debug!(from = %active.key, "Note stopped.");
                }
                if !key.is_empty() {
                    debug!(key, "No note for fingering.");
                }
                false
            }
        }
    }

    /// The key of the note being played, if any.
    pub fn active_key(&self) -> Option<&FingeringKey> {
        self.active.as_ref().map(|active| &active.key)
    }

    /// The read position within the active note, in frames.
    pub fn position(&self) -> Option<usize> {
        self.active.as_ref().map(|active| active.position)
    }

    pub fn sustain_offset(&self) -> Duration {
        self.sustain_offset
    }

    pub fn bank(&self) -> &Arc<SampleBank> {
        &self.bank
    }
}

impl Streamer for SelectStreamer {
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool) {
        let Some(active) = self.active.as_mut() else {
            frames.fill(SILENCE);
            return (frames.len(), true);
        };

        match active.buffer.read(active.position, frames) {
            Ok(read) => {
                active.position += read;
                if read < frames.len() {
                    debug!(key = %active.key, "Note finished.");
                    self.active = None;
                }
                (read, true)
            }
            Err(e) => {
                self.error = Some(e);
                self.active = None;
                (0, false)
            }
        }
    }

    fn err(&mut self) -> Option<SampleSourceError> {
        self.error.take()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE_RATE: u32 = 1000;

    /// A buffer whose every read fails.
    struct FailingBuffer;

    impl NoteBuffer for FailingBuffer {
        fn len(&self) -> usize {
            100
        }

        fn read(&self, position: usize, _: &mut [Frame]) -> Result<usize, SampleSourceError> {
            Err(SampleSourceError::OutOfBounds {
                position,
                length: 0,
            })
        }
    }

    /// Frame `i` of note `n` is `[n * 10000 + i, -(n * 10000 + i)]`.
    fn ramp(note: usize, len: usize) -> Vec<Frame> {
        (0..len)
            .map(|i| {
                let value = (note * 10000 + i) as f32;
                [value, -value]
            })
            .collect()
    }

    fn bank() -> Arc<SampleBank> {
        let mut builder = SampleBank::builder(SAMPLE_RATE);
        builder
            .insert_frames("70".parse().unwrap(), ramp(1, 1000))
            .unwrap()
            .insert_frames("00".parse().unwrap(), ramp(2, 1000))
            .unwrap()
            .insert_frames("10".parse().unwrap(), ramp(3, 1000))
            .unwrap()
            .insert_frames("90".parse().unwrap(), ramp(4, 10))
            .unwrap()
            .insert("50".parse().unwrap(), Arc::new(FailingBuffer))
            .unwrap();
        Arc::new(builder.build().unwrap())
    }

    fn streamer() -> SelectStreamer {
        SelectStreamer::new(bank(), Duration::from_millis(500))
    }

    #[test]
    fn test_idle_is_silent() {
        let mut streamer = streamer();
        let mut block = [[1.0, 1.0]; 16];
        assert_eq!(streamer.stream(&mut block), (16, true));
        assert!(block.iter().all(|frame| *frame == SILENCE));
        assert!(streamer.err().is_none());
    }

    #[test]
    fn test_missing_keys_are_silent() {
        let mut streamer = streamer();
        for key in ["71", "", "0123", "garbage"] {
            assert!(streamer.select("70"));
            assert!(!streamer.select(key), "{} should not be found", key);
            assert_eq!(streamer.active_key(), None);

            let mut block = [[1.0, 1.0]; 8];
            assert_eq!(streamer.stream(&mut block), (8, true));
            assert_eq!(block, [SILENCE; 8]);
        }
    }

    #[test]
    fn test_select_from_idle_starts_at_zero() {
        let mut streamer = streamer();
        assert!(streamer.select("70"));
        assert_eq!(streamer.position(), Some(0));

        let mut block = [SILENCE; 4];
        assert_eq!(streamer.stream(&mut block), (4, true));
        assert_eq!(&block[..], &ramp(1, 4)[..]);
        assert_eq!(streamer.position(), Some(4));
    }

    #[test]
    fn test_select_while_playing_starts_at_sustain_offset() {
        let mut streamer = streamer();
        assert!(streamer.select("70"));
        assert!(streamer.select("00"));
        assert_eq!(streamer.position(), Some(500));

        let mut block = [SILENCE; 2];
        streamer.stream(&mut block);
        assert_eq!(block, [[20500.0, -20500.0], [20501.0, -20501.0]]);
    }

    #[test]
    fn test_reselect_same_key_keeps_position() {
        let mut streamer = streamer();
        assert!(streamer.select("70"));
        let mut block = [SILENCE; 8];
        streamer.stream(&mut block);

        assert!(streamer.select("70"));
        assert_eq!(streamer.position(), Some(8));
        streamer.stream(&mut block);
        assert_eq!(block[0], [10008.0, -10008.0]);
    }

    #[test]
    fn test_sustain_offset_is_clamped() {
        let mut streamer = streamer();
        assert!(streamer.select("70"));
        // "90" is shorter than the sustain offset.
        assert!(streamer.select("90"));
        assert_eq!(streamer.position(), Some(10));

        let mut block = [[1.0, 1.0]; 4];
        assert_eq!(streamer.stream(&mut block), (0, true));
        assert_eq!(streamer.active_key(), None);
    }

    #[test]
    fn test_exhaustion_goes_silent() {
        let mut streamer = streamer();
        assert!(streamer.select("90"));

        let mut block = [SILENCE; 4];
        assert_eq!(streamer.stream(&mut block), (4, true));
        assert_eq!(streamer.stream(&mut block), (4, true));
        assert_eq!(streamer.stream(&mut block), (2, true));
        assert_eq!(&block[..2], &ramp(4, 10)[8..]);
        assert_eq!(streamer.active_key(), None);

        let mut block = [[1.0, 1.0]; 4];
        assert_eq!(streamer.stream(&mut block), (4, true));
        assert_eq!(block, [SILENCE; 4]);

        // Starting again after the note ran out is a fresh attack.
        assert!(streamer.select("90"));
        assert_eq!(streamer.position(), Some(0));
    }

    #[test]
    fn test_exhaustion_on_block_boundary() {
        let mut streamer = streamer();
        assert!(streamer.select("90"));

        let mut block = [SILENCE; 5];
        assert_eq!(streamer.stream(&mut block), (5, true));
        assert_eq!(streamer.stream(&mut block), (5, true));
        assert_eq!(streamer.active_key().map(|key| key.as_str()), Some("90"));
        assert_eq!(streamer.stream(&mut block), (0, true));
        assert_eq!(streamer.active_key(), None);
    }

    #[test]
    fn test_read_error_is_reported_once() {
        let mut streamer = streamer();
        assert!(streamer.select("50"));

        let mut block = [SILENCE; 4];
        assert_eq!(streamer.stream(&mut block), (0, false));
        assert_eq!(streamer.active_key(), None);
        assert!(matches!(
            streamer.err(),
            Some(SampleSourceError::OutOfBounds { .. })
        ));
        assert!(streamer.err().is_none());

        assert_eq!(streamer.stream(&mut block), (4, true));
    }

    #[test]
    fn test_open_d6_scenario() {
        let mut streamer = streamer();
        let mut block = [SILENCE; 64];

        assert!(streamer.select("70"));
        streamer.stream(&mut block);
        assert_eq!(block[0], ramp(1, 1)[0]);

        assert!(streamer.select("70"));
        streamer.stream(&mut block);
        assert_eq!(block[0], [10064.0, -10064.0]);

        assert!(!streamer.select("71"));
        assert_eq!(streamer.stream(&mut block), (64, true));
        assert_eq!(block, [SILENCE; 64]);
    }

    #[test]
    fn test_harmonic_change_scenario() {
        let mut streamer = streamer();
        assert!(streamer.select("00"));
        assert!(streamer.select("10"));

        let mut block = [SILENCE; 1];
        streamer.stream(&mut block);
        assert_eq!(block[0], [30500.0, -30500.0]);
    }

    #[test]
    fn test_sustain_offset_uses_bank_rate() {
        let streamer = SelectStreamer::new(bank(), Duration::from_millis(250));
        assert_eq!(streamer.sustain_offset(), Duration::from_millis(250));
        assert_eq!(streamer.bank().sample_rate(), SAMPLE_RATE);
        assert_eq!(streamer.sustain_frames, 250);
    }
}
