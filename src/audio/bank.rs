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

//! The sample bank: every playable note, decoded into memory at startup.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, span, Level};

use crate::audio::sample_source::{
    create_sample_source_from_file, MemoryBuffer, SampleSourceError,
};
use crate::audio::Frame;
use crate::fingering::FingeringKey;

/// An immutable, finite run of stereo frames for one note.
pub trait NoteBuffer: Send + Sync {
    /// The number of frames in the buffer.
    fn len(&self) -> usize;

    /// Returns true if the buffer holds no frames.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies frames starting at `position` into `output`. Returns the number of
    /// frames copied, which is less than `output.len()` only at the end of the buffer.
    fn read(&self, position: usize, output: &mut [Frame]) -> Result<usize, SampleSourceError>;
}

/// Errors produced while building a sample bank.
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("unable to decode note {key} from {}: {source}", .path.display())]
    Decode {
        key: FingeringKey,
        path: PathBuf,
        source: SampleSourceError,
    },

    #[error("note {key} has sample rate {actual}, expected {expected}")]
    SampleRateMismatch {
        key: FingeringKey,
        expected: u32,
        actual: u32,
    },

    #[error("note {key} has {actual} channels, expected {expected}")]
    ChannelMismatch {
        key: FingeringKey,
        expected: u16,
        actual: u16,
    },

    #[error("note {key} is listed more than once")]
    Duplicate { key: FingeringKey },

    #[error("the empty fingering can't hold a note")]
    NoneKey,

    #[error("no notes were configured")]
    Empty,
}

/// Maps fingering keys to decoded notes. Built once, then shared read-only.
pub struct SampleBank {
    notes: HashMap<FingeringKey, Arc<dyn NoteBuffer>>,
    sample_rate: u32,
    source_channels: u16,
}

impl SampleBank {
    /// Starts building a bank in memory at the given sample rate.
    pub fn builder(sample_rate: u32) -> BankBuilder {
        BankBuilder {
            notes: HashMap::new(),
            sample_rate,
            source_channels: 2,
        }
    }

    /// Decodes every note file. All files must share a sample rate and channel count.
    pub fn load(notes: &BTreeMap<FingeringKey, PathBuf>) -> Result<SampleBank, BankError> {
        let span = span!(Level::INFO, "load sample bank");
        let _enter = span.enter();

        let mut builder: Option<BankBuilder> = None;
        // Several fingerings may share a recording.
        let mut cache: HashMap<&Path, Arc<dyn NoteBuffer>> = HashMap::new();

        for (key, path) in notes.iter() {
            let decode_error = |source| BankError::Decode {
                key: key.clone(),
                path: path.clone(),
                source,
            };

            if let Some(buffer) = cache.get(path.as_path()) {
                debug!(key = %key, path = ?path, "Using cached note");
                builder
                    .as_mut()
                    .ok_or(BankError::Empty)?
                    .insert(key.clone(), buffer.clone())?;
                continue;
            }

            let mut source = create_sample_source_from_file(path).map_err(decode_error)?;
            let sample_rate = source.sample_rate();
            let channels = source.channel_count();

            let builder = builder.get_or_insert_with(|| BankBuilder {
                notes: HashMap::new(),
                sample_rate,
                source_channels: channels,
            });
            if sample_rate != builder.sample_rate {
                return Err(BankError::SampleRateMismatch {
                    key: key.clone(),
                    expected: builder.sample_rate,
                    actual: sample_rate,
                });
            }
            if channels != builder.source_channels {
                return Err(BankError::ChannelMismatch {
                    key: key.clone(),
                    expected: builder.source_channels,
                    actual: channels,
                });
            }

            let buffer = MemoryBuffer::from_source(&mut source).map_err(decode_error)?;
            let frames = buffer.len();
            let buffer: Arc<dyn NoteBuffer> = Arc::new(buffer);
            builder.insert(key.clone(), buffer.clone())?;
            cache.insert(path.as_path(), buffer);

            info!(
                key = %key,
                path = ?path,
                channels,
                sample_rate,
                bits_per_sample = source.bits_per_sample(),
                duration_ms = frames as u64 * 1000 / sample_rate.max(1) as u64,
                "Note loaded"
            );
        }

        let bank = builder.ok_or(BankError::Empty)?.build()?;
        info!(
            notes = bank.len(),
            sample_rate = bank.sample_rate,
            "Sample bank loaded"
        );
        Ok(bank)
    }

    /// Looks up the note for a key.
    pub fn get(&self, key: &str) -> Option<&Arc<dyn NoteBuffer>> {
        self.notes.get(key)
    }

    /// Looks up the note for a key, along with the bank's own copy of the key.
    pub fn get_entry(&self, key: &str) -> Option<(&FingeringKey, &Arc<dyn NoteBuffer>)> {
        self.notes.get_key_value(key)
    }

    /// Returns true if the bank holds a note for the key.
    pub fn contains(&self, key: &str) -> bool {
        self.notes.contains_key(key)
    }

    /// Returns the keys in the bank, sorted.
    pub fn keys(&self) -> Vec<&FingeringKey> {
        let mut keys: Vec<&FingeringKey> = self.notes.keys().collect();
        keys.sort();
        keys
    }

    /// The number of notes.
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Returns true if the bank holds no notes. Loaded banks never are.
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// The sample rate shared by every note.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The channel count of the files the notes were decoded from.
    pub fn source_channels(&self) -> u16 {
        self.source_channels
    }

    /// Converts a duration to a frame count at the bank's sample rate.
    pub fn frames_for(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as usize
    }
}

/// Builds a [`SampleBank`] from buffers that are already in memory.
pub struct BankBuilder {
    notes: HashMap<FingeringKey, Arc<dyn NoteBuffer>>,
    sample_rate: u32,
    source_channels: u16,
}

impl BankBuilder {
    /// Adds a note.
    pub fn insert(
        &mut self,
        key: FingeringKey,
        buffer: Arc<dyn NoteBuffer>,
    ) -> Result<&mut BankBuilder, BankError> {
        if key.is_none() {
            return Err(BankError::NoneKey);
        }
        if self.notes.contains_key(&key) {
            return Err(BankError::Duplicate { key });
        }
        self.notes.insert(key, buffer);
        Ok(self)
    }

    /// Adds a note from raw stereo frames.
    pub fn insert_frames(
        &mut self,
        key: FingeringKey,
        frames: Vec<Frame>,
    ) -> Result<&mut BankBuilder, BankError> {
        self.insert(key, Arc::new(MemoryBuffer::new(frames)))
    }

    /// Finishes the bank. Empty banks are rejected.
    pub fn build(self) -> Result<SampleBank, BankError> {
        if self.notes.is_empty() {
            return Err(BankError::Empty);
        }
        Ok(SampleBank {
            notes: self.notes,
            sample_rate: self.sample_rate,
            source_channels: self.source_channels,
        })
    }
}
