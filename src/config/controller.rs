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
use serde::Deserialize;

use super::error::ConfigError;
use crate::fingering::HARMONIC_COUNT;

/// Harmonics 0-9 default to C3 through A3.
const DEFAULT_HARMONIC_NOTES: [u8; HARMONIC_COUNT as usize] = [48, 49, 50, 51, 52, 53, 54, 55, 56, 57];
/// Valves 1-3 default to C4, D4 and E4.
const DEFAULT_VALVE_NOTES: [u8; 3] = [60, 62, 64];
const DEFAULT_VOLUME_DOWN_NOTE: u8 = 70;
const DEFAULT_VOLUME_UP_NOTE: u8 = 71;

/// Allows users to specify various controllers.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Controller {
    #[default]
    Keyboard,
    Midi(MidiController),
}

/// The configuration that maps MIDI notes to trumpet controls.
#[derive(Deserialize, Clone, Debug)]
pub struct MidiController {
    /// The MIDI input device.
    device: String,
    /// The MIDI channel to listen on (1-16). Listens on all channels when unset.
    channel: Option<u8>,
    /// The notes for harmonics 0-9, in order.
    harmonics: Option<Vec<u8>>,
    /// The notes for valves 1-3, in order.
    valves: Option<Vec<u8>>,
    /// The note that lowers the volume.
    volume_down: Option<u8>,
    /// The note that raises the volume.
    volume_up: Option<u8>,
}

impl MidiController {
    /// Creates a MIDI controller configuration with the default note layout.
    pub fn new(device: &str) -> MidiController {
        MidiController {
            device: device.to_string(),
            channel: None,
            harmonics: None,
            valves: None,
            volume_down: None,
            volume_up: None,
        }
    }

    /// Returns the MIDI input device name.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the zero based MIDI channel, if one is configured.
    pub fn channel(&self) -> Result<Option<u8>, ConfigError> {
        match self.channel {
            Some(channel @ 1..=16) => Ok(Some(channel - 1)),
            Some(channel) => Err(ConfigError::InvalidValue {
                field: "controller.channel",
                value: channel.to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Returns the notes for harmonics 0-9.
    pub fn harmonics(&self) -> Result<[u8; HARMONIC_COUNT as usize], ConfigError> {
        notes("controller.harmonics", self.harmonics.as_deref(), DEFAULT_HARMONIC_NOTES)
    }

    /// Returns the notes for valves 1-3.
    pub fn valves(&self) -> Result<[u8; 3], ConfigError> {
        notes("controller.valves", self.valves.as_deref(), DEFAULT_VALVE_NOTES)
    }

    /// Returns the volume down note.
    pub fn volume_down(&self) -> Result<u8, ConfigError> {
        note(
            "controller.volume_down",
            self.volume_down.unwrap_or(DEFAULT_VOLUME_DOWN_NOTE),
        )
    }

    /// Returns the volume up note.
    pub fn volume_up(&self) -> Result<u8, ConfigError> {
        note(
            "controller.volume_up",
            self.volume_up.unwrap_or(DEFAULT_VOLUME_UP_NOTE),
        )
    }
}

fn note(field: &'static str, note: u8) -> Result<u8, ConfigError> {
    if note > 127 {
        return Err(ConfigError::InvalidValue {
            field,
            value: note.to_string(),
        });
    }
    Ok(note)
}

fn notes<const N: usize>(
    field: &'static str,
    configured: Option<&[u8]>,
    default: [u8; N],
) -> Result<[u8; N], ConfigError> {
    let Some(configured) = configured else {
        return Ok(default);
    };

    let notes: [u8; N] = configured
        .try_into()
        .map_err(|_| ConfigError::InvalidValue {
            field,
            value: format!("expected {} notes, found {}", N, configured.len()),
        })?;
    for n in notes {
        note(field, n)?;
    }
    Ok(notes)
}
