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
use std::{io, sync::Arc};

use midly::{live::LiveEvent, MidiMessage};
use tokio::{
    sync::mpsc::{self, Sender},
    task::JoinHandle,
};
use tracing::{error, info, span, Instrument, Level};

use super::Event;
use crate::{
    config::{ConfigError, MidiController},
    fingering::{Control, Harmonic, Valve, HARMONIC_COUNT},
    midi::Device,
};

/// Maps MIDI notes onto trumpet controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiMapping {
    /// The zero based channel to listen on, or every channel.
    channel: Option<u8>,
    harmonics: [u8; HARMONIC_COUNT as usize],
    valves: [u8; 3],
    volume_down: u8,
    volume_up: u8,
}

impl MidiMapping {
    /// Builds the mapping from the controller configuration.
    pub fn from_config(config: &MidiController) -> Result<MidiMapping, ConfigError> {
        Ok(MidiMapping {
            channel: config.channel()?,
            harmonics: config.harmonics()?,
            valves: config.valves()?,
            volume_down: config.volume_down()?,
            volume_up: config.volume_up()?,
        })
    }

    /// Translates a MIDI event. Note on is a press, note off (or note on with zero
    /// velocity) is a release. Volume notes only act when pressed.
    pub fn event_for(&self, event: &LiveEvent) -> Option<Event> {
        let LiveEvent::Midi { channel, message } = event else {
            return None;
        };
        if self
            .channel
            .is_some_and(|expected| expected != channel.as_int())
        {
            return None;
        }

        let (key, pressed) = match *message {
            MidiMessage::NoteOn { key, vel } => (key.as_int(), vel.as_int() > 0),
            MidiMessage::NoteOff { key, .. } => (key.as_int(), false),
            _ => return None,
        };

        if key == self.volume_up {
            return pressed.then_some(Event::VolumeUp);
        }
        if key == self.volume_down {
            return pressed.then_some(Event::VolumeDown);
        }

        let control = self.control_for(key)?;
        Some(if pressed {
            Event::Press(control)
        } else {
            Event::Release(control)
        })
    }

    fn control_for(&self, key: u8) -> Option<Control> {
        if let Some(index) = self.harmonics.iter().position(|note| *note == key) {
            return Harmonic::new(index as u8).ok().map(Control::Harmonic);
        }
        let index = self.valves.iter().position(|note| *note == key)?;
        Valve::new(index as u8 + 1).ok().map(Control::Valve)
    }
}

/// A controller that plays the trumpet from a MIDI device.
pub struct Driver {
    /// The MIDI device.
    midi_device: Arc<dyn Device>,
    /// How notes map to controls.
    mapping: MidiMapping,
}

impl Driver {
    pub fn new(midi_device: Arc<dyn Device>, mapping: MidiMapping) -> Driver {
        Driver {
            midi_device,
            mapping,
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let (midi_events_tx, mut midi_events_rx) = mpsc::channel::<Vec<u8>>(10);
        let device = self.midi_device.clone();
        let mapping = self.mapping.clone();

        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "MIDI driver");
            let _enter = span.enter();

            info!("MIDI driver started.");

            if let Err(e) = device
                .watch_events(midi_events_tx)
                .map_err(|e| io::Error::other(e.to_string()))
            {
                error!(err = e.to_string(), "Error watching MIDI events");
            }
        });

        let device = self.midi_device.clone();
        tokio::spawn(
            async move {
                loop {
                    let raw_event = match midi_events_rx.recv().await {
                        Some(raw_event) => raw_event,
                        None => {
                            info!("MIDI watcher closed.");
                            device.stop_watch_events();
                            return Ok(());
                        }
                    };

                    let event = match LiveEvent::parse(&raw_event) {
                        Ok(event) => event,
                        Err(e) => {
                            error!(err = format!("{:?}", e), "Error parsing event.");
                            continue;
                        }
                    };

                    let Some(event) = mapping.event_for(&event) else {
                        continue;
                    };
                    if events_tx.send(event).await.is_err() {
                        info!("Controller closed, no longer watching MIDI.");
                        device.stop_watch_events();
                        return Ok(());
                    }
                }
            }
            .instrument(span!(Level::INFO, "MIDI events")),
        )
    }
}
