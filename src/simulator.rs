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
//! Applies controller input to the shared playback.

use tracing::{debug, info};

use crate::audio::SharedPlayback;
use crate::controller::Event;
use crate::fingering::{chart, FingeringKey, KeyTracker};

/// Owns the pressed state and pushes every fingering change into the playback.
pub struct Simulator {
    playback: SharedPlayback,
    tracker: KeyTracker,
    volume_step: f64,
}

impl Simulator {
    /// Creates a new simulator over the given playback. Volume events move the volume
    /// by `volume_step`.
    pub fn new(playback: SharedPlayback, volume_step: f64) -> Simulator {
        Simulator {
            playback,
            tracker: KeyTracker::new(),
            volume_step,
        }
    }

    /// Handles a single controller event.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Press(control) => {
                let change = self.tracker.press(control);
                self.apply(change);
            }
            Event::Release(control) => {
                let change = self.tracker.release(control);
                self.apply(change);
            }
            Event::VolumeUp => self.adjust_volume(self.volume_step),
            Event::VolumeDown => self.adjust_volume(-self.volume_step),
        }
    }

    /// Recomputes the fingering once per frame.
    pub fn frame(&mut self) {
        let change = self.tracker.frame();
        self.apply(change);
    }

    /// Returns the shared playback.
    pub fn playback(&self) -> &SharedPlayback {
        &self.playback
    }

    /// Returns the key tracker.
    pub fn tracker(&self) -> &KeyTracker {
        &self.tracker
    }

    fn adjust_volume(&self, step: f64) {
        let volume = self.playback.lock().adjust_volume(step);
        info!(volume, "Volume set.");
    }

    fn apply(&self, change: Option<FingeringKey>) {
        let Some(key) = change else {
            return;
        };

        let found = self.playback.lock().select(key.as_str());
        if found {
            debug!(
                key = %key,
                note = chart::note_name(key.as_str()).unwrap_or("?"),
                "Playing note."
            );
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use crate::audio::{bank::SampleBank, streamer::SelectStreamer, Frame, Playback};
    use crate::fingering::{Control, Harmonic, Valve};

    use super::*;

    fn harmonic(index: u8) -> Control {
        Control::Harmonic(Harmonic::new(index).unwrap())
    }

    fn valve(number: u8) -> Control {
        Control::Valve(Valve::new(number).unwrap())
    }

    fn simulator() -> Simulator {
        let mut builder = SampleBank::builder(1000);
        builder
            .insert_frames("70".parse().unwrap(), vec![[0.5, 0.5]; 1000])
            .unwrap()
            .insert_frames("72".parse().unwrap(), vec![[0.25, 0.25]; 1000])
            .unwrap()
            .insert_frames("00".parse().unwrap(), vec![[0.125, 0.125]; 1000])
            .unwrap();
        let streamer = SelectStreamer::new(builder.build().unwrap().into(), Duration::from_millis(500));
        let playback = Playback::new(streamer, 1.0, 2.0, 0.0).unwrap().shared();
        Simulator::new(playback, 0.5)
    }

    fn active(simulator: &Simulator) -> Option<String> {
        simulator
            .playback()
            .lock()
            .streamer()
            .active_key()
            .map(|key| key.to_string())
    }

    fn position(simulator: &Simulator) -> Option<usize> {
        simulator.playback().lock().streamer().position()
    }

    #[test]
    fn test_fingerings_select_notes() {
        let mut simulator = simulator();
        assert_eq!(active(&simulator), None);

        simulator.handle_event(Event::Press(harmonic(7)));
        assert_eq!(active(&simulator).as_deref(), Some("70"));
        assert_eq!(position(&simulator), Some(0));

        // Changing valves mid-note moves to the sustain point of the new note.
        simulator.handle_event(Event::Press(valve(2)));
        assert_eq!(active(&simulator).as_deref(), Some("72"));
        assert_eq!(position(&simulator), Some(500));

        // A fingering with no note goes silent.
        simulator.handle_event(Event::Press(valve(1)));
        assert_eq!(active(&simulator), None);
        let mut block: Vec<Frame> = vec![[1.0, 1.0]; 4];
        simulator.playback().lock().fill(&mut block);
        assert_eq!(block, vec![[0.0, 0.0]; 4]);

        // Coming back from silence starts the note from the top.
        simulator.handle_event(Event::Release(valve(1)));
        assert_eq!(active(&simulator).as_deref(), Some("72"));
        assert_eq!(position(&simulator), Some(0));

        simulator.handle_event(Event::Release(harmonic(7)));
        assert_eq!(active(&simulator), None);
        assert!(simulator.tracker().applied().is_none());
    }

    #[test]
    fn test_frame_without_changes_keeps_position() {
        let mut simulator = simulator();
        simulator.handle_event(Event::Press(harmonic(0)));
        let mut block: Vec<Frame> = vec![[0.0, 0.0]; 100];
        simulator.playback().lock().fill(&mut block);
        assert_eq!(block[0], [0.125, 0.125]);

        simulator.frame();
        assert_eq!(active(&simulator).as_deref(), Some("00"));
        assert_eq!(position(&simulator), Some(100));
    }

    #[test]
    fn test_volume_events() {
        let mut simulator = simulator();
        simulator.handle_event(Event::VolumeUp);
        simulator.handle_event(Event::VolumeUp);
        assert_eq!(simulator.playback().lock().volume(), 1.0);

        simulator.handle_event(Event::Press(harmonic(7)));
        let mut block: Vec<Frame> = vec![[0.0, 0.0]; 2];
        simulator.playback().lock().fill(&mut block);
        assert_eq!(block, vec![[1.0, 1.0]; 2]);

        simulator.handle_event(Event::VolumeDown);
        assert_eq!(simulator.playback().lock().volume(), 0.5);
    }
}
