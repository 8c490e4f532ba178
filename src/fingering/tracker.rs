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
use tracing::trace;

use super::{Control, FingeringKey, Selection};

/// Tracks the pressed controls and reports when the derived fingering key changes.
///
/// The key is recomputed on every input edge and on every frame. A key is only
/// reported when it differs from the last reported one, so the caller only has
/// to touch the streamer on an actual change.
#[derive(Debug, Default)]
pub struct KeyTracker {
    /// The currently pressed controls.
    selection: Selection,
    /// The last key handed out to the caller.
    applied: FingeringKey,
}

impl KeyTracker {
    /// Creates a new tracker with nothing pressed.
    pub fn new() -> KeyTracker {
        KeyTracker::default()
    }

    /// Handles a press. Returns the new key if it changed.
    pub fn press(&mut self, control: Control) -> Option<FingeringKey> {
        self.selection.press(control);
        self.recompute()
    }

    /// Handles a release. Returns the new key if it changed.
    pub fn release(&mut self, control: Control) -> Option<FingeringKey> {
        self.selection.release(control);
        self.recompute()
    }

    /// Recomputes the key once per frame. Returns the new key if it changed.
    pub fn frame(&mut self) -> Option<FingeringKey> {
        self.recompute()
    }

    /// Returns the current pressed state.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Returns the last key handed out.
    pub fn applied(&self) -> &FingeringKey {
        &self.applied
    }

    fn recompute(&mut self) -> Option<FingeringKey> {
        let key = self.selection.fingering_key();
        if key == self.applied {
            return None;
        }

        trace!(from = %self.applied, to = %key, "Fingering changed.");
        self.applied = key.clone();
        Some(key)
    }
}

#[cfg(test)]
mod test {
    use crate::fingering::{Harmonic, Valve};

    use super::*;

    fn harmonic(index: u8) -> Control {
        Control::Harmonic(Harmonic::new(index).unwrap())
    }

    fn valve(number: u8) -> Control {
        Control::Valve(Valve::new(number).unwrap())
    }

    fn key(s: &str) -> Option<FingeringKey> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn test_initial_state_reports_nothing() {
        let mut tracker = KeyTracker::new();
        assert_eq!(tracker.frame(), None);
        assert!(tracker.applied().is_none());

        // Valves without a harmonic still derive the empty key.
        assert_eq!(tracker.press(valve(1)), None);
        assert_eq!(tracker.frame(), None);
    }

    #[test]
    fn test_reports_only_changes() {
        let mut tracker = KeyTracker::new();
        assert_eq!(tracker.press(harmonic(7)), key("70"));
        assert_eq!(tracker.frame(), None);
        assert_eq!(tracker.press(harmonic(7)), None);

        assert_eq!(tracker.press(valve(2)), key("72"));
        assert_eq!(tracker.frame(), None);

        // Releasing a valve that isn't held changes nothing.
        assert_eq!(tracker.release(valve(3)), None);

        assert_eq!(tracker.release(harmonic(7)), Some(FingeringKey::none()));
        assert_eq!(tracker.frame(), None);
        assert_eq!(tracker.selection().harmonic(), None);
        assert!(tracker.selection().is_held(Valve::Second));
    }

    #[test]
    fn test_harmonic_change_while_sustaining() {
        let mut tracker = KeyTracker::new();
        assert_eq!(tracker.press(harmonic(0)), key("00"));
        assert_eq!(tracker.press(harmonic(1)), key("10"));

        // Releasing the superseded harmonic keeps the note.
        assert_eq!(tracker.release(harmonic(0)), None);
        assert_eq!(tracker.applied().as_str(), "10");
    }
}
