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

//! Trumpet fingerings.
//!
//! A fingering is one of ten mutually exclusive harmonics combined with any
//! subset of the three valves. The pressed state is tracked by [`Selection`],
//! and the key used to look a note up in the sample bank is derived from it
//! by [`Selection::fingering_key`].

use std::{borrow::Borrow, fmt, str::FromStr};

pub mod chart;
pub mod tracker;

pub use tracker::KeyTracker;

/// The number of harmonic controls.
pub const HARMONIC_COUNT: u8 = 10;

/// The suffix used when no valve is held.
const OPEN_SUFFIX: char = '0';

/// Errors produced while parsing controls and fingering keys.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum FingeringError {
    #[error("harmonic {0} is out of range (0-9)")]
    HarmonicOutOfRange(u8),

    #[error("valve {0} is out of range (1-3)")]
    ValveOutOfRange(u8),

    #[error("unrecognized control '{0}'")]
    UnknownControl(String),

    #[error("malformed fingering key '{0}'")]
    MalformedKey(String),
}

/// A position in the overtone series, from the fundamental (0) to the 9th partial.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Harmonic(u8);

impl Harmonic {
    /// Creates a harmonic from its index.
    pub fn new(index: u8) -> Result<Harmonic, FingeringError> {
        if index >= HARMONIC_COUNT {
            return Err(FingeringError::HarmonicOutOfRange(index));
        }
        Ok(Harmonic(index))
    }

    /// Returns the index of the harmonic.
    pub fn index(self) -> u8 {
        self.0
    }

    /// Iterates over all harmonics, lowest first.
    pub fn all() -> impl Iterator<Item = Harmonic> {
        (0..HARMONIC_COUNT).map(Harmonic)
    }
}

impl fmt::Display for Harmonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// One of the three trumpet valves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Valve {
    First,
    Second,
    Third,
}

impl Valve {
    /// All valves in slot order.
    pub const ALL: [Valve; 3] = [Valve::First, Valve::Second, Valve::Third];

    /// Creates a valve from its number (1-3).
    pub fn new(number: u8) -> Result<Valve, FingeringError> {
        match number {
            1 => Ok(Valve::First),
            2 => Ok(Valve::Second),
            3 => Ok(Valve::Third),
            _ => Err(FingeringError::ValveOutOfRange(number)),
        }
    }

    /// Returns the valve number (1-3).
    pub fn number(self) -> u8 {
        self.slot() as u8 + 1
    }

    fn slot(self) -> usize {
        match self {
            Valve::First => 0,
            Valve::Second => 1,
            Valve::Third => 2,
        }
    }
}

impl fmt::Display for Valve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// An input control that participates in the fingering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Control {
    Harmonic(Harmonic),
    Valve(Valve),
}

impl Control {
    /// Maps the computer keyboard layout of the desktop simulator onto controls:
    /// `` ` `` and `1`-`9` select harmonics 0-9, `0`, `-` and `=` are the valves.
    pub fn from_key_name(name: &str) -> Option<Control> {
        let control = match name {
            "`" => Control::Harmonic(Harmonic(0)),
            "0" => Control::Valve(Valve::First),
            "-" => Control::Valve(Valve::Second),
            "=" => Control::Valve(Valve::Third),
            _ => {
                let digit = name.parse::<u8>().ok()?;
                Control::Harmonic(Harmonic::new(digit).ok()?)
            }
        };
        Some(control)
    }
}

impl FromStr for Control {
    type Err = FingeringError;

    /// Parses `h0`-`h9` and `v1`-`v3`, falling back to the keyboard key names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || FingeringError::UnknownControl(s.to_string());

        if s.len() == 2 {
            let (prefix, number) = s.split_at(1);
            if let Ok(number) = number.parse::<u8>() {
                match prefix {
                    "h" | "H" => return Ok(Control::Harmonic(Harmonic::new(number)?)),
                    "v" | "V" => return Ok(Control::Valve(Valve::new(number)?)),
                    _ => {}
                }
            }
        }

        Control::from_key_name(s).ok_or_else(unknown)
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Harmonic(harmonic) => harmonic.fmt(f),
            Control::Valve(valve) => valve.fmt(f),
        }
    }
}

/// The currently pressed controls.
///
/// Harmonics are mutually exclusive: the most recently pressed one wins, and
/// releasing it leaves no harmonic selected. Valves are independent toggles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    harmonic: Option<Harmonic>,
    valves: [bool; 3],
}

impl Selection {
    /// Records a press of the given control.
    pub fn press(&mut self, control: Control) {
        match control {
            Control::Harmonic(harmonic) => self.harmonic = Some(harmonic),
            Control::Valve(valve) => self.valves[valve.slot()] = true,
        }
    }

    /// Records a release of the given control. Releasing a harmonic other than
    /// the selected one does nothing.
    pub fn release(&mut self, control: Control) {
        match control {
            Control::Harmonic(harmonic) => {
                if self.harmonic == Some(harmonic) {
                    self.harmonic = None;
                }
            }
            Control::Valve(valve) => self.valves[valve.slot()] = false,
        }
    }

    /// Returns the selected harmonic, if any.
    pub fn harmonic(&self) -> Option<Harmonic> {
        self.harmonic
    }

    /// Returns true if the given valve is held.
    pub fn is_held(&self, valve: Valve) -> bool {
        self.valves[valve.slot()]
    }

    /// Iterates over the held valves in slot order.
    pub fn held_valves(&self) -> impl Iterator<Item = Valve> + '_ {
        Valve::ALL.into_iter().filter(|valve| self.is_held(*valve))
    }

    /// Derives the fingering key for the current state.
    pub fn fingering_key(&self) -> FingeringKey {
        match self.harmonic {
            Some(harmonic) => FingeringKey::from_parts(harmonic, self.held_valves()),
            None => FingeringKey::none(),
        }
    }
}

/// The lookup key into the sample bank: the harmonic digit followed by the
/// held valve numbers in slot order, or `0` when no valve is held. The empty
/// key means no note is selected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FingeringKey(String);

impl FingeringKey {
    /// The key for "no selection".
    pub fn none() -> FingeringKey {
        FingeringKey(String::new())
    }

    /// Builds the key for a harmonic and a set of valves. The valve order given
    /// does not matter.
    pub fn from_parts<I>(harmonic: Harmonic, valves: I) -> FingeringKey
    where
        I: IntoIterator<Item = Valve>,
    {
        let mut held = [false; 3];
        for valve in valves {
            held[valve.slot()] = true;
        }

        let mut key = harmonic.index().to_string();
        for valve in Valve::ALL.into_iter().filter(|valve| held[valve.slot()]) {
            key.push(char::from(b'0' + valve.number()));
        }
        if key.len() == 1 {
            key.push(OPEN_SUFFIX);
        }

        FingeringKey(key)
    }

    /// Returns true if this is the "no selection" key.
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the harmonic this key starts with.
    pub fn harmonic(&self) -> Option<Harmonic> {
        let digit = self.0.chars().next()?.to_digit(10)?;
        Harmonic::new(digit as u8).ok()
    }

    /// Returns the valves encoded in this key, in slot order.
    pub fn valves(&self) -> Vec<Valve> {
        self.0
            .chars()
            .skip(1)
            .filter_map(|c| c.to_digit(10))
            .filter_map(|digit| Valve::new(digit as u8).ok())
            .collect()
    }
}

impl FromStr for FingeringKey {
    type Err = FingeringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(FingeringKey::none());
        }

        let malformed = || FingeringError::MalformedKey(s.to_string());
        let mut chars = s.chars();
        let harmonic = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(malformed)?;
        let suffix = chars.as_str();

        if suffix == OPEN_SUFFIX.to_string() {
            return Ok(FingeringKey(s.to_string()));
        }

        // Valve digits must be non-empty and strictly increasing within 1-3.
        let mut last = 0;
        for c in suffix.chars() {
            let digit = c.to_digit(10).ok_or_else(malformed)? as u8;
            if digit <= last || digit > 3 {
                return Err(malformed());
            }
            last = digit;
        }
        if last == 0 {
            return Err(malformed());
        }

        Harmonic::new(harmonic as u8)?;
        Ok(FingeringKey(s.to_string()))
    }
}

impl Borrow<str> for FingeringKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FingeringKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn harmonic(index: u8) -> Control {
        Control::Harmonic(Harmonic::new(index).unwrap())
    }

    fn valve(number: u8) -> Control {
        Control::Valve(Valve::new(number).unwrap())
    }

    #[test]
    fn test_no_harmonic_is_empty_key() {
        let mut selection = Selection::default();
        assert!(selection.fingering_key().is_none());

        // Valves alone never select a note.
        selection.press(valve(1));
        selection.press(valve(3));
        assert_eq!(selection.fingering_key(), FingeringKey::none());
    }

    #[test]
    fn test_open_fingering() {
        let mut selection = Selection::default();
        selection.press(harmonic(7));
        assert_eq!(selection.fingering_key().as_str(), "70");

        selection.press(harmonic(0));
        assert_eq!(selection.fingering_key().as_str(), "00");
    }

    #[test]
    fn test_valves_in_slot_order() {
        let mut selection = Selection::default();
        selection.press(valve(3));
        selection.press(harmonic(0));
        selection.press(valve(1));
        assert_eq!(selection.fingering_key().as_str(), "013");

        selection.press(valve(2));
        assert_eq!(selection.fingering_key().as_str(), "0123");

        selection.release(valve(1));
        assert_eq!(selection.fingering_key().as_str(), "023");
    }

    #[test]
    fn test_last_pressed_harmonic_wins() {
        let mut selection = Selection::default();
        selection.press(harmonic(2));
        selection.press(harmonic(5));
        assert_eq!(selection.harmonic(), Harmonic::new(5).ok());

        // Releasing a harmonic that isn't selected changes nothing.
        selection.release(harmonic(2));
        assert_eq!(selection.fingering_key().as_str(), "50");

        // Releasing the selected harmonic doesn't fall back to an earlier one.
        selection.press(harmonic(2));
        selection.press(harmonic(5));
        selection.release(harmonic(5));
        assert_eq!(selection.harmonic(), None);
        assert!(selection.fingering_key().is_none());
    }

    #[test]
    fn test_from_parts_ignores_order() {
        let key = FingeringKey::from_parts(
            Harmonic::new(1).unwrap(),
            [Valve::Third, Valve::First, Valve::Second],
        );
        assert_eq!(key.as_str(), "1123");
        assert_eq!(key.harmonic(), Harmonic::new(1).ok());
        assert_eq!(key.valves(), vec![Valve::First, Valve::Second, Valve::Third]);
    }

    #[test]
    fn test_parse_fingering_key() {
        for valid in ["", "00", "70", "0123", "113", "23", "90"] {
            let key: FingeringKey = valid.parse().unwrap();
            assert_eq!(key.as_str(), valid);
        }

        for invalid in ["7", "x0", "700", "721", "74", "0112", "h7", "7 0"] {
            assert_eq!(
                invalid.parse::<FingeringKey>(),
                Err(FingeringError::MalformedKey(invalid.to_string())),
                "{} should be rejected",
                invalid
            );
        }
    }

    #[test]
    fn test_parse_control() {
        assert_eq!("h7".parse::<Control>().unwrap(), harmonic(7));
        assert_eq!("H0".parse::<Control>().unwrap(), harmonic(0));
        assert_eq!("v2".parse::<Control>().unwrap(), valve(2));
        assert_eq!(
            "h9".parse::<Control>().unwrap().to_string(),
            String::from("h9")
        );
        assert_eq!(
            "v4".parse::<Control>(),
            Err(FingeringError::ValveOutOfRange(4))
        );
        assert_eq!(
            "trumpet".parse::<Control>(),
            Err(FingeringError::UnknownControl("trumpet".to_string()))
        );
    }

    #[test]
    fn test_key_names() {
        assert_eq!(Control::from_key_name("`"), Some(harmonic(0)));
        assert_eq!(Control::from_key_name("5"), Some(harmonic(5)));
        assert_eq!(Control::from_key_name("0"), Some(valve(1)));
        assert_eq!(Control::from_key_name("-"), Some(valve(2)));
        assert_eq!(Control::from_key_name("="), Some(valve(3)));
        assert_eq!(Control::from_key_name("["), None);
        assert_eq!("9".parse::<Control>().unwrap(), harmonic(9));
    }
}
