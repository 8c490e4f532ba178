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

//! The standard trumpet fingering chart.

use super::{Harmonic, Valve};

/// A playable fingering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartEntry {
    /// The fingering key.
    pub key: &'static str,
    /// The written note name.
    pub note: &'static str,
    /// The name of the recorded sample (concert pitch), used as the default file stem.
    pub sample: &'static str,
}

const fn entry(key: &'static str, note: &'static str, sample: &'static str) -> ChartEntry {
    ChartEntry { key, note, sample }
}

/// Every playable fingering, lowest harmonic first.
pub const CHART: &[ChartEntry] = &[
    // Fundamental (C4)
    entry("0123", "F#3", "%1-E 3"),
    entry("013", "G3", "%2-F 3"),
    entry("023", "G#3", "%3-F+3"),
    entry("012", "A3", "%4-G 3"),
    entry("01", "Bb3", "%5-G+3"),
    entry("02", "B3", "%6-A 3"),
    entry("00", "C4", "%7-A+3"),
    // 1st harmonic (G4)
    entry("1123", "C#4", "%8-B 3"),
    entry("113", "D4", "01-C 4"),
    entry("123", "Eb4", "02-C+4"),
    entry("112", "E4", "03-D 4"),
    entry("11", "F4", "04-D+4"),
    entry("12", "F#4", "05-E 4"),
    entry("10", "G4", "06-F 4"),
    // 2nd harmonic (C5)
    entry("223", "G#4", "07-F+4"),
    entry("212", "A4", "08-G 4"),
    entry("21", "Bb4", "09-G+4"),
    entry("22", "B4", "10-A 4"),
    entry("20", "C5", "11-A+4"),
    // 3rd harmonic (E5)
    entry("312", "C#5", "12-B 4"),
    entry("31", "D5", "13-C 5"),
    entry("32", "Eb5", "14-C+5"),
    entry("30", "E5", "15-D 5"),
    // 4th harmonic (G5)
    entry("41", "F5", "16-D+5"),
    entry("42", "F#5", "17-E 5"),
    entry("40", "G5", "18-F 5"),
    // 5th harmonic (Bb5)
    entry("51", "G#5", "19-F+5"),
    entry("52", "A5", "20-G 5"),
    entry("50", "Bb5", "21-G+5"),
    // 6th harmonic (C6)
    entry("62", "B5", "22-A 5"),
    entry("60", "C6", "23-A+5"),
    // 7th harmonic (D6)
    entry("72", "C#6", "24-B 5"),
    entry("70", "D6", "25-C 6"),
    // 8th harmonic (E6)
    entry("82", "Eb6", "26-C+6"),
    entry("80", "E6", "27-D 6"),
    // 9th harmonic (F6)
    entry("90", "F6", "28-D+6"),
];

/// Looks up the chart entry for a fingering key.
pub fn lookup(key: &str) -> Option<&'static ChartEntry> {
    CHART.iter().find(|entry| entry.key == key)
}

/// Returns the written note name for a fingering key.
pub fn note_name(key: &str) -> Option<&'static str> {
    lookup(key).map(|entry| entry.note)
}

/// Returns the note played on a harmonic with no valves pressed.
pub fn open_note(harmonic: Harmonic) -> Option<&'static str> {
    CHART
        .iter()
        .find(|entry| {
            entry.key.len() == 2 && entry.key.starts_with(digit(harmonic)) && entry.key.ends_with('0')
        })
        .map(|entry| entry.note)
}

/// Returns the valves that take part in at least one fingering on the given
/// harmonic. Other valves have no effect there.
pub fn playable_valves(harmonic: Harmonic) -> Vec<Valve> {
    let prefix = digit(harmonic);
    Valve::ALL
        .into_iter()
        .filter(|valve| {
            let number = char::from(b'0' + valve.number());
            CHART
                .iter()
                .filter(|entry| entry.key.starts_with(prefix))
                .any(|entry| entry.key[1..].contains(number))
        })
        .collect()
}

fn digit(harmonic: Harmonic) -> char {
    char::from(b'0' + harmonic.index())
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use crate::fingering::FingeringKey;

    use super::*;

    #[test]
    fn test_chart_keys_are_unique_and_valid() {
        let mut seen = HashSet::new();
        for entry in CHART {
            assert!(seen.insert(entry.key), "duplicate key {}", entry.key);
            let key: FingeringKey = entry.key.parse().unwrap();
            assert!(key.harmonic().is_some());
        }
        assert_eq!(CHART.len(), 36);
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_name("70"), Some("D6"));
        assert_eq!(note_name("00"), Some("C4"));
        assert_eq!(note_name("0123"), Some("F#3"));
        assert_eq!(note_name("71"), None);
        assert_eq!(note_name(""), None);
    }

    #[test]
    fn test_open_notes() {
        let opens: Vec<&str> = Harmonic::all().filter_map(open_note).collect();
        assert_eq!(
            opens,
            vec!["C4", "G4", "C5", "E5", "G5", "Bb5", "C6", "D6", "E6", "F6"]
        );
    }

    #[test]
    fn test_playable_valves() {
        let all = vec![Valve::First, Valve::Second, Valve::Third];
        assert_eq!(playable_valves(Harmonic::new(0).unwrap()), all);
        assert_eq!(playable_valves(Harmonic::new(2).unwrap()), all);
        assert_eq!(
            playable_valves(Harmonic::new(4).unwrap()),
            vec![Valve::First, Valve::Second]
        );
        assert_eq!(
            playable_valves(Harmonic::new(7).unwrap()),
            vec![Valve::Second]
        );
        assert!(playable_valves(Harmonic::new(9).unwrap()).is_empty());
    }
}
