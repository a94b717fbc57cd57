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

//! Pitch-class math shared by the layout generator and the sample resolver.
//!
//! Notes cross the module boundary as (name, octave) pairs; internally
//! everything is a chromatic index in a fixed 12-tone ordering so that
//! transposition and distance calculations are plain integer arithmetic.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Number of semitones in an octave.
pub const SEMITONES_PER_OCTAVE: i32 = 12;

/// Frequency returned for a note the frequency table cannot spell.
/// Callers treat this as "unplayable" rather than an error.
pub const SENTINEL_FREQUENCY: f32 = 0.0;

/// Note names in chromatic order, spelled with sharps.
pub const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Note names in chromatic order, spelled with flats.
pub const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Which accidental table to use when re-spelling transposed notes.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Spelling {
    Sharps,
    Flats,
}

impl Spelling {
    /// Spells a chromatic index (0-11) using this table.
    pub fn spell(&self, index: i32) -> &'static str {
        let index = index.rem_euclid(SEMITONES_PER_OCTAVE) as usize;
        match self {
            Spelling::Sharps => SHARP_NAMES[index],
            Spelling::Flats => FLAT_NAMES[index],
        }
    }
}

/// Returns the chromatic index (0-11) of a note name, normalizing enharmonic
/// spellings. Returns `None` for names outside the known vocabulary.
pub fn chromatic_index(name: &str) -> Option<i32> {
    let index = match name {
        "C" | "B#" => 0,
        "C#" | "Db" => 1,
        "D" => 2,
        "D#" | "Eb" => 3,
        "E" | "Fb" => 4,
        "F" | "E#" => 5,
        "F#" | "Gb" => 6,
        "G" => 7,
        "G#" | "Ab" => 8,
        "A" => 9,
        "A#" | "Bb" => 10,
        "B" | "Cb" => 11,
        _ => return None,
    };
    Some(index)
}

/// Converts a note to its absolute semitone number (C0 = 0). This is the
/// coordinate space the resolver measures distances in.
pub fn absolute_semitone(name: &str, octave: i32) -> Option<i32> {
    Some(octave * SEMITONES_PER_OCTAVE + chromatic_index(name)?)
}

/// The quality of the sound a button produces.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChordQuality {
    Single,
    Major,
    Minor,
}

impl ChordQuality {
    /// Returns the interval stack (in semitones from the root) this quality
    /// expands to. Singles are just the root.
    pub fn intervals(&self) -> &'static [i32] {
        match self {
            ChordQuality::Single => &[0],
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
        }
    }
}

/// Equal-temperament frequency table covering the instrument's range.
///
/// Keyed by spelled name so both accidental tables hit; a lookup outside the
/// octave range falls back to the nearest available octave, and an unknown
/// name degrades to [`SENTINEL_FREQUENCY`].
pub struct FrequencyTable {
    frequencies: HashMap<(String, i32), f32>,
    min_octave: i32,
    max_octave: i32,
}

impl FrequencyTable {
    /// Builds the table for octaves 0 through 8, A4 = 440Hz.
    pub fn new() -> Self {
        let (min_octave, max_octave) = (0, 8);
        let mut frequencies = HashMap::new();
        for octave in min_octave..=max_octave {
            for index in 0..SEMITONES_PER_OCTAVE {
                // A4 is chromatic index 9 in octave 4, absolute semitone 57.
                let distance_from_a4 = (octave * SEMITONES_PER_OCTAVE + index - 57) as f32;
                let frequency = 440.0 * (distance_from_a4 / 12.0).exp2();
                for name in [SHARP_NAMES[index as usize], FLAT_NAMES[index as usize]] {
                    frequencies.insert((name.to_string(), octave), frequency);
                }
            }
        }
        Self {
            frequencies,
            min_octave,
            max_octave,
        }
    }

    /// Looks up the frequency for a spelled note. Out-of-range octaves clamp
    /// to the nearest available octave rather than failing.
    pub fn frequency(&self, name: &str, octave: i32) -> f32 {
        let octave = octave.clamp(self.min_octave, self.max_octave);
        match self.frequencies.get(&(name.to_string(), octave)) {
            Some(frequency) => *frequency,
            None => SENTINEL_FREQUENCY,
        }
    }
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chromatic_index_enharmonics() {
        assert_eq!(chromatic_index("C"), Some(0));
        assert_eq!(chromatic_index("B#"), Some(0));
        assert_eq!(chromatic_index("C#"), Some(1));
        assert_eq!(chromatic_index("Db"), Some(1));
        assert_eq!(chromatic_index("Gb"), Some(6));
        assert_eq!(chromatic_index("F#"), Some(6));
        assert_eq!(chromatic_index("Cb"), Some(11));
        assert_eq!(chromatic_index("H"), None);
    }

    #[test]
    fn test_absolute_semitone() {
        assert_eq!(absolute_semitone("C", 0), Some(0));
        assert_eq!(absolute_semitone("A", 4), Some(57));
        assert_eq!(absolute_semitone("B", 3), Some(47));
        assert_eq!(absolute_semitone("X", 3), None);
    }

    #[test]
    fn test_spelling() {
        assert_eq!(Spelling::Sharps.spell(1), "C#");
        assert_eq!(Spelling::Flats.spell(1), "Db");
        // Wraps modulo 12, including negatives.
        assert_eq!(Spelling::Sharps.spell(13), "C#");
        assert_eq!(Spelling::Flats.spell(-2), "Bb");
    }

    #[test]
    fn test_chord_intervals() {
        assert_eq!(ChordQuality::Single.intervals(), &[0]);
        assert_eq!(ChordQuality::Major.intervals(), &[0, 4, 7]);
        assert_eq!(ChordQuality::Minor.intervals(), &[0, 3, 7]);
    }

    #[test]
    fn test_frequency_table() {
        let table = FrequencyTable::new();
        assert!((table.frequency("A", 4) - 440.0).abs() < 0.001);
        assert!((table.frequency("A", 3) - 220.0).abs() < 0.001);
        // Both spellings resolve to the same pitch.
        assert_eq!(table.frequency("C#", 4), table.frequency("Db", 4));
        // Octave outside the table clamps to the nearest edge.
        assert_eq!(table.frequency("C", 12), table.frequency("C", 8));
        // Unknown names degrade to the sentinel, not an error.
        assert_eq!(table.frequency("X", 4), SENTINEL_FREQUENCY);
    }
}
