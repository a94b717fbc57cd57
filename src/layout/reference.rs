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

//! The reference button table: a two-row G/C box with an eight-button bass
//! side, written in the reference key of C. All other tonalities are produced
//! by transposing this table.

use crate::theory::ChordQuality;

use super::{BellowsDirection, ButtonCoordinate, ButtonDefinition};

/// Treble rows: (row, push notes, pull notes), one (name, octave) per column.
const TREBLE_ROWS: [(u8, [(&str, i32); 10], [(&str, i32); 10]); 2] = [
    (
        1,
        [
            ("D", 3),
            ("G", 3),
            ("B", 3),
            ("D", 4),
            ("G", 4),
            ("B", 4),
            ("D", 5),
            ("G", 5),
            ("B", 5),
            ("D", 6),
        ],
        [
            ("F#", 3),
            ("A", 3),
            ("C", 4),
            ("E", 4),
            ("F#", 4),
            ("A", 4),
            ("C", 5),
            ("E", 5),
            ("F#", 5),
            ("A", 5),
        ],
    ),
    (
        2,
        [
            ("G", 3),
            ("C", 4),
            ("E", 4),
            ("G", 4),
            ("C", 5),
            ("E", 5),
            ("G", 5),
            ("C", 6),
            ("E", 6),
            ("G", 6),
        ],
        [
            ("B", 3),
            ("D", 4),
            ("F", 4),
            ("A", 4),
            ("B", 4),
            ("D", 5),
            ("F", 5),
            ("A", 5),
            ("B", 5),
            ("D", 6),
        ],
    ),
];

/// Bass row 3: (column, push (name, octave, quality), pull (name, octave,
/// quality)). Odd columns are bass notes, even columns their chords.
const BASS_BUTTONS: [(
    u8,
    (&str, i32, ChordQuality),
    (&str, i32, ChordQuality),
); 8] = [
    (
        1,
        ("C", 2, ChordQuality::Single),
        ("G", 2, ChordQuality::Single),
    ),
    (
        2,
        ("C", 3, ChordQuality::Major),
        ("G", 2, ChordQuality::Major),
    ),
    (
        3,
        ("F", 2, ChordQuality::Single),
        ("D", 2, ChordQuality::Single),
    ),
    (
        4,
        ("F", 2, ChordQuality::Major),
        ("D", 3, ChordQuality::Minor),
    ),
    (
        5,
        ("A", 2, ChordQuality::Single),
        ("E", 2, ChordQuality::Single),
    ),
    (
        6,
        ("A", 2, ChordQuality::Minor),
        ("E", 3, ChordQuality::Minor),
    ),
    (
        7,
        ("G", 2, ChordQuality::Single),
        ("B", 2, ChordQuality::Single),
    ),
    (
        8,
        ("G", 3, ChordQuality::Major),
        ("B", 2, ChordQuality::Minor),
    ),
];

/// Returns the full reference button table for the key of C.
pub fn reference_buttons() -> Vec<ButtonDefinition> {
    let mut buttons = Vec::new();

    for (row, push, pull) in TREBLE_ROWS {
        for (direction, notes) in [
            (BellowsDirection::Push, push),
            (BellowsDirection::Pull, pull),
        ] {
            for (column, (name, octave)) in notes.iter().enumerate() {
                buttons.push(ButtonDefinition {
                    coordinate: ButtonCoordinate {
                        row,
                        column: column as u8 + 1,
                        direction,
                        bass: false,
                    },
                    root_name: name,
                    root_octave: *octave,
                    quality: ChordQuality::Single,
                });
            }
        }
    }

    for (column, push, pull) in BASS_BUTTONS {
        for (direction, (name, octave, quality)) in [
            (BellowsDirection::Push, push),
            (BellowsDirection::Pull, pull),
        ] {
            buttons.push(ButtonDefinition {
                coordinate: ButtonCoordinate {
                    row: 3,
                    column,
                    direction,
                    bass: true,
                },
                root_name: name,
                root_octave: octave,
                quality,
            });
        }
    }

    buttons
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_shape() {
        let buttons = reference_buttons();
        // 2 rows * 10 columns * 2 directions + 8 bass * 2 directions.
        assert_eq!(buttons.len(), 2 * 10 * 2 + 8 * 2);

        let ids: std::collections::HashSet<String> =
            buttons.iter().map(|b| b.coordinate.id()).collect();
        assert_eq!(ids.len(), buttons.len(), "duplicate button coordinates");
    }

    #[test]
    fn test_treble_buttons_are_singles() {
        for button in reference_buttons() {
            if !button.coordinate.bass {
                assert_eq!(button.quality, ChordQuality::Single);
            }
        }
    }
}
