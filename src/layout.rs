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

//! Button layout generation.
//!
//! Every supported tonality is a semitone-shifted relabeling of one reference
//! layout: `generate` transposes each reference button, re-spells it with the
//! tonality's accidental table, and attaches frequencies. Generation is pure,
//! so the registry builds each layout exactly once at startup.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::theory::{
    chromatic_index, ChordQuality, FrequencyTable, Spelling, SEMITONES_PER_OCTAVE,
    SENTINEL_FREQUENCY,
};

pub mod reference;

/// The bellows motion. Each motion sounds different pitches for the same
/// physical button.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BellowsDirection {
    Pull,
    Push,
}

impl BellowsDirection {
    /// The token used in serialized button ids.
    pub fn token(&self) -> &'static str {
        match self {
            BellowsDirection::Pull => "pull",
            BellowsDirection::Push => "push",
        }
    }

    /// The opposite motion.
    pub fn opposite(&self) -> BellowsDirection {
        match self {
            BellowsDirection::Pull => BellowsDirection::Push,
            BellowsDirection::Push => BellowsDirection::Pull,
        }
    }
}

impl fmt::Display for BellowsDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// The position of a button on the instrument. Serializes to the canonical
/// string id `{row}-{column}-{direction}[-bass]` at the boundary; core logic
/// always works with the parsed value type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ButtonCoordinate {
    pub row: u8,
    pub column: u8,
    pub direction: BellowsDirection,
    pub bass: bool,
}

impl ButtonCoordinate {
    /// Formats the canonical string id for this coordinate.
    pub fn id(&self) -> String {
        if self.bass {
            format!("{}-{}-{}-bass", self.row, self.column, self.direction)
        } else {
            format!("{}-{}-{}", self.row, self.column, self.direction)
        }
    }

    /// The same physical button sounded in the opposite bellows direction.
    pub fn counterpart(&self) -> ButtonCoordinate {
        ButtonCoordinate {
            direction: self.direction.opposite(),
            ..*self
        }
    }

    /// Parses a canonical button id.
    pub fn parse(id: &str) -> Option<ButtonCoordinate> {
        let mut parts = id.split('-');
        let row = parts.next()?.parse().ok()?;
        let column = parts.next()?.parse().ok()?;
        let direction = match parts.next()? {
            "pull" => BellowsDirection::Pull,
            "push" => BellowsDirection::Push,
            _ => return None,
        };
        let bass = match parts.next() {
            None => false,
            Some("bass") => true,
            Some(_) => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(ButtonCoordinate {
            row,
            column,
            direction,
            bass,
        })
    }
}

impl fmt::Display for ButtonCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// What a reference button sounds: a single note or a chord built from a root.
#[derive(Clone, Debug, PartialEq)]
pub struct ButtonDefinition {
    pub coordinate: ButtonCoordinate,
    pub root_name: &'static str,
    pub root_octave: i32,
    pub quality: ChordQuality,
}

/// One pitch of a generated layout entry.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutNote {
    pub name: String,
    pub octave: i32,
    pub frequency: f32,
}

/// A fully generated button: the simultaneous pitches it sounds.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutEntry {
    pub coordinate: ButtonCoordinate,
    pub quality: ChordQuality,
    pub notes: Vec<LayoutNote>,
}

/// The complete button-to-pitch map for one tonality.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    entries: HashMap<String, LayoutEntry>,
}

impl Layout {
    /// Looks up the entry for a button id.
    pub fn entry(&self, button_id: &str) -> Option<&LayoutEntry> {
        self.entries.get(button_id)
    }

    /// Iterates over all entries.
    pub fn entries(&self) -> impl Iterator<Item = &LayoutEntry> {
        self.entries.values()
    }

    /// The number of buttons in the layout.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the layout has no buttons.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Generates the layout for a semitone offset against the reference table.
///
/// Pure: identical inputs produce structurally identical layouts, and offset 0
/// reproduces the reference exactly. A root name missing from the chromatic
/// vocabulary degrades that button to a sentinel-frequency note and a warning
/// rather than failing the whole layout.
pub fn generate(offset: i32, spelling: Spelling, frequencies: &FrequencyTable) -> Layout {
    let mut entries = HashMap::new();
    for definition in reference::reference_buttons() {
        let root_index = match chromatic_index(definition.root_name) {
            Some(index) => index,
            None => {
                warn!(
                    button = %definition.coordinate,
                    root = definition.root_name,
                    "Reference note outside chromatic vocabulary"
                );
                entries.insert(
                    definition.coordinate.id(),
                    LayoutEntry {
                        coordinate: definition.coordinate,
                        quality: definition.quality,
                        notes: vec![LayoutNote {
                            name: definition.root_name.to_string(),
                            octave: definition.root_octave,
                            frequency: SENTINEL_FREQUENCY,
                        }],
                    },
                );
                continue;
            }
        };

        // Major/minor bass buttons transpose once per chord tone; singles
        // just transpose the root.
        let notes = definition
            .quality
            .intervals()
            .iter()
            .map(|interval| {
                let total = root_index + offset + interval;
                let index = total.rem_euclid(SEMITONES_PER_OCTAVE);
                let carry = total.div_euclid(SEMITONES_PER_OCTAVE);
                let name = spelling.spell(index).to_string();
                let octave = definition.root_octave + carry;
                let frequency = frequencies.frequency(&name, octave);
                LayoutNote {
                    name,
                    octave,
                    frequency,
                }
            })
            .collect();

        entries.insert(
            definition.coordinate.id(),
            LayoutEntry {
                coordinate: definition.coordinate,
                quality: definition.quality,
                notes,
            },
        );
    }
    Layout { entries }
}

/// The instrument's interchangeable tunings. Each is a fixed semitone offset
/// from the reference key of C plus an accidental table for re-spelling.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tonality {
    C,
    Db,
    D,
    Eb,
    E,
    F,
    G,
    Ab,
    A,
    Bb,
    B,
}

impl Tonality {
    /// All supported tonalities.
    pub const ALL: [Tonality; 11] = [
        Tonality::C,
        Tonality::Db,
        Tonality::D,
        Tonality::Eb,
        Tonality::E,
        Tonality::F,
        Tonality::G,
        Tonality::Ab,
        Tonality::A,
        Tonality::Bb,
        Tonality::B,
    ];

    /// The semitone offset from the reference key.
    pub fn offset(&self) -> i32 {
        match self {
            Tonality::C => 0,
            Tonality::Db => 1,
            Tonality::D => 2,
            Tonality::Eb => 3,
            Tonality::E => 4,
            Tonality::F => 5,
            Tonality::G => 7,
            Tonality::Ab => 8,
            Tonality::A => 9,
            Tonality::Bb => 10,
            Tonality::B => 11,
        }
    }

    /// The accidental table used when spelling this tonality.
    pub fn spelling(&self) -> Spelling {
        match self {
            Tonality::Db | Tonality::Eb | Tonality::F | Tonality::Ab | Tonality::Bb => {
                Spelling::Flats
            }
            _ => Spelling::Sharps,
        }
    }
}

impl fmt::Display for Tonality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for Tonality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tonality::ALL
            .iter()
            .find(|t| format!("{:?}", t).eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown tonality '{}'", s))
    }
}

/// Caches the generated layout for every supported tonality.
pub struct LayoutRegistry {
    layouts: HashMap<Tonality, Arc<Layout>>,
}

impl LayoutRegistry {
    /// Generates and memoizes all supported layouts.
    pub fn new(frequencies: &FrequencyTable) -> Self {
        let layouts = Tonality::ALL
            .iter()
            .map(|tonality| {
                (
                    *tonality,
                    Arc::new(generate(
                        tonality.offset(),
                        tonality.spelling(),
                        frequencies,
                    )),
                )
            })
            .collect();
        Self { layouts }
    }

    /// Returns the memoized layout for a tonality.
    pub fn layout(&self, tonality: Tonality) -> Arc<Layout> {
        // Every variant is inserted in new(), so the lookup cannot miss.
        Arc::clone(&self.layouts[&tonality])
    }
}
