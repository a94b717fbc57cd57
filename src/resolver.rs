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

//! Nearest-match sample resolution.
//!
//! Maps a desired pitch onto the closest recorded sample plus the exact
//! semitone correction needed to play it back at the desired pitch. A shift
//! of 0 means verbatim playback.

use crate::theory::absolute_semitone;

/// A recorded sample offered for resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    /// Spelled note name of the recording.
    pub name: String,
    /// Octave of the recording.
    pub octave: i32,
    /// Opaque reference handed back to the playback engine.
    pub reference: String,
}

/// The outcome of a successful resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    /// The matched sample reference.
    pub reference: String,
    /// Semitones to shift the matched sample by; `desired - matched`.
    pub pitch_shift: i32,
}

/// Resolves a desired note to the least-distance candidate.
///
/// Deterministic: ties break to the first candidate in order. Returns `None`
/// only for an empty candidate set (or a desired note outside the chromatic
/// vocabulary); candidates with unparseable notes are skipped.
pub fn resolve(name: &str, octave: i32, candidates: &[Candidate]) -> Option<Resolution> {
    let desired = absolute_semitone(name, octave)?;

    let mut best: Option<(i32, i32, &Candidate)> = None;
    for candidate in candidates {
        let semitone = match absolute_semitone(&candidate.name, candidate.octave) {
            Some(semitone) => semitone,
            None => continue,
        };
        let distance = (desired - semitone).abs();
        let closer = match best {
            Some((best_distance, _, _)) => distance < best_distance,
            None => true,
        };
        if closer {
            best = Some((distance, semitone, candidate));
        }
    }

    best.map(|(_, semitone, candidate)| Resolution {
        reference: candidate.reference.clone(),
        pitch_shift: desired - semitone,
    })
}
