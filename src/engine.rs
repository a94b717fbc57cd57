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

//! Sample playback engine.
//!
//! This module provides:
//! - Per-bank decoded-buffer caching with leading-silence trimming
//! - A bounded voice pool with oldest-first voice stealing
//! - Click-free attack and release envelopes and semitone pitch shifting
//! - panic() as the last-resort recovery for stuck notes

pub mod bank;
pub mod playback;
pub mod voice;

pub use playback::{Engine, DEFAULT_RELEASE_SECONDS, MAX_VOICES};
pub use voice::Voice;
