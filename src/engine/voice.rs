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

//! Voice accounting for polyphonic playback.
//!
//! The pool bounds concurrency and picks steal victims; the actual audio is
//! rendered on the platform audio thread, which the application side talks to
//! only through the per-voice atomic controls.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// Shared control block between the application side and the render side.
/// The render side only ever reads `released`/`release_samples`/`killed` and
/// only ever writes `finished`.
#[derive(Default)]
pub struct VoiceControl {
    /// A release ramp has been requested.
    released: AtomicBool,
    /// Length of the requested release ramp in output samples. Written
    /// before `released` is flipped.
    release_samples: AtomicU32,
    /// Immediate disconnect requested (panic path); skips the ramp.
    killed: AtomicBool,
    /// The render side has retired this voice.
    finished: AtomicBool,
}

impl VoiceControl {
    pub(crate) fn released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub(crate) fn release_samples(&self) -> u32 {
        self.release_samples.load(Ordering::Acquire)
    }

    pub(crate) fn killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    pub(crate) fn set_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

/// A handle to one playing instance of a sample.
#[derive(Clone)]
pub struct Voice {
    id: u64,
    started: Instant,
    sample_rate: u32,
    control: Arc<VoiceControl>,
}

impl Voice {
    /// Creates a new voice handle for an output stream at the given rate.
    pub(crate) fn new(sample_rate: u32) -> Voice {
        Voice {
            id: NEXT_VOICE_ID.fetch_add(1, Ordering::SeqCst),
            started: Instant::now(),
            sample_rate,
            control: Arc::new(VoiceControl::default()),
        }
    }

    /// The unique id of this voice.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// When this voice started.
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Requests a release ramp of the given length. Any pending gain
    /// automation (the attack ramp included) is cancelled by the render side
    /// when it observes the request. Releasing an already-released voice is a
    /// no-op and leaves the original ramp untouched.
    pub fn release(&self, seconds: f32) {
        if self.control.released.load(Ordering::Acquire) {
            return;
        }
        let samples = (seconds * self.sample_rate as f32).max(1.0) as u32;
        self.control
            .release_samples
            .store(samples, Ordering::Release);
        self.control.released.store(true, Ordering::Release);
    }

    /// Disconnects the voice immediately, without a ramp.
    pub fn kill(&self) {
        self.control.killed.store(true, Ordering::Release);
    }

    /// Whether the render side has retired this voice.
    pub fn is_finished(&self) -> bool {
        self.control.finished.load(Ordering::Acquire)
    }

    /// Whether a stop has been requested for this voice.
    pub fn is_stopping(&self) -> bool {
        self.control.released() || self.control.killed()
    }

    pub(crate) fn control(&self) -> Arc<VoiceControl> {
        Arc::clone(&self.control)
    }
}

/// Bounds the number of concurrently live voices.
pub struct VoicePool {
    voices: Vec<Voice>,
    max_voices: usize,
}

impl VoicePool {
    /// Creates a pool with the given global limit.
    pub fn new(max_voices: usize) -> VoicePool {
        VoicePool {
            voices: Vec::new(),
            max_voices,
        }
    }

    /// Removes voices that ended naturally on the render side.
    fn reap(&mut self) {
        self.voices.retain(|v| !v.is_finished());
    }

    /// Admits a new voice. When the pool is full the oldest voices are
    /// removed and returned so the caller can fade them out; the new request
    /// is never dropped.
    pub fn admit(&mut self, voice: Voice) -> Vec<Voice> {
        self.reap();

        let mut stolen = Vec::new();
        while self.voices.len() >= self.max_voices {
            // Insertion order breaks started() ties, so the victim is always
            // the earliest admitted voice.
            let oldest = match self
                .voices
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| v.started())
            {
                Some((index, _)) => index,
                None => break,
            };
            stolen.push(self.voices.remove(oldest));
        }

        self.voices.push(voice);
        stolen
    }

    /// The number of live voices, after reaping naturally-ended ones.
    pub fn active_count(&mut self) -> usize {
        self.reap();
        self.voices.len()
    }

    /// Removes and returns every voice in the pool.
    pub fn drain(&mut self) -> Vec<Voice> {
        std::mem::take(&mut self.voices)
    }
}
