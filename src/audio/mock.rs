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

//! A mock output device for tests. Rendering is driven manually so tests can
//! step the audio clock deterministically without real hardware.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::playback::Mixer;

use super::AudioError;

/// Mock devices render at a fixed rate so envelope timings are predictable.
pub const MOCK_SAMPLE_RATE: u32 = 44100;

/// The number of mock output channels.
pub const MOCK_CHANNELS: u16 = 2;

/// A mock audio output device.
pub struct Device {
    name: String,
    mixer: Mutex<Option<Arc<Mixer>>>,
    resumes: AtomicUsize,
}

impl Device {
    /// Gets a mock device with the given name.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            mixer: Mutex::new(None),
            resumes: AtomicUsize::new(0),
        }
    }

    /// Renders the given number of frames through the mixer, returning the
    /// interleaved output. Returns silence when the device was never started.
    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * MOCK_CHANNELS as usize];
        if let Some(mixer) = self.mixer.lock().as_ref() {
            mixer.render(&mut out);
        }
        out
    }

    /// The number of times resume() has been called.
    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }
}

impl super::Device for Device {
    fn start(&self, mixer: Arc<Mixer>) -> Result<(), AudioError> {
        *self.mixer.lock() = Some(mixer);
        Ok(())
    }

    fn resume(&self) -> Result<(), AudioError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        MOCK_SAMPLE_RATE
    }

    fn channel_count(&self) -> u16 {
        MOCK_CHANNELS
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (mock)", self.name)
    }
}
