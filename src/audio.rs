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

//! Audio output device abstraction.
//!
//! The engine renders into whatever [`Device`] the composition root hands it:
//! a cpal-backed device in production, a mock device in tests. The device owns
//! the platform audio thread; application code never blocks on it.

use std::fmt;
use std::sync::Arc;

use crate::engine::playback::Mixer;

pub mod cpal;
pub mod mock;

/// Errors from the audio backend. None of these are fatal to the session;
/// callers log and degrade.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio output device named '{0}'")]
    NoDevice(String),
    #[error("unsupported output sample format {0}")]
    UnsupportedFormat(String),
    #[error("audio device not started")]
    NotStarted,
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// An audio output device.
pub trait Device: fmt::Display + Send + Sync {
    /// Starts the output stream, pulling frames from the given mixer on the
    /// platform audio thread.
    fn start(&self, mixer: Arc<Mixer>) -> Result<(), AudioError>;

    /// Resumes a suspended output stream. Idempotent; resuming a running
    /// stream is a no-op.
    fn resume(&self) -> Result<(), AudioError>;

    /// The output sample rate.
    fn sample_rate(&self) -> u32;

    /// The number of output channels.
    fn channel_count(&self) -> u16;
}

/// Lists the names of the available output devices.
pub fn list_devices() -> Result<Vec<String>, AudioError> {
    cpal::Device::list()
}

/// Gets a device by name. Names starting with "mock" return a mock device;
/// `None` selects the default output device.
pub fn get_device(name: Option<&str>) -> Result<Arc<dyn Device>, AudioError> {
    if let Some(name) = name {
        if name.starts_with("mock") {
            return Ok(Arc::new(mock::Device::get(name)));
        }
    }
    Ok(Arc::new(cpal::Device::get(name)?))
}
