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

//! cpal-backed output device.
//!
//! The cpal stream is not Send, so it is created and owned by a dedicated
//! output thread; the device talks to that thread over a channel. The data
//! callback does nothing but pull frames from the mixer.

use std::fmt;
use std::sync::Arc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::engine::playback::Mixer;

use super::AudioError;

/// Commands understood by the output thread.
enum Command {
    Resume,
}

/// An audio output device backed by cpal.
pub struct Device {
    name: String,
    device: cpal::Device,
    sample_rate: u32,
    channels: u16,
    commands: Mutex<Option<Sender<Command>>>,
}

impl Device {
    /// Gets the named output device, or the default output device when no
    /// name is given.
    pub fn get(name: Option<&str>) -> Result<Device, AudioError> {
        let host = cpal::default_host();
        let device = match name {
            Some(name) => host
                .output_devices()
                .map_err(|e| AudioError::Backend(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| AudioError::NoDevice(name.to_string()))?,
            None => host
                .default_output_device()
                .ok_or_else(|| AudioError::NoDevice("default".to_string()))?,
        };

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::Backend(e.to_string()))?;
        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(
                config.sample_format().to_string(),
            ));
        }
        let device_name = device
            .name()
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(Device {
            name: device_name,
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            device,
            commands: Mutex::new(None),
        })
    }

    /// Lists the names of the available output devices.
    pub fn list() -> Result<Vec<String>, AudioError> {
        let host = cpal::default_host();
        let mut names = Vec::new();
        for device in host
            .output_devices()
            .map_err(|e| AudioError::Backend(e.to_string()))?
        {
            match device.name() {
                Ok(name) => names.push(name),
                Err(e) => warn!(error = %e, "Skipping unnamed output device"),
            }
        }
        Ok(names)
    }
}

impl super::Device for Device {
    fn start(&self, mixer: Arc<Mixer>) -> Result<(), AudioError> {
        let mut commands = self.commands.lock();
        if commands.is_some() {
            // Already started.
            return Ok(());
        }

        let (tx, rx) = unbounded();
        let device = self.device.clone();
        let config = cpal::StreamConfig {
            channels: self.channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let name = self.name.clone();

        // The stream lives on this thread for its entire lifetime.
        thread::spawn(move || {
            let stream = match device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    mixer.render(data);
                },
                |e| error!(error = %e, "Output stream error"),
                None,
            ) {
                Ok(stream) => stream,
                Err(e) => {
                    error!(device = name, error = %e, "Failed to build output stream");
                    return;
                }
            };

            if let Err(e) = stream.play() {
                error!(device = name, error = %e, "Failed to start output stream");
                return;
            }
            info!(device = name, "Output stream started");

            // Park here servicing commands until the device is dropped.
            while let Ok(command) = rx.recv() {
                match command {
                    Command::Resume => {
                        if let Err(e) = stream.play() {
                            warn!(device = name, error = %e, "Failed to resume output stream");
                        }
                    }
                }
            }
        });

        *commands = Some(tx);
        Ok(())
    }

    fn resume(&self) -> Result<(), AudioError> {
        match self.commands.lock().as_ref() {
            Some(tx) => {
                // If the output thread is gone the stream is too; nothing to
                // resume.
                if tx.send(Command::Resume).is_err() {
                    return Err(AudioError::NotStarted);
                }
                Ok(())
            }
            None => Err(AudioError::NotStarted),
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (channels={}, rate={})",
            self.name, self.channels, self.sample_rate
        )
    }
}
