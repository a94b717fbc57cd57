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

//! Per-user, per-tonality instrument configuration.
//!
//! Configuration is keyed by (user, tonality) so a player can keep a
//! different setup for every key of the instrument. Load failures never block
//! playing; the compiled-in defaults are always playable.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::layout::Tonality;

/// Prefix marking a sample reference that carries its own pitch adjustment.
const PITCH_PREFIX: &str = "pitch:";

/// Errors from configuration persistence.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yml::Error),
}

/// A per-button sample override: the button plays exactly these references
/// instead of whatever the resolver would pick from the bank.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Override {
    /// Sample references, optionally `pitch:<semitones>|`-prefixed.
    pub refs: Vec<String>,
}

/// The configuration of one instrument in one tonality.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InstrumentConfig {
    /// The selected sound bank id.
    pub bank: String,

    /// Global pitch adjustment in semitones, applied to every button.
    pub global_pitch: i32,

    /// Per-button pitch adjustments in semitones, keyed by input id.
    pub button_pitch: HashMap<String, i32>,

    /// Per-button sample overrides, keyed by full button id.
    pub overrides: HashMap<String, Override>,

    /// Whether buttons with no resolvable sample fall back to a synthesized
    /// tone instead of silence.
    pub fallback_tone: bool,
}

impl Default for InstrumentConfig {
    fn default() -> InstrumentConfig {
        InstrumentConfig {
            bank: "default".to_string(),
            global_pitch: 0,
            button_pitch: HashMap::new(),
            overrides: HashMap::new(),
            fallback_tone: true,
        }
    }
}

/// A sample reference with its embedded pitch adjustment unpacked.
#[derive(Clone, Debug, PartialEq)]
pub struct PitchedReference {
    pub reference: String,
    pub pitch_shift: i32,
}

impl PitchedReference {
    /// Parses `pitch:<semitones>|<reference>`; a reference without the prefix
    /// has a shift of 0. A malformed pitch value is ignored with a warning
    /// rather than dropping the reference.
    pub fn parse(raw: &str) -> PitchedReference {
        if let Some(rest) = raw.strip_prefix(PITCH_PREFIX) {
            if let Some((pitch, reference)) = rest.split_once('|') {
                match pitch.parse::<i32>() {
                    Ok(pitch_shift) => {
                        return PitchedReference {
                            reference: reference.to_string(),
                            pitch_shift,
                        }
                    }
                    Err(_) => {
                        warn!(raw, "Malformed pitch prefix on sample reference");
                        return PitchedReference {
                            reference: reference.to_string(),
                            pitch_shift: 0,
                        };
                    }
                }
            }
        }
        PitchedReference {
            reference: raw.to_string(),
            pitch_shift: 0,
        }
    }
}

/// Loads and saves instrument configurations.
pub trait ConfigStore: Send + Sync {
    /// Loads the configuration for a (user, tonality) pair. A configuration
    /// that was never saved loads as the defaults.
    fn load(&self, user: &str, tonality: Tonality) -> Result<InstrumentConfig, ConfigError>;

    /// Saves the configuration for a (user, tonality) pair.
    fn save(
        &self,
        user: &str,
        tonality: Tonality,
        config: &InstrumentConfig,
    ) -> Result<(), ConfigError>;

    /// Loads, falling back to the defaults on any failure so that a corrupt
    /// file never blocks playing.
    fn load_or_default(&self, user: &str, tonality: Tonality) -> InstrumentConfig {
        match self.load(user, tonality) {
            Ok(config) => config,
            Err(e) => {
                warn!(user, tonality = %tonality, error = %e, "Failed to load config, using defaults");
                InstrumentConfig::default()
            }
        }
    }
}

/// YAML files under `<root>/<user>/<tonality>.yaml`.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> FileStore {
        FileStore { root }
    }

    fn path(&self, user: &str, tonality: Tonality) -> PathBuf {
        self.root.join(user).join(format!("{}.yaml", tonality))
    }
}

impl ConfigStore for FileStore {
    fn load(&self, user: &str, tonality: Tonality) -> Result<InstrumentConfig, ConfigError> {
        let path = self.path(user, tonality);
        if !path.exists() {
            return Ok(InstrumentConfig::default());
        }
        Ok(serde_yml::from_str(&fs::read_to_string(path)?)?)
    }

    fn save(
        &self,
        user: &str,
        tonality: Tonality,
        config: &InstrumentConfig,
    ) -> Result<(), ConfigError> {
        let path = self.path(user, tonality);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yml::to_string(config)?)?;
        Ok(())
    }
}
