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

//! Sample inventory: which recordings each sound bank offers.
//!
//! The inventory only describes what exists; decoding and caching belong to
//! the engine. The manifest is re-read on every bank switch, so dropping new
//! recordings into a bank directory needs no restart.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::bank::SampleCategory;

/// The manifest file name expected in every bank directory.
const MANIFEST_FILE: &str = "manifest.yaml";

/// Errors from reading a bank manifest.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yml::Error),
}

/// One recording a bank offers.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct InventoryEntry {
    /// Spelled note name of the recording.
    pub note: String,
    /// Octave of the recording.
    pub octave: i32,
    /// Where the audio lives.
    pub uri: PathBuf,
}

impl InventoryEntry {
    /// The engine-facing sample reference, e.g. `treble/C4`.
    pub fn reference(&self, category: SampleCategory) -> String {
        format!("{}/{}{}", category.token(), self.note, self.octave)
    }
}

/// A source of sample inventories.
pub trait Inventory: Send + Sync {
    /// Lists the recordings a bank offers for one side of the instrument.
    /// A bank with no manifest is an empty bank, not an error.
    fn list(
        &self,
        bank: &str,
        category: SampleCategory,
    ) -> Result<Vec<InventoryEntry>, InventoryError>;
}

#[derive(Deserialize, Serialize, Debug, Default)]
struct ManifestSample {
    note: String,
    octave: i32,
    file: String,
}

/// On-disk manifest layout: per-category sample lists.
#[derive(Deserialize, Serialize, Debug, Default)]
struct Manifest {
    #[serde(default)]
    treble: Vec<ManifestSample>,
    #[serde(default)]
    bass: Vec<ManifestSample>,
}

/// Banks as directories under a root: `<root>/<bank>/manifest.yaml`, with
/// sample files addressed relative to the bank directory.
pub struct ManifestInventory {
    root: PathBuf,
}

impl ManifestInventory {
    pub fn new(root: PathBuf) -> ManifestInventory {
        ManifestInventory { root }
    }
}

impl Inventory for ManifestInventory {
    fn list(
        &self,
        bank: &str,
        category: SampleCategory,
    ) -> Result<Vec<InventoryEntry>, InventoryError> {
        let bank_dir = self.root.join(bank);
        let path = bank_dir.join(MANIFEST_FILE);
        if !path.exists() {
            warn!(bank, path = ?path, "No manifest for bank, treating as empty");
            return Ok(Vec::new());
        }

        let manifest: Manifest = serde_yml::from_str(&fs::read_to_string(path)?)?;
        let samples = match category {
            SampleCategory::Treble => manifest.treble,
            SampleCategory::Bass => manifest.bass,
        };
        Ok(samples
            .into_iter()
            .map(|s| InventoryEntry {
                note: s.note,
                octave: s.octave,
                uri: bank_dir.join(s.file),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
treble:
  - note: C
    octave: 4
    file: treble-c4.wav
  - note: G
    octave: 4
    file: treble-g4.wav
bass:
  - note: C
    octave: 3
    file: bass-c3.wav
"#;

    #[test]
    fn test_list_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bank_dir = dir.path().join("default");
        fs::create_dir_all(&bank_dir).expect("mkdir");
        fs::write(bank_dir.join(MANIFEST_FILE), MANIFEST).expect("write");

        let inventory = ManifestInventory::new(dir.path().to_path_buf());
        let treble = inventory
            .list("default", SampleCategory::Treble)
            .expect("list");
        assert_eq!(treble.len(), 2);
        assert_eq!(treble[0].note, "C");
        assert_eq!(treble[0].octave, 4);
        assert_eq!(treble[0].uri, bank_dir.join("treble-c4.wav"));
        assert_eq!(treble[0].reference(SampleCategory::Treble), "treble/C4");

        let bass = inventory.list("default", SampleCategory::Bass).expect("list");
        assert_eq!(bass.len(), 1);
        assert_eq!(bass[0].reference(SampleCategory::Bass), "bass/C3");
    }

    #[test]
    fn test_missing_manifest_is_empty_bank() {
        let dir = tempfile::tempdir().expect("tempdir");
        let inventory = ManifestInventory::new(dir.path().to_path_buf());
        let entries = inventory
            .list("nonexistent", SampleCategory::Treble)
            .expect("list");
        assert!(entries.is_empty());
    }

    #[test]
    fn test_malformed_manifest_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bank_dir = dir.path().join("broken");
        fs::create_dir_all(&bank_dir).expect("mkdir");
        fs::write(bank_dir.join(MANIFEST_FILE), "treble: 12").expect("write");

        let inventory = ManifestInventory::new(dir.path().to_path_buf());
        assert!(inventory.list("broken", SampleCategory::Treble).is_err());
    }

    #[test]
    fn test_category_sections_default_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bank_dir = dir.path().join("treble-only");
        fs::create_dir_all(&bank_dir).expect("mkdir");
        fs::write(
            bank_dir.join(MANIFEST_FILE),
            "treble:\n  - note: A\n    octave: 4\n    file: a4.wav\n",
        )
        .expect("write");

        let inventory = ManifestInventory::new(dir.path().to_path_buf());
        assert_eq!(
            inventory
                .list("treble-only", SampleCategory::Treble)
                .expect("list")
                .len(),
            1
        );
        assert!(inventory
            .list("treble-only", SampleCategory::Bass)
            .expect("list")
            .is_empty());
    }
}
