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
mod audio;
mod config;
mod controller;
mod engine;
mod inventory;
mod layout;
mod resolver;
#[cfg(test)]
mod testutil;
mod theory;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};

use crate::config::FileStore;
use crate::controller::{stdin, Controller, Instrument};
use crate::engine::Engine;
use crate::inventory::ManifestInventory;
use crate::layout::{LayoutRegistry, Tonality};
use crate::theory::FrequencyTable;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A playable virtual diatonic button accordion."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the supported tonalities.
    Keys {},
    /// Prints the button layout for a tonality.
    Layout {
        /// The tonality to print, e.g. C, G, Bb.
        tonality: String,
    },
    /// Start will start the instrument.
    Start {
        /// The path to the sample bank repository.
        banks_path: String,
        /// The path to the configuration repository.
        config_path: String,
        /// The user whose configuration to load.
        #[arg(short, long, default_value = "default")]
        user: String,
        /// The tonality to start in.
        #[arg(short, long, default_value = "C")]
        tonality: String,
        /// The audio output device name.
        #[arg(short, long)]
        device: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            println!("Audio output devices:");
            for name in audio::list_devices()? {
                println!("- {}", name);
            }
        }
        Commands::Keys {} => {
            println!("Supported tonalities:");
            for tonality in Tonality::ALL {
                println!("- {}", tonality);
            }
        }
        Commands::Layout { tonality } => {
            let tonality: Tonality = tonality.parse()?;
            let registry = LayoutRegistry::new(&FrequencyTable::new());
            let layout = registry.layout(tonality);

            println!("Layout for {} ({} buttons):", tonality, layout.len());
            let mut entries: Vec<_> = layout.entries().collect();
            entries.sort_by_key(|e| e.coordinate.id());
            for entry in entries {
                let notes: Vec<String> = entry
                    .notes
                    .iter()
                    .map(|n| format!("{}{} ({:.2} Hz)", n.name, n.octave, n.frequency))
                    .collect();
                println!("- {}: {}", entry.coordinate, notes.join(", "));
            }
        }
        Commands::Start {
            banks_path,
            config_path,
            user,
            tonality,
            device,
        } => {
            let tonality: Tonality = tonality.parse()?;
            let device = audio::get_device(device.as_deref())?;
            let engine = Engine::new(device)?;
            let registry = LayoutRegistry::new(&FrequencyTable::new());
            let inventory = Arc::new(ManifestInventory::new(PathBuf::from(banks_path)));
            let store = Arc::new(FileStore::new(PathBuf::from(config_path)));

            let instrument = Instrument::new(engine, registry, inventory, store, &user, tonality);
            let mut controller = Controller::new(instrument, Arc::new(stdin::Driver::new()));
            controller.join().await?;
        }
    }

    Ok(())
}
