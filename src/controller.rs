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

//! The controller ties input events to the instrument.
//!
//! Drivers watch some input source and emit [`Event`]s; the controller owns
//! the instrument state machine and applies events to it one at a time.

use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, Level};

use crate::layout::{BellowsDirection, ButtonCoordinate, Tonality};

pub mod instrument;
pub mod stdin;

pub use instrument::Instrument;

/// A physical button, independent of bellows direction. The direction is
/// supplied by the bellows state at press time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ButtonInput {
    pub row: u8,
    pub column: u8,
    pub bass: bool,
}

impl ButtonInput {
    /// Formats the input id, `{row}-{column}[-bass]`.
    pub fn id(&self) -> String {
        if self.bass {
            format!("{}-{}-bass", self.row, self.column)
        } else {
            format!("{}-{}", self.row, self.column)
        }
    }

    /// Parses an input id.
    pub fn parse(id: &str) -> Option<ButtonInput> {
        let mut parts = id.split('-');
        let row = parts.next()?.parse().ok()?;
        let column = parts.next()?.parse().ok()?;
        let bass = match parts.next() {
            None => false,
            Some("bass") => true,
            Some(_) => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(ButtonInput { row, column, bass })
    }

    /// The full button coordinate in the given bellows direction.
    pub fn coordinate(&self, direction: BellowsDirection) -> ButtonCoordinate {
        ButtonCoordinate {
            row: self.row,
            column: self.column,
            direction,
            bass: self.bass,
        }
    }
}

impl fmt::Display for ButtonInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Controller events that trigger behavior in the instrument.
#[derive(Debug)]
pub enum Event {
    /// A button was pressed.
    ButtonDown(ButtonInput),

    /// A button was released.
    ButtonUp(ButtonInput),

    /// The momentary bellows control was engaged: pushing.
    BellowsPress,

    /// The momentary bellows control was released: back to pulling.
    BellowsRelease,

    /// Switches the instrument to a different tonality.
    SetTonality(Tonality),

    /// Switches the instrument to a different sound bank.
    SetBank(String),

    /// Persists the current instrument configuration.
    Save,

    /// Stops every sounding voice immediately.
    Panic,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Drives an instrument from a driver's event stream.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(instrument: Instrument, driver: Arc<dyn Driver>) -> Controller {
        Controller {
            handle: tokio::spawn(async move { Controller::trigger_events(instrument, driver).await }),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Applies events from the driver to the instrument until the driver's
    /// event stream closes.
    async fn trigger_events(mut instrument: Instrument, driver: Arc<dyn Driver>) {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let join_handle = driver.monitor_events(events_tx);

        info!(
            tonality = %instrument.tonality(),
            bank = instrument.bank(),
            "Controller started"
        );

        loop {
            if let Some(event) = events_rx.recv().await {
                let span = span!(Level::INFO, "controller");
                let _enter = span.enter();
                instrument.handle_event(event);
            } else {
                info!("Controller closing");
                instrument.quiesce();
                if let Err(e) = join_handle.await {
                    tracing::error!(error = %e, "Error waiting for event monitor to stop");
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Barrier, Mutex};

    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use crate::audio::{self, mock};
    use crate::config::{ConfigError, ConfigStore, InstrumentConfig};
    use crate::engine::Engine;
    use crate::inventory::{Inventory, InventoryEntry, InventoryError};
    use crate::layout::{LayoutRegistry, Tonality};
    use crate::testutil::eventually;
    use crate::theory::FrequencyTable;

    use super::{ButtonInput, Driver, Event, Instrument};

    struct MemStore;

    impl ConfigStore for MemStore {
        fn load(&self, _: &str, _: Tonality) -> Result<InstrumentConfig, ConfigError> {
            Ok(InstrumentConfig::default())
        }

        fn save(&self, _: &str, _: Tonality, _: &InstrumentConfig) -> Result<(), ConfigError> {
            Ok(())
        }
    }

    struct EmptyInventory;

    impl Inventory for EmptyInventory {
        fn list(
            &self,
            _: &str,
            _: crate::engine::bank::SampleCategory,
        ) -> Result<Vec<InventoryEntry>, InventoryError> {
            Ok(Vec::new())
        }
    }

    struct TestDriver {
        current_event: Arc<Mutex<Option<Event>>>,
        barrier: Arc<Barrier>,
    }

    impl TestDriver {
        fn new() -> TestDriver {
            TestDriver {
                current_event: Arc::new(Mutex::new(None)),
                barrier: Arc::new(Barrier::new(2)),
            }
        }

        /// Signals the next event to the monitor thread. `None` closes the
        /// event stream.
        fn next_event(&self, event: Option<Event>) {
            {
                let mut current_event = self.current_event.lock().expect("failed to get lock");
                *current_event = event;
            }
            // Wait until the thread goes to receive the event.
            self.barrier.wait();
            // Wait until the thread has taken the event.
            self.barrier.wait();
        }
    }

    impl Driver for TestDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let barrier = self.barrier.clone();
            let current_event = self.current_event.clone();
            tokio::task::spawn_blocking(move || loop {
                barrier.wait();
                let event = current_event.lock().expect("failed to get lock").take();
                barrier.wait();
                match event {
                    Some(event) => assert!(events_tx.blocking_send(event).is_ok()),
                    None => return Ok(()),
                }
            })
        }
    }

    #[test]
    fn test_button_input_id_round_trip() {
        let input = ButtonInput {
            row: 1,
            column: 3,
            bass: false,
        };
        assert_eq!(input.id(), "1-3");
        assert_eq!(ButtonInput::parse("1-3"), Some(input));

        let bass = ButtonInput {
            row: 3,
            column: 2,
            bass: true,
        };
        assert_eq!(bass.id(), "3-2-bass");
        assert_eq!(ButtonInput::parse("3-2-bass"), Some(bass));

        assert_eq!(ButtonInput::parse("3"), None);
        assert_eq!(ButtonInput::parse("3-2-treble"), None);
        assert_eq!(ButtonInput::parse("3-2-bass-x"), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller_drives_instrument() {
        let driver = Arc::new(TestDriver::new());
        let device = Arc::new(mock::Device::get("mock-controller"));
        let engine =
            Engine::new(device.clone() as Arc<dyn audio::Device>).expect("engine");
        let registry = LayoutRegistry::new(&FrequencyTable::new());
        // No samples anywhere; the default config falls back to tones.
        let instrument = Instrument::new(
            engine.clone(),
            registry,
            Arc::new(EmptyInventory),
            Arc::new(MemStore),
            "tester",
            Tonality::C,
        );
        let mut controller = super::Controller::new(instrument, driver.clone());

        let button = ButtonInput {
            row: 1,
            column: 1,
            bass: false,
        };
        driver.next_event(Some(Event::ButtonDown(button)));
        eventually(|| engine.active_voices() > 0, "Button never started sounding");

        driver.next_event(Some(Event::ButtonUp(button)));
        eventually(
            || {
                device.render_frames(1024);
                engine.active_voices() == 0
            },
            "Button never stopped sounding",
        );

        driver.next_event(None);
        assert!(controller.join().await.is_ok(), "Error waiting for controller");
    }
}
