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

//! A line-oriented stdin driver.
//!
//! Commands: `+<row>-<col>[-bass]` presses a button, `-<row>-<col>[-bass]`
//! releases it, `push`/`pull` move the bellows, `key <tonality>` and
//! `bank <id>` reconfigure, `save` persists, `panic` silences everything.

use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use crate::layout::Tonality;

use super::{ButtonInput, Event};

const PUSH: &str = "push";
const PULL: &str = "pull";
const KEY: &str = "key";
const BANK: &str = "bank";
const SAVE: &str = "save";
const PANIC: &str = "panic";

/// A controller driver that reads commands from stdin.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Parses one command line into an event. `None` means the line was not
    /// a recognized command.
    fn parse(input: &str) -> Option<Event> {
        let input = input.trim();
        if let Some(id) = input.strip_prefix('+') {
            return ButtonInput::parse(id).map(Event::ButtonDown);
        }
        if let Some(id) = input.strip_prefix('-') {
            return ButtonInput::parse(id).map(Event::ButtonUp);
        }
        let mut words = input.split_whitespace();
        let event = match words.next()? {
            PUSH => Event::BellowsPress,
            PULL => Event::BellowsRelease,
            KEY => Event::SetTonality(words.next()?.parse::<Tonality>().ok()?),
            BANK => Event::SetBank(words.next()?.to_string()),
            SAVE => Event::Save,
            PANIC => Event::Panic,
            _ => return None,
        };
        if words.next().is_some() {
            return None;
        }
        Some(event)
    }

    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<(), io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command (+/-<row>-<col>[-bass], {}, {}, {} <tonality>, {} <id>, {}, {}): ",
            PUSH, PULL, KEY, BANK, SAVE, PANIC,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        reader.read_line(&mut input)?;

        match Driver::parse(&input) {
            Some(event) => events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            None => warn!(input = input.trim(), "Unrecognized command"),
        }
        Ok(())
    }
}

impl Default for Driver {
    fn default() -> Driver {
        Driver::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "stdin driver");
            let _enter = span.enter();

            info!("Stdin driver started.");

            loop {
                Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())?;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_button_commands() {
        assert!(matches!(
            Driver::parse("+1-3"),
            Some(Event::ButtonDown(ButtonInput {
                row: 1,
                column: 3,
                bass: false,
            }))
        ));
        assert!(matches!(
            Driver::parse("-3-2-bass"),
            Some(Event::ButtonUp(ButtonInput {
                row: 3,
                column: 2,
                bass: true,
            }))
        ));
        assert!(Driver::parse("+bogus").is_none());
    }

    #[test]
    fn test_parse_word_commands() {
        assert!(matches!(Driver::parse("push"), Some(Event::BellowsPress)));
        assert!(matches!(Driver::parse(" pull "), Some(Event::BellowsRelease)));
        assert!(matches!(
            Driver::parse("key G"),
            Some(Event::SetTonality(Tonality::G))
        ));
        assert!(matches!(
            Driver::parse("bank cajun"),
            Some(Event::SetBank(ref bank)) if bank == "cajun"
        ));
        assert!(matches!(Driver::parse("save"), Some(Event::Save)));
        assert!(matches!(Driver::parse("panic"), Some(Event::Panic)));

        assert!(Driver::parse("key").is_none());
        assert!(Driver::parse("key H").is_none());
        assert!(Driver::parse("push hard").is_none());
        assert!(Driver::parse("quit").is_none());
    }

    #[test]
    fn test_monitor_io_sends_event() {
        let (sender, mut receiver) = tokio::sync::mpsc::channel::<Event>(1);
        let reader = std::io::BufReader::new("push\n".as_bytes());
        let mut written: Vec<u8> = Vec::new();

        Driver::monitor_io(&sender, reader, &mut written).expect("monitor io");
        assert!(matches!(
            receiver.try_recv().expect("event"),
            Event::BellowsPress
        ));
        assert!(!written.is_empty());
    }

    #[test]
    fn test_monitor_io_ignores_garbage() {
        let (sender, mut receiver) = tokio::sync::mpsc::channel::<Event>(1);
        let reader = std::io::BufReader::new("make it louder\n".as_bytes());

        Driver::monitor_io(&sender, reader, std::io::sink()).expect("monitor io");
        assert!(receiver.try_recv().is_err());
    }
}
