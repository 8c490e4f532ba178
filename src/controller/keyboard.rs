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
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::fingering::Control;

const PRESS: &str = "press";
const RELEASE: &str = "release";
const LOUDER: &str = "louder";
const SOFTER: &str = "softer";
const LOUDER_KEY: &str = "]";
const SOFTER_KEY: &str = "[";

/// A controller that plays the trumpet from line commands on the terminal.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Parses a single command line.
    fn parse(input: &str) -> Option<Event> {
        let mut words = input.split_whitespace();
        let command = words.next()?.to_lowercase();
        let argument = words.next();
        if words.next().is_some() {
            return None;
        }

        match (command.as_str(), argument) {
            (PRESS, Some(control)) => control.parse::<Control>().ok().map(Event::Press),
            (RELEASE, Some(control)) => control.parse::<Control>().ok().map(Event::Release),
            (LOUDER | LOUDER_KEY, None) => Some(Event::VolumeUp),
            (SOFTER | SOFTER_KEY, None) => Some(Event::VolumeDown),
            _ => None,
        }
    }

    /// Reads and dispatches one line. Returns false once input is exhausted.
    fn monitor_io<R, W>(events_tx: &Sender<Event>, mut reader: R, mut writer: W) -> io::Result<bool>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <control>, {} <control>, {}, {}): ",
            PRESS, RELEASE, LOUDER, SOFTER,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        if input.trim().is_empty() {
            return Ok(true);
        }

        match Driver::parse(&input) {
            Some(event) => events_tx.blocking_send(event).map_err(io::Error::other)?,
            None => warn!(input = input.trim(), "Unrecognized input"),
        }
        Ok(true)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard input closed.");
            Ok(())
        })
    }
}
