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
use std::{error::Error, io, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::{self, Sender},
    task::{JoinError, JoinHandle},
    time::{self, MissedTickBehavior},
};
use tracing::{debug, error, info, span, Instrument, Level};

use crate::fingering::Control;
use crate::simulator::Simulator;

mod drivers;
pub mod keyboard;
pub mod midi;

pub use drivers::driver;

/// How many events may queue up before drivers have to wait.
const EVENT_BUFFER: usize = 16;

/// Controller events that will trigger behavior in the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A harmonic or valve was pressed.
    Press(Control),

    /// A harmonic or valve was released.
    Release(Control),

    /// Raises the volume by one step.
    VolumeUp,

    /// Lowers the volume by one step.
    VolumeDown,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Feeds driver events and frame ticks to a simulator.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver. The pressed state is also
    /// recomputed every `frame_interval`.
    pub fn new(
        simulator: Simulator,
        driver: Arc<dyn Driver>,
        frame_interval: Duration,
    ) -> Result<Controller, Box<dyn Error>> {
        if frame_interval.is_zero() {
            return Err("frame interval must be greater than zero".into());
        }

        Ok(Controller {
            handle: tokio::spawn(
                Controller::trigger_events(simulator, driver, frame_interval)
                    .instrument(span!(Level::INFO, "controller")),
            ),
        })
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers simulator events by watching the driver and getting events from it.
    async fn trigger_events(
        mut simulator: Simulator,
        driver: Arc<dyn Driver>,
        frame_interval: Duration,
    ) {
        let (events_tx, mut events_rx) = mpsc::channel(EVENT_BUFFER);
        let join_handle = driver.monitor_events(events_tx);

        let mut frames = time::interval(frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(frame_interval = ?frame_interval, "Controller started.");

        loop {
            tokio::select! {
                event = events_rx.recv() => match event {
                    Some(event) => {
                        debug!(event = ?event, "Received event.");
                        simulator.handle_event(event);
                    }
                    None => {
                        info!("Controller closing.");
                        match join_handle.await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => error!(err = %e, "Event monitor failed."),
                            Err(e) => error!("Error waiting for event monitor to stop: {}", e),
                        }
                        return;
                    }
                },
                _ = frames.tick() => simulator.frame(),
            }
        }
    }
}
