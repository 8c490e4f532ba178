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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{info, span, Level};

use crate::audio::{Frame, SharedPlayback, SILENCE};

/// A mock device. Pulls blocks on its own thread like a real device would, but
/// doesn't play them anywhere.
#[derive(Clone)]
pub struct Device {
    name: String,
    buffer_duration: Duration,
    state: Arc<State>,
}

#[derive(Default)]
struct State {
    running: AtomicBool,
    blocks_pulled: AtomicUsize,
    last_block: Mutex<Vec<Frame>>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, buffer_duration: Duration) -> Device {
        Device {
            name: name.to_string(),
            buffer_duration,
            state: Arc::new(State::default()),
        }
    }

    /// Returns true if the device is pulling blocks.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Relaxed)
    }

    /// The number of blocks pulled so far.
    pub fn blocks_pulled(&self) -> usize {
        self.state.blocks_pulled.load(Ordering::Relaxed)
    }

    /// A copy of the most recently pulled block.
    pub fn last_block(&self) -> Vec<Frame> {
        self.state.last_block.lock().clone()
    }

    /// Stops pulling blocks and waits for the output thread to exit.
    pub fn stop(&self) -> Result<(), Box<dyn Error>> {
        self.state.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.state.thread.lock().take() {
            if handle.join().is_err() {
                return Err("Error while joining thread!".into());
            }
        }
        Ok(())
    }
}

impl crate::audio::Device for Device {
    fn start(&self, playback: SharedPlayback) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "start output (mock)");
        let _enter = span.enter();

        if self.state.running.swap(true, Ordering::Relaxed) {
            return Err(format!("mock device {} is already running", self.name).into());
        }

        let sample_rate = playback.lock().sample_rate();
        let block_frames =
            ((self.buffer_duration.as_secs_f64() * sample_rate as f64).round() as usize).max(1);
        info!(
            device = self.name,
            sample_rate, block_frames, "Starting mock output."
        );

        let state = self.state.clone();
        let tick = self.buffer_duration;
        let handle = thread::spawn(move || {
            let mut block = vec![SILENCE; block_frames];
            while state.running.load(Ordering::Relaxed) {
                playback.lock().fill(&mut block);
                {
                    let mut last_block = state.last_block.lock();
                    last_block.clear();
                    last_block.extend_from_slice(&block);
                }
                state.blocks_pulled.fetch_add(1, Ordering::Relaxed);
                thread::sleep(tick);
            }
        });
        *self.state.thread.lock() = Some(handle);

        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
