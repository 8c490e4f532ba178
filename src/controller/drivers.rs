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
use std::{error::Error, sync::Arc};

use super::Driver;
use crate::config;

/// Creates a controller driver from the config.
pub fn driver(config: config::Controller) -> Result<Arc<dyn Driver>, Box<dyn Error>> {
    match config {
        config::Controller::Keyboard => Ok(Arc::new(super::keyboard::Driver::new())),
        config::Controller::Midi(config) => {
            let mapping = super::midi::MidiMapping::from_config(&config)?;
            let device = crate::midi::get_device(config.device())?;
            Ok(Arc::new(super::midi::Driver::new(device, mapping)))
        }
    }
}
