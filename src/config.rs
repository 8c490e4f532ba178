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
use std::{error::Error, path::Path, sync::Arc, time::Duration};

use duration_string::DurationString;
use tracing::info;

use crate::audio::{self as output, bank::SampleBank, streamer::SelectStreamer, Playback};

pub mod audio;
pub mod controller;
mod error;
mod simulator;

pub use self::audio::{Audio, StreamBufferSize};
pub use self::controller::{Controller, MidiController};
pub use self::error::ConfigError;
pub use self::simulator::{Simulator, Volume};

/// Parses an optional duration string, falling back to the default.
pub(crate) fn parse_duration(
    field: &'static str,
    value: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => DurationString::from_string(value.to_string())
            .map(Into::into)
            .map_err(|e| ConfigError::InvalidDuration {
                field,
                value: value.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

/// Decodes every note the configuration names into a sample bank.
pub fn load_bank(config: &Simulator) -> Result<Arc<SampleBank>, Box<dyn Error>> {
    Ok(Arc::new(SampleBank::load(&config.note_files()?)?))
}

/// Initializes the simulator and controller from the given config file. Audio output is
/// started before this returns; the returned device must be kept alive for as long as
/// output should continue. Realistically, the controller is not expected to exit.
pub fn init_simulator_and_controller(
    path: &Path,
) -> Result<(Arc<dyn output::Device>, crate::controller::Controller), Box<dyn Error>> {
    let config = Simulator::deserialize(path)?;
    let bank = load_bank(&config)?;
    info!(
        notes = bank.len(),
        sample_rate = bank.sample_rate(),
        "Sample bank loaded."
    );

    let streamer = SelectStreamer::new(bank, config.sustain_offset()?);
    let playback = Playback::new(
        streamer,
        config.playback_ratio()?,
        config.volume_base()?,
        config.volume_initial()?,
    )?
    .shared();

    let device = output::get_device(config.audio())?;
    device.start(playback.clone())?;

    let simulator = crate::simulator::Simulator::new(playback, config.volume_step()?);
    let driver = crate::controller::driver(config.controller())?;
    let controller =
        crate::controller::Controller::new(simulator, driver, config.frame_interval()?)?;
    Ok((device, controller))
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs, time::Duration};

    use crate::testutil::{eventually, write_wav};

    use super::*;

    #[test]
    fn test_parse_duration() {
        let default = Duration::from_secs(1);
        assert_eq!(parse_duration("d", None, default).unwrap(), default);
        assert_eq!(
            parse_duration("d", Some("20ms"), default).unwrap(),
            Duration::from_millis(20)
        );
        assert!(parse_duration("d", Some("twenty"), default).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_init_simulator_and_controller() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let notes = tempdir.path().join("notes");
        fs::create_dir(&notes)?;
        write_wav(notes.join("d6.wav"), vec![vec![0.5_f32; 1000]], 1000)?;
        write_wav(notes.join("c4.wav"), vec![vec![0.25_f32; 1000]], 1000)?;

        let path = tempdir.path().join("trumpet.yaml");
        fs::write(
            &path,
            r#"
audio:
  device: mock-device
  buffer_duration: 10ms
notes_path: notes
notes:
  "70": d6.wav
  "00": c4.wav
controller:
  kind: midi
  device: mock-midi
"#,
        )?;

        let (device, _controller) = init_simulator_and_controller(&path)?;
        let mock = device.to_mock()?;
        eventually(|| mock.blocks_pulled() > 0, "Output never started");
        assert_eq!(mock.last_block().len(), 10);
        mock.stop()?;
        Ok(())
    }
}
