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
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, File};
use serde::Deserialize;
use tracing::warn;

use super::{audio::Audio, controller::Controller, error::ConfigError, parse_duration};
use crate::fingering::{chart, FingeringKey};

const DEFAULT_NOTES_EXTENSION: &str = "wav";
const DEFAULT_SUSTAIN_OFFSET: Duration = Duration::from_millis(500);
const DEFAULT_PLAYBACK_RATIO: f64 = 1.0;
const DEFAULT_VOLUME_BASE: f64 = 2.0;
const DEFAULT_VOLUME_INITIAL: f64 = 0.0;
const DEFAULT_VOLUME_STEP: f64 = 0.1;
const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Volume settings. The applied gain is `base ^ volume`.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Volume {
    base: Option<f64>,
    initial: Option<f64>,
    step: Option<f64>,
}

/// The top level simulator configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Simulator {
    /// The audio output configuration.
    audio: Audio,

    /// The input controller (default: keyboard).
    controller: Option<Controller>,

    /// The directory note files are resolved against. Relative to the config file.
    notes_path: Option<String>,

    /// The file extension used for the default note file names (default: wav).
    notes_extension: Option<String>,

    /// Explicit fingering key to file mappings. When unset, every fingering on the
    /// chart is loaded from its standard file name.
    notes: Option<BTreeMap<String, String>>,

    /// Where a note starts when it replaces another one mid-phrase (default: 500ms).
    sustain_offset: Option<String>,

    /// Playback speed factor applied by the resampler (default: 1.0).
    playback_ratio: Option<f64>,

    /// Volume settings.
    volume: Option<Volume>,

    /// How often the pressed state is recomputed (default: 16ms).
    frame_interval: Option<String>,

    /// The directory of the file this was loaded from.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Simulator {
    /// Creates a simulator configuration with defaults for everything but the audio device.
    pub fn new(audio: Audio) -> Simulator {
        Simulator {
            audio,
            controller: None,
            notes_path: None,
            notes_extension: None,
            notes: None,
            sustain_offset: None,
            playback_ratio: None,
            volume: None,
            frame_interval: None,
            base_dir: PathBuf::new(),
        }
    }

    /// Parses the simulator configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Simulator, ConfigError> {
        let mut simulator = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Simulator>()?;
        simulator.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(simulator)
    }

    /// Sets the explicit note mappings.
    pub fn with_notes(mut self, notes: BTreeMap<String, String>) -> Simulator {
        self.notes = Some(notes);
        self
    }

    /// Sets the directory note files are resolved against.
    pub fn with_notes_path(mut self, notes_path: &Path) -> Simulator {
        self.notes_path = Some(notes_path.to_string_lossy().into_owned());
        self
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the controller configuration.
    pub fn controller(&self) -> Controller {
        self.controller.clone().unwrap_or_default()
    }

    /// Returns the directory note files are resolved against.
    pub fn notes_dir(&self) -> PathBuf {
        match &self.notes_path {
            Some(notes_path) => self.base_dir.join(notes_path),
            None => self.base_dir.clone(),
        }
    }

    /// Resolves the note files to load, keyed by fingering.
    pub fn note_files(&self) -> Result<BTreeMap<FingeringKey, PathBuf>, ConfigError> {
        let dir = self.notes_dir();

        let Some(notes) = &self.notes else {
            let extension = self
                .notes_extension
                .as_deref()
                .unwrap_or(DEFAULT_NOTES_EXTENSION);
            return chart::CHART
                .iter()
                .map(|entry| {
                    let key = entry.key.parse().map_err(|source| ConfigError::InvalidNoteKey {
                        key: entry.key.to_string(),
                        source,
                    })?;
                    Ok((key, dir.join(format!("{}.{}", entry.sample, extension))))
                })
                .collect();
        };

        let mut files = BTreeMap::new();
        for (key, file) in notes {
            let parsed: FingeringKey =
                key.parse().map_err(|source| ConfigError::InvalidNoteKey {
                    key: key.clone(),
                    source,
                })?;
            if parsed.is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "notes",
                    value: "empty fingering key".to_string(),
                });
            }
            if chart::lookup(key).is_none() {
                warn!(key, "Fingering is not on the standard chart.");
            }
            files.insert(parsed, dir.join(file));
        }
        Ok(files)
    }

    /// Returns the sustain offset.
    pub fn sustain_offset(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "sustain_offset",
            self.sustain_offset.as_deref(),
            DEFAULT_SUSTAIN_OFFSET,
        )
    }

    /// Returns the resampler playback ratio.
    pub fn playback_ratio(&self) -> Result<f64, ConfigError> {
        let ratio = self.playback_ratio.unwrap_or(DEFAULT_PLAYBACK_RATIO);
        positive("playback_ratio", ratio)
    }

    /// Returns the volume base.
    pub fn volume_base(&self) -> Result<f64, ConfigError> {
        let base = self
            .volume
            .as_ref()
            .and_then(|volume| volume.base)
            .unwrap_or(DEFAULT_VOLUME_BASE);
        positive("volume.base", base)
    }

    /// Returns the initial volume.
    pub fn volume_initial(&self) -> Result<f64, ConfigError> {
        let initial = self
            .volume
            .as_ref()
            .and_then(|volume| volume.initial)
            .unwrap_or(DEFAULT_VOLUME_INITIAL);
        finite("volume.initial", initial)
    }

    /// Returns how much the volume changes per step.
    pub fn volume_step(&self) -> Result<f64, ConfigError> {
        let step = self
            .volume
            .as_ref()
            .and_then(|volume| volume.step)
            .unwrap_or(DEFAULT_VOLUME_STEP);
        finite("volume.step", step)
    }

    /// Returns how often the pressed state is recomputed.
    pub fn frame_interval(&self) -> Result<Duration, ConfigError> {
        let interval = parse_duration(
            "frame_interval",
            self.frame_interval.as_deref(),
            DEFAULT_FRAME_INTERVAL,
        )?;
        if interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "frame_interval",
                value: "0".to_string(),
            });
        }
        Ok(interval)
    }
}

fn finite(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::InvalidValue {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn positive(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if finite(field, value)? <= 0.0 {
        return Err(ConfigError::InvalidValue {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs};

    use config::FileFormat;

    use super::*;

    fn parse(yaml: &str) -> Simulator {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let simulator = parse("audio:\n  device: mock-device");
        assert_eq!(simulator.audio().device(), "mock-device");
        assert!(matches!(simulator.controller(), Controller::Keyboard));
        assert_eq!(simulator.sustain_offset().unwrap(), Duration::from_millis(500));
        assert_eq!(simulator.playback_ratio().unwrap(), 1.0);
        assert_eq!(simulator.volume_base().unwrap(), 2.0);
        assert_eq!(simulator.volume_initial().unwrap(), 0.0);
        assert_eq!(simulator.volume_step().unwrap(), 0.1);
        assert_eq!(simulator.frame_interval().unwrap(), Duration::from_millis(16));
    }

    #[test]
    fn test_default_notes_follow_the_chart() {
        let simulator = parse("audio:\n  device: mock-device\nnotes_path: /notes");
        let files = simulator.note_files().unwrap();
        assert_eq!(files.len(), chart::CHART.len());
        assert_eq!(
            files.get("70").unwrap(),
            &PathBuf::from("/notes/25-C 6.wav")
        );
        assert_eq!(
            files.get("0123").unwrap(),
            &PathBuf::from("/notes/%1-E 3.wav")
        );
    }

    #[test]
    fn test_explicit_notes() {
        let simulator = parse(
            r#"
            audio:
              device: mock-device
            notes_path: /notes
            notes:
              "70": d6.flac
              "00": /elsewhere/c4.flac
              "71": odd.flac
            sustain_offset: 250ms
            playback_ratio: 1.5
            volume:
              base: 10
              initial: -1
              step: 0.5
            frame_interval: 8ms
            controller:
              kind: midi
              device: mock-midi
            "#,
        );
        let files = simulator.note_files().unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files.get("70").unwrap(), &PathBuf::from("/notes/d6.flac"));
        assert_eq!(files.get("00").unwrap(), &PathBuf::from("/elsewhere/c4.flac"));
        assert!(files.contains_key("71"));

        assert_eq!(simulator.sustain_offset().unwrap(), Duration::from_millis(250));
        assert_eq!(simulator.playback_ratio().unwrap(), 1.5);
        assert_eq!(simulator.volume_base().unwrap(), 10.0);
        assert_eq!(simulator.volume_initial().unwrap(), -1.0);
        assert_eq!(simulator.volume_step().unwrap(), 0.5);
        assert_eq!(simulator.frame_interval().unwrap(), Duration::from_millis(8));
        assert!(matches!(simulator.controller(), Controller::Midi(_)));
    }

    #[test]
    fn test_malformed_note_key() {
        let simulator = parse(
            r#"
            audio:
              device: mock-device
            notes:
              "7x": bad.wav
            "#,
        );
        assert!(matches!(
            simulator.note_files(),
            Err(ConfigError::InvalidNoteKey { .. })
        ));
    }

    #[test]
    fn test_invalid_values() {
        let simulator = parse(
            r#"
            audio:
              device: mock-device
            sustain_offset: soon
            playback_ratio: 0
            volume:
              base: -2
            frame_interval: 0ms
            "#,
        );
        assert!(matches!(
            simulator.sustain_offset(),
            Err(ConfigError::InvalidDuration { .. })
        ));
        assert!(simulator.playback_ratio().is_err());
        assert!(simulator.volume_base().is_err());
        assert!(simulator.frame_interval().is_err());
    }

    #[test]
    fn test_deserialize_resolves_against_config_dir() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("trumpet.yaml");
        fs::write(
            &path,
            "audio:\n  device: mock-device\nnotes_path: notes\nnotes:\n  \"10\": g4.wav\n",
        )?;

        let simulator = Simulator::deserialize(&path)?;
        assert_eq!(simulator.notes_dir(), tempdir.path().join("notes"));
        assert_eq!(
            simulator.note_files()?.get("10"),
            Some(&tempdir.path().join("notes").join("g4.wav"))
        );
        Ok(())
    }
}
