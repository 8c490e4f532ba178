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
use clap::{crate_version, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use trumpet_sim::config::{self, init_simulator_and_controller, Simulator};
use trumpet_sim::fingering::{chart, Harmonic};
use trumpet_sim::{audio, midi};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A virtual trumpet."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Prints the fingering chart.
    Chart {},
    /// Loads and verifies every note in the given config.
    Notes {
        /// The path to the simulator config.
        config_path: String,
    },
    /// Start will start the simulator.
    Start {
        /// The path to the simulator config.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Chart {} => {
            for harmonic in Harmonic::all() {
                let valves = chart::playable_valves(harmonic)
                    .iter()
                    .map(|valve| valve.to_string())
                    .collect::<Vec<String>>();
                println!(
                    "Harmonic {} (open {}, valves: {}):",
                    harmonic.index(),
                    chart::open_note(harmonic).unwrap_or("?"),
                    if valves.is_empty() {
                        String::from("none")
                    } else {
                        valves.join(", ")
                    }
                );
                for entry in chart::CHART
                    .iter()
                    .filter(|entry| entry.key.starts_with(char::from(b'0' + harmonic.index())))
                {
                    println!("- {:<5} {:<4} {}", entry.key, entry.note, entry.sample);
                }
            }
        }
        Commands::Notes { config_path } => {
            let simulator = Simulator::deserialize(&PathBuf::from(&config_path))?;
            let bank = config::load_bank(&simulator)?;

            println!(
                "Notes (count: {}, sample rate: {}Hz, channels: {}):",
                bank.len(),
                bank.sample_rate(),
                bank.source_channels()
            );
            for key in bank.keys() {
                let frames = bank.get(key.as_str()).map_or(0, |note| note.len());
                println!(
                    "- {:<5} {:<4} {:.2}s",
                    key.as_str(),
                    chart::note_name(key.as_str()).unwrap_or("?"),
                    frames as f64 / bank.sample_rate() as f64
                );
            }
        }
        Commands::Start { config_path } => {
            let (_output, mut controller) =
                init_simulator_and_controller(&PathBuf::from(config_path))?;
            controller.join().await?;
        }
    }

    Ok(())
}
