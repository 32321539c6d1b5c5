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
use std::error::Error;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use tracing::info;

use voxmix::audio::sample_provider::{read_encoded_file, SampleProvider, StreamingProvider};
use voxmix::audio::{list_devices, Output};
use voxmix::config::{self, Voxmix};
use voxmix::engine::{Engine, LoopRegion};
use voxmix::util::{file_label, format_timestamp, frames_to_duration};

/// How often the play command checks on its voice.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A real-time voice mixer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Prints the format and loop points of an audio file.
    Info {
        /// The audio file to inspect.
        path: PathBuf,
    },
    /// Plays an audio file through a voice.
    Play {
        /// The audio file to play.
        path: PathBuf,
        /// The device name to play through. Overrides the config file.
        #[arg[short, long]]
        device: Option<String>,
        /// The path to a voxmix config file.
        #[arg[short, long]]
        config: Option<PathBuf>,
        /// The voice volume.
        #[arg[short, long, default_value_t = 1.0]]
        volume: f32,
        /// Loop between the file's loop points until the duration runs out.
        #[arg[short, long = "loop"]]
        looped: bool,
        /// Decode the file while it plays instead of up front.
        #[arg[short, long]]
        stream: bool,
        /// Stop after this long, e.g. 30s or 2m.
        #[arg[short = 't', long]]
        duration: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Info { path } => print_info(&path)?,
        Commands::Play {
            path,
            device,
            config: config_path,
            volume,
            looped,
            stream,
            duration,
        } => {
            let settings = match config_path {
                Some(config_path) => config::load(&config_path)?,
                None => Voxmix::default(),
            };
            let limit: Option<Duration> = duration
                .map(|duration| DurationString::from_string(duration).map(Duration::from))
                .transpose()?;
            play(&path, &settings, device.as_deref(), volume, looped, stream, limit)?;
        }
    }

    Ok(())
}

fn print_info(path: &Path) -> Result<(), Box<dyn Error>> {
    let (data, extension) = read_encoded_file(path)?;
    let provider = StreamingProvider::from_bytes(data, extension.as_deref())?;
    let region = LoopRegion::resolve(
        provider.loop_start_frames(),
        provider.loop_end_frames(),
        provider.frame_count(),
    );

    println!("{}:", file_label(path));
    println!("- Channels: {}", provider.channel_count());
    println!("- Sample rate: {}", provider.sample_rate());
    println!("- Frames: {}", provider.frame_count());
    println!("- Duration: {}", format_timestamp(provider.duration()));
    println!(
        "- Loop: {}..{} ({} to {})",
        region.start,
        region.end,
        format_timestamp(frames_to_duration(region.start, provider.sample_rate())),
        format_timestamp(frames_to_duration(region.end, provider.sample_rate()))
    );
    Ok(())
}

fn play(
    path: &Path,
    settings: &Voxmix,
    device: Option<&str>,
    volume: f32,
    looped: bool,
    stream: bool,
    limit: Option<Duration>,
) -> Result<(), Box<dyn Error>> {
    let mut audio = settings.audio();
    if let Some(device) = device {
        audio = audio.with_device(device);
    }

    let (mut engine, mixer) = Engine::new(&settings.engine());
    let source = if stream {
        engine.load_streaming_source_from_path(path)
    } else {
        engine.load_source_from_path(path)
    };
    let length = match engine.source(source) {
        Some(source) => frames_to_duration(source.end_frame(), source.sample_rate()),
        None => return Err(format!("unable to load {}", path.display()).into()),
    };

    let output = Output::start(&audio, mixer)?;
    let handle = engine.allocate_voice(source);
    let voice = engine.voice(handle);
    voice.set_volume(volume);
    voice.set_loop_state(looped);
    voice.set_playing(true);

    println!(
        "Playing {} ({}) on {}",
        file_label(path),
        format_timestamp(length),
        output.name()
    );

    let started = Instant::now();
    while engine.voice(handle).is_playing() {
        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            info!("Duration reached, stopping");
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    engine.free_voice(handle);
    output.stop();
    Ok(())
}
