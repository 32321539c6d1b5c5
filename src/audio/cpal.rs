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
use std::{error::Error, fmt, thread, time::Duration};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use crate::audio::mixer::{Mixer, OUTPUT_CHANNELS};
use crate::audio::SampleFormat;
use crate::config::{self, StreamBufferSize};

/// How long to wait for the output thread to report that the stream is running.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// An output device as reported by cpal.
#[derive(Debug, Clone)]
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
}

impl Device {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_channels(&self) -> u16 {
        self.max_channels
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Lists the output devices of every available host.
pub fn list_devices() -> Result<Vec<Device>, Box<dyn Error>> {
    let mut devices: Vec<Device> = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(output_configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = output_configs
                .map(|output_config| output_config.channels())
                .max()
                .unwrap_or(0);

            if max_channels > 0 {
                devices.push(Device {
                    name: device.name()?,
                    max_channels,
                    host_id,
                });
            }
        }
    }

    devices.sort_by_key(|device| device.name.to_string());
    Ok(devices)
}

/// Finds a cpal output device by name. "default" picks the default host's default device.
fn find_device(name: &str) -> Result<cpal::Device, Box<dyn Error>> {
    if name == "default" {
        return cpal::default_host()
            .default_output_device()
            .ok_or_else(|| "no default output device".into());
    }

    for host_id in cpal::available_hosts() {
        let Ok(devices) = cpal::host_from_id(host_id)?.output_devices() else {
            continue;
        };
        for device in devices {
            if device.name().is_ok_and(|device_name| device_name.trim() == name) {
                return Ok(device);
            }
        }
    }
    Err(format!("no device found with name {}", name).into())
}

/// A running cpal output stream driven by a [`Mixer`].
///
/// cpal streams can't move between threads, so the stream is built and kept alive on a
/// dedicated output thread until the output is stopped or dropped.
pub struct Output {
    /// The name of the device.
    name: String,
    /// The stream configuration, for display.
    stream_description: String,
    sample_format: SampleFormat,
    /// Dropping this wakes the output thread so it can drop the stream.
    shutdown: Option<crossbeam_channel::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Output {
    /// Opens the configured device at its default sample rate and starts rendering `mixer`
    /// into it.
    pub fn start(config: &config::Audio, mixer: Mixer) -> Result<Output, Box<dyn Error>> {
        let device = find_device(config.device())?;
        let name = device.name()?;
        let supported = device.default_output_config()?;

        let sample_format = match config.sample_format()? {
            Some(sample_format) => sample_format,
            None => SampleFormat::from_cpal(supported.sample_format()),
        };
        let buffer_size = match config.stream_buffer_size() {
            Some(StreamBufferSize::Fixed(frames)) => cpal::BufferSize::Fixed(frames as u32),
            Some(StreamBufferSize::Min) => match supported.buffer_size() {
                cpal::SupportedBufferSize::Range { min, .. } => cpal::BufferSize::Fixed(*min),
                cpal::SupportedBufferSize::Unknown => cpal::BufferSize::Default,
            },
            Some(StreamBufferSize::Default) | None => cpal::BufferSize::Default,
        };
        let mut stream_config = supported.config();
        stream_config.channels = OUTPUT_CHANNELS as u16;
        stream_config.buffer_size = buffer_size;
        let stream_description = format!("{:?}", stream_config);

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let thread_name = name.clone();
        let thread = thread::Builder::new()
            .name("voxmix-output".into())
            .spawn(move || {
                let span = span!(Level::INFO, "output", device = %thread_name);
                let _enter = span.enter();

                let stream = match build_stream(&device, &stream_config, sample_format, mixer)
                    .and_then(|stream| stream.play().map(|_| stream).map_err(|e| e.into()))
                {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!(err = %e, "Failed to start CPAL stream");
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                info!("CPAL output stream started successfully");
                let _ = ready_tx.send(Ok(()));

                // Keep the stream alive until the output is stopped.
                let _ = shutdown_rx.recv();
                drop(stream);
                info!("CPAL output stream stopped");
            })?;

        match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e.into());
            }
            Err(_) => return Err("timed out waiting for the output stream to start".into()),
        }

        info!(
            device = name,
            config = stream_description,
            format = sample_format.as_str(),
            "Output started"
        );
        Ok(Output {
            name,
            stream_description,
            sample_format,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The channels, rate and buffer size the stream was opened with.
    pub fn stream_description(&self) -> &str {
        &self.stream_description
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    /// Stops the stream and waits for the output thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("name", &self.name)
            .field("stream", &self.stream_description)
            .field("sample_format", &self.sample_format)
            .finish()
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: SampleFormat,
    mut mixer: Mixer,
) -> Result<cpal::Stream, Box<dyn Error>> {
    let stream = match sample_format {
        SampleFormat::Float => device.build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| mixer.mix(data),
            |err| error!("CPAL output stream error: {}", err),
            None,
        )?,
        SampleFormat::Int => device.build_output_stream(
            config,
            create_integer_callback::<i16>(mixer),
            |err| error!("CPAL output stream error: {}", err),
            None,
        )?,
    };
    Ok(stream)
}

/// Integer callback: mix into a scratch buffer allocated up front, then convert.
fn create_integer_callback<T>(
    mut mixer: Mixer,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch = vec![0.0f32; mixer.block_size()];
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        convert_blocks(&mut mixer, &mut scratch, data);
    }
}

fn convert_blocks<T>(mixer: &mut Mixer, scratch: &mut [f32], data: &mut [T])
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    for chunk in data.chunks_mut(scratch.len()) {
        let mixed = &mut scratch[..chunk.len()];
        mixer.mix(mixed);
        for (dst, &src) in chunk.iter_mut().zip(mixed.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::testutil::ramp;

    #[test]
    fn test_integer_conversion_matches_mixer() {
        let (mut engine, mut mixer) = Engine::new(&config::Engine::default());
        let source = engine.register_source(crate::audio::sample_provider::MemoryProvider::new(
            ramp(64, 2).iter().map(|s| s * 100).collect(),
            2,
            44100,
        ));
        let voice = engine.allocate_voice(source);
        engine.voice(voice).set_playing(true);

        let mut scratch = vec![0.0f32; 16];
        let mut data = vec![0i16; 40];
        convert_blocks(&mut mixer, &mut scratch, &mut data);

        // Frame i of the ramp is i * 100 on both channels.
        for (index, sample) in data.iter().enumerate() {
            let expected = (index / 2) as i16 * 100;
            assert!((sample - expected).abs() <= 1, "{} != {}", sample, expected);
        }
    }
}
