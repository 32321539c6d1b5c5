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
use std::{error::Error, str::FromStr};

use serde::Deserialize;

use crate::audio::SampleFormat;

const DEFAULT_DEVICE: &str = "default";

/// How to choose the CPAL stream buffer size (period size). Affects latency vs underrun tolerance.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "RawStreamBufferSize")]
pub enum StreamBufferSize {
    /// Use the backend's default (may be high latency on some systems).
    Default,
    /// Use the device's minimum supported period size (lowest latency, most jitter-sensitive).
    Min,
    /// Use a fixed size in frames.
    Fixed(usize),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStreamBufferSize {
    Frames(usize),
    Named(String),
}

impl TryFrom<RawStreamBufferSize> for StreamBufferSize {
    type Error = String;

    fn try_from(raw: RawStreamBufferSize) -> Result<Self, Self::Error> {
        match raw {
            RawStreamBufferSize::Frames(0) => Err("stream buffer size must be positive".into()),
            RawStreamBufferSize::Frames(frames) => Ok(StreamBufferSize::Fixed(frames)),
            RawStreamBufferSize::Named(name) => match name.as_str() {
                "default" => Ok(StreamBufferSize::Default),
                "min" => Ok(StreamBufferSize::Min),
                other => other
                    .parse::<usize>()
                    .ok()
                    .filter(|frames| *frames > 0)
                    .map(StreamBufferSize::Fixed)
                    .ok_or_else(|| format!("unknown stream buffer size: {}", other)),
            },
        }
    }
}

/// A YAML representation of the audio output configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The audio device (default: the host's default output device).
    device: Option<String>,

    /// Output sample format, "int" or "float" (default: the device's native format)
    sample_format: Option<String>,

    /// CPAL stream buffer: "default" (backend default), "min" (lowest latency), or a number (frames).
    stream_buffer_size: Option<StreamBufferSize>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            ..Default::default()
        }
    }

    /// Replaces the configured device.
    pub fn with_device(mut self, device: &str) -> Audio {
        self.device = Some(device.to_string());
        self
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the output sample format, if one was configured.
    pub fn sample_format(&self) -> Result<Option<SampleFormat>, Box<dyn Error>> {
        self.sample_format
            .as_deref()
            .map(SampleFormat::from_str)
            .transpose()
    }

    /// Returns the stream buffer size choice for CPAL (default/min/fixed).
    pub fn stream_buffer_size(&self) -> Option<StreamBufferSize> {
        self.stream_buffer_size.clone()
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Result<Audio, config::ConfigError> {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn test_audio_defaults() {
        let audio = parse("{}").unwrap();
        assert_eq!(audio.device(), "default");
        assert_eq!(audio.sample_format().unwrap(), None);
        assert_eq!(audio.stream_buffer_size(), None);
    }

    #[test]
    fn test_audio_deserialize() {
        let audio = parse(
            r#"
            device: UltraLite-mk5
            sample_format: float
            stream_buffer_size: 256
        "#,
        )
        .unwrap();
        assert_eq!(audio.device(), "UltraLite-mk5");
        assert_eq!(audio.sample_format().unwrap(), Some(SampleFormat::Float));
        assert_eq!(audio.stream_buffer_size(), Some(StreamBufferSize::Fixed(256)));
    }

    #[test]
    fn test_stream_buffer_size_names() {
        let audio = parse("stream_buffer_size: min").unwrap();
        assert_eq!(audio.stream_buffer_size(), Some(StreamBufferSize::Min));

        let audio = parse("stream_buffer_size: default").unwrap();
        assert_eq!(audio.stream_buffer_size(), Some(StreamBufferSize::Default));

        assert!(parse("stream_buffer_size: huge").is_err());
    }

    #[test]
    fn test_invalid_sample_format() {
        let audio = parse("sample_format: double").unwrap();
        assert!(audio.sample_format().is_err());
    }

    #[test]
    fn test_audio_new() {
        assert_eq!(Audio::new("mock-device").device(), "mock-device");

        let audio = parse("sample_format: int").unwrap().with_device("other");
        assert_eq!(audio.device(), "other");
        assert_eq!(audio.sample_format().unwrap(), Some(SampleFormat::Int));
    }
}
