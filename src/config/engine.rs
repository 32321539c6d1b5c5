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
use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_MAX_VOICES: usize = 128;
const DEFAULT_BLOCK_SIZE: usize = 2048;
const DEFAULT_SOURCE_CAPACITY: usize = 64;
const DEFAULT_COMMAND_QUEUE_SIZE: usize = 256;
const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// A YAML representation of the voice engine configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Engine {
    /// Size of the voice pool (default: 128).
    max_voices: Option<usize>,

    /// Output samples mixed per block, across both channels (default: 2048).
    block_size: Option<usize>,

    /// Number of sources the mixer can hold before its table has to grow (default: 64).
    source_capacity: Option<usize>,

    /// Registry changes that can be waiting for the mixer at once (default: 256).
    command_queue_size: Option<usize>,

    /// The sample rate sources are expected to be at (default: 44100).
    sample_rate: Option<u32>,
}

impl Engine {
    /// Returns the size of the voice pool.
    pub fn max_voices(&self) -> usize {
        self.max_voices.unwrap_or(DEFAULT_MAX_VOICES)
    }

    /// Returns the number of output samples mixed per block.
    pub fn block_size(&self) -> usize {
        self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    /// Returns the number of sources preallocated in the mixer.
    pub fn source_capacity(&self) -> usize {
        self.source_capacity.unwrap_or(DEFAULT_SOURCE_CAPACITY)
    }

    /// Returns the capacity of the mixer command queue.
    pub fn command_queue_size(&self) -> usize {
        self.command_queue_size.unwrap_or(DEFAULT_COMMAND_QUEUE_SIZE)
    }

    /// Returns the expected source sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Sets the size of the voice pool.
    pub fn with_max_voices(mut self, max_voices: usize) -> Engine {
        self.max_voices = Some(max_voices);
        self
    }

    /// Sets the number of output samples mixed per block.
    pub fn with_block_size(mut self, block_size: usize) -> Engine {
        self.block_size = Some(block_size);
        self
    }

    /// Sets the number of sources preallocated in the mixer.
    pub fn with_source_capacity(mut self, source_capacity: usize) -> Engine {
        self.source_capacity = Some(source_capacity);
        self
    }

    /// Sets the capacity of the mixer command queue.
    pub fn with_command_queue_size(mut self, command_queue_size: usize) -> Engine {
        self.command_queue_size = Some(command_queue_size);
        self
    }

    /// Checks that the values can be used to build an engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_voices() == 0 {
            return Err(ConfigError::invalid("max_voices", "must be at least 1"));
        }
        if self.block_size() < 2 || self.block_size() % 2 != 0 {
            return Err(ConfigError::invalid(
                "block_size",
                format!("{} is not a positive even number", self.block_size()),
            ));
        }
        if self.command_queue_size() == 0 {
            return Err(ConfigError::invalid("command_queue_size", "must be at least 1"));
        }
        if self.sample_rate() == 0 {
            return Err(ConfigError::invalid("sample_rate", "must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Engine {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_engine_defaults() {
        let engine = Engine::default();
        assert_eq!(engine.max_voices(), 128);
        assert_eq!(engine.block_size(), 2048);
        assert_eq!(engine.source_capacity(), 64);
        assert_eq!(engine.command_queue_size(), 256);
        assert_eq!(engine.sample_rate(), 44100);
        assert!(engine.validate().is_ok());
    }

    #[test]
    fn test_engine_deserialize() {
        let engine = parse(
            r#"
            max_voices: 32
            block_size: 512
            sample_rate: 48000
        "#,
        );
        assert_eq!(engine.max_voices(), 32);
        assert_eq!(engine.block_size(), 512);
        assert_eq!(engine.sample_rate(), 48000);
        assert_eq!(engine.source_capacity(), 64);
    }

    #[test]
    fn test_engine_validate() {
        assert!(Engine::default().with_max_voices(0).validate().is_err());
        assert!(Engine::default().with_block_size(0).validate().is_err());
        assert!(Engine::default().with_block_size(1025).validate().is_err());
        assert!(Engine::default()
            .with_command_queue_size(0)
            .validate()
            .is_err());
        assert!(parse("sample_rate: 0").validate().is_err());
    }
}
