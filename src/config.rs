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
use std::path::Path;

use config::{Config, File, FileFormat};
use serde::Deserialize;

mod audio;
mod engine;
mod error;

pub use audio::{Audio, StreamBufferSize};
pub use engine::Engine;
pub use error::ConfigError;

/// The top level configuration file.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Voxmix {
    /// The voice engine configuration.
    engine: Option<Engine>,
    /// The audio output configuration.
    audio: Option<Audio>,
}

impl Voxmix {
    /// Returns the engine configuration, defaulted if the section is missing.
    pub fn engine(&self) -> Engine {
        self.engine.clone().unwrap_or_default()
    }

    /// Returns the audio configuration, defaulted if the section is missing.
    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }

    fn validate(self) -> Result<Voxmix, ConfigError> {
        self.engine().validate()?;
        self.audio()
            .sample_format()
            .map_err(|e| ConfigError::Invalid {
                field: "sample_format",
                message: e.to_string(),
            })?;
        Ok(self)
    }
}

/// Loads and validates a configuration file. The format is picked from the file extension.
pub fn load(path: &Path) -> Result<Voxmix, ConfigError> {
    let config: Voxmix = Config::builder()
        .add_source(File::from(path))
        .build()?
        .try_deserialize()?;
    config.validate()
}

/// Parses and validates YAML configuration.
pub fn parse(yaml: &str) -> Result<Voxmix, ConfigError> {
    let config: Voxmix = Config::builder()
        .add_source(File::from_str(yaml, FileFormat::Yaml))
        .build()?
        .try_deserialize()?;
    config.validate()
}
