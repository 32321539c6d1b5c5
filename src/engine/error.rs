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
use crate::audio::sample_provider::SampleProviderError;
use crate::engine::source::SourceHandle;

/// Errors returned by the control half of the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unsupported provider: {0}")]
    InvalidProvider(#[source] SampleProviderError),

    #[error("source {0} is not registered")]
    InvalidSource(SourceHandle),

    #[error("no free voices left in the pool of {0}")]
    PoolExhausted(usize),

    #[error("the mixer command queue is full")]
    QueueFull,

    #[error("provider error: {0}")]
    Provider(#[from] SampleProviderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
