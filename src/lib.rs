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
//! A real-time voice mixing engine.
//!
//! Sources (fully decoded or streaming PCM) are registered with an [`engine::Engine`] and
//! played on a fixed pool of voices. The matching [`audio::Mixer`] renders the voices into
//! interleaved stereo from the audio callback, typically driven by an [`audio::Output`].
pub mod audio;
pub mod config;
pub mod engine;
pub mod util;

#[cfg(test)]
mod testutil;
