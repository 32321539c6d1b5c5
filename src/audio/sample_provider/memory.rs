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
use super::traits::{LoopPoints, SampleProvider};

/// A fully decoded provider that keeps all of its samples in memory.
/// Any number of voices may read from it concurrently through [`SampleProvider::read_samples`],
/// each with its own frame cursor.
pub struct MemoryProvider {
    /// Interleaved sample storage.
    samples: Vec<i16>,
    /// Sequential cursor used by next_samples, in samples.
    position: usize,
    channel_count: u16,
    sample_rate: u32,
    loop_points: LoopPoints,
}

impl MemoryProvider {
    /// Creates a new memory provider from interleaved samples.
    /// Trailing samples that do not form a whole frame are dropped.
    pub fn new(mut samples: Vec<i16>, channel_count: u16, sample_rate: u32) -> Self {
        let channels = channel_count.max(1) as usize;
        samples.truncate(samples.len() - samples.len() % channels);

        Self {
            samples,
            position: 0,
            channel_count,
            sample_rate,
            loop_points: LoopPoints::default(),
        }
    }

    /// Sets the authored loop points.
    pub fn with_loop_points(mut self, loop_points: LoopPoints) -> Self {
        self.loop_points = loop_points;
        self
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<i16>()
    }
}

impl SampleProvider for MemoryProvider {
    fn is_streaming_only(&self) -> bool {
        false
    }

    fn channel_count(&self) -> u16 {
        self.channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn sample_amount(&self) -> usize {
        self.samples.len()
    }

    fn loop_start_frames(&self) -> usize {
        self.loop_points.start
    }

    fn loop_end_frames(&self) -> usize {
        self.loop_points.end
    }

    fn read_samples(&self, dst: &mut [i16], offset: usize) -> usize {
        let available = self.samples.len().saturating_sub(offset);
        let to_copy = available.min(dst.len());

        if to_copy > 0 {
            dst[..to_copy].copy_from_slice(&self.samples[offset..offset + to_copy]);
        }

        to_copy
    }

    fn next_samples(&mut self, dst: &mut [i16]) -> usize {
        let read = self.read_samples(dst, self.position);
        self.position += read;
        read
    }

    fn seek(&mut self, sample_position: usize) {
        if sample_position < self.samples.len() {
            self.position = sample_position;
        }
    }

    fn sample_position(&self) -> usize {
        self.position
    }
}

impl std::fmt::Debug for MemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProvider")
            .field("samples", &self.samples.len())
            .field("channel_count", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("loop_points", &self.loop_points)
            .finish()
    }
}
