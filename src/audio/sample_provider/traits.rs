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
/// A source of 16-bit interleaved PCM samples.
///
/// Offsets and counts are measured in native samples (one `i16` per channel), while loop points
/// are measured in frames. Providers come in two flavours: buffered providers support random
/// access through [`SampleProvider::read_samples`], streaming-only providers have a single
/// sequential cursor that is moved with [`SampleProvider::seek`].
pub trait SampleProvider: Send {
    /// Whether this provider can only be read sequentially.
    fn is_streaming_only(&self) -> bool;

    /// Get the number of channels in this provider
    fn channel_count(&self) -> u16;

    /// Get the sample rate of this provider
    fn sample_rate(&self) -> u32;

    /// Total number of native samples across all channels.
    fn sample_amount(&self) -> usize;

    /// Authored loop start in frames (0 when absent).
    fn loop_start_frames(&self) -> usize;

    /// Authored loop end in frames (0 when absent).
    fn loop_end_frames(&self) -> usize;

    /// Copies samples starting at the absolute sample `offset` into `dst`.
    /// Returns the number of samples written, which is short only at the end of the data.
    /// Streaming-only providers always return 0.
    fn read_samples(&self, dst: &mut [i16], offset: usize) -> usize;

    /// Reads the next samples from the internal cursor into `dst`, advancing it.
    /// Returns the number of samples written (0 = EOF).
    fn next_samples(&mut self, dst: &mut [i16]) -> usize;

    /// Moves the internal cursor to the given absolute sample position.
    /// Positions past the end of the data are ignored.
    fn seek(&mut self, sample_position: usize);

    /// Current position of the internal cursor in samples.
    fn sample_position(&self) -> usize;

    /// Number of whole frames in this provider.
    fn frame_count(&self) -> usize {
        match self.channel_count() {
            0 => 0,
            channels => self.sample_amount() / channels as usize,
        }
    }

    /// Duration of this provider at its own sample rate.
    fn duration(&self) -> std::time::Duration {
        crate::util::frames_to_duration(self.frame_count(), self.sample_rate())
    }
}

/// Blanket implementation for Box<dyn SampleProvider>
impl SampleProvider for Box<dyn SampleProvider> {
    fn is_streaming_only(&self) -> bool {
        (**self).is_streaming_only()
    }

    fn channel_count(&self) -> u16 {
        (**self).channel_count()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn sample_amount(&self) -> usize {
        (**self).sample_amount()
    }

    fn loop_start_frames(&self) -> usize {
        (**self).loop_start_frames()
    }

    fn loop_end_frames(&self) -> usize {
        (**self).loop_end_frames()
    }

    fn read_samples(&self, dst: &mut [i16], offset: usize) -> usize {
        (**self).read_samples(dst, offset)
    }

    fn next_samples(&mut self, dst: &mut [i16]) -> usize {
        (**self).next_samples(dst)
    }

    fn seek(&mut self, sample_position: usize) {
        (**self).seek(sample_position)
    }

    fn sample_position(&self) -> usize {
        (**self).sample_position()
    }
}

/// Loop points authored into an asset, in frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopPoints {
    pub start: usize,
    pub end: usize,
}

impl LoopPoints {
    /// Creates loop points from a start and end frame.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// True when no loop end was authored.
    pub fn is_absent(&self) -> bool {
        self.end == 0
    }
}
