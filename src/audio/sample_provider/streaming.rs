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
use super::decode::PacketDecoder;
use super::error::SampleProviderError;
use super::traits::{LoopPoints, SampleProvider};

/// A provider that decodes its encoded data incrementally as it is read.
///
/// It has exactly one read cursor, so only one voice may consume it at a time. Random access
/// is not supported: [`SampleProvider::read_samples`] always returns 0 and callers reposition
/// the cursor with [`SampleProvider::seek`] instead.
pub struct StreamingProvider {
    decoder: PacketDecoder,
    channel_count: u16,
    sample_rate: u32,
    sample_amount: usize,
    loop_points: LoopPoints,
    /// Cursor position in samples.
    position: usize,
    /// Read offset into the decoder's current packet.
    packet_offset: usize,
    /// Samples still to be dropped after an accurate seek landed before the target.
    discard: usize,
    /// True once the decoder ran dry or failed.
    finished: bool,
}

impl StreamingProvider {
    /// Creates a streaming provider over encoded bytes. The bytes are owned by the provider for
    /// its whole lifetime.
    pub fn from_bytes(data: Vec<u8>, extension: Option<&str>) -> Result<Self, SampleProviderError> {
        let decoder = PacketDecoder::open(data, extension)?;
        let channel_count = decoder.channels();
        let frames = decoder.n_frames().ok_or(SampleProviderError::UnknownLength)?;

        Ok(Self {
            channel_count,
            sample_rate: decoder.sample_rate(),
            sample_amount: frames as usize * channel_count as usize,
            loop_points: decoder.loop_points(),
            decoder,
            position: 0,
            packet_offset: 0,
            discard: 0,
            finished: false,
        })
    }

    /// Sets the loop points, replacing any that were read from the stream's tags.
    pub fn with_loop_points(mut self, loop_points: LoopPoints) -> Self {
        self.loop_points = loop_points;
        self
    }

    /// Makes sure the current packet has unread samples. Returns false at end of stream.
    fn fill_packet(&mut self) -> bool {
        while self.packet_offset >= self.decoder.decoded().len() {
            if self.finished {
                return false;
            }

            match self.decoder.decode_next() {
                Ok(0) | Err(_) => {
                    self.finished = true;
                    return false;
                }
                Ok(count) => {
                    let skip = self.discard.min(count);
                    self.discard -= skip;
                    self.packet_offset = skip;
                }
            }
        }
        true
    }
}

impl SampleProvider for StreamingProvider {
    fn is_streaming_only(&self) -> bool {
        true
    }

    fn channel_count(&self) -> u16 {
        self.channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn sample_amount(&self) -> usize {
        self.sample_amount
    }

    fn loop_start_frames(&self) -> usize {
        self.loop_points.start
    }

    fn loop_end_frames(&self) -> usize {
        self.loop_points.end
    }

    fn read_samples(&self, _dst: &mut [i16], _offset: usize) -> usize {
        0
    }

    fn next_samples(&mut self, dst: &mut [i16]) -> usize {
        let limit = self
            .sample_amount
            .saturating_sub(self.position)
            .min(dst.len());

        let mut written = 0;
        while written < limit && self.fill_packet() {
            let available = &self.decoder.decoded()[self.packet_offset..];
            let count = available.len().min(limit - written);
            dst[written..written + count].copy_from_slice(&available[..count]);
            written += count;
            self.packet_offset += count;
        }

        self.position += written;
        written
    }

    fn seek(&mut self, sample_position: usize) {
        if sample_position >= self.sample_amount {
            return;
        }

        let channels = self.channel_count as usize;
        let frame = sample_position / channels;
        if let Ok(discard_frames) = self.decoder.seek_frame(frame as u64) {
            self.decoder.clear();
            self.packet_offset = 0;
            self.discard = discard_frames as usize * channels;
            self.position = frame * channels;
            self.finished = false;
        }
    }

    fn sample_position(&self) -> usize {
        self.position
    }
}

impl std::fmt::Debug for StreamingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingProvider")
            .field("channel_count", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("sample_amount", &self.sample_amount)
            .field("position", &self.position)
            .finish()
    }
}
