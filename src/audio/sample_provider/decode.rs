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
//! Decoding collaborator backed by symphonia.
//!
//! Encoded bytes are probed by sniffing the container (an extension hint is used when one is
//! known), the first audio track is selected and packets are decoded to interleaved `i16`.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision};
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use super::error::SampleProviderError;
use super::traits::LoopPoints;

const LOOP_START_TAG: &str = "LoopStart";
const LOOP_END_TAG: &str = "LoopEnd";

/// Reads and decodes packets of a single audio track.
pub(crate) struct PacketDecoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    /// Interleaved samples of the last decoded packet.
    sample_buffer: Option<SampleBuffer<i16>>,
    /// Number of valid samples in sample_buffer.
    valid: usize,
    channels: u16,
    sample_rate: u32,
    n_frames: Option<u64>,
    loop_points: LoopPoints,
}

impl PacketDecoder {
    /// Opens encoded audio held in memory.
    pub(crate) fn open(data: Vec<u8>, extension: Option<&str>) -> Result<Self, SampleProviderError> {
        if data.is_empty() {
            return Err(SampleProviderError::EmptyInput);
        }

        let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let mut probed = get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;

        // Tags found ahead of the container (e.g. ID3v2) come first, container tags override them.
        let mut loop_points = LoopPoints::default();
        if let Some(metadata) = probed.metadata.get() {
            if let Some(revision) = metadata.current() {
                read_loop_points(revision, &mut loop_points);
            }
        }

        let mut format_reader = probed.format;
        if let Some(revision) = format_reader.metadata().current() {
            read_loop_points(revision, &mut loop_points);
        }

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(SampleProviderError::NoAudioTrack)?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or(SampleProviderError::UnknownSampleRate)?;
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);
        if !(1..=2).contains(&channels) {
            return Err(SampleProviderError::UnsupportedChannelCount(channels));
        }

        let decoder_opts: DecoderOptions = Default::default();
        let decoder = get_codecs().make(&params, &decoder_opts)?;

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            sample_buffer: None,
            valid: 0,
            channels,
            sample_rate,
            n_frames: params.n_frames,
            loop_points,
        })
    }

    pub(crate) fn channels(&self) -> u16 {
        self.channels
    }

    pub(crate) fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total frames reported by the container, if known.
    pub(crate) fn n_frames(&self) -> Option<u64> {
        self.n_frames
    }

    pub(crate) fn loop_points(&self) -> LoopPoints {
        self.loop_points
    }

    /// Samples of the most recently decoded packet.
    pub(crate) fn decoded(&self) -> &[i16] {
        match &self.sample_buffer {
            Some(buffer) => &buffer.samples()[..self.valid],
            None => &[],
        }
    }

    /// Forgets the samples of the most recently decoded packet.
    pub(crate) fn clear(&mut self) {
        self.valid = 0;
    }

    /// Decodes the next packet of the track.
    /// Returns the number of samples now available through decoded(), 0 at end of stream.
    pub(crate) fn decode_next(&mut self) -> Result<usize, SampleProviderError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.valid = 0;
                    return Ok(0);
                }
                Err(SymphoniaError::DecodeError(_)) => {
                    // Some readers report the end of the stream this way.
                    self.valid = 0;
                    return Ok(0);
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;
            let needed = decoded.capacity() * spec.channels.count();
            if self
                .sample_buffer
                .as_ref()
                .is_some_and(|buffer| buffer.capacity() < needed)
            {
                self.sample_buffer = None;
            }

            let buffer = self
                .sample_buffer
                .get_or_insert_with(|| SampleBuffer::new(duration, spec));
            buffer.copy_interleaved_ref(decoded);
            self.valid = buffer.len();
            return Ok(self.valid);
        }
    }

    /// Seeks to the given frame. Returns the number of frames that must be discarded from the
    /// following packets to land exactly on the requested frame.
    pub(crate) fn seek_frame(&mut self, frame: u64) -> Result<u64, SampleProviderError> {
        let seeked = self.format_reader.seek(
            SeekMode::Accurate,
            SeekTo::TimeStamp {
                ts: frame,
                track_id: self.track_id,
            },
        )?;
        self.decoder.reset();
        self.valid = 0;
        Ok(seeked.required_ts.saturating_sub(seeked.actual_ts))
    }
}

/// Picks up LoopStart/LoopEnd tags. Keys are matched case-insensitively and any prefix such as
/// `TXXX:` is ignored.
fn read_loop_points(revision: &MetadataRevision, loop_points: &mut LoopPoints) {
    for tag in revision.tags() {
        let key = tag.key.rsplit(':').next().unwrap_or(tag.key.as_str());
        let Ok(value) = tag.value.to_string().trim().parse::<usize>() else {
            continue;
        };

        if key.eq_ignore_ascii_case(LOOP_START_TAG) {
            loop_points.start = value;
        } else if key.eq_ignore_ascii_case(LOOP_END_TAG) {
            loop_points.end = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_empty_input() {
        assert!(matches!(
            PacketDecoder::open(Vec::new(), None),
            Err(SampleProviderError::EmptyInput)
        ));
    }

    #[test]
    fn test_open_garbage_input() {
        let garbage = vec![0x42u8; 256];
        assert!(PacketDecoder::open(garbage, None).is_err());
    }

    #[test]
    fn test_decode_wav_packets() {
        let samples: Vec<i16> = (0..500).map(|i| i as i16).collect();
        let wav = crate::testutil::wav_bytes(&samples, 1, 44100);

        let mut decoder = PacketDecoder::open(wav, None).unwrap();
        assert_eq!(decoder.channels(), 1);
        assert_eq!(decoder.sample_rate(), 44100);
        assert_eq!(decoder.n_frames(), Some(500));
        assert_eq!(decoder.loop_points(), LoopPoints::default());

        let mut decoded = Vec::new();
        loop {
            let count = decoder.decode_next().unwrap();
            if count == 0 {
                break;
            }
            decoded.extend_from_slice(decoder.decoded());
        }
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_read_loop_points_from_tags() {
        use symphonia::core::meta::{MetadataBuilder, Tag, Value};

        let mut builder = MetadataBuilder::new();
        builder
            .add_tag(Tag::new(None, "TXXX:LoopStart", Value::String("100".into())))
            .add_tag(Tag::new(None, "LOOPEND", Value::String(" 1000 ".into())))
            .add_tag(Tag::new(None, "TITLE", Value::String("theme".into())));
        let revision = builder.metadata();

        let mut loop_points = LoopPoints::default();
        read_loop_points(&revision, &mut loop_points);
        assert_eq!(loop_points, LoopPoints::new(100, 1000));
    }

    #[test]
    fn test_read_loop_points_ignores_unparsable_values() {
        use symphonia::core::meta::{MetadataBuilder, Tag, Value};

        let mut builder = MetadataBuilder::new();
        builder.add_tag(Tag::new(None, "LoopStart", Value::String("soon".into())));
        let revision = builder.metadata();

        let mut loop_points = LoopPoints::new(5, 10);
        read_loop_points(&revision, &mut loop_points);
        assert_eq!(loop_points, LoopPoints::new(5, 10));
    }
}
