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

use super::decode::PacketDecoder;
use super::error::SampleProviderError;
use super::memory::MemoryProvider;
use super::streaming::StreamingProvider;

/// Decodes encoded audio completely into a MemoryProvider.
pub fn create_memory_provider(
    data: &[u8],
    extension: Option<&str>,
) -> Result<MemoryProvider, SampleProviderError> {
    let mut decoder = PacketDecoder::open(data.to_vec(), extension)?;

    let channels = decoder.channels();
    let capacity = decoder
        .n_frames()
        .map(|frames| frames as usize * channels as usize)
        .unwrap_or_default();
    let mut samples = Vec::with_capacity(capacity);

    while decoder.decode_next()? > 0 {
        samples.extend_from_slice(decoder.decoded());
    }

    Ok(MemoryProvider::new(samples, channels, decoder.sample_rate())
        .with_loop_points(decoder.loop_points()))
}

/// Creates a StreamingProvider over a copy of the encoded audio.
pub fn create_streaming_provider(
    data: &[u8],
    extension: Option<&str>,
) -> Result<StreamingProvider, SampleProviderError> {
    if data.is_empty() {
        return Err(SampleProviderError::EmptyInput);
    }
    StreamingProvider::from_bytes(data.to_vec(), extension)
}

/// Reads an encoded file, returning its bytes and the extension to use as a decoding hint.
pub fn read_encoded_file<P: AsRef<Path>>(
    path: P,
) -> Result<(Vec<u8>, Option<String>), SampleProviderError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        SampleProviderError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_string);
    Ok((data, extension))
}
