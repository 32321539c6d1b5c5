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
//! Helpers shared by the unit tests.

use std::error::Error;
use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

/// Encodes interleaved 16-bit samples as an in-memory WAV file.
pub fn wav_bytes(samples: &[i16], channels: u16, sample_rate: u32) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(
            &mut cursor,
            WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
        )
        .expect("wav writer");
        for sample in samples {
            writer.write_sample(*sample).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}

/// Writes interleaved 16-bit samples to a WAV file on disk.
pub fn write_wav(
    path: &Path,
    samples: &[i16],
    channels: u16,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    std::fs::write(path, wav_bytes(samples, channels, sample_rate))?;
    Ok(())
}

/// A ramp of `frames` frames where every channel of frame `i` holds `i` (wrapping at i16::MAX).
pub fn ramp(frames: usize, channels: u16) -> Vec<i16> {
    (0..frames)
        .flat_map(|frame| std::iter::repeat((frame % i16::MAX as usize) as i16).take(channels as usize))
        .collect()
}

/// Converts a native sample the same way the mixer does.
pub fn to_float(sample: i16) -> f32 {
    sample as f32 / i16::MAX as f32
}
