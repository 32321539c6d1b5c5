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
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// The file name of a path, for logs and terminal output.
pub fn file_label(path: &Path) -> &str {
    path.file_name()
        .and_then(OsStr::to_str)
        .unwrap_or("unreadable file name")
}

/// How long `frames` frames last at `sample_rate`. Exact to the nanosecond, so whole seconds
/// of audio come out as whole seconds.
pub fn frames_to_duration(frames: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let rate = u64::from(sample_rate);
    let frames = frames as u64;
    Duration::from_secs(frames / rate)
        + Duration::from_nanos(frames % rate * NANOS_PER_SECOND / rate)
}

/// Formats a duration as `minutes:seconds.millis`.
pub fn format_timestamp(duration: Duration) -> String {
    let millis = duration.as_millis();
    format!(
        "{}:{:02}.{:03}",
        millis / 60_000,
        millis / 1000 % 60,
        millis % 1000
    )
}

#[cfg(test)]
mod test {
    use std::path::Path;
    use std::time::Duration;

    use crate::util::{file_label, format_timestamp, frames_to_duration};

    #[test]
    fn test_frames_to_duration() {
        assert_eq!(frames_to_duration(44100, 44100), Duration::from_secs(1));
        assert_eq!(frames_to_duration(22050, 44100), Duration::from_millis(500));
        assert_eq!(
            frames_to_duration(48000 * 90 + 12000, 48000),
            Duration::from_millis(90_250)
        );
        assert_eq!(frames_to_duration(0, 44100), Duration::ZERO);
        assert_eq!(frames_to_duration(100, 0), Duration::ZERO);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!("0:00.000", format_timestamp(Duration::ZERO));
        assert_eq!("0:01.500", format_timestamp(Duration::from_millis(1500)));
        assert_eq!("2:05.250", format_timestamp(Duration::from_millis(125_250)));
        assert_eq!("60:06.000", format_timestamp(Duration::from_secs(3606)));
        assert_eq!(
            "0:00.022",
            format_timestamp(frames_to_duration(1000, 44100))
        );
    }

    #[test]
    fn test_file_label() {
        assert_eq!(file_label(Path::new("/sounds/loop.wav")), "loop.wav");
        assert_eq!(file_label(Path::new("/")), "unreadable file name");
    }
}
