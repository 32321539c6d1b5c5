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
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::sample_provider::{SampleProvider, SampleProviderError};
use crate::engine::voice::{VoiceHandle, VoicePool};

/// Sentinel stored in atomics that hold a slot index.
pub(crate) const NO_INDEX: u32 = u32::MAX;

/// Identifies a registered source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceHandle(u32);

impl SourceHandle {
    /// The handle returned when a source could not be registered.
    pub const INVALID: SourceHandle = SourceHandle(NO_INDEX);

    pub(crate) fn from_index(index: usize) -> SourceHandle {
        SourceHandle(index as u32)
    }

    pub(crate) fn from_raw(raw: u32) -> SourceHandle {
        SourceHandle(raw)
    }

    pub(crate) fn raw(&self) -> u32 {
        self.0
    }

    /// The registry slot this handle refers to.
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// True unless this is [`SourceHandle::INVALID`].
    pub fn is_valid(&self) -> bool {
        self.0 != NO_INDEX
    }
}

impl Default for SourceHandle {
    fn default() -> Self {
        SourceHandle::INVALID
    }
}

impl fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            write!(f, "#invalid")
        }
    }
}

/// The loop region of a source in frames. `start < end` always holds for a non-empty source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopRegion {
    pub start: usize,
    pub end: usize,
}

impl LoopRegion {
    /// Resolves authored loop points against the length of the source. Without an end the
    /// whole source loops, even if a start was authored. An end outside `(start, end_frame]`
    /// falls back to the end of the source, and a start that doesn't fit before the end falls
    /// back to the beginning.
    pub fn resolve(loop_start: usize, loop_end: usize, end_frame: usize) -> LoopRegion {
        if loop_end == 0 {
            return LoopRegion {
                start: 0,
                end: end_frame,
            };
        }
        let end = if loop_start < loop_end && loop_end <= end_frame {
            loop_end
        } else {
            end_frame
        };
        let start = if loop_start < end { loop_start } else { 0 };
        LoopRegion { start, end }
    }

    /// Length of the region in frames.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Metadata about a registered source, shared by the control half and the mixer.
pub struct SourceInfo {
    handle: SourceHandle,
    streaming: bool,
    channels: u16,
    sample_rate: u32,
    sample_amount: usize,
    loop_region: LoopRegion,
    /// Bits of the [`VoiceHandle`] allowed to read a streaming source.
    bound_voice: AtomicU64,
}

impl SourceInfo {
    /// Captures the metadata of a provider. Fails for channel layouts the mixer can't place on a
    /// stereo output.
    pub(crate) fn describe(
        handle: SourceHandle,
        provider: &dyn SampleProvider,
    ) -> Result<SourceInfo, SampleProviderError> {
        let channels = provider.channel_count();
        if !(1..=2).contains(&channels) {
            return Err(SampleProviderError::UnsupportedChannelCount(channels));
        }

        let sample_amount = provider.sample_amount();
        let end_frame = sample_amount / channels as usize;
        Ok(SourceInfo {
            handle,
            streaming: provider.is_streaming_only(),
            channels,
            sample_rate: provider.sample_rate(),
            sample_amount,
            loop_region: LoopRegion::resolve(
                provider.loop_start_frames(),
                provider.loop_end_frames(),
                end_frame,
            ),
            bound_voice: AtomicU64::new(VoiceHandle::INVALID.to_bits()),
        })
    }

    pub fn handle(&self) -> SourceHandle {
        self.handle
    }

    /// Whether the source can only be read through a single sequential cursor.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total number of native samples.
    pub fn sample_amount(&self) -> usize {
        self.sample_amount
    }

    /// Number of frames in the source.
    pub fn end_frame(&self) -> usize {
        self.sample_amount / self.channels as usize
    }

    pub fn loop_region(&self) -> LoopRegion {
        self.loop_region
    }

    /// The voice currently allowed to read a streaming source.
    pub fn bound_voice(&self) -> Option<VoiceHandle> {
        Some(VoiceHandle::from_bits(self.bound_voice.load(Ordering::Acquire)))
            .filter(VoiceHandle::is_valid)
    }

    pub(crate) fn is_bound_to(&self, voice: VoiceHandle) -> bool {
        self.bound_voice.load(Ordering::Acquire) == voice.to_bits()
    }

    /// Moves the streaming binding to `voice`. A different voice that held the binding is
    /// stopped and rewound to the first frame but keeps its source.
    pub(crate) fn bind(&self, voice: VoiceHandle, pool: &VoicePool) {
        if !self.streaming {
            return;
        }
        let previous =
            VoiceHandle::from_bits(self.bound_voice.swap(voice.to_bits(), Ordering::AcqRel));
        if previous.is_valid() && previous != voice {
            if let Some(slot) = pool.slot(previous.index()) {
                slot.stop_and_rewind(previous.generation());
            }
        }
    }

    /// Drops the streaming binding if `voice` holds it.
    pub(crate) fn unbind(&self, voice: VoiceHandle) {
        let _ = self.bound_voice.compare_exchange(
            voice.to_bits(),
            VoiceHandle::INVALID.to_bits(),
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
    }
}

impl fmt::Debug for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceInfo")
            .field("handle", &self.handle)
            .field("streaming", &self.streaming)
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("sample_amount", &self.sample_amount)
            .field("loop_region", &self.loop_region)
            .field("bound_voice", &self.bound_voice())
            .finish()
    }
}

/// A registered source as owned by the mixer.
pub(crate) struct SourceEntry {
    pub provider: Box<dyn SampleProvider>,
    pub info: Arc<SourceInfo>,
}

/// The engine's view of one source index.
#[derive(Debug, Default)]
pub(crate) enum SourceSlot {
    #[default]
    Free,
    Registered(Arc<SourceInfo>),
    /// Unloaded, but the mixer hasn't handed the provider back yet. The index can't be reused
    /// until it has.
    Unloading,
}

impl SourceSlot {
    pub(crate) fn info(&self) -> Option<&Arc<SourceInfo>> {
        match self {
            SourceSlot::Registered(info) => Some(info),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sample_provider::MemoryProvider;

    #[test]
    fn test_loop_region_authored() {
        assert_eq!(
            LoopRegion::resolve(100, 1000, 2000),
            LoopRegion {
                start: 100,
                end: 1000
            }
        );
    }

    #[test]
    fn test_loop_region_absent() {
        assert_eq!(
            LoopRegion::resolve(0, 0, 2000),
            LoopRegion { start: 0, end: 2000 }
        );
    }

    #[test]
    fn test_loop_region_end_past_source() {
        let region = LoopRegion::resolve(100, 5000, 2000);
        assert_eq!(region, LoopRegion { start: 100, end: 2000 });
        assert_eq!(region.len(), 1900);
    }

    #[test]
    fn test_loop_region_start_without_end() {
        assert_eq!(
            LoopRegion::resolve(100, 0, 2000),
            LoopRegion { start: 0, end: 2000 }
        );
        assert_eq!(
            LoopRegion::resolve(3000, 0, 2000),
            LoopRegion { start: 0, end: 2000 }
        );
    }

    #[test]
    fn test_loop_region_start_past_end() {
        assert_eq!(
            LoopRegion::resolve(500, 400, 2000),
            LoopRegion { start: 500, end: 2000 }
        );
    }

    #[test]
    fn test_describe_rejects_surround() {
        let surround = MemoryProvider::new(vec![0; 60], 6, 44100);
        assert!(matches!(
            SourceInfo::describe(SourceHandle::from_index(0), &surround),
            Err(SampleProviderError::UnsupportedChannelCount(6))
        ));

        let stereo = MemoryProvider::new(vec![0; 60], 2, 44100);
        let info = SourceInfo::describe(SourceHandle::from_index(1), &stereo).unwrap();
        assert_eq!(info.end_frame(), 30);
        assert_eq!(info.bound_voice(), None);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(SourceHandle::from_index(3).to_string(), "#3");
        assert_eq!(SourceHandle::INVALID.to_string(), "#invalid");
        assert!(!SourceHandle::default().is_valid());
    }
}
