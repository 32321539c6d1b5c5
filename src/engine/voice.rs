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
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::engine::source::{SourceHandle, SourceInfo, SourceSlot, NO_INDEX};

/// No seek is waiting for the mixer.
const NO_SEEK: usize = usize::MAX;

/// The bit pattern of 1.0f32.
const UNIT_VOLUME: u32 = 0x3f80_0000;

// Layout of a slot's state word. The generation takes the bits above the two flags.
const ALLOCATED: u32 = 1;
const PLAYING: u32 = 1 << 1;
const GENERATION_SHIFT: u32 = 2;

fn generation_of(state: u32) -> u32 {
    state >> GENERATION_SHIFT
}

/// The state of a slot right after it has been claimed: a new generation, allocated but not
/// yet playing.
fn claimed(state: u32) -> u32 {
    (generation_of(state).wrapping_add(1) << GENERATION_SHIFT) | ALLOCATED
}

/// Identifies one allocation of a slot in the voice pool. Once the slot is released the
/// handle goes stale and stays stale, even after the slot is handed out again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoiceHandle {
    index: u32,
    generation: u32,
}

impl VoiceHandle {
    /// The handle returned when no voice could be allocated.
    pub const INVALID: VoiceHandle = VoiceHandle {
        index: NO_INDEX,
        generation: 0,
    };

    pub(crate) fn new(index: usize, generation: u32) -> VoiceHandle {
        VoiceHandle {
            index: index as u32,
            generation,
        }
    }

    /// The pool slot this handle refers to.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    /// True unless this is [`VoiceHandle::INVALID`]. A valid handle may still refer to a voice
    /// that has since been released, see [`Voice::is_valid`].
    pub fn is_valid(&self) -> bool {
        self.index != NO_INDEX
    }

    pub(crate) fn to_bits(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    pub(crate) fn from_bits(bits: u64) -> VoiceHandle {
        VoiceHandle {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl Default for VoiceHandle {
    fn default() -> Self {
        VoiceHandle::INVALID
    }
}

impl fmt::Display for VoiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "voice {}.{}", self.index, self.generation)
        } else {
            write!(f, "invalid voice")
        }
    }
}

/// One playback slot. Every field is atomic so the control thread and the mixer can share the
/// pool without locks.
///
/// Allocation, playback and the generation live in one word, and every transition of that
/// word names the generation it applies to. A stop or release aimed at an older allocation
/// fails instead of touching the voice that reused the slot. The remaining fields are reset
/// when the slot is claimed. Only the mixer writes `frame_position`; the control thread posts
/// seeks through `pending_seek`.
pub(crate) struct VoiceSlot {
    state: AtomicU32,
    source: AtomicU32,
    volume: AtomicU32,
    looped: AtomicBool,
    deallocate_on_end: AtomicBool,
    frame_position: AtomicUsize,
    pending_seek: AtomicUsize,
}

impl VoiceSlot {
    fn new() -> VoiceSlot {
        VoiceSlot {
            state: AtomicU32::new(0),
            source: AtomicU32::new(NO_INDEX),
            volume: AtomicU32::new(UNIT_VOLUME),
            looped: AtomicBool::new(false),
            deallocate_on_end: AtomicBool::new(false),
            frame_position: AtomicUsize::new(0),
            pending_seek: AtomicUsize::new(NO_SEEK),
        }
    }

    pub(crate) fn is_allocated(&self) -> bool {
        self.state.load(Ordering::Acquire) & ALLOCATED != 0
    }

    /// True while `generation` is the current allocation of this slot.
    pub(crate) fn is_live(&self, generation: u32) -> bool {
        let state = self.state.load(Ordering::Acquire);
        state & ALLOCATED != 0 && generation_of(state) == generation
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.state.load(Ordering::Acquire) & (ALLOCATED | PLAYING) == ALLOCATED | PLAYING
    }

    /// The generation of the voice in this slot if it is allocated and playing.
    pub(crate) fn playing_generation(&self) -> Option<u32> {
        let state = self.state.load(Ordering::Acquire);
        (state & (ALLOCATED | PLAYING) == ALLOCATED | PLAYING).then(|| generation_of(state))
    }

    /// Applies `update` to the state word if `generation` is still the live allocation.
    fn transition(&self, generation: u32, update: impl Fn(u32) -> u32) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state & ALLOCATED != 0 && generation_of(state) == generation)
                    .then(|| update(state))
            })
            .is_ok()
    }

    pub(crate) fn set_playing(&self, generation: u32, playing: bool) -> bool {
        self.transition(generation, |state| {
            if playing {
                state | PLAYING
            } else {
                state & !PLAYING
            }
        })
    }

    pub(crate) fn is_looped(&self) -> bool {
        self.looped.load(Ordering::Acquire)
    }

    pub(crate) fn deallocates_on_end(&self) -> bool {
        self.deallocate_on_end.load(Ordering::Acquire)
    }

    pub(crate) fn source(&self) -> SourceHandle {
        SourceHandle::from_raw(self.source.load(Ordering::Acquire))
    }

    pub(crate) fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// The position the voice will play from next, including a seek not yet applied.
    pub(crate) fn frame_position(&self) -> usize {
        match self.pending_seek.load(Ordering::Acquire) {
            NO_SEEK => self.frame_position.load(Ordering::Acquire),
            frame => frame,
        }
    }

    /// The position last stored by the mixer.
    pub(crate) fn cursor(&self) -> usize {
        self.frame_position.load(Ordering::Acquire)
    }

    pub(crate) fn request_seek(&self, frame: usize) {
        self.pending_seek.store(frame, Ordering::Release);
    }

    pub(crate) fn take_pending_seek(&self) -> Option<usize> {
        match self.pending_seek.swap(NO_SEEK, Ordering::AcqRel) {
            NO_SEEK => None,
            frame => Some(frame),
        }
    }

    pub(crate) fn store_frame_position(&self, frame: usize) {
        self.frame_position.store(frame, Ordering::Release);
    }

    /// Stops the voice and rewinds it to the first frame, if it is still `generation`.
    pub(crate) fn stop_and_rewind(&self, generation: u32) {
        if self.set_playing(generation, false) {
            self.request_seek(0);
        }
    }

    /// Returns the slot to the free list. Fails when `generation` was already released.
    pub(crate) fn release(&self, generation: u32) -> bool {
        self.transition(generation, |state| state & !(ALLOCATED | PLAYING))
    }

    /// Clears the source if it is still `source`.
    pub(crate) fn detach_source(&self, source: SourceHandle) -> bool {
        self.source
            .compare_exchange(source.raw(), NO_INDEX, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }
}

/// Settings applied to a slot when it is claimed.
#[derive(Clone, Copy, Debug)]
pub(crate) struct VoiceStart {
    pub source: SourceHandle,
    pub volume: f32,
    pub playing: bool,
    pub deallocate_on_end: bool,
}

/// The fixed-size pool of voices shared by the engine and the mixer.
pub(crate) struct VoicePool {
    slots: Box<[VoiceSlot]>,
}

impl VoicePool {
    pub(crate) fn new(capacity: usize) -> VoicePool {
        VoicePool {
            slots: (0..capacity).map(|_| VoiceSlot::new()).collect(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn slot(&self, index: usize) -> Option<&VoiceSlot> {
        self.slots.get(index)
    }

    /// The slot behind a handle, if the allocation the handle names is still live.
    pub(crate) fn live_slot(&self, handle: VoiceHandle) -> Option<&VoiceSlot> {
        if !handle.is_valid() {
            return None;
        }
        self.slot(handle.index())
            .filter(|slot| slot.is_live(handle.generation()))
    }

    pub(crate) fn slots(&self) -> impl Iterator<Item = (usize, &VoiceSlot)> {
        self.slots.iter().enumerate()
    }

    pub(crate) fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_allocated()).count()
    }

    /// Claims the first free slot under a new generation. The mixer skips the slot until
    /// `playing` is published, which happens after every other field is reset.
    pub(crate) fn claim(&self, start: VoiceStart) -> Option<VoiceHandle> {
        let (index, generation) = self.slots.iter().enumerate().find_map(|(index, slot)| {
            slot.state
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                    (state & ALLOCATED == 0).then(|| claimed(state))
                })
                .ok()
                .map(|previous| (index, generation_of(claimed(previous))))
        })?;

        let slot = &self.slots[index];
        slot.source.store(start.source.raw(), Ordering::Release);
        slot.volume.store(start.volume.to_bits(), Ordering::Relaxed);
        slot.looped.store(false, Ordering::Release);
        slot.deallocate_on_end
            .store(start.deallocate_on_end, Ordering::Release);
        slot.request_seek(0);
        if start.playing {
            slot.set_playing(generation, true);
        }
        Some(VoiceHandle::new(index, generation))
    }
}

impl fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoicePool")
            .field("capacity", &self.capacity())
            .field("active", &self.active_count())
            .finish()
    }
}

/// Playback controls for one voice, borrowed from the engine.
///
/// Every accessor returns a default once the voice has been released, and every setter
/// becomes a no-op, even if the slot has been handed to another voice since.
pub struct Voice<'a> {
    handle: VoiceHandle,
    pool: &'a VoicePool,
    sources: &'a [SourceSlot],
}

impl<'a> Voice<'a> {
    pub(crate) fn new(
        handle: VoiceHandle,
        pool: &'a VoicePool,
        sources: &'a [SourceSlot],
    ) -> Voice<'a> {
        Voice {
            handle,
            pool,
            sources,
        }
    }

    fn slot(&self) -> Option<&'a VoiceSlot> {
        self.pool.live_slot(self.handle)
    }

    fn source_info(&self, source: SourceHandle) -> Option<&'a Arc<SourceInfo>> {
        if !source.is_valid() {
            return None;
        }
        self.sources.get(source.index()).and_then(SourceSlot::info)
    }

    pub fn handle(&self) -> VoiceHandle {
        self.handle
    }

    /// True while the handle refers to a voice that hasn't been released.
    pub fn is_valid(&self) -> bool {
        self.slot().is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.slot().is_some_and(VoiceSlot::is_playing)
    }

    /// Starts or pauses playback. Pausing keeps the frame position.
    pub fn set_playing(&self, playing: bool) {
        if self.handle.is_valid() {
            if let Some(slot) = self.pool.slot(self.handle.index()) {
                slot.set_playing(self.handle.generation(), playing);
            }
        }
    }

    pub fn is_looped(&self) -> bool {
        self.slot().is_some_and(VoiceSlot::is_looped)
    }

    pub fn set_loop_state(&self, looped: bool) {
        if let Some(slot) = self.slot() {
            slot.looped.store(looped, Ordering::Release);
        }
    }

    pub fn volume(&self) -> f32 {
        self.slot().map(VoiceSlot::volume).unwrap_or(0.0)
    }

    pub fn set_volume(&self, volume: f32) {
        if let Some(slot) = self.slot() {
            slot.volume.store(volume.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn source(&self) -> SourceHandle {
        self.slot()
            .map(VoiceSlot::source)
            .unwrap_or(SourceHandle::INVALID)
    }

    /// Points the voice at another source. Binding a streaming source takes it away from the
    /// voice that was reading it.
    pub fn set_source(&self, source: SourceHandle) {
        let Some(slot) = self.slot() else {
            return;
        };

        let info = self.source_info(source);
        if info.is_none() && source.is_valid() {
            debug!(voice = %self.handle, source = %source, "Source is not registered, clearing");
        }
        let stored = info.map(|info| info.handle()).unwrap_or(SourceHandle::INVALID);

        let previous = SourceHandle::from_raw(slot.source.swap(stored.raw(), Ordering::AcqRel));
        if previous != stored {
            if let Some(previous) = self.source_info(previous) {
                previous.unbind(self.handle);
            }
        }
        if let Some(info) = info {
            info.bind(self.handle, self.pool);
        }
    }

    /// The frame the voice plays next.
    pub fn frame_position(&self) -> usize {
        self.slot().map(VoiceSlot::frame_position).unwrap_or(0)
    }

    /// Moves the voice to `frame`. The mixer applies the move before it next reads the voice,
    /// seeking the provider of a streaming source.
    pub fn set_frame_position(&self, frame: usize) {
        if let Some(slot) = self.slot() {
            slot.request_seek(frame);
        }
    }
}

impl fmt::Debug for Voice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Voice")
            .field("handle", &self.handle)
            .field("valid", &self.is_valid())
            .field("source", &self.source())
            .field("playing", &self.is_playing())
            .field("looped", &self.is_looped())
            .field("volume", &self.volume())
            .field("frame_position", &self.frame_position())
            .finish()
    }
}
