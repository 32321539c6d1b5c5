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
// The real-time half of the voice engine.
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::audio::sample_provider::SampleProvider;
use crate::engine::command::{Command, Garbage, SourceTable};
use crate::engine::source::{SourceEntry, SourceInfo};
use crate::engine::voice::{VoiceHandle, VoicePool, VoiceSlot};

/// The mixer always renders interleaved stereo.
pub const OUTPUT_CHANNELS: usize = 2;

/// Renders the voices of an [`Engine`](crate::engine::Engine) into an output buffer.
///
/// The mixer owns every registered provider and is meant to live on the audio callback:
/// once constructed, [`Mixer::mix`] neither allocates nor blocks. A larger source table is
/// allocated by the engine and swapped in here.
pub struct Mixer {
    pool: Arc<VoicePool>,
    /// Providers indexed by source handle.
    sources: SourceTable,
    commands: Receiver<Command>,
    garbage: Sender<Garbage>,
    /// Float accumulator for one block of interleaved stereo.
    mix_buffer: Vec<f32>,
    /// Provider reads for the voice being rendered.
    work_buffer: Vec<i16>,
}

impl Mixer {
    pub(crate) fn new(
        pool: Arc<VoicePool>,
        commands: Receiver<Command>,
        garbage: Sender<Garbage>,
        block_size: usize,
        source_capacity: usize,
    ) -> Mixer {
        // Whole stereo frames only.
        let block_size = (block_size & !1).max(OUTPUT_CHANNELS);
        let frames = block_size / OUTPUT_CHANNELS;

        let mut sources = Vec::with_capacity(source_capacity);
        sources.resize_with(source_capacity, || None);

        Mixer {
            pool,
            sources,
            commands,
            garbage,
            mix_buffer: vec![0.0; block_size],
            // Enough for a block of stereo source frames.
            work_buffer: vec![0; frames * 2],
        }
    }

    /// Number of output samples rendered per block.
    pub fn block_size(&self) -> usize {
        self.mix_buffer.len()
    }

    /// Fills `output` with interleaved stereo. The buffer is processed in blocks of at most
    /// [`Mixer::block_size`] samples; pending registry changes are applied before each block.
    /// A trailing sample that doesn't make up a full frame is silenced.
    pub fn mix(&mut self, output: &mut [f32]) {
        let block_size = self.mix_buffer.len();
        for chunk in output.chunks_mut(block_size) {
            self.apply_commands();

            let samples = chunk.len() - chunk.len() % OUTPUT_CHANNELS;
            self.render(samples / OUTPUT_CHANNELS);
            chunk[..samples].copy_from_slice(&self.mix_buffer[..samples]);
            chunk[samples..].fill(0.0);
        }
    }

    /// Applies registry changes from the engine. Stops early while the engine hasn't collected
    /// the providers already handed back, so an unloaded provider is never dropped here.
    fn apply_commands(&mut self) {
        while !self.garbage.is_full() {
            let Ok(command) = self.commands.try_recv() else {
                break;
            };

            match command {
                Command::Grow(mut table) => {
                    if table.len() < self.sources.len() {
                        self.discard(Garbage::Table(table));
                        continue;
                    }
                    for (slot, entry) in table.iter_mut().zip(self.sources.iter_mut()) {
                        *slot = entry.take();
                    }
                    let previous = std::mem::replace(&mut self.sources, table);
                    self.discard(Garbage::Table(previous));
                }
                Command::Register(entry) => {
                    let Some(slot) = self.sources.get_mut(entry.info.handle().index()) else {
                        self.discard(Garbage::Source(entry));
                        continue;
                    };
                    if let Some(previous) = slot.replace(entry) {
                        self.discard(Garbage::Source(previous));
                    }
                }
                Command::Unload(handle) => {
                    if let Some(entry) = self
                        .sources
                        .get_mut(handle.index())
                        .and_then(Option::take)
                    {
                        self.discard(Garbage::Source(entry));
                    }
                }
            }
        }
    }

    fn discard(&self, garbage: Garbage) {
        // Only fails once the engine is gone, in which case the garbage is dropped here.
        let _ = self.garbage.try_send(garbage);
    }

    fn render(&mut self, frames: usize) {
        let mix = &mut self.mix_buffer[..frames * OUTPUT_CHANNELS];
        mix.fill(0.0);

        for (index, slot) in self.pool.slots() {
            let Some(generation) = slot.playing_generation() else {
                continue;
            };
            let source = slot.source();
            if !source.is_valid() {
                continue;
            }
            let Some(entry) = self.sources.get_mut(source.index()).and_then(Option::as_mut)
            else {
                continue;
            };
            let voice = VoiceHandle::new(index, generation);
            render_voice(voice, slot, entry, &mut self.work_buffer, mix, frames);
        }
    }

    /// Number of sources the mixer currently holds.
    pub fn source_count(&self) -> usize {
        self.sources.iter().filter(|entry| entry.is_some()).count()
    }
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("pool", &self.pool)
            .field("sources", &self.source_count())
            .field("block_size", &self.block_size())
            .finish()
    }
}

/// Adds `frames` frames of one voice into `mix`.
fn render_voice(
    voice: VoiceHandle,
    slot: &VoiceSlot,
    entry: &mut SourceEntry,
    work: &mut [i16],
    mix: &mut [f32],
    frames: usize,
) {
    let info = &*entry.info;
    let streaming = info.is_streaming();
    if streaming && !info.is_bound_to(voice) {
        return;
    }

    let channels = info.channels() as usize;
    let end_frame = info.end_frame();
    let region = info.loop_region();
    let looped = slot.is_looped();
    let end = if looped { region.end } else { end_frame };

    let mut frame = slot.take_pending_seek().unwrap_or_else(|| slot.cursor());
    if frame >= end {
        if !looped {
            slot.store_frame_position(frame);
            finish(voice, slot, info);
            return;
        }
        frame = region.start;
    }

    let provider = entry.provider.as_mut();
    let wanted = frames * channels;
    let first = wanted.min((end - frame) * channels);
    let mut read = read_at(provider, streaming, &mut work[..first], frame * channels);
    let mut position = frame + read / channels;

    // Splice the loop start onto the end of the read, wrapping as often as a short loop needs.
    if looped {
        let loop_samples = region.len() * channels;
        while read < wanted && loop_samples > 0 {
            let count = (wanted - read).min(loop_samples);
            let spliced = read_at(
                provider,
                streaming,
                &mut work[read..read + count],
                region.start * channels,
            );
            if spliced == 0 {
                break;
            }
            read += spliced;
            position = region.start + spliced / channels;
        }
    }

    let read_frames = read / channels;
    let volume = slot.volume();
    let out = &mut mix[..read_frames * OUTPUT_CHANNELS];
    let samples = &work[..read_frames * channels];
    if channels == 1 {
        for (frame_out, sample) in out.chunks_exact_mut(OUTPUT_CHANNELS).zip(samples) {
            let value = to_float(*sample) * volume;
            for channel in frame_out {
                *channel = (*channel + value).clamp(-1.0, 1.0);
            }
        }
    } else {
        for (channel, sample) in out.iter_mut().zip(samples) {
            *channel = (*channel + to_float(*sample) * volume).clamp(-1.0, 1.0);
        }
    }

    slot.store_frame_position(position);
    // A provider that comes up short has nothing more to give either.
    if !looped && (position >= end_frame || read < first) {
        finish(voice, slot, info);
    }
}

/// Reads from an absolute sample offset. Streaming providers are seeked when their cursor
/// isn't already there.
fn read_at(
    provider: &mut dyn SampleProvider,
    streaming: bool,
    dst: &mut [i16],
    offset: usize,
) -> usize {
    if streaming {
        if provider.sample_position() != offset {
            provider.seek(offset);
        }
        provider.next_samples(dst)
    } else {
        provider.read_samples(dst, offset)
    }
}

/// Stops a voice that ran out of samples, releasing it if it was fire-and-forget. Nothing
/// happens if the control thread freed the voice while it was being rendered.
fn finish(voice: VoiceHandle, slot: &VoiceSlot, info: &SourceInfo) {
    if !slot.deallocates_on_end() {
        slot.set_playing(voice.generation(), false);
    } else if slot.release(voice.generation()) {
        info.unbind(voice);
    }
}

#[inline]
fn to_float(sample: i16) -> f32 {
    sample as f32 / i16::MAX as f32
}
