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
//! The control half of the voice engine.
//!
//! [`Engine::new`] returns the engine together with its [`Mixer`]. The engine stays on the
//! control thread and owns the source registry and the voice API; the mixer goes to the audio
//! callback. Voices are shared through a pool of atomics, while providers are handed to the
//! mixer over a bounded queue and come back the same way when they are unloaded.
use std::path::Path;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, error, info, warn};

use crate::audio::mixer::Mixer;
use crate::audio::sample_provider::{
    create_memory_provider, create_streaming_provider, read_encoded_file, SampleProvider,
};
use crate::config;
use crate::util::file_label;

use self::command::{Channels, Command, Garbage};
use self::source::{SourceEntry, SourceSlot};
use self::voice::{VoicePool, VoiceStart};

pub(crate) mod command;
pub mod error;
pub mod source;
pub mod voice;

#[cfg(test)]
mod tests;

pub use error::EngineError;
pub use source::{LoopRegion, SourceHandle, SourceInfo};
pub use voice::{Voice, VoiceHandle};

/// The control half of the voice engine.
pub struct Engine {
    /// The voice slots, shared with the mixer.
    pool: Arc<VoicePool>,
    /// Mirror of the mixer's source table.
    sources: Vec<SourceSlot>,
    /// Length of the mixer's source table once every queued command is applied.
    table_capacity: usize,
    commands: Sender<Command>,
    garbage: Receiver<Garbage>,
    /// The rate sources are expected to be at.
    sample_rate: u32,
}

impl Engine {
    /// Creates an engine and the mixer that renders its voices.
    pub fn new(config: &config::Engine) -> (Engine, Mixer) {
        let pool = Arc::new(VoicePool::new(config.max_voices()));
        let Channels { commands, garbage } = Channels::bounded(config.command_queue_size());

        let engine = Engine {
            pool: pool.clone(),
            sources: Vec::with_capacity(config.source_capacity()),
            table_capacity: config.source_capacity(),
            commands: commands.0,
            garbage: garbage.1,
            sample_rate: config.sample_rate(),
        };
        let mixer = Mixer::new(
            pool,
            commands.1,
            garbage.0,
            config.block_size(),
            config.source_capacity(),
        );

        info!(
            max_voices = config.max_voices(),
            block_size = config.block_size(),
            sample_rate = config.sample_rate(),
            "Voice engine created"
        );
        (engine, mixer)
    }

    /// Registers a provider, returning [`SourceHandle::INVALID`] if it can't be used.
    pub fn register_source<P: SampleProvider + 'static>(&mut self, provider: P) -> SourceHandle {
        match self.try_register_source(provider) {
            Ok(handle) => handle,
            Err(e) => {
                error!(err = %e, "Unable to register audio source");
                SourceHandle::INVALID
            }
        }
    }

    /// Registers a provider and hands it to the mixer.
    pub fn try_register_source<P: SampleProvider + 'static>(
        &mut self,
        provider: P,
    ) -> Result<SourceHandle, EngineError> {
        self.collect_garbage();

        let index = self
            .sources
            .iter()
            .position(|slot| matches!(slot, SourceSlot::Free))
            .unwrap_or(self.sources.len());
        let handle = SourceHandle::from_index(index);

        let info = Arc::new(
            SourceInfo::describe(handle, &provider).map_err(EngineError::InvalidProvider)?,
        );
        if index >= self.table_capacity {
            self.grow_table(index)?;
        }
        if info.sample_rate() != self.sample_rate {
            warn!(
                source = %handle,
                source_rate = info.sample_rate(),
                engine_rate = self.sample_rate,
                "Sample rate mismatch, the source will play at the wrong speed"
            );
        }

        let entry = SourceEntry {
            provider: Box::new(provider),
            info: info.clone(),
        };
        match self.commands.try_send(Command::Register(entry)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => return Err(EngineError::QueueFull),
            Err(TrySendError::Disconnected(_)) => {
                debug!(source = %handle, "Mixer is gone, the source will never play");
            }
        }

        if index == self.sources.len() {
            self.sources.push(SourceSlot::Registered(info.clone()));
        } else {
            self.sources[index] = SourceSlot::Registered(info.clone());
        }

        info!(
            source = %handle,
            streaming = info.is_streaming(),
            channels = info.channels(),
            samples = info.sample_amount(),
            loop_start = info.loop_region().start,
            loop_end = info.loop_region().end,
            "Audio source has been registered"
        );
        Ok(handle)
    }

    /// Sends the mixer a table big enough for `index`. The mixer moves its providers over and
    /// hands the old table back, so the callback never allocates.
    fn grow_table(&mut self, index: usize) -> Result<(), EngineError> {
        let capacity = (self.table_capacity * 2).max(index + 1);
        let mut table = Vec::with_capacity(capacity);
        table.resize_with(capacity, || None);
        match self.commands.try_send(Command::Grow(table)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => return Err(EngineError::QueueFull),
            Err(TrySendError::Disconnected(_)) => {}
        }
        debug!(
            from = self.table_capacity,
            to = capacity,
            "Growing the mixer source table"
        );
        self.table_capacity = capacity;
        Ok(())
    }

    /// Decodes encoded audio fully into memory and registers it.
    pub fn load_source(&mut self, data: &[u8]) -> SourceHandle {
        self.try_load_source(data, None)
            .unwrap_or_else(|e| self.log_load_error(e))
    }

    pub fn try_load_source(
        &mut self,
        data: &[u8],
        extension: Option<&str>,
    ) -> Result<SourceHandle, EngineError> {
        let provider = create_memory_provider(data, extension)?;
        debug!(bytes = provider.memory_size(), "Decoded audio into memory");
        self.try_register_source(provider)
    }

    /// Registers encoded audio that is decoded while it plays.
    pub fn load_streaming_source(&mut self, data: &[u8]) -> SourceHandle {
        self.try_load_streaming_source(data, None)
            .unwrap_or_else(|e| self.log_load_error(e))
    }

    pub fn try_load_streaming_source(
        &mut self,
        data: &[u8],
        extension: Option<&str>,
    ) -> Result<SourceHandle, EngineError> {
        let provider = create_streaming_provider(data, extension)?;
        self.try_register_source(provider)
    }

    /// Reads a file and loads it with [`Engine::load_source`].
    pub fn load_source_from_path<P: AsRef<Path>>(&mut self, path: P) -> SourceHandle {
        let path = path.as_ref();
        let result = read_encoded_file(path)
            .map_err(EngineError::from)
            .and_then(|(data, extension)| self.try_load_source(&data, extension.as_deref()));
        self.log_path_load(path, result)
    }

    /// Reads a file and loads it with [`Engine::load_streaming_source`].
    pub fn load_streaming_source_from_path<P: AsRef<Path>>(&mut self, path: P) -> SourceHandle {
        let path = path.as_ref();
        let result = read_encoded_file(path).map_err(EngineError::from).and_then(
            |(data, extension)| self.try_load_streaming_source(&data, extension.as_deref()),
        );
        self.log_path_load(path, result)
    }

    fn log_load_error(&self, e: EngineError) -> SourceHandle {
        error!(err = %e, "Unable to load audio source");
        SourceHandle::INVALID
    }

    fn log_path_load(
        &self,
        path: &Path,
        result: Result<SourceHandle, EngineError>,
    ) -> SourceHandle {
        match result {
            Ok(handle) => {
                info!(file = file_label(path), source = %handle, "Loaded audio file");
                handle
            }
            Err(e) => {
                error!(file = file_label(path), err = %e, "Unable to load audio file");
                SourceHandle::INVALID
            }
        }
    }

    /// Unloads a source. Voices playing it lose their source but keep their other state. The
    /// handle isn't reused until the mixer has handed the provider back.
    pub fn unload_source(&mut self, handle: SourceHandle) {
        if let Err(e) = self.try_unload_source(handle) {
            warn!(source = %handle, err = %e, "Unable to unload audio source");
        }
    }

    pub fn try_unload_source(&mut self, handle: SourceHandle) -> Result<(), EngineError> {
        self.collect_garbage();
        if self.source(handle).is_none() {
            return Err(EngineError::InvalidSource(handle));
        }

        let slot = match self.commands.try_send(Command::Unload(handle)) {
            Ok(()) => SourceSlot::Unloading,
            Err(TrySendError::Full(_)) => return Err(EngineError::QueueFull),
            Err(TrySendError::Disconnected(_)) => {
                // Without a mixer there's nothing left to hand the provider back.
                debug!(source = %handle, "Mixer is gone, unloading locally");
                SourceSlot::Free
            }
        };

        self.sources[handle.index()] = slot;
        for (_, slot) in self.pool.slots() {
            slot.detach_source(handle);
        }
        info!(source = %handle, "Audio source has been unloaded");
        Ok(())
    }

    /// Drops what the mixer has handed back and frees the indexes of unloaded sources.
    /// Returns how many items were dropped.
    pub fn collect_garbage(&mut self) -> usize {
        let mut collected = 0;
        for garbage in self.garbage.try_iter() {
            if let Garbage::Source(entry) = &garbage {
                let index = entry.info.handle().index();
                if let Some(slot) = self.sources.get_mut(index) {
                    if matches!(slot, SourceSlot::Unloading) {
                        *slot = SourceSlot::Free;
                    }
                }
            }
            collected += 1;
        }
        collected
    }

    /// The metadata of a registered source.
    pub fn source(&self, handle: SourceHandle) -> Option<&SourceInfo> {
        if !handle.is_valid() {
            return None;
        }
        self.sources
            .get(handle.index())
            .and_then(SourceSlot::info)
            .map(|info| &**info)
    }

    /// Number of registered sources.
    pub fn source_count(&self) -> usize {
        self.sources
            .iter()
            .filter(|slot| slot.info().is_some())
            .count()
    }

    /// Allocates a stopped voice at the start of `source`.
    pub fn allocate_voice(&mut self, source: SourceHandle) -> VoiceHandle {
        match self.try_allocate_voice(source) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(source = %source, err = %e, "Unable to allocate voice");
                VoiceHandle::INVALID
            }
        }
    }

    pub fn try_allocate_voice(&mut self, source: SourceHandle) -> Result<VoiceHandle, EngineError> {
        self.claim_voice(VoiceStart {
            source,
            volume: 1.0,
            playing: false,
            deallocate_on_end: false,
        })
    }

    /// Releases a voice. Invalid or stale handles are ignored.
    pub fn free_voice(&mut self, handle: VoiceHandle) {
        let Some(slot) = self.pool.live_slot(handle) else {
            return;
        };
        let source = slot.source();
        if !slot.release(handle.generation()) {
            return;
        }
        if let Some(info) = self.shared_source(source) {
            info.unbind(handle);
        }
        debug!(voice = %handle, "Voice freed");
    }

    /// Plays a source once on a voice that releases itself when the source ends. When no voice
    /// is free the sound is dropped and [`VoiceHandle::INVALID`] is returned.
    pub fn play_sound(&mut self, source: SourceHandle, volume: f32) -> VoiceHandle {
        match self.claim_voice(VoiceStart {
            source,
            volume,
            playing: true,
            deallocate_on_end: true,
        }) {
            Ok(handle) => handle,
            Err(e) => {
                debug!(source = %source, err = %e, "Dropping sound");
                VoiceHandle::INVALID
            }
        }
    }

    fn claim_voice(&mut self, start: VoiceStart) -> Result<VoiceHandle, EngineError> {
        let info = self
            .shared_source(start.source)
            .ok_or(EngineError::InvalidSource(start.source))?;
        let handle = self
            .pool
            .claim(start)
            .ok_or(EngineError::PoolExhausted(self.pool.capacity()))?;
        info.bind(handle, &self.pool);

        debug!(voice = %handle, source = %start.source, playing = start.playing, "Voice allocated");
        Ok(handle)
    }

    fn shared_source(&self, handle: SourceHandle) -> Option<&Arc<SourceInfo>> {
        if !handle.is_valid() {
            return None;
        }
        self.sources.get(handle.index()).and_then(SourceSlot::info)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &VoicePool {
        &self.pool
    }

    /// Playback controls for a voice.
    pub fn voice(&self, handle: VoiceHandle) -> Voice<'_> {
        Voice::new(handle, &self.pool, &self.sources)
    }

    /// Number of voices currently allocated.
    pub fn active_voice_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Size of the voice pool.
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// The rate sources are expected to be at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("pool", &self.pool)
            .field("sources", &self.source_count())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
