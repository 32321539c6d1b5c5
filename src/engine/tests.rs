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
use crate::audio::sample_provider::{LoopPoints, MemoryProvider};
use crate::audio::Mixer;
use crate::config;
use crate::engine::{Engine, EngineError, LoopRegion, SourceHandle, VoiceHandle};
use crate::testutil::{ramp, wav_bytes, write_wav};

fn create_engine(max_voices: usize) -> (Engine, Mixer) {
    Engine::new(&config::Engine::default().with_max_voices(max_voices))
}

fn mono(frames: usize) -> MemoryProvider {
    MemoryProvider::new(ramp(frames, 1), 1, 44100)
}

#[test]
fn test_register_source() {
    let (mut engine, _mixer) = create_engine(4);
    let first = engine.register_source(mono(100));
    let second = engine.register_source(MemoryProvider::new(ramp(100, 2), 2, 44100));
    assert_eq!(first, SourceHandle::from_index(0));
    assert_eq!(second, SourceHandle::from_index(1));
    assert_eq!(engine.source_count(), 2);

    let info = engine.source(second).unwrap();
    assert_eq!(info.channels(), 2);
    assert_eq!(info.sample_amount(), 200);
    assert_eq!(info.end_frame(), 100);
    assert!(!info.is_streaming());
}

#[test]
fn test_register_unsupported_channels() {
    let (mut engine, _mixer) = create_engine(4);
    let surround = MemoryProvider::new(ramp(10, 6), 6, 44100);
    assert_eq!(engine.register_source(surround), SourceHandle::INVALID);

    let surround = MemoryProvider::new(ramp(10, 6), 6, 44100);
    assert!(matches!(
        engine.try_register_source(surround),
        Err(EngineError::InvalidProvider(_))
    ));
    assert_eq!(engine.source_count(), 0);
}

#[test]
fn test_register_resolves_loop_points() {
    let (mut engine, _mixer) = create_engine(4);
    let authored =
        engine.register_source(mono(2000).with_loop_points(LoopPoints::new(100, 1000)));
    let overlong =
        engine.register_source(mono(2000).with_loop_points(LoopPoints::new(100, 5000)));
    let absent = engine.register_source(mono(2000));

    let region = |handle| engine.source(handle).unwrap().loop_region();
    assert_eq!(region(authored), LoopRegion { start: 100, end: 1000 });
    assert_eq!(region(overlong), LoopRegion { start: 100, end: 2000 });
    assert_eq!(region(absent), LoopRegion { start: 0, end: 2000 });
}

#[test]
fn test_unload_reuses_slot_once_returned() {
    let (mut engine, mut mixer) = create_engine(4);
    let first = engine.register_source(mono(10));
    let second = engine.register_source(mono(10));

    engine.unload_source(first);
    assert!(engine.source(first).is_none());
    assert!(engine.source(second).is_some());
    assert!(matches!(
        engine.try_unload_source(first),
        Err(EngineError::InvalidSource(_))
    ));

    // The mixer still holds the old provider, so its index stays taken.
    let third = engine.register_source(mono(20));
    assert_eq!(third, SourceHandle::from_index(2));
    assert_eq!(engine.source_count(), 2);

    let mut output = [0.0; 4];
    mixer.mix(&mut output);
    assert_eq!(mixer.source_count(), 2);

    let fourth = engine.register_source(mono(30));
    assert_eq!(fourth, first);
    assert_eq!(engine.source(fourth).unwrap().sample_amount(), 30);

    mixer.mix(&mut output);
    assert_eq!(mixer.source_count(), 3);
    assert_eq!(engine.collect_garbage(), 0);
}

#[test]
fn test_source_table_growth_needs_queue_room() {
    let (mut engine, mut mixer) = Engine::new(
        &config::Engine::default()
            .with_source_capacity(1)
            .with_command_queue_size(2),
    );
    assert!(engine.register_source(mono(10)).is_valid());
    // The table grows, but the registration itself doesn't fit.
    assert!(matches!(
        engine.try_register_source(mono(10)),
        Err(EngineError::QueueFull)
    ));

    let mut output = [0.0; 2];
    mixer.mix(&mut output);
    assert_eq!(engine.collect_garbage(), 1);
    assert_eq!(engine.register_source(mono(10)), SourceHandle::from_index(1));
    mixer.mix(&mut output);
    assert_eq!(mixer.source_count(), 2);
}

#[test]
fn test_unload_invalid_source() {
    let (mut engine, _mixer) = create_engine(4);
    assert!(matches!(
        engine.try_unload_source(SourceHandle::INVALID),
        Err(EngineError::InvalidSource(_))
    ));
    assert!(matches!(
        engine.try_unload_source(SourceHandle::from_index(7)),
        Err(EngineError::InvalidSource(_))
    ));
    // Logged and ignored.
    engine.unload_source(SourceHandle::INVALID);
}

#[test]
fn test_command_queue_full() {
    let (mut engine, mut mixer) =
        Engine::new(&config::Engine::default().with_command_queue_size(1));
    assert!(engine.register_source(mono(10)).is_valid());
    assert!(matches!(
        engine.try_register_source(mono(10)),
        Err(EngineError::QueueFull)
    ));
    assert_eq!(engine.register_source(mono(10)), SourceHandle::INVALID);
    assert_eq!(engine.source_count(), 1);

    let mut output = [0.0; 2];
    mixer.mix(&mut output);
    assert!(engine.register_source(mono(10)).is_valid());
}

#[test]
fn test_registration_without_mixer() {
    let (mut engine, mixer) = create_engine(4);
    drop(mixer);
    let source = engine.register_source(mono(10));
    assert!(source.is_valid());

    engine.unload_source(source);
    assert_eq!(engine.source_count(), 0);
    assert_eq!(engine.register_source(mono(10)), source);
}

#[test]
fn test_load_source() {
    let (mut engine, _mixer) = create_engine(4);
    let handle = engine.load_source(&wav_bytes(&ramp(500, 2), 2, 44100));
    assert!(handle.is_valid());

    let info = engine.source(handle).unwrap();
    assert!(!info.is_streaming());
    assert_eq!(info.channels(), 2);
    assert_eq!(info.end_frame(), 500);
}

#[test]
fn test_load_source_failures() {
    let (mut engine, _mixer) = create_engine(4);
    assert_eq!(engine.load_source(&[]), SourceHandle::INVALID);
    assert_eq!(engine.load_source(b"definitely not audio"), SourceHandle::INVALID);
    assert_eq!(engine.load_streaming_source(&[]), SourceHandle::INVALID);
    assert!(matches!(
        engine.try_load_source(&[], None),
        Err(EngineError::Provider(_))
    ));
}

#[test]
fn test_load_streaming_source() {
    let (mut engine, _mixer) = create_engine(4);
    let handle = engine.load_streaming_source(&wav_bytes(&ramp(500, 1), 1, 22050));
    let info = engine.source(handle).unwrap();
    assert!(info.is_streaming());
    assert_eq!(info.sample_rate(), 22050);
    assert_eq!(info.bound_voice(), None);
}

#[test]
fn test_load_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loop.wav");
    write_wav(&path, &ramp(300, 1), 1, 44100).unwrap();

    let (mut engine, _mixer) = create_engine(4);
    let buffered = engine.load_source_from_path(&path);
    let streaming = engine.load_streaming_source_from_path(&path);
    assert!(!engine.source(buffered).unwrap().is_streaming());
    assert!(engine.source(streaming).unwrap().is_streaming());

    let missing = engine.load_source_from_path(dir.path().join("missing.wav"));
    assert_eq!(missing, SourceHandle::INVALID);
    let missing = engine.load_streaming_source_from_path(dir.path().join("missing.wav"));
    assert_eq!(missing, SourceHandle::INVALID);
}

#[test]
fn test_allocate_voice_defaults() {
    let (mut engine, _mixer) = create_engine(4);
    let source = engine.register_source(mono(10));
    let handle = engine.allocate_voice(source);

    let voice = engine.voice(handle);
    assert!(voice.is_valid());
    assert!(!voice.is_playing());
    assert!(!voice.is_looped());
    assert_eq!(voice.volume(), 1.0);
    assert_eq!(voice.source(), source);
    assert_eq!(voice.frame_position(), 0);
    assert_eq!(engine.active_voice_count(), 1);
}

#[test]
fn test_allocate_invalid_source() {
    let (mut engine, _mixer) = create_engine(4);
    assert_eq!(
        engine.allocate_voice(SourceHandle::INVALID),
        VoiceHandle::INVALID
    );
    assert!(matches!(
        engine.try_allocate_voice(SourceHandle::from_index(3)),
        Err(EngineError::InvalidSource(_))
    ));
    assert_eq!(engine.active_voice_count(), 0);
}

#[test]
fn test_pool_exhaustion() {
    let (mut engine, _mixer) = create_engine(2);
    let source = engine.register_source(mono(10));
    let first = engine.allocate_voice(source);
    let second = engine.allocate_voice(source);
    engine.voice(first).set_volume(0.5);
    engine.voice(second).set_frame_position(4);

    assert_eq!(engine.allocate_voice(source), VoiceHandle::INVALID);
    assert!(matches!(
        engine.try_allocate_voice(source),
        Err(EngineError::PoolExhausted(2))
    ));
    assert_eq!(engine.play_sound(source, 1.0), VoiceHandle::INVALID);

    assert_eq!(engine.capacity(), 2);
    assert_eq!(engine.active_voice_count(), 2);
    assert_eq!(engine.voice(first).volume(), 0.5);
    assert_eq!(engine.voice(second).frame_position(), 4);
    assert!(!engine.voice(first).is_playing());
}

#[test]
fn test_free_voice() {
    let (mut engine, _mixer) = create_engine(2);
    let source = engine.register_source(mono(10));
    let handle = engine.allocate_voice(source);
    engine.voice(handle).set_loop_state(true);
    engine.voice(handle).set_playing(true);

    engine.free_voice(handle);
    let voice = engine.voice(handle);
    assert!(!voice.is_valid());
    assert!(!voice.is_playing());
    assert!(!voice.is_looped());
    assert_eq!(voice.source(), SourceHandle::INVALID);
    assert_eq!(voice.volume(), 0.0);

    // Freeing twice or freeing nothing is harmless.
    engine.free_voice(handle);
    engine.free_voice(VoiceHandle::INVALID);
    assert_eq!(engine.active_voice_count(), 0);

    // The slot comes back clean, under a new handle.
    let reused = engine.allocate_voice(source);
    assert_eq!(reused.index(), handle.index());
    assert_ne!(reused, handle);
    assert!(!engine.voice(handle).is_valid());
    assert!(!engine.voice(reused).is_looped());
    assert_eq!(engine.voice(reused).frame_position(), 0);
}

#[test]
fn test_free_stale_handle() {
    let (mut engine, _mixer) = create_engine(1);
    let source = engine.register_source(mono(10));
    let stale = engine.allocate_voice(source);
    engine.free_voice(stale);
    let fresh = engine.play_sound(source, 0.5);

    engine.free_voice(stale);
    engine.voice(stale).set_playing(false);
    assert!(engine.voice(fresh).is_valid());
    assert!(engine.voice(fresh).is_playing());
    assert_eq!(engine.active_voice_count(), 1);
}

#[test]
fn test_play_sound() {
    let (mut engine, _mixer) = create_engine(2);
    let source = engine.register_source(mono(10));
    let handle = engine.play_sound(source, 0.3);

    let voice = engine.voice(handle);
    assert!(voice.is_playing());
    assert_eq!(voice.volume(), 0.3);
    assert_eq!(voice.frame_position(), 0);
    assert_eq!(engine.play_sound(SourceHandle::INVALID, 1.0), VoiceHandle::INVALID);
}

#[test]
fn test_invalid_voice_facade() {
    let (engine, _mixer) = create_engine(2);
    let voice = engine.voice(VoiceHandle::INVALID);
    voice.set_playing(true);
    voice.set_loop_state(true);
    voice.set_volume(0.5);
    voice.set_frame_position(10);
    voice.set_source(SourceHandle::from_index(0));

    assert!(!voice.is_valid());
    assert!(!voice.is_playing());
    assert!(!voice.is_looped());
    assert_eq!(voice.volume(), 0.0);
    assert_eq!(voice.source(), SourceHandle::INVALID);
    assert_eq!(voice.frame_position(), 0);

    let out_of_range = engine.voice(VoiceHandle::new(99, 1));
    assert!(!out_of_range.is_valid());
}

#[test]
fn test_set_source_moves_streaming_binding() {
    let (mut engine, _mixer) = create_engine(4);
    let stream = engine.load_streaming_source(&wav_bytes(&ramp(100, 1), 1, 44100));
    let buffered = engine.register_source(mono(100));

    let first = engine.allocate_voice(stream);
    engine.voice(first).set_playing(true);
    engine.voice(first).set_frame_position(30);
    let second = engine.allocate_voice(buffered);
    assert_eq!(engine.source(stream).unwrap().bound_voice(), Some(first));

    engine.voice(second).set_source(stream);
    assert_eq!(engine.source(stream).unwrap().bound_voice(), Some(second));
    assert!(!engine.voice(first).is_playing());
    assert_eq!(engine.voice(first).frame_position(), 0);
    assert_eq!(engine.voice(first).source(), stream);

    // Moving off the stream drops the binding.
    engine.voice(second).set_source(buffered);
    assert_eq!(engine.source(stream).unwrap().bound_voice(), None);
}

#[test]
fn test_set_source_unregistered() {
    let (mut engine, _mixer) = create_engine(4);
    let source = engine.register_source(mono(10));
    let handle = engine.allocate_voice(source);

    engine.voice(handle).set_source(SourceHandle::from_index(5));
    assert_eq!(engine.voice(handle).source(), SourceHandle::INVALID);
}

#[test]
fn test_free_voice_releases_streaming_binding() {
    let (mut engine, _mixer) = create_engine(4);
    let stream = engine.load_streaming_source(&wav_bytes(&ramp(100, 1), 1, 44100));
    let handle = engine.allocate_voice(stream);
    engine.free_voice(handle);
    assert_eq!(engine.source(stream).unwrap().bound_voice(), None);
}

#[test]
fn test_buffered_source_shared_by_voices() {
    let (mut engine, _mixer) = create_engine(4);
    let source = engine.register_source(mono(100));
    let first = engine.allocate_voice(source);
    let second = engine.allocate_voice(source);
    engine.voice(first).set_playing(true);
    engine.voice(second).set_playing(true);

    assert!(engine.voice(first).is_playing());
    assert!(engine.voice(second).is_playing());
    assert_eq!(engine.source(source).unwrap().bound_voice(), None);
}
