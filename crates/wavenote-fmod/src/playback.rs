//! Thin wrapper over native channel operations.
//!
//! One native channel at a time; state validation lives in the engine
//! facade, not here. A stale channel (`FMOD_ERR_INVALID_HANDLE`) on pause,
//! stop, seek or a query is recovered by cleaning up the current playback;
//! the distinction between recoverable and hard failures is the caller's.

use std::sync::{Arc, Mutex};

use tracing::warn;

use wavenote_audio::PlaybackError;

use crate::error;
use crate::ffi::{self, FmodApi, SoundPtr, SystemPtr};
use crate::handle::{FmodAudioHandle, FmodPlaybackHandle, PLAY_TO_END};

#[derive(Default)]
struct PlaybackSlot {
    current: Option<FmodPlaybackHandle>,
}

/// Owns the current native channel exclusively.
pub(crate) struct PlaybackManager {
    api: Arc<FmodApi>,
    system: SystemPtr,
    slot: Mutex<PlaybackSlot>,
}

impl PlaybackManager {
    pub(crate) fn new(api: Arc<FmodApi>, system: SystemPtr) -> Self {
        Self {
            api,
            system,
            slot: Mutex::new(PlaybackSlot::default()),
        }
    }

    /// Starts full playback of `sound` from frame zero.
    pub(crate) fn play(
        &self,
        sound: SoundPtr,
        audio: &FmodAudioHandle,
    ) -> Result<FmodPlaybackHandle, PlaybackError> {
        let mut slot = self.slot.lock().expect("playback lock poisoned");
        self.start_channel(&mut slot, sound, audio, 0, PLAY_TO_END, false)
    }

    /// Starts playback of `[start_frame, end_frame)`.
    ///
    /// `needs_positioning` is false for sounds already cut to the range.
    pub(crate) fn play_range(
        &self,
        sound: SoundPtr,
        audio: &FmodAudioHandle,
        start_frame: u64,
        end_frame: u64,
        needs_positioning: bool,
    ) -> Result<FmodPlaybackHandle, PlaybackError> {
        let mut slot = self.slot.lock().expect("playback lock poisoned");
        self.start_channel(&mut slot, sound, audio, start_frame, end_frame, needs_positioning)
    }

    fn start_channel(
        &self,
        slot: &mut PlaybackSlot,
        sound: SoundPtr,
        audio: &FmodAudioHandle,
        start_frame: u64,
        end_frame: u64,
        needs_positioning: bool,
    ) -> Result<FmodPlaybackHandle, PlaybackError> {
        if slot.current.is_some() {
            self.cleanup(slot);
        }

        // Start paused so the channel can be positioned before any audio is
        // produced.
        let (code, channel) = self.api.system_play_sound(self.system, sound, true);
        if code != ffi::FMOD_OK {
            return Err(error::playback_error(code, "play sound"));
        }

        if needs_positioning && start_frame > 0 {
            let position = clamp_frame(start_frame);
            let code = self
                .api
                .channel_set_position(channel, position, ffi::FMOD_TIMEUNIT_PCM);
            if code != ffi::FMOD_OK {
                self.api.channel_stop(channel);
                return Err(error::playback_error(code, "set position"));
            }
        }

        let code = self.api.channel_set_paused(channel, false);
        if code != ffi::FMOD_OK {
            self.api.channel_stop(channel);
            return Err(error::playback_error(code, "start playback"));
        }

        let handle = FmodPlaybackHandle::new(audio.clone(), channel, start_frame, end_frame);
        slot.current = Some(handle.clone());
        Ok(handle)
    }

    /// Pauses the current channel. A stale channel is cleaned up and treated
    /// as success.
    pub(crate) fn pause(&self) -> Result<(), PlaybackError> {
        let mut slot = self.slot.lock().expect("playback lock poisoned");
        let Some(current) = slot.current.as_ref() else {
            return Err(PlaybackError::NoActivePlayback { action: "pause" });
        };
        let code = self.api.channel_set_paused(current.channel(), true);
        if code == ffi::FMOD_ERR_INVALID_HANDLE {
            self.cleanup(&mut slot);
            return Ok(());
        }
        if code != ffi::FMOD_OK {
            return Err(error::playback_error(code, "pause"));
        }
        Ok(())
    }

    /// Resumes the current channel. A stale channel is cleaned up and treated
    /// as success; the facade escalates it to a hard error.
    pub(crate) fn resume(&self) -> Result<(), PlaybackError> {
        let mut slot = self.slot.lock().expect("playback lock poisoned");
        let Some(current) = slot.current.as_ref() else {
            return Err(PlaybackError::NoActivePlayback { action: "resume" });
        };
        let code = self.api.channel_set_paused(current.channel(), false);
        if code == ffi::FMOD_ERR_INVALID_HANDLE {
            self.cleanup(&mut slot);
            return Ok(());
        }
        if code != ffi::FMOD_OK {
            return Err(error::playback_error(code, "resume"));
        }
        Ok(())
    }

    /// Stops and clears the current channel; no-op when none exists.
    pub(crate) fn stop(&self) -> Result<(), PlaybackError> {
        let mut slot = self.slot.lock().expect("playback lock poisoned");
        if slot.current.is_some() {
            self.cleanup(&mut slot);
        }
        Ok(())
    }

    /// Seeks the current channel to `frame` (PCM units).
    ///
    /// `FMOD_ERR_INVALID_POSITION` is tolerated: the native side clamps.
    pub(crate) fn seek(&self, frame: u64) -> Result<(), PlaybackError> {
        let mut slot = self.slot.lock().expect("playback lock poisoned");
        let Some(current) = slot.current.as_ref() else {
            return Err(PlaybackError::NoActivePlayback { action: "seek" });
        };
        let code =
            self.api
                .channel_set_position(current.channel(), clamp_frame(frame), ffi::FMOD_TIMEUNIT_PCM);
        if code == ffi::FMOD_ERR_INVALID_HANDLE {
            self.cleanup(&mut slot);
            return Ok(());
        }
        if code == ffi::FMOD_ERR_INVALID_POSITION {
            return Ok(());
        }
        if code != ffi::FMOD_OK {
            return Err(error::playback_error(code, "seek"));
        }
        Ok(())
    }

    /// Current decode position in frames; 0 when nothing is playing.
    pub(crate) fn position(&self) -> u64 {
        let mut slot = self.slot.lock().expect("playback lock poisoned");
        let Some(current) = slot.current.as_ref() else {
            return 0;
        };
        let (code, position) = self
            .api
            .channel_get_position(current.channel(), ffi::FMOD_TIMEUNIT_PCM);
        if code == ffi::FMOD_ERR_INVALID_HANDLE {
            self.cleanup(&mut slot);
            return 0;
        }
        if code != ffi::FMOD_OK {
            warn!(code = %error::describe(code), "failed to get position");
            return 0;
        }
        u64::from(position)
    }

    /// True when playback just finished and was cleaned up.
    #[allow(dead_code)]
    pub(crate) fn check_playback_finished(&self) -> bool {
        let mut slot = self.slot.lock().expect("playback lock poisoned");
        let Some(current) = slot.current.as_ref() else {
            return false;
        };
        let (code, is_playing) = self.api.channel_is_playing(current.channel());
        if code == ffi::FMOD_ERR_INVALID_HANDLE || (code == ffi::FMOD_OK && !is_playing) {
            self.cleanup(&mut slot);
            return true;
        }
        false
    }

    pub(crate) fn has_active_playback(&self) -> bool {
        self.slot
            .lock()
            .expect("playback lock poisoned")
            .current
            .is_some()
    }

    #[allow(dead_code)]
    pub(crate) fn current_playback(&self) -> Option<FmodPlaybackHandle> {
        self.slot
            .lock()
            .expect("playback lock poisoned")
            .current
            .clone()
    }

    /// Stops the channel, deactivates the handle and clears the slot.
    fn cleanup(&self, slot: &mut PlaybackSlot) {
        if let Some(current) = slot.current.take() {
            let code = self.api.channel_stop(current.channel());
            if code != ffi::FMOD_OK && code != ffi::FMOD_ERR_INVALID_HANDLE {
                warn!(
                    code = %error::describe(code),
                    "failed to stop channel during cleanup",
                );
            }
            current.mark_inactive();
        }
    }
}

fn clamp_frame(frame: u64) -> u32 {
    frame.min(u64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::{clamp_frame, PlaybackManager};
    use crate::config::AudioConfig;
    use crate::ffi;
    use crate::handle::HandleLifecycleManager;
    use crate::loader::FmodLibraryLoader;
    use crate::system::SystemManager;
    use std::ffi::CString;
    use std::io::Write as _;
    use std::sync::Arc;
    use wavenote_audio::{PlaybackError, PlaybackHandle};

    #[test]
    fn frames_clamp_to_the_native_position_width() {
        assert_eq!(clamp_frame(0), 0);
        assert_eq!(clamp_frame(48_000), 48_000);
        assert_eq!(clamp_frame(u64::from(u32::MAX) + 7), u32::MAX);
    }

    fn write_tone_wav(path: &std::path::Path, frames: u32) {
        let data_len = frames * 2;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&48_000u32.to_le_bytes());
        bytes.extend_from_slice(&96_000u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for index in 0..frames {
            let phase = f64::from(index) * 440.0 * std::f64::consts::TAU / 48_000.0;
            bytes.extend_from_slice(&((phase.sin() * 16_384.0) as i16).to_le_bytes());
        }
        let mut file = std::fs::File::create(path).expect("failed to create wav fixture");
        file.write_all(&bytes).expect("failed to write wav fixture");
    }

    #[test]
    #[ignore = "requires the FMOD native library and audio hardware"]
    fn channel_primitives_against_the_native_library() {
        let config = AudioConfig::from_env();
        let system_manager = SystemManager::new(FmodLibraryLoader::new(&config));
        system_manager.initialize().expect("system init failed");
        let api = system_manager.api().expect("api missing after init");
        let system = system_manager.system().expect("system missing after init");

        let path = std::env::temp_dir().join(format!(
            "wavenote-playback-{}.wav",
            std::process::id(),
        ));
        write_tone_wav(&path, 240_000);
        let c_path = CString::new(path.to_str().expect("fixture path not UTF-8"))
            .expect("fixture path contains NUL");
        let (code, sound) = api.system_create_sound(
            system,
            &c_path,
            ffi::FMOD_DEFAULT | ffi::FMOD_ACCURATETIME,
        );
        assert_eq!(code, ffi::FMOD_OK);

        let lifecycle = HandleLifecycleManager::new();
        let audio = lifecycle.create_handle(sound, path.clone());
        let manager = PlaybackManager::new(Arc::clone(&api), system);

        // No channel yet.
        assert!(!manager.has_active_playback());
        assert!(matches!(
            manager.pause(),
            Err(PlaybackError::NoActivePlayback { action: "pause" }),
        ));
        assert!(!manager.check_playback_finished());

        let playback = manager.play(sound, &audio).expect("play failed");
        assert!(manager.has_active_playback());
        assert!(playback.is_active());
        assert!(manager
            .current_playback()
            .is_some_and(|current| current.same_as(&playback)));

        manager.pause().expect("pause failed");
        manager.resume().expect("resume failed");
        manager.seek(48_000).expect("seek failed");
        assert!(manager.position() > 0);

        // Racing plays leave exactly one current handle.
        let second = manager.play(sound, &audio).expect("second play failed");
        assert!(!playback.is_active());
        assert!(second.is_active());

        manager.stop().expect("stop failed");
        assert!(!second.is_active());
        assert!(!manager.has_active_playback());
        // Stopping again is a no-op.
        manager.stop().expect("repeated stop failed");

        api.sound_release(sound);
        system_manager.shutdown();
        let _ = std::fs::remove_file(&path);
    }
}
