//! The audio engine facade.
//!
//! Every public entry point except [`AudioEngine::close`] requires the
//! engine to be in the `Initialized` lifecycle state. Mutating operations
//! (load/play/pause/resume/stop/seek) serialize on one operation lock;
//! queries only take it for the brief native call they make.
//!
//! Event ordering per playback: one `Stopped → Playing` at the start, then
//! progress events with non-decreasing positions interleaved with pause/
//! resume and seek pairs, terminated by exactly one `Stopped` or `Finished`.
//! Completion is emitted only from the monitor thread; getter-side reaping
//! never fires callbacks.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use wavenote_audio::{
    AudioHandle, AudioMetadata, EngineError, EngineState, LoadError, PlaybackError,
    PlaybackHandle, PlaybackListener, PlaybackState,
};

use crate::config::AudioConfig;
use crate::engine_state::EngineStateMachine;
use crate::error;
use crate::ffi::{self, FmodApi, SoundPtr};
use crate::handle::{FmodAudioHandle, FmodPlaybackHandle, HandleLifecycleManager};
use crate::listeners::ListenerManager;
use crate::loader::FmodLibraryLoader;
use crate::loading::AudioLoadingManager;
use crate::playback::PlaybackManager;
use crate::playback_state::PlaybackStateMachine;
use crate::system::SystemManager;

#[derive(Default)]
struct EngineRuntime {
    current_playback: Option<FmodPlaybackHandle>,
    // Non-owning view of the loading manager's current sound, kept for the
    // monitor's latency math; refreshed on every load, cleared on close.
    current_sound: Option<SoundPtr>,
}

/// FMOD-backed audio engine.
///
/// Construction initializes the native system; [`AudioEngine::close`] (or
/// drop) releases it. One audio file and at most one playback are current at
/// any time.
pub struct AudioEngine {
    api: Arc<FmodApi>,
    state_machine: Arc<EngineStateMachine>,
    system_manager: Arc<SystemManager>,
    lifecycle: Arc<HandleLifecycleManager>,
    loading: AudioLoadingManager,
    playback: PlaybackManager,
    playback_state: PlaybackStateMachine,
    listeners: ListenerManager,
    runtime: Mutex<EngineRuntime>,
}

impl AudioEngine {
    /// Builds and initializes an engine from `config`.
    ///
    /// On failure the native system is shut down and the lifecycle ends in
    /// `Closed`; the error is propagated unchanged.
    pub fn new(config: &AudioConfig) -> Result<Self, EngineError> {
        let state_machine = Arc::new(EngineStateMachine::new());
        let system_manager = Arc::new(SystemManager::new(FmodLibraryLoader::new(config)));

        if !state_machine.compare_and_set(EngineState::Uninitialized, EngineState::Initializing) {
            return Err(EngineError::InitFromState {
                state: state_machine.state(),
            });
        }

        let outcome = (|| {
            if !system_manager.is_initialized() {
                system_manager.initialize()?;
            }
            let (Some(api), Some(system)) = (system_manager.api(), system_manager.system()) else {
                return Err(EngineError::ClosedDuringInit);
            };
            if !state_machine.compare_and_set(EngineState::Initializing, EngineState::Initialized)
            {
                return Err(EngineError::ClosedDuringInit);
            }
            Ok((api, system))
        })();

        let (api, system) = match outcome {
            Ok(pair) => pair,
            Err(err) => {
                system_manager.shutdown();
                state_machine.compare_and_set(EngineState::Initializing, EngineState::Closed);
                return Err(err);
            }
        };

        let lifecycle = Arc::new(HandleLifecycleManager::new());
        let loading = AudioLoadingManager::new(
            Arc::clone(&api),
            system,
            Arc::clone(&state_machine),
            Arc::clone(&lifecycle),
        );
        let playback = PlaybackManager::new(Arc::clone(&api), system);
        let listeners = ListenerManager::new(
            Arc::clone(&api),
            Arc::clone(&system_manager),
            config.progress_interval(),
        );

        debug!(version = %system_manager.version_info(), "audio engine ready");

        Ok(Self {
            api,
            state_machine,
            system_manager,
            lifecycle,
            loading,
            playback,
            playback_state: PlaybackStateMachine::new(),
            listeners,
            runtime: Mutex::new(EngineRuntime::default()),
        })
    }

    fn check_operational(&self) -> Result<(), EngineError> {
        self.state_machine.check_state(EngineState::Initialized)
    }

    /// Loads an audio file, making it the current audio.
    ///
    /// Loading a different file while a playback is active stops that
    /// playback first (emitting `Stopped`); re-loading the current file is
    /// idempotent and returns the existing handle.
    pub fn load_audio(&self, path: &Path) -> Result<FmodAudioHandle, LoadError> {
        self.check_operational()?;
        let mut runtime = self.runtime.lock().expect("operation lock poisoned");

        // Validate before touching playback: a failed load must leave the
        // prior audio playing and its handles valid.
        let canonical = crate::loading::validate_and_normalize(path)?;
        if !self.loading.is_current_path(&canonical) {
            self.stop_active_playback(&mut runtime);
        }

        let handle = self.loading.load_audio(&canonical)?;
        runtime.current_sound = self.loading.current_sound();
        Ok(handle)
    }

    /// Plays the current audio from the beginning to its natural end.
    ///
    /// Fails with [`PlaybackError::AnotherPlaybackActive`] when a playback
    /// is already active.
    pub fn play(&self, audio: &FmodAudioHandle) -> Result<FmodPlaybackHandle, PlaybackError> {
        let metadata = self.metadata(audio)?;
        self.play_internal(audio, 0, metadata.frame_count as i64)
    }

    /// Plays `[start_frame, end_frame)` of the current audio.
    ///
    /// A range playback preempts an active playback: the active one is
    /// stopped (emitting `Stopped`) before the range starts.
    pub fn play_range(
        &self,
        audio: &FmodAudioHandle,
        start_frame: i64,
        end_frame: i64,
    ) -> Result<FmodPlaybackHandle, PlaybackError> {
        self.play_internal(audio, start_frame, end_frame)
    }

    fn play_internal(
        &self,
        audio: &FmodAudioHandle,
        start_frame: i64,
        end_frame: i64,
    ) -> Result<FmodPlaybackHandle, PlaybackError> {
        self.check_operational()?;
        let mut runtime = self.runtime.lock().expect("operation lock poisoned");
        self.check_operational()?;

        if !audio.is_valid() {
            return Err(PlaybackError::StaleAudioHandle);
        }
        if !self.lifecycle.is_current(audio) {
            return Err(PlaybackError::NotCurrentAudio);
        }
        if start_frame < 0 || end_frame < start_frame {
            return Err(PlaybackError::InvalidRange {
                start: start_frame,
                end: end_frame,
            });
        }

        let metadata = self
            .loading
            .current_metadata()
            .ok_or(PlaybackError::MetadataUnavailable)?;
        let start = start_frame as u64;
        let end = end_frame as u64;
        let is_range = start > 0 || end < metadata.frame_count;

        if let Some(current) = runtime.current_playback.clone() {
            if current.is_active() {
                if is_range {
                    self.stop_active_playback(&mut runtime);
                } else {
                    return Err(PlaybackError::AnotherPlaybackActive);
                }
            } else {
                // The previous playback finished or was reaped; resync the
                // state machine before restarting.
                runtime.current_playback = None;
                self.playback_state.handle_channel_invalid();
            }
        }

        let sound = runtime
            .current_sound
            .ok_or(PlaybackError::StaleAudioHandle)?;

        self.playback_state.transition_to_playing()?;
        let started = if is_range {
            self.playback.play_range(sound, audio, start, end, true)
        } else {
            self.playback.play(sound, audio)
        };
        let playback = match started {
            Ok(playback) => playback,
            Err(err) => {
                self.playback_state.transition_to_stopped();
                return Err(err);
            }
        };

        runtime.current_playback = Some(playback.clone());
        self.listeners.start_monitoring(&playback, end - start);
        self.listeners
            .notify_state_changed(&playback, PlaybackState::Playing, PlaybackState::Stopped);
        Ok(playback)
    }

    /// Pauses an active playback. Pausing an inactive handle is a no-op.
    pub fn pause(&self, playback: &FmodPlaybackHandle) -> Result<(), PlaybackError> {
        self.check_operational()?;
        let mut runtime = self.runtime.lock().expect("operation lock poisoned");
        self.check_operational()?;

        if !playback.is_active() {
            return Ok(());
        }
        if !is_current_playback(&runtime, playback) {
            return Err(PlaybackError::NotCurrent);
        }

        self.playback.pause()?;
        if !self.playback.has_active_playback() {
            playback.mark_inactive();
            runtime.current_playback = None;
            self.playback_state.handle_channel_invalid();
            return Ok(());
        }

        if self
            .playback_state
            .compare_and_set(PlaybackState::Playing, PlaybackState::Paused)
        {
            self.listeners
                .notify_state_changed(playback, PlaybackState::Paused, PlaybackState::Playing);
        }
        Ok(())
    }

    /// Resumes a paused playback.
    ///
    /// Fails with [`PlaybackError::ChannelLost`] when the native channel
    /// disappeared underneath the handle.
    pub fn resume(&self, playback: &FmodPlaybackHandle) -> Result<(), PlaybackError> {
        self.check_operational()?;
        let mut runtime = self.runtime.lock().expect("operation lock poisoned");
        self.check_operational()?;

        if !playback.is_active() {
            return Err(PlaybackError::NotActive);
        }
        if !is_current_playback(&runtime, playback) {
            return Err(PlaybackError::NotCurrent);
        }

        self.playback.resume()?;
        if !self.playback.has_active_playback() {
            playback.mark_inactive();
            runtime.current_playback = None;
            self.playback_state.handle_channel_invalid();
            self.listeners
                .notify_playback_error(Some(playback), "channel was stopped, cannot resume");
            return Err(PlaybackError::ChannelLost { action: "resume" });
        }

        if self
            .playback_state
            .compare_and_set(PlaybackState::Paused, PlaybackState::Playing)
        {
            self.listeners
                .notify_state_changed(playback, PlaybackState::Playing, PlaybackState::Paused);
        }
        Ok(())
    }

    /// Stops a playback. Stopping an inactive or superseded handle is a
    /// no-op.
    pub fn stop(&self, playback: &FmodPlaybackHandle) -> Result<(), PlaybackError> {
        self.check_operational()?;
        let mut runtime = self.runtime.lock().expect("operation lock poisoned");
        self.check_operational()?;

        if !playback.is_active() {
            return Ok(());
        }
        if !is_current_playback(&runtime, playback) {
            return Ok(());
        }

        // Stop monitoring first so the timer cannot mistake this explicit
        // stop for a natural completion.
        self.listeners.stop_monitoring();
        let previous = self.playback_state.state();
        self.playback.stop()?;
        playback.mark_inactive();
        runtime.current_playback = None;
        self.playback_state.transition_to_stopped();
        self.listeners.notify_state_changed(
            playback,
            PlaybackState::Stopped,
            stable_old_state(previous),
        );
        Ok(())
    }

    /// Seeks an active playback to `frame` (PCM units).
    ///
    /// Out-of-range targets are clamped by the native side; negative targets
    /// fail with [`PlaybackError::InvalidSeekPosition`]. Listeners observe a
    /// `Seeking` pair bracketing the seek.
    pub fn seek(&self, playback: &FmodPlaybackHandle, frame: i64) -> Result<(), PlaybackError> {
        self.check_operational()?;
        let mut runtime = self.runtime.lock().expect("operation lock poisoned");
        self.check_operational()?;

        if !playback.is_active() {
            return Err(PlaybackError::NotActive);
        }
        if !is_current_playback(&runtime, playback) {
            return Err(PlaybackError::NotCurrent);
        }
        if frame < 0 {
            return Err(PlaybackError::InvalidSeekPosition { frame });
        }
        self.playback_state.validate_seek_allowed()?;

        let (code, paused) = self.api.channel_get_paused(playback.channel());
        let was_paused = code == ffi::FMOD_OK && paused;

        self.playback.seek(frame as u64)?;
        if !self.playback.has_active_playback() {
            playback.mark_inactive();
            runtime.current_playback = None;
            self.playback_state.handle_channel_invalid();
            self.listeners
                .notify_playback_error(Some(playback), "channel was stopped, cannot seek");
            return Err(PlaybackError::ChannelLost { action: "seek" });
        }

        let stable = if was_paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        };
        self.listeners
            .notify_state_changed(playback, PlaybackState::Seeking, stable);
        self.listeners
            .notify_state_changed(playback, stable, PlaybackState::Seeking);
        Ok(())
    }

    /// Stable state of `playback`; never returns `Seeking`.
    ///
    /// This is the one query that opportunistically reaps a stale handle; it
    /// fires no listener callbacks while doing so.
    pub fn state_of(&self, playback: &FmodPlaybackHandle) -> Result<PlaybackState, PlaybackError> {
        self.check_operational()?;
        if !playback.is_active() {
            return Ok(PlaybackState::Stopped);
        }
        let mut runtime = self.runtime.lock().expect("operation lock poisoned");
        if !is_current_playback(&runtime, playback) {
            return Ok(PlaybackState::Stopped);
        }

        let (code, playing) = self.api.channel_is_playing(playback.channel());
        if code == ffi::FMOD_ERR_INVALID_HANDLE || code == ffi::FMOD_ERR_CHANNEL_STOLEN {
            playback.mark_inactive();
            runtime.current_playback = None;
            self.playback_state.handle_channel_invalid();
            return Ok(PlaybackState::Stopped);
        }
        if code != ffi::FMOD_OK {
            return Err(error::playback_error(code, "check playback state"));
        }
        if !playing {
            playback.mark_inactive();
            runtime.current_playback = None;
            self.playback_state.handle_channel_invalid();
            return Ok(PlaybackState::Stopped);
        }

        let (code, paused) = self.api.channel_get_paused(playback.channel());
        if code != ffi::FMOD_OK {
            return Err(error::playback_error(code, "check pause state"));
        }
        Ok(if paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        })
    }

    /// Decode position of `playback` in frames; 0 once it is inactive.
    pub fn position_of(&self, playback: &FmodPlaybackHandle) -> Result<u64, PlaybackError> {
        self.check_operational()?;
        if !playback.is_active() {
            return Ok(0);
        }
        let position = self.playback.position();
        if position == 0 && !self.playback.has_active_playback() {
            let mut runtime = self.runtime.lock().expect("operation lock poisoned");
            if is_current_playback(&runtime, playback) {
                runtime.current_playback = None;
            }
            playback.mark_inactive();
            self.playback_state.handle_channel_invalid();
        }
        Ok(position)
    }

    pub fn is_playing(&self, playback: &FmodPlaybackHandle) -> Result<bool, PlaybackError> {
        Ok(self.state_of(playback)? == PlaybackState::Playing)
    }

    pub fn is_paused(&self, playback: &FmodPlaybackHandle) -> Result<bool, PlaybackError> {
        Ok(self.state_of(playback)? == PlaybackState::Paused)
    }

    pub fn is_stopped(&self, playback: &FmodPlaybackHandle) -> Result<bool, PlaybackError> {
        Ok(self.state_of(playback)? == PlaybackState::Stopped)
    }

    /// Metadata of the currently loaded audio; `audio` must be current.
    pub fn metadata(&self, audio: &FmodAudioHandle) -> Result<AudioMetadata, PlaybackError> {
        self.check_operational()?;
        if !self.loading.is_current(audio) {
            return Err(PlaybackError::NotCurrentAudio);
        }
        self.loading
            .current_metadata()
            .ok_or(PlaybackError::MetadataUnavailable)
    }

    pub fn add_playback_listener(&self, listener: Arc<dyn PlaybackListener>) {
        self.listeners.add_listener(listener);
    }

    pub fn remove_playback_listener(&self, listener: &Arc<dyn PlaybackListener>) {
        self.listeners.remove_listener(listener);
    }

    /// Diagnostic descriptors of the native configuration; empty strings
    /// once the engine is closed.
    pub fn system_info(&self) -> (String, String, String) {
        (
            self.system_manager.version_info(),
            self.system_manager.buffer_info(),
            self.system_manager.format_info(),
        )
    }

    /// Shuts the engine down, releasing the channel, the current sound and
    /// the native system. Idempotent; never fails.
    pub fn close(&self) {
        loop {
            match self.state_machine.state() {
                EngineState::Closed | EngineState::Closing | EngineState::Uninitialized => return,
                EngineState::Initializing => {
                    self.state_machine
                        .compare_and_set(EngineState::Initializing, EngineState::Closed);
                    return;
                }
                EngineState::Initialized => {
                    if self
                        .state_machine
                        .compare_and_set(EngineState::Initialized, EngineState::Closing)
                    {
                        break;
                    }
                    // Lost the race; re-read the state.
                }
            }
        }

        let mut runtime = self.runtime.lock().expect("operation lock poisoned");

        if let Some(playback) = runtime.current_playback.take() {
            let code = self.api.channel_stop(playback.channel());
            if code != ffi::FMOD_OK && code != ffi::FMOD_ERR_INVALID_HANDLE {
                warn!(code = %error::describe(code), "error stopping channel during close");
            }
            playback.mark_inactive();
        }

        self.listeners.shutdown();
        self.playback_state.reset();
        self.loading.release_all();
        runtime.current_sound = None;
        self.system_manager.shutdown();

        if !self
            .state_machine
            .compare_and_set(EngineState::Closing, EngineState::Closed)
        {
            warn!("unexpected state during close transition");
        }
        debug!("audio engine closed");
    }

    /// Stops the active playback before the current audio is replaced,
    /// emitting the terminating `Stopped` transition.
    fn stop_active_playback(&self, runtime: &mut EngineRuntime) {
        let Some(playback) = runtime.current_playback.take() else {
            return;
        };
        if playback.is_active() {
            self.listeners.stop_monitoring();
            let previous = self.playback_state.state();
            let _ = self.playback.stop();
            playback.mark_inactive();
            self.playback_state.transition_to_stopped();
            self.listeners.notify_state_changed(
                &playback,
                PlaybackState::Stopped,
                stable_old_state(previous),
            );
        } else {
            self.playback_state.handle_channel_invalid();
        }
    }
}

fn is_current_playback(runtime: &EngineRuntime, playback: &FmodPlaybackHandle) -> bool {
    runtime
        .current_playback
        .as_ref()
        .is_some_and(|current| current.same_as(playback))
}

/// Old-state label for a terminating `Stopped` notification.
fn stable_old_state(previous: PlaybackState) -> PlaybackState {
    if previous == PlaybackState::Paused {
        PlaybackState::Paused
    } else {
        PlaybackState::Playing
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("state", &self.state_machine.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::stable_old_state;
    use wavenote_audio::PlaybackState;

    #[test]
    fn terminating_stop_reports_paused_only_when_previously_paused() {
        assert_eq!(
            stable_old_state(PlaybackState::Paused),
            PlaybackState::Paused,
        );
        assert_eq!(
            stable_old_state(PlaybackState::Playing),
            PlaybackState::Playing,
        );
        assert_eq!(
            stable_old_state(PlaybackState::Finished),
            PlaybackState::Playing,
        );
    }
}
