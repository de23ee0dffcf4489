use serde::{Deserialize, Serialize};

/// Lifecycle state of the audio engine as a whole.
///
/// Only [`EngineState::Initialized`] permits audio operations. `Closed`
/// engines may be re-initialized by constructing a fresh engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineState {
    /// Engine object exists but the native system has not been touched.
    Uninitialized,
    /// Native system is being created and configured.
    Initializing,
    /// Engine is operational.
    Initialized,
    /// Engine is tearing down native resources.
    Closing,
    /// Engine has released all native resources.
    Closed,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineState::Uninitialized => "UNINITIALIZED",
            EngineState::Initializing => "INITIALIZING",
            EngineState::Initialized => "INITIALIZED",
            EngineState::Closing => "CLOSING",
            EngineState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Externally observable state of one playback.
///
/// `Seeking` is transient: it is only ever emitted as a notification pair
/// bracketing a seek and is never returned by a state getter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackState {
    /// No channel is advancing.
    Stopped,
    /// The channel is producing output.
    Playing,
    /// The channel exists but is paused.
    Paused,
    /// Transient marker emitted around a seek.
    Seeking,
    /// Playback reached its natural end.
    Finished,
    /// Playback failed; reported through the error callback.
    Error,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlaybackState::Stopped => "STOPPED",
            PlaybackState::Playing => "PLAYING",
            PlaybackState::Paused => "PAUSED",
            PlaybackState::Seeking => "SEEKING",
            PlaybackState::Finished => "FINISHED",
            PlaybackState::Error => "ERROR",
        };
        f.write_str(name)
    }
}
