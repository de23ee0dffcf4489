use std::path::PathBuf;

use thiserror::Error;

use crate::state::{EngineState, PlaybackState};

/// Errors produced by engine lifecycle and native system operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operation attempted outside its required lifecycle state.
    #[error("operation requires state {required} but current state is {actual}")]
    InvalidState {
        /// State the operation requires.
        required: EngineState,
        /// State observed instead.
        actual: EngineState,
    },
    /// Operation attempted outside its set of permitted lifecycle states.
    #[error("operation requires one of states {required:?} but current state is {actual}")]
    InvalidStateAny {
        /// States the operation permits.
        required: &'static [EngineState],
        /// State observed instead.
        actual: EngineState,
    },
    /// A lifecycle transition outside the transition table was requested.
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        /// Source state.
        from: EngineState,
        /// Requested target state.
        to: EngineState,
    },
    /// Engine construction raced with another initialization.
    #[error("cannot initialize engine in state {state}")]
    InitFromState {
        /// State observed at construction.
        state: EngineState,
    },
    /// The native system was initialized twice.
    #[error("audio system already initialized")]
    AlreadyInitialized,
    /// `close()` won the race against an in-flight initialization.
    #[error("engine was closed during initialization")]
    ClosedDuringInit,
    /// The native library could not be found at the configured path.
    #[error("native audio library not found at {path}")]
    LibraryNotFound {
        /// Path that was probed.
        path: PathBuf,
    },
    /// The native library failed to load or resolve a required symbol.
    #[error("failed to load native audio library")]
    LibraryLoad {
        /// Loader failure reported by the platform.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    /// A native system call failed.
    #[error("failed to {action}: native error {code}")]
    Native {
        /// Operation that failed.
        action: &'static str,
        /// Raw native result code.
        code: i32,
    },
}

/// Errors produced while loading an audio file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file does not exist.
    #[error("audio file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: PathBuf,
    },
    /// The decoder does not recognize the file's format.
    #[error("unsupported audio format: {path}")]
    UnsupportedFormat {
        /// Path that was requested.
        path: PathBuf,
    },
    /// The file exists but its contents are not decodable.
    #[error("corrupted or invalid audio file: {path}")]
    CorruptedFile {
        /// Path that was requested.
        path: PathBuf,
    },
    /// The native decoder ran out of memory while loading.
    #[error("insufficient memory to load audio file: {path}")]
    OutOfMemory {
        /// Path that was requested.
        path: PathBuf,
    },
    /// The file exists but is not readable by this process.
    #[error("cannot read audio file: {path}")]
    NotReadable {
        /// Path that was requested.
        path: PathBuf,
    },
    /// The path names a directory.
    #[error("path is a directory, not a file: {path}")]
    IsDirectory {
        /// Path that was requested.
        path: PathBuf,
    },
    /// The path could not be canonicalized.
    #[error("failed to resolve file path: {path}")]
    PathResolution {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// Generic native load failure; carries the raw result code.
    #[error("failed to load audio file '{path}' (native error {code})")]
    Failed {
        /// Path that was requested.
        path: PathBuf,
        /// Raw native result code.
        code: i32,
    },
    /// The engine was not in a state that permits loading.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Errors produced by playback control operations.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The playback handle has been deactivated.
    #[error("playback handle is no longer active")]
    NotActive,
    /// The handle does not identify the engine's current playback.
    #[error("not the current playback handle")]
    NotCurrent,
    /// The audio handle was invalidated by a later load or a close.
    #[error("audio handle is no longer valid")]
    StaleAudioHandle,
    /// The audio handle does not identify the currently loaded file.
    #[error("audio handle is not the currently loaded file")]
    NotCurrentAudio,
    /// Requested range is inverted or negative.
    #[error("invalid playback range: {start} to {end}")]
    InvalidRange {
        /// Requested start frame.
        start: i64,
        /// Requested end frame.
        end: i64,
    },
    /// Requested seek target is negative.
    #[error("invalid seek position: {frame}")]
    InvalidSeekPosition {
        /// Requested frame.
        frame: i64,
    },
    /// A second full-file playback was requested while one is active.
    #[error("another playback is already active")]
    AnotherPlaybackActive,
    /// The native channel disappeared where recovery is not possible.
    #[error("channel was stopped, cannot {action}")]
    ChannelLost {
        /// Operation that observed the loss.
        action: &'static str,
    },
    /// A channel operation was requested with no channel present.
    #[error("no active playback to {action}")]
    NoActivePlayback {
        /// Operation that was requested.
        action: &'static str,
    },
    /// The playback state machine rejected the operation.
    #[error("cannot {action} from state {state}")]
    InvalidStateFor {
        /// Operation that was requested.
        action: &'static str,
        /// Playback state observed.
        state: PlaybackState,
    },
    /// No metadata is available for the currently loaded audio.
    #[error("no metadata available for current audio")]
    MetadataUnavailable,
    /// A native channel call failed.
    #[error("failed to {action}: native error {code}")]
    Native {
        /// Operation that failed.
        action: &'static str,
        /// Raw native result code.
        code: i32,
    },
    /// The engine was not in a state that permits playback operations.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Errors produced by the bulk sample reader.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The reader has been closed.
    #[error("sample reader is closed")]
    Closed,
    /// Negative start or count was requested.
    #[error("negative frame values not allowed: start {start}, count {count}")]
    NegativeRange {
        /// Requested start frame.
        start: i64,
        /// Requested frame count.
        count: i64,
    },
    /// The source stores samples at a bit depth the reader cannot decode.
    #[error("unsupported bit depth: {bits}")]
    UnsupportedBitDepth {
        /// Bits per sample reported by the decoder.
        bits: u32,
    },
    /// The path could not be resolved to an absolute native path.
    #[error("failed to resolve file path: {path}")]
    PathResolution {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// A native call failed while decoding a file.
    #[error("failed to {action} for '{path}': native error {code}")]
    Native {
        /// Operation that failed.
        action: &'static str,
        /// File being decoded.
        path: PathBuf,
        /// Raw native result code.
        code: i32,
    },
    /// The background decode task was cancelled or panicked.
    #[error("background read task failed")]
    TaskFailed,
    /// Reader construction failed at the native system level.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[cfg(test)]
mod tests {
    use super::{EngineError, LoadError, PlaybackError};
    use crate::state::EngineState;
    use std::path::PathBuf;

    #[test]
    fn invalid_state_message_names_both_states() {
        let err = EngineError::InvalidState {
            required: EngineState::Initialized,
            actual: EngineState::Closed,
        };
        assert_eq!(
            err.to_string(),
            "operation requires state INITIALIZED but current state is CLOSED",
        );
    }

    #[test]
    fn load_error_wraps_engine_error_transparently() {
        let err = LoadError::from(EngineError::AlreadyInitialized);
        assert_eq!(err.to_string(), "audio system already initialized");
    }

    #[test]
    fn failed_load_carries_native_code() {
        let err = LoadError::Failed {
            path: PathBuf::from("/tmp/a.wav"),
            code: 19,
        };
        assert!(err.to_string().contains("native error 19"));
    }

    #[test]
    fn invalid_range_names_bounds() {
        let err = PlaybackError::InvalidRange { start: 9, end: 3 };
        assert_eq!(err.to_string(), "invalid playback range: 9 to 3");
    }
}
