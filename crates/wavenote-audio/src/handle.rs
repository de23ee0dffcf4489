use std::fmt::Debug;

/// Opaque identity of a loaded audio resource.
///
/// A handle is valid only while it refers to the most recently loaded audio;
/// loading another file or closing the engine invalidates it.
pub trait AudioHandle: Debug + Send + Sync {
    /// Monotonic identity of this handle.
    fn id(&self) -> u64;

    /// Generation at which this handle was minted.
    fn generation(&self) -> u64;

    /// Whether this handle still refers to the currently loaded audio.
    fn is_valid(&self) -> bool;
}

/// Opaque identity of one playback of a loaded audio resource.
///
/// Once deactivated (stopped, superseded, completed, or channel lost) a
/// handle never becomes active again.
pub trait PlaybackHandle: Debug + Send + Sync {
    /// Monotonic identity of this playback.
    fn id(&self) -> u64;

    /// Whether the underlying channel is still owned by this playback.
    fn is_active(&self) -> bool;
}
