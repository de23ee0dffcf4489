use crate::handle::PlaybackHandle;
use crate::state::PlaybackState;

/// Subscriber interface for playback events.
///
/// All callbacks have default no-op implementations so listeners only
/// override what they need. Callbacks are invoked either from the control
/// thread that triggered the change or from the progress monitor thread;
/// implementations must not block for long and must not call back into the
/// engine — the engine may be holding its operation lock while it joins the
/// monitor thread.
///
/// A listener that panics does not prevent other listeners from being
/// notified, and the panic never propagates to the emitter.
pub trait PlaybackListener: Send + Sync {
    /// Periodic progress update; positions are latency-compensated frames.
    fn on_progress(&self, playback: &dyn PlaybackHandle, position_frames: u64, total_frames: u64) {
        let _ = (playback, position_frames, total_frames);
    }

    /// Playback state transition, including the transient `Seeking` pair.
    fn on_state_changed(
        &self,
        playback: &dyn PlaybackHandle,
        new_state: PlaybackState,
        old_state: PlaybackState,
    ) {
        let _ = (playback, new_state, old_state);
    }

    /// Playback reached its natural end. Fires at most once per playback.
    fn on_playback_complete(&self, playback: &dyn PlaybackHandle) {
        let _ = playback;
    }

    /// Playback failed; `playback` is absent when the failure happened
    /// before a handle existed.
    fn on_playback_error(&self, playback: Option<&dyn PlaybackHandle>, message: &str) {
        let _ = (playback, message);
    }
}
