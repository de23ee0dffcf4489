//! Listener subscriptions, progress monitoring and event fan-out.
//!
//! Subscribers live in a copy-on-write snapshot; notifications iterate the
//! snapshot with no lock held, so a slow or panicking listener can never
//! deadlock the engine. A single named monitor thread ticks at a fixed
//! interval while one playback is monitored, pumping the native system and
//! publishing latency-compensated progress.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::{trace, warn};

use wavenote_audio::{PlaybackHandle, PlaybackListener, PlaybackState};

use crate::error;
use crate::ffi::{self, FmodApi};
use crate::handle::{FmodPlaybackHandle, PLAY_TO_END};
use crate::system::SystemManager;

/// Panic-message suffix that identifies deliberate test-listener panics;
/// those are logged without the payload treated as noteworthy.
pub(crate) const TEST_LISTENER_PANIC: &str = "test listener panic";

/// Copy-on-write subscriber set with per-listener panic isolation.
pub(crate) struct ListenerRegistry {
    listeners: Mutex<Arc<Vec<Arc<dyn PlaybackListener>>>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            listeners: Mutex::new(Arc::new(Vec::new())),
        }
    }

    fn snapshot(&self) -> Arc<Vec<Arc<dyn PlaybackListener>>> {
        Arc::clone(&self.listeners.lock().expect("listener lock poisoned"))
    }

    pub(crate) fn add(&self, listener: Arc<dyn PlaybackListener>) {
        let mut guard = self.listeners.lock().expect("listener lock poisoned");
        let mut next = guard.as_ref().clone();
        next.push(listener);
        *guard = Arc::new(next);
    }

    /// Removes the first identity-equal occurrence, if any.
    pub(crate) fn remove(&self, listener: &Arc<dyn PlaybackListener>) {
        let mut guard = self.listeners.lock().expect("listener lock poisoned");
        let mut next = guard.as_ref().clone();
        if let Some(index) = next.iter().position(|l| Arc::ptr_eq(l, listener)) {
            next.remove(index);
            *guard = Arc::new(next);
        }
    }

    pub(crate) fn clear(&self) {
        let mut guard = self.listeners.lock().expect("listener lock poisoned");
        *guard = Arc::new(Vec::new());
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub(crate) fn notify_state_changed(
        &self,
        playback: &dyn PlaybackHandle,
        new_state: PlaybackState,
        old_state: PlaybackState,
    ) {
        for listener in self.snapshot().iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                listener.on_state_changed(playback, new_state, old_state);
            }));
            if let Err(payload) = outcome {
                log_listener_panic("state change", payload);
            }
        }
    }

    pub(crate) fn notify_progress(
        &self,
        playback: &dyn PlaybackHandle,
        position_frames: u64,
        total_frames: u64,
    ) {
        for listener in self.snapshot().iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                listener.on_progress(playback, position_frames, total_frames);
            }));
            if let Err(payload) = outcome {
                log_listener_panic("progress", payload);
            }
        }
    }

    /// Emits the Playing→Finished transition, then the completion callback.
    pub(crate) fn notify_playback_complete(&self, playback: &dyn PlaybackHandle) {
        self.notify_state_changed(playback, PlaybackState::Finished, PlaybackState::Playing);
        for listener in self.snapshot().iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                listener.on_playback_complete(playback);
            }));
            if let Err(payload) = outcome {
                log_listener_panic("completion", payload);
            }
        }
    }

    pub(crate) fn notify_playback_error(
        &self,
        playback: Option<&dyn PlaybackHandle>,
        message: &str,
    ) {
        for listener in self.snapshot().iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                listener.on_playback_error(playback, message);
            }));
            if let Err(payload) = outcome {
                log_listener_panic("error", payload);
            }
        }
    }
}

fn log_listener_panic(context: &'static str, payload: Box<dyn std::any::Any + Send>) {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match message {
        Some(text) if text.ends_with(TEST_LISTENER_PANIC) => {
            warn!("error in {context} listener: {text}");
        }
        Some(text) => warn!(payload = %text, "error in {context} listener"),
        None => warn!("error in {context} listener"),
    }
}

struct Monitored {
    handle: FmodPlaybackHandle,
    total_frames: u64,
}

struct MonitorTimer {
    stop_tx: Sender<()>,
    join: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

#[derive(Default)]
struct MonitorState {
    current: Option<Monitored>,
    timer: Option<MonitorTimer>,
}

struct ListenerInner {
    api: Arc<FmodApi>,
    system_manager: Arc<SystemManager>,
    interval: Duration,
    registry: ListenerRegistry,
    monitor: Mutex<MonitorState>,
    shutdown: AtomicBool,
}

/// Subscription registry plus the periodic progress monitor.
pub(crate) struct ListenerManager {
    inner: Arc<ListenerInner>,
}

impl ListenerManager {
    pub(crate) fn new(
        api: Arc<FmodApi>,
        system_manager: Arc<SystemManager>,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ListenerInner {
                api,
                system_manager,
                interval,
                registry: ListenerRegistry::new(),
                monitor: Mutex::new(MonitorState::default()),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn add_listener(&self, listener: Arc<dyn PlaybackListener>) {
        if self.inner.shutdown.load(Ordering::Acquire) {
            warn!("cannot add listener to shut down manager");
            return;
        }
        self.inner.registry.add(listener);
        trace!(count = self.inner.registry.len(), "added playback listener");
    }

    pub(crate) fn remove_listener(&self, listener: &Arc<dyn PlaybackListener>) {
        self.inner.registry.remove(listener);
        trace!(count = self.inner.registry.len(), "removed playback listener");
    }

    /// Begins monitoring `handle`, replacing any previous monitoring.
    ///
    /// The first progress event fires immediately so the start position is
    /// captured. Without subscribers only the handle is recorded; no timer
    /// thread is spawned.
    pub(crate) fn start_monitoring(&self, handle: &FmodPlaybackHandle, total_frames: u64) {
        if self.inner.shutdown.load(Ordering::Acquire) {
            warn!("cannot start monitoring on shut down manager");
            return;
        }

        self.stop_monitoring();

        let mut state = self.inner.monitor.lock().expect("monitor lock poisoned");
        state.current = Some(Monitored {
            handle: handle.clone(),
            total_frames,
        });

        if self.inner.registry.is_empty() {
            return;
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let inner = Arc::clone(&self.inner);
        let interval = self.inner.interval;
        let join = std::thread::Builder::new()
            .name("wavenote-progress".to_string())
            .spawn(move || loop {
                inner.update_progress();
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .expect("failed to spawn wavenote-progress thread");
        state.timer = Some(MonitorTimer {
            stop_tx,
            thread_id: join.thread().id(),
            join: Some(join),
        });
    }

    /// Ceases progress callbacks. Joining is skipped when called from the
    /// monitor thread itself; the loop exits at its next wakeup.
    pub(crate) fn stop_monitoring(&self) {
        self.inner.stop_monitoring();
    }

    pub(crate) fn notify_state_changed(
        &self,
        playback: &FmodPlaybackHandle,
        new_state: PlaybackState,
        old_state: PlaybackState,
    ) {
        self.inner
            .registry
            .notify_state_changed(playback, new_state, old_state);
    }

    pub(crate) fn notify_playback_error(
        &self,
        playback: Option<&FmodPlaybackHandle>,
        message: &str,
    ) {
        self.inner
            .registry
            .notify_playback_error(playback.map(|p| p as &dyn PlaybackHandle), message);
    }

    /// Stops the timer and drops all subscribers. Idempotent; the manager is
    /// unusable afterwards.
    pub(crate) fn shutdown(&self) {
        if self
            .inner
            .shutdown
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.stop_monitoring();
            self.inner.registry.clear();
        }
    }
}

impl ListenerInner {
    fn stop_monitoring(&self) {
        let timer = {
            let mut state = self.monitor.lock().expect("monitor lock poisoned");
            state.current = None;
            state.timer.take()
        };
        if let Some(mut timer) = timer {
            let _ = timer.stop_tx.try_send(());
            if timer.thread_id != std::thread::current().id() {
                if let Some(join) = timer.join.take() {
                    let _ = join.join();
                }
            }
        }
    }

    fn update_progress(&self) {
        let (handle, total_frames) = {
            let state = self.monitor.lock().expect("monitor lock poisoned");
            match state.current.as_ref() {
                Some(monitored) => (monitored.handle.clone(), monitored.total_frames),
                None => return,
            }
        };

        if self.registry.is_empty() {
            return;
        }

        if !handle.is_active() {
            self.handle_playback_stopped();
            return;
        }

        // Keep the native side pumped while playback is monitored.
        self.system_manager.update();

        let (code, decoded) = self
            .api
            .channel_get_position(handle.channel(), ffi::FMOD_TIMEUNIT_PCM);
        if code == ffi::FMOD_OK {
            let hearing = self.hearing_position(u64::from(decoded), &handle);
            self.registry.notify_progress(&handle, hearing, total_frames);

            if handle.end_frame() != PLAY_TO_END && hearing >= handle.end_frame() {
                self.handle_playback_stopped();
            }
        } else if code == ffi::FMOD_ERR_INVALID_HANDLE {
            self.handle_playback_stopped();
        } else {
            trace!(code = %error::describe(code), "failed to get position");
        }
    }

    /// Estimates the user-audible position from the decode position.
    fn hearing_position(&self, decoded: u64, handle: &FmodPlaybackHandle) -> u64 {
        let Some(system) = self.system_manager.system() else {
            return decoded;
        };

        let (code, buffer_length, num_buffers) = self.api.system_get_dsp_buffer_size(system);
        if code != ffi::FMOD_OK {
            return decoded;
        }

        let (code, output_rate, _speaker_mode, _raw_speakers) =
            self.api.system_get_software_format(system);
        if code != ffi::FMOD_OK {
            return decoded;
        }

        let mut source_rate = 48_000u32;
        let (code, frequency, _priority) = self.api.sound_get_defaults(handle.audio().sound());
        if code == ffi::FMOD_OK && frequency > 0.0 {
            source_rate = frequency.round() as u32;
        }

        compensate_position(
            decoded,
            handle.start_frame(),
            buffer_length,
            num_buffers,
            output_rate,
            source_rate,
        )
    }

    /// Marks the playback complete exactly once: deactivate, notify, stop.
    fn handle_playback_stopped(&self) {
        let handle = {
            let state = self.monitor.lock().expect("monitor lock poisoned");
            state.current.as_ref().map(|monitored| monitored.handle.clone())
        };
        if let Some(handle) = handle {
            handle.mark_inactive();
            self.registry.notify_playback_complete(&handle);
        }
        self.stop_monitoring();
    }
}

/// Converts a decode position into the latency-compensated hearing position.
///
/// The mixer runs `num_buffers - 1` buffers ahead of the speaker plus half a
/// buffer of mix-ahead; that lead is converted from output-rate frames into
/// source-rate frames, clamped so the result never precedes `start_frame`.
/// Any zero parameter disables compensation.
pub(crate) fn compensate_position(
    decoded: u64,
    start_frame: u64,
    buffer_length: u32,
    num_buffers: i32,
    output_rate: i32,
    source_rate: u32,
) -> u64 {
    if buffer_length == 0 || num_buffers <= 0 || output_rate <= 0 || source_rate == 0 {
        return decoded;
    }

    let relative = decoded.saturating_sub(start_frame);

    let lead_output =
        u64::from(buffer_length) * (num_buffers as u64 - 1) + u64::from(buffer_length) / 2;

    let lead_source = if output_rate as u32 == source_rate {
        lead_output
    } else {
        ((lead_output as f64 * f64::from(source_rate)) / f64::from(output_rate)).round() as u64
    };

    let lead = lead_source.min(relative);
    start_frame + (relative - lead)
}
