//! Generation-based handle lifecycle.
//!
//! An audio handle is valid iff it was minted at the current generation AND
//! it is identity-equal to the sole current handle. The two-part predicate
//! keeps a reloaded handle from passing validation through an id collision.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use wavenote_audio::{AudioHandle, PlaybackHandle};

use crate::ffi::{ChannelPtr, SoundPtr};

/// End-frame sentinel: play until the natural end of the sound.
pub(crate) const PLAY_TO_END: u64 = u64::MAX;

static NEXT_PLAYBACK_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct AudioHandleInner {
    id: u64,
    generation: u64,
    path: PathBuf,
    sound: SoundPtr,
    table: Arc<HandleTable>,
}

/// Handle to a loaded audio resource. Cheap to clone; clones share identity.
#[derive(Debug, Clone)]
pub struct FmodAudioHandle {
    inner: Arc<AudioHandleInner>,
}

impl FmodAudioHandle {
    /// Canonical path of the loaded file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub(crate) fn sound(&self) -> SoundPtr {
        self.inner.sound
    }

    /// Identity comparison, not structural equality.
    pub(crate) fn same_as(&self, other: &FmodAudioHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl AudioHandle for FmodAudioHandle {
    fn id(&self) -> u64 {
        self.inner.id
    }

    fn generation(&self) -> u64 {
        self.inner.generation
    }

    fn is_valid(&self) -> bool {
        self.inner.table.is_valid(self)
    }
}

impl PartialEq for FmodAudioHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for FmodAudioHandle {}

#[derive(Debug, Default)]
struct HandleTable {
    current_generation: AtomicU64,
    next_id: AtomicU64,
    current: Mutex<Option<FmodAudioHandle>>,
}

impl HandleTable {
    fn is_valid(&self, handle: &FmodAudioHandle) -> bool {
        if handle.inner.generation != self.current_generation.load(Ordering::Acquire) {
            return false;
        }
        let current = self.current.lock().expect("handle table lock poisoned");
        current.as_ref().is_some_and(|c| c.same_as(handle))
    }
}

/// Mints audio handles and tracks the sole current one.
#[derive(Debug)]
pub(crate) struct HandleLifecycleManager {
    table: Arc<HandleTable>,
}

impl HandleLifecycleManager {
    pub(crate) fn new() -> Self {
        Self {
            table: Arc::new(HandleTable {
                current_generation: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
                current: Mutex::new(None),
            }),
        }
    }

    /// Mints a handle for a freshly created sound, bumping the generation so
    /// every previously minted handle becomes invalid.
    pub(crate) fn create_handle(&self, sound: SoundPtr, path: PathBuf) -> FmodAudioHandle {
        let generation = self.table.current_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let id = self.table.next_id.fetch_add(1, Ordering::AcqRel);
        let handle = FmodAudioHandle {
            inner: Arc::new(AudioHandleInner {
                id,
                generation,
                path,
                sound,
                table: Arc::clone(&self.table),
            }),
        };
        let mut current = self
            .table
            .current
            .lock()
            .expect("handle table lock poisoned");
        *current = Some(handle.clone());
        handle
    }

    /// Three-part validity predicate: generation match plus identity match.
    /// Handles answer [`AudioHandle::is_valid`] through the same table.
    #[allow(dead_code)]
    pub(crate) fn is_valid(&self, handle: &FmodAudioHandle) -> bool {
        self.table.is_valid(handle)
    }

    /// Identity check against the current handle.
    pub(crate) fn is_current(&self, handle: &FmodAudioHandle) -> bool {
        let current = self
            .table
            .current
            .lock()
            .expect("handle table lock poisoned");
        current.as_ref().is_some_and(|c| c.same_as(handle))
    }

    #[allow(dead_code)]
    pub(crate) fn current_handle(&self) -> Option<FmodAudioHandle> {
        self.table
            .current
            .lock()
            .expect("handle table lock poisoned")
            .clone()
    }

    #[allow(dead_code)]
    pub(crate) fn current_generation(&self) -> u64 {
        self.table.current_generation.load(Ordering::Acquire)
    }

    /// Clears the current handle without touching the generation counter.
    pub(crate) fn clear(&self) {
        let mut current = self
            .table
            .current
            .lock()
            .expect("handle table lock poisoned");
        *current = None;
    }
}

#[derive(Debug)]
struct PlaybackHandleInner {
    id: u64,
    audio: FmodAudioHandle,
    channel: ChannelPtr,
    start_frame: u64,
    end_frame: u64,
    active: AtomicBool,
}

/// Handle to one playback. Cheap to clone; clones share identity and the
/// active flag.
#[derive(Debug, Clone)]
pub struct FmodPlaybackHandle {
    inner: Arc<PlaybackHandleInner>,
}

impl FmodPlaybackHandle {
    pub(crate) fn new(
        audio: FmodAudioHandle,
        channel: ChannelPtr,
        start_frame: u64,
        end_frame: u64,
    ) -> Self {
        Self {
            inner: Arc::new(PlaybackHandleInner {
                id: NEXT_PLAYBACK_ID.fetch_add(1, Ordering::AcqRel),
                audio,
                channel,
                start_frame,
                end_frame,
                active: AtomicBool::new(true),
            }),
        }
    }

    /// The audio this playback was started from.
    pub fn audio(&self) -> &FmodAudioHandle {
        &self.inner.audio
    }

    /// First frame of the playback range.
    pub fn start_frame(&self) -> u64 {
        self.inner.start_frame
    }

    /// Exclusive end frame, or [`PLAY_TO_END`] for full playback.
    pub(crate) fn end_frame(&self) -> u64 {
        self.inner.end_frame
    }

    pub(crate) fn channel(&self) -> ChannelPtr {
        self.inner.channel
    }

    /// Deactivation is permanent; all further operations become inert.
    pub(crate) fn mark_inactive(&self) {
        self.inner.active.store(false, Ordering::Release);
    }

    /// Identity comparison, not structural equality.
    pub(crate) fn same_as(&self, other: &FmodPlaybackHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PlaybackHandle for FmodPlaybackHandle {
    fn id(&self) -> u64 {
        self.inner.id
    }

    fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }
}

impl PartialEq for FmodPlaybackHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for FmodPlaybackHandle {}

#[cfg(test)]
mod tests {
    use super::{FmodPlaybackHandle, HandleLifecycleManager, PLAY_TO_END};
    use crate::ffi::{ChannelPtr, SoundPtr};
    use std::path::PathBuf;
    use wavenote_audio::{AudioHandle, PlaybackHandle};

    fn manager_with_handle() -> (HandleLifecycleManager, super::FmodAudioHandle) {
        let manager = HandleLifecycleManager::new();
        let handle = manager.create_handle(SoundPtr::dangling(), PathBuf::from("/tmp/a.wav"));
        (manager, handle)
    }

    #[test]
    fn freshly_minted_handle_is_valid_and_current() {
        let (manager, handle) = manager_with_handle();
        assert!(manager.is_valid(&handle));
        assert!(manager.is_current(&handle));
        assert!(handle.is_valid());
        assert_eq!(handle.generation(), 1);
        assert_eq!(manager.current_generation(), 1);
    }

    #[test]
    fn new_load_invalidates_the_previous_handle() {
        let (manager, first) = manager_with_handle();
        let second = manager.create_handle(SoundPtr::dangling(), PathBuf::from("/tmp/b.wav"));
        assert!(!first.is_valid());
        assert!(!manager.is_current(&first));
        assert!(second.is_valid());
        assert!(second.generation() > first.generation());
    }

    #[test]
    fn generations_are_strictly_increasing() {
        let manager = HandleLifecycleManager::new();
        let mut previous = 0;
        for index in 0..5 {
            let handle = manager
                .create_handle(SoundPtr::dangling(), PathBuf::from(format!("/tmp/{index}.wav")));
            assert!(handle.generation() > previous);
            previous = handle.generation();
        }
        assert_eq!(manager.current_generation(), 5);
    }

    #[test]
    fn only_the_most_recent_handle_is_valid() {
        let manager = HandleLifecycleManager::new();
        let handles: Vec<_> = (0..4)
            .map(|index| {
                manager.create_handle(SoundPtr::dangling(), PathBuf::from(format!("/tmp/{index}.wav")))
            })
            .collect();
        let valid: Vec<_> = handles.iter().filter(|h| h.is_valid()).collect();
        assert_eq!(valid.len(), 1);
        assert!(valid[0].same_as(handles.last().expect("handles not empty")));
    }

    #[test]
    fn clear_removes_the_current_handle_but_keeps_the_generation() {
        let (manager, handle) = manager_with_handle();
        manager.clear();
        assert!(!handle.is_valid());
        assert!(manager.current_handle().is_none());
        assert_eq!(manager.current_generation(), 1);
    }

    #[test]
    fn clones_share_identity() {
        let (_manager, handle) = manager_with_handle();
        let clone = handle.clone();
        assert!(handle.same_as(&clone));
        assert_eq!(handle, clone);
    }

    #[test]
    fn playback_handles_deactivate_permanently() {
        let (_manager, audio) = manager_with_handle();
        let playback = FmodPlaybackHandle::new(audio, ChannelPtr::dangling(), 0, PLAY_TO_END);
        assert!(playback.is_active());
        let clone = playback.clone();
        playback.mark_inactive();
        assert!(!playback.is_active());
        assert!(!clone.is_active());
    }

    #[test]
    fn racing_loads_leave_exactly_one_valid_handle() {
        let manager = std::sync::Arc::new(HandleLifecycleManager::new());
        let handles: Vec<_> = std::thread::scope(|scope| {
            (0..8)
                .map(|index| {
                    let manager = std::sync::Arc::clone(&manager);
                    scope.spawn(move || {
                        manager.create_handle(
                            SoundPtr::dangling(),
                            PathBuf::from(format!("/tmp/race-{index}.wav")),
                        )
                    })
                })
                .collect::<Vec<_>>()
                .into_iter()
                .map(|handle| handle.join().expect("thread panicked"))
                .collect()
        });

        assert_eq!(manager.current_generation(), 8);

        // Loads are serialized by the loading lock in the engine proper;
        // under a raw race the table still never reports more than one
        // valid handle, and a valid one must be the current one.
        let valid: Vec<_> = handles.iter().filter(|h| h.is_valid()).collect();
        assert!(valid.len() <= 1);
        if let Some(survivor) = valid.first() {
            let current = manager.current_handle().expect("no current handle");
            assert!(survivor.same_as(&current));
        }

        let mut generations: Vec<_> = handles.iter().map(|h| h.generation()).collect();
        generations.sort_unstable();
        generations.dedup();
        assert_eq!(generations.len(), handles.len());
    }

    #[test]
    fn playback_ids_are_unique_and_increasing() {
        let (_manager, audio) = manager_with_handle();
        let first = FmodPlaybackHandle::new(audio.clone(), ChannelPtr::dangling(), 0, PLAY_TO_END);
        let second = FmodPlaybackHandle::new(audio, ChannelPtr::dangling(), 0, PLAY_TO_END);
        assert!(second.id() > first.id());
        assert!(!first.same_as(&second));
    }
}
