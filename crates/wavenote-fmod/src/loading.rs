//! Audio file loading under the single-audio paradigm.
//!
//! Exactly one audio file is "current" at a time. A new sound is always
//! created before the previous one is released, so a failed load leaves the
//! prior audio loaded and its handle valid.

use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::warn;

use wavenote_audio::{AudioMetadata, EngineState, LoadError};

use crate::engine_state::EngineStateMachine;
use crate::error;
use crate::ffi::{self, FmodApi, SoundPtr, SystemPtr};
use crate::handle::{FmodAudioHandle, HandleLifecycleManager};

struct CurrentAudio {
    handle: FmodAudioHandle,
    sound: SoundPtr,
    path: PathBuf,
}

/// Loads audio files and owns the current native sound exclusively.
pub(crate) struct AudioLoadingManager {
    api: Arc<FmodApi>,
    system: SystemPtr,
    state_machine: Arc<EngineStateMachine>,
    lifecycle: Arc<HandleLifecycleManager>,
    current: Mutex<Option<CurrentAudio>>,
}

impl AudioLoadingManager {
    pub(crate) fn new(
        api: Arc<FmodApi>,
        system: SystemPtr,
        state_machine: Arc<EngineStateMachine>,
        lifecycle: Arc<HandleLifecycleManager>,
    ) -> Self {
        Self {
            api,
            system,
            state_machine,
            lifecycle,
            current: Mutex::new(None),
        }
    }

    /// Loads `path`, returning the existing handle unchanged when the same
    /// canonical file is already current.
    pub(crate) fn load_audio(&self, path: &Path) -> Result<FmodAudioHandle, LoadError> {
        let mut current = self.current.lock().expect("loading lock poisoned");

        let canonical = validate_and_normalize(path)?;

        if let Some(existing) = current.as_ref() {
            if existing.path == canonical {
                return Ok(existing.handle.clone());
            }
        }

        // Create the new sound before touching the old one so a failed load
        // leaves the previous audio intact.
        let new_sound = self.create_sound(&canonical)?;

        if let Some(previous) = current.as_ref() {
            let code = self.api.sound_release(previous.sound);
            if code != ffi::FMOD_OK && code != ffi::FMOD_ERR_INVALID_HANDLE {
                warn!(
                    path = %previous.path.display(),
                    code = %error::describe(code),
                    "error releasing previous sound",
                );
            }
        }

        let handle = self.lifecycle.create_handle(new_sound, canonical.clone());
        *current = Some(CurrentAudio {
            handle: handle.clone(),
            sound: new_sound,
            path: canonical,
        });
        Ok(handle)
    }

    /// Metadata of the currently loaded audio, if any.
    ///
    /// Extraction failures degrade to a default-populated value instead of
    /// failing the caller.
    pub(crate) fn current_metadata(&self) -> Option<AudioMetadata> {
        let current = self.current.lock().expect("loading lock poisoned");
        current.as_ref().map(|audio| {
            self.extract_metadata(audio.sound, &audio.path)
                .unwrap_or_else(|err| {
                    warn!(
                        path = %audio.path.display(),
                        error = %err,
                        "failed to extract metadata",
                    );
                    AudioMetadata {
                        sample_rate: 48_000,
                        channel_count: 2,
                        bits_per_sample: 16,
                        format: "Unknown".to_string(),
                        frame_count: 0,
                        duration_seconds: 0.0,
                    }
                })
        })
    }

    /// Whether `handle` identifies the currently loaded audio.
    pub(crate) fn is_current(&self, handle: &FmodAudioHandle) -> bool {
        self.lifecycle.is_current(handle)
    }

    /// Whether `path` resolves to the currently loaded file.
    pub(crate) fn is_current_path(&self, path: &Path) -> bool {
        let Ok(canonical) = std::fs::canonicalize(path) else {
            return false;
        };
        let current = self.current.lock().expect("loading lock poisoned");
        current.as_ref().is_some_and(|audio| audio.path == canonical)
    }

    pub(crate) fn current_sound(&self) -> Option<SoundPtr> {
        let current = self.current.lock().expect("loading lock poisoned");
        current.as_ref().map(|audio| audio.sound)
    }

    /// Releases the current sound and clears the handle table.
    pub(crate) fn release_all(&self) {
        let mut current = self.current.lock().expect("loading lock poisoned");
        if let Some(audio) = current.take() {
            let code = self.api.sound_release(audio.sound);
            if code != ffi::FMOD_OK && code != ffi::FMOD_ERR_INVALID_HANDLE {
                warn!(
                    path = %audio.path.display(),
                    code = %error::describe(code),
                    "error releasing sound",
                );
            }
        }
        self.lifecycle.clear();
    }

    fn create_sound(&self, canonical: &Path) -> Result<SoundPtr, LoadError> {
        self.state_machine
            .execute_in_state(EngineState::Initialized, || Ok(()))?;

        let c_path = path_to_cstring(canonical)?;
        let flags = ffi::FMOD_DEFAULT | ffi::FMOD_ACCURATETIME;
        let (code, sound) = self.api.system_create_sound(self.system, &c_path, flags);
        if code != ffi::FMOD_OK {
            return Err(error::load_error(code, canonical));
        }
        if sound.is_null() {
            return Err(LoadError::Failed {
                path: canonical.to_path_buf(),
                code: ffi::FMOD_OK,
            });
        }
        Ok(sound)
    }

    fn extract_metadata(&self, sound: SoundPtr, path: &Path) -> Result<AudioMetadata, LoadError> {
        let native_failure = |code| LoadError::Failed {
            path: path.to_path_buf(),
            code,
        };

        let (code, sound_type, _sample_format, channels, bits) = self.api.sound_get_format(sound);
        if code != ffi::FMOD_OK {
            return Err(native_failure(code));
        }

        let (code, frequency, _priority) = self.api.sound_get_defaults(sound);
        if code != ffi::FMOD_OK {
            return Err(native_failure(code));
        }

        let (code, frame_count) = self.api.sound_get_length(sound, ffi::FMOD_TIMEUNIT_PCM);
        if code != ffi::FMOD_OK {
            return Err(native_failure(code));
        }

        let sample_rate = frequency.round().max(0.0) as u32;
        let frame_count = u64::from(frame_count);
        // Frames over frequency, not the millisecond accessor: the division
        // keeps sub-millisecond precision.
        let duration_seconds = if sample_rate > 0 {
            frame_count as f64 / f64::from(sample_rate)
        } else {
            0.0
        };

        Ok(AudioMetadata {
            sample_rate,
            channel_count: channels.max(0) as u32,
            bits_per_sample: bits.max(0) as u32,
            format: sound_type_tag(sound_type).to_string(),
            frame_count,
            duration_seconds,
        })
    }
}

/// Maps a native sound type to the public format tag.
pub(crate) fn sound_type_tag(sound_type: i32) -> &'static str {
    match sound_type {
        ffi::FMOD_SOUND_TYPE_WAV => "WAV",
        ffi::FMOD_SOUND_TYPE_AIFF => "AIFF",
        ffi::FMOD_SOUND_TYPE_MPEG => "MP3",
        ffi::FMOD_SOUND_TYPE_OGGVORBIS => "OGG",
        ffi::FMOD_SOUND_TYPE_FLAC => "FLAC",
        ffi::FMOD_SOUND_TYPE_OPUS => "Opus",
        ffi::FMOD_SOUND_TYPE_RAW => "RAW",
        _ => "Unknown",
    }
}

/// Validates the path and resolves it to its canonical form, before any
/// native code is involved.
pub(crate) fn validate_and_normalize(path: &Path) -> Result<PathBuf, LoadError> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(LoadError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(LoadError::PathResolution {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if metadata.is_dir() {
        return Err(LoadError::IsDirectory {
            path: path.to_path_buf(),
        });
    }

    if std::fs::File::open(path).is_err() {
        return Err(LoadError::NotReadable {
            path: path.to_path_buf(),
        });
    }

    std::fs::canonicalize(path).map_err(|source| LoadError::PathResolution {
        path: path.to_path_buf(),
        source,
    })
}

fn path_to_cstring(path: &Path) -> Result<CString, LoadError> {
    let text = path.to_str().ok_or_else(|| LoadError::PathResolution {
        path: path.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "path is not valid UTF-8",
        ),
    })?;
    CString::new(text).map_err(|_| LoadError::PathResolution {
        path: path.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "path contains an interior NUL byte",
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::{sound_type_tag, validate_and_normalize};
    use crate::ffi;
    use std::io::Write;
    use std::path::PathBuf;
    use wavenote_audio::LoadError;

    fn scratch_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("wavenote-loading-{name}-{}", std::process::id()));
        let mut file = std::fs::File::create(&path).expect("failed to create scratch file");
        file.write_all(b"RIFF").expect("failed to write scratch file");
        path
    }

    #[test]
    fn all_supported_format_tags_map() {
        assert_eq!(sound_type_tag(ffi::FMOD_SOUND_TYPE_WAV), "WAV");
        assert_eq!(sound_type_tag(ffi::FMOD_SOUND_TYPE_AIFF), "AIFF");
        assert_eq!(sound_type_tag(ffi::FMOD_SOUND_TYPE_MPEG), "MP3");
        assert_eq!(sound_type_tag(ffi::FMOD_SOUND_TYPE_OGGVORBIS), "OGG");
        assert_eq!(sound_type_tag(ffi::FMOD_SOUND_TYPE_FLAC), "FLAC");
        assert_eq!(sound_type_tag(ffi::FMOD_SOUND_TYPE_OPUS), "Opus");
        assert_eq!(sound_type_tag(ffi::FMOD_SOUND_TYPE_RAW), "RAW");
        assert_eq!(sound_type_tag(0), "Unknown");
        assert_eq!(sound_type_tag(999), "Unknown");
    }

    #[test]
    fn missing_file_is_reported_before_native_code() {
        let err = validate_and_normalize("/definitely/not/here.wav".as_ref()).unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound { .. }));
    }

    #[test]
    fn directories_are_rejected() {
        let err = validate_and_normalize(std::env::temp_dir().as_path()).unwrap_err();
        assert!(matches!(err, LoadError::IsDirectory { .. }));
    }

    #[test]
    fn readable_file_resolves_to_its_canonical_path() {
        let path = scratch_file("canonical");
        let canonical = validate_and_normalize(&path).expect("validation failed");
        assert!(canonical.is_absolute());
        assert_eq!(
            canonical,
            std::fs::canonicalize(&path).expect("canonicalize failed"),
        );
        std::fs::remove_file(&path).expect("failed to remove scratch file");
    }
}
