//! Native system lifecycle: creation, playback configuration, teardown.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use wavenote_audio::EngineError;

use crate::error;
use crate::ffi::{self, FmodApi, SystemPtr};
use crate::loader::FmodLibraryLoader;

/// DSP buffer configuration for low-latency playback.
const DSP_BUFFER_LENGTH: u32 = 256;
const DSP_NUM_BUFFERS: i32 = 4;

/// Mixer output rate. The annotation UI renders mono waveforms, so the
/// software format is mono as well.
const OUTPUT_SAMPLE_RATE: i32 = 48_000;

/// Channels handed to `System_Init`.
const MAX_CHANNELS: i32 = 2;

#[derive(Default)]
struct SystemInner {
    api: Option<Arc<FmodApi>>,
    system: Option<SystemPtr>,
    initialized: bool,
}

/// Owns the process-wide playback system.
pub(crate) struct SystemManager {
    loader: FmodLibraryLoader,
    inner: Mutex<SystemInner>,
}

impl SystemManager {
    pub(crate) fn new(loader: FmodLibraryLoader) -> Self {
        Self {
            loader,
            inner: Mutex::new(SystemInner::default()),
        }
    }

    /// Loads the library, creates and configures the native system.
    ///
    /// Fails with [`EngineError::AlreadyInitialized`] when called twice;
    /// under concurrent callers exactly one initialization succeeds.
    pub(crate) fn initialize(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().expect("system lock poisoned");
        if inner.initialized {
            return Err(EngineError::AlreadyInitialized);
        }

        let api = Arc::new(self.loader.load()?);

        let (code, system) = api.system_create();
        if code != ffi::FMOD_OK {
            return Err(error::engine_error(code, "create audio system"));
        }

        configure_for_playback(&api, system);

        let code = api.system_init(system, MAX_CHANNELS, ffi::FMOD_INIT_NORMAL);
        if code != ffi::FMOD_OK {
            let release_code = api.system_release(system);
            if release_code != ffi::FMOD_OK {
                warn!(
                    code = %error::describe(release_code),
                    "error releasing audio system after failed init",
                );
            }
            return Err(error::engine_error(code, "initialize audio system"));
        }

        inner.api = Some(Arc::clone(&api));
        inner.system = Some(system);
        inner.initialized = true;
        drop(inner);

        debug!(
            version = %self.version_info(),
            buffers = %self.buffer_info(),
            format = %self.format_info(),
            "audio system initialized",
        );
        Ok(())
    }

    /// Pumps the native system. Safe in any state; no-op when uninitialized.
    pub(crate) fn update(&self) {
        let inner = self.inner.lock().expect("system lock poisoned");
        if let (true, Some(api), Some(system)) = (inner.initialized, &inner.api, inner.system) {
            api.system_update(system);
        }
    }

    /// Releases the native system. Idempotent.
    pub(crate) fn shutdown(&self) {
        let mut inner = self.inner.lock().expect("system lock poisoned");
        if !inner.initialized {
            return;
        }
        if let (Some(api), Some(system)) = (&inner.api, inner.system) {
            let code = api.system_release(system);
            if code != ffi::FMOD_OK {
                warn!(code = %error::describe(code), "error releasing audio system");
            }
        }
        inner.api = None;
        inner.system = None;
        inner.initialized = false;
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.inner.lock().expect("system lock poisoned").initialized
    }

    /// The resolved symbol table, once initialized.
    pub(crate) fn api(&self) -> Option<Arc<FmodApi>> {
        self.inner.lock().expect("system lock poisoned").api.clone()
    }

    /// The native system pointer, once initialized.
    pub(crate) fn system(&self) -> Option<SystemPtr> {
        self.inner.lock().expect("system lock poisoned").system
    }

    /// Library version as `major.minor.patch (build n)`, or `""` when not
    /// initialized.
    pub(crate) fn version_info(&self) -> String {
        let inner = self.inner.lock().expect("system lock poisoned");
        let (Some(api), Some(system)) = (&inner.api, inner.system) else {
            return String::new();
        };
        let (code, version, build) = api.system_get_version(system);
        if code != ffi::FMOD_OK {
            return String::new();
        }
        format!(
            "{}.{}.{} (build {build})",
            (version >> 16) & 0xFFFF,
            (version >> 8) & 0xFF,
            version & 0xFF,
        )
    }

    /// DSP buffer configuration as `N samples x M buffers`, or `""` when not
    /// initialized.
    pub(crate) fn buffer_info(&self) -> String {
        let inner = self.inner.lock().expect("system lock poisoned");
        let (Some(api), Some(system)) = (&inner.api, inner.system) else {
            return String::new();
        };
        let (code, buffer_length, num_buffers) = api.system_get_dsp_buffer_size(system);
        if code != ffi::FMOD_OK {
            return String::new();
        }
        format!("{buffer_length} samples x {num_buffers} buffers")
    }

    /// Software format as `R Hz, speaker mode: S`, or `""` when not
    /// initialized.
    pub(crate) fn format_info(&self) -> String {
        let inner = self.inner.lock().expect("system lock poisoned");
        let (Some(api), Some(system)) = (&inner.api, inner.system) else {
            return String::new();
        };
        let (code, sample_rate, speaker_mode, _raw_speakers) =
            api.system_get_software_format(system);
        if code != ffi::FMOD_OK {
            return String::new();
        }
        format!("{sample_rate} Hz, speaker mode: {speaker_mode}")
    }
}

/// Applies the low-latency playback configuration. Configuration failures
/// are logged, not fatal: the system still works with native defaults.
fn configure_for_playback(api: &FmodApi, system: SystemPtr) {
    let code = api.system_set_dsp_buffer_size(system, DSP_BUFFER_LENGTH, DSP_NUM_BUFFERS);
    if code != ffi::FMOD_OK {
        warn!(
            code = %error::describe(code),
            "could not set DSP buffer size for low latency",
        );
    }

    let code =
        api.system_set_software_format(system, OUTPUT_SAMPLE_RATE, ffi::FMOD_SPEAKERMODE_MONO, 0);
    if code != ffi::FMOD_OK {
        warn!(code = %error::describe(code), "could not set software format");
    }
}

#[cfg(test)]
mod tests {
    use super::SystemManager;
    use crate::config::{AudioConfig, LoadingMode};
    use crate::loader::FmodLibraryLoader;
    use std::path::PathBuf;

    fn unloadable_manager() -> SystemManager {
        // Points at a path that cannot exist so initialize() fails before
        // any native call.
        let config = AudioConfig {
            loading_mode: LoadingMode::Unpackaged,
            library_path: Some(PathBuf::from("/nonexistent/libfmod.so")),
            ..AudioConfig::default()
        };
        SystemManager::new(FmodLibraryLoader::new(&config))
    }

    #[test]
    fn info_strings_are_empty_before_initialization() {
        let manager = unloadable_manager();
        assert!(!manager.is_initialized());
        assert_eq!(manager.version_info(), "");
        assert_eq!(manager.buffer_info(), "");
        assert_eq!(manager.format_info(), "");
    }

    #[test]
    fn update_and_shutdown_are_safe_when_uninitialized() {
        let manager = unloadable_manager();
        manager.update();
        manager.shutdown();
        manager.shutdown();
        assert!(!manager.is_initialized());
    }

    #[test]
    fn failed_initialize_leaves_the_manager_uninitialized() {
        let manager = unloadable_manager();
        assert!(manager.initialize().is_err());
        assert!(!manager.is_initialized());
        assert!(manager.api().is_none());
        assert!(manager.system().is_none());
    }
}
