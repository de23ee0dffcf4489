//! Locates and loads the native FMOD library.
//!
//! Packaged installs resolve the library by short name through the OS
//! loader's search path. Unpackaged (development) installs load it from a
//! configured file or directory, falling back to the in-tree `native/fmod`
//! directory. The logging variant swaps in the `fmodL` build.

use std::path::{Path, PathBuf};

use libloading::Library;
use tracing::debug;

use wavenote_audio::EngineError;

use crate::config::{AudioConfig, LibraryVariant, LoadingMode};
use crate::ffi::FmodApi;

/// In-tree location of the unpackaged libraries, relative to the working
/// directory.
const DEVELOPMENT_DIR: &str = "native/fmod";

/// Loader for the native decoder/mixer library.
#[derive(Debug, Clone)]
pub struct FmodLibraryLoader {
    loading_mode: LoadingMode,
    library_type: LibraryVariant,
    library_path: Option<PathBuf>,
}

impl FmodLibraryLoader {
    /// Builds a loader from the engine configuration.
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            loading_mode: config.loading_mode,
            library_type: config.library_type,
            library_path: config.library_path.clone(),
        }
    }

    /// Loads the library and resolves the full symbol table.
    pub(crate) fn load(&self) -> Result<FmodApi, EngineError> {
        let library = match self.loading_mode {
            LoadingMode::Packaged => self.load_packaged()?,
            LoadingMode::Unpackaged => self.load_unpackaged()?,
        };
        FmodApi::from_library(library)
    }

    /// Platform filename of the configured library variant.
    pub fn library_filename(&self) -> &'static str {
        platform_filename(self.library_type)
    }

    /// Short library name used for packaged resolution.
    pub fn system_library_name(&self) -> &'static str {
        match self.library_type {
            LibraryVariant::Standard => "fmod",
            LibraryVariant::Logging => "fmodL",
        }
    }

    fn load_packaged(&self) -> Result<Library, EngineError> {
        let name = libloading::library_filename(self.system_library_name());
        debug!(library = ?name, "loading audio library from system library path");
        // SAFETY: loading a foreign library and running its initializers is
        // inherently unsafe; the FMOD distribution is trusted here.
        unsafe { Library::new(&name) }.map_err(|source| EngineError::LibraryLoad {
            source: Box::new(source),
        })
    }

    fn load_unpackaged(&self) -> Result<Library, EngineError> {
        let path = self.resolve_unpackaged_path()?;
        debug!(path = %path.display(), "loading audio library from unpackaged path");
        // SAFETY: see `load_packaged`.
        unsafe { Library::new(&path) }.map_err(|source| EngineError::LibraryLoad {
            source: Box::new(source),
        })
    }

    fn resolve_unpackaged_path(&self) -> Result<PathBuf, EngineError> {
        if let Some(configured) = &self.library_path {
            let candidate = if configured.is_dir() {
                configured.join(self.library_filename())
            } else {
                configured.clone()
            };
            if candidate.exists() {
                return Ok(candidate);
            }
            return Err(EngineError::LibraryNotFound { path: candidate });
        }

        let fallback = Path::new(DEVELOPMENT_DIR).join(self.library_filename());
        if fallback.exists() {
            Ok(fallback)
        } else {
            Err(EngineError::LibraryNotFound { path: fallback })
        }
    }
}

fn platform_filename(variant: LibraryVariant) -> &'static str {
    if cfg!(target_os = "macos") {
        match variant {
            LibraryVariant::Standard => "libfmod.dylib",
            LibraryVariant::Logging => "libfmodL.dylib",
        }
    } else if cfg!(target_os = "windows") {
        match variant {
            LibraryVariant::Standard => "fmod.dll",
            LibraryVariant::Logging => "fmodL.dll",
        }
    } else {
        match variant {
            LibraryVariant::Standard => "libfmod.so",
            LibraryVariant::Logging => "libfmodL.so",
        }
    }
}
