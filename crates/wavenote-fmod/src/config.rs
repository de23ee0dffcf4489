//! Audio engine configuration.
//!
//! Defaults suit a packaged desktop install; the environment variables
//! `WAVENOTE_AUDIO_LOADING_MODE`, `WAVENOTE_AUDIO_LIBRARY_TYPE` and
//! `WAVENOTE_AUDIO_LIBRARY_PATH` override them for development and CI.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// How the native decoder/mixer library is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingMode {
    /// Resolve the library by name from the OS library path.
    #[default]
    Packaged,
    /// Load the library from a filesystem path (development/testing).
    Unpackaged,
}

impl FromStr for LoadingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "packaged" => Ok(Self::Packaged),
            "unpackaged" => Ok(Self::Unpackaged),
            other => Err(format!("unknown loading mode: {other}")),
        }
    }
}

/// Which variant of the native library to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryVariant {
    /// Release library.
    #[default]
    Standard,
    /// Diagnostic library with verbose native logging.
    Logging,
}

impl FromStr for LibraryVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "logging" => Ok(Self::Logging),
            other => Err(format!("unknown library type: {other}")),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Library resolution strategy.
    pub loading_mode: LoadingMode,
    /// Library variant to load.
    pub library_type: LibraryVariant,
    /// Library file (or directory containing it) for unpackaged mode.
    pub library_path: Option<PathBuf>,
    /// Progress callback interval in milliseconds.
    pub progress_interval_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            loading_mode: LoadingMode::default(),
            library_type: LibraryVariant::default(),
            library_path: None,
            progress_interval_ms: 100,
        }
    }
}

impl AudioConfig {
    /// Progress callback interval as a [`Duration`].
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Defaults overridden by `WAVENOTE_AUDIO_*` environment variables.
    ///
    /// Invalid values are logged and replaced by the default rather than
    /// failing startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("WAVENOTE_AUDIO_LOADING_MODE") {
            match raw.parse() {
                Ok(mode) => config.loading_mode = mode,
                Err(_) => warn!(value = %raw, "invalid audio loading mode, using PACKAGED"),
            }
        }
        if let Ok(raw) = std::env::var("WAVENOTE_AUDIO_LIBRARY_TYPE") {
            match raw.parse() {
                Ok(variant) => config.library_type = variant,
                Err(_) => warn!(value = %raw, "invalid audio library type, using STANDARD"),
            }
        }
        if let Ok(raw) = std::env::var("WAVENOTE_AUDIO_LIBRARY_PATH") {
            if !raw.is_empty() {
                config.library_path = Some(PathBuf::from(raw));
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::{AudioConfig, LibraryVariant, LoadingMode};

    #[test]
    fn defaults_are_packaged_standard_100ms() {
        let config = AudioConfig::default();
        assert_eq!(config.loading_mode, LoadingMode::Packaged);
        assert_eq!(config.library_type, LibraryVariant::Standard);
        assert!(config.library_path.is_none());
        assert_eq!(config.progress_interval().as_millis(), 100);
    }

    #[test]
    fn modes_parse_case_insensitively() {
        assert_eq!("PACKAGED".parse(), Ok(LoadingMode::Packaged));
        assert_eq!("Unpackaged".parse(), Ok(LoadingMode::Unpackaged));
        assert!("sideloaded".parse::<LoadingMode>().is_err());

        assert_eq!("standard".parse(), Ok(LibraryVariant::Standard));
        assert_eq!("LOGGING".parse(), Ok(LibraryVariant::Logging));
        assert!("debug".parse::<LibraryVariant>().is_err());
    }

    #[test]
    fn deserializes_from_the_settings_file_form() {
        let config: AudioConfig = serde_json::from_str(
            r#"{
                "loading_mode": "unpackaged",
                "library_type": "logging",
                "library_path": "/opt/fmod/lib",
                "progress_interval_ms": 250
            }"#,
        )
        .expect("deserialization failed");
        assert_eq!(config.loading_mode, LoadingMode::Unpackaged);
        assert_eq!(config.library_type, LibraryVariant::Logging);
        assert_eq!(
            config.library_path.as_deref(),
            Some(std::path::Path::new("/opt/fmod/lib")),
        );
        assert_eq!(config.progress_interval().as_millis(), 250);
    }

    #[test]
    fn missing_settings_fall_back_to_defaults() {
        let config: AudioConfig =
            serde_json::from_str("{}").expect("deserialization failed");
        assert_eq!(config.loading_mode, LoadingMode::Packaged);
        assert_eq!(config.library_type, LibraryVariant::Standard);
        assert_eq!(config.progress_interval().as_millis(), 100);
    }
}
