#![deny(clippy::wildcard_imports)]

//! FMOD-backed audio engine for the wavenote backend.
//!
//! The crate layers, leaves first: the library loader resolves and loads the
//! native decoder/mixer; the system manager owns the native system; handle
//! lifecycle tracks generation-based validity; the loading and playback
//! managers own the current sound and channel exclusively; the listener
//! manager monitors progress on a timer thread; and [`AudioEngine`] ties the
//! stack together behind one operation-locked facade. [`SampleReader`]
//! stands apart on its own native system, serving bulk waveform reads.
//!
//! The native library is loaded at runtime (see [`FmodLibraryLoader`]), so
//! constructing an engine requires an FMOD distribution on this machine.

pub mod config;
mod engine;
mod engine_state;
mod error;
mod ffi;
mod handle;
mod listeners;
mod loader;
mod loading;
mod playback;
mod playback_state;
mod sample_reader;
mod system;

pub use config::{AudioConfig, LibraryVariant, LoadingMode};
pub use engine::AudioEngine;
pub use handle::{FmodAudioHandle, FmodPlaybackHandle};
pub use loader::FmodLibraryLoader;
pub use sample_reader::SampleReader;
