use serde::{Deserialize, Serialize};

/// Static properties of a loaded audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMetadata {
    /// Source sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, ...).
    pub channel_count: u32,
    /// Bits per sample as stored in the source.
    pub bits_per_sample: u32,
    /// Container/codec tag, e.g. `"WAV"` or `"FLAC"`; `"Unknown"` otherwise.
    pub format: String,
    /// Total length in PCM frames.
    pub frame_count: u64,
    /// Duration in seconds.
    pub duration_seconds: f64,
}
