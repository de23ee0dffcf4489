//! Bulk sample reads for waveform rendering.
//!
//! The reader decodes whole files into memory (`FMOD_CREATESAMPLE`) on its
//! own private native system, normalizes the PCM to `f64`, caches the result
//! per path and serves random-range reads straight from the cache. Reads run
//! on the blocking pool; the cache critical section is synchronous.
//!
//! The reader must never share the playback engine's system: decoding a
//! large file would contend with the mixer.

use std::collections::HashMap;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use wavenote_audio::{AudioData, AudioMetadata, ReadError};

use crate::error;
use crate::ffi::{self, FmodApi, SoundPtr, SystemPtr};
use crate::loader::FmodLibraryLoader;

/// Channels for the private decode system; nothing is ever played on it.
const READER_CHANNELS: i32 = 32;

struct CachedAudio {
    samples: Vec<f64>,
    metadata: AudioMetadata,
}

struct ReaderInner {
    api: Arc<FmodApi>,
    system: SystemPtr,
    cache: Mutex<HashMap<PathBuf, Arc<CachedAudio>>>,
    closed: AtomicBool,
}

/// Whole-file decoder with a per-path cache.
pub struct SampleReader {
    inner: Arc<ReaderInner>,
}

impl SampleReader {
    /// Creates the reader with its own minimally initialized native system.
    pub fn new(loader: &FmodLibraryLoader) -> Result<Self, ReadError> {
        let api = Arc::new(loader.load()?);

        let (code, system) = api.system_create();
        if code != ffi::FMOD_OK {
            return Err(error::engine_error(code, "create sample reader system").into());
        }

        let code = api.system_init(system, READER_CHANNELS, ffi::FMOD_INIT_NORMAL);
        if code != ffi::FMOD_OK {
            let release_code = api.system_release(system);
            if release_code != ffi::FMOD_OK {
                warn!(
                    code = %error::describe(release_code),
                    "error releasing sample reader system after failed init",
                );
            }
            return Err(error::engine_error(code, "initialize sample reader system").into());
        }

        debug!("sample reader ready");
        Ok(Self {
            inner: Arc::new(ReaderInner {
                api,
                system,
                cache: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Reads `frame_count` frames starting at `start_frame`.
    ///
    /// Reads past EOF are truncated; a read starting at or beyond EOF yields
    /// an empty block that preserves the requested start frame.
    pub async fn read_samples(
        &self,
        path: &Path,
        start_frame: i64,
        frame_count: i64,
    ) -> Result<AudioData, ReadError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(ReadError::Closed);
        }
        if start_frame < 0 || frame_count < 0 {
            return Err(ReadError::NegativeRange {
                start: start_frame,
                count: frame_count,
            });
        }

        let inner = Arc::clone(&self.inner);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let cached = inner.load_or_cached(&path)?;
            Ok(read_from_cache(&cached, start_frame as u64, frame_count as u64))
        })
        .await
        .map_err(|_| ReadError::TaskFailed)?
    }

    /// Metadata for `path`, decoding and caching the file on first use.
    pub async fn metadata(&self, path: &Path) -> Result<AudioMetadata, ReadError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(ReadError::Closed);
        }

        let inner = Arc::clone(&self.inner);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let cached = inner.load_or_cached(&path)?;
            Ok(cached.metadata.clone())
        })
        .await
        .map_err(|_| ReadError::TaskFailed)?
    }

    /// Drops the cache and releases the private system. Idempotent; waits
    /// for an in-flight decode before releasing.
    pub fn close(&self) {
        if self
            .inner
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let mut cache = self.inner.cache.lock().expect("sample cache lock poisoned");
        cache.clear();
        drop(cache);

        let code = self.inner.api.system_release(self.inner.system);
        if code != ffi::FMOD_OK {
            warn!(code = %error::describe(code), "error releasing sample reader system");
        } else {
            debug!("released sample reader system");
        }
    }
}

impl Drop for SampleReader {
    fn drop(&mut self) {
        // Last handle going away closes the reader; clones share the inner.
        if Arc::strong_count(&self.inner) == 1 {
            self.close();
        }
    }
}

impl ReaderInner {
    fn load_or_cached(&self, path: &Path) -> Result<Arc<CachedAudio>, ReadError> {
        let mut cache = self.cache.lock().expect("sample cache lock poisoned");
        if self.closed.load(Ordering::Acquire) {
            return Err(ReadError::Closed);
        }
        if let Some(cached) = cache.get(path) {
            return Ok(Arc::clone(cached));
        }

        self.api.system_update(self.system);

        let absolute = std::path::absolute(path).map_err(|source| ReadError::PathResolution {
            path: path.to_path_buf(),
            source,
        })?;
        let c_path = path_to_cstring(&absolute)?;

        let (code, sound) = self
            .api
            .system_create_sound(self.system, &c_path, ffi::FMOD_CREATESAMPLE);
        if code != ffi::FMOD_OK {
            return Err(ReadError::Native {
                action: "open audio file",
                path: path.to_path_buf(),
                code,
            });
        }

        let outcome = self.decode_sound(sound, path);

        let code = self.api.sound_release(sound);
        if code != ffi::FMOD_OK {
            warn!(code = %error::describe(code), "error releasing decoded sound");
        }

        let cached = Arc::new(outcome?);
        cache.insert(path.to_path_buf(), Arc::clone(&cached));
        debug!(
            path = %path.display(),
            frames = cached.metadata.frame_count,
            "decoded and cached audio file",
        );
        Ok(cached)
    }

    fn decode_sound(&self, sound: SoundPtr, path: &Path) -> Result<CachedAudio, ReadError> {
        let native_failure = |action, code| ReadError::Native {
            action,
            path: path.to_path_buf(),
            code,
        };

        let (code, _sound_type, _sample_format, channels, bits) = self.api.sound_get_format(sound);
        if code != ffi::FMOD_OK {
            return Err(native_failure("get sound format", code));
        }

        let (code, frequency, _priority) = self.api.sound_get_defaults(sound);
        if code != ffi::FMOD_OK {
            return Err(native_failure("get sample rate", code));
        }

        let (code, total_frames) = self.api.sound_get_length(sound, ffi::FMOD_TIMEUNIT_PCM);
        if code != ffi::FMOD_OK {
            return Err(native_failure("get sound length", code));
        }

        let (code, length_ms) = self.api.sound_get_length(sound, ffi::FMOD_TIMEUNIT_MS);
        if code != ffi::FMOD_OK {
            return Err(native_failure("get duration", code));
        }

        let sample_rate = frequency.round().max(0.0) as u32;
        let channel_count = channels.max(0) as u32;
        let bits = bits.max(0) as u32;
        if !matches!(bits, 16 | 24 | 32) {
            return Err(ReadError::UnsupportedBitDepth { bits });
        }
        let bytes_per_sample = bits / 8;

        let total_bytes = u64::from(total_frames)
            * u64::from(channel_count)
            * u64::from(bytes_per_sample);
        let total_bytes = total_bytes.min(u64::from(u32::MAX)) as u32;

        let (code, region) = self.api.sound_lock(sound, 0, total_bytes);
        if code != ffi::FMOD_OK {
            return Err(native_failure("lock sound data", code));
        }

        let mut buffer = vec![0u8; region.len1 as usize + region.len2 as usize];
        if region.len1 > 0 && !region.ptr1.is_null() {
            // SAFETY: while locked, ptr1 points at len1 readable bytes.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    region.ptr1.cast::<u8>(),
                    buffer.as_mut_ptr(),
                    region.len1 as usize,
                );
            }
        }
        if region.len2 > 0 && !region.ptr2.is_null() {
            // SAFETY: while locked, ptr2 points at len2 readable bytes.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    region.ptr2.cast::<u8>(),
                    buffer.as_mut_ptr().add(region.len1 as usize),
                    region.len2 as usize,
                );
            }
        }

        let code = self.api.sound_unlock(sound, region);
        if code != ffi::FMOD_OK {
            warn!(code = %error::describe(code), "error unlocking sound data");
        }

        let samples = convert_samples(&buffer, bits)?;

        let layout = if channel_count == 1 { "Mono" } else { "Stereo" };
        let metadata = AudioMetadata {
            sample_rate,
            channel_count,
            bits_per_sample: bits,
            format: format!("{sample_rate} Hz, {bits} bit, {layout}"),
            frame_count: u64::from(total_frames),
            duration_seconds: f64::from(length_ms) / 1000.0,
        };

        Ok(CachedAudio { samples, metadata })
    }
}

impl Drop for ReaderInner {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            let code = self.api.system_release(self.system);
            if code != ffi::FMOD_OK {
                warn!(code = %error::describe(code), "error releasing sample reader system");
            }
        }
    }
}

/// Serves a range read from the decoded cache entry.
fn read_from_cache(cached: &CachedAudio, start_frame: u64, frame_count: u64) -> AudioData {
    let metadata = &cached.metadata;
    let channels = u64::from(metadata.channel_count);
    let total_frames = metadata.frame_count;

    if start_frame >= total_frames {
        return AudioData::empty(metadata.sample_rate, metadata.channel_count, start_frame);
    }

    let actual_frames = frame_count.min(total_frames - start_frame);
    if actual_frames == 0 {
        return AudioData::empty(metadata.sample_rate, metadata.channel_count, start_frame);
    }

    let from = (start_frame * channels) as usize;
    let to = ((start_frame + actual_frames) * channels) as usize;
    AudioData::new(
        cached.samples[from..to].to_vec(),
        metadata.sample_rate,
        metadata.channel_count,
        start_frame,
        actual_frames,
    )
}

/// Converts little-endian signed PCM into normalized `f64` samples.
fn convert_samples(buffer: &[u8], bits: u32) -> Result<Vec<f64>, ReadError> {
    match bits {
        16 => Ok(buffer
            .chunks_exact(2)
            .map(|bytes| f64::from(i16::from_le_bytes([bytes[0], bytes[1]])) / 32_768.0)
            .collect()),
        24 => Ok(buffer
            .chunks_exact(3)
            .map(|bytes| {
                let raw = i32::from(bytes[0])
                    | (i32::from(bytes[1]) << 8)
                    | (i32::from(bytes[2] as i8) << 16);
                f64::from(raw) / 8_388_608.0
            })
            .collect()),
        32 => Ok(buffer
            .chunks_exact(4)
            .map(|bytes| {
                f64::from(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
                    / 2_147_483_648.0
            })
            .collect()),
        other => Err(ReadError::UnsupportedBitDepth { bits: other }),
    }
}

fn path_to_cstring(path: &Path) -> Result<CString, ReadError> {
    let text = path.to_str().ok_or_else(|| ReadError::PathResolution {
        path: path.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "path is not valid UTF-8",
        ),
    })?;
    CString::new(text).map_err(|_| ReadError::PathResolution {
        path: path.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "path contains an interior NUL byte",
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::{convert_samples, read_from_cache, CachedAudio};
    use wavenote_audio::{AudioMetadata, ReadError};

    fn cached(channel_count: u32, frame_count: u64) -> CachedAudio {
        let samples = (0..channel_count as u64 * frame_count)
            .map(|index| index as f64 / 1_000.0)
            .collect();
        CachedAudio {
            samples,
            metadata: AudioMetadata {
                sample_rate: 48_000,
                channel_count,
                bits_per_sample: 16,
                format: "48000 Hz, 16 bit, Mono".to_string(),
                frame_count,
                duration_seconds: frame_count as f64 / 48_000.0,
            },
        }
    }

    #[test]
    fn sixteen_bit_samples_normalize_to_unit_range() {
        let buffer = [
            0x00, 0x00, // 0
            0xFF, 0x7F, // i16::MAX
            0x00, 0x80, // i16::MIN
        ];
        let samples = convert_samples(&buffer, 16).expect("conversion failed");
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - (32_767.0 / 32_768.0)).abs() < 1e-12);
        assert_eq!(samples[2], -1.0);
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn twenty_four_bit_samples_sign_extend() {
        let buffer = [
            0xFF, 0xFF, 0x7F, // max positive
            0x00, 0x00, 0x80, // min negative
            0x01, 0x00, 0x00, // smallest positive step
        ];
        let samples = convert_samples(&buffer, 24).expect("conversion failed");
        assert!((samples[0] - (8_388_607.0 / 8_388_608.0)).abs() < 1e-12);
        assert_eq!(samples[1], -1.0);
        assert!((samples[2] - 1.0 / 8_388_608.0).abs() < 1e-15);
    }

    #[test]
    fn thirty_two_bit_samples_normalize() {
        let buffer = i32::MIN.to_le_bytes();
        let samples = convert_samples(&buffer, 32).expect("conversion failed");
        assert_eq!(samples, vec![-1.0]);
    }

    #[test]
    fn unsupported_depths_are_rejected() {
        assert!(matches!(
            convert_samples(&[0, 0], 8),
            Err(ReadError::UnsupportedBitDepth { bits: 8 }),
        ));
    }

    #[test]
    fn range_reads_preserve_interleaving() {
        let cached = cached(2, 100);
        let data = read_from_cache(&cached, 10, 5);
        assert_eq!(data.start_frame(), 10);
        assert_eq!(data.frame_count(), 5);
        assert_eq!(
            data.samples().len() as u64,
            u64::from(data.channel_count()) * data.frame_count(),
        );
        // First sample of frame 10 in a 2-channel stream is element 20.
        assert_eq!(data.samples()[0], 20.0 / 1_000.0);
    }

    #[test]
    fn reads_truncate_at_eof() {
        let cached = cached(1, 100);
        let data = read_from_cache(&cached, 90, 50);
        assert_eq!(data.frame_count(), 10);
        assert_eq!(data.start_frame(), 90);
    }

    #[test]
    fn reads_past_eof_yield_an_empty_block() {
        let cached = cached(1, 100);
        let data = read_from_cache(&cached, 250, 10);
        assert_eq!(data.frame_count(), 0);
        assert_eq!(data.start_frame(), 250);
        assert!(data.samples().is_empty());

        let zero = read_from_cache(&cached, 10, 0);
        assert_eq!(zero.frame_count(), 0);
        assert_eq!(zero.start_frame(), 10);
    }
}
