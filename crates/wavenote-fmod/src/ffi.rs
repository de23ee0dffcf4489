//! Raw surface over the FMOD Core C API.
//!
//! Symbols are resolved once from the dynamically loaded library and stored
//! as plain function pointers next to the owning [`Library`], so the
//! pointers stay valid for the lifetime of [`FmodApi`]. Result codes are
//! returned untranslated; mapping to error kinds happens in [`crate::error`].
//!
//! Constants are taken from `fmod_common.h` of FMOD 2.03.

use std::ffi::{c_char, c_float, c_int, c_uint, c_void, CStr};

use libloading::Library;

use wavenote_audio::EngineError;

/// Packed FMOD version word this binding targets (2.03.09).
pub(crate) const FMOD_VERSION: c_uint = 0x0002_0309;

// Result codes (FMOD_RESULT).
pub(crate) const FMOD_OK: c_int = 0;
pub(crate) const FMOD_ERR_BADCOMMAND: c_int = 1;
pub(crate) const FMOD_ERR_CHANNEL_ALLOC: c_int = 2;
pub(crate) const FMOD_ERR_CHANNEL_STOLEN: c_int = 3;
pub(crate) const FMOD_ERR_DMA: c_int = 4;
pub(crate) const FMOD_ERR_DSP_CONNECTION: c_int = 5;
pub(crate) const FMOD_ERR_DSP_DONTPROCESS: c_int = 6;
pub(crate) const FMOD_ERR_DSP_FORMAT: c_int = 7;
pub(crate) const FMOD_ERR_DSP_INUSE: c_int = 8;
pub(crate) const FMOD_ERR_DSP_NOTFOUND: c_int = 9;
pub(crate) const FMOD_ERR_DSP_RESERVED: c_int = 10;
pub(crate) const FMOD_ERR_DSP_SILENCE: c_int = 11;
pub(crate) const FMOD_ERR_DSP_TYPE: c_int = 12;
pub(crate) const FMOD_ERR_FILE_BAD: c_int = 13;
pub(crate) const FMOD_ERR_FILE_COULDNOTSEEK: c_int = 14;
pub(crate) const FMOD_ERR_FILE_DISKEJECTED: c_int = 15;
pub(crate) const FMOD_ERR_FILE_EOF: c_int = 16;
pub(crate) const FMOD_ERR_FILE_ENDOFDATA: c_int = 17;
pub(crate) const FMOD_ERR_FILE_NOTFOUND: c_int = 18;
pub(crate) const FMOD_ERR_FORMAT: c_int = 19;
pub(crate) const FMOD_ERR_HEADER_MISMATCH: c_int = 20;
pub(crate) const FMOD_ERR_HTTP: c_int = 21;
pub(crate) const FMOD_ERR_HTTP_ACCESS: c_int = 22;
pub(crate) const FMOD_ERR_HTTP_PROXY_AUTH: c_int = 23;
pub(crate) const FMOD_ERR_HTTP_SERVER_ERROR: c_int = 24;
pub(crate) const FMOD_ERR_HTTP_TIMEOUT: c_int = 25;
pub(crate) const FMOD_ERR_INITIALIZATION: c_int = 26;
pub(crate) const FMOD_ERR_INITIALIZED: c_int = 27;
pub(crate) const FMOD_ERR_INTERNAL: c_int = 28;
pub(crate) const FMOD_ERR_INVALID_FLOAT: c_int = 29;
pub(crate) const FMOD_ERR_INVALID_HANDLE: c_int = 30;
pub(crate) const FMOD_ERR_INVALID_PARAM: c_int = 31;
pub(crate) const FMOD_ERR_INVALID_POSITION: c_int = 32;
pub(crate) const FMOD_ERR_INVALID_SPEAKER: c_int = 33;
pub(crate) const FMOD_ERR_INVALID_SYNCPOINT: c_int = 34;
pub(crate) const FMOD_ERR_INVALID_THREAD: c_int = 35;
pub(crate) const FMOD_ERR_INVALID_VECTOR: c_int = 36;
pub(crate) const FMOD_ERR_MAXAUDIBLE: c_int = 37;
pub(crate) const FMOD_ERR_MEMORY: c_int = 38;
pub(crate) const FMOD_ERR_MEMORY_CANTPOINT: c_int = 39;
pub(crate) const FMOD_ERR_NEEDS3D: c_int = 40;
pub(crate) const FMOD_ERR_NEEDSHARDWARE: c_int = 41;
pub(crate) const FMOD_ERR_NET_CONNECT: c_int = 42;
pub(crate) const FMOD_ERR_NET_SOCKET_ERROR: c_int = 43;
pub(crate) const FMOD_ERR_NET_URL: c_int = 44;
pub(crate) const FMOD_ERR_NET_WOULD_BLOCK: c_int = 45;
pub(crate) const FMOD_ERR_NOTREADY: c_int = 46;
pub(crate) const FMOD_ERR_OUTPUT_ALLOCATED: c_int = 47;
pub(crate) const FMOD_ERR_OUTPUT_CREATEBUFFER: c_int = 48;
pub(crate) const FMOD_ERR_OUTPUT_DRIVERCALL: c_int = 49;
pub(crate) const FMOD_ERR_OUTPUT_FORMAT: c_int = 50;
pub(crate) const FMOD_ERR_OUTPUT_INIT: c_int = 51;
pub(crate) const FMOD_ERR_OUTPUT_NODRIVERS: c_int = 52;
pub(crate) const FMOD_ERR_PLUGIN: c_int = 53;
pub(crate) const FMOD_ERR_PLUGIN_MISSING: c_int = 54;
pub(crate) const FMOD_ERR_PLUGIN_RESOURCE: c_int = 55;
pub(crate) const FMOD_ERR_PLUGIN_VERSION: c_int = 56;
pub(crate) const FMOD_ERR_RECORD: c_int = 57;
pub(crate) const FMOD_ERR_REVERB_CHANNELGROUP: c_int = 58;
pub(crate) const FMOD_ERR_REVERB_INSTANCE: c_int = 59;
pub(crate) const FMOD_ERR_SUBSOUNDS: c_int = 60;
pub(crate) const FMOD_ERR_SUBSOUND_ALLOCATED: c_int = 61;
pub(crate) const FMOD_ERR_SUBSOUND_CANTMOVE: c_int = 62;
pub(crate) const FMOD_ERR_TAGNOTFOUND: c_int = 63;
pub(crate) const FMOD_ERR_TOOMANYCHANNELS: c_int = 64;
pub(crate) const FMOD_ERR_TRUNCATED: c_int = 65;
pub(crate) const FMOD_ERR_UNIMPLEMENTED: c_int = 66;
pub(crate) const FMOD_ERR_UNINITIALIZED: c_int = 67;
pub(crate) const FMOD_ERR_UNSUPPORTED: c_int = 68;
pub(crate) const FMOD_ERR_VERSION: c_int = 69;
pub(crate) const FMOD_ERR_EVENT_ALREADY_LOADED: c_int = 70;
pub(crate) const FMOD_ERR_EVENT_LIVEUPDATE_BUSY: c_int = 71;
pub(crate) const FMOD_ERR_EVENT_LIVEUPDATE_MISMATCH: c_int = 72;
pub(crate) const FMOD_ERR_EVENT_LIVEUPDATE_TIMEOUT: c_int = 73;
pub(crate) const FMOD_ERR_EVENT_NOTFOUND: c_int = 74;
pub(crate) const FMOD_ERR_STUDIO_UNINITIALIZED: c_int = 75;
pub(crate) const FMOD_ERR_STUDIO_NOT_LOADED: c_int = 76;
pub(crate) const FMOD_ERR_INVALID_STRING: c_int = 77;
pub(crate) const FMOD_ERR_ALREADY_LOCKED: c_int = 78;
pub(crate) const FMOD_ERR_NOT_LOCKED: c_int = 79;
pub(crate) const FMOD_ERR_RECORD_DISCONNECTED: c_int = 80;
pub(crate) const FMOD_ERR_TOOMANYSAMPLES: c_int = 81;

// Mode flags (FMOD_MODE).
pub(crate) const FMOD_DEFAULT: c_uint = 0x0000_0000;
pub(crate) const FMOD_CREATESAMPLE: c_uint = 0x0000_0100;
pub(crate) const FMOD_ACCURATETIME: c_uint = 0x0000_4000;

// Init flags (FMOD_INITFLAGS).
pub(crate) const FMOD_INIT_NORMAL: c_uint = 0x0000_0000;

// Time units (FMOD_TIMEUNIT).
pub(crate) const FMOD_TIMEUNIT_MS: c_uint = 0x0000_0001;
pub(crate) const FMOD_TIMEUNIT_PCM: c_uint = 0x0000_0002;

// Speaker modes (FMOD_SPEAKERMODE).
pub(crate) const FMOD_SPEAKERMODE_MONO: c_int = 2;

// Sound types (FMOD_SOUND_TYPE), the subset the format tag mapping uses.
pub(crate) const FMOD_SOUND_TYPE_AIFF: c_int = 1;
pub(crate) const FMOD_SOUND_TYPE_FLAC: c_int = 4;
pub(crate) const FMOD_SOUND_TYPE_MPEG: c_int = 9;
pub(crate) const FMOD_SOUND_TYPE_OGGVORBIS: c_int = 10;
pub(crate) const FMOD_SOUND_TYPE_RAW: c_int = 12;
pub(crate) const FMOD_SOUND_TYPE_WAV: c_int = 15;
pub(crate) const FMOD_SOUND_TYPE_OPUS: c_int = 24;

/// Opaque FMOD system object.
#[repr(C)]
pub(crate) struct FmodSystem {
    _opaque: [u8; 0],
}

/// Opaque FMOD sound object.
#[repr(C)]
pub(crate) struct FmodSound {
    _opaque: [u8; 0],
}

/// Opaque FMOD channel object.
#[repr(C)]
pub(crate) struct FmodChannel {
    _opaque: [u8; 0],
}

/// Shareable pointer to an FMOD system.
///
/// FMOD Core entry points are internally synchronized, so the pointer may
/// cross threads; it is only ever dereferenced by the native library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SystemPtr(*mut FmodSystem);

// SAFETY: the FMOD Core API is thread-safe; the wrapped pointer is opaque
// and never dereferenced on the Rust side.
unsafe impl Send for SystemPtr {}
unsafe impl Sync for SystemPtr {}

impl SystemPtr {
    pub(crate) fn as_raw(self) -> *mut FmodSystem {
        self.0
    }
}

/// Shareable pointer to an FMOD sound. See [`SystemPtr`] for the rationale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SoundPtr(*mut FmodSound);

// SAFETY: see `SystemPtr`.
unsafe impl Send for SoundPtr {}
unsafe impl Sync for SoundPtr {}

impl SoundPtr {
    pub(crate) fn as_raw(self) -> *mut FmodSound {
        self.0
    }

    pub(crate) fn is_null(self) -> bool {
        self.0.is_null()
    }

    #[cfg(test)]
    pub(crate) fn dangling() -> Self {
        Self(std::ptr::null_mut())
    }
}

/// Shareable pointer to an FMOD channel. See [`SystemPtr`] for the rationale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChannelPtr(*mut FmodChannel);

// SAFETY: see `SystemPtr`.
unsafe impl Send for ChannelPtr {}
unsafe impl Sync for ChannelPtr {}

impl ChannelPtr {
    #[cfg(test)]
    pub(crate) fn dangling() -> Self {
        Self(std::ptr::null_mut())
    }
}

/// Locked PCM region returned by [`FmodApi::sound_lock`].
///
/// FMOD may split the region in two when the ring buffer wraps; `ptr2`/`len2`
/// cover the wrapped tail and are null/zero otherwise.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LockedRegion {
    pub(crate) ptr1: *mut c_void,
    pub(crate) ptr2: *mut c_void,
    pub(crate) len1: c_uint,
    pub(crate) len2: c_uint,
}

type SystemCreateFn = unsafe extern "C" fn(*mut *mut FmodSystem, c_uint) -> c_int;
type SystemInitFn = unsafe extern "C" fn(*mut FmodSystem, c_int, c_uint, *mut c_void) -> c_int;
type SystemUpdateFn = unsafe extern "C" fn(*mut FmodSystem) -> c_int;
type SystemReleaseFn = unsafe extern "C" fn(*mut FmodSystem) -> c_int;
type SystemSetDspBufferSizeFn = unsafe extern "C" fn(*mut FmodSystem, c_uint, c_int) -> c_int;
type SystemGetDspBufferSizeFn =
    unsafe extern "C" fn(*mut FmodSystem, *mut c_uint, *mut c_int) -> c_int;
type SystemSetSoftwareFormatFn =
    unsafe extern "C" fn(*mut FmodSystem, c_int, c_int, c_int) -> c_int;
type SystemGetSoftwareFormatFn =
    unsafe extern "C" fn(*mut FmodSystem, *mut c_int, *mut c_int, *mut c_int) -> c_int;
type SystemGetVersionFn = unsafe extern "C" fn(*mut FmodSystem, *mut c_uint, *mut c_uint) -> c_int;
type SystemCreateSoundFn = unsafe extern "C" fn(
    *mut FmodSystem,
    *const c_char,
    c_uint,
    *mut c_void,
    *mut *mut FmodSound,
) -> c_int;
type SystemPlaySoundFn = unsafe extern "C" fn(
    *mut FmodSystem,
    *mut FmodSound,
    *mut c_void,
    c_int,
    *mut *mut FmodChannel,
) -> c_int;
type SoundReleaseFn = unsafe extern "C" fn(*mut FmodSound) -> c_int;
type SoundGetFormatFn =
    unsafe extern "C" fn(*mut FmodSound, *mut c_int, *mut c_int, *mut c_int, *mut c_int) -> c_int;
type SoundGetDefaultsFn = unsafe extern "C" fn(*mut FmodSound, *mut c_float, *mut c_int) -> c_int;
type SoundGetLengthFn = unsafe extern "C" fn(*mut FmodSound, *mut c_uint, c_uint) -> c_int;
type SoundLockFn = unsafe extern "C" fn(
    *mut FmodSound,
    c_uint,
    c_uint,
    *mut *mut c_void,
    *mut *mut c_void,
    *mut c_uint,
    *mut c_uint,
) -> c_int;
type SoundUnlockFn =
    unsafe extern "C" fn(*mut FmodSound, *mut c_void, *mut c_void, c_uint, c_uint) -> c_int;
type ChannelStopFn = unsafe extern "C" fn(*mut FmodChannel) -> c_int;
type ChannelSetPausedFn = unsafe extern "C" fn(*mut FmodChannel, c_int) -> c_int;
type ChannelGetPausedFn = unsafe extern "C" fn(*mut FmodChannel, *mut c_int) -> c_int;
type ChannelSetPositionFn = unsafe extern "C" fn(*mut FmodChannel, c_uint, c_uint) -> c_int;
type ChannelGetPositionFn = unsafe extern "C" fn(*mut FmodChannel, *mut c_uint, c_uint) -> c_int;
type ChannelIsPlayingFn = unsafe extern "C" fn(*mut FmodChannel, *mut c_int) -> c_int;

struct RawApi {
    system_create: SystemCreateFn,
    system_init: SystemInitFn,
    system_update: SystemUpdateFn,
    system_release: SystemReleaseFn,
    system_set_dsp_buffer_size: SystemSetDspBufferSizeFn,
    system_get_dsp_buffer_size: SystemGetDspBufferSizeFn,
    system_set_software_format: SystemSetSoftwareFormatFn,
    system_get_software_format: SystemGetSoftwareFormatFn,
    system_get_version: SystemGetVersionFn,
    system_create_sound: SystemCreateSoundFn,
    system_play_sound: SystemPlaySoundFn,
    sound_release: SoundReleaseFn,
    sound_get_format: SoundGetFormatFn,
    sound_get_defaults: SoundGetDefaultsFn,
    sound_get_length: SoundGetLengthFn,
    sound_lock: SoundLockFn,
    sound_unlock: SoundUnlockFn,
    channel_stop: ChannelStopFn,
    channel_set_paused: ChannelSetPausedFn,
    channel_get_paused: ChannelGetPausedFn,
    channel_set_position: ChannelSetPositionFn,
    channel_get_position: ChannelGetPositionFn,
    channel_is_playing: ChannelIsPlayingFn,
}

/// Resolved FMOD Core symbol table.
///
/// Owns the loaded [`Library`] so the resolved function pointers stay valid
/// for the lifetime of this value.
pub(crate) struct FmodApi {
    raw: RawApi,
    _lib: Library,
}

fn resolve<T: Copy + 'static>(lib: &Library, name: &[u8]) -> Result<T, EngineError> {
    // SAFETY: the requested symbol's type is dictated by the FMOD Core ABI;
    // a mismatch would be a binding bug, not a runtime condition.
    let symbol = unsafe { lib.get::<T>(name) }.map_err(|source| EngineError::LibraryLoad {
        source: Box::new(source),
    })?;
    Ok(*symbol)
}

impl FmodApi {
    /// Resolves every required FMOD Core symbol from `lib`.
    pub(crate) fn from_library(lib: Library) -> Result<Self, EngineError> {
        let raw = RawApi {
            system_create: resolve(&lib, b"FMOD_System_Create\0")?,
            system_init: resolve(&lib, b"FMOD_System_Init\0")?,
            system_update: resolve(&lib, b"FMOD_System_Update\0")?,
            system_release: resolve(&lib, b"FMOD_System_Release\0")?,
            system_set_dsp_buffer_size: resolve(&lib, b"FMOD_System_SetDSPBufferSize\0")?,
            system_get_dsp_buffer_size: resolve(&lib, b"FMOD_System_GetDSPBufferSize\0")?,
            system_set_software_format: resolve(&lib, b"FMOD_System_SetSoftwareFormat\0")?,
            system_get_software_format: resolve(&lib, b"FMOD_System_GetSoftwareFormat\0")?,
            system_get_version: resolve(&lib, b"FMOD_System_GetVersion\0")?,
            system_create_sound: resolve(&lib, b"FMOD_System_CreateSound\0")?,
            system_play_sound: resolve(&lib, b"FMOD_System_PlaySound\0")?,
            sound_release: resolve(&lib, b"FMOD_Sound_Release\0")?,
            sound_get_format: resolve(&lib, b"FMOD_Sound_GetFormat\0")?,
            sound_get_defaults: resolve(&lib, b"FMOD_Sound_GetDefaults\0")?,
            sound_get_length: resolve(&lib, b"FMOD_Sound_GetLength\0")?,
            sound_lock: resolve(&lib, b"FMOD_Sound_Lock\0")?,
            sound_unlock: resolve(&lib, b"FMOD_Sound_Unlock\0")?,
            channel_stop: resolve(&lib, b"FMOD_Channel_Stop\0")?,
            channel_set_paused: resolve(&lib, b"FMOD_Channel_SetPaused\0")?,
            channel_get_paused: resolve(&lib, b"FMOD_Channel_GetPaused\0")?,
            channel_set_position: resolve(&lib, b"FMOD_Channel_SetPosition\0")?,
            channel_get_position: resolve(&lib, b"FMOD_Channel_GetPosition\0")?,
            channel_is_playing: resolve(&lib, b"FMOD_Channel_IsPlaying\0")?,
        };
        Ok(Self { raw, _lib: lib })
    }

    /// `FMOD_System_Create` with the binding's version word.
    pub(crate) fn system_create(&self) -> (c_int, SystemPtr) {
        let mut system: *mut FmodSystem = std::ptr::null_mut();
        // SAFETY: out pointer is a valid local; FMOD writes the new system.
        let code = unsafe { (self.raw.system_create)(&mut system, FMOD_VERSION) };
        (code, SystemPtr(system))
    }

    pub(crate) fn system_init(&self, system: SystemPtr, max_channels: c_int, flags: c_uint) -> c_int {
        // SAFETY: `system` came from a successful `system_create`.
        unsafe { (self.raw.system_init)(system.as_raw(), max_channels, flags, std::ptr::null_mut()) }
    }

    pub(crate) fn system_update(&self, system: SystemPtr) -> c_int {
        // SAFETY: `system` came from a successful `system_create`.
        unsafe { (self.raw.system_update)(system.as_raw()) }
    }

    pub(crate) fn system_release(&self, system: SystemPtr) -> c_int {
        // SAFETY: `system` came from a successful `system_create` and is not
        // used again after release.
        unsafe { (self.raw.system_release)(system.as_raw()) }
    }

    pub(crate) fn system_set_dsp_buffer_size(
        &self,
        system: SystemPtr,
        buffer_length: c_uint,
        num_buffers: c_int,
    ) -> c_int {
        // SAFETY: `system` came from a successful `system_create`.
        unsafe { (self.raw.system_set_dsp_buffer_size)(system.as_raw(), buffer_length, num_buffers) }
    }

    /// Returns `(code, buffer_length, num_buffers)`.
    pub(crate) fn system_get_dsp_buffer_size(&self, system: SystemPtr) -> (c_int, c_uint, c_int) {
        let mut buffer_length: c_uint = 0;
        let mut num_buffers: c_int = 0;
        // SAFETY: out pointers are valid locals.
        let code = unsafe {
            (self.raw.system_get_dsp_buffer_size)(
                system.as_raw(),
                &mut buffer_length,
                &mut num_buffers,
            )
        };
        (code, buffer_length, num_buffers)
    }

    pub(crate) fn system_set_software_format(
        &self,
        system: SystemPtr,
        sample_rate: c_int,
        speaker_mode: c_int,
        num_raw_speakers: c_int,
    ) -> c_int {
        // SAFETY: `system` came from a successful `system_create`.
        unsafe {
            (self.raw.system_set_software_format)(
                system.as_raw(),
                sample_rate,
                speaker_mode,
                num_raw_speakers,
            )
        }
    }

    /// Returns `(code, sample_rate, speaker_mode, num_raw_speakers)`.
    pub(crate) fn system_get_software_format(
        &self,
        system: SystemPtr,
    ) -> (c_int, c_int, c_int, c_int) {
        let mut sample_rate: c_int = 0;
        let mut speaker_mode: c_int = 0;
        let mut num_raw_speakers: c_int = 0;
        // SAFETY: out pointers are valid locals.
        let code = unsafe {
            (self.raw.system_get_software_format)(
                system.as_raw(),
                &mut sample_rate,
                &mut speaker_mode,
                &mut num_raw_speakers,
            )
        };
        (code, sample_rate, speaker_mode, num_raw_speakers)
    }

    /// Returns `(code, packed_version, build_number)`.
    pub(crate) fn system_get_version(&self, system: SystemPtr) -> (c_int, c_uint, c_uint) {
        let mut version: c_uint = 0;
        let mut build: c_uint = 0;
        // SAFETY: out pointers are valid locals.
        let code = unsafe { (self.raw.system_get_version)(system.as_raw(), &mut version, &mut build) };
        (code, version, build)
    }

    pub(crate) fn system_create_sound(
        &self,
        system: SystemPtr,
        path: &CStr,
        mode: c_uint,
    ) -> (c_int, SoundPtr) {
        let mut sound: *mut FmodSound = std::ptr::null_mut();
        // SAFETY: `path` is NUL-terminated, extended info is unused, and the
        // out pointer is a valid local.
        let code = unsafe {
            (self.raw.system_create_sound)(
                system.as_raw(),
                path.as_ptr(),
                mode,
                std::ptr::null_mut(),
                &mut sound,
            )
        };
        (code, SoundPtr(sound))
    }

    pub(crate) fn system_play_sound(
        &self,
        system: SystemPtr,
        sound: SoundPtr,
        paused: bool,
    ) -> (c_int, ChannelPtr) {
        let mut channel: *mut FmodChannel = std::ptr::null_mut();
        // SAFETY: `sound` came from a successful `system_create_sound` on
        // this system; the channel group is unused.
        let code = unsafe {
            (self.raw.system_play_sound)(
                system.as_raw(),
                sound.as_raw(),
                std::ptr::null_mut(),
                c_int::from(paused),
                &mut channel,
            )
        };
        (code, ChannelPtr(channel))
    }

    pub(crate) fn sound_release(&self, sound: SoundPtr) -> c_int {
        // SAFETY: `sound` came from a successful `system_create_sound` and is
        // not used again after release.
        unsafe { (self.raw.sound_release)(sound.as_raw()) }
    }

    /// Returns `(code, sound_type, sample_format, channels, bits)`.
    pub(crate) fn sound_get_format(&self, sound: SoundPtr) -> (c_int, c_int, c_int, c_int, c_int) {
        let mut sound_type: c_int = 0;
        let mut sample_format: c_int = 0;
        let mut channels: c_int = 0;
        let mut bits: c_int = 0;
        // SAFETY: out pointers are valid locals.
        let code = unsafe {
            (self.raw.sound_get_format)(
                sound.as_raw(),
                &mut sound_type,
                &mut sample_format,
                &mut channels,
                &mut bits,
            )
        };
        (code, sound_type, sample_format, channels, bits)
    }

    /// Returns `(code, frequency, priority)`.
    pub(crate) fn sound_get_defaults(&self, sound: SoundPtr) -> (c_int, c_float, c_int) {
        let mut frequency: c_float = 0.0;
        let mut priority: c_int = 0;
        // SAFETY: out pointers are valid locals.
        let code =
            unsafe { (self.raw.sound_get_defaults)(sound.as_raw(), &mut frequency, &mut priority) };
        (code, frequency, priority)
    }

    /// Returns `(code, length)` in the requested time unit.
    pub(crate) fn sound_get_length(&self, sound: SoundPtr, unit: c_uint) -> (c_int, c_uint) {
        let mut length: c_uint = 0;
        // SAFETY: out pointer is a valid local.
        let code = unsafe { (self.raw.sound_get_length)(sound.as_raw(), &mut length, unit) };
        (code, length)
    }

    pub(crate) fn sound_lock(
        &self,
        sound: SoundPtr,
        offset: c_uint,
        length: c_uint,
    ) -> (c_int, LockedRegion) {
        let mut region = LockedRegion {
            ptr1: std::ptr::null_mut(),
            ptr2: std::ptr::null_mut(),
            len1: 0,
            len2: 0,
        };
        // SAFETY: out pointers are valid locals; the locked region must be
        // returned through `sound_unlock` before the sound is released.
        let code = unsafe {
            (self.raw.sound_lock)(
                sound.as_raw(),
                offset,
                length,
                &mut region.ptr1,
                &mut region.ptr2,
                &mut region.len1,
                &mut region.len2,
            )
        };
        (code, region)
    }

    pub(crate) fn sound_unlock(&self, sound: SoundPtr, region: LockedRegion) -> c_int {
        // SAFETY: `region` was produced by a successful `sound_lock` on the
        // same sound.
        unsafe {
            (self.raw.sound_unlock)(
                sound.as_raw(),
                region.ptr1,
                region.ptr2,
                region.len1,
                region.len2,
            )
        }
    }

    pub(crate) fn channel_stop(&self, channel: ChannelPtr) -> c_int {
        // SAFETY: channel handles are validated by FMOD itself; a stale
        // handle yields FMOD_ERR_INVALID_HANDLE rather than UB.
        unsafe { (self.raw.channel_stop)(channel.0) }
    }

    pub(crate) fn channel_set_paused(&self, channel: ChannelPtr, paused: bool) -> c_int {
        // SAFETY: see `channel_stop`.
        unsafe { (self.raw.channel_set_paused)(channel.0, c_int::from(paused)) }
    }

    /// Returns `(code, paused)`.
    pub(crate) fn channel_get_paused(&self, channel: ChannelPtr) -> (c_int, bool) {
        let mut paused: c_int = 0;
        // SAFETY: see `channel_stop`; out pointer is a valid local.
        let code = unsafe { (self.raw.channel_get_paused)(channel.0, &mut paused) };
        (code, paused != 0)
    }

    pub(crate) fn channel_set_position(
        &self,
        channel: ChannelPtr,
        position: c_uint,
        unit: c_uint,
    ) -> c_int {
        // SAFETY: see `channel_stop`.
        unsafe { (self.raw.channel_set_position)(channel.0, position, unit) }
    }

    /// Returns `(code, position)` in the requested time unit.
    pub(crate) fn channel_get_position(&self, channel: ChannelPtr, unit: c_uint) -> (c_int, c_uint) {
        let mut position: c_uint = 0;
        // SAFETY: see `channel_stop`; out pointer is a valid local.
        let code = unsafe { (self.raw.channel_get_position)(channel.0, &mut position, unit) };
        (code, position)
    }

    /// Returns `(code, is_playing)`.
    pub(crate) fn channel_is_playing(&self, channel: ChannelPtr) -> (c_int, bool) {
        let mut is_playing: c_int = 0;
        // SAFETY: see `channel_stop`; out pointer is a valid local.
        let code = unsafe { (self.raw.channel_is_playing)(channel.0, &mut is_playing) };
        (code, is_playing != 0)
    }
}

impl std::fmt::Debug for FmodApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FmodApi").finish_non_exhaustive()
    }
}
