//! Central mapping from FMOD result codes to error kinds.
//!
//! Every component routes native failures through these constructors so the
//! code → error-kind policy lives in exactly one place.

use std::ffi::c_int;
use std::path::Path;

use wavenote_audio::{EngineError, LoadError, PlaybackError};

use crate::ffi;

/// Readable constant name for an FMOD result code, `"UNKNOWN"` otherwise.
pub(crate) fn result_name(code: c_int) -> &'static str {
    match code {
        ffi::FMOD_OK => "FMOD_OK",
        ffi::FMOD_ERR_BADCOMMAND => "FMOD_ERR_BADCOMMAND",
        ffi::FMOD_ERR_CHANNEL_ALLOC => "FMOD_ERR_CHANNEL_ALLOC",
        ffi::FMOD_ERR_CHANNEL_STOLEN => "FMOD_ERR_CHANNEL_STOLEN",
        ffi::FMOD_ERR_DMA => "FMOD_ERR_DMA",
        ffi::FMOD_ERR_DSP_CONNECTION => "FMOD_ERR_DSP_CONNECTION",
        ffi::FMOD_ERR_DSP_DONTPROCESS => "FMOD_ERR_DSP_DONTPROCESS",
        ffi::FMOD_ERR_DSP_FORMAT => "FMOD_ERR_DSP_FORMAT",
        ffi::FMOD_ERR_DSP_INUSE => "FMOD_ERR_DSP_INUSE",
        ffi::FMOD_ERR_DSP_NOTFOUND => "FMOD_ERR_DSP_NOTFOUND",
        ffi::FMOD_ERR_DSP_RESERVED => "FMOD_ERR_DSP_RESERVED",
        ffi::FMOD_ERR_DSP_SILENCE => "FMOD_ERR_DSP_SILENCE",
        ffi::FMOD_ERR_DSP_TYPE => "FMOD_ERR_DSP_TYPE",
        ffi::FMOD_ERR_FILE_BAD => "FMOD_ERR_FILE_BAD",
        ffi::FMOD_ERR_FILE_COULDNOTSEEK => "FMOD_ERR_FILE_COULDNOTSEEK",
        ffi::FMOD_ERR_FILE_DISKEJECTED => "FMOD_ERR_FILE_DISKEJECTED",
        ffi::FMOD_ERR_FILE_EOF => "FMOD_ERR_FILE_EOF",
        ffi::FMOD_ERR_FILE_ENDOFDATA => "FMOD_ERR_FILE_ENDOFDATA",
        ffi::FMOD_ERR_FILE_NOTFOUND => "FMOD_ERR_FILE_NOTFOUND",
        ffi::FMOD_ERR_FORMAT => "FMOD_ERR_FORMAT",
        ffi::FMOD_ERR_HEADER_MISMATCH => "FMOD_ERR_HEADER_MISMATCH",
        ffi::FMOD_ERR_HTTP => "FMOD_ERR_HTTP",
        ffi::FMOD_ERR_HTTP_ACCESS => "FMOD_ERR_HTTP_ACCESS",
        ffi::FMOD_ERR_HTTP_PROXY_AUTH => "FMOD_ERR_HTTP_PROXY_AUTH",
        ffi::FMOD_ERR_HTTP_SERVER_ERROR => "FMOD_ERR_HTTP_SERVER_ERROR",
        ffi::FMOD_ERR_HTTP_TIMEOUT => "FMOD_ERR_HTTP_TIMEOUT",
        ffi::FMOD_ERR_INITIALIZATION => "FMOD_ERR_INITIALIZATION",
        ffi::FMOD_ERR_INITIALIZED => "FMOD_ERR_INITIALIZED",
        ffi::FMOD_ERR_INTERNAL => "FMOD_ERR_INTERNAL",
        ffi::FMOD_ERR_INVALID_FLOAT => "FMOD_ERR_INVALID_FLOAT",
        ffi::FMOD_ERR_INVALID_HANDLE => "FMOD_ERR_INVALID_HANDLE",
        ffi::FMOD_ERR_INVALID_PARAM => "FMOD_ERR_INVALID_PARAM",
        ffi::FMOD_ERR_INVALID_POSITION => "FMOD_ERR_INVALID_POSITION",
        ffi::FMOD_ERR_INVALID_SPEAKER => "FMOD_ERR_INVALID_SPEAKER",
        ffi::FMOD_ERR_INVALID_SYNCPOINT => "FMOD_ERR_INVALID_SYNCPOINT",
        ffi::FMOD_ERR_INVALID_THREAD => "FMOD_ERR_INVALID_THREAD",
        ffi::FMOD_ERR_INVALID_VECTOR => "FMOD_ERR_INVALID_VECTOR",
        ffi::FMOD_ERR_MAXAUDIBLE => "FMOD_ERR_MAXAUDIBLE",
        ffi::FMOD_ERR_MEMORY => "FMOD_ERR_MEMORY",
        ffi::FMOD_ERR_MEMORY_CANTPOINT => "FMOD_ERR_MEMORY_CANTPOINT",
        ffi::FMOD_ERR_NEEDS3D => "FMOD_ERR_NEEDS3D",
        ffi::FMOD_ERR_NEEDSHARDWARE => "FMOD_ERR_NEEDSHARDWARE",
        ffi::FMOD_ERR_NET_CONNECT => "FMOD_ERR_NET_CONNECT",
        ffi::FMOD_ERR_NET_SOCKET_ERROR => "FMOD_ERR_NET_SOCKET_ERROR",
        ffi::FMOD_ERR_NET_URL => "FMOD_ERR_NET_URL",
        ffi::FMOD_ERR_NET_WOULD_BLOCK => "FMOD_ERR_NET_WOULD_BLOCK",
        ffi::FMOD_ERR_NOTREADY => "FMOD_ERR_NOTREADY",
        ffi::FMOD_ERR_OUTPUT_ALLOCATED => "FMOD_ERR_OUTPUT_ALLOCATED",
        ffi::FMOD_ERR_OUTPUT_CREATEBUFFER => "FMOD_ERR_OUTPUT_CREATEBUFFER",
        ffi::FMOD_ERR_OUTPUT_DRIVERCALL => "FMOD_ERR_OUTPUT_DRIVERCALL",
        ffi::FMOD_ERR_OUTPUT_FORMAT => "FMOD_ERR_OUTPUT_FORMAT",
        ffi::FMOD_ERR_OUTPUT_INIT => "FMOD_ERR_OUTPUT_INIT",
        ffi::FMOD_ERR_OUTPUT_NODRIVERS => "FMOD_ERR_OUTPUT_NODRIVERS",
        ffi::FMOD_ERR_PLUGIN => "FMOD_ERR_PLUGIN",
        ffi::FMOD_ERR_PLUGIN_MISSING => "FMOD_ERR_PLUGIN_MISSING",
        ffi::FMOD_ERR_PLUGIN_RESOURCE => "FMOD_ERR_PLUGIN_RESOURCE",
        ffi::FMOD_ERR_PLUGIN_VERSION => "FMOD_ERR_PLUGIN_VERSION",
        ffi::FMOD_ERR_RECORD => "FMOD_ERR_RECORD",
        ffi::FMOD_ERR_REVERB_CHANNELGROUP => "FMOD_ERR_REVERB_CHANNELGROUP",
        ffi::FMOD_ERR_REVERB_INSTANCE => "FMOD_ERR_REVERB_INSTANCE",
        ffi::FMOD_ERR_SUBSOUNDS => "FMOD_ERR_SUBSOUNDS",
        ffi::FMOD_ERR_SUBSOUND_ALLOCATED => "FMOD_ERR_SUBSOUND_ALLOCATED",
        ffi::FMOD_ERR_SUBSOUND_CANTMOVE => "FMOD_ERR_SUBSOUND_CANTMOVE",
        ffi::FMOD_ERR_TAGNOTFOUND => "FMOD_ERR_TAGNOTFOUND",
        ffi::FMOD_ERR_TOOMANYCHANNELS => "FMOD_ERR_TOOMANYCHANNELS",
        ffi::FMOD_ERR_TRUNCATED => "FMOD_ERR_TRUNCATED",
        ffi::FMOD_ERR_UNIMPLEMENTED => "FMOD_ERR_UNIMPLEMENTED",
        ffi::FMOD_ERR_UNINITIALIZED => "FMOD_ERR_UNINITIALIZED",
        ffi::FMOD_ERR_UNSUPPORTED => "FMOD_ERR_UNSUPPORTED",
        ffi::FMOD_ERR_VERSION => "FMOD_ERR_VERSION",
        ffi::FMOD_ERR_EVENT_ALREADY_LOADED => "FMOD_ERR_EVENT_ALREADY_LOADED",
        ffi::FMOD_ERR_EVENT_LIVEUPDATE_BUSY => "FMOD_ERR_EVENT_LIVEUPDATE_BUSY",
        ffi::FMOD_ERR_EVENT_LIVEUPDATE_MISMATCH => "FMOD_ERR_EVENT_LIVEUPDATE_MISMATCH",
        ffi::FMOD_ERR_EVENT_LIVEUPDATE_TIMEOUT => "FMOD_ERR_EVENT_LIVEUPDATE_TIMEOUT",
        ffi::FMOD_ERR_EVENT_NOTFOUND => "FMOD_ERR_EVENT_NOTFOUND",
        ffi::FMOD_ERR_STUDIO_UNINITIALIZED => "FMOD_ERR_STUDIO_UNINITIALIZED",
        ffi::FMOD_ERR_STUDIO_NOT_LOADED => "FMOD_ERR_STUDIO_NOT_LOADED",
        ffi::FMOD_ERR_INVALID_STRING => "FMOD_ERR_INVALID_STRING",
        ffi::FMOD_ERR_ALREADY_LOCKED => "FMOD_ERR_ALREADY_LOCKED",
        ffi::FMOD_ERR_NOT_LOCKED => "FMOD_ERR_NOT_LOCKED",
        ffi::FMOD_ERR_RECORD_DISCONNECTED => "FMOD_ERR_RECORD_DISCONNECTED",
        ffi::FMOD_ERR_TOOMANYSAMPLES => "FMOD_ERR_TOOMANYSAMPLES",
        _ => "UNKNOWN",
    }
}

/// Formatted description like `FMOD_ERR_INVALID_HANDLE (30)`.
pub(crate) fn describe(code: c_int) -> String {
    format!("{} ({code})", result_name(code))
}

/// Maps a sound-creation failure to the load error taxonomy.
pub(crate) fn load_error(code: c_int, path: &Path) -> LoadError {
    let path = path.to_path_buf();
    match code {
        ffi::FMOD_ERR_FILE_NOTFOUND => LoadError::FileNotFound { path },
        ffi::FMOD_ERR_FORMAT => LoadError::UnsupportedFormat { path },
        ffi::FMOD_ERR_FILE_BAD => LoadError::CorruptedFile { path },
        ffi::FMOD_ERR_MEMORY => LoadError::OutOfMemory { path },
        _ => LoadError::Failed { path, code },
    }
}

/// Wraps a channel operation failure.
pub(crate) fn playback_error(code: c_int, action: &'static str) -> PlaybackError {
    PlaybackError::Native { action, code }
}

/// Wraps a system or lifecycle operation failure.
pub(crate) fn engine_error(code: c_int, action: &'static str) -> EngineError {
    EngineError::Native { action, code }
}

#[cfg(test)]
mod tests {
    use super::{describe, load_error, result_name};
    use crate::ffi;
    use std::path::Path;
    use wavenote_audio::LoadError;

    #[test]
    fn names_cover_the_codes_the_engine_inspects() {
        assert_eq!(result_name(ffi::FMOD_OK), "FMOD_OK");
        assert_eq!(
            result_name(ffi::FMOD_ERR_INVALID_HANDLE),
            "FMOD_ERR_INVALID_HANDLE",
        );
        assert_eq!(
            result_name(ffi::FMOD_ERR_CHANNEL_STOLEN),
            "FMOD_ERR_CHANNEL_STOLEN",
        );
        assert_eq!(
            result_name(ffi::FMOD_ERR_INVALID_POSITION),
            "FMOD_ERR_INVALID_POSITION",
        );
        assert_eq!(result_name(9999), "UNKNOWN");
    }

    #[test]
    fn describe_includes_name_and_code() {
        assert_eq!(describe(ffi::FMOD_ERR_INVALID_HANDLE), "FMOD_ERR_INVALID_HANDLE (30)");
        assert_eq!(describe(-5), "UNKNOWN (-5)");
    }

    #[test]
    fn load_errors_map_per_code() {
        let p = Path::new("/tmp/x.wav");
        assert!(matches!(
            load_error(ffi::FMOD_ERR_FILE_NOTFOUND, p),
            LoadError::FileNotFound { .. },
        ));
        assert!(matches!(
            load_error(ffi::FMOD_ERR_FORMAT, p),
            LoadError::UnsupportedFormat { .. },
        ));
        assert!(matches!(
            load_error(ffi::FMOD_ERR_FILE_BAD, p),
            LoadError::CorruptedFile { .. },
        ));
        assert!(matches!(
            load_error(ffi::FMOD_ERR_MEMORY, p),
            LoadError::OutOfMemory { .. },
        ));
        assert!(matches!(
            load_error(ffi::FMOD_ERR_INTERNAL, p),
            LoadError::Failed { code: 28, .. },
        ));
    }
}
