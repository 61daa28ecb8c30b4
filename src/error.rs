//! Error types. Hard rejections are user-facing; host errors stay internal and
//! are absorbed into degraded results by the pipeline.

use serde::Serialize;

use crate::host::ffmpeg::parse_ffmpeg_error;

/// Hard rejection from pre-flight validation. These are the only failures the
/// upload form ever shows to the user.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("\"{file_name}\" is not a supported video format")]
    UnsupportedContainer {
        file_name: String,
        mime_type: String,
    },

    #[error("Video is too large ({} MB, limit {} MB)", megabytes(*size), megabytes(*limit))]
    SizeExceeded { size: u64, limit: u64 },

    #[error("Video is too long ({measured_seconds:.0}s, limit {limit_seconds:.0}s)")]
    DurationExceeded {
        measured_seconds: f64,
        limit_seconds: f64,
    },
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::UnsupportedContainer { .. } => "unsupportedContainer",
            Rejection::SizeExceeded { .. } => "sizeExceeded",
            Rejection::DurationExceeded { .. } => "durationExceeded",
        }
    }
}

fn megabytes(bytes: u64) -> u64 {
    bytes.div_ceil(1024 * 1024)
}

/// Payload handed to the UI layer: stable code plus display summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionPayload {
    pub code: &'static str,
    pub summary: String,
}

impl From<&Rejection> for RejectionPayload {
    fn from(r: &Rejection) -> Self {
        Self {
            code: r.code(),
            summary: r.to_string(),
        }
    }
}

impl Serialize for Rejection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        RejectionPayload::from(self).serialize(serializer)
    }
}

/// Thumbnail extraction failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThumbnailError {
    #[error("Timed out seeking to the thumbnail frame")]
    SeekTimeout,

    #[error("Video reports invalid dimensions ({width}x{height})")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Failed to encode thumbnail: {0}")]
    EncodeFailed(String),

    #[error("HEVC video cannot be decoded for a thumbnail on this device")]
    HevcUnsupported,

    #[error("Failed to decode video: {0}")]
    DecodeFailed(String),

    #[error("Timed out extracting thumbnail")]
    TimedOut,
}

impl ThumbnailError {
    pub fn code(&self) -> &'static str {
        match self {
            ThumbnailError::SeekTimeout => "seekTimeout",
            ThumbnailError::InvalidDimensions { .. } => "invalidDimensions",
            ThumbnailError::EncodeFailed(_) => "encodeFailed",
            ThumbnailError::HevcUnsupported => "hevcUnsupported",
            ThumbnailError::DecodeFailed(_) => "decodeFailed",
            ThumbnailError::TimedOut => "timedOut",
        }
    }

    /// Failures a likely-HEVC source is expected to hit on runtimes without an
    /// HEVC decoder.
    pub(crate) fn is_decode_or_seek(&self) -> bool {
        matches!(
            self,
            ThumbnailError::SeekTimeout | ThumbnailError::DecodeFailed(_) | ThumbnailError::TimedOut
        )
    }
}

impl Serialize for ThumbnailError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        RejectionPayload {
            code: self.code(),
            summary: self.to_string(),
        }
        .serialize(serializer)
    }
}

/// Media-error codes reported by a decode surface. Numbering follows the
/// HTML media error codes so hosts backed by a web view map 1:1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DecodeErrorCode {
    Aborted = 1,
    Network = 2,
    Decode = 3,
    SrcNotSupported = 4,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("decode error ({code:?}): {message}")]
pub struct DecodeError {
    pub code: DecodeErrorCode,
    pub message: String,
}

impl DecodeError {
    pub fn new(code: DecodeErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_format_unsupported(&self) -> bool {
        self.code == DecodeErrorCode::SrcNotSupported
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("draw failed: {0}")]
pub struct DrawError(pub String);

/// Errors raised by a media host while acquiring or driving a resource.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    FfmpegNotFound(String),

    #[error("FFmpeg failed (code {code}): {stderr}")]
    FfmpegFailed { code: i32, stderr: String },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Aborted")]
    Aborted,
}

impl HostError {
    pub fn ffmpeg_failed(code: i32, stderr: impl Into<String>) -> Self {
        Self::FfmpegFailed {
            code,
            stderr: stderr.into(),
        }
    }

    /// One-line summary for log output; FFmpeg stderr is reduced to its exit-code summary.
    pub fn summary(&self) -> String {
        match self {
            HostError::FfmpegFailed { code, stderr } => {
                parse_ffmpeg_error(stderr, Some(*code)).summary
            }
            other => other.to_string(),
        }
    }
}

impl From<String> for HostError {
    fn from(s: String) -> Self {
        if s == "Aborted" {
            HostError::Aborted
        } else {
            HostError::FfmpegFailed {
                code: -1,
                stderr: s,
            }
        }
    }
}

impl From<&str> for HostError {
    fn from(s: &str) -> Self {
        s.to_string().into()
    }
}
