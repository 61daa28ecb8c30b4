//! Source and result media types.

use bytes::Bytes;
use serde::Serialize;

/// An immutable user-submitted file. Cloning is cheap; the bytes are shared.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMedia {
    bytes: Bytes,
    mime_type: String,
    file_name: String,
}

impl SourceMedia {
    pub fn new(
        bytes: impl Into<Bytes>,
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Declared MIME type as sent by the client. May be empty or wrong.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercased extension without the dot, if the filename has one.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// A re-encoded file that is meaningfully smaller than its source.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedMedia {
    pub bytes: Bytes,
    pub mime_type: String,
    pub file_name: String,
}

impl CompressedMedia {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Why the original file was returned untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum PassthroughReason {
    BelowThreshold,
    RecordingUnavailable,
    MetadataTimeout,
    DecodeFailed { message: String },
    InvalidDimensions,
    NoSupportedCodec,
    CanvasUnavailable { message: String },
    RecorderFailed { message: String },
    Cancelled,
    EmptyOutput,
    NotSmaller { input_size: u64, output_size: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassthroughMedia {
    pub original: SourceMedia,
    pub reason: PassthroughReason,
}

/// Outcome of `compress`. Never an error: every soft failure lands in
/// `Passthrough` with its reason.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeResult {
    Compressed(CompressedMedia),
    Passthrough(PassthroughMedia),
}

impl TranscodeResult {
    pub fn passthrough(original: &SourceMedia, reason: PassthroughReason) -> Self {
        TranscodeResult::Passthrough(PassthroughMedia {
            original: original.clone(),
            reason,
        })
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, TranscodeResult::Compressed(_))
    }

    pub fn bytes(&self) -> &Bytes {
        match self {
            TranscodeResult::Compressed(c) => &c.bytes,
            TranscodeResult::Passthrough(p) => p.original.bytes(),
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            TranscodeResult::Compressed(c) => &c.mime_type,
            TranscodeResult::Passthrough(p) => p.original.mime_type(),
        }
    }

    pub fn file_name(&self) -> &str {
        match self {
            TranscodeResult::Compressed(c) => &c.file_name,
            TranscodeResult::Passthrough(p) => p.original.file_name(),
        }
    }

    pub fn passthrough_reason(&self) -> Option<&PassthroughReason> {
        match self {
            TranscodeResult::Compressed(_) => None,
            TranscodeResult::Passthrough(p) => Some(&p.reason),
        }
    }
}

/// Replace (or append) the filename extension.
pub fn with_extension(file_name: &str, ext: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{}.{}", stem, ext),
        _ if file_name.is_empty() => format!("video.{}", ext),
        _ => format!("{}.{}", file_name, ext),
    }
}
