//! Map FFmpeg exit codes and stderr to short summaries and decode error codes.
//!
//! Exit codes are from ffmpeg.c: 1 (general), 69 (rate exceeded),
//! 123 (hard exit), 255 (signal). -1 is used for spawn failure.

use serde::Serialize;

use crate::error::{DecodeError, DecodeErrorCode};

/// Log-facing failure description: `summary` is one line, `detail` is the stderr tail.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FfmpegErrorPayload {
    pub summary: String,
    pub detail: String,
}

pub fn parse_ffmpeg_error(stderr: &str, exit_code: Option<i32>) -> FfmpegErrorPayload {
    let summary = match exit_code {
        Some(code) => known_exit_code_summary(code)
            .map(str::to_string)
            .unwrap_or_else(|| format!("FFmpeg failed (exit code {}).", code)),
        None => first_line_truncated(stderr, 120),
    };
    FfmpegErrorPayload {
        summary,
        detail: stderr.trim().to_string(),
    }
}

fn known_exit_code_summary(code: i32) -> Option<&'static str> {
    match code {
        -1 => Some("FFmpeg not found or failed to start."),
        1 => Some("FFmpeg failed."),
        69 => Some("Encoding rate limit exceeded."),
        123 | 255 => Some("Encoding was stopped."),
        _ => None,
    }
}

const ELLIPSIS: &str = "…";

fn first_line_truncated(stderr: &str, max_len: usize) -> String {
    let first = stderr
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    if first.len() <= max_len {
        return first.to_string();
    }
    let mut cut = max_len.saturating_sub(ELLIPSIS.len());
    while !first.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &first[..cut], ELLIPSIS)
}

/// stderr fragments meaning "this runtime cannot read this format".
const UNSUPPORTED_MARKERS: &[&str] = &[
    "Invalid data found when processing input",
    "moov atom not found",
    "Unknown decoder",
    "Decoder not found",
    "No decoder for",
    "Could not find codec parameters",
];

const MISSING_SOURCE_MARKERS: &[&str] = &["No such file or directory", "Permission denied"];

/// Classify a failed ffprobe/ffmpeg decode from its stderr.
pub(crate) fn decode_error_from_stderr(stderr: &str) -> DecodeError {
    let lowered = stderr.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lowered.contains(&m.to_lowercase()));
    let code = if has(UNSUPPORTED_MARKERS) {
        DecodeErrorCode::SrcNotSupported
    } else if has(MISSING_SOURCE_MARKERS) {
        DecodeErrorCode::Network
    } else {
        DecodeErrorCode::Decode
    };
    let message = first_line_truncated(stderr, 200);
    DecodeError::new(
        code,
        if message.is_empty() { "decoder exited with an error".to_string() } else { message },
    )
}
