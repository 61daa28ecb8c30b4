//! ffprobe-backed source inspection for the FFmpeg decode surface.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use super::error::decode_error_from_stderr;
use crate::error::{DecodeError, DecodeErrorCode};

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    #[serde(default)]
    format_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    #[serde(default)]
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    #[serde(default)]
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    tags: Option<FfprobeTags>,
    #[serde(default)]
    side_data_list: Option<Vec<FfprobeSideData>>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    streams: Option<Vec<FfprobeStream>>,
}

fn parse_frame_rate(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

/// Quarter-turn rotation from the legacy `rotate` tag or display-matrix side data.
fn rotation_degrees(stream: &FfprobeStream) -> i32 {
    let from_tag = stream
        .tags
        .as_ref()
        .and_then(|t| t.rotate.as_deref())
        .and_then(|r| r.trim().parse::<f64>().ok());
    let from_side_data = stream
        .side_data_list
        .iter()
        .flatten()
        .find_map(|sd| sd.rotation);
    let degrees = from_tag.or(from_side_data).unwrap_or(0.0).round() as i32;
    degrees.rem_euclid(360)
}

/// What ffprobe knows about a source file. `width`/`height` are display
/// dimensions, already swapped for 90/270 degree rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub duration: Option<f64>,
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
    pub codec_name: Option<String>,
    pub format_name: Option<String>,
    /// `None` when ffprobe listed no streams at all.
    pub audio_streams: Option<usize>,
}

impl SourceInfo {
    pub fn has_video(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_ffprobe_json(json: &str) -> Result<SourceInfo, DecodeError> {
    let output: FfprobeOutput = serde_json::from_str(json).map_err(|e| {
        DecodeError::new(
            DecodeErrorCode::Decode,
            format!("Failed to parse ffprobe JSON: {}", e),
        )
    })?;

    let format = output.format.as_ref();
    let duration = format
        .and_then(|f| f.duration.as_deref())
        .and_then(|s| s.trim().parse::<f64>().ok());
    let format_name = format.and_then(|f| f.format_name.clone());

    let streams = output.streams.as_deref();
    let video = streams
        .and_then(|s| s.iter().find(|s| s.codec_type.as_deref() == Some("video")));
    let audio_streams = streams.map(|s| {
        s.iter()
            .filter(|s| s.codec_type.as_deref() == Some("audio"))
            .count()
    });

    let (mut width, mut height) = video
        .map(|s| (s.width.unwrap_or(0), s.height.unwrap_or(0)))
        .unwrap_or((0, 0));
    if video.is_some_and(|s| matches!(rotation_degrees(s), 90 | 270)) {
        std::mem::swap(&mut width, &mut height);
    }

    Ok(SourceInfo {
        duration,
        width,
        height,
        fps: video
            .and_then(|s| s.r_frame_rate.as_deref())
            .and_then(parse_frame_rate),
        codec_name: video.and_then(|s| s.codec_name.clone()),
        format_name,
        audio_streams,
    })
}

/// Run ffprobe on `path`. Failures carry a decode error code so the probe can
/// tell "format not supported" from other decode failures.
pub async fn probe_source(ffprobe: &Path, path: &Path) -> Result<SourceInfo, DecodeError> {
    log::debug!(
        target: "clip_ingest::host::ffmpeg::ffprobe",
        "probe_source: path={}",
        path.display()
    );

    let output = Command::new(ffprobe)
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            DecodeError::new(
                DecodeErrorCode::Aborted,
                format!("Failed to run ffprobe: {}", e),
            )
        })?;

    if !output.status.success() {
        return Err(decode_error_from_stderr(&String::from_utf8_lossy(
            &output.stderr,
        )));
    }

    let json = String::from_utf8(output.stdout).map_err(|_| {
        DecodeError::new(DecodeErrorCode::Decode, "ffprobe output was not valid UTF-8")
    })?;
    parse_ffprobe_json(&json)
}
