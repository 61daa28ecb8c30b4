//! Poster-frame extraction: seek, paint one frame at natural size, encode JPEG.

use tokio::time::timeout;

use crate::config::Timeouts;
use crate::error::{DecodeError, ThumbnailError};
use crate::format::FormatSignals;
use crate::host::{MediaHost, StillFormat};
use crate::media::SourceMedia;
use crate::probe::{host_decode_error, open_surface_with_metadata, sanitize_duration};

const JPEG_QUALITY: u8 = 80;
/// Fallback offset into the clip when the requested one is unusable.
const FALLBACK_FRACTION: f64 = 0.1;
const MIN_OFFSET_SECONDS: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
    /// Where the frame was actually taken, after offset correction.
    pub at_seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThumbnailOutcome {
    Produced(Thumbnail),
    NotRequested,
    Failed(ThumbnailError),
}

impl ThumbnailOutcome {
    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        match self {
            ThumbnailOutcome::Produced(t) => Some(t),
            _ => None,
        }
    }
}

impl From<Result<Thumbnail, ThumbnailError>> for ThumbnailOutcome {
    fn from(result: Result<Thumbnail, ThumbnailError>) -> Self {
        match result {
            Ok(t) => ThumbnailOutcome::Produced(t),
            Err(e) => ThumbnailOutcome::Failed(e),
        }
    }
}

/// Offset to seek to. A requested offset that is not finite, negative, or at
/// or past a known end is replaced by 10% into the clip, kept within
/// `[0.1, duration]`.
pub fn resolve_offset(requested: f64, duration: Option<f64>) -> f64 {
    let valid = requested.is_finite()
        && requested >= 0.0
        && duration.is_none_or(|d| requested < d);
    if valid {
        return requested;
    }
    match duration {
        Some(d) if d > MIN_OFFSET_SECONDS => (d * FALLBACK_FRACTION).clamp(MIN_OFFSET_SECONDS, d),
        Some(_) => 0.0,
        None => MIN_OFFSET_SECONDS,
    }
}

fn decode_failed(err: DecodeError) -> ThumbnailError {
    ThumbnailError::DecodeFailed(err.message)
}

async fn capture<H: MediaHost + ?Sized>(
    host: &H,
    media: &SourceMedia,
    at_seconds: f64,
    timeouts: &Timeouts,
) -> Result<Thumbnail, ThumbnailError> {
    let url = host
        .create_object_url(media)
        .map_err(|e| decode_failed(host_decode_error(e)))?;
    let (mut surface, meta) = open_surface_with_metadata(host, &url)
        .await
        .map_err(decode_failed)?;

    let offset = resolve_offset(at_seconds, sanitize_duration(meta.duration));
    if offset != at_seconds {
        log::debug!(
            target: "clip_ingest::thumbnail",
            "{}: offset {} replaced with {:.3}s",
            media.file_name(),
            at_seconds,
            offset
        );
    }

    // Hosts may refuse to seek a source without a video picture.
    let (width, height) = (meta.width, meta.height);
    if width == 0 || height == 0 {
        return Err(ThumbnailError::InvalidDimensions { width, height });
    }

    match timeout(timeouts.seek, surface.seek(offset)).await {
        Err(_) => return Err(ThumbnailError::SeekTimeout),
        Ok(Err(e)) => return Err(decode_failed(e)),
        Ok(Ok(())) => {}
    }

    let frame = surface
        .next_frame()
        .await
        .map_err(decode_failed)?
        .ok_or_else(|| ThumbnailError::DecodeFailed(format!("no frame at {:.3}s", offset)))?;

    let mut canvas = host
        .create_canvas(width, height)
        .map_err(|e| ThumbnailError::EncodeFailed(e.summary()))?;
    canvas
        .draw_frame(&frame)
        .map_err(|e| ThumbnailError::EncodeFailed(e.to_string()))?;
    let bytes = canvas
        .encode_still(StillFormat::Jpeg {
            quality: JPEG_QUALITY,
        })
        .map_err(|e| ThumbnailError::EncodeFailed(e.summary()))?;
    if bytes.is_empty() {
        return Err(ThumbnailError::EncodeFailed("encoder produced no data".to_string()));
    }

    Ok(Thumbnail {
        bytes,
        mime_type: StillFormat::Jpeg {
            quality: JPEG_QUALITY,
        }
        .mime_type(),
        width,
        height,
        at_seconds: offset,
    })
}

pub async fn extract_thumbnail<H: MediaHost + ?Sized>(
    host: &H,
    media: &SourceMedia,
    at_seconds: f64,
    signals: &FormatSignals,
    timeouts: &Timeouts,
) -> Result<Thumbnail, ThumbnailError> {
    let result = timeout(timeouts.thumbnail, capture(host, media, at_seconds, timeouts))
        .await
        .unwrap_or(Err(ThumbnailError::TimedOut));

    match result {
        Ok(thumb) => {
            log::debug!(
                target: "clip_ingest::thumbnail",
                "{}: {}x{} thumbnail at {:.3}s ({} bytes)",
                media.file_name(),
                thumb.width,
                thumb.height,
                thumb.at_seconds,
                thumb.bytes.len()
            );
            Ok(thumb)
        }
        Err(e) if signals.likely_hevc && e.is_decode_or_seek() => {
            log::info!(
                target: "clip_ingest::thumbnail",
                "{}: likely HEVC, thumbnail unavailable ({})",
                media.file_name(),
                e
            );
            Err(ThumbnailError::HevcUnsupported)
        }
        Err(e) => {
            log::warn!(
                target: "clip_ingest::thumbnail",
                "{}: thumbnail failed: {}",
                media.file_name(),
                e
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_offset_is_kept() {
        assert_eq!(resolve_offset(2.0, Some(10.0)), 2.0);
        assert_eq!(resolve_offset(0.0, Some(10.0)), 0.0);
        assert_eq!(resolve_offset(42.0, None), 42.0);
    }

    #[test]
    fn offset_past_end_falls_back_to_ten_percent() {
        assert_eq!(resolve_offset(10.0, Some(10.0)), 1.0);
        assert_eq!(resolve_offset(99.0, Some(30.0)), 3.0);
    }

    #[test]
    fn fallback_never_goes_below_minimum() {
        assert_eq!(resolve_offset(-1.0, Some(0.5)), 0.1);
    }

    #[test]
    fn very_short_clip_uses_start() {
        assert_eq!(resolve_offset(5.0, Some(0.05)), 0.0);
        assert_eq!(resolve_offset(0.0, Some(0.0)), 0.0);
    }

    #[test]
    fn invalid_offset_with_unknown_duration() {
        assert_eq!(resolve_offset(f64::NAN, None), 0.1);
        assert_eq!(resolve_offset(f64::INFINITY, None), 0.1);
        assert_eq!(resolve_offset(-3.0, None), 0.1);
    }
}
