//! Metadata probe: load a file into a decode surface and read its duration and
//! dimensions under a bounded timeout.
//!
//! The probe never fails. Every degraded path resolves to `None` fields and a
//! [`ProbeOutcome`] saying why, so callers can stay lenient without losing the
//! diagnostic. The object URL and surface are dropped when the probe resolves,
//! including when the timeout wins.

use std::time::Duration;

use serde::Serialize;

use crate::config::Timeouts;
use crate::error::{DecodeError, DecodeErrorCode, HostError};
use crate::format::FormatSignals;
use crate::host::{DecodeSurface, MediaHost, ObjectUrl, SurfaceMetadata};
use crate::media::SourceMedia;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProbeOutcome {
    /// Metadata loaded.
    Ready,
    /// The surface failed the way an unsupported codec does (likely HEVC, or
    /// "format not supported"); treated as ready with unknown fields.
    DecodeErrorTolerated,
    DecodeError,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub duration_seconds: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub outcome: ProbeOutcome,
}

impl ProbeResult {
    pub fn unknown(outcome: ProbeOutcome) -> Self {
        Self {
            duration_seconds: None,
            width: None,
            height: None,
            outcome,
        }
    }

    pub fn from_metadata(meta: SurfaceMetadata) -> Self {
        Self {
            duration_seconds: sanitize_duration(meta.duration),
            width: sanitize_dimension(meta.width),
            height: sanitize_dimension(meta.height),
            outcome: ProbeOutcome::Ready,
        }
    }
}

/// Duration-only view of a probe, as handed to the duration gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationProbe {
    pub duration_seconds: Option<f64>,
}

impl From<ProbeResult> for DurationProbe {
    fn from(result: ProbeResult) -> Self {
        Self {
            duration_seconds: result.duration_seconds,
        }
    }
}

/// NaN, infinite and negative durations are unknown.
pub fn sanitize_duration(raw: f64) -> Option<f64> {
    (raw.is_finite() && raw >= 0.0).then_some(raw)
}

pub fn sanitize_dimension(raw: u32) -> Option<u32> {
    (raw > 0).then_some(raw)
}

/// Host failures before a surface exists are reported like decode errors.
pub(crate) fn host_decode_error(err: HostError) -> DecodeError {
    DecodeError::new(DecodeErrorCode::Aborted, err.summary())
}

/// Open a surface for `url` and wait for its first metadata signal.
pub(crate) async fn open_surface_with_metadata<H: MediaHost + ?Sized>(
    host: &H,
    url: &ObjectUrl,
) -> Result<(Box<dyn DecodeSurface>, SurfaceMetadata), DecodeError> {
    let mut surface = host.open_surface(url).await.map_err(host_decode_error)?;
    let meta = surface.load_metadata().await?;
    Ok((surface, meta))
}

async fn load_metadata<H: MediaHost + ?Sized>(
    host: &H,
    media: &SourceMedia,
) -> Result<SurfaceMetadata, DecodeError> {
    let url = host.create_object_url(media).map_err(host_decode_error)?;
    let (_surface, meta) = open_surface_with_metadata(host, &url).await?;
    Ok(meta)
}

/// Whether a decode error should still count as "metadata ready".
pub(crate) fn is_tolerated(err: &DecodeError, signals: &FormatSignals) -> bool {
    signals.likely_hevc || err.is_format_unsupported()
}

pub async fn probe_metadata<H: MediaHost + ?Sized>(
    host: &H,
    media: &SourceMedia,
    signals: &FormatSignals,
    timeouts: &Timeouts,
) -> ProbeResult {
    let window = timeouts.probe_window(signals.likely_hevc);
    probe_within(host, media, signals, window).await
}

async fn probe_within<H: MediaHost + ?Sized>(
    host: &H,
    media: &SourceMedia,
    signals: &FormatSignals,
    window: Duration,
) -> ProbeResult {
    let result = match tokio::time::timeout(window, load_metadata(host, media)).await {
        Ok(Ok(meta)) => ProbeResult::from_metadata(meta),
        Ok(Err(err)) if is_tolerated(&err, signals) => {
            log::debug!(
                target: "clip_ingest::probe",
                "{}: tolerated decode error ({}), metadata unknown",
                media.file_name(),
                err
            );
            ProbeResult::unknown(ProbeOutcome::DecodeErrorTolerated)
        }
        Ok(Err(err)) => {
            log::warn!(
                target: "clip_ingest::probe",
                "{}: decode error while probing: {}",
                media.file_name(),
                err
            );
            ProbeResult::unknown(ProbeOutcome::DecodeError)
        }
        Err(_) => {
            log::warn!(
                target: "clip_ingest::probe",
                "{}: no metadata after {:?}",
                media.file_name(),
                window
            );
            ProbeResult::unknown(ProbeOutcome::TimedOut)
        }
    };
    log::debug!(
        target: "clip_ingest::probe",
        "{}: {:?}",
        media.file_name(),
        result
    );
    result
}

/// Duration of `media`, or `None` when it cannot be measured. Never fails.
pub async fn probe_duration<H: MediaHost + ?Sized>(
    host: &H,
    media: &SourceMedia,
    signals: &FormatSignals,
    timeouts: &Timeouts,
) -> DurationProbe {
    probe_metadata(host, media, signals, timeouts).await.into()
}
