//! Client-side video ingestion: classify, probe, gate, thumbnail and compress
//! user-submitted clips before upload.
//!
//! The crate-level functions run against a default [`ClipIngest`] built on the
//! FFmpeg host and [`Settings::global`]. Install custom settings with
//! [`Settings::install`] before the first call, or build a [`ClipIngest`]
//! directly for another host.

pub mod config;
pub mod error;
pub mod facade;
pub mod format;
pub mod gate;
pub mod host;
pub mod logging;
pub mod media;
pub mod probe;
pub mod thumbnail;
pub mod transcode;

use std::sync::LazyLock;

pub use config::{IngestConfig, Settings};
pub use error::{Rejection, RejectionPayload, ThumbnailError};
pub use facade::{ClipIngest, Preflight, PreflightRejected};
pub use format::{FormatClassifier, FormatDiagnostic, FormatSignals, HeuristicClassifier};
pub use gate::DurationCheck;
pub use host::ffmpeg::FfmpegHost;
pub use host::MediaHost;
pub use media::{CompressedMedia, PassthroughMedia, PassthroughReason, SourceMedia, TranscodeResult};
pub use probe::{DurationProbe, ProbeOutcome, ProbeResult};
pub use thumbnail::{Thumbnail, ThumbnailOutcome};
pub use transcode::{CompressOptions, ProgressCallback, ProgressPhase, ProgressUpdate};

static DEFAULT_INGEST: LazyLock<ClipIngest<FfmpegHost>> = LazyLock::new(|| {
    let settings = Settings::global();
    ClipIngest::configured(FfmpegHost::new(settings.compression.frame_rate), settings)
});

/// The default FFmpeg-backed pipeline.
pub fn default_ingest() -> &'static ClipIngest<FfmpegHost> {
    &DEFAULT_INGEST
}

pub fn classify(media: &SourceMedia) -> FormatSignals {
    DEFAULT_INGEST.classify(media)
}

pub fn validate_container_and_size(media: &SourceMedia) -> Result<(), Vec<Rejection>> {
    DEFAULT_INGEST.validate_container_and_size(media)
}

/// Never fails; an unmeasurable file yields `duration_seconds: None`.
pub async fn probe_duration(media: &SourceMedia) -> DurationProbe {
    DEFAULT_INGEST.probe_duration(media).await
}

pub async fn require_duration_within_limit(media: &SourceMedia) -> Result<DurationCheck, Rejection> {
    DEFAULT_INGEST.require_duration_within_limit(media).await
}

pub async fn extract_thumbnail(media: &SourceMedia, at_seconds: f64) -> Result<Thumbnail, ThumbnailError> {
    DEFAULT_INGEST.extract_thumbnail(media, at_seconds).await
}

/// Never fails; see [`TranscodeResult`].
pub async fn compress(media: &SourceMedia, on_progress: Option<ProgressCallback>) -> TranscodeResult {
    let options = CompressOptions {
        on_progress,
        cancel: None,
    };
    DEFAULT_INGEST.compress(media, options).await
}

pub async fn preflight(
    media: &SourceMedia,
    thumbnail_at: Option<f64>,
) -> Result<Preflight, PreflightRejected> {
    DEFAULT_INGEST.preflight(media, thumbnail_at).await
}
