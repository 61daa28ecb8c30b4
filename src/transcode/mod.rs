//! Re-encode pipeline: decode on the host's surface, paint frames onto a
//! resize canvas, record the canvas (plus original audio) with the first codec
//! the host supports, and keep the result only if it is meaningfully smaller.
//!
//! `compress` is total. Every failure resolves to the original file with a
//! [`PassthroughReason`], and every host resource acquired for the call is
//! dropped before it returns.

mod capture;
pub mod codec;
pub mod dimensions;
pub mod progress;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use self::capture::{build_capture_stream, run_capture, CaptureEnd};
use self::codec::{negotiate, NegotiatedCodec};
use self::dimensions::{target_dimensions, video_bitrate_budget};
use self::progress::ProgressTracker;
pub use self::progress::{ProgressCallback, ProgressPhase, ProgressUpdate};
use crate::config::Settings;
use crate::error::HostError;
use crate::format::FormatSignals;
use crate::host::{MediaHost, RecorderConfig};
use crate::media::{with_extension, CompressedMedia, PassthroughReason, SourceMedia, TranscodeResult};
use crate::probe::{open_surface_with_metadata, sanitize_duration};

/// Output must be below this share of the input to replace it.
const MAX_OUTPUT_RATIO_PERCENT: u64 = 95;

#[derive(Clone, Default)]
pub struct CompressOptions {
    pub on_progress: Option<ProgressCallback>,
    pub cancel: Option<CancellationToken>,
}

impl CompressOptions {
    pub fn with_progress(mut self, on_progress: impl Fn(ProgressUpdate) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(on_progress));
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

impl fmt::Debug for CompressOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressOptions")
            .field("on_progress", &self.on_progress.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

/// Keep `output` only if it is non-empty and below 95% of the input size.
pub fn decide_output(media: &SourceMedia, output: Bytes, codec: &NegotiatedCodec) -> TranscodeResult {
    let input_size = media.size();
    let output_size = output.len() as u64;
    if output_size == 0 {
        return TranscodeResult::passthrough(media, PassthroughReason::EmptyOutput);
    }
    if output_size.saturating_mul(100) >= input_size.saturating_mul(MAX_OUTPUT_RATIO_PERCENT) {
        return TranscodeResult::passthrough(
            media,
            PassthroughReason::NotSmaller {
                input_size,
                output_size,
            },
        );
    }
    TranscodeResult::Compressed(CompressedMedia {
        bytes: output,
        mime_type: codec.mime_type.to_string(),
        file_name: with_extension(media.file_name(), codec.extension),
    })
}

async fn run<H: MediaHost + ?Sized>(
    host: &H,
    media: &SourceMedia,
    signals: &FormatSignals,
    settings: &Settings,
    progress: &mut ProgressTracker,
    cancel: &CancellationToken,
) -> TranscodeResult {
    let cs = &settings.compression;
    let passthrough = |reason| TranscodeResult::passthrough(media, reason);

    if media.size() < cs.compression_size_threshold {
        return passthrough(PassthroughReason::BelowThreshold);
    }
    host.prepare().await;
    if !host.recording_supported() {
        log::warn!(
            target: "clip_ingest::transcode",
            "{}: host '{}' cannot record, uploading original",
            media.file_name(),
            host.name()
        );
        return passthrough(PassthroughReason::RecordingUnavailable);
    }
    if cancel.is_cancelled() {
        return passthrough(PassthroughReason::Cancelled);
    }

    let url = match host.create_object_url(media) {
        Ok(url) => url,
        Err(e) => {
            return passthrough(PassthroughReason::DecodeFailed {
                message: e.summary(),
            });
        }
    };
    let window = settings.timeouts.probe_window(signals.likely_hevc);
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return passthrough(PassthroughReason::Cancelled),
        opened = timeout(window, open_surface_with_metadata(host, &url)) => opened,
    };
    let (mut surface, meta) = match opened {
        Ok(Ok(opened)) => opened,
        Ok(Err(e)) => {
            log::warn!(
                target: "clip_ingest::transcode",
                "{}: cannot decode ({}), uploading original",
                media.file_name(),
                e
            );
            return passthrough(PassthroughReason::DecodeFailed { message: e.message });
        }
        Err(_) => {
            log::warn!(
                target: "clip_ingest::transcode",
                "{}: no metadata after {:?}, uploading original",
                media.file_name(),
                window
            );
            return passthrough(PassthroughReason::MetadataTimeout);
        }
    };
    progress.metadata_ready();

    let Some((width, height)) = target_dimensions(meta.width, meta.height, cs.max_width, cs.max_height)
    else {
        log::warn!(
            target: "clip_ingest::transcode",
            "{}: invalid dimensions {}x{}",
            media.file_name(),
            meta.width,
            meta.height
        );
        return passthrough(PassthroughReason::InvalidDimensions);
    };

    let Some(codec) = negotiate(|mime| host.is_type_supported(mime)) else {
        log::warn!(
            target: "clip_ingest::transcode",
            "{}: no supported recorder codec",
            media.file_name()
        );
        return passthrough(PassthroughReason::NoSupportedCodec);
    };

    let mut canvas = match host.create_canvas(width, height) {
        Ok(canvas) => canvas,
        Err(e) => {
            return passthrough(PassthroughReason::CanvasUnavailable {
                message: e.summary(),
            });
        }
    };

    let duration = sanitize_duration(meta.duration);
    let stream = build_capture_stream(
        surface.as_mut(),
        canvas.capture_track(cs.frame_rate),
        media.file_name(),
    );
    let config = RecorderConfig {
        mime_type: codec.mime_type.to_string(),
        video_bitrate: video_bitrate_budget(cs, duration),
        audio_bitrate: cs.audio_bitrate,
        frame_rate: cs.frame_rate,
    };
    log::info!(
        target: "clip_ingest::transcode",
        "{}: {}x{} -> {}x{}, {}, {} bps, duration {:?}",
        media.file_name(),
        meta.width,
        meta.height,
        width,
        height,
        codec.label,
        config.video_bitrate,
        duration
    );

    let mut recorder = match host.create_recorder(stream, config) {
        Ok(recorder) => recorder,
        Err(e) => {
            return passthrough(PassthroughReason::RecorderFailed {
                message: e.summary(),
            });
        }
    };
    let grace = settings.timeouts.watchdog_buffer;
    match timeout(grace, recorder.start()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            return passthrough(PassthroughReason::RecorderFailed {
                message: e.summary(),
            });
        }
        Err(_) => {
            log::warn!(
                target: "clip_ingest::transcode",
                "{}: recorder did not start within {:?}",
                media.file_name(),
                grace
            );
            return passthrough(PassthroughReason::RecorderFailed {
                message: format!("recorder did not start within {:?}", grace),
            });
        }
    }
    progress.recording_started();

    let end = run_capture(
        surface.as_mut(),
        canvas.as_mut(),
        recorder.as_mut(),
        progress,
        duration,
        settings.watchdog(),
        cancel,
    )
    .await;
    drop(surface);

    if end.keeps_output() {
        progress.finalizing();
    }
    // The recorder may still be reading audio from the source file.
    let stopped = match timeout(grace, recorder.stop()).await {
        Ok(stopped) => stopped,
        Err(_) => {
            log::warn!(
                target: "clip_ingest::transcode",
                "{}: recorder did not stop within {:?}, discarding output",
                media.file_name(),
                grace
            );
            Err(HostError::InvalidState(format!(
                "recorder did not stop within {:?}",
                grace
            )))
        }
    };
    drop(recorder);
    drop(url);

    match end {
        CaptureEnd::Cancelled => passthrough(PassthroughReason::Cancelled),
        CaptureEnd::DecodeFailed(e) => passthrough(PassthroughReason::DecodeFailed { message: e.message }),
        CaptureEnd::RecorderFailed(e) => passthrough(PassthroughReason::RecorderFailed {
            message: e.summary(),
        }),
        CaptureEnd::Ended | CaptureEnd::DrawFailed(_) | CaptureEnd::Watchdog => match stopped {
            Ok(chunks) => decide_output(media, Bytes::from(chunks.concat()), &codec),
            Err(e) => passthrough(PassthroughReason::RecorderFailed {
                message: e.summary(),
            }),
        },
    }
}

pub async fn compress<H: MediaHost + ?Sized>(
    host: &H,
    media: &SourceMedia,
    signals: &FormatSignals,
    settings: &Settings,
    options: CompressOptions,
) -> TranscodeResult {
    let mut progress = ProgressTracker::new(options.on_progress);
    let cancel = options.cancel.unwrap_or_else(CancellationToken::new);

    let result = run(host, media, signals, settings, &mut progress, &cancel).await;
    progress.finish();

    match &result {
        TranscodeResult::Compressed(out) => log::info!(
            target: "clip_ingest::transcode",
            "{}: compressed {} -> {} bytes ({})",
            media.file_name(),
            media.size(),
            out.size(),
            out.mime_type
        ),
        TranscodeResult::Passthrough(p) => log::info!(
            target: "clip_ingest::transcode",
            "{}: passthrough ({:?})",
            media.file_name(),
            p.reason
        ),
    }
    result
}
