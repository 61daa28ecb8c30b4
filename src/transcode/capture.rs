use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::progress::ProgressTracker;
use crate::error::{DecodeError, DrawError, HostError};
use crate::host::{Canvas, CaptureStream, DecodeSurface, Recorder, ReleaseHook, VideoTrack};

/// Why the capture loop stopped.
#[derive(Debug)]
pub(crate) enum CaptureEnd {
    /// Surface reached end of stream.
    Ended,
    DrawFailed(DrawError),
    /// Ran past the watchdog deadline. Output recorded so far is kept.
    Watchdog,
    Cancelled,
    DecodeFailed(DecodeError),
    RecorderFailed(HostError),
}

impl CaptureEnd {
    /// Whether the recorder's output is worth keeping.
    pub(crate) fn keeps_output(&self) -> bool {
        matches!(
            self,
            CaptureEnd::Ended | CaptureEnd::DrawFailed(_) | CaptureEnd::Watchdog
        )
    }
}

/// Capture stream for the recorder: the canvas video track plus whatever
/// audio the surface exposes. A surface that cannot produce a stream yields a
/// silent, canvas-only stream.
pub(crate) fn build_capture_stream(
    surface: &mut dyn DecodeSurface,
    video: VideoTrack,
    file_name: &str,
) -> CaptureStream {
    match surface.capture_stream() {
        Ok(stream) => {
            if stream.audio.iter().any(|t| t.assumed) {
                log::debug!(
                    target: "clip_ingest::transcode",
                    "{}: audio presence unknown, recording with an assumed track",
                    file_name
                );
            }
            stream.with_video(video)
        }
        Err(e) => {
            log::warn!(
                target: "clip_ingest::transcode",
                "{}: no capture stream from decoder ({}), recording without audio",
                file_name,
                e.summary()
            );
            CaptureStream::new(Some(video), Vec::new(), ReleaseHook::none())
        }
    }
}

/// Pull frames off the surface's playback clock, paint each onto the canvas
/// and feed the canvas to the recorder until a stop condition fires.
pub(crate) async fn run_capture(
    surface: &mut dyn DecodeSurface,
    canvas: &mut dyn Canvas,
    recorder: &mut dyn Recorder,
    progress: &mut ProgressTracker,
    duration: Option<f64>,
    watchdog: Duration,
    cancel: &CancellationToken,
) -> CaptureEnd {
    let deadline = tokio::time::sleep(watchdog);
    tokio::pin!(deadline);
    let mut frames = 0u64;

    let end = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break CaptureEnd::Cancelled,
            _ = &mut deadline => break CaptureEnd::Watchdog,
            next = surface.next_frame() => next,
        };
        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => break CaptureEnd::Ended,
            Err(e) => break CaptureEnd::DecodeFailed(e),
        };

        if let Err(e) = canvas.draw_frame(&frame) {
            break CaptureEnd::DrawFailed(e);
        }

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => break CaptureEnd::Cancelled,
            _ = &mut deadline => break CaptureEnd::Watchdog,
            written = recorder.write_frame(canvas.pixels(), frame.timestamp) => written,
        };
        if let Err(e) = written {
            break CaptureEnd::RecorderFailed(e);
        }
        if !recorder.is_active() {
            break CaptureEnd::RecorderFailed(HostError::InvalidState(
                "recorder went inactive".to_string(),
            ));
        }

        frames += 1;
        progress.captured(surface.current_time(), duration);
    };

    log::debug!(
        target: "clip_ingest::transcode",
        "capture stopped after {} frames at {:.3}s: {:?}",
        frames,
        surface.current_time(),
        end
    );
    end
}
