//! [`MediaHost`] backed by ffmpeg/ffprobe child processes.
//!
//! Object URLs are temp files holding the source bytes. A decode surface is an
//! ffprobe run plus an ffmpeg decoder streaming raw RGBA frames. A recorder is
//! an ffmpeg encoder fed raw frames on stdin that muxes the original audio from
//! the source file. Every child is spawned with `kill_on_drop`.

mod builder;
pub mod discovery;
mod error;
pub mod ffprobe;
mod recorder;
mod surface;

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::ChildStderr;
use tokio::task::JoinHandle;

pub use builder::{encoders_for_mime, EncoderChoice, Muxer};
pub use error::{parse_ffmpeg_error, FfmpegErrorPayload};

use self::builder::{build_record_command, format_args_for_display_multiline, RecordCommand};
use self::recorder::FfmpegRecorder;
use self::surface::FfmpegSurface;
use super::{
    Canvas, CaptureStream, DecodeSurface, MediaHost, ObjectUrl, Recorder, RecorderConfig,
    ReleaseHook, RgbaCanvas,
};
use crate::error::HostError;
use crate::media::SourceMedia;

const MAX_STDERR_BYTES: usize = 64 * 1024;
const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Bounded stderr capture for a child process. The reader task keeps
/// draining after the cap so the child never blocks on a full pipe.
pub(crate) struct StderrTail {
    buf: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl StderrTail {
    pub(crate) fn spawn(mut stderr: ChildStderr) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            let mut chunk = [0u8; 4096];
            loop {
                match stderr.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let mut guard = sink.lock();
                        let room = MAX_STDERR_BYTES.saturating_sub(guard.len());
                        guard.extend_from_slice(&chunk[..n.min(room)]);
                    }
                }
            }
        });
        Self {
            buf,
            task: Some(task),
        }
    }

    /// What has been captured so far.
    pub(crate) fn snapshot(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).trim().to_string()
    }

    /// Wait for the child to close stderr, then return everything captured.
    pub(crate) async fn finish(&mut self) -> String {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.snapshot()
    }
}

impl Drop for StderrTail {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// FFmpeg-process media host.
#[derive(Debug, Clone)]
pub struct FfmpegHost {
    frame_rate: f64,
}

impl Default for FfmpegHost {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_RATE)
    }
}

impl FfmpegHost {
    /// `frame_rate` is the rate decoders emit frames at; recorders are fed at
    /// the same rate so playback speed is preserved.
    pub fn new(frame_rate: f64) -> Self {
        let frame_rate = if frame_rate.is_finite() && frame_rate > 0.0 {
            frame_rate
        } else {
            DEFAULT_FRAME_RATE
        };
        Self { frame_rate }
    }
}

#[async_trait]
impl MediaHost for FfmpegHost {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn create_object_url(&self, media: &SourceMedia) -> Result<ObjectUrl, HostError> {
        let suffix = media
            .extension()
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("clip-ingest-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(media.bytes())?;
        file.flush()?;
        let href = file.path().to_string_lossy().into_owned();
        log::trace!(
            target: "clip_ingest::host::ffmpeg",
            "object url {} ({} bytes)",
            href,
            media.size()
        );
        Ok(ObjectUrl::new(href, ReleaseHook::new(move || drop(file))))
    }

    async fn prepare(&self) {
        if let Err(e) = discovery::warm_up().await {
            log::debug!(target: "clip_ingest::host::ffmpeg", "discovery: {}", e);
        }
    }

    async fn open_surface(&self, url: &ObjectUrl) -> Result<Box<dyn DecodeSurface>, HostError> {
        let ffmpeg = discovery::warm_up().await?;
        let ffprobe = discovery::get_ffprobe_path()?;
        Ok(Box::new(FfmpegSurface::new(
            ffmpeg.to_path_buf(),
            ffprobe,
            url.href().into(),
            self.frame_rate,
        )))
    }

    fn create_canvas(&self, width: u32, height: u32) -> Result<Box<dyn Canvas>, HostError> {
        Ok(Box::new(RgbaCanvas::new(width, height)?))
    }

    /// Answers from the discovery cache that `prepare` fills.
    fn recording_supported(&self) -> bool {
        discovery::cached_ffmpeg_path().is_some()
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        let Some(choice) = encoders_for_mime(mime_type) else {
            return false;
        };
        let Some(available) = discovery::cached_encoders() else {
            return false;
        };
        available.contains(choice.video) && available.contains(choice.audio)
    }

    fn create_recorder(
        &self,
        stream: CaptureStream,
        config: RecorderConfig,
    ) -> Result<Box<dyn Recorder>, HostError> {
        let video = stream.video.ok_or_else(|| {
            HostError::InvalidState("capture stream has no video track".to_string())
        })?;
        let encoders = encoders_for_mime(&config.mime_type)
            .ok_or_else(|| HostError::Unsupported(config.mime_type.clone()))?;
        let ffmpeg = discovery::cached_ffmpeg_path().ok_or_else(|| {
            HostError::FfmpegNotFound("FFmpeg has not been located yet".to_string())
        })?;

        let args = build_record_command(&RecordCommand {
            encoders,
            width: video.width,
            height: video.height,
            fps: video.frame_rate,
            video_bitrate: config.video_bitrate,
            audio_bitrate: config.audio_bitrate,
            audio_source: stream.audio.first().map(|t| t.source.as_str()),
        });
        log::debug!(
            target: "clip_ingest::host::ffmpeg",
            "recorder command:\n{}",
            format_args_for_display_multiline(&args)
        );

        Ok(Box::new(FfmpegRecorder::new(
            ffmpeg.to_path_buf(),
            args,
            config.mime_type,
            video,
            stream,
        )))
    }
}
