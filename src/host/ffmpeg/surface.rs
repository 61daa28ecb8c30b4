use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

use super::builder::build_decode_command;
use super::error::decode_error_from_stderr;
use super::ffprobe::{probe_source, SourceInfo};
use super::StderrTail;
use crate::error::{DecodeError, DecodeErrorCode, HostError};
use crate::host::{
    AudioTrack, CaptureStream, DecodeSurface, ReleaseHook, SurfaceMetadata, VideoFrame,
};

/// One ffmpeg process streaming raw RGBA frames from a start offset.
struct Decoder {
    child: Child,
    stdout: ChildStdout,
    stderr: StderrTail,
    width: u32,
    height: u32,
    next_timestamp: f64,
    frame_interval: f64,
}

impl Decoder {
    fn spawn(
        ffmpeg: &Path,
        source: &Path,
        start: f64,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Result<Self, DecodeError> {
        let args = build_decode_command(&source.to_string_lossy(), start, width, height, fps);
        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DecodeError::new(
                    DecodeErrorCode::Aborted,
                    format!("Failed to spawn FFmpeg decoder: {}", e),
                )
            })?;
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(DecodeError::new(
                DecodeErrorCode::Aborted,
                "Failed to capture decoder output",
            ));
        };
        Ok(Self {
            child,
            stdout,
            stderr: StderrTail::spawn(stderr),
            width,
            height,
            next_timestamp: start.max(0.0),
            frame_interval: 1.0 / fps,
        })
    }

    async fn read_frame(&mut self) -> Result<Option<VideoFrame>, DecodeError> {
        let mut data = vec![0u8; VideoFrame::expected_len(self.width, self.height)];
        match self.stdout.read_exact(&mut data).await {
            Ok(_) => {
                let timestamp = self.next_timestamp;
                self.next_timestamp += self.frame_interval;
                Ok(Some(VideoFrame {
                    width: self.width,
                    height: self.height,
                    timestamp,
                    data,
                }))
            }
            // A trailing partial frame is dropped with the rest of the stream.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => self.finish().await,
            Err(e) => Err(DecodeError::new(DecodeErrorCode::Decode, e.to_string())),
        }
    }

    async fn finish(&mut self) -> Result<Option<VideoFrame>, DecodeError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| DecodeError::new(DecodeErrorCode::Aborted, e.to_string()))?;
        if status.success() {
            return Ok(None);
        }
        let stderr = self.stderr.finish().await;
        log::debug!(
            target: "clip_ingest::host::ffmpeg::surface",
            "decoder exited with {:?}: {}",
            status.code(),
            stderr
        );
        Err(decode_error_from_stderr(&stderr))
    }
}

pub(super) struct FfmpegSurface {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    source: PathBuf,
    frame_rate: f64,
    info: Option<SourceInfo>,
    decoder: Option<Decoder>,
    pending: Option<VideoFrame>,
    position: f64,
}

impl FfmpegSurface {
    pub(super) fn new(ffmpeg: PathBuf, ffprobe: PathBuf, source: PathBuf, frame_rate: f64) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            source,
            frame_rate,
            info: None,
            decoder: None,
            pending: None,
            position: 0.0,
        }
    }

    async fn info(&mut self) -> Result<&SourceInfo, DecodeError> {
        if self.info.is_none() {
            self.info = Some(probe_source(&self.ffprobe, &self.source).await?);
        }
        self.info
            .as_ref()
            .ok_or_else(|| DecodeError::new(DecodeErrorCode::Aborted, "metadata unavailable"))
    }

    async fn start_decoder(&mut self, start: f64) -> Result<(), DecodeError> {
        let info = self.info().await?;
        if !info.has_video() {
            return Err(DecodeError::new(
                DecodeErrorCode::SrcNotSupported,
                "source has no decodable video stream",
            ));
        }
        let (width, height) = (info.width, info.height);
        // Replacing the old decoder drops it, which kills its process.
        self.decoder = Some(Decoder::spawn(
            &self.ffmpeg,
            &self.source,
            start,
            width,
            height,
            self.frame_rate,
        )?);
        Ok(())
    }
}

#[async_trait]
impl DecodeSurface for FfmpegSurface {
    async fn load_metadata(&mut self) -> Result<SurfaceMetadata, DecodeError> {
        let info = self.info().await?;
        Ok(SurfaceMetadata {
            duration: info.duration.unwrap_or(f64::NAN),
            width: info.width,
            height: info.height,
        })
    }

    async fn seek(&mut self, seconds: f64) -> Result<(), DecodeError> {
        self.pending = None;
        self.start_decoder(seconds).await?;
        let first = match self.decoder.as_mut() {
            Some(decoder) => decoder.read_frame().await?,
            None => None,
        };
        match first {
            Some(frame) => {
                self.position = frame.timestamp;
                self.pending = Some(frame);
                Ok(())
            }
            None => Err(DecodeError::new(
                DecodeErrorCode::Decode,
                format!("no frame at {:.3}s", seconds),
            )),
        }
    }

    async fn next_frame(&mut self) -> Result<Option<VideoFrame>, DecodeError> {
        if let Some(frame) = self.pending.take() {
            self.position = frame.timestamp;
            return Ok(Some(frame));
        }
        if self.decoder.is_none() {
            self.start_decoder(self.position).await?;
        }
        let frame = match self.decoder.as_mut() {
            Some(decoder) => decoder.read_frame().await?,
            None => None,
        };
        if let Some(frame) = &frame {
            self.position = frame.timestamp;
        }
        Ok(frame)
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn capture_stream(&mut self) -> Result<CaptureStream, HostError> {
        let info = self
            .info
            .as_ref()
            .ok_or_else(|| HostError::InvalidState("metadata not loaded".to_string()))?;
        let source = self.source.to_string_lossy().into_owned();
        let audio = match info.audio_streams {
            Some(0) => Vec::new(),
            Some(_) => vec![AudioTrack {
                source,
                assumed: false,
            }],
            // Unknown: report a track rather than risk dropping real audio.
            None => vec![AudioTrack {
                source,
                assumed: true,
            }],
        };
        Ok(CaptureStream::new(None, audio, ReleaseHook::none()))
    }
}
