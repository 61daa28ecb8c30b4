//! Media runtime abstraction.
//!
//! The pipeline never touches a decoder or encoder directly. It asks a
//! [`MediaHost`] for request-scoped resources: an object URL for the source
//! bytes, a decode surface, an offscreen canvas, a capture stream and a
//! recorder. Every resource releases itself on drop, so a call that returns
//! early through `?` or a timeout still tears down everything it acquired.

pub mod canvas;
pub mod ffmpeg;

use std::fmt;

use async_trait::async_trait;

use crate::error::{DecodeError, DrawError, HostError};
use crate::media::SourceMedia;

pub use canvas::RgbaCanvas;

/// Runs a release action exactly once, when dropped.
#[derive(Default)]
pub struct ReleaseHook(Option<Box<dyn FnOnce() + Send + Sync>>);

impl ReleaseHook {
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self(Some(Box::new(release)))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl Drop for ReleaseHook {
    fn drop(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

impl fmt::Debug for ReleaseHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() { "ReleaseHook(armed)" } else { "ReleaseHook(empty)" })
    }
}

/// A host-side handle to the source bytes that a decode surface can open.
/// Revoked on drop.
#[derive(Debug)]
pub struct ObjectUrl {
    href: String,
    _revoke: ReleaseHook,
}

impl ObjectUrl {
    pub fn new(href: impl Into<String>, revoke: ReleaseHook) -> Self {
        Self {
            href: href.into(),
            _revoke: revoke,
        }
    }

    pub fn href(&self) -> &str {
        &self.href
    }
}

/// What a decode surface knows once metadata has loaded. Values are raw:
/// duration may be NaN or infinite, dimensions may be zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMetadata {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

/// One decoded frame, tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Presentation time in seconds on the surface's playback clock.
    pub timestamp: f64,
    pub data: Vec<u8>,
}

impl VideoFrame {
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoTrack {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    /// Where the recorder can pull the original audio from.
    pub source: String,
    /// True when the host could not tell whether audio exists and reported a
    /// track anyway.
    pub assumed: bool,
}

/// A set of live tracks handed to a recorder. Released on drop.
#[derive(Debug, Default)]
pub struct CaptureStream {
    pub video: Option<VideoTrack>,
    pub audio: Vec<AudioTrack>,
    _release: ReleaseHook,
}

impl CaptureStream {
    pub fn new(video: Option<VideoTrack>, audio: Vec<AudioTrack>, release: ReleaseHook) -> Self {
        Self {
            video,
            audio,
            _release: release,
        }
    }

    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
    }

    /// Keep this stream's audio tracks and replace its video with `video`.
    /// The release hook moves with it.
    pub fn with_video(mut self, video: VideoTrack) -> Self {
        self.video = Some(video);
        self
    }

    /// Drop every audio track, keeping the release hook.
    pub fn without_audio(mut self) -> Self {
        self.audio.clear();
        self
    }
}

/// Still-image formats a canvas can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StillFormat {
    Jpeg { quality: u8 },
    Png,
}

impl StillFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            StillFormat::Jpeg { .. } => "image/jpeg",
            StillFormat::Png => "image/png",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    pub mime_type: String,
    pub video_bitrate: u32,
    pub audio_bitrate: u32,
    pub frame_rate: f64,
}

/// Source of decoded frames for one file.
#[async_trait]
pub trait DecodeSurface: Send {
    /// Resolves on the first metadata signal.
    async fn load_metadata(&mut self) -> Result<SurfaceMetadata, DecodeError>;

    /// Resolves once the surface has a frame ready at `seconds`.
    async fn seek(&mut self, seconds: f64) -> Result<(), DecodeError>;

    /// Next frame on the playback clock; `None` at end of stream.
    async fn next_frame(&mut self) -> Result<Option<VideoFrame>, DecodeError>;

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// A live stream of the surface's own tracks. Used for its audio.
    fn capture_stream(&mut self) -> Result<CaptureStream, HostError>;
}

/// Offscreen drawing target.
pub trait Canvas: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Paint `frame` scaled to the canvas size.
    fn draw_frame(&mut self, frame: &VideoFrame) -> Result<(), DrawError>;

    /// Current pixels, RGBA8.
    fn pixels(&self) -> &[u8];

    fn encode_still(&self, format: StillFormat) -> Result<Vec<u8>, HostError>;

    fn capture_track(&self, frame_rate: f64) -> VideoTrack {
        VideoTrack {
            width: self.width(),
            height: self.height(),
            frame_rate,
        }
    }
}

/// Encoder/muxer fed with canvas frames; audio is pulled from the stream's tracks.
#[async_trait]
pub trait Recorder: Send {
    fn mime_type(&self) -> &str;

    fn is_active(&self) -> bool;

    async fn start(&mut self) -> Result<(), HostError>;

    async fn write_frame(&mut self, rgba: &[u8], timestamp: f64) -> Result<(), HostError>;

    /// Flush and stop. Returns the buffered output chunks in order.
    async fn stop(&mut self) -> Result<Vec<Vec<u8>>, HostError>;
}

/// Factory for the request-scoped media resources.
#[async_trait]
pub trait MediaHost: Send + Sync {
    fn name(&self) -> &str;

    /// Slow capability discovery. Runs before `recording_supported` and
    /// `is_type_supported`, which must answer without blocking.
    async fn prepare(&self) {}

    fn create_object_url(&self, media: &SourceMedia) -> Result<ObjectUrl, HostError>;

    async fn open_surface(&self, url: &ObjectUrl) -> Result<Box<dyn DecodeSurface>, HostError>;

    fn create_canvas(&self, width: u32, height: u32) -> Result<Box<dyn Canvas>, HostError>;

    /// Whether the runtime can record at all.
    fn recording_supported(&self) -> bool;

    /// Capability probe for one output MIME type (with codecs parameter).
    fn is_type_supported(&self, mime_type: &str) -> bool;

    fn create_recorder(
        &self,
        stream: CaptureStream,
        config: RecorderConfig,
    ) -> Result<Box<dyn Recorder>, HostError>;
}
