#![allow(dead_code)]

//! Scripted, resource-tracking media host for pipeline tests.
//!
//! Every object URL, surface, canvas, capture stream and recorder the fake
//! hands out bumps a live counter that its drop decrements, so a test can
//! assert that a call released everything it acquired.

use std::future::pending;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use clip_ingest::error::{DecodeError, DecodeErrorCode, DrawError, HostError};
use clip_ingest::host::{
    AudioTrack, Canvas, CaptureStream, DecodeSurface, MediaHost, ObjectUrl, Recorder,
    RecorderConfig, ReleaseHook, StillFormat, SurfaceMetadata, VideoFrame, VideoTrack,
};
use clip_ingest::{ProgressUpdate, Settings, SourceMedia};

pub const MB: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    ObjectUrl,
    Surface,
    Canvas,
    Stream,
    Recorder,
}

const ALL_RESOURCES: [Resource; 5] = [
    Resource::ObjectUrl,
    Resource::Surface,
    Resource::Canvas,
    Resource::Stream,
    Resource::Recorder,
];

#[derive(Debug, Default)]
pub struct Counters {
    live: [AtomicUsize; 5],
    created: [AtomicUsize; 5],
}

impl Counters {
    fn index(resource: Resource) -> usize {
        resource as usize
    }

    pub fn live(&self, resource: Resource) -> usize {
        self.live[Self::index(resource)].load(Ordering::SeqCst)
    }

    pub fn created(&self, resource: Resource) -> usize {
        self.created[Self::index(resource)].load(Ordering::SeqCst)
    }

    pub fn total_live(&self) -> usize {
        ALL_RESOURCES.iter().map(|r| self.live(*r)).sum()
    }

    pub fn total_created(&self) -> usize {
        ALL_RESOURCES.iter().map(|r| self.created(*r)).sum()
    }
}

fn track(counters: &Arc<Counters>, resource: Resource) -> ReleaseHook {
    let i = Counters::index(resource);
    counters.live[i].fetch_add(1, Ordering::SeqCst);
    counters.created[i].fetch_add(1, Ordering::SeqCst);
    let counters = Arc::clone(counters);
    ReleaseHook::new(move || {
        counters.live[i].fetch_sub(1, Ordering::SeqCst);
    })
}

#[derive(Debug, Clone)]
pub enum MetadataScript {
    Ready { duration: f64, width: u32, height: u32 },
    Fail(DecodeErrorCode),
    Hang,
}

/// What the surface does after its scripted frames run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Eos,
    DecodeError,
    /// Deliver one frame whose buffer does not match its dimensions.
    BadFrame,
    Hang,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioScript {
    Tracks(usize),
    Unknown,
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct Script {
    pub metadata: MetadataScript,
    pub seek_hangs: bool,
    pub seek_fails: bool,
    pub frames: usize,
    pub frame_interval: f64,
    pub end: StreamEnd,
    pub audio: AudioScript,
    pub recording_supported: bool,
    /// `None` supports every candidate.
    pub supported_types: Option<Vec<&'static str>>,
    pub output_bytes_per_frame: usize,
    pub recorder_start_fails: bool,
    pub recorder_start_hangs: bool,
    pub recorder_stop_hangs: bool,
    pub recorder_write_fails_at: Option<usize>,
    pub canvas_fails: bool,
    pub encode_fails: bool,
    pub object_url_fails: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            metadata: MetadataScript::Ready {
                duration: 3.0,
                width: 64,
                height: 48,
            },
            seek_hangs: false,
            seek_fails: false,
            frames: 90,
            frame_interval: 1.0 / 30.0,
            end: StreamEnd::Eos,
            audio: AudioScript::Tracks(1),
            recording_supported: true,
            supported_types: None,
            output_bytes_per_frame: 10,
            recorder_start_fails: false,
            recorder_start_hangs: false,
            recorder_stop_hangs: false,
            recorder_write_fails_at: None,
            canvas_fails: false,
            encode_fails: false,
            object_url_fails: false,
        }
    }
}

/// What a recorder was created with.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingLog {
    pub mime_type: String,
    pub video: Option<VideoTrack>,
    pub audio: Vec<AudioTrack>,
    pub video_bitrate: u32,
}

pub struct FakeHost {
    script: Script,
    counters: Arc<Counters>,
    recordings: Mutex<Vec<RecordingLog>>,
    type_queries: Mutex<Vec<String>>,
    prepared: AtomicUsize,
}

impl FakeHost {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            counters: Arc::new(Counters::default()),
            recordings: Mutex::new(Vec::new()),
            type_queries: Mutex::new(Vec::new()),
            prepared: AtomicUsize::new(0),
        }
    }

    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    pub fn recordings(&self) -> Vec<RecordingLog> {
        self.recordings.lock().clone()
    }

    pub fn type_queries(&self) -> Vec<String> {
        self.type_queries.lock().clone()
    }

    pub fn prepare_calls(&self) -> usize {
        self.prepared.load(Ordering::SeqCst)
    }

    pub fn assert_all_released(&self) {
        for r in ALL_RESOURCES {
            assert_eq!(self.counters.live(r), 0, "{:?} still live", r);
        }
    }
}

#[async_trait]
impl MediaHost for FakeHost {
    fn name(&self) -> &str {
        "fake"
    }

    async fn prepare(&self) {
        self.prepared.fetch_add(1, Ordering::SeqCst);
    }

    fn create_object_url(&self, media: &SourceMedia) -> Result<ObjectUrl, HostError> {
        if self.script.object_url_fails {
            return Err(HostError::Unsupported("object urls disabled".into()));
        }
        Ok(ObjectUrl::new(
            format!("fake://{}", media.file_name()),
            track(&self.counters, Resource::ObjectUrl),
        ))
    }

    async fn open_surface(&self, _url: &ObjectUrl) -> Result<Box<dyn DecodeSurface>, HostError> {
        Ok(Box::new(FakeSurface {
            script: self.script.clone(),
            counters: Arc::clone(&self.counters),
            delivered: 0,
            base: 0.0,
            position: 0.0,
            _live: track(&self.counters, Resource::Surface),
        }))
    }

    fn create_canvas(&self, width: u32, height: u32) -> Result<Box<dyn Canvas>, HostError> {
        if self.script.canvas_fails {
            return Err(HostError::Unsupported("no offscreen canvas".into()));
        }
        Ok(Box::new(FakeCanvas {
            width,
            height,
            pixels: vec![0u8; VideoFrame::expected_len(width, height)],
            encode_fails: self.script.encode_fails,
            _live: track(&self.counters, Resource::Canvas),
        }))
    }

    // Like the FFmpeg host, capabilities are only known once discovery ran.
    fn recording_supported(&self) -> bool {
        self.prepare_calls() > 0 && self.script.recording_supported
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        if self.prepare_calls() == 0 {
            return false;
        }
        self.type_queries.lock().push(mime_type.to_string());
        match &self.script.supported_types {
            None => true,
            Some(types) => types.contains(&mime_type),
        }
    }

    fn create_recorder(
        &self,
        stream: CaptureStream,
        config: RecorderConfig,
    ) -> Result<Box<dyn Recorder>, HostError> {
        self.recordings.lock().push(RecordingLog {
            mime_type: config.mime_type.clone(),
            video: stream.video,
            audio: stream.audio.clone(),
            video_bitrate: config.video_bitrate,
        });
        Ok(Box::new(FakeRecorder {
            mime_type: config.mime_type,
            active: false,
            frames: 0,
            bytes_per_frame: self.script.output_bytes_per_frame,
            start_fails: self.script.recorder_start_fails,
            start_hangs: self.script.recorder_start_hangs,
            stop_hangs: self.script.recorder_stop_hangs,
            write_fails_at: self.script.recorder_write_fails_at,
            _stream: stream,
            _live: track(&self.counters, Resource::Recorder),
        }))
    }
}

struct FakeSurface {
    script: Script,
    counters: Arc<Counters>,
    delivered: usize,
    base: f64,
    position: f64,
    _live: ReleaseHook,
}

impl FakeSurface {
    fn dims(&self) -> (u32, u32) {
        match self.script.metadata {
            MetadataScript::Ready { width, height, .. } => (width, height),
            _ => (0, 0),
        }
    }
}

#[async_trait]
impl DecodeSurface for FakeSurface {
    async fn load_metadata(&mut self) -> Result<SurfaceMetadata, DecodeError> {
        match self.script.metadata.clone() {
            MetadataScript::Ready {
                duration,
                width,
                height,
            } => Ok(SurfaceMetadata {
                duration,
                width,
                height,
            }),
            MetadataScript::Fail(code) => Err(DecodeError::new(code, "scripted decode failure")),
            MetadataScript::Hang => pending().await,
        }
    }

    async fn seek(&mut self, seconds: f64) -> Result<(), DecodeError> {
        if self.script.seek_hangs {
            return pending().await;
        }
        // Like the FFmpeg surface, a source without a picture cannot be decoded.
        let (width, height) = self.dims();
        if width == 0 || height == 0 {
            return Err(DecodeError::new(
                DecodeErrorCode::SrcNotSupported,
                "source has no decodable video stream",
            ));
        }
        if self.script.seek_fails {
            return Err(DecodeError::new(DecodeErrorCode::Decode, "scripted seek failure"));
        }
        self.base = seconds;
        self.position = seconds;
        self.delivered = 0;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<VideoFrame>, DecodeError> {
        let (width, height) = self.dims();
        if self.delivered < self.script.frames {
            let timestamp = self.base + self.delivered as f64 * self.script.frame_interval;
            self.delivered += 1;
            self.position = timestamp;
            return Ok(Some(VideoFrame {
                width,
                height,
                timestamp,
                data: vec![0u8; VideoFrame::expected_len(width, height)],
            }));
        }
        match self.script.end {
            StreamEnd::Eos => Ok(None),
            StreamEnd::DecodeError => Err(DecodeError::new(
                DecodeErrorCode::Decode,
                "scripted mid-stream failure",
            )),
            StreamEnd::BadFrame => Ok(Some(VideoFrame {
                width,
                height,
                timestamp: self.position,
                data: vec![0u8; 3],
            })),
            StreamEnd::Hang => pending().await,
        }
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn capture_stream(&mut self) -> Result<CaptureStream, HostError> {
        let audio = match self.script.audio {
            AudioScript::Tracks(n) => (0..n)
                .map(|i| AudioTrack {
                    source: format!("fake://audio/{}", i),
                    assumed: false,
                })
                .collect(),
            AudioScript::Unknown => vec![AudioTrack {
                source: "fake://audio/assumed".into(),
                assumed: true,
            }],
            AudioScript::Unavailable => {
                return Err(HostError::Unsupported("captureStream".into()));
            }
        };
        Ok(CaptureStream::new(
            None,
            audio,
            track(&self.counters, Resource::Stream),
        ))
    }
}

struct FakeCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    encode_fails: bool,
    _live: ReleaseHook,
}

impl Canvas for FakeCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn draw_frame(&mut self, frame: &VideoFrame) -> Result<(), DrawError> {
        if frame.data.len() != VideoFrame::expected_len(frame.width, frame.height) {
            return Err(DrawError("frame buffer size mismatch".into()));
        }
        Ok(())
    }

    fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn encode_still(&self, format: StillFormat) -> Result<Vec<u8>, HostError> {
        if self.encode_fails {
            return Err(HostError::Encode("scripted encode failure".into()));
        }
        match format {
            StillFormat::Jpeg { .. } => Ok(vec![0xFF, 0xD8, 0xFF, 0xD9]),
            StillFormat::Png => Ok(b"\x89PNG".to_vec()),
        }
    }
}

struct FakeRecorder {
    mime_type: String,
    active: bool,
    frames: usize,
    bytes_per_frame: usize,
    start_fails: bool,
    start_hangs: bool,
    stop_hangs: bool,
    write_fails_at: Option<usize>,
    _stream: CaptureStream,
    _live: ReleaseHook,
}

#[async_trait]
impl Recorder for FakeRecorder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn is_active(&self) -> bool {
        self.active
    }

    async fn start(&mut self) -> Result<(), HostError> {
        if self.start_hangs {
            return pending().await;
        }
        if self.start_fails {
            return Err(HostError::Unsupported("scripted recorder start failure".into()));
        }
        self.active = true;
        Ok(())
    }

    async fn write_frame(&mut self, _rgba: &[u8], _timestamp: f64) -> Result<(), HostError> {
        if self.write_fails_at == Some(self.frames) {
            self.active = false;
            return Err(HostError::ffmpeg_failed(1, "scripted write failure"));
        }
        self.frames += 1;
        Ok(())
    }

    async fn stop(&mut self) -> Result<Vec<Vec<u8>>, HostError> {
        self.active = false;
        if self.stop_hangs {
            return pending().await;
        }
        let total = self.frames * self.bytes_per_frame;
        if total == 0 {
            return Ok(Vec::new());
        }
        // Two chunks so assembly is exercised.
        let first = total / 2;
        Ok(vec![vec![7u8; first], vec![7u8; total - first]])
    }
}

/// Settings with a small compression threshold so tests can use small inputs.
pub fn small_settings() -> Arc<Settings> {
    let mut settings = Settings::default();
    settings.compression.compression_size_threshold = 1024;
    Arc::new(settings)
}

pub fn media(size: usize, mime: &str, name: &str) -> SourceMedia {
    SourceMedia::new(vec![1u8; size], mime, name)
}

/// Collects every progress update.
pub fn progress_sink() -> (
    impl Fn(ProgressUpdate) + Send + Sync + 'static,
    Arc<Mutex<Vec<ProgressUpdate>>>,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (move |u| sink.lock().push(u), seen)
}

pub fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}
