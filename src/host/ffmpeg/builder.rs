use std::collections::HashMap;
use std::sync::LazyLock;

/// Output container the recorder muxes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Muxer {
    WebM,
    Mp4,
}

impl Muxer {
    fn format_name(self) -> &'static str {
        match self {
            Muxer::WebM => "webm",
            Muxer::Mp4 => "mp4",
        }
    }
}

/// FFmpeg encoders that realise one recorder MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderChoice {
    pub muxer: Muxer,
    pub video: &'static str,
    pub audio: &'static str,
}

/// libvpx speed settings for live capture: (deadline, cpu-used).
static VPX_REALTIME_SPEED: LazyLock<HashMap<&'static str, (&'static str, &'static str)>> =
    LazyLock::new(|| {
        [("libvpx-vp9", ("realtime", "8")), ("libvpx", ("realtime", "8"))]
            .into_iter()
            .collect()
    });

fn video_encoder_for(token: &str) -> Option<&'static str> {
    match token {
        "vp9" => Some("libvpx-vp9"),
        t if t.starts_with("vp09") => Some("libvpx-vp9"),
        "vp8" => Some("libvpx"),
        "h264" => Some("libx264"),
        t if t.starts_with("avc1") || t.starts_with("avc3") => Some("libx264"),
        _ => None,
    }
}

fn audio_encoder_for(token: &str) -> Option<&'static str> {
    match token {
        "opus" => Some("libopus"),
        "vorbis" => Some("libvorbis"),
        "aac" => Some("aac"),
        t if t.starts_with("mp4a") => Some("aac"),
        _ => None,
    }
}

/// Map a recorder MIME type such as `video/webm;codecs=vp9,opus` to encoders.
/// Bare container types get the container's default pair. Any codec token this
/// host cannot encode makes the whole type unsupported.
pub fn encoders_for_mime(mime_type: &str) -> Option<EncoderChoice> {
    let mut parts = mime_type.split(';');
    let base = parts.next()?.trim().to_ascii_lowercase();
    let (muxer, default_video, default_audio) = match base.as_str() {
        "video/webm" => (Muxer::WebM, "libvpx", "libopus"),
        "video/mp4" => (Muxer::Mp4, "libx264", "aac"),
        _ => return None,
    };

    let codecs: Vec<String> = parts
        .filter_map(|p| {
            let (key, value) = p.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("codecs")
                .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
        })
        .flat_map(|v| {
            v.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
        })
        .collect();

    let mut video = None;
    let mut audio = None;
    for token in &codecs {
        if let Some(v) = video_encoder_for(token) {
            video = Some(v);
        } else if let Some(a) = audio_encoder_for(token) {
            audio = Some(a);
        } else {
            return None;
        }
    }

    Some(EncoderChoice {
        muxer,
        video: video.unwrap_or(default_video),
        audio: audio.unwrap_or(default_audio),
    })
}

fn fps_arg(fps: f64) -> String {
    let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
    format!("{}", (fps * 1000.0).round() / 1000.0)
}

/// Decoder command: raw RGBA frames of exactly `width`x`height` at `fps` on stdout,
/// starting at `start_seconds`.
pub fn build_decode_command(
    input_path: &str,
    start_seconds: f64,
    width: u32,
    height: u32,
    fps: f64,
) -> Vec<String> {
    let mut args = vec!["-nostdin".to_string(), "-v".to_string(), "error".to_string()];
    if start_seconds > 0.0 {
        args.extend(["-ss".to_string(), format!("{:.3}", start_seconds)]);
    }
    args.extend([
        "-i".to_string(),
        input_path.to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-an".to_string(),
        "-vf".to_string(),
        format!("fps={},scale={}:{}", fps_arg(fps), width, height),
        "-pix_fmt".to_string(),
        "rgba".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "pipe:1".to_string(),
    ]);
    args
}

#[derive(Debug, Clone)]
pub struct RecordCommand<'a> {
    pub encoders: EncoderChoice,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub video_bitrate: u32,
    pub audio_bitrate: u32,
    /// File to pull the original audio from; `None` records silent video.
    pub audio_source: Option<&'a str>,
}

/// Recorder command: raw RGBA frames in on stdin, muxed stream out on stdout.
pub fn build_record_command(cmd: &RecordCommand<'_>) -> Vec<String> {
    let enc = cmd.encoders;
    log::debug!(
        target: "clip_ingest::host::ffmpeg::builder",
        "Building recorder command: video={}, audio={}, {}x{} @ {} fps, {} bps",
        enc.video,
        if cmd.audio_source.is_some() { enc.audio } else { "none" },
        cmd.width,
        cmd.height,
        fps_arg(cmd.fps),
        cmd.video_bitrate
    );

    let mut args = vec![
        "-nostdin".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgba".to_string(),
        "-s".to_string(),
        format!("{}x{}", cmd.width, cmd.height),
        "-r".to_string(),
        fps_arg(cmd.fps),
        "-i".to_string(),
        "pipe:0".to_string(),
    ];

    if let Some(source) = cmd.audio_source {
        // `?` keeps an assumed-but-absent audio track from failing the mux.
        args.extend([
            "-i".to_string(),
            source.to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0?".to_string(),
            "-c:a".to_string(),
            enc.audio.to_string(),
            "-b:a".to_string(),
            format!("{}k", (cmd.audio_bitrate / 1000).max(8)),
            "-shortest".to_string(),
        ]);
    } else {
        args.push("-an".to_string());
    }

    args.extend([
        "-c:v".to_string(),
        enc.video.to_string(),
        "-b:v".to_string(),
        format!("{}k", (cmd.video_bitrate / 1000).max(1)),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]);

    if let Some((deadline, cpu_used)) = VPX_REALTIME_SPEED.get(enc.video) {
        args.extend([
            "-deadline".to_string(),
            deadline.to_string(),
            "-cpu-used".to_string(),
            cpu_used.to_string(),
        ]);
        if enc.video == "libvpx-vp9" {
            args.extend(["-row-mt".to_string(), "1".to_string()]);
        }
    } else if enc.video == "libx264" {
        args.extend([
            "-preset".to_string(),
            "veryfast".to_string(),
            "-profile:v".to_string(),
            "baseline".to_string(),
        ]);
    }

    if enc.muxer == Muxer::Mp4 {
        // Plain mp4 needs a seekable output for the moov atom.
        args.extend([
            "-movflags".to_string(),
            "frag_keyframe+empty_moov+default_base_moof".to_string(),
        ]);
    }

    args.extend([
        "-f".to_string(),
        enc.muxer.format_name().to_string(),
        "pipe:1".to_string(),
    ]);
    args
}

/// One option per line, value kept next to its flag. For debug logs.
pub fn format_args_for_display_multiline(args: &[String]) -> String {
    let mut lines = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if arg.starts_with('-') && i + 1 < args.len() && !args[i + 1].starts_with('-') {
            lines.push(format!("  {} {}", arg, args[i + 1]));
            i += 2;
        } else {
            lines.push(format!("  {}", arg));
            i += 1;
        }
    }
    lines.join("\n")
}
