use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

use super::StderrTail;
use crate::error::HostError;
use crate::host::{CaptureStream, Recorder, VideoFrame, VideoTrack};

const OUTPUT_CHUNK_BYTES: usize = 256 * 1024;

type OutputTask = JoinHandle<std::io::Result<Vec<Vec<u8>>>>;

pub(super) struct FfmpegRecorder {
    ffmpeg: PathBuf,
    args: Vec<String>,
    mime_type: String,
    frame_len: usize,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    output: Option<OutputTask>,
    stderr: Option<StderrTail>,
    active: bool,
    frames_written: u64,
    // Tracks stay alive for as long as the recorder does.
    _stream: CaptureStream,
}

impl FfmpegRecorder {
    pub(super) fn new(
        ffmpeg: PathBuf,
        args: Vec<String>,
        mime_type: String,
        video: VideoTrack,
        stream: CaptureStream,
    ) -> Self {
        Self {
            ffmpeg,
            args,
            mime_type,
            frame_len: VideoFrame::expected_len(video.width, video.height),
            child: None,
            stdin: None,
            output: None,
            stderr: None,
            active: false,
            frames_written: 0,
            _stream: stream,
        }
    }

    fn stderr_snapshot(&self) -> String {
        self.stderr.as_ref().map(StderrTail::snapshot).unwrap_or_default()
    }

    fn exit_code_now(&mut self) -> i32 {
        self.child
            .as_mut()
            .and_then(|c| c.try_wait().ok().flatten())
            .and_then(|status| status.code())
            .unwrap_or(-1)
    }
}

#[async_trait]
impl Recorder for FfmpegRecorder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn is_active(&self) -> bool {
        self.active
    }

    async fn start(&mut self) -> Result<(), HostError> {
        if self.child.is_some() {
            return Err(HostError::InvalidState("recorder already started".to_string()));
        }
        let mut child = Command::new(&self.ffmpeg)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HostError::ffmpeg_failed(-1, format!("Failed to spawn FFmpeg: {}", e)))?;

        let stdin = child.stdin.take().ok_or("Failed to capture stdin")?;
        let mut stdout = child.stdout.take().ok_or("Failed to capture stdout")?;
        let stderr = child.stderr.take().ok_or("Failed to capture stderr")?;

        self.output = Some(tokio::spawn(async move {
            let mut chunks = Vec::new();
            loop {
                let mut buf = vec![0u8; OUTPUT_CHUNK_BYTES];
                let n = stdout.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                buf.truncate(n);
                chunks.push(buf);
            }
            Ok(chunks)
        }));
        self.stderr = Some(StderrTail::spawn(stderr));
        self.stdin = Some(stdin);
        self.child = Some(child);
        self.active = true;
        log::debug!(
            target: "clip_ingest::host::ffmpeg::recorder",
            "recorder started ({})",
            self.mime_type
        );
        Ok(())
    }

    async fn write_frame(&mut self, rgba: &[u8], timestamp: f64) -> Result<(), HostError> {
        if !self.active {
            return Err(HostError::InvalidState("recorder is not active".to_string()));
        }
        if rgba.len() != self.frame_len {
            return Err(HostError::InvalidState(format!(
                "frame is {} bytes, recorder expects {}",
                rgba.len(),
                self.frame_len
            )));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(HostError::InvalidState("recorder input closed".to_string()));
        };
        let written = stdin.write_all(rgba).await;
        if let Err(e) = written {
            self.active = false;
            let code = self.exit_code_now();
            let stderr = self.stderr_snapshot();
            log::warn!(
                target: "clip_ingest::host::ffmpeg::recorder",
                "encoder rejected frame at {:.3}s: {}",
                timestamp,
                e
            );
            return Err(HostError::ffmpeg_failed(
                code,
                if stderr.is_empty() { e.to_string() } else { stderr },
            ));
        }
        self.frames_written += 1;
        Ok(())
    }

    async fn stop(&mut self) -> Result<Vec<Vec<u8>>, HostError> {
        self.active = false;
        let Some(mut child) = self.child.take() else {
            return Ok(Vec::new());
        };

        // Closing stdin is the encoder's end-of-input signal.
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }

        let chunks = match self.output.take() {
            Some(task) => match task.await {
                Ok(result) => result?,
                Err(join) => return Err(HostError::InvalidState(join.to_string())),
            },
            None => Vec::new(),
        };
        let status = child.wait().await?;
        let stderr = match self.stderr.as_mut() {
            Some(tail) => tail.finish().await,
            None => String::new(),
        };

        log::debug!(
            target: "clip_ingest::host::ffmpeg::recorder",
            "recorder stopped: {} frames in, {} chunks out, status {:?}",
            self.frames_written,
            chunks.len(),
            status.code()
        );

        if status.success() {
            Ok(chunks)
        } else {
            Err(HostError::ffmpeg_failed(status.code().unwrap_or(-1), stderr))
        }
    }
}
