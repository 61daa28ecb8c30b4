use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use crate::error::HostError;

#[cfg(target_os = "windows")]
const LOCATE_COMMAND: &str = "where";
#[cfg(not(target_os = "windows"))]
const LOCATE_COMMAND: &str = "which";

fn find_in_path() -> Option<PathBuf> {
    let output = Command::new(LOCATE_COMMAND).arg("ffmpeg").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next()?.trim();
    (!first.is_empty()).then(|| PathBuf::from(first))
}

fn common_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/opt/homebrew/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/opt/local/bin/ffmpeg"),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            PathBuf::from("C:\\ffmpeg\\bin\\ffmpeg.exe"),
            PathBuf::from("C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe"),
        ]
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", unix)))]
    {
        vec![]
    }
}

static FFMPEG_PATH_CACHE: OnceLock<PathBuf> = OnceLock::new();
static ENCODER_CACHE: OnceLock<HashSet<String>> = OnceLock::new();

fn resolve_ffmpeg_path() -> Result<PathBuf, HostError> {
    if let Ok(env_path) = std::env::var("FFMPEG_PATH") {
        let p = PathBuf::from(&env_path);
        if p.exists() {
            log::debug!(
                target: "clip_ingest::host::ffmpeg::discovery",
                "FFmpeg path from FFMPEG_PATH env: {}",
                p.display()
            );
            return Ok(p);
        }
        log::warn!(
            target: "clip_ingest::host::ffmpeg::discovery",
            "FFMPEG_PATH points at a missing file, ignoring: {}",
            env_path
        );
    }

    if let Some(path) = common_paths().into_iter().find(|p| p.exists()) {
        log::debug!(
            target: "clip_ingest::host::ffmpeg::discovery",
            "FFmpeg found in common path: {}",
            path.display()
        );
        return Ok(path);
    }

    if let Some(p) = find_in_path().filter(|p| p.exists()) {
        log::debug!(
            target: "clip_ingest::host::ffmpeg::discovery",
            "FFmpeg found in PATH: {}",
            p.display()
        );
        return Ok(p);
    }

    log::warn!(
        target: "clip_ingest::host::ffmpeg::discovery",
        "FFmpeg not found in PATH or common locations"
    );
    Err(HostError::FfmpegNotFound(
        "FFmpeg not found. Install it or set FFMPEG_PATH.".to_string(),
    ))
}

/// FFmpeg binary path, cached for the process lifetime once found.
/// `FFMPEG_PATH` takes precedence over common locations and `PATH`.
/// A failed lookup is not cached.
pub fn get_ffmpeg_path() -> Result<&'static Path, HostError> {
    if let Some(path) = FFMPEG_PATH_CACHE.get() {
        return Ok(path.as_path());
    }
    let path = resolve_ffmpeg_path()?;
    Ok(FFMPEG_PATH_CACHE.get_or_init(|| path).as_path())
}

/// Paths to try for ffprobe given an ffmpeg binary path (suffixed first, then plain).
pub fn ffprobe_candidates(ffmpeg_path: &Path) -> Vec<PathBuf> {
    let Some(parent) = ffmpeg_path.parent() else {
        return vec![];
    };
    let exe = if cfg!(target_os = "windows") { ".exe" } else { "" };
    let mut candidates = Vec::with_capacity(2);
    let suffix = ffmpeg_path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.strip_prefix("ffmpeg"))
        .filter(|suffix| !suffix.is_empty());
    if let Some(suffix) = suffix {
        candidates.push(parent.join(format!("ffprobe{suffix}{exe}")));
    }
    candidates.push(parent.join(format!("ffprobe{exe}")));
    candidates
}

/// ffprobe ships next to ffmpeg.
pub fn get_ffprobe_path() -> Result<PathBuf, HostError> {
    let ffmpeg = get_ffmpeg_path()?;
    let candidates = ffprobe_candidates(ffmpeg);
    if let Some(found) = candidates.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }
    Err(HostError::FfmpegNotFound(format!(
        "ffprobe not found next to {}",
        ffmpeg.display()
    )))
}

/// Parse the encoder table printed by `ffmpeg -hide_banner -encoders`.
/// Rows look like ` V....D libvpx-vp9  libvpx VP9`; the legend above the
/// `------` separator is skipped.
pub fn parse_encoder_list(output: &str) -> HashSet<String> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("------"))
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let flags = cols.next()?;
            let name = cols.next()?;
            (flags.len() == 6).then(|| name.to_string())
        })
        .collect()
}

/// Encoders compiled into the resolved ffmpeg. Empty when ffmpeg is missing
/// or the listing fails; cached once a listing succeeds.
pub fn available_encoders() -> &'static HashSet<String> {
    static EMPTY: OnceLock<HashSet<String>> = OnceLock::new();
    if let Some(cached) = ENCODER_CACHE.get() {
        return cached;
    }
    let listed = get_ffmpeg_path().ok().and_then(|ffmpeg| {
        let output = Command::new(ffmpeg)
            .args(["-hide_banner", "-encoders"])
            .output()
            .ok()?;
        output
            .status
            .success()
            .then(|| parse_encoder_list(&String::from_utf8_lossy(&output.stdout)))
    });
    match listed {
        Some(encoders) => {
            log::debug!(
                target: "clip_ingest::host::ffmpeg::discovery",
                "FFmpeg reports {} encoders",
                encoders.len()
            );
            ENCODER_CACHE.get_or_init(|| encoders)
        }
        None => EMPTY.get_or_init(HashSet::new),
    }
}

/// Resolved ffmpeg path, without searching.
pub fn cached_ffmpeg_path() -> Option<&'static Path> {
    FFMPEG_PATH_CACHE.get().map(PathBuf::as_path)
}

/// Listed encoders, without spawning ffmpeg.
pub fn cached_encoders() -> Option<&'static HashSet<String>> {
    ENCODER_CACHE.get()
}

/// Resolve ffmpeg and list its encoders on the blocking pool. Both lookups may
/// spawn child processes and wait on them.
pub async fn warm_up() -> Result<&'static Path, HostError> {
    tokio::task::spawn_blocking(|| {
        let ffmpeg = get_ffmpeg_path()?;
        available_encoders();
        Ok::<_, HostError>(ffmpeg)
    })
    .await
    .map_err(|e| HostError::InvalidState(format!("ffmpeg discovery task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    #[cfg(not(target_os = "windows"))]
    fn ffprobe_candidates_plain_ffmpeg() {
        let candidates = ffprobe_candidates(Path::new("/usr/bin/ffmpeg"));
        assert_eq!(candidates, vec![PathBuf::from("/usr/bin/ffprobe")]);
    }

    #[test]
    #[cfg(not(target_os = "windows"))]
    fn ffprobe_candidates_bundled_suffix() {
        let candidates = ffprobe_candidates(Path::new("/app/bin/ffmpeg-aarch64-apple-darwin"));
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/app/bin/ffprobe-aarch64-apple-darwin"),
                PathBuf::from("/app/bin/ffprobe"),
            ]
        );
    }

    #[test]
    #[cfg(target_os = "windows")]
    fn ffprobe_candidates_windows() {
        let candidates = ffprobe_candidates(Path::new("C:\\bin\\ffmpeg.exe"));
        assert_eq!(candidates, vec![PathBuf::from("C:\\bin\\ffprobe.exe")]);
    }

    #[test]
    fn encoder_list_skips_legend() {
        let output = "\
Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC
 V....D libvpx-vp9           libvpx VP9 (codec vp9)
 A....D libopus              libopus Opus (codec opus)
 A....D aac                  AAC (Advanced Audio Coding)
";
        let encoders = parse_encoder_list(output);
        assert_eq!(encoders.len(), 4);
        assert!(encoders.contains("libvpx-vp9"));
        assert!(encoders.contains("aac"));
        assert!(!encoders.contains("V....."));
    }

    #[tokio::test]
    async fn warm_up_fills_the_path_cache() {
        match warm_up().await {
            Ok(ffmpeg) => assert_eq!(cached_ffmpeg_path(), Some(ffmpeg)),
            Err(e) => assert!(matches!(e, HostError::FfmpegNotFound(_))),
        }
    }

    #[test]
    fn encoder_list_without_separator_is_empty() {
        assert!(parse_encoder_list("garbage\nmore garbage").is_empty());
    }
}
