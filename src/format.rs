//! Heuristic container/codec classification from MIME type and filename.
//!
//! Nothing here parses container bytes. The flags are substring and pattern
//! matches, and they are wrong in known ways:
//!
//! - An iOS-style `IMG_1234.MOV` is flagged as likely HEVC even though older
//!   iPhones and "Most Compatible" capture settings record H.264.
//! - HEVC inside an `.mp4` with a neutral filename is not detected.
//! - Any name containing a social-app token (e.g. `tiktok`) is treated as a
//!   mobile source, whatever it actually is.
//!
//! Callers rely on these flags only to pick lenient paths (longer probe
//! windows, tolerated decode errors), so a false positive costs time, never an
//! upload.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::ValidationPolicy;
use crate::error::Rejection;
use crate::media::SourceMedia;

/// Container MIME types accepted outright.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "video/webm",
    "video/x-m4v",
    "video/3gpp",
    "video/3gpp2",
    "video/x-matroska",
    "video/mpeg",
    "video/ogg",
    "video/x-msvideo",
    "video/avi",
    "video/hevc",
];

/// Extensions accepted outright.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "qt", "webm", "mkv", "3gp", "3g2", "mpeg", "mpg", "ogv", "avi", "hevc",
    "h265",
];

/// Extensions that are definitely not video. These never get the permissive
/// fallback.
const NON_VIDEO_EXTENSIONS: &[&str] = &[
    "exe", "dll", "bat", "cmd", "sh", "msi", "apk", "app", "dmg", "jar", "js", "html", "htm",
    "php", "zip", "rar", "7z", "tar", "gz", "pdf", "doc", "docx", "xls", "xlsx", "txt", "json",
    "xml", "csv", "jpg", "jpeg", "png", "gif", "webp", "heic", "heif", "bmp", "svg", "mp3", "m4a",
    "aac", "wav", "flac", "ogg", "opus",
];

/// MIME values that carry no information about the content.
const GENERIC_MIME_TYPES: &[&str] = &["application/octet-stream", "binary/octet-stream"];

static HEVC_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(hevc|h\.?265|x265|hvc1|hev1)").expect("invalid hevc regex")
});

static IOS_CAPTURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^IMG_\d{4}").expect("invalid ios capture regex"));

static MOBILE_SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(^IMG_\d+|^VID[_-]\d{8}|^PXL_\d{8}|^MVIMG_|whatsapp|^WA\d{4}|^signal-|telegram|instagram|tiktok|snapchat|^fb_|^trim\.|^RPReplay|screen ?recording)",
    )
    .expect("invalid mobile source regex")
});

static VIDEO_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(video|movie|clip|recording|timelapse|reel)").expect("invalid video word regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FormatDiagnostic {
    MissingMime,
    GenericMime,
    MissingExtension,
    /// Declared MIME and extension point at different families (e.g. `image/*` on `.mp4`).
    MimeExtensionMismatch,
    /// Nothing identified the file; `looks_like_video` was granted permissively.
    PermissiveFallback,
}

/// Heuristic flags for one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatSignals {
    pub video_by_mime: bool,
    pub video_by_extension: bool,
    pub mime_allowed: bool,
    pub extension_allowed: bool,
    pub likely_hevc: bool,
    pub social_or_mobile_source: bool,
    pub looks_like_video: bool,
    pub diagnostics: Vec<FormatDiagnostic>,
}

impl FormatSignals {
    pub fn has(&self, diagnostic: FormatDiagnostic) -> bool {
        self.diagnostics.contains(&diagnostic)
    }

    /// Container acceptance: allow-listed MIME, allow-listed extension, or a
    /// video-looking file from a phone/social source.
    pub fn container_accepted(&self) -> bool {
        self.mime_allowed
            || self.extension_allowed
            || (self.looks_like_video && self.social_or_mobile_source)
    }
}

/// Pluggable classifier seam. The default is [`HeuristicClassifier`].
pub trait FormatClassifier: Send + Sync {
    fn classify(&self, media: &SourceMedia) -> FormatSignals;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

fn normalized_mime(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn base_name(file_name: &str) -> &str {
    file_name.rsplit(['/', '\\']).next().unwrap_or(file_name)
}

impl FormatClassifier for HeuristicClassifier {
    fn classify(&self, media: &SourceMedia) -> FormatSignals {
        let mime = normalized_mime(media.mime_type());
        let ext = media.extension();
        let name = base_name(media.file_name());
        let mut signals = FormatSignals::default();

        if mime.is_empty() {
            signals.diagnostics.push(FormatDiagnostic::MissingMime);
        } else if GENERIC_MIME_TYPES.contains(&mime.as_str()) {
            signals.diagnostics.push(FormatDiagnostic::GenericMime);
        }
        if ext.is_none() {
            signals.diagnostics.push(FormatDiagnostic::MissingExtension);
        }

        signals.video_by_mime = mime.starts_with("video/");
        signals.mime_allowed = ALLOWED_MIME_TYPES.contains(&mime.as_str());
        let ext_ref = ext.as_deref();
        signals.extension_allowed = ext_ref.is_some_and(|e| ALLOWED_EXTENSIONS.contains(&e));
        signals.video_by_extension = signals.extension_allowed;
        let ext_is_non_video = ext_ref.is_some_and(|e| NON_VIDEO_EXTENSIONS.contains(&e));

        let mime_says_other_family = !mime.is_empty()
            && !signals.video_by_mime
            && !GENERIC_MIME_TYPES.contains(&mime.as_str());
        if (signals.video_by_extension && mime_says_other_family)
            || (signals.video_by_mime && ext_is_non_video)
        {
            signals.diagnostics.push(FormatDiagnostic::MimeExtensionMismatch);
        }

        let is_quicktime = mime == "video/quicktime" || matches!(ext_ref, Some("mov" | "qt"));
        // The raw value keeps any `codecs=` parameter, e.g. `hvc1.1.6.L93.B0`.
        signals.likely_hevc = HEVC_TOKEN_RE.is_match(media.mime_type())
            || HEVC_TOKEN_RE.is_match(name)
            || matches!(ext_ref, Some("hevc" | "h265"))
            || (is_quicktime && IOS_CAPTURE_RE.is_match(name));

        signals.social_or_mobile_source = MOBILE_SOURCE_RE.is_match(name);

        let unidentified = !signals.video_by_mime
            && !signals.video_by_extension
            && !ext_is_non_video
            && !mime_says_other_family;
        signals.looks_like_video = signals.video_by_mime
            || signals.video_by_extension
            || (!ext_is_non_video && VIDEO_WORD_RE.is_match(name))
            || unidentified;
        if unidentified {
            signals.diagnostics.push(FormatDiagnostic::PermissiveFallback);
        }

        log::trace!(
            target: "clip_ingest::format",
            "classify: name={}, mime={:?}, signals={:?}",
            name,
            mime,
            signals
        );
        signals
    }
}

/// Container and size check. Reports every applicable rejection.
pub fn validate_container_and_size(
    media: &SourceMedia,
    signals: &FormatSignals,
    policy: &ValidationPolicy,
) -> Result<(), Vec<Rejection>> {
    let mut rejections = Vec::new();
    if !signals.container_accepted() {
        log::info!(
            target: "clip_ingest::format",
            "rejecting container: name={}, mime={:?}",
            media.file_name(),
            media.mime_type()
        );
        rejections.push(Rejection::UnsupportedContainer {
            file_name: media.file_name().to_string(),
            mime_type: media.mime_type().to_string(),
        });
    }
    if media.size() > policy.max_file_size {
        log::info!(
            target: "clip_ingest::format",
            "rejecting size: name={}, size={}, limit={}",
            media.file_name(),
            media.size(),
            policy.max_file_size
        );
        rejections.push(Rejection::SizeExceeded {
            size: media.size(),
            limit: policy.max_file_size,
        });
    }
    if rejections.is_empty() {
        Ok(())
    } else {
        Err(rejections)
    }
}
