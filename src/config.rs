//! Process-wide, read-only ingestion policy.
//!
//! Defaults live in [`Settings::default`]. A deployment can override any field
//! through an [`IngestConfig`] document and install the result once with
//! [`Settings::install`] before the first pipeline call.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Deserialize;

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionSettings {
    pub max_width: u32,
    pub max_height: u32,
    /// Video bitrate in bits per second.
    pub target_bitrate: u32,
    /// Audio bitrate in bits per second.
    pub audio_bitrate: u32,
    /// Files smaller than this are never re-encoded.
    pub compression_size_threshold: u64,
    /// Size budget for re-encoded output; caps the video bitrate when the duration is known.
    pub max_output_size: u64,
    pub frame_rate: f64,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            max_width: 1280,
            max_height: 720,
            target_bitrate: 2_500_000,
            audio_bitrate: 128_000,
            compression_size_threshold: 10 * MB,
            max_output_size: 50 * MB,
            frame_rate: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationPolicy {
    /// Hard ceiling on the submitted file's byte length.
    pub max_file_size: u64,
    pub max_duration_secs: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            max_file_size: 200 * MB,
            max_duration_secs: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeouts {
    pub probe: Duration,
    pub probe_hevc: Duration,
    pub seek: Duration,
    pub thumbnail: Duration,
    /// Added to the maximum source duration to bound one compression run.
    /// Also bounds recorder start-up and the final flush.
    pub watchdog_buffer: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(10),
            probe_hevc: Duration::from_secs(20),
            seek: Duration::from_secs(5),
            thumbnail: Duration::from_secs(15),
            watchdog_buffer: Duration::from_secs(15),
        }
    }
}

impl Timeouts {
    pub fn probe_window(&self, likely_hevc: bool) -> Duration {
        if likely_hevc { self.probe_hevc } else { self.probe }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub compression: CompressionSettings,
    pub validation: ValidationPolicy,
    pub timeouts: Timeouts,
}

static GLOBAL_SETTINGS: OnceLock<Arc<Settings>> = OnceLock::new();

impl Settings {
    /// Install the process-wide settings. Fails if settings were already
    /// installed or already read through [`Settings::global`].
    /// `ClipIngest::new` and `default_ingest` read them.
    pub fn install(settings: Settings) -> Result<(), Settings> {
        GLOBAL_SETTINGS
            .set(Arc::new(settings))
            .map_err(|rejected| (*rejected).clone())
    }

    /// Process-wide settings; defaults if nothing was installed.
    pub fn global() -> Arc<Settings> {
        Arc::clone(GLOBAL_SETTINGS.get_or_init(|| Arc::new(Settings::default())))
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            compression: CompressionSettings {
                max_width: config.effective_max_width(),
                max_height: config.effective_max_height(),
                target_bitrate: config.effective_target_bitrate(),
                audio_bitrate: config.effective_audio_bitrate(),
                compression_size_threshold: config.effective_compression_size_threshold(),
                max_output_size: config.effective_max_output_size(),
                frame_rate: config.effective_frame_rate(),
            },
            validation: ValidationPolicy {
                max_file_size: config.effective_max_file_size(),
                max_duration_secs: config.effective_max_duration_secs(),
            },
            timeouts: Timeouts {
                probe: config.ms_or(config.probe_timeout_ms, Timeouts::default().probe),
                probe_hevc: config.ms_or(config.probe_hevc_timeout_ms, Timeouts::default().probe_hevc),
                seek: config.ms_or(config.seek_timeout_ms, Timeouts::default().seek),
                thumbnail: config.ms_or(config.thumbnail_timeout_ms, Timeouts::default().thumbnail),
                watchdog_buffer: config
                    .ms_or(config.watchdog_buffer_ms, Timeouts::default().watchdog_buffer),
            },
        }
    }

    /// Parse an [`IngestConfig`] JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: IngestConfig = serde_json::from_str(json)?;
        Ok(Self::from_config(&config))
    }

    /// Upper bound for one compression run.
    pub fn watchdog(&self) -> Duration {
        Duration::from_secs_f64(self.validation.max_duration_secs.max(0.0))
            + self.timeouts.watchdog_buffer
    }
}

/// Optional overrides, e.g. from a deployment JSON file. Unset fields keep defaults.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct IngestConfig {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Video bitrate in kbps.
    pub target_bitrate_kbps: Option<u32>,
    /// Audio bitrate in kbps. Clamped to 32..=320.
    pub audio_bitrate_kbps: Option<u32>,
    pub compression_size_threshold: Option<u64>,
    pub max_output_size: Option<u64>,
    pub frame_rate: Option<f64>,
    pub max_file_size: Option<u64>,
    pub max_duration_secs: Option<f64>,
    pub probe_timeout_ms: Option<u64>,
    pub probe_hevc_timeout_ms: Option<u64>,
    pub seek_timeout_ms: Option<u64>,
    pub thumbnail_timeout_ms: Option<u64>,
    pub watchdog_buffer_ms: Option<u64>,
}

impl IngestConfig {
    pub fn effective_max_width(&self) -> u32 {
        self.max_width
            .filter(|&w| w >= 2)
            .unwrap_or(CompressionSettings::default().max_width)
    }

    pub fn effective_max_height(&self) -> u32 {
        self.max_height
            .filter(|&h| h >= 2)
            .unwrap_or(CompressionSettings::default().max_height)
    }

    pub fn effective_target_bitrate(&self) -> u32 {
        self.target_bitrate_kbps
            .map(|k| k.max(100) * 1000)
            .unwrap_or(CompressionSettings::default().target_bitrate)
    }

    pub fn effective_audio_bitrate(&self) -> u32 {
        self.audio_bitrate_kbps
            .map(|k| k.clamp(32, 320) * 1000)
            .unwrap_or(CompressionSettings::default().audio_bitrate)
    }

    pub fn effective_compression_size_threshold(&self) -> u64 {
        self.compression_size_threshold
            .unwrap_or(CompressionSettings::default().compression_size_threshold)
    }

    pub fn effective_max_output_size(&self) -> u64 {
        self.max_output_size
            .unwrap_or(CompressionSettings::default().max_output_size)
    }

    pub fn effective_frame_rate(&self) -> f64 {
        let fps = self
            .frame_rate
            .filter(|f| f.is_finite() && *f > 0.0)
            .unwrap_or(CompressionSettings::default().frame_rate);
        (fps.min(60.0) * 100.0).round() / 100.0
    }

    pub fn effective_max_file_size(&self) -> u64 {
        self.max_file_size
            .unwrap_or(ValidationPolicy::default().max_file_size)
    }

    pub fn effective_max_duration_secs(&self) -> f64 {
        self.max_duration_secs
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(ValidationPolicy::default().max_duration_secs)
    }

    fn ms_or(&self, value: Option<u64>, default: Duration) -> Duration {
        value.map(Duration::from_millis).unwrap_or(default)
    }
}
