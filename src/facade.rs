//! Collaborator-facing entrypoints. [`ClipIngest`] bundles a media host, the
//! settings and a classifier, and composes the pipeline stages.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::Settings;
use crate::error::{Rejection, ThumbnailError};
use crate::format::{self, FormatClassifier, FormatSignals, HeuristicClassifier};
use crate::gate::{self, DurationCheck};
use crate::host::MediaHost;
use crate::media::{SourceMedia, TranscodeResult};
use crate::probe::{self, DurationProbe, ProbeResult};
use crate::thumbnail::{self, Thumbnail, ThumbnailOutcome};
use crate::transcode::{self, CompressOptions};

/// Everything the upload form needs once a file passes pre-flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Preflight {
    pub signals: FormatSignals,
    pub duration: DurationCheck,
    pub thumbnail: ThumbnailOutcome,
}

/// Every hard rejection that applied, in check order.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{}", summarize(.reasons))]
pub struct PreflightRejected {
    pub reasons: Vec<Rejection>,
}

fn summarize(reasons: &[Rejection]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct ClipIngest<H: MediaHost> {
    host: H,
    settings: Arc<Settings>,
    classifier: Arc<dyn FormatClassifier>,
}

impl<H: MediaHost + fmt::Debug> fmt::Debug for ClipIngest<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipIngest")
            .field("host", &self.host)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<H: MediaHost> ClipIngest<H> {
    /// Uses the process-wide settings and the heuristic classifier.
    ///
    /// Reading [`Settings::global`] fixes the process-wide settings, so a later
    /// [`Settings::install`] fails. Install first, or use
    /// [`ClipIngest::configured`] to leave the global untouched.
    pub fn new(host: H) -> Self {
        Self::configured(host, Settings::global())
    }

    /// Uses `settings` and the heuristic classifier.
    pub fn configured(host: H, settings: Arc<Settings>) -> Self {
        Self {
            host,
            settings,
            classifier: Arc::new(HeuristicClassifier),
        }
    }

    pub fn with_settings(mut self, settings: Arc<Settings>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_classifier(mut self, classifier: impl FormatClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn classify(&self, media: &SourceMedia) -> FormatSignals {
        self.classifier.classify(media)
    }

    pub fn validate_container_and_size(&self, media: &SourceMedia) -> Result<(), Vec<Rejection>> {
        let signals = self.classify(media);
        format::validate_container_and_size(media, &signals, &self.settings.validation)
    }

    pub async fn probe_metadata(&self, media: &SourceMedia) -> ProbeResult {
        let signals = self.classify(media);
        probe::probe_metadata(&self.host, media, &signals, &self.settings.timeouts).await
    }

    pub async fn probe_duration(&self, media: &SourceMedia) -> DurationProbe {
        let signals = self.classify(media);
        probe::probe_duration(&self.host, media, &signals, &self.settings.timeouts).await
    }

    pub async fn require_duration_within_limit(
        &self,
        media: &SourceMedia,
    ) -> Result<DurationCheck, Rejection> {
        let signals = self.classify(media);
        gate::require_duration_within_limit(&self.host, media, &signals, &self.settings).await
    }

    pub async fn extract_thumbnail(
        &self,
        media: &SourceMedia,
        at_seconds: f64,
    ) -> Result<Thumbnail, ThumbnailError> {
        let signals = self.classify(media);
        thumbnail::extract_thumbnail(&self.host, media, at_seconds, &signals, &self.settings.timeouts)
            .await
    }

    pub async fn compress(&self, media: &SourceMedia, options: CompressOptions) -> TranscodeResult {
        let signals = self.classify(media);
        transcode::compress(&self.host, media, &signals, &self.settings, options).await
    }

    /// Classify, check container and size, then duration (only for an
    /// accepted container), then the optional thumbnail. Rejections are
    /// collected rather than short-circuited; the thumbnail is only attempted
    /// for a file that passed.
    pub async fn preflight(
        &self,
        media: &SourceMedia,
        thumbnail_at: Option<f64>,
    ) -> Result<Preflight, PreflightRejected> {
        let signals = self.classify(media);
        let mut reasons =
            match format::validate_container_and_size(media, &signals, &self.settings.validation) {
                Ok(()) => Vec::new(),
                Err(reasons) => reasons,
            };

        let duration = if signals.container_accepted() {
            match gate::require_duration_within_limit(&self.host, media, &signals, &self.settings)
                .await
            {
                Ok(check) => check,
                Err(rejection) => {
                    reasons.push(rejection);
                    DurationCheck::Unverified
                }
            }
        } else {
            DurationCheck::Unverified
        };

        if !reasons.is_empty() {
            log::info!(
                target: "clip_ingest::facade",
                "{}: rejected ({} reasons)",
                media.file_name(),
                reasons.len()
            );
            return Err(PreflightRejected { reasons });
        }

        let thumbnail = match thumbnail_at {
            Some(at) => thumbnail::extract_thumbnail(
                &self.host,
                media,
                at,
                &signals,
                &self.settings.timeouts,
            )
            .await
            .into(),
            None => ThumbnailOutcome::NotRequested,
        };

        Ok(Preflight {
            signals,
            duration,
            thumbnail,
        })
    }
}
