//! Maximum-duration policy. Rejects only on a confirmed over-limit
//! measurement; an unmeasurable file passes as unverified.

use serde::Serialize;

use crate::config::Settings;
use crate::error::Rejection;
use crate::format::FormatSignals;
use crate::host::MediaHost;
use crate::media::SourceMedia;
use crate::probe::{probe_duration, DurationProbe};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "status")]
pub enum DurationCheck {
    /// Measured and within the limit.
    Within { duration_seconds: f64 },
    /// Could not be measured; accepted leniently.
    Unverified,
}

pub fn check_duration(probe: DurationProbe, limit_seconds: f64) -> Result<DurationCheck, Rejection> {
    match probe.duration_seconds {
        None => Ok(DurationCheck::Unverified),
        Some(measured) if measured > limit_seconds => Err(Rejection::DurationExceeded {
            measured_seconds: measured,
            limit_seconds,
        }),
        Some(measured) => Ok(DurationCheck::Within {
            duration_seconds: measured,
        }),
    }
}

pub async fn require_duration_within_limit<H: MediaHost + ?Sized>(
    host: &H,
    media: &SourceMedia,
    signals: &FormatSignals,
    settings: &Settings,
) -> Result<DurationCheck, Rejection> {
    let probe = probe_duration(host, media, signals, &settings.timeouts).await;
    let limit = settings.validation.max_duration_secs;
    let check = check_duration(probe, limit);
    match &check {
        Ok(DurationCheck::Unverified) => log::info!(
            target: "clip_ingest::gate",
            "{}: duration unknown, accepting without verification",
            media.file_name()
        ),
        Ok(DurationCheck::Within { duration_seconds }) => log::debug!(
            target: "clip_ingest::gate",
            "{}: {:.2}s within {:.0}s limit",
            media.file_name(),
            duration_seconds,
            limit
        ),
        Err(rejection) => log::info!(
            target: "clip_ingest::gate",
            "{}: {}",
            media.file_name(),
            rejection
        ),
    }
    check
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(d: Option<f64>) -> DurationProbe {
        DurationProbe { duration_seconds: d }
    }

    #[test]
    fn unknown_duration_is_unverified() {
        assert_eq!(check_duration(probe(None), 60.0), Ok(DurationCheck::Unverified));
    }

    #[test]
    fn exactly_at_limit_passes() {
        assert_eq!(
            check_duration(probe(Some(60.0)), 60.0),
            Ok(DurationCheck::Within { duration_seconds: 60.0 })
        );
    }

    #[test]
    fn over_limit_is_rejected_with_measurement() {
        let err = check_duration(probe(Some(60.5)), 60.0).unwrap_err();
        assert_eq!(
            err,
            Rejection::DurationExceeded {
                measured_seconds: 60.5,
                limit_seconds: 60.0
            }
        );
    }

    #[test]
    fn serializes_with_status_tag() {
        let json = serde_json::to_value(DurationCheck::Within { duration_seconds: 12.0 }).unwrap();
        assert_eq!(json["status"], "within");
        assert_eq!(json["durationSeconds"], 12.0);
    }
}
