mod support;

use std::sync::Arc;

use clip_ingest::error::DecodeErrorCode;
use clip_ingest::{ClipIngest, DurationCheck, ProbeOutcome, Rejection, Settings};
use tokio::time::Instant;

use support::{media, secs, FakeHost, MetadataScript, Script};

fn ingest(metadata: MetadataScript) -> ClipIngest<FakeHost> {
    ClipIngest::new(FakeHost::new(Script {
        metadata,
        ..Script::default()
    }))
    .with_settings(Arc::new(Settings::default()))
}

fn limited(metadata: MetadataScript, max_duration_secs: f64) -> ClipIngest<FakeHost> {
    let mut settings = Settings::default();
    settings.validation.max_duration_secs = max_duration_secs;
    ClipIngest::new(FakeHost::new(Script {
        metadata,
        ..Script::default()
    }))
    .with_settings(Arc::new(settings))
}

fn ready(duration: f64) -> MetadataScript {
    MetadataScript::Ready {
        duration,
        width: 1280,
        height: 720,
    }
}

#[tokio::test]
async fn probe_reports_duration_and_dimensions() {
    let ingest = ingest(ready(12.5));
    let result = ingest
        .probe_metadata(&media(64, "video/mp4", "clip.mp4"))
        .await;
    assert_eq!(result.outcome, ProbeOutcome::Ready);
    assert_eq!(result.duration_seconds, Some(12.5));
    assert_eq!(result.width, Some(1280));
    assert_eq!(result.height, Some(720));
    ingest.host().assert_all_released();
}

#[tokio::test]
async fn nan_duration_is_unknown() {
    let ingest = ingest(ready(f64::NAN));
    let probe = ingest
        .probe_duration(&media(64, "video/webm", "stream.webm"))
        .await;
    assert_eq!(probe.duration_seconds, None);
    ingest.host().assert_all_released();
}

#[tokio::test]
async fn decode_error_on_likely_hevc_is_tolerated() {
    let ingest = ingest(MetadataScript::Fail(DecodeErrorCode::Decode));
    let result = ingest
        .probe_metadata(&media(64, "video/quicktime", "IMG_0042.MOV"))
        .await;
    assert_eq!(result.outcome, ProbeOutcome::DecodeErrorTolerated);
    assert_eq!(result.duration_seconds, None);
    ingest.host().assert_all_released();
}

#[tokio::test]
async fn unsupported_format_is_tolerated_for_any_file() {
    let ingest = ingest(MetadataScript::Fail(DecodeErrorCode::SrcNotSupported));
    let result = ingest
        .probe_metadata(&media(64, "video/mp4", "clip.mp4"))
        .await;
    assert_eq!(result.outcome, ProbeOutcome::DecodeErrorTolerated);
}

#[tokio::test]
async fn corrupt_file_reports_decode_error() {
    let ingest = ingest(MetadataScript::Fail(DecodeErrorCode::Decode));
    let result = ingest
        .probe_metadata(&media(64, "video/mp4", "clip.mp4"))
        .await;
    assert_eq!(result.outcome, ProbeOutcome::DecodeError);
    assert_eq!(result.duration_seconds, None);
    ingest.host().assert_all_released();
}

#[tokio::test]
async fn object_url_failure_is_a_decode_error() {
    let ingest = ClipIngest::new(FakeHost::new(Script {
        object_url_fails: true,
        ..Script::default()
    }))
    .with_settings(Arc::new(Settings::default()));
    let result = ingest
        .probe_metadata(&media(64, "video/mp4", "clip.mp4"))
        .await;
    assert_eq!(result.outcome, ProbeOutcome::DecodeError);
}

#[tokio::test(start_paused = true)]
async fn hanging_probe_times_out_after_ten_seconds() {
    let ingest = ingest(MetadataScript::Hang);
    let started = Instant::now();
    let result = ingest
        .probe_metadata(&media(64, "video/mp4", "clip.mp4"))
        .await;
    let waited = started.elapsed();
    assert_eq!(result.outcome, ProbeOutcome::TimedOut);
    assert!(waited >= secs(10) && waited < secs(20), "{:?}", waited);
    ingest.host().assert_all_released();
}

#[tokio::test(start_paused = true)]
async fn likely_hevc_gets_twenty_seconds() {
    let ingest = ingest(MetadataScript::Hang);
    let started = Instant::now();
    let result = ingest
        .probe_metadata(&media(64, "video/mp4", "beach_hevc.mp4"))
        .await;
    assert_eq!(result.outcome, ProbeOutcome::TimedOut);
    assert!(started.elapsed() >= secs(20));
    ingest.host().assert_all_released();
}

#[tokio::test]
async fn clip_over_limit_is_rejected_with_measurement() {
    let ingest = limited(ready(31.0), 30.0);
    let err = ingest
        .require_duration_within_limit(&media(64, "video/mp4", "clip.mp4"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        Rejection::DurationExceeded {
            measured_seconds: 31.0,
            limit_seconds: 30.0
        }
    );
    assert_eq!(err.to_string(), "Video is too long (31s, limit 30s)");
    ingest.host().assert_all_released();
}

#[tokio::test]
async fn clip_within_limit_reports_duration() {
    let ingest = limited(ready(29.9), 30.0);
    let check = ingest
        .require_duration_within_limit(&media(64, "video/mp4", "clip.mp4"))
        .await
        .unwrap();
    assert_eq!(
        check,
        DurationCheck::Within {
            duration_seconds: 29.9
        }
    );
}

#[tokio::test]
async fn unmeasurable_clip_is_accepted_unverified() {
    let ingest = limited(MetadataScript::Fail(DecodeErrorCode::Decode), 30.0);
    let check = ingest
        .require_duration_within_limit(&media(64, "video/mp4", "clip.mp4"))
        .await
        .unwrap();
    assert_eq!(check, DurationCheck::Unverified);
}

#[tokio::test(start_paused = true)]
async fn timed_out_probe_is_accepted_unverified() {
    let ingest = limited(MetadataScript::Hang, 30.0);
    let check = ingest
        .require_duration_within_limit(&media(64, "video/mp4", "clip.mp4"))
        .await
        .unwrap();
    assert_eq!(check, DurationCheck::Unverified);
    ingest.host().assert_all_released();
}
