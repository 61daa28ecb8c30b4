//! Process-wide settings. Kept in its own binary so the global starts empty.

mod support;

use std::sync::Arc;

use clip_ingest::{ClipIngest, CompressOptions, PassthroughReason, Settings};

use support::{media, FakeHost, Script};

#[tokio::test]
async fn configured_pipeline_leaves_global_settings_installable() {
    let ingest = ClipIngest::configured(FakeHost::new(Script::default()), Arc::new(Settings::default()));
    let result = ingest
        .compress(&media(4096, "video/mp4", "clip.mp4"), CompressOptions::default())
        .await;
    assert_eq!(
        result.passthrough_reason(),
        Some(&PassthroughReason::BelowThreshold)
    );

    let mut custom = Settings::default();
    custom.compression.max_width = 640;
    Settings::install(custom.clone()).unwrap();
    assert_eq!(*Settings::global(), custom);

    // From here on the global is fixed.
    let default_ingest = ClipIngest::new(FakeHost::new(Script::default()));
    assert_eq!(default_ingest.settings().compression.max_width, 640);
    assert!(Settings::install(Settings::default()).is_err());
}
