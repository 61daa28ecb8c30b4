use crate::config::CompressionSettings;

/// Floor for the computed video bitrate, bits per second.
const MIN_VIDEO_BITRATE: u32 = 250_000;
/// Share of `max_output_size` the stream may use; the rest is container overhead.
const OUTPUT_BUDGET_SHARE: f64 = 0.9;

fn even_at_least_two(v: u32) -> u32 {
    (v - v % 2).max(2)
}

/// Output size for a `width`x`height` source. Scales down only when an axis
/// exceeds its maximum and keeps the aspect ratio. Both axes come out even.
/// `None` for a zero-sized source.
pub fn target_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    let scale = (max_width as f64 / width as f64)
        .min(max_height as f64 / height as f64)
        .min(1.0);
    let w = (width as f64 * scale).round() as u32;
    let h = (height as f64 * scale).round() as u32;
    Some((even_at_least_two(w), even_at_least_two(h)))
}

/// Video bitrate for the recorder. With a known duration the target is capped
/// so video plus audio fits the output budget.
pub fn video_bitrate_budget(settings: &CompressionSettings, duration: Option<f64>) -> u32 {
    let target = settings.target_bitrate;
    let Some(duration) = duration.filter(|d| *d > 0.0) else {
        return target;
    };
    let budget_bits = settings.max_output_size as f64 * 8.0 * OUTPUT_BUDGET_SHARE;
    let total_bps = budget_bits / duration;
    let video_bps = (total_bps - settings.audio_bitrate as f64).max(0.0);
    let capped = (video_bps.min(target as f64)) as u32;
    capped.max(MIN_VIDEO_BITRATE.min(target))
}
