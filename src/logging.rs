//! env_logger setup: compact `HH:MM:SS  LEVEL  target  message` lines in local
//! time with the crate prefix stripped from targets.

use std::io::Write;

use time::OffsetDateTime;
use time::macros::format_description;

const TARGET_PREFIX: &str = "clip_ingest::";

/// Wall-clock `HH:MM:SS` in the local timezone, UTC when the offset is unknown.
fn local_clock() -> String {
    let time_fmt = format_description!("[hour]:[minute]:[second]");
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&time_fmt).unwrap_or_else(|_| "??:??:??".into())
}

fn short_target(target: &str) -> &str {
    target.strip_prefix(TARGET_PREFIX).unwrap_or(target)
}

/// Install the global logger. `RUST_LOG` overrides the default level.
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let default_level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(default_level)
        .parse_default_env()
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{ts}  {style}{level:5}{style:#}  {target}  {message}",
                ts = local_clock(),
                level = record.level(),
                target = short_target(record.target()),
                message = record.args()
            )
        });

    if builder.try_init().is_err() {
        log::trace!(target: "clip_ingest::logging", "logger already installed");
    }
}
