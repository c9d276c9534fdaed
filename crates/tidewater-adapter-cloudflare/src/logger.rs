use std::fmt;
use std::sync::Once;

use log::{Level, LevelFilter};

static INIT: Once = Once::new();

/// Install the `fern` dispatch for this isolate. Later calls are no-ops, since an isolate
/// serves many invocations.
pub fn init_logger(level: LevelFilter) {
    INIT.call_once(|| {
        let dispatch = fern::Dispatch::new()
            .level(level)
            .format(|out, message, record| {
                out.finish(format_args!("{}", format_line(record.level(), message)))
            })
            .chain(output());

        if dispatch.apply().is_ok() {
            log::set_max_level(level);
        }
    });
}

// RFC3339 with milliseconds in UTC; isolates carry no local timezone.
fn format_line(level: Level, message: &fmt::Arguments<'_>) -> String {
    format!(
        "{}  {} {}",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        level,
        message
    )
}

#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
fn output() -> fern::Output {
    fern::Output::call(|record| {
        let line = record.args();
        match record.level() {
            Level::Error => worker::console_error!("{}", line),
            Level::Warn => worker::console_warn!("{}", line),
            Level::Debug | Level::Trace => worker::console_debug!("{}", line),
            Level::Info => worker::console_log!("{}", line),
        }
    })
}

#[cfg(not(all(feature = "cloudflare", target_arch = "wasm32")))]
fn output() -> fern::Output {
    std::io::stderr().into()
}
