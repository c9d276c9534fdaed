//! Process-wide `log` capture shared by the core unit tests.

use std::sync::{Mutex, OnceLock};

use log::{Level, Log, Metadata, Record};

pub(crate) struct Capture {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for Capture {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

pub(crate) fn capture() -> &'static Capture {
    static CAPTURE: OnceLock<&'static Capture> = OnceLock::new();
    CAPTURE.get_or_init(|| {
        let capture: &'static Capture = Box::leak(Box::new(Capture {
            records: Mutex::new(Vec::new()),
        }));
        log::set_logger(capture).expect("no other logger in core tests");
        log::set_max_level(log::LevelFilter::Trace);
        capture
    })
}

pub(crate) fn logged(level: Level, needle: &str) -> bool {
    capture()
        .records
        .lock()
        .unwrap()
        .iter()
        .any(|(recorded, message)| *recorded == level && message.contains(needle))
}
