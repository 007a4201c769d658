#![allow(dead_code)]

use std::cell::RefCell;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// A log record captured while a test closure ran.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
}

thread_local! {
    static EVENTS: RefCell<Vec<CapturedEvent>> = const { RefCell::new(Vec::new()) };
}

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let event = CapturedEvent {
            level: record.level(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        };
        EVENTS.with(|events| events.borrow_mut().push(event));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

/// Runs `f` and returns its result with every log event it emitted on this thread.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<CapturedEvent>) {
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Trace);
    });
    EVENTS.with(|events| events.borrow_mut().clear());
    let result = f();
    let events = EVENTS.with(|events| events.borrow_mut().drain(..).collect());
    (result, events)
}

/// True when some event at exactly `level` contains `needle`.
pub fn logged(events: &[CapturedEvent], level: Level, needle: &str) -> bool {
    events
        .iter()
        .any(|event| event.level == level && event.message.contains(needle))
}

/// All messages joined into one string for substring checks.
pub fn joined(events: &[CapturedEvent]) -> String {
    events
        .iter()
        .map(|event| event.message.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
