//! Logging bridge for par-doc.
//!
//! Routes everything sent through the `log` facade to a file in the system
//! temp directory (`par_doc_debug.log`), and mirrors it to stderr when
//! `RUST_LOG` is set. Keeping diagnostics out of stdout lets the `demo`
//! command print machine-readable JSON.
//!
//! Level precedence: `--log-level` on the command line, then `RUST_LOG`,
//! then the config file's `log_level` (applied with [`set_log_level`]).

use chrono::Local;
use par_doc_config::LogLevel;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

const LOG_FILE_NAME: &str = "par_doc_debug.log";

struct FileLogger {
    file: Mutex<Option<File>>,
    mirror_stderr: bool,
}

impl FileLogger {
    fn write_line(&self, line: &str) {
        let mut file = self.file.lock();
        if file.is_none() {
            *file = open_log_file();
        }
        if let Some(f) = file.as_mut() {
            let _ = f.write_all(line.as_bytes());
            let _ = f.flush();
        }
    }
}

impl log::Log for FileLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{}] [{:<5}] [{}] {}\n",
            Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        );
        self.write_line(&line);
        if self.mirror_stderr {
            eprint!("{line}");
        }
    }

    fn flush(&self) {
        if let Some(f) = self.file.lock().as_mut() {
            let _ = f.flush();
        }
    }
}

static LOGGER: OnceLock<FileLogger> = OnceLock::new();

/// Set once the level came from the CLI or `RUST_LOG`; config must not override it.
static LEVEL_PINNED: AtomicBool = AtomicBool::new(false);

/// Path of the debug log file.
pub fn log_path() -> PathBuf {
    std::env::temp_dir().join(LOG_FILE_NAME)
}

fn open_log_file() -> Option<File> {
    // Silently skip logging when the file cannot be opened.
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path())
        .ok()
}

/// Parse a `RUST_LOG` value. Only a bare level is understood; per-module
/// directives fall back to `info`.
fn level_from_env(value: &str) -> log::LevelFilter {
    value
        .parse::<LogLevel>()
        .map(LogLevel::to_level_filter)
        .unwrap_or(log::LevelFilter::Info)
}

/// Install the log bridge. Safe to call more than once; later calls only
/// adjust the level.
pub fn init_log_bridge(cli_level: Option<LogLevel>) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let logger = LOGGER.get_or_init(|| FileLogger {
        file: Mutex::new(None),
        mirror_stderr: rust_log.is_some(),
    });
    // Err means a logger is already installed (e.g. by a test harness).
    let _ = log::set_logger(logger);

    let level = match (cli_level, rust_log.as_deref()) {
        (Some(level), _) => Some(level.to_level_filter()),
        (None, Some(value)) => Some(level_from_env(value)),
        (None, None) => None,
    };
    match level {
        Some(level) => {
            LEVEL_PINNED.store(true, Ordering::Relaxed);
            log::set_max_level(level);
        }
        None => log::set_max_level(log::LevelFilter::Off),
    }

    if log::max_level() != log::LevelFilter::Off {
        logger.write_line(&format!(
            "\n{}\npar-doc session started at {} (level={})\n{}\n",
            "=".repeat(80),
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            log::max_level(),
            "=".repeat(80)
        ));
    }
}

/// Apply the config file's level unless the CLI or `RUST_LOG` already chose one.
pub fn set_log_level(level: LogLevel) {
    if LEVEL_PINNED.load(Ordering::Relaxed) {
        log::debug!("Config log level {:?} ignored; overridden at startup", level);
        return;
    }
    log::set_max_level(level.to_level_filter());
}
