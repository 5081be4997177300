// libuart/src/logging.rs
//
// Opt-in logger for the `log` facade. Every line gets a local
// `HH:MM:SS.mmm` timestamp and goes to stderr, and also to a log file while
// file logging is active. The library itself only emits through `log::*!`
// macros, so nothing is printed unless an application installs a logger.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Global log file handle. When `Some`, every record is mirrored here.
pub(crate) static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);

static LOGGER: TimestampLogger = TimestampLogger;

const LOG_NAME: &str = "libuart.log";

struct TimestampLogger;

fn format_line<Tz>(now: &DateTime<Tz>, level: Level, target: &str, args: &fmt::Arguments<'_>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!("{} {:<5} [{}] {}", now.format("%H:%M:%S%.3f"), level, target, args)
}

impl Log for TimestampLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_line(
            &chrono::Local::now(),
            record.level(),
            record.target(),
            record.args(),
        );
        eprintln!("{}", line);
        if let Ok(mut guard) = LOG_FILE.lock() {
            if let Some(ref mut f) = *guard {
                let _ = writeln!(f, "{}", line);
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut guard) = LOG_FILE.lock() {
            if let Some(ref mut f) = *guard {
                let _ = f.flush();
            }
        }
    }
}

/// Install the timestamped logger and set the maximum level.
///
/// Fails if another logger is already installed for this process.
pub fn init_logging(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Start mirroring log lines into a timestamped file under `log_dir`.
/// Also points a `libuart.log` symlink at it (Unix only).
///
/// Returns the path of the new file.
pub fn start_file_logging(log_dir: &Path) -> io::Result<PathBuf> {
    std::fs::create_dir_all(log_dir)?;

    let filename = chrono::Local::now()
        .format("%Y%m%d-%H%M%S-libuart.log")
        .to_string();
    let log_path = log_dir.join(&filename);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Windows symlinks need elevated privileges
    #[cfg(unix)]
    {
        let symlink_path = log_dir.join(LOG_NAME);
        let _ = std::fs::remove_file(&symlink_path);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &symlink_path) {
            log::warn!("Failed to create {} symlink: {}", LOG_NAME, e);
        }
    }

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }

    log::info!("File logging started: {}", log_path.display());
    Ok(log_path)
}

/// Stop file logging and close the log file.
pub fn stop_file_logging() {
    let stopped = match LOG_FILE.lock() {
        Ok(mut guard) => guard.take().is_some(),
        Err(_) => false,
    };
    if stopped {
        log::info!("File logging stopped");
    }
}

// ============================================================================
// Tests
// ============================================================================
