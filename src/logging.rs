//! Logging infrastructure for LinkVault.
//!
//! Two sinks sit behind the `log` facade:
//!
//! - **Console** (`env_logger`). Level is chosen by, in priority order:
//!   1. `RUST_LOG` environment variable (if set)
//!   2. CLI flags: `--quiet` (error only) or `--verbose` (debug/trace)
//!   3. Default: info level
//! - **Log file** (optional). Every record at debug level or above is
//!   appended with a local timestamp, independent of console verbosity.
//!
//! # Example
//!
//! ```rust,no_run
//! use linkvault::logging::init_logging;
//! use std::path::Path;
//!
//! init_logging(1, false, Some(Path::new("linkvault.log"))).unwrap();
//! log::debug!("shown on the console and written to the file");
//! ```

use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use env_logger::Builder;
use log::{Level, LevelFilter, Log, Metadata, Record};
use thiserror::Error;

/// Minimum level always written to the log file.
pub const FILE_LEVEL: LevelFilter = LevelFilter::Debug;

/// Errors raised while installing the logger.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log file could not be opened for appending.
    #[error("cannot open log file {path}: {source}")]
    OpenLogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A global logger is already installed (second `run_app` in one process).
    #[error("logger already initialized")]
    AlreadyInitialized,
}

/// Fans records out to the console logger and the optional log file.
struct TeeLogger {
    console: env_logger::Logger,
    file: Option<Mutex<File>>,
}

impl TeeLogger {
    fn file_accepts(&self, level: Level) -> bool {
        self.file.is_some() && level <= FILE_LEVEL
    }
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.console.enabled(metadata) || self.file_accepts(metadata.level())
    }

    fn log(&self, record: &Record<'_>) {
        if self.console.matches(record) {
            self.console.log(record);
        }

        if !self.file_accepts(record.level()) {
            return;
        }
        if let Some(Ok(mut file)) = self.file.as_ref().map(Mutex::lock) {
            let _ = writeln!(
                file,
                "{} {:<5} {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(Ok(mut file)) = self.file.as_ref().map(Mutex::lock) {
            let _ = file.flush();
        }
    }
}

/// Initialize logging from CLI verbosity flags and an optional log file.
///
/// # Priority
///
/// 1. If `RUST_LOG` environment variable is set, it takes precedence
/// 2. If `quiet` is true: Error level only
/// 3. If `verbose >= 2`: Trace level
/// 4. If `verbose == 1`: Debug level
/// 5. Default: Info level
///
/// # Errors
///
/// [`LoggingError::OpenLogFile`] if the file can't be opened, and
/// [`LoggingError::AlreadyInitialized`] on a second call in one process.
pub fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> Result<(), LoggingError> {
    let use_env = env::var("RUST_LOG").is_ok();

    let mut builder = Builder::new();
    if use_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }
    configure_format(&mut builder, verbose);
    let console = builder.build();

    let file = match log_file {
        Some(path) => Some(Mutex::new(open_log_file(path)?)),
        None => None,
    };

    let mut max_level = console.filter();
    if file.is_some() && max_level < FILE_LEVEL {
        max_level = FILE_LEVEL;
    }

    log::set_boxed_logger(Box::new(TeeLogger { console, file }))
        .map_err(|_| LoggingError::AlreadyInitialized)?;
    log::set_max_level(max_level);

    log::debug!(
        "Logging initialized at level {:?}{}",
        max_level,
        log_file.map_or_else(String::new, |p| format!(", file {}", p.display()))
    );
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| LoggingError::OpenLogFile {
            path: path.to_path_buf(),
            source,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::OpenLogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Determine the console log level from CLI flags.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Configure the console format.
///
/// Verbose modes include the module path.
fn configure_format(builder: &mut Builder, verbose: u8) {
    builder.format(move |buf, record| {
        let timestamp = buf.timestamp_seconds();
        let level = record.level();
        let level_style = buf.default_level_style(level);

        if verbose >= 1 {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} [{}] {}",
                timestamp,
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} {}",
                timestamp,
                level,
                record.args()
            )
        }
    });
}

/// Get the current maximum log level as a string.
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
