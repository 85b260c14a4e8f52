//! Structured logging for the forest-change query engine
//!
//! Provides context-rich logging tagged with the data source and the
//! geographic scope a request targets. Supports both console output
//! and file-based logging for long-running services.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::Mutex;

use crate::model::ExecutionError;
use crate::sources::DataSourceId;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Log Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Dataset(DataSourceId),
    Store,
    Engine,
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSource::Dataset(DataSourceId::Forma) => write!(f, "FORMA"),
            LogSource::Dataset(DataSourceId::Imazon) => write!(f, "IMAZON"),
            LogSource::Dataset(DataSourceId::TerraI) => write!(f, "TERRAI"),
            LogSource::Dataset(DataSourceId::Fires) => write!(f, "FIRES"),
            LogSource::Store => write!(f, "CARTODB"),
            LogSource::Engine => write!(f, "SYS"),
        }
    }
}

impl From<DataSourceId> for LogSource {
    fn from(id: DataSourceId) -> Self {
        LogSource::Dataset(id)
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the store rejected the request itself (bad geometry, unknown id)
    Expected,
    /// Unexpected failure - indicates store degradation or a broken template
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Where console log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStream {
    /// Info and debug on stdout, warnings and errors on stderr
    Split,
    /// Everything on stderr, leaving stdout for machine-readable output
    Stderr,
}

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
    /// Stream selection for console output
    console: ConsoleStream,
}

impl Logger {
    pub fn new(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool, console: ConsoleStream) -> Self {
        Logger {
            min_level,
            log_file,
            console_timestamps,
            console,
        }
    }

    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool, console: ConsoleStream) {
        let logger = Logger::new(min_level, log_file, console_timestamps, console);

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, source: &LogSource, scope: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let scope_part = scope.map(|s| format!(" [{}]", s)).unwrap_or_default();
        let log_entry = format!("{} {} {}{}: {}", timestamp, level, source, scope_part, message);

        let line = if self.console_timestamps {
            log_entry.clone()
        } else {
            match level {
                LogLevel::Error => format!("   ✗ {}{}: {}", source, scope_part, message),
                LogLevel::Warning => format!("   ⚠ {}{}: {}", source, scope_part, message),
                LogLevel::Info => format!("   {}", message),
                LogLevel::Debug => format!("   [DEBUG] {}{}: {}", source, scope_part, message),
            }
        };
        if self.writes_to_stderr(level) {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    /// Whether a console line at `level` goes to stderr.
    pub fn writes_to_stderr(&self, level: LogLevel) -> bool {
        match self.console {
            ConsoleStream::Stderr => true,
            ConsoleStream::Split => level >= LogLevel::Warning,
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool, console: ConsoleStream) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps, console);
}

fn emit(level: LogLevel, source: LogSource, scope: Option<&str>, message: &str) {
    if let Ok(slot) = LOGGER.lock() {
        if let Some(logger) = slot.as_ref() {
            logger.log(level, &source, scope, message);
        }
    }
}

/// Log a general informational message
pub fn info(source: impl Into<LogSource>, scope: Option<&str>, message: &str) {
    emit(LogLevel::Info, source.into(), scope, message);
}

/// Log a warning message
pub fn warn(source: impl Into<LogSource>, scope: Option<&str>, message: &str) {
    emit(LogLevel::Warning, source.into(), scope, message);
}

/// Log an error message
pub fn error(source: impl Into<LogSource>, scope: Option<&str>, message: &str) {
    emit(LogLevel::Error, source.into(), scope, message);
}

/// Log a debug message
pub fn debug(source: impl Into<LogSource>, scope: Option<&str>, message: &str) {
    emit(LogLevel::Debug, source.into(), scope, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a failed execution by what went wrong on the way to the store.
pub fn classify_execution_failure(err: &ExecutionError) -> FailureType {
    match err {
        // 4xx: the store understood the request and refused it, usually an
        // id or geometry that does not exist on its side.
        ExecutionError::Upstream { status, .. } if (400..500).contains(status) => FailureType::Expected,
        ExecutionError::Upstream { .. } => FailureType::Unexpected,
        ExecutionError::Transport(_) => FailureType::Unexpected,
        // The store answered 200 with a body we cannot read: API change or proxy page.
        ExecutionError::MalformedResponse(_) => FailureType::Unknown,
    }
}

/// Log an execution failure with automatic classification
pub fn log_execution_failure(source: DataSourceId, scope: &str, err: &ExecutionError) {
    let failure_type = classify_execution_failure(err);
    let message = format!("query failed [{}]: {}", failure_type, err);

    match failure_type {
        FailureType::Expected => warn(source, Some(scope), &message),
        FailureType::Unexpected => error(source, Some(scope), &message),
        FailureType::Unknown => warn(source, Some(scope), &message),
    }
}

// ---------------------------------------------------------------------------
// Verification Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of registry verification
pub fn log_verification_summary(total: usize, passed: usize, failed: usize) {
    let message = format!("Registry verification: {}/{} sources passed, {} failed", passed, total, failed);

    if failed == 0 {
        info(LogSource::Engine, None, &message);
    } else if passed == 0 {
        error(LogSource::Engine, None, &message);
    } else {
        warn(LogSource::Engine, None, &message);
    }
}
