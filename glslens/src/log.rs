//! Logging for the client library and the backend
//!
//! Every message goes through the installed `Logger` (see `Glslens::set_logger`).
//! Client code logs to a colored console by default; the backend executable
//! installs `StderrLogger` because its stdout is the protocol channel.
//! Errors built with `glslens_err!` carry the file and line they came from.

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Destination for log entries
///
/// # Example
///
/// ```no_run
/// use std::sync::Mutex;
/// use glslens::log::{Logger, LogEntry};
///
/// struct Collect(Mutex<Vec<String>>);
///
/// impl Logger for Collect {
///     fn log(&self, entry: &LogEntry) {
///         if let Ok(mut lines) = self.0.lock() {
///             lines.push(entry.message.clone());
///         }
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One message, as handed to the installed logger
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Emitting component, e.g. "glslens::service" or "glslens::backend"
    pub source: String,
    pub message: String,
    /// Set by `glslens_error!` only
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Very verbose protocol traces
    Trace,

    /// Backend stderr, reflection details
    Debug,

    /// Lifecycle events (backend started, stopped)
    Info,

    /// Potential issues (forced kill, release failures in drop)
    Warn,

    /// Error messages with file:line details
    Error,
}

impl LogSeverity {
    /// Parse a severity name ("trace", "debug", "info", "warn", "error"), case-insensitive
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogSeverity::Trace),
            "debug" => Some(LogSeverity::Debug),
            "info" => Some(LogSeverity::Info),
            "warn" | "warning" => Some(LogSeverity::Warn),
            "error" => Some(LogSeverity::Error),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }
}

/// Local time, millisecond precision
fn format_timestamp(timestamp: SystemTime) -> String {
    let datetime: DateTime<Local> = timestamp.into();
    datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// `[timestamp] [SEVERITY] [source] message`, plus ` (file:line)` when known
pub fn format_plain(entry: &LogEntry) -> String {
    let timestamp = format_timestamp(entry.timestamp);
    match (entry.file, entry.line) {
        (Some(file), Some(line)) => format!(
            "[{}] [{}] [{}] {} ({}:{})",
            timestamp,
            entry.severity.label(),
            entry.source,
            entry.message,
            file,
            line
        ),
        _ => format!(
            "[{}] [{}] [{}] {}",
            timestamp,
            entry.severity.label(),
            entry.source,
            entry.message
        ),
    }
}

/// Colored console logger, installed until `Glslens::set_logger` is called
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let label = entry.severity.label();
        let severity = match entry.severity {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
        };

        let location = match (entry.file, entry.line) {
            (Some(file), Some(line)) => format!(" ({}:{})", file, line),
            _ => String::new(),
        };

        println!(
            "[{}] [{}] [{}] {}{}",
            format_timestamp(entry.timestamp),
            severity,
            entry.source.bright_blue(),
            entry.message,
            location
        );
    }
}

/// Uncolored logger writing to stderr
///
/// Used by the backend executable, whose stdout carries protocol frames.
pub struct StderrLogger;

impl Logger for StderrLogger {
    fn log(&self, entry: &LogEntry) {
        eprintln!("{}", format_plain(entry));
    }
}

// ===== LOGGING MACROS =====

/// Trace-level message (frame-by-frame protocol activity)
///
/// # Example
///
/// ```no_run
/// glslens::glslens_trace!("glslens::protocol", "encoded {} bytes", 42);
/// ```
#[macro_export]
macro_rules! glslens_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::Glslens::log(
            $crate::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Debug-level message
#[macro_export]
macro_rules! glslens_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::Glslens::log(
            $crate::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Info-level message (backend lifecycle)
///
/// # Example
///
/// ```no_run
/// glslens::glslens_info!("glslens::service", "backend started (launch #{})", 1);
/// ```
#[macro_export]
macro_rules! glslens_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::Glslens::log(
            $crate::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Warn-level message
#[macro_export]
macro_rules! glslens_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::Glslens::log(
            $crate::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Error-level message, recorded with the caller's file and line
#[macro_export]
macro_rules! glslens_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::Glslens::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an error and build the matching `Error` variant
///
/// # Example
///
/// ```no_run
/// use glslens::glslens_err;
///
/// let err = glslens_err!("glslens::service", InvalidState, "handle #{} was released", 3);
/// ```
#[macro_export]
macro_rules! glslens_err {
    ($source:expr, $variant:ident, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::glslens_error!($source, "{}", message);
        $crate::Error::$variant(message)
    }};
}

/// Log an error and return it from the current function
#[macro_export]
macro_rules! glslens_bail {
    ($source:expr, $variant:ident, $($arg:tt)*) => {
        return Err($crate::glslens_err!($source, $variant, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
