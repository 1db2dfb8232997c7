/// GLSLens - Process-wide access to the compiler service and the logger
///
/// This module owns the global state: the installed logger, the minimum log
/// severity, and the process-wide `CompilerService`. Independent services can
/// still be built with `CompilerService::new`.

use std::env;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::SystemTime;
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
use crate::service::{CompilerHandle, CompilerService};

/// Environment variable selecting the minimum log severity
pub const ENV_LOG: &str = "GLSLENS_LOG";

// ===== GLOBAL STATE =====

/// Installed logger, `DefaultLogger` until replaced
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Minimum severity as `LogSeverity as u8`; `UNSET_LEVEL` until first use
static MIN_SEVERITY: AtomicU8 = AtomicU8::new(UNSET_LEVEL);

/// Process-wide compiler service
static SERVICE: OnceLock<Arc<CompilerService>> = OnceLock::new();

const UNSET_LEVEL: u8 = u8::MAX;

fn severity_to_u8(severity: LogSeverity) -> u8 {
    severity as u8
}

fn severity_from_u8(value: u8) -> LogSeverity {
    match value {
        0 => LogSeverity::Trace,
        1 => LogSeverity::Debug,
        2 => LogSeverity::Info,
        3 => LogSeverity::Warn,
        _ => LogSeverity::Error,
    }
}

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

// ===== PUBLIC API =====

/// Process-wide entry point
///
/// # Example
///
/// ```no_run
/// use glslens::{Glslens, ServiceConfig};
///
/// Glslens::initialize(ServiceConfig::default().with_backend_path("/usr/local/bin/glslens-backend"))?;
///
/// let handle = Glslens::acquire()?;
/// for uniform in handle.query("uniform vec4 tint;\nvoid main() { gl_FragColor = tint; }", 450, "frag")? {
///     println!("{} [{}] 0x{:04X}", uniform.name(), uniform.array_size(), uniform.type_id());
/// }
/// handle.release()?;
/// # Ok::<(), glslens::Error>(())
/// ```
pub struct Glslens;

impl Glslens {
    // ===== SERVICE API =====

    /// Install the process-wide compiler service
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` if a service is already installed, either
    /// by an earlier `initialize` or lazily by `acquire`/`service`.
    pub fn initialize(config: ServiceConfig) -> Result<()> {
        let mut installed = false;
        SERVICE.get_or_init(|| {
            installed = true;
            CompilerService::with_config(config)
        });

        if !installed {
            crate::glslens_bail!(
                "glslens::Glslens",
                InvalidState,
                "Compiler service already initialized"
            );
        }

        crate::glslens_debug!("glslens::Glslens", "Compiler service installed");
        Ok(())
    }

    /// The process-wide compiler service
    ///
    /// Installs one from `ServiceConfig::from_env()` if `initialize` was never called.
    pub fn service() -> Arc<CompilerService> {
        Arc::clone(SERVICE.get_or_init(|| CompilerService::with_config(ServiceConfig::from_env())))
    }

    /// Acquire a handle from the process-wide service
    pub fn acquire() -> Result<CompilerHandle> {
        Self::service().acquire()
    }

    // ===== LOGGING =====

    /// Set a custom logger
    ///
    /// # Example
    ///
    /// ```no_run
    /// use glslens::Glslens;
    /// use glslens::log::{Logger, LogEntry};
    ///
    /// struct Silent;
    /// impl Logger for Silent {
    ///     fn log(&self, _entry: &LogEntry) {}
    /// }
    ///
    /// Glslens::set_logger(Silent);
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger_impl: L) {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(logger_impl);
        }
    }

    /// Put `DefaultLogger` back
    pub fn reset_logger() {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Set the minimum severity forwarded to the logger
    pub fn set_log_level(severity: LogSeverity) {
        MIN_SEVERITY.store(severity_to_u8(severity), Ordering::Relaxed);
    }

    /// Current minimum severity (`GLSLENS_LOG`, else Info, until set explicitly)
    pub fn log_level() -> LogSeverity {
        let current = MIN_SEVERITY.load(Ordering::Relaxed);
        if current != UNSET_LEVEL {
            return severity_from_u8(current);
        }

        let from_env = env::var(ENV_LOG)
            .ok()
            .and_then(|value| LogSeverity::parse(&value))
            .unwrap_or(LogSeverity::Info);
        // A concurrent set_log_level wins over the environment default.
        let _ = MIN_SEVERITY.compare_exchange(
            UNSET_LEVEL,
            severity_to_u8(from_env),
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
        severity_from_u8(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    /// Entry point of `glslens_trace!` .. `glslens_warn!`
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        Self::dispatch(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: None,
            line: None,
        });
    }

    /// Entry point of `glslens_error!`, which passes its call site
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        Self::dispatch(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: Some(file),
            line: Some(line),
        });
    }

    fn dispatch(entry: LogEntry) {
        if entry.severity < Self::log_level() {
            return;
        }
        if let Ok(lock) = logger().read() {
            lock.log(&entry);
        }
    }
}

#[cfg(test)]
#[path = "glslens_tests.rs"]
mod tests;
