//! Compiler service configuration
//!
//! Configuration is a plain struct with builder-style setters. `from_env()`
//! layers the `GLSLENS_*` environment variables on top of the defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

/// Environment variable overriding the backend executable path
pub const ENV_BACKEND: &str = "GLSLENS_BACKEND";

/// Environment variable overriding the shutdown grace period (milliseconds)
pub const ENV_SHUTDOWN_GRACE_MS: &str = "GLSLENS_SHUTDOWN_GRACE_MS";

/// Environment variable overriding the maximum frame size (bytes)
pub const ENV_MAX_FRAME_SIZE: &str = "GLSLENS_MAX_FRAME_SIZE";

/// Default backend executable name, resolved through `PATH`
#[cfg(windows)]
pub const DEFAULT_BACKEND: &str = "glslens-backend.exe";
#[cfg(not(windows))]
pub const DEFAULT_BACKEND: &str = "glslens-backend";

/// Default time the backend gets to exit after a shutdown request
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Settings used to launch and talk to the backend process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Backend executable
    pub backend_path: PathBuf,
    /// Extra command-line arguments passed to the backend
    pub backend_args: Vec<String>,
    /// Time to wait for a clean exit before killing the backend
    pub shutdown_grace: Duration,
    /// Largest accepted response frame, in bytes
    pub max_frame_size: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend_path: PathBuf::from(DEFAULT_BACKEND),
            backend_args: Vec::new(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by `GLSLENS_BACKEND`, `GLSLENS_SHUTDOWN_GRACE_MS`
    /// and `GLSLENS_MAX_FRAME_SIZE`
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(path) = env::var_os(ENV_BACKEND).filter(|value| !value.is_empty()) {
            config.backend_path = PathBuf::from(path);
        }

        if let Some(millis) = read_numeric::<u64>(ENV_SHUTDOWN_GRACE_MS) {
            config.shutdown_grace = Duration::from_millis(millis);
        }

        if let Some(size) = read_numeric::<u32>(ENV_MAX_FRAME_SIZE) {
            config.max_frame_size = size;
        }

        config
    }

    pub fn with_backend_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.backend_path = path.into();
        self
    }

    pub fn with_backend_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backend_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: u32) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }
}

fn read_numeric<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            crate::glslens_warn!("glslens::config", "Ignoring {}={:?}: not a number", name, raw);
            None
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
