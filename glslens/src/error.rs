//! Error types for GLSLens
//!
//! This module defines the error types returned by stage resolution, the
//! compiler service lifecycle, and the wire protocol.

use std::fmt;

/// Result type for GLSLens operations
pub type Result<T> = std::result::Result<T, Error>;

/// GLSLens errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Stage tag not found in the stage table (carries the tag)
    UnknownStage(String),

    /// Backend could not be started on the first acquisition
    StartupFailure(String),

    /// Operation attempted on a released handle or a stopped service
    InvalidState(String),

    /// Malformed, truncated or unexpected backend message
    ProtocolError(String),

    /// The backend rejected the GLSL source (carries its diagnostic verbatim)
    CompilationError(String),

    /// Backend channel I/O failure (broken pipe, backend exited mid-query)
    Transport(String),
}

impl Error {
    /// Backend diagnostic text, for compilation errors only
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Error::CompilationError(diagnostic) => Some(diagnostic),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownStage(tag) => write!(f, "Unknown shader stage: '{}'", tag),
            Error::StartupFailure(msg) => write!(f, "Backend startup failed: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::ProtocolError(msg) => write!(f, "Protocol error: {}", msg),
            Error::CompilationError(diagnostic) => write!(f, "Compilation error: {}", diagnostic),
            Error::Transport(msg) => write!(f, "Backend transport error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Transport(error.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
