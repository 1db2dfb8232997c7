use clap::{Parser, ValueEnum};
use glslens::log::LogSeverity;
use glslens::protocol::DEFAULT_MAX_FRAME_SIZE;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl From<LogLevel> for LogSeverity {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LogSeverity::Trace,
            LogLevel::Debug => LogSeverity::Debug,
            LogLevel::Info => LogSeverity::Info,
            LogLevel::Warn => LogSeverity::Warn,
            LogLevel::Error => LogSeverity::Error,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "glslens-backend", bin_name = "glslens-backend")]
#[command(about = "GLSL uniform reflection backend for glslens")]
#[command(after_help = r#"EXAMPLES:
  glslens-backend                      # serve the framed protocol on stdin/stdout
  printf '450\nfrag\n...' | glslens-backend --oneshot"#)]
pub struct Cli {
    /// Read version, stage and source from stdin and print `name arraySize typeId` lines
    #[arg(long)]
    pub oneshot: bool,

    /// Largest accepted request frame in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: u32,

    /// Minimum severity written to stderr
    #[arg(long, value_enum, default_value_t = LogLevel::Warn, value_name = "LEVEL")]
    pub log_level: LogLevel,
}
