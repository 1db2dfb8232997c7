/// Backend process plumbing
///
/// `BackendLauncher` starts a backend and hands back a `BackendChannel`, the
/// request/response pipe used by the compiler service. `ProcessLauncher` is
/// the production implementation: it spawns the `glslens-backend` executable
/// and speaks the framed protocol over its stdin/stdout.

use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::protocol::{read_frame, write_frame, Request, Response, PROTOCOL_VERSION};
use crate::{glslens_debug, glslens_err, glslens_info, glslens_warn};

const SOURCE: &str = "glslens::backend";

/// Poll interval while waiting for the backend to exit
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Starts backend instances
///
/// Called by the compiler service on the 0 -> 1 handle transition only.
pub trait BackendLauncher: Send + Sync {
    /// Start a backend and complete the protocol handshake
    ///
    /// # Errors
    ///
    /// Returns `Error::StartupFailure` if the backend cannot be started or
    /// does not answer the handshake with a matching protocol version.
    fn launch(&self) -> Result<Box<dyn BackendChannel>>;
}

/// Request/response pipe to a running backend
pub trait BackendChannel: Send {
    /// Send one encoded request and return the encoded response
    fn round_trip(&mut self, request: &[u8]) -> Result<Vec<u8>>;

    /// Stop the backend and release its resources
    ///
    /// Called by the compiler service on the 1 -> 0 transition, unless the
    /// channel was aborted before.
    fn shutdown(&mut self) -> Result<()>;

    /// Stop a backend whose channel failed mid round trip, without sending
    /// anything more to it
    fn abort(&mut self);
}

// ===== PROCESS LAUNCHER =====

/// Launches the backend as a child process
pub struct ProcessLauncher {
    config: ServiceConfig,
}

impl ProcessLauncher {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }
}

impl BackendLauncher for ProcessLauncher {
    fn launch(&self) -> Result<Box<dyn BackendChannel>> {
        let path = self.config.backend_path.display().to_string();

        let mut child = Command::new(&self.config.backend_path)
            .args(&self.config.backend_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| glslens_err!(SOURCE, StartupFailure, "Cannot spawn '{}': {}", path, e))?;

        let pid = child.id();
        let forwarder = child.stderr.take().and_then(spawn_stderr_forwarder);

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(glslens_err!(
                    SOURCE,
                    StartupFailure,
                    "Backend '{}' started without piped stdio",
                    path
                ));
            }
        };

        let mut channel = ProcessChannel {
            child,
            stdin: Some(stdin),
            stdout,
            forwarder,
            max_frame_size: self.config.max_frame_size,
            shutdown_grace: self.config.shutdown_grace,
            exited: false,
        };

        if let Err(error) = channel.handshake() {
            channel.kill();
            return Err(glslens_err!(
                SOURCE,
                StartupFailure,
                "Handshake with '{}' (pid {}) failed: {}",
                path,
                pid,
                error
            ));
        }

        glslens_info!(SOURCE, "Backend '{}' started (pid {})", path, pid);
        Ok(Box::new(channel))
    }
}

/// Forward each backend stderr line to the logger at DEBUG
fn spawn_stderr_forwarder(stderr: ChildStderr) -> Option<JoinHandle<()>> {
    let spawned = thread::Builder::new()
        .name("glslens-backend-stderr".to_string())
        .spawn(move || {
            for line in BufReader::new(stderr).lines() {
                match line {
                    Ok(line) => glslens_debug!(SOURCE, "{}", line),
                    Err(_) => break,
                }
            }
        });

    match spawned {
        Ok(handle) => Some(handle),
        Err(error) => {
            glslens_warn!(SOURCE, "Backend stderr will not be forwarded: {}", error);
            None
        }
    }
}

// ===== PROCESS CHANNEL =====

struct ProcessChannel {
    child: Child,
    /// `None` once the shutdown request has been sent
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
    forwarder: Option<JoinHandle<()>>,
    max_frame_size: u32,
    shutdown_grace: Duration,
    exited: bool,
}

impl ProcessChannel {
    fn handshake(&mut self) -> Result<()> {
        let request = Request::Handshake { protocol_version: PROTOCOL_VERSION };
        let reply = self.round_trip(&request.encode())?;

        match Response::decode(&reply)? {
            Response::Handshake { protocol_version } if protocol_version == PROTOCOL_VERSION => Ok(()),
            Response::Handshake { protocol_version } => Err(Error::ProtocolError(format!(
                "backend speaks protocol version {}, expected {}",
                protocol_version, PROTOCOL_VERSION
            ))),
            other => Err(Error::ProtocolError(format!(
                "expected a handshake response, got {}",
                other.kind()
            ))),
        }
    }

    /// Wait for the child to exit, killing it once the grace period is over
    fn wait_with_grace(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.shutdown_grace;
        loop {
            if let Some(status) = self.child.try_wait()? {
                glslens_debug!(SOURCE, "Backend (pid {}) exited: {}", self.child.id(), status);
                return Ok(());
            }
            if Instant::now() >= deadline {
                glslens_warn!(
                    SOURCE,
                    "Backend (pid {}) still running after {:?}, killing it",
                    self.child.id(),
                    self.shutdown_grace
                );
                let _ = self.child.kill();
                self.child.wait()?;
                return Ok(());
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    fn kill(&mut self) {
        self.stdin = None;
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.exited = true;
        self.join_forwarder();
    }

    fn join_forwarder(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            let _ = forwarder.join();
        }
    }
}

impl BackendChannel for ProcessChannel {
    fn round_trip(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        // The backend would skip it and answer Rejected; fail before writing instead.
        if request.len() > self.max_frame_size as usize {
            return Err(Error::ProtocolError(format!(
                "request of {} bytes exceeds the {} byte limit",
                request.len(),
                self.max_frame_size
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Transport("backend channel is shut down".to_string()))?;
        write_frame(stdin, request)?;
        read_frame(&mut self.stdout, self.max_frame_size)
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.exited {
            return Ok(());
        }

        // Closing stdin after the request lets a backend that missed it exit on EOF.
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(error) = write_frame(&mut stdin, &Request::Shutdown.encode()) {
                glslens_warn!(SOURCE, "Could not send shutdown request: {}", error);
            }
        }

        let waited = self.wait_with_grace();
        self.exited = true;
        self.join_forwarder();
        waited
    }

    fn abort(&mut self) {
        if !self.exited {
            glslens_warn!(SOURCE, "Killing backend (pid {}) after a failed round trip", self.child.id());
            self.kill();
        }
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        if !self.exited {
            glslens_warn!(SOURCE, "Backend (pid {}) dropped without shutdown, killing it", self.child.id());
            self.kill();
        }
    }
}
