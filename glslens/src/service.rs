/// Reference-counted compiler service
///
/// One backend is shared by every open `CompilerHandle`. The first `acquire`
/// starts it, the last `release` stops it, and a later `acquire` starts a
/// fresh one.
///
/// Concurrency:
/// - `live_handles` only moves between nonzero values through lock-free CAS
///   loops; the 0 -> 1 and 1 -> 0 transitions happen under `transition`.
/// - Queries hold the `backend` read lock for their whole round trip, and the
///   stop path takes the write lock, so stopping waits for in-flight queries.
/// - The channel itself sits behind a `Mutex`: one request on the wire at a time.
///
/// A transport failure leaves the stream in an unknown state, so the failed
/// backend is killed and the next query launches a replacement. Open handles
/// stay valid throughout.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use crate::backend::{BackendChannel, BackendLauncher, ProcessLauncher};
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::protocol::{decode_reflection_response, decode_response, encode_reflect_request, encode_request};
use crate::reflection::{ShaderReflection, UniformSummary};
use crate::stage::StageId;
use crate::{glslens_debug, glslens_err, glslens_info, glslens_trace, glslens_warn};

const SOURCE: &str = "glslens::service";

// ===== SERVICE =====

/// Backend installed while at least one handle is open
struct RunningBackend {
    /// `None` after a transport failure, until the next query relaunches
    slot: Mutex<Option<Launched>>,
}

struct Launched {
    channel: Box<dyn BackendChannel>,
    /// Launch number, for logs
    generation: u64,
}

/// Counters describing the service history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceStats {
    /// Backends started so far
    pub launches: u64,
    /// Backends stopped so far, including those killed after a transport failure
    pub shutdowns: u64,
    /// Queries sent to a backend
    pub queries: u64,
    /// Handles not yet released
    pub live_handles: usize,
    /// Whether a backend is running right now
    pub running: bool,
}

/// Shared gateway to the compiler backend
///
/// # Example
///
/// ```no_run
/// use glslens::{CompilerService, ServiceConfig};
///
/// let service = CompilerService::with_config(ServiceConfig::from_env());
/// let handle = service.acquire()?;
/// let uniforms = handle.query("uniform vec4 color;\nvoid main() { gl_FragColor = color; }", 450, "frag")?;
/// handle.release()?;
/// # Ok::<(), glslens::Error>(())
/// ```
pub struct CompilerService {
    launcher: Box<dyn BackendLauncher>,
    live_handles: AtomicUsize,
    transition: Mutex<()>,
    backend: RwLock<Option<RunningBackend>>,
    launches: AtomicU64,
    shutdowns: AtomicU64,
    queries: AtomicU64,
    next_handle_id: AtomicU64,
}

impl CompilerService {
    /// Service using a custom launcher
    pub fn new<L: BackendLauncher + 'static>(launcher: L) -> Arc<Self> {
        Arc::new(Self {
            launcher: Box::new(launcher),
            live_handles: AtomicUsize::new(0),
            transition: Mutex::new(()),
            backend: RwLock::new(None),
            launches: AtomicU64::new(0),
            shutdowns: AtomicU64::new(0),
            queries: AtomicU64::new(0),
            next_handle_id: AtomicU64::new(1),
        })
    }

    /// Service launching the backend executable described by `config`
    pub fn with_config(config: ServiceConfig) -> Arc<Self> {
        Self::new(ProcessLauncher::new(config))
    }

    /// Open a handle, starting the backend if no other handle is open
    ///
    /// # Errors
    ///
    /// Returns `Error::StartupFailure` if the backend could not be started.
    /// The live count is left unchanged in that case.
    pub fn acquire(self: &Arc<Self>) -> Result<CompilerHandle> {
        if !self.try_increment_nonzero() {
            let _transition = self
                .transition
                .lock()
                .map_err(|_| glslens_err!(SOURCE, InvalidState, "Transition lock poisoned"))?;

            // Another thread may have finished the start while we waited.
            if !self.try_increment_nonzero() {
                self.start_backend()?;
                self.live_handles.store(1, Ordering::Release);
            }
        }

        let id = self.next_handle_id.fetch_add(1, Ordering::Relaxed);
        glslens_trace!(SOURCE, "Handle #{} acquired ({} live)", id, self.live_handles());

        Ok(CompilerHandle {
            service: Arc::clone(self),
            open: AtomicBool::new(true),
            id,
        })
    }

    /// Number of handles not yet released
    pub fn live_handles(&self) -> usize {
        self.live_handles.load(Ordering::Acquire)
    }

    /// Whether a backend is installed (at least one handle is open)
    ///
    /// Stays true across a transport failure; the replacement is launched by
    /// the next query.
    pub fn is_running(&self) -> bool {
        self.backend
            .read()
            .map(|backend| backend.is_some())
            .unwrap_or(false)
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            launches: self.launches.load(Ordering::Relaxed),
            shutdowns: self.shutdowns.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            live_handles: self.live_handles(),
            running: self.is_running(),
        }
    }

    // ===== COUNTER =====

    /// Increment unless the count is 0
    fn try_increment_nonzero(&self) -> bool {
        let mut current = self.live_handles.load(Ordering::Acquire);
        while current > 0 {
            match self.live_handles.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }

    /// Decrement unless that would reach 0
    fn try_decrement_above_one(&self) -> bool {
        let mut current = self.live_handles.load(Ordering::Acquire);
        while current > 1 {
            match self.live_handles.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }

    /// Give back one handle's reference, stopping the backend on the last one
    fn release_reference(&self) -> Result<()> {
        if self.try_decrement_above_one() {
            return Ok(());
        }

        let _transition = self
            .transition
            .lock()
            .map_err(|_| glslens_err!(SOURCE, InvalidState, "Transition lock poisoned"))?;

        // Fast-path acquires can still bump 1 -> 2 until the count reads 0.
        loop {
            if self.try_decrement_above_one() {
                return Ok(());
            }
            if self
                .live_handles
                .compare_exchange(1, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }

        self.stop_backend()
    }

    // ===== BACKEND LIFECYCLE =====

    /// Called with the transition lock held and a live count of 0
    fn start_backend(&self) -> Result<()> {
        let launched = self.launch()?;

        let mut backend = self
            .backend
            .write()
            .map_err(|_| glslens_err!(SOURCE, InvalidState, "Backend lock poisoned"))?;
        *backend = Some(RunningBackend {
            slot: Mutex::new(Some(launched)),
        });
        Ok(())
    }

    fn launch(&self) -> Result<Launched> {
        glslens_debug!(SOURCE, "Starting backend (launch #{})", self.launches.load(Ordering::Relaxed) + 1);
        let channel = self.launcher.launch()?;
        let generation = self.launches.fetch_add(1, Ordering::Relaxed) + 1;

        glslens_info!(SOURCE, "Backend running (launch #{})", generation);
        Ok(Launched { channel, generation })
    }

    /// Kill a backend whose channel failed; its replacement starts on demand
    fn abort(&self, mut launched: Launched, error: &Error) {
        glslens_warn!(
            SOURCE,
            "Backend (launch #{}) failed: {}; the next query starts a new one",
            launched.generation,
            error
        );
        launched.channel.abort();
        self.shutdowns.fetch_add(1, Ordering::Relaxed);
    }

    /// Called with the transition lock held after the count reached 0
    fn stop_backend(&self) -> Result<()> {
        // Waits for in-flight queries to release their read locks.
        let running = {
            let mut backend = self
                .backend
                .write()
                .map_err(|_| glslens_err!(SOURCE, InvalidState, "Backend lock poisoned"))?;
            backend.take()
        };

        let Some(running) = running else {
            glslens_warn!(SOURCE, "Last handle released but no backend was running");
            return Ok(());
        };

        let slot = running
            .slot
            .into_inner()
            .map_err(|_| glslens_err!(SOURCE, InvalidState, "Backend channel lock poisoned"))?;
        let Some(mut launched) = slot else {
            glslens_debug!(SOURCE, "Backend was already stopped after a failed round trip");
            return Ok(());
        };

        self.shutdowns.fetch_add(1, Ordering::Relaxed);
        match launched.channel.shutdown() {
            Ok(()) => {
                glslens_info!(SOURCE, "Backend stopped (launch #{})", launched.generation);
                Ok(())
            }
            Err(error) => Err(glslens_err!(
                SOURCE,
                Transport,
                "Backend (launch #{}) did not shut down cleanly: {}",
                launched.generation,
                error
            )),
        }
    }

    /// Send one request to the running backend
    ///
    /// Relaunches the backend first if the previous round trip broke it.
    fn round_trip(&self, request: &[u8]) -> Result<Vec<u8>> {
        let backend = self
            .backend
            .read()
            .map_err(|_| glslens_err!(SOURCE, InvalidState, "Backend lock poisoned"))?;
        let running = backend
            .as_ref()
            .ok_or_else(|| glslens_err!(SOURCE, InvalidState, "Backend is not running"))?;
        let mut slot = running
            .slot
            .lock()
            .map_err(|_| glslens_err!(SOURCE, InvalidState, "Backend channel lock poisoned"))?;

        let mut launched = match slot.take() {
            Some(launched) => launched,
            None => self.launch()?,
        };

        self.queries.fetch_add(1, Ordering::Relaxed);
        match launched.channel.round_trip(request) {
            Ok(reply) => {
                *slot = Some(launched);
                Ok(reply)
            }
            // Nothing is known about where the stream stands
            Err(error @ Error::Transport(_)) => {
                crate::glslens_error!(SOURCE, "Round trip failed: {}", error);
                self.abort(launched, &error);
                Err(error)
            }
            // Framing and codec failures leave the stream on a frame boundary
            Err(error) => {
                crate::glslens_error!(SOURCE, "Round trip failed: {}", error);
                *slot = Some(launched);
                Err(error)
            }
        }
    }
}

// ===== HANDLE =====

/// Open reference to the compiler service
///
/// Dropping the handle releases it; call `release()` to observe shutdown errors.
pub struct CompilerHandle {
    service: Arc<CompilerService>,
    open: AtomicBool,
    id: u64,
}

impl CompilerHandle {
    /// Active uniforms of `source`, in declaration order
    ///
    /// # Errors
    ///
    /// - `UnknownStage` if `stage_tag` is not a known stage (checked first,
    ///   without contacting the backend)
    /// - `InvalidState` if the handle was released
    /// - `CompilationError` with the backend diagnostic if the source is rejected
    /// - `ProtocolError` / `Transport` for backend communication failures
    pub fn query(&self, source: &str, version: u32, stage_tag: &str) -> Result<Vec<UniformSummary>> {
        let stage = resolve_stage(stage_tag)?;
        self.query_stage(source, version, stage)
    }

    /// Same as `query` with an already resolved stage
    pub fn query_stage(&self, source: &str, version: u32, stage: StageId) -> Result<Vec<UniformSummary>> {
        self.ensure_open()?;
        let reply = self.service.round_trip(&encode_request(source, version, stage))?;
        decode_response(&reply).map_err(|error| self.log_query_failure(error))
    }

    /// Full reflection (records and blocks) of `source`
    pub fn reflect(&self, source: &str, version: u32, stage_tag: &str) -> Result<ShaderReflection> {
        let stage = resolve_stage(stage_tag)?;
        self.ensure_open()?;
        let reply = self.service.round_trip(&encode_reflect_request(source, version, stage))?;
        decode_reflection_response(&reply).map_err(|error| self.log_query_failure(error))
    }

    /// Release the handle
    ///
    /// Releasing the last open handle stops the backend before returning.
    /// Releasing twice is a no-op.
    pub fn release(&self) -> Result<()> {
        if !self.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        glslens_trace!(SOURCE, "Handle #{} released", self.id);
        self.service.release_reference()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Process-unique handle number
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Service this handle belongs to
    pub fn service(&self) -> &Arc<CompilerService> {
        &self.service
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(glslens_err!(SOURCE, InvalidState, "Handle #{} was already released", self.id))
        }
    }

    fn log_query_failure(&self, error: Error) -> Error {
        match &error {
            Error::CompilationError(diagnostic) => {
                glslens_debug!(SOURCE, "Handle #{}: source rejected: {}", self.id, diagnostic);
            }
            other => {
                crate::glslens_error!(SOURCE, "Handle #{}: {}", self.id, other);
            }
        }
        error
    }
}

impl Drop for CompilerHandle {
    fn drop(&mut self) {
        if let Err(error) = self.release() {
            glslens_warn!(SOURCE, "Releasing handle #{} on drop failed: {}", self.id, error);
        }
    }
}

impl std::fmt::Debug for CompilerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerHandle")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .finish()
    }
}

fn resolve_stage(tag: &str) -> Result<StageId> {
    StageId::parse(tag).ok_or_else(|| glslens_err!(SOURCE, UnknownStage, "{}", tag))
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
