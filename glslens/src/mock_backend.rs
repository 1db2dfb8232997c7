/// Mock backend for unit tests (no backend process required)
///
/// `MockLauncher` hands out in-memory channels that decode requests with the
/// real protocol codec and answer through a scriptable responder. Everything
/// observable lives in a shared `MockState` the test keeps after moving the
/// launcher into a `CompilerService`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use crate::backend::{BackendChannel, BackendLauncher};
use crate::error::{Error, Result};
use crate::protocol::{Request, Response};
use crate::reflection::{ReflectionRecord, ShaderReflection, UniformSummary};

pub const GL_FLOAT: u32 = 0x1406;
pub const GL_FLOAT_VEC4: u32 = 0x8B52;

type Responder = Box<dyn Fn(&Request) -> Vec<u8> + Send + Sync>;

// ============================================================================
// Mock State
// ============================================================================

pub struct MockState {
    pub launches: AtomicUsize,
    pub shutdowns: AtomicUsize,
    /// Channels stopped through `abort`
    pub aborts: AtomicUsize,
    /// Channels launched and not yet shut down
    pub live_channels: AtomicUsize,
    pub fail_next_launch: AtomicBool,
    pub fail_shutdown: AtomicBool,
    /// The next round trip fails like a backend dying mid-frame
    pub fail_next_round_trip: AtomicBool,
    /// Launch delay, to widen race windows in concurrency tests
    pub launch_delay: Mutex<Duration>,
    /// Every request received, tagged with the launch number that served it
    pub requests: Mutex<Vec<(usize, Request)>>,
    responder: Mutex<Option<Responder>>,
}

impl MockState {
    fn new() -> Self {
        Self {
            launches: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            aborts: AtomicUsize::new(0),
            live_channels: AtomicUsize::new(0),
            fail_next_launch: AtomicBool::new(false),
            fail_shutdown: AtomicBool::new(false),
            fail_next_round_trip: AtomicBool::new(false),
            launch_delay: Mutex::new(Duration::ZERO),
            requests: Mutex::new(Vec::new()),
            responder: Mutex::new(None),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    pub fn live_channels(&self) -> usize {
        self.live_channels.load(Ordering::SeqCst)
    }

    /// Replace the default answers with raw response payloads
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&Request) -> Vec<u8> + Send + Sync + 'static,
    {
        *self.responder.lock().unwrap() = Some(Box::new(responder));
    }

    pub fn set_launch_delay(&self, delay: Duration) {
        *self.launch_delay.lock().unwrap() = delay;
    }

    pub fn requests(&self) -> Vec<(usize, Request)> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, request: &Request) -> Vec<u8> {
        if let Some(responder) = self.responder.lock().unwrap().as_ref() {
            return responder(request);
        }
        default_response(request).encode()
    }
}

/// Answers used when no responder is installed
pub fn default_response(request: &Request) -> Response {
    match request {
        Request::Handshake { protocol_version } => Response::Handshake {
            protocol_version: *protocol_version,
        },
        Request::Uniforms(_) => Response::Uniforms(vec![
            UniformSummary::new("color", 0, GL_FLOAT_VEC4),
            UniformSummary::new("weights", 4, GL_FLOAT),
        ]),
        Request::Reflect(_) => {
            let color = ReflectionRecord::new("color", GL_FLOAT_VEC4, 16);
            let mut weights = ReflectionRecord::new("weights", GL_FLOAT, 64);
            weights.array_size = 4;
            weights.array_stride = 16;
            Response::Reflection(ShaderReflection {
                uniforms: vec![color, weights],
                blocks: Vec::new(),
            })
        }
        Request::Shutdown => Response::Goodbye,
    }
}

// ============================================================================
// Mock Launcher
// ============================================================================

pub struct MockLauncher {
    state: Arc<MockState>,
}

impl MockLauncher {
    pub fn new() -> (Self, Arc<MockState>) {
        let state = Arc::new(MockState::new());
        (Self { state: Arc::clone(&state) }, state)
    }
}

impl BackendLauncher for MockLauncher {
    fn launch(&self) -> Result<Box<dyn BackendChannel>> {
        let delay = *self.state.launch_delay.lock().unwrap();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        if self.state.fail_next_launch.swap(false, Ordering::SeqCst) {
            return Err(Error::StartupFailure("mock launch failure".to_string()));
        }

        let generation = self.state.launches.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.live_channels.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockChannel {
            state: Arc::clone(&self.state),
            generation,
            closed: false,
        }))
    }
}

// ============================================================================
// Mock Channel
// ============================================================================

pub struct MockChannel {
    state: Arc<MockState>,
    generation: usize,
    closed: bool,
}

impl BackendChannel for MockChannel {
    fn round_trip(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        if self.closed {
            return Err(Error::Transport("mock channel closed".to_string()));
        }

        let request = Request::decode(request)?;
        self.state.requests.lock().unwrap().push((self.generation, request.clone()));

        if self.state.fail_next_round_trip.swap(false, Ordering::SeqCst) {
            return Err(Error::Transport("stream ended inside a frame header".to_string()));
        }

        Ok(self.state.respond(&request))
    }

    fn shutdown(&mut self) -> Result<()> {
        self.closed = true;
        self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.state.live_channels.fetch_sub(1, Ordering::SeqCst);

        if self.state.fail_shutdown.load(Ordering::SeqCst) {
            return Err(Error::Transport("mock shutdown failure".to_string()));
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.closed = true;
        self.state.aborts.fetch_add(1, Ordering::SeqCst);
        self.state.live_channels.fetch_sub(1, Ordering::SeqCst);
    }
}
