//! Unit tests for service.rs
//!
//! Uses MockLauncher: no backend process is started.

use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;
use crate::error::Error;
use crate::mock_backend::{default_response, MockLauncher, GL_FLOAT, GL_FLOAT_VEC4};
use crate::protocol::{Request, Response};
use crate::service::{CompilerService, ServiceStats};
use crate::stage::StageId;

const SOURCE: &str = "uniform vec4 color;\nuniform float weights[4];\nvoid main() {}\n";

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_new_service_is_idle() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);

    assert_eq!(service.live_handles(), 0);
    assert!(!service.is_running());
    assert_eq!(service.stats(), ServiceStats::default());
    assert_eq!(state.launches(), 0);
}

#[test]
fn test_first_acquire_starts_backend_once() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);

    let first = service.acquire().unwrap();
    assert!(service.is_running());
    assert_eq!(state.launches(), 1);

    let second = service.acquire().unwrap();
    let third = service.acquire().unwrap();
    assert_eq!(state.launches(), 1);
    assert_eq!(service.live_handles(), 3);
    assert_ne!(first.id(), second.id());
    assert_ne!(second.id(), third.id());
}

#[test]
fn test_last_release_stops_backend() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);

    let a = service.acquire().unwrap();
    let b = service.acquire().unwrap();

    a.release().unwrap();
    assert!(service.is_running());
    assert_eq!(state.shutdowns(), 0);
    assert_eq!(service.live_handles(), 1);

    b.release().unwrap();
    assert!(!service.is_running());
    assert_eq!(state.shutdowns(), 1);
    assert_eq!(state.live_channels(), 0);
    assert_eq!(service.live_handles(), 0);
}

#[test]
fn test_release_is_idempotent() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);

    let keep = service.acquire().unwrap();
    let handle = service.acquire().unwrap();

    handle.release().unwrap();
    handle.release().unwrap();
    handle.release().unwrap();

    assert!(!handle.is_open());
    assert!(keep.is_open());
    assert_eq!(service.live_handles(), 1);
    assert!(service.is_running());
    assert_eq!(state.shutdowns(), 0);
}

#[test]
fn test_drop_releases_handle() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);

    {
        let _handle = service.acquire().unwrap();
        assert_eq!(service.live_handles(), 1);
    }

    assert_eq!(service.live_handles(), 0);
    assert!(!service.is_running());
    assert_eq!(state.shutdowns(), 1);
}

#[test]
fn test_drop_after_release_does_not_double_decrement() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);

    let keep = service.acquire().unwrap();
    let handle = service.acquire().unwrap();
    handle.release().unwrap();
    drop(handle);

    assert_eq!(service.live_handles(), 1);
    assert_eq!(state.shutdowns(), 0);
    drop(keep);
    assert_eq!(state.shutdowns(), 1);
}

#[test]
fn test_reacquire_after_drain_starts_fresh_backend() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);

    let handle = service.acquire().unwrap();
    handle.query(SOURCE, 450, "frag").unwrap();
    handle.release().unwrap();

    let handle = service.acquire().unwrap();
    handle.query(SOURCE, 450, "frag").unwrap();

    assert_eq!(state.launches(), 2);
    assert_eq!(state.shutdowns(), 1);

    let generations: Vec<usize> = state
        .requests()
        .iter()
        .filter(|(_, request)| matches!(request, Request::Uniforms(_)))
        .map(|(generation, _)| *generation)
        .collect();
    assert_eq!(generations, vec![1, 2]);

    let stats = service.stats();
    assert_eq!(stats.launches, 2);
    assert_eq!(stats.shutdowns, 1);
    assert_eq!(stats.queries, 2);
    assert_eq!(stats.live_handles, 1);
    assert!(stats.running);
}

#[test]
fn test_startup_failure_rolls_back() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);
    state.fail_next_launch.store(true, Ordering::SeqCst);

    let err = service.acquire().unwrap_err();
    assert!(matches!(err, Error::StartupFailure(_)));
    assert_eq!(service.live_handles(), 0);
    assert!(!service.is_running());

    let handle = service.acquire().unwrap();
    assert_eq!(service.live_handles(), 1);
    assert_eq!(state.launches(), 1);
    assert_eq!(service.stats().launches, 1);
    assert!(handle.is_open());
}

#[test]
fn test_shutdown_failure_is_reported_and_state_is_clean() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);
    state.fail_shutdown.store(true, Ordering::SeqCst);

    let handle = service.acquire().unwrap();
    let err = handle.release().unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(service.live_handles(), 0);
    assert!(!service.is_running());

    state.fail_shutdown.store(false, Ordering::SeqCst);
    let again = service.acquire().unwrap();
    assert!(again.is_open());
    assert_eq!(state.launches(), 2);
}

// ============================================================================
// QUERIES
// ============================================================================

#[test]
fn test_query_returns_backend_order() {
    let (launcher, _state) = MockLauncher::new();
    let service = CompilerService::new(launcher);
    let handle = service.acquire().unwrap();

    let uniforms = handle.query(SOURCE, 450, "frag").unwrap();

    assert_eq!(uniforms.len(), 2);
    assert_eq!(uniforms[0].name(), "color");
    assert_eq!(uniforms[0].array_size(), 0);
    assert_eq!(uniforms[0].type_id(), GL_FLOAT_VEC4);
    assert_eq!(uniforms[1].name(), "weights");
    assert_eq!(uniforms[1].array_size(), 4);
    assert_eq!(uniforms[1].type_id(), GL_FLOAT);
}

#[test]
fn test_query_sends_resolved_stage_and_version() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);
    let handle = service.acquire().unwrap();

    handle.query(SOURCE, 310, "EShLangRayGenNV").unwrap();

    let requests = state.requests();
    match requests.last() {
        Some((_, Request::Uniforms(query))) => {
            assert_eq!(query.version, 310);
            assert_eq!(query.stage, StageId::RayGen);
            assert_eq!(query.source, SOURCE);
        }
        other => panic!("expected a uniforms request, got {:?}", other),
    }
}

#[test]
fn test_unknown_stage_never_reaches_backend() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);
    let handle = service.acquire().unwrap();
    let before = state.requests().len();

    match handle.query(SOURCE, 450, "xyz") {
        Err(Error::UnknownStage(tag)) => assert_eq!(tag, "xyz"),
        other => panic!("expected UnknownStage, got {:?}", other),
    }
    assert!(matches!(handle.reflect(SOURCE, 450, "xyz"), Err(Error::UnknownStage(_))));

    assert_eq!(state.requests().len(), before);
    assert_eq!(service.stats().queries, 0);
}

#[test]
fn test_unknown_stage_wins_over_released_handle() {
    let (launcher, _state) = MockLauncher::new();
    let service = CompilerService::new(launcher);
    let handle = service.acquire().unwrap();
    handle.release().unwrap();

    assert!(matches!(handle.query(SOURCE, 450, "xyz"), Err(Error::UnknownStage(_))));
}

#[test]
fn test_query_after_release_is_invalid_state() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);

    let other = service.acquire().unwrap();
    let handle = service.acquire().unwrap();
    handle.release().unwrap();

    assert!(matches!(handle.query(SOURCE, 450, "frag"), Err(Error::InvalidState(_))));
    assert!(matches!(handle.reflect(SOURCE, 450, "frag"), Err(Error::InvalidState(_))));
    assert!(matches!(
        handle.query_stage(SOURCE, 450, StageId::Fragment),
        Err(Error::InvalidState(_))
    ));

    // The other handle is unaffected.
    assert!(other.query(SOURCE, 450, "frag").is_ok());
    assert_eq!(state.launches(), 1);
}

#[test]
fn test_compilation_error_carries_diagnostic() {
    let (launcher, state) = MockLauncher::new();
    state.set_responder(|request| match request {
        Request::Handshake { protocol_version } => Response::Handshake {
            protocol_version: *protocol_version,
        }
        .encode(),
        _ => Response::CompilationFailed("ERROR: 0:1: 'uniform' : syntax error".to_string()).encode(),
    });
    let service = CompilerService::new(launcher);
    let handle = service.acquire().unwrap();

    let err = handle.query("uniform vec4 color", 450, "frag").unwrap_err();
    assert_eq!(err.diagnostic(), Some("ERROR: 0:1: 'uniform' : syntax error"));

    // The handle stays usable after a compilation error.
    assert!(handle.is_open());
    assert!(service.is_running());
}

#[test]
fn test_malformed_response_is_protocol_error() {
    let (launcher, state) = MockLauncher::new();
    state.set_responder(|_| vec![0x82, 0xFF, 0xFF, 0xFF, 0x7F]);
    let service = CompilerService::new(launcher);
    let handle = service.acquire().unwrap();

    assert!(matches!(handle.query(SOURCE, 450, "frag"), Err(Error::ProtocolError(_))));
}

#[test]
fn test_reflect_returns_records() {
    let (launcher, _state) = MockLauncher::new();
    let service = CompilerService::new(launcher);
    let handle = service.acquire().unwrap();

    let reflection = handle.reflect(SOURCE, 450, "frag").unwrap();
    let weights = reflection.uniform("weights").unwrap();
    assert_eq!(weights.array_size, 4);
    assert_eq!(weights.array_stride, 16);
    assert_eq!(reflection.summaries(), handle.query(SOURCE, 450, "frag").unwrap());
}

#[test]
fn test_sequential_queries_keep_order() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);
    let handle = service.acquire().unwrap();

    for version in [100, 300, 450] {
        handle.query(SOURCE, version, "vert").unwrap();
    }

    let versions: Vec<u32> = state
        .requests()
        .into_iter()
        .filter_map(|(_, request)| match request {
            Request::Uniforms(query) => Some(query.version),
            _ => None,
        })
        .collect();
    assert_eq!(versions, vec![100, 300, 450]);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn test_concurrent_acquires_start_once() {
    const THREADS: usize = 16;

    let (launcher, state) = MockLauncher::new();
    state.set_launch_delay(Duration::from_millis(20));
    let service = CompilerService::new(launcher);
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                service.acquire().unwrap()
            })
        })
        .collect();

    let handles: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    assert_eq!(state.launches(), 1);
    assert_eq!(service.live_handles(), THREADS);

    let barrier = Arc::new(Barrier::new(THREADS));
    let releasers: Vec<_> = handles
        .into_iter()
        .map(|handle| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                handle.release().unwrap();
            })
        })
        .collect();
    for releaser in releasers {
        releaser.join().unwrap();
    }

    assert_eq!(state.shutdowns(), 1);
    assert_eq!(service.live_handles(), 0);
    assert!(!service.is_running());
}

#[test]
fn test_acquire_release_churn_keeps_count_consistent() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 50;

    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);
    let anchor = service.acquire().unwrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let handle = service.acquire().unwrap();
                    handle.query(SOURCE, 450, "comp").unwrap();
                    handle.release().unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // The anchor kept the count above zero the whole time.
    assert_eq!(state.launches(), 1);
    assert_eq!(state.shutdowns(), 0);
    assert_eq!(service.live_handles(), 1);
    assert_eq!(service.stats().queries, (THREADS * ROUNDS) as u64);

    anchor.release().unwrap();
    assert_eq!(state.shutdowns(), 1);
}

#[test]
fn test_stop_waits_for_in_flight_query() {
    let (launcher, state) = MockLauncher::new();
    let (started_tx, started_rx) = mpsc::channel();
    let started_tx = Mutex::new(started_tx);
    state.set_responder(move |request| {
        if matches!(request, Request::Uniforms(_)) {
            let _ = started_tx.lock().unwrap().send(());
            thread::sleep(Duration::from_millis(100));
        }
        default_response(request).encode()
    });

    let service = CompilerService::new(launcher);
    let handle = Arc::new(service.acquire().unwrap());

    let querier = {
        let handle = Arc::clone(&handle);
        thread::spawn(move || handle.query(SOURCE, 450, "frag"))
    };

    // The query is on the wire; the last release must wait for it.
    started_rx.recv().unwrap();
    handle.release().unwrap();
    assert_eq!(state.shutdowns(), 1);

    let result = querier.join().unwrap();
    assert_eq!(result.unwrap().len(), 2);
}

// ============================================================================
// TRANSPORT FAILURES
// ============================================================================

#[test]
fn test_transport_failure_relaunches_on_next_query() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);
    let first = service.acquire().unwrap();
    let second = service.acquire().unwrap();

    state.fail_next_round_trip.store(true, Ordering::SeqCst);
    assert!(matches!(first.query(SOURCE, 450, "frag"), Err(Error::Transport(_))));
    assert_eq!(state.aborts(), 1);
    assert_eq!(state.live_channels(), 0);

    // Both handles stay open; the next query on either one gets a fresh backend.
    assert_eq!(second.query(SOURCE, 450, "frag").unwrap().len(), 2);
    assert_eq!(first.query(SOURCE, 450, "frag").unwrap().len(), 2);
    assert_eq!(state.launches(), 2);
    assert_eq!(service.live_handles(), 2);

    let stats = service.stats();
    assert_eq!((stats.launches, stats.shutdowns), (2, 1));

    first.release().unwrap();
    second.release().unwrap();
    assert_eq!(state.shutdowns(), 1);
    assert_eq!(state.live_channels(), 0);
    assert_eq!(service.stats().shutdowns, 2);
}

#[test]
fn test_failed_relaunch_is_retried_by_later_queries() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);
    let handle = service.acquire().unwrap();

    state.fail_next_round_trip.store(true, Ordering::SeqCst);
    assert!(handle.query(SOURCE, 450, "frag").is_err());

    state.fail_next_launch.store(true, Ordering::SeqCst);
    assert!(matches!(handle.query(SOURCE, 450, "frag"), Err(Error::StartupFailure(_))));
    assert!(handle.is_open());

    assert_eq!(handle.query(SOURCE, 450, "frag").unwrap().len(), 2);
    assert_eq!(state.launches(), 2);
}

#[test]
fn test_drain_after_transport_failure_then_fresh_start() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);

    let handle = service.acquire().unwrap();
    state.fail_next_round_trip.store(true, Ordering::SeqCst);
    assert!(handle.query(SOURCE, 450, "frag").is_err());

    // The aborted backend is not shut down a second time.
    handle.release().unwrap();
    assert_eq!(state.shutdowns(), 0);
    assert_eq!(state.aborts(), 1);
    assert!(!service.is_running());

    let handle = service.acquire().unwrap();
    assert_eq!(handle.query(SOURCE, 450, "frag").unwrap().len(), 2);
    assert_eq!(state.launches(), 2);
}

#[test]
fn test_protocol_error_keeps_backend() {
    let (launcher, state) = MockLauncher::new();
    let service = CompilerService::new(launcher);
    let handle = service.acquire().unwrap();

    state.set_responder(|_| vec![0x82, 0xFF, 0xFF, 0xFF, 0x7F]);
    assert!(matches!(handle.query(SOURCE, 450, "frag"), Err(Error::ProtocolError(_))));

    state.set_responder(|request| default_response(request).encode());
    assert_eq!(handle.query(SOURCE, 450, "frag").unwrap().len(), 2);
    assert_eq!(state.launches(), 1);
    assert_eq!(state.aborts(), 0);
}
