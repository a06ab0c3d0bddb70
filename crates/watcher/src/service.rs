//! The watch service: lifecycle, worker thread and failure propagation
//!
//! ```text
//! Idle --start--> Running --request_stop--> StopRequested --> Stopped
//!                    |                            |
//!                    +-----------> Failed <-------+
//! ```
//!
//! One worker thread per service multiplexes every root and the stop signal
//! through a single [`WaitSet`]. Batches from one root reach the queue in
//! detection order; batches from different roots interleave in arrival order
//! only, which is best effort.

use crate::config::WatcherConfig;
use crate::error::{Result, WatchError};
use crate::event::Event;
use crate::platform::{NativeBackend, NotifyBackend, StopSignal, WaitOutcome, WaitSet};
use crate::queue::EventQueue;
use crate::session::WatchSession;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Lifecycle state of a [`Service`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Constructed, not started
    Idle,
    /// Worker thread watching
    Running,
    /// Stop signalled, worker still winding down
    StopRequested,
    /// Worker exited after a stop request
    Stopped,
    /// Worker exited after a runtime failure
    Failed,
}

/// State and captured failure, published together
#[derive(Debug)]
struct Status {
    state: ServiceState,
    failure: Option<WatchError>,
}

#[derive(Debug)]
struct Shared {
    status: Mutex<Status>,
}

impl Shared {
    fn finish(&self, outcome: Result<()>) {
        let mut status = self.status.lock();
        match outcome {
            Ok(()) => {
                status.state = ServiceState::Stopped;
                info!("Watch service stopped");
            }
            Err(e) => {
                error!("Watch service failed: {}", e);
                status.state = ServiceState::Failed;
                // Write-once: the first failure is the one reported
                status.failure.get_or_insert(e);
            }
        }
    }
}

/// Directory watching service
///
/// ```no_run
/// use dirwatch::{Service, WatcherConfig};
/// use std::time::Duration;
///
/// let config = WatcherConfig::new(Duration::from_millis(100), false);
/// let mut service = Service::new(["/tmp/w"], config);
/// service.start()?;
///
/// if service.wait_events_for(Duration::from_secs(1)) {
///     for event in service.pop_events() {
///         println!("{}", event);
///     }
/// }
///
/// service.stop()?;
/// # Ok::<(), dirwatch::WatchError>(())
/// ```
pub struct Service {
    paths: Vec<PathBuf>,
    config: WatcherConfig,
    backend: Arc<dyn NativeBackend>,
    queue: Arc<EventQueue>,
    shared: Arc<Shared>,
    stop: Option<StopSignal>,
    worker: Option<JoinHandle<()>>,
}

impl Service {
    /// Create an idle service watching `paths` with the OS backend
    pub fn new<I, P>(paths: I, config: WatcherConfig) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::with_backend(paths, config, Arc::new(NotifyBackend::new()))
    }

    /// Create an idle service on a specific backend
    pub fn with_backend<I, P>(paths: I, config: WatcherConfig, backend: Arc<dyn NativeBackend>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            config,
            backend,
            queue: Arc::new(EventQueue::new()),
            shared: Arc::new(Shared {
                status: Mutex::new(Status {
                    state: ServiceState::Idle,
                    failure: None,
                }),
            }),
            stop: None,
            worker: None,
        }
    }

    /// Open every root and spawn the worker thread
    ///
    /// Setup errors leave the service `Idle`, so a corrected retry is
    /// possible. A service runs at most once: any state other than `Idle`
    /// answers `AlreadyStarted`.
    pub fn start(&mut self) -> Result<()> {
        if self.state() != ServiceState::Idle {
            return Err(WatchError::AlreadyStarted);
        }

        self.config.validate()?;

        // Sessions opened before a failing one are closed when dropped
        let mut sessions = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            match WatchSession::open(path, &self.config, self.backend.as_ref()) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    warn!("Failed to watch {}: {}", path.display(), e);
                    return Err(e);
                }
            }
        }

        let (signal, waits) = WaitSet::channel();
        let queue = Arc::clone(&self.queue);
        let shared = Arc::clone(&self.shared);

        self.shared.status.lock().state = ServiceState::Running;

        let spawned = thread::Builder::new()
            .name("dirwatch-worker".to_string())
            .spawn(move || run_worker(sessions, waits, queue, shared));

        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                self.stop = Some(signal);
                info!(
                    "Watch service started ({} roots, latency: {:?}, recursive: {})",
                    self.paths.len(),
                    self.config.latency(),
                    self.config.recursive()
                );
                Ok(())
            }
            Err(e) => {
                self.shared.status.lock().state = ServiceState::Idle;
                Err(WatchError::Spawn(Arc::new(e)))
            }
        }
    }

    /// Signal the worker to stop; does not wait for it
    ///
    /// Only acts while `Running`.
    pub fn request_stop(&self) {
        let mut status = self.shared.status.lock();
        if status.state != ServiceState::Running {
            return;
        }

        status.state = ServiceState::StopRequested;
        if let Some(signal) = &self.stop {
            signal.stop();
        }
        debug!("Stop requested");
    }

    /// True while the worker thread is alive (`Running` or `StopRequested`)
    pub fn is_running(&self) -> bool {
        matches!(
            self.state(),
            ServiceState::Running | ServiceState::StopRequested
        )
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServiceState {
        self.shared.status.lock().state
    }

    /// Block up to `timeout` for buffered events
    pub fn wait_events_for(&self, timeout: Duration) -> bool {
        self.queue.wait_for(timeout)
    }

    /// Drain buffered events; legal in every state
    pub fn pop_events(&self) -> Vec<Event> {
        self.queue.pop_events()
    }

    /// Wait up to `timeout` and drain in one step
    pub fn wait_and_pop(&self, timeout: Duration) -> Vec<Event> {
        self.queue.wait_and_pop(timeout)
    }

    /// Return the worker failure, if any
    ///
    /// Repeated calls keep returning the same failure; it is never cleared.
    pub fn rethrow(&self) -> Result<()> {
        match &self.shared.status.lock().failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Request stop, wait for the worker to exit, then `rethrow`
    pub fn stop(&mut self) -> Result<()> {
        self.request_stop();
        self.join();
        self.rethrow()
    }

    /// Watched paths as given
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if let Err(payload) = worker.join() {
                // The worker catches its own panics; this is a last resort
                self.shared
                    .finish(Err(WatchError::WorkerPanicked(panic_message(&*payload))));
            }
        }
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        self.request_stop();
        self.join();
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("paths", &self.paths)
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .field("buffered", &self.queue.len())
            .finish()
    }
}

fn run_worker(
    mut sessions: Vec<WatchSession>,
    waits: WaitSet,
    queue: Arc<EventQueue>,
    shared: Arc<Shared>,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        watch_loop(&mut sessions, &waits, &queue)
    }))
    .unwrap_or_else(|payload| Err(WatchError::WorkerPanicked(panic_message(&*payload))));

    // Deliver partial batches before the final state becomes visible
    for session in sessions.iter_mut() {
        queue.push_batch(session.take_batch());
        session.close();
    }

    shared.finish(outcome);
}

fn watch_loop(sessions: &mut [WatchSession], waits: &WaitSet, queue: &EventQueue) -> Result<()> {
    loop {
        let deadline = sessions.iter().filter_map(WatchSession::flush_deadline).min();

        match waits.wait(sessions.iter().map(WatchSession::handle), deadline) {
            WaitOutcome::Stopped => {
                // Pick up records that raced the stop request
                for session in sessions.iter_mut() {
                    session.ingest()?;
                }
                return Ok(());
            }
            WaitOutcome::Ready(index) => {
                sessions[index].ingest()?;
            }
            WaitOutcome::TimedOut => {}
        }

        let now = Instant::now();
        for session in sessions.iter_mut() {
            if let Some(batch) = session.take_due(now) {
                if !batch.is_empty() {
                    debug!("{} events from {}", batch.len(), session.root().display());
                    queue.push_batch(batch);
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
