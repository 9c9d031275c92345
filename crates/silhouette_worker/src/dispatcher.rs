//! Single-job dispatcher: job state machine plus the router thread.
//!
//! ```text
//!            generate                 Result | Error | Fault
//!   Idle ─────────────────► Busy ───────────────────────────► Idle
//!    │                        │
//!    └──── dispose ───────────┴──── dispose ───► Disposed (terminal)
//! ```
//!
//! Thread design:
//! - Caller thread(s): `generate` and `dispose`, both under one state mutex
//! - Router thread: drains transport events, runs progress callbacks, settles
//!   the active job's future
//!
//! The state returns to `Idle` before a job's future settles, so a caller
//! awaiting the handle can submit the next job right away.

use std::future::Future;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::process::Command;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::thread;

use crossbeam_channel::Receiver;
use tokio::sync::oneshot;
use web_time::Instant;

use crate::config::DispatcherConfig;
use crate::constants::ROUTER_THREAD_NAME;
use crate::error::DispatchError;
use crate::materialize::materialize;
use crate::metrics::{DispatchMetrics, JobSettlement};
use crate::options::{GenerateOptions, ProgressCallback};
use crate::protocol::{JobId, WorkerMessage, WorkerRequest};
use crate::solver::{ProjectionSolver, SilhouetteSolver};
use crate::transport::{ProcessTransport, ThreadTransport, Transport, TransportEvent};
use crate::types::{MeshBuffers, MeshResult, OutputMode};
use crate::worker::panic_reason;

type JobResult = Result<MeshResult, DispatchError>;

/// Observable dispatcher state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatcherState {
  Idle,
  /// Running the given job.
  Busy(JobId),
  Disposed,
}

/// The in-flight job, owned by the state machine until it settles.
struct ActiveJob {
  id: JobId,
  output: OutputMode,
  on_progress: Option<ProgressCallback>,
  settle: oneshot::Sender<JobResult>,
  started: Instant,
}

enum State {
  Idle,
  Busy(ActiveJob),
  Disposed,
}

struct Core {
  state: State,
  /// Set once the event channel disconnects; no job can complete after that.
  link_lost: Option<String>,
}

impl Core {
  /// Take the active job if it is `job`, leaving the state `Idle`.
  fn take_job(&mut self, job: JobId) -> Option<ActiveJob> {
    match &self.state {
      State::Busy(active) if active.id == job => self.take_any(),
      _ => None,
    }
  }

  /// Take whatever job is active, leaving the state `Idle`.
  fn take_any(&mut self) -> Option<ActiveJob> {
    if !matches!(self.state, State::Busy(_)) {
      return None;
    }
    match mem::replace(&mut self.state, State::Idle) {
      State::Busy(active) => Some(active),
      _ => None,
    }
  }
}

/// State shared between the dispatcher and its router thread.
struct Shared {
  core: Mutex<Core>,
  metrics: Mutex<DispatchMetrics>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Dispatches silhouette jobs to one background worker, one job at a time.
///
/// # Example
///
/// ```ignore
/// let dispatcher = SilhouetteDispatcher::create(DispatcherConfig::default())?;
/// let mesh = MeshBuffers::indexed(position, index);
/// let options = GenerateOptions::new()
///   .with_output(OutputMode::Both)
///   .with_progress(|p| println!("{:.0}%", p * 100.0));
///
/// let groups = dispatcher.generate(mesh, options)?.await?.into_meshes();
/// dispatcher.dispose();
/// ```
pub struct SilhouetteDispatcher {
  shared: Arc<Shared>,
  transport: Mutex<Box<dyn Transport>>,
  kind: &'static str,
}

impl SilhouetteDispatcher {
  /// Start a worker thread running the default `ProjectionSolver`.
  pub fn create(config: DispatcherConfig) -> Result<Self, DispatchError> {
    Self::create_with_solver(ProjectionSolver, config)
  }

  /// Start a worker thread running `solver`.
  pub fn create_with_solver<S: SilhouetteSolver>(
    solver: S,
    config: DispatcherConfig,
  ) -> Result<Self, DispatchError> {
    let (transport, events) = ThreadTransport::spawn(solver, &config)?;
    Self::with_transport(transport, events)
  }

  /// Start a worker child process. The command must run the stdio worker.
  pub fn spawn_process(command: Command) -> Result<Self, DispatchError> {
    let (transport, events) = ProcessTransport::spawn(command)?;
    Self::with_transport(transport, events)
  }

  /// Start the current executable as the worker child process.
  pub fn spawn_current_exe() -> Result<Self, DispatchError> {
    let (transport, events) = ProcessTransport::spawn_current_exe()?;
    Self::with_transport(transport, events)
  }

  /// Drive an already started transport.
  pub fn with_transport<T: Transport + 'static>(
    mut transport: T,
    events: Receiver<TransportEvent>,
  ) -> Result<Self, DispatchError> {
    let shared = Arc::new(Shared {
      core: Mutex::new(Core {
        state: State::Idle,
        link_lost: None,
      }),
      metrics: Mutex::new(DispatchMetrics::new()),
    });

    let router_shared = Arc::clone(&shared);
    let spawned = thread::Builder::new()
      .name(ROUTER_THREAD_NAME.to_string())
      .spawn(move || route(router_shared, events));
    if let Err(e) = spawned {
      transport.terminate();
      return Err(DispatchError::WorkerStart(Some(e.to_string())));
    }

    let kind = transport.kind();
    tracing::debug!(transport = kind, "Silhouette dispatcher ready");

    Ok(Self {
      shared,
      transport: Mutex::new(Box::new(transport)),
      kind,
    })
  }

  /// Submit a job.
  ///
  /// Fails immediately when the dispatcher is disposed, already busy, or the
  /// buffers are malformed; nothing is sent in those cases. Otherwise the
  /// buffers are moved to the worker and the returned handle settles exactly
  /// once.
  pub fn generate(&self, mesh: MeshBuffers, options: GenerateOptions) -> Result<JobHandle, DispatchError> {
    let (request_options, on_progress) = options.into_parts();
    let (settle, settled) = oneshot::channel();
    let id = JobId::next();

    {
      let mut core = lock(&self.shared.core);
      match &core.state {
        State::Disposed => return Err(DispatchError::Disposed),
        State::Busy(_) => return Err(DispatchError::AlreadyRunning),
        State::Idle => {}
      }
      mesh.check_layout().map_err(DispatchError::InvalidMesh)?;
      if let Some(reason) = &core.link_lost {
        return Err(DispatchError::Transport(reason.clone()));
      }

      core.state = State::Busy(ActiveJob {
        id,
        output: request_options.output,
        on_progress,
        settle,
        started: Instant::now(),
      });
    }

    tracing::debug!(
      job = id.raw(),
      vertices = mesh.vertex_count(),
      output = ?request_options.output,
      "Job submitted"
    );

    let request = WorkerRequest::generate(id, mesh, request_options);
    if let Err(err) = lock(&self.transport).send(request) {
      tracing::warn!(job = id.raw(), "Failed to send job: {err}");
      // Dispose may have won the race; only undo our own transition.
      let reverted = lock(&self.shared.core).take_job(id);
      drop(reverted);
      return Err(err.into());
    }

    lock(&self.shared.metrics).record_submitted();
    Ok(JobHandle { id, settled })
  }

  /// Stop the worker and refuse further jobs.
  ///
  /// An in-flight job settles with `DispatchError::Cancelled`. Calling this
  /// again does nothing.
  pub fn dispose(&self) {
    let previous = mem::replace(&mut lock(&self.shared.core).state, State::Disposed);
    if matches!(previous, State::Disposed) {
      return;
    }

    lock(&self.transport).terminate();
    tracing::debug!(transport = self.kind, "Silhouette dispatcher disposed");

    if let State::Busy(active) = previous {
      settle(&self.shared, active, Err(DispatchError::Cancelled));
    }
  }

  pub fn is_busy(&self) -> bool {
    matches!(lock(&self.shared.core).state, State::Busy(_))
  }

  pub fn is_disposed(&self) -> bool {
    matches!(lock(&self.shared.core).state, State::Disposed)
  }

  pub fn state(&self) -> DispatcherState {
    match &lock(&self.shared.core).state {
      State::Idle => DispatcherState::Idle,
      State::Busy(active) => DispatcherState::Busy(active.id),
      State::Disposed => DispatcherState::Disposed,
    }
  }

  /// Transport kind, `"thread"` or `"process"` for the built-in ones.
  pub fn transport_kind(&self) -> &'static str {
    self.kind
  }

  /// Snapshot of the dispatch counters.
  pub fn metrics(&self) -> DispatchMetrics {
    lock(&self.shared.metrics).clone()
  }
}

impl Drop for SilhouetteDispatcher {
  fn drop(&mut self) {
    self.dispose();
  }
}

/// Pending result of one job.
///
/// Await it from async code or call `wait` from a plain thread.
#[must_use = "dropping the handle discards the job's result"]
pub struct JobHandle {
  id: JobId,
  settled: oneshot::Receiver<JobResult>,
}

impl JobHandle {
  pub fn id(&self) -> JobId {
    self.id
  }

  /// Block the current thread until the job settles.
  ///
  /// Panics if called from within an async runtime; `.await` the handle
  /// there instead.
  pub fn wait(self) -> JobResult {
    self.settled.blocking_recv().unwrap_or(Err(DispatchError::Cancelled))
  }
}

impl Future for JobHandle {
  type Output = JobResult;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    Pin::new(&mut self.settled)
      .poll(cx)
      .map(|settled| settled.unwrap_or(Err(DispatchError::Cancelled)))
  }
}

impl std::fmt::Debug for JobHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("JobHandle").field("id", &self.id).finish()
  }
}

// =============================================================================
// Router
// =============================================================================

fn route(shared: Arc<Shared>, events: Receiver<TransportEvent>) {
  for event in events.iter() {
    match event {
      TransportEvent::Message(WorkerMessage::Progress { job, progress }) => {
        deliver_progress(&shared, job, progress);
      }
      TransportEvent::Message(message) => finish_job(&shared, message),
      TransportEvent::Fault(reason) => {
        let active = lock(&shared.core).take_any();
        match active {
          Some(active) => {
            tracing::warn!(job = active.id.raw(), "Worker fault: {reason}");
            settle(&shared, active, Err(DispatchError::Transport(reason)));
          }
          None => tracing::warn!("Worker fault while idle: {reason}"),
        }
      }
    }
  }

  // Event channel closed: the worker is gone.
  let active = {
    let mut core = lock(&shared.core);
    if matches!(core.state, State::Disposed) {
      None
    } else {
      core.link_lost = Some("worker channel closed".to_string());
      core.take_any()
    }
  };
  if let Some(active) = active {
    settle(
      &shared,
      active,
      Err(DispatchError::Transport("worker channel closed".to_string())),
    );
  }

  tracing::debug!("Router thread exiting");
}

/// Run the active job's callback without holding the state lock, so the
/// callback may call back into the dispatcher.
fn deliver_progress(shared: &Shared, job: JobId, progress: f32) {
  let callback = {
    let mut core = lock(&shared.core);
    match &mut core.state {
      State::Busy(active) if active.id == job => active.on_progress.take(),
      _ => {
        tracing::warn!(job = job.raw(), "Ignoring progress for inactive job");
        return;
      }
    }
  };

  let Some(mut callback) = callback else {
    return;
  };
  if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(progress))) {
    let reason = panic_reason(payload.as_ref()).unwrap_or("unknown panic");
    tracing::error!(job = job.raw(), "Progress callback panicked, dropping it: {reason}");
    return;
  }
  lock(&shared.metrics).record_progress();

  let mut core = lock(&shared.core);
  if let State::Busy(active) = &mut core.state {
    if active.id == job && active.on_progress.is_none() {
      active.on_progress = Some(callback);
    }
  }
}

fn finish_job(shared: &Shared, message: WorkerMessage) {
  let job = message.job();
  let Some(active) = lock(&shared.core).take_job(job) else {
    tracing::warn!(job = job.raw(), "Ignoring message for inactive job");
    return;
  };

  let outcome = match message {
    WorkerMessage::Result { result, .. } => materialize(result, active.output),
    WorkerMessage::Error { error, .. } => Err(DispatchError::Job(error)),
    WorkerMessage::Progress { .. } => Err(DispatchError::MalformedResult(
      "progress is not a terminal message".to_string(),
    )),
  };
  settle(shared, active, outcome);
}

fn settle(shared: &Shared, active: ActiveJob, outcome: JobResult) {
  let settlement = match &outcome {
    Ok(_) => JobSettlement::Completed,
    Err(DispatchError::Cancelled) => JobSettlement::Cancelled,
    Err(_) => JobSettlement::Failed,
  };
  let elapsed_us = active.started.elapsed().as_micros() as u64;
  lock(&shared.metrics).record_settled(settlement, elapsed_us);

  match &outcome {
    Ok(result) => tracing::debug!(
      job = active.id.raw(),
      meshes = result.meshes().len(),
      elapsed_us,
      "Job completed"
    ),
    Err(err) => tracing::debug!(job = active.id.raw(), elapsed_us, "Job failed: {err}"),
  }

  if active.settle.send(outcome).is_err() {
    tracing::debug!(job = active.id.raw(), "Job handle dropped before settlement");
  }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod dispatcher_test;
