//! In-process transport: a dedicated worker thread fed through channels.
//!
//! Requests and messages are moved through crossbeam channels, so mesh
//! buffers change owner without being copied in either direction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use super::{Transport, TransportEvent};
use crate::config::DispatcherConfig;
use crate::error::{DispatchError, TransportError};
use crate::protocol::WorkerRequest;
use crate::solver::SilhouetteSolver;
use crate::types::MeshBuffers;
use crate::worker::{run_job, JobOutcome};

/// Worker thread plus the channels to reach it.
pub struct ThreadTransport {
  requests: Option<Sender<WorkerRequest>>,
  cancelled: Arc<AtomicBool>,
}

impl ThreadTransport {
  /// Start the worker thread.
  ///
  /// Fails with `DispatchError::WorkerStart` when the OS refuses the thread.
  pub fn spawn<S: SilhouetteSolver>(
    solver: S,
    config: &DispatcherConfig,
  ) -> Result<(Self, Receiver<TransportEvent>), DispatchError> {
    config.validate()?;

    let (request_tx, request_rx) = crossbeam_channel::unbounded::<WorkerRequest>();
    let (event_tx, event_rx) = crossbeam_channel::unbounded::<TransportEvent>();
    let cancelled = Arc::new(AtomicBool::new(false));

    let mut builder = thread::Builder::new().name(config.thread_name.clone());
    if let Some(size) = config.stack_size {
      builder = builder.stack_size(size);
    }

    let worker_cancelled = Arc::clone(&cancelled);
    builder
      .spawn(move || worker_loop(solver, request_rx, event_tx, worker_cancelled))
      .map_err(|e| DispatchError::WorkerStart(Some(e.to_string())))?;

    tracing::debug!(thread = %config.thread_name, "Worker thread started");

    Ok((
      Self {
        requests: Some(request_tx),
        cancelled,
      },
      event_rx,
    ))
  }
}

impl Transport for ThreadTransport {
  fn send(&mut self, request: WorkerRequest) -> Result<(), TransportError> {
    let requests = self.requests.as_ref().ok_or(TransportError::Terminated)?;
    requests.send(request).map_err(|_| TransportError::Closed)
  }

  /// Raises the cancellation flag and closes the request channel. The thread
  /// is detached; a running solver stops at its next cancellation check.
  fn terminate(&mut self) {
    self.cancelled.store(true, Ordering::Release);
    self.requests = None;
  }

  fn kind(&self) -> &'static str {
    "thread"
  }
}

impl Drop for ThreadTransport {
  fn drop(&mut self) {
    self.terminate();
  }
}

fn worker_loop<S: SilhouetteSolver>(
  solver: S,
  requests: Receiver<WorkerRequest>,
  events: Sender<TransportEvent>,
  cancelled: Arc<AtomicBool>,
) {
  for request in requests.iter() {
    if cancelled.load(Ordering::Acquire) {
      break;
    }

    let (job, position, index, options) = match request {
      WorkerRequest::Shutdown => break,
      WorkerRequest::Generate {
        job,
        position,
        index,
        options,
      } => (job, position, index, options),
    };

    let outcome = run_job(
      &solver,
      job,
      MeshBuffers::new(position, index),
      &options,
      &cancelled,
      &mut |message| {
        let _ = events.send(TransportEvent::Message(message));
      },
    );

    if cancelled.load(Ordering::Acquire) {
      break;
    }

    let event = match outcome {
      JobOutcome::Finished(message) => TransportEvent::Message(message),
      JobOutcome::Cancelled => break,
      JobOutcome::Panicked(message) => {
        tracing::error!(job = job.raw(), "{message}");
        TransportEvent::Fault(message)
      }
    };
    if events.send(event).is_err() {
      break;
    }
  }

  // Close the request side first so a sender sees `Closed` once events end.
  drop(requests);
  drop(events);
  tracing::debug!("Worker thread exiting");
}
