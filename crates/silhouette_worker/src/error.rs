//! Error types for job dispatch, transports and solvers.

use thiserror::Error;

/// Errors surfaced to dispatcher callers.
///
/// Precondition failures (`AlreadyRunning`, `Disposed`, `InvalidMesh`) are
/// returned synchronously from `generate`; the rest settle a job's future.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
  /// The background worker could not be created.
  #[error("could not create silhouette worker{}", start_reason(.0))]
  WorkerStart(Option<String>),

  #[error("silhouette worker is already running a job")]
  AlreadyRunning,

  #[error("silhouette worker has been disposed")]
  Disposed,

  /// Failure reported by the worker, message kept verbatim.
  #[error("{0}")]
  Job(String),

  /// The channel to the worker failed (crash, exit, closed pipe).
  #[error("silhouette worker transport failed: {0}")]
  Transport(String),

  /// The dispatcher was disposed while the job was in flight.
  #[error("job cancelled: silhouette worker disposed")]
  Cancelled,

  #[error("invalid mesh: {0}")]
  InvalidMesh(String),

  /// The worker's result did not match the requested output mode or layout.
  #[error("malformed result: {0}")]
  MalformedResult(String),
}

impl DispatchError {
  /// True for errors raised before any message was sent.
  pub fn is_precondition(&self) -> bool {
    matches!(
      self,
      DispatchError::AlreadyRunning | DispatchError::Disposed | DispatchError::InvalidMesh(_)
    )
  }
}

fn start_reason(reason: &Option<String>) -> String {
  match reason {
    Some(e) => format!(" with error \"{e}\""),
    None => ".".to_string(),
  }
}

/// Failure to hand a request to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
  #[error("worker channel closed")]
  Closed,

  #[error("worker terminated")]
  Terminated,

  #[error("failed to encode request: {0}")]
  Encode(String),
}

impl From<TransportError> for DispatchError {
  fn from(err: TransportError) -> Self {
    DispatchError::Transport(err.to_string())
  }
}

/// Failure inside a solver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
  /// Reported back to the caller as a job error.
  #[error("{0}")]
  Failed(String),

  /// The worker is being torn down; nothing is reported.
  #[error("cancelled")]
  Cancelled,
}

impl SolveError {
  pub fn failed(message: impl Into<String>) -> Self {
    SolveError::Failed(message.into())
  }
}
