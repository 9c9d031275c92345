//! Solver seam: the geometry work the worker runs for each job.
//!
//! The dispatcher treats solvers as black boxes. A solver receives the moved
//! input buffers and the wire options, may report progress, and returns
//! buffers shaped for the requested output mode.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::SolveError;
use crate::options::RequestOptions;
use crate::protocol::{JobId, ResultPayload, WorkerMessage};
use crate::types::{MeshBuffers, OutputMode};

pub mod projection;
pub use projection::{ProjectionOptions, ProjectionSolver};

/// Geometry computation run on the worker.
pub trait SilhouetteSolver: Send + Sync + 'static {
  /// Solve one job.
  ///
  /// Must return `ResultPayload::Single` for `OutputMode::Single` and
  /// `ResultPayload::Groups` for `OutputMode::Both`.
  fn solve(
    &self,
    mesh: MeshBuffers,
    options: &RequestOptions,
    progress: &mut ProgressReporter<'_>,
  ) -> Result<ResultPayload, SolveError>;
}

/// Worker-side progress and cancellation handle for one job.
///
/// Progress is forwarded only when the request said a callback exists.
pub struct ProgressReporter<'a> {
  job: JobId,
  enabled: bool,
  cancelled: &'a AtomicBool,
  emit: &'a mut dyn FnMut(WorkerMessage),
}

impl<'a> ProgressReporter<'a> {
  pub fn new(
    job: JobId,
    enabled: bool,
    cancelled: &'a AtomicBool,
    emit: &'a mut dyn FnMut(WorkerMessage),
  ) -> Self {
    Self {
      job,
      enabled,
      cancelled,
      emit,
    }
  }

  pub fn job(&self) -> JobId {
    self.job
  }

  /// Whether progress reports reach the caller.
  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  /// Report a completion fraction, clamped to `0.0..=1.0`.
  pub fn report(&mut self, fraction: f32) {
    if !self.enabled {
      return;
    }
    let progress = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    (self.emit)(WorkerMessage::Progress {
      job: self.job,
      progress,
    });
  }

  /// True once the worker is being terminated.
  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::Acquire)
  }

  /// `Err(SolveError::Cancelled)` once the worker is being terminated.
  pub fn check_cancelled(&self) -> Result<(), SolveError> {
    if self.is_cancelled() {
      Err(SolveError::Cancelled)
    } else {
      Ok(())
    }
  }
}

/// Returns the input mesh unchanged (wrapped in a one-element list for
/// `both`).
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoSolver;

impl SilhouetteSolver for EchoSolver {
  fn solve(
    &self,
    mesh: MeshBuffers,
    options: &RequestOptions,
    progress: &mut ProgressReporter<'_>,
  ) -> Result<ResultPayload, SolveError> {
    progress.check_cancelled()?;
    progress.report(1.0);
    Ok(match options.output {
      OutputMode::Single => ResultPayload::Single(mesh),
      OutputMode::Both => ResultPayload::Groups(vec![mesh]),
    })
  }
}
