//! Worker-side job execution.
//!
//! Shared by the in-process thread transport and the stdio child process.
//!
//! Thread design (stdio worker):
//! - Thread 0 (stdin reader): reads lines → request channel
//! - Thread 1 (main loop): runs one job at a time, writes messages to stdout

use std::any::Any;
use std::io::{self, BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::AtomicBool;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::constants::PANIC_EXIT_CODE;
use crate::error::SolveError;
use crate::options::RequestOptions;
use crate::protocol::{JobId, WorkerMessage, WorkerRequest};
use crate::solver::{ProgressReporter, SilhouetteSolver};
use crate::types::MeshBuffers;

/// How a job ended on the worker.
#[derive(Debug, PartialEq)]
pub enum JobOutcome {
  /// Terminal message to send back (`Result` or `Error`).
  Finished(WorkerMessage),

  /// The worker is being torn down; nothing is sent.
  Cancelled,

  /// The solver panicked with this message.
  Panicked(String),
}

/// Run one job, forwarding progress through `emit`.
///
/// Panics inside the solver are caught and returned as
/// `JobOutcome::Panicked`.
pub fn run_job<S: SilhouetteSolver + ?Sized>(
  solver: &S,
  job: JobId,
  mesh: MeshBuffers,
  options: &RequestOptions,
  cancelled: &AtomicBool,
  emit: &mut dyn FnMut(WorkerMessage),
) -> JobOutcome {
  tracing::debug!(
    job = job.raw(),
    vertices = mesh.vertex_count(),
    indexed = mesh.is_indexed(),
    output = ?options.output,
    "Running job"
  );

  let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
    let mut reporter =
      ProgressReporter::new(job, options.included_progress_callback, cancelled, emit);
    solver.solve(mesh, options, &mut reporter)
  }));

  match outcome {
    Ok(Ok(result)) => JobOutcome::Finished(WorkerMessage::Result { job, result }),
    Ok(Err(SolveError::Failed(message))) => JobOutcome::Finished(WorkerMessage::error(job, message)),
    Ok(Err(SolveError::Cancelled)) => JobOutcome::Cancelled,
    Err(payload) => JobOutcome::Panicked(panic_message(payload.as_ref())),
  }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
  match panic_reason(payload) {
    Some(reason) => format!("worker panicked: {reason}"),
    None => "worker panicked".to_string(),
  }
}

/// Text of a `panic!` payload, if it carried one.
pub(crate) fn panic_reason(payload: &(dyn Any + Send)) -> Option<&str> {
  payload
    .downcast_ref::<&str>()
    .copied()
    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}

/// Run the stdio worker until `Shutdown` or stdin closes.
///
/// Reads one JSON request per line from stdin and writes one JSON message per
/// line to stdout. Logs must go to stderr. A solver panic ends the process
/// with a non-zero status so the parent sees the crash.
pub fn run_stdio_worker<S: SilhouetteSolver>(solver: S) -> io::Result<()> {
  tracing::info!(pid = std::process::id(), "Stdio worker starting");

  let (line_tx, line_rx): (Sender<String>, Receiver<String>) = crossbeam_channel::unbounded();
  thread::Builder::new()
    .name("silhouette-stdin".to_string())
    .spawn(move || {
      let stdin = io::stdin();
      for line in stdin.lock().lines() {
        match line {
          Ok(l) if !l.trim().is_empty() => {
            if line_tx.send(l).is_err() {
              break;
            }
          }
          Ok(_) => {}
          Err(_) => break,
        }
      }
      tracing::debug!("Stdin reader thread exiting");
    })?;

  let stdout = io::stdout();
  let mut out = stdout.lock();
  let never_cancelled = AtomicBool::new(false);

  for line in line_rx.iter() {
    let request: WorkerRequest = match serde_json::from_str(&line) {
      Ok(r) => r,
      Err(e) => {
        tracing::warn!("Failed to parse request: {e}");
        if let Some(reply) = reject_unreadable(&line, &e) {
          write_message(&mut out, &reply)?;
        }
        continue;
      }
    };

    let (job, position, index, options) = match request {
      WorkerRequest::Shutdown => break,
      WorkerRequest::Generate {
        job,
        position,
        index,
        options,
      } => (job, position, index, options),
    };

    let mut write_error = None;
    let outcome = {
      let mut emit = |message: WorkerMessage| {
        if write_error.is_none() {
          if let Err(e) = write_message(&mut out, &message) {
            write_error = Some(e);
          }
        }
      };
      run_job(
        &solver,
        job,
        MeshBuffers::new(position, index),
        &options,
        &never_cancelled,
        &mut emit,
      )
    };
    if let Some(e) = write_error {
      return Err(e);
    }

    match outcome {
      JobOutcome::Finished(message) => write_message(&mut out, &message)?,
      JobOutcome::Cancelled => {}
      JobOutcome::Panicked(message) => {
        tracing::error!(job = job.raw(), "{message}");
        std::process::exit(PANIC_EXIT_CODE);
      }
    }
  }

  tracing::info!("Stdio worker exiting");
  Ok(())
}

/// Error reply for a request that names its job but cannot be decoded, so
/// the caller's job still settles.
fn reject_unreadable(line: &str, err: &serde_json::Error) -> Option<WorkerMessage> {
  let value: serde_json::Value = serde_json::from_str(line).ok()?;
  let job = value.get("job")?.as_u64()?;
  Some(WorkerMessage::error(JobId::from(job), format!("invalid request: {err}")))
}

fn write_message(out: &mut impl Write, message: &WorkerMessage) -> io::Result<()> {
  serde_json::to_writer(&mut *out, message)?;
  out.write_all(b"\n")?;
  out.flush()
}
