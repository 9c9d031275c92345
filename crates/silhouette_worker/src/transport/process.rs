//! Child-process transport speaking JSON Lines over stdin/stdout.
//!
//! Thread design (parent side):
//! - Writer thread: request channel → child stdin, one JSON object per line
//! - Reader thread: child stdout → event channel, unparseable lines skipped
//!
//! The child inherits stderr so its logs land next to the parent's.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use super::{Transport, TransportEvent};
use crate::constants::WORKER_ARG;
use crate::error::{DispatchError, TransportError};
use crate::protocol::{WorkerMessage, WorkerRequest};

/// Fault reported when the child's stdout closes while the transport is live.
pub const PROCESS_EXITED: &str = "worker process exited";

/// Worker running in a child process.
pub struct ProcessTransport {
  child: Option<Child>,
  lines: Option<Sender<String>>,
  terminated: Arc<AtomicBool>,
}

impl ProcessTransport {
  /// Spawn `command` with piped stdin/stdout and start the I/O threads.
  pub fn spawn(mut command: Command) -> Result<(Self, Receiver<TransportEvent>), DispatchError> {
    tracing::debug!(command = ?command, "Spawning worker process");

    let mut child = command
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::inherit())
      .spawn()
      .map_err(|e| DispatchError::WorkerStart(Some(e.to_string())))?;

    let pipes = child.stdin.take().zip(child.stdout.take());
    let Some((stdin, stdout)) = pipes else {
      kill_and_reap(&mut child);
      return Err(DispatchError::WorkerStart(Some(
        "worker process pipes unavailable".to_string(),
      )));
    };

    let (line_tx, line_rx) = crossbeam_channel::unbounded::<String>();
    let (event_tx, event_rx) = crossbeam_channel::unbounded::<TransportEvent>();
    let terminated = Arc::new(AtomicBool::new(false));

    let reader_terminated = Arc::clone(&terminated);
    let started = thread::Builder::new()
      .name("silhouette-writer".to_string())
      .spawn(move || writer_loop(stdin, line_rx))
      .and_then(|_| {
        thread::Builder::new()
          .name("silhouette-reader".to_string())
          .spawn(move || reader_loop(stdout, event_tx, reader_terminated))
      });
    if let Err(e) = started {
      kill_and_reap(&mut child);
      return Err(DispatchError::WorkerStart(Some(e.to_string())));
    }

    tracing::info!(pid = child.id(), "Worker process started");

    Ok((
      Self {
        child: Some(child),
        lines: Some(line_tx),
        terminated,
      },
      event_rx,
    ))
  }

  /// Spawn the current executable in worker mode.
  pub fn spawn_current_exe() -> Result<(Self, Receiver<TransportEvent>), DispatchError> {
    let exe = std::env::current_exe()
      .map_err(|e| DispatchError::WorkerStart(Some(format!("cannot find own executable: {e}"))))?;
    let mut command = Command::new(exe);
    command.arg(WORKER_ARG);
    Self::spawn(command)
  }

  /// OS process id of the child, until terminated.
  pub fn pid(&self) -> Option<u32> {
    self.child.as_ref().map(Child::id)
  }
}

impl Transport for ProcessTransport {
  fn send(&mut self, request: WorkerRequest) -> Result<(), TransportError> {
    let lines = self.lines.as_ref().ok_or(TransportError::Terminated)?;
    check_finite(&request)?;
    let line = serde_json::to_string(&request).map_err(|e| TransportError::Encode(e.to_string()))?;
    lines.send(line).map_err(|_| TransportError::Closed)
  }

  fn terminate(&mut self) {
    self.terminated.store(true, Ordering::Release);
    self.lines = None;
    if let Some(mut child) = self.child.take() {
      tracing::debug!(pid = child.id(), "Killing worker process");
      kill_and_reap(&mut child);
    }
  }

  fn kind(&self) -> &'static str {
    "process"
  }
}

impl Drop for ProcessTransport {
  fn drop(&mut self) {
    self.terminate();
  }
}

/// JSON has no NaN or infinity; serde_json would write `null` and the worker
/// could not read the request back.
fn check_finite(request: &WorkerRequest) -> Result<(), TransportError> {
  if let WorkerRequest::Generate { position, .. } = request {
    if let Some((i, v)) = position.iter().enumerate().find(|(_, v)| !v.is_finite()) {
      return Err(TransportError::Encode(format!("position[{i}] is not finite ({v})")));
    }
  }
  Ok(())
}

fn kill_and_reap(child: &mut Child) {
  let _ = child.kill();
  let _ = child.wait();
}

fn writer_loop(mut stdin: ChildStdin, lines: Receiver<String>) {
  for line in lines.iter() {
    let written = stdin
      .write_all(line.as_bytes())
      .and_then(|_| stdin.write_all(b"\n"))
      .and_then(|_| stdin.flush());
    if let Err(e) = written {
      // Reader reports the exit once stdout closes.
      tracing::warn!("Failed to write to worker process: {e}");
      break;
    }
  }
  tracing::debug!("Writer thread exiting");
}

fn reader_loop(stdout: ChildStdout, events: Sender<TransportEvent>, terminated: Arc<AtomicBool>) {
  let reader = BufReader::new(stdout);
  for line in reader.lines() {
    let line = match line {
      Ok(l) => l,
      Err(e) => {
        tracing::warn!("Failed to read from worker process: {e}");
        break;
      }
    };
    if line.trim().is_empty() {
      continue;
    }

    match serde_json::from_str::<WorkerMessage>(&line) {
      Ok(message) => {
        if events.send(TransportEvent::Message(message)).is_err() {
          return;
        }
      }
      Err(e) => {
        tracing::warn!("Failed to parse worker message: {e}");
      }
    }
  }

  if !terminated.load(Ordering::Acquire) {
    let _ = events.send(TransportEvent::Fault(PROCESS_EXITED.to_string()));
  }
  tracing::debug!("Reader thread exiting");
}

#[cfg(all(test, unix))]
mod tests {
  use std::time::Duration;

  use super::*;
  use crate::protocol::JobId;

  const TIMEOUT: Duration = Duration::from_secs(5);

  fn shell(script: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(script);
    command
  }

  #[test]
  fn messages_are_parsed_and_exit_is_a_fault() {
    let script = r#"
      echo '{"job":7,"progress":0.5}'
      echo 'not json'
      echo '{"job":7,"error":"degenerate mesh"}'
    "#;
    let (transport, events) = ProcessTransport::spawn(shell(script)).unwrap();
    assert_eq!(transport.kind(), "process");

    assert_eq!(
      events.recv_timeout(TIMEOUT).unwrap(),
      TransportEvent::Message(WorkerMessage::Progress {
        job: JobId::from(7),
        progress: 0.5
      })
    );
    assert_eq!(
      events.recv_timeout(TIMEOUT).unwrap(),
      TransportEvent::Message(WorkerMessage::error(JobId::from(7), "degenerate mesh"))
    );
    assert_eq!(
      events.recv_timeout(TIMEOUT).unwrap(),
      TransportEvent::Fault(PROCESS_EXITED.to_string())
    );
  }

  #[test]
  fn requests_reach_child_stdin() {
    // Child answers with an error naming the request type it read.
    let script = r#"
      read line
      case "$line" in
        *'"type":"Shutdown"'*) echo '{"job":1,"error":"got shutdown"}' ;;
        *) echo '{"job":1,"error":"unexpected"}' ;;
      esac
    "#;
    let (mut transport, events) = ProcessTransport::spawn(shell(script)).unwrap();
    transport.send(WorkerRequest::Shutdown).unwrap();

    assert_eq!(
      events.recv_timeout(TIMEOUT).unwrap(),
      TransportEvent::Message(WorkerMessage::error(JobId::from(1), "got shutdown"))
    );
  }

  #[test]
  fn terminate_kills_without_fault() {
    let (mut transport, events) = ProcessTransport::spawn(shell("sleep 30")).unwrap();
    assert!(transport.pid().is_some());

    transport.terminate();
    assert!(transport.pid().is_none());
    assert_eq!(transport.send(WorkerRequest::Shutdown), Err(TransportError::Terminated));

    // Reader thread ends without reporting a fault
    assert!(events.recv_timeout(TIMEOUT).is_err());
  }

  #[test]
  fn non_finite_positions_are_refused_before_writing() {
    // Child would answer anything it read.
    let (mut transport, events) =
      ProcessTransport::spawn(shell(r#"read line; echo '{"job":1,"error":"read"}'"#)).unwrap();

    let mut position = vec![0.0; 9];
    position[4] = f32::INFINITY;
    let request = WorkerRequest::generate(
      JobId::from(1),
      crate::types::MeshBuffers::non_indexed(position),
      Default::default(),
    );
    assert_eq!(
      transport.send(request),
      Err(TransportError::Encode("position[4] is not finite (inf)".to_string()))
    );
    assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
  }

  #[test]
  fn missing_program_fails_to_start() {
    let result = ProcessTransport::spawn(Command::new("/nonexistent/silhouette-worker"));
    assert!(matches!(result, Err(DispatchError::WorkerStart(Some(_)))));
  }
}
