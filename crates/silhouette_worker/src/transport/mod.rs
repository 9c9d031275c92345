//! Transport channel to the single background execution unit.
//!
//! A transport carries `WorkerRequest`s out and produces `TransportEvent`s on
//! a crossbeam receiver handed out at construction time. The dispatcher owns
//! the transport and its router thread owns the receiver.

use crate::error::TransportError;
use crate::protocol::{WorkerMessage, WorkerRequest};

pub mod process;
pub mod thread;

pub use self::process::ProcessTransport;
pub use self::thread::ThreadTransport;

/// Inbound event from the worker side.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
  /// Protocol message from the worker.
  Message(WorkerMessage),

  /// The channel itself failed (worker crash, exit, broken pipe).
  Fault(String),
}

/// Outbound half of a worker connection.
pub trait Transport: Send {
  /// Hand a request to the worker. Must not block on the worker's progress.
  fn send(&mut self, request: WorkerRequest) -> Result<(), TransportError>;

  /// Stop the worker unconditionally. Later `send`s fail.
  fn terminate(&mut self);

  /// Human readable transport kind for logs.
  fn kind(&self) -> &'static str;
}
