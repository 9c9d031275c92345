//! Message protocol between the dispatcher and its worker.
//!
//! ```text
//! Dispatcher                                   Worker
//!     │  Generate { job, position, index?, options } │
//!     ├─────────────────────────────────────────────►│
//!     │  { job, progress }              (0..n times) │
//!     │◄─────────────────────────────────────────────┤
//!     │  { job, result } | { job, error }  (exactly 1)│
//!     │◄─────────────────────────────────────────────┤
//! ```
//!
//! In-process transports move these values through channels as-is, so the
//! buffers are never copied. The process transport encodes them as JSON
//! Lines, one message per line.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::options::RequestOptions;
use crate::types::MeshBuffers;

/// Identifier correlating worker messages with the job that caused them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
  pub(crate) fn next() -> Self {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    Self(COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  /// Get the raw ID value.
  pub fn raw(&self) -> u64 {
    self.0
  }
}

impl From<u64> for JobId {
  fn from(raw: u64) -> Self {
    Self(raw)
  }
}

/// Request sent to the worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerRequest {
  /// Run the solver on the given buffers.
  Generate {
    job: JobId,
    position: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<Vec<u32>>,
    options: RequestOptions,
  },

  /// Stop the worker loop.
  Shutdown,
}

impl WorkerRequest {
  /// Build a generate request, taking ownership of the mesh buffers.
  pub fn generate(job: JobId, mesh: MeshBuffers, options: RequestOptions) -> Self {
    let MeshBuffers { position, index } = mesh;
    WorkerRequest::Generate {
      job,
      position,
      index,
      options,
    }
  }
}

/// Message sent back by the worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerMessage {
  /// Completion fraction, only sent when the request asked for progress.
  Progress { job: JobId, progress: f32 },

  /// Terminal: solver output.
  Result { job: JobId, result: ResultPayload },

  /// Terminal: solver failure.
  Error { job: JobId, error: String },
}

impl WorkerMessage {
  pub fn job(&self) -> JobId {
    match self {
      WorkerMessage::Progress { job, .. }
      | WorkerMessage::Result { job, .. }
      | WorkerMessage::Error { job, .. } => *job,
    }
  }

  /// True for `Result` and `Error`.
  pub fn is_terminal(&self) -> bool {
    !matches!(self, WorkerMessage::Progress { .. })
  }

  pub fn error(job: JobId, message: impl Into<String>) -> Self {
    WorkerMessage::Error {
      job,
      error: message.into(),
    }
  }
}

/// Raw solver output, shaped by the requested output mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultPayload {
  /// `single`: one `{ position, index? }` object.
  Single(MeshBuffers),

  /// `both`: ordered `[{ position, index? }, ...]`.
  Groups(Vec<MeshBuffers>),
}

impl ResultPayload {
  pub fn mesh_count(&self) -> usize {
    match self {
      ResultPayload::Single(_) => 1,
      ResultPayload::Groups(groups) => groups.len(),
    }
  }
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod protocol_test;
