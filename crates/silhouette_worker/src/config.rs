//! Dispatcher construction settings.

use crate::constants::DEFAULT_THREAD_NAME;
use crate::error::DispatchError;

/// Settings for the in-process worker thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatcherConfig {
  /// Name given to the worker thread.
  pub thread_name: String,

  /// Worker thread stack size in bytes. `None` uses the platform default.
  pub stack_size: Option<usize>,
}

impl Default for DispatcherConfig {
  fn default() -> Self {
    Self {
      thread_name: DEFAULT_THREAD_NAME.to_string(),
      stack_size: None,
    }
  }
}

impl DispatcherConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
    self.thread_name = name.into();
    self
  }

  pub fn with_stack_size(mut self, size: usize) -> Self {
    self.stack_size = Some(size);
    self
  }

  /// Reject settings the OS would refuse when the thread is spawned.
  pub fn validate(&self) -> Result<(), DispatchError> {
    if self.thread_name.contains('\0') {
      return Err(DispatchError::WorkerStart(Some(
        "thread name contains a NUL byte".to_string(),
      )));
    }
    if self.stack_size == Some(0) {
      return Err(DispatchError::WorkerStart(Some(
        "stack size must be non-zero".to_string(),
      )));
    }
    Ok(())
  }
}
