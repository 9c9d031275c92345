//! Dispatch statistics: job counters and a duration history.
//!
//! Feature-gated and runtime-toggled to ensure zero overhead when disabled.
//!
//! # Usage
//!
//! ```ignore
//! use silhouette_worker::metrics::COLLECT_METRICS;
//!
//! // Compile with --features metrics (default)
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! let snapshot = dispatcher.metrics();
//! println!("{} jobs, avg {:.0}us", snapshot.completed, snapshot.durations_us.average());
//! ```

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;

use crate::constants::METRICS_WINDOW;

/// Runtime toggle for metrics collection.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
  #[cfg(feature = "metrics")]
  {
    COLLECT_METRICS.load(Ordering::Relaxed)
  }
  #[cfg(not(feature = "metrics"))]
  {
    false
  }
}

/// Fixed-capacity history, oldest values evicted first.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
  buffer: VecDeque<T>,
  capacity: usize,
}

impl<T> RollingWindow<T> {
  pub fn new(capacity: usize) -> Self {
    Self {
      buffer: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// Push a new value, evicting the oldest if at capacity.
  pub fn push(&mut self, value: T) {
    if self.capacity == 0 {
      return;
    }
    if self.buffer.len() >= self.capacity {
      self.buffer.pop_front();
    }
    self.buffer.push_back(value);
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
  }

  /// Iterate over values (oldest to newest).
  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.buffer.iter()
  }

  pub fn last(&self) -> Option<&T> {
    self.buffer.back()
  }
}

impl RollingWindow<u64> {
  pub fn sum(&self) -> u64 {
    self.buffer.iter().sum()
  }

  pub fn average(&self) -> f64 {
    if self.buffer.is_empty() {
      0.0
    } else {
      self.sum() as f64 / self.buffer.len() as f64
    }
  }

  pub fn min_max(&self) -> Option<(u64, u64)> {
    let min = *self.buffer.iter().min()?;
    let max = *self.buffer.iter().max()?;
    Some((min, max))
  }
}

impl Default for RollingWindow<u64> {
  fn default() -> Self {
    Self::new(METRICS_WINDOW)
  }
}

/// How a job left the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobSettlement {
  Completed,
  Failed,
  Cancelled,
}

/// Per-dispatcher counters, updated by the router as jobs settle.
#[derive(Debug, Clone, Default)]
pub struct DispatchMetrics {
  /// Jobs accepted by `generate`.
  pub submitted: u64,
  /// Jobs resolved with a result.
  pub completed: u64,
  /// Jobs rejected by a worker error, transport fault or bad result.
  pub failed: u64,
  /// Jobs settled by `dispose`.
  pub cancelled: u64,
  /// Progress messages delivered to callbacks.
  pub progress_messages: u64,
  /// Submission to settlement, in microseconds.
  pub durations_us: RollingWindow<u64>,
  /// Duration of the most recent settled job in microseconds.
  pub last_job_us: u64,
}

impl DispatchMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record_submitted(&mut self) {
    if is_enabled() {
      self.submitted += 1;
    }
  }

  pub fn record_progress(&mut self) {
    if is_enabled() {
      self.progress_messages += 1;
    }
  }

  /// Record a settled job and how long it was in flight.
  pub fn record_settled(&mut self, settlement: JobSettlement, duration_us: u64) {
    if !is_enabled() {
      return;
    }

    match settlement {
      JobSettlement::Completed => self.completed += 1,
      JobSettlement::Failed => self.failed += 1,
      JobSettlement::Cancelled => self.cancelled += 1,
    }
    self.durations_us.push(duration_us);
    self.last_job_us = duration_us;
  }

  /// Jobs that reached a terminal state.
  pub fn settled(&self) -> u64 {
    self.completed + self.failed + self.cancelled
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rolling_window_evicts_oldest() {
    let mut window = RollingWindow::new(3);
    for v in [1u64, 2, 3, 4] {
      window.push(v);
    }
    assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    assert_eq!(window.sum(), 9);
    assert_eq!(window.average(), 3.0);
    assert_eq!(window.min_max(), Some((2, 4)));
    assert_eq!(window.last(), Some(&4));
  }

  #[test]
  fn empty_window_stats() {
    let window = RollingWindow::<u64>::default();
    assert!(window.is_empty());
    assert_eq!(window.average(), 0.0);
    assert_eq!(window.min_max(), None);
  }

  #[cfg(feature = "metrics")]
  #[test]
  fn settlements_are_counted() {
    let mut metrics = DispatchMetrics::new();
    metrics.record_submitted();
    metrics.record_submitted();
    metrics.record_settled(JobSettlement::Completed, 120);
    metrics.record_settled(JobSettlement::Failed, 80);

    assert_eq!(metrics.submitted, 2);
    assert_eq!(metrics.completed, 1);
    assert_eq!(metrics.failed, 1);
    assert_eq!(metrics.settled(), 2);
    assert_eq!(metrics.last_job_us, 80);
    assert_eq!(metrics.durations_us.len(), 2);
  }
}
