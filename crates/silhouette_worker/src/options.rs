//! Caller-side job options and their wire form.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::OutputMode;

/// Progress callback, called with a completion fraction in `0.0..=1.0`.
pub type ProgressCallback = Box<dyn FnMut(f32) + Send + 'static>;

/// Algorithm-specific options, passed to the worker verbatim.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmOptions(Map<String, Value>);

impl AlgorithmOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
    self.0.insert(key.into(), value.into());
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.0.get(key)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Deserialize the map into a solver's typed options.
  pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(self.0.clone()))
  }
}

impl From<Map<String, Value>> for AlgorithmOptions {
  fn from(map: Map<String, Value>) -> Self {
    Self(map)
  }
}

/// Options for one `generate` call.
#[derive(Default)]
pub struct GenerateOptions {
  /// Single merged result or one result per group.
  pub output: OutputMode,

  /// Called on the dispatcher's router thread for each progress message.
  pub on_progress: Option<ProgressCallback>,

  /// Passed through to the solver untouched.
  pub algorithm: AlgorithmOptions,
}

impl GenerateOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_output(mut self, output: OutputMode) -> Self {
    self.output = output;
    self
  }

  pub fn with_progress<F>(mut self, callback: F) -> Self
  where
    F: FnMut(f32) + Send + 'static,
  {
    self.on_progress = Some(Box::new(callback));
    self
  }

  pub fn with_algorithm(mut self, algorithm: AlgorithmOptions) -> Self {
    self.algorithm = algorithm;
    self
  }

  /// Set one algorithm option.
  pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.algorithm.insert(key, value);
    self
  }

  /// Wire form: the callback is replaced by a flag telling the worker
  /// whether to emit progress at all.
  pub fn to_request(&self) -> RequestOptions {
    RequestOptions {
      output: self.output,
      included_progress_callback: self.on_progress.is_some(),
      algorithm: self.algorithm.clone(),
    }
  }

  /// Split into the wire options and the callback that stays with the caller.
  pub(crate) fn into_parts(self) -> (RequestOptions, Option<ProgressCallback>) {
    let request = self.to_request();
    (request, self.on_progress)
  }
}

impl fmt::Debug for GenerateOptions {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("GenerateOptions")
      .field("output", &self.output)
      .field("on_progress", &self.on_progress.is_some())
      .field("algorithm", &self.algorithm)
      .finish()
  }
}

/// Options as they travel to the worker.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
  #[serde(default)]
  pub output: OutputMode,

  /// Worker emits progress messages only when set.
  #[serde(default)]
  pub included_progress_callback: bool,

  #[serde(flatten)]
  pub algorithm: AlgorithmOptions,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn request_replaces_callback_with_flag() {
    let options = GenerateOptions::new()
      .with_output(OutputMode::Both)
      .with_progress(|_| {})
      .with_option("doubleSided", true);

    let request = options.to_request();
    assert_eq!(request.output, OutputMode::Both);
    assert!(request.included_progress_callback);
    assert_eq!(request.algorithm.get("doubleSided"), Some(&json!(true)));

    let request = GenerateOptions::new().to_request();
    assert!(!request.included_progress_callback);
  }

  #[test]
  fn request_wire_shape_is_flat() {
    let request = GenerateOptions::new()
      .with_option("weldScale", 100)
      .to_request();

    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(
      value,
      json!({ "output": "single", "includedProgressCallback": false, "weldScale": 100 })
    );
  }

  #[test]
  fn request_defaults_missing_fields() {
    let request: RequestOptions = serde_json::from_value(json!({ "custom": "x" })).unwrap();
    assert!(!request.included_progress_callback);
    assert_eq!(request.output, OutputMode::Single);
    assert_eq!(request.algorithm.get("custom"), Some(&json!("x")));
  }

  #[test]
  fn into_parts_keeps_callback_local() {
    let (request, callback) = GenerateOptions::new().with_progress(|_| {}).into_parts();
    assert!(request.included_progress_callback);
    assert!(callback.is_some());
  }
}
