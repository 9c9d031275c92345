//! Configuration parsing for silhouette generation.

use anyhow::{Context, Result};
use serde::Deserialize;
use silhouette_worker::{AlgorithmOptions, DispatcherConfig, OutputMode};
use std::path::Path;

/// Where the worker runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
	/// Worker thread inside this process.
	#[default]
	Thread,
	/// This executable re-launched in worker mode.
	Process,
}

/// Root configuration, every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	/// `single` or `both`.
	pub output: OutputMode,
	/// `thread` or `process`.
	pub transport: TransportKind,
	/// Worker thread name (thread transport only).
	pub thread_name: Option<String>,
	/// Worker thread stack size in bytes (thread transport only).
	pub stack_size: Option<usize>,
	/// Solver options passed to the worker verbatim.
	pub algorithm: toml::Table,
}

impl Config {
	/// Load configuration from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		Self::parse(&content)
	}

	/// Parse and validate configuration TOML.
	pub fn parse(content: &str) -> Result<Self> {
		let config: Config = toml::from_str(content).with_context(|| "Failed to parse config TOML")?;

		if let Some(name) = &config.thread_name {
			if name.is_empty() {
				anyhow::bail!("thread_name must not be empty");
			}
		}
		if config.stack_size == Some(0) {
			anyhow::bail!("stack_size must be greater than 0");
		}
		config.dispatcher_config().validate()?;

		Ok(config)
	}

	/// Worker thread settings.
	pub fn dispatcher_config(&self) -> DispatcherConfig {
		let mut config = DispatcherConfig::default();
		if let Some(name) = &self.thread_name {
			config = config.with_thread_name(name.clone());
		}
		if let Some(size) = self.stack_size {
			config = config.with_stack_size(size);
		}
		config
	}

	/// The `[algorithm]` table as the options map sent to the worker.
	pub fn algorithm_options(&self) -> Result<AlgorithmOptions> {
		let value = serde_json::to_value(&self.algorithm).context("Converting [algorithm] table")?;
		serde_json::from_value(value).context("Converting [algorithm] table")
	}
}
