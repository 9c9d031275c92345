//! Silhouette generator.
//!
//! Loads a JSON mesh, runs it through a silhouette worker and writes the
//! resulting mesh (or one mesh per group) as JSON.
//!
//! Logs go to stderr so stdout stays free for results and, in `worker` mode,
//! for the JSON Lines protocol.

mod config;
mod mesh_io;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use silhouette_worker::{
	run_stdio_worker, GenerateOptions, OutputMode, ProjectionSolver, SilhouetteDispatcher,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, TransportKind};

/// Silhouette generator for triangle meshes.
#[derive(Parser, Debug)]
#[command(name = "silhouette")]
#[command(about = "Generates ground-plane silhouettes from triangle meshes")]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Generate a silhouette from a JSON mesh.
	Generate(GenerateArgs),

	/// Serve jobs over stdin/stdout (started by the process transport).
	Worker,
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
	/// Input mesh JSON (default: stdin).
	#[arg(short, long)]
	input: Option<PathBuf>,

	/// Output JSON path (default: stdout).
	#[arg(short, long)]
	output: Option<PathBuf>,

	/// Path to configuration TOML file.
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Output mode, overrides the config file.
	#[arg(short, long, value_enum)]
	mode: Option<ModeArg>,

	/// Run the worker in a child process instead of a thread.
	#[arg(long)]
	process: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
	Single,
	Both,
}

impl From<ModeArg> for OutputMode {
	fn from(mode: ModeArg) -> Self {
		match mode {
			ModeArg::Single => OutputMode::Single,
			ModeArg::Both => OutputMode::Both,
		}
	}
}

fn main() -> Result<()> {
	init_tracing();
	let cli = Cli::parse();

	match cli.command {
		Commands::Worker => run_stdio_worker(ProjectionSolver).context("Stdio worker failed"),
		Commands::Generate(args) => tokio::runtime::Builder::new_current_thread()
			.build()
			.context("Failed to build async runtime")?
			.block_on(generate(args)),
	}
}

fn init_tracing() {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();
}

async fn generate(args: GenerateArgs) -> Result<()> {
	let config = match &args.config {
		Some(path) => {
			tracing::info!("Loading config from: {}", path.display());
			Config::load(path)?
		}
		None => Config::default(),
	};

	let output = args.mode.map(OutputMode::from).unwrap_or(config.output);
	let transport = if args.process {
		TransportKind::Process
	} else {
		config.transport
	};

	let mesh = mesh_io::read_mesh(args.input.as_deref())?;
	tracing::info!(
		vertices = mesh.vertex_count(),
		triangles = mesh.triangle_count(),
		"Loaded mesh"
	);

	let dispatcher = match transport {
		TransportKind::Thread => SilhouetteDispatcher::create(config.dispatcher_config()),
		TransportKind::Process => SilhouetteDispatcher::spawn_current_exe(),
	}
	.context("Failed to start silhouette worker")?;

	let options = GenerateOptions::new()
		.with_output(output)
		.with_algorithm(config.algorithm_options()?)
		.with_progress(|p| tracing::info!("Progress: {:.0}%", p * 100.0));

	let result = dispatcher
		.generate(mesh, options)
		.context("Failed to submit job")?
		.await
		.context("Silhouette generation failed")?;
	dispatcher.dispose();

	let meshes = result.meshes();
	tracing::info!(
		meshes = meshes.len(),
		triangles = meshes.iter().map(|m| m.triangle_count()).sum::<usize>(),
		"Silhouette generated"
	);

	mesh_io::write_result(&result, args.output.as_deref())?;
	if let Some(path) = &args.output {
		tracing::info!("Output written to: {}", path.display());
	}

	Ok(())
}

/// This executable in worker mode.
#[cfg(test)]
mod tests {
	use super::*;
	use silhouette_worker::constants::WORKER_ARG;

	#[test]
	fn worker_subcommand_matches_process_argument() {
		let cli = Cli::try_parse_from(["silhouette", WORKER_ARG]).unwrap();
		assert!(matches!(cli.command, Commands::Worker));
	}

	#[test]
	fn generate_flags() {
		let cli = Cli::try_parse_from([
			"silhouette",
			"generate",
			"-i",
			"in.json",
			"--mode",
			"both",
			"--process",
		])
		.unwrap();

		let Commands::Generate(args) = cli.command else {
			panic!("Expected generate");
		};
		assert_eq!(args.input, Some(PathBuf::from("in.json")));
		assert!(matches!(args.mode, Some(ModeArg::Both)));
		assert!(args.process);
		assert!(args.output.is_none());
	}

	#[test]
	fn unknown_mode_is_rejected() {
		assert!(Cli::try_parse_from(["silhouette", "generate", "--mode", "all"]).is_err());
	}
}
