//! End-to-end tests against the real `silhouette worker` child process.

use std::process::Command;
use std::sync::{Arc, Mutex};

use silhouette_worker::constants::WORKER_ARG;
use silhouette_worker::{DispatchError, GenerateOptions, MeshBuffers, OutputMode, SilhouetteDispatcher};

fn worker_command() -> Command {
	let mut command = Command::new(env!("CARGO_BIN_EXE_silhouette"));
	command.arg(WORKER_ARG);
	command
}

/// Two separate upward-facing triangles.
fn two_islands() -> MeshBuffers {
	MeshBuffers::indexed(
		vec![
			0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, //
			5.0, 3.0, 0.0, 5.0, 3.0, 1.0, 6.0, 3.0, 0.0,
		],
		vec![0, 1, 2, 3, 4, 5],
	)
}

#[test]
fn process_worker_round_trip() {
	let dispatcher = SilhouetteDispatcher::spawn_process(worker_command()).unwrap();
	assert_eq!(dispatcher.transport_kind(), "process");

	let progress = Arc::new(Mutex::new(Vec::new()));
	let log = Arc::clone(&progress);
	let result = dispatcher
		.generate(
			two_islands(),
			GenerateOptions::new()
				.with_output(OutputMode::Both)
				.with_progress(move |p| log.lock().unwrap().push(p)),
		)
		.unwrap()
		.wait()
		.unwrap();

	let groups = result.into_meshes();
	assert_eq!(groups.len(), 2);
	assert!(groups.iter().all(|g| g.triangle_count() == 1));
	assert_eq!(progress.lock().unwrap().last(), Some(&1.0));
	assert!(!dispatcher.is_busy());
}

#[test]
fn process_worker_reports_job_errors() {
	let dispatcher = SilhouetteDispatcher::spawn_process(worker_command()).unwrap();

	let wall = MeshBuffers::non_indexed(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
	let err = dispatcher.generate(wall, GenerateOptions::new()).unwrap().wait().unwrap_err();
	assert_eq!(err, DispatchError::Job("degenerate mesh".to_string()));

	// Same worker serves the next job
	let result = dispatcher
		.generate(two_islands(), GenerateOptions::new())
		.unwrap()
		.wait()
		.unwrap();
	assert_eq!(result.meshes().len(), 1);
}

#[test]
fn non_finite_input_fails_without_hanging() {
	let dispatcher = SilhouetteDispatcher::spawn_process(worker_command()).unwrap();

	let mut position = vec![0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0];
	position[3] = f32::NAN;
	let err = dispatcher
		.generate(MeshBuffers::indexed(position, vec![0, 1, 2]), GenerateOptions::new())
		.unwrap_err();
	match err {
		DispatchError::Transport(message) => assert!(message.contains("position[3] is not finite"), "{message}"),
		other => panic!("Unexpected error: {other:?}"),
	}
	assert!(!dispatcher.is_busy());

	// Nothing reached the worker, so it still serves jobs
	let result = dispatcher
		.generate(two_islands(), GenerateOptions::new())
		.unwrap()
		.wait()
		.unwrap();
	assert_eq!(result.meshes().len(), 1);
}

#[test]
fn dispose_cancels_and_refuses_jobs() {
	let dispatcher = SilhouetteDispatcher::spawn_process(worker_command()).unwrap();
	let handle = dispatcher.generate(two_islands(), GenerateOptions::new()).unwrap();

	dispatcher.dispose();
	// The worker may have answered first; otherwise the job is cancelled.
	match handle.wait() {
		Ok(_) | Err(DispatchError::Cancelled) => {}
		Err(other) => panic!("Unexpected settlement: {other:?}"),
	}

	let err = dispatcher.generate(two_islands(), GenerateOptions::new()).unwrap_err();
	assert_eq!(err, DispatchError::Disposed);
}

/// Run `silhouette generate --mode both` on the two-island mesh and parse stdout.
fn run_generate(name: &str, extra: &[&str]) -> serde_json::Value {
	let dir = std::env::temp_dir().join(format!("silhouette-cli-{name}-{}", std::process::id()));
	std::fs::create_dir_all(&dir).unwrap();
	let input = dir.join("mesh.json");
	std::fs::write(
		&input,
		r#"{"position":[0,1,0, 0,1,1, 1,1,0, 5,3,0, 5,3,1, 6,3,0],"index":[0,1,2,3,4,5]}"#,
	)
	.unwrap();

	let output = Command::new(env!("CARGO_BIN_EXE_silhouette"))
		.args(["generate", "--mode", "both"])
		.args(extra)
		.arg("--input")
		.arg(&input)
		.output()
		.unwrap();
	std::fs::remove_dir_all(&dir).unwrap();
	assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

	serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn generate_command_writes_json() {
	let value = run_generate("thread", &[]);
	let groups = value.as_array().unwrap();
	assert_eq!(groups.len(), 2);
	assert_eq!(groups[0]["index"], serde_json::json!([0, 1, 2]));
}

#[test]
fn generate_command_runs_own_executable_as_worker() {
	let value = run_generate("process", &["--process"]);
	assert_eq!(value, run_generate("thread-again", &[]));
}
