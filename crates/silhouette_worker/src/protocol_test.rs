use serde_json::json;

use super::*;
use crate::types::OutputMode;

#[test]
fn test_job_ids_are_unique() {
  let a = JobId::next();
  let b = JobId::next();
  assert_ne!(a, b);
  assert!(b.raw() > a.raw());
}

#[test]
fn test_generate_request_moves_buffers() {
  let mesh = MeshBuffers::indexed(vec![0.0, 1.0, 2.0], vec![0, 0, 0]);
  let request = WorkerRequest::generate(JobId::from(7), mesh, RequestOptions::default());

  match request {
    WorkerRequest::Generate {
      job,
      position,
      index,
      options,
    } => {
      assert_eq!(job.raw(), 7);
      assert_eq!(position, vec![0.0, 1.0, 2.0]);
      assert_eq!(index, Some(vec![0, 0, 0]));
      assert_eq!(options.output, OutputMode::Single);
    }
    WorkerRequest::Shutdown => panic!("Expected Generate"),
  }
}

#[test]
fn test_request_wire_shape() {
  let request = WorkerRequest::generate(
    JobId::from(3),
    MeshBuffers::non_indexed(vec![0.0, 0.0, 0.0]),
    RequestOptions {
      included_progress_callback: true,
      ..Default::default()
    },
  );

  let value = serde_json::to_value(&request).unwrap();
  assert_eq!(
    value,
    json!({
      "type": "Generate",
      "job": 3,
      "position": [0.0, 0.0, 0.0],
      "options": { "output": "single", "includedProgressCallback": true }
    })
  );

  let shutdown = serde_json::to_value(&WorkerRequest::Shutdown).unwrap();
  assert_eq!(shutdown, json!({ "type": "Shutdown" }));
}

#[test]
fn test_message_variants_decode() {
  let progress: WorkerMessage = serde_json::from_value(json!({ "job": 1, "progress": 0.25 })).unwrap();
  assert_eq!(
    progress,
    WorkerMessage::Progress {
      job: JobId::from(1),
      progress: 0.25
    }
  );
  assert!(!progress.is_terminal());

  let error: WorkerMessage =
    serde_json::from_value(json!({ "job": 1, "error": "degenerate mesh" })).unwrap();
  assert_eq!(error, WorkerMessage::error(JobId::from(1), "degenerate mesh"));
  assert!(error.is_terminal());

  let single: WorkerMessage = serde_json::from_value(json!({
    "job": 2,
    "result": { "position": [0, 0, 0], "index": [0] }
  }))
  .unwrap();
  match single {
    WorkerMessage::Result {
      job,
      result: ResultPayload::Single(mesh),
    } => {
      assert_eq!(job.raw(), 2);
      assert_eq!(mesh.index, Some(vec![0]));
    }
    other => panic!("Expected single result, got {other:?}"),
  }
}

#[test]
fn test_group_payload_keeps_order_and_optional_index() {
  let message: WorkerMessage = serde_json::from_value(json!({
    "job": 4,
    "result": [
      { "position": [1, 1, 1], "index": [0] },
      { "position": [2, 2, 2] },
      { "position": [3, 3, 3] }
    ]
  }))
  .unwrap();

  let WorkerMessage::Result { job, result } = message else {
    panic!("Expected result");
  };
  assert_eq!(job, JobId::from(4));
  assert_eq!(result.mesh_count(), 3);

  let ResultPayload::Groups(groups) = result else {
    panic!("Expected groups");
  };
  let firsts: Vec<f32> = groups.iter().map(|g| g.position[0]).collect();
  assert_eq!(firsts, vec![1.0, 2.0, 3.0]);
  assert!(groups[0].is_indexed());
  assert!(!groups[1].is_indexed());
}

#[test]
fn test_message_job_accessor() {
  let id = JobId::from(9);
  let messages = [
    WorkerMessage::Progress { job: id, progress: 0.5 },
    WorkerMessage::Result {
      job: id,
      result: ResultPayload::Groups(vec![]),
    },
    WorkerMessage::error(id, "x"),
  ];
  assert!(messages.iter().all(|m| m.job() == id));
}
