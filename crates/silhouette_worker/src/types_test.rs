use super::*;

fn triangle() -> MeshBuffers {
  MeshBuffers::indexed(
    vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
    vec![0, 1, 2],
  )
}

#[test]
fn test_mesh_buffer_counts() {
  let mesh = triangle();
  assert_eq!(mesh.vertex_count(), 3);
  assert_eq!(mesh.index_count(), 3);
  assert_eq!(mesh.triangle_count(), 1);
  assert!(mesh.is_indexed());
}

#[test]
fn test_non_indexed_counts() {
  let mesh = MeshBuffers::non_indexed(vec![0.0; 18]);
  assert_eq!(mesh.vertex_count(), 6);
  assert_eq!(mesh.index_count(), 0);
  assert_eq!(mesh.triangle_count(), 2);
  assert!(!mesh.is_indexed());
}

#[test]
fn test_check_layout() {
  assert!(triangle().check_layout().is_ok());

  let bad_position = MeshBuffers::non_indexed(vec![0.0; 4]);
  assert!(bad_position.check_layout().is_err());

  let bad_index = MeshBuffers::indexed(vec![0.0; 9], vec![0, 1]);
  let reason = bad_index.check_layout().unwrap_err();
  assert!(reason.contains("index buffer length 2"));
}

#[test]
fn test_from_slices_copies() {
  let position = [1.0, 2.0, 3.0];
  let mesh = MeshBuffers::from_slices(&position, None);
  assert_eq!(mesh.position, vec![1.0, 2.0, 3.0]);
  assert_eq!(mesh.index, None);
  // Source is still usable
  assert_eq!(position[0], 1.0);
}

#[test]
fn test_output_mode_serde() {
  assert_eq!(serde_json::to_string(&OutputMode::Both).unwrap(), "\"both\"");
  let mode: OutputMode = serde_json::from_str("\"single\"").unwrap();
  assert_eq!(mode, OutputMode::Single);
  assert_eq!(OutputMode::default(), OutputMode::Single);
}

#[test]
fn test_missing_index_deserializes_to_none() {
  let mesh: MeshBuffers = serde_json::from_str(r#"{"position":[0,0,0]}"#).unwrap();
  assert_eq!(mesh.index, None);
  assert!(!serde_json::to_string(&mesh).unwrap().contains("index"));
}

#[test]
fn test_aabb_encapsulate() {
  let mut aabb = MinMaxAABB::empty();
  aabb.encapsulate([1.0, 2.0, 3.0]);
  aabb.encapsulate([-1.0, -2.0, -3.0]);

  assert_eq!(aabb.min, [-1.0, -2.0, -3.0]);
  assert_eq!(aabb.max, [1.0, 2.0, 3.0]);
  assert!(aabb.is_valid());
  assert!(!MinMaxAABB::empty().is_valid());
}

#[test]
fn test_silhouette_mesh_attributes() {
  let buffers = triangle();
  let mesh = SilhouetteMesh::from_parts(buffers.position, buffers.index);

  assert_eq!(mesh.position().item_size(), 3);
  assert_eq!(mesh.index().map(BufferAttribute::item_size), Some(1));
  assert_eq!(mesh.vertex_count(), 3);
  assert_eq!(mesh.index_count(), 3);
  assert_eq!(mesh.triangle_count(), 1);
  assert_eq!(mesh.bounds().max, [1.0, 1.0, 0.0]);

  let positions: Vec<Vec3> = mesh.positions().collect();
  assert_eq!(positions[1], Vec3::X);

  let back = mesh.into_buffers();
  assert_eq!(back, triangle());
}

#[test]
fn test_mesh_result_accessors() {
  let a = SilhouetteMesh::from_parts(vec![0.0; 3], None);
  let b = SilhouetteMesh::from_parts(vec![1.0; 3], None);

  let single = MeshResult::Single(a.clone());
  assert_eq!(single.output_mode(), OutputMode::Single);
  assert_eq!(single.meshes().len(), 1);
  assert!(single.as_single().is_some());

  let groups = MeshResult::Groups(vec![a.clone(), b.clone()]);
  assert_eq!(groups.output_mode(), OutputMode::Both);
  assert!(groups.as_single().is_none());
  assert_eq!(groups.into_meshes(), vec![a, b]);
}
