//! Result materializer: raw worker buffers to caller-facing meshes.

use crate::constants::POSITION_ITEM_SIZE;
use crate::error::DispatchError;
use crate::protocol::ResultPayload;
use crate::types::{MeshBuffers, MeshResult, OutputMode, SilhouetteMesh};

/// Rebuild the result for the output mode the job was submitted with.
///
/// `single` expects one mesh object and `both` an ordered list; the order of
/// the list is preserved.
pub fn materialize(payload: ResultPayload, mode: OutputMode) -> Result<MeshResult, DispatchError> {
  match (mode, payload) {
    (OutputMode::Single, ResultPayload::Single(buffers)) => build_mesh(buffers).map(MeshResult::Single),
    (OutputMode::Both, ResultPayload::Groups(groups)) => groups
      .into_iter()
      .enumerate()
      .map(|(i, buffers)| {
        build_mesh(buffers).map_err(|err| match err {
          DispatchError::MalformedResult(reason) => {
            DispatchError::MalformedResult(format!("group {i}: {reason}"))
          }
          other => other,
        })
      })
      .collect::<Result<Vec<_>, _>>()
      .map(MeshResult::Groups),
    (OutputMode::Single, ResultPayload::Groups(groups)) => Err(DispatchError::MalformedResult(
      format!("expected one mesh for `single` output, got a list of {}", groups.len()),
    )),
    (OutputMode::Both, ResultPayload::Single(_)) => Err(DispatchError::MalformedResult(
      "expected a list of meshes for `both` output, got one mesh".to_string(),
    )),
  }
}

/// Wrap one pair of buffers as a mesh, checking layout and index range.
///
/// No index buffer gives a non-indexed mesh.
pub fn build_mesh(buffers: MeshBuffers) -> Result<SilhouetteMesh, DispatchError> {
  let MeshBuffers { position, index } = buffers;

  if position.len() % POSITION_ITEM_SIZE != 0 {
    return Err(DispatchError::MalformedResult(format!(
      "position buffer length {} is not a multiple of {}",
      position.len(),
      POSITION_ITEM_SIZE
    )));
  }

  let vertex_count = position.len() / POSITION_ITEM_SIZE;
  if let Some(index) = &index {
    if let Some(bad) = index.iter().find(|&&i| i as usize >= vertex_count) {
      return Err(DispatchError::MalformedResult(format!(
        "index {bad} out of range for {vertex_count} vertices"
      )));
    }
  }

  Ok(SilhouetteMesh::from_parts(position, index))
}

#[cfg(test)]
#[path = "materialize_test.rs"]
mod materialize_test;
