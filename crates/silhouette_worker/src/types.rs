//! Core mesh buffer types shared by the caller and the worker.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::constants::{INDEX_ITEM_SIZE, POSITION_ITEM_SIZE};

/// Output mode selecting one merged result or one result per group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
  /// One merged mesh.
  #[default]
  Single,

  /// One mesh per connected silhouette group, in discovery order.
  Both,
}

/// Raw geometry buffers handed to (and returned from) the worker.
///
/// Passed by value: submitting a job moves the buffers into the worker, and
/// the caller gets them back only through the result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshBuffers {
  /// Flat vertex positions, 3 floats per vertex.
  pub position: Vec<f32>,

  /// Flat triangle indices, or `None` for a non-indexed mesh.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub index: Option<Vec<u32>>,
}

impl MeshBuffers {
  pub fn new(position: Vec<f32>, index: Option<Vec<u32>>) -> Self {
    Self { position, index }
  }

  /// Indexed mesh.
  pub fn indexed(position: Vec<f32>, index: Vec<u32>) -> Self {
    Self::new(position, Some(index))
  }

  /// Non-indexed mesh (every 3 vertices form a triangle).
  pub fn non_indexed(position: Vec<f32>) -> Self {
    Self::new(position, None)
  }

  /// Copy borrowed data into owned buffers.
  ///
  /// Use this when the caller must keep its own geometry after submitting.
  pub fn from_slices(position: &[f32], index: Option<&[u32]>) -> Self {
    Self::new(position.to_vec(), index.map(<[u32]>::to_vec))
  }

  /// Number of vertices (position triplets).
  pub fn vertex_count(&self) -> usize {
    self.position.len() / POSITION_ITEM_SIZE
  }

  /// Number of indices, 0 when non-indexed.
  pub fn index_count(&self) -> usize {
    self.index.as_ref().map_or(0, Vec::len)
  }

  pub fn is_indexed(&self) -> bool {
    self.index.is_some()
  }

  /// Number of triangles described by the buffers.
  pub fn triangle_count(&self) -> usize {
    match &self.index {
      Some(index) => index.len() / 3,
      None => self.vertex_count() / 3,
    }
  }

  /// Check buffer strides.
  ///
  /// Returns a human readable reason on failure.
  pub fn check_layout(&self) -> Result<(), String> {
    if self.position.len() % POSITION_ITEM_SIZE != 0 {
      return Err(format!(
        "position buffer length {} is not a multiple of {}",
        self.position.len(),
        POSITION_ITEM_SIZE
      ));
    }
    if let Some(index) = &self.index {
      if index.len() % 3 != 0 {
        return Err(format!(
          "index buffer length {} is not a multiple of 3",
          index.len()
        ));
      }
    }
    Ok(())
  }

  /// Vertex position at `i`.
  #[inline]
  pub fn vertex(&self, i: usize) -> Vec3 {
    let base = i * POSITION_ITEM_SIZE;
    Vec3::new(
      self.position[base],
      self.position[base + 1],
      self.position[base + 2],
    )
  }
}

/// Axis-aligned bounding box.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMaxAABB {
  pub min: [f32; 3],
  pub max: [f32; 3],
}

impl MinMaxAABB {
  /// Create AABB with inverted extents (ready for encapsulation).
  pub fn empty() -> Self {
    Self {
      min: [f32::INFINITY; 3],
      max: [f32::NEG_INFINITY; 3],
    }
  }

  /// Create AABB from min/max corners.
  pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
    Self { min, max }
  }

  /// Bounds of a flat position buffer.
  pub fn from_positions(position: &[f32]) -> Self {
    let mut aabb = Self::empty();
    for p in position.chunks_exact(POSITION_ITEM_SIZE) {
      aabb.encapsulate([p[0], p[1], p[2]]);
    }
    aabb
  }

  /// Expand AABB to include a point.
  #[inline]
  pub fn encapsulate(&mut self, point: [f32; 3]) {
    for i in 0..3 {
      self.min[i] = self.min[i].min(point[i]);
      self.max[i] = self.max[i].max(point[i]);
    }
  }

  /// Check if AABB is valid (min <= max on all axes).
  pub fn is_valid(&self) -> bool {
    self.min[0] <= self.max[0] && self.min[1] <= self.max[1] && self.min[2] <= self.max[2]
  }
}

impl Default for MinMaxAABB {
  fn default() -> Self {
    Self::empty()
  }
}

/// Typed view over a flat buffer with a fixed number of components per item.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferAttribute<T> {
  array: Vec<T>,
  item_size: usize,
}

impl<T> BufferAttribute<T> {
  /// Wrap `array`. `array.len()` must be a multiple of `item_size`.
  pub(crate) fn new(array: Vec<T>, item_size: usize) -> Self {
    debug_assert!(item_size > 0 && array.len() % item_size == 0);
    Self { array, item_size }
  }

  /// Components per item (3 for positions, 1 for indices).
  pub fn item_size(&self) -> usize {
    self.item_size
  }

  /// Number of items.
  pub fn count(&self) -> usize {
    self.array.len() / self.item_size
  }

  pub fn array(&self) -> &[T] {
    &self.array
  }

  pub fn into_array(self) -> Vec<T> {
    self.array
  }
}

/// Caller-facing mesh rebuilt from worker buffers.
#[derive(Clone, Debug, PartialEq)]
pub struct SilhouetteMesh {
  position: BufferAttribute<f32>,
  index: Option<BufferAttribute<u32>>,
  bounds: MinMaxAABB,
}

impl SilhouetteMesh {
  pub(crate) fn from_parts(position: Vec<f32>, index: Option<Vec<u32>>) -> Self {
    let bounds = MinMaxAABB::from_positions(&position);
    Self {
      position: BufferAttribute::new(position, POSITION_ITEM_SIZE),
      index: index.map(|index| BufferAttribute::new(index, INDEX_ITEM_SIZE)),
      bounds,
    }
  }

  pub fn position(&self) -> &BufferAttribute<f32> {
    &self.position
  }

  /// Index attribute, `None` for a non-indexed mesh.
  pub fn index(&self) -> Option<&BufferAttribute<u32>> {
    self.index.as_ref()
  }

  pub fn bounds(&self) -> MinMaxAABB {
    self.bounds
  }

  pub fn vertex_count(&self) -> usize {
    self.position.count()
  }

  pub fn index_count(&self) -> usize {
    self.index.as_ref().map_or(0, BufferAttribute::count)
  }

  pub fn is_indexed(&self) -> bool {
    self.index.is_some()
  }

  /// Number of triangles in the mesh.
  pub fn triangle_count(&self) -> usize {
    match &self.index {
      Some(index) => index.count() / 3,
      None => self.vertex_count() / 3,
    }
  }

  /// Returns true if no geometry was generated.
  pub fn is_empty(&self) -> bool {
    self.position.count() == 0
  }

  /// Iterate vertex positions.
  pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
    self
      .position
      .array()
      .chunks_exact(POSITION_ITEM_SIZE)
      .map(Vec3::from_slice)
  }

  /// Give the buffers back, e.g. to submit them as the next job's input.
  pub fn into_buffers(self) -> MeshBuffers {
    MeshBuffers::new(
      self.position.into_array(),
      self.index.map(BufferAttribute::into_array),
    )
  }
}

/// Settled value of a generation job.
#[derive(Clone, Debug, PartialEq)]
pub enum MeshResult {
  /// `OutputMode::Single`.
  Single(SilhouetteMesh),

  /// `OutputMode::Both`, in worker-emitted order.
  Groups(Vec<SilhouetteMesh>),
}

impl MeshResult {
  /// All meshes in order (one for `Single`).
  pub fn meshes(&self) -> &[SilhouetteMesh] {
    match self {
      MeshResult::Single(mesh) => std::slice::from_ref(mesh),
      MeshResult::Groups(meshes) => meshes,
    }
  }

  pub fn into_meshes(self) -> Vec<SilhouetteMesh> {
    match self {
      MeshResult::Single(mesh) => vec![mesh],
      MeshResult::Groups(meshes) => meshes,
    }
  }

  pub fn output_mode(&self) -> OutputMode {
    match self {
      MeshResult::Single(_) => OutputMode::Single,
      MeshResult::Groups(_) => OutputMode::Both,
    }
  }

  /// Single mesh, if this is a `Single` result.
  pub fn as_single(&self) -> Option<&SilhouetteMesh> {
    match self {
      MeshResult::Single(mesh) => Some(mesh),
      MeshResult::Groups(_) => None,
    }
  }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
