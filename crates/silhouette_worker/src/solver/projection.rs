//! Projection solver: flattens a mesh onto the ground plane.
//!
//! Front-facing triangles (all triangles when `doubleSided`) are projected
//! along +Y onto the XZ plane, projected vertices are welded on a quantized
//! grid, and triangles sharing a welded vertex are grouped. The merged
//! footprint covers the silhouette seen from above; overlapping triangles are
//! left as they are.
//!
//! ```text
//!  3D mesh            projected (y = 0)        groups (both)
//!    /\                ┌──┐   ┌─┐              [A]  [B]
//!   /__\    ───►       │A │   │B│     ───►
//!                      └──┘   └─┘
//! ```

use std::collections::HashMap;

use glam::{Vec2, Vec3Swizzles};
use rayon::prelude::*;
use serde::Deserialize;

use super::{ProgressReporter, SilhouetteSolver};
use crate::constants::{DEFAULT_PROGRESS_INTERVAL, DEFAULT_WELD_SCALE};
use crate::error::SolveError;
use crate::options::RequestOptions;
use crate::protocol::ResultPayload;
use crate::types::{MeshBuffers, OutputMode};

/// Fraction of the progress range spent projecting; welding and grouping
/// take the rest.
const PROJECTION_SHARE: f32 = 0.8;

/// Projected triangles with less doubled area than this are dropped.
const MIN_PROJECTED_AREA: f32 = 1e-12;

/// Options read from the job's algorithm map.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectionOptions {
  /// Keep triangles facing away from +Y.
  pub double_sided: bool,

  /// Grid cells per unit used to weld projected vertices.
  pub weld_scale: f32,

  /// Triangles between progress reports.
  pub progress_interval: usize,
}

impl Default for ProjectionOptions {
  fn default() -> Self {
    Self {
      double_sided: false,
      weld_scale: DEFAULT_WELD_SCALE,
      progress_interval: DEFAULT_PROGRESS_INTERVAL,
    }
  }
}

impl ProjectionOptions {
  fn validate(&self) -> Result<(), SolveError> {
    if !(self.weld_scale.is_finite() && self.weld_scale > 0.0) {
      return Err(SolveError::failed(format!(
        "weldScale must be a positive number, got {}",
        self.weld_scale
      )));
    }
    Ok(())
  }
}

/// Default solver used by `SilhouetteDispatcher::create`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectionSolver;

impl SilhouetteSolver for ProjectionSolver {
  #[tracing::instrument(skip_all, name = "projection::solve")]
  fn solve(
    &self,
    mesh: MeshBuffers,
    options: &RequestOptions,
    progress: &mut ProgressReporter<'_>,
  ) -> Result<ResultPayload, SolveError> {
    let settings: ProjectionOptions = options
      .algorithm
      .parse()
      .map_err(|e| SolveError::failed(format!("invalid projection options: {e}")))?;
    settings.validate()?;
    mesh.check_layout().map_err(SolveError::Failed)?;
    check_index_range(&mesh)?;

    let triangle_count = mesh.triangle_count();
    if triangle_count == 0 {
      return Err(SolveError::failed("degenerate mesh"));
    }

    let projected = project_triangles(&mesh, &settings, triangle_count, progress)?;
    if projected.is_empty() {
      return Err(SolveError::failed("degenerate mesh"));
    }

    let welded = {
      let _span = tracing::info_span!("weld_vertices").entered();
      weld(&projected, settings.weld_scale)
    };
    if welded.triangles.is_empty() {
      return Err(SolveError::failed("degenerate mesh"));
    }
    progress.check_cancelled()?;
    progress.report(PROJECTION_SHARE + (1.0 - PROJECTION_SHARE) * 0.5);

    let payload = match options.output {
      OutputMode::Single => ResultPayload::Single(welded.merged()),
      OutputMode::Both => {
        let _span = tracing::info_span!("group_components").entered();
        ResultPayload::Groups(welded.groups())
      }
    };

    progress.report(1.0);
    Ok(payload)
  }
}

fn check_index_range(mesh: &MeshBuffers) -> Result<(), SolveError> {
  let vertex_count = mesh.vertex_count();
  if let Some(index) = &mesh.index {
    if let Some(bad) = index.iter().find(|&&i| i as usize >= vertex_count) {
      return Err(SolveError::failed(format!(
        "index {bad} out of range for {vertex_count} vertices"
      )));
    }
  }
  Ok(())
}

#[inline]
fn triangle_vertices(mesh: &MeshBuffers, triangle: usize) -> [usize; 3] {
  let base = triangle * 3;
  match &mesh.index {
    Some(index) => [
      index[base] as usize,
      index[base + 1] as usize,
      index[base + 2] as usize,
    ],
    None => [base, base + 1, base + 2],
  }
}

/// Project one triangle onto XZ, keeping the winding that faces +Y.
fn project_triangle(mesh: &MeshBuffers, triangle: usize, double_sided: bool) -> Option<[Vec2; 3]> {
  let [ia, ib, ic] = triangle_vertices(mesh, triangle);
  let (a, b, c) = (mesh.vertex(ia), mesh.vertex(ib), mesh.vertex(ic));

  let facing = (b - a).cross(c - a).y;
  if facing.abs() <= MIN_PROJECTED_AREA || !facing.is_finite() {
    return None;
  }
  if facing < 0.0 && !double_sided {
    return None;
  }

  // Output triangles face +Y.
  if facing > 0.0 {
    Some([a.xz(), b.xz(), c.xz()])
  } else {
    Some([a.xz(), c.xz(), b.xz()])
  }
}

fn project_triangles(
  mesh: &MeshBuffers,
  settings: &ProjectionOptions,
  triangle_count: usize,
  progress: &mut ProgressReporter<'_>,
) -> Result<Vec<[Vec2; 3]>, SolveError> {
  let _span = tracing::info_span!("project_triangles").entered();

  let interval = settings.progress_interval.max(1);
  let mut projected = Vec::with_capacity(triangle_count);
  let mut start = 0;

  while start < triangle_count {
    progress.check_cancelled()?;
    let end = (start + interval).min(triangle_count);

    let batch: Vec<Option<[Vec2; 3]>> = (start..end)
      .into_par_iter()
      .map(|t| project_triangle(mesh, t, settings.double_sided))
      .collect();
    projected.extend(batch.into_iter().flatten());

    progress.report(PROJECTION_SHARE * end as f32 / triangle_count as f32);
    start = end;
  }

  Ok(projected)
}

/// Projected geometry with shared vertices.
struct Welded {
  vertices: Vec<Vec2>,
  triangles: Vec<[u32; 3]>,
}

fn weld(projected: &[[Vec2; 3]], scale: f32) -> Welded {
  let mut lookup: HashMap<(i64, i64), u32> = HashMap::new();
  let mut vertices = Vec::new();
  let mut triangles = Vec::with_capacity(projected.len());

  for tri in projected {
    let ids = tri.map(|p| {
      let key = ((p.x * scale).round() as i64, (p.y * scale).round() as i64);
      *lookup.entry(key).or_insert_with(|| {
        vertices.push(p);
        (vertices.len() - 1) as u32
      })
    });
    // Collapsed after welding
    if ids[0] == ids[1] || ids[1] == ids[2] || ids[0] == ids[2] {
      continue;
    }
    triangles.push(ids);
  }

  Welded { vertices, triangles }
}

impl Welded {
  fn position(&self, vertex: u32) -> [f32; 3] {
    let p = self.vertices[vertex as usize];
    [p.x, 0.0, p.y]
  }

  /// Everything as one indexed mesh.
  fn merged(&self) -> MeshBuffers {
    let position = (0..self.vertices.len() as u32).flat_map(|v| self.position(v)).collect();
    let index = self.triangles.iter().flatten().copied().collect();
    MeshBuffers::indexed(position, index)
  }

  /// One indexed mesh per connected component, ordered by first triangle.
  fn groups(&self) -> Vec<MeshBuffers> {
    let mut sets = DisjointSet::new(self.vertices.len());
    for [a, b, c] in &self.triangles {
      sets.union(*a, *b);
      sets.union(*b, *c);
    }

    let mut group_of_root: HashMap<u32, usize> = HashMap::new();
    let mut groups: Vec<(HashMap<u32, u32>, MeshBuffers)> = Vec::new();

    for tri in &self.triangles {
      let root = sets.find(tri[0]);
      let slot = *group_of_root.entry(root).or_insert_with(|| {
        groups.push((HashMap::new(), MeshBuffers::indexed(Vec::new(), Vec::new())));
        groups.len() - 1
      });

      let (remap, mesh) = &mut groups[slot];
      for &v in tri {
        let local = match remap.get(&v) {
          Some(&local) => local,
          None => {
            let local = remap.len() as u32;
            remap.insert(v, local);
            mesh.position.extend_from_slice(&self.position(v));
            local
          }
        };
        if let Some(index) = mesh.index.as_mut() {
          index.push(local);
        }
      }
    }

    groups.into_iter().map(|(_, mesh)| mesh).collect()
  }
}

/// Union-find over welded vertex ids.
struct DisjointSet {
  parent: Vec<u32>,
}

impl DisjointSet {
  fn new(len: usize) -> Self {
    Self {
      parent: (0..len as u32).collect(),
    }
  }

  fn find(&mut self, mut x: u32) -> u32 {
    while self.parent[x as usize] != x {
      let grandparent = self.parent[self.parent[x as usize] as usize];
      self.parent[x as usize] = grandparent;
      x = grandparent;
    }
    x
  }

  fn union(&mut self, a: u32, b: u32) {
    let (ra, rb) = (self.find(a), self.find(b));
    if ra != rb {
      // Lower id wins so roots are stable across runs.
      let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
      self.parent[hi as usize] = lo;
    }
  }
}

#[cfg(test)]
#[path = "projection_test.rs"]
mod projection_test;
