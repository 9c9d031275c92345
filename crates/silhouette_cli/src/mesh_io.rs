//! JSON mesh input and result output.
//!
//! Input: `{ "position": [x, y, z, ...], "index": [a, b, c, ...] }`, index optional.
//! Output: the same object for `single`, an array of them for `both`.

use anyhow::{Context, Result};
use serde::Serialize;
use silhouette_worker::{MeshBuffers, MeshResult, SilhouetteMesh};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Borrowed mesh in the output format.
#[derive(Serialize)]
struct MeshJson<'a> {
	position: &'a [f32],
	#[serde(skip_serializing_if = "Option::is_none")]
	index: Option<&'a [u32]>,
}

impl<'a> From<&'a SilhouetteMesh> for MeshJson<'a> {
	fn from(mesh: &'a SilhouetteMesh) -> Self {
		Self {
			position: mesh.position().array(),
			index: mesh.index().map(|i| i.array()),
		}
	}
}

/// Read a mesh from `path`, or stdin when `None`.
pub fn read_mesh(path: Option<&Path>) -> Result<MeshBuffers> {
	match path {
		Some(path) => {
			let file = File::open(path)
				.with_context(|| format!("Failed to open mesh file: {}", path.display()))?;
			parse_mesh(BufReader::new(file))
				.with_context(|| format!("Failed to parse mesh file: {}", path.display()))
		}
		None => parse_mesh(io::stdin().lock()).context("Failed to parse mesh from stdin"),
	}
}

/// Parse and check one mesh.
pub fn parse_mesh(reader: impl Read) -> Result<MeshBuffers> {
	let mesh: MeshBuffers = serde_json::from_reader(reader)?;
	mesh.check_layout().map_err(anyhow::Error::msg)?;
	Ok(mesh)
}

/// Write `result` to `path`, or stdout when `None`.
pub fn write_result(result: &MeshResult, path: Option<&Path>) -> Result<()> {
	match path {
		Some(path) => {
			let file = File::create(path)
				.with_context(|| format!("Failed to create output file: {}", path.display()))?;
			let mut out = BufWriter::new(file);
			write_json(result, &mut out)?;
			out.flush()
				.with_context(|| format!("Failed to write output file: {}", path.display()))
		}
		None => {
			let mut out = io::stdout().lock();
			write_json(result, &mut out)?;
			out.flush().context("Failed to write to stdout")
		}
	}
}

/// Serialize `result` as pretty JSON followed by a newline.
pub fn write_json(result: &MeshResult, out: &mut impl Write) -> Result<()> {
	match result {
		MeshResult::Single(mesh) => serde_json::to_writer_pretty(&mut *out, &MeshJson::from(mesh))?,
		MeshResult::Groups(meshes) => {
			let groups: Vec<MeshJson<'_>> = meshes.iter().map(MeshJson::from).collect();
			serde_json::to_writer_pretty(&mut *out, &groups)?;
		}
	}
	out.write_all(b"\n")?;
	Ok(())
}
