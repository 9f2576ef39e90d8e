//! Wavefront OBJ mesh loading.

use std::path::Path;

use glam::{Vec2, Vec3};
use tracing::info;

use crate::error::{AssetError, AssetResult};

/// A single interleaved mesh vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub tex_coord: Vec2,
    pub normal: Vec3,
}

/// Vertex and index data for one loaded mesh.
#[derive(Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Load a mesh from a Wavefront OBJ file.
    ///
    /// Faces are triangulated and vertices deduplicated by single-index
    /// loading, so the result is ready for an indexed draw. Texture
    /// coordinates are V-flipped from OBJ's bottom-up convention to the
    /// top-down convention samplers expect.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, fails to parse, or holds no
    /// geometry.
    pub fn load(path: &Path) -> AssetResult<Self> {
        if !path.exists() {
            return Err(AssetError::FileNotFound(path.to_path_buf()));
        }

        let load_options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };

        let (models, _materials) =
            tobj::load_obj(path, &load_options).map_err(|source| AssetError::Obj {
                path: path.to_path_buf(),
                source,
            })?;

        if models.is_empty() {
            return Err(AssetError::EmptyMesh(path.to_path_buf()));
        }

        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for model in &models {
            let mesh = &model.mesh;
            let base = vertices.len() as u32;
            let vertex_count = mesh.positions.len() / 3;

            for i in 0..vertex_count {
                let position = Vec3::new(
                    mesh.positions[3 * i],
                    mesh.positions[3 * i + 1],
                    mesh.positions[3 * i + 2],
                );

                let tex_coord = if mesh.texcoords.len() >= 2 * (i + 1) {
                    // OBJ texture space is bottom-up; flip V for sampling
                    Vec2::new(mesh.texcoords[2 * i], 1.0 - mesh.texcoords[2 * i + 1])
                } else {
                    Vec2::ZERO
                };

                let normal = if mesh.normals.len() >= 3 * (i + 1) {
                    Vec3::new(
                        mesh.normals[3 * i],
                        mesh.normals[3 * i + 1],
                        mesh.normals[3 * i + 2],
                    )
                } else {
                    Vec3::ZERO
                };

                vertices.push(Vertex {
                    position,
                    tex_coord,
                    normal,
                });
            }

            indices.extend(mesh.indices.iter().map(|&index| base + index));
        }

        if vertices.is_empty() || indices.is_empty() {
            return Err(AssetError::EmptyMesh(path.to_path_buf()));
        }

        info!(
            "Loaded mesh '{}': {} vertices, {} indices",
            path.display(),
            vertices.len(),
            indices.len()
        );

        Ok(Self { vertices, indices })
    }

    /// Number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}
