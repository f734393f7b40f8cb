//! Asset decoding
//!
//! Decoding is an external collaborator behind [`AssetLoader`]. The default
//! implementation decodes images with `image` and Wavefront OBJ models with
//! `tobj`.

use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};
use crate::error::{Error, Result};
use crate::resource::{AssetSource, Vertex};
use crate::engine_warn;

/// Decoded RGBA8 image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 pixels
    pub pixels: Vec<u8>,
}

/// One mesh of a decoded model
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Texture paths, relative to the model file
    pub diffuse_texture: Option<PathBuf>,
    pub specular_texture: Option<PathBuf>,
}

/// Decoded model
#[derive(Debug, Clone, Default)]
pub struct ModelData {
    pub meshes: Vec<MeshData>,
}

/// Asset decoder
pub trait AssetLoader: Send + Sync {
    /// Decode an image into RGBA8
    fn decode_image(&self, bytes: &[u8], label: &str) -> Result<ImageData>;

    /// Parse a model file
    ///
    /// `path` is the canonical model path; companion files (materials) are
    /// read through `source` relative to its directory.
    fn parse_model(&self, bytes: &[u8], path: &Path, source: &dyn AssetSource) -> Result<ModelData>;
}

/// `image` + `tobj` decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAssetLoader;

impl AssetLoader for DefaultAssetLoader {
    fn decode_image(&self, bytes: &[u8], label: &str) -> Result<ImageData> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| Error::InvalidResource(format!("Failed to decode image '{}': {}", label, e)))?;
        let rgba = img.to_rgba8();
        Ok(ImageData {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        })
    }

    fn parse_model(&self, bytes: &[u8], path: &Path, source: &dyn AssetSource) -> Result<ModelData> {
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut reader = BufReader::new(Cursor::new(bytes));

        let (models, materials) = tobj::load_obj_buf(
            &mut reader,
            &tobj::LoadOptions {
                single_index: true,
                triangulate: true,
                ignore_lines: true,
                ignore_points: true,
                ..Default::default()
            },
            |mtl_path| {
                let bytes = source
                    .read(&base.join(mtl_path))
                    .map_err(|_| tobj::LoadError::OpenFileFailed)?;
                tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(bytes)))
            },
        )
        .map_err(|e| Error::ModelNotFound(format!("{}: {}", path.display(), e)))?;

        let materials = materials.unwrap_or_else(|e| {
            engine_warn!("lumen::resource", "Materials of '{}' not loaded: {}", path.display(), e);
            Vec::new()
        });

        let meshes = models
            .into_iter()
            .map(|model| {
                let mesh = model.mesh;
                let vertex_count = mesh.positions.len() / 3;
                let vertices = (0..vertex_count)
                    .map(|i| {
                        let position = [mesh.positions[3 * i], mesh.positions[3 * i + 1], mesh.positions[3 * i + 2]];
                        let normal = if mesh.normals.len() >= 3 * (i + 1) {
                            [mesh.normals[3 * i], mesh.normals[3 * i + 1], mesh.normals[3 * i + 2]]
                        } else {
                            [0.0, 0.0, 0.0]
                        };
                        // OBJ texture space has V pointing up
                        let uv = if mesh.texcoords.len() >= 2 * (i + 1) {
                            [mesh.texcoords[2 * i], 1.0 - mesh.texcoords[2 * i + 1]]
                        } else {
                            [0.0, 0.0]
                        };
                        Vertex::new(position, normal, uv)
                    })
                    .collect();

                let material = mesh.material_id.and_then(|id| materials.get(id));
                MeshData {
                    name: model.name,
                    vertices,
                    indices: mesh.indices,
                    diffuse_texture: material
                        .and_then(|m| m.diffuse_texture.as_ref())
                        .map(PathBuf::from),
                    specular_texture: material
                        .and_then(|m| m.specular_texture.as_ref())
                        .map(PathBuf::from),
                }
            })
            .collect();

        Ok(ModelData { meshes })
    }
}

#[cfg(test)]
#[path = "asset_loader_tests.rs"]
pub(crate) mod tests;
