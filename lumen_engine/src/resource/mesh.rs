/// Mesh types
///
/// A mesh is immutable vertex/index data uploaded once to GPU buffers, plus
/// up to two texture references. Each texture reference says whether the
/// mesh owns the texture (released together with the mesh) or merely shares
/// a texture held by someone else.

use std::path::PathBuf;
use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use crate::error::{Error, Result};
use crate::graphics_device::Buffer;
use crate::resource::TextureId;

// ===== VERTEX =====

/// Interleaved vertex layout used by every mesh
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }
}

/// Per-draw push constant block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DrawConstants {
    pub model: Mat4,
    pub view_projection: Mat4,
}

// ===== TEXTURE REFERENCES =====

/// Who releases a texture referenced by a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureOwnership {
    /// Released together with the mesh
    Owned,
    /// Held elsewhere; the mesh never releases it
    Shared,
}

/// Texture reference of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshTexture {
    pub texture: TextureId,
    pub ownership: TextureOwnership,
}

impl MeshTexture {
    pub fn owned(texture: TextureId) -> Self {
        Self { texture, ownership: TextureOwnership::Owned }
    }

    pub fn shared(texture: TextureId) -> Self {
        Self { texture, ownership: TextureOwnership::Shared }
    }
}

// ===== DESCRIPTOR =====

/// Data for creating a mesh
#[derive(Debug, Clone, Default)]
pub struct MeshDesc {
    pub label: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub diffuse: Option<MeshTexture>,
    pub specular: Option<MeshTexture>,
}

impl MeshDesc {
    /// Check that the geometry is a drawable triangle list
    pub fn validate(&self) -> Result<()> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(Error::InvalidResource(format!("Mesh '{}' has no geometry", self.label)));
        }
        if self.indices.len() % 3 != 0 {
            return Err(Error::InvalidResource(format!(
                "Mesh '{}' index count {} is not a multiple of 3",
                self.label,
                self.indices.len()
            )));
        }
        let vertex_count = self.vertices.len() as u32;
        if let Some(bad) = self.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(Error::InvalidResource(format!(
                "Mesh '{}' index {} out of range ({} vertices)",
                self.label, bad, vertex_count
            )));
        }
        Ok(())
    }
}

// ===== MESH =====

/// Axis-aligned bounds in model space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn from_vertices(vertices: &[Vertex]) -> Self {
        vertices.iter().fold(
            Bounds { min: Vec3::splat(f32::MAX), max: Vec3::splat(f32::MIN) },
            |b, v| {
                let p = Vec3::from(v.position);
                Bounds { min: b.min.min(p), max: b.max.max(p) }
            },
        )
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// GPU-resident mesh
pub struct Mesh {
    pub(crate) label: String,
    /// Canonical source path for meshes loaded from a file
    pub(crate) path: Option<PathBuf>,
    pub(crate) vertex_buffer: Arc<dyn Buffer>,
    pub(crate) index_buffer: Arc<dyn Buffer>,
    pub(crate) vertex_count: u32,
    pub(crate) index_count: u32,
    pub(crate) bounds: Bounds,
    pub(crate) diffuse: Option<MeshTexture>,
    pub(crate) specular: Option<MeshTexture>,
    pub(crate) in_use: u32,
}

impl Mesh {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn diffuse(&self) -> Option<MeshTexture> {
        self.diffuse
    }

    pub fn specular(&self) -> Option<MeshTexture> {
        self.specular
    }

    /// Reference count
    pub fn in_use(&self) -> u32 {
        self.in_use
    }

    pub fn vertex_buffer(&self) -> &Arc<dyn Buffer> {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &Arc<dyn Buffer> {
        &self.index_buffer
    }
}
