/// Shader programs with a uniform cache
///
/// The cache remembers the last value written to every uniform so a rebuilt
/// program (hot-reload) can be brought back to the same state.

use std::path::PathBuf;
use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::graphics_device::{Program as GpuProgram, ShaderStage, UniformValue};

/// One stage of a program, by source path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderStagePath {
    pub stage: ShaderStage,
    pub path: PathBuf,
}

/// Descriptor for creating a shader program from files
#[derive(Debug, Clone)]
pub struct ShaderProgramDesc {
    pub label: String,
    pub stages: Vec<ShaderStagePath>,
    /// Rebuild the program when one of its sources changes
    pub hot_reload: bool,
}

impl ShaderProgramDesc {
    /// Vertex + fragment program
    pub fn new(label: impl Into<String>, vertex: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            stages: vec![
                ShaderStagePath { stage: ShaderStage::Vertex, path: vertex.into() },
                ShaderStagePath { stage: ShaderStage::Fragment, path: fragment.into() },
            ],
            hot_reload: true,
        }
    }

    /// Add a geometry stage
    pub fn with_geometry(mut self, geometry: impl Into<PathBuf>) -> Self {
        self.stages.push(ShaderStagePath { stage: ShaderStage::Geometry, path: geometry.into() });
        self
    }
}

/// Compiled program plus its source paths and uniform cache
pub struct ShaderProgram {
    pub(crate) label: String,
    /// Canonical stage paths
    pub(crate) stages: Vec<ShaderStagePath>,
    pub(crate) gpu: Arc<dyn GpuProgram>,
    pub(crate) uniforms: FxHashMap<String, UniformValue>,
    /// Number of successful rebuilds
    pub(crate) generation: u32,
    pub(crate) hot_reload: bool,
}

impl ShaderProgram {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stages(&self) -> &[ShaderStagePath] {
        &self.stages
    }

    pub fn gpu(&self) -> &Arc<dyn GpuProgram> {
        &self.gpu
    }

    /// Last value written to a uniform
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    pub fn uniform_count(&self) -> usize {
        self.uniforms.len()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn hot_reload(&self) -> bool {
        self.hot_reload
    }
}
