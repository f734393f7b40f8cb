/// Program trait, shader stages and uniform values

use std::any::Any;
use bitflags::bitflags;
use glam::{Mat4, Vec2, Vec3, Vec4};
use crate::error::Result;

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
}

impl ShaderStage {
    pub fn flag(self) -> ShaderStageFlags {
        match self {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => ShaderStageFlags::FRAGMENT,
            ShaderStage::Geometry => ShaderStageFlags::GEOMETRY,
        }
    }
}

bitflags! {
    /// Set of shader stages
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const GEOMETRY = 1 << 2;
    }
}

/// One stage of a program, as compiled bytecode
#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub stage: ShaderStage,
    /// Compiled stage code (SPIR-V for the Vulkan backend)
    pub code: Vec<u8>,
    pub entry_point: String,
}

/// Descriptor for creating a program
#[derive(Debug, Clone)]
pub struct ProgramDesc {
    /// Debug label
    pub label: String,
    /// Stages, at least a vertex and a fragment stage
    pub stages: Vec<ShaderSource>,
}

impl ProgramDesc {
    /// Union of the stages in this program
    pub fn stage_flags(&self) -> ShaderStageFlags {
        self.stages
            .iter()
            .fold(ShaderStageFlags::empty(), |acc, s| acc | s.stage.flag())
    }
}

/// A uniform value cached by a program
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    /// Raw bytes in std140 scalar layout
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::Float(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Int(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec2(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec3(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec4(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Mat4(v) => bytemuck::bytes_of(v).to_vec(),
        }
    }
}

/// Compiled and linked GPU program
///
/// Uniform writes go through `&self`; backends keep the CPU copy behind a
/// lock and upload it when the program is bound.
pub trait Program: Send + Sync + Any {
    /// Stages this program was built from
    fn stages(&self) -> ShaderStageFlags;

    /// Write a uniform by name
    ///
    /// Unknown names are an `Error::InvalidResource`.
    fn set_uniform(&self, name: &str, value: &UniformValue) -> Result<()>;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}
