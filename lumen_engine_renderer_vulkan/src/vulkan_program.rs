/// Program - Vulkan implementation of the Program trait
///
/// A program is a pair of graphics pipelines (fill and, when the device
/// supports it, line rasterization) built from SPIR-V stages against the
/// device's shared render pass and pipeline layout.
///
/// Uniforms live in the block bound at set 0, binding 0. Its layout is
/// reflected from the SPIR-V with spirq. `set_uniform` writes into a CPU
/// copy of the block; the copy is flushed into the slot's own uniform
/// buffer when the program is bound for that slot, so a buffer is never
/// written while the GPU may still read it.

use ash::vk;
use lumen_engine::lumen::device::{
    Buffer as GpuBuffer, BufferDesc, BufferUsage, Program as GpuProgram, ProgramDesc, ShaderStage,
    ShaderStageFlags, UniformValue,
};
use lumen_engine::lumen::resource::Vertex;
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_debug, engine_err};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::ffi::CString;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::shader_stage_to_vk;

const SPIRV_MAGIC: u32 = 0x0723_0203;

// ===== SPIR-V =====

/// Reinterpret SPIR-V bytes as words, rejecting anything that is not SPIR-V
pub fn spirv_words(code: &[u8], label: &str) -> Result<Vec<u32>> {
    if code.is_empty() || code.len() % 4 != 0 {
        return Err(Error::ShaderCompilationFailed(format!(
            "{}: SPIR-V size {} is not a non-zero multiple of 4",
            label,
            code.len()
        )));
    }
    let words: Vec<u32> = code
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    if words[0] != SPIRV_MAGIC {
        return Err(Error::ShaderCompilationFailed(format!(
            "{}: not a SPIR-V module (magic {:#010x})",
            label, words[0]
        )));
    }
    Ok(words)
}

// ===== UNIFORM LAYOUT =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformMember {
    pub offset: usize,
    pub size: usize,
}

/// Reflected layout of the set 0, binding 0 uniform block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformLayout {
    pub size: usize,
    pub members: FxHashMap<String, UniformMember>,
}

impl UniformLayout {
    /// Union of two stages' views of the same block
    pub fn merge(mut self, other: UniformLayout) -> UniformLayout {
        self.size = self.size.max(other.size);
        for (name, member) in other.members {
            self.members.entry(name).or_insert(member);
        }
        self
    }

    /// Write `value` into `block` at the member's offset
    pub fn write(&self, block: &mut [u8], name: &str, value: &UniformValue) -> Result<()> {
        let member = self
            .members
            .get(name)
            .ok_or_else(|| Error::InvalidResource(format!("Unknown uniform '{}'", name)))?;
        let bytes = value.to_bytes();
        if bytes.len() != member.size {
            return Err(Error::InvalidResource(format!(
                "Uniform '{}' is {} bytes, value is {} bytes",
                name,
                member.size,
                bytes.len()
            )));
        }
        let end = member.offset + bytes.len();
        if end > block.len() {
            return Err(Error::InvalidResource(format!("Uniform '{}' lies outside its block", name)));
        }
        block[member.offset..end].copy_from_slice(&bytes);
        Ok(())
    }
}

/// Find the uniform block at set 0, binding 0
pub fn reflect_uniform_block(words: &[u32], label: &str) -> Result<Option<UniformLayout>> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(words)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| Error::ShaderCompilationFailed(format!("{}: SPIR-V reflection failed: {:?}", label, e)))?;

    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            let spirq::var::Variable::Descriptor { desc_bind, desc_ty, ty, .. } = var else {
                continue;
            };
            if desc_bind.set() != 0 || desc_bind.bind() != 0 {
                continue;
            }
            if !matches!(desc_ty, spirq::ty::DescriptorType::UniformBuffer()) {
                continue;
            }
            let spirq::ty::Type::Struct(st) = ty else {
                continue;
            };

            let mut layout = UniformLayout { size: ty.nbyte().unwrap_or(0), members: FxHashMap::default() };
            for member in &st.members {
                let (Some(name), Some(offset), Some(size)) = (&member.name, member.offset, member.ty.nbyte()) else {
                    continue;
                };
                layout.members.insert(name.clone(), UniformMember { offset, size });
            }
            return Ok(Some(layout));
        }
    }
    Ok(None)
}

// ===== UNIFORM BLOCK =====

struct UniformBlock {
    layout: UniformLayout,
    data: Mutex<Vec<u8>>,
    /// One buffer and descriptor set per frame slot
    buffers: Vec<Buffer>,
    sets: Vec<(vk::DescriptorPool, vk::DescriptorSet)>,
}

// ===== PROGRAM =====

/// Shared objects a program is built against
pub struct PipelineTarget {
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub line_mode: bool,
    pub frames_in_flight: usize,
}

pub struct Program {
    ctx: Arc<GpuContext>,
    label: String,
    stages: ShaderStageFlags,
    pub(crate) fill_pipeline: vk::Pipeline,
    pub(crate) line_pipeline: Option<vk::Pipeline>,
    uniforms: Option<UniformBlock>,
}

impl Program {
    pub fn new(ctx: Arc<GpuContext>, desc: &ProgramDesc, target: &PipelineTarget) -> Result<Self> {
        let stages = desc.stage_flags();
        if !stages.contains(ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT) {
            return Err(Error::ShaderCompilationFailed(format!(
                "{}: vertex and fragment stages are required",
                desc.label
            )));
        }

        let mut modules: Vec<(ShaderStage, vk::ShaderModule, CString)> = Vec::new();
        let compiled = Self::compile_stages(&ctx, desc, &mut modules);

        let pipelines = compiled.as_ref().map_err(Clone::clone).and_then(|_| {
            let fill = create_pipeline(&ctx, &desc.label, &modules, target, vk::PolygonMode::FILL)?;
            if !target.line_mode {
                return Ok((fill, None));
            }
            match create_pipeline(&ctx, &desc.label, &modules, target, vk::PolygonMode::LINE) {
                Ok(line) => Ok((fill, Some(line))),
                Err(e) => {
                    unsafe { ctx.device.destroy_pipeline(fill, None) };
                    Err(e)
                }
            }
        });

        for (_, module, _) in &modules {
            unsafe { ctx.device.destroy_shader_module(*module, None) };
        }
        let (fill_pipeline, line_pipeline) = pipelines?;
        let layout = compiled?;

        let mut program = Self {
            ctx: Arc::clone(&ctx),
            label: desc.label.clone(),
            stages,
            fill_pipeline,
            line_pipeline,
            uniforms: None,
        };
        if let Some(layout) = layout.filter(|l| l.size > 0) {
            program.uniforms = Some(Self::create_uniform_block(&ctx, layout, target.frames_in_flight)?);
        }

        engine_debug!(
            "lumen::vulkan",
            "Program '{}' created ({} uniform bytes)",
            program.label,
            program.uniforms.as_ref().map_or(0, |u| u.layout.size)
        );
        Ok(program)
    }

    /// Create one shader module per stage and merge the stages' uniform layouts
    ///
    /// Modules created before a failure are left in `modules` for the caller
    /// to destroy.
    fn compile_stages(
        ctx: &GpuContext,
        desc: &ProgramDesc,
        modules: &mut Vec<(ShaderStage, vk::ShaderModule, CString)>,
    ) -> Result<Option<UniformLayout>> {
        let mut layout: Option<UniformLayout> = None;
        for source in &desc.stages {
            let words = spirv_words(&source.code, &desc.label)?;
            if let Some(block) = reflect_uniform_block(&words, &desc.label)? {
                layout = Some(match layout.take() {
                    Some(existing) => existing.merge(block),
                    None => block,
                });
            }
            let entry_point = CString::new(source.entry_point.as_str())
                .map_err(|_| Error::ShaderCompilationFailed(format!("{}: invalid entry point name", desc.label)))?;
            let module_info = vk::ShaderModuleCreateInfo::default().code(&words);
            let module = unsafe { ctx.device.create_shader_module(&module_info, None) }.map_err(|e| {
                Error::ShaderCompilationFailed(format!("{}: shader module rejected: {:?}", desc.label, e))
            })?;
            modules.push((source.stage, module, entry_point));
        }
        Ok(layout)
    }

    fn create_uniform_block(ctx: &Arc<GpuContext>, layout: UniformLayout, slots: usize) -> Result<UniformBlock> {
        let data = vec![0u8; layout.size];
        let mut buffers = Vec::with_capacity(slots);
        let mut sets = Vec::with_capacity(slots);

        for _ in 0..slots {
            match Self::create_uniform_slot(ctx, &data) {
                Ok((buffer, set)) => {
                    buffers.push(buffer);
                    sets.push(set);
                }
                Err(e) => {
                    for &(pool, set) in &sets {
                        ctx.free_descriptor_set(pool, set);
                    }
                    return Err(e);
                }
            }
        }
        Ok(UniformBlock { layout, data: Mutex::new(data), buffers, sets })
    }

    fn create_uniform_slot(
        ctx: &Arc<GpuContext>,
        data: &[u8],
    ) -> Result<(Buffer, (vk::DescriptorPool, vk::DescriptorSet))> {
        let desc = BufferDesc { size: data.len() as u64, usage: BufferUsage::Uniform };
        let buffer = Buffer::new(Arc::clone(ctx), &desc, data)?;
        let (pool, set) = ctx.allocate_descriptor_set(ctx.uniform_set_layout)?;

        let buffer_info = [vk::DescriptorBufferInfo { buffer: buffer.buffer, offset: 0, range: vk::WHOLE_SIZE }];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info);
        unsafe { ctx.device.update_descriptor_sets(&[write], &[]) };
        Ok((buffer, (pool, set)))
    }

    /// Pipeline for a rasterization mode, falling back to fill
    pub(crate) fn pipeline(&self, line: bool) -> vk::Pipeline {
        match (line, self.line_pipeline) {
            (true, Some(pipeline)) => pipeline,
            _ => self.fill_pipeline,
        }
    }

    /// Flush the uniform copy into the slot's buffer and return its descriptor set
    pub(crate) fn prepare_uniforms(&self, slot: usize) -> Result<Option<vk::DescriptorSet>> {
        let Some(block) = &self.uniforms else {
            return Ok(None);
        };
        let buffer = block
            .buffers
            .get(slot)
            .ok_or_else(|| engine_err!("lumen::vulkan", "Program '{}' has no uniform buffer for slot {}", self.label, slot))?;
        let data = block
            .data
            .lock()
            .map_err(|_| engine_err!("lumen::vulkan", "Uniform block mutex poisoned"))?;
        buffer.update(0, &data)?;
        Ok(Some(block.sets[slot].1))
    }
}

impl GpuProgram for Program {
    fn stages(&self) -> ShaderStageFlags {
        self.stages
    }

    fn set_uniform(&self, name: &str, value: &UniformValue) -> Result<()> {
        let Some(block) = &self.uniforms else {
            return Err(Error::InvalidResource(format!(
                "Program '{}' has no uniform block (uniform '{}')",
                self.label, name
            )));
        };
        let mut data = block
            .data
            .lock()
            .map_err(|_| engine_err!("lumen::vulkan", "Uniform block mutex poisoned"))?;
        block.layout.write(&mut data, name, value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.fill_pipeline, None);
            if let Some(line) = self.line_pipeline {
                self.ctx.device.destroy_pipeline(line, None);
            }
        }
        if let Some(block) = &self.uniforms {
            for &(pool, set) in &block.sets {
                self.ctx.free_descriptor_set(pool, set);
            }
        }
    }
}

// ===== PIPELINE =====

fn create_pipeline(
    ctx: &GpuContext,
    label: &str,
    modules: &[(ShaderStage, vk::ShaderModule, CString)],
    target: &PipelineTarget,
    polygon_mode: vk::PolygonMode,
) -> Result<vk::Pipeline> {
    let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = modules
        .iter()
        .map(|(stage, module, entry_point)| {
            vk::PipelineShaderStageCreateInfo::default()
                .stage(shader_stage_to_vk(*stage))
                .module(*module)
                .name(entry_point)
        })
        .collect();

    // Vertex layout: position, normal, uv
    let vertex_bindings = [vk::VertexInputBindingDescription {
        binding: 0,
        stride: std::mem::size_of::<Vertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }];
    let attribute = |location, format, offset: usize| vk::VertexInputAttributeDescription {
        location,
        binding: 0,
        format,
        offset: offset as u32,
    };
    let vertex_attributes = [
        attribute(0, vk::Format::R32G32B32_SFLOAT, bytemuck::offset_of!(Vertex, position)),
        attribute(1, vk::Format::R32G32B32_SFLOAT, bytemuck::offset_of!(Vertex, normal)),
        attribute(2, vk::Format::R32G32_SFLOAT, bytemuck::offset_of!(Vertex, uv)),
    ];
    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&vertex_bindings)
        .vertex_attribute_descriptions(&vertex_attributes);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    // Viewport and scissor are dynamic
    let viewports = [vk::Viewport::default()];
    let scissors = [vk::Rect2D::default()];
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewports(&viewports)
        .scissors(&scissors);

    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(polygon_mode)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false);

    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(true)
        .depth_write_enable(true)
        .depth_compare_op(vk::CompareOp::LESS)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false);
    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(std::slice::from_ref(&color_blend_attachment));

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let create_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .depth_stencil_state(&depth_stencil_state)
        .multisample_state(&multisample_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(target.layout)
        .render_pass(target.render_pass)
        .subpass(0);

    let pipelines = unsafe {
        ctx.device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
    }
    .map_err(|(_, e)| Error::ShaderCompilationFailed(format!("{}: pipeline creation failed: {:?}", label, e)))?;

    Ok(pipelines[0])
}

#[cfg(test)]
#[path = "vulkan_program_tests.rs"]
mod tests;
