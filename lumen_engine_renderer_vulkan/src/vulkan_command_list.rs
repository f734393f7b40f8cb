/// CommandList - Vulkan implementation of the CommandList trait
///
/// One per frame slot. The device points it at the acquired swapchain
/// image's framebuffer before the frame is recorded.

use ash::vk;
use lumen_engine::lumen::device::{
    Buffer as GpuBuffer, ClearValue, CommandList as GpuCommandList, IndexType, PolygonMode,
    Program as GpuProgram, Rect2D, Texture as GpuTexture, Viewport,
};
use lumen_engine::lumen::{Error, Result};
use lumen_engine::engine_error;
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::index_type_to_vk;
use crate::vulkan_program::Program;
use crate::vulkan_texture::Texture;

/// Stages that see the per-draw push constants
pub(crate) const PUSH_CONSTANT_STAGES: vk::ShaderStageFlags =
    vk::ShaderStageFlags::from_raw(vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw());

/// Framebuffer a frame renders into
#[derive(Debug, Clone, Copy)]
pub(crate) struct RenderTarget {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
}

pub struct CommandList {
    ctx: Arc<GpuContext>,
    slot: usize,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    pipeline_layout: vk::PipelineLayout,
    target: Option<RenderTarget>,
    is_recording: bool,
    in_render_pass: bool,
    program_bound: bool,
}

impl CommandList {
    pub fn new(ctx: Arc<GpuContext>, slot: usize, pipeline_layout: vk::PipelineLayout) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let command_pool = ctx.device.create_command_pool(&pool_info, None).map_err(|e| {
                engine_error!("lumen::vulkan", "Failed to create command pool: {:?}", e);
                Error::InitializationFailed(format!("Failed to create command pool: {:?}", e))
            })?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffers = match ctx.device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) => buffers,
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    engine_error!("lumen::vulkan", "Failed to allocate command buffer: {:?}", e);
                    return Err(Error::InitializationFailed(format!("Failed to allocate command buffer: {:?}", e)));
                }
            };

            Ok(Self {
                ctx,
                slot,
                command_pool,
                command_buffer: command_buffers[0],
                pipeline_layout,
                target: None,
                is_recording: false,
                in_render_pass: false,
                program_bound: false,
            })
        }
    }

    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Framebuffer of the next render pass; `None` makes `begin_render_pass` fail
    pub(crate) fn set_target(&mut self, target: Option<RenderTarget>) {
        self.target = target;
    }

    /// Reset the command buffer; the slot fence must already be signaled
    pub(crate) fn reset(&mut self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| Error::BackendError(format!("Failed to reset command buffer: {:?}", e)))?;
        }
        self.is_recording = false;
        self.in_render_pass = false;
        self.program_bound = false;
        Ok(())
    }

    fn require_recording(&self) -> Result<()> {
        if !self.is_recording {
            return Err(Error::BackendError("Command list not recording".to_string()));
        }
        Ok(())
    }

    fn require_render_pass(&self) -> Result<()> {
        self.require_recording()?;
        if !self.in_render_pass {
            return Err(Error::BackendError("No render pass in progress".to_string()));
        }
        Ok(())
    }

    fn require_program(&self) -> Result<()> {
        self.require_render_pass()?;
        if !self.program_bound {
            return Err(Error::BackendError("No program bound".to_string()));
        }
        Ok(())
    }
}

/// Downcast a backend object to its Vulkan type
fn downcast<'a, T: 'static>(object: &'a dyn std::any::Any, what: &str) -> Result<&'a T> {
    object
        .downcast_ref::<T>()
        .ok_or_else(|| Error::InvalidResource(format!("{} was not created by the Vulkan device", what)))
}

impl GpuCommandList for CommandList {
    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            return Err(Error::BackendError("Command list already recording".to_string()));
        }

        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.ctx
                .device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| Error::BackendError(format!("Failed to begin command buffer: {:?}", e)))?;
        }

        self.is_recording = true;
        self.in_render_pass = false;
        self.program_bound = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(Error::BackendError("Render pass not ended before ending command list".to_string()));
        }

        unsafe {
            self.ctx
                .device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| Error::BackendError(format!("Failed to end command buffer: {:?}", e)))?;
        }
        self.is_recording = false;
        Ok(())
    }

    fn begin_render_pass(&mut self, clear_values: &[ClearValue]) -> Result<()> {
        self.require_recording()?;
        if self.in_render_pass {
            return Err(Error::BackendError("Already inside a render pass".to_string()));
        }
        let target = self
            .target
            .ok_or_else(|| Error::BackendError("Command list has no render target".to_string()))?;

        let vk_clear_values: Vec<vk::ClearValue> = clear_values
            .iter()
            .map(|value| match *value {
                ClearValue::Color(color) => vk::ClearValue {
                    color: vk::ClearColorValue { float32: color },
                },
                ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
                },
            })
            .collect();

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(target.render_pass)
            .framebuffer(target.framebuffer)
            .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: target.extent })
            .clear_values(&vk_clear_values);

        unsafe {
            self.ctx
                .device
                .cmd_begin_render_pass(self.command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.require_render_pass()?;
        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }
        self.in_render_pass = false;
        self.program_bound = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.require_recording()?;
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.require_recording()?;
        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn bind_program(&mut self, program: &Arc<dyn GpuProgram>, mode: PolygonMode) -> Result<()> {
        self.require_render_pass()?;
        let program = downcast::<Program>(program.as_any(), "Program")?;
        let uniform_set = program.prepare_uniforms(self.slot)?;

        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                program.pipeline(mode == PolygonMode::Line),
            );
            if let Some(set) = uniform_set {
                self.ctx.device.cmd_bind_descriptor_sets(
                    self.command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.pipeline_layout,
                    0,
                    &[set],
                    &[],
                );
            }
        }
        self.program_bound = true;
        Ok(())
    }

    fn bind_textures(&mut self, diffuse: &Arc<dyn GpuTexture>, specular: &Arc<dyn GpuTexture>) -> Result<()> {
        self.require_program()?;
        let diffuse = downcast::<Texture>(diffuse.as_any(), "Diffuse texture")?;
        let specular = downcast::<Texture>(specular.as_any(), "Specular texture")?;

        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                1,
                &[diffuse.descriptor_set, specular.descriptor_set],
                &[],
            );
        }
        Ok(())
    }

    fn push_constants(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        self.require_program()?;
        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                self.pipeline_layout,
                PUSH_CONSTANT_STAGES,
                offset,
                data,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn GpuBuffer>, offset: u64) -> Result<()> {
        self.require_recording()?;
        let buffer = downcast::<Buffer>(buffer.as_any(), "Vertex buffer")?;
        unsafe {
            self.ctx
                .device
                .cmd_bind_vertex_buffers(self.command_buffer, 0, &[buffer.buffer], &[offset]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn GpuBuffer>, offset: u64, index_type: IndexType) -> Result<()> {
        self.require_recording()?;
        let buffer = downcast::<Buffer>(buffer.as_any(), "Index buffer")?;
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                buffer.buffer,
                offset,
                index_type_to_vk(index_type),
            );
        }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.require_program()?;
        unsafe {
            self.ctx
                .device
                .cmd_draw_indexed(self.command_buffer, index_count, 1, first_index, vertex_offset, 0);
        }
        Ok(())
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees its command buffer
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
