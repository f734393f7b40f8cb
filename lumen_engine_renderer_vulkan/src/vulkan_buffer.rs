/// Buffer - Vulkan implementation of the Buffer trait
///
/// Host-visible memory, written through the persistent mapping.

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use lumen_engine::lumen::device::{Buffer as GpuBuffer, BufferDesc};
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_err, engine_error};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::buffer_usage_to_vk;

pub struct Buffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
}

impl Buffer {
    /// Create a buffer and fill it with `data`
    pub fn new(ctx: Arc<GpuContext>, desc: &BufferDesc, data: &[u8]) -> Result<Self> {
        Self::with_usage(ctx, desc.size, buffer_usage_to_vk(desc.usage), data)
    }

    /// Transfer source holding `data`, for image uploads
    pub(crate) fn staging(ctx: Arc<GpuContext>, data: &[u8]) -> Result<Self> {
        Self::with_usage(ctx, data.len() as u64, vk::BufferUsageFlags::TRANSFER_SRC, data)
    }

    fn with_usage(ctx: Arc<GpuContext>, size: u64, usage: vk::BufferUsageFlags, data: &[u8]) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidResource("Buffer size must be greater than zero".to_string()));
        }
        if data.len() as u64 > size {
            return Err(Error::InvalidResource(format!(
                "Initial data ({} bytes) exceeds buffer size ({} bytes)",
                data.len(),
                size
            )));
        }

        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| engine_err!("lumen::vulkan", "Failed to create buffer of {} bytes: {:?}", size, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = match ctx.allocate("buffer", requirements, MemoryLocation::CpuToGpu, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                ctx.free(allocation);
                ctx.device.destroy_buffer(buffer, None);
                return Err(engine_err!("lumen::vulkan", "Failed to bind buffer memory: {:?}", e));
            }

            let buffer = Self { ctx, buffer, allocation: Some(allocation), size };
            if !data.is_empty() {
                buffer.update(0, data)?;
            }
            Ok(buffer)
        }
    }
}

impl GpuBuffer for Buffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if offset + data.len() as u64 > self.size {
            return Err(Error::InvalidResource(format!(
                "Buffer update out of range: offset {} + {} bytes > {}",
                offset,
                data.len(),
                self.size
            )));
        }

        let Some(allocation) = &self.allocation else {
            engine_error!("lumen::vulkan", "Buffer update failed: no GPU allocation");
            return Err(Error::BackendError("Buffer has no allocation".to_string()));
        };

        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::BackendError("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe {
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
