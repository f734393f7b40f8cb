/// GpuContext - Shared GPU state for every Vulkan resource
///
/// Buffers, textures, programs and the swapchain keep an `Arc<GpuContext>`
/// so they can allocate memory, record one-shot uploads and allocate
/// descriptor sets without a back-reference to the device.
///
/// Device and instance destruction is handled by `VulkanGraphicsDevice::drop`
/// once every resource holding the context has been released.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_debug, engine_err, engine_error};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

/// Descriptor sets per pool before a new pool is created
const SETS_PER_POOL: u32 = 256;

pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator
    ///
    /// Wrapped in ManuallyDrop so the device owner frees the memory pages
    /// before destroying the device.
    pub allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,

    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,

    /// Reusable pool for one-shot upload command buffers
    pub upload_command_pool: Mutex<vk::CommandPool>,

    /// Descriptor pools, grown on exhaustion
    pub(crate) descriptor_pools: Mutex<Vec<vk::DescriptorPool>>,

    /// Set 0 of every pipeline layout: one uniform block
    pub uniform_set_layout: vk::DescriptorSetLayout,
    /// Sets 1 and 2 of every pipeline layout: one combined image sampler
    pub texture_set_layout: vk::DescriptorSetLayout,
    /// Linear repeat sampler shared by every texture
    pub sampler: vk::Sampler,

    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: ash::Device,
        allocator: Arc<Mutex<Allocator>>,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        upload_command_pool: vk::CommandPool,
        uniform_set_layout: vk::DescriptorSetLayout,
        texture_set_layout: vk::DescriptorSetLayout,
        sampler: vk::Sampler,
        debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
        debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    ) -> Self {
        Self {
            device,
            allocator: ManuallyDrop::new(allocator),
            graphics_queue,
            graphics_queue_family,
            upload_command_pool: Mutex::new(upload_command_pool),
            descriptor_pools: Mutex::new(Vec::new()),
            uniform_set_layout,
            texture_set_layout,
            sampler,
            debug_utils_loader,
            debug_messenger,
        }
    }

    // ===== MEMORY =====

    /// Allocate memory for a buffer or image
    pub fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let mut allocator = self
            .allocator
            .lock()
            .map_err(|_| engine_err!("lumen::vulkan", "GPU allocator mutex poisoned"))?;
        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("lumen::vulkan", "Out of GPU memory for '{}' ({:.2} MB): {}", name, size_mb, e);
                Error::OutOfMemory
            })
    }

    /// Return an allocation to the allocator
    pub fn free(&self, allocation: Allocation) {
        // A poisoned lock leaks the allocation; the handle is still destroyed by the caller
        if let Ok(mut allocator) = self.allocator.lock() {
            if let Err(e) = allocator.free(allocation) {
                engine_error!("lumen::vulkan", "Failed to free GPU allocation: {}", e);
            }
        }
    }

    // ===== DESCRIPTOR SETS =====

    fn create_descriptor_pool(&self) -> Result<vk::DescriptorPool> {
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: SETS_PER_POOL,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: SETS_PER_POOL,
            },
        ];
        let info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .pool_sizes(&pool_sizes)
            .max_sets(SETS_PER_POOL);

        unsafe {
            self.device
                .create_descriptor_pool(&info, None)
                .map_err(|e| engine_err!("lumen::vulkan", "Failed to create descriptor pool: {:?}", e))
        }
    }

    /// Allocate one descriptor set, creating a new pool when the current one is full
    ///
    /// Returns the owning pool with the set so it can be freed later.
    pub fn allocate_descriptor_set(
        &self,
        layout: vk::DescriptorSetLayout,
    ) -> Result<(vk::DescriptorPool, vk::DescriptorSet)> {
        let mut pools = self
            .descriptor_pools
            .lock()
            .map_err(|_| engine_err!("lumen::vulkan", "Descriptor pool mutex poisoned"))?;

        let layouts = [layout];
        if let Some(&pool) = pools.last() {
            let info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&layouts);
            match unsafe { self.device.allocate_descriptor_sets(&info) } {
                Ok(sets) => return Ok((pool, sets[0])),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {}
                Err(e) => {
                    return Err(engine_err!("lumen::vulkan", "Failed to allocate descriptor set: {:?}", e));
                }
            }
        }

        let pool = self.create_descriptor_pool()?;
        pools.push(pool);
        engine_debug!("lumen::vulkan", "Descriptor pool #{} created", pools.len());

        let info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = unsafe { self.device.allocate_descriptor_sets(&info) }
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to allocate descriptor set: {:?}", e))?;
        Ok((pool, sets[0]))
    }

    pub fn free_descriptor_set(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet) {
        unsafe {
            if let Err(e) = self.device.free_descriptor_sets(pool, &[set]) {
                engine_error!("lumen::vulkan", "Failed to free descriptor set: {:?}", e);
            }
        }
    }

    // ===== UPLOADS =====

    /// Record commands into a one-shot command buffer and wait for completion
    pub fn one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let pool = self
            .upload_command_pool
            .lock()
            .map_err(|_| engine_err!("lumen::vulkan", "Upload command pool mutex poisoned"))?;

        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = self
                .device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| engine_err!("lumen::vulkan", "Failed to allocate upload command buffer: {:?}", e))?[0];

            let result = self.submit_and_wait(command_buffer, record);
            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    unsafe fn submit_and_wait<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device
            .begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to begin upload command buffer: {:?}", e))?;

        record(command_buffer);

        self.device
            .end_command_buffer(command_buffer)
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to end upload command buffer: {:?}", e))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        self.device
            .queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to submit upload: {:?}", e))?;
        self.device
            .queue_wait_idle(self.graphics_queue)
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to wait for upload: {:?}", e))
    }
}
