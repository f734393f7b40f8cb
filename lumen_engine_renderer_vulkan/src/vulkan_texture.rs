/// Texture - Vulkan implementation of the Texture trait
///
/// A sampled 2D image uploaded once through a staging buffer, with its own
/// descriptor set (one combined image sampler) ready to bind at set 1 or 2.

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use lumen_engine::lumen::device::{Texture as GpuTexture, TextureDesc, TextureInfo};
use lumen_engine::lumen::Result;
use lumen_engine::engine_err;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::texture_format_to_vk;

// ===== GPU IMAGE =====

/// Image, view and memory, destroyed together
pub(crate) struct GpuImage {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
}

impl GpuImage {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        name: &str,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect_mask: vk::ImageAspectFlags,
    ) -> Result<Self> {
        unsafe {
            let image_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D { width: extent.width, height: extent.height, depth: 1 })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx
                .device
                .create_image(&image_info, None)
                .map_err(|e| engine_err!("lumen::vulkan", "Failed to create image '{}': {:?}", name, e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = match ctx.allocate(name, requirements, MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            // From here on Drop cleans up whatever was created
            let mut gpu_image = Self { ctx, image, view: vk::ImageView::null(), allocation: Some(allocation) };

            if let Some(allocation) = &gpu_image.allocation {
                gpu_image
                    .ctx
                    .device
                    .bind_image_memory(image, allocation.memory(), allocation.offset())
                    .map_err(|e| engine_err!("lumen::vulkan", "Failed to bind memory of '{}': {:?}", name, e))?;
            }

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(subresource_range(aspect_mask));

            gpu_image.view = gpu_image
                .ctx
                .device
                .create_image_view(&view_info, None)
                .map_err(|e| engine_err!("lumen::vulkan", "Failed to create view of '{}': {:?}", name, e))?;

            Ok(gpu_image)
        }
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }
            if let Some(allocation) = self.allocation.take() {
                self.ctx.free(allocation);
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}

pub(crate) fn subresource_range(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

// ===== TEXTURE =====

pub struct Texture {
    ctx: Arc<GpuContext>,
    /// Destroyed after the descriptor set is freed
    _image: GpuImage,
    descriptor_pool: vk::DescriptorPool,
    pub(crate) descriptor_set: vk::DescriptorSet,
    info: TextureInfo,
}

impl Texture {
    /// Create the image, upload `desc.data` and write its descriptor set
    pub fn new(ctx: Arc<GpuContext>, desc: TextureDesc) -> Result<Self> {
        desc.validate()?;

        let format = texture_format_to_vk(desc.format);
        let extent = vk::Extent2D { width: desc.width, height: desc.height };
        let image = GpuImage::new(
            Arc::clone(&ctx),
            &desc.label,
            extent,
            format,
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            vk::ImageAspectFlags::COLOR,
        )?;

        Self::upload(&ctx, image.image, extent, &desc.data)?;

        let (descriptor_pool, descriptor_set) = ctx.allocate_descriptor_set(ctx.texture_set_layout)?;
        let image_info = [vk::DescriptorImageInfo {
            sampler: ctx.sampler,
            image_view: image.view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(descriptor_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info);
        unsafe {
            ctx.device.update_descriptor_sets(&[write], &[]);
        }

        Ok(Self {
            ctx,
            _image: image,
            descriptor_pool,
            descriptor_set,
            info: TextureInfo { width: desc.width, height: desc.height, format: desc.format },
        })
    }

    /// Copy pixels into the image, leaving it in SHADER_READ_ONLY_OPTIMAL
    fn upload(ctx: &Arc<GpuContext>, image: vk::Image, extent: vk::Extent2D, data: &[u8]) -> Result<()> {
        let staging = Buffer::staging(Arc::clone(ctx), data)?;
        let device = &ctx.device;
        let range = subresource_range(vk::ImageAspectFlags::COLOR);

        ctx.one_shot(|command_buffer| unsafe {
            let to_transfer = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(range)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );

            let region = vk::BufferImageCopy::default()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_extent(vk::Extent3D { width: extent.width, height: extent.height, depth: 1 });
            device.cmd_copy_buffer_to_image(
                command_buffer,
                staging.buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            let to_shader = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(range)
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ);
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader],
            );
        })
    }
}

impl GpuTexture for Texture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.ctx.free_descriptor_set(self.descriptor_pool, self.descriptor_set);
    }
}
