/// Swapchain - Vulkan implementation of the Swapchain trait
///
/// Owns the window surface, the swapchain images with their views, the depth
/// image, one framebuffer per image, and the presentation semaphores:
/// one "image available" per frame slot and one "render finished" per image.

use ash::vk;
use lumen_engine::lumen::device::{
    choose_extent, choose_image_count, choose_present_mode, AcquireOutcome, Extent2D, PresentMode,
    PresentOutcome, Swapchain as GpuSwapchain, TextureFormat,
};
use lumen_engine::lumen::{Error, PresentModePreference, Result};
use lumen_engine::{engine_debug, engine_err, engine_error, engine_info, engine_warn};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    extent_to_vk, present_mode_to_vk, vk_to_extent, vk_to_present_mode, vk_to_surface_capabilities,
    vk_to_texture_format,
};
use crate::vulkan_texture::GpuImage;

/// Format of the depth attachment
pub(crate) const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Surface and the objects the device shares with the swapchain
pub(crate) struct SwapchainSetup {
    pub physical_device: vk::PhysicalDevice,
    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::khr::surface::Instance,
    pub present_queue: vk::Queue,
    /// Graphics and present families when they differ
    pub queue_families: Vec<u32>,
    pub surface_format: vk::SurfaceFormatKHR,
    pub render_pass: vk::RenderPass,
    pub present_preference: PresentModePreference,
    pub frames_in_flight: usize,
}

/// Per-image objects rebuilt on every recreation
#[derive(Default)]
struct ImageSet {
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    depth: Option<GpuImage>,
    framebuffers: Vec<vk::Framebuffer>,
}

pub struct Swapchain {
    ctx: Arc<GpuContext>,
    physical_device: vk::PhysicalDevice,
    present_queue: vk::Queue,
    queue_families: Vec<u32>,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    render_pass: vk::RenderPass,
    image_set: ImageSet,

    /// One per frame slot, signaled by acquire
    image_available_semaphores: Vec<vk::Semaphore>,
    /// One per swapchain image, signaled by submit and waited by present
    render_finished_semaphores: Vec<vk::Semaphore>,
}

impl Swapchain {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        instance: &ash::Instance,
        setup: SwapchainSetup,
        requested: Extent2D,
    ) -> Result<Self> {
        let modes = unsafe {
            setup
                .surface_loader
                .get_physical_device_surface_present_modes(setup.physical_device, setup.surface)
        }
        .map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to query present modes: {:?}", e);
            Error::InitializationFailed(format!("Failed to query present modes: {:?}", e))
        })?;
        let available: Vec<PresentMode> = modes.into_iter().filter_map(vk_to_present_mode).collect();
        let present_mode = present_mode_to_vk(choose_present_mode(&available, setup.present_preference));

        let mut swapchain = Self {
            swapchain_loader: ash::khr::swapchain::Device::new(instance, &ctx.device),
            ctx,
            physical_device: setup.physical_device,
            present_queue: setup.present_queue,
            queue_families: setup.queue_families,
            surface: setup.surface,
            surface_loader: setup.surface_loader,
            swapchain: vk::SwapchainKHR::null(),
            surface_format: setup.surface_format,
            present_mode,
            extent: vk::Extent2D::default(),
            render_pass: setup.render_pass,
            image_set: ImageSet::default(),
            image_available_semaphores: Vec::new(),
            render_finished_semaphores: Vec::new(),
        };

        // From here on Drop releases whatever was created
        for _ in 0..setup.frames_in_flight {
            let semaphore = swapchain.create_semaphore()?;
            swapchain.image_available_semaphores.push(semaphore);
        }
        swapchain.build(requested).map_err(|e| match e {
            Error::InitializationFailed(_) => e,
            other => Error::InitializationFailed(other.to_string()),
        })?;

        engine_info!(
            "lumen::vulkan",
            "Swapchain created: {} images, {}x{}, {:?}, {:?}",
            swapchain.image_set.images.len(),
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.surface_format.format,
            swapchain.present_mode
        );
        Ok(swapchain)
    }

    /// (image available of the slot, render finished of the image)
    pub(crate) fn sync_info(&self, slot: usize, image_index: u32) -> (vk::Semaphore, vk::Semaphore) {
        (
            self.image_available_semaphores[slot],
            self.render_finished_semaphores[image_index as usize],
        )
    }

    pub(crate) fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.image_set.framebuffers.get(image_index as usize).copied()
    }

    pub(crate) fn vk_extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        unsafe { self.ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to create semaphore: {:?}", e))
    }

    /// Create the swapchain for `requested`, replacing the current one
    fn build(&mut self, requested: Extent2D) -> Result<()> {
        let vk_caps = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
        }
        .map_err(|e| engine_err!("lumen::vulkan", "Failed to get surface capabilities: {:?}", e))?;
        let caps = vk_to_surface_capabilities(&vk_caps);

        let extent = choose_extent(&caps, requested);
        if extent.is_zero_area() {
            return Err(Error::SurfaceOutOfDate);
        }
        let extent = extent_to_vk(extent);
        let image_count = choose_image_count(&caps);

        let old_swapchain = self.swapchain;
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(vk_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);
        create_info = if self.queue_families.len() > 1 {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&self.queue_families)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to create swapchain: {:?}", e))?;

        // The old swapchain is retired either way
        self.destroy_image_set();
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;
        self.extent = extent;

        self.image_set.images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to get swapchain images: {:?}", e))?;
        self.create_image_views()?;
        self.image_set.depth = Some(GpuImage::new(
            Arc::clone(&self.ctx),
            "depth",
            extent,
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )?);
        self.create_framebuffers()?;

        let image_count = self.image_set.images.len();
        if self.render_finished_semaphores.len() != image_count {
            engine_debug!(
                "lumen::vulkan",
                "Swapchain image count {} -> {}",
                self.render_finished_semaphores.len(),
                image_count
            );
            self.destroy_render_finished_semaphores();
            for _ in 0..image_count {
                let semaphore = self.create_semaphore()?;
                self.render_finished_semaphores.push(semaphore);
            }
        }
        Ok(())
    }

    fn create_image_views(&mut self) -> Result<()> {
        for &image in &self.image_set.images {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.surface_format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(crate::vulkan_texture::subresource_range(vk::ImageAspectFlags::COLOR));
            let view = unsafe { self.ctx.device.create_image_view(&create_info, None) }
                .map_err(|e| engine_err!("lumen::vulkan", "Failed to create swapchain image view: {:?}", e))?;
            self.image_set.views.push(view);
        }
        Ok(())
    }

    fn create_framebuffers(&mut self) -> Result<()> {
        let depth_view = match &self.image_set.depth {
            Some(depth) => depth.view,
            None => return Err(engine_err!("lumen::vulkan", "Framebuffers need a depth image")),
        };
        for &view in &self.image_set.views {
            let attachments = [view, depth_view];
            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.render_pass)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);
            let framebuffer = unsafe { self.ctx.device.create_framebuffer(&create_info, None) }
                .map_err(|e| engine_err!("lumen::vulkan", "Failed to create framebuffer: {:?}", e))?;
            self.image_set.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    fn destroy_image_set(&mut self) {
        let image_set = std::mem::take(&mut self.image_set);
        unsafe {
            for framebuffer in image_set.framebuffers {
                self.ctx.device.destroy_framebuffer(framebuffer, None);
            }
            for view in image_set.views {
                self.ctx.device.destroy_image_view(view, None);
            }
        }
        // depth image is released with the set
    }

    fn destroy_render_finished_semaphores(&mut self) {
        for semaphore in self.render_finished_semaphores.drain(..) {
            unsafe { self.ctx.device.destroy_semaphore(semaphore, None) };
        }
    }
}

impl GpuSwapchain for Swapchain {
    fn acquire_next_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
        let semaphore = *self
            .image_available_semaphores
            .get(slot)
            .ok_or_else(|| engine_err!("lumen::vulkan", "Frame slot {} out of range", slot))?;

        let result = unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!("lumen::vulkan", "Swapchain out of date during acquire");
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(vk::Result::ERROR_DEVICE_LOST) => {
                engine_error!("lumen::vulkan", "Device lost during acquire");
                Err(Error::DeviceLost)
            }
            Err(e) => Err(engine_err!("lumen::vulkan", "Failed to acquire next swapchain image: {:?}", e)),
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        let (_, render_finished) = self.sync_info(slot, image_index);
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [render_finished];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain_loader.queue_present(self.present_queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!("lumen::vulkan", "Swapchain out of date during present");
                Ok(PresentOutcome::OutOfDate)
            }
            Err(vk::Result::ERROR_DEVICE_LOST) => {
                engine_error!("lumen::vulkan", "Device lost during present");
                Err(Error::DeviceLost)
            }
            Err(e) => Err(engine_err!("lumen::vulkan", "Failed to present swapchain image: {:?}", e)),
        }
    }

    fn recreate(&mut self, requested: Extent2D) -> Result<Extent2D> {
        self.build(requested)?;
        let extent = vk_to_extent(self.extent);
        if extent != requested {
            engine_warn!(
                "lumen::vulkan",
                "Swapchain extent {}x{} differs from window {}x{}",
                extent.width,
                extent.height,
                requested.width,
                requested.height
            );
        }
        engine_debug!("lumen::vulkan", "Swapchain recreated at {}x{}", extent.width, extent.height);
        Ok(extent)
    }

    fn image_count(&self) -> usize {
        self.image_set.images.len()
    }

    fn extent(&self) -> Extent2D {
        vk_to_extent(self.extent)
    }

    fn format(&self) -> TextureFormat {
        vk_to_texture_format(self.surface_format.format)
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();

            for &semaphore in &self.image_available_semaphores {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
        }
        self.destroy_render_finished_semaphores();
        self.destroy_image_set();

        unsafe {
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
