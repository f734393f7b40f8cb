/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Owns the instance, the selected adapter, the logical device and its
/// queues, the main render pass (color + depth), the pipeline layout shared
/// by every program, the swapchain, and one frame slot (command list +
/// fence) per frame in flight.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use lumen_engine::lumen::device::{
    choose_surface_format, select_device, AdapterInfo, Buffer as GpuBuffer, BufferDesc,
    CommandList as GpuCommandList, DeviceProperties, DeviceRequirements, GraphicsDevice,
    Program as GpuProgram, ProgramDesc, QueueFamilyInfo, SelectedDevice, Swapchain as GpuSwapchain,
    Texture as GpuTexture, TextureDesc,
};
use lumen_engine::lumen::resource::DrawConstants;
use lumen_engine::lumen::surface::SurfaceWindow;
use lumen_engine::lumen::{BackendKind, Config, Error, Result};
use lumen_engine::{engine_debug, engine_err, engine_error, engine_info, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_char, CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::{CommandList, RenderTarget, PUSH_CONSTANT_STAGES};
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{api_version_string, vk_to_adapter_type, vk_to_surface_format};
use crate::vulkan_program::{PipelineTarget, Program};
use crate::vulkan_swapchain::{Swapchain, SwapchainSetup, DEPTH_FORMAT};
use crate::vulkan_texture::Texture;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Command list and "frame complete" fence of one frame slot
struct FrameSlot {
    command_list: CommandList,
    fence: vk::Fence,
}

pub struct VulkanGraphicsDevice {
    /// Keeps the Vulkan library loaded
    _entry: ash::Entry,
    instance: ash::Instance,
    ctx: Arc<GpuContext>,

    render_pass: vk::RenderPass,
    pipeline_layout: vk::PipelineLayout,

    /// Dropped explicitly before the device is destroyed
    swapchain: ManuallyDrop<Swapchain>,
    slots: Vec<FrameSlot>,

    properties: DeviceProperties,
}

impl VulkanGraphicsDevice {
    /// Create the device, its swapchain and frame slots for `window`
    pub fn new<W: SurfaceWindow>(window: &W, config: &Config) -> Result<Self> {
        let frames_in_flight = config.effective_frames_in_flight();
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to load Vulkan library: {:?}", e);
            Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
        })?;

        let validation = Self::validation_requested(&entry, config);
        let instance = Self::create_instance(&entry, window, config, validation)?;

        let (debug_utils_loader, debug_messenger) = if validation {
            crate::debug::init_debug_config(config.debug_severity);
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger = unsafe { loader.create_debug_utils_messenger(&crate::debug::messenger_create_info(), None) }
                .map_err(|e| {
                    engine_error!("lumen::vulkan", "Failed to create debug messenger: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
                })?;
            (Some(loader), Some(messenger))
        } else {
            (None, None)
        };

        let surface = Self::create_surface(&entry, &instance, window)?;
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        // ===== ADAPTER SELECTION =====
        let physical_devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to enumerate physical devices: {:?}", e);
            Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
        })?;
        let adapters: Vec<AdapterInfo> = physical_devices
            .iter()
            .map(|&pd| describe_adapter(&instance, &surface_loader, surface, pd))
            .collect();
        let selected = select_device(&adapters, &DeviceRequirements::for_presentation(config.wireframe_support))?;
        let physical_device = physical_devices[selected.adapter_index];
        let adapter = &adapters[selected.adapter_index];
        let wireframe_supported = config.wireframe_support && adapter.fill_mode_non_solid;

        let vk_properties = unsafe { instance.get_physical_device_properties(physical_device) };
        engine_info!(
            "lumen::vulkan",
            "Selected adapter '{}' ({:?}), Vulkan {}",
            selected.name,
            selected.adapter_type,
            api_version_string(vk_properties.api_version)
        );

        // ===== LOGICAL DEVICE =====
        let device = Self::create_logical_device(&instance, physical_device, &selected)?;
        let graphics_queue = unsafe { device.get_device_queue(selected.graphics_family, 0) };
        let present_family = selected.present_family.unwrap_or(selected.graphics_family);
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to create GPU allocator: {:?}", e);
            Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
        })?;

        let (uniform_set_layout, texture_set_layout) = create_set_layouts(&device)?;
        let sampler = create_sampler(&device)?;

        let upload_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(selected.graphics_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let upload_command_pool = unsafe { device.create_command_pool(&upload_pool_info, None) }.map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to create upload command pool: {:?}", e);
            Error::InitializationFailed(format!("Failed to create upload command pool: {:?}", e))
        })?;

        let ctx = Arc::new(GpuContext::new(
            device,
            Arc::new(Mutex::new(allocator)),
            graphics_queue,
            selected.graphics_family,
            upload_command_pool,
            uniform_set_layout,
            texture_set_layout,
            sampler,
            debug_utils_loader,
            debug_messenger,
        ));

        // ===== PRESENTATION =====
        let vk_formats = unsafe { surface_loader.get_physical_device_surface_formats(physical_device, surface) }
            .map_err(|e| {
                engine_error!("lumen::vulkan", "Failed to query surface formats: {:?}", e);
                Error::InitializationFailed(format!("Failed to query surface formats: {:?}", e))
            })?;
        let formats: Vec<_> = vk_formats.iter().map(vk_to_surface_format).collect();
        let surface_format = choose_surface_format(&formats)
            .and_then(|chosen| formats.iter().position(|f| *f == chosen))
            .map(|index| vk_formats[index])
            .ok_or_else(|| Error::InitializationFailed("Surface reports no formats".to_string()))?;

        let render_pass = create_render_pass(&ctx.device, surface_format.format)?;
        let pipeline_layout = create_pipeline_layout(&ctx)?;

        let mut queue_families = vec![selected.graphics_family];
        if present_family != selected.graphics_family {
            queue_families.push(present_family);
        }
        let swapchain = Swapchain::new(
            Arc::clone(&ctx),
            &instance,
            SwapchainSetup {
                physical_device,
                surface,
                surface_loader,
                present_queue,
                queue_families,
                surface_format,
                render_pass,
                present_preference: config.present_mode,
                frames_in_flight,
            },
            window.framebuffer_size(),
        )?;

        // ===== FRAME SLOTS =====
        let mut slots = Vec::with_capacity(frames_in_flight);
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        for slot in 0..frames_in_flight {
            let command_list = CommandList::new(Arc::clone(&ctx), slot, pipeline_layout)?;
            let fence = unsafe { ctx.device.create_fence(&fence_info, None) }.map_err(|e| {
                engine_error!("lumen::vulkan", "Failed to create frame fence: {:?}", e);
                Error::InitializationFailed(format!("Failed to create fence: {:?}", e))
            })?;
            slots.push(FrameSlot { command_list, fence });
        }

        let properties = DeviceProperties {
            backend: BackendKind::Vulkan,
            device_name: selected.name.clone(),
            adapter_type: selected.adapter_type,
            api_version: api_version_string(vk_properties.api_version),
            frames_in_flight,
            wireframe_supported,
        };

        engine_info!(
            "lumen::vulkan",
            "Vulkan device ready: {} frame(s) in flight, wireframe {}",
            frames_in_flight,
            if wireframe_supported { "on" } else { "off" }
        );

        Ok(Self {
            _entry: entry,
            instance,
            ctx,
            render_pass,
            pipeline_layout,
            swapchain: ManuallyDrop::new(swapchain),
            slots,
            properties,
        })
    }

    /// Validation needs both the config flag and the `vulkan-validation` feature
    fn validation_requested(entry: &ash::Entry, config: &Config) -> bool {
        if !config.enable_validation {
            return false;
        }
        if !cfg!(feature = "vulkan-validation") {
            engine_debug!("lumen::vulkan", "Validation requested but the vulkan-validation feature is off");
            return false;
        }
        let available = unsafe { entry.enumerate_instance_layer_properties() }
            .map(|layers| {
                layers
                    .iter()
                    .any(|layer| layer.layer_name_as_c_str().map_or(false, |name| name == VALIDATION_LAYER))
            })
            .unwrap_or(false);
        if !available {
            engine_warn!("lumen::vulkan", "{:?} not installed, continuing without validation", VALIDATION_LAYER);
        }
        available
    }

    fn create_instance<W: HasDisplayHandle>(
        entry: &ash::Entry,
        window: &W,
        config: &Config,
        validation: bool,
    ) -> Result<ash::Instance> {
        let app_name = CString::new(config.app_name.as_str()).unwrap_or_else(|_| CString::from(c"Lumen Application"));
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"Lumen")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let display_handle = window.display_handle().map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to get display handle: {}", e);
            Error::SurfaceCreationFailed(format!("Failed to get display handle: {}", e))
        })?;
        let mut extension_names: Vec<*const c_char> = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| {
                engine_error!("lumen::vulkan", "Failed to get required extensions: {}", e);
                Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
            })?
            .to_vec();
        let mut layer_names: Vec<*const c_char> = Vec::new();
        if validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            layer_names.push(VALIDATION_LAYER.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to create Vulkan instance: {:?}", e);
            Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
        })
    }

    fn create_surface<W: HasDisplayHandle + HasWindowHandle>(
        entry: &ash::Entry,
        instance: &ash::Instance,
        window: &W,
    ) -> Result<vk::SurfaceKHR> {
        let display_handle = window
            .display_handle()
            .map_err(|e| Error::SurfaceCreationFailed(format!("Failed to get display handle: {}", e)))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| Error::SurfaceCreationFailed(format!("Failed to get window handle: {}", e)))?;

        unsafe {
            ash_window::create_surface(entry, instance, display_handle.as_raw(), window_handle.as_raw(), None)
        }
        .map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to create surface: {:?}", e);
            Error::SurfaceCreationFailed(format!("Failed to create surface: {:?}", e))
        })
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        selected: &SelectedDevice,
    ) -> Result<ash::Device> {
        let queue_priorities = [1.0];
        let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
            .queue_family_index(selected.graphics_family)
            .queue_priorities(&queue_priorities)];
        if !selected.shares_queue_family() {
            if let Some(present_family) = selected.present_family {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(present_family)
                        .queue_priorities(&queue_priorities),
                );
            }
        }

        // Enable what the adapter offers among the optional features
        let supported = unsafe { instance.get_physical_device_features(physical_device) };
        let features = vk::PhysicalDeviceFeatures::default()
            .fill_mode_non_solid(supported.fill_mode_non_solid == vk::TRUE)
            .geometry_shader(supported.geometry_shader == vk::TRUE);

        let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .enabled_features(&features);

        unsafe { instance.create_device(physical_device, &create_info, None) }.map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to create logical device: {:?}", e);
            Error::InitializationFailed(format!("Failed to create device: {:?}", e))
        })
    }

    fn slot(&self, slot: usize) -> Result<&FrameSlot> {
        self.slots
            .get(slot)
            .ok_or_else(|| engine_err!("lumen::vulkan", "Frame slot {} out of range ({})", slot, self.slots.len()))
    }

    fn check_image_index(&self, image_index: u32) -> Result<()> {
        if image_index as usize >= self.swapchain.image_count() {
            return Err(engine_err!(
                "lumen::vulkan",
                "Swapchain image {} out of range ({})",
                image_index,
                self.swapchain.image_count()
            ));
        }
        Ok(())
    }

    fn queue_submit(&self, submit_info: vk::SubmitInfo<'_>, fence: vk::Fence) -> Result<()> {
        unsafe { self.ctx.device.queue_submit(self.ctx.graphics_queue, &[submit_info], fence) }.map_err(|e| {
            if e == vk::Result::ERROR_DEVICE_LOST {
                engine_error!("lumen::vulkan", "Device lost during submit");
                Error::DeviceLost
            } else {
                engine_error!("lumen::vulkan", "Failed to submit to graphics queue: {:?}", e);
                Error::SubmitFailed(format!("{:?}", e))
            }
        })
    }
}

// ===== ADAPTER DESCRIPTION =====

/// Everything device selection needs to know about one physical device
fn describe_adapter(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
) -> AdapterInfo {
    unsafe {
        let properties = instance.get_physical_device_properties(physical_device);
        let name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "Unknown adapter".to_string());

        let queue_families = instance
            .get_physical_device_queue_family_properties(physical_device)
            .iter()
            .enumerate()
            .map(|(index, family)| QueueFamilyInfo {
                index: index as u32,
                queue_count: family.queue_count,
                graphics: family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
                present: surface_loader
                    .get_physical_device_surface_support(physical_device, index as u32, surface)
                    .unwrap_or(false),
            })
            .collect();

        let extensions = instance
            .enumerate_device_extension_properties(physical_device)
            .unwrap_or_default()
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        let features = instance.get_physical_device_features(physical_device);

        AdapterInfo {
            name,
            adapter_type: vk_to_adapter_type(properties.device_type),
            queue_families,
            extensions,
            fill_mode_non_solid: features.fill_mode_non_solid == vk::TRUE,
            surface_format_count: surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_or(0, |formats| formats.len()),
            present_mode_count: surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_or(0, |modes| modes.len()),
        }
    }
}

// ===== SHARED PIPELINE OBJECTS =====

/// (set 0: uniform block, sets 1 and 2: one sampled texture)
fn create_set_layouts(device: &ash::Device) -> Result<(vk::DescriptorSetLayout, vk::DescriptorSetLayout)> {
    let uniform_bindings = [vk::DescriptorSetLayoutBinding::default()
        .binding(0)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .descriptor_count(1)
        .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)];
    let texture_bindings = [vk::DescriptorSetLayoutBinding::default()
        .binding(0)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .descriptor_count(1)
        .stage_flags(vk::ShaderStageFlags::FRAGMENT)];

    unsafe {
        let uniform_layout = device
            .create_descriptor_set_layout(&vk::DescriptorSetLayoutCreateInfo::default().bindings(&uniform_bindings), None)
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to create uniform set layout: {:?}", e))?;
        let texture_layout = device
            .create_descriptor_set_layout(&vk::DescriptorSetLayoutCreateInfo::default().bindings(&texture_bindings), None)
            .map_err(|e| {
                device.destroy_descriptor_set_layout(uniform_layout, None);
                engine_err!("lumen::vulkan", "Failed to create texture set layout: {:?}", e)
            })?;
        Ok((uniform_layout, texture_layout))
    }
}

fn create_sampler(device: &ash::Device) -> Result<vk::Sampler> {
    let create_info = vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(false)
        .max_anisotropy(1.0)
        .compare_enable(false)
        .min_lod(0.0)
        .max_lod(vk::LOD_CLAMP_NONE)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK);

    unsafe { device.create_sampler(&create_info, None) }
        .map_err(|e| engine_err!("lumen::vulkan", "Failed to create sampler: {:?}", e))
}

/// Color (cleared, presented) + depth (cleared, discarded)
fn create_render_pass(device: &ash::Device, color_format: vk::Format) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
        vk::AttachmentDescription::default()
            .format(DEPTH_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    ];

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref)];

    // Wait for the acquired image and for the previous frame's depth writes
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stages | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS)
        .dst_stage_mask(stages)
        .src_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe { device.create_render_pass(&create_info, None) }.map_err(|e| {
        engine_error!("lumen::vulkan", "Failed to create render pass: {:?}", e);
        Error::InitializationFailed(format!("Failed to create render pass: {:?}", e))
    })
}

/// Uniform set, diffuse set, specular set + per-draw push constants
fn create_pipeline_layout(ctx: &GpuContext) -> Result<vk::PipelineLayout> {
    let set_layouts = [ctx.uniform_set_layout, ctx.texture_set_layout, ctx.texture_set_layout];
    let push_constant_ranges = [vk::PushConstantRange {
        stage_flags: PUSH_CONSTANT_STAGES,
        offset: 0,
        size: std::mem::size_of::<DrawConstants>() as u32,
    }];
    let create_info = vk::PipelineLayoutCreateInfo::default()
        .set_layouts(&set_layouts)
        .push_constant_ranges(&push_constant_ranges);

    unsafe { ctx.device.create_pipeline_layout(&create_info, None) }.map_err(|e| {
        engine_error!("lumen::vulkan", "Failed to create pipeline layout: {:?}", e);
        Error::InitializationFailed(format!("Failed to create pipeline layout: {:?}", e))
    })
}

// ===== GRAPHICS DEVICE =====

impl GraphicsDevice for VulkanGraphicsDevice {
    fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        let fence = self.slot(slot)?.fence;
        unsafe { self.ctx.device.wait_for_fences(&[fence], true, u64::MAX) }.map_err(|e| {
            if e == vk::Result::ERROR_DEVICE_LOST {
                engine_error!("lumen::vulkan", "Device lost while waiting for slot {}", slot);
                Error::DeviceLost
            } else {
                engine_err!("lumen::vulkan", "Failed to wait for slot {} fence: {:?}", slot, e)
            }
        })
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        let fence = self.slot(slot)?.fence;
        // a failed list reset leaves the fence signaled
        self.slots[slot].command_list.reset()?;
        unsafe { self.ctx.device.reset_fences(&[fence]) }
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to reset slot {} fence: {:?}", slot, e))
    }

    fn command_list(&mut self, slot: usize, image_index: u32) -> &mut dyn GpuCommandList {
        let target = self.swapchain.framebuffer(image_index).map(|framebuffer| RenderTarget {
            render_pass: self.render_pass,
            framebuffer,
            extent: self.swapchain.vk_extent(),
        });
        // slot < frames_in_flight
        let command_list = &mut self.slots[slot].command_list;
        command_list.set_target(target);
        command_list
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> Result<()> {
        self.check_image_index(image_index)?;
        let frame = self.slot(slot)?;
        let (image_available, render_finished) = self.swapchain.sync_info(slot, image_index);

        let wait_semaphores = [image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.command_list.command_buffer()];
        let signal_semaphores = [render_finished];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        self.queue_submit(submit_info, frame.fence)
    }

    fn abandon_frame(&mut self, slot: usize) -> Result<()> {
        let frame = self.slot(slot)?;
        let (image_available, _) = self.swapchain.sync_info(slot, 0);

        // reset_slot may have failed before the fence was reset
        unsafe { self.ctx.device.reset_fences(&[frame.fence]) }
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to reset slot {} fence: {:?}", slot, e))?;

        // Consume the acquire signal and re-signal the fence without any work
        let wait_semaphores = [image_available];
        let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages);

        engine_debug!("lumen::vulkan", "Abandoning frame in slot {}", slot);
        self.queue_submit(submit_info, frame.fence)
    }

    fn swapchain(&mut self) -> &mut dyn GpuSwapchain {
        &mut *self.swapchain
    }

    fn swapchain_ref(&self) -> &dyn GpuSwapchain {
        &*self.swapchain
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }.map_err(|e| {
            if e == vk::Result::ERROR_DEVICE_LOST {
                Error::DeviceLost
            } else {
                engine_err!("lumen::vulkan", "Failed to wait idle: {:?}", e)
            }
        })
    }

    fn create_buffer(&mut self, desc: BufferDesc, data: &[u8]) -> Result<Arc<dyn GpuBuffer>> {
        Ok(Arc::new(Buffer::new(Arc::clone(&self.ctx), &desc, data)?))
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn GpuTexture>> {
        Ok(Arc::new(Texture::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<Arc<dyn GpuProgram>> {
        let target = PipelineTarget {
            render_pass: self.render_pass,
            layout: self.pipeline_layout,
            line_mode: self.properties.wireframe_supported,
            frames_in_flight: self.slots.len(),
        };
        Ok(Arc::new(Program::new(Arc::clone(&self.ctx), desc, &target)?))
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();

            // 1. Frame slots and swapchain (both hold the context)
            for slot in self.slots.drain(..) {
                self.ctx.device.destroy_fence(slot.fence, None);
            }
            ManuallyDrop::drop(&mut self.swapchain);

            self.ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.ctx.device.destroy_render_pass(self.render_pass, None);

            // 2. Every resource must be gone before the device goes
            let outliving = Arc::strong_count(&self.ctx) - 1;
            let Some(ctx) = Arc::get_mut(&mut self.ctx) else {
                engine_warn!(
                    "lumen::vulkan",
                    "{} GPU resource(s) outlive the device; leaking the Vulkan device",
                    outliving
                );
                return;
            };

            if let Ok(pools) = ctx.descriptor_pools.get_mut() {
                for pool in pools.drain(..) {
                    ctx.device.destroy_descriptor_pool(pool, None);
                }
            }
            if let Ok(pool) = ctx.upload_command_pool.get_mut() {
                ctx.device.destroy_command_pool(*pool, None);
            }
            ctx.device.destroy_sampler(ctx.sampler, None);
            ctx.device.destroy_descriptor_set_layout(ctx.uniform_set_layout, None);
            ctx.device.destroy_descriptor_set_layout(ctx.texture_set_layout, None);

            // 3. Free memory pages before the device
            ManuallyDrop::drop(&mut ctx.allocator);

            // 4. Messenger, device, instance
            if let (Some(loader), Some(messenger)) = (&ctx.debug_utils_loader, ctx.debug_messenger) {
                crate::debug::log_validation_stats_report();
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            ctx.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        engine_info!("lumen::vulkan", "Vulkan device destroyed");
    }
}
