/*!
# Lumen Engine - Vulkan Backend

Vulkan implementation of the `lumen_engine` graphics device, built on `ash`
with `gpu-allocator` for memory and `spirq` for shader reflection.

`create_renderer` is the entry point: it creates the device and swapchain
for a window and wraps them in the engine's frame renderer.
*/

mod vulkan;
mod vulkan_context;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_program;
mod vulkan_command_list;
mod vulkan_swapchain;
mod debug;

use lumen_engine::lumen::resource::ResourceManager;
use lumen_engine::lumen::surface::SurfaceWindow;
use lumen_engine::lumen::{BackendKind, Config, Error, FrameRenderer, Renderer, Result};
use lumen_engine::{engine_error, engine_info};

pub use vulkan::VulkanGraphicsDevice;
pub use vulkan_buffer::Buffer as VulkanBuffer;
pub use vulkan_texture::Texture as VulkanTexture;
pub use vulkan_program::Program as VulkanProgram;
pub use vulkan_swapchain::Swapchain as VulkanSwapchain;
pub use vulkan_command_list::CommandList as VulkanCommandList;

// Debug utilities
pub use debug::{log_validation_stats_report, validation_stats, ValidationStats};

/// Frame renderer over the Vulkan device
pub type VulkanRenderer = FrameRenderer<VulkanGraphicsDevice>;

/// Create the renderer selected by `config.backend` for `window`
///
/// # Errors
///
/// `Error::BackendUnavailable` when the configured backend is not compiled
/// into this build, or any device initialization error.
///
/// # Example
///
/// ```ignore
/// use lumen_engine::lumen::{Config, Engine};
///
/// let config = Config::default();
/// let mut engine = Engine::new(config.clone());
/// engine.attach_renderer(lumen_engine_renderer_vulkan::create_renderer(&window, &config)?)?;
/// ```
pub fn create_renderer<W: SurfaceWindow>(window: &W, config: &Config) -> Result<Box<dyn Renderer>> {
    match config.backend {
        BackendKind::Vulkan => {
            let device = VulkanGraphicsDevice::new(window, config)?;
            let resources = ResourceManager::with_defaults(config.effective_frames_in_flight());
            engine_info!("lumen::vulkan", "Vulkan renderer created for '{}'", config.app_name);
            Ok(Box::new(VulkanRenderer::new(device, resources, config)))
        }
        other => {
            engine_error!("lumen::vulkan", "Backend {} is not available in this build", other.name());
            Err(Error::BackendUnavailable(other.name().to_string()))
        }
    }
}
