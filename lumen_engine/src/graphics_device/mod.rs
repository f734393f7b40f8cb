/// Graphics device module - backend traits and the types they exchange

pub mod graphics_device;
pub mod device_selector;
pub mod texture;
pub mod buffer;
pub mod program;
pub mod command_list;
pub mod swapchain;

pub use graphics_device::*;
pub use device_selector::*;
pub use texture::*;
pub use buffer::*;
pub use program::*;
pub use command_list::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
