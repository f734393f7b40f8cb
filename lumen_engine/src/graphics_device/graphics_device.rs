/// GraphicsDevice trait - the backend seam of the renderer
///
/// A graphics device owns the selected adapter, the logical device, the
/// window surface with its swapchain, and a fixed ring of frame slots. Each
/// slot has a command list, an "image available" signal, a "render finished"
/// signal and a "frame complete" fence.

use std::sync::Arc;
use crate::config::BackendKind;
use crate::error::Result;
use crate::graphics_device::{
    AdapterType, Buffer, BufferDesc, CommandList, Program, ProgramDesc, Swapchain, Texture, TextureDesc,
};

/// Static description of an initialized device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProperties {
    pub backend: BackendKind,
    pub device_name: String,
    pub adapter_type: AdapterType,
    /// API version as "major.minor.patch"
    pub api_version: String,
    pub frames_in_flight: usize,
    /// Line rasterization is enabled
    pub wireframe_supported: bool,
}

/// Graphics device trait
///
/// The frame loop drives a slot through
/// `wait_for_slot` → `swapchain().acquire_next_image` → `reset_slot` →
/// `command_list` → `submit` → `swapchain().present`.
pub trait GraphicsDevice {
    /// Device description
    fn properties(&self) -> &DeviceProperties;

    /// Number of frame slots
    fn frames_in_flight(&self) -> usize;

    /// Block until the slot's "frame complete" fence is signaled
    fn wait_for_slot(&mut self, slot: usize) -> Result<()>;

    /// Reset the slot's fence and command list
    ///
    /// Must only be called after `wait_for_slot` and once an image has been
    /// acquired, so an aborted acquire never leaves an unsignaled fence.
    fn reset_slot(&mut self, slot: usize) -> Result<()>;

    /// Command list of a slot, targeting the given swapchain image
    fn command_list(&mut self, slot: usize, image_index: u32) -> &mut dyn CommandList;

    /// Submit the slot's command list
    ///
    /// Waits on the slot's "image available" signal, signals the image's
    /// "render finished" signal and the slot fence.
    fn submit(&mut self, slot: usize, image_index: u32) -> Result<()>;

    /// Abandon a frame after an image was acquired
    ///
    /// Performs an empty submission that consumes the "image available"
    /// signal and re-signals the slot fence. Valid whether or not
    /// `reset_slot` completed.
    fn abandon_frame(&mut self, slot: usize) -> Result<()>;

    /// The presentation surface
    fn swapchain(&mut self) -> &mut dyn Swapchain;

    /// The presentation surface (read only)
    fn swapchain_ref(&self) -> &dyn Swapchain;

    /// Block until every queue is idle
    fn wait_idle(&self) -> Result<()>;

    /// Create a buffer filled with `data`
    fn create_buffer(&mut self, desc: BufferDesc, data: &[u8]) -> Result<Arc<dyn Buffer>>;

    /// Create and upload a sampled texture
    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Compile and link a program
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<Arc<dyn Program>>;
}
