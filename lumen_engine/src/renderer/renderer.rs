/// Renderer trait - the façade seen by the scene and UI layers
///
/// The scene layer queues draws by mesh id and sets the camera; the UI
/// overlay reads and writes [`RenderState`]; the window layer forwards
/// resizes. Errors come back as [`Error`] values whose [`ErrorCode`] maps to a
/// static message.

use std::path::Path;
use glam::Mat4;
use crate::camera::Camera;
use crate::config::BackendKind;
use crate::error::{error_message, Error, ErrorCode, Result};
use crate::frame::RecordStats;
use crate::graphics_device::{AdapterType, Extent2D, GraphicsDevice, TextureDesc, UniformValue};
use crate::resource::{
    HotReloadReport, MeshDesc, MeshId, ModelId, ProgramId, ResourceManager, ResourceStats,
    ShaderProgramDesc, TextureId,
};
use crate::surface::{RebuildCallback, SubscriptionId};

// ============================================================================
// Frame results
// ============================================================================

/// Why a frame was not rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The window has a zero-area framebuffer
    Minimized,
    /// The swapchain went out of date while acquiring; rebuilt next frame
    OutOfDate,
}

/// Outcome of `new_frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented {
        slot: usize,
        image_index: u32,
        draws: usize,
        skipped: usize,
    },
    Skipped(SkipReason),
}

impl FrameStatus {
    pub fn is_presented(&self) -> bool {
        matches!(self, FrameStatus::Presented { .. })
    }
}

// ============================================================================
// State and properties
// ============================================================================

/// Mutable render state shared with the UI overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub clear_color: [f32; 4],
    /// Draw in line mode; ignored when the device lacks line rasterization
    pub wireframe: bool,
    /// Program bound for every draw; none records a clear-only frame
    pub active_program: Option<ProgramId>,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            wireframe: false,
            active_program: None,
        }
    }
}

/// Renderer description for diagnostics and overlays
#[derive(Debug, Clone, PartialEq)]
pub struct RendererProperties {
    pub backend: BackendKind,
    pub device_name: String,
    pub adapter_type: AdapterType,
    pub api_version: String,
    pub frames_in_flight: usize,
    pub extent: Extent2D,
    pub image_count: usize,
    pub wireframe_supported: bool,
    /// Frames presented or abandoned so far
    pub frame_serial: u64,
    pub surface_rebuilds: usize,
    pub last_frame: RecordStats,
    pub resources: ResourceStats,
}

// ============================================================================
// Scoped resource access
// ============================================================================

/// Resource manager paired with the device for the duration of a borrow
pub struct Resources<'a> {
    manager: &'a mut ResourceManager,
    device: &'a mut dyn GraphicsDevice,
}

impl<'a> Resources<'a> {
    pub fn new(manager: &'a mut ResourceManager, device: &'a mut dyn GraphicsDevice) -> Self {
        Self { manager, device }
    }

    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> Result<TextureId> {
        self.manager.load_texture(self.device, path.as_ref())
    }

    pub fn create_texture(&mut self, desc: TextureDesc) -> Result<TextureId> {
        self.manager.create_texture(self.device, desc)
    }

    pub fn free_texture(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        self.manager.free_texture(path.as_ref())
    }

    pub fn create_mesh(&mut self, desc: MeshDesc) -> Result<MeshId> {
        self.manager.create_mesh(self.device, desc)
    }

    pub fn load_mesh(&mut self, path: impl AsRef<Path>) -> Result<MeshId> {
        self.manager.load_mesh(self.device, path.as_ref())
    }

    pub fn free_mesh(&mut self, id: MeshId) -> Result<bool> {
        self.manager.free_mesh_id(id)
    }

    pub fn load_model(&mut self, path: impl AsRef<Path>) -> Result<ModelId> {
        self.manager.load_model(self.device, path.as_ref())
    }

    pub fn free_model(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        self.manager.free_model(path.as_ref())
    }

    pub fn create_program(&mut self, desc: ShaderProgramDesc) -> Result<ProgramId> {
        self.manager.create_program(self.device, desc)
    }

    pub fn set_uniform(&mut self, id: ProgramId, name: &str, value: UniformValue) -> Result<()> {
        self.manager.set_uniform(id, name, value)
    }

    pub fn reload_program(&mut self, id: ProgramId) -> Result<()> {
        self.manager.reload_program(self.device, id)
    }

    pub fn poll_hot_reload(&mut self) -> HotReloadReport {
        self.manager.poll_hot_reload(self.device)
    }

    pub fn stats(&self) -> ResourceStats {
        self.manager.stats()
    }

    /// Read-only access to the tables
    pub fn manager(&self) -> &ResourceManager {
        self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ResourceManager {
        self.manager
    }
}

// ============================================================================
// Renderer trait
// ============================================================================

/// Renderer façade
///
/// Draws queued with `draw` are recorded and presented by the next
/// `new_frame`. All methods run on the rendering thread.
pub trait Renderer {
    /// Create the placeholder texture and start the optional shader watcher
    fn init(&mut self) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// Render and present the queued draws
    ///
    /// Transient presentation problems skip the frame and are reported as
    /// [`FrameStatus::Skipped`]. Recording and submission failures drop the
    /// frame and return the error.
    fn new_frame(&mut self) -> Result<FrameStatus>;

    /// Queue a mesh for the next frame
    ///
    /// An unknown id is `Error::MeshNotFound` and queues nothing.
    fn draw(&mut self, mesh: MeshId, transform: Mat4) -> Result<()>;

    fn set_camera(&mut self, camera: Camera);

    fn camera(&self) -> &Camera;

    /// Switch line rasterization on or off
    fn set_wireframe_mode(&mut self, enabled: bool) -> Result<()>;

    /// Block until the device is idle
    fn wait(&mut self) -> Result<()>;

    fn properties(&self) -> RendererProperties;

    /// Static text for an error code
    fn error_message(&self, code: ErrorCode) -> &'static str {
        error_message(code)
    }

    /// Static text for an error
    fn describe_error(&self, error: &Error) -> &'static str {
        error_message(error.code())
    }

    /// New framebuffer size from the window
    fn notify_resize(&mut self, width: u32, height: u32);

    fn render_state(&self) -> &RenderState;

    fn render_state_mut(&mut self) -> &mut RenderState;

    /// Resource manager paired with the device
    fn resources(&mut self) -> Resources<'_>;

    /// Call `callback` with the new extent after each swapchain rebuild
    fn subscribe_resize(&mut self, callback: RebuildCallback) -> SubscriptionId;

    fn unsubscribe_resize(&mut self, id: SubscriptionId) -> bool;

    /// Wait idle and release every resource
    ///
    /// Resources go first; frame slots, swapchain and device are destroyed
    /// when the renderer is dropped.
    fn shutdown(&mut self) -> Result<()>;
}
