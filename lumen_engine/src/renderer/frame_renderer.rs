/// FrameRenderer - the renderer façade over any graphics device
///
/// Drives one frame slot per `new_frame`:
/// wait fence → acquire image → reset slot → record → submit → present →
/// advance. Hot-reload events are drained and the surface is rebuilt, when
/// needed, before the slot is touched.

use glam::Mat4;
use crate::camera::Camera;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::frame::{record, DrawCommand, FrameContext, FrameSync, RecordStats, SlotState};
use crate::graphics_device::{AcquireOutcome, Extent2D, GraphicsDevice, PolygonMode, PresentOutcome};
use crate::renderer::{
    FrameStatus, RenderState, Renderer, RendererProperties, Resources, SkipReason,
};
use crate::resource::{MeshId, ResourceManager};
use crate::surface::{RebuildCallback, SubscriptionId, SurfaceManager, SurfaceStatus};
use crate::{engine_debug, engine_error, engine_info, engine_warn, engine_warn_err};

pub struct FrameRenderer<D: GraphicsDevice> {
    // Dropped before the device that created them
    resources: ResourceManager,
    device: D,
    surface: SurfaceManager,
    sync: FrameSync,
    camera: Camera,
    state: RenderState,
    draws: Vec<DrawCommand>,
    last_frame: RecordStats,
    hot_reload: bool,
    initialized: bool,
}

impl<D: GraphicsDevice> FrameRenderer<D> {
    /// Wrap a device whose swapchain has already been created
    pub fn new(device: D, resources: ResourceManager, config: &Config) -> Self {
        let surface = SurfaceManager::new(device.swapchain_ref().extent());
        let sync = FrameSync::new(device.frames_in_flight());
        Self {
            device,
            resources,
            surface,
            sync,
            camera: Camera::default(),
            state: RenderState { clear_color: config.clear_color, ..RenderState::default() },
            draws: Vec::new(),
            last_frame: RecordStats::default(),
            hot_reload: config.hot_reload,
            initialized: false,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn surface(&self) -> &SurfaceManager {
        &self.surface
    }

    pub fn frame_sync(&self) -> &FrameSync {
        &self.sync
    }

    /// Draws queued for the next frame
    pub fn queued_draws(&self) -> &[DrawCommand] {
        &self.draws
    }

    fn polygon_mode(&self) -> PolygonMode {
        if self.state.wireframe && self.device.properties().wireframe_supported {
            PolygonMode::Line
        } else {
            PolygonMode::Fill
        }
    }

    /// Drop a frame whose slot was reset but never submitted
    fn abandon_frame(&mut self, slot: usize, error: &Error) {
        engine_error!("lumen::renderer", "Frame {} dropped: {}", self.sync.frame_serial(), error);
        if let Err(e) = self.device.abandon_frame(slot) {
            engine_error!("lumen::renderer", "Abandoning slot {} failed: {}", slot, e);
        }
        // the acquired image is never presented; the rebuild releases it
        self.surface.mark_stale();
        if let Err(e) = self.sync.transition(SlotState::Submitted) {
            engine_warn!("lumen::renderer", "{}", e);
        }
        self.sync.advance();
    }
}

impl<D: GraphicsDevice> Renderer for FrameRenderer<D> {
    fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.resources.init_placeholder(&mut self.device)?;
        if self.hot_reload {
            if let Err(e) = self.resources.enable_hot_reload() {
                engine_warn!("lumen::renderer", "Shader hot-reload unavailable: {}", e);
            }
        }
        self.initialized = true;

        let props = self.device.properties();
        engine_info!(
            "lumen::renderer",
            "Renderer initialized on '{}' ({} frame(s) in flight)",
            props.device_name, props.frames_in_flight
        );
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn new_frame(&mut self) -> Result<FrameStatus> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }

        let report = self.resources.poll_hot_reload(&mut self.device);
        if !report.is_empty() {
            engine_debug!(
                "lumen::renderer",
                "Hot-reload: {} rebuilt, {} failed",
                report.reloaded.len(), report.failed.len()
            );
        }

        let rebuilds = self.surface.rebuild_count();
        if self.surface.prepare(&mut self.device)? == SurfaceStatus::Minimized {
            self.draws.clear();
            return Ok(FrameStatus::Skipped(SkipReason::Minimized));
        }
        if self.surface.rebuild_count() != rebuilds {
            self.sync.reset_idle();
        }

        let slot = self.sync.current_slot();
        self.device.wait_for_slot(slot)?;
        self.sync.transition(SlotState::Idle)?;
        self.resources.retire_frames(self.sync.frame_serial());

        self.sync.transition(SlotState::Acquiring)?;
        let (image_index, suboptimal) = match self.device.swapchain().acquire_next_image(slot) {
            Ok(AcquireOutcome::Acquired { image_index, suboptimal }) => (image_index, suboptimal),
            Ok(AcquireOutcome::OutOfDate) => {
                self.sync.transition(SlotState::Idle)?;
                self.surface.mark_stale();
                self.draws.clear();
                engine_debug!("lumen::renderer", "Swapchain out of date, frame skipped");
                return Ok(FrameStatus::Skipped(SkipReason::OutOfDate));
            }
            Err(e) => {
                self.sync.transition(SlotState::Idle)?;
                return Err(e);
            }
        };
        if suboptimal {
            self.surface.mark_stale();
        }

        // fence reset only once an image is in hand
        self.sync.transition(SlotState::Recording)?;
        if let Err(e) = self.device.reset_slot(slot) {
            self.abandon_frame(slot, &e);
            return Err(e);
        }

        let extent = self.device.swapchain_ref().extent();
        let draws = std::mem::take(&mut self.draws);
        let polygon_mode = self.polygon_mode();
        let recorded = {
            let ctx = FrameContext {
                resources: &self.resources,
                draws: &draws,
                extent,
                clear_color: self.state.clear_color,
                program: self.state.active_program,
                polygon_mode,
                view_projection: self.camera.matrices(extent.aspect_ratio()).view_projection,
            };
            record(self.device.command_list(slot, image_index), &ctx)
        };

        let stats = match recorded.and_then(|stats| self.device.submit(slot, image_index).map(|_| stats)) {
            Ok(stats) => stats,
            Err(e) => {
                self.abandon_frame(slot, &e);
                return Err(e);
            }
        };
        self.sync.transition(SlotState::Submitted)?;

        let presented = self.device.swapchain().present(slot, image_index);
        self.sync.advance();
        self.last_frame = stats;
        match presented {
            Ok(PresentOutcome::Presented) => {}
            Ok(PresentOutcome::Suboptimal) | Ok(PresentOutcome::OutOfDate) => self.surface.mark_stale(),
            Err(e) => {
                self.surface.mark_stale();
                return Err(e);
            }
        }

        Ok(FrameStatus::Presented {
            slot,
            image_index,
            draws: stats.draws,
            skipped: stats.skipped,
        })
    }

    fn draw(&mut self, mesh: MeshId, transform: Mat4) -> Result<()> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if !self.resources.contains_mesh(mesh) {
            return Err(Error::MeshNotFound(format!("{:?}", mesh)));
        }
        self.draws.push(DrawCommand { mesh, transform });
        Ok(())
    }

    fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    fn camera(&self) -> &Camera {
        &self.camera
    }

    fn set_wireframe_mode(&mut self, enabled: bool) -> Result<()> {
        if enabled && !self.device.properties().wireframe_supported {
            return Err(engine_warn_err!("lumen::renderer", "Wireframe mode not supported by this device"));
        }
        self.state.wireframe = enabled;
        Ok(())
    }

    fn wait(&mut self) -> Result<()> {
        self.device.wait_idle()?;
        self.sync.reset_idle();
        Ok(())
    }

    fn properties(&self) -> RendererProperties {
        let device = self.device.properties();
        let swapchain = self.device.swapchain_ref();
        RendererProperties {
            backend: device.backend,
            device_name: device.device_name.clone(),
            adapter_type: device.adapter_type,
            api_version: device.api_version.clone(),
            frames_in_flight: device.frames_in_flight,
            extent: swapchain.extent(),
            image_count: swapchain.image_count(),
            wireframe_supported: device.wireframe_supported,
            frame_serial: self.sync.frame_serial(),
            surface_rebuilds: self.surface.rebuild_count(),
            last_frame: self.last_frame,
            resources: self.resources.stats(),
        }
    }

    fn notify_resize(&mut self, width: u32, height: u32) {
        self.surface.notify_resize(Extent2D::new(width, height));
    }

    fn render_state(&self) -> &RenderState {
        &self.state
    }

    fn render_state_mut(&mut self) -> &mut RenderState {
        &mut self.state
    }

    fn resources(&mut self) -> Resources<'_> {
        Resources::new(&mut self.resources, &mut self.device)
    }

    fn subscribe_resize(&mut self, callback: RebuildCallback) -> SubscriptionId {
        self.surface.subscribe(callback)
    }

    fn unsubscribe_resize(&mut self, id: SubscriptionId) -> bool {
        self.surface.unsubscribe(id)
    }

    fn shutdown(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.device.wait_idle()?;
        self.sync.reset_idle();
        self.draws.clear();
        self.state.active_program = None;
        self.resources.release_all();
        self.initialized = false;
        engine_info!("lumen::renderer", "Renderer shut down");
        Ok(())
    }
}

impl<D: GraphicsDevice> Drop for FrameRenderer<D> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            engine_error!("lumen::renderer", "Shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "frame_renderer_tests.rs"]
mod tests;
