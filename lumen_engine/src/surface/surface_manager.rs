/// Presentation surface manager
///
/// Tracks the window's framebuffer size against the swapchain extent and
/// rebuilds the swapchain when they diverge or when acquire/present report
/// the swapchain stale. Rebuilds never touch the device or frame slots.
///
/// Resize notifications between two frames collapse to the last one. Rebuild
/// subscribers are called on the rendering thread, during the rebuild.

use crate::error::Result;
use crate::graphics_device::{Extent2D, GraphicsDevice};
use crate::{engine_debug, engine_info};

/// Callback receiving the new extent after a rebuild
pub type RebuildCallback = Box<dyn FnMut(Extent2D)>;

/// Handle returned by [`SurfaceManager::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Whether the surface can be rendered to this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// Swapchain matches the window
    Ready(Extent2D),
    /// Zero-area framebuffer; frames are skipped until restored
    Minimized,
}

pub struct SurfaceManager {
    /// Latest framebuffer size reported by the window
    window_extent: Extent2D,
    /// Window size the swapchain was last built for; the surface may clamp
    /// the actual extent
    built_for: Extent2D,
    resize_pending: bool,
    /// Acquire or present reported the swapchain out of date or suboptimal
    stale: bool,
    rebuild_count: usize,
    subscribers: Vec<(SubscriptionId, RebuildCallback)>,
    next_subscription: u64,
}

impl SurfaceManager {
    pub fn new(window_extent: Extent2D) -> Self {
        Self {
            window_extent,
            built_for: window_extent,
            resize_pending: false,
            stale: false,
            rebuild_count: 0,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Record a new framebuffer size; the rebuild happens on the next `prepare`
    pub fn notify_resize(&mut self, extent: Extent2D) {
        if self.window_extent != extent {
            engine_debug!("lumen::surface", "Resize requested to {}x{}", extent.width, extent.height);
        }
        self.window_extent = extent;
        self.resize_pending = true;
    }

    /// Flag the swapchain for a rebuild before the next frame
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn window_extent(&self) -> Extent2D {
        self.window_extent
    }

    /// Number of rebuilds performed
    pub fn rebuild_count(&self) -> usize {
        self.rebuild_count
    }

    /// Make the swapchain usable for the next frame, rebuilding if needed
    pub fn prepare(&mut self, device: &mut dyn GraphicsDevice) -> Result<SurfaceStatus> {
        if self.window_extent.is_zero_area() {
            return Ok(SurfaceStatus::Minimized);
        }

        let resized = self.resize_pending && self.window_extent != self.built_for;
        if self.stale || resized {
            self.rebuild(device)?;
        }
        self.resize_pending = false;

        Ok(SurfaceStatus::Ready(device.swapchain_ref().extent()))
    }

    /// Recreate the swapchain against the current window size
    ///
    /// Waits for the device to go idle first; subscribers are then told the
    /// new extent.
    pub fn rebuild(&mut self, device: &mut dyn GraphicsDevice) -> Result<Extent2D> {
        device.wait_idle()?;
        let extent = device.swapchain().recreate(self.window_extent)?;
        self.built_for = self.window_extent;
        self.stale = false;
        self.resize_pending = false;
        self.rebuild_count += 1;

        engine_info!("lumen::surface", "Swapchain rebuilt at {}x{}", extent.width, extent.height);
        for (_, callback) in self.subscribers.iter_mut() {
            callback(extent);
        }
        Ok(extent)
    }

    /// Register a rebuild subscriber
    pub fn subscribe(&mut self, callback: RebuildCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, callback));
        id
    }

    /// Remove a subscriber; returns `false` if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
#[path = "surface_manager_tests.rs"]
mod tests;
