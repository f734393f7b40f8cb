//! Window collaborator
//!
//! A window the renderer can present to: raw handles for surface creation
//! plus the current framebuffer size in pixels.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use crate::graphics_device::Extent2D;

pub trait SurfaceWindow: HasDisplayHandle + HasWindowHandle {
    /// Framebuffer size in physical pixels; zero while minimized
    fn framebuffer_size(&self) -> Extent2D;
}

impl SurfaceWindow for winit::window::Window {
    fn framebuffer_size(&self) -> Extent2D {
        let size = self.inner_size();
        Extent2D::new(size.width, size.height)
    }
}
