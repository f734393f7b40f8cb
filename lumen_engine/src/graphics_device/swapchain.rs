/// Swapchain trait - for window presentation
///
/// Also holds the backend-independent parameter choices (image count, format,
/// present mode, extent) so they can be tested without a surface.

use crate::config::PresentModePreference;
use crate::error::Result;
use crate::graphics_device::TextureFormat;

/// Size of a 2D surface in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (minimized window)
    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width / height, 1.0 for a zero-area extent
    pub fn aspect_ratio(&self) -> f32 {
        if self.is_zero_area() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Presentation modes a surface may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    Fifo,
    FifoRelaxed,
}

/// Color space of a surface format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    SrgbNonlinear,
    Other,
}

/// A format/color-space pair supported by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: TextureFormat,
    pub color_space: ColorSpace,
}

/// Capabilities reported by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// 0 means unbounded
    pub max_image_count: u32,
    /// `u32::MAX` in both dimensions means the window decides
    pub current_extent: Extent2D,
    pub min_image_extent: Extent2D,
    pub max_image_extent: Extent2D,
}

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is ready; `suboptimal` asks for a rebuild after this frame
    Acquired { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface
    OutOfDate,
}

/// Result of presenting a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Swapchain for presenting rendered images to a window
///
/// Image acquisition uses the "image available" signal of the given frame
/// slot; presentation waits on the "render finished" signal of the image.
pub trait Swapchain {
    /// Acquire the next available swapchain image for a frame slot
    fn acquire_next_image(&mut self, slot: usize) -> Result<AcquireOutcome>;

    /// Present a rendered image
    ///
    /// # Arguments
    ///
    /// * `slot` - Frame slot that rendered the image
    /// * `image_index` - Index of the image to present (from acquire_next_image)
    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome>;

    /// Recreate the swapchain and its dependent objects
    ///
    /// The caller waits for the device to be idle first. Returns the extent
    /// that was actually used.
    fn recreate(&mut self, requested: Extent2D) -> Result<Extent2D>;

    /// Get the number of images in the swapchain
    fn image_count(&self) -> usize;

    /// Current extent of the swapchain images
    fn extent(&self) -> Extent2D;

    /// Get the pixel format of the swapchain images
    fn format(&self) -> TextureFormat;
}

// ============================================================================
// Parameter choices
// ============================================================================

/// `min + 1`, clamped to `max` when the surface bounds it
pub fn choose_image_count(caps: &SurfaceCapabilities) -> u32 {
    let count = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

/// sRGB 8-bit BGRA if available, else the first supported format
pub fn choose_surface_format(available: &[SurfaceFormat]) -> Option<SurfaceFormat> {
    available
        .iter()
        .find(|f| f.format == TextureFormat::B8G8R8A8_SRGB && f.color_space == ColorSpace::SrgbNonlinear)
        .or_else(|| available.first())
        .copied()
}

/// Mailbox when available and low latency is preferred, FIFO otherwise
pub fn choose_present_mode(available: &[PresentMode], preference: PresentModePreference) -> PresentMode {
    if preference == PresentModePreference::LowLatency && available.contains(&PresentMode::Mailbox) {
        PresentMode::Mailbox
    } else {
        PresentMode::Fifo
    }
}

/// The surface's fixed extent, or the window size clamped into the surface limits
pub fn choose_extent(caps: &SurfaceCapabilities, window: Extent2D) -> Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        Extent2D {
            width: window.width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: window.height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
