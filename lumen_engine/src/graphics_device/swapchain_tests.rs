//! Unit tests for swapchain parameter choices

use crate::config::PresentModePreference;
use crate::graphics_device::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format,
    ColorSpace, Extent2D, PresentMode, SurfaceCapabilities, SurfaceFormat, TextureFormat,
};

fn caps(min: u32, max: u32, current: Extent2D) -> SurfaceCapabilities {
    SurfaceCapabilities {
        min_image_count: min,
        max_image_count: max,
        current_extent: current,
        min_image_extent: Extent2D::new(1, 1),
        max_image_extent: Extent2D::new(4096, 4096),
    }
}

fn undefined_extent() -> Extent2D {
    Extent2D::new(u32::MAX, u32::MAX)
}

// ============================================================================
// IMAGE COUNT
// ============================================================================

#[test]
fn test_image_count_is_min_plus_one() {
    assert_eq!(choose_image_count(&caps(2, 8, undefined_extent())), 3);
}

#[test]
fn test_image_count_clamped_to_max() {
    assert_eq!(choose_image_count(&caps(3, 3, undefined_extent())), 3);
}

#[test]
fn test_image_count_unbounded_max() {
    assert_eq!(choose_image_count(&caps(4, 0, undefined_extent())), 5);
}

// ============================================================================
// SURFACE FORMAT
// ============================================================================

#[test]
fn test_surface_format_prefers_srgb_bgra() {
    let formats = [
        SurfaceFormat { format: TextureFormat::R8G8B8A8_UNORM, color_space: ColorSpace::SrgbNonlinear },
        SurfaceFormat { format: TextureFormat::B8G8R8A8_SRGB, color_space: ColorSpace::SrgbNonlinear },
    ];
    assert_eq!(choose_surface_format(&formats).unwrap().format, TextureFormat::B8G8R8A8_SRGB);
}

#[test]
fn test_surface_format_falls_back_to_first() {
    let formats = [
        SurfaceFormat { format: TextureFormat::R8G8B8A8_UNORM, color_space: ColorSpace::Other },
        SurfaceFormat { format: TextureFormat::B8G8R8A8_SRGB, color_space: ColorSpace::Other },
    ];
    assert_eq!(choose_surface_format(&formats).unwrap().format, TextureFormat::R8G8B8A8_UNORM);
}

#[test]
fn test_surface_format_empty() {
    assert_eq!(choose_surface_format(&[]), None);
}

// ============================================================================
// PRESENT MODE
// ============================================================================

#[test]
fn test_present_mode_mailbox_when_available() {
    let modes = [PresentMode::Fifo, PresentMode::Mailbox];
    assert_eq!(choose_present_mode(&modes, PresentModePreference::LowLatency), PresentMode::Mailbox);
}

#[test]
fn test_present_mode_fifo_without_mailbox() {
    let modes = [PresentMode::Immediate, PresentMode::Fifo];
    assert_eq!(choose_present_mode(&modes, PresentModePreference::LowLatency), PresentMode::Fifo);
}

#[test]
fn test_present_mode_vsync_preference() {
    let modes = [PresentMode::Mailbox, PresentMode::Fifo];
    assert_eq!(choose_present_mode(&modes, PresentModePreference::Vsync), PresentMode::Fifo);
}

// ============================================================================
// EXTENT
// ============================================================================

#[test]
fn test_extent_uses_fixed_surface_extent() {
    let c = caps(2, 3, Extent2D::new(800, 600));
    assert_eq!(choose_extent(&c, Extent2D::new(1024, 768)), Extent2D::new(800, 600));
}

#[test]
fn test_extent_uses_window_size_when_undefined() {
    let c = caps(2, 3, undefined_extent());
    assert_eq!(choose_extent(&c, Extent2D::new(1024, 768)), Extent2D::new(1024, 768));
}

#[test]
fn test_extent_clamped_into_limits() {
    let c = caps(2, 3, undefined_extent());
    assert_eq!(choose_extent(&c, Extent2D::new(10000, 0)), Extent2D::new(4096, 1));
}

#[test]
fn test_extent_zero_area_and_aspect() {
    assert!(Extent2D::new(0, 600).is_zero_area());
    assert!(!Extent2D::new(800, 600).is_zero_area());
    assert_eq!(Extent2D::new(0, 0).aspect_ratio(), 1.0);
    assert_eq!(Extent2D::new(800, 400).aspect_ratio(), 2.0);
}
