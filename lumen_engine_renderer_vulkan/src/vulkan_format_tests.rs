//! Unit tests for Vulkan conversion functions
//!
//! Pure mappings between engine types and Vulkan enums; no GPU required.

use ash::vk;
use lumen_engine::lumen::device::{
    choose_extent, choose_image_count, choose_surface_format, AdapterType, BufferUsage, ColorSpace,
    Extent2D, IndexType, PolygonMode, PresentMode, ShaderStage, ShaderStageFlags, TextureFormat,
};
use super::*;

// ============================================================================
// TEXTURE FORMATS
// ============================================================================

#[test]
fn test_texture_format_to_vk_color_formats() {
    assert_eq!(texture_format_to_vk(TextureFormat::R8G8B8A8_SRGB), vk::Format::R8G8B8A8_SRGB);
    assert_eq!(texture_format_to_vk(TextureFormat::R8G8B8A8_UNORM), vk::Format::R8G8B8A8_UNORM);
    assert_eq!(texture_format_to_vk(TextureFormat::B8G8R8A8_SRGB), vk::Format::B8G8R8A8_SRGB);
    assert_eq!(texture_format_to_vk(TextureFormat::B8G8R8A8_UNORM), vk::Format::B8G8R8A8_UNORM);
}

#[test]
fn test_texture_format_to_vk_depth_and_undefined() {
    assert_eq!(texture_format_to_vk(TextureFormat::D32_FLOAT), vk::Format::D32_SFLOAT);
    assert_eq!(texture_format_to_vk(TextureFormat::Undefined), vk::Format::UNDEFINED);
}

#[test]
fn test_vk_to_texture_format_inverts_known_formats() {
    for format in [
        TextureFormat::R8G8B8A8_SRGB,
        TextureFormat::R8G8B8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB,
        TextureFormat::B8G8R8A8_UNORM,
        TextureFormat::D32_FLOAT,
    ] {
        assert_eq!(vk_to_texture_format(texture_format_to_vk(format)), format);
    }
}

#[test]
fn test_vk_to_texture_format_unknown_is_undefined() {
    assert_eq!(vk_to_texture_format(vk::Format::R16G16B16A16_SFLOAT), TextureFormat::Undefined);
    assert_eq!(vk_to_texture_format(vk::Format::A2B10G10R10_UNORM_PACK32), TextureFormat::Undefined);
}

// ============================================================================
// SURFACE FORMATS AND SWAPCHAIN PARAMETERS
// ============================================================================

#[test]
fn test_surface_format_color_space() {
    let srgb = vk_to_surface_format(&vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    });
    assert_eq!(srgb.format, TextureFormat::B8G8R8A8_SRGB);
    assert_eq!(srgb.color_space, ColorSpace::SrgbNonlinear);

    let hdr = vk_to_surface_format(&vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_UNORM,
        color_space: vk::ColorSpaceKHR::HDR10_ST2084_EXT,
    });
    assert_eq!(hdr.color_space, ColorSpace::Other);
}

#[test]
fn test_converted_surface_formats_prefer_bgra_srgb() {
    let available: Vec<_> = [
        vk::SurfaceFormatKHR { format: vk::Format::R8G8B8A8_UNORM, color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR },
        vk::SurfaceFormatKHR { format: vk::Format::B8G8R8A8_SRGB, color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR },
    ]
    .iter()
    .map(vk_to_surface_format)
    .collect();

    let chosen = choose_surface_format(&available).unwrap();
    assert_eq!(texture_format_to_vk(chosen.format), vk::Format::B8G8R8A8_SRGB);
}

#[test]
fn test_surface_capabilities_conversion() {
    let caps = vk::SurfaceCapabilitiesKHR {
        min_image_count: 2,
        max_image_count: 0,
        current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
        min_image_extent: vk::Extent2D { width: 1, height: 1 },
        max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
        ..Default::default()
    };

    let converted = vk_to_surface_capabilities(&caps);
    assert_eq!(choose_image_count(&converted), 3);
    assert_eq!(choose_extent(&converted, Extent2D::new(8000, 600)), Extent2D::new(4096, 600));
}

#[test]
fn test_present_mode_round_trip_and_unknown() {
    for mode in [PresentMode::Immediate, PresentMode::Mailbox, PresentMode::Fifo, PresentMode::FifoRelaxed] {
        assert_eq!(vk_to_present_mode(present_mode_to_vk(mode)), Some(mode));
    }
    assert_eq!(vk_to_present_mode(vk::PresentModeKHR::SHARED_DEMAND_REFRESH), None);
}

#[test]
fn test_extent_conversion() {
    let extent = Extent2D::new(1280, 720);
    assert_eq!(vk_to_extent(extent_to_vk(extent)), extent);
}

// ============================================================================
// ADAPTERS
// ============================================================================

#[test]
fn test_adapter_type_mapping() {
    assert_eq!(vk_to_adapter_type(vk::PhysicalDeviceType::DISCRETE_GPU), AdapterType::Discrete);
    assert_eq!(vk_to_adapter_type(vk::PhysicalDeviceType::INTEGRATED_GPU), AdapterType::Integrated);
    assert_eq!(vk_to_adapter_type(vk::PhysicalDeviceType::VIRTUAL_GPU), AdapterType::Virtual);
    assert_eq!(vk_to_adapter_type(vk::PhysicalDeviceType::CPU), AdapterType::Cpu);
    assert_eq!(vk_to_adapter_type(vk::PhysicalDeviceType::OTHER), AdapterType::Other);
}

#[test]
fn test_api_version_string() {
    assert_eq!(api_version_string(vk::make_api_version(0, 1, 3, 268)), "1.3.268");
    assert_eq!(api_version_string(vk::API_VERSION_1_0), "1.0.0");
}

// ============================================================================
// PIPELINE STATE
// ============================================================================

#[test]
fn test_buffer_usage_mapping() {
    assert_eq!(buffer_usage_to_vk(BufferUsage::Vertex), vk::BufferUsageFlags::VERTEX_BUFFER);
    assert_eq!(buffer_usage_to_vk(BufferUsage::Index), vk::BufferUsageFlags::INDEX_BUFFER);
    assert_eq!(buffer_usage_to_vk(BufferUsage::Uniform), vk::BufferUsageFlags::UNIFORM_BUFFER);
}

#[test]
fn test_shader_stage_mapping() {
    assert_eq!(shader_stage_to_vk(ShaderStage::Vertex), vk::ShaderStageFlags::VERTEX);
    assert_eq!(shader_stage_to_vk(ShaderStage::Fragment), vk::ShaderStageFlags::FRAGMENT);
    assert_eq!(shader_stage_to_vk(ShaderStage::Geometry), vk::ShaderStageFlags::GEOMETRY);
}

#[test]
fn test_stage_flags_mapping() {
    let flags = ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT;
    assert_eq!(
        stage_flags_to_vk(flags),
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    );
    assert_eq!(stage_flags_to_vk(ShaderStageFlags::empty()), vk::ShaderStageFlags::empty());
    assert_eq!(
        stage_flags_to_vk(ShaderStageFlags::all()),
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT | vk::ShaderStageFlags::GEOMETRY
    );
}

#[test]
fn test_polygon_and_index_mapping() {
    assert_eq!(polygon_mode_to_vk(PolygonMode::Fill), vk::PolygonMode::FILL);
    assert_eq!(polygon_mode_to_vk(PolygonMode::Line), vk::PolygonMode::LINE);
    assert_eq!(index_type_to_vk(IndexType::U16), vk::IndexType::UINT16);
    assert_eq!(index_type_to_vk(IndexType::U32), vk::IndexType::UINT32);
}
