/// Texture trait and texture descriptor

use std::any::Any;
use crate::error::{Error, Result};

/// Texture pixel formats
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    D32_FLOAT,
    /// Any format the engine does not name
    Undefined,
}

impl TextureFormat {
    /// Size of one pixel in bytes
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Undefined => 0,
            _ => 4,
        }
    }

    pub fn is_srgb(self) -> bool {
        matches!(self, TextureFormat::R8G8B8A8_SRGB | TextureFormat::B8G8R8A8_SRGB)
    }

    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::D32_FLOAT)
    }
}

/// Descriptor for creating a sampled 2D texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    /// Debug label (usually the source path)
    pub label: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format
    pub format: TextureFormat,
    /// Tightly packed pixel data (row-major)
    pub data: Vec<u8>,
}

impl TextureDesc {
    /// Check dimensions and data size
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidResource(format!(
                "Texture '{}' has zero size ({}x{})",
                self.label, self.width, self.height
            )));
        }
        if self.format == TextureFormat::Undefined || self.format.is_depth() {
            return Err(Error::InvalidResource(format!(
                "Texture '{}' has unsupported format {:?}",
                self.label, self.format
            )));
        }
        let expected = self.width as usize * self.height as usize * self.format.bytes_per_pixel() as usize;
        if self.data.len() != expected {
            return Err(Error::InvalidResource(format!(
                "Texture '{}' data size mismatch: expected {} bytes, got {}",
                self.label, expected, self.data.len()
            )));
        }
        Ok(())
    }
}

/// Texture properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Texture resource trait
///
/// Implemented by backend-specific texture types. The GPU image is released
/// when the last reference is dropped.
pub trait Texture: Send + Sync + Any {
    /// Get texture properties
    fn info(&self) -> &TextureInfo;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}
