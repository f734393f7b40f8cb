/// Resource-level textures
///
/// A texture entry wraps a GPU texture with its canonical source path and a
/// reference count. The GPU texture is released only when the count drops
/// to zero.

use std::path::PathBuf;
use std::sync::Arc;
use crate::graphics_device::{Texture as GpuTexture, TextureDesc, TextureFormat};

/// Checkerboard cell size of the placeholder texture, in pixels
const PLACEHOLDER_CELL: u32 = 8;
/// Placeholder texture side, in pixels
const PLACEHOLDER_SIZE: u32 = 64;

const MAGENTA: [u8; 4] = [255, 0, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

/// Label of the placeholder texture
pub const PLACEHOLDER_LABEL: &str = "<missing texture>";

/// Reference-counted texture
pub struct TextureEntry {
    pub(crate) gpu: Arc<dyn GpuTexture>,
    pub(crate) path: Option<PathBuf>,
    pub(crate) in_use: u32,
}

impl TextureEntry {
    pub fn gpu(&self) -> &Arc<dyn GpuTexture> {
        &self.gpu
    }

    /// Canonical source path, `None` for the placeholder and generated textures
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    /// Reference count
    pub fn in_use(&self) -> u32 {
        self.in_use
    }

    pub fn width(&self) -> u32 {
        self.gpu.info().width
    }

    pub fn height(&self) -> u32 {
        self.gpu.info().height
    }
}

/// Magenta/black checkerboard shown in place of textures that failed to load
pub fn placeholder_texture_desc() -> TextureDesc {
    let mut data = Vec::with_capacity((PLACEHOLDER_SIZE * PLACEHOLDER_SIZE * 4) as usize);
    for y in 0..PLACEHOLDER_SIZE {
        for x in 0..PLACEHOLDER_SIZE {
            let cell = (x / PLACEHOLDER_CELL + y / PLACEHOLDER_CELL) % 2;
            data.extend_from_slice(if cell == 0 { &MAGENTA } else { &BLACK });
        }
    }
    TextureDesc {
        label: PLACEHOLDER_LABEL.to_string(),
        width: PLACEHOLDER_SIZE,
        height: PLACEHOLDER_SIZE,
        format: TextureFormat::R8G8B8A8_SRGB,
        data,
    }
}
