/*!
# Lumen Engine

Core of the Lumen real-time 3D renderer.

This crate holds the platform-agnostic parts: the graphics backend traits
(`GraphicsDevice`, `Swapchain`, `CommandList`, GPU resource traits), device
selection, the presentation surface manager, frame synchronization, command
recording, the resource manager with shader hot-reload, and the renderer
façade. Backends (Vulkan) live in their own crates and plug in through
`GraphicsDevice`.

## Architecture

- **Renderer**: façade trait used by the scene and UI layers
- **FrameRenderer**: frame loop over any `GraphicsDevice`
- **ResourceManager**: meshes, textures, programs, models
- **SurfaceManager**: swapchain rebuilds and resize subscribers
- **FrameSync**: slot ring bookkeeping
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod camera;
pub mod graphics_device;
pub mod resource;
pub mod frame;
pub mod surface;
pub mod renderer;

// Main lumen namespace module
pub mod lumen {
    // Error types
    pub use crate::error::{error_message, Error, ErrorClass, ErrorCode, Result};

    // Engine context
    pub use crate::engine::Engine;

    // Configuration
    pub use crate::config::{BackendKind, Config, DebugSeverity, PresentModePreference};

    // Renderer façade
    pub use crate::renderer::{
        FrameRenderer, FrameStatus, RenderState, Renderer, RendererProperties, Resources, SkipReason,
    };

    pub use crate::camera::{Camera, CameraMatrices};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
        pub use crate::log::{min_severity, reset_logger, set_logger, set_min_severity};
    }

    // Backend traits and types
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }

    // Surface sub-module
    pub mod surface {
        pub use crate::surface::*;
    }

    // Frame sub-module
    pub mod frame {
        pub use crate::frame::*;
    }
}

// Re-export math library at crate root
pub use glam;
