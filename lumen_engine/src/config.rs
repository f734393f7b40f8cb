//! Renderer configuration
//!
//! Built in code by the application entry point and handed to the backend
//! factory at startup.

use crate::log::LogSeverity;

/// Rendering backend family, chosen once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Explicit-API backend (the implemented one)
    Vulkan,
    /// Immediate-context backend (not compiled into this build)
    OpenGl,
}

impl BackendKind {
    /// Display name used in logs and properties
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Vulkan => "Vulkan",
            BackendKind::OpenGl => "OpenGL",
        }
    }
}

/// Debug message severity level for validation layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// All messages (verbose)
    All,
}

/// Preferred presentation behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentModePreference {
    /// Mailbox when available, FIFO otherwise
    LowLatency,
    /// Always FIFO
    Vsync,
}

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the driver
    pub app_name: String,
    /// Backend family
    pub backend: BackendKind,
    /// Number of frames the CPU may record ahead of the GPU (clamped to 1..=3)
    pub frames_in_flight: usize,
    /// Enable validation layers
    pub enable_validation: bool,
    /// Validation message severity
    pub debug_severity: DebugSeverity,
    /// Swapchain present mode preference
    pub present_mode: PresentModePreference,
    /// Clear color of the main pass
    pub clear_color: [f32; 4],
    /// Watch shader sources and rebuild programs when they change
    pub hot_reload: bool,
    /// Request line-rasterization support so wireframe mode is available
    pub wireframe_support: bool,
    /// Minimum severity forwarded to the logger
    pub log_level: LogSeverity,
}

impl Config {
    /// Frames in flight after clamping
    pub fn effective_frames_in_flight(&self) -> usize {
        self.frames_in_flight.clamp(1, 3)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Lumen Application".to_string(),
            backend: BackendKind::Vulkan,
            frames_in_flight: 2,
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            present_mode: PresentModePreference::LowLatency,
            clear_color: [0.1, 0.1, 0.12, 1.0],
            hot_reload: cfg!(debug_assertions),
            wireframe_support: true,
            log_level: LogSeverity::Info,
        }
    }
}
