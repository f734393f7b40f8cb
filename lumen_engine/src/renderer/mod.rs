/// Renderer module - the façade trait and its frame-loop implementation

pub mod renderer;
pub mod frame_renderer;

pub use renderer::*;
pub use frame_renderer::FrameRenderer;
