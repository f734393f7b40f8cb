//! Presentation surface management

mod surface_manager;
mod window;

pub use surface_manager::{RebuildCallback, SubscriptionId, SurfaceManager, SurfaceStatus};
pub use window::SurfaceWindow;
