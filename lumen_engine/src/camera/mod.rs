//! Camera module
//!
//! One camera is active per renderer. It is a small parameter set that the
//! renderer turns into view/projection matrices once per frame.

mod camera;

pub use camera::{Camera, CameraMatrices};
