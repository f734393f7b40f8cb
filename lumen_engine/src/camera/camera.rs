/// Camera - position, orientation and lens parameters
///
/// The scene layer owns and drives the camera; the renderer keeps a copy of
/// the active one and recomputes its matrices once per frame.

use glam::{Mat4, Vec3};

/// Pitch is kept strictly inside (-90°, 90°) so the view never flips
const MAX_PITCH_DEGREES: f32 = 89.0;

/// Zoom factor range
const MIN_ZOOM: f32 = 1.0;
const MAX_ZOOM: f32 = 10.0;

/// Matrices derived from a camera for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    /// projection * view
    pub view_projection: Mat4,
}

/// Perspective camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Degrees around the world Y axis, -90 looks down -Z
    pub yaw: f32,
    /// Degrees above the horizon
    pub pitch: f32,
    /// Vertical field of view in degrees at zoom 1
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            yaw: -90.0,
            pitch: 0.0,
            fov: 45.0,
            near: 0.1,
            far: 100.0,
            zoom: 1.0,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            yaw,
            pitch: pitch.clamp(-MAX_PITCH_DEGREES, MAX_PITCH_DEGREES),
            ..Self::default()
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Set the zoom factor, clamped to [1, 10]
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Turn the camera by yaw/pitch deltas in degrees
    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw = (self.yaw + delta_yaw) % 360.0;
        self.pitch = (self.pitch + delta_pitch).clamp(-MAX_PITCH_DEGREES, MAX_PITCH_DEGREES);
    }

    /// Unit view direction
    pub fn front(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(Vec3::Y).normalize()
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.front()).normalize()
    }

    /// Field of view actually used for projection, in degrees
    pub fn effective_fov(&self) -> f32 {
        self.fov / self.zoom
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front(), Vec3::Y)
    }

    /// Right-handed perspective with depth in [0, 1] and Y pointing down in
    /// clip space
    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        let mut projection = Mat4::perspective_rh(
            self.effective_fov().to_radians(),
            aspect_ratio.max(f32::EPSILON),
            self.near,
            self.far,
        );
        projection.y_axis.y *= -1.0;
        projection
    }

    /// View, projection and their product for one frame
    pub fn matrices(&self, aspect_ratio: f32) -> CameraMatrices {
        let view = self.view_matrix();
        let projection = self.projection_matrix(aspect_ratio);
        CameraMatrices {
            view,
            projection,
            view_projection: projection * view,
        }
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
