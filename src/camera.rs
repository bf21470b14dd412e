//! Orbit camera used for billboard facing, depth sorting and projection.

use glam::{Mat4, Vec3};

/// Pitch stays this far from straight up/down.
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.1;

/// Orbit camera for viewing particle effects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Horizontal rotation angle in radians.
    pub yaw: f32,
    /// Vertical rotation angle in radians.
    pub pitch: f32,
    /// Distance from the target point.
    pub distance: f32,
    /// Point the camera orbits around.
    pub target: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Viewport width / height.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Create a new camera with default positioning.
    pub fn new() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.3,
            distance: 10.0,
            target: Vec3::ZERO,
            fov_y: 45f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn with_target(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }

    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = distance;
        self
    }

    /// Set yaw and pitch in radians. Pitch is clamped short of the poles.
    pub fn with_angles(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    /// Calculate the camera's world position.
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    /// Calculate the view matrix for rendering.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Camera right vector in world space.
    pub fn right(&self) -> Vec3 {
        self.view_matrix().row(0).truncate()
    }

    /// Camera up vector in world space.
    pub fn up(&self) -> Vec3 {
        self.view_matrix().row(1).truncate()
    }

    /// Squared distance from the eye, used for back-to-front sorting.
    pub fn depth_sq(&self, point: Vec3) -> f32 {
        self.position().distance_squared(point)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
