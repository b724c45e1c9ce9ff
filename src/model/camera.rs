use glam::{Mat4, Vec2, Vec3};

use crate::model::frustum::Frustum;

pub struct Camera {
    pub eye: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            eye: Vec3::new(0.0, 30.0, 0.0),
            yaw: 0.0,
            pitch: 0.0,
            up: Vec3::Y,
            fov_y: 60f32.to_radians(),
            aspect: width as f32 / height.max(1) as f32,
            z_near: 0.1,
            z_far: 1024.0,
        }
    }

    pub fn forward(&self) -> Vec3 {
        let cy = self.yaw;
        let cp = self.pitch.clamp(-1.5533, 1.5533); // Slightly less than π/2 to avoid gimbal lock
        Vec3::new(cy.cos() * cp.cos(), cp.sin(), cy.sin() * cp.cos()).normalize()
    }

    pub fn target(&self) -> Vec3 { self.eye + self.forward() }

    pub fn view_proj(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye, self.target(), self.up);
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far);
        proj * view
    }

    pub fn set_look_at(&mut self, target: Vec3) {
        let dir = (target - self.eye).normalize();
        self.yaw = dir.z.atan2(dir.x);
        self.pitch = dir.y.asin().clamp(-1.4, 1.4);
    }

    /// Position on the ground plane, the input to chunk streaming.
    pub fn ground_position(&self) -> Vec2 {
        Vec2::new(self.eye.x, self.eye.z)
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_matrix(self.view_proj())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_look_at_points_forward() {
        let mut cam = Camera::new(800, 600);
        cam.eye = Vec3::new(0.0, 10.0, 0.0);
        cam.set_look_at(Vec3::new(100.0, 10.0, 0.0));
        let f = cam.forward();
        assert!((f - Vec3::X).length() < 1e-4, "forward {f:?}");
    }

    #[test]
    fn test_frustum_sees_target() {
        let mut cam = Camera::new(800, 600);
        cam.eye = Vec3::new(0.0, 10.0, 0.0);
        cam.set_look_at(Vec3::new(0.0, 10.0, -50.0));
        let frustum = cam.frustum();
        assert!(frustum.check_sphere(Vec3::new(0.0, 10.0, -50.0), 1.0));
        assert!(!frustum.check_sphere(Vec3::new(0.0, 10.0, 50.0), 1.0));
        assert_eq!(cam.ground_position(), Vec2::new(0.0, 0.0));
    }
}
