use glam::{Vec2, Vec3};

use crate::model::camera::Camera;
use crate::model::frustum::Frustum;

/// Everything the terrain needs to know about the viewer for one frame.
#[derive(Clone, Copy, Debug)]
pub struct ViewerState {
    /// Ground-plane (x, z) position used for chunk streaming
    pub position: Vec2,
    pub eye: Vec3,
    pub forward: Vec3,
    pub frustum: Frustum,
}

impl ViewerState {
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            position: camera.ground_position(),
            eye: camera.eye,
            forward: camera.forward(),
            frustum: camera.frustum(),
        }
    }
}
