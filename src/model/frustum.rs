use glam::{Mat4, Vec3, Vec4};

/// View frustum extracted from a view-projection matrix.
///
/// Planes are stored as `[a, b, c, d]` with `ax + by + cz + d >= 0` inside.
/// Depth follows wgpu's [0, 1] clip range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
    corners: [Vec3; 8],
}

pub const LEFT: usize = 0;
pub const RIGHT: usize = 1;
pub const TOP: usize = 2;
pub const BOTTOM: usize = 3;
pub const NEAR: usize = 4;
pub const FAR: usize = 5;

impl Frustum {
    pub fn from_matrix(view_proj: Mat4) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r2 = view_proj.row(2);
        let r3 = view_proj.row(3);

        let mut planes = [Vec4::ZERO; 6];
        planes[LEFT] = r3 + r0;
        planes[RIGHT] = r3 - r0;
        planes[TOP] = r3 - r1;
        planes[BOTTOM] = r3 + r1;
        planes[NEAR] = r2;
        planes[FAR] = r3 - r2;

        for plane in planes.iter_mut() {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        let inv = view_proj.inverse();
        let mut corners = [Vec3::ZERO; 8];
        let mut i = 0;
        for z in [0.0, 1.0] {
            for y in [-1.0, 1.0] {
                for x in [-1.0, 1.0] {
                    let p = inv * Vec4::new(x, y, z, 1.0);
                    corners[i] = p.truncate() / p.w;
                    i += 1;
                }
            }
        }

        Self { planes, corners }
    }

    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    /// World-space frustum corners, near face first.
    pub fn corners(&self) -> &[Vec3; 8] {
        &self.corners
    }

    fn distance(plane: Vec4, p: Vec3) -> f32 {
        plane.truncate().dot(p) + plane.w
    }

    pub fn check_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| Self::distance(*plane, center) >= -radius)
    }

    /// Conservative AABB test. Rejects a box when all of its corners are behind
    /// one frustum plane, or when all frustum corners are beyond one box face.
    /// The second pass removes most false positives of large boxes near the
    /// frustum edges.
    pub fn check_box(&self, min: Vec3, max: Vec3) -> bool {
        let box_corners = [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ];

        for plane in &self.planes {
            if box_corners.iter().all(|c| Self::distance(*plane, *c) < 0.0) {
                return false;
            }
        }

        let fc = &self.corners;
        for axis in 0..3 {
            if fc.iter().all(|c| c[axis] > max[axis]) || fc.iter().all(|c| c[axis] < min[axis]) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_down_negative_z() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 500.0);
        Frustum::from_matrix(proj * view)
    }

    #[test]
    fn test_sphere_inside_and_behind() {
        let f = looking_down_negative_z();
        assert!(f.check_sphere(Vec3::new(0.0, 0.0, -10.0), 1.0));
        assert!(!f.check_sphere(Vec3::new(0.0, 0.0, 10.0), 1.0));
        // beyond the far plane, but the radius reaches back inside
        assert!(!f.check_sphere(Vec3::new(0.0, 0.0, -520.0), 5.0));
        assert!(f.check_sphere(Vec3::new(0.0, 0.0, -520.0), 30.0));
    }

    #[test]
    fn test_planes_are_normalized() {
        let f = looking_down_negative_z();
        for plane in f.planes() {
            assert!((plane.truncate().length() - 1.0).abs() < 1e-4);
        }
        // near plane faces the view direction
        assert!(f.planes()[NEAR].z < 0.0);
    }

    #[test]
    fn test_corners_span_near_and_far() {
        let f = looking_down_negative_z();
        let corners = f.corners();
        for c in &corners[..4] {
            assert!((c.z + 0.1).abs() < 1e-3, "near corner {c:?}");
        }
        for c in &corners[4..] {
            assert!((c.z + 500.0).abs() < 0.5, "far corner {c:?}");
        }
    }

    #[test]
    fn test_box_tests() {
        let f = looking_down_negative_z();
        assert!(f.check_box(Vec3::new(-5.0, -5.0, -30.0), Vec3::new(5.0, 5.0, -20.0)));
        // box enclosing the camera
        assert!(f.check_box(Vec3::splat(-1.0), Vec3::splat(1.0)));
        // entirely behind
        assert!(!f.check_box(Vec3::new(-5.0, -5.0, 20.0), Vec3::new(5.0, 5.0, 30.0)));
        // far off to the side
        assert!(!f.check_box(Vec3::new(400.0, -5.0, -30.0), Vec3::new(410.0, 5.0, -20.0)));
    }

    #[test]
    fn test_box_enclosing_whole_frustum_is_kept() {
        let f = looking_down_negative_z();
        let (min, max) = (Vec3::splat(-2000.0), Vec3::splat(2000.0));
        assert!(f.corners().iter().all(|c| c.cmpge(min).all() && c.cmple(max).all()));
        assert!(f.check_box(min, max));
    }

    #[test]
    fn test_box_beside_far_corner_is_rejected() {
        let f = looking_down_negative_z();
        let (min, max) = (Vec3::new(300.0, -5.0, -700.0), Vec3::new(600.0, 5.0, -450.0));
        // no single plane has every box corner behind it
        let corners = [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, max.y, max.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
        ];
        for plane in f.planes() {
            assert!(corners.iter().any(|c| plane.truncate().dot(*c) + plane.w >= 0.0));
        }
        // but every frustum corner lies left of the box
        assert!(f.corners().iter().all(|c| c.x < min.x));
        assert!(!f.check_box(min, max));
    }

    #[test]
    fn test_orthographic_box_contains_everything_inside() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 1000.0, 0.0), Vec3::ZERO, Vec3::NEG_Z);
        let proj = Mat4::orthographic_rh(-2000.0, 2000.0, -2000.0, 2000.0, 0.1, 5000.0);
        let f = Frustum::from_matrix(proj * view);
        assert!(f.check_box(Vec3::new(-120.0, -20.0, -120.0), Vec3::new(120.0, 40.0, 120.0)));
        assert!(f.check_box(Vec3::new(1800.0, -20.0, 1800.0), Vec3::new(1900.0, 40.0, 1900.0)));
        assert!(!f.check_box(Vec3::new(2100.0, -20.0, 0.0), Vec3::new(2200.0, 40.0, 100.0)));
    }
}
