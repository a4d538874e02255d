use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::frustum::Frustum;
use crate::geometry::{frustum_projection, with_near_far};
use crate::transform::Transform;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    /// Index used by material eye forcing: 0 for left, 1 for right.
    pub fn index(self) -> i32 {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }

    /// Sign of the eye's offset along the head's right axis.
    pub fn side(self) -> f32 {
        match self {
            Eye::Left => -1.0,
            Eye::Right => 1.0,
        }
    }
}

/// Per-eye field of view as tangents of the half angles. `left` and `down`
/// are usually negative.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct EyeFov {
    pub left: f32,
    pub right: f32,
    pub down: f32,
    pub up: f32,
}

impl EyeFov {
    pub fn symmetric(vertical_fov: f32, aspect: f32) -> Self {
        let up = (vertical_fov * 0.5).tan();
        let right = up * aspect;
        Self {
            left: -right,
            right,
            down: -up,
            up,
        }
    }

    pub fn projection(&self, near: f32, far: f32) -> Mat4 {
        frustum_projection(
            self.left * near,
            self.right * near,
            self.down * near,
            self.up * near,
            near,
            far,
        )
    }
}

/// Head-mounted display description: interpupillary distance plus each eye's FOV.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoRig {
    pub ipd: f32,
    pub left: EyeFov,
    pub right: EyeFov,
}

impl StereoRig {
    pub fn fov(&self, eye: Eye) -> EyeFov {
        match eye {
            Eye::Left => self.left,
            Eye::Right => self.right,
        }
    }
}

/// A camera pose with its projection. Cameras look down their local -Z axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub transform: Transform,
    pub projection: Mat4,
    pub culling_matrix: Mat4,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn perspective(transform: Transform, vertical_fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let projection = Mat4::perspective_rh_gl(vertical_fov, aspect.max(0.0001), near, far);
        Self::with_projection(transform, projection, near, far)
    }

    pub fn with_projection(transform: Transform, projection: Mat4, near: f32, far: f32) -> Self {
        let mut camera = Self {
            transform,
            projection,
            culling_matrix: Mat4::IDENTITY,
            near,
            far,
        };
        camera.reset_culling_matrix();
        camera
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    pub fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    pub fn forward(&self) -> Vec3 {
        self.transform.rotation * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.transform.rotation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.transform.rotation * Vec3::Y
    }

    /// World-to-camera matrix. Scale on the pose is ignored.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.transform.rotation, self.transform.position).inverse()
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }

    pub fn reset_culling_matrix(&mut self) {
        self.culling_matrix = self.view_projection();
    }

    /// View volume of the current pose and projection.
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(self.view_projection())
    }

    pub fn set_near_far(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
        self.projection = with_near_far(self.projection, near, far);
    }

    /// Camera-space frustum corners at `distance` along the view axis.
    pub fn frustum_corners(&self, distance: f32) -> [Vec3; 4] {
        frustum_corners_from_projection(self.projection, distance)
    }

    pub fn world_frustum_corners(&self, distance: f32) -> [Vec3; 4] {
        let pose = Transform::from_position_rotation(self.position(), self.rotation());
        self.frustum_corners(distance)
            .map(|corner| pose.transform_point(corner))
    }
}

/// Camera-space corners of a GL projection's view volume at `distance`,
/// ordered bottom-left, top-left, top-right, bottom-right.
pub fn frustum_corners_from_projection(projection: Mat4, distance: f32) -> [Vec3; 4] {
    let corner = |ndc_x: f32, ndc_y: f32| {
        let x = distance * (ndc_x + projection.z_axis.x) / projection.x_axis.x;
        let y = distance * (ndc_y + projection.z_axis.y) / projection.y_axis.y;
        Vec3::new(x, y, -distance)
    };
    [
        corner(-1.0, -1.0),
        corner(-1.0, 1.0),
        corner(1.0, 1.0),
        corner(1.0, -1.0),
    ]
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3, Vec4};

    use super::{frustum_corners_from_projection, Camera, EyeFov};
    use crate::transform::Transform;

    #[test]
    fn corners_match_the_field_of_view() {
        let fov = EyeFov {
            left: -1.0,
            right: 0.5,
            down: -0.25,
            up: 1.0,
        };
        let corners = frustum_corners_from_projection(fov.projection(0.1, 100.0), 2.0);
        let expected = [
            Vec3::new(-2.0, -0.5, -2.0),
            Vec3::new(-2.0, 2.0, -2.0),
            Vec3::new(1.0, 2.0, -2.0),
            Vec3::new(1.0, -0.5, -2.0),
        ];
        for (corner, expected) in corners.iter().zip(expected) {
            assert!(corner.distance(expected) < 1.0e-4, "{corner} != {expected}");
        }
    }

    #[test]
    fn forward_points_down_negative_z() {
        let camera = Camera::perspective(
            Transform::from_position_rotation(Vec3::ZERO, Quat::from_rotation_y(90.0_f32.to_radians())),
            1.2,
            1.0,
            0.1,
            100.0,
        );
        assert!(camera.forward().distance(Vec3::NEG_X) < 1.0e-5);

        let ahead = camera.view_projection() * Vec4::new(-5.0, 0.0, 0.0, 1.0);
        assert!(ahead.w > 0.0);
        assert!((ahead.z / ahead.w).abs() < 1.0);
    }

    #[test]
    fn changing_near_far_keeps_the_corners() {
        let mut camera = Camera::perspective(Transform::IDENTITY, 1.0, 1.5, 0.1, 100.0);
        let before = camera.frustum_corners(3.0);
        camera.set_near_far(0.7, 20.0);
        let after = camera.frustum_corners(3.0);
        for (a, b) in before.iter().zip(after.iter()) {
            assert!(a.distance(*b) < 1.0e-4);
        }
        assert_eq!(camera.near, 0.7);
    }
}
