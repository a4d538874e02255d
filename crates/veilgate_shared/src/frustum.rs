use glam::{Mat4, Vec3};

use crate::bounds::Aabb;
use crate::geometry::Plane;

pub const LEFT: usize = 0;
pub const RIGHT: usize = 1;
pub const BOTTOM: usize = 2;
pub const TOP: usize = 3;
pub const NEAR: usize = 4;
pub const FAR: usize = 5;

/// Six inward-facing planes of a view volume, ordered left, right, bottom,
/// top, near, far.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts planes from a GL-convention view-projection matrix. Degenerate
    /// rows collapse to a plane that accepts everything.
    pub fn from_view_projection(vp: Mat4) -> Self {
        let row0 = vp.row(0);
        let row1 = vp.row(1);
        let row2 = vp.row(2);
        let row3 = vp.row(3);

        let raw = [
            row3 + row0,
            row3 - row0,
            row3 + row1,
            row3 - row1,
            row3 + row2,
            row3 - row2,
        ];

        let planes = raw.map(|row| {
            Plane::from_vec4(row).unwrap_or(Plane::new(Vec3::ZERO, f32::MAX))
        });
        Self { planes }
    }

    pub fn near(&self) -> &Plane {
        &self.planes[NEAR]
    }

    /// Slides the near plane along `direction` by `offset`; a positive offset
    /// along the camera's forward axis lets geometry just behind the camera pass.
    pub fn loosen_near(&mut self, direction: Vec3, offset: f32) {
        self.planes[NEAR].translate(direction, offset);
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(point) >= 0.0)
    }

    /// Conservative box test: a box is rejected only if its most inward
    /// corner is outside some plane.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            let positive = Vec3::select(plane.normal.cmpge(Vec3::ZERO), aabb.max, aabb.min);
            if plane.signed_distance(positive) < 0.0 {
                return false;
            }
        }
        true
    }
}
