use glam::{Mat4, Vec3};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for point in iter {
            bounds.encapsulate_point(point);
        }
        Some(bounds)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    pub fn encapsulate_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn encapsulate(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Boxes sharing only a face still count as intersecting.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min, self.max)
    }

    /// World box enclosing this local box after `matrix`.
    pub fn transformed(&self, matrix: Mat4) -> Aabb {
        let corners = self.corners().map(|corner| matrix.transform_point3(corner));
        let mut bounds = Aabb {
            min: corners[0],
            max: corners[0],
        };
        for corner in &corners[1..] {
            bounds.encapsulate_point(*corner);
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Quat, Vec3};

    use super::Aabb;

    #[test]
    fn aabb_intersection_includes_touching_faces() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::new(0.5, 0.25, 0.5), Vec3::new(1.5, 1.25, 1.5));
        let c = Aabb::new(Vec3::ONE, Vec3::splat(2.0));
        let d = Aabb::new(Vec3::splat(1.1), Vec3::splat(2.0));

        assert!(a.intersects(&b));
        assert!(a.intersects(&c));
        assert!(!a.intersects(&d));
    }

    #[test]
    fn closest_point_clamps_into_box() {
        let bounds = Aabb::from_center_size(Vec3::ZERO, Vec3::new(2.0, 4.0, 0.0));
        assert_eq!(
            bounds.closest_point(Vec3::new(5.0, -1.0, 3.0)),
            Vec3::new(1.0, -1.0, 0.0)
        );
        assert!(bounds.contains(Vec3::new(0.5, 1.5, 0.0)));
    }

    #[test]
    fn rotated_quad_bounds_grow_to_enclose_corners() {
        let quad = Aabb::from_center_size(Vec3::ZERO, Vec3::new(2.0, 2.0, 0.0));
        let matrix = Mat4::from_rotation_translation(
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            Vec3::new(0.0, 0.0, -3.0),
        );
        let world = quad.transformed(matrix);
        assert!((world.min.z + 4.0).abs() < 1.0e-5);
        assert!((world.max.z + 2.0).abs() < 1.0e-5);
        assert!(world.extents().x.abs() < 1.0e-5);
    }

    #[test]
    fn from_points_is_none_for_empty_input() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());
        let bounds = Aabb::from_points([Vec3::X, Vec3::NEG_Y, Vec3::Z]);
        assert_eq!(
            bounds,
            Some(Aabb::new(Vec3::new(0.0, -1.0, 0.0), Vec3::new(1.0, 0.0, 1.0)))
        );
    }
}
