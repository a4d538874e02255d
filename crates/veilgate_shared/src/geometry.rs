use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

const PARALLEL_EPSILON: f32 = 1.0e-6;

/// Plane stored as `dot(normal, p) + distance = 0`. Points on the normal's side
/// have a positive signed distance.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    pub fn from_normal_and_point(normal: Vec3, point: Vec3) -> Self {
        let normal = safe_normalize(normal, Vec3::Z);
        Self {
            normal,
            distance: -normal.dot(point),
        }
    }

    /// Plane from a homogeneous `(a, b, c, d)` vector, normalizing the xyz part.
    pub fn from_vec4(v: Vec4) -> Option<Self> {
        let len = v.truncate().length();
        if len <= 0.0001 {
            return None;
        }
        Some(Self {
            normal: v.truncate() / len,
            distance: v.w / len,
        })
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }

    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point - self.normal * self.signed_distance(point)
    }

    /// Distance along the normalized ray direction to the hit point. Rays running
    /// parallel to the plane, or pointing away from it, miss.
    pub fn raycast(&self, ray: &Ray) -> Option<f32> {
        let direction = ray.direction.normalize_or_zero();
        let denom = direction.dot(self.normal);
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }
        let enter = -(ray.origin.dot(self.normal) + self.distance) / denom;
        (enter > 0.0).then_some(enter)
    }

    /// Moves the plane so that the test region grows by `offset` along `direction`.
    pub fn translate(&mut self, direction: Vec3, offset: f32) {
        self.distance += self.normal.dot(direction) * offset;
    }

    pub fn as_vec4(&self) -> Vec4 {
        self.normal.extend(self.distance)
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction.normalize_or_zero() * distance
    }
}

/// Axis-aligned rectangle in a plane's local 2D coordinates.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rect2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect2 {
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Self {
        let mut min = Vec2::splat(f32::MAX);
        let mut max = Vec2::splat(f32::MIN);
        for point in points {
            min = min.min(point);
            max = max.max(point);
        }
        Self { min, max }
    }

    pub fn overlaps(&self, other: &Rect2) -> bool {
        other.max.x > self.min.x
            && other.min.x < self.max.x
            && other.max.y > self.min.y
            && other.min.y < self.max.y
    }

    /// Shared area of two rects. Touching edges do not count as overlap.
    pub fn intersection(&self, other: &Rect2) -> Option<Rect2> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Rect2 {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        })
    }

    pub fn size(&self) -> Vec2 {
        (self.max - self.min).max(Vec2::ZERO)
    }
}

pub fn safe_normalize(v: Vec3, fallback: Vec3) -> Vec3 {
    let n = v.normalize_or_zero();
    if n.length_squared() > 0.0 {
        n
    } else {
        fallback
    }
}

pub fn rotate_around_pivot(point: Vec3, pivot: Vec3, rotation: Quat) -> Vec3 {
    pivot + rotation * (point - pivot)
}

/// Casts a ray from `origin` through `target` onto `plane`.
pub fn project_onto_plane(origin: Vec3, target: Vec3, plane: &Plane) -> Option<Vec3> {
    let ray = Ray::new(origin, target - origin);
    plane.raycast(&ray).map(|enter| ray.at(enter))
}

/// Rewrites the third row of a GL-style perspective projection so that its near
/// plane coincides with `clip_plane` (camera space, visible side positive).
pub fn make_oblique(projection: &mut Mat4, clip_plane: Vec4) {
    let q = projection.inverse()
        * Vec4::new(clip_plane.x.signum(), clip_plane.y.signum(), 1.0, 1.0);
    let denom = clip_plane.dot(q);
    if denom.abs() < 1e-5 {
        return;
    }

    let c = clip_plane * (2.0 / denom);
    let mut m = projection.to_cols_array_2d();
    m[0][2] = c.x - m[0][3];
    m[1][2] = c.y - m[1][3];
    m[2][2] = c.z - m[2][3];
    m[3][2] = c.w - m[3][3];
    *projection = Mat4::from_cols_array_2d(&m);
}

/// World-space plane expressed in the camera space of `world_to_camera`.
pub fn camera_space_plane(world_to_camera: Mat4, plane: Vec4) -> Vec4 {
    world_to_camera.inverse().transpose() * plane
}

/// GL-convention frustum (clip depth -1..1, camera looking down -Z).
pub fn frustum_projection(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(2.0 * near / (right - left), 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / (top - bottom), 0.0, 0.0),
        Vec4::new(
            (right + left) / (right - left),
            (top + bottom) / (top - bottom),
            (far + near) / (near - far),
            -1.0,
        ),
        Vec4::new(0.0, 0.0, 2.0 * far * near / (near - far), 0.0),
    )
}

/// Replaces the depth terms of a GL perspective projection, keeping its field of view.
pub fn with_near_far(mut projection: Mat4, near: f32, far: f32) -> Mat4 {
    projection.z_axis.z = (far + near) / (near - far);
    projection.w_axis.z = 2.0 * far * near / (near - far);
    projection
}

/// Asymmetric view-projection whose frustum passes exactly through the
/// rectangle `pa` (bottom-left), `pb` (bottom-right), `pc` (top-left) as seen
/// from `eye`. The near plane is the rectangle's plane.
///
/// When the eye sits behind the rectangle the up axis is mirrored so the
/// frustum does not come out inverted. Returns `None` when the eye is in the
/// rectangle's plane.
pub fn off_axis_projection(
    far: f32,
    mut pa: Vec3,
    mut pb: Vec3,
    mut pc: Vec3,
    eye: Vec3,
) -> Option<Mat4> {
    let vr = pb - pa;
    let mut vu = pc - pa;
    let mut va = pa - eye;
    let mut vb = pb - eye;
    let mut vc = pc - eye;

    if va.cross(vc).dot(vb) < 0.0 {
        vu = -vu;
        pa = pc;
        pb = pa + vr;
        pc = pa + vu;
        va = pa - eye;
        vb = pb - eye;
        vc = pc - eye;
    }

    let vr = vr.normalize_or_zero();
    let vu = vu.normalize_or_zero();
    let vn = vr.cross(vu).normalize_or_zero();
    if vn == Vec3::ZERO {
        return None;
    }

    let d = -va.dot(vn);
    if d.abs() < PARALLEL_EPSILON || !d.is_finite() {
        return None;
    }
    let near = d;

    let l = vr.dot(va);
    let r = vr.dot(vb);
    let b = vu.dot(va);
    let t = vu.dot(vc);
    if (r - l).abs() < PARALLEL_EPSILON || (t - b).abs() < PARALLEL_EPSILON {
        return None;
    }

    let projection = frustum_projection(l, r, b, t, near, far);
    let rotation = Mat4::from_mat3(Mat3::from_cols(vr, vu, vn).transpose());
    let translation = Mat4::from_translation(-eye);
    Some(projection * rotation * translation)
}

/// Closest point on a rectangle given as `[bottom_left, bottom_right, top_left, top_right]`.
pub fn closest_point_on_rectangle(points: &[Vec3; 4], query: Vec3) -> Vec3 {
    let a = points[0];
    let b = points[1];
    let c = points[3];
    let d = points[2];

    let ab = b - a;
    let ad = d - a;
    let normal = ab.cross(ad).normalize_or_zero();
    let on_plane = query - normal * (query - a).dot(normal);

    let ap = on_plane - a;
    let along_ab = ab.dot(ap);
    let along_ad = ad.dot(ap);
    if along_ab >= 0.0 && along_ab <= ab.dot(ab) && along_ad >= 0.0 && along_ad <= ad.dot(ad) {
        return on_plane;
    }

    let edges = [a, b, c, d];
    let mut closest = a;
    let mut closest_distance = f32::MAX;
    for i in 0..4 {
        let candidate = closest_point_on_segment(edges[i], edges[(i + 1) % 4], query);
        let distance = candidate.distance_squared(query);
        if distance < closest_distance {
            closest_distance = distance;
            closest = candidate;
        }
    }
    closest
}

pub fn closest_point_on_segment(start: Vec3, end: Vec3, query: Vec3) -> Vec3 {
    let segment = end - start;
    let length_sq = segment.length_squared();
    if length_sq <= f32::EPSILON {
        return start;
    }
    let t = ((query - start).dot(segment) / length_sq).clamp(0.0, 1.0);
    start + segment * t
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3, Vec4};

    use super::{
        closest_point_on_rectangle, make_oblique, off_axis_projection, project_onto_plane,
        with_near_far, Plane, Ray, Rect2,
    };

    fn assert_mat_near(a: Mat4, b: Mat4, eps: f32) {
        let a = a.to_cols_array();
        let b = b.to_cols_array();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() <= eps, "{a:?} != {b:?}");
        }
    }

    fn assert_vec_near(a: Vec3, b: Vec3) {
        assert!(a.distance(b) < 1.0e-4, "{a} != {b}");
    }

    #[test]
    fn plane_raycast_hits_only_in_front_of_origin() {
        let plane = Plane::from_normal_and_point(Vec3::Z, Vec3::new(0.0, 0.0, 2.0));
        let hit = plane.raycast(&Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 4.0)));
        assert_eq!(hit, Some(2.0));

        assert!(plane.raycast(&Ray::new(Vec3::ZERO, Vec3::NEG_Z)).is_none());
        assert!(plane.raycast(&Ray::new(Vec3::ZERO, Vec3::X)).is_none());
    }

    #[test]
    fn projection_onto_plane_fails_when_looking_away() {
        let plane = Plane::from_normal_and_point(Vec3::Y, Vec3::ZERO);
        let hit = project_onto_plane(Vec3::new(0.0, 2.0, 0.0), Vec3::new(1.0, 1.0, 0.0), &plane);
        assert_vec_near(hit.unwrap_or(Vec3::NAN), Vec3::new(2.0, 0.0, 0.0));

        let miss = project_onto_plane(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 3.0, 0.0), &plane);
        assert!(miss.is_none());
    }

    #[test]
    fn oblique_patch_with_existing_near_plane_is_identity() {
        let near = 0.3;
        let projection = Mat4::perspective_rh_gl(70.0_f32.to_radians(), 1.6, near, 500.0);
        let mut patched = projection;
        make_oblique(&mut patched, Vec4::new(0.0, 0.0, -1.0, -near));
        assert_mat_near(patched, projection, 1.0e-4);
    }

    #[test]
    fn oblique_patch_moves_near_plane_onto_clip_plane() {
        let projection = Mat4::perspective_rh_gl(60.0_f32.to_radians(), 1.0, 0.1, 100.0);
        let mut patched = projection;
        // Everything closer than 5 units is clipped.
        make_oblique(&mut patched, Vec4::new(0.0, 0.0, -1.0, -5.0));
        let on_plane = patched * Vec4::new(0.0, 0.0, -5.0, 1.0);
        assert!((on_plane.z / on_plane.w + 1.0).abs() < 1.0e-3);
    }

    #[test]
    fn near_far_rewrite_matches_fresh_projection() {
        let fov = 80.0_f32.to_radians();
        let rewritten = with_near_far(Mat4::perspective_rh_gl(fov, 1.2, 0.1, 10.0), 0.5, 300.0);
        assert_mat_near(rewritten, Mat4::perspective_rh_gl(fov, 1.2, 0.5, 300.0), 1.0e-4);
    }

    #[test]
    fn off_axis_front_and_back_views_are_mirrored() {
        let pa = Vec3::new(-1.0, -1.0, 0.0);
        let pb = Vec3::new(1.0, -1.0, 0.0);
        let pc = Vec3::new(-1.0, 1.0, 0.0);

        let front = off_axis_projection(100.0, pa, pb, pc, Vec3::new(0.0, 0.0, 5.0))
            .unwrap_or(Mat4::ZERO);
        let corner = front.project_point3(Vec3::new(1.0, 1.0, 0.0));
        assert_vec_near(corner, Vec3::new(1.0, 1.0, -1.0));

        let back = off_axis_projection(100.0, pa, pb, pc, Vec3::new(0.0, 0.0, -5.0))
            .unwrap_or(Mat4::ZERO);
        let corner = back.project_point3(Vec3::new(1.0, 1.0, 0.0));
        // Seen from behind the top edge maps to the bottom of clip space, depth stays on near.
        assert!((corner.x - 1.0).abs() < 1.0e-4);
        assert!((corner.y + 1.0).abs() < 1.0e-4);
        assert!((corner.z + 1.0).abs() < 1.0e-4);
    }

    #[test]
    fn off_axis_is_none_when_edge_on() {
        let pa = Vec3::new(-1.0, -1.0, 0.0);
        let pb = Vec3::new(1.0, -1.0, 0.0);
        let pc = Vec3::new(-1.0, 1.0, 0.0);
        assert!(off_axis_projection(100.0, pa, pb, pc, Vec3::new(4.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn closest_point_inside_rectangle_is_plane_projection() {
        let rect = [
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ];
        assert_vec_near(
            closest_point_on_rectangle(&rect, Vec3::new(0.25, -0.5, 3.0)),
            Vec3::new(0.25, -0.5, 0.0),
        );
    }

    #[test]
    fn closest_point_outside_rectangle_lands_on_nearest_edge() {
        let rotation = glam::Quat::from_rotation_y(0.7);
        let rect = [
            rotation * Vec3::new(-1.0, -1.0, 0.0),
            rotation * Vec3::new(1.0, -1.0, 0.0),
            rotation * Vec3::new(-1.0, 1.0, 0.0),
            rotation * Vec3::new(1.0, 1.0, 0.0),
        ];
        let query = rotation * Vec3::new(3.0, 0.5, 2.0);
        assert_vec_near(
            closest_point_on_rectangle(&rect, query),
            rotation * Vec3::new(1.0, 0.5, 0.0),
        );

        let corner_query = rotation * Vec3::new(4.0, 5.0, -1.0);
        assert_vec_near(
            closest_point_on_rectangle(&rect, corner_query),
            rotation * Vec3::new(1.0, 1.0, 0.0),
        );
    }

    #[test]
    fn rect_intersection_requires_strict_overlap() {
        let a = Rect2::from_points([glam::Vec2::new(0.0, 0.0), glam::Vec2::new(2.0, 2.0)]);
        let b = Rect2::from_points([glam::Vec2::new(1.0, 1.0), glam::Vec2::new(3.0, 4.0)]);
        let c = Rect2::from_points([glam::Vec2::new(2.0, 0.0), glam::Vec2::new(3.0, 1.0)]);

        let shared = a.intersection(&b);
        assert_eq!(
            shared,
            Some(Rect2 {
                min: glam::Vec2::new(1.0, 1.0),
                max: glam::Vec2::new(2.0, 2.0),
            })
        );
        assert!(a.intersection(&c).is_none());
    }
}
