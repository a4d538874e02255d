use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use tracing::trace;

use veilgate_shared::bounds::Aabb;
use veilgate_shared::camera::Eye;
use veilgate_shared::geometry::Ray;
use veilgate_shared::transform::Transform;

use crate::backend::TextureHandle;
use crate::frame::FrameContext;
use crate::portal::{PortalId, PortalScene};
use crate::surface::{PortalSurface, FORCE_EYE_NONE};

const CORNER_PADDING: f32 = 0.05;
/// Room behind the eye, for a viewer walking backwards into a portal.
const EYE_PADDING: f32 = 0.2;
/// Distance of the mask in front of the near plane.
const MASK_NEAR_OFFSET: f32 = 0.01;
/// Added to the scaled near distance when testing the near box against a trigger.
const INTERSECT_NEAR_PADDING: f32 = 0.01;
pub const MAX_CLIP_VERTICES: usize = 5;

/// Fan over the five mask vertices, vertex 0 shared by every triangle.
pub const CLIP_INDICES: [u16; 9] = [0, 1, 2, 0, 3, 1, 0, 4, 3];

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ClipVertex {
    pub position: [f32; 3],
}

/// Polygon covering the part of an eye's near plane that lies past a portal.
/// Vertices are local to `origin`, a frame just in front of the near plane.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippingMesh {
    pub eye: Eye,
    pub origin: Transform,
    pub vertices: [ClipVertex; MAX_CLIP_VERTICES],
    /// Distinct polygon corners, 3 to 5.
    pub corner_count: usize,
}

impl ClippingMesh {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes() -> &'static [u8] {
        bytemuck::cast_slice(&CLIP_INDICES)
    }

    pub fn world_vertices(&self) -> [Vec3; MAX_CLIP_VERTICES] {
        self.vertices
            .map(|v| self.origin.transform_point(Vec3::from_array(v.position)))
    }
}

/// Mask state for the portal closest to the viewer, copied from its surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippingMask {
    pub portal: PortalId,
    pub left: Option<ClippingMesh>,
    pub right: Option<ClippingMesh>,
    pub fade_color: Vec4,
    pub distance_blend: f32,
    pub texture_left: Option<TextureHandle>,
    pub texture_right: Option<TextureHandle>,
    pub force_eye: i32,
}

impl ClippingMask {
    pub fn is_visible(&self) -> bool {
        self.left.is_some() || self.right.is_some()
    }
}

/// World-space near-plane corners of `eye`, ordered bottom-left, top-left,
/// top-right, bottom-right.
pub fn frustum_near_corners(ctx: &FrameContext<'_>, eye: Eye) -> [Vec3; 4] {
    frustum_corners_at(ctx, eye, ctx.near)
}

fn frustum_corners_at(ctx: &FrameContext<'_>, eye: Eye, near: f32) -> [Vec3; 4] {
    ctx.eye_camera(eye).world_frustum_corners(near / ctx.viewer_scale())
}

/// Larger of the two depth-scale ratios between a portal and its partner.
fn pair_scale_factor(entry: &PortalSurface, exit: &PortalSurface) -> f32 {
    let ratio = entry.transform.scale.z / exit.transform.scale.z;
    if ratio.is_finite() && ratio > 0.0 {
        ratio.max(ratio.recip())
    } else {
        1.0
    }
}

/// Corners of `eye` just past its near plane when they touch the trigger
/// volume of `portal`. Portals without a partner or a trigger never intersect.
pub fn frustum_intersects_portal(ctx: &FrameContext<'_>, scene: &PortalScene, portal: PortalId, eye: Eye) -> Option<[Vec3; 4]> {
    let entry = scene.get(portal)?;
    let exit = scene.surface(entry.other?)?;
    let trigger = entry.transporter.as_ref()?.trigger_bounds?;
    let surface = entry.surface.as_ref()?;

    let center = ctx.viewer.position;
    let facing = (surface.plane().closest_point(center) - center).dot(surface.forward());
    if facing < -ctx.stereo_near_margin() {
        return None;
    }

    // A scaled pair shrinks the view on one side, so look further ahead.
    let near = ctx.near * pair_scale_factor(surface, exit) + INTERSECT_NEAR_PADDING;
    let corners = frustum_corners_at(ctx, eye, near);
    let mut near_box = Aabb::from_center_size(corners[0], Vec3::splat(CORNER_PADDING));
    for corner in &corners[1..] {
        near_box.encapsulate(&Aabb::from_center_size(*corner, Vec3::splat(CORNER_PADDING)));
    }
    near_box.encapsulate(&Aabb::from_center_size(
        ctx.eye_camera(eye).position(),
        Vec3::splat(EYE_PADDING),
    ));

    near_box.intersects(&trigger).then_some(corners)
}

/// Largest distance a near-plane corner of either eye reaches past the plane
/// of `portal`, or zero when neither eye's near box touches its trigger.
pub fn near_clipping_offset(ctx: &FrameContext<'_>, scene: &PortalScene, portal: PortalId) -> f32 {
    let left = frustum_intersects_portal(ctx, scene, portal, Eye::Left);
    let right = if ctx.is_stereo() {
        frustum_intersects_portal(ctx, scene, portal, Eye::Right)
    } else {
        None
    };
    if left.is_none() && right.is_none() {
        return 0.0;
    }
    let Some(surface) = scene.surface(portal) else {
        return 0.0;
    };

    let plane = surface.plane();
    let forward = surface.forward();
    let mut corners: Vec<Vec3> = frustum_near_corners(ctx, Eye::Left).to_vec();
    if ctx.is_stereo() {
        corners.extend(frustum_near_corners(ctx, Eye::Right));
    }

    corners
        .into_iter()
        .filter_map(|corner| {
            let to_plane = plane.closest_point(corner) - corner;
            (to_plane.dot(forward) < 0.0).then(|| to_plane.length())
        })
        .fold(0.0, f32::max)
}

/// Mask polygon for `eye` against `portal`, or `None` when the eye's near
/// plane does not cross it with at least three corners.
pub fn build_clipping_mesh(ctx: &FrameContext<'_>, scene: &PortalScene, portal: PortalId, eye: Eye) -> Option<ClippingMesh> {
    let corners = frustum_intersects_portal(ctx, scene, portal, eye)?;
    let surface = scene.surface(portal)?;
    let plane = surface.plane();
    let forward = surface.forward();

    let mut points: Vec<Vec3> = Vec::with_capacity(MAX_CLIP_VERTICES);
    for i in 0..4 {
        let corner = corners[i];
        let facing = (plane.closest_point(corner) - corner).dot(forward);
        if facing < 0.0 {
            points.push(corner);
            continue;
        }
        for neighbour in [corners[(i + 3) % 4], corners[(i + 1) % 4]] {
            let ray = Ray::new(corner, neighbour - corner);
            if let Some(enter) = plane.raycast(&ray) {
                if enter < corner.distance(neighbour) {
                    points.push(ray.at(enter));
                }
            }
        }
    }

    if points.len() < 3 {
        trace!("Clipping mask for {portal} ({eye:?}) degenerate with {} corners", points.len());
        return None;
    }
    points.truncate(MAX_CLIP_VERTICES);

    let viewer = ctx.center_camera();
    let origin = Transform::from_position_rotation(
        viewer.position() + viewer.forward() * (ctx.near + MASK_NEAR_OFFSET),
        viewer.rotation(),
    );
    let local: Vec<Vec3> = points
        .iter()
        .map(|p| origin.inverse_transform_point(*p))
        .collect();

    let (v3, v4) = match local.len() {
        3 => (local[2], local[2]),
        4 => (local[3], local[3]),
        _ => (local[4], local[3]),
    };
    let vertices = [local[2], local[0], local[1], v3, v4].map(|p| ClipVertex {
        position: p.to_array(),
    });

    Some(ClippingMesh {
        eye,
        origin,
        vertices,
        corner_count: local.len(),
    })
}

/// Mask for the portal nearest the viewer, with both eyes in stereo.
pub fn build_clipping_mask(ctx: &FrameContext<'_>, scene: &PortalScene, portal: PortalId) -> Option<ClippingMask> {
    let surface = scene.surface(portal)?;
    let material = &surface.material;
    let left = build_clipping_mesh(ctx, scene, portal, Eye::Left);
    let (right, texture_right, force_eye) = if ctx.is_stereo() {
        (
            build_clipping_mesh(ctx, scene, portal, Eye::Right),
            material.texture_right,
            FORCE_EYE_NONE,
        )
    } else {
        (None, None, Eye::Left.index())
    };

    Some(ClippingMask {
        portal,
        left,
        right,
        fade_color: material.fade_color,
        distance_blend: material.current_distance_blend,
        texture_left: material.texture_left,
        texture_right,
        force_eye,
    })
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use glam::{Mat4, Quat, Vec3};

    use super::{
        build_clipping_mask, build_clipping_mesh, frustum_intersects_portal, near_clipping_offset, ClippingMesh,
        CLIP_INDICES,
    };
    use crate::frame::FrameContext;
    use crate::portal::{Portal, PortalId, PortalScene};
    use crate::settings::RendererSettings;
    use crate::surface::PortalSurface;
    use crate::transporter::PortalTransporter;
    use veilgate_shared::bounds::Aabb;
    use veilgate_shared::camera::Eye;
    use veilgate_shared::transform::Transform;

    fn scene() -> (PortalScene, PortalId) {
        let mut scene = PortalScene::new();
        let trigger = Aabb::from_center_size(Vec3::ZERO, Vec3::new(2.0, 2.0, 1.0));
        let a = scene.add(
            Portal::new("a", PortalSurface::rectangle(Transform::IDENTITY, 2.0, 2.0))
                .with_transporter(PortalTransporter::new(trigger)),
        );
        let b = scene.add(Portal::new(
            "b",
            PortalSurface::rectangle(Transform::from_position(Vec3::new(0.0, 0.0, 20.0)), 2.0, 2.0),
        ));
        scene.link(a, b);
        (scene, a)
    }

    fn frame(settings: &RendererSettings, viewer: Transform) -> FrameContext<'_> {
        FrameContext {
            settings,
            viewer,
            projection: Mat4::perspective_rh_gl(90.0_f32.to_radians(), 1.0, 0.1, 100.0),
            near: 0.1,
            far: 100.0,
            stereo: None,
            ignore_culling_for: None,
            skybox: None,
        }
    }

    /// Viewer on the front side of portal `a`, looking into it, `z` in front of the plane.
    fn viewer_at(z: f32, yaw: f32) -> Transform {
        Transform::from_position_rotation(Vec3::new(0.0, 0.0, z), Quat::from_rotation_y(PI + yaw))
    }

    #[test]
    fn far_viewer_does_not_touch_the_portal() {
        let settings = RendererSettings::default();
        let (scene, a) = scene();
        let ctx = frame(&settings, viewer_at(-3.0, 0.0));
        assert!(frustum_intersects_portal(&ctx, &scene, a, Eye::Left).is_none());
        assert_eq!(near_clipping_offset(&ctx, &scene, a), 0.0);
        assert!(build_clipping_mesh(&ctx, &scene, a, Eye::Left).is_none());
    }

    #[test]
    fn straddling_viewer_gets_an_offset_and_a_mask() {
        let settings = RendererSettings::default();
        let (scene, a) = scene();
        // Eye 5 cm in front of the plane, turned so one side of the near plane crosses it.
        let ctx = frame(&settings, viewer_at(-0.05, 1.2));

        let offset = near_clipping_offset(&ctx, &scene, a);
        assert!(offset > 0.0 && offset < 0.2, "{offset}");

        let mesh = build_clipping_mesh(&ctx, &scene, a, Eye::Left).expect("mask");
        assert!((3..=5).contains(&mesh.corner_count));
        for p in mesh.world_vertices() {
            assert!(p.z >= -1.0e-4, "mask vertex {p} in front of the portal");
        }
    }

    #[test]
    fn looking_straight_through_masks_the_whole_near_plane() {
        let settings = RendererSettings::default();
        let (scene, a) = scene();
        let ctx = frame(&settings, viewer_at(-0.05, 0.0));
        let mesh = build_clipping_mesh(&ctx, &scene, a, Eye::Left).expect("mask");
        assert_eq!(mesh.corner_count, 4);
        assert_eq!(mesh.vertex_bytes().len(), 5 * 12);
        assert_eq!(ClippingMesh::index_bytes().len(), CLIP_INDICES.len() * 2);
    }

    #[test]
    fn near_plane_short_of_the_portal_is_degenerate() {
        let settings = RendererSettings::default();
        let (scene, a) = scene();
        let ctx = frame(&settings, viewer_at(-0.15, 0.0));
        assert!(frustum_intersects_portal(&ctx, &scene, a, Eye::Left).is_some());
        assert!(build_clipping_mesh(&ctx, &scene, a, Eye::Left).is_none());

        let mask = build_clipping_mask(&ctx, &scene, a).unwrap();
        assert!(!mask.is_visible());
        assert_eq!(mask.force_eye, 0);
        assert_eq!(mask.portal, a);
    }

    /// Portal `a` with a 2 cm deep trigger, linked to `b` at `exit_scale`.
    fn thin_trigger_scene(exit_scale: f32) -> (PortalScene, PortalId) {
        let mut scene = PortalScene::new();
        let trigger = Aabb::from_center_size(Vec3::ZERO, Vec3::new(2.0, 2.0, 0.02));
        let a = scene.add(
            Portal::new("a", PortalSurface::rectangle(Transform::IDENTITY, 2.0, 2.0))
                .with_transporter(PortalTransporter::new(trigger)),
        );
        let b_pose = Transform::from_position(Vec3::new(0.0, 0.0, 20.0)).with_scale(Vec3::splat(exit_scale));
        let b = scene.add(Portal::new("b", PortalSurface::rectangle(b_pose, 2.0, 2.0)));
        scene.link(a, b);
        (scene, a)
    }

    #[test]
    fn scaled_pairs_test_the_near_box_further_ahead() {
        let settings = RendererSettings::default();
        let ctx = frame(&settings, viewer_at(-0.2, 0.0));

        let (scene, a) = thin_trigger_scene(1.0);
        assert!(frustum_intersects_portal(&ctx, &scene, a, Eye::Left).is_none());

        // Either direction of the ratio widens the test the same way.
        for scale in [2.0, 0.5] {
            let (scene, a) = thin_trigger_scene(scale);
            let corners = frustum_intersects_portal(&ctx, &scene, a, Eye::Left).expect("near box reaches the trigger");
            for corner in corners {
                assert!((corner.z - 0.01).abs() < 1.0e-4, "{corner}");
            }
        }
    }
}
