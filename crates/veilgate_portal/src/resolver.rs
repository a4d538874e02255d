use std::ops::{Deref, DerefMut};

use tracing::trace;

use veilgate_shared::camera::{Camera, Eye};
use veilgate_shared::geometry::{camera_space_plane, closest_point_on_rectangle, make_oblique, off_axis_projection, with_near_far};
use veilgate_shared::transform::portal_transform;

use crate::clipping::near_clipping_offset;
use crate::frame::FrameContext;
use crate::placement::{AncestorChain, CameraPlacement};
use crate::portal::{PortalId, PortalScene};

/// Gap kept between the virtual near plane and the visible part of the exit surface.
const NEAR_PLANE_SLACK: f32 = 0.01;
/// Lower bound of a virtual near plane, relative to the viewer's.
const MIN_NEAR_RATIO: f32 = 0.8;

/// Restores the recursion camera to the pose it had when the guard was taken.
pub struct PoseGuard<'a> {
    camera: &'a mut Camera,
    saved: Camera,
}

impl<'a> PoseGuard<'a> {
    pub fn new(camera: &'a mut Camera) -> Self {
        let saved = camera.clone();
        Self { camera, saved }
    }

    pub fn restore(&mut self) {
        self.camera.clone_from(&self.saved);
    }
}

impl Deref for PoseGuard<'_> {
    type Target = Camera;

    fn deref(&self) -> &Camera {
        self.camera
    }
}

impl DerefMut for PoseGuard<'_> {
    fn deref_mut(&mut self) -> &mut Camera {
        self.camera
    }
}

impl Drop for PoseGuard<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Position of one resolver call within the recursion.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Step {
    /// Distance travelled through the surfaces of the ancestor chain.
    pub previous_distance: f32,
    pub depth: u32,
    pub ancestors: AncestorChain,
}

impl Step {
    pub const ROOT: Self = Self {
        previous_distance: 0.0,
        depth: 1,
        ancestors: AncestorChain::ROOT,
    };
}

/// Walks visible portals for one eye and computes a virtual camera for each,
/// deepest views first.
pub struct Resolver<'f, 'a> {
    ctx: &'f FrameContext<'a>,
    eye: Eye,
}

impl<'f, 'a> Resolver<'f, 'a> {
    pub fn new(ctx: &'f FrameContext<'a>, eye: Eye) -> Self {
        Self { ctx, eye }
    }

    /// Placements for the whole tree under the eye camera, in render order.
    pub fn resolve_eye(&self, scene: &mut PortalScene) -> Vec<CameraPlacement> {
        let mut camera = self.ctx.eye_camera(self.eye);
        let mut out = Vec::new();
        self.resolve(scene, &mut camera, Step::ROOT, &mut out);
        out
    }

    pub fn resolve(&self, scene: &mut PortalScene, camera: &mut Camera, step: Step, out: &mut Vec<CameraPlacement>) {
        let ctx = self.ctx;
        if step.depth > ctx.terminal_depth() {
            return;
        }

        let mut guard = PoseGuard::new(camera);
        let candidates: Vec<PortalId> = scene
            .iter_active()
            .filter(|(_, portal)| portal.surface.is_some() && portal.other.is_some())
            .map(|(id, _)| id)
            .collect();

        for id in candidates {
            let near_offset = if step.depth == 1 {
                near_clipping_offset(ctx, scene, id)
            } else {
                0.0
            };
            let ignore_culling = ctx.ignore_culling_for == Some(id);
            let visible = scene
                .surface_mut(id)
                .is_some_and(|surface| surface.is_visible(&guard, true, near_offset, ignore_culling));
            if !visible {
                continue;
            }

            let Some(surface) = scene.surface(id) else {
                continue;
            };
            let distance = step.previous_distance + surface.distance_to(guard.position());
            if distance > surface.max_rendering_distance {
                trace!("{id} at depth {} is {distance:.2} away, past its rendering distance", step.depth);
                out.push(CameraPlacement::beyond_distance(id, ctx.terminal_depth(), distance, step.ancestors));
                continue;
            }
            let Some(exit) = scene.other(id).and_then(|other| scene.surface(other)) else {
                continue;
            };

            let visible_bounds = surface
                .shrink_to_visible_bounds(&guard, 0.0)
                .map(|p| guard.transform.inverse_transform_point(p));
            let clipping_plane_offset = surface.clipping_plane_offset;
            let oblique = surface.require_oblique_projection;
            let oblique_disable = surface.near_distance_to_start_disabling_oblique;

            guard.transform = portal_transform(&surface.transform, &exit.transform, &guard.transform);
            let pose = guard.transform;
            let occlusion = visible_bounds.map(|p| pose.transform_point(p));
            let plane = exit.plane();
            let side = plane.signed_distance(pose.position);

            let to_surface = closest_point_on_rectangle(&occlusion, pose.position) - pose.position;
            let min_near = guard.forward().dot(to_surface) - NEAR_PLANE_SLACK;
            let near = (min_near + clipping_plane_offset).max(ctx.near * MIN_NEAR_RATIO);
            let far = ctx.far;
            guard.projection = with_near_far(ctx.eye_projection(self.eye), near, far);
            guard.near = near;
            guard.far = far;

            let view = guard.view_matrix();
            let mut projection = guard.projection;
            if oblique && side < -(ctx.near + oblique_disable) {
                let clip = plane.normal.extend(plane.distance - clipping_plane_offset);
                make_oblique(&mut projection, camera_space_plane(view, clip));
            }

            let standard_culling = with_near_far(ctx.eye_projection(self.eye), ctx.near, ctx.far) * view;
            let culling_matrix = if ctx.settings.quality.use_occlusion_culling && -side > ctx.settings.edge_on_epsilon {
                off_axis_projection(far, occlusion[0], occlusion[1], occlusion[2], pose.position)
                    .unwrap_or(standard_culling)
            } else {
                standard_culling
            };
            guard.culling_matrix = culling_matrix;

            self.resolve(
                scene,
                &mut guard,
                Step {
                    previous_distance: distance,
                    depth: step.depth + 1,
                    ancestors: step.ancestors.push_front(id),
                },
                out,
            );
            guard.restore();

            out.push(CameraPlacement {
                surface: id,
                projection,
                view,
                culling_matrix,
                position: pose.position,
                rotation: pose.rotation,
                scale: pose.scale,
                near,
                far,
                depth: step.depth,
                distance,
                ancestors: step.ancestors,
                even: step.depth % 2 != 0,
                beyond_distance: false,
            });
        }
    }
}
