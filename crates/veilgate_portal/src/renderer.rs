use glam::Mat4;
use tracing::{debug, info, trace};

use veilgate_shared::camera::{Eye, StereoRig};
use veilgate_shared::transform::Transform;

use crate::backend::{RenderBackend, SkyboxId};
use crate::clipping::{build_clipping_mask, ClippingMask};
use crate::executor::execute;
use crate::frame::FrameContext;
use crate::placement::CameraPlacement;
use crate::pool::TexturePool;
use crate::portal::{PortalId, PortalScene};
use crate::registry::RendererRegistry;
use crate::resolver::Resolver;
use crate::settings::RendererSettings;

/// The camera a renderer draws portals for.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerCamera {
    pub transform: Transform,
    /// Vertical field of view in radians, used for mono rendering.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub stereo: Option<StereoRig>,
    pub skybox: Option<SkyboxId>,
}

impl ViewerCamera {
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov, self.aspect.max(0.0001), self.near, self.far)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// Set when the frame throttle skipped this call.
    pub skipped: bool,
    pub closest_portal: Option<PortalId>,
    pub left: Vec<CameraPlacement>,
    pub right: Vec<CameraPlacement>,
    pub renders: usize,
    pub clipping_mask: Option<ClippingMask>,
}

impl FrameReport {
    pub fn placements(&self) -> usize {
        self.left.len() + self.right.len()
    }
}

/// Draws every visible portal for one viewer camera.
#[derive(Debug)]
pub struct PortalRenderer {
    settings: RendererSettings,
    pool: TexturePool,
    frame: u64,
}

impl PortalRenderer {
    pub fn new(settings: RendererSettings) -> Self {
        let settings = settings.sanitize();
        let pool = TexturePool::new(&settings.quality);
        Self {
            settings,
            pool,
            frame: 0,
        }
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn pool(&self) -> &TexturePool {
        &self.pool
    }

    /// Adopts new settings, dropping pooled textures whose configuration changed.
    pub fn sync_settings(&mut self, settings: RendererSettings, backend: &mut dyn RenderBackend) {
        let settings = settings.sanitize();
        if self.pool.apply_settings(&settings.quality, backend) {
            info!(
                "Portal textures now {}x{}, {} samples",
                settings.quality.texture_size.width,
                settings.quality.texture_size.height,
                settings.quality.anti_aliasing.samples()
            );
        }
        self.settings = settings;
    }

    /// Releases every pooled texture.
    pub fn shutdown(&mut self, backend: &mut dyn RenderBackend) {
        self.pool.clear(backend);
    }

    pub fn render_camera(&mut self, scene: &mut PortalScene, viewer: &ViewerCamera, backend: &mut dyn RenderBackend) -> FrameReport {
        let interval = u64::from(self.settings.quality.frames_needed_to_update) + 1;
        let due = self.frame % interval == 0;
        self.frame = self.frame.wrapping_add(1);
        if !due {
            return FrameReport {
                skipped: true,
                ..FrameReport::default()
            };
        }

        let closest = RendererRegistry::find_closest_portal(scene, viewer.transform.position);
        let ignore_culling_for = closest.and_then(|(id, distance)| (distance < viewer.near).then_some(id));
        let ctx = FrameContext {
            settings: &self.settings,
            viewer: viewer.transform,
            projection: viewer.projection(),
            near: viewer.near,
            far: viewer.far,
            stereo: viewer.stereo,
            ignore_culling_for,
            skybox: viewer.skybox,
        };
        let mut report = FrameReport {
            closest_portal: closest.map(|(id, _)| id),
            ..FrameReport::default()
        };

        if !any_portal_visible(&ctx, scene) {
            trace!("No portal visible from {}", viewer.transform.position);
            return report;
        }

        if self.settings.materials_only {
            let recursions = ctx.recursions();
            let position = viewer.transform.position;
            for surface in scene.surfaces_mut() {
                let distance = surface.distance_to(position);
                surface.update_material(Eye::Left, None, 1, distance, recursions);
            }
            return report;
        }

        backend.frame_started();
        report.left = Resolver::new(&ctx, Eye::Left).resolve_eye(scene);
        report.renders += execute(&ctx, scene, &mut self.pool, backend, Eye::Left, &report.left);

        if ctx.is_stereo() {
            report.right = Resolver::new(&ctx, Eye::Right).resolve_eye(scene);
            report.renders += execute(&ctx, scene, &mut self.pool, backend, Eye::Right, &report.right);
            for surface in scene.surfaces_mut() {
                surface.clear_force_eye();
            }
        } else {
            for surface in scene.surfaces_mut() {
                surface.force_left_eye();
            }
        }

        let forward = ctx.center_camera().forward();
        for surface in scene.surfaces_mut() {
            surface.update_viewer_in_material(viewer.transform.position, forward);
        }

        report.clipping_mask = report
            .closest_portal
            .and_then(|id| build_clipping_mask(&ctx, scene, id));

        debug!(
            "Portal frame: {} placements, {} renders, {} pooled textures",
            report.placements(),
            report.renders,
            self.pool.len()
        );
        backend.frame_finished(report.renders);
        report
    }
}

fn any_portal_visible(ctx: &FrameContext<'_>, scene: &mut PortalScene) -> bool {
    let camera = ctx.center_camera();
    let margin = ctx.stereo_near_margin();
    let ids: Vec<PortalId> = scene
        .iter_active()
        .filter(|(_, portal)| portal.other.is_some())
        .map(|(id, _)| id)
        .collect();

    // Every surface is checked so that each one updates its distance fade.
    let mut visible = false;
    for id in ids {
        let ignore_culling = ctx.ignore_culling_for == Some(id);
        if let Some(surface) = scene.surface_mut(id) {
            visible |= surface.is_visible(&camera, false, margin, ignore_culling);
        }
    }
    visible
}
