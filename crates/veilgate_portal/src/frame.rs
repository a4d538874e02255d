use glam::Mat4;

use veilgate_shared::camera::{Camera, Eye, StereoRig};
use veilgate_shared::transform::Transform;

use crate::backend::SkyboxId;
use crate::portal::PortalId;
use crate::settings::RendererSettings;

/// Per-frame state shared by the resolver, executor and clipping code. Built
/// by the renderer for one viewer camera and dropped at the end of the frame.
#[derive(Debug, Clone)]
pub struct FrameContext<'a> {
    pub settings: &'a RendererSettings,
    /// Centre-eye pose of the viewer.
    pub viewer: Transform,
    /// Mono projection at the viewer's own near and far planes.
    pub projection: Mat4,
    pub near: f32,
    pub far: f32,
    pub stereo: Option<StereoRig>,
    /// Portal the viewer is standing in; its renderer visibility is not trusted.
    pub ignore_culling_for: Option<PortalId>,
    /// Skybox of the viewer camera, used by surfaces without their own.
    pub skybox: Option<SkyboxId>,
}

impl<'a> FrameContext<'a> {
    pub fn recursions(&self) -> u32 {
        self.settings.quality.recursions
    }

    pub fn terminal_depth(&self) -> u32 {
        self.settings.quality.terminal_depth()
    }

    pub fn is_stereo(&self) -> bool {
        self.stereo.is_some()
    }

    pub fn ipd(&self) -> f32 {
        self.stereo.map_or(0.0, |rig| rig.ipd)
    }

    /// How far behind a portal plane the viewer may be while the portal could
    /// still cut either eye's near plane.
    pub fn stereo_near_margin(&self) -> f32 {
        self.ipd() * 0.5 + self.near + self.settings.stereo_near_clip_margin
    }

    /// Lossy scale of the viewer rig along x.
    pub fn viewer_scale(&self) -> f32 {
        let scale = self.viewer.scale.x;
        if scale.abs() > f32::EPSILON {
            scale
        } else {
            1.0
        }
    }

    pub fn eye_projection(&self, eye: Eye) -> Mat4 {
        match self.stereo {
            Some(rig) => rig.fov(eye).projection(self.near, self.far),
            None => self.projection,
        }
    }

    /// Camera for `eye`, offset half the IPD along the viewer's right axis
    /// when rendering in stereo.
    pub fn eye_camera(&self, eye: Eye) -> Camera {
        let mut pose = self.viewer;
        if self.is_stereo() {
            pose.position += self.viewer.right() * eye.side() * self.ipd() * 0.5;
        }
        Camera::with_projection(pose, self.eye_projection(eye), self.near, self.far)
    }

    pub fn center_camera(&self) -> Camera {
        Camera::with_projection(self.viewer, self.projection, self.near, self.far)
    }
}
