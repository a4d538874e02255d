use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3, Vec4};
use tracing::trace;

use veilgate_shared::bounds::Aabb;
use veilgate_shared::camera::{Camera, Eye};
use veilgate_shared::curve::{default_albedo_alpha, default_color_blend, default_refraction, FadeCurve};
use veilgate_shared::geometry::{project_onto_plane, rotate_around_pivot, Plane, Rect2};
use veilgate_shared::transform::Transform;

use crate::backend::{SkyboxId, TextureHandle};

pub const DEFAULT_MAX_RENDERING_DISTANCE: f32 = 5.0;
pub const DEFAULT_CLIPPING_PLANE_OFFSET: f32 = -0.002;
pub const DEFAULT_OBLIQUE_DISABLE_DISTANCE: f32 = 0.02;

/// How far a frustum ray is pushed before falling back to a plane projection.
const FRUSTUM_FALLBACK_REACH: f32 = 25.0;
/// Outward push applied to a shrunk rectangle, relative to its distance from the camera.
const SHRINK_PADDING: f32 = 0.025;
/// Minimum distance of the view-cone projection plane in front of the surface.
const MIN_PROJECTION_OFFSET: f32 = 0.01;

/// `force_eye` value meaning the shader picks the texture of the eye being drawn.
pub const FORCE_EYE_NONE: i32 = -1;

/// Shader-facing state of a portal surface, written every render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialState {
    pub fade_color: Vec4,
    pub current_distance_blend: f32,
    pub albedo_alpha: f32,
    pub refraction: f32,
    pub texture_left: Option<TextureHandle>,
    pub texture_right: Option<TextureHandle>,
    pub force_eye: i32,
    pub transparent: bool,
    pub viewer_position: Vec3,
    pub viewer_direction: Vec3,
}

impl Default for MaterialState {
    fn default() -> Self {
        Self {
            fade_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            current_distance_blend: 0.0,
            albedo_alpha: 0.0,
            refraction: 0.0,
            texture_left: None,
            texture_right: None,
            force_eye: FORCE_EYE_NONE,
            transparent: false,
            viewer_position: Vec3::ZERO,
            viewer_direction: Vec3::NEG_Z,
        }
    }
}

/// Uniform block mirrored from [`MaterialState`] for upload by the host.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct PortalMaterialUniform {
    pub fade_color: [f32; 4],
    pub viewer_position: [f32; 4],
    pub viewer_direction: [f32; 4],
    pub fade_color_blend: f32,
    pub albedo_alpha: f32,
    pub refraction: f32,
    pub force_eye: i32,
    pub use_transparency: u32,
    pub _padding: [u32; 3],
}

/// The renderable rectangle of a portal. Local +Z points into the portal;
/// the viewer side is local -Z.
#[derive(Debug, Clone)]
pub struct PortalSurface {
    pub transform: Transform,
    /// Mesh bounds in surface-local space.
    pub local_bounds: Aabb,
    pub enabled: bool,
    pub has_material: bool,
    /// Host-reported mesh visibility for the current camera.
    pub renderer_visible: bool,
    pub max_rendering_distance: f32,
    pub clipping_plane_offset: f32,
    pub require_oblique_projection: bool,
    pub near_distance_to_start_disabling_oblique: f32,
    pub use_color_blending: bool,
    pub color_blend_curve: FadeCurve,
    pub use_albedo_alpha_fading: bool,
    pub albedo_alpha_curve: FadeCurve,
    pub use_refraction_fading: bool,
    pub refraction_curve: FadeCurve,
    pub custom_skybox: Option<SkyboxId>,
    pub material: MaterialState,
    was_too_far: bool,
}

impl Default for PortalSurface {
    fn default() -> Self {
        Self::new(Transform::IDENTITY, Aabb::new(Vec3::new(-0.5, -0.5, 0.0), Vec3::new(0.5, 0.5, 0.0)))
    }
}

impl PortalSurface {
    pub fn new(transform: Transform, local_bounds: Aabb) -> Self {
        Self {
            transform,
            local_bounds,
            enabled: true,
            has_material: true,
            renderer_visible: true,
            max_rendering_distance: DEFAULT_MAX_RENDERING_DISTANCE,
            clipping_plane_offset: DEFAULT_CLIPPING_PLANE_OFFSET,
            require_oblique_projection: true,
            near_distance_to_start_disabling_oblique: DEFAULT_OBLIQUE_DISABLE_DISTANCE,
            use_color_blending: true,
            color_blend_curve: default_color_blend(),
            use_albedo_alpha_fading: false,
            albedo_alpha_curve: default_albedo_alpha(),
            use_refraction_fading: false,
            refraction_curve: default_refraction(),
            custom_skybox: None,
            material: MaterialState::default(),
            was_too_far: false,
        }
    }

    /// Rectangle of `width` by `height` centred on the surface origin.
    pub fn rectangle(transform: Transform, width: f32, height: f32) -> Self {
        let half = Vec3::new(width * 0.5, height * 0.5, 0.0);
        Self::new(transform, Aabb::new(-half, half))
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    pub fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    pub fn forward(&self) -> Vec3 {
        self.transform.forward()
    }

    /// Surface plane whose positive side is the viewer side.
    pub fn plane(&self) -> Plane {
        Plane::from_normal_and_point(-self.forward(), self.position())
    }

    pub fn world_aabb(&self) -> Aabb {
        self.local_bounds.transformed(self.transform.matrix())
    }

    /// Closest point of the mesh bounds to `position`, flattened onto the surface plane.
    pub fn closest_point_flattened(&self, position: Vec3) -> Vec3 {
        let on_bounds = self.world_aabb().closest_point(position);
        self.plane().closest_point(on_bounds)
    }

    pub fn distance_to(&self, position: Vec3) -> f32 {
        self.closest_point_flattened(position).distance(position)
    }

    /// World rectangle of the mesh bounds, ordered bottom-left, bottom-right,
    /// top-left, top-right, moved `offset` toward the viewer side.
    pub fn world_bounds(&self, offset: f32) -> [Vec3; 4] {
        let min = self.local_bounds.min;
        let max = self.local_bounds.max;
        let shift = -self.forward() * offset;
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
        ]
        .map(|corner| self.transform.transform_point(corner) + shift)
    }

    /// Intersection of the camera's view cone on the surface plane with the
    /// surface rectangle, in the same corner order as [`Self::world_bounds`].
    /// Falls back to the full rectangle when the two do not overlap.
    pub fn shrink_to_visible_bounds(&self, camera: &Camera, offset: f32) -> [Vec3; 4] {
        let bounds = self.world_bounds(offset);
        let nudge = if offset < MIN_PROJECTION_OFFSET {
            MIN_PROJECTION_OFFSET - offset.max(0.0)
        } else {
            0.0
        };
        let plane = Plane::from_normal_and_point(-self.forward(), self.position() - self.forward() * (offset + nudge));
        let eye = camera.position();
        let pivot = self.position();
        let unrotate = self.rotation().inverse();

        let on_plane = camera.world_frustum_corners(1.0).map(|corner| {
            project_onto_plane(eye, corner, &plane)
                .unwrap_or_else(|| plane.closest_point(eye + (corner - eye) * FRUSTUM_FALLBACK_REACH))
        });

        let flat_frustum = on_plane.map(|p| rotate_around_pivot(p, pivot, unrotate));
        let flat_bounds = bounds.map(|p| rotate_around_pivot(p, pivot, unrotate));

        let frustum_rect = Rect2::from_points(flat_frustum.iter().map(|p| p.truncate()));
        let bounds_rect = Rect2::from_points(flat_bounds.iter().map(|p| p.truncate()));

        let Some(visible) = frustum_rect.intersection(&bounds_rect) else {
            return bounds;
        };

        let z = flat_frustum[0].z;
        [
            Vec3::new(visible.min.x, visible.min.y, z),
            Vec3::new(visible.max.x, visible.min.y, z),
            Vec3::new(visible.min.x, visible.max.y, z),
            Vec3::new(visible.max.x, visible.max.y, z),
        ]
        .map(|p| {
            let p = rotate_around_pivot(p, pivot, self.rotation());
            p + (p - eye) * SHRINK_PADDING
        })
    }

    /// Whether this surface should be rendered for `camera`.
    ///
    /// With `ignore_distance` unset, a surface beyond its maximum rendering
    /// distance is rejected and, on the frame it crosses that limit, its
    /// material is snapped to the fully faded look.
    pub fn is_visible(&mut self, camera: &Camera, ignore_distance: bool, near_offset: f32, ignore_culling: bool) -> bool {
        if !self.enabled || !self.has_material {
            return false;
        }
        if !ignore_culling && !self.renderer_visible {
            return false;
        }

        let to_camera = camera.position() - self.position();
        if (-self.forward()).dot(to_camera) < -near_offset {
            return false;
        }

        if !ignore_distance {
            let too_far = self.distance_to(camera.position()) > self.max_rendering_distance;
            if too_far && !self.was_too_far {
                trace!("Portal surface at {} moved out of rendering distance", self.position());
                self.force_fully_faded();
            }
            self.was_too_far = too_far;
            if too_far {
                return false;
            }
        }

        let mut frustum = camera.frustum();
        frustum.loosen_near(camera.forward(), near_offset);
        frustum.intersects_aabb(&self.world_aabb())
    }

    /// Writes the result of one render into the material.
    ///
    /// At `depth >= recursions + 1` nothing was rendered for this surface, so
    /// it takes the fully faded look regardless of texture or distance.
    pub fn update_material(&mut self, eye: Eye, texture: Option<TextureHandle>, depth: u32, distance: f32, recursions: u32) {
        if !self.has_material {
            return;
        }
        if depth >= recursions + 1 {
            self.force_fully_faded();
            return;
        }

        self.material.force_eye = eye.index();
        if let Some(texture) = texture {
            match eye {
                Eye::Left => self.material.texture_left = Some(texture),
                Eye::Right => self.material.texture_right = Some(texture),
            }
        }
        self.enable_transparency();

        let t = if self.max_rendering_distance > 0.0 {
            distance / self.max_rendering_distance
        } else {
            1.0
        };
        if self.use_color_blending {
            self.material.current_distance_blend = self.color_blend_curve.evaluate(t);
        }
        if self.use_albedo_alpha_fading {
            self.material.albedo_alpha = self.albedo_alpha_curve.evaluate(t);
        }
        if self.use_refraction_fading {
            self.material.refraction = self.refraction_curve.evaluate(t);
        }
    }

    fn force_fully_faded(&mut self) {
        if self.use_color_blending {
            self.material.current_distance_blend = self.color_blend_curve.evaluate(1.0);
        }
        if self.use_albedo_alpha_fading {
            self.material.albedo_alpha = self.albedo_alpha_curve.evaluate(1.0);
        }
        if self.use_refraction_fading {
            self.material.refraction = self.refraction_curve.evaluate(1.0);
        }
    }

    pub fn update_viewer_in_material(&mut self, position: Vec3, direction: Vec3) {
        self.material.viewer_position = position;
        self.material.viewer_direction = direction;
    }

    pub fn enable_transparency(&mut self) {
        self.material.transparent = true;
    }

    pub fn disable_transparency(&mut self) {
        self.material.transparent = false;
    }

    pub fn clear_force_eye(&mut self) {
        self.material.force_eye = FORCE_EYE_NONE;
    }

    pub fn force_left_eye(&mut self) {
        self.material.force_eye = Eye::Left.index();
    }

    pub fn set_fade_color(&mut self, color: Vec4) {
        self.material.fade_color = color;
    }

    /// Drops cached textures and fade results, as after a material swap.
    pub fn refresh_material(&mut self) {
        let fade_color = self.material.fade_color;
        self.material = MaterialState {
            fade_color,
            ..MaterialState::default()
        };
        self.was_too_far = false;
    }

    /// Copies the look and distance settings of `source` onto this surface.
    pub fn copy_settings_from(&mut self, source: &PortalSurface) {
        self.has_material = source.has_material;
        self.max_rendering_distance = source.max_rendering_distance;
        self.use_color_blending = source.use_color_blending;
        self.material.fade_color = source.material.fade_color;
        self.color_blend_curve = source.color_blend_curve.clone();
        self.use_albedo_alpha_fading = source.use_albedo_alpha_fading;
        self.albedo_alpha_curve = source.albedo_alpha_curve.clone();
        self.use_refraction_fading = source.use_refraction_fading;
        self.refraction_curve = source.refraction_curve.clone();
        self.clipping_plane_offset = source.clipping_plane_offset;
        self.require_oblique_projection = source.require_oblique_projection;
        self.near_distance_to_start_disabling_oblique = source.near_distance_to_start_disabling_oblique;
    }

    pub fn material_uniform(&self) -> PortalMaterialUniform {
        let m = &self.material;
        PortalMaterialUniform {
            fade_color: m.fade_color.to_array(),
            viewer_position: m.viewer_position.extend(1.0).to_array(),
            viewer_direction: m.viewer_direction.extend(0.0).to_array(),
            fade_color_blend: m.current_distance_blend,
            albedo_alpha: m.albedo_alpha,
            refraction: m.refraction,
            force_eye: m.force_eye,
            use_transparency: u32::from(m.transparent),
            _padding: [0; 3],
        }
    }
}
