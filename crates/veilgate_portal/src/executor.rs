use tracing::trace;

use veilgate_shared::camera::Eye;

use crate::backend::{RenderBackend, SubRenderOptions, ViewRender};
use crate::frame::FrameContext;
use crate::placement::CameraPlacement;
use crate::pool::TexturePool;
use crate::portal::PortalScene;

/// Renders resolved placements for one eye, deepest first, and writes the
/// resulting textures into the surface materials. Returns the number of
/// sub-renders issued. Every pool lock is released before returning.
pub fn execute(
    ctx: &FrameContext<'_>,
    scene: &mut PortalScene,
    pool: &mut TexturePool,
    backend: &mut dyn RenderBackend,
    eye: Eye,
    placements: &[CameraPlacement],
) -> usize {
    let recursions = ctx.recursions();
    let options = SubRenderOptions::from_quality(&ctx.settings.quality);
    let mut renders = 0;

    for (index, placement) in placements.iter().enumerate() {
        let Some(surface) = scene.surface_mut(placement.surface) else {
            continue;
        };
        if placement.is_terminal(recursions) {
            surface.update_material(eye, None, placement.depth, f32::INFINITY, recursions);
            continue;
        }

        let skybox = surface.custom_skybox.or(ctx.skybox);
        let slot = pool.acquire(eye, backend);
        pool.lock(slot, placement.key(), placement.ancestors.is_root());
        let Some(target) = pool.get(slot).map(|texture| texture.handle) else {
            continue;
        };

        backend.render_view(&ViewRender {
            target,
            surface: placement.surface,
            eye,
            depth: placement.depth,
            view: placement.view,
            projection: placement.projection,
            culling_matrix: placement.culling_matrix,
            use_occlusion_culling: ctx.settings.quality.use_occlusion_culling,
            position: placement.position,
            rotation: placement.rotation,
            near: placement.near,
            far: placement.far,
            skybox,
            options,
        });
        renders += 1;
        trace!(
            "Rendered {} at depth {} into {target:?} for {eye:?}",
            placement.surface,
            placement.depth
        );

        surface.update_material(eye, Some(target), placement.depth, placement.distance, recursions);

        // Rendering this view may have overwritten materials that siblings
        // under the same parent already filled in.
        for (other_index, sibling) in placements.iter().enumerate() {
            if other_index == index || sibling.depth != placement.depth || sibling.ancestors != placement.ancestors {
                continue;
            }
            let Some(texture) = pool.texture_for(sibling.key(), eye) else {
                continue;
            };
            if let Some(surface) = scene.surface_mut(sibling.surface) {
                surface.update_material(eye, Some(texture), sibling.depth, sibling.distance, recursions);
            }
        }
    }

    pool.release_all();
    renders
}
