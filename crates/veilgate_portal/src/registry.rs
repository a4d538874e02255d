use std::fmt;

use glam::Vec3;
use tracing::debug;

use crate::portal::{PortalId, PortalScene};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RendererId(pub u32);

impl fmt::Display for RendererId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "renderer#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct RendererEntry {
    id: RendererId,
    name: String,
}

/// Renderers attached to the viewer cameras of a scene. The first one
/// registered is the master and runs the once-per-frame work; when it goes
/// away the oldest remaining renderer takes over.
#[derive(Debug, Clone, Default)]
pub struct RendererRegistry {
    renderers: Vec<RendererEntry>,
    next_id: u32,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>) -> RendererId {
        let id = RendererId(self.next_id);
        self.next_id += 1;
        let name = name.into();
        debug!("Registered {id} ({name})");
        self.renderers.push(RendererEntry { id, name });
        id
    }

    pub fn unregister(&mut self, id: RendererId) -> bool {
        let before = self.renderers.len();
        self.renderers.retain(|entry| entry.id != id);
        let removed = self.renderers.len() != before;
        if removed {
            if let Some(master) = self.renderers.first() {
                debug!("{id} unregistered, master is now {} ({})", master.id, master.name);
            }
        }
        removed
    }

    pub fn master(&self) -> Option<RendererId> {
        self.renderers.first().map(|entry| entry.id)
    }

    pub fn is_master(&self, id: RendererId) -> bool {
        self.master() == Some(id)
    }

    pub fn name(&self, id: RendererId) -> Option<&str> {
        self.renderers
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// Active portal whose surface is nearest to `position`, with that distance.
    pub fn find_closest_portal(scene: &PortalScene, position: Vec3) -> Option<(PortalId, f32)> {
        scene
            .iter_active()
            .filter_map(|(id, portal)| {
                let surface = portal.surface.as_ref()?;
                surface.enabled.then(|| (id, surface.distance_to(position)))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::RendererRegistry;
    use crate::portal::{Portal, PortalScene};
    use crate::surface::PortalSurface;
    use veilgate_shared::transform::Transform;

    #[test]
    fn master_passes_to_the_oldest_renderer() {
        let mut registry = RendererRegistry::new();
        let first = registry.register("left hand");
        let second = registry.register("spectator");
        assert!(registry.is_master(first));

        assert!(registry.unregister(first));
        assert!(!registry.unregister(first));
        assert!(registry.is_master(second));
        assert_eq!(registry.name(second), Some("spectator"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn closest_portal_ignores_inactive_ones() {
        let mut scene = PortalScene::new();
        let near = scene.add(Portal::new(
            "near",
            PortalSurface::rectangle(Transform::from_position(Vec3::new(0.0, 0.0, 1.0)), 1.0, 1.0),
        ));
        let far = scene.add(Portal::new(
            "far",
            PortalSurface::rectangle(Transform::from_position(Vec3::new(0.0, 0.0, 4.0)), 1.0, 1.0),
        ));

        let (closest, distance) = RendererRegistry::find_closest_portal(&scene, Vec3::ZERO).unwrap();
        assert_eq!(closest, near);
        assert!((distance - 1.0).abs() < 1.0e-5);

        scene.get_mut(near).unwrap().active = false;
        assert_eq!(RendererRegistry::find_closest_portal(&scene, Vec3::ZERO).map(|(id, _)| id), Some(far));
        assert!(RendererRegistry::find_closest_portal(&PortalScene::new(), Vec3::ZERO).is_none());
    }
}
