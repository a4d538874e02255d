use std::fmt;

use tracing::{debug, warn};

use crate::surface::PortalSurface;
use crate::transporter::PortalTransporter;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortalId(pub usize);

impl fmt::Display for PortalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "portal#{}", self.0)
    }
}

/// One end of a portal pair, owning its surface and optional transporter.
#[derive(Debug, Clone)]
pub struct Portal {
    pub name: String,
    pub other: Option<PortalId>,
    pub surface: Option<PortalSurface>,
    pub transporter: Option<PortalTransporter>,
    pub has_wall_collider: bool,
    pub active: bool,
}

impl Portal {
    pub fn new(name: impl Into<String>, surface: PortalSurface) -> Self {
        Self {
            name: name.into(),
            other: None,
            surface: Some(surface),
            transporter: None,
            has_wall_collider: false,
            active: true,
        }
    }

    pub fn with_transporter(mut self, transporter: PortalTransporter) -> Self {
        self.transporter = Some(transporter);
        self
    }
}

/// Arena of portals addressed by [`PortalId`]. Ids stay valid for the life
/// of the scene.
#[derive(Debug, Clone, Default)]
pub struct PortalScene {
    portals: Vec<Portal>,
}

impl PortalScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut portal: Portal) -> PortalId {
        let id = PortalId(self.portals.len());
        if let Some(transporter) = portal.transporter.as_mut() {
            transporter.bind_owner(id);
        }
        debug!("Registered {id} ({})", portal.name);
        self.portals.push(portal);
        id
    }

    /// Pairs `a` and `b` in both directions, unlinking any previous partners.
    pub fn link(&mut self, a: PortalId, b: PortalId) {
        if a.0 >= self.portals.len() || b.0 >= self.portals.len() {
            warn!("Ignoring link between unknown portals {a} and {b}");
            return;
        }
        for id in [a, b] {
            if let Some(previous) = self.portals[id.0].other.take() {
                if let Some(partner) = self.portals.get_mut(previous.0) {
                    partner.other = None;
                }
            }
        }
        self.portals[a.0].other = Some(b);
        self.portals[b.0].other = Some(a);
    }

    pub fn len(&self) -> usize {
        self.portals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portals.is_empty()
    }

    pub fn get(&self, id: PortalId) -> Option<&Portal> {
        self.portals.get(id.0)
    }

    pub fn get_mut(&mut self, id: PortalId) -> Option<&mut Portal> {
        self.portals.get_mut(id.0)
    }

    pub fn surface(&self, id: PortalId) -> Option<&PortalSurface> {
        self.get(id).and_then(|portal| portal.surface.as_ref())
    }

    pub fn surface_mut(&mut self, id: PortalId) -> Option<&mut PortalSurface> {
        self.get_mut(id).and_then(|portal| portal.surface.as_mut())
    }

    pub fn other(&self, id: PortalId) -> Option<PortalId> {
        self.get(id).and_then(|portal| portal.other)
    }

    pub fn ids(&self) -> impl Iterator<Item = PortalId> {
        (0..self.portals.len()).map(PortalId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PortalId, &Portal)> {
        self.portals
            .iter()
            .enumerate()
            .map(|(index, portal)| (PortalId(index), portal))
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (PortalId, &Portal)> {
        self.iter().filter(|(_, portal)| portal.active)
    }

    pub fn surfaces_mut(&mut self) -> impl Iterator<Item = &mut PortalSurface> {
        self.portals
            .iter_mut()
            .filter_map(|portal| portal.surface.as_mut())
    }

    /// Copies the look and distance settings of `id`'s surface onto its partner's.
    pub fn copy_surface_settings_to_other(&mut self, id: PortalId) -> bool {
        let Some(other) = self.other(id) else {
            return false;
        };
        let Some(source) = self.surface(id).cloned() else {
            return false;
        };
        match self.surface_mut(other) {
            Some(target) => {
                target.copy_settings_from(&source);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{Portal, PortalScene};
    use crate::surface::PortalSurface;
    use veilgate_shared::transform::Transform;

    fn scene_with(count: usize) -> PortalScene {
        let mut scene = PortalScene::new();
        for i in 0..count {
            let surface = PortalSurface::rectangle(Transform::from_position(Vec3::X * i as f32), 1.0, 2.0);
            scene.add(Portal::new(format!("p{i}"), surface));
        }
        scene
    }

    #[test]
    fn linking_is_symmetric_and_relinking_clears_old_partner() {
        let mut scene = scene_with(3);
        let ids: Vec<_> = scene.ids().collect();
        scene.link(ids[0], ids[1]);
        assert_eq!(scene.other(ids[0]), Some(ids[1]));
        assert_eq!(scene.other(ids[1]), Some(ids[0]));

        scene.link(ids[0], ids[2]);
        assert_eq!(scene.other(ids[0]), Some(ids[2]));
        assert_eq!(scene.other(ids[2]), Some(ids[0]));
        assert_eq!(scene.other(ids[1]), None);
    }

    #[test]
    fn inactive_portals_are_skipped() {
        let mut scene = scene_with(2);
        let first = scene.ids().next().unwrap();
        scene.get_mut(first).unwrap().active = false;
        assert_eq!(scene.iter_active().count(), 1);
    }

    #[test]
    fn settings_copy_requires_a_partner() {
        let mut scene = scene_with(2);
        let ids: Vec<_> = scene.ids().collect();
        scene.surface_mut(ids[0]).unwrap().max_rendering_distance = 42.0;
        assert!(!scene.copy_surface_settings_to_other(ids[0]));

        scene.link(ids[0], ids[1]);
        assert!(scene.copy_surface_settings_to_other(ids[0]));
        assert_eq!(scene.surface(ids[1]).unwrap().max_rendering_distance, 42.0);
    }
}
