use glam::{Mat4, Quat, Vec3};

use crate::portal::PortalId;

pub const MAX_ANCESTORS: usize = 4;

/// Surfaces a placement was reached through, nearest first. Only the four
/// nearest are kept.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct AncestorChain([Option<PortalId>; MAX_ANCESTORS]);

impl AncestorChain {
    pub const ROOT: Self = Self([None; MAX_ANCESTORS]);

    pub fn parent(&self) -> Option<PortalId> {
        self.0[0]
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    /// Chain seen by a child of `surface`.
    pub fn push_front(&self, surface: PortalId) -> Self {
        let mut next = [None; MAX_ANCESTORS];
        next[0] = Some(surface);
        next[1..].copy_from_slice(&self.0[..MAX_ANCESTORS - 1]);
        Self(next)
    }

    pub fn iter(&self) -> impl Iterator<Item = PortalId> + '_ {
        self.0.iter().map_while(|slot| *slot)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.is_root()
    }
}

/// Identity of a rendered view: which surface, reached how, at which depth.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PlacementKey {
    pub surface: PortalId,
    pub ancestors: AncestorChain,
    pub depth: u32,
}

/// One virtual camera to render, produced by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPlacement {
    pub surface: PortalId,
    pub projection: Mat4,
    pub view: Mat4,
    pub culling_matrix: Mat4,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub near: f32,
    pub far: f32,
    pub depth: u32,
    /// Viewer-to-surface distance accumulated along the whole chain.
    pub distance: f32,
    pub ancestors: AncestorChain,
    /// Set at odd depths. Hosts flip triangle winding on alternate levels.
    pub even: bool,
    /// Placed because the chain exceeded the surface's rendering distance.
    pub beyond_distance: bool,
}

impl CameraPlacement {
    /// Fallback record for a surface that is too far away to render.
    pub fn beyond_distance(surface: PortalId, terminal_depth: u32, distance: f32, ancestors: AncestorChain) -> Self {
        Self {
            surface,
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            culling_matrix: Mat4::IDENTITY,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            near: 0.1,
            far: 10.0,
            depth: terminal_depth,
            distance,
            ancestors,
            even: true,
            beyond_distance: true,
        }
    }

    pub fn key(&self) -> PlacementKey {
        PlacementKey {
            surface: self.surface,
            ancestors: self.ancestors,
            depth: self.depth,
        }
    }

    pub fn parent(&self) -> Option<PortalId> {
        self.ancestors.parent()
    }

    /// Whether this placement only fades its surface instead of rendering.
    pub fn is_terminal(&self, recursions: u32) -> bool {
        self.depth >= recursions + 1
    }
}

#[cfg(test)]
mod tests {
    use super::{AncestorChain, MAX_ANCESTORS};
    use crate::portal::PortalId;

    #[test]
    fn push_front_keeps_the_nearest_four() {
        let mut chain = AncestorChain::ROOT;
        assert!(chain.is_root());
        for i in 0..6 {
            chain = chain.push_front(PortalId(i));
        }
        assert_eq!(chain.len(), MAX_ANCESTORS);
        assert_eq!(chain.parent(), Some(PortalId(5)));
        let order: Vec<_> = chain.iter().map(|id| id.0).collect();
        assert_eq!(order, vec![5, 4, 3, 2]);
    }

    #[test]
    fn chains_compare_by_content() {
        let a = AncestorChain::ROOT.push_front(PortalId(1)).push_front(PortalId(2));
        let b = AncestorChain::ROOT.push_front(PortalId(1)).push_front(PortalId(2));
        let c = AncestorChain::ROOT.push_front(PortalId(2)).push_front(PortalId(1));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
