use bitflags::bitflags;
use glam::Vec3;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use veilgate_core::events::EventSender;
use veilgate_shared::bounds::Aabb;
use veilgate_shared::transform::{portal_direction, portal_transform, Transform};

use crate::portal::{PortalId, PortalScene};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

bitflags! {
    /// Roles a dynamic object plays for transporters.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ObjectKinds: u8 {
        const PORTALABLE      = 0b0000_0001;
        const CLONE_RENDERER  = 0b0000_0010;
        const AFFECTOR_SPHERE = 0b0000_0100;
    }
}

/// Snapshot of a dynamic object as the host sees it this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub name: String,
    pub transform: Transform,
    pub velocity: Vec3,
    pub kinds: ObjectKinds,
    pub active: bool,
    pub can_portal: bool,
}

/// Warp computed for an object that crossed from `from` to `to`.
#[derive(Debug, Clone, PartialEq)]
pub struct Teleport {
    pub from: PortalId,
    pub to: PortalId,
    pub transform: Transform,
    pub velocity: Vec3,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Undefined,
    ExitedCurrentPortalCollider,
    EnteredOtherPortalCollider,
}

/// Host side of the transporter: object lookup plus the notifications the
/// object components react to.
pub trait TransportHost {
    fn object(&self, id: ObjectId) -> Option<ObjectInfo>;
    fn set_is_in_portal(&mut self, id: ObjectId, portal: PortalId, kind: ObjectKinds);
    fn exit_portal(&mut self, id: ObjectId, portal: PortalId, kind: ObjectKinds, from_physics: bool);
    fn apply_teleport(&mut self, id: ObjectId, teleport: &Teleport);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    Entered,
    TransportedAway,
    TransportedHere,
    Exited,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub kind: TransportEventKind,
    pub portal: PortalId,
    pub object: ObjectId,
    pub object_name: String,
}

/// Passes events for objects whose name contains `name`. Empty or `*` passes everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub name: String,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self { name: "*".to_string() }
    }
}

impl EventFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn allows(&self, object_name: &str) -> bool {
        self.name.is_empty() || self.name == "*" || object_name.contains(&self.name)
    }
}

/// Trigger bookkeeping for one portal end.
#[derive(Debug, Clone)]
pub struct PortalTransporter {
    /// World bounds of the trigger collider; `None` when the host has none.
    pub trigger_bounds: Option<Aabb>,
    pub has_rigidbody: bool,
    pub filter: EventFilter,
    owner: Option<PortalId>,
    portalables: FxHashSet<ObjectId>,
    clones: FxHashSet<ObjectId>,
    affectors: FxHashSet<ObjectId>,
    events: Option<EventSender<TransportEvent>>,
    warned: bool,
}

impl PortalTransporter {
    pub fn new(trigger_bounds: Aabb) -> Self {
        Self {
            trigger_bounds: Some(trigger_bounds),
            has_rigidbody: true,
            filter: EventFilter::default(),
            owner: None,
            portalables: FxHashSet::default(),
            clones: FxHashSet::default(),
            affectors: FxHashSet::default(),
            events: None,
            warned: false,
        }
    }

    pub fn with_events(mut self, events: EventSender<TransportEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub(crate) fn bind_owner(&mut self, owner: PortalId) {
        self.owner = Some(owner);
    }

    pub fn owner(&self) -> Option<PortalId> {
        self.owner
    }

    /// A transporter missing its trigger, rigidbody or owning portal ignores
    /// physics triggers and never transports.
    pub fn is_functional(&self) -> bool {
        self.trigger_bounds.is_some() && self.has_rigidbody && self.owner.is_some()
    }

    /// Reports setup problems once. Returns whether the transporter works.
    pub fn activate(&mut self, name: &str) -> bool {
        if !self.warned {
            if self.trigger_bounds.is_none() {
                warn!("{name} has a portal transporter but no trigger collider; add one large enough to be hit before the portal plane");
            }
            if !self.has_rigidbody {
                warn!("{name} has a portal transporter but no rigidbody; add a kinematic rigidbody");
            }
            if self.owner.is_none() {
                warn!("{name} has a portal transporter that is not owned by a portal");
            }
            self.warned = true;
        }
        self.is_functional()
    }

    pub fn contains(&self, object: ObjectId) -> bool {
        self.portalables.contains(&object)
            || self.clones.contains(&object)
            || self.affectors.contains(&object)
    }

    pub fn contains_portalable(&self, object: ObjectId) -> bool {
        self.portalables.contains(&object)
    }

    pub fn portalable_count(&self) -> usize {
        self.portalables.len()
    }

    fn publish(&self, kind: TransportEventKind, portal: PortalId, object: ObjectId, object_name: &str) {
        let Some(events) = &self.events else {
            return;
        };
        if self.filter.allows(object_name) {
            events.publish(TransportEvent {
                kind,
                portal,
                object,
                object_name: object_name.to_string(),
            });
        }
    }
}

/// Runs `activate` on every transporter in the scene.
pub fn activate_all(scene: &mut PortalScene) -> usize {
    let mut functional = 0;
    for id in scene.ids().collect::<Vec<_>>() {
        let Some(portal) = scene.get_mut(id) else {
            continue;
        };
        let name = portal.name.clone();
        if let Some(transporter) = portal.transporter.as_mut() {
            if transporter.activate(&name) {
                functional += 1;
            }
        }
    }
    functional
}

fn local_z(scene: &PortalScene, portal: PortalId, position: Vec3) -> Option<f32> {
    scene
        .surface(portal)
        .map(|surface| surface.transform.inverse_transform_point(position).z)
}

/// Object reached the trigger volume of `portal`.
///
/// Explicit (non-physics) entries first pull the object out of the linked
/// portal's transporter and are accepted wherever the object is. Physics
/// entries are accepted only from the viewer side of the surface.
pub fn trigger_enter<H: TransportHost>(
    scene: &mut PortalScene,
    host: &mut H,
    portal: PortalId,
    object: ObjectId,
    from_physics: bool,
) {
    let Some(transporter) = scene.get(portal).and_then(|p| p.transporter.as_ref()) else {
        return;
    };
    if from_physics && !transporter.is_functional() {
        return;
    }
    let other = scene.other(portal);
    let other_has_transporter = other
        .and_then(|id| scene.get(id))
        .is_some_and(|p| p.transporter.is_some());

    if !from_physics && other_has_transporter {
        if let Some(other) = other {
            trigger_exit(scene, host, other, object, false, ExitReason::EnteredOtherPortalCollider);
        }
    }

    let Some(info) = host.object(object) else {
        return;
    };
    let Some(z) = local_z(scene, portal, info.transform.position) else {
        return;
    };
    if from_physics && z >= 0.0 {
        trace!("Ignoring physics entry of {} past the plane of {portal} (z = {z})", info.name);
        return;
    }
    if !info.active {
        return;
    }

    // A physics entry must not leave the object registered at both ends.
    if from_physics && other_has_transporter {
        if let Some(other) = other {
            let held_there = scene
                .get(other)
                .and_then(|p| p.transporter.as_ref())
                .is_some_and(|t| t.contains(object));
            if held_there {
                trigger_exit(scene, host, other, object, false, ExitReason::EnteredOtherPortalCollider);
            }
        }
    }

    let Some(transporter) = scene.get_mut(portal).and_then(|p| p.transporter.as_mut()) else {
        return;
    };
    if info.kinds.contains(ObjectKinds::PORTALABLE) && transporter.portalables.insert(object) {
        host.set_is_in_portal(object, portal, ObjectKinds::PORTALABLE);
        transporter.publish(TransportEventKind::Entered, portal, object, &info.name);
        debug!("{} entered {portal}", info.name);
    }
    if info.kinds.contains(ObjectKinds::CLONE_RENDERER) && transporter.clones.insert(object) {
        host.set_is_in_portal(object, portal, ObjectKinds::CLONE_RENDERER);
    }
    if info.kinds.contains(ObjectKinds::AFFECTOR_SPHERE) && transporter.affectors.insert(object) {
        host.set_is_in_portal(object, portal, ObjectKinds::AFFECTOR_SPHERE);
    }
}

/// Object left the trigger volume of `portal`, or was pulled out of it.
pub fn trigger_exit<H: TransportHost>(
    scene: &mut PortalScene,
    host: &mut H,
    portal: PortalId,
    object: ObjectId,
    from_physics: bool,
    reason: ExitReason,
) {
    let Some(transporter) = scene.get_mut(portal).and_then(|p| p.transporter.as_mut()) else {
        return;
    };
    if transporter.clones.remove(&object) {
        host.exit_portal(object, portal, ObjectKinds::CLONE_RENDERER, from_physics);
    }
    if transporter.portalables.remove(&object) {
        host.exit_portal(object, portal, ObjectKinds::PORTALABLE, from_physics);
        let name = host.object(object).map(|info| info.name).unwrap_or_default();
        transporter.publish(TransportEventKind::Exited, portal, object, &name);
        trace!("{name} exited {portal} ({reason:?})");
    }
    if transporter.affectors.remove(&object) {
        host.exit_portal(object, portal, ObjectKinds::AFFECTOR_SPHERE, from_physics);
    }
}

/// Per-frame plane-crossing check for `portal`. Portalable objects past the
/// surface plane that may portal are handed to the linked transporter and
/// warped through the pair. Returns the teleports applied.
pub fn update<H: TransportHost>(scene: &mut PortalScene, host: &mut H, portal: PortalId) -> Vec<Teleport> {
    let mut applied = Vec::new();
    let Some(transporter) = scene.get(portal).and_then(|p| p.transporter.as_ref()) else {
        return applied;
    };
    if !transporter.is_functional() {
        return applied;
    }
    let mut tracked: Vec<ObjectId> = transporter.portalables.iter().copied().collect();
    tracked.sort_unstable();

    let Some(other) = scene.other(portal) else {
        return applied;
    };
    let (Some(entry), Some(exit)) = (
        scene.surface(portal).map(|s| s.transform),
        scene.surface(other).map(|s| s.transform),
    ) else {
        return applied;
    };

    for object in tracked {
        let Some(info) = host.object(object) else {
            continue;
        };
        if entry.inverse_transform_point(info.transform.position).z <= 0.0 || !info.can_portal {
            continue;
        }

        let other_has_transporter = scene.get(other).is_some_and(|p| p.transporter.is_some());
        if other_has_transporter {
            trigger_enter(scene, host, other, object, false);
            if let Some(t) = scene.get(other).and_then(|p| p.transporter.as_ref()) {
                t.publish(TransportEventKind::TransportedHere, other, object, &info.name);
            }
        }

        let teleport = Teleport {
            from: portal,
            to: other,
            transform: portal_transform(&entry, &exit, &info.transform),
            velocity: portal_direction(&entry, &exit, info.velocity),
        };
        host.apply_teleport(object, &teleport);
        if let Some(t) = scene.get(portal).and_then(|p| p.transporter.as_ref()) {
            t.publish(TransportEventKind::TransportedAway, portal, object, &info.name);
        }
        // The hand-over above only clears this end when the partner has a transporter.
        trigger_exit(scene, host, portal, object, false, ExitReason::EnteredOtherPortalCollider);
        debug!("Transported {} from {portal} to {other}", info.name);
        applied.push(teleport);
    }
    applied
}

/// Runs [`update`] for every active portal that owns a transporter.
pub fn update_all<H: TransportHost>(scene: &mut PortalScene, host: &mut H) -> Vec<Teleport> {
    let ids: Vec<PortalId> = scene
        .iter_active()
        .filter(|(_, portal)| portal.transporter.is_some())
        .map(|(id, _)| id)
        .collect();
    ids.into_iter()
        .flat_map(|id| update(scene, host, id))
        .collect()
}
