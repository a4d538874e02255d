use std::f32::consts::PI;

use glam::{Quat, Vec3};

use veilgate_portal::backend::RecordingBackend;
use veilgate_portal::portal::{Portal, PortalId, PortalScene};
use veilgate_portal::renderer::{PortalRenderer, ViewerCamera};
use veilgate_portal::settings::RendererSettings;
use veilgate_portal::surface::PortalSurface;
use veilgate_shared::camera::{EyeFov, StereoRig};
use veilgate_shared::transform::Transform;

/// Two linked 2x2 portals two units apart, facing each other.
fn corridor() -> (PortalScene, PortalId, PortalId) {
    let mut scene = PortalScene::new();
    let mut front = PortalSurface::rectangle(Transform::from_position(Vec3::new(0.0, 0.0, 1.0)), 2.0, 2.0);
    let mut back = PortalSurface::rectangle(
        Transform::from_position_rotation(Vec3::new(0.0, 0.0, -1.0), Quat::from_rotation_y(PI)),
        2.0,
        2.0,
    );
    front.max_rendering_distance = 100.0;
    back.max_rendering_distance = 100.0;
    let front = scene.add(Portal::new("front", front));
    let back = scene.add(Portal::new("back", back));
    scene.link(front, back);
    (scene, front, back)
}

/// Viewer at the midpoint looking at the front portal.
fn viewer(stereo: Option<StereoRig>) -> ViewerCamera {
    ViewerCamera {
        transform: Transform::from_position_rotation(Vec3::ZERO, Quat::from_rotation_y(PI)),
        fov: 60.0_f32.to_radians(),
        aspect: 1.0,
        near: 0.1,
        far: 100.0,
        stereo,
        skybox: None,
    }
}

fn renderer(recursions: u32) -> PortalRenderer {
    let mut settings = RendererSettings::default();
    settings.quality.recursions = recursions;
    PortalRenderer::new(settings)
}

#[test]
fn mono_corridor_resolves_four_placements() {
    let (mut scene, front, _) = corridor();
    let mut renderer = renderer(3);
    let mut backend = RecordingBackend::default();

    let report = renderer.render_camera(&mut scene, &viewer(None), &mut backend);
    assert!(!report.skipped);
    assert!(report.closest_portal.is_some());

    let depths: Vec<u32> = report.left.iter().map(|p| p.depth).collect();
    assert_eq!(depths, vec![4, 3, 2, 1]);
    assert!(report.left.iter().all(|p| p.surface == front));
    assert_eq!(report.left.iter().filter(|p| p.is_terminal(3)).count(), 1);
    assert!(report.right.is_empty());

    // Depth 4 only fades the surface.
    assert_eq!(report.renders, 3);
    assert_eq!(renderer.pool().locked_count(), 0);
}

#[test]
fn stereo_corridor_resolves_both_eyes() {
    let (mut scene, _, _) = corridor();
    let mut renderer = renderer(3);
    let mut backend = RecordingBackend::default();
    let fov = EyeFov::symmetric(60.0_f32.to_radians(), 1.0);
    let rig = StereoRig {
        ipd: 0.064,
        left: fov,
        right: fov,
    };

    let report = renderer.render_camera(&mut scene, &viewer(Some(rig)), &mut backend);
    assert_eq!(report.left.len(), 4);
    assert_eq!(report.right.len(), 4);
    assert_eq!(report.placements(), 8);
    assert_eq!(report.renders, 6);

    // Eyes sit half the IPD either side of the viewer.
    let left_root = report.left.last().unwrap();
    let right_root = report.right.last().unwrap();
    assert!((left_root.position.x - right_root.position.x).abs() > 0.06);

    for (_, portal) in scene.iter() {
        assert_eq!(portal.surface.as_ref().unwrap().material.force_eye, -1);
    }
}

#[test]
fn viewer_pose_reaches_every_material() {
    let (mut scene, _, _) = corridor();
    let mut renderer = renderer(2);
    let mut backend = RecordingBackend::default();

    renderer.render_camera(&mut scene, &viewer(None), &mut backend);
    for (_, portal) in scene.iter() {
        let material = &portal.surface.as_ref().unwrap().material;
        assert_eq!(material.viewer_position, Vec3::ZERO);
        assert!(material.viewer_direction.distance(Vec3::Z) < 1.0e-5);
    }
}
