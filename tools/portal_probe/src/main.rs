use std::env;
use std::f32::consts::PI;
use std::path::PathBuf;

use glam::{Quat, Vec3};
use tracing::info;

use veilgate_portal::backend::RecordingBackend;
use veilgate_portal::placement::CameraPlacement;
use veilgate_portal::portal::{Portal, PortalScene};
use veilgate_portal::registry::RendererRegistry;
use veilgate_portal::renderer::{FrameReport, PortalRenderer, ViewerCamera};
use veilgate_portal::settings::RendererSettings;
use veilgate_portal::surface::PortalSurface;
use veilgate_shared::camera::{EyeFov, StereoRig};
use veilgate_shared::transform::Transform;

const DEFAULT_IPD: f32 = 0.064;

#[derive(Debug, Default)]
struct ProbeArgs {
    settings: Option<PathBuf>,
    recursions: Option<u32>,
    stereo: bool,
}

fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let mut parsed = ProbeArgs::default();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => {
                let Some(value) = args.next() else {
                    eprintln!("--settings expects a path argument");
                    std::process::exit(2);
                };
                parsed.settings = Some(PathBuf::from(value));
            }
            "--recursions" => {
                let Some(value) = args.next() else {
                    eprintln!("--recursions expects a numeric argument");
                    std::process::exit(2);
                };
                match value.parse::<u32>() {
                    Ok(recursions) => parsed.recursions = Some(recursions),
                    Err(err) => {
                        eprintln!("invalid recursions '{value}': {err}");
                        std::process::exit(2);
                    }
                }
            }
            "--stereo" => parsed.stereo = true,
            "--help" | "-h" => {
                println!("Usage: portal_probe [--settings <path>] [--recursions <n>] [--stereo]");
                return;
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }

    if let Err(err) = run(parsed) {
        eprintln!("portal_probe error: {err}");
        std::process::exit(1);
    }
}

fn run(args: ProbeArgs) -> Result<(), String> {
    let mut settings = match &args.settings {
        Some(path) => RendererSettings::load(path)
            .map_err(|err| format!("failed to load {}: {err}", path.display()))?,
        None => RendererSettings::default(),
    };
    if let Some(recursions) = args.recursions {
        settings.quality.recursions = recursions;
    }

    let mut registry = RendererRegistry::new();
    let id = registry.register("probe");
    let mut renderer = PortalRenderer::new(settings);
    let mut backend = RecordingBackend::default();
    let mut scene = corridor();

    let stereo = args.stereo.then(|| {
        let fov = EyeFov::symmetric(60.0_f32.to_radians(), 16.0 / 9.0);
        StereoRig {
            ipd: DEFAULT_IPD,
            left: fov,
            right: fov,
        }
    });
    let viewer = ViewerCamera {
        transform: Transform::from_position_rotation(Vec3::ZERO, Quat::from_rotation_y(PI)),
        fov: 60.0_f32.to_radians(),
        aspect: 16.0 / 9.0,
        near: 0.1,
        far: 100.0,
        stereo,
        skybox: None,
    };

    info!(
        "Probing corridor with {} recursions as {id} (master: {})",
        renderer.settings().quality.recursions,
        registry.is_master(id)
    );
    let report = renderer.render_camera(&mut scene, &viewer, &mut backend);
    print_report(&scene, &report);

    println!(
        "Render targets: {} live, {} sub-renders",
        backend.live_targets(),
        backend.renders.len()
    );
    renderer.shutdown(&mut backend);
    registry.unregister(id);
    Ok(())
}

/// Two linked portals facing each other two units apart, like a pair of mirrors.
fn corridor() -> PortalScene {
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
    scene
}

fn print_report(scene: &PortalScene, report: &FrameReport) {
    println!("Placements: {} ({} renders)", report.placements(), report.renders);
    for (eye, placements) in [("left", &report.left), ("right", &report.right)] {
        for placement in placements {
            print_placement(scene, eye, placement);
        }
    }
    if let Some(mask) = &report.clipping_mask {
        println!("Clipping mask on {} (visible: {})", mask.portal, mask.is_visible());
    }
}

fn print_placement(scene: &PortalScene, eye: &str, placement: &CameraPlacement) {
    let name = scene
        .get(placement.surface)
        .map(|portal| portal.name.as_str())
        .unwrap_or("?");
    let p = placement.position;
    println!(
        "  {eye:<5} depth {} {name:<6} @ ({:.2}, {:.2}, {:.2}) near {:.3} dist {:.2}{}",
        placement.depth,
        p.x,
        p.y,
        p.z,
        placement.near,
        placement.distance,
        if placement.beyond_distance { " [beyond]" } else { "" }
    );
}
