use glam::{Mat4, Quat, Vec3};

use veilgate_shared::camera::Eye;

use crate::portal::PortalId;
use crate::settings::{CameraOverrideOption, QualitySettings, TextureFormat, TextureSize};

/// Opaque render-target handle issued by a [`RenderBackend`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SkyboxId(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WrapMode {
    Clamp,
    Repeat,
    Mirror,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FilterMode {
    Point,
    Bilinear,
    Trilinear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetDesc {
    pub label: &'static str,
    pub size: TextureSize,
    pub format: TextureFormat,
    pub samples: u32,
    pub mip_levels: u32,
    pub wrap: WrapMode,
    pub filter: FilterMode,
    pub anisotropy: u32,
}

/// Engine feature overrides applied to every portal sub-render.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SubRenderOptions {
    pub render_layers: u32,
    pub render_shadows: bool,
    pub render_post_processing: bool,
    pub opaque_texture_mode: CameraOverrideOption,
    pub depth_texture_mode: CameraOverrideOption,
    pub disable_pixel_lights: bool,
}

impl SubRenderOptions {
    pub fn from_quality(quality: &QualitySettings) -> Self {
        Self {
            render_layers: quality.render_layers,
            render_shadows: quality.render_shadows,
            render_post_processing: quality.render_post_processing,
            opaque_texture_mode: quality.opaque_texture_mode,
            depth_texture_mode: quality.depth_texture_mode,
            disable_pixel_lights: quality.disable_pixel_lights,
        }
    }
}

/// One sub-render into a pooled target, fully described.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRender {
    pub target: TextureHandle,
    pub surface: PortalId,
    pub eye: Eye,
    pub depth: u32,
    pub view: Mat4,
    pub projection: Mat4,
    pub culling_matrix: Mat4,
    pub use_occlusion_culling: bool,
    pub position: Vec3,
    pub rotation: Quat,
    pub near: f32,
    pub far: f32,
    pub skybox: Option<SkyboxId>,
    pub options: SubRenderOptions,
}

/// Host-side drawing primitive. Implementations own the GPU resources.
pub trait RenderBackend {
    fn screen_size(&self) -> TextureSize;
    fn create_target(&mut self, desc: &RenderTargetDesc) -> TextureHandle;
    fn destroy_target(&mut self, handle: TextureHandle);
    fn render_view(&mut self, view: &ViewRender);

    /// Called once per rendered frame, before the first eye is resolved.
    fn frame_started(&mut self) {}

    /// Called after the clipping mask is built, with the number of sub-renders issued.
    fn frame_finished(&mut self, _renders: usize) {}
}

/// Backend that only records what it was asked to do.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    pub screen: TextureSize,
    pub created: Vec<(TextureHandle, RenderTargetDesc)>,
    pub destroyed: Vec<TextureHandle>,
    pub renders: Vec<ViewRender>,
    pub frames_started: usize,
    /// Sub-render count of each finished frame.
    pub frames_finished: Vec<usize>,
    next_handle: u64,
}

impl RecordingBackend {
    pub fn new(screen: TextureSize) -> Self {
        Self {
            screen,
            created: Vec::new(),
            destroyed: Vec::new(),
            renders: Vec::new(),
            frames_started: 0,
            frames_finished: Vec::new(),
            next_handle: 1,
        }
    }

    pub fn live_targets(&self) -> usize {
        self.created.len() - self.destroyed.len()
    }

    pub fn desc_of(&self, handle: TextureHandle) -> Option<&RenderTargetDesc> {
        self.created
            .iter()
            .find(|(created, _)| *created == handle)
            .map(|(_, desc)| desc)
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new(TextureSize::new(1920, 1080))
    }
}

impl RenderBackend for RecordingBackend {
    fn screen_size(&self) -> TextureSize {
        self.screen
    }

    fn create_target(&mut self, desc: &RenderTargetDesc) -> TextureHandle {
        let handle = TextureHandle(self.next_handle);
        self.next_handle += 1;
        self.created.push((handle, desc.clone()));
        handle
    }

    fn destroy_target(&mut self, handle: TextureHandle) {
        self.destroyed.push(handle);
    }

    fn render_view(&mut self, view: &ViewRender) {
        self.renders.push(view.clone());
    }

    fn frame_started(&mut self) {
        self.frames_started += 1;
    }

    fn frame_finished(&mut self, renders: usize) {
        self.frames_finished.push(renders);
    }
}
