use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SettingsError;

pub const MIN_RECURSIONS: u32 = 1;
pub const MAX_RECURSIONS: u32 = 8;
pub const MIN_SCREEN_SCALE_FACTOR: f32 = 0.01;
pub const MAX_SCREEN_SCALE_FACTOR: f32 = 1.0;
pub const MIN_TEXTURE_EDGE: u32 = 1;
pub const MAX_TEXTURE_EDGE: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiAliasing {
    None,
    Low,
    Medium,
    High,
}

impl AntiAliasing {
    pub fn samples(self) -> u32 {
        match self {
            Self::None => 1,
            Self::Low => 2,
            Self::Medium => 4,
            Self::High => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
    Default,
    DefaultHdr,
    Rgba8,
    Rgba16f,
    Rgb111110f,
}

/// Per sub-render override for engine features that a pipeline may toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraOverrideOption {
    Off,
    On,
    UsePipelineSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureSize {
    pub width: u32,
    pub height: u32,
}

impl TextureSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySettings {
    #[serde(default = "default_texture_size")]
    pub texture_size: TextureSize,
    #[serde(default)]
    pub use_screen_scale_factor: bool,
    #[serde(default = "default_screen_scale_factor")]
    pub screen_scale_factor: f32,
    #[serde(default = "default_anti_aliasing")]
    pub anti_aliasing: AntiAliasing,
    #[serde(default = "default_render_texture_format")]
    pub render_texture_format: TextureFormat,
    #[serde(default = "default_true")]
    pub disable_pixel_lights: bool,
    #[serde(default)]
    pub frames_needed_to_update: u32,
    #[serde(default = "default_recursions")]
    pub recursions: u32,
    #[serde(default = "default_true")]
    pub use_occlusion_culling: bool,
    #[serde(default = "default_render_layers")]
    pub render_layers: u32,
    #[serde(default)]
    pub render_shadows: bool,
    #[serde(default)]
    pub render_post_processing: bool,
    #[serde(default = "default_override_option")]
    pub opaque_texture_mode: CameraOverrideOption,
    #[serde(default = "default_override_option")]
    pub depth_texture_mode: CameraOverrideOption,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            texture_size: default_texture_size(),
            use_screen_scale_factor: false,
            screen_scale_factor: default_screen_scale_factor(),
            anti_aliasing: default_anti_aliasing(),
            render_texture_format: default_render_texture_format(),
            disable_pixel_lights: true,
            frames_needed_to_update: 0,
            recursions: default_recursions(),
            use_occlusion_culling: true,
            render_layers: default_render_layers(),
            render_shadows: false,
            render_post_processing: false,
            opaque_texture_mode: default_override_option(),
            depth_texture_mode: default_override_option(),
        }
    }
}

impl QualitySettings {
    pub fn sanitize(mut self) -> Self {
        if self.recursions > MAX_RECURSIONS {
            warn!(
                "Portal recursions {} exceed the supported maximum, clamping to {MAX_RECURSIONS}",
                self.recursions
            );
        }
        self.recursions = self.recursions.clamp(MIN_RECURSIONS, MAX_RECURSIONS);
        self.screen_scale_factor = if self.screen_scale_factor.is_finite() {
            self.screen_scale_factor
                .clamp(MIN_SCREEN_SCALE_FACTOR, MAX_SCREEN_SCALE_FACTOR)
        } else {
            default_screen_scale_factor()
        };
        self.texture_size.width = self.texture_size.width.clamp(MIN_TEXTURE_EDGE, MAX_TEXTURE_EDGE);
        self.texture_size.height = self
            .texture_size
            .height
            .clamp(MIN_TEXTURE_EDGE, MAX_TEXTURE_EDGE);
        self
    }

    /// Depth at which surfaces stop showing live views and fall back to the faded look.
    pub fn terminal_depth(&self) -> u32 {
        self.recursions + 1
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(SettingsError::Read)?;
        let parsed = toml::from_str::<Self>(&contents)?;
        Ok(parsed.sanitize())
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let settings = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&settings)?;
        fs::write(path, serialized).map_err(SettingsError::Write)
    }
}

/// Quality block plus the renderer's tunable heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererSettings {
    /// Minimum distance behind the destination plane before the tight
    /// off-axis culling matrix is trusted.
    #[serde(default = "default_edge_on_epsilon")]
    pub edge_on_epsilon: f32,
    /// Extra slack added to `ipd / 2 + near` when testing whether a portal
    /// may still touch either eye's near plane.
    #[serde(default = "default_stereo_near_clip_margin")]
    pub stereo_near_clip_margin: f32,
    /// Keep updating surface materials but skip every sub-render.
    #[serde(default)]
    pub materials_only: bool,
    #[serde(default)]
    pub quality: QualitySettings,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            edge_on_epsilon: default_edge_on_epsilon(),
            stereo_near_clip_margin: default_stereo_near_clip_margin(),
            materials_only: false,
            quality: QualitySettings::default(),
        }
    }
}

impl RendererSettings {
    pub fn sanitize(mut self) -> Self {
        self.quality = self.quality.sanitize();
        if !self.edge_on_epsilon.is_finite() || self.edge_on_epsilon < 0.0 {
            self.edge_on_epsilon = default_edge_on_epsilon();
        }
        if !self.stereo_near_clip_margin.is_finite() || self.stereo_near_clip_margin < 0.0 {
            self.stereo_near_clip_margin = default_stereo_near_clip_margin();
        }
        self
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(SettingsError::Read)?;
        let parsed = toml::from_str::<Self>(&contents)?;
        Ok(parsed.sanitize())
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let settings = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&settings)?;
        fs::write(path, serialized).map_err(SettingsError::Write)
    }

    /// Loads `path`, writing defaults there when it does not exist yet.
    pub fn load_or_create(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(err) => {
                if !err.is_not_found() {
                    warn!("Failed to load renderer settings from {}: {err}", path.display());
                }
                let settings = Self::default();
                if let Err(save_err) = settings.save(path) {
                    warn!(
                        "Failed to write default renderer settings to {}: {save_err}",
                        path.display()
                    );
                }
                settings
            }
        }
    }
}

fn default_texture_size() -> TextureSize {
    TextureSize::new(512, 512)
}

fn default_screen_scale_factor() -> f32 {
    0.5
}

fn default_anti_aliasing() -> AntiAliasing {
    AntiAliasing::Low
}

fn default_render_texture_format() -> TextureFormat {
    TextureFormat::Default
}

fn default_true() -> bool {
    true
}

fn default_recursions() -> u32 {
    2
}

fn default_render_layers() -> u32 {
    u32::MAX
}

fn default_override_option() -> CameraOverrideOption {
    CameraOverrideOption::Off
}

fn default_edge_on_epsilon() -> f32 {
    0.01
}

fn default_stereo_near_clip_margin() -> f32 {
    0.05
}
