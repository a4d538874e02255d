use tracing::{debug, trace};

use veilgate_shared::camera::Eye;

use crate::backend::{FilterMode, RenderBackend, RenderTargetDesc, TextureHandle, WrapMode};
use crate::placement::PlacementKey;
use crate::settings::{QualitySettings, TextureFormat, TextureSize};

const TEXTURE_ANISOTROPY: u32 = 9;

/// A render target owned by the pool. The locks are bookkeeping only: a
/// locked texture is not handed out again until the locks are cleared.
#[derive(Debug, Clone, PartialEq)]
pub struct PooledTexture {
    pub handle: TextureHandle,
    pub desc: RenderTargetDesc,
    pub eye: Eye,
    /// Held while the texture backs a view of the current chain.
    pub lite_lock: bool,
    /// Held by a root-level view for the rest of the pass.
    pub full_lock: bool,
    pub key: Option<PlacementKey>,
}

impl PooledTexture {
    pub fn is_free(&self) -> bool {
        !self.lite_lock && !self.full_lock
    }
}

/// Settings that force every pooled texture to be recreated when they change.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TargetConfig {
    texture_size: TextureSize,
    use_screen_scale_factor: bool,
    screen_scale_factor: f32,
    samples: u32,
    format: TextureFormat,
}

impl TargetConfig {
    fn from_quality(quality: &QualitySettings) -> Self {
        Self {
            texture_size: quality.texture_size,
            use_screen_scale_factor: quality.use_screen_scale_factor,
            screen_scale_factor: quality.screen_scale_factor,
            samples: quality.anti_aliasing.samples(),
            format: quality.render_texture_format,
        }
    }

    fn size_for(&self, screen: TextureSize) -> TextureSize {
        if !self.use_screen_scale_factor {
            return self.texture_size;
        }
        let scale = |edge: u32| ((edge as f32 * self.screen_scale_factor) as u32).max(1);
        TextureSize::new(scale(screen.width), scale(screen.height))
    }
}

#[derive(Debug, Clone)]
pub struct TexturePool {
    textures: Vec<PooledTexture>,
    config: TargetConfig,
}

impl TexturePool {
    pub fn new(quality: &QualitySettings) -> Self {
        Self {
            textures: Vec::new(),
            config: TargetConfig::from_quality(quality),
        }
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PooledTexture> {
        self.textures.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PooledTexture> {
        self.textures.iter()
    }

    /// Index of a free texture for `eye`, allocating one through `backend`
    /// when every existing texture is locked.
    pub fn acquire(&mut self, eye: Eye, backend: &mut dyn RenderBackend) -> usize {
        if let Some(index) = self
            .textures
            .iter()
            .position(|texture| texture.eye == eye && texture.is_free())
        {
            return index;
        }

        let desc = RenderTargetDesc {
            label: "portal view",
            size: self.config.size_for(backend.screen_size()),
            format: self.config.format,
            samples: self.config.samples,
            mip_levels: 1,
            wrap: WrapMode::Mirror,
            filter: FilterMode::Trilinear,
            anisotropy: TEXTURE_ANISOTROPY,
        };
        let handle = backend.create_target(&desc);
        trace!(
            "Allocated portal texture {handle:?} ({}x{}) for {eye:?}",
            desc.size.width,
            desc.size.height
        );
        self.textures.push(PooledTexture {
            handle,
            desc,
            eye,
            lite_lock: false,
            full_lock: false,
            key: None,
        });
        self.textures.len() - 1
    }

    /// Marks `index` as backing the view identified by `key`. A root view also
    /// releases every lite lock, since the chain that held them is complete.
    pub fn lock(&mut self, index: usize, key: PlacementKey, is_root: bool) {
        if is_root {
            for texture in &mut self.textures {
                texture.lite_lock = false;
            }
        }
        let Some(texture) = self.textures.get_mut(index) else {
            return;
        };
        texture.key = Some(key);
        if is_root {
            texture.full_lock = true;
        } else {
            texture.lite_lock = true;
        }
    }

    pub fn release_all(&mut self) {
        for texture in &mut self.textures {
            texture.lite_lock = false;
            texture.full_lock = false;
        }
    }

    /// Texture already rendered this pass for `key`, if it is still held.
    pub fn texture_for(&self, key: PlacementKey, eye: Eye) -> Option<TextureHandle> {
        self.textures
            .iter()
            .find(|texture| texture.eye == eye && texture.key == Some(key) && !texture.is_free())
            .map(|texture| texture.handle)
    }

    pub fn locked_count(&self) -> usize {
        self.textures.iter().filter(|texture| !texture.is_free()).count()
    }

    /// Adopts new quality settings. Returns `true` when the target
    /// configuration changed and every texture was destroyed.
    pub fn apply_settings(&mut self, quality: &QualitySettings, backend: &mut dyn RenderBackend) -> bool {
        let config = TargetConfig::from_quality(quality);
        if config == self.config {
            return false;
        }
        self.config = config;
        let count = self.textures.len();
        self.clear(backend);
        debug!("Portal texture settings changed, dropped {count} pooled textures");
        true
    }

    pub fn clear(&mut self, backend: &mut dyn RenderBackend) {
        for texture in self.textures.drain(..) {
            backend.destroy_target(texture.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TexturePool;
    use crate::backend::{RecordingBackend, WrapMode};
    use crate::placement::{AncestorChain, PlacementKey};
    use crate::portal::PortalId;
    use crate::settings::{AntiAliasing, QualitySettings, TextureSize};
    use veilgate_shared::camera::Eye;

    fn key(surface: usize, depth: u32) -> PlacementKey {
        PlacementKey {
            surface: PortalId(surface),
            ancestors: AncestorChain::ROOT,
            depth,
        }
    }

    #[test]
    fn free_textures_are_reused_per_eye() {
        let quality = QualitySettings::default();
        let mut backend = RecordingBackend::default();
        let mut pool = TexturePool::new(&quality);

        let left = pool.acquire(Eye::Left, &mut backend);
        assert_eq!(pool.acquire(Eye::Left, &mut backend), left);
        let right = pool.acquire(Eye::Right, &mut backend);
        assert_ne!(left, right);
        assert_eq!(backend.created.len(), 2);

        let desc = &pool.get(left).unwrap().desc;
        assert_eq!(desc.size, TextureSize::new(512, 512));
        assert_eq!(desc.samples, 2);
        assert_eq!(desc.mip_levels, 1);
        assert_eq!(desc.wrap, WrapMode::Mirror);
    }

    #[test]
    fn locked_textures_are_not_handed_out() {
        let quality = QualitySettings::default();
        let mut backend = RecordingBackend::default();
        let mut pool = TexturePool::new(&quality);

        let first = pool.acquire(Eye::Left, &mut backend);
        pool.lock(first, key(0, 2), false);
        let second = pool.acquire(Eye::Left, &mut backend);
        assert_ne!(first, second);
        assert_eq!(pool.texture_for(key(0, 2), Eye::Left), Some(pool.get(first).unwrap().handle));
        assert_eq!(pool.texture_for(key(0, 2), Eye::Right), None);
    }

    #[test]
    fn root_lock_releases_lite_locks() {
        let quality = QualitySettings::default();
        let mut backend = RecordingBackend::default();
        let mut pool = TexturePool::new(&quality);

        let deep = pool.acquire(Eye::Left, &mut backend);
        pool.lock(deep, key(0, 2), false);
        let root = pool.acquire(Eye::Left, &mut backend);
        pool.lock(root, key(0, 1), true);

        assert!(pool.get(deep).unwrap().is_free());
        assert!(pool.get(root).unwrap().full_lock);
        assert_eq!(pool.acquire(Eye::Left, &mut backend), deep);

        pool.release_all();
        assert_eq!(pool.locked_count(), 0);
    }

    #[test]
    fn screen_scale_sizes_from_the_backend() {
        let mut quality = QualitySettings::default();
        quality.use_screen_scale_factor = true;
        quality.screen_scale_factor = 0.5;
        let mut backend = RecordingBackend::new(TextureSize::new(1920, 1080));
        let mut pool = TexturePool::new(&quality);

        let index = pool.acquire(Eye::Left, &mut backend);
        assert_eq!(pool.get(index).unwrap().desc.size, TextureSize::new(960, 540));
    }

    #[test]
    fn changed_settings_destroy_every_texture() {
        let mut quality = QualitySettings::default();
        let mut backend = RecordingBackend::default();
        let mut pool = TexturePool::new(&quality);
        pool.acquire(Eye::Left, &mut backend);
        pool.acquire(Eye::Right, &mut backend);

        assert!(!pool.apply_settings(&quality, &mut backend));
        quality.anti_aliasing = AntiAliasing::High;
        assert!(pool.apply_settings(&quality, &mut backend));
        assert!(pool.is_empty());
        assert_eq!(backend.destroyed.len(), 2);
        assert_eq!(backend.live_targets(), 0);
    }
}
