//! Shared texture slots.
//!
//! A `Texture` is a cheap handle to one slot. Sketch runtimes upload into
//! their slot after every `draw()`, image loaders fill theirs from a
//! background thread, and the renderer snapshots the current image (an `Arc`)
//! without holding the lock while it samples.

use std::sync::{Arc, RwLock};

use image::RgbaImage;

#[derive(Debug, Default)]
struct Slot {
    image: Option<Arc<RgbaImage>>,
    /// Bumped on every upload; a renderer caching GPU copies re-uploads when
    /// it changes.
    version: u64,
}

/// Handle to a texture slot; clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct Texture {
    slot: Arc<RwLock<Slot>>,
}

impl Texture {
    /// An empty slot, e.g. for an image that is still loading.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_image(image: RgbaImage) -> Self {
        let texture = Self::empty();
        texture.upload(image);
        texture
    }

    /// Replace the contents and mark the texture as needing re-upload.
    pub fn upload(&self, image: RgbaImage) {
        // The slot is replaced wholesale, so a poisoned guard is still valid.
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        slot.image = Some(Arc::new(image));
        slot.version += 1;
    }

    /// Current image, if any has been uploaded.
    pub fn snapshot(&self) -> Option<Arc<RgbaImage>> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.image.clone()
    }

    pub fn version(&self) -> u64 {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).version
    }

    pub fn is_loaded(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .image
            .is_some()
    }

    /// Pixel dimensions of the current image.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.snapshot().map(|img| img.dimensions())
    }

    /// Whether two handles point at the same slot.
    pub fn same_slot(&self, other: &Texture) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn empty_texture_has_no_image() {
        let tex = Texture::empty();
        assert!(!tex.is_loaded());
        assert_eq!(tex.version(), 0);
        assert!(tex.dimensions().is_none());
    }

    #[test]
    fn upload_bumps_version_and_is_shared() {
        let tex = Texture::empty();
        let other = tex.clone();
        tex.upload(RgbaImage::from_pixel(4, 2, Rgba([1, 2, 3, 255])));
        assert!(other.is_loaded());
        assert_eq!(other.version(), 1);
        assert_eq!(other.dimensions(), Some((4, 2)));
        assert!(tex.same_slot(&other));
        assert!(!tex.same_slot(&Texture::empty()));
    }

    #[test]
    fn snapshot_outlives_later_uploads() {
        let tex = Texture::from_image(RgbaImage::from_pixel(1, 1, Rgba([9, 9, 9, 255])));
        let old = tex.snapshot().unwrap();
        tex.upload(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255])));
        assert_eq!(old.get_pixel(0, 0), &Rgba([9, 9, 9, 255]));
        assert_eq!(tex.snapshot().unwrap().get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    }
}
