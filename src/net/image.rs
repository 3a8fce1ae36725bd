//! Background image loader.
//!
//! Spawns one thread per request to read or download an image, decode it
//! into an RGBA8 buffer and store it in the requesting artwork's texture
//! slot. Nothing waits on the result: a failed load is logged and the slot
//! stays empty.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use image::RgbaImage;
use url::Url;

use crate::error::ArtworkError;
use crate::texture::Texture;

/// Longest edge kept after decoding; larger images are downscaled.
const MAX_EDGE: u32 = 4096;

/// Where an image reference points.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Remote(Url),
    Local(PathBuf),
}

/// Resolve `reference` to a remote URL or a local path. Relative paths are
/// joined onto `base_dir` when one is given.
pub fn locate(reference: &str, base_dir: Option<&Path>) -> Result<Location, ArtworkError> {
    let fail = |reason: String| ArtworkError::ResourceLoad {
        url: reference.to_string(),
        reason,
    };
    match Url::parse(reference) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Location::Remote(url)),
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map(Location::Local)
            .map_err(|_| fail("not a usable file URL".to_string())),
        // Single-letter schemes are Windows drive letters.
        Ok(url) if url.scheme().len() > 1 => {
            Err(fail(format!("unsupported scheme '{}'", url.scheme())))
        }
        _ => {
            let path = PathBuf::from(reference);
            Ok(Location::Local(match base_dir {
                Some(base) if path.is_relative() => base.join(path),
                _ => path,
            }))
        }
    }
}

/// Read, decode and size-cap one image (blocking).
pub fn load_image(reference: &str, base_dir: Option<&Path>) -> Result<RgbaImage, ArtworkError> {
    let fail = |reason: String| ArtworkError::ResourceLoad {
        url: reference.to_string(),
        reason,
    };
    let bytes = match locate(reference, base_dir)? {
        Location::Remote(url) => fetch_remote(&url).map_err(fail)?,
        Location::Local(path) => {
            std::fs::read(&path).map_err(|e| fail(format!("{}: {}", path.display(), e)))?
        }
    };
    let img = image::load_from_memory(&bytes)
        .map_err(|e| fail(format!("decode failed: {}", e)))?
        .to_rgba8();

    let (w, h) = img.dimensions();
    if w.max(h) > MAX_EDGE {
        let ratio = MAX_EDGE as f32 / w.max(h) as f32;
        let (nw, nh) = (
            ((w as f32 * ratio) as u32).max(1),
            ((h as f32 * ratio) as u32).max(1),
        );
        log::debug!("downscaling {} from {}x{} to {}x{}", reference, w, h, nw, nh);
        return Ok(image::imageops::resize(
            &img,
            nw,
            nh,
            image::imageops::FilterType::Triangle,
        ));
    }
    Ok(img)
}

#[cfg(feature = "remote-images")]
fn fetch_remote(url: &Url) -> Result<Vec<u8>, String> {
    let resp = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| format!("client error: {}", e))?
        .get(url.as_str())
        .send()
        .map_err(|e| format!("request failed: {}", e))?;

    if !resp.status().is_success() {
        return Err(format!("HTTP {}", resp.status()));
    }
    resp.bytes()
        .map(|b| b.to_vec())
        .map_err(|e| format!("failed to read body: {}", e))
}

#[cfg(not(feature = "remote-images"))]
fn fetch_remote(_url: &Url) -> Result<Vec<u8>, String> {
    Err("built without the remote-images feature".to_string())
}

/// Fire-and-forget loader shared by the artwork factory.
#[derive(Debug, Clone, Default)]
pub struct ImageLoader {
    base_dir: Option<PathBuf>,
    in_flight: Arc<AtomicUsize>,
}

impl ImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `dir` (the manifest directory).
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Start loading `reference` into `texture`. The handle may be dropped;
    /// tests join it to wait for the upload.
    pub fn request(&self, reference: &str, texture: Texture) -> JoinHandle<()> {
        let reference = reference.to_string();
        let base_dir = self.base_dir.clone();
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        std::thread::spawn(move || {
            match load_image(&reference, base_dir.as_deref()) {
                Ok(img) => {
                    log::debug!("loaded image {} ({}x{})", reference, img.width(), img.height());
                    texture.upload(img);
                }
                Err(e) => log::warn!("{}", e),
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        })
    }

    /// Number of requests whose thread has not finished yet.
    pub fn pending_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sketch-gallery-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn locate_classifies_references() {
        assert!(matches!(
            locate("https://example.com/a.png", None),
            Ok(Location::Remote(_))
        ));
        assert_eq!(
            locate("art/a.png", Some(Path::new("/gallery"))).unwrap(),
            Location::Local(PathBuf::from("/gallery/art/a.png"))
        );
        assert_eq!(
            locate("/abs/a.png", Some(Path::new("/gallery"))).unwrap(),
            Location::Local(PathBuf::from("/abs/a.png"))
        );
        assert!(matches!(
            locate("ftp://example.com/a.png", None),
            Err(ArtworkError::ResourceLoad { .. })
        ));
    }

    #[test]
    fn file_url_maps_to_path() {
        let loc = locate("file:///tmp/pic.png", None).unwrap();
        assert_eq!(loc, Location::Local(PathBuf::from("/tmp/pic.png")));
    }

    #[test]
    fn request_fills_texture_slot() {
        let dir = scratch_dir("load");
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        img.save(dir.join("tile.png")).unwrap();

        let loader = ImageLoader::new().with_base_dir(&dir);
        let texture = Texture::empty();
        loader.request("tile.png", texture.clone()).join().unwrap();

        assert_eq!(loader.pending_count(), 0);
        assert_eq!(texture.dimensions(), Some((3, 2)));
        let snap = texture.snapshot().unwrap();
        assert_eq!(snap.get_pixel(2, 1), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn missing_file_leaves_slot_empty() {
        let loader = ImageLoader::new().with_base_dir(scratch_dir("missing"));
        let texture = Texture::empty();
        loader.request("nope.png", texture.clone()).join().unwrap();
        assert!(!texture.is_loaded());
        assert_eq!(texture.version(), 0);
    }

    #[test]
    fn undecodable_bytes_are_a_resource_error() {
        let dir = scratch_dir("garbage");
        std::fs::write(dir.join("bad.png"), b"not an image").unwrap();
        let err = load_image("bad.png", Some(&dir)).unwrap_err();
        assert!(matches!(err, ArtworkError::ResourceLoad { .. }));
    }
}
