//! Gallery manifest (TOML).
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//!
//! [room]
//! color = "#666666"
//!
//! [[artwork]]
//! code_file = "sketches/rings.rhai"
//! seed = 42
//! label = "Rings\nby someone"
//! position = [0.0, 2.0, -4.0]
//! ```
//!
//! Every section is optional. `code_file` and relative `image` paths
//! resolve against the manifest's directory.

use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::Deserialize;

use crate::artwork::{ArtworkSource, ArtworkSpec, Placement};
use crate::color::parse_css_color;
use crate::gallery::Room;
use crate::net::image::ImageLoader;
use crate::render::Camera;
use crate::sketch::{RenderMode, SketchLimits};

const DEMO_MANIFEST: &str = include_str!("../demos/gallery.toml");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("artwork #{index}: {reason}")]
    Artwork { index: usize, reason: String },
    #[error("room color '{0}' is not a CSS color")]
    RoomColor(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: f32,
    pub height: f32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            title: "Sketch Gallery".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Framebuffer size relative to the window.
    pub scale: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { scale: 0.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        let cam = Camera::default();
        Self {
            fov: cam.fov_deg,
            near: cam.near,
            far: cam.far,
            position: cam.position.to_array(),
            target: cam.target.to_array(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub size: [f32; 3],
    pub color: String,
    pub light_position: [f32; 3],
    pub light_intensity: f32,
    pub light_range: f32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        let room = Room::default();
        Self {
            size: room.size.to_array(),
            color: "#666666".to_string(),
            light_position: room.light_position.to_array(),
            light_intensity: room.light_intensity,
            light_range: room.light_range,
        }
    }
}

/// One `[[artwork]]` table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtworkEntry {
    pub name: Option<String>,
    pub code: Option<String>,
    pub code_file: Option<PathBuf>,
    pub image: Option<String>,
    pub seed: Option<u64>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub depth: Option<f32>,
    pub resolution: Option<f32>,
    pub label: Option<String>,
    pub render_mode: Option<String>,
    pub position: Option<[f32; 3]>,
    /// Euler XYZ in radians.
    pub rotation: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub window: WindowConfig,
    pub render: RenderConfig,
    pub camera: CameraConfig,
    pub room: RoomConfig,
    pub sketch: SketchLimits,
    #[serde(rename = "artwork")]
    pub artworks: Vec<ArtworkEntry>,
    /// Directory relative paths resolve against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl GalleryConfig {
    /// Parse manifest text; `base_dir` anchors relative paths.
    pub fn parse(text: &str, base_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(text)?;
        config.base_dir = base_dir.map(Path::to_path_buf);
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text, path.parent())?;
        log::debug!(
            "loaded manifest {} ({} artworks)",
            path.display(),
            config.artworks.len()
        );
        Ok(config)
    }

    /// The bundled demo gallery.
    pub fn demo() -> Result<Self, ConfigError> {
        Self::parse(DEMO_MANIFEST, None)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn camera(&self) -> Camera {
        let c = &self.camera;
        Camera {
            position: Vec3::from(c.position),
            target: Vec3::from(c.target),
            fov_deg: c.fov,
            near: c.near,
            far: c.far,
            ..Camera::default()
        }
    }

    pub fn room(&self) -> Result<Room, ConfigError> {
        let r = &self.room;
        let [red, green, blue, _] =
            parse_css_color(&r.color).ok_or_else(|| ConfigError::RoomColor(r.color.clone()))?;
        Ok(Room {
            size: Vec3::from(r.size),
            color: [red, green, blue],
            light_position: Vec3::from(r.light_position),
            light_intensity: r.light_intensity,
            light_range: r.light_range,
        })
    }

    pub fn loader(&self) -> ImageLoader {
        match &self.base_dir {
            Some(dir) => ImageLoader::new().with_base_dir(dir),
            None => ImageLoader::new(),
        }
    }

    /// Convert every `[[artwork]]` entry. An entry with neither code nor
    /// image is passed through without a source, so the factory yields an
    /// empty container for it.
    pub fn artwork_specs(&self) -> Result<Vec<ArtworkSpec>, ConfigError> {
        self.artworks
            .iter()
            .enumerate()
            .map(|(index, entry)| self.artwork_spec(index, entry))
            .collect()
    }

    fn artwork_spec(&self, index: usize, entry: &ArtworkEntry) -> Result<ArtworkSpec, ConfigError> {
        let invalid = |reason: String| ConfigError::Artwork { index, reason };

        let code = match (&entry.code, &entry.code_file) {
            (Some(_), Some(_)) => return Err(invalid("set either `code` or `code_file`".into())),
            (Some(code), None) => Some(code.clone()),
            (None, Some(file)) => {
                let path = self.resolve(file);
                Some(std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                    path,
                    source,
                })?)
            }
            (None, None) => None,
        };
        let source = match (code, &entry.image) {
            (Some(_), Some(_)) => return Err(invalid("`code` and `image` are exclusive".into())),
            (Some(code), None) => Some(ArtworkSource::Program {
                code,
                seed: entry.seed,
            }),
            (None, Some(url)) => Some(ArtworkSource::Image { url: url.clone() }),
            (None, None) => None,
        };
        let render_mode = match &entry.render_mode {
            Some(tag) => Some(
                RenderMode::parse(tag)
                    .ok_or_else(|| invalid(format!("unknown render_mode '{}'", tag)))?,
            ),
            None => None,
        };
        let placement = match (entry.position, entry.rotation) {
            (None, None) => None,
            (position, rotation) => Some(Placement {
                position: position.map(Vec3::from).unwrap_or(Vec3::ZERO),
                rotation: rotation.map(Vec3::from).unwrap_or(Vec3::ZERO),
            }),
        };

        Ok(ArtworkSpec {
            name: entry.name.clone(),
            source,
            width: entry.width,
            height: entry.height,
            depth: entry.depth,
            resolution: entry.resolution,
            label: entry.label.clone(),
            update: None,
            placement,
            render_mode,
        })
    }
}
