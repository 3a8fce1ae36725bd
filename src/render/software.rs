//! CPU renderer: ray casts the scene's box and plane meshes into an RGBA8
//! framebuffer, one rayon task per row.
//!
//! Each frame the scene is flattened into an immutable draw list (world
//! matrices, material data and `Arc` texture snapshots), so the parallel
//! pass holds no locks and never touches the scene graph.

use std::sync::Arc;

use glam::{Mat3, Mat4, Vec2, Vec3};
use image::RgbaImage;
use rayon::prelude::*;

use super::camera::Camera;
use super::Renderer;
use crate::scene::raycast::{intersect_world, Face, Ray};
use crate::scene::{Geometry, NodeKind, SceneGraph, Shading, Side};

// ── Draw list ──

struct DrawItem {
    geometry: Geometry,
    side: Side,
    world: Mat4,
    inverse: Mat4,
    normal_matrix: Mat3,
    color: Vec3,
    texture: Option<Arc<RgbaImage>>,
    opacity: f32,
    transparent: bool,
    shading: Shading,
}

struct LightItem {
    position: Vec3,
    color: Vec3,
    range: f32,
}

struct DrawList {
    items: Vec<DrawItem>,
    lights: Vec<LightItem>,
}

fn flatten(scene: &SceneGraph) -> DrawList {
    let mut items = Vec::new();
    let mut lights = Vec::new();
    scene.walk_world(|_, node, world| {
        if !node.visible {
            return;
        }
        match &node.kind {
            NodeKind::Mesh(mesh) => {
                let m = &mesh.material;
                let opacity = node.effective_opacity();
                if m.transparent && opacity <= 0.0 {
                    return;
                }
                items.push(DrawItem {
                    geometry: mesh.geometry,
                    side: m.side,
                    world: *world,
                    inverse: world.inverse(),
                    normal_matrix: Mat3::from_mat4(*world).inverse().transpose(),
                    color: Vec3::from(m.color),
                    texture: m.map.as_ref().and_then(|t| t.snapshot()),
                    opacity,
                    transparent: m.transparent,
                    shading: m.shading,
                });
            }
            NodeKind::Light(light) => lights.push(LightItem {
                position: world.transform_point3(Vec3::ZERO),
                color: Vec3::from(light.color) * light.intensity,
                range: light.range,
            }),
            NodeKind::Group => {}
        }
    });
    DrawList { items, lights }
}

// ── Shading ──

struct Surfel {
    distance: f32,
    rgb: Vec3,
    alpha: f32,
}

/// Nearest-neighbour lookup; v = 1 is the top image row.
fn sample(texture: &RgbaImage, u: f32, v: f32) -> [f32; 4] {
    let (w, h) = texture.dimensions();
    let x = ((u * w as f32) as u32).min(w.saturating_sub(1));
    let y = (((1.0 - v) * h as f32) as u32).min(h.saturating_sub(1));
    texture.get_pixel(x, y).0.map(|c| c as f32 / 255.0)
}

fn shade(
    item: &DrawItem,
    lights: &[LightItem],
    ambient: f32,
    ray: &Ray,
    point: Vec3,
    face: Face,
    uv: Vec2,
) -> Surfel {
    let texel = match &item.texture {
        Some(tex) if tex.width() > 0 && tex.height() > 0 => sample(tex, uv.x, uv.y),
        _ => [1.0; 4],
    };
    let base = item.color * Vec3::new(texel[0], texel[1], texel[2]);

    let rgb = match item.shading {
        Shading::Basic => base,
        Shading::Standard => {
            let mut n = (item.normal_matrix * face.local_normal()).normalize_or_zero();
            if n.dot(ray.direction) > 0.0 {
                n = -n;
            }
            let mut light = Vec3::splat(ambient);
            for l in lights {
                let to_light = l.position - point;
                let dist = to_light.length();
                let falloff = if l.range > 0.0 {
                    (1.0 - dist / l.range).max(0.0)
                } else {
                    1.0
                };
                let lambert = n.dot(to_light / dist.max(1e-6)).max(0.0);
                light += l.color * (lambert * falloff);
            }
            base * light
        }
    };

    let alpha = if item.transparent {
        texel[3] * item.opacity
    } else {
        1.0
    };
    Surfel {
        distance: 0.0,
        rgb,
        alpha,
    }
}

fn trace(list: &DrawList, ambient: f32, background: Vec3, ray: &Ray, near: f32, far: f32) -> Vec3 {
    let mut opaque: Option<Surfel> = None;
    let mut layers: Vec<Surfel> = Vec::new();

    for item in &list.items {
        let Some((hit, point)) =
            intersect_world(&item.geometry, item.side, &item.world, &item.inverse, ray, near, far)
        else {
            continue;
        };
        if !item.transparent && opaque.as_ref().is_some_and(|o| o.distance <= hit.distance) {
            continue;
        }
        let mut surfel = shade(item, &list.lights, ambient, ray, point, hit.face, hit.uv);
        surfel.distance = hit.distance;
        if item.transparent {
            layers.push(surfel);
        } else {
            opaque = Some(surfel);
        }
    }

    let (mut color, limit) = match opaque {
        Some(s) => (s.rgb, s.distance),
        None => (background, f32::INFINITY),
    };
    layers.retain(|s| s.distance < limit);
    layers.sort_by(|a, b| b.distance.total_cmp(&a.distance));
    for layer in layers {
        color = layer.rgb * layer.alpha + color * (1.0 - layer.alpha);
    }
    color
}

// ── Renderer ──

pub struct SoftwareRenderer {
    framebuffer: RgbaImage,
    version: u64,
    pub background: [f32; 3],
    /// Ambient term for lit materials.
    pub ambient: f32,
}

impl SoftwareRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            framebuffer: RgbaImage::new(width.max(1), height.max(1)),
            version: 0,
            background: [0.0, 0.0, 0.0],
            ambient: 0.25,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if self.framebuffer.dimensions() != (width, height) {
            log::debug!("framebuffer resized to {}x{}", width, height);
            self.framebuffer = RgbaImage::new(width, height);
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.framebuffer.dimensions()
    }

    pub fn framebuffer(&self) -> &RgbaImage {
        &self.framebuffer
    }

    /// Bumped after every rendered frame.
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl Renderer for SoftwareRenderer {
    fn render(&mut self, scene: &SceneGraph, camera: &Camera) {
        let list = flatten(scene);
        let (width, height) = self.framebuffer.dimensions();
        let mut camera = *camera;
        camera.set_viewport(width, height);
        let background = Vec3::from(self.background);
        let ambient = self.ambient;
        let row_size = width as usize * 4;

        self.framebuffer
            .par_chunks_exact_mut(row_size)
            .enumerate()
            .for_each(|(py, row)| {
                let v = -((py as f32 + 0.5) / height as f32 * 2.0 - 1.0);
                for px in 0..width as usize {
                    let u = (px as f32 + 0.5) / width as f32 * 2.0 - 1.0;
                    let ray = camera.ray(u, v);
                    let c = trace(&list, ambient, background, &ray, camera.near, camera.far);
                    let idx = px * 4;
                    row[idx] = (c.x.clamp(0.0, 1.0) * 255.0).round() as u8;
                    row[idx + 1] = (c.y.clamp(0.0, 1.0) * 255.0).round() as u8;
                    row[idx + 2] = (c.z.clamp(0.0, 1.0) * 255.0).round() as u8;
                    row[idx + 3] = 255;
                }
            });
        self.version += 1;
    }
}
