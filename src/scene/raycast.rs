//! Ray queries against scene meshes.
//!
//! Intersections happen in each mesh's local space: the world ray is pulled
//! through the inverse world matrix, so `distance` stays in world units as
//! long as the world direction is normalized.

use glam::{Mat4, Vec2, Vec3};

use super::{Geometry, NodeId, NodeKind, SceneGraph, Side};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Which face of a mesh was hit, in local space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl Face {
    pub fn local_normal(self) -> Vec3 {
        match self {
            Self::PosX => Vec3::X,
            Self::NegX => Vec3::NEG_X,
            Self::PosY => Vec3::Y,
            Self::NegY => Vec3::NEG_Y,
            Self::PosZ => Vec3::Z,
            Self::NegZ => Vec3::NEG_Z,
        }
    }
}

/// Hit against one geometry, before it is tied to a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalHit {
    pub distance: f32,
    pub face: Face,
    /// Texture coordinates, v = 1 at the top edge of the face.
    pub uv: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub node: NodeId,
    pub distance: f32,
    pub point: Vec3,
    pub face: Face,
    pub uv: Vec2,
}

/// Intersect a ray (already in local space, direction not necessarily unit)
/// with a geometry. Returns the nearest hit with `t` in `[near, far]`.
pub fn intersect_local(
    geometry: &Geometry,
    side: Side,
    origin: Vec3,
    dir: Vec3,
    near: f32,
    far: f32,
) -> Option<LocalHit> {
    match *geometry {
        Geometry::Plane { width, height } => {
            if dir.z.abs() < 1e-9 {
                return None;
            }
            // Front face looks down +Z; a front-only plane is hit from +Z.
            if side == Side::Front && dir.z > 0.0 {
                return None;
            }
            let t = -origin.z / dir.z;
            if t < near || t > far {
                return None;
            }
            let p = origin + dir * t;
            let (hw, hh) = (width * 0.5, height * 0.5);
            if p.x.abs() > hw || p.y.abs() > hh {
                return None;
            }
            let face = if dir.z < 0.0 { Face::PosZ } else { Face::NegZ };
            Some(LocalHit {
                distance: t,
                face,
                uv: Vec2::new(p.x / width + 0.5, p.y / height + 0.5),
            })
        }
        Geometry::Box {
            width,
            height,
            depth,
        } => {
            let half = Vec3::new(width, height, depth) * 0.5;
            let inv = dir.recip();
            let t0 = (-half - origin) * inv;
            let t1 = (half - origin) * inv;
            let tmin = t0.min(t1);
            let tmax = t0.max(t1);
            let enter = tmin.max_element();
            let exit = tmax.min_element();
            if enter > exit || exit < near {
                return None;
            }
            // From inside (or a back-face pass) the far wall is the hit.
            let t = if enter >= near {
                enter
            } else if side == Side::Double {
                exit
            } else {
                return None;
            };
            if t > far {
                return None;
            }
            let p = origin + dir * t;
            let face = box_face(p, half);
            Some(LocalHit {
                distance: t,
                face,
                uv: box_uv(p, half, face),
            })
        }
    }
}

fn box_face(p: Vec3, half: Vec3) -> Face {
    let n = p / half.max(Vec3::splat(1e-6));
    let a = n.abs();
    if a.x >= a.y && a.x >= a.z {
        if n.x > 0.0 { Face::PosX } else { Face::NegX }
    } else if a.y >= a.z {
        if n.y > 0.0 { Face::PosY } else { Face::NegY }
    } else if n.z > 0.0 {
        Face::PosZ
    } else {
        Face::NegZ
    }
}

/// Each box face carries the whole texture, oriented as seen from outside.
fn box_uv(p: Vec3, half: Vec3, face: Face) -> Vec2 {
    let s = p / (half * 2.0).max(Vec3::splat(1e-6));
    let (u, v) = match face {
        Face::PosZ => (s.x, s.y),
        Face::NegZ => (-s.x, s.y),
        Face::PosX => (-s.z, s.y),
        Face::NegX => (s.z, s.y),
        Face::PosY => (s.x, -s.z),
        Face::NegY => (s.x, s.z),
    };
    Vec2::new(u + 0.5, v + 0.5)
}

/// Transform a world ray into a mesh's local frame and intersect.
pub fn intersect_world(
    geometry: &Geometry,
    side: Side,
    world: &Mat4,
    inverse: &Mat4,
    ray: &Ray,
    near: f32,
    far: f32,
) -> Option<(LocalHit, Vec3)> {
    let origin = inverse.transform_point3(ray.origin);
    let dir = inverse.transform_vector3(ray.direction);
    let local = intersect_local(geometry, side, origin, dir, near, far)?;
    let point = world.transform_point3(origin + dir * local.distance);
    Some((local, point))
}

/// Ray caster over a whole scene graph, mirroring a classic "intersect all
/// descendants, sorted by distance" query.
#[derive(Debug, Clone, Copy)]
pub struct Raycaster {
    pub ray: Ray,
    pub near: f32,
    pub far: f32,
}

impl Raycaster {
    pub fn new(ray: Ray) -> Self {
        Self {
            ray,
            near: 0.0,
            far: f32::INFINITY,
        }
    }

    /// Every mesh hit, nearest first. Invisible nodes still participate: a
    /// fully faded panel must stay pickable.
    pub fn intersect_scene(&self, scene: &SceneGraph) -> Vec<Hit> {
        let mut hits = Vec::new();
        scene.walk_world(|id, node, world| {
            let NodeKind::Mesh(mesh) = &node.kind else {
                return;
            };
            let inverse = world.inverse();
            if let Some((local, point)) = intersect_world(
                &mesh.geometry,
                mesh.material.side,
                world,
                &inverse,
                &self.ray,
                self.near,
                self.far,
            ) {
                hits.push(Hit {
                    node: id,
                    distance: local.distance,
                    point,
                    face: local.face,
                    uv: local.uv,
                });
            }
        });
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    pub fn nearest(&self, scene: &SceneGraph) -> Option<Hit> {
        self.intersect_scene(scene).into_iter().next()
    }
}
