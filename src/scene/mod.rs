//! Scene graph.
//!
//! Nodes live in a generational arena. Structure is parent → children links;
//! logical references from outside the graph (the focus target) are plain
//! `NodeId`s, which go stale instead of dangling when a node is removed.
//!
//! Architecture:
//!   - `SceneGraph`: arena + root group, traversal, world transforms
//!   - `Node`: transform, kind (group / mesh / light), role, frame hook
//!   - `raycast`: ray vs. box/plane geometry, nearest-hit queries

pub mod raycast;

use std::fmt;

use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::panel::PanelOpacity;
use crate::texture::Texture;

// ── Handles ────────────────────────────────────────────────────────────────

/// Identity of a node in one `SceneGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

// ── Node data ──────────────────────────────────────────────────────────────

/// Local transform; rotation is Euler XYZ in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

/// Mesh shapes, centered on the local origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    /// Axis-aligned box of full extents width × height × depth.
    Box { width: f32, height: f32, depth: f32 },
    /// Rectangle in the local XY plane, front face towards +Z.
    Plane { width: f32, height: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Front,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shading {
    /// Unlit: color × texture.
    Basic,
    /// Lambert-lit by the scene's lights.
    Standard,
}

#[derive(Debug, Clone)]
pub struct Material {
    pub shading: Shading,
    /// Linear RGB multiplier.
    pub color: [f32; 3],
    pub map: Option<Texture>,
    pub opacity: f32,
    pub transparent: bool,
    pub side: Side,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            shading: Shading::Basic,
            color: [1.0, 1.0, 1.0],
            map: None,
            opacity: 1.0,
            transparent: false,
            side: Side::Front,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
}

/// Point-ish light; spot cone is treated as a full sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub color: [f32; 3],
    pub intensity: f32,
    /// Distance at which the contribution reaches zero; 0 means unlimited.
    pub range: f32,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
    Light(Light),
}

/// Interaction role flags consumed by focus resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Role {
    ArtworkSurface,
    LabelPanel(PanelOpacity),
}

/// Per-tick callback attached to a node; receives that node.
pub type FrameHook = Box<dyn FnMut(&mut Node)>;

pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub role: Option<Role>,
    pub visible: bool,
    on_frame: Option<FrameHook>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("transform", &self.transform)
            .field("kind", &self.kind)
            .field("role", &self.role)
            .field("has_frame_hook", &self.on_frame.is_some())
            .field("children", &self.children.len())
            .finish()
    }
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            kind,
            role: None,
            visible: true,
            on_frame: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn mesh(name: impl Into<String>, geometry: Geometry, material: Material) -> Self {
        Self::new(name, NodeKind::Mesh(Mesh { geometry, material }))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_frame_hook(mut self, hook: FrameHook) -> Self {
        self.on_frame = Some(hook);
        self
    }

    pub fn mesh_ref(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Texture bound to this node's material, if any.
    pub fn texture(&self) -> Option<&Texture> {
        self.mesh_ref().and_then(|m| m.material.map.as_ref())
    }

    pub fn is_artwork_surface(&self) -> bool {
        matches!(self.role, Some(Role::ArtworkSurface))
    }

    pub fn is_label_panel(&self) -> bool {
        matches!(self.role, Some(Role::LabelPanel(_)))
    }

    pub fn panel(&self) -> Option<&PanelOpacity> {
        match &self.role {
            Some(Role::LabelPanel(panel)) => Some(panel),
            _ => None,
        }
    }

    pub fn panel_mut(&mut self) -> Option<&mut PanelOpacity> {
        match &mut self.role {
            Some(Role::LabelPanel(panel)) => Some(panel),
            _ => None,
        }
    }

    /// Material opacity combined with the panel fade, if this is a panel.
    pub fn effective_opacity(&self) -> f32 {
        let base = self.mesh_ref().map_or(1.0, |m| m.material.opacity);
        match self.panel() {
            Some(panel) => base * panel.value(),
            None => base,
        }
    }

    pub fn has_frame_hook(&self) -> bool {
        self.on_frame.is_some()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

// ── Arena ──────────────────────────────────────────────────────────────────

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Hierarchical node store with a root group.
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut scene = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
        };
        scene.root = scene.alloc(Node::group("scene"));
        scene
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index: (self.slots.len() - 1) as u32,
                generation: 0,
            }
        }
    }

    /// Insert `node` as the last child of `parent`. Falls back to the root if
    /// `parent` is stale.
    pub fn add(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let parent = if self.contains(parent) { parent } else { self.root };
        node.parent = Some(parent);
        node.children.clear();
        let id = self.alloc(node);
        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        id
    }

    /// Detach and drop `id` and its whole subtree. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        if let Some(parent) = self.get(id).and_then(|n| n.parent) {
            if let Some(p) = self.get_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let slot = &mut self.slots[next.index as usize];
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(next.index);
            }
        }
        true
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Depth-first pre-order ids, starting at the root.
    pub fn traverse(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.slots.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get(id) {
                out.push(id);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// Depth-first walk with accumulated world matrices.
    pub fn walk_world<F: FnMut(NodeId, &Node, &Mat4)>(&self, mut visit: F) {
        let mut stack = vec![(self.root, Mat4::IDENTITY)];
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            let world = parent_world * node.transform.matrix();
            visit(id, node, &world);
            for child in node.children.iter().rev() {
                stack.push((*child, world));
            }
        }
    }

    /// World matrix of one node (product of the ancestor chain).
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.get(id)?;
        let mut world = node.transform.matrix();
        while let Some(parent) = node.parent {
            node = self.get(parent)?;
            world = node.transform.matrix() * world;
        }
        Some(world)
    }

    /// Ids of every label panel, in traversal order.
    pub fn panels(&self) -> Vec<NodeId> {
        self.traverse()
            .into_iter()
            .filter(|id| self.get(*id).is_some_and(Node::is_label_panel))
            .collect()
    }

    /// Run the node's frame hook once. Returns false if the node is gone or
    /// carries no hook.
    pub fn run_frame_hook(&mut self, id: NodeId) -> bool {
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        let Some(mut hook) = node.on_frame.take() else {
            return false;
        };
        hook(node);
        // The hook may have installed a replacement; keep that one.
        if node.on_frame.is_none() {
            node.on_frame = Some(hook);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn unit_box() -> Node {
        Node::mesh(
            "box",
            Geometry::Box {
                width: 1.0,
                height: 1.0,
                depth: 1.0,
            },
            Material::default(),
        )
    }

    #[test]
    fn add_links_parent_and_child() {
        let mut scene = SceneGraph::new();
        let group = scene.add(scene.root(), Node::group("g"));
        let child = scene.add(group, unit_box());
        assert_eq!(scene.get(child).unwrap().parent(), Some(group));
        assert_eq!(scene.get(group).unwrap().children(), &[child]);
        assert_eq!(scene.len(), 3);
    }

    #[test]
    fn removed_ids_go_stale_even_when_slot_is_reused() {
        let mut scene = SceneGraph::new();
        let group = scene.add(scene.root(), Node::group("g"));
        let child = scene.add(group, unit_box());
        assert!(scene.remove(group));
        assert!(!scene.contains(group));
        assert!(!scene.contains(child));

        let reused = scene.add(scene.root(), unit_box());
        assert!(scene.contains(reused));
        assert!(!scene.contains(child));
        assert!(!scene.contains(group));
        assert!(scene.get(scene.root()).unwrap().children().contains(&reused));
    }

    #[test]
    fn root_cannot_be_removed() {
        let mut scene = SceneGraph::new();
        assert!(!scene.remove(scene.root()));
        assert!(scene.is_empty());
    }

    #[test]
    fn world_matrix_composes_ancestors() {
        let mut scene = SceneGraph::new();
        let group = scene.add(
            scene.root(),
            Node::group("g").with_transform(Transform::from_position(Vec3::new(1.0, 2.0, 0.0))),
        );
        let child = scene.add(
            group,
            unit_box().with_transform(Transform::from_position(Vec3::new(0.0, 0.0, -3.0))),
        );
        let p = scene.world_matrix(child).unwrap().transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(1.0, 2.0, -3.0)).length() < 1e-5);

        let mut seen = None;
        scene.walk_world(|id, _, world| {
            if id == child {
                seen = Some(world.transform_point3(Vec3::ZERO));
            }
        });
        assert!((seen.unwrap() - p).length() < 1e-5);
    }

    #[test]
    fn traverse_is_preorder() {
        let mut scene = SceneGraph::new();
        let a = scene.add(scene.root(), Node::group("a"));
        let a1 = scene.add(a, Node::group("a1"));
        let b = scene.add(scene.root(), Node::group("b"));
        assert_eq!(scene.traverse(), vec![scene.root(), a, a1, b]);
    }

    #[test]
    fn frame_hook_receives_its_node_and_is_kept() {
        let mut scene = SceneGraph::new();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let id = scene.add(
            scene.root(),
            unit_box().with_frame_hook(Box::new(move |node: &mut Node| {
                seen.set(seen.get() + 1);
                node.transform.rotation.y += 0.5;
            })),
        );
        assert!(scene.run_frame_hook(id));
        assert!(scene.run_frame_hook(id));
        assert_eq!(calls.get(), 2);
        assert!((scene.get(id).unwrap().transform.rotation.y - 1.0).abs() < 1e-6);

        let plain = scene.add(scene.root(), Node::group("plain"));
        assert!(!scene.run_frame_hook(plain));
    }
}
