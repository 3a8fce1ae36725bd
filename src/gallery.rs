//! Frame loop compositor.
//!
//! `Gallery` owns the scene graph, the camera, the focus state and the two
//! collaborators (renderer, navigation). The host calls `tick` once per
//! display refresh; each tick runs, strictly in order:
//!
//!   1. decay every label panel
//!   2. resolve focus from the camera's pick ray (may reveal one panel)
//!   3. run the focused surface's frame hook (advances at most one sketch)
//!   4. update navigation (moves the camera for the next tick)
//!   5. render

use glam::Vec3;

use crate::artwork::{ArtworkUnit, PlacedUnit};
use crate::focus::{self, FocusState, Resolution};
use crate::render::{Camera, NavigationControl, Renderer};
use crate::scene::{
    Geometry, Light, Material, Node, NodeId, NodeKind, SceneGraph, Shading, Side, Transform,
};

// ── Room ──

/// The enclosing room box and its single light.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    /// Full extents; the floor sits at y = 0.
    pub size: Vec3,
    pub color: [f32; 3],
    pub light_position: Vec3,
    pub light_intensity: f32,
    pub light_range: f32,
}

impl Default for Room {
    fn default() -> Self {
        Self {
            size: Vec3::new(8.05, 4.0, 8.05),
            color: [0.4, 0.4, 0.4],
            light_position: Vec3::new(0.0, 4.0, 0.0),
            light_intensity: 1.0,
            light_range: 10.0,
        }
    }
}

impl Room {
    /// Add the room box and its light under the scene root.
    pub fn build(&self, scene: &mut SceneGraph) -> (NodeId, NodeId) {
        let walls = Node::mesh(
            "room",
            Geometry::Box {
                width: self.size.x,
                height: self.size.y,
                depth: self.size.z,
            },
            Material {
                shading: Shading::Standard,
                color: self.color,
                side: Side::Double,
                ..Material::default()
            },
        )
        .with_transform(Transform::from_position(Vec3::new(0.0, self.size.y * 0.5, 0.0)));
        let light = Node::new(
            "light",
            NodeKind::Light(Light {
                color: [1.0, 1.0, 1.0],
                intensity: self.light_intensity,
                range: self.light_range,
            }),
        )
        .with_transform(Transform::from_position(self.light_position));

        let root = scene.root();
        (scene.add(root, walls), scene.add(root, light))
    }
}

// ── Frame loop ──

/// What happened during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub resolution: Resolution,
    /// Surface whose frame hook ran, if any.
    pub advanced: Option<NodeId>,
}

pub struct Gallery<R, N> {
    scene: SceneGraph,
    camera: Camera,
    focus: FocusState,
    renderer: R,
    navigation: N,
    ticks: u64,
}

impl<R: Renderer, N: NavigationControl> Gallery<R, N> {
    pub fn new(renderer: R, navigation: N) -> Self {
        Self {
            scene: SceneGraph::new(),
            camera: Camera::default(),
            focus: FocusState::new(),
            renderer,
            navigation,
            ticks: 0,
        }
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_room(mut self, room: &Room) -> Self {
        room.build(&mut self.scene);
        self
    }

    /// Insert a built unit under the scene root.
    pub fn add_artwork(&mut self, unit: ArtworkUnit) -> PlacedUnit {
        let root = self.scene.root();
        unit.attach(&mut self.scene, root)
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn focus(&self) -> &FocusState {
        &self.focus
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn navigation_mut(&mut self) -> &mut N {
        &mut self.navigation
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn tick(&mut self) -> TickReport {
        // 1. decay
        for id in self.scene.panels() {
            if let Some(panel) = self.scene.get_mut(id).and_then(Node::panel_mut) {
                panel.decay();
            }
        }

        // 2. focus
        let pose = self.camera.pose();
        let resolution = focus::resolve(&mut self.scene, &mut self.focus, &pose);

        // 3. advance the focused artwork
        let advanced = self
            .focus
            .live_target(&self.scene)
            .filter(|id| self.scene.run_frame_hook(*id));

        // 4. navigation
        self.navigation.update(&mut self.camera);

        // 5. render
        self.renderer.render(&self.scene, &self.camera);

        self.ticks += 1;
        TickReport {
            tick: self.ticks,
            resolution,
            advanced,
        }
    }
}
