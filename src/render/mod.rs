//! Rendering collaborators: the renderer and navigation seams the frame loop
//! drives, plus the camera and frame statistics they share.

pub mod camera;
pub mod controls;
pub mod software;
pub mod stats;

pub use camera::Camera;
pub use controls::{NavigationControl, OrbitControls};
pub use software::SoftwareRenderer;
pub use stats::FrameStats;

use crate::scene::SceneGraph;

/// Draws one frame of `scene` as seen from `camera`.
pub trait Renderer {
    fn render(&mut self, scene: &SceneGraph, camera: &Camera);
}

/// Renders nothing; remembers what it was asked to draw.
#[derive(Debug, Default, Clone)]
pub struct NullRenderer {
    pub frames: u64,
    pub last_camera: Option<Camera>,
}

impl Renderer for NullRenderer {
    fn render(&mut self, _scene: &SceneGraph, camera: &Camera) {
        self.frames += 1;
        self.last_camera = Some(*camera);
    }
}
