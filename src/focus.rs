//! Gaze focus: which artwork surface the viewer is looking at.
//!
//! One ray per tick from the viewer along its forward direction. The nearest
//! mesh hit decides:
//!   - artwork surface → it becomes the focus target
//!   - label panel     → that panel reveals this tick, focus unchanged
//!   - anything else   → focus unchanged (there is no unfocus-on-miss)

use glam::Vec3;

use crate::scene::raycast::{Ray, Raycaster};
use crate::scene::{NodeId, SceneGraph};

// ── Viewer pose ─────────────────────────────────────────────

/// Viewer position and screen-center direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerPose {
    pub position: Vec3,
    /// Unit length.
    pub forward: Vec3,
}

impl ViewerPose {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self {
            position,
            forward: forward.normalize_or_zero(),
        }
    }

    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        Self::new(position, target - position)
    }

    pub fn ray(&self) -> Ray {
        Ray::new(self.position, self.forward)
    }
}

// ── Focus state ─────────────────────────────────────────────

/// The single focused surface, held by identity only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FocusState {
    target: Option<NodeId>,
}

impl FocusState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last surface hit, even if it has since been removed.
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    /// The target, if it still exists in `scene`.
    pub fn live_target(&self, scene: &SceneGraph) -> Option<NodeId> {
        self.target.filter(|id| scene.contains(*id))
    }
}

/// What one resolve pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A surface was hit and is now (or still) the target.
    Focused(NodeId),
    /// A label panel was hit and revealed; focus untouched.
    PanelRevealed(NodeId),
    /// Nothing interactive was hit; focus untouched.
    Unchanged,
}

/// Cast the pick ray and update `focus` (or one panel's opacity).
///
/// Panels must already have had this tick's decay applied; `reveal` then
/// replaces it.
pub fn resolve(scene: &mut SceneGraph, focus: &mut FocusState, pose: &ViewerPose) -> Resolution {
    let Some(hit) = Raycaster::new(pose.ray()).nearest(scene) else {
        return Resolution::Unchanged;
    };
    let Some(node) = scene.get_mut(hit.node) else {
        return Resolution::Unchanged;
    };

    if node.is_artwork_surface() {
        if focus.target != Some(hit.node) {
            log::debug!("focus → {} at {:.2}", node.name, hit.distance);
            focus.target = Some(hit.node);
        }
        return Resolution::Focused(hit.node);
    }
    if let Some(panel) = node.panel_mut() {
        panel.reveal();
        return Resolution::PanelRevealed(hit.node);
    }
    Resolution::Unchanged
}
