//! Orbit navigation.
//!
//! Input is queued by the host (`rotate`, `dolly`) and applied to the camera
//! in `update`, which the frame loop calls once per tick after focus
//! resolution.

use glam::Vec3;

use super::camera::Camera;

/// Moves the camera once per tick.
pub trait NavigationControl {
    fn update(&mut self, camera: &mut Camera);
}

/// Orbit around a target: drag changes azimuth/elevation, scroll changes
/// distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitControls {
    pub target: Vec3,
    /// Horizontal orbit angle in radians (0 = camera on +Z of the target).
    pub azimuth: f32,
    /// Vertical orbit angle in radians (positive = camera above target).
    pub elevation: f32,
    pub distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub max_elevation: f32,
    pending_rotate: (f32, f32),
    pending_dolly: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::from_camera(&Camera::default())
    }
}

impl OrbitControls {
    /// Orbit state that reproduces `camera`'s current placement.
    pub fn from_camera(camera: &Camera) -> Self {
        let offset = camera.position - camera.target;
        let distance = offset.length().max(1e-3);
        Self {
            target: camera.target,
            azimuth: offset.x.atan2(offset.z),
            elevation: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            distance,
            min_distance: 0.2,
            max_distance: 20.0,
            max_elevation: 1.4,
            pending_rotate: (0.0, 0.0),
            pending_dolly: 0.0,
        }
    }

    /// Queue a drag, in screen pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.pending_rotate.0 += dx;
        self.pending_rotate.1 += dy;
    }

    /// Queue a scroll; positive moves closer.
    pub fn dolly(&mut self, scroll: f32) {
        self.pending_dolly += scroll;
    }

    fn eye(&self) -> Vec3 {
        self.target
            + Vec3::new(
                self.distance * self.azimuth.sin() * self.elevation.cos(),
                self.distance * self.elevation.sin(),
                self.distance * self.azimuth.cos() * self.elevation.cos(),
            )
    }
}

impl NavigationControl for OrbitControls {
    fn update(&mut self, camera: &mut Camera) {
        let (dx, dy) = std::mem::take(&mut self.pending_rotate);
        let scroll = std::mem::take(&mut self.pending_dolly);
        if dx == 0.0 && dy == 0.0 && scroll == 0.0 {
            return;
        }

        self.azimuth -= dx * 0.008;
        self.elevation =
            (self.elevation + dy * 0.008).clamp(-self.max_elevation, self.max_elevation);
        self.distance =
            (self.distance * (1.0 - scroll * 0.003)).clamp(self.min_distance, self.max_distance);

        camera.target = self.target;
        camera.position = self.eye();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_update_leaves_camera_alone() {
        let mut cam = Camera::default();
        let before = cam;
        let mut controls = OrbitControls::from_camera(&cam);
        controls.update(&mut cam);
        assert_eq!(cam, before);
    }

    #[test]
    fn from_camera_round_trips_the_eye() {
        let cam = Camera::looking_at(Vec3::new(2.0, 3.0, -1.0), Vec3::new(0.0, 1.0, 0.0));
        let controls = OrbitControls::from_camera(&cam);
        assert!((controls.eye() - cam.position).length() < 1e-4);
    }

    #[test]
    fn drag_orbits_at_constant_distance() {
        let mut cam = Camera::default();
        let mut controls = OrbitControls::from_camera(&cam);
        controls.rotate(100.0, 0.0);
        controls.update(&mut cam);
        assert!(cam.position.x < 0.0);
        assert!(((cam.position - cam.target).length() - 1.5).abs() < 1e-4);
    }

    #[test]
    fn elevation_and_distance_are_clamped() {
        let mut cam = Camera::default();
        let mut controls = OrbitControls::from_camera(&cam);
        controls.rotate(0.0, 10_000.0);
        controls.dolly(-100_000.0);
        controls.update(&mut cam);
        assert_eq!(controls.elevation, controls.max_elevation);
        assert_eq!(controls.distance, controls.max_distance);

        controls.dolly(10_000.0);
        controls.update(&mut cam);
        assert_eq!(controls.distance, controls.min_distance);
    }
}
