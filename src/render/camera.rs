//! Perspective camera.

use glam::Vec3;

use crate::focus::ViewerPose;
use crate::scene::raycast::Ray;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Point the camera looks at.
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov_deg: f32,
    /// Width / height.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.5, 1.5),
            target: Vec3::new(0.0, 1.5, 0.0),
            fov_deg: 75.0,
            aspect: 16.0 / 9.0,
            near: 0.05,
            far: 100.0,
        }
    }
}

impl Camera {
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            ..Self::default()
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// (forward, right, up); falls back to +Z as "right" when looking
    /// straight up or down.
    fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = self.forward();
        let right = forward.cross(Vec3::Y).try_normalize().unwrap_or(Vec3::X);
        let up = right.cross(forward);
        (forward, right, up)
    }

    /// Screen-center pose used for focus picking.
    pub fn pose(&self) -> ViewerPose {
        ViewerPose::new(self.position, self.forward())
    }

    /// Ray through normalized device coordinates `(u, v)` in [-1, 1],
    /// +v up.
    pub fn ray(&self, u: f32, v: f32) -> Ray {
        let (forward, right, up) = self.basis();
        let fov_factor = (self.fov_deg.to_radians() * 0.5).tan();
        let dir = forward + right * (u * fov_factor * self.aspect) + up * (v * fov_factor);
        Ray::new(self.position, dir)
    }

    pub fn pick_ray(&self) -> Ray {
        self.pose().ray()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_gallery_entry_pose() {
        let cam = Camera::default();
        assert!((cam.forward() - Vec3::NEG_Z).length() < 1e-6);
        assert_eq!(cam.pick_ray().origin, Vec3::new(0.0, 1.5, 1.5));
    }

    #[test]
    fn center_ray_equals_pick_ray() {
        let cam = Camera::looking_at(Vec3::new(1.0, 2.0, 3.0), Vec3::new(-2.0, 0.5, -1.0));
        let a = cam.ray(0.0, 0.0).direction;
        let b = cam.pick_ray().direction;
        assert!((a - b).length() < 1e-6);
    }

    #[test]
    fn corner_rays_spread_by_fov() {
        let mut cam = Camera::default();
        cam.set_viewport(100, 100);
        let top = cam.ray(0.0, 1.0).direction;
        let angle = top.angle_between(cam.forward()).to_degrees();
        assert!((angle - 37.5).abs() < 1e-3);
        assert!(cam.ray(1.0, 0.0).direction.x > 0.0);
    }
}
