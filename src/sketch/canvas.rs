//! Private drawing surface of one sketch.
//!
//! Every shape is reduced to a polygon in pixel space (after the current
//! affine transform) and filled with an even-odd scanline pass sampled at
//! pixel centers. Strokes are quads along each edge. Colors are straight
//! (non-premultiplied) RGBA8 with source-over blending.

use glam::{Affine2, Vec2};
use image::{Rgba, RgbaImage};

use super::RenderMode;

/// Drawing state saved by `push()` and restored by `pop()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
    pub fill: Option<Rgba<u8>>,
    pub stroke: Option<Rgba<u8>>,
    pub stroke_weight: f32,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: Some(Rgba([255, 255, 255, 255])),
            stroke: Some(Rgba([0, 0, 0, 255])),
            stroke_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Canvas {
    pixels: RgbaImage,
    mode: RenderMode,
    style: Style,
    transform: Affine2,
    saved: Vec<(Style, Affine2)>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, mode: RenderMode) -> Self {
        Self {
            pixels: RgbaImage::new(width.max(1), height.max(1)),
            mode,
            style: Style::default(),
            transform: Affine2::IDENTITY,
            saved: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }

    /// Pixels as they should appear in the texture.
    pub fn snapshot(&self) -> RgbaImage {
        let mut img = self.pixels.clone();
        if self.mode == RenderMode::Opaque {
            for p in img.pixels_mut() {
                let a = p[3] as u32;
                for c in 0..3 {
                    p[c] = (p[c] as u32 * a / 255) as u8;
                }
                p[3] = 255;
            }
        }
        img
    }

    /// Reset style and transform; called before each frame like a fresh
    /// drawing context.
    pub fn reset_frame_state(&mut self) {
        self.transform = Affine2::IDENTITY;
        self.saved.clear();
    }

    // ── State ───────────────────────────────────────────────────────────────

    pub fn set_fill(&mut self, color: Option<Rgba<u8>>) {
        self.style.fill = color;
    }

    pub fn set_stroke(&mut self, color: Option<Rgba<u8>>) {
        self.style.stroke = color;
    }

    pub fn set_stroke_weight(&mut self, weight: f32) {
        self.style.stroke_weight = weight.max(0.0);
    }

    pub fn push(&mut self) {
        self.saved.push((self.style, self.transform));
    }

    /// Unbalanced `pop()` calls are ignored.
    pub fn pop(&mut self) {
        if let Some((style, transform)) = self.saved.pop() {
            self.style = style;
            self.transform = transform;
        }
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        self.transform = self.transform * Affine2::from_translation(Vec2::new(x, y));
    }

    pub fn rotate(&mut self, radians: f32) {
        self.transform = self.transform * Affine2::from_angle(radians);
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.transform = self.transform * Affine2::from_scale(Vec2::new(sx, sy));
    }

    // ── Whole-surface operations ────────────────────────────────────────────

    pub fn background(&mut self, color: Rgba<u8>) {
        if color[3] == 255 {
            for p in self.pixels.pixels_mut() {
                *p = color;
            }
        } else {
            for p in self.pixels.pixels_mut() {
                blend(p, color);
            }
        }
    }

    pub fn clear(&mut self) {
        for p in self.pixels.pixels_mut() {
            *p = Rgba([0, 0, 0, 0]);
        }
    }

    // ── Shapes ──────────────────────────────────────────────────────────────

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let local = [
            Vec2::new(x, y),
            Vec2::new(x + w, y),
            Vec2::new(x + w, y + h),
            Vec2::new(x, y + h),
        ];
        self.shape(&local, true);
    }

    pub fn ellipse(&mut self, cx: f32, cy: f32, w: f32, h: f32) {
        let (rx, ry) = (w.abs() * 0.5, h.abs() * 0.5);
        let radius_px = rx.max(ry) * self.linear_scale();
        let segments = (radius_px * 0.5).ceil().clamp(16.0, 180.0) as usize;
        let local: Vec<Vec2> = (0..segments)
            .map(|i| {
                let a = i as f32 / segments as f32 * std::f32::consts::TAU;
                Vec2::new(cx + rx * a.cos(), cy + ry * a.sin())
            })
            .collect();
        self.shape(&local, true);
    }

    pub fn triangle(&mut self, points: [Vec2; 3]) {
        self.shape(&points, true);
    }

    pub fn quad(&mut self, points: [Vec2; 4]) {
        self.shape(&points, true);
    }

    /// Stroke-only segment.
    pub fn line(&mut self, a: Vec2, b: Vec2) {
        let Some(color) = self.style.stroke else { return };
        let hw = self.stroke_half_width();
        let (pa, pb) = (self.to_px(a), self.to_px(b));
        self.stroke_segment(pa, pb, hw, color);
    }

    /// A dot of diameter `strokeWeight`, drawn with the stroke color.
    pub fn point(&mut self, p: Vec2) {
        let Some(color) = self.style.stroke else { return };
        let r = self.stroke_half_width().max(0.5);
        let center = self.to_px(p);
        let disk = disk_polygon(center, r);
        fill_polygon(&mut self.pixels, &disk, color);
    }

    fn shape(&mut self, local: &[Vec2], closed: bool) {
        let pts: Vec<Vec2> = local.iter().map(|p| self.to_px(*p)).collect();
        if let Some(fill) = self.style.fill {
            fill_polygon(&mut self.pixels, &pts, fill);
        }
        if let Some(stroke) = self.style.stroke {
            let hw = self.stroke_half_width();
            if hw <= 0.0 {
                return;
            }
            let n = pts.len();
            let edges = if closed { n } else { n.saturating_sub(1) };
            for i in 0..edges {
                self.stroke_segment(pts[i], pts[(i + 1) % n], hw, stroke);
            }
        }
    }

    fn stroke_segment(&mut self, a: Vec2, b: Vec2, hw: f32, color: Rgba<u8>) {
        if hw <= 0.0 {
            return;
        }
        let dir = b - a;
        if dir.length_squared() < 1e-12 {
            let disk = disk_polygon(a, hw);
            fill_polygon(&mut self.pixels, &disk, color);
            return;
        }
        let n = dir.perp().normalize() * hw;
        let quad = [a + n, b + n, b - n, a - n];
        fill_polygon(&mut self.pixels, &quad, color);
    }

    fn to_px(&self, p: Vec2) -> Vec2 {
        self.transform.transform_point2(p)
    }

    fn linear_scale(&self) -> f32 {
        self.transform.matrix2.determinant().abs().sqrt()
    }

    fn stroke_half_width(&self) -> f32 {
        self.style.stroke_weight * self.linear_scale() * 0.5
    }
}

fn disk_polygon(center: Vec2, r: f32) -> Vec<Vec2> {
    let segments = (r * 2.0).ceil().clamp(8.0, 64.0) as usize;
    (0..segments)
        .map(|i| {
            let a = i as f32 / segments as f32 * std::f32::consts::TAU;
            center + Vec2::new(a.cos(), a.sin()) * r
        })
        .collect()
}

/// Even-odd scanline fill sampled at pixel centers.
fn fill_polygon(img: &mut RgbaImage, pts: &[Vec2], color: Rgba<u8>) {
    if pts.len() < 3 || color[3] == 0 {
        return;
    }
    let (w, h) = (img.width() as i64, img.height() as i64);
    let (min_y, max_y) = pts
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
    if !min_y.is_finite() || !max_y.is_finite() {
        return;
    }
    let y_start = ((min_y - 0.5).ceil() as i64).max(0);
    let y_end = ((max_y - 0.5).floor() as i64).min(h - 1);

    let n = pts.len();
    let mut xs: Vec<f32> = Vec::with_capacity(n);
    for y in y_start..=y_end {
        let cy = y as f32 + 0.5;
        xs.clear();
        for i in 0..n {
            let (a, b) = (pts[i], pts[(i + 1) % n]);
            if (a.y <= cy && b.y > cy) || (b.y <= cy && a.y > cy) {
                xs.push(a.x + (cy - a.y) / (b.y - a.y) * (b.x - a.x));
            }
        }
        xs.sort_by(f32::total_cmp);
        for span in xs.chunks_exact(2) {
            let x0 = ((span[0] - 0.5).ceil() as i64).max(0);
            let x1 = ((span[1] - 0.5).ceil() as i64).min(w);
            for x in x0..x1 {
                blend(img.get_pixel_mut(x as u32, y as u32), color);
            }
        }
    }
}

/// Source-over compositing of straight-alpha colors.
fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = src[3] as u32;
    if sa == 255 {
        *dst = src;
        return;
    }
    if sa == 0 {
        return;
    }
    let da = dst[3] as u32;
    let keep = da * (255 - sa) / 255;
    let out_a = sa + keep;
    if out_a == 0 {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }
    for c in 0..3 {
        let v = (src[c] as u32 * sa + dst[c] as u32 * keep) / out_a;
        dst[c] = v.min(255) as u8;
    }
    dst[3] = out_a.min(255) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn no_stroke(w: u32, h: u32) -> Canvas {
        let mut c = Canvas::new(w, h, RenderMode::P2D);
        c.set_stroke(None);
        c
    }

    #[test]
    fn new_p2d_surface_is_transparent() {
        let c = Canvas::new(4, 3, RenderMode::P2D);
        assert_eq!((c.width(), c.height()), (4, 3));
        assert_eq!(c.pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(c.mode(), RenderMode::P2D);
        assert_eq!(*c.style(), Style::default());
    }

    #[test]
    fn opaque_mode_snapshot_has_full_alpha() {
        let mut c = Canvas::new(2, 2, RenderMode::Opaque);
        c.background(Rgba([200, 100, 50, 128]));
        let snap = c.snapshot();
        assert!(snap.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn background_fills_everything() {
        let mut c = no_stroke(5, 5);
        c.translate(100.0, 100.0);
        c.background(BLUE);
        assert!(c.snapshot().pixels().all(|p| *p == BLUE));
    }

    #[test]
    fn rect_covers_pixel_centers_inside() {
        let mut c = no_stroke(10, 10);
        c.set_fill(Some(RED));
        c.rect(2.0, 3.0, 4.0, 2.0);
        assert_eq!(c.pixel(2, 3), RED);
        assert_eq!(c.pixel(5, 4), RED);
        assert_eq!(c.pixel(6, 4), Rgba([0, 0, 0, 0]));
        assert_eq!(c.pixel(2, 5), Rgba([0, 0, 0, 0]));
        assert_eq!(c.pixel(1, 3), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn full_surface_rect_leaves_no_gaps() {
        let mut c = no_stroke(7, 5);
        c.set_fill(Some(RED));
        c.rect(0.0, 0.0, 7.0, 5.0);
        assert!(c.snapshot().pixels().all(|p| *p == RED));
    }

    #[test]
    fn ellipse_center_filled_corner_empty() {
        let mut c = no_stroke(20, 20);
        c.set_fill(Some(RED));
        c.ellipse(10.0, 10.0, 16.0, 16.0);
        assert_eq!(c.pixel(10, 10), RED);
        assert_eq!(c.pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(c.pixel(19, 19), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn transform_push_pop() {
        let mut c = no_stroke(10, 10);
        c.set_fill(Some(RED));
        c.push();
        c.translate(5.0, 5.0);
        c.set_stroke_weight(4.0);
        c.rect(0.0, 0.0, 2.0, 2.0);
        c.pop();
        assert_eq!(c.style().stroke_weight, 1.0);
        assert_eq!(c.style().fill, Some(RED));
        c.rect(0.0, 0.0, 1.0, 1.0);
        assert_eq!(c.pixel(5, 5), RED);
        assert_eq!(c.pixel(0, 0), RED);
        assert_eq!(c.pixel(3, 3), Rgba([0, 0, 0, 0]));
        // Extra pops are harmless.
        c.pop();
    }

    #[test]
    fn line_uses_stroke_color_and_weight() {
        let mut c = Canvas::new(10, 10, RenderMode::P2D);
        c.set_stroke(Some(BLUE));
        c.set_stroke_weight(2.0);
        c.line(Vec2::new(0.0, 5.0), Vec2::new(10.0, 5.0));
        assert_eq!(c.pixel(3, 4), BLUE);
        assert_eq!(c.pixel(3, 5), BLUE);
        assert_eq!(c.pixel(3, 7), Rgba([0, 0, 0, 0]));

        c.set_stroke(None);
        c.line(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));
        assert_eq!(c.pixel(3, 0), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn translucent_fill_blends() {
        let mut c = no_stroke(1, 1);
        c.background(Rgba([0, 0, 0, 255]));
        c.set_fill(Some(Rgba([255, 255, 255, 128])));
        c.rect(0.0, 0.0, 1.0, 1.0);
        let p = c.pixel(0, 0);
        assert!(p[0] > 120 && p[0] < 136);
        assert_eq!(p[3], 255);
    }
}
