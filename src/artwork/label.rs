//! Label text rasterization.
//!
//! Lines are drawn in white onto a transparent 2000×1000 raster. The first
//! three lines use the heading size with a faux-bold double strike; the rest
//! use the body size. The face is the proportional font bundled with egui,
//! so the binary and the tests render identical panels without touching
//! system fonts.

use std::sync::OnceLock;

use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};

pub const LABEL_WIDTH: u32 = 2000;
pub const LABEL_HEIGHT: u32 = 1000;

const HEADING_PX: f32 = 80.0;
const BODY_PX: f32 = 70.0;
const HEADING_LINES: usize = 3;
const LINE_SPACING: f32 = 1.1;
const LEFT_MARGIN: f32 = 10.0;

fn label_font() -> Option<&'static FontArc> {
    static FONT: OnceLock<Option<FontArc>> = OnceLock::new();
    FONT.get_or_init(|| {
        let defs = egui::FontDefinitions::default();
        let name = defs
            .families
            .get(&egui::FontFamily::Proportional)
            .and_then(|names| names.first())?;
        let data = defs.font_data.get(name)?;
        match FontArc::try_from_vec(data.font.to_vec()) {
            Ok(font) => Some(font),
            Err(e) => {
                log::warn!("bundled label font '{}' is unusable: {}", name, e);
                None
            }
        }
    })
    .as_ref()
}

/// Rasterize `text` (newline-separated) into a fresh label image.
pub fn rasterize_label(text: &str) -> RgbaImage {
    let mut img = RgbaImage::new(LABEL_WIDTH, LABEL_HEIGHT);
    let Some(font) = label_font() else {
        return img;
    };

    let mut baseline = 0.0;
    for (i, line) in text.lines().enumerate() {
        let heading = i < HEADING_LINES;
        let size = if heading { HEADING_PX } else { BODY_PX };
        baseline += size * LINE_SPACING;
        if baseline - size > LABEL_HEIGHT as f32 {
            break;
        }
        draw_line(&mut img, font, line, baseline, size, heading);
    }
    img
}

fn draw_line(img: &mut RgbaImage, font: &FontArc, line: &str, baseline: f32, size: f32, bold: bool) {
    let scaled = font.as_scaled(PxScale::from(size));
    let strikes: &[f32] = if bold { &[0.0, size / 40.0] } else { &[0.0] };

    let mut caret = LEFT_MARGIN;
    let mut previous = None;
    for c in line.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        for dx in strikes {
            let glyph = id.with_scale_and_position(scaled.scale(), point(caret + dx, baseline));
            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|x, y, coverage| {
                    let px = bounds.min.x as i32 + x as i32;
                    let py = bounds.min.y as i32 + y as i32;
                    if px < 0 || py < 0 || px >= LABEL_WIDTH as i32 || py >= LABEL_HEIGHT as i32 {
                        return;
                    }
                    cover(img.get_pixel_mut(px as u32, py as u32), coverage);
                });
            }
        }
        caret += scaled.h_advance(id);
        previous = Some(id);
        if caret > LABEL_WIDTH as f32 {
            break;
        }
    }
}

/// White source-over with `coverage` as alpha.
fn cover(dst: &mut Rgba<u8>, coverage: f32) {
    let src = coverage.clamp(0.0, 1.0);
    let dst_a = dst[3] as f32 / 255.0;
    let out = src + dst_a * (1.0 - src);
    *dst = Rgba([255, 255, 255, (out * 255.0).round() as u8]);
}
