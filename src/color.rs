//! CSS-style color strings.
//!
//! Accepted by the sketch `fill`/`stroke`/`background` calls and by the
//! gallery manifest (`room.color`).

use image::Rgba;

/// Parse a CSS color value into [r, g, b, a] (0.0–1.0).
pub fn parse_css_color(val: &str) -> Option<[f32; 4]> {
    let v = val.trim().to_lowercase();

    if let Some(named) = named_color(&v) {
        return Some(named);
    }

    // Hex: #rgb, #rgba, #rrggbb, #rrggbbaa
    if let Some(hex) = v.strip_prefix('#') {
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|n| n * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let rgba = match hex.len() {
            3 => [nibble(0)?, nibble(1)?, nibble(2)?, 255],
            4 => [nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?],
            6 => [byte(0)?, byte(2)?, byte(4)?, 255],
            8 => [byte(0)?, byte(2)?, byte(4)?, byte(6)?],
            _ => return None,
        };
        return Some(rgba.map(|c| c as f32 / 255.0));
    }

    // rgb(r, g, b) / rgba(r, g, b, a)
    if v.starts_with("rgb") {
        let inner = v
            .trim_start_matches("rgba(")
            .trim_start_matches("rgb(")
            .trim_end_matches(')');
        let nums: Vec<f32> = inner
            .split(',')
            .filter_map(|s| s.trim().parse::<f32>().ok())
            .collect();
        if nums.len() >= 3 {
            let a = if nums.len() >= 4 { nums[3] } else { 1.0 };
            return Some([
                (nums[0] / 255.0).clamp(0.0, 1.0),
                (nums[1] / 255.0).clamp(0.0, 1.0),
                (nums[2] / 255.0).clamp(0.0, 1.0),
                a.clamp(0.0, 1.0),
            ]);
        }
    }

    None
}

fn named_color(name: &str) -> Option<[f32; 4]> {
    let rgb: [u8; 3] = match name {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "lime" => [0, 255, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "cyan" | "aqua" => [0, 255, 255],
        "magenta" | "fuchsia" => [255, 0, 255],
        "orange" => [255, 165, 0],
        "purple" => [128, 0, 128],
        "pink" => [255, 192, 203],
        "gray" | "grey" => [128, 128, 128],
        "transparent" => return Some([0.0; 4]),
        _ => return None,
    };
    Some([
        rgb[0] as f32 / 255.0,
        rgb[1] as f32 / 255.0,
        rgb[2] as f32 / 255.0,
        1.0,
    ])
}

/// Quantize a 0–255 channel value the way the canvas stores it.
pub fn channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Normalized color → 8-bit pixel.
pub fn to_rgba8(c: [f32; 4]) -> Rgba<u8> {
    Rgba(c.map(|v| channel(v as f64 * 255.0)))
}
