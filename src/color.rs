use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

fn hsl_to_rgb(hue: f32) -> [u8; 3] {
    let hsl = Hsl::new(hue, 0.75, 0.55);
    let rgb: Srgb = hsl.into_color();
    [
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    ]
}

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<[u8; 3]> {
    (0..n)
        .map(|i| hsl_to_rgb((i as f32 / n as f32) * 360.0))
        .collect()
}

/// `n` colours sweeping violet → blue → green → yellow → red, so scan order
/// can be read off a point cloud.
pub fn rainbow(n: usize) -> Vec<[u8; 3]> {
    let span = n.saturating_sub(1).max(1) as f32;
    (0..n)
        .map(|i| hsl_to_rgb(270.0 * (1.0 - i as f32 / span)))
        .collect()
}

/// `#rrggbb` form understood by most plotting front-ends.
pub fn to_hex([r, g, b]: [u8; 3]) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}
