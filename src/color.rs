//! User-facing colours and their conversion to the linear values the
//! compute program consumes.
//!
//! The conversion is a fixed 2.2 power curve per channel, not an
//! ICC-correct sRGB transfer. Colours whose space cannot be resolved become
//! opaque black.

use serde::{Deserialize, Serialize};

pub const DISPLAY_GAMMA: f32 = 2.2;

const OPAQUE_BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// A colour as a user picks it, in display (gamma-encoded) space.
///
/// Preset files accept any of:
/// - `[r, g, b]` with components in `0..=1`
/// - `"#rrggbb"`, `"#rgb"` or a name such as `"green"`
/// - `{ space: "srgb", rgb: [r, g, b] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Color {
    Components([f32; 3]),
    Tagged { space: String, rgb: [f32; 3] },
    Spec(String),
}

impl Color {
    pub const BLACK: Color = Color::Components([0.0, 0.0, 0.0]);

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::Components([r, g, b])
    }

    pub fn named(spec: &str) -> Self {
        Self::Spec(spec.to_owned())
    }

    /// Display-space components, or `None` when the colour's space or
    /// spelling cannot be resolved.
    pub fn resolve(&self) -> Option<[f32; 3]> {
        match self {
            Self::Components(rgb) => Some(*rgb),
            Self::Tagged { space, rgb } => match space.to_ascii_lowercase().as_str() {
                "srgb" | "device-rgb" | "device_rgb" => Some(*rgb),
                _ => None,
            },
            Self::Spec(spec) => parse_hex(spec).or_else(|| named_color(spec)),
        }
    }
}

/// Convert to the linear RGBA vector uploaded in the parameter block.
/// Alpha is always 1.0.
pub fn to_linear(color: &Color) -> [f32; 4] {
    let Some([r, g, b]) = color.resolve() else {
        tracing::debug!(?color, "unresolvable colour, using opaque black");
        return OPAQUE_BLACK;
    };
    [linearize(r), linearize(g), linearize(b), 1.0]
}

fn linearize(channel: f32) -> f32 {
    // NaN fails the comparison in clamp's min/max chain; treat it as 0.
    let clamped = if channel.is_nan() {
        0.0
    } else {
        channel.clamp(0.0, 1.0)
    };
    clamped.powf(DISPLAY_GAMMA)
}

fn parse_hex(spec: &str) -> Option<[f32; 3]> {
    let digits = spec.trim().strip_prefix('#')?;
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_owned(),
        _ => return None,
    };

    let mut out = [0.0_f32; 3];
    for (index, slot) in out.iter_mut().enumerate() {
        let byte = u8::from_str_radix(expanded.get(index * 2..index * 2 + 2)?, 16).ok()?;
        *slot = f32::from(byte) / 255.0;
    }
    Some(out)
}

fn named_color(spec: &str) -> Option<[f32; 3]> {
    let rgb = match spec.trim().to_ascii_lowercase().as_str() {
        "black" => [0.0, 0.0, 0.0],
        "white" => [1.0, 1.0, 1.0],
        "gray" | "grey" => [0.557, 0.557, 0.576],
        "red" => [1.0, 0.231, 0.188],
        // Matches the default "light" phosphor colour of the desktop app.
        "green" => [0.204, 0.780, 0.349],
        "blue" => [0.0, 0.478, 1.0],
        "amber" => [1.0, 0.690, 0.0],
        "cyan" => [0.196, 0.678, 0.902],
        "magenta" => [0.686, 0.322, 0.871],
        "yellow" => [1.0, 0.800, 0.0],
        _ => return None,
    };
    Some(rgb)
}
