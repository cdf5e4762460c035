//! The xterm 256-colour palette behind ASCII mode's limited-palette option.
//!
//! Indices `0..16` are the system colours, `16..232` the 6x6x6 cube and
//! `232..256` a 24-step grey ramp. [`nearest`] picks colours the same way
//! `xterm256` in `shaders/wgsl/effects.wgsl` does, so host code can predict
//! what the compute program draws.

pub const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

const SYSTEM: [[u8; 3]; 16] = [
    [0, 0, 0],
    [128, 0, 0],
    [0, 128, 0],
    [128, 128, 0],
    [0, 0, 128],
    [128, 0, 128],
    [0, 128, 128],
    [192, 192, 192],
    [128, 128, 128],
    [255, 0, 0],
    [0, 255, 0],
    [255, 255, 0],
    [0, 0, 255],
    [255, 0, 255],
    [0, 255, 255],
    [255, 255, 255],
];

/// Palette entry `index` as 8-bit RGB.
pub fn entry(index: u8) -> [u8; 3] {
    match index {
        0..=15 => SYSTEM[index as usize],
        16..=231 => {
            let i = index - 16;
            [
                CUBE_LEVELS[(i / 36) as usize],
                CUBE_LEVELS[(i / 6 % 6) as usize],
                CUBE_LEVELS[(i % 6) as usize],
            ]
        }
        _ => {
            let v = 8 + 10 * (index - 232);
            [v, v, v]
        }
    }
}

/// Index of the palette entry closest to `rgb` (components in `0..=1`).
///
/// Searches the system colours, then the nearest cube cell, then the
/// nearest grey; an exact tie keeps the earlier candidate.
pub fn nearest(rgb: [f32; 3]) -> u8 {
    let v = rgb.map(|c| if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) * 255.0 });

    let mut best = 0u8;
    let mut best_distance = f32::MAX;
    let mut consider = |index: u8, candidate: [f32; 3]| {
        let d = distance_sq(v, candidate);
        if d < best_distance {
            best_distance = d;
            best = index;
        }
    };

    for (index, color) in SYSTEM.into_iter().enumerate() {
        consider(index as u8, color.map(f32::from));
    }

    let [r, g, b] = v.map(cube_step);
    consider(
        16 + 36 * r + 6 * g + b,
        [r, g, b].map(|step| f32::from(CUBE_LEVELS[step as usize])),
    );

    let mean = (v[0] + v[1] + v[2]) / 3.0;
    let step = ((mean - 8.0) / 10.0).round_ties_even().clamp(0.0, 23.0);
    let grey = 8.0 + 10.0 * step;
    consider(232 + step as u8, [grey; 3]);

    best
}

/// [`nearest`] as 8-bit RGB.
pub fn quantize(rgb: [f32; 3]) -> [u8; 3] {
    entry(nearest(rgb))
}

fn cube_step(value: f32) -> u8 {
    let mut best = 0;
    let mut best_distance = f32::MAX;
    for (step, level) in CUBE_LEVELS.into_iter().enumerate() {
        let d = (value - f32::from(level)).abs();
        if d < best_distance {
            best_distance = d;
            best = step as u8;
        }
    }
    best
}

fn distance_sq(a: [f32; 3], b: [f32; 3]) -> f32 {
    a.iter().zip(b).map(|(a, b)| (a - b) * (a - b)).sum()
}
