//! Fixed-layout parameter block uploaded to the compute program.
//!
//! Field order, count and widths are the wire contract with
//! `shaders/wgsl/effects.wgsl`. Any change bumps [`UNIFORM_LAYOUT_VERSION`]
//! and must land together with the shader.

use bytemuck::{Pod, Zeroable};

use crate::color::to_linear;
use crate::glyph_atlas::GlyphAtlas;
use crate::params::{AsciiSettings, CrtSettings, DitherMatrix, Effect, ParameterBlock};

pub const UNIFORM_LAYOUT_VERSION: u32 = 1;

/// 128 bytes, no implicit padding. Mirrors `struct Params` in WGSL.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq)]
pub struct EffectUniforms {
    pub mode: i32,
    pub grayscale: i32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue_shift: f32,
    pub spread: f32,
    pub matrix_size: i32,
    pub image_size: [f32; 2],
    pub columns: f32,
    pub palette_steps: f32,
    pub color_dark: [f32; 4],
    pub color_light: [f32; 4],
    pub crt_scale: f32,
    pub crt_scanline: f32,
    pub crt_blur: f32,
    pub crt_glow_intensity: f32,
    pub crt_glow_spread: f32,
    pub crt_warp: f32,
    pub crt_vignette: f32,
    pub halftone_misprint: f32,
    pub glyph_count: i32,
    pub glyph_scale: f32,
    pub limited_palette: i32,
    pub atlas_cell: i32,
}

impl EffectUniforms {
    /// Flatten `params` into the wire block. Knobs of inactive modes carry
    /// that mode's defaults so the program never reads garbage.
    pub fn from_params(
        params: &ParameterBlock,
        image_size: (u32, u32),
        atlas: Option<&GlyphAtlas>,
    ) -> Self {
        let mut matrix = DitherMatrix::default();
        let mut palette_steps = 2;
        let mut misprint = 0.0;
        let mut crt = CrtSettings::default();
        let default_ascii = AsciiSettings::default();
        let mut ascii = &default_ascii;

        match &params.effect {
            Effect::OrderedDither {
                matrix: m,
                palette_steps: steps,
            } => {
                matrix = *m;
                palette_steps = *steps;
            }
            Effect::BlueNoiseDither { palette_steps: steps }
            | Effect::ErrorDiffusion { palette_steps: steps } => palette_steps = *steps,
            Effect::Crt(settings) => crt = settings.clone(),
            Effect::Halftone { misprint: amount } => misprint = *amount,
            Effect::AsciiArt(settings) => ascii = settings,
        }

        let (glyph_count, atlas_cell) = match atlas {
            Some(atlas) if params.effect.ascii().is_some() => {
                (atlas.glyph_count() as i32, atlas.cell_size() as i32)
            }
            _ => (0, 0),
        };

        Self {
            mode: params.kind().wire_index(),
            grayscale: i32::from(params.tone.grayscale),
            brightness: params.adjust.brightness,
            contrast: params.adjust.contrast,
            saturation: params.adjust.saturation,
            hue_shift: params.adjust.hue_shift,
            spread: params.tone.spread,
            matrix_size: matrix.size(),
            image_size: [image_size.0 as f32, image_size.1 as f32],
            columns: params.tone.columns,
            palette_steps: palette_steps as f32,
            color_dark: to_linear(&params.tone.dark),
            color_light: to_linear(&params.tone.light),
            crt_scale: crt.scale,
            crt_scanline: crt.scanline,
            crt_blur: crt.blur,
            crt_glow_intensity: crt.glow_intensity,
            crt_glow_spread: crt.glow_spread,
            crt_warp: crt.warp,
            crt_vignette: crt.vignette,
            halftone_misprint: misprint,
            glyph_count,
            glyph_scale: ascii.glyph_scale,
            limited_palette: i32::from(ascii.limited_palette),
            atlas_cell,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
