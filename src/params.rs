//! Effect parameters as the user sets them.
//!
//! [`Effect`] is a closed variant: each mode carries only the knobs it
//! reads. The fixed-layout block the compute program sees is produced from
//! this in [`crate::uniforms`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::{PipelineError, Result};

pub const DEFAULT_ASCII_CHARS: &str = " .:-=+*#%@";
pub const SYSTEM_FONT: &str = "System";

/// Font identifiers offered by the desktop front end. Any family name is
/// accepted; these are the ones known to exist on a stock macOS install.
pub const FONT_CHOICES: [&str; 5] = [SYSTEM_FONT, "Menlo", "Monaco", "Courier", "Andale Mono"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    OrderedDither,
    Crt,
    BlueNoiseDither,
    ErrorDiffusion,
    Halftone,
    AsciiArt,
}

impl EffectKind {
    pub const ALL: [EffectKind; 6] = [
        Self::OrderedDither,
        Self::Crt,
        Self::BlueNoiseDither,
        Self::ErrorDiffusion,
        Self::Halftone,
        Self::AsciiArt,
    ];

    /// Mode number written into the uniform block. Part of the program
    /// contract; never renumber.
    pub fn wire_index(self) -> i32 {
        match self {
            Self::OrderedDither => 0,
            Self::Crt => 1,
            Self::BlueNoiseDither => 2,
            Self::ErrorDiffusion => 3,
            Self::Halftone => 4,
            Self::AsciiArt => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::OrderedDither => "ordered_dither",
            Self::Crt => "crt",
            Self::BlueNoiseDither => "blue_noise_dither",
            Self::ErrorDiffusion => "error_diffusion",
            Self::Halftone => "halftone",
            Self::AsciiArt => "ascii_art",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectKind {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        let kind = match normalized.as_str() {
            "ordered_dither" | "bayer" => Self::OrderedDither,
            "crt" => Self::Crt,
            "blue_noise_dither" | "blue_noise" | "blue" => Self::BlueNoiseDither,
            "error_diffusion" | "diffusion" | "diff" => Self::ErrorDiffusion,
            "halftone" | "half" => Self::Halftone,
            "ascii_art" | "ascii" => Self::AsciiArt,
            _ => {
                return Err(PipelineError::InvalidParameters(format!(
                    "unknown effect mode '{raw}' (expected one of: {})",
                    Self::ALL.map(Self::name).join(", ")
                )))
            }
        };
        Ok(kind)
    }
}

/// Ordered-dither threshold matrix edge length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DitherMatrix {
    X2,
    #[default]
    X4,
    X8,
    X16,
}

impl DitherMatrix {
    pub fn size(self) -> i32 {
        match self {
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
            Self::X16 => 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrtSettings {
    pub scale: f32,
    pub scanline: f32,
    pub blur: f32,
    pub glow_intensity: f32,
    pub glow_spread: f32,
    pub warp: f32,
    pub vignette: f32,
}

impl Default for CrtSettings {
    fn default() -> Self {
        Self {
            scale: 2.0,
            scanline: 0.8,
            blur: 0.2,
            glow_intensity: 0.4,
            glow_spread: 0.5,
            warp: 0.3,
            vignette: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsciiSettings {
    pub chars: String,
    pub font: String,
    pub glyph_scale: f32,
    /// Quantize cell colours to the xterm 256-colour palette
    /// (see [`crate::palette`]).
    pub limited_palette: bool,
}

impl Default for AsciiSettings {
    fn default() -> Self {
        Self {
            chars: DEFAULT_ASCII_CHARS.to_owned(),
            font: SYSTEM_FONT.to_owned(),
            glyph_scale: 1.0,
            limited_palette: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    OrderedDither {
        #[serde(default)]
        matrix: DitherMatrix,
        #[serde(default = "default_palette_steps")]
        palette_steps: u32,
    },
    Crt(CrtSettings),
    BlueNoiseDither {
        #[serde(default = "default_palette_steps")]
        palette_steps: u32,
    },
    ErrorDiffusion {
        #[serde(default = "default_palette_steps")]
        palette_steps: u32,
    },
    Halftone {
        #[serde(default)]
        misprint: f32,
    },
    AsciiArt(AsciiSettings),
}

fn default_palette_steps() -> u32 {
    2
}

impl Default for Effect {
    fn default() -> Self {
        Self::AsciiArt(AsciiSettings::default())
    }
}

impl Effect {
    pub fn default_for(kind: EffectKind) -> Self {
        match kind {
            EffectKind::OrderedDither => Self::OrderedDither {
                matrix: DitherMatrix::default(),
                palette_steps: default_palette_steps(),
            },
            EffectKind::Crt => Self::Crt(CrtSettings::default()),
            EffectKind::BlueNoiseDither => Self::BlueNoiseDither {
                palette_steps: default_palette_steps(),
            },
            EffectKind::ErrorDiffusion => Self::ErrorDiffusion {
                palette_steps: default_palette_steps(),
            },
            EffectKind::Halftone => Self::Halftone { misprint: 0.0 },
            EffectKind::AsciiArt => Self::AsciiArt(AsciiSettings::default()),
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            Self::OrderedDither { .. } => EffectKind::OrderedDither,
            Self::Crt(_) => EffectKind::Crt,
            Self::BlueNoiseDither { .. } => EffectKind::BlueNoiseDither,
            Self::ErrorDiffusion { .. } => EffectKind::ErrorDiffusion,
            Self::Halftone { .. } => EffectKind::Halftone,
            Self::AsciiArt(_) => EffectKind::AsciiArt,
        }
    }

    pub fn ascii(&self) -> Option<&AsciiSettings> {
        match self {
            Self::AsciiArt(settings) => Some(settings),
            _ => None,
        }
    }

    pub fn ascii_mut(&mut self) -> Option<&mut AsciiSettings> {
        match self {
            Self::AsciiArt(settings) => Some(settings),
            _ => None,
        }
    }
}

/// Colour adjustments applied before the mode-specific effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Adjustments {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    /// Radians.
    pub hue_shift: f32,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            hue_shift: 0.0,
        }
    }
}

/// Knobs shared by several modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tone {
    pub grayscale: bool,
    pub dark: Color,
    pub light: Color,
    /// Effect resolution in columns (ASCII cells, dither cells, halftone dots).
    pub columns: f32,
    pub spread: f32,
}

impl Default for Tone {
    fn default() -> Self {
        Self {
            grayscale: true,
            dark: Color::named("black"),
            light: Color::named("green"),
            columns: 80.0,
            spread: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterBlock {
    #[serde(rename = "mode")]
    pub effect: Effect,
    pub adjust: Adjustments,
    pub tone: Tone,
}

impl ParameterBlock {
    pub fn with_effect(effect: Effect) -> Self {
        Self {
            effect,
            ..Self::default()
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.effect.kind()
    }

    /// Reject values no control could produce (NaN, infinities).
    pub fn validate(&self) -> Result<()> {
        let mut scalars = vec![
            ("adjust.brightness", self.adjust.brightness),
            ("adjust.contrast", self.adjust.contrast),
            ("adjust.saturation", self.adjust.saturation),
            ("adjust.hue_shift", self.adjust.hue_shift),
            ("tone.columns", self.tone.columns),
            ("tone.spread", self.tone.spread),
        ];
        match &self.effect {
            Effect::Crt(crt) => scalars.extend([
                ("mode.scale", crt.scale),
                ("mode.scanline", crt.scanline),
                ("mode.blur", crt.blur),
                ("mode.glow_intensity", crt.glow_intensity),
                ("mode.glow_spread", crt.glow_spread),
                ("mode.warp", crt.warp),
                ("mode.vignette", crt.vignette),
            ]),
            Effect::Halftone { misprint } => scalars.push(("mode.misprint", *misprint)),
            Effect::AsciiArt(ascii) => scalars.push(("mode.glyph_scale", ascii.glyph_scale)),
            _ => {}
        }

        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(PipelineError::InvalidParameters(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Clamp every knob into the range its control allows.
    pub fn clamped(&self) -> Self {
        let mut out = self.clone();

        out.adjust.brightness = out.adjust.brightness.clamp(-0.5, 0.5);
        out.adjust.contrast = out.adjust.contrast.clamp(0.0, 2.0);
        out.adjust.saturation = out.adjust.saturation.clamp(0.0, 2.0);
        out.adjust.hue_shift = out.adjust.hue_shift.clamp(0.0, 6.28);

        let max_columns = if out.kind() == EffectKind::AsciiArt {
            300.0
        } else {
            400.0
        };
        out.tone.columns = out.tone.columns.round().clamp(20.0, max_columns);
        out.tone.spread = out.tone.spread.clamp(0.0, 2.0);

        match &mut out.effect {
            Effect::OrderedDither { palette_steps, .. }
            | Effect::BlueNoiseDither { palette_steps }
            | Effect::ErrorDiffusion { palette_steps } => {
                *palette_steps = (*palette_steps).clamp(2, 32);
            }
            Effect::Crt(crt) => {
                crt.scale = crt.scale.clamp(1.0, 8.0);
                crt.scanline = crt.scanline.clamp(0.0, 1.0);
                crt.blur = crt.blur.clamp(0.0, 2.0);
                crt.glow_intensity = crt.glow_intensity.clamp(0.0, 2.0);
                crt.glow_spread = crt.glow_spread.clamp(0.0, 2.0);
                crt.warp = crt.warp.clamp(0.0, 1.0);
                crt.vignette = crt.vignette.clamp(0.0, 1.0);
            }
            Effect::Halftone { misprint } => *misprint = misprint.clamp(0.0, 2.0),
            Effect::AsciiArt(ascii) => ascii.glyph_scale = ascii.glyph_scale.clamp(0.5, 1.5),
        }

        out
    }
}

/// Character ramps offered as presets, darkest glyph first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsciiRamp {
    Classic,
    AnsiLight,
    AnsiColor,
    AnsiFilled,
    RetroGlyphs,
    Braille,
    Binary,
}

impl AsciiRamp {
    pub const ALL: [AsciiRamp; 7] = [
        Self::Classic,
        Self::AnsiLight,
        Self::AnsiColor,
        Self::AnsiFilled,
        Self::RetroGlyphs,
        Self::Braille,
        Self::Binary,
    ];

    pub fn chars(self) -> &'static str {
        match self {
            Self::Classic => DEFAULT_ASCII_CHARS,
            Self::AnsiLight => " .,:!+*e$@8",
            Self::AnsiColor => " .*es@",
            Self::AnsiFilled => " ░▒▓█",
            Self::RetroGlyphs => " `.-':_,^=;><+!rc*/z?sLTv)J7(|Fi{C}fI31tlu[neoZ5Yxjya]2ESwqkP6h9d4VpOGbUAKXHm8RD#$Bg0MNWQ%&@",
            Self::Braille => "⠀⠁⠂⠃⠄⠅⠆⠇⠈⠉⠊⠋⠌⠍⠎⠏⠐⠑⠒⠓⠔⠕⠖⠗⠘⠙⠚⠛⠜⠝⠞⠟⠠⠡⠢⠣⠤⠥⠦⠧⠨⠩⠪⠫⠬⠭⠮⠯⠰⠱⠲⠳⠴⠵⠶⠷⠸⠹⠺⠻⠼⠽⠾⠿",
            Self::Binary => " 01",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::AnsiLight => "ansi_light",
            Self::AnsiColor => "ansi_color",
            Self::AnsiFilled => "ansi_filled",
            Self::RetroGlyphs => "retro_glyphs",
            Self::Braille => "braille",
            Self::Binary => "binary",
        }
    }
}

impl FromStr for AsciiRamp {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|ramp| ramp.name() == normalized)
            .ok_or_else(|| {
                PipelineError::InvalidParameters(format!(
                    "unknown ASCII ramp '{raw}' (expected one of: {})",
                    Self::ALL.map(Self::name).join(", ")
                ))
            })
    }
}
