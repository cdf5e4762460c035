//! GPU compute pipeline for retro image effects: ordered and blue-noise
//! dithering, error diffusion, halftone, CRT emulation and ASCII art.

pub mod color;
pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod export;
pub mod glyph_atlas;
pub mod gpu;
pub mod image_bridge;
pub mod palette;
pub mod params;
pub mod pipeline;
pub mod program;
pub mod uniforms;

pub use color::{to_linear, Color};
pub use delivery::{Delivered, GenerationCounter, LatestResult};
pub use dispatcher::ComputeDispatcher;
pub use error::{PipelineError, Result};
pub use glyph_atlas::{GlyphAtlas, GlyphAtlasCache, GlyphRasterizer, SystemFonts};
pub use gpu::GpuContext;
pub use image_bridge::{Bitmap, ImageBridge, OutputTexture, SourceTexture};
pub use params::{AsciiRamp, Effect, EffectKind, ParameterBlock};
pub use pipeline::{Completion, EffectSession, PendingRequest};
pub use program::ComputeProgram;
pub use uniforms::EffectUniforms;
