//! Glyph atlas for ASCII-art mode, and the cache that memoizes it.
//!
//! An atlas is a single-channel strip: one `cell_size` square per
//! character, left to right, each glyph centered in its cell. The cache
//! keeps exactly one atlas keyed by `(chars, font)` and rebuilds it under
//! its lock when either changes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use fontdue::{Font, FontSettings};
use image::GrayImage;

use crate::error::{PipelineError, Result};
use crate::params::SYSTEM_FONT;

pub const ATLAS_CELL_SIZE: u32 = 32;
pub const GLYPH_PIXEL_SIZE: f32 = 26.0;

const MONOSPACE_CANDIDATES: [&str; 8] = [
    "Menlo",
    "SF Mono",
    "DejaVu Sans Mono",
    "Liberation Mono",
    "Noto Sans Mono",
    "Consolas",
    "Courier New",
    "Courier",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtlasKey {
    pub chars: String,
    pub font: String,
}

#[derive(Debug)]
pub struct GlyphAtlas {
    key: AtlasKey,
    cell_size: u32,
    glyph_count: u32,
    pixels: Vec<u8>,
}

impl GlyphAtlas {
    pub fn key(&self) -> &AtlasKey {
        &self.key
    }

    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    pub fn glyph_count(&self) -> u32 {
        self.glyph_count
    }

    pub fn width(&self) -> u32 {
        self.cell_size * self.glyph_count
    }

    pub fn height(&self) -> u32 {
        self.cell_size
    }

    /// Row-major coverage, `width() * height()` bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn coverage_at(&self, x: u32, y: u32) -> u8 {
        if x >= self.width() || y >= self.height() {
            return 0;
        }
        self.pixels[(y * self.width() + x) as usize]
    }

    pub fn to_luma_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            image::Luma([self.coverage_at(x, y)])
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RasterizedGlyph {
    pub width: usize,
    pub height: usize,
    pub coverage: Vec<u8>,
}

/// Source of glyph bitmaps. Implementations resolve `font` themselves and
/// fall back to a monospaced face when it is missing.
pub trait GlyphRasterizer: Send {
    fn rasterize(&mut self, font: &str, ch: char, px: f32) -> Result<RasterizedGlyph>;
}

/// Rasterizes with fontdue from fonts installed on the host.
pub struct SystemFonts {
    db: Database,
    faces: HashMap<String, Arc<Font>>,
}

impl SystemFonts {
    pub fn new() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.len(), "loaded system font database");
        Self {
            db,
            faces: HashMap::new(),
        }
    }

    fn face(&mut self, requested: &str) -> Result<Arc<Font>> {
        if let Some(face) = self.faces.get(requested) {
            return Ok(Arc::clone(face));
        }

        let resolved = if requested.eq_ignore_ascii_case(SYSTEM_FONT) {
            None
        } else {
            self.load_family(Family::Name(requested))
        };
        let face = match resolved {
            Some(face) => face,
            None => {
                if !requested.eq_ignore_ascii_case(SYSTEM_FONT) {
                    tracing::warn!(font = requested, "font not found, using monospaced fallback");
                }
                self.load_monospace_fallback()
                    .ok_or_else(|| PipelineError::FontUnavailable {
                        requested: requested.to_owned(),
                    })?
            }
        };

        let face = Arc::new(face);
        self.faces.insert(requested.to_owned(), Arc::clone(&face));
        Ok(face)
    }

    fn load_family(&self, family: Family<'_>) -> Option<Font> {
        let families = [family];
        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        self.load_id(id)
    }

    fn load_id(&self, id: fontdb::ID) -> Option<Font> {
        self.db
            .with_face_data(id, |data, index| {
                Font::from_bytes(
                    data.to_vec(),
                    FontSettings {
                        collection_index: index,
                        ..FontSettings::default()
                    },
                )
            })?
            .map_err(|error| tracing::debug!(error, "font face failed to parse"))
            .ok()
    }

    fn load_monospace_fallback(&self) -> Option<Font> {
        if let Some(face) = self.load_family(Family::Monospace) {
            return Some(face);
        }
        for name in MONOSPACE_CANDIDATES {
            if let Some(face) = self.load_family(Family::Name(name)) {
                return Some(face);
            }
        }
        // Anything flagged monospaced, then anything at all.
        let monospaced = self.db.faces().find(|face| face.monospaced).map(|face| face.id);
        let any = self.db.faces().next().map(|face| face.id);
        monospaced
            .into_iter()
            .chain(any)
            .find_map(|id| self.load_id(id))
    }
}

impl GlyphRasterizer for SystemFonts {
    fn rasterize(&mut self, font: &str, ch: char, px: f32) -> Result<RasterizedGlyph> {
        let face = self.face(font)?;
        let (metrics, coverage) = face.rasterize(ch, px);
        Ok(RasterizedGlyph {
            width: metrics.width,
            height: metrics.height,
            coverage,
        })
    }
}

/// `(source start, destination start, length)` for one axis of a glyph
/// centred in a cell. Oversize glyphs are cropped equally on both sides.
fn centred_span(size: usize, cell: usize) -> (usize, usize, usize) {
    if size <= cell {
        (0, (cell - size) / 2, size)
    } else {
        ((size - cell) / 2, 0, cell)
    }
}

/// Render `chars` into a fresh atlas. An empty string renders one space so
/// the atlas is never zero-width.
pub fn build_atlas(
    rasterizer: &mut dyn GlyphRasterizer,
    chars: &str,
    font: &str,
) -> Result<GlyphAtlas> {
    let glyphs: Vec<char> = if chars.is_empty() {
        vec![' ']
    } else {
        chars.chars().collect()
    };

    let cell = ATLAS_CELL_SIZE as usize;
    let glyph_count = glyphs.len();
    let atlas_width = cell * glyph_count;
    let mut pixels = vec![0_u8; atlas_width * cell];

    for (index, ch) in glyphs.into_iter().enumerate() {
        let glyph = rasterizer.rasterize(font, ch, GLYPH_PIXEL_SIZE)?;
        let (src_x, dst_x, span_x) = centred_span(glyph.width, cell);
        let (src_y, dst_y, span_y) = centred_span(glyph.height, cell);
        let base_x = index * cell;

        for row in 0..span_y {
            let src = (src_y + row) * glyph.width + src_x;
            let dst = (dst_y + row) * atlas_width + base_x + dst_x;
            let Some(coverage) = glyph.coverage.get(src..src + span_x) else {
                break;
            };
            pixels[dst..dst + span_x].copy_from_slice(coverage);
        }
    }

    tracing::debug!(glyph_count, font, "built glyph atlas");
    Ok(GlyphAtlas {
        key: AtlasKey {
            chars: chars.to_owned(),
            font: font.to_owned(),
        },
        cell_size: ATLAS_CELL_SIZE,
        glyph_count: glyph_count as u32,
        pixels,
    })
}

struct CacheState<R> {
    rasterizer: R,
    current: Option<Arc<GlyphAtlas>>,
}

/// Holds the one live atlas. Lookup and rebuild happen under a single lock,
/// so concurrent callers never see a half-built atlas and never build twice
/// for the same key.
pub struct GlyphAtlasCache<R = SystemFonts> {
    state: Mutex<CacheState<R>>,
}

impl GlyphAtlasCache<SystemFonts> {
    pub fn with_system_fonts() -> Self {
        Self::new(SystemFonts::new())
    }
}

impl<R: GlyphRasterizer> GlyphAtlasCache<R> {
    pub fn new(rasterizer: R) -> Self {
        Self {
            state: Mutex::new(CacheState {
                rasterizer,
                current: None,
            }),
        }
    }

    pub fn get_or_build(&self, chars: &str, font: &str) -> Result<Arc<GlyphAtlas>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(current) = &state.current {
            if current.key.chars == chars && current.key.font == font {
                return Ok(Arc::clone(current));
            }
        }

        let atlas = Arc::new(build_atlas(&mut state.rasterizer, chars, font)?);
        state.current = Some(Arc::clone(&atlas));
        Ok(atlas)
    }

    /// The cached atlas, if any, without building.
    pub fn current(&self) -> Option<Arc<GlyphAtlas>> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }
}
