//! Session orchestration: one loaded source, many parameter changes.
//!
//! Each [`EffectSession::request`] runs the GPU work on its own worker
//! thread: fetch the atlas (ASCII mode only), dispatch, read back, deliver.
//! Requests may finish in any order; [`LatestResult`] keeps the newest.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::delivery::{Delivered, GenerationCounter, LatestResult};
use crate::dispatcher::ComputeDispatcher;
use crate::error::{PipelineError, Result};
use crate::glyph_atlas::{GlyphAtlasCache, GlyphRasterizer, SystemFonts};
use crate::gpu::GpuContext;
use crate::image_bridge::{Bitmap, ImageBridge, SourceTexture};
use crate::params::ParameterBlock;
use crate::program::ComputeProgram;

/// What happened to one finished request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub generation: u64,
    /// False when a newer generation had already been delivered.
    pub delivered: bool,
}

/// A request in flight on its worker thread.
pub struct PendingRequest {
    pub generation: u64,
    handle: JoinHandle<Result<Completion>>,
}

impl PendingRequest {
    /// Block until the worker finishes.
    pub fn wait(self) -> Result<Completion> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

struct Shared<R> {
    dispatcher: ComputeDispatcher,
    bridge: ImageBridge,
    atlases: Arc<GlyphAtlasCache<R>>,
    latest: LatestResult,
}

pub struct EffectSession<R = SystemFonts> {
    shared: Arc<Shared<R>>,
    source: Mutex<Option<Arc<SourceTexture>>>,
    generations: GenerationCounter,
}

impl EffectSession<SystemFonts> {
    /// Session running the shipped effects program with host fonts.
    pub fn with_system_fonts(gpu: Arc<GpuContext>) -> Result<Self> {
        Self::new(
            gpu,
            ComputeProgram::effects(),
            Arc::new(GlyphAtlasCache::with_system_fonts()),
        )
    }
}

impl<R: GlyphRasterizer + 'static> EffectSession<R> {
    pub fn new(
        gpu: Arc<GpuContext>,
        program: ComputeProgram,
        atlases: Arc<GlyphAtlasCache<R>>,
    ) -> Result<Self> {
        let dispatcher = ComputeDispatcher::new(Arc::clone(&gpu), program)?;
        Ok(Self {
            shared: Arc::new(Shared {
                dispatcher,
                bridge: ImageBridge::new(gpu),
                atlases,
                latest: LatestResult::new(),
            }),
            source: Mutex::new(None),
            generations: GenerationCounter::new(),
        })
    }

    /// Replace the source image. On failure the previous source and the
    /// displayed result are left as they were.
    pub fn load_source(&self, path: &Path) -> Result<(u32, u32)> {
        let texture = self.shared.bridge.load(path)?;
        let dims = (texture.width, texture.height);
        *self.source.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(texture));
        tracing::info!(path = %path.display(), width = dims.0, height = dims.1, "loaded source");
        Ok(dims)
    }

    pub fn load_source_rgba(&self, image: &image::RgbaImage) -> Result<(u32, u32)> {
        let texture = self.shared.bridge.load_rgba(image)?;
        let dims = (texture.width, texture.height);
        *self.source.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(texture));
        Ok(dims)
    }

    /// Stamp a new generation and process `params` on a worker thread.
    pub fn request(&self, params: &ParameterBlock) -> Result<PendingRequest> {
        params.validate()?;
        let params = params.clamped();
        let source = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| PipelineError::InvalidParameters("no source image loaded".into()))?;

        let generation = self.generations.next();
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("retrograde-dispatch-{generation}"))
            .spawn(move || shared.process(generation, &source, &params))
            .map_err(|error| {
                PipelineError::ResourceAllocation(format!("failed to spawn worker: {error}"))
            })?;

        Ok(PendingRequest { generation, handle })
    }

    /// Request and wait, returning the resulting bitmap if it was delivered.
    pub fn render(&self, params: &ParameterBlock) -> Result<Option<Arc<Bitmap>>> {
        let completion = self.request(params)?.wait()?;
        Ok(self
            .latest()
            .filter(|shown| completion.delivered && shown.generation == completion.generation)
            .map(|shown| shown.bitmap))
    }

    /// The bitmap currently on display.
    pub fn latest(&self) -> Option<Delivered> {
        self.shared.latest.latest()
    }

    pub fn atlases(&self) -> &Arc<GlyphAtlasCache<R>> {
        &self.shared.atlases
    }
}

impl<R: GlyphRasterizer> Shared<R> {
    fn process(
        &self,
        generation: u64,
        source: &SourceTexture,
        params: &ParameterBlock,
    ) -> Result<Completion> {
        let atlas = match params.effect.ascii() {
            Some(ascii) => Some(self.atlases.get_or_build(&ascii.chars, &ascii.font)?),
            None => None,
        };

        let result = self
            .dispatcher
            .run(source, params, atlas.as_ref())
            .and_then(|output| self.bridge.readback(&output));
        let bitmap = match result {
            Ok(bitmap) => bitmap,
            Err(error) => {
                tracing::error!(generation, %error, "request failed");
                return Err(error);
            }
        };

        let delivered = self.latest.deliver(generation, bitmap);
        tracing::debug!(generation, delivered, mode = %params.kind(), "request finished");
        Ok(Completion {
            generation,
            delivered,
        })
    }
}
