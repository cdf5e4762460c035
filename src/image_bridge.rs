//! Moving pixels between files, host memory and the GPU.
//!
//! Source textures are uploaded as `Rgba8Unorm`, not `Rgba8UnormSrgb`: the
//! sampler must hand the compute program raw byte values so the pipeline's
//! own colour handling stays authoritative.
//!
//! Delivered bitmaps are straight-alpha RGBA8, top row first.

use std::path::Path;
use std::sync::{mpsc, Arc};

use image::RgbaImage;

use crate::error::{PipelineError, Result};
use crate::gpu::{align_to, GpuContext};

pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Where row 0 of a device texture lives.
///
/// wgpu textures and `image` buffers are both top-left, so readback is the
/// identity. The flip path exists for device layers whose textures are
/// bottom-left; it keeps delivered bitmaps in the input's orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    TopLeft,
    BottomLeft,
}

impl Orientation {
    pub fn needs_flip(self) -> bool {
        self == Orientation::BottomLeft
    }
}

/// A decoded image resident on the device.
#[derive(Debug)]
pub struct SourceTexture {
    pub texture: wgpu::Texture,
    pub width: u32,
    pub height: u32,
}

/// The result of one dispatch, still on the device.
#[derive(Debug)]
pub struct OutputTexture {
    pub texture: wgpu::Texture,
    pub width: u32,
    pub height: u32,
}

/// Host-side RGBA8 pixels ready for display or export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    pub fn from_rgba_image(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            pixels: image.as_raw().clone(),
        }
    }

    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = ((y * self.width + x) * 4) as usize;
        let px = self.pixels.get(start..start + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// FNV-1a over dimensions and pixels. Stable across runs and platforms.
    pub fn fnv1a64(&self) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;

        let dims = [self.width.to_le_bytes(), self.height.to_le_bytes()];
        dims.iter()
            .flatten()
            .chain(self.pixels.iter())
            .fold(OFFSET, |hash, &byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
    }
}

/// Reverse the order of `height` rows of `row_bytes` each, in place.
pub fn flip_rows(pixels: &mut [u8], row_bytes: usize, height: usize) {
    for top in 0..height / 2 {
        let bottom = height - 1 - top;
        let (head, tail) = pixels.split_at_mut(bottom * row_bytes);
        head[top * row_bytes..(top + 1) * row_bytes].swap_with_slice(&mut tail[..row_bytes]);
    }
}

/// Decode `path` to 8-bit RGBA. Touches no GPU state.
pub fn decode(path: &Path) -> Result<RgbaImage> {
    let decoded = image::open(path).map_err(|error| PipelineError::decode(path, error))?;
    let rgba = decoded.to_rgba8();
    tracing::debug!(
        path = %path.display(),
        width = rgba.width(),
        height = rgba.height(),
        "decoded source image"
    );
    Ok(rgba)
}

pub struct ImageBridge {
    gpu: Arc<GpuContext>,
    orientation: Orientation,
}

impl ImageBridge {
    pub fn new(gpu: Arc<GpuContext>) -> Self {
        Self {
            gpu,
            orientation: Orientation::default(),
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Decode `path` and upload it. Missing or undecodable files are
    /// [`PipelineError::Decode`].
    pub fn load(&self, path: &Path) -> Result<SourceTexture> {
        self.load_rgba(&decode(path)?)
    }

    pub fn load_rgba(&self, image: &RgbaImage) -> Result<SourceTexture> {
        let (width, height) = image.dimensions();
        let max = self.gpu.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(PipelineError::ResourceAllocation(format!(
                "image is {width}x{height}, device supports 1..={max} per side"
            )));
        }

        let device = &self.gpu.device;
        let texture = self.gpu.guarded("source texture", || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("retrograde-source"),
                size: extent(width, height),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TEXTURE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        })?;

        self.gpu.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            extent(width, height),
        );

        Ok(SourceTexture {
            texture,
            width,
            height,
        })
    }

    /// Copy `output` back to host memory, dropping row padding and applying
    /// the orientation policy.
    pub fn readback(&self, output: &OutputTexture) -> Result<Bitmap> {
        let (width, height) = (output.width, output.height);
        let unpadded_bytes_per_row = width
            .checked_mul(4)
            .ok_or_else(|| PipelineError::Readback(format!("row size overflow at width {width}")))?;
        let padded_bytes_per_row =
            align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let device = &self.gpu.device;
        let buffer = self.gpu.guarded("readback buffer", || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("retrograde-readback"),
                size: u64::from(padded_bytes_per_row) * u64::from(height),
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            })
        })?;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("retrograde-readback-encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &output.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            extent(width, height),
        );
        self.gpu.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        receiver
            .recv()
            .map_err(|_| PipelineError::Readback("map callback never fired".into()))?
            .map_err(|error| PipelineError::Readback(error.to_string()))?;

        let row_bytes = unpadded_bytes_per_row as usize;
        let mut pixels = vec![0_u8; row_bytes * height as usize];
        {
            let mapped = slice.get_mapped_range();
            for (row, chunk) in mapped
                .chunks(padded_bytes_per_row as usize)
                .take(height as usize)
                .enumerate()
            {
                pixels[row * row_bytes..(row + 1) * row_bytes].copy_from_slice(&chunk[..row_bytes]);
            }
        }
        buffer.unmap();

        if self.orientation.needs_flip() {
            flip_rows(&mut pixels, row_bytes, height as usize);
        }

        Ok(Bitmap {
            width,
            height,
            pixels,
        })
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}
