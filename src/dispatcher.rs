//! One compiled compute program plus everything needed to run it over an
//! image: bind group layout, placeholder atlas and the resident glyph atlas.

use std::num::NonZeroU64;
use std::sync::{Arc, Mutex, PoisonError};

use wgpu::util::DeviceExt;

use crate::error::{PipelineError, Result};
use crate::glyph_atlas::GlyphAtlas;
use crate::gpu::GpuContext;
use crate::image_bridge::{OutputTexture, SourceTexture, TEXTURE_FORMAT};
use crate::params::{EffectKind, ParameterBlock};
use crate::program::{
    ComputeProgram, WorkgroupSize, ATLAS_BINDING, INPUT_BINDING, OUTPUT_BINDING, PARAMS_BINDING,
};
use crate::uniforms::EffectUniforms;

const ATLAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// The atlas texture currently on the device and the cache entry it was
/// uploaded from. Identity, not content, decides whether to re-upload.
struct ResidentAtlas {
    source: Arc<GlyphAtlas>,
    texture: wgpu::Texture,
}

pub struct ComputeDispatcher {
    gpu: Arc<GpuContext>,
    program: ComputeProgram,
    workgroup: WorkgroupSize,
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
    placeholder_atlas: wgpu::Texture,
    resident_atlas: Mutex<Option<ResidentAtlas>>,
    // One dispatch at a time per dispatcher.
    submission: Mutex<()>,
}

impl ComputeDispatcher {
    /// Compile `program` for this device. Any validation failure here is
    /// [`PipelineError::Initialization`].
    pub fn new(gpu: Arc<GpuContext>, program: ComputeProgram) -> Result<Self> {
        let workgroup = WorkgroupSize::from_limits(&gpu.limits());
        let source = program.specialize(workgroup);
        let device = &gpu.device;

        let (layout, pipeline) = gpu
            .guarded_as(PipelineError::Initialization, "compute program", || {
                let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&program.label),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                });
                let layout = bind_group_layout(device);
                let pipeline_layout =
                    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some("retrograde-pipeline-layout"),
                        bind_group_layouts: &[&layout],
                        push_constant_ranges: &[],
                    });
                let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(&program.label),
                    layout: Some(&pipeline_layout),
                    module: &module,
                    entry_point: &program.entry_point,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                });
                (layout, pipeline)
            })?;

        let placeholder_atlas = gpu
            .guarded_as(PipelineError::Initialization, "placeholder atlas", || {
                let texture = atlas_texture(device, 1, 1, "retrograde-atlas-placeholder");
                upload_atlas(&gpu.queue, &texture, &[0], 1, 1);
                texture
            })?;

        tracing::debug!(
            program = %program.label,
            workgroup_x = workgroup.x,
            workgroup_y = workgroup.y,
            "compiled compute program"
        );

        Ok(Self {
            gpu,
            program,
            workgroup,
            layout,
            pipeline,
            placeholder_atlas,
            resident_atlas: Mutex::new(None),
            submission: Mutex::new(()),
        })
    }

    pub fn program(&self) -> &ComputeProgram {
        &self.program
    }

    pub fn workgroup(&self) -> WorkgroupSize {
        self.workgroup
    }

    /// Run the program once over `input` and block until the device is done.
    ///
    /// `atlas` is bound only in ASCII mode; other modes see the placeholder.
    /// On failure nothing shared is mutated and no output is returned.
    pub fn run(
        &self,
        input: &SourceTexture,
        params: &ParameterBlock,
        atlas: Option<&Arc<GlyphAtlas>>,
    ) -> Result<OutputTexture> {
        let _submission = self.submission.lock().unwrap_or_else(PoisonError::into_inner);

        let (width, height) = (input.width, input.height);
        let atlas = atlas.filter(|_| params.kind() == EffectKind::AsciiArt);
        let uniforms =
            EffectUniforms::from_params(params, (width, height), atlas.map(|atlas| &**atlas));

        let atlas_view = match atlas {
            Some(atlas) => self.resident_atlas_view(atlas)?,
            None => self
                .placeholder_atlas
                .create_view(&wgpu::TextureViewDescriptor::default()),
        };

        let device = &self.gpu.device;
        let (output, bind_group) = self.gpu.guarded("dispatch resources", || {
            let output = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("retrograde-output"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TEXTURE_FORMAT,
                usage: wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("retrograde-params"),
                contents: uniforms.as_bytes(),
                usage: wgpu::BufferUsages::UNIFORM,
            });

            let input_view = input.texture.create_view(&wgpu::TextureViewDescriptor::default());
            let output_view = output.create_view(&wgpu::TextureViewDescriptor::default());
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("retrograde-bind-group"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: INPUT_BINDING,
                        resource: wgpu::BindingResource::TextureView(&input_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: OUTPUT_BINDING,
                        resource: wgpu::BindingResource::TextureView(&output_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: ATLAS_BINDING,
                        resource: wgpu::BindingResource::TextureView(&atlas_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: PARAMS_BINDING,
                        resource: params_buffer.as_entire_binding(),
                    },
                ],
            });
            (output, bind_group)
        })?;

        let (groups_x, groups_y) = self.workgroup.grid_for(width, height);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("retrograde-dispatch-encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("retrograde-dispatch"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        let index = self
            .gpu
            .guarded("dispatch submission", || self.gpu.queue.submit(Some(encoder.finish())))?;
        device.poll(wgpu::Maintain::WaitForSubmissionIndex(index));

        tracing::debug!(
            mode = %params.kind(),
            width,
            height,
            groups_x,
            groups_y,
            "dispatch complete"
        );

        Ok(OutputTexture {
            texture: output,
            width,
            height,
        })
    }

    /// View of `atlas` on the device, uploading it first if the resident
    /// texture came from a different cache entry.
    fn resident_atlas_view(&self, atlas: &Arc<GlyphAtlas>) -> Result<wgpu::TextureView> {
        let mut resident = self
            .resident_atlas
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(current) = resident.as_ref() {
            if Arc::ptr_eq(&current.source, atlas) {
                return Ok(current
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default()));
            }
        }

        let (width, height) = (atlas.width(), atlas.height());
        let max = self.gpu.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(PipelineError::ResourceAllocation(format!(
                "glyph atlas is {width}x{height}, device supports at most {max} per side"
            )));
        }

        let texture = self.gpu.guarded("glyph atlas", || {
            let texture = atlas_texture(&self.gpu.device, width, height, "retrograde-atlas");
            upload_atlas(&self.gpu.queue, &texture, atlas.pixels(), width, height);
            texture
        })?;
        tracing::debug!(glyphs = atlas.glyph_count(), width, "uploaded glyph atlas");

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        *resident = Some(ResidentAtlas {
            source: Arc::clone(atlas),
            texture,
        });
        Ok(view)
    }
}

fn bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let sampled = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("retrograde-bind-group-layout"),
        entries: &[
            sampled(INPUT_BINDING),
            wgpu::BindGroupLayoutEntry {
                binding: OUTPUT_BINDING,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: TEXTURE_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            sampled(ATLAS_BINDING),
            wgpu::BindGroupLayoutEntry {
                binding: PARAMS_BINDING,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<EffectUniforms>() as u64),
                },
                count: None,
            },
        ],
    })
}

fn atlas_texture(device: &wgpu::Device, width: u32, height: u32, label: &str) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: ATLAS_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn upload_atlas(queue: &wgpu::Queue, texture: &wgpu::Texture, pixels: &[u8], width: u32, height: u32) {
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}
