// Copyright 2025 the Ribbon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A [`Device`] backed by wgpu.
//!
//! Lines are drawn into the target set with [`WgpuDevice::set_target`], loading its current
//! contents. 3D lines are depth tested when the target has a `Depth32Float` depth view.

use ribbon_encoding::IndexFormat;
use wgpu::{
    BindGroupLayout, BlendState, ColorTargetState, ColorWrites, PipelineCompilationOptions,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, TextureView,
};

use crate::{
    Error,
    device::{
        BufferKind, BufferUpload, BufferUsage, Device, DrawCall, LineUniforms, Shader,
        VertexFormat, VertexView,
    },
};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

static VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 6] = [
    attribute(wgpu::VertexFormat::Float32x3, 0),
    attribute(wgpu::VertexFormat::Float32x3, 1),
    attribute(wgpu::VertexFormat::Float32x3, 2),
    attribute(wgpu::VertexFormat::Float32, 3),
    attribute(wgpu::VertexFormat::Float32, 4),
    attribute(wgpu::VertexFormat::Float32, 5),
];

const fn attribute(format: wgpu::VertexFormat, shader_location: u32) -> wgpu::VertexAttribute {
    wgpu::VertexAttribute {
        format,
        offset: 0,
        shader_location,
    }
}

fn vertex_layouts() -> [wgpu::VertexBufferLayout<'static>; 6] {
    core::array::from_fn(|i| {
        let attribute = &VERTEX_ATTRIBUTES[i];
        wgpu::VertexBufferLayout {
            array_stride: attribute.format.size(),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: core::slice::from_ref(attribute),
        }
    })
}

/// A buffer on a [`WgpuDevice`].
///
/// The underlying wgpu buffer is allocated on first upload and reallocated when an upload
/// outgrows it.
#[derive(Debug)]
pub struct WgpuBuffer {
    kind: BufferKind,
    buffer: Option<wgpu::Buffer>,
    len: u64,
}

impl WgpuBuffer {
    /// The underlying buffer, if anything was uploaded yet.
    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    /// Byte length of the last upload.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the last upload was empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slice(&self, view: &VertexView<'_, Self>) -> Result<wgpu::BufferSlice<'_>, Error> {
        let buffer = self.buffer.as_ref().ok_or(Error::UnknownResource)?;
        Ok(buffer.slice(view.offset.min(buffer.size())..))
    }
}

/// A color table texture on a [`WgpuDevice`].
#[derive(Debug)]
pub struct WgpuTexture {
    texture: wgpu::Texture,
    view: TextureView,
}

/// Where draws go.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    /// Color attachment.
    pub view: TextureView,
    /// `Depth32Float` depth attachment, used by 3D lines.
    pub depth: Option<TextureView>,
}

/// The pipelines of one shader.
#[derive(Debug)]
struct Programs {
    shader: Shader,
    bind_group_layout: BindGroupLayout,
    pipeline: RenderPipeline,
    depth_pipeline: RenderPipeline,
}

impl Programs {
    fn new(device: &wgpu::Device, format: wgpu::TextureFormat, shader: Shader) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Line Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Line Shader"),
            source: wgpu::ShaderSource::Wgsl(shader.source.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Line Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let buffers = vertex_layouts();
        let pipeline = |label, depth_stencil| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some(shader.vertex_entry),
                    buffers: &buffers,
                    compilation_options: PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some(shader.fragment_entry),
                    targets: &[Some(ColorTargetState {
                        format,
                        blend: Some(BlendState::ALPHA_BLENDING),
                        write_mask: ColorWrites::ALL,
                    })],
                    compilation_options: PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let pipeline_2d = pipeline("Line Pipeline", None);
        let depth_pipeline = pipeline(
            "Line Depth Pipeline",
            Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
        );

        Self {
            shader,
            bind_group_layout,
            pipeline: pipeline_2d,
            depth_pipeline,
        }
    }
}

/// A wgpu device and queue, drawing into a [`RenderTarget`].
#[derive(Debug)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    programs: Option<Programs>,
    uniforms: wgpu::Buffer,
    target: Option<RenderTarget>,
}

impl WgpuDevice {
    /// Wraps an existing device and queue drawing into targets of `format`.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Line Uniforms Buffer"),
            size: size_of::<LineUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            device,
            queue,
            format,
            programs: None,
            uniforms,
            target: None,
        }
    }

    /// Requests a device from the default adapter.
    pub async fn request(format: wgpu::TextureFormat) -> Result<Self, Error> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .map_err(|_| Error::DeviceUnavailable)?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Ribbon Device"),
                ..Default::default()
            })
            .await?;
        Ok(Self::new(device, queue, format))
    }

    /// Sets where later draws go.
    pub fn set_target(&mut self, target: RenderTarget) {
        self.target = Some(target);
    }

    /// The wgpu device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The wgpu queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn programs(&mut self, shader: Shader) -> &Programs {
        if self.programs.as_ref().is_none_or(|p| p.shader != shader) {
            log::debug!("Creating line pipelines");
            self.programs = None;
        }
        self.programs
            .get_or_insert_with(|| Programs::new(&self.device, self.format, shader))
    }
}

impl Device for WgpuDevice {
    type Buffer = WgpuBuffer;
    type Texture = WgpuTexture;

    fn create_buffer(&mut self, kind: BufferKind) -> Result<WgpuBuffer, Error> {
        Ok(WgpuBuffer {
            kind,
            buffer: None,
            len: 0,
        })
    }

    fn upload_buffer(
        &mut self,
        buffer: &mut WgpuBuffer,
        upload: BufferUpload<'_>,
    ) -> Result<(), Error> {
        let len = upload.data.len() as u64;
        // Copies must be a multiple of four bytes, which odd u16 index counts are not.
        let padded = len.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let max = self.device.limits().max_buffer_size;
        if padded > max {
            return Err(Error::BufferTooLarge { size: padded, max });
        }

        let size = padded.max(wgpu::COPY_BUFFER_ALIGNMENT);
        // Dynamic buffers only grow. Static ones are sized to their contents.
        let reallocate = buffer.buffer.as_ref().is_none_or(|b| match upload.usage {
            BufferUsage::Static => b.size() != size,
            BufferUsage::Dynamic => b.size() < size,
        });
        if reallocate {
            let usage = match buffer.kind {
                BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
                BufferKind::Index => wgpu::BufferUsages::INDEX,
            };
            if let Some(old) = buffer.buffer.take() {
                old.destroy();
            }
            buffer.buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Line Buffer"),
                size,
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        buffer.len = len;

        let Some(target) = buffer.buffer.as_ref() else {
            return Err(Error::UnknownResource);
        };
        if padded == len {
            self.queue.write_buffer(target, 0, upload.data);
        } else {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "at most three bytes larger than the data"
            )]
            let padded = padded as usize;
            let mut data = upload.data.to_vec();
            data.resize(padded, 0);
            self.queue.write_buffer(target, 0, &data);
        }
        Ok(())
    }

    fn create_texture(&mut self, pixels: &[u8], side: u32) -> Result<WgpuTexture, Error> {
        let max = self.device.limits().max_texture_dimension_2d;
        if side > max {
            return Err(Error::TextureTooLarge { side, max });
        }
        let size = wgpu::Extent3d {
            width: side,
            height: side,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Line Color Table"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                // 4 bytes per RGBA8 texel
                bytes_per_row: Some(side * 4),
                rows_per_image: Some(side),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(WgpuTexture { texture, view })
    }

    fn destroy_buffer(&mut self, buffer: WgpuBuffer) {
        if let Some(buffer) = buffer.buffer {
            buffer.destroy();
        }
    }

    fn destroy_texture(&mut self, texture: WgpuTexture) {
        texture.texture.destroy();
    }

    fn draw(&mut self, call: &DrawCall<'_, WgpuBuffer, WgpuTexture>) -> Result<(), Error> {
        let target = self.target.clone().ok_or(Error::NoRenderTarget)?;
        self.queue
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&call.uniforms));

        let uniforms = self.uniforms.clone();
        let device = self.device.clone();
        let programs = self.programs(call.shader);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Line Bind Group"),
            layout: &programs.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&call.color_table.view),
                },
            ],
        });

        let depth = target.depth.as_ref().filter(|_| call.state.depth_test);
        let pipeline = if depth.is_some() {
            &programs.depth_pipeline
        } else {
            &programs.pipeline
        };
        let [prev, curr, next] = call.positions;
        let views = [
            prev,
            curr,
            next,
            call.opacity,
            call.offset_scale,
            call.color_index,
        ];
        let indices = call
            .indices
            .buffer
            .as_ref()
            .ok_or(Error::UnknownResource)?;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Line Encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Line Pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &target.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth.map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            for (slot, view) in (0_u32..).zip(views) {
                debug_assert_eq!(
                    VERTEX_ATTRIBUTES[slot as usize].format,
                    wgpu::VertexFormat::from(view.format),
                    "vertex view {slot} doesn't match the pipeline layout"
                );
                render_pass.set_vertex_buffer(slot, view.buffer.slice(&view)?);
            }
            render_pass.set_index_buffer(indices.slice(..), index_format(call.index_format));
            render_pass.draw_indexed(0..call.index_count, 0, 0..1);
        }
        self.queue.submit([encoder.finish()]);
        Ok(())
    }
}

fn index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
        IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
    }
}

impl From<VertexFormat> for wgpu::VertexFormat {
    fn from(format: VertexFormat) -> Self {
        match format {
            VertexFormat::Float32 => Self::Float32,
            VertexFormat::Float32x3 => Self::Float32x3,
        }
    }
}
