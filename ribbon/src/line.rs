// Copyright 2025 the Ribbon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The line: owner of the prepared geometry, its device resources and its style.

use glam::Mat4;
use peniko::Color;
use ribbon_encoding::{
    ColorTable, Dim, LineData, LineGeometry, POSITION_STRIDE, PointOverrides, Points, Prepared,
};

use crate::{
    Error,
    device::{
        BufferKind, BufferUpload, BufferUsage, Device, DrawCall, DrawState, ElementType,
        LineUniforms, VertexFormat, VertexView,
    },
    shader::{self, ATTRIBUTE_OFFSET, POSITION_OFFSETS},
};

const FLOAT_BYTES: u64 = size_of::<f32>() as u64;

/// Default line color: an orange.
pub const DEFAULT_COLOR: Color = Color::new([0.8, 0.5, 0.0, 1.0]);

/// Dimensions of the render target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Width, in pixels.
    pub width: f32,
    /// Height, in pixels.
    pub height: f32,
    /// Physical pixels per logical pixel.
    pub pixel_ratio: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            pixel_ratio: 1.0,
        }
    }
}

impl Viewport {
    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width / self.height
    }
}

/// Options for creating a [`Line`].
#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Projection matrix.
    pub projection: Mat4,
    /// Model matrix.
    pub model: Mat4,
    /// View matrix.
    pub view: Mat4,
    /// Initial points.
    pub points: Points,
    /// Palette index of every point, or of every polyline.
    pub color_indices: Vec<f32>,
    /// The palette.
    pub color: Vec<Color>,
    /// Opacity of every point, overriding the palette alpha.
    pub opacity: Option<f32>,
    /// Opacity of every point, or of every polyline.
    pub opacities: Vec<f32>,
    /// Line width, in pixels.
    pub width: f32,
    /// Width scale of every point, or of every polyline.
    pub widths: Vec<f32>,
    /// Whether joins are mitered rather than beveled.
    pub miter: bool,
    /// Whether points have two rather than three components.
    pub is_2d: bool,
    /// The z coordinate of 2D points.
    pub z_2d: f32,
    /// Dimensions of the render target.
    pub viewport: Viewport,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            points: Points::default(),
            color_indices: Vec::new(),
            color: vec![DEFAULT_COLOR],
            opacity: None,
            opacities: Vec::new(),
            width: 1.0,
            widths: Vec::new(),
            miter: true,
            is_2d: false,
            z_2d: 0.0,
            viewport: Viewport::default(),
        }
    }
}

/// A style change. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    /// The palette.
    pub color: Option<Vec<Color>>,
    /// Opacity of every point, overriding the palette alpha.
    pub opacity: Option<f32>,
    /// Whether joins are mitered.
    pub miter: Option<bool>,
    /// Line width in pixels. Non-finite values are ignored.
    pub width: Option<f32>,
}

/// Transform overrides for one draw. `None` fields keep the last used matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transforms {
    /// Projection matrix.
    pub projection: Option<Mat4>,
    /// Model matrix.
    pub model: Option<Mat4>,
    /// View matrix.
    pub view: Option<Mat4>,
}

/// One of the CPU-side duplicated streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Positions.
    Points,
    /// Palette indices.
    ColorIndices,
    /// Opacities.
    Opacities,
    /// Width scales.
    Widths,
}

/// Device buffers of a line.
#[derive(Debug)]
pub struct LineBuffers<B> {
    /// Duplicated positions.
    pub points: B,
    /// Duplicated palette indices.
    pub color_indices: B,
    /// Duplicated opacities.
    pub opacities: B,
    /// Duplicated width scales.
    pub widths: B,
    /// Triangle indices.
    pub indices: B,
}

impl<B> LineBuffers<B> {
    fn new<D: Device<Buffer = B>>(device: &mut D) -> Result<Self, Error> {
        Ok(Self {
            points: device.create_buffer(BufferKind::Vertex)?,
            color_indices: device.create_buffer(BufferKind::Vertex)?,
            opacities: device.create_buffer(BufferKind::Vertex)?,
            widths: device.create_buffer(BufferKind::Vertex)?,
            indices: device.create_buffer(BufferKind::Index)?,
        })
    }

    fn destroy<D: Device<Buffer = B>>(self, device: &mut D) {
        device.destroy_buffer(self.points);
        device.destroy_buffer(self.color_indices);
        device.destroy_buffer(self.opacities);
        device.destroy_buffer(self.widths);
        device.destroy_buffer(self.indices);
    }

    fn stream(&mut self, stream: Stream) -> &mut B {
        match stream {
            Stream::Points => &mut self.points,
            Stream::ColorIndices => &mut self.color_indices,
            Stream::Opacities => &mut self.opacities,
            Stream::Widths => &mut self.widths,
        }
    }
}

/// A batch of polylines drawn with a single draw call.
///
/// Every change to the points or the palette rebuilds the derived data from scratch and
/// re-uploads it in full. Device buffers are only reallocated by [`clear`](Self::clear).
#[derive(Debug)]
pub struct Line<D: Device> {
    device: D,
    geometry: LineGeometry,
    buffers: LineBuffers<D::Buffer>,
    palette: Vec<Color>,
    color_table: ColorTable,
    color_texture: D::Texture,
    projection: Mat4,
    model: Mat4,
    view: Mat4,
    width: f32,
    miter: bool,
    viewport: Viewport,
}

impl<D: Device> Line<D> {
    /// Allocates the device resources of a line and uploads its initial points.
    pub fn new(mut device: D, config: LineConfig) -> Result<Self, Error> {
        let LineConfig {
            projection,
            model,
            view,
            points,
            color_indices,
            color,
            opacity,
            opacities,
            width,
            widths,
            miter,
            is_2d,
            z_2d,
            viewport,
        } = config;

        let buffers = LineBuffers::new(&mut device)?;
        let color_table = ColorTable::new(&color);
        let color_texture = device.create_texture(color_table.pixels(), color_table.side())?;
        let mut geometry = LineGeometry::new(if is_2d { Dim::Two } else { Dim::Three }, z_2d);
        geometry.set_opacity(opacity);
        geometry.set_palette_len(color.len());
        let prepared = geometry.set_points(
            points,
            PointOverrides {
                color_indices: Some(color_indices),
                opacities: Some(opacities),
                widths: Some(widths),
                is_2d: None,
            },
        );

        let mut line = Self {
            device,
            geometry,
            buffers,
            palette: color,
            color_table,
            color_texture,
            projection,
            model,
            view,
            width,
            miter,
            viewport,
        };
        if prepared == Prepared::Ready {
            line.upload()?;
        }
        Ok(line)
    }

    /// Replaces the points, and optionally the per-point attributes.
    ///
    /// With fewer than two points the device buffers are torn down and recreated empty, and
    /// drawing does nothing until enough points are set again.
    pub fn set_points(&mut self, points: Points, overrides: PointOverrides) -> Result<(), Error> {
        match self.geometry.set_points(points, overrides) {
            Prepared::Ready => self.upload(),
            Prepared::Empty => self.clear(),
        }
    }

    /// The points last set.
    pub fn points(&self) -> &Points {
        self.geometry.points()
    }

    /// The CPU-side duplicated streams.
    pub fn data(&self) -> &LineData {
        self.geometry.data()
    }

    /// Mutable access to the CPU-side duplicated streams.
    ///
    /// Changes reach the device only through [`flush`](Self::flush).
    pub fn data_mut(&mut self) -> &mut LineData {
        self.geometry.data_mut()
    }

    /// Uploads one CPU-side stream again, e.g. after changing it through
    /// [`data_mut`](Self::data_mut).
    pub fn flush(&mut self, stream: Stream) -> Result<(), Error> {
        let data = self.geometry.data();
        let values = match stream {
            Stream::Points => &data.points,
            Stream::ColorIndices => &data.color_indices,
            Stream::Opacities => &data.opacities,
            Stream::Widths => &data.widths,
        };
        upload_floats(&mut self.device, self.buffers.stream(stream), values)
    }

    /// The device buffers, e.g. for partial uploads.
    pub fn buffers(&self) -> &LineBuffers<D::Buffer> {
        &self.buffers
    }

    /// The device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the device.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// The current style.
    pub fn style(&self) -> Style {
        Style {
            color: Some(self.palette.clone()),
            opacity: self.geometry.opacity(),
            miter: Some(self.miter),
            width: Some(self.width),
        }
    }

    /// Changes the style.
    ///
    /// A new palette rebuilds the color table. A new palette or opacity also rebuilds the
    /// point data, since color indices are clamped to the palette and the opacity stream
    /// falls back to the global opacity.
    pub fn set_style(&mut self, style: Style) -> Result<(), Error> {
        let Style {
            color,
            opacity,
            miter,
            width,
        } = style;

        let mut rebuild = false;
        if let Some(opacity) = opacity {
            self.geometry.set_opacity(Some(opacity));
            rebuild = true;
        }
        if let Some(color) = color {
            self.set_color(color)?;
            rebuild = true;
        }
        if let Some(miter) = miter {
            self.miter = miter;
        }
        if let Some(width) = width.filter(|w| w.is_finite()) {
            self.width = width;
        }

        if rebuild && self.geometry.is_drawable() && self.geometry.prepare() == Prepared::Ready {
            self.upload()?;
        }
        Ok(())
    }

    fn set_color(&mut self, color: Vec<Color>) -> Result<(), Error> {
        let color_table = ColorTable::new(&color);
        let color_texture = self
            .device
            .create_texture(color_table.pixels(), color_table.side())?;
        let old = core::mem::replace(&mut self.color_texture, color_texture);
        self.device.destroy_texture(old);
        self.geometry.set_palette_len(color.len());
        self.color_table = color_table;
        self.palette = color;
        Ok(())
    }

    /// The packed palette.
    pub fn color_table(&self) -> &ColorTable {
        &self.color_table
    }

    /// Sets the dimensions of the render target.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// The uniforms the next draw would use.
    pub fn uniforms(&self) -> LineUniforms {
        let use_opacity = if self.geometry.uses_point_opacity() {
            1.0
        } else {
            0.0
        };
        let projection_view_model = self.projection * (self.view * self.model);
        LineUniforms {
            projection_view_model: projection_view_model.to_cols_array_2d(),
            aspect_ratio: self.viewport.aspect_ratio(),
            width: self.width / self.viewport.height * self.viewport.pixel_ratio,
            color_tex_res: self.color_table.side(),
            use_opacity,
            use_color_opacity: 1.0 - use_opacity,
            miter: u32::from(self.miter),
            _padding: [0; 2],
        }
    }

    /// Draws the line, remembering any transform overrides for later draws.
    ///
    /// Returns whether a draw call was issued: nothing is drawn with fewer than two points.
    pub fn draw(&mut self, transforms: Transforms) -> Result<bool, Error> {
        let Transforms {
            projection,
            model,
            view,
        } = transforms;
        if let Some(projection) = projection {
            self.projection = projection;
        }
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(view) = view {
            self.view = view;
        }

        if !self.geometry.is_drawable() {
            return Ok(false);
        }

        let indices = self.geometry.indices();
        let points = &self.buffers.points;
        let position = |offset: usize| VertexView {
            buffer: points,
            offset: (offset * POSITION_STRIDE) as u64 * FLOAT_BYTES,
            format: VertexFormat::Float32x3,
        };
        let call = DrawCall {
            positions: POSITION_OFFSETS.map(position),
            opacity: attribute(&self.buffers.opacities),
            offset_scale: attribute(&self.buffers.widths),
            color_index: attribute(&self.buffers.color_indices),
            indices: &self.buffers.indices,
            index_format: indices.format(),
            index_count: u32::try_from(indices.len()).unwrap_or(u32::MAX),
            color_table: &self.color_texture,
            uniforms: self.uniforms(),
            state: DrawState {
                depth_test: self.geometry.dim() == Dim::Three,
            },
            shader: shader::LINE,
        };
        self.device.draw(&call)?;
        Ok(true)
    }

    /// Drops all points and reallocates empty device buffers.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.geometry.reset();
        let buffers = LineBuffers::new(&mut self.device)?;
        core::mem::replace(&mut self.buffers, buffers).destroy(&mut self.device);
        log::debug!("Cleared line buffers");
        Ok(())
    }

    /// Releases all device resources and hands back the device.
    pub fn destroy(self) -> D {
        let Self {
            mut device,
            buffers,
            color_texture,
            ..
        } = self;
        buffers.destroy(&mut device);
        device.destroy_texture(color_texture);
        device
    }

    fn upload(&mut self) -> Result<(), Error> {
        let data = self.geometry.data();
        let device = &mut self.device;
        let buffers = &mut self.buffers;
        upload_floats(device, &mut buffers.points, &data.points)?;
        upload_floats(device, &mut buffers.color_indices, &data.color_indices)?;
        upload_floats(device, &mut buffers.opacities, &data.opacities)?;
        upload_floats(device, &mut buffers.widths, &data.widths)?;

        let indices = self.geometry.indices();
        device.upload_buffer(
            &mut buffers.indices,
            BufferUpload {
                usage: BufferUsage::Static,
                element: indices.format().into(),
                data: indices.as_bytes(),
            },
        )
    }
}

fn attribute<B>(buffer: &B) -> VertexView<'_, B> {
    VertexView {
        buffer,
        offset: ATTRIBUTE_OFFSET as u64 * FLOAT_BYTES,
        format: VertexFormat::Float32,
    }
}

fn upload_floats<D: Device>(
    device: &mut D,
    buffer: &mut D::Buffer,
    values: &[f32],
) -> Result<(), Error> {
    device.upload_buffer(
        buffer,
        BufferUpload {
            usage: BufferUsage::Dynamic,
            element: ElementType::Float32,
            data: bytemuck::cast_slice(values),
        },
    )
}
