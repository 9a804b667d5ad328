// Copyright 2025 the Ribbon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The capability a GPU backend provides to draw lines.

use core::fmt::Debug;

use bytemuck::{Pod, Zeroable};
use ribbon_encoding::IndexFormat;

use crate::Error;

/// Role of a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Per-vertex attribute data.
    Vertex,
    /// Triangle indices.
    Index,
}

/// How often the contents of a buffer are expected to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Uploaded once, drawn many times.
    Static,
    /// Re-uploaded frequently.
    Dynamic,
}

/// Scalar type of the elements of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// 32-bit floats.
    Float32,
    /// 16-bit unsigned integers.
    Uint16,
    /// 32-bit unsigned integers.
    Uint32,
}

impl From<IndexFormat> for ElementType {
    fn from(format: IndexFormat) -> Self {
        match format {
            IndexFormat::Uint16 => Self::Uint16,
            IndexFormat::Uint32 => Self::Uint32,
        }
    }
}

/// Data to upload into a device buffer, replacing its contents.
#[derive(Debug, Clone, Copy)]
pub struct BufferUpload<'a> {
    /// Usage hint.
    pub usage: BufferUsage,
    /// Element type of `data`.
    pub element: ElementType,
    /// The bytes to upload. Their length is the new byte length of the buffer.
    pub data: &'a [u8],
}

/// Format of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    /// One `f32`.
    Float32,
    /// Three `f32`s.
    Float32x3,
}

impl VertexFormat {
    /// Size of one attribute value in bytes.
    pub fn size(self) -> u64 {
        match self {
            Self::Float32 => 4,
            Self::Float32x3 => 12,
        }
    }
}

/// A vertex attribute read from a buffer, starting `offset` bytes in.
#[derive(Debug)]
pub struct VertexView<'a, B> {
    /// Buffer to read from.
    pub buffer: &'a B,
    /// Byte offset of the first value.
    pub offset: u64,
    /// Format of each value; values are tightly packed.
    pub format: VertexFormat,
}

impl<B> Clone for VertexView<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for VertexView<'_, B> {}

/// Uniform values of the line program.
///
/// The layout matches the `Uniforms` struct of the WGSL shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LineUniforms {
    /// `projection * view * model`, column major.
    pub projection_view_model: [[f32; 4]; 4],
    /// Viewport width divided by height.
    pub aspect_ratio: f32,
    /// Half the line width in normalized device units.
    pub width: f32,
    /// Side of the color table texture.
    pub color_tex_res: u32,
    /// `1.0` when per-point opacity replaces the palette alpha.
    pub use_opacity: f32,
    /// `1.0 - use_opacity`.
    pub use_color_opacity: f32,
    /// `1` for miter joins, `0` for bevel joins.
    pub miter: u32,
    /// Padding for 16-byte alignment
    pub _padding: [u32; 2],
}

/// Fixed-function state of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawState {
    /// Whether to depth test, which is the case for 3D lines.
    pub depth_test: bool,
}

/// A shader program, as a pair of entry points into one WGSL module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shader {
    /// WGSL source.
    pub source: &'static str,
    /// Name of the vertex entry point.
    pub vertex_entry: &'static str,
    /// Name of the fragment entry point.
    pub fragment_entry: &'static str,
}

/// Everything needed to issue the draw call of a line.
#[derive(Debug)]
pub struct DrawCall<'a, B, T> {
    /// Previous, current and next position of every vertex.
    pub positions: [VertexView<'a, B>; 3],
    /// Per-vertex opacity.
    pub opacity: VertexView<'a, B>,
    /// Per-vertex signed width scale.
    pub offset_scale: VertexView<'a, B>,
    /// Per-vertex palette index.
    pub color_index: VertexView<'a, B>,
    /// Index buffer.
    pub indices: &'a B,
    /// Element type of the index buffer.
    pub index_format: IndexFormat,
    /// Number of indices to draw.
    pub index_count: u32,
    /// Color table texture.
    pub color_table: &'a T,
    /// Uniform values.
    pub uniforms: LineUniforms,
    /// Fixed-function state.
    pub state: DrawState,
    /// Program to draw with.
    pub shader: Shader,
}

/// A GPU backend able to allocate the resources of a line and draw it.
///
/// Handles are owned by the line that created them and are never shared between lines.
pub trait Device {
    /// Handle of a device buffer.
    type Buffer: Debug;
    /// Handle of a device texture.
    type Texture: Debug;

    /// Allocates an empty buffer.
    fn create_buffer(&mut self, kind: BufferKind) -> Result<Self::Buffer, Error>;

    /// Replaces the contents of `buffer`, growing it as needed.
    fn upload_buffer(
        &mut self,
        buffer: &mut Self::Buffer,
        upload: BufferUpload<'_>,
    ) -> Result<(), Error>;

    /// Allocates a square RGBA8 texture of `side` texels and fills it with `pixels`.
    fn create_texture(&mut self, pixels: &[u8], side: u32) -> Result<Self::Texture, Error>;

    /// Releases a buffer.
    fn destroy_buffer(&mut self, buffer: Self::Buffer);

    /// Releases a texture.
    fn destroy_texture(&mut self, texture: Self::Texture);

    /// Issues one indexed draw.
    fn draw(&mut self, call: &DrawCall<'_, Self::Buffer, Self::Texture>) -> Result<(), Error>;
}
