// Copyright 2025 the Ribbon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The line program, and a CPU version of its vertex stage.

use glam::{Mat4, Vec2, Vec3, Vec4};
use ribbon_encoding::{ColorTable, LineData, POSITION_STRIDE};

use crate::device::{LineUniforms, Shader};

/// The WGSL line program.
pub const LINE: Shader = Shader {
    source: include_str!("../shaders/line.wgsl"),
    vertex_entry: "vs_main",
    fragment_entry: "fs_main",
};

/// Offset, in points, of the previous, current and next position views into the duplicated
/// position stream. Each point is duplicated, so the current point is two entries in.
pub const POSITION_OFFSETS: [usize; 3] = [0, 2, 4];

/// Offset, in entries, of the per-vertex attribute views. They follow the current point.
pub const ATTRIBUTE_OFFSET: usize = 2;

/// Inputs of the vertex stage for one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexInput {
    /// Previous point.
    pub prev: Vec3,
    /// Current point.
    pub curr: Vec3,
    /// Next point.
    pub next: Vec3,
    /// Opacity.
    pub opacity: f32,
    /// Signed width scale.
    pub offset_scale: f32,
    /// Palette index.
    pub color_index: f32,
}

impl VertexInput {
    /// Reads vertex `vertex` through the same views the draw call binds, or `None` past the
    /// end of any view.
    pub fn fetch(data: &LineData, vertex: usize) -> Option<Self> {
        let [prev, curr, next] =
            POSITION_OFFSETS.map(|offset| position(&data.points, vertex + offset));
        let attribute = |stream: &[f32]| stream.get(vertex + ATTRIBUTE_OFFSET).copied();
        Some(Self {
            prev: prev?,
            curr: curr?,
            next: next?,
            opacity: attribute(&data.opacities)?,
            offset_scale: attribute(&data.widths)?,
            color_index: attribute(&data.color_indices)?,
        })
    }
}

fn position(points: &[f32], vertex: usize) -> Option<Vec3> {
    let start = vertex * POSITION_STRIDE;
    points
        .get(start..start + POSITION_STRIDE)
        .map(Vec3::from_slice)
}

/// Outputs of the vertex stage for one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexOutput {
    /// Clip space position.
    pub position: Vec4,
    /// Premultiplication-free RGBA color.
    pub color: Vec4,
}

fn screen(projected: Vec4, aspect: Vec2) -> Vec2 {
    Vec2::new(projected.x, projected.y) / projected.w * aspect
}

/// Direction along the line at `curr` and the length of the offset from the centerline.
///
/// Endpoints are recognised by a neighbor coinciding with the point itself, which is what the
/// sentinel points produce.
pub fn join(prev: Vec2, curr: Vec2, next: Vec2, width: f32, miter: bool) -> (Vec2, f32) {
    if curr == prev {
        return ((next - curr).normalize_or_zero(), width);
    }
    if curr == next {
        return ((curr - prev).normalize_or_zero(), width);
    }
    let dir_a = (curr - prev).normalize_or_zero();
    if !miter {
        return (dir_a, width);
    }
    let dir_b = (next - curr).normalize_or_zero();
    let tangent = (dir_a + dir_b).normalize_or_zero();
    let perp = dir_a.perp();
    let miter_normal = tangent.perp();
    (tangent, width / miter_normal.dot(perp))
}

/// Runs the vertex stage on the CPU.
pub fn vertex(uniforms: &LineUniforms, table: &ColorTable, input: &VertexInput) -> VertexOutput {
    let pvm = Mat4::from_cols_array_2d(&uniforms.projection_view_model);
    let aspect = Vec2::new(uniforms.aspect_ratio, 1.0);
    let prev_projected = pvm * input.prev.extend(1.0);
    let curr_projected = pvm * input.curr.extend(1.0);
    let next_projected = pvm * input.next.extend(1.0);

    let (dir, len) = join(
        screen(prev_projected, aspect),
        screen(curr_projected, aspect),
        screen(next_projected, aspect),
        uniforms.width,
        uniforms.miter == 1,
    );
    let mut normal = dir.perp() * len;
    normal.x /= uniforms.aspect_ratio;
    let offset = normal * input.offset_scale;
    let position = curr_projected + Vec4::new(offset.x, offset.y, 0.0, 0.0);

    #[expect(
        clippy::cast_possible_truncation,
        reason = "color indices are clamped to the palette"
    )]
    let index = input.color_index.round().max(0.0) as u32;
    let [r, g, b, a] = table
        .texel(index)
        .unwrap_or_default()
        .map(|c| f32::from(c) / 255.0);
    let alpha = uniforms.use_color_opacity * a + uniforms.use_opacity * input.opacity;
    VertexOutput {
        position,
        color: Vec4::new(r, g, b, alpha),
    }
}
