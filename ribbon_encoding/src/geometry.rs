// Copyright 2025 the Ribbon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Preparation of the padded and duplicated vertex streams of a batch of polylines.

use smallvec::SmallVec;

use crate::buffer::{copy_element, duplicate, increase_stride};
use crate::mesh::Indices;

/// Number of position components in the padded and duplicated streams.
pub const POSITION_STRIDE: usize = 3;

/// The points of one draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum Points {
    /// A single polyline as a flat sequence of scalars.
    Polyline(Vec<f32>),
    /// Several polylines, each a flat sequence of scalars.
    PolylineBatch(Vec<Vec<f32>>),
}

impl Default for Points {
    fn default() -> Self {
        Self::Polyline(Vec::new())
    }
}

impl Points {
    /// Iterates the polylines as scalar slices.
    pub fn polylines(&self) -> impl Iterator<Item = &[f32]> + '_ {
        let (single, batch) = match self {
            Self::Polyline(points) => (Some(points.as_slice()), &[][..]),
            Self::PolylineBatch(lines) => (None, lines.as_slice()),
        };
        single.into_iter().chain(batch.iter().map(Vec::as_slice))
    }

    /// Number of polylines, counting empty ones.
    pub fn polyline_count(&self) -> usize {
        match self {
            Self::Polyline(_) => 1,
            Self::PolylineBatch(lines) => lines.len(),
        }
    }
}

impl From<Vec<f32>> for Points {
    fn from(points: Vec<f32>) -> Self {
        Self::Polyline(points)
    }
}

impl From<Vec<Vec<f32>>> for Points {
    fn from(lines: Vec<Vec<f32>>) -> Self {
        Self::PolylineBatch(lines)
    }
}

/// Number of scalar components per input point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dim {
    /// `x, y` points; a constant z coordinate is synthesized.
    Two,
    /// `x, y, z` points.
    #[default]
    Three,
}

impl Dim {
    /// Scalars per point.
    pub fn components(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

/// Per-point attribute arrays supplied alongside new points.
///
/// Each array may hold one value per point or one value per polyline. `None`, or an array of
/// any other length, keeps the previously supplied values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointOverrides {
    /// Palette index of every point.
    pub color_indices: Option<Vec<f32>>,
    /// Opacity of every point.
    pub opacities: Option<Vec<f32>>,
    /// Width scale of every point.
    pub widths: Option<Vec<f32>>,
    /// Switches between 2D and 3D input for this and later calls.
    pub is_2d: Option<bool>,
}

/// CPU-side duplicated streams, one entry per GPU vertex.
///
/// Positions hold three scalars per vertex, every other stream one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineData {
    /// Positions, each point twice.
    pub points: Vec<f32>,
    /// Palette indices.
    pub color_indices: Vec<f32>,
    /// Opacities.
    pub opacities: Vec<f32>,
    /// Width scales, positive for the first copy of a point and negative for the second.
    pub widths: Vec<f32>,
}

impl LineData {
    /// Number of GPU vertices.
    pub fn vertex_count(&self) -> usize {
        self.points.len() / POSITION_STRIDE
    }
}

/// Outcome of [`LineGeometry::set_points`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prepared {
    /// Fewer than two points; there is nothing to draw.
    Empty,
    /// The streams and indices were rebuilt.
    Ready,
}

/// Builds the vertex streams and mesh indices for a batch of polylines.
///
/// All derived arrays are rebuilt wholesale whenever points change.
#[derive(Debug, Clone)]
pub struct LineGeometry {
    points: Points,
    dim: Dim,
    z_2d: f32,
    opacity: Option<f32>,
    palette_len: usize,
    color_indices: Vec<f32>,
    opacities: Vec<f32>,
    widths: Vec<f32>,
    points_per_line: SmallVec<[u32; 4]>,
    num_points: usize,
    data: LineData,
    indices: Indices,
}

impl Default for LineGeometry {
    fn default() -> Self {
        Self::new(Dim::Three, 0.0)
    }
}

impl LineGeometry {
    /// Creates an empty geometry for points of dimension `dim`.
    ///
    /// `z_2d` is the z coordinate given to 2D points.
    pub fn new(dim: Dim, z_2d: f32) -> Self {
        Self {
            points: Points::default(),
            dim,
            z_2d,
            opacity: None,
            palette_len: 1,
            color_indices: Vec::new(),
            opacities: Vec::new(),
            widths: Vec::new(),
            points_per_line: SmallVec::new(),
            num_points: 0,
            data: LineData::default(),
            indices: Indices::default(),
        }
    }

    /// Replaces the points and reconciles the per-point attributes.
    pub fn set_points(&mut self, points: Points, overrides: PointOverrides) -> Prepared {
        if let Some(is_2d) = overrides.is_2d {
            self.dim = if is_2d { Dim::Two } else { Dim::Three };
        }
        let dim = self.dim.components();

        #[expect(
            clippy::cast_possible_truncation,
            reason = "u32 indices cannot address more points anyway"
        )]
        let points_per_line: SmallVec<[u32; 4]> = points
            .polylines()
            .map(|line| (line.len() / dim) as u32)
            .collect();
        self.points_per_line = points_per_line;
        self.num_points = self.points_per_line.iter().map(|n| *n as usize).sum();
        self.points = points;

        if let Some(color_indices) = overrides.color_indices {
            self.color_indices = self.per_point(&self.color_indices, color_indices);
        }
        if let Some(opacities) = overrides.opacities {
            self.opacities = self.per_point(&self.opacities, opacities);
        }
        if let Some(widths) = overrides.widths {
            self.widths = self.per_point(&self.widths, widths);
        }

        self.prepare()
    }

    /// Sets the global opacity used when no per-point opacities are given.
    pub fn set_opacity(&mut self, opacity: Option<f32>) {
        self.opacity = opacity;
    }

    /// The global opacity.
    pub fn opacity(&self) -> Option<f32> {
        self.opacity
    }

    /// Sets the palette length that color indices are clamped to.
    pub fn set_palette_len(&mut self, len: usize) {
        self.palette_len = len;
    }

    /// Rebuilds the derived streams from the current points and attributes.
    pub fn prepare(&mut self) -> Prepared {
        if self.num_points < 2 {
            self.reset();
            return Prepared::Empty;
        }

        let dim = self.dim.components();
        let num_points = self.num_points;

        // Copy all components belonging to complete points.
        let mut padded = Vec::with_capacity(num_points * dim);
        for (i, line) in self.points.polylines().enumerate() {
            let whole = line.len() - line.len() % dim;
            if whole != line.len() {
                log::warn!(
                    "The length of polyline {i} ({}) is not a multiple of the dimension ({dim}). \
                     Incomplete points are ignored.",
                    line.len()
                );
            }
            padded.extend_from_slice(&line[..whole]);
        }

        // Add the missing z coordinate.
        if self.dim == Dim::Two {
            padded = increase_stride(&padded, 2, POSITION_STRIDE, self.z_2d);
        }

        if self.color_indices.len() != num_points {
            self.color_indices = vec![0.0; num_points];
        }
        if self.widths.len() != num_points {
            self.widths = vec![1.0; num_points];
        }

        let max_color = self.palette_len.saturating_sub(1) as f32;
        let mut color_indices: Vec<f32> = self
            .color_indices
            .iter()
            .map(|i| {
                if i.is_nan() {
                    0.0
                } else {
                    i.clamp(0.0, max_color)
                }
            })
            .collect();
        let mut opacities = if self.opacities.len() == num_points {
            self.opacities.clone()
        } else {
            vec![self.opacity.unwrap_or(1.0); num_points]
        };
        let mut widths = self.widths.clone();

        let mut k = 0;
        for &n in &self.points_per_line {
            if n == 0 {
                continue;
            }
            let last = k + n as usize - 1;
            // Duplicate the first and last point of each polyline, e.g. [1, 2, 3] -> [1, 1, 2, 3, 3].
            // The last one is copied first so that the first copy doesn't shift it.
            copy_element(&mut padded, last, last, POSITION_STRIDE);
            copy_element(&mut padded, k, k, POSITION_STRIDE);
            for stream in [&mut color_indices, &mut opacities, &mut widths] {
                copy_element(stream, last, last, 1);
                copy_element(stream, k, k, 1);
            }
            k += n as usize + 2;
        }

        // Every point is duplicated for the positive and the negative offset.
        self.data = LineData {
            points: duplicate(&padded, POSITION_STRIDE, 1.0),
            color_indices: duplicate(&color_indices, 1, 1.0),
            opacities: duplicate(&opacities, 1, 1.0),
            widths: duplicate(&widths, 1, -1.0),
        };
        self.indices = Indices::for_polylines(&self.points_per_line);

        log::debug!(
            "Prepared {} vertices and {} indices for {} polylines",
            self.data.vertex_count(),
            self.indices.len(),
            self.points_per_line.len()
        );

        Prepared::Ready
    }

    /// Drops the points and all derived data, keeping the attribute arrays.
    pub fn reset(&mut self) {
        self.points = Points::default();
        self.points_per_line.clear();
        self.num_points = 0;
        self.data = LineData::default();
        self.indices = Indices::default();
    }

    /// Accepts `new` as-is when it has one value per point, broadcasts it when it has one value
    /// per polyline, and keeps `current` otherwise.
    fn per_point(&self, current: &[f32], new: Vec<f32>) -> Vec<f32> {
        if new.len() == self.num_points {
            return new;
        }
        if new.len() == self.points.polyline_count() {
            return self
                .points_per_line
                .iter()
                .zip(new)
                .flat_map(|(n, value)| core::iter::repeat_n(value, *n as usize))
                .collect();
        }
        current.to_vec()
    }

    /// The points last passed to [`set_points`](Self::set_points).
    pub fn points(&self) -> &Points {
        &self.points
    }

    /// The point dimension.
    pub fn dim(&self) -> Dim {
        self.dim
    }

    /// Total number of complete points.
    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Number of complete points in each polyline.
    pub fn points_per_line(&self) -> &[u32] {
        &self.points_per_line
    }

    /// Whether there are enough points to draw.
    pub fn is_drawable(&self) -> bool {
        self.num_points > 1
    }

    /// Whether per-point opacity replaces the palette alpha.
    pub fn uses_point_opacity(&self) -> bool {
        self.opacities.len() == self.num_points || self.opacity.is_some()
    }

    /// The duplicated streams.
    pub fn data(&self) -> &LineData {
        &self.data
    }

    /// Mutable access to the duplicated streams, e.g. to animate them in place.
    ///
    /// Changes are only seen by the GPU once the affected streams are uploaded again.
    pub fn data_mut(&mut self) -> &mut LineData {
        &mut self.data
    }

    /// The triangle indices.
    pub fn indices(&self) -> &Indices {
        &self.indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(points: &[f32]) -> Points {
        Points::Polyline(points.to_vec())
    }

    #[test]
    fn single_polyline_is_padded_and_duplicated() {
        let mut geometry = LineGeometry::default();
        let prepared = geometry.set_points(
            line(&[0., 0., 0., 1., 0., 0., 1., 1., 0.]),
            PointOverrides::default(),
        );
        assert_eq!(prepared, Prepared::Ready);

        let data = geometry.data();
        assert_eq!(data.vertex_count(), 2 * (3 + 2));
        // Start sentinel and first point, both duplicated.
        assert_eq!(&data.points[..12], &[0.; 12]);
        assert_eq!(&data.points[data.points.len() - 6..], &[1., 1., 0., 1., 1., 0.]);
        assert_eq!(&data.widths[..4], &[1., -1., 1., -1.]);
        assert_eq!(geometry.indices().len(), 2 * 6);
        assert_eq!(geometry.indices().max(), Some(2 * 3 - 1));
    }

    #[test]
    fn planar_points_get_a_z_coordinate() {
        let mut geometry = LineGeometry::new(Dim::Two, 0.5);
        geometry.set_points(line(&[0., 0., 2., 2.]), PointOverrides::default());
        let points = &geometry.data().points;
        assert_eq!(points.len(), 2 * 3 * (2 + 2));
        assert!(points.chunks_exact(3).all(|p| p[2] == 0.5));
    }

    #[test]
    fn incomplete_points_are_dropped() {
        let mut geometry = LineGeometry::default();
        geometry.set_points(line(&[0., 0., 0., 1., 1., 1., 7.]), PointOverrides::default());
        assert_eq!(geometry.num_points(), 2);
        assert_eq!(geometry.data().points.len(), 2 * 3 * 4);
    }

    #[test]
    fn per_line_attributes_are_broadcast() {
        let mut geometry = LineGeometry::default();
        geometry.set_palette_len(4);
        geometry.set_points(
            Points::PolylineBatch(vec![vec![0.; 6], vec![1.; 9]]),
            PointOverrides {
                color_indices: Some(vec![1., 3.]),
                ..Default::default()
            },
        );
        assert_eq!(
            geometry.data().color_indices,
            [vec![1.; 8], vec![3.; 10]].concat()
        );
    }

    #[test]
    fn mismatched_attributes_keep_the_previous_ones() {
        let mut geometry = LineGeometry::default();
        let points = line(&[0.; 9]);
        geometry.set_points(
            points.clone(),
            PointOverrides {
                widths: Some(vec![1., 2., 3.]),
                ..Default::default()
            },
        );
        geometry.set_points(
            points,
            PointOverrides {
                widths: Some(vec![5., 5.]),
                ..Default::default()
            },
        );
        assert_eq!(
            geometry.data().widths,
            [1., -1., 1., -1., 2., -2., 3., -3., 3., -3.]
        );
    }

    #[test]
    fn color_indices_are_clamped_to_the_palette() {
        let mut geometry = LineGeometry::default();
        geometry.set_palette_len(2);
        geometry.set_points(
            line(&[0.; 6]),
            PointOverrides {
                color_indices: Some(vec![-3., 9.]),
                ..Default::default()
            },
        );
        assert_eq!(geometry.data().color_indices, [0., 0., 0., 0., 1., 1., 1., 1.]);
    }

    #[test]
    fn nan_color_index_is_the_first_color() {
        let mut geometry = LineGeometry::default();
        geometry.set_palette_len(3);
        geometry.set_points(
            line(&[0.; 6]),
            PointOverrides {
                color_indices: Some(vec![f32::NAN, 2.]),
                ..Default::default()
            },
        );
        assert_eq!(geometry.data().color_indices, [0., 0., 0., 0., 2., 2., 2., 2.]);
    }

    #[test]
    fn opacity_falls_back_to_the_global_value_or_one() {
        let mut geometry = LineGeometry::default();
        geometry.set_points(line(&[0.; 6]), PointOverrides::default());
        assert!(geometry.data().opacities.iter().all(|o| *o == 1.0));
        assert!(!geometry.uses_point_opacity());

        geometry.set_opacity(Some(0.25));
        geometry.prepare();
        assert!(geometry.data().opacities.iter().all(|o| *o == 0.25));
        assert!(geometry.uses_point_opacity());
    }

    #[test]
    fn fewer_than_two_points_is_empty() {
        let mut geometry = LineGeometry::default();
        assert_eq!(
            geometry.set_points(line(&[1., 2., 3.]), PointOverrides::default()),
            Prepared::Empty
        );
        assert!(!geometry.is_drawable());
        assert!(geometry.data().points.is_empty());
        assert!(geometry.indices().is_empty());
    }
}
