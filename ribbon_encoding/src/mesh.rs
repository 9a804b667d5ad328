// Copyright 2025 the Ribbon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Triangle indices for the duplicated vertex stream.

/// Number of duplicated vertex slots a polyline of `points` points occupies once its two
/// sentinel points have been added.
#[inline]
pub const fn slots_per_polyline(points: u32) -> u32 {
    if points == 0 { 0 } else { 2 * (points + 2) }
}

/// Builds the triangle list for a batch of polylines with the given point counts.
///
/// Each polyline of `n` points spans `2 * (n + 2)` slots and contributes a quad (two triangles)
/// for each of its `n - 1` segments. Vertex `v` of a quad is drawn with the positions at slots
/// `v`, `v + 2` and `v + 4`, so the last quad ends exactly at the end sentinel and no vertex
/// reads a slot of another polyline. The largest index of a polyline is `base + 2 * n - 1`.
/// Polylines with fewer than two points contribute no quads.
pub fn build_indices(points_per_line: &[u32]) -> Vec<u32> {
    let segments: u32 = points_per_line.iter().map(|n| n.saturating_sub(1)).sum();
    let mut indices = Vec::with_capacity(segments as usize * 6);
    let mut base = 0;
    for &n in points_per_line {
        if n == 0 {
            continue;
        }
        for i in 0..n - 1 {
            // `2` because every padded point was duplicated.
            let a = base + i * 2;
            let b = a + 1;
            let c = a + 2;
            let d = a + 3;
            indices.extend_from_slice(&[a, b, c, c, b, d]);
        }
        base += slots_per_polyline(n);
    }
    indices
}

/// Element type of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    /// 16-bit unsigned indices.
    Uint16,
    /// 32-bit unsigned indices.
    Uint32,
}

impl IndexFormat {
    /// The narrowest format able to represent `max_index`.
    pub fn for_max_index(max_index: u32) -> Self {
        if max_index <= u32::from(u16::MAX) {
            Self::Uint16
        } else {
            Self::Uint32
        }
    }

    /// Size of one index in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

/// A triangle index list stored in the narrowest sufficient element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indices {
    /// Indices that all fit in 16 bits.
    U16(Vec<u16>),
    /// Indices that need 32 bits.
    U32(Vec<u32>),
}

impl Default for Indices {
    fn default() -> Self {
        Self::U16(Vec::new())
    }
}

impl Indices {
    /// Builds the index list for `points_per_line` and narrows it when possible.
    pub fn for_polylines(points_per_line: &[u32]) -> Self {
        Self::from_u32(build_indices(points_per_line))
    }

    /// Narrows `indices` to 16 bits when the maximum index allows it.
    pub fn from_u32(indices: Vec<u32>) -> Self {
        let max = indices.iter().copied().max().unwrap_or(0);
        match IndexFormat::for_max_index(max) {
            IndexFormat::Uint16 => Self::U16(
                indices
                    .into_iter()
                    .map(|i| u16::try_from(i).unwrap_or(u16::MAX))
                    .collect(),
            ),
            IndexFormat::Uint32 => Self::U32(indices),
        }
    }

    /// The element type of this list.
    pub fn format(&self) -> IndexFormat {
        match self {
            Self::U16(_) => IndexFormat::Uint16,
            Self::U32(_) => IndexFormat::Uint32,
        }
    }

    /// Number of indices.
    pub fn len(&self) -> usize {
        match self {
            Self::U16(indices) => indices.len(),
            Self::U32(indices) => indices.len(),
        }
    }

    /// Whether the list holds no indices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The largest index, if any.
    pub fn max(&self) -> Option<u32> {
        match self {
            Self::U16(indices) => indices.iter().copied().max().map(u32::from),
            Self::U32(indices) => indices.iter().copied().max(),
        }
    }

    /// Iterates the indices widened to `u32`.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        let (narrow, wide) = match self {
            Self::U16(indices) => (indices.as_slice(), &[][..]),
            Self::U32(indices) => (&[][..], indices.as_slice()),
        };
        narrow
            .iter()
            .map(|i| u32::from(*i))
            .chain(wide.iter().copied())
    }

    /// Raw bytes of the list, ready for upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U16(indices) => bytemuck::cast_slice(indices),
            Self::U32(indices) => bytemuck::cast_slice(indices),
        }
    }
}
