// Copyright 2025 the Ribbon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stride-aware operations over flat scalar buffers.
//!
//! Every buffer here is a sequence of fixed-size tuples ("elements") of `stride` scalars laid out
//! back to back. Callers are expected to pass buffers whose length is an exact multiple of the
//! stride; ragged input must be truncated beforehand.

use smallvec::SmallVec;

/// Emits every element twice: first unchanged, then with each component multiplied by
/// `dup_scale`.
///
/// With `dup_scale == -1.0` this produces the pair of opposing offsets the vertex stage uses to
/// push the two copies of a point to either side of the centerline.
pub fn duplicate(buffer: &[f32], stride: usize, dup_scale: f32) -> Vec<f32> {
    debug_assert!(
        stride > 0 && buffer.len() % stride == 0,
        "buffer length {} is not a multiple of stride {stride}",
        buffer.len()
    );
    let mut out = Vec::with_capacity(buffer.len() * 2);
    for element in buffer.chunks_exact(stride) {
        out.extend_from_slice(element);
        out.extend(element.iter().map(|value| value * dup_scale));
    }
    out
}

/// Inserts a copy of the element at `source_index` so that it becomes the element at
/// `target_index`, shifting the following elements back by one.
///
/// Inserting at `source_index` itself (or `source_index + 1`) duplicates the element in place.
pub fn copy_element<T: Copy>(
    buffer: &mut Vec<T>,
    source_index: usize,
    target_index: usize,
    stride: usize,
) {
    debug_assert!(
        stride > 0 && buffer.len() % stride == 0,
        "buffer length {} is not a multiple of stride {stride}",
        buffer.len()
    );
    let start = source_index * stride;
    let at = target_index * stride;
    // Copy the source element first, so that the insertion can't shift it.
    let element: SmallVec<[T; 4]> = buffer[start..start + stride].iter().copied().collect();
    buffer.splice(at..at, element);
}

/// Widens every element from `stride` to `new_stride` components, filling the new trailing
/// components with `fill`.
pub fn increase_stride<T: Copy>(buffer: &[T], stride: usize, new_stride: usize, fill: T) -> Vec<T> {
    debug_assert!(
        stride > 0 && buffer.len() % stride == 0,
        "buffer length {} is not a multiple of stride {stride}",
        buffer.len()
    );
    debug_assert!(new_stride >= stride, "stride can only be increased");
    let count = buffer.len() / stride;
    let mut out = Vec::with_capacity(count * new_stride);
    for element in buffer.chunks_exact(stride) {
        out.extend_from_slice(element);
        out.extend(core::iter::repeat_n(fill, new_stride - stride));
    }
    out
}

/// Rewrites component `element_index` of every element in place.
///
/// `map` receives the current value, its flat index into `buffer` and the index of the element
/// it belongs to.
pub fn map_element<T: Copy>(
    buffer: &mut [T],
    element_index: usize,
    stride: usize,
    mut map: impl FnMut(T, usize, usize) -> T,
) {
    debug_assert!(element_index < stride, "component out of range");
    for (i, element) in buffer.chunks_exact_mut(stride).enumerate() {
        element[element_index] = map(element[element_index], i * stride + element_index, i);
    }
}
