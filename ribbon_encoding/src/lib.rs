// Copyright 2025 the Ribbon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU-side data preparation for Ribbon's line renderer.
//!
//! Ribbon draws polylines as triangle ribbons of constant pixel width. Each input point becomes
//! two GPU vertices, one on either side of the centerline, and the vertex stage pushes them apart
//! using the previous and next points of the line. This crate builds everything that stage
//! consumes:
//!
//! - [`buffer`]: stride-aware transforms over flat scalar buffers.
//! - [`mesh`]: the triangle index list for one or many polylines.
//! - [`LineGeometry`]: padding with sentinel points, attribute reconciliation and duplication.
//! - [`ColorTable`]: a palette packed into a square lookup texture.
//!
//! It has no dependency on any GPU API.

pub mod buffer;
mod color_table;
mod geometry;
pub mod mesh;

pub use peniko;

pub use color_table::{ColorTable, opaque, side_for};
pub use geometry::{
    Dim, LineData, LineGeometry, POSITION_STRIDE, PointOverrides, Points, Prepared,
};
pub use mesh::{IndexFormat, Indices};
