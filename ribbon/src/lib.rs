// Copyright 2025 the Ribbon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ribbon draws batches of polylines as mitered lines of constant pixel width, in one draw call.
//!
//! Points are prepared on the CPU by [`ribbon_encoding`], uploaded to device buffers, and expanded
//! to both sides of the centerline by the vertex stage of a WGSL program, so the width on screen
//! does not depend on the projection.
//!
//! The GPU backend is abstracted by the [`Device`] trait:
//!
//! - [`WgpuDevice`] draws with wgpu (requires the `wgpu` feature, enabled by default).
//! - [`Recording`] keeps a CPU copy of every resource and a log of commands instead.
//!
//! ```
//! use ribbon::{Line, LineConfig, Points, Recording, Transforms};
//!
//! let mut line = Line::new(
//!     Recording::new(),
//!     LineConfig {
//!         points: Points::Polyline(vec![0., 0., 0., 1., 0., 0., 1., 1., 0.]),
//!         ..Default::default()
//!     },
//! )?;
//! assert!(line.draw(Transforms::default())?);
//! # Ok::<(), ribbon::Error>(())
//! ```

mod device;
mod error;
mod line;
pub mod recording;
pub mod shader;
#[cfg(feature = "wgpu")]
mod wgpu_device;

pub use glam;
pub use peniko;
pub use ribbon_encoding;

pub use device::{
    BufferKind, BufferUpload, BufferUsage, Device, DrawCall, DrawState, ElementType, LineUniforms,
    Shader, VertexFormat, VertexView,
};
pub use error::Error;
pub use line::{
    DEFAULT_COLOR, Line, LineBuffers, LineConfig, Stream, Style, Transforms, Viewport,
};
pub use recording::Recording;
pub use ribbon_encoding::{ColorTable, Dim, IndexFormat, LineData, PointOverrides, Points};
#[cfg(feature = "wgpu")]
pub use wgpu_device::{RenderTarget, WgpuBuffer, WgpuDevice, WgpuTexture};
