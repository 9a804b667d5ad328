// Copyright 2025 the Ribbon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use thiserror::Error;

/// Errors that can occur in Ribbon.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// There is no device to allocate line resources on.
    #[error("No compatible device found")]
    DeviceUnavailable,
    /// Failed to create a device.
    #[cfg(feature = "wgpu")]
    #[error("Couldn't request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    /// A buffer upload exceeds what the device can allocate.
    #[error("Buffer of {size} bytes exceeds the device limit of {max} bytes")]
    BufferTooLarge {
        /// Requested size in bytes.
        size: u64,
        /// Largest size the device supports.
        max: u64,
    },
    /// The color table is wider than the largest texture the device supports.
    #[error("Color table of side {side} exceeds the device limit of {max} texels")]
    TextureTooLarge {
        /// Requested side in texels.
        side: u32,
        /// Largest side the device supports.
        max: u32,
    },
    /// A handle that was already destroyed, or never created by this device, was used.
    #[error("Unknown device resource")]
    UnknownResource,
    /// A draw was issued without a render target to draw into.
    #[error("No render target set")]
    NoRenderTarget,
}
