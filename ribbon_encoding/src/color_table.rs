// Copyright 2025 the Ribbon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Packing of a color palette into a square lookup texture.

use peniko::Color;

/// A fully opaque palette color from its red, green and blue components.
pub const fn opaque([r, g, b]: [f32; 3]) -> Color {
    Color::new([r, g, b, 1.0])
}

/// Smallest square side (at least 2) whose area can hold `len` palette entries.
pub fn side_for(len: usize) -> u32 {
    let mut side: u32 = 2;
    while (side as usize) * (side as usize) < len {
        side += 1;
    }
    side
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "the value is clamped to the u8 range"
)]
fn to_u8(component: f32) -> u8 {
    // `as` saturates and maps NaN to zero.
    (component * 255.0).round().clamp(0.0, 255.0) as u8
}

/// A palette packed row-major into a square RGBA8 texture.
///
/// Cells past the end of the palette are zero. They are never sampled, since color indices are
/// clamped to the palette length when the line geometry is prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    side: u32,
    len: usize,
    pixels: Vec<u8>,
}

impl ColorTable {
    /// Packs `palette`.
    ///
    /// A NaN alpha component is treated as an absent alpha and packed as fully opaque.
    pub fn new(palette: &[Color]) -> Self {
        if palette.is_empty() {
            log::warn!("Empty color palette; lines will be drawn transparent.");
        }
        let side = side_for(palette.len());
        let mut pixels = vec![0; (side * side * 4) as usize];
        for (texel, color) in pixels.chunks_exact_mut(4).zip(palette) {
            let [r, g, b, a] = color.components;
            texel[0] = to_u8(r);
            texel[1] = to_u8(g);
            texel[2] = to_u8(b);
            texel[3] = if a.is_nan() { 255 } else { to_u8(a) };
        }
        Self {
            side,
            len: palette.len(),
            pixels,
        }
    }

    /// Width and height of the texture, in texels.
    pub fn side(&self) -> u32 {
        self.side
    }

    /// Number of palette entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the palette is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Row-major RGBA8 texel data, `side * side * 4` bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Row and column of the cell holding palette entry `index`.
    pub fn cell(&self, index: u32) -> (u32, u32) {
        (index / self.side, index % self.side)
    }

    /// The packed color of palette entry `index`, or `None` past the end of the palette.
    pub fn texel(&self, index: u32) -> Option<[u8; 4]> {
        if index as usize >= self.len {
            return None;
        }
        let (row, col) = self.cell(index);
        let start = ((row * self.side + col) * 4) as usize;
        self.pixels[start..start + 4].try_into().ok()
    }
}
