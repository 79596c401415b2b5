//! Float pixel buffers with owned extents and stride-based addressing.
//!
//! A `MemoryBuffer` is written exactly once by the operation that owns it and
//! is read-only for every downstream consumer. The engine freezes buffers
//! into `Arc`s before consumers see them, which is what makes lock-free
//! concurrent reads safe.

use crate::rect::BufferArea;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pixel element layout of a buffer or socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelType {
    /// Single-channel float (mattes, factors, sizes).
    Value,
    /// RGBA float.
    #[default]
    Color,
}

impl PixelType {
    /// Channels per pixel element.
    #[inline]
    pub const fn channels(self) -> usize {
        match self {
            Self::Value => 1,
            Self::Color => 4,
        }
    }
}

const ZERO_ELEM: [f32; 4] = [0.0; 4];

/// A 2D array of float pixels owning a rectangular extent.
///
/// Addresses are absolute canvas coordinates; the buffer maps them onto its
/// flat storage through its own `area`. A buffer may also be a single
/// element (`single_elem`), in which case every read yields the same pixel;
/// this is the representation used for constant inputs.
#[derive(Debug, Clone)]
pub struct MemoryBuffer {
    pixel_type: PixelType,
    area: BufferArea,
    data: Vec<f32>,
    single_elem: bool,
}

impl MemoryBuffer {
    /// Allocate a zero-filled buffer covering `area`.
    pub fn new(pixel_type: PixelType, area: BufferArea) -> Self {
        let len = area.num_pixels() * pixel_type.channels();
        Self {
            pixel_type,
            area,
            data: vec![0.0; len],
            single_elem: false,
        }
    }

    /// Wrap an existing flat array. `data` must hold exactly
    /// `width * height * channels` floats in row-major order.
    pub fn from_vec(pixel_type: PixelType, area: BufferArea, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), area.num_pixels() * pixel_type.channels());
        Self {
            pixel_type,
            area,
            data,
            single_elem: false,
        }
    }

    /// A constant buffer: every read inside `area` returns `elem`.
    pub fn single_elem(pixel_type: PixelType, area: BufferArea, elem: &[f32]) -> Self {
        let ch = pixel_type.channels();
        debug_assert_eq!(elem.len(), ch);
        Self {
            pixel_type,
            area,
            data: elem.to_vec(),
            single_elem: true,
        }
    }

    /// The rectangular extent this buffer owns.
    #[inline]
    pub fn area(&self) -> BufferArea {
        self.area
    }

    #[inline]
    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    /// Channels per element.
    #[inline]
    pub fn channels(&self) -> usize {
        self.pixel_type.channels()
    }

    /// Floats per element (alias kept next to `row_stride` for kernels that
    /// walk raw offsets).
    #[inline]
    pub fn elem_stride(&self) -> usize {
        self.pixel_type.channels()
    }

    /// Floats per row.
    #[inline]
    pub fn row_stride(&self) -> usize {
        self.pixel_type.channels() * self.width() as usize
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.area.width()
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.area.height()
    }

    /// Whether this buffer stores one constant element.
    #[inline]
    pub fn is_single_elem(&self) -> bool {
        self.single_elem
    }

    /// Raw storage access.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    fn offset(&self, x: i32, y: i32) -> usize {
        if self.single_elem {
            return 0;
        }
        let rel_x = (x - self.area.x_min) as usize;
        let rel_y = (y - self.area.y_min) as usize;
        (rel_y * self.area.width() as usize + rel_x) * self.channels()
    }

    /// Element at absolute canvas coordinates. Must be inside the owned
    /// area; single-element buffers are constants and read the same
    /// everywhere.
    #[inline]
    pub fn elem(&self, x: i32, y: i32) -> &[f32] {
        debug_assert!(
            self.single_elem || self.area.contains(x, y),
            "read outside owned area"
        );
        let o = self.offset(x, y);
        &self.data[o..o + self.channels()]
    }

    /// Element read that yields the zero element outside the owned area.
    #[inline]
    pub fn elem_checked(&self, x: i32, y: i32) -> &[f32] {
        if self.single_elem || self.area.contains(x, y) {
            self.elem(x, y)
        } else {
            &ZERO_ELEM[..self.channels()]
        }
    }

    /// Scalar channel read.
    #[inline]
    pub fn value(&self, x: i32, y: i32, channel: usize) -> f32 {
        self.elem(x, y)[channel]
    }

    /// Mutable element access. Must be inside the owned area.
    #[inline]
    pub fn elem_mut(&mut self, x: i32, y: i32) -> &mut [f32] {
        debug_assert!(self.area.contains(x, y), "write outside owned area");
        debug_assert!(!self.single_elem, "write into a constant buffer");
        let o = self.offset(x, y);
        let ch = self.channels();
        &mut self.data[o..o + ch]
    }

    /// Write a full element.
    #[inline]
    pub fn write_elem(&mut self, x: i32, y: i32, elem: &[f32]) {
        self.elem_mut(x, y).copy_from_slice(elem);
    }

    /// Bilinear read at a fractional position.
    ///
    /// Coordinates at or past one pixel outside the area yield the zero
    /// element; within that band the four neighbors blend with out-of-area
    /// neighbors contributing zero (transparent-black edge extension). Blur
    /// output at canvas borders depends on these exact semantics.
    pub fn read_bilinear(&self, x: f32, y: f32, out: &mut [f32]) {
        let ch = self.channels();
        if x <= (self.area.x_min - 1) as f32
            || x >= self.area.x_max as f32
            || y <= (self.area.y_min - 1) as f32
            || y >= self.area.y_max as f32
        {
            out[..ch].fill(0.0);
            return;
        }
        let u = x - self.area.x_min as f32;
        let v = y - self.area.y_min as f32;
        let base_x = u.floor();
        let base_y = v.floor();
        let fx = u - base_x;
        let fy = v - base_y;
        let base_x = base_x as i64;
        let base_y = base_y as i64;
        let w = self.width() as i64;
        let h = self.height() as i64;

        out[..ch].fill(0.0);
        let corners = [
            (base_x, base_y, (1.0 - fx) * (1.0 - fy)),
            (base_x + 1, base_y, fx * (1.0 - fy)),
            (base_x, base_y + 1, (1.0 - fx) * fy),
            (base_x + 1, base_y + 1, fx * fy),
        ];
        for (sx, sy, weight) in corners {
            if sx >= 0 && sx < w && sy >= 0 && sy < h {
                let o = if self.single_elem {
                    0
                } else {
                    (sy as usize * w as usize + sx as usize) * ch
                };
                for c in 0..ch {
                    out[c] += self.data[o + c] * weight;
                }
            }
        }
    }

    /// Maximum of channel 0 over `area` clamped to the owned extent.
    ///
    /// Pre-pass query used to bound spatially varying kernel radii.
    pub fn max_value(&self, area: BufferArea) -> f32 {
        if self.single_elem {
            return self.data[0];
        }
        let Some(clamped) = area.intersect(self.area) else {
            return 0.0;
        };
        let mut max = f32::NEG_INFINITY;
        for (x, y) in clamped.pixels() {
            max = max.max(self.value(x, y, 0));
        }
        max
    }

    /// Copy `area` out of `src` into the same coordinates of this buffer.
    ///
    /// The chunk merge-back primitive: `area` must lie inside both extents.
    pub fn copy_region_from(&mut self, src: &MemoryBuffer, area: BufferArea) {
        debug_assert_eq!(self.pixel_type, src.pixel_type);
        debug_assert!(area.intersect(self.area) == Some(area));
        debug_assert!(area.intersect(src.area) == Some(area));
        let ch = self.channels();
        if src.single_elem {
            for (x, y) in area.pixels() {
                let o = self.offset(x, y);
                self.data[o..o + ch].copy_from_slice(&src.data[..ch]);
            }
            return;
        }
        let row_len = area.width() as usize * ch;
        for y in area.y_min..area.y_max {
            let dst_off = self.offset(area.x_min, y);
            let src_off = src.offset(area.x_min, y);
            self.data[dst_off..dst_off + row_len]
                .copy_from_slice(&src.data[src_off..src_off + row_len]);
        }
    }

    /// Visit every pixel of `area` (which must lie inside the owned extent)
    /// in row-major order with a mutable element slice.
    pub fn fill_area(&mut self, area: BufferArea, mut f: impl FnMut(i32, i32, &mut [f32])) {
        debug_assert!(area.intersect(self.area) == Some(area));
        let ch = self.channels();
        for y in area.y_min..area.y_max {
            let mut o = self.offset(area.x_min, y);
            for x in area.x_min..area.x_max {
                f(x, y, &mut self.data[o..o + ch]);
                o += ch;
            }
        }
    }
}

/// Arc-wrapped buffer for the single-writer/multi-reader handoff.
pub type SharedMemoryBuffer = Arc<MemoryBuffer>;
