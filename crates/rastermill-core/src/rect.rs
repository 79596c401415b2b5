//! Integer pixel-space rectangles.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in output-canvas pixel coordinates.
///
/// Half-open on the max edges: a pixel (x, y) belongs to the area when
/// `x_min <= x < x_max` and `y_min <= y < y_max`. Canvases, chunks and
/// areas of interest are all expressed in this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct BufferArea {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl BufferArea {
    /// Create a new area from its corners.
    #[inline]
    pub const fn new(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Area anchored at the origin with the given size.
    #[inline]
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Width in pixels.
    #[inline]
    pub fn width(self) -> i32 {
        (self.x_max - self.x_min).max(0)
    }

    /// Height in pixels.
    #[inline]
    pub fn height(self) -> i32 {
        (self.y_max - self.y_min).max(0)
    }

    /// Number of pixels covered.
    #[inline]
    pub fn num_pixels(self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// True when the area covers no pixels.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.x_min >= self.x_max || self.y_min >= self.y_max
    }

    /// Check whether a pixel lies inside the area.
    #[inline]
    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= self.x_min && x < self.x_max && y >= self.y_min && y < self.y_max
    }

    /// Intersection with another area, if any pixels overlap.
    pub fn intersect(self, other: Self) -> Option<Self> {
        let r = Self::new(
            self.x_min.max(other.x_min),
            self.y_min.max(other.y_min),
            self.x_max.min(other.x_max),
            self.y_max.min(other.y_max),
        );
        if r.is_empty() {
            None
        } else {
            Some(r)
        }
    }

    /// Bounding box of both areas.
    pub fn union_with(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self::new(
            self.x_min.min(other.x_min),
            self.y_min.min(other.y_min),
            self.x_max.max(other.x_max),
            self.y_max.max(other.y_max),
        )
    }

    /// Expand by a margin on all sides.
    #[inline]
    pub fn expand(self, margin: i32) -> Self {
        self.expand_axis(margin, margin)
    }

    /// Expand by independent margins along each axis.
    #[inline]
    pub fn expand_axis(self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.x_min - dx,
            self.y_min - dy,
            self.x_max + dx,
            self.y_max + dy,
        )
    }

    /// Clamp this area to lie inside `bounds`.
    ///
    /// Used to trim an expanded area of interest to the upstream canvas;
    /// reads outside the clamped result are a contract violation.
    pub fn clamp_to(self, bounds: Self) -> Self {
        Self::new(
            self.x_min.clamp(bounds.x_min, bounds.x_max),
            self.y_min.clamp(bounds.y_min, bounds.y_max),
            self.x_max.clamp(bounds.x_min, bounds.x_max),
            self.y_max.clamp(bounds.y_min, bounds.y_max),
        )
    }

    /// Row-major iteration over the pixels of the area.
    pub fn pixels(self) -> impl Iterator<Item = (i32, i32)> {
        (self.y_min..self.y_max)
            .flat_map(move |y| (self.x_min..self.x_max).map(move |x| (x, y)))
    }
}
