//! Rastermill Core - Foundation types for the compositor engine
//!
//! This crate provides the fundamental types used throughout Rastermill:
//! - Pixel-space rectangles (`BufferArea`)
//! - Float pixel buffers with stride and edge semantics (`MemoryBuffer`)
//! - Quality/stride configuration (`Quality`, `QualityStepHelper`)
//! - Color conversion helpers for the keying pipeline

pub mod buffer;
pub mod color;
pub mod error;
pub mod quality;
pub mod rect;

pub use buffer::{MemoryBuffer, PixelType, SharedMemoryBuffer};
pub use error::{Error, Result};
pub use quality::{Quality, QualityHelper, QualityStepHelper};
pub use rect::BufferArea;
