//! Quality levels and the sampling-stride helper filter kernels read.

use crate::buffer::PixelType;
use serde::{Deserialize, Serialize};

/// Process-wide quality level for a compositor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    High,
    Medium,
    Low,
}

/// How a kernel scales its stride with falling quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityHelper {
    /// Stride grows by one per level.
    Increase,
    /// Stride doubles per level.
    Multiply,
}

/// Maps a quality level to a pixel sampling stride and per-row offset.
///
/// Convolution loops visit every `step()`-th sample instead of every sample,
/// trading accuracy for speed uniformly across the filter kernels.
#[derive(Debug, Clone, Copy)]
pub struct QualityStepHelper {
    step: i32,
    offset_add: i32,
}

impl QualityStepHelper {
    /// Full-accuracy helper, used before `init_execution` configures one.
    pub const fn identity() -> Self {
        Self {
            step: 1,
            offset_add: 1,
        }
    }

    /// Derive stride and offset from the quality level.
    ///
    /// `offset_add` is in element units: for `Multiply` it advances whole
    /// pixels, so the per-channel offset scales with the buffer's channel
    /// count.
    pub fn init_execution(quality: Quality, helper: QualityHelper, pixel_type: PixelType) -> Self {
        let step = match (helper, quality) {
            (QualityHelper::Increase, Quality::High) => 1,
            (QualityHelper::Increase, Quality::Medium) => 2,
            (QualityHelper::Increase, Quality::Low) => 3,
            (QualityHelper::Multiply, Quality::High) => 1,
            (QualityHelper::Multiply, Quality::Medium) => 2,
            (QualityHelper::Multiply, Quality::Low) => 4,
        };
        let offset_add = match helper {
            QualityHelper::Increase => step,
            QualityHelper::Multiply => step * pixel_type.channels() as i32,
        };
        Self { step, offset_add }
    }

    /// Pixel stride for convolution windows.
    #[inline]
    pub fn step(&self) -> i32 {
        self.step
    }

    /// Per-row element offset matching `step`.
    #[inline]
    pub fn offset_add(&self) -> i32 {
        self.offset_add
    }
}
