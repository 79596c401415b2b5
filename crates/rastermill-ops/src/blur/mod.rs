//! The blur operation family.

pub mod bilateral;
pub mod bokeh;
pub mod directional;
pub mod gaussian;
pub mod gaussian_alpha;
pub mod reference;
pub mod tables;
pub mod variable_bokeh;

pub use bilateral::{BilateralBlurOperation, BilateralBlurParams};
pub use bokeh::GaussianBokehBlurOperation;
pub use directional::{DirectionalBlurOperation, DirectionalBlurParams};
pub use gaussian::{GaussianXBlurOperation, GaussianYBlurOperation};
pub use gaussian_alpha::{GaussianAlphaXBlurOperation, GaussianAlphaYBlurOperation};
pub use reference::GaussianBlurReferenceOperation;
pub use tables::{
    filter_value, make_dist_fac_inverse, make_gausstab, FalloffType, FilterType,
    MAX_GAUSSTAB_RADIUS,
};
pub use variable_bokeh::{VariableSizeBokehBlurOperation, VariableSizeBokehParams};

use rastermill_core::BufferArea;
use serde::{Deserialize, Serialize};

/// Which canvas dimension relative-percent sizes follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectMode {
    /// X percent follows width, Y percent follows height.
    #[default]
    Free,
    /// Both axes follow the canvas width.
    AlongY,
    /// Both axes follow the canvas height.
    AlongX,
}

/// Shared configuration of the gaussian/bokeh blur operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlurParams {
    pub filter_type: FilterType,
    /// Absolute kernel radii in pixels (non-relative mode).
    pub size_x: f32,
    pub size_y: f32,
    /// Interpret `percent_x`/`percent_y` of the canvas instead of pixels.
    pub relative: bool,
    pub percent_x: f32,
    pub percent_y: f32,
    pub aspect: AspectMode,
}

impl Default for BlurParams {
    fn default() -> Self {
        Self {
            filter_type: FilterType::Gaussian,
            size_x: 0.0,
            size_y: 0.0,
            relative: false,
            percent_x: 0.0,
            percent_y: 0.0,
            aspect: AspectMode::Free,
        }
    }
}

impl BlurParams {
    /// Resolve the configured radii against a canvas, scaled by the size
    /// factor from the size socket.
    pub fn radii(&self, canvas: BufferArea, size_factor: f32) -> (f32, f32) {
        if !self.relative {
            return (self.size_x * size_factor, self.size_y * size_factor);
        }
        let width = canvas.width() as f32;
        let height = canvas.height() as f32;
        let (rad_x, rad_y) = match self.aspect {
            AspectMode::Free => (
                self.percent_x * 0.01 * width,
                self.percent_y * 0.01 * height,
            ),
            AspectMode::AlongY => (
                self.percent_x * 0.01 * width,
                self.percent_y * 0.01 * width,
            ),
            AspectMode::AlongX => (
                self.percent_x * 0.01 * height,
                self.percent_y * 0.01 * height,
            ),
        };
        (rad_x * size_factor, rad_y * size_factor)
    }
}
