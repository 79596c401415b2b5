//! Edge-preserving blur gated by a determinator image.
//!
//! A neighbor contributes to the average only when its determinator color
//! stays within `sigma_color` of the center's, so blur spreads inside
//! regions but stops at determinator edges.

use rastermill_core::{
    BufferArea, MemoryBuffer, PixelType, Quality, QualityHelper, QualityStepHelper,
};
use rastermill_engine::{NodeOperation, OperationFlags};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BilateralBlurParams {
    pub sigma_color: f32,
    pub sigma_space: f32,
    pub iterations: i32,
}

impl Default for BilateralBlurParams {
    fn default() -> Self {
        Self {
            sigma_color: 0.3,
            sigma_space: 5.0,
            iterations: 1,
        }
    }
}

pub struct BilateralBlurOperation {
    params: BilateralBlurParams,
    space: f32,
    step: QualityStepHelper,
}

impl BilateralBlurOperation {
    pub fn new(params: BilateralBlurParams) -> Self {
        Self {
            params,
            space: 0.0,
            step: QualityStepHelper::identity(),
        }
    }
}

impl NodeOperation for BilateralBlurOperation {
    fn name(&self) -> &'static str {
        "BilateralBlur"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[PixelType::Color, PixelType::Color]
    }

    fn output_type(&self) -> PixelType {
        PixelType::Color
    }

    fn flags(&self) -> OperationFlags {
        OperationFlags {
            complex: true,
            ..Default::default()
        }
    }

    fn init_data(&mut self, _canvas: BufferArea, quality: Quality) {
        self.space = self.params.sigma_space + self.params.iterations as f32;
        self.step =
            QualityStepHelper::init_execution(quality, QualityHelper::Increase, PixelType::Color);
    }

    fn area_of_interest(&self, _input_index: usize, output_area: BufferArea) -> BufferArea {
        output_area.expand(self.space.ceil() as i32 + 1)
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) {
        let image = inputs[0];
        let determinator = inputs[1];
        let rect = determinator.area();
        let space = self.space.ceil() as i32;
        let sigma_color = self.params.sigma_color;
        let step = self.step.step();
        output.fill_area(area, |x, y, out| {
            let reference = determinator.elem(x, y);
            let mut accum = [0.0f32; 4];
            let mut count = 0.0f32;

            let y_min = (y - space).max(rect.y_min);
            let y_max = (y + space + 1).min(rect.y_max);
            let x_min = (x - space).max(rect.x_min);
            let x_max = (x + space + 1).min(rect.x_max);
            let mut yi = y_min;
            while yi < y_max {
                let mut xi = x_min;
                while xi < x_max {
                    let d = determinator.elem(xi, yi);
                    let delta = (reference[0] - d[0]).abs()
                        + (reference[1] - d[1]).abs()
                        + (reference[2] - d[2]).abs();
                    if delta < sigma_color {
                        let elem = image.elem(xi, yi);
                        for c in 0..4 {
                            accum[c] += elem[c];
                        }
                        count += 1.0;
                    }
                    xi += step;
                }
                yi += step;
            }

            if count > 0.0 {
                for c in 0..4 {
                    out[c] = accum[c] / count;
                }
            } else {
                out.copy_from_slice(image.elem(x, y));
            }
        });
    }
}
