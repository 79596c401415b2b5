//! Bokeh blur with a per-pixel radius read from a size input.
//!
//! The kernel shape comes from a literal bokeh image sampled at
//! `(dx / size, dy / size)` in its pixel space. Every chunk first queries the
//! maximum of the size input over its dependent region, bounding the scan
//! window once instead of per pixel.

use rastermill_core::{
    BufferArea, MemoryBuffer, PixelType, Quality, QualityHelper, QualityStepHelper,
};
use rastermill_engine::{NodeOperation, OperationFlags};
use serde::{Deserialize, Serialize};

/// Side length of the bokeh kernel image.
pub const BLUR_BOKEH_PIXELS: i32 = 512;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSizeBokehParams {
    /// Upper bound on the per-pixel radius, in pixels (or percent of the
    /// larger canvas dimension when `do_size_scale`).
    pub max_size: f32,
    /// Radii at or below this produce the unblurred input; a linear blend
    /// up to `2 * threshold` avoids a hard blur/no-blur seam.
    pub threshold: f32,
    pub do_size_scale: bool,
}

impl Default for VariableSizeBokehParams {
    fn default() -> Self {
        Self {
            max_size: 16.0,
            threshold: 1.0,
            do_size_scale: false,
        }
    }
}

pub struct VariableSizeBokehBlurOperation {
    params: VariableSizeBokehParams,
    canvas: BufferArea,
    step: QualityStepHelper,
}

const IMAGE_INPUT: usize = 0;
const BOKEH_INPUT: usize = 1;
const SIZE_INPUT: usize = 2;

impl VariableSizeBokehBlurOperation {
    pub fn new(params: VariableSizeBokehParams) -> Self {
        Self {
            params,
            canvas: BufferArea::default(),
            step: QualityStepHelper::identity(),
        }
    }

    fn size_scalar(&self) -> f32 {
        if self.params.do_size_scale {
            self.canvas.width().max(self.canvas.height()) as f32 / 100.0
        } else {
            1.0
        }
    }

    /// Conservative radius bound used by the area-of-interest declaration.
    fn max_blur_bound(&self) -> i32 {
        (self.params.max_size * self.size_scalar()) as i32
    }
}

impl NodeOperation for VariableSizeBokehBlurOperation {
    fn name(&self) -> &'static str {
        "VariableSizeBokehBlur"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[PixelType::Color, PixelType::Color, PixelType::Value]
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

    fn init_data(&mut self, canvas: BufferArea, quality: Quality) {
        self.canvas = canvas;
        self.step =
            QualityStepHelper::init_execution(quality, QualityHelper::Increase, PixelType::Color);
    }

    fn area_of_interest(&self, input_index: usize, output_area: BufferArea) -> BufferArea {
        match input_index {
            IMAGE_INPUT | SIZE_INPUT => output_area.expand(self.max_blur_bound() + 2),
            // The bokeh image is read wherever the kernel shape demands;
            // the whole (small) canvas is the dependency.
            _ => BufferArea::from_size(BLUR_BOKEH_PIXELS, BLUR_BOKEH_PIXELS),
        }
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) {
        let image = inputs[IMAGE_INPUT];
        let bokeh = inputs[BOKEH_INPUT];
        let size_input = inputs[SIZE_INPUT];
        let rect = image.area();
        let scalar = self.size_scalar();
        let bound = self.max_blur_bound();
        let threshold = self.params.threshold;

        // One pre-pass per chunk: the largest radius any pixel in the
        // dependent region asks for caps the scan window.
        let search = area.expand(bound + 2);
        let max_blur_scalar = ((size_input.max_value(search) * scalar) as i32).clamp(1, bound.max(1));

        let step = self.step.step();
        let mid = (BLUR_BOKEH_PIXELS / 2) as f32;
        let bokeh_scale = mid - 1.0;

        output.fill_area(area, |x, y, out| {
            let center_color = image.elem(x, y);
            let size_center = size_input.elem(x, y)[0] * scalar;

            let mut color_accum = [
                center_color[0],
                center_color[1],
                center_color[2],
                center_color[3],
            ];
            let mut multiplier_accum = [1.0f32; 4];

            if size_center > threshold {
                let y_min = (y - max_blur_scalar).max(rect.y_min);
                let y_max = (y + max_blur_scalar + 1).min(rect.y_max);
                let x_min = (x - max_blur_scalar).max(rect.x_min);
                let x_max = (x + max_blur_scalar + 1).min(rect.x_max);

                let mut ny = y_min;
                while ny < y_max {
                    let dy = (ny - y) as f32;
                    let mut nx = x_min;
                    while nx < x_max {
                        if nx != x || ny != y {
                            let size =
                                (size_input.elem(nx, ny)[0] * scalar).min(size_center);
                            let dx = (nx - x) as f32;
                            if size > threshold && size > dx.abs() && size > dy.abs() {
                                let u = mid + (dx / size) * bokeh_scale;
                                let v = mid + (dy / size) * bokeh_scale;
                                let bokeh_w = bokeh.elem_checked(u as i32, v as i32);
                                let elem = image.elem(nx, ny);
                                for c in 0..4 {
                                    color_accum[c] += bokeh_w[c] * elem[c];
                                    multiplier_accum[c] += bokeh_w[c];
                                }
                            }
                        }
                        nx += step;
                    }
                    ny += step;
                }
            }

            for c in 0..4 {
                out[c] = color_accum[c] / multiplier_accum[c];
            }

            // Blend back towards the unblurred input just above the
            // threshold, otherwise the blur boundary is a hard seam.
            if size_center > threshold && size_center < threshold * 2.0 {
                let fac = (size_center - threshold) / threshold;
                for c in 0..4 {
                    out[c] = center_color[c] * (1.0 - fac) + out[c] * fac;
                }
            }
        });
    }
}
