//! Non-separable 2D blur with a radially evaluated kernel table.
//!
//! Once aspect-corrected radii and the filter falloff interact, the kernel
//! shape is no longer an outer product of two 1D tables, so the full
//! `(2*radx+1) * (2*rady+1)` weight table is built and convolved directly.

use super::tables::filter_value;
use super::BlurParams;
use rastermill_core::{
    BufferArea, MemoryBuffer, PixelType, Quality, QualityHelper, QualityStepHelper,
};
use rastermill_engine::{KernelCall, NodeOperation, OperationFlags};

pub struct GaussianBokehBlurOperation {
    params: BlurParams,
    size_factor: f32,
    rad_xf: f32,
    rad_yf: f32,
    rad_x: i32,
    rad_y: i32,
    gausstab: Vec<f32>,
    step: QualityStepHelper,
}

impl GaussianBokehBlurOperation {
    pub fn new(params: BlurParams, size_factor: f32) -> Self {
        Self {
            params,
            size_factor,
            rad_xf: 0.0,
            rad_yf: 0.0,
            rad_x: 0,
            rad_y: 0,
            gausstab: Vec::new(),
            step: QualityStepHelper::identity(),
        }
    }

    pub fn radii(&self) -> (i32, i32) {
        (self.rad_x, self.rad_y)
    }
}

impl NodeOperation for GaussianBokehBlurOperation {
    fn name(&self) -> &'static str {
        "GaussianBokehBlur"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[PixelType::Color]
    }

    fn output_type(&self) -> PixelType {
        PixelType::Color
    }

    fn flags(&self) -> OperationFlags {
        OperationFlags {
            complex: true,
            open_cl: true,
            ..Default::default()
        }
    }

    fn init_data(&mut self, canvas: BufferArea, quality: Quality) {
        let (rad_x, rad_y) = self.params.radii(canvas, self.size_factor);
        self.rad_xf = rad_x.max(0.01);
        self.rad_yf = rad_y.max(0.01);
        self.rad_x = self.rad_xf.ceil() as i32;
        self.rad_y = self.rad_yf.ceil() as i32;
        self.step =
            QualityStepHelper::init_execution(quality, QualityHelper::Multiply, PixelType::Color);
    }

    fn init_execution(&mut self) {
        let row = (2 * self.rad_x + 1) as usize;
        let fac_x = 1.0 / self.rad_xf;
        let fac_y = 1.0 / self.rad_yf;
        let mut table = Vec::with_capacity(row * (2 * self.rad_y + 1) as usize);
        let mut sum = 0.0f32;
        for j in -self.rad_y..=self.rad_y {
            for i in -self.rad_x..=self.rad_x {
                let fj = j as f32 * fac_y;
                let fi = i as f32 * fac_x;
                let dist = (fj * fj + fi * fi).sqrt();
                let val = filter_value(self.params.filter_type, dist);
                sum += val;
                table.push(val);
            }
        }
        if sum > 0.0 {
            let inv = 1.0 / sum;
            for w in &mut table {
                *w *= inv;
            }
        } else {
            // Degenerate very-small kernel: force the center weight so the
            // convolution never divides by zero.
            let center = (self.rad_y as usize) * row + self.rad_x as usize;
            table[center] = 1.0;
        }
        self.gausstab = table;
    }

    fn deinit_execution(&mut self) {
        self.gausstab = Vec::new();
    }

    fn area_of_interest(&self, _input_index: usize, output_area: BufferArea) -> BufferArea {
        output_area.expand_axis(self.rad_x, self.rad_y)
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) {
        let input = inputs[0];
        let rect = input.area();
        let step = self.step.step();
        let row_w = (2 * self.rad_x + 1) as usize;
        output.fill_area(area, |x, y, out| {
            let y_min = (y - self.rad_y).max(rect.y_min);
            let y_max = (y + self.rad_y + 1).min(rect.y_max);
            let x_min = (x - self.rad_x).max(rect.x_min);
            let x_max = (x + self.rad_x + 1).min(rect.x_max);

            let mut acc = [0.0f32; 4];
            let mut weight = 0.0f32;
            let mut ny = y_min;
            while ny < y_max {
                let mut index =
                    ((ny - y + self.rad_y) as usize) * row_w + (x_min - x + self.rad_x) as usize;
                let mut nx = x_min;
                while nx < x_max {
                    let multiplier = self.gausstab[index];
                    let elem = input.elem(nx, ny);
                    for c in 0..4 {
                        acc[c] += elem[c] * multiplier;
                    }
                    weight += multiplier;
                    index += step as usize;
                    nx += step;
                }
                ny += step;
            }
            if weight > 0.0 {
                for c in 0..4 {
                    out[c] = acc[c] / weight;
                }
            } else {
                out.copy_from_slice(input.elem(x, y));
            }
        });
    }

    fn kernel_call(&self, area: BufferArea, inputs: &[&MemoryBuffer]) -> Option<KernelCall> {
        Some(
            KernelCall::new("bokeh_blur_kernel")
                .read_image(0)
                .output_buffer()
                .int2(area.x_min, area.y_min)
                .int(self.rad_x)
                .int(self.rad_y)
                .int(self.step.step())
                .float_table(self.gausstab.clone())
                .int2(inputs[0].area().width(), inputs[0].area().height()),
        )
    }
}
