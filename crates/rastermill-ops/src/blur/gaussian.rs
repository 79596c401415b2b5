//! Separable gaussian blur, one pass per axis.

use super::tables::{make_gausstab, MAX_GAUSSTAB_RADIUS};
use super::BlurParams;
use rastermill_core::{
    BufferArea, MemoryBuffer, PixelType, Quality, QualityHelper, QualityStepHelper,
};
use rastermill_engine::{KernelCall, NodeOperation, OperationFlags};

/// Horizontal 1D convolution pass of the separable gaussian blur.
///
/// Accumulates both the weighted color and the weight sum: at canvas borders
/// and with a quality stride above 1 the visited weights no longer sum to
/// one, so the result is renormalized by the actually accumulated weight.
pub struct GaussianXBlurOperation {
    params: BlurParams,
    size_factor: f32,
    rad: f32,
    filter_size: i32,
    gausstab: Vec<f32>,
    step: QualityStepHelper,
}

impl GaussianXBlurOperation {
    pub fn new(params: BlurParams, size_factor: f32) -> Self {
        Self {
            params,
            size_factor,
            rad: 0.0,
            filter_size: 0,
            gausstab: Vec::new(),
            step: QualityStepHelper::identity(),
        }
    }

    /// Effective kernel half-width after clamping.
    pub fn filter_size(&self) -> i32 {
        self.filter_size
    }
}

impl NodeOperation for GaussianXBlurOperation {
    fn name(&self) -> &'static str {
        "GaussianXBlur"
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
        let (rad_x, _) = self.params.radii(canvas, self.size_factor);
        self.rad = rad_x.clamp(0.0, MAX_GAUSSTAB_RADIUS as f32);
        self.filter_size = (self.rad.ceil() as i32).min(MAX_GAUSSTAB_RADIUS);
        self.step =
            QualityStepHelper::init_execution(quality, QualityHelper::Multiply, PixelType::Color);
    }

    fn init_execution(&mut self) {
        self.gausstab = make_gausstab(self.params.filter_type, self.rad, self.filter_size);
    }

    fn deinit_execution(&mut self) {
        self.gausstab = Vec::new();
    }

    fn area_of_interest(&self, _input_index: usize, output_area: BufferArea) -> BufferArea {
        output_area.expand_axis(self.filter_size + 1, 0)
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) {
        let input = inputs[0];
        let rect = input.area();
        let fs = self.filter_size;
        let step = self.step.step();
        let gausstab = &self.gausstab;
        output.fill_area(area, |x, y, out| {
            let x_min = (x - fs).max(rect.x_min);
            let x_max = (x + fs + 1).min(rect.x_max);
            let mut acc = [0.0f32; 4];
            let mut weight = 0.0f32;
            let mut gauss_idx = (x_min - x + fs) as usize;
            let mut nx = x_min;
            while nx < x_max {
                let multiplier = gausstab[gauss_idx];
                let elem = input.elem(nx, y);
                for c in 0..4 {
                    acc[c] += elem[c] * multiplier;
                }
                weight += multiplier;
                gauss_idx += step as usize;
                nx += step;
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
            KernelCall::new("gaussian_xblur_operation_kernel")
                .read_image(0)
                .output_buffer()
                .int2(area.x_min, area.y_min)
                .int(self.filter_size)
                .float_table(self.gausstab.clone())
                .int2(inputs[0].area().width(), inputs[0].area().height()),
        )
    }
}

/// Vertical 1D convolution pass; structurally identical to the X pass along
/// the other axis, consuming the X pass's output.
pub struct GaussianYBlurOperation {
    params: BlurParams,
    size_factor: f32,
    rad: f32,
    filter_size: i32,
    gausstab: Vec<f32>,
    step: QualityStepHelper,
}

impl GaussianYBlurOperation {
    pub fn new(params: BlurParams, size_factor: f32) -> Self {
        Self {
            params,
            size_factor,
            rad: 0.0,
            filter_size: 0,
            gausstab: Vec::new(),
            step: QualityStepHelper::identity(),
        }
    }

    pub fn filter_size(&self) -> i32 {
        self.filter_size
    }
}

impl NodeOperation for GaussianYBlurOperation {
    fn name(&self) -> &'static str {
        "GaussianYBlur"
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
        let (_, rad_y) = self.params.radii(canvas, self.size_factor);
        self.rad = rad_y.clamp(0.0, MAX_GAUSSTAB_RADIUS as f32);
        self.filter_size = (self.rad.ceil() as i32).min(MAX_GAUSSTAB_RADIUS);
        self.step =
            QualityStepHelper::init_execution(quality, QualityHelper::Multiply, PixelType::Color);
    }

    fn init_execution(&mut self) {
        self.gausstab = make_gausstab(self.params.filter_type, self.rad, self.filter_size);
    }

    fn deinit_execution(&mut self) {
        self.gausstab = Vec::new();
    }

    fn area_of_interest(&self, _input_index: usize, output_area: BufferArea) -> BufferArea {
        output_area.expand_axis(0, self.filter_size + 1)
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) {
        let input = inputs[0];
        let rect = input.area();
        let fs = self.filter_size;
        let step = self.step.step();
        let gausstab = &self.gausstab;
        output.fill_area(area, |x, y, out| {
            let y_min = (y - fs).max(rect.y_min);
            let y_max = (y + fs + 1).min(rect.y_max);
            let mut acc = [0.0f32; 4];
            let mut weight = 0.0f32;
            let mut gauss_idx = (y_min - y + fs) as usize;
            let mut ny = y_min;
            while ny < y_max {
                let multiplier = gausstab[gauss_idx];
                let elem = input.elem(x, ny);
                for c in 0..4 {
                    acc[c] += elem[c] * multiplier;
                }
                weight += multiplier;
                gauss_idx += step as usize;
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
            KernelCall::new("gaussian_yblur_operation_kernel")
                .read_image(0)
                .output_buffer()
                .int2(area.x_min, area.y_min)
                .int(self.filter_size)
                .float_table(self.gausstab.clone())
                .int2(inputs[0].area().width(), inputs[0].area().height()),
        )
    }
}
