//! Alpha-aware gaussian blur: a feathered dilate over a single-channel matte.
//!
//! Per pixel this blends two estimates: the plain gaussian-weighted average,
//! and the window's inverse-distance-weighted extremum. Near the window
//! center the extremum wins, towards the kernel edge the blur takes over,
//! which is what turns a hard dilate into a feathered one.

use super::tables::{make_dist_fac_inverse, make_gausstab, FalloffType, FilterType, MAX_GAUSSTAB_RADIUS};
use rastermill_core::{
    BufferArea, MemoryBuffer, PixelType, Quality, QualityHelper, QualityStepHelper,
};
use rastermill_engine::{NodeOperation, OperationFlags};

#[inline]
fn finv_test(value: f32, invert: bool) -> f32 {
    if invert {
        1.0 - value
    } else {
        value
    }
}

macro_rules! gaussian_alpha_impl {
    ($name:ident, $op_name:literal, $along_x:expr) => {
        pub struct $name {
            size: f32,
            falloff: FalloffType,
            /// Erode instead of dilate: the matte is inverted on the way in
            /// and out, so the extremum scan finds the minimum.
            do_subtract: bool,
            rad: f32,
            filter_size: i32,
            gausstab: Vec<f32>,
            distbuf_inv: Vec<f32>,
            step: QualityStepHelper,
        }

        impl $name {
            pub fn new(size: f32, falloff: FalloffType, do_subtract: bool) -> Self {
                Self {
                    size,
                    falloff,
                    do_subtract,
                    rad: 0.0,
                    filter_size: 0,
                    gausstab: Vec::new(),
                    distbuf_inv: Vec::new(),
                    step: QualityStepHelper::identity(),
                }
            }

            pub fn filter_size(&self) -> i32 {
                self.filter_size
            }
        }

        impl NodeOperation for $name {
            fn name(&self) -> &'static str {
                $op_name
            }

            fn input_sockets(&self) -> &[PixelType] {
                &[PixelType::Value]
            }

            fn output_type(&self) -> PixelType {
                PixelType::Value
            }

            fn flags(&self) -> OperationFlags {
                OperationFlags {
                    complex: true,
                    ..Default::default()
                }
            }

            fn init_data(&mut self, _canvas: BufferArea, quality: Quality) {
                self.rad = self.size.clamp(0.0, MAX_GAUSSTAB_RADIUS as f32);
                self.filter_size = (self.rad.ceil() as i32).min(MAX_GAUSSTAB_RADIUS);
                self.step = QualityStepHelper::init_execution(
                    quality,
                    QualityHelper::Multiply,
                    PixelType::Value,
                );
            }

            fn init_execution(&mut self) {
                self.gausstab = make_gausstab(FilterType::Gaussian, self.rad, self.filter_size);
                self.distbuf_inv =
                    make_dist_fac_inverse(self.rad, self.filter_size, self.falloff);
            }

            fn deinit_execution(&mut self) {
                self.gausstab = Vec::new();
                self.distbuf_inv = Vec::new();
            }

            fn area_of_interest(&self, _input_index: usize, output_area: BufferArea) -> BufferArea {
                if $along_x {
                    output_area.expand_axis(self.filter_size + 1, 0)
                } else {
                    output_area.expand_axis(0, self.filter_size + 1)
                }
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
                let do_invert = self.do_subtract;
                output.fill_area(area, |x, y, out| {
                    let (min, max, center) = if $along_x {
                        ((x - fs).max(rect.x_min), (x + fs + 1).min(rect.x_max), x)
                    } else {
                        ((y - fs).max(rect.y_min), (y + fs + 1).min(rect.y_max), y)
                    };

                    let mut alpha_accum = 0.0f32;
                    let mut multiplier_accum = 0.0f32;
                    // Seed the extremum with the current pixel to avoid a
                    // wasted lookup when the window holds nothing brighter.
                    let mut value_max = finv_test(input.value(x, y, 0), do_invert);
                    let mut distfacinv_max = 1.0f32;

                    let mut n = min;
                    while n < max {
                        let index = (n - center + fs) as usize;
                        let sample = if $along_x {
                            input.value(n, y, 0)
                        } else {
                            input.value(x, n, 0)
                        };
                        let mut value = finv_test(sample, do_invert);

                        let multiplier = self.gausstab[index];
                        alpha_accum += value * multiplier;
                        multiplier_accum += multiplier;

                        if value > value_max {
                            let multiplier = self.distbuf_inv[index];
                            value *= multiplier;
                            if value > value_max {
                                value_max = value;
                                distfacinv_max = multiplier;
                            }
                        }
                        n += step;
                    }

                    let value_blur = alpha_accum / multiplier_accum;
                    let value_final =
                        value_max * distfacinv_max + value_blur * (1.0 - distfacinv_max);
                    out[0] = finv_test(value_final, do_invert);
                });
            }
        }
    };
}

gaussian_alpha_impl!(GaussianAlphaXBlurOperation, "GaussianAlphaXBlur", true);
gaussian_alpha_impl!(GaussianAlphaYBlurOperation, "GaussianAlphaYBlur", false);
