//! Gamma operations on premultiplied color.

use rastermill_core::color::{premultiply, unpremultiply};
use rastermill_core::{BufferArea, MemoryBuffer, PixelType};
use rastermill_engine::NodeOperation;

/// Per-channel `powf` with an exponent input; non-positive channel values
/// pass through untouched.
pub struct GammaOperation;

impl GammaOperation {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GammaOperation {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeOperation for GammaOperation {
    fn name(&self) -> &'static str {
        "Gamma"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[PixelType::Color, PixelType::Value]
    }

    fn output_type(&self) -> PixelType {
        PixelType::Color
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) {
        let image = inputs[0];
        let gamma = inputs[1];
        output.fill_area(area, |x, y, out| {
            let pixel = image.elem(x, y);
            let g = gamma.elem(x, y)[0];
            for c in 0..3 {
                out[c] = if pixel[c] > 0.0 { pixel[c].powf(g) } else { pixel[c] };
            }
            out[3] = pixel[3];
        });
    }
}

fn gamma_convert(output: &mut MemoryBuffer, area: BufferArea, input: &MemoryBuffer, correct: bool) {
    output.fill_area(area, |x, y, out| {
        let mut pixel = [0.0f32; 4];
        pixel.copy_from_slice(input.elem(x, y));
        // Work on straight color; a zero alpha skips both alpha conversions.
        let has_alpha = pixel[3] > 0.0;
        if has_alpha {
            unpremultiply(&mut pixel);
        }
        for c in 0..3 {
            pixel[c] = if pixel[c] > 0.0 {
                if correct {
                    pixel[c] * pixel[c]
                } else {
                    pixel[c].sqrt()
                }
            } else {
                0.0
            };
        }
        if has_alpha {
            premultiply(&mut pixel);
        }
        out.copy_from_slice(&pixel);
    });
}

/// Square the straight color channels (gamma 2.0 encode for filtering).
pub struct GammaCorrectOperation;

impl GammaCorrectOperation {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GammaCorrectOperation {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeOperation for GammaCorrectOperation {
    fn name(&self) -> &'static str {
        "GammaCorrect"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[PixelType::Color]
    }

    fn output_type(&self) -> PixelType {
        PixelType::Color
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) {
        gamma_convert(output, area, inputs[0], true);
    }
}

/// Inverse of [`GammaCorrectOperation`]: square root of the straight color.
pub struct GammaUncorrectOperation;

impl GammaUncorrectOperation {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GammaUncorrectOperation {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeOperation for GammaUncorrectOperation {
    fn name(&self) -> &'static str {
        "GammaUncorrect"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[PixelType::Color]
    }

    fn output_type(&self) -> PixelType {
        PixelType::Color
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) {
        gamma_convert(output, area, inputs[0], false);
    }
}
