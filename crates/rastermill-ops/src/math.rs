//! Pointwise scalar math operations.
//!
//! Every function recovers from its numeric edge cases with a documented
//! fallback constant instead of producing NaN or infinity; interactive
//! editing always gets a finite pixel value.

use rastermill_core::{BufferArea, MemoryBuffer, PixelType};
use rastermill_engine::NodeOperation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MathFunction {
    Add,
    Subtract,
    Multiply,
    Divide,
    Sine,
    Cosine,
    Tangent,
    ArcSine,
    ArcCosine,
    ArcTangent,
    ArcTan2,
    Power,
    Logarithm,
    Minimum,
    Maximum,
    Round,
    Floor,
    Ceil,
    Fraction,
    Modulo,
    Absolute,
    Exponent,
    SquareRoot,
    InverseSquareRoot,
    Sign,
}

impl MathFunction {
    /// Evaluate on two scalars. Unary functions ignore `b`.
    pub fn evaluate(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => {
                // Divide by zero yields zero, not inf/NaN.
                if b == 0.0 {
                    0.0
                } else {
                    a / b
                }
            }
            Self::Sine => a.sin(),
            Self::Cosine => a.cos(),
            Self::Tangent => a.tan(),
            Self::ArcSine => {
                if (-1.0..=1.0).contains(&a) {
                    a.asin()
                } else {
                    0.0
                }
            }
            Self::ArcCosine => {
                if (-1.0..=1.0).contains(&a) {
                    a.acos()
                } else {
                    0.0
                }
            }
            Self::ArcTangent => a.atan(),
            Self::ArcTan2 => a.atan2(b),
            Self::Power => {
                if a >= 0.0 {
                    a.powf(b)
                } else {
                    // Negative base: only near-integer exponents are
                    // defined; everything else collapses to zero.
                    let b_mod_1 = b.rem_euclid(1.0);
                    if b_mod_1 > 0.999 || b_mod_1 < 0.001 {
                        a.powf((b + 0.5).floor())
                    } else {
                        0.0
                    }
                }
            }
            Self::Logarithm => {
                if a > 0.0 && b > 0.0 {
                    a.ln() / b.ln()
                } else {
                    0.0
                }
            }
            Self::Minimum => a.min(b),
            Self::Maximum => a.max(b),
            Self::Round => (a + 0.5).floor(),
            Self::Floor => a.floor(),
            Self::Ceil => a.ceil(),
            Self::Fraction => a - a.floor(),
            Self::Modulo => {
                if b == 0.0 {
                    0.0
                } else {
                    a % b
                }
            }
            Self::Absolute => a.abs(),
            Self::Exponent => a.exp(),
            Self::SquareRoot => {
                if a > 0.0 {
                    a.sqrt()
                } else {
                    0.0
                }
            }
            Self::InverseSquareRoot => {
                if a > 0.0 {
                    1.0 / a.sqrt()
                } else {
                    0.0
                }
            }
            Self::Sign => {
                if a > 0.0 {
                    1.0
                } else if a < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Elementwise scalar function of two value inputs.
pub struct MathOperation {
    function: MathFunction,
    use_clamp: bool,
}

impl MathOperation {
    pub fn new(function: MathFunction) -> Self {
        Self {
            function,
            use_clamp: false,
        }
    }

    pub fn with_clamp(function: MathFunction) -> Self {
        Self {
            function,
            use_clamp: true,
        }
    }
}

impl NodeOperation for MathOperation {
    fn name(&self) -> &'static str {
        "Math"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[PixelType::Value, PixelType::Value]
    }

    fn output_type(&self) -> PixelType {
        PixelType::Value
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) {
        let a = inputs[0];
        let b = inputs[1];
        output.fill_area(area, |x, y, out| {
            let mut v = self.function.evaluate(a.value(x, y, 0), b.value(x, y, 0));
            if self.use_clamp {
                v = v.clamp(0.0, 1.0);
            }
            out[0] = v;
        });
    }
}
