//! Channel split/combine and YCbCr conversion, used by the keying pre-blur
//! stage.

use rastermill_core::color::{rgb_to_ycc, ycc_to_rgb};
use rastermill_core::{BufferArea, MemoryBuffer, PixelType};
use rastermill_engine::NodeOperation;

/// Extract one channel of a color input as a value buffer.
pub struct SeparateChannelOperation {
    channel: usize,
}

impl SeparateChannelOperation {
    pub fn new(channel: usize) -> Self {
        debug_assert!(channel < 4);
        Self { channel }
    }
}

impl NodeOperation for SeparateChannelOperation {
    fn name(&self) -> &'static str {
        "SeparateChannel"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[PixelType::Color]
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
        let input = inputs[0];
        output.fill_area(area, |x, y, out| {
            out[0] = input.elem(x, y)[self.channel];
        });
    }
}

/// Reassemble four value buffers into a color buffer.
pub struct CombineChannelsOperation;

impl CombineChannelsOperation {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CombineChannelsOperation {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeOperation for CombineChannelsOperation {
    fn name(&self) -> &'static str {
        "CombineChannels"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[
            PixelType::Value,
            PixelType::Value,
            PixelType::Value,
            PixelType::Value,
        ]
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
        output.fill_area(area, |x, y, out| {
            for (c, input) in inputs.iter().enumerate() {
                out[c] = input.elem(x, y)[0];
            }
        });
    }
}

macro_rules! color_convert_impl {
    ($name:ident, $op_name:literal, $convert:expr) => {
        pub struct $name;

        impl $name {
            pub fn new() -> Self {
                Self
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl NodeOperation for $name {
            fn name(&self) -> &'static str {
                $op_name
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
                let input = inputs[0];
                output.fill_area(area, |x, y, out| {
                    let pixel = input.elem(x, y);
                    let converted = $convert(pixel[0], pixel[1], pixel[2]);
                    out[0] = converted[0];
                    out[1] = converted[1];
                    out[2] = converted[2];
                    out[3] = pixel[3];
                });
            }
        }
    };
}

color_convert_impl!(ConvertRGBToYCCOperation, "ConvertRGBToYCC", rgb_to_ycc);
color_convert_impl!(ConvertYCCToRGBOperation, "ConvertYCCToRGB", ycc_to_rgb);
