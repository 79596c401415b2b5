//! Screen-color matte extraction and its helper operations.

use rastermill_core::{BufferArea, MemoryBuffer, PixelType};
use rastermill_engine::{NodeOperation, OperationFlags};
use serde::{Deserialize, Serialize};

/// Index of the largest of the first three channels.
#[inline]
fn max_axis_v3(v: &[f32]) -> usize {
    if v[0] > v[1] {
        if v[0] > v[2] {
            0
        } else {
            2
        }
    } else if v[1] > v[2] {
        1
    } else {
        2
    }
}

/// Saturation score of a pixel relative to a dominant channel.
///
/// The two non-dominant channels blend through `screen_balance`; the score
/// is how far the dominant channel rises above that blend, damped by the
/// blend's own brightness.
fn pixel_saturation(pixel: &[f32], screen_balance: f32, primary: usize) -> f32 {
    let other_1 = (primary + 1) % 3;
    let other_2 = (primary + 2) % 3;
    let min_c = other_1.min(other_2);
    let max_c = other_1.max(other_2);
    let val = screen_balance * pixel[min_c] + (1.0 - screen_balance) * pixel[max_c];
    (pixel[primary] - val) * (1.0 - val).abs()
}

/// Core keyer: compares each pixel's saturation against the screen color's.
pub struct KeyingOperation {
    screen_balance: f32,
}

impl KeyingOperation {
    pub fn new(screen_balance: f32) -> Self {
        Self { screen_balance }
    }
}

impl NodeOperation for KeyingOperation {
    fn name(&self) -> &'static str {
        "Keying"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[PixelType::Color, PixelType::Color]
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
        let image = inputs[0];
        let screen = inputs[1];
        let balance = self.screen_balance;
        output.fill_area(area, |x, y, out| {
            let pixel = image.elem(x, y);
            let screen_color = screen.elem(x, y);
            let primary = max_axis_v3(screen_color);

            let min_pixel = pixel[0].min(pixel[1]).min(pixel[2]);
            if min_pixel > 1.0 {
                // Overexposure never happens on the screen itself; treat
                // light sources and glares as foreground.
                out[0] = 1.0;
                return;
            }

            let saturation = pixel_saturation(pixel, balance, primary);
            let screen_saturation = pixel_saturation(screen_color, balance, primary);
            out[0] = if saturation < 0.0 {
                // Dominant channel differs from the screen's: foreground.
                1.0
            } else if saturation >= screen_saturation {
                // At least as saturated as the screen: background.
                0.0
            } else {
                1.0 - saturation / screen_saturation
            };
        });
    }
}

/// Axis selector for the keying box blur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyingBlurAxis {
    X,
    Y,
}

/// One-axis box blur over a value buffer, averaging by the actual number of
/// samples inside the canvas.
pub struct KeyingBlurOperation {
    size: i32,
    axis: KeyingBlurAxis,
}

impl KeyingBlurOperation {
    pub fn new(size: i32, axis: KeyingBlurAxis) -> Self {
        Self { size, axis }
    }
}

impl NodeOperation for KeyingBlurOperation {
    fn name(&self) -> &'static str {
        "KeyingBlur"
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

    fn area_of_interest(&self, _input_index: usize, output_area: BufferArea) -> BufferArea {
        match self.axis {
            KeyingBlurAxis::X => output_area.expand_axis(self.size, 0),
            KeyingBlurAxis::Y => output_area.expand_axis(0, self.size),
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
        let size = self.size;
        output.fill_area(area, |x, y, out| {
            let mut sum = 0.0f32;
            let mut count = 0;
            match self.axis {
                KeyingBlurAxis::X => {
                    let from = (x - size + 1).max(rect.x_min);
                    let to = (x + size).min(rect.x_max);
                    for cx in from..to {
                        sum += input.value(cx, y, 0);
                        count += 1;
                    }
                }
                KeyingBlurAxis::Y => {
                    let from = (y - size + 1).max(rect.y_min);
                    let to = (y + size).min(rect.y_max);
                    for cy in from..to {
                        sum += input.value(x, cy, 0);
                        count += 1;
                    }
                }
            }
            out[0] = if count > 0 { sum / count as f32 } else { input.value(x, y, 0) };
        });
    }
}

/// Black/white clip with a neighborhood-consistency test.
///
/// A pixel is remapped through `[clip_black, clip_white]` only when at least
/// 90 % of its neighborhood agrees with it within `kernel_tolerance`; in
/// edge-matte mode the output is instead 1 exactly where that test fails.
pub struct KeyingClipOperation {
    kernel_radius: i32,
    kernel_tolerance: f32,
    clip_black: f32,
    clip_white: f32,
    is_edge_matte: bool,
}

impl KeyingClipOperation {
    pub fn new(
        kernel_radius: i32,
        kernel_tolerance: f32,
        clip_black: f32,
        clip_white: f32,
        is_edge_matte: bool,
    ) -> Self {
        Self {
            kernel_radius,
            kernel_tolerance,
            clip_black,
            clip_white,
            is_edge_matte,
        }
    }
}

impl NodeOperation for KeyingClipOperation {
    fn name(&self) -> &'static str {
        "KeyingClip"
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

    fn area_of_interest(&self, _input_index: usize, output_area: BufferArea) -> BufferArea {
        output_area.expand(self.kernel_radius)
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) {
        let input = inputs[0];
        let rect = input.area();
        let delta = self.kernel_radius;
        let tolerance = self.kernel_tolerance;
        output.fill_area(area, |x, y, out| {
            let value = input.value(x, y, 0);

            let start_x = (x - delta + 1).max(rect.x_min);
            let start_y = (y - delta + 1).max(rect.y_min);
            let end_x = (x + delta - 1).min(rect.x_max - 1);
            let end_y = (y + delta - 1).min(rect.y_max - 1);

            let total_count = (end_x - start_x + 1) * (end_y - start_y + 1) - 1;
            let threshold_count = (total_count as f32 * 0.9).ceil() as i32;

            let mut ok = delta == 0;
            let mut count = 0;
            'scan: for cx in start_x..=end_x {
                for cy in start_y..=end_y {
                    if cx == x && cy == y {
                        continue;
                    }
                    if (input.value(cx, cy, 0) - value).abs() < tolerance {
                        count += 1;
                        if count >= threshold_count {
                            ok = true;
                            break 'scan;
                        }
                    }
                }
            }

            if self.is_edge_matte {
                out[0] = if ok { 0.0 } else { 1.0 };
            } else {
                out[0] = value;
                if ok {
                    out[0] = if value < self.clip_black {
                        0.0
                    } else if value >= self.clip_white {
                        1.0
                    } else {
                        (value - self.clip_black) / (self.clip_white - self.clip_black)
                    };
                }
            }
        });
    }
}

/// Spill suppression: pulls the screen's dominant channel down towards the
/// balance-weighted average of the other two, never up, and never touches
/// the other channels.
pub struct KeyingDespillOperation {
    despill_factor: f32,
    color_balance: f32,
}

impl KeyingDespillOperation {
    pub fn new(despill_factor: f32, color_balance: f32) -> Self {
        Self {
            despill_factor,
            color_balance,
        }
    }
}

impl NodeOperation for KeyingDespillOperation {
    fn name(&self) -> &'static str {
        "KeyingDespill"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[PixelType::Color, PixelType::Color]
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
        let screen = inputs[1];
        output.fill_area(area, |x, y, out| {
            let pixel = image.elem(x, y);
            let screen_color = screen.elem(x, y);
            let primary = max_axis_v3(screen_color);
            let other_1 = (primary + 1) % 3;
            let other_2 = (primary + 2) % 3;
            let min_c = other_1.min(other_2);
            let max_c = other_1.max(other_2);

            let average = self.color_balance * pixel[min_c]
                + (1.0 - self.color_balance) * pixel[max_c];
            let amount = (pixel[primary] - average) * self.despill_factor;

            out.copy_from_slice(pixel);
            if amount > 0.0 {
                out[primary] = pixel[primary] - amount;
            }
        });
    }
}

/// Multiply color by a matte and write the matte into alpha; the final
/// compositing step of the keying pipeline.
pub struct MultiplyAlphaOperation;

impl MultiplyAlphaOperation {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MultiplyAlphaOperation {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeOperation for MultiplyAlphaOperation {
    fn name(&self) -> &'static str {
        "MultiplyAlpha"
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
        let matte = inputs[1];
        output.fill_area(area, |x, y, out| {
            let pixel = image.elem(x, y);
            let alpha = matte.elem(x, y)[0];
            out[0] = pixel[0] * alpha;
            out[1] = pixel[1] * alpha;
            out[2] = pixel[2] * alpha;
            out[3] = alpha;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN_SCREEN: [f32; 4] = [0.1, 0.8, 0.2, 1.0];

    fn solid(area: BufferArea, color: [f32; 4]) -> MemoryBuffer {
        let mut buf = MemoryBuffer::new(PixelType::Color, area);
        buf.fill_area(area, |_, _, out| out.copy_from_slice(&color));
        buf
    }

    fn key(image: &MemoryBuffer, screen: &MemoryBuffer, balance: f32) -> MemoryBuffer {
        let op = KeyingOperation::new(balance);
        let mut out = MemoryBuffer::new(PixelType::Value, image.area());
        op.update_memory_buffer_partial(&mut out, image.area(), &[image, screen]);
        out
    }

    #[test]
    fn test_pure_screen_color_is_background() {
        let area = BufferArea::from_size(4, 4);
        let screen = solid(area, GREEN_SCREEN);
        for balance in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let matte = key(&screen, &screen, balance);
            for (x, y) in area.pixels() {
                assert!(matte.value(x, y, 0).abs() < 1e-6, "balance {balance}");
            }
        }
    }

    #[test]
    fn test_different_primary_is_foreground() {
        let area = BufferArea::from_size(2, 2);
        let screen = solid(area, GREEN_SCREEN);
        let red = solid(area, [0.9, 0.1, 0.1, 1.0]);
        let matte = key(&red, &screen, 0.5);
        assert_eq!(matte.value(0, 0, 0), 1.0);
    }

    #[test]
    fn test_overexposed_pixel_is_foreground() {
        let area = BufferArea::from_size(2, 2);
        let screen = solid(area, GREEN_SCREEN);
        let glare = solid(area, [1.5, 1.6, 1.4, 1.0]);
        let matte = key(&glare, &screen, 0.5);
        assert_eq!(matte.value(0, 0, 0), 1.0);
    }

    #[test]
    fn test_partial_saturation_falls_off_linearly() {
        let area = BufferArea::from_size(2, 2);
        let screen = solid(area, GREEN_SCREEN);
        // Same primary, half the saturation: alpha strictly between 0 and 1.
        let weak = solid(area, [0.1, 0.45, 0.15, 1.0]);
        let matte = key(&weak, &screen, 0.5);
        let alpha = matte.value(0, 0, 0);
        assert!(alpha > 0.0 && alpha < 1.0, "alpha {alpha}");
    }

    #[test]
    fn test_keying_blur_axis_average() {
        let area = BufferArea::from_size(7, 1);
        let mut input = MemoryBuffer::new(PixelType::Value, area);
        input.write_elem(3, 0, &[1.0]);
        let op = KeyingBlurOperation::new(2, KeyingBlurAxis::X);
        let mut out = MemoryBuffer::new(PixelType::Value, area);
        op.update_memory_buffer_partial(&mut out, area, &[&input]);
        // Window is [x-1, x+1]: the impulse spreads over three pixels.
        assert!((out.value(2, 0, 0) - 1.0 / 3.0).abs() < 1e-6);
        assert!((out.value(3, 0, 0) - 1.0 / 3.0).abs() < 1e-6);
        assert!((out.value(4, 0, 0) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(out.value(0, 0, 0), 0.0);
    }

    #[test]
    fn test_clip_remaps_consistent_regions() {
        let area = BufferArea::from_size(8, 8);
        let mut input = MemoryBuffer::new(PixelType::Value, area);
        input.fill_area(area, |_, _, out| out[0] = 0.5);
        let op = KeyingClipOperation::new(2, 0.1, 0.2, 0.8, false);
        let mut out = MemoryBuffer::new(PixelType::Value, area);
        op.update_memory_buffer_partial(&mut out, area, &[&input]);
        // 0.5 remapped through [0.2, 0.8].
        assert!((out.value(4, 4, 0) - 0.5).abs() < 1e-6);

        let mut clip = MemoryBuffer::new(PixelType::Value, area);
        input.fill_area(area, |_, _, out| out[0] = 0.9);
        let op = KeyingClipOperation::new(2, 0.1, 0.2, 0.8, false);
        op.update_memory_buffer_partial(&mut clip, area, &[&input]);
        assert_eq!(clip.value(4, 4, 0), 1.0);
    }

    #[test]
    fn test_clip_edge_matte_flags_inconsistent_pixels() {
        let area = BufferArea::from_size(9, 9);
        let mut input = MemoryBuffer::new(PixelType::Value, area);
        // A hard edge through the middle.
        input.fill_area(area, |x, _, out| out[0] = if x < 4 { 0.0 } else { 1.0 });
        let op = KeyingClipOperation::new(3, 0.5, 0.0, 1.0, true);
        let mut out = MemoryBuffer::new(PixelType::Value, area);
        op.update_memory_buffer_partial(&mut out, area, &[&input]);
        // Pixels at the edge fail the 90 % consistency test; pixels deep in
        // either region pass it.
        assert_eq!(out.value(4, 4, 0), 1.0);
        assert_eq!(out.value(0, 4, 0), 0.0);
        assert_eq!(out.value(8, 4, 0), 0.0);
    }

    #[test]
    fn test_despill_reduces_primary_only() {
        let area = BufferArea::from_size(2, 2);
        let screen = solid(area, GREEN_SCREEN);
        let spilled = solid(area, [0.4, 0.7, 0.3, 1.0]);
        let op = KeyingDespillOperation::new(1.0, 0.5);
        let mut out = MemoryBuffer::new(PixelType::Color, area);
        op.update_memory_buffer_partial(&mut out, area, &[&spilled, &screen]);
        // Green pulled down, red/blue/alpha untouched.
        assert!(out.value(0, 0, 1) < 0.7);
        assert_eq!(out.value(0, 0, 0), 0.4);
        assert_eq!(out.value(0, 0, 2), 0.3);
        assert_eq!(out.value(0, 0, 3), 1.0);
    }

    #[test]
    fn test_despill_never_raises_primary() {
        let area = BufferArea::from_size(1, 1);
        let screen = solid(area, GREEN_SCREEN);
        // Green already below the other-channel average: no change.
        let clean = solid(area, [0.8, 0.2, 0.6, 1.0]);
        let op = KeyingDespillOperation::new(1.0, 0.5);
        let mut out = MemoryBuffer::new(PixelType::Color, area);
        op.update_memory_buffer_partial(&mut out, area, &[&clean, &screen]);
        assert_eq!(out.elem(0, 0), clean.elem(0, 0));
    }

    #[test]
    fn test_multiply_alpha() {
        let area = BufferArea::from_size(1, 1);
        let image = solid(area, [0.8, 0.6, 0.4, 1.0]);
        let mut matte = MemoryBuffer::new(PixelType::Value, area);
        matte.write_elem(0, 0, &[0.5]);
        let mut out = MemoryBuffer::new(PixelType::Color, area);
        MultiplyAlphaOperation::new().update_memory_buffer_partial(&mut out, area, &[&image, &matte]);
        assert_eq!(out.elem(0, 0), &[0.4, 0.3, 0.2, 0.5]);
    }
}
