//! Morphological dilate/erode over single-channel mattes.
//!
//! Three variants: true-circular distance scans, step (box) morphology via
//! the van Herk/Gil-Werman running extremum, and the signed-distance
//! threshold feather.

use rastermill_core::{BufferArea, MemoryBuffer, PixelType, Quality};
use rastermill_engine::{KernelCall, NodeOperation, OperationFlags};

// ---------------------------------------------------------------------------
// Distance-based dilate/erode
// ---------------------------------------------------------------------------

fn morph_distance(
    output: &mut MemoryBuffer,
    area: BufferArea,
    input: &MemoryBuffer,
    distance: f32,
    scope: i32,
    erode: bool,
) {
    let rect = input.area();
    let min_dist = distance * distance;
    output.fill_area(area, |x, y, out| {
        let mut value = if erode { 1.0f32 } else { 0.0f32 };
        let y_min = (y - scope).max(rect.y_min);
        let y_max = (y + scope + 1).min(rect.y_max);
        let x_min = (x - scope).max(rect.x_min);
        let x_max = (x + scope + 1).min(rect.x_max);
        for ny in y_min..y_max {
            let dy = (ny - y) as f32;
            for nx in x_min..x_max {
                let dx = (nx - x) as f32;
                // True circular distance, not the square scan window.
                if dx * dx + dy * dy <= min_dist {
                    let v = input.value(nx, ny, 0);
                    value = if erode { value.min(v) } else { value.max(v) };
                }
            }
        }
        out[0] = value;
    });
}

macro_rules! distance_morph_impl {
    ($name:ident, $op_name:literal, $kernel:literal, $erode:expr) => {
        pub struct $name {
            distance: f32,
            scope: i32,
        }

        impl $name {
            pub fn new(distance: f32) -> Self {
                Self {
                    distance,
                    scope: 3,
                }
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
                    open_cl: true,
                    ..Default::default()
                }
            }

            fn init_data(&mut self, _canvas: BufferArea, _quality: Quality) {
                self.scope = (self.distance.ceil() as i32).max(3);
            }

            fn area_of_interest(&self, _input_index: usize, output_area: BufferArea) -> BufferArea {
                output_area.expand(self.scope)
            }

            fn update_memory_buffer_partial(
                &self,
                output: &mut MemoryBuffer,
                area: BufferArea,
                inputs: &[&MemoryBuffer],
            ) {
                morph_distance(output, area, inputs[0], self.distance, self.scope, $erode);
            }

            fn kernel_call(&self, area: BufferArea, inputs: &[&MemoryBuffer]) -> Option<KernelCall> {
                Some(
                    KernelCall::new($kernel)
                        .read_image(0)
                        .output_buffer()
                        .int2(area.x_min, area.y_min)
                        .float(self.distance)
                        .int(self.scope)
                        .int2(inputs[0].area().width(), inputs[0].area().height()),
                )
            }
        }
    };
}

distance_morph_impl!(DilateDistanceOperation, "DilateDistance", "dilate_kernel", false);
distance_morph_impl!(ErodeDistanceOperation, "ErodeDistance", "erode_kernel", true);

// ---------------------------------------------------------------------------
// Step-based dilate/erode (van Herk/Gil-Werman)
// ---------------------------------------------------------------------------

/// Running extremum over a padded line.
///
/// `padded` holds `m + 2 * half` samples; the result has `m` entries where
/// `result[j]` is the fold of the window `padded[j ..= j + 2 * half]`. Block
/// prefix/suffix scans make this O(1) amortized per sample regardless of the
/// window size; the naive per-pixel rescan would make large iteration counts
/// unusable.
fn sliding_extremum(padded: &[f32], half: usize, erode: bool) -> Vec<f32> {
    let window = 2 * half + 1;
    let n = padded.len();
    let m = n - 2 * half;
    let fold = |a: f32, b: f32| if erode { a.min(b) } else { a.max(b) };

    let mut prefix = vec![0.0f32; n];
    for i in 0..n {
        prefix[i] = if i % window == 0 {
            padded[i]
        } else {
            fold(prefix[i - 1], padded[i])
        };
    }
    let mut suffix = vec![0.0f32; n];
    for i in (0..n).rev() {
        suffix[i] = if i == n - 1 || (i + 1) % window == 0 {
            padded[i]
        } else {
            fold(suffix[i + 1], padded[i])
        };
    }
    (0..m).map(|j| fold(suffix[j], prefix[j + 2 * half])).collect()
}

fn morph_step(
    output: &mut MemoryBuffer,
    area: BufferArea,
    input: &MemoryBuffer,
    iterations: i32,
    erode: bool,
) {
    let half = iterations.max(0);
    if half == 0 {
        output.fill_area(area, |x, y, out| out.copy_from_slice(input.elem(x, y)));
        return;
    }
    let rect = input.area();
    let limit = if erode { f32::INFINITY } else { f32::NEG_INFINITY };
    let pad = half as usize;

    // Horizontal pass into a vertically extended scratch buffer so the
    // vertical pass has valid rows above and below the output area.
    let temp_area = BufferArea::new(
        area.x_min,
        (area.y_min - half).max(rect.y_min),
        area.x_max,
        (area.y_max + half).min(rect.y_max),
    );
    let mut temp = MemoryBuffer::new(PixelType::Value, temp_area);
    let mut padded = vec![limit; area.width() as usize + 2 * pad];
    for y in temp_area.y_min..temp_area.y_max {
        for (i, slot) in padded.iter_mut().enumerate() {
            let x = area.x_min - half + i as i32;
            *slot = if rect.contains(x, y) {
                input.value(x, y, 0)
            } else {
                limit
            };
        }
        for (i, v) in sliding_extremum(&padded, pad, erode).into_iter().enumerate() {
            temp.write_elem(area.x_min + i as i32, y, &[v]);
        }
    }

    // Vertical pass over the scratch columns.
    let mut column = vec![limit; area.height() as usize + 2 * pad];
    for x in area.x_min..area.x_max {
        for (i, slot) in column.iter_mut().enumerate() {
            let y = area.y_min - half + i as i32;
            *slot = if temp_area.contains(x, y) {
                temp.value(x, y, 0)
            } else {
                limit
            };
        }
        for (i, v) in sliding_extremum(&column, pad, erode).into_iter().enumerate() {
            output.write_elem(x, area.y_min + i as i32, &[v]);
        }
    }
}

macro_rules! step_morph_impl {
    ($name:ident, $op_name:literal, $erode:expr) => {
        pub struct $name {
            iterations: i32,
        }

        impl $name {
            pub fn new(iterations: i32) -> Self {
                Self { iterations }
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

            fn area_of_interest(&self, _input_index: usize, output_area: BufferArea) -> BufferArea {
                output_area.expand(self.iterations.max(0))
            }

            fn update_memory_buffer_partial(
                &self,
                output: &mut MemoryBuffer,
                area: BufferArea,
                inputs: &[&MemoryBuffer],
            ) {
                morph_step(output, area, inputs[0], self.iterations, $erode);
            }
        }
    };
}

step_morph_impl!(DilateStepOperation, "DilateStep", false);
step_morph_impl!(ErodeStepOperation, "ErodeStep", true);

// ---------------------------------------------------------------------------
// Threshold dilate/erode (signed-distance matte feather)
// ---------------------------------------------------------------------------

/// Feathered matte grow/shrink: thresholds the matte, measures the signed
/// Euclidean distance to the nearest opposite-side pixel, then remaps that
/// distance through `distance`/`inset` into a smooth [0, 1] edge.
pub struct DilateErodeThresholdOperation {
    distance: f32,
    inset: f32,
    switch_point: f32,
    scope: i32,
}

impl DilateErodeThresholdOperation {
    pub fn new(distance: f32, inset: f32, switch_point: f32) -> Self {
        Self {
            distance,
            inset,
            switch_point,
            scope: 3,
        }
    }
}

impl NodeOperation for DilateErodeThresholdOperation {
    fn name(&self) -> &'static str {
        "DilateErodeThreshold"
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

    fn init_data(&mut self, _canvas: BufferArea, _quality: Quality) {
        let scope = if self.distance < 0.0 {
            -self.distance + self.inset
        } else if self.inset * 2.0 > self.distance {
            (self.inset * 2.0 - self.distance).max(self.distance)
        } else {
            self.distance
        };
        self.scope = (scope.ceil() as i32).max(3);
    }

    fn area_of_interest(&self, _input_index: usize, output_area: BufferArea) -> BufferArea {
        output_area.expand(self.scope)
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) {
        let input = inputs[0];
        let rect = input.area();
        let sw = self.switch_point;
        let scope = self.scope;
        let rd = (scope * scope) as f32;
        output.fill_area(area, |x, y, out| {
            let y_min = (y - scope).max(rect.y_min);
            let y_max = (y + scope + 1).min(rect.y_max);
            let x_min = (x - scope).max(rect.x_min);
            let x_max = (x + scope + 1).min(rect.x_max);

            let inside = input.value(x, y, 0) > sw;
            let mut min_dist = rd * 2.0;
            for ny in y_min..y_max {
                let dy = (ny - y) as f32;
                for nx in x_min..x_max {
                    let other = input.value(nx, ny, 0) > sw;
                    if other != inside {
                        let dx = (nx - x) as f32;
                        min_dist = min_dist.min(dx * dx + dy * dy);
                    }
                }
            }
            // Negative when inside the matte.
            let pixel_value = if inside {
                -min_dist.sqrt()
            } else {
                min_dist.sqrt()
            };

            out[0] = if self.distance > 0.0 {
                let delta = self.distance - pixel_value;
                if delta >= 0.0 {
                    if delta >= self.inset {
                        1.0
                    } else {
                        delta / self.inset
                    }
                } else {
                    0.0
                }
            } else {
                let delta = -self.distance + pixel_value;
                if delta < 0.0 {
                    if delta < -self.inset {
                        1.0
                    } else {
                        -delta / self.inset
                    }
                } else {
                    0.0
                }
            };
        });
    }
}
