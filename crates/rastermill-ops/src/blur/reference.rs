//! Spatially varying gaussian blur driven by a reference size map.
//!
//! A weight table is precomputed for every possible integer radius up to the
//! configured maximum; each pixel then selects the table matching its local
//! radius. This keeps per-pixel cost at a table lookup instead of a table
//! build.

use super::tables::make_gausstab;
use super::BlurParams;
use rastermill_core::{BufferArea, MemoryBuffer, PixelType, Quality};
use rastermill_engine::{NodeOperation, OperationFlags};

pub struct GaussianBlurReferenceOperation {
    params: BlurParams,
    filter_size_x: i32,
    filter_size_y: i32,
    rad_x: f32,
    rad_y: f32,
    main_tabs: Vec<Vec<f32>>,
}

impl GaussianBlurReferenceOperation {
    pub fn new(params: BlurParams) -> Self {
        Self {
            params,
            filter_size_x: 1,
            filter_size_y: 1,
            rad_x: 1.0,
            rad_y: 1.0,
            main_tabs: Vec::new(),
        }
    }
}

impl NodeOperation for GaussianBlurReferenceOperation {
    fn name(&self) -> &'static str {
        "GaussianBlurReference"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[PixelType::Color, PixelType::Value]
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

    fn init_data(&mut self, canvas: BufferArea, _quality: Quality) {
        let (size_x, size_y) = self.params.radii(canvas, 1.0);
        // Radii are capped at half the image per axis and floored at one.
        let half_w = (canvas.width() / 2).max(1);
        let half_h = (canvas.height() / 2).max(1);
        self.filter_size_x = (size_x as i32).clamp(1, half_w);
        self.filter_size_y = (size_y as i32).clamp(1, half_h);
        self.rad_x = self.filter_size_x as f32;
        self.rad_y = self.filter_size_y as f32;
    }

    fn init_execution(&mut self) {
        let n = self.filter_size_x.max(self.filter_size_y);
        self.main_tabs = (0..n)
            .map(|i| make_gausstab(self.params.filter_type, (i + 1) as f32, i + 1))
            .collect();
    }

    fn deinit_execution(&mut self) {
        self.main_tabs = Vec::new();
    }

    fn area_of_interest(&self, input_index: usize, output_area: BufferArea) -> BufferArea {
        match input_index {
            0 => output_area.expand_axis(
                self.params.size_x as i32 + 2,
                self.params.size_y as i32 + 2,
            ),
            _ => output_area,
        }
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) {
        let image = inputs[0];
        let size_map = inputs[1];
        let rect = image.area();
        output.fill_area(area, |x, y, out| {
            let ref_size = size_map.elem(x, y)[0];
            let ref_radx = ((ref_size * self.rad_x) as i32).clamp(1, self.filter_size_x);
            let ref_rady = ((ref_size * self.rad_y) as i32).clamp(1, self.filter_size_y);
            if ref_radx == 1 && ref_rady == 1 {
                out.copy_from_slice(image.elem(x, y));
                return;
            }

            let tab_x = &self.main_tabs[(ref_radx - 1) as usize];
            let tab_y = &self.main_tabs[(ref_rady - 1) as usize];
            let y_min = (y - ref_rady).max(rect.y_min);
            let y_max = (y + ref_rady + 1).min(rect.y_max);
            let x_min = (x - ref_radx).max(rect.x_min);
            let x_max = (x + ref_radx + 1).min(rect.x_max);

            let mut acc = [0.0f32; 4];
            let mut weight = 0.0f32;
            for ny in y_min..y_max {
                let wy = tab_y[(ny - y + ref_rady) as usize];
                for nx in x_min..x_max {
                    let w = wy * tab_x[(nx - x + ref_radx) as usize];
                    let elem = image.elem(nx, ny);
                    for c in 0..4 {
                        acc[c] += elem[c] * w;
                    }
                    weight += w;
                }
            }
            for c in 0..4 {
                out[c] = acc[c] / weight;
            }
        });
    }
}
