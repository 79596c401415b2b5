//! Directional/zoom/spin blur via iterated affine resampling.
//!
//! Instead of integrating along the motion path directly, the accumulated
//! transform is doubled every iteration, so `2^n` samples cost `2^n` reads
//! but cover the path with logarithmic parameter growth per step.

use glam::Vec2;
use rastermill_core::{BufferArea, MemoryBuffer, PixelType, Quality};
use rastermill_engine::{NodeOperation, OperationFlags};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionalBlurParams {
    /// Log2 of the sample count: `2^iterations` samples are accumulated.
    pub iterations: i32,
    /// Blur direction in radians.
    pub angle: f32,
    /// Translation distance as a fraction of the canvas diagonal.
    pub distance: f32,
    /// Per-sample scale accumulation.
    pub zoom: f32,
    /// Per-sample rotation accumulation in radians.
    pub spin: f32,
    /// Rotation/zoom center in normalized canvas coordinates.
    pub center_x: f32,
    pub center_y: f32,
}

impl Default for DirectionalBlurParams {
    fn default() -> Self {
        Self {
            iterations: 1,
            angle: 0.0,
            distance: 0.0,
            zoom: 0.0,
            spin: 0.0,
            center_x: 0.5,
            center_y: 0.5,
        }
    }
}

pub struct DirectionalBlurOperation {
    params: DirectionalBlurParams,
    tx: f32,
    ty: f32,
    sc: f32,
    rot: f32,
    center_x_pix: f32,
    center_y_pix: f32,
    canvas: BufferArea,
}

impl DirectionalBlurOperation {
    pub fn new(params: DirectionalBlurParams) -> Self {
        Self {
            params,
            tx: 0.0,
            ty: 0.0,
            sc: 0.0,
            rot: 0.0,
            center_x_pix: 0.0,
            center_y_pix: 0.0,
            canvas: BufferArea::default(),
        }
    }
}

impl NodeOperation for DirectionalBlurOperation {
    fn name(&self) -> &'static str {
        "DirectionalBlur"
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
            ..Default::default()
        }
    }

    fn init_data(&mut self, canvas: BufferArea, _quality: Quality) {
        let width = canvas.width() as f32;
        let height = canvas.height() as f32;
        let itsc = 1.0 / 2.0f32.powi(self.params.iterations);
        let d = self.params.distance * (width * width + height * height).sqrt();

        self.center_x_pix = canvas.x_min as f32 + self.params.center_x * width;
        self.center_y_pix = canvas.y_min as f32 + self.params.center_y * height;
        self.tx = itsc * d * self.params.angle.cos();
        self.ty = -itsc * d * self.params.angle.sin();
        self.sc = itsc * self.params.zoom;
        self.rot = itsc * self.params.spin;
        self.canvas = canvas;
    }

    /// Every output pixel may sample anywhere along its transform orbit:
    /// the dependency is the whole input canvas, not a local window.
    fn area_of_interest(&self, _input_index: usize, _output_area: BufferArea) -> BufferArea {
        self.canvas
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) {
        let input = inputs[0];
        let iterations = 2i32.pow(self.params.iterations.max(0) as u32);
        let cx = self.center_x_pix;
        let cy = self.center_y_pix;
        output.fill_area(area, |x, y, out| {
            let mut accum = [0.0f32; 4];
            input.read_bilinear(x as f32, y as f32, &mut accum);

            let mut ltx = self.tx;
            let mut lty = self.ty;
            let mut lsc = self.sc;
            let mut lrot = self.rot;
            let mut color = [0.0f32; 4];
            for _ in 0..iterations {
                let isc = 1.0 / (1.0 + lsc);
                let u = isc * (x as f32 - cx) + ltx;
                let v = isc * (y as f32 - cy) + lty;
                let p = Vec2::from_angle(-lrot).rotate(Vec2::new(u, v));
                input.read_bilinear(p.x + cx, p.y + cy, &mut color);
                for c in 0..4 {
                    accum[c] += color[c];
                }

                // Double the transform for the next sample.
                ltx += self.tx;
                lty += self.ty;
                lrot += self.rot;
                lsc += self.sc;
            }
            let inv = 1.0 / (iterations + 1) as f32;
            for c in 0..4 {
                out[c] = accum[c] * inv;
            }
        });
    }
}
