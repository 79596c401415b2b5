//! Buffer materialization: the proxy that collects chunk results, plus the
//! source operations that inject existing buffers and constants into a graph.

use crate::operation::{NodeOperation, OperationFlags};
use parking_lot::Mutex;
use rastermill_core::{BufferArea, MemoryBuffer, PixelType, SharedMemoryBuffer};
use std::sync::Arc;

/// Owns an operation's output buffer while its chunks are being produced.
///
/// Chunk results (CPU or read-back accelerator buffers) merge into the
/// canvas buffer behind a mutex; `freeze` ends the write phase and hands the
/// buffer to consumers as an `Arc`, after which all reads are lock-free.
pub struct MemoryProxy {
    inner: Mutex<MemoryBuffer>,
}

impl MemoryProxy {
    /// Allocate a zeroed buffer covering `area`.
    pub fn new(pixel_type: PixelType, area: BufferArea) -> Self {
        Self {
            inner: Mutex::new(MemoryBuffer::new(pixel_type, area)),
        }
    }

    /// Wrap an already-complete buffer (constant folding path).
    pub fn from_buffer(buffer: MemoryBuffer) -> Self {
        Self {
            inner: Mutex::new(buffer),
        }
    }

    /// Merge one completed chunk into the canvas buffer.
    pub fn merge(&self, chunk: &MemoryBuffer) {
        self.inner.lock().copy_region_from(chunk, chunk.area());
    }

    /// End the write phase.
    pub fn freeze(self) -> SharedMemoryBuffer {
        Arc::new(self.inner.into_inner())
    }
}

/// Source operation exposing an existing buffer to the graph.
///
/// The canvas is the buffer's own extent; demanded sub-areas are copied out
/// so downstream consumers keep the single-writer discipline.
pub struct BufferSourceOperation {
    buffer: SharedMemoryBuffer,
}

impl BufferSourceOperation {
    pub fn new(buffer: SharedMemoryBuffer) -> Self {
        Self { buffer }
    }
}

impl NodeOperation for BufferSourceOperation {
    fn name(&self) -> &'static str {
        "BufferSource"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[]
    }

    fn output_type(&self) -> PixelType {
        self.buffer.pixel_type()
    }

    fn determine_canvas(&self, _preferred: BufferArea, _inputs: &[BufferArea]) -> BufferArea {
        self.buffer.area()
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        _inputs: &[&MemoryBuffer],
    ) {
        output.fill_area(area, |x, y, out| {
            out.copy_from_slice(self.buffer.elem(x, y));
        });
    }
}

/// Constant single-channel source.
pub struct SetValueOperation {
    value: f32,
}

impl SetValueOperation {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl NodeOperation for SetValueOperation {
    fn name(&self) -> &'static str {
        "SetValue"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[]
    }

    fn output_type(&self) -> PixelType {
        PixelType::Value
    }

    fn flags(&self) -> OperationFlags {
        OperationFlags {
            can_be_constant: true,
            ..Default::default()
        }
    }

    fn constant_elem(&self) -> Option<Vec<f32>> {
        Some(vec![self.value])
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        _inputs: &[&MemoryBuffer],
    ) {
        output.fill_area(area, |_, _, out| out[0] = self.value);
    }
}

/// Constant RGBA source.
pub struct SetColorOperation {
    color: [f32; 4],
}

impl SetColorOperation {
    pub fn new(color: [f32; 4]) -> Self {
        Self { color }
    }
}

impl NodeOperation for SetColorOperation {
    fn name(&self) -> &'static str {
        "SetColor"
    }

    fn input_sockets(&self) -> &[PixelType] {
        &[]
    }

    fn output_type(&self) -> PixelType {
        PixelType::Color
    }

    fn flags(&self) -> OperationFlags {
        OperationFlags {
            can_be_constant: true,
            ..Default::default()
        }
    }

    fn constant_elem(&self) -> Option<Vec<f32>> {
        Some(self.color.to_vec())
    }

    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        _inputs: &[&MemoryBuffer],
    ) {
        output.fill_area(area, |_, _, out| out.copy_from_slice(&self.color));
    }
}
