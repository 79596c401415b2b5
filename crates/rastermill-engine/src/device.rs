//! Device dispatch: CPU pixel loops or an OpenCL-style accelerator queue.

use crate::operation::NodeOperation;
use rastermill_core::{BufferArea, MemoryBuffer};
use tracing::error;

/// A failed accelerator call: numeric error code plus readable message.
#[derive(Debug, Clone)]
pub struct DispatchError {
    pub code: i32,
    pub message: String,
}

/// One positional kernel argument.
///
/// The argument order of a [`KernelCall`] is the wire contract with the
/// external kernel sources; slots are bound by position, never by name.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelArg {
    /// Input socket bound as a 2D image (texture sampling path).
    ReadImage(usize),
    /// Input socket bound as a raw float buffer.
    ReadBuffer(usize),
    /// The output chunk buffer.
    OutputBuffer,
    Int(i32),
    Int2(i32, i32),
    Float(f32),
    /// A host-computed table (e.g. convolution weights) uploaded as a buffer.
    FloatTable(Vec<f32>),
}

/// An ordered kernel invocation: name plus positional argument bindings.
#[derive(Debug, Clone)]
pub struct KernelCall {
    name: &'static str,
    args: Vec<KernelArg>,
}

impl KernelCall {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            args: Vec::new(),
        }
    }

    pub fn read_image(mut self, input_index: usize) -> Self {
        self.args.push(KernelArg::ReadImage(input_index));
        self
    }

    pub fn read_buffer(mut self, input_index: usize) -> Self {
        self.args.push(KernelArg::ReadBuffer(input_index));
        self
    }

    pub fn output_buffer(mut self) -> Self {
        self.args.push(KernelArg::OutputBuffer);
        self
    }

    pub fn int(mut self, v: i32) -> Self {
        self.args.push(KernelArg::Int(v));
        self
    }

    pub fn int2(mut self, x: i32, y: i32) -> Self {
        self.args.push(KernelArg::Int2(x, y));
        self
    }

    pub fn float(mut self, v: f32) -> Self {
        self.args.push(KernelArg::Float(v));
        self
    }

    pub fn float_table(mut self, table: Vec<f32>) -> Self {
        self.args.push(KernelArg::FloatTable(table));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn args(&self) -> &[KernelArg] {
        &self.args
    }
}

/// The external accelerator backend.
///
/// Binds the call's arguments in order, enqueues the kernel over the chunk's
/// dimensions and synchronously reads the result back into `output` before
/// returning. Kernel compilation and context management live outside this
/// crate.
pub trait KernelDispatcher: Send + Sync {
    fn dispatch(
        &self,
        call: &KernelCall,
        inputs: &[&MemoryBuffer],
        output: &mut MemoryBuffer,
    ) -> std::result::Result<(), DispatchError>;
}

/// Executes one work package into a freshly allocated chunk buffer.
pub trait Device: Send + Sync {
    fn execute(
        &self,
        op: &dyn NodeOperation,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) -> MemoryBuffer;
}

/// The CPU path: drive the operation's pixel loop directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuDevice;

impl Device for CpuDevice {
    fn execute(
        &self,
        op: &dyn NodeOperation,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) -> MemoryBuffer {
        let mut output = MemoryBuffer::new(op.output_type(), area);
        op.update_memory_buffer_partial(&mut output, area, inputs);
        output
    }
}

/// The accelerator path: encode a kernel call and hand it to the dispatcher.
///
/// A failed dispatch is logged and execution continues with whatever the
/// device produced; the CPU/accelerator choice is made before dispatch, not
/// adaptively. Operations without a kernel fall back to their pixel loop at
/// package-assignment time, never mid-chunk.
pub struct ClDevice {
    dispatcher: Box<dyn KernelDispatcher>,
}

impl ClDevice {
    pub fn new(dispatcher: Box<dyn KernelDispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl Device for ClDevice {
    fn execute(
        &self,
        op: &dyn NodeOperation,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    ) -> MemoryBuffer {
        let mut output = MemoryBuffer::new(op.output_type(), area);
        match op.kernel_call(area, inputs) {
            Some(call) => {
                if let Err(e) = self.dispatcher.dispatch(&call, inputs, &mut output) {
                    error!(
                        kernel = call.name(),
                        code = e.code,
                        message = %e.message,
                        "kernel dispatch failed"
                    );
                }
            }
            None => op.update_memory_buffer_partial(&mut output, area, inputs),
        }
        output
    }
}
