//! The operation contract every node in the execution graph satisfies.

use crate::device::KernelCall;
use rastermill_core::{BufferArea, MemoryBuffer, PixelType, Quality};

/// Capability flags an operation declares to the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationFlags {
    /// Reads a neighborhood rather than a single input pixel; the scheduler
    /// must honor the declared area of interest.
    pub complex: bool,
    /// Has an accelerator kernel ([`NodeOperation::kernel_call`]).
    pub open_cl: bool,
    /// May fold to a single constant element.
    pub can_be_constant: bool,
}

/// One unit of the dataflow graph.
///
/// An operation satisfies two contracts before any pixel is produced, both
/// pure functions of configuration and upstream canvases:
///
/// 1. *Canvas determination*: the output's coordinate domain.
/// 2. *Area-of-interest declaration*: which input rectangle each output
///    rectangle depends on.
///
/// Pixel filling itself happens through a single buffer-region method; the
/// scheduler guarantees the declared input areas are materialized before it
/// runs. Derived state (kernel tables, scopes) is built in the two-phase
/// `init_data`/`init_execution`, which the engine runs single-threaded to
/// completion before any parallel region work is scheduled.
pub trait NodeOperation: Send + Sync {
    /// Display name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Pixel types of the input sockets, in order.
    fn input_sockets(&self) -> &[PixelType];

    /// Pixel type of the output socket.
    fn output_type(&self) -> PixelType;

    fn flags(&self) -> OperationFlags {
        OperationFlags::default()
    }

    /// Determine the output canvas from the upstream canvases.
    ///
    /// Default: the canvas of the designated main input, meaning the first
    /// input with a non-empty canvas, so constant inputs (which have no
    /// intrinsic extent) never shrink a chain. Source operations fall back
    /// to the preferred area.
    fn determine_canvas(&self, preferred: BufferArea, inputs: &[BufferArea]) -> BufferArea {
        inputs
            .iter()
            .copied()
            .find(|canvas| !canvas.is_empty())
            .unwrap_or(preferred)
    }

    /// First init phase: derive sizes/radii from the determined canvas and
    /// the run quality.
    fn init_data(&mut self, _canvas: BufferArea, _quality: Quality) {}

    /// Second init phase: allocate derived lookup tables. Paired with
    /// [`Self::deinit_execution`].
    fn init_execution(&mut self) {}

    /// Release state built by [`Self::init_execution`].
    fn deinit_execution(&mut self) {}

    /// Map one output rectangle to the input rectangle it depends on, for
    /// the given input socket. Exact and side-effect free; the result is
    /// clamped to the upstream canvas by the caller.
    fn area_of_interest(&self, _input_index: usize, output_area: BufferArea) -> BufferArea {
        output_area
    }

    /// Fill `area` of `output` from the already materialized `inputs`.
    ///
    /// Inputs arrive in socket order and each covers at least the clamped
    /// area of interest declared for `area`.
    fn update_memory_buffer_partial(
        &self,
        output: &mut MemoryBuffer,
        area: BufferArea,
        inputs: &[&MemoryBuffer],
    );

    /// The constant element this operation folds to, when
    /// `flags().can_be_constant` and the configuration is in fact constant.
    fn constant_elem(&self) -> Option<Vec<f32>> {
        None
    }

    /// Encode the accelerator kernel call for one output chunk.
    ///
    /// Kernel name and argument order are a fixed wire contract with the
    /// external kernel sources; only operations with `flags().open_cl`
    /// return one.
    fn kernel_call(&self, _area: BufferArea, _inputs: &[&MemoryBuffer]) -> Option<KernelCall> {
        None
    }
}
