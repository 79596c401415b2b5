//! Engine integration: demanded-area propagation through real kernels,
//! accelerator dispatch encoding, and mixed-type graphs.

use crate::init_tracing;
use rastermill_core::{BufferArea, MemoryBuffer, PixelType};
use rastermill_engine::{
    BufferSourceOperation, CancelToken, ClDevice, DispatchError, Executor, ExecutorConfig,
    KernelArg, KernelCall, KernelDispatcher, OperationGraph, SetValueOperation,
};
use rastermill_ops::{
    BlurParams, GammaOperation, GaussianXBlurOperation, GaussianYBlurOperation, MathFunction,
    MathOperation,
};
use std::sync::{Arc, Mutex};

fn color_ramp(area: BufferArea) -> Arc<MemoryBuffer> {
    let mut buf = MemoryBuffer::new(PixelType::Color, area);
    buf.fill_area(area, |x, y, out| {
        out.copy_from_slice(&[
            x as f32 / 31.0,
            y as f32 / 31.0,
            0.25,
            1.0,
        ]);
    });
    Arc::new(buf)
}

/// A blur chain's demanded areas expand upstream by each pass's declared
/// radius; the source only materializes what the chain can actually read.
#[test]
fn demanded_area_propagates_through_blur_chain() {
    init_tracing();
    let area = BufferArea::from_size(64, 64);
    let mut graph = OperationGraph::new();
    let src = graph.add_operation(Box::new(BufferSourceOperation::new(color_ramp(area))));
    let bx = graph.add_operation(Box::new(GaussianXBlurOperation::new(
        BlurParams {
            size_x: 2.0,
            ..Default::default()
        },
        1.0,
    )));
    let by = graph.add_operation(Box::new(GaussianYBlurOperation::new(
        BlurParams {
            size_y: 2.0,
            ..Default::default()
        },
        1.0,
    )));
    graph.connect(src, bx, 0).unwrap();
    graph.connect(bx, by, 0).unwrap();

    let requested = BufferArea::new(20, 20, 30, 30);
    let executor = Executor::new(ExecutorConfig::default());
    let results = executor
        .execute(&mut graph, &[(by, requested)], &CancelToken::new())
        .unwrap();

    assert_eq!(results[&by].area(), requested);
    // Y pass demanded +-3 rows; X pass then demanded +-3 columns of those.
    assert_eq!(results[&bx].area(), BufferArea::new(20, 17, 30, 33));
    assert_eq!(results[&src].area(), BufferArea::new(17, 17, 33, 33));
}

#[derive(Default)]
struct RecordingDispatcher {
    calls: Mutex<Vec<KernelCall>>,
}

impl KernelDispatcher for RecordingDispatcher {
    fn dispatch(
        &self,
        call: &KernelCall,
        inputs: &[&MemoryBuffer],
        output: &mut MemoryBuffer,
    ) -> Result<(), DispatchError> {
        self.calls.lock().unwrap().push(call.clone());
        // Stand-in device: copy the input through so downstream consumers
        // read deterministic data after the synchronous "readback".
        let area = output.area();
        output.fill_area(area, |x, y, out| {
            out.copy_from_slice(inputs[0].elem(x, y));
        });
        Ok(())
    }
}

/// Operations flagged for the accelerator encode their kernel call with the
/// wire-contract name and argument order.
#[test]
fn cl_device_receives_encoded_kernel_calls() {
    init_tracing();
    let area = BufferArea::from_size(16, 16);
    let dispatcher = Arc::new(RecordingDispatcher::default());

    struct Forward(Arc<RecordingDispatcher>);
    impl KernelDispatcher for Forward {
        fn dispatch(
            &self,
            call: &KernelCall,
            inputs: &[&MemoryBuffer],
            output: &mut MemoryBuffer,
        ) -> Result<(), DispatchError> {
            self.0.dispatch(call, inputs, output)
        }
    }

    let mut graph = OperationGraph::new();
    let src = graph.add_operation(Box::new(BufferSourceOperation::new(color_ramp(area))));
    let blur = graph.add_operation(Box::new(GaussianXBlurOperation::new(
        BlurParams {
            size_x: 2.0,
            ..Default::default()
        },
        1.0,
    )));
    graph.connect(src, blur, 0).unwrap();

    let executor = Executor::new(ExecutorConfig::default())
        .with_cl_device(ClDevice::new(Box::new(Forward(dispatcher.clone()))));
    executor
        .execute(&mut graph, &[(blur, area)], &CancelToken::new())
        .unwrap();

    let calls = dispatcher.calls.lock().unwrap();
    assert!(!calls.is_empty());
    let call = &calls[0];
    assert_eq!(call.name(), "gaussian_xblur_operation_kernel");
    // Fixed positional convention: image, output, offset, then the
    // operation-specific arguments, then the canvas size.
    assert_eq!(call.args()[0], KernelArg::ReadImage(0));
    assert_eq!(call.args()[1], KernelArg::OutputBuffer);
    assert!(matches!(call.args()[2], KernelArg::Int2(_, _)));
    assert_eq!(call.args()[3], KernelArg::Int(2));
    assert!(matches!(call.args()[4], KernelArg::FloatTable(ref t) if t.len() == 5));
    assert!(matches!(call.args()[5], KernelArg::Int2(_, _)));
}

/// A failing accelerator logs and keeps going; the run still completes.
#[test]
fn failing_dispatcher_does_not_abort_run() {
    init_tracing();
    struct Failing;
    impl KernelDispatcher for Failing {
        fn dispatch(
            &self,
            _call: &KernelCall,
            _inputs: &[&MemoryBuffer],
            _output: &mut MemoryBuffer,
        ) -> Result<(), DispatchError> {
            Err(DispatchError {
                code: -5,
                message: "out of resources".into(),
            })
        }
    }

    let area = BufferArea::from_size(8, 8);
    let mut graph = OperationGraph::new();
    let src = graph.add_operation(Box::new(BufferSourceOperation::new(color_ramp(area))));
    let blur = graph.add_operation(Box::new(GaussianXBlurOperation::new(
        BlurParams {
            size_x: 1.0,
            ..Default::default()
        },
        1.0,
    )));
    graph.connect(src, blur, 0).unwrap();

    let executor = Executor::new(ExecutorConfig::default())
        .with_cl_device(ClDevice::new(Box::new(Failing)));
    let results = executor
        .execute(&mut graph, &[(blur, area)], &CancelToken::new())
        .unwrap();
    // The buffer exists; its content is whatever the device produced.
    assert_eq!(results[&blur].area(), area);
}

/// Mixed value/color graph: a math chain drives a gamma exponent.
#[test]
fn mixed_type_graph_executes() {
    init_tracing();
    let area = BufferArea::from_size(8, 8);
    let mut graph = OperationGraph::new();
    let image = graph.add_operation(Box::new(BufferSourceOperation::new(color_ramp(area))));
    let half = graph.add_operation(Box::new(SetValueOperation::new(0.5)));
    let four = graph.add_operation(Box::new(SetValueOperation::new(4.0)));
    let exponent = graph.add_operation(Box::new(MathOperation::new(MathFunction::Multiply)));
    graph.connect(half, exponent, 0).unwrap();
    graph.connect(four, exponent, 1).unwrap();
    let gamma = graph.add_operation(Box::new(GammaOperation::new()));
    graph.connect(image, gamma, 0).unwrap();
    graph.connect(exponent, gamma, 1).unwrap();

    let executor = Executor::new(ExecutorConfig {
        preferred_area: area,
        ..Default::default()
    });
    let results = executor
        .execute(&mut graph, &[(gamma, area)], &CancelToken::new())
        .unwrap();
    let out = &results[&gamma];
    // gamma = 0.5 * 4 = 2: channel values square.
    let x = 16;
    let expected = (16.0f32 / 31.0).powf(2.0);
    assert!((out.value(x, 3, 0) - expected).abs() < 1e-5);
    assert_eq!(out.value(x, 3, 3), 1.0);
}
