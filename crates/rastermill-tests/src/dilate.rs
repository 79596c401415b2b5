//! Dilate/erode integration: duality, step-vs-Chebyshev equivalence, and
//! chunk-boundary correctness of the separable running extremum.

use rastermill_core::{BufferArea, MemoryBuffer, PixelType};
use rastermill_engine::{
    BufferSourceOperation, CancelToken, Executor, ExecutorConfig, OperationGraph,
};
use rastermill_ops::{
    DilateErodeThresholdOperation, DilateStepOperation, ErodeStepOperation,
};
use std::sync::Arc;

fn noise_matte(area: BufferArea) -> MemoryBuffer {
    let mut buf = MemoryBuffer::new(PixelType::Value, area);
    buf.fill_area(area, |x, y, out| {
        out[0] = (((x * 31 + y * 17 + 7) % 13) as f32) / 12.0;
    });
    buf
}

fn run_value_op(
    op: Box<dyn rastermill_engine::NodeOperation>,
    input: Arc<MemoryBuffer>,
    chunk_size: i32,
) -> Arc<MemoryBuffer> {
    let area = input.area();
    let mut graph = OperationGraph::new();
    let src = graph.add_operation(Box::new(BufferSourceOperation::new(input)));
    let id = graph.add_operation(op);
    graph.connect(src, id, 0).unwrap();
    let executor = Executor::new(ExecutorConfig {
        chunk_size,
        ..Default::default()
    });
    let results = executor
        .execute(&mut graph, &[(id, area)], &CancelToken::new())
        .unwrap();
    results[&id].clone()
}

/// `Erode(img, n) == 1 - Dilate(1 - img, n)` for the step variant.
#[test]
fn step_duality() {
    let area = BufferArea::from_size(24, 24);
    let matte = noise_matte(area);
    let mut inverted = MemoryBuffer::new(PixelType::Value, area);
    inverted.fill_area(area, |x, y, out| out[0] = 1.0 - matte.value(x, y, 0));

    let eroded = run_value_op(
        Box::new(ErodeStepOperation::new(4)),
        Arc::new(matte),
        256,
    );
    let dilated_inv = run_value_op(
        Box::new(DilateStepOperation::new(4)),
        Arc::new(inverted),
        256,
    );
    for (x, y) in area.pixels() {
        let a = eroded.value(x, y, 0);
        let b = 1.0 - dilated_inv.value(x, y, 0);
        assert!((a - b).abs() < 1e-6, "({x},{y}): {a} vs {b}");
    }
}

/// The running-extremum step dilate equals a Chebyshev (max-metric) dilate
/// of radius `n`, verified against a brute-force reference.
#[test]
fn step_dilate_equals_chebyshev_reference() {
    let area = BufferArea::from_size(19, 23);
    let matte = noise_matte(area);
    let n = 5;
    let out = run_value_op(
        Box::new(DilateStepOperation::new(n)),
        Arc::new(matte.clone()),
        256,
    );
    for (x, y) in area.pixels() {
        let mut expect = f32::NEG_INFINITY;
        for ny in (y - n).max(0)..(y + n + 1).min(area.y_max) {
            for nx in (x - n).max(0)..(x + n + 1).min(area.x_max) {
                expect = expect.max(matte.value(nx, ny, 0));
            }
        }
        assert_eq!(out.value(x, y, 0), expect, "({x},{y})");
    }
}

/// Chunked execution of the two-pass morphology must match the single-chunk
/// run: the scratch rows either side of every chunk keep the passes exact.
#[test]
fn step_dilate_is_chunk_invariant() {
    let area = BufferArea::from_size(30, 30);
    let matte = Arc::new(noise_matte(area));
    let small = run_value_op(Box::new(DilateStepOperation::new(6)), matte.clone(), 8);
    let big = run_value_op(Box::new(DilateStepOperation::new(6)), matte, 256);
    for (x, y) in area.pixels() {
        assert_eq!(small.value(x, y, 0), big.value(x, y, 0), "({x},{y})");
    }
}

/// The threshold feather through the engine: dilating a binary matte grows
/// it and leaves a smooth edge band.
#[test]
fn threshold_feather_through_engine() {
    let area = BufferArea::from_size(20, 20);
    let mut matte = MemoryBuffer::new(PixelType::Value, area);
    matte.fill_area(area, |x, y, out| {
        out[0] = if (8..12).contains(&x) && (8..12).contains(&y) {
            1.0
        } else {
            0.0
        };
    });
    let out = run_value_op(
        Box::new(DilateErodeThresholdOperation::new(3.0, 1.0, 0.5)),
        Arc::new(matte),
        7,
    );
    assert_eq!(out.value(10, 10, 0), 1.0);
    assert_eq!(out.value(7, 10, 0), 1.0);
    assert_eq!(out.value(0, 0, 0), 0.0);
    // The feather band shows up at fractional (diagonal) distances.
    let has_feather = area
        .pixels()
        .map(|(x, y)| out.value(x, y, 0))
        .any(|v| v > 0.0 && v < 1.0);
    assert!(has_feather, "no feather band around the grown matte");
}
