//! Keying integration: pipeline behavior through the engine and the
//! despill guarantees over a spread of colors.

use rastermill_core::{BufferArea, MemoryBuffer, PixelType};
use rastermill_engine::{
    BufferSourceOperation, CancelToken, Executor, ExecutorConfig, NodeOperation, OperationGraph,
};
use rastermill_ops::{
    build_keying_pipeline, KeyingDespillOperation, KeyingOperation, KeyingPipelineParams,
};
use std::sync::Arc;

const SCREEN: [f32; 4] = [0.12, 0.78, 0.2, 1.0];

fn solid(area: BufferArea, color: [f32; 4]) -> MemoryBuffer {
    let mut buf = MemoryBuffer::new(PixelType::Color, area);
    buf.fill_area(area, |_, _, out| out.copy_from_slice(&color));
    buf
}

/// Feeding the exact screen color through the keyer yields background for
/// any balance.
#[test]
fn screen_color_keys_to_background_for_all_balances() {
    let area = BufferArea::from_size(4, 4);
    let screen = solid(area, SCREEN);
    for balance in [0.0, 0.1, 0.35, 0.5, 0.7, 0.95, 1.0] {
        let op = KeyingOperation::new(balance);
        let mut matte = MemoryBuffer::new(PixelType::Value, area);
        op.update_memory_buffer_partial(&mut matte, area, &[&screen, &screen]);
        for (x, y) in area.pixels() {
            assert!(
                matte.value(x, y, 0).abs() < 1e-6,
                "balance {balance} at ({x},{y})"
            );
        }
    }
}

/// Despill never raises the screen's dominant channel and leaves the other
/// channels bit-identical, across a grid of pixel colors.
#[test]
fn despill_no_op_guarantee_over_color_grid() {
    let area = BufferArea::from_size(1, 1);
    let screen = solid(area, SCREEN);
    let op = KeyingDespillOperation::new(0.8, 0.4);
    for r in 0..6 {
        for g in 0..6 {
            for b in 0..6 {
                let pixel = [r as f32 / 5.0, g as f32 / 5.0, b as f32 / 5.0, 1.0];
                let image = solid(area, pixel);
                let mut out = MemoryBuffer::new(PixelType::Color, area);
                op.update_memory_buffer_partial(&mut out, area, &[&image, &screen]);
                // Screen primary is green (channel 1).
                assert!(out.value(0, 0, 1) <= pixel[1] + 1e-7, "pixel {pixel:?}");
                assert_eq!(out.value(0, 0, 0), pixel[0], "pixel {pixel:?}");
                assert_eq!(out.value(0, 0, 2), pixel[2], "pixel {pixel:?}");
                assert_eq!(out.value(0, 0, 3), pixel[3]);
            }
        }
    }
}

/// The complete pipeline with clipping and morphology, chunked through the
/// engine: the matte stays binary-clean inside/outside and the edge matte
/// marks only the transition band.
#[test]
fn full_pipeline_with_clip_and_edges() {
    let area = BufferArea::from_size(32, 32);
    let subject = BufferArea::new(10, 10, 22, 22);
    let mut plate = MemoryBuffer::new(PixelType::Color, area);
    plate.fill_area(area, |x, y, out| {
        out.copy_from_slice(if subject.contains(x, y) {
            &[0.8, 0.25, 0.2, 1.0]
        } else {
            &SCREEN
        });
    });

    let mut graph = OperationGraph::new();
    let image = graph.add_operation(Box::new(BufferSourceOperation::new(Arc::new(plate))));
    let screen = graph.add_operation(Box::new(BufferSourceOperation::new(Arc::new(solid(
        area, SCREEN,
    )))));

    let params = KeyingPipelineParams {
        clip_black: 0.1,
        clip_white: 0.9,
        dilate_erode_distance: 1,
        ..Default::default()
    };
    let pipeline = build_keying_pipeline(&mut graph, image, screen, None, None, &params).unwrap();

    let executor = Executor::new(ExecutorConfig {
        chunk_size: 8,
        ..Default::default()
    });
    let results = executor
        .execute(
            &mut graph,
            &[
                (pipeline.matte, area),
                (pipeline.edges, area),
                (pipeline.image, area),
            ],
            &CancelToken::new(),
        )
        .unwrap();

    let matte = &results[&pipeline.matte];
    assert_eq!(matte.value(16, 16, 0), 1.0);
    assert_eq!(matte.value(2, 2, 0), 0.0);
    // Dilated by one pixel: the ring just outside the subject is solid.
    assert_eq!(matte.value(9, 16, 0), 1.0);

    let edges = &results[&pipeline.edges];
    assert_eq!(edges.value(16, 16, 0), 0.0);
    assert_eq!(edges.value(2, 2, 0), 0.0);
    // The subject boundary fails the neighborhood-consistency test.
    assert_eq!(edges.value(10, 16, 0), 1.0);

    let keyed = &results[&pipeline.image];
    assert_eq!(keyed.value(2, 2, 3), 0.0);
    assert_eq!(keyed.value(16, 16, 3), 1.0);
}
