//! Blur-family integration: separability, energy conservation, and the
//! soundness of declared areas of interest under demand-driven execution.

use rastermill_core::{BufferArea, MemoryBuffer, PixelType, Quality};
use rastermill_engine::{
    BufferSourceOperation, CancelToken, Executor, ExecutorConfig, NodeOperation, OperationGraph,
};
use rastermill_ops::blur::tables::{make_gausstab, FilterType};
use rastermill_ops::{BlurParams, GaussianXBlurOperation, GaussianYBlurOperation};
use std::sync::Arc;

fn impulse_color(area: BufferArea, x: i32, y: i32) -> MemoryBuffer {
    let mut buf = MemoryBuffer::new(PixelType::Color, area);
    buf.write_elem(x, y, &[1.0, 1.0, 1.0, 1.0]);
    buf
}

fn blur_params(size: f32) -> BlurParams {
    BlurParams {
        size_x: size,
        size_y: size,
        ..Default::default()
    }
}

/// X then Y separable passes must match the 2D convolution with the
/// outer-product kernel on an impulse, away from any canvas clipping.
#[test]
fn separable_passes_match_outer_product_kernel() {
    let area = BufferArea::from_size(21, 21);
    let input = impulse_color(area, 10, 10);
    let rad = 3.0f32;

    let mut op_x = GaussianXBlurOperation::new(blur_params(rad), 1.0);
    op_x.init_data(area, Quality::High);
    op_x.init_execution();
    let mut mid = MemoryBuffer::new(PixelType::Color, area);
    op_x.update_memory_buffer_partial(&mut mid, area, &[&input]);

    let mut op_y = GaussianYBlurOperation::new(blur_params(rad), 1.0);
    op_y.init_data(area, Quality::High);
    op_y.init_execution();
    let mut out = MemoryBuffer::new(PixelType::Color, area);
    op_y.update_memory_buffer_partial(&mut out, area, &[&mid]);

    let size = rad.ceil() as i32;
    let tab = make_gausstab(FilterType::Gaussian, rad, size);
    for (x, y) in area.pixels() {
        let dx = x - 10;
        let dy = y - 10;
        let expected = if dx.abs() <= size && dy.abs() <= size {
            tab[(dx + size) as usize] * tab[(dy + size) as usize]
        } else {
            0.0
        };
        let got = out.value(x, y, 0);
        assert!(
            (got - expected).abs() < 1e-5,
            "({x},{y}): got {got}, expected {expected}"
        );
    }
}

/// The concrete scenario: an impulse blurred on a padded canvas keeps its
/// total energy, and the bump is symmetric around the impulse.
#[test]
fn impulse_blur_preserves_energy_through_engine() {
    let area = BufferArea::from_size(16, 16);
    let input = impulse_color(area, 8, 8);

    let mut graph = OperationGraph::new();
    let src = graph.add_operation(Box::new(BufferSourceOperation::new(Arc::new(input))));
    let bx = graph.add_operation(Box::new(GaussianXBlurOperation::new(blur_params(1.0), 1.0)));
    let by = graph.add_operation(Box::new(GaussianYBlurOperation::new(blur_params(1.0), 1.0)));
    graph.connect(src, bx, 0).unwrap();
    graph.connect(bx, by, 0).unwrap();

    let executor = Executor::new(ExecutorConfig::default());
    let results = executor
        .execute(&mut graph, &[(by, area)], &CancelToken::new())
        .unwrap();
    let out = &results[&by];

    let sum: f32 = area.pixels().map(|(x, y)| out.value(x, y, 0)).sum();
    assert!((sum - 1.0).abs() < 1e-4, "energy {sum}");
    assert!(out.value(8, 8, 0) > 0.0);
    assert!((out.value(7, 8, 0) - out.value(9, 8, 0)).abs() < 1e-6);
    assert!((out.value(8, 7, 0) - out.value(8, 9, 0)).abs() < 1e-6);
    assert!((out.value(7, 8, 0) - out.value(8, 7, 0)).abs() < 1e-6);
}

/// Demanding a sub-area must produce exactly the pixels a full-canvas run
/// produces there: the declared area of interest is sufficient.
#[test]
fn demanded_subarea_matches_full_run() {
    let area = BufferArea::from_size(32, 32);
    let mut plate = MemoryBuffer::new(PixelType::Color, area);
    plate.fill_area(area, |x, y, out| {
        let v = (((x * 13 + y * 7) % 17) as f32) / 16.0;
        out.copy_from_slice(&[v, v * 0.5, 1.0 - v, 1.0]);
    });
    let plate = Arc::new(plate);

    let build = |plate: Arc<MemoryBuffer>| {
        let mut graph = OperationGraph::new();
        let src = graph.add_operation(Box::new(BufferSourceOperation::new(plate)));
        let bx =
            graph.add_operation(Box::new(GaussianXBlurOperation::new(blur_params(3.0), 1.0)));
        let by =
            graph.add_operation(Box::new(GaussianYBlurOperation::new(blur_params(3.0), 1.0)));
        graph.connect(src, bx, 0).unwrap();
        graph.connect(bx, by, 0).unwrap();
        (graph, by)
    };

    let executor = Executor::new(ExecutorConfig::default());
    let (mut full_graph, full_sink) = build(plate.clone());
    let full = executor
        .execute(&mut full_graph, &[(full_sink, area)], &CancelToken::new())
        .unwrap();

    let sub = BufferArea::new(10, 12, 20, 22);
    let (mut sub_graph, sub_sink) = build(plate);
    let partial = executor
        .execute(&mut sub_graph, &[(sub_sink, sub)], &CancelToken::new())
        .unwrap();

    let full_out = &full[&full_sink];
    let sub_out = &partial[&sub_sink];
    assert_eq!(sub_out.area(), sub);
    for (x, y) in sub.pixels() {
        for c in 0..4 {
            assert!(
                (full_out.value(x, y, c) - sub_out.value(x, y, c)).abs() < 1e-6,
                "mismatch at ({x},{y})[{c}]"
            );
        }
    }
}

/// Chunked execution must be invisible: tiny chunks and one big chunk give
/// identical output.
#[test]
fn chunk_size_does_not_change_blur_output() {
    let area = BufferArea::from_size(20, 20);
    let plate = Arc::new({
        let mut buf = MemoryBuffer::new(PixelType::Color, area);
        buf.fill_area(area, |x, y, out| {
            out.copy_from_slice(&[(x % 3) as f32 / 2.0, (y % 5) as f32 / 4.0, 0.5, 1.0]);
        });
        buf
    });

    let mut outputs = Vec::new();
    for chunk_size in [4, 256] {
        let mut graph = OperationGraph::new();
        let src = graph.add_operation(Box::new(BufferSourceOperation::new(plate.clone())));
        let blur =
            graph.add_operation(Box::new(GaussianXBlurOperation::new(blur_params(2.0), 1.0)));
        graph.connect(src, blur, 0).unwrap();
        let executor = Executor::new(ExecutorConfig {
            chunk_size,
            ..Default::default()
        });
        let results = executor
            .execute(&mut graph, &[(blur, area)], &CancelToken::new())
            .unwrap();
        outputs.push(results[&blur].clone());
    }
    for (x, y) in area.pixels() {
        assert_eq!(outputs[0].elem(x, y), outputs[1].elem(x, y), "({x},{y})");
    }
}
