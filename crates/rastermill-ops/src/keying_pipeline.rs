//! Assembly of the fixed-topology keying sub-pipeline.
//!
//! Keying is not a single operation: chroma pre-blur, the keyer itself,
//! clip, garbage/core matte combination, dilate/erode, feather and post-blur
//! all chain in a fixed order, with despill and the alpha multiply on the
//! image branch. This module wires that chain into an operation graph.

use crate::blur::{FalloffType, GaussianAlphaXBlurOperation, GaussianAlphaYBlurOperation};
use crate::channels::{
    CombineChannelsOperation, ConvertRGBToYCCOperation, ConvertYCCToRGBOperation,
    SeparateChannelOperation,
};
use crate::dilate::{DilateDistanceOperation, ErodeDistanceOperation};
use crate::keying::{
    KeyingBlurAxis, KeyingBlurOperation, KeyingClipOperation, KeyingDespillOperation,
    KeyingOperation, MultiplyAlphaOperation,
};
use crate::math::{MathFunction, MathOperation};
use rastermill_core::Result;
use rastermill_engine::{OperationGraph, OperationId, SetValueOperation};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyingPipelineParams {
    pub screen_balance: f32,
    pub despill_factor: f32,
    pub despill_balance: f32,
    /// Chroma pre-blur size in pixels; 0 disables the stage.
    pub pre_blur: i32,
    /// Matte post-blur size in pixels; 0 disables the stage.
    pub post_blur: i32,
    pub clip_black: f32,
    pub clip_white: f32,
    pub edge_kernel_radius: i32,
    pub edge_kernel_tolerance: f32,
    /// Positive dilates the matte, negative erodes it, 0 disables.
    pub dilate_erode_distance: i32,
    /// Feather radius; the sign picks dilate vs erode feathering.
    pub feather_distance: i32,
    pub feather_falloff: FalloffType,
}

impl Default for KeyingPipelineParams {
    fn default() -> Self {
        Self {
            screen_balance: 0.5,
            despill_factor: 1.0,
            despill_balance: 0.5,
            pre_blur: 0,
            post_blur: 0,
            clip_black: 0.0,
            clip_white: 1.0,
            edge_kernel_radius: 3,
            edge_kernel_tolerance: 0.1,
            dilate_erode_distance: 0,
            feather_distance: 0,
            feather_falloff: FalloffType::Smooth,
        }
    }
}

/// The pipeline's output operations.
pub struct KeyingPipeline {
    /// Final processed matte.
    pub matte: OperationId,
    /// Edge matte: 1 where the neighborhood-consistency test fails.
    pub edges: OperationId,
    /// Despilled image with the matte multiplied into color and alpha.
    pub image: OperationId,
}

/// Wire the keying chain into `graph`.
///
/// `image` and `screen` are color producers; the optional garbage and core
/// mattes are value producers painted by the user.
pub fn build_keying_pipeline(
    graph: &mut OperationGraph,
    image: OperationId,
    screen: OperationId,
    garbage_matte: Option<OperationId>,
    core_matte: Option<OperationId>,
    params: &KeyingPipelineParams,
) -> Result<KeyingPipeline> {
    // Chroma pre-blur: blur only the Cb/Cr planes so screen noise shrinks
    // without softening luma detail.
    let keying_input = if params.pre_blur > 0 {
        let ycc = graph.add_operation(Box::new(ConvertRGBToYCCOperation::new()));
        graph.connect(image, ycc, 0)?;

        let combine = graph.add_operation(Box::new(CombineChannelsOperation::new()));
        for channel in 0..4 {
            let sep = graph.add_operation(Box::new(SeparateChannelOperation::new(channel)));
            graph.connect(ycc, sep, 0)?;
            let plane = if channel == 1 || channel == 2 {
                let blur_x = graph.add_operation(Box::new(KeyingBlurOperation::new(
                    params.pre_blur,
                    KeyingBlurAxis::X,
                )));
                graph.connect(sep, blur_x, 0)?;
                let blur_y = graph.add_operation(Box::new(KeyingBlurOperation::new(
                    params.pre_blur,
                    KeyingBlurAxis::Y,
                )));
                graph.connect(blur_x, blur_y, 0)?;
                blur_y
            } else {
                sep
            };
            graph.connect(plane, combine, channel)?;
        }
        let rgb = graph.add_operation(Box::new(ConvertYCCToRGBOperation::new()));
        graph.connect(combine, rgb, 0)?;
        rgb
    } else {
        image
    };

    let key = graph.add_operation(Box::new(KeyingOperation::new(params.screen_balance)));
    graph.connect(keying_input, key, 0)?;
    graph.connect(screen, key, 1)?;
    let mut matte = key;

    // Garbage matte knocks holes into the matte: min(matte, 1 - garbage).
    if let Some(garbage) = garbage_matte {
        let one = graph.add_operation(Box::new(SetValueOperation::new(1.0)));
        let invert = graph.add_operation(Box::new(MathOperation::new(MathFunction::Subtract)));
        graph.connect(one, invert, 0)?;
        graph.connect(garbage, invert, 1)?;
        let min = graph.add_operation(Box::new(MathOperation::new(MathFunction::Minimum)));
        graph.connect(matte, min, 0)?;
        graph.connect(invert, min, 1)?;
        matte = min;
    }

    // Core matte forces regions to foreground: max(matte, core).
    if let Some(core) = core_matte {
        let max = graph.add_operation(Box::new(MathOperation::new(MathFunction::Maximum)));
        graph.connect(matte, max, 0)?;
        graph.connect(core, max, 1)?;
        matte = max;
    }

    // Edge matte branches off the unclipped matte.
    let edges = graph.add_operation(Box::new(KeyingClipOperation::new(
        params.edge_kernel_radius,
        params.edge_kernel_tolerance,
        params.clip_black,
        params.clip_white,
        true,
    )));
    graph.connect(matte, edges, 0)?;

    if params.clip_black > 0.0 || params.clip_white < 1.0 {
        let clip = graph.add_operation(Box::new(KeyingClipOperation::new(
            params.edge_kernel_radius,
            params.edge_kernel_tolerance,
            params.clip_black,
            params.clip_white,
            false,
        )));
        graph.connect(matte, clip, 0)?;
        matte = clip;
    }

    if params.dilate_erode_distance != 0 {
        let morph: Box<dyn rastermill_engine::NodeOperation> =
            if params.dilate_erode_distance > 0 {
                Box::new(DilateDistanceOperation::new(
                    params.dilate_erode_distance as f32,
                ))
            } else {
                Box::new(ErodeDistanceOperation::new(
                    -params.dilate_erode_distance as f32,
                ))
            };
        let morph = graph.add_operation(morph);
        graph.connect(matte, morph, 0)?;
        matte = morph;
    }

    if params.feather_distance != 0 {
        let size = params.feather_distance.abs() as f32;
        let subtract = params.feather_distance < 0;
        let feather_x = graph.add_operation(Box::new(GaussianAlphaXBlurOperation::new(
            size,
            params.feather_falloff,
            subtract,
        )));
        graph.connect(matte, feather_x, 0)?;
        let feather_y = graph.add_operation(Box::new(GaussianAlphaYBlurOperation::new(
            size,
            params.feather_falloff,
            subtract,
        )));
        graph.connect(feather_x, feather_y, 0)?;
        matte = feather_y;
    }

    if params.post_blur > 0 {
        let blur_x = graph.add_operation(Box::new(KeyingBlurOperation::new(
            params.post_blur,
            KeyingBlurAxis::X,
        )));
        graph.connect(matte, blur_x, 0)?;
        let blur_y = graph.add_operation(Box::new(KeyingBlurOperation::new(
            params.post_blur,
            KeyingBlurAxis::Y,
        )));
        graph.connect(blur_x, blur_y, 0)?;
        matte = blur_y;
    }

    // Image branch: despill against the screen, then multiply the matte in.
    let despill = graph.add_operation(Box::new(KeyingDespillOperation::new(
        params.despill_factor,
        params.despill_balance,
    )));
    graph.connect(image, despill, 0)?;
    graph.connect(screen, despill, 1)?;
    let out_image = graph.add_operation(Box::new(MultiplyAlphaOperation::new()));
    graph.connect(despill, out_image, 0)?;
    graph.connect(matte, out_image, 1)?;

    debug!(ops = graph.len(), "keying pipeline assembled");
    Ok(KeyingPipeline {
        matte,
        edges,
        image: out_image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rastermill_core::{BufferArea, MemoryBuffer, PixelType};
    use rastermill_engine::{BufferSourceOperation, CancelToken, Executor, ExecutorConfig};
    use std::sync::Arc;

    const SCREEN: [f32; 4] = [0.1, 0.8, 0.2, 1.0];
    const SUBJECT: [f32; 4] = [0.7, 0.3, 0.2, 1.0];

    fn screen_plate(area: BufferArea, subject: BufferArea) -> MemoryBuffer {
        let mut buf = MemoryBuffer::new(PixelType::Color, area);
        buf.fill_area(area, |x, y, out| {
            out.copy_from_slice(if subject.contains(x, y) { &SUBJECT } else { &SCREEN });
        });
        buf
    }

    #[test]
    fn test_pipeline_extracts_subject() {
        let area = BufferArea::from_size(24, 24);
        let subject = BufferArea::new(8, 8, 16, 16);
        let plate = screen_plate(area, subject);

        let mut graph = OperationGraph::new();
        let image = graph.add_operation(Box::new(BufferSourceOperation::new(Arc::new(plate))));
        let screen = {
            let mut buf = MemoryBuffer::new(PixelType::Color, area);
            buf.fill_area(area, |_, _, out| out.copy_from_slice(&SCREEN));
            graph.add_operation(Box::new(BufferSourceOperation::new(Arc::new(buf))))
        };

        let pipeline = build_keying_pipeline(
            &mut graph,
            image,
            screen,
            None,
            None,
            &KeyingPipelineParams::default(),
        )
        .unwrap();

        let executor = Executor::new(ExecutorConfig::default());
        let results = executor
            .execute(
                &mut graph,
                &[(pipeline.matte, area), (pipeline.image, area)],
                &CancelToken::new(),
            )
            .unwrap();

        let matte = &results[&pipeline.matte];
        assert_eq!(matte.value(12, 12, 0), 1.0);
        assert!(matte.value(2, 2, 0).abs() < 1e-6);

        let keyed = &results[&pipeline.image];
        // Screen area fully transparent, subject kept.
        assert_eq!(keyed.value(2, 2, 3), 0.0);
        assert_eq!(keyed.value(12, 12, 3), 1.0);
        // Despill must not raise the green channel of the subject.
        assert!(keyed.value(12, 12, 1) <= SUBJECT[1]);
    }

    #[test]
    fn test_pipeline_with_mattes_and_feather() {
        let area = BufferArea::from_size(24, 24);
        let subject = BufferArea::new(8, 8, 16, 16);
        let plate = screen_plate(area, subject);

        let mut graph = OperationGraph::new();
        let image = graph.add_operation(Box::new(BufferSourceOperation::new(Arc::new(plate))));
        let screen = {
            let mut buf = MemoryBuffer::new(PixelType::Color, area);
            buf.fill_area(area, |_, _, out| out.copy_from_slice(&SCREEN));
            graph.add_operation(Box::new(BufferSourceOperation::new(Arc::new(buf))))
        };
        // Garbage matte covering the top rows.
        let garbage = {
            let mut buf = MemoryBuffer::new(PixelType::Value, area);
            buf.fill_area(area, |_, y, out| out[0] = if y < 4 { 1.0 } else { 0.0 });
            graph.add_operation(Box::new(BufferSourceOperation::new(Arc::new(buf))))
        };
        // Core matte forcing a corner of the screen to foreground.
        let core = {
            let mut buf = MemoryBuffer::new(PixelType::Value, area);
            buf.fill_area(area, |x, y, out| {
                out[0] = if x >= 20 && y >= 20 { 1.0 } else { 0.0 };
            });
            graph.add_operation(Box::new(BufferSourceOperation::new(Arc::new(buf))))
        };

        let params = KeyingPipelineParams {
            pre_blur: 2,
            post_blur: 1,
            feather_distance: 2,
            ..Default::default()
        };
        let pipeline =
            build_keying_pipeline(&mut graph, image, screen, Some(garbage), Some(core), &params)
                .unwrap();

        let executor = Executor::new(ExecutorConfig::default());
        let results = executor
            .execute(&mut graph, &[(pipeline.matte, area)], &CancelToken::new())
            .unwrap();
        let matte = &results[&pipeline.matte];

        // Core matte wins over the screen.
        assert!(matte.value(22, 22, 0) > 0.9);
        // Garbage matte suppresses even subject rows... there are none in
        // the top band, but the band must be fully background.
        assert!(matte.value(12, 1, 0) < 0.1);
        // Subject center still solid.
        assert!(matte.value(12, 12, 0) > 0.9);
    }
}
