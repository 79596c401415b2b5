//! Rastermill Ops - Concrete filter operations
//!
//! The operation library for the execution engine: convolution blurs,
//! morphological dilate/erode, the keying pipeline, and pointwise math and
//! gamma operations. Each operation implements the engine's canvas and
//! area-of-interest contracts along with its pixel kernel.

pub mod blur;
pub mod channels;
pub mod dilate;
pub mod gamma;
pub mod keying;
pub mod keying_pipeline;
pub mod math;

pub use blur::{
    AspectMode, BilateralBlurOperation, BilateralBlurParams, BlurParams, DirectionalBlurOperation,
    DirectionalBlurParams, FalloffType, FilterType, GaussianAlphaXBlurOperation,
    GaussianAlphaYBlurOperation, GaussianBlurReferenceOperation, GaussianBokehBlurOperation,
    GaussianXBlurOperation, GaussianYBlurOperation, VariableSizeBokehBlurOperation,
    VariableSizeBokehParams,
};
pub use channels::{
    CombineChannelsOperation, ConvertRGBToYCCOperation, ConvertYCCToRGBOperation,
    SeparateChannelOperation,
};
pub use dilate::{
    DilateDistanceOperation, DilateErodeThresholdOperation, DilateStepOperation,
    ErodeDistanceOperation, ErodeStepOperation,
};
pub use gamma::{GammaCorrectOperation, GammaOperation, GammaUncorrectOperation};
pub use keying::{
    KeyingBlurAxis, KeyingBlurOperation, KeyingClipOperation, KeyingDespillOperation,
    KeyingOperation, MultiplyAlphaOperation,
};
pub use keying_pipeline::{build_keying_pipeline, KeyingPipeline, KeyingPipelineParams};
pub use math::{MathFunction, MathOperation};
