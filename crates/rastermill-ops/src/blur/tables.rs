//! Convolution weight tables shared by the blur family.

use serde::{Deserialize, Serialize};

/// Hard ceiling on any blur radius and on table sizes derived from it.
pub const MAX_GAUSSTAB_RADIUS: i32 = 30000;

const GAUSS_FAC: f32 = 1.6;

/// Reconstruction filter shapes selectable on the blur operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    Flat,
    Tent,
    Quadratic,
    Cubic,
    #[default]
    Gaussian,
    CatmullRom,
    Mitchell,
}

fn filt_quadratic(x: f32) -> f32 {
    let x = x.abs();
    if x < 0.5 {
        0.75 - x * x
    } else if x < 1.5 {
        0.5 * (x - 1.5) * (x - 1.5)
    } else {
        0.0
    }
}

fn filt_cubic(x: f32) -> f32 {
    let x = x.abs();
    let x2 = x * x;
    if x < 1.0 {
        0.5 * x * x2 - x2 + 2.0 / 3.0
    } else if x < 2.0 {
        (2.0 - x) * (2.0 - x) * (2.0 - x) / 6.0
    } else {
        0.0
    }
}

fn filt_catrom(x: f32) -> f32 {
    let x = x.abs();
    let x2 = x * x;
    if x < 1.0 {
        1.5 * x2 * x - 2.5 * x2 + 1.0
    } else if x < 2.0 {
        -0.5 * x2 * x + 2.5 * x2 - 4.0 * x + 2.0
    } else {
        0.0
    }
}

fn filt_mitchell(x: f32) -> f32 {
    let b = 1.0 / 3.0f32;
    let c = 1.0 / 3.0f32;
    let p0 = (6.0 - 2.0 * b) / 6.0;
    let p2 = (-18.0 + 12.0 * b + 6.0 * c) / 6.0;
    let p3 = (12.0 - 9.0 * b - 6.0 * c) / 6.0;
    let q0 = (8.0 * b + 24.0 * c) / 6.0;
    let q1 = (-12.0 * b - 48.0 * c) / 6.0;
    let q2 = (6.0 * b + 30.0 * c) / 6.0;
    let q3 = (-b - 6.0 * c) / 6.0;
    let x = x.abs();
    if x < 1.0 {
        p0 + x * x * (p2 + x * p3)
    } else if x < 2.0 {
        q0 + x * (q1 + x * (q2 + x * q3))
    } else {
        0.0
    }
}

/// Filter falloff at a normalized offset `x` (1.0 = the kernel radius).
pub fn filter_value(filter: FilterType, x: f32) -> f32 {
    let x = x.abs();
    match filter {
        FilterType::Flat => {
            if x > 1.0 {
                0.0
            } else {
                1.0
            }
        }
        FilterType::Tent => {
            if x > 1.0 {
                0.0
            } else {
                1.0 - x
            }
        }
        FilterType::Quadratic => filt_quadratic(x * GAUSS_FAC),
        FilterType::Cubic => filt_cubic(x * GAUSS_FAC),
        FilterType::Gaussian => {
            let two_fac2 = 2.0 * GAUSS_FAC * GAUSS_FAC;
            let x = x * 3.0 * GAUSS_FAC;
            1.0 / (std::f32::consts::PI * two_fac2).sqrt() * (-x * x / two_fac2).exp()
        }
        FilterType::CatmullRom => filt_catrom(x * GAUSS_FAC),
        FilterType::Mitchell => filt_mitchell(x * GAUSS_FAC),
    }
}

/// Build a normalized 1D weight table of `2 * size + 1` entries.
///
/// Weights are the filter falloff sampled at offsets `i / rad` for
/// `i in [-size, size]`, normalized to sum to 1.
pub fn make_gausstab(filter: FilterType, rad: f32, size: i32) -> Vec<f32> {
    let n = (2 * size + 1) as usize;
    let fac = if rad > 0.0 { 1.0 / rad } else { 0.0 };
    let mut table = Vec::with_capacity(n);
    let mut sum = 0.0f32;
    for i in -size..=size {
        let val = filter_value(filter, i as f32 * fac);
        sum += val;
        table.push(val);
    }
    let inv = 1.0 / sum;
    for w in &mut table {
        *w *= inv;
    }
    table
}

/// Proportional falloff curves for the feathered-dilate distance table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FalloffType {
    #[default]
    Smooth,
    Sphere,
    Root,
    Sharp,
    Linear,
    InverseSquare,
}

/// Inverse-distance factor table of `2 * size + 1` entries.
///
/// Entry `i` remaps the normalized distance `1 - |i| / rad` through the
/// falloff curve; negative values (offsets past the radius) pass through
/// unmapped except for `Sharp`, which squares unconditionally.
pub fn make_dist_fac_inverse(rad: f32, size: i32, falloff: FalloffType) -> Vec<f32> {
    let fac = if rad > 0.0 { 1.0 / rad } else { 0.0 };
    let mut table = Vec::with_capacity((2 * size + 1) as usize);
    for i in -size..=size {
        let mut val = 1.0 - (i as f32 * fac).abs();
        match falloff {
            FalloffType::Smooth => {
                if val >= 0.0 {
                    val = 3.0 * val * val - 2.0 * val * val * val;
                }
            }
            FalloffType::Sphere => {
                if val >= 0.0 {
                    val = (2.0 * val - val * val).sqrt();
                }
            }
            FalloffType::Root => {
                if val >= 0.0 {
                    val = val.sqrt();
                }
            }
            FalloffType::Sharp => val = val * val,
            FalloffType::Linear => {}
            FalloffType::InverseSquare => {
                if val >= 0.0 {
                    val = val * (2.0 - val);
                }
            }
        }
        table.push(val);
    }
    table
}
