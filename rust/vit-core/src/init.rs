//! Weight initialization schemes.
//!
//! - Xavier/Glorot uniform for linear layers
//! - Kaiming/He normal (fan-out mode) for the patch projection
//! - Truncated normal for the class token and positional embedding

use ndarray::{ArrayD, IxDyn};
use rand::Rng;

/// Initialization policy attached to every parameter of a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Init {
    Zeros,
    Ones,
    /// Normal with zero mean, resampled outside two standard deviations.
    TruncNormal { std: f32 },
    /// U(-a, a) with a = sqrt(6 / (fan_in + fan_out)).
    XavierUniform { fan_in: usize, fan_out: usize },
    /// N(0, sqrt(2 / fan_out)).
    KaimingNormal { fan_out: usize },
}

impl Init {
    /// Xavier uniform for a `(out_features, in_features)` weight.
    pub fn linear(in_features: usize, out_features: usize) -> Self {
        Init::XavierUniform {
            fan_in: in_features,
            fan_out: out_features,
        }
    }

    /// Draw a fresh array of `shape` under this policy.
    pub fn sample<R: Rng + ?Sized>(&self, shape: &[usize], rng: &mut R) -> ArrayD<f32> {
        match *self {
            Init::Zeros => ArrayD::zeros(IxDyn(shape)),
            Init::Ones => ArrayD::ones(IxDyn(shape)),
            Init::TruncNormal { std } => {
                ArrayD::from_shape_simple_fn(IxDyn(shape), || trunc_normal(rng, std, 2.0 * std))
            }
            Init::XavierUniform { fan_in, fan_out } => {
                let a = xavier_bound(fan_in, fan_out);
                ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.gen_range(-a..a))
            }
            Init::KaimingNormal { fan_out } => {
                let std = (2.0 / fan_out.max(1) as f32).sqrt();
                ArrayD::from_shape_simple_fn(IxDyn(shape), || std * standard_normal(rng))
            }
        }
    }
}

/// Bound of the Xavier uniform distribution.
pub fn xavier_bound(fan_in: usize, fan_out: usize) -> f32 {
    (6.0 / (fan_in + fan_out).max(1) as f32).sqrt()
}

/// Box-Muller transform.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}

fn trunc_normal<R: Rng + ?Sized>(rng: &mut R, std: f32, bound: f32) -> f32 {
    loop {
        let x = std * standard_normal(rng);
        if x.abs() <= bound {
            return x;
        }
    }
}
