//! Resampling of positional embedding grids to a new patch count.
//!
//! A positional embedding has shape `(1, 1 + side * side, hidden)`: one class
//! token slot followed by a square grid of patch slots in row-major order.
//! Only the grid is resampled; the class token is carried over unchanged.

use ndarray::{Array3, ArrayD, ArrayView3, Ix3};

use crate::error::{Error, Result};

/// Side of the square patch grid encoded by `num_tokens` positions.
///
/// Fails unless `num_tokens - 1` is a positive perfect square.
pub fn grid_side(num_tokens: usize) -> Result<usize> {
    let spatial = num_tokens
        .checked_sub(1)
        .filter(|&n| n > 0)
        .ok_or(Error::MalformedGrid { num_tokens })?;
    let side = (spatial as f64).sqrt().round() as usize;
    if side * side == spatial {
        Ok(side)
    } else {
        Err(Error::MalformedGrid { num_tokens })
    }
}

/// Resample `pos_embed` to `num_tokens` positions with bilinear interpolation.
///
/// Interpolation is corner-aligned and runs over the two grid axes only;
/// hidden channels are never mixed.
pub fn resample_pos_embed(pos_embed: &ArrayD<f32>, num_tokens: usize) -> Result<ArrayD<f32>> {
    let source = pos_embed
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|_| invalid_shape(pos_embed.shape(), num_tokens))?;
    let (batch, old_tokens, hidden) = source.dim();
    if batch != 1 {
        return Err(invalid_shape(pos_embed.shape(), num_tokens));
    }

    let old_side = grid_side(old_tokens)?;
    let new_side = grid_side(num_tokens)?;
    Ok(resample_grid(source, old_side, new_side, hidden).into_dyn())
}

fn resample_grid(
    source: ArrayView3<'_, f32>,
    old_side: usize,
    new_side: usize,
    hidden: usize,
) -> Array3<f32> {
    let taps = linear_taps(old_side, new_side);
    let cell = |row: usize, col: usize, c: usize| source[[0, 1 + row * old_side + col, c]];

    Array3::from_shape_fn((1, 1 + new_side * new_side, hidden), |(_, token, c)| {
        if token == 0 {
            return source[[0, 0, c]];
        }
        let (row, col) = ((token - 1) / new_side, (token - 1) % new_side);
        let (r0, r1, tr) = taps[row];
        let (c0, c1, tc) = taps[col];
        let top = (1.0 - tc) * cell(r0, c0, c) + tc * cell(r0, c1, c);
        let bottom = (1.0 - tc) * cell(r1, c0, c) + tc * cell(r1, c1, c);
        (1.0 - tr) * top + tr * bottom
    })
}

/// Neighbouring input indices and the weight of the upper one, per output index.
fn linear_taps(len_in: usize, len_out: usize) -> Vec<(usize, usize, f32)> {
    let scale = if len_out > 1 {
        (len_in - 1) as f64 / (len_out - 1) as f64
    } else {
        0.0
    };
    (0..len_out)
        .map(|o| {
            let x = o as f64 * scale;
            let lo = (x.floor() as usize).min(len_in - 1);
            let hi = (lo + 1).min(len_in - 1);
            (lo, hi, (x - lo as f64) as f32)
        })
        .collect()
}

fn invalid_shape(actual: &[usize], num_tokens: usize) -> Error {
    Error::ShapeMismatch {
        key: "pos_embed".to_string(),
        expected: vec![1, num_tokens, actual.last().copied().unwrap_or(0)],
        actual: actual.to_vec(),
    }
}
