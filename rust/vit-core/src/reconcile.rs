//! Shape reconciliation for the parameters that need special handling.

use ndarray::ArrayD;
use rand::Rng;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::params::ParamStore;
use crate::remap::RenamedParams;
use crate::resample::resample_pos_embed;

/// A checkpoint key that bypasses the generic assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialKey {
    /// Key in the renamed checkpoint.
    pub source: &'static str,
    /// Key in the target storage.
    pub target: &'static str,
    /// Source stores `(in, out)`, the target `(out, in)`.
    pub transpose: bool,
}

pub const HEAD_WEIGHT: SpecialKey = SpecialKey {
    source: "head/kernel",
    target: "head.weight",
    transpose: true,
};

pub const HEAD_BIAS: SpecialKey = SpecialKey {
    source: "head/bias",
    target: "head.bias",
    transpose: false,
};

pub const POS_EMBED: SpecialKey = SpecialKey {
    source: "pos_embed",
    target: "pos_embed",
    transpose: false,
};

/// What happened to a special key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Copied verbatim.
    Copied,
    /// Source shape did not fit; target redrawn from its init policy.
    Reinitialized {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// Grid resampled from `from` to `to` tokens, then copied.
    Resampled { from: usize, to: usize },
    /// Absent from the checkpoint; target left as is.
    Missing,
}

/// Load a head parameter, falling back to re-initialization on mismatch.
///
/// The key is removed from `renamed` whatever the outcome.
pub fn reconcile_head<R: Rng + ?Sized>(
    key: SpecialKey,
    renamed: &mut RenamedParams<'_>,
    target: &mut ParamStore,
    rng: &mut R,
) -> Result<Outcome> {
    let expected = target_shape(target, key.target)?;
    let Some(value) = renamed.remove(key.source) else {
        return Ok(Outcome::Missing);
    };

    let value: ArrayD<f32> = if key.transpose {
        value.t().as_standard_layout().into_owned()
    } else {
        value.clone()
    };

    if value.shape() == expected.as_slice() {
        target.assign(key.target, value)?;
        Ok(Outcome::Copied)
    } else {
        target.reinitialize(key.target, rng)?;
        Ok(Outcome::Reinitialized {
            expected,
            actual: value.shape().to_vec(),
        })
    }
}

/// Load the positional embedding, resampling the patch grid when the token
/// count differs.
///
/// Batch and hidden dimensions must agree; anything else is an error.
pub fn reconcile_pos_embed(
    renamed: &mut RenamedParams<'_>,
    target: &mut ParamStore,
) -> Result<Outcome> {
    let key = POS_EMBED;
    let expected = target_shape(target, key.target)?;
    let Some(value) = renamed.remove(key.source) else {
        return Ok(Outcome::Missing);
    };

    if value.shape() == expected.as_slice() {
        target.assign(key.target, value.clone())?;
        return Ok(Outcome::Copied);
    }

    let compatible = value.ndim() == 3
        && expected.len() == 3
        && value.shape()[0] == expected[0]
        && value.shape()[2] == expected[2];
    if !compatible {
        return Err(Error::ShapeMismatch {
            key: key.target.to_string(),
            expected,
            actual: value.shape().to_vec(),
        });
    }

    let (from, to) = (value.shape()[1], expected[1]);
    let resampled = resample_pos_embed(value, to)?;
    target.assign(key.target, resampled)?;
    Ok(Outcome::Resampled { from, to })
}

fn target_shape(target: &ParamStore, key: &str) -> Result<Vec<usize>> {
    target
        .shape(key)
        .map(<[usize]>::to_vec)
        .ok_or_else(|| Error::UnknownParam(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::{Init, xavier_bound};
    use crate::params::ParamMap;
    use ndarray::{Array2, Array3};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn head_target(num_classes: usize, hidden: usize) -> ParamStore {
        let mut rng = StdRng::seed_from_u64(0);
        let mut store = ParamStore::new();
        store.register(
            "head.weight",
            &[num_classes, hidden],
            Init::linear(hidden, num_classes),
            &mut rng,
        );
        store.register("head.bias", &[num_classes], Init::Zeros, &mut rng);
        store.register("pos_embed", &[1, 5, hidden], Init::TruncNormal { std: 0.02 }, &mut rng);
        store
    }

    #[test]
    fn test_head_kernel_is_transposed() {
        let mut source = ParamMap::new();
        let kernel = Array2::from_shape_fn((4, 3), |(i, o)| (i * 10 + o) as f32);
        source.insert("head/kernel".into(), kernel.clone().into_dyn());
        let mut renamed: RenamedParams = source.iter().map(|(k, v)| (k.clone(), v)).collect();

        let mut target = head_target(3, 4);
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = reconcile_head(HEAD_WEIGHT, &mut renamed, &mut target, &mut rng).unwrap();
        assert_eq!(outcome, Outcome::Copied);
        assert_eq!(target.get("head.weight").unwrap(), &kernel.t().into_owned().into_dyn());
        assert!(renamed.is_empty());
    }

    #[test]
    fn test_head_mismatch_reinitializes() {
        let mut source = ParamMap::new();
        source.insert("head/kernel".into(), ArrayD::from_elem(vec![4, 1000], 5.0));
        source.insert("head/bias".into(), ArrayD::from_elem(vec![1000], 5.0));
        let mut renamed: RenamedParams = source.iter().map(|(k, v)| (k.clone(), v)).collect();

        let mut target = head_target(10, 4);
        target.assign("head.bias", ArrayD::ones(vec![10])).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let weight = reconcile_head(HEAD_WEIGHT, &mut renamed, &mut target, &mut rng).unwrap();
        assert_eq!(
            weight,
            Outcome::Reinitialized {
                expected: vec![10, 4],
                actual: vec![1000, 4],
            }
        );
        let bound = xavier_bound(4, 10);
        assert!(target.get("head.weight").unwrap().iter().all(|v| v.abs() <= bound));

        let bias = reconcile_head(HEAD_BIAS, &mut renamed, &mut target, &mut rng).unwrap();
        assert!(matches!(bias, Outcome::Reinitialized { .. }));
        assert!(target.get("head.bias").unwrap().iter().all(|&v| v == 0.0));
        assert!(renamed.is_empty());
    }

    #[test]
    fn test_missing_head_leaves_target() {
        let source = ParamMap::new();
        let mut renamed: RenamedParams = source.iter().map(|(k, v)| (k.clone(), v)).collect();
        let mut target = head_target(3, 4);
        let before = target.get("head.weight").unwrap().clone();
        let mut rng = StdRng::seed_from_u64(1);

        let outcome = reconcile_head(HEAD_WEIGHT, &mut renamed, &mut target, &mut rng).unwrap();
        assert_eq!(outcome, Outcome::Missing);
        assert_eq!(target.get("head.weight").unwrap(), &before);
    }

    #[test]
    fn test_pos_embed_resampled() {
        let mut source = ParamMap::new();
        let pos = Array3::from_shape_fn((1, 17, 4), |(_, t, c)| (t * 4 + c) as f32);
        source.insert("pos_embed".into(), pos.into_dyn());
        let mut renamed: RenamedParams = source.iter().map(|(k, v)| (k.clone(), v)).collect();
        let mut target = head_target(3, 4);

        let outcome = reconcile_pos_embed(&mut renamed, &mut target).unwrap();
        assert_eq!(outcome, Outcome::Resampled { from: 17, to: 5 });
        let loaded = target.get("pos_embed").unwrap();
        assert_eq!(loaded.shape(), &[1, 5, 4]);
        for c in 0..4 {
            assert_eq!(loaded[[0, 0, c]], c as f32);
        }
    }

    #[test]
    fn test_pos_embed_hidden_mismatch_fails() {
        let mut source = ParamMap::new();
        source.insert("pos_embed".into(), ArrayD::zeros(vec![1, 17, 8]));
        let mut renamed: RenamedParams = source.iter().map(|(k, v)| (k.clone(), v)).collect();
        let mut target = head_target(3, 4);
        assert!(matches!(
            reconcile_pos_embed(&mut renamed, &mut target),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
