//! Adaptation of a foreign pretrained checkpoint onto a model's parameters.
//!
//! The sequence is: rename keys, reconcile the head and positional embedding,
//! then assign whatever is left by exact key match. Loading is non-strict:
//! keys present on only one side are reported, not rejected.

use std::fmt;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::params::{ParamMap, ParamStore};
use crate::reconcile::{
    HEAD_BIAS, HEAD_WEIGHT, Outcome, POS_EMBED, SpecialKey, reconcile_head, reconcile_pos_embed,
};
use crate::remap::KeyRemapper;

/// Outcome of one special key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecialOutcome {
    pub source: String,
    pub target: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Diagnostics of an adaptation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdaptReport {
    /// Target keys whose values now come from the checkpoint.
    pub copied: Vec<String>,
    /// Target keys redrawn from their initialization policy.
    pub reinitialized: Vec<String>,
    /// Keys left untouched: special keys absent from the checkpoint, special
    /// target names found literally in it, and generic keys whose shape
    /// differs from the target.
    pub skipped: Vec<String>,
    /// Renamed checkpoint keys with no target counterpart.
    pub unexpected_keys: Vec<String>,
    /// Target keys nothing in the checkpoint addressed.
    pub missing_keys: Vec<String>,
    /// Checkpoint keys discarded by the remapper.
    pub dropped: usize,
    /// Per special key outcome, in processing order.
    pub special: Vec<SpecialOutcome>,
}

impl AdaptReport {
    pub fn num_copied(&self) -> usize {
        self.copied.len()
    }

    pub fn num_reinitialized(&self) -> usize {
        self.reinitialized.len()
    }

    pub fn num_skipped(&self) -> usize {
        self.skipped.len()
    }

    pub fn num_unmatched(&self) -> usize {
        self.unexpected_keys.len() + self.missing_keys.len()
    }

    /// The special-key outcome for `target`, if it was processed.
    pub fn outcome(&self, target: &str) -> Option<&Outcome> {
        self.special
            .iter()
            .find(|s| s.target == target)
            .map(|s| &s.outcome)
    }

    /// Final one-line summary of the non-strict load.
    pub fn summary(&self) -> String {
        format!(
            "loaded with message: missing_keys={:?}, unexpected_keys={:?}",
            self.missing_keys, self.unexpected_keys
        )
    }

    /// Human-readable report, one line per special-key outcome then the summary.
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.special.iter().map(describe).collect();
        lines.push(format!(
            "copied {}, reinitialized {}, skipped {}, unmatched {}, dropped {}",
            self.num_copied(),
            self.num_reinitialized(),
            self.num_skipped(),
            self.num_unmatched(),
            self.dropped
        ));
        lines.push(self.summary());
        lines
    }

    fn record(&mut self, key: SpecialKey, outcome: Outcome) {
        match &outcome {
            Outcome::Copied | Outcome::Resampled { .. } => self.copied.push(key.target.to_string()),
            Outcome::Reinitialized { .. } => self.reinitialized.push(key.target.to_string()),
            Outcome::Missing => self.skipped.push(key.target.to_string()),
        }
        let special = SpecialOutcome {
            source: key.source.to_string(),
            target: key.target.to_string(),
            outcome,
        };
        match &special.outcome {
            Outcome::Reinitialized { .. } | Outcome::Missing => warn!("{}", describe(&special)),
            Outcome::Resampled { .. } => info!("{}", describe(&special)),
            Outcome::Copied => debug!("{}", describe(&special)),
        }
        self.special.push(special);
    }
}

impl fmt::Display for AdaptReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

fn describe(special: &SpecialOutcome) -> String {
    match &special.outcome {
        Outcome::Copied => format!("'{}': loaded", special.target),
        Outcome::Reinitialized { expected, actual } => format!(
            "'{}': shape mismatch (expected {:?}, got {:?}), reinitializing",
            special.target, expected, actual
        ),
        Outcome::Resampled { from, to } => format!(
            "'{}': resampled grid from {} to {} tokens",
            special.target, from, to
        ),
        Outcome::Missing => format!("'{}': key not found, skipping", special.source),
    }
}

/// Adapts checkpoints using a fixed set of key rules.
#[derive(Debug, Clone, Default)]
pub struct CheckpointAdapter {
    remapper: KeyRemapper,
}

impl CheckpointAdapter {
    pub fn new(remapper: KeyRemapper) -> Self {
        Self { remapper }
    }

    /// Load `source` into `target`.
    ///
    /// `rng` drives re-initialization of mismatched head parameters. Fails
    /// only on structurally invalid input: a non-numeric layer index or a
    /// positional embedding that cannot be resampled.
    pub fn adapt<R: Rng + ?Sized>(
        &self,
        source: &ParamMap,
        target: &mut ParamStore,
        rng: &mut R,
    ) -> Result<AdaptReport> {
        let (mut renamed, dropped) = self.remapper.remap_all(source)?;
        let mut report = AdaptReport {
            dropped,
            ..AdaptReport::default()
        };

        for key in [HEAD_WEIGHT, HEAD_BIAS] {
            let outcome = reconcile_head(key, &mut renamed, target, rng)?;
            report.record(key, outcome);
        }
        let outcome = reconcile_pos_embed(&mut renamed, target)?;
        report.record(POS_EMBED, outcome);

        let special_targets = [HEAD_WEIGHT.target, HEAD_BIAS.target, POS_EMBED.target];
        for (key, value) in &renamed {
            // Special targets are only ever written by the reconciler
            if special_targets.contains(&key.as_str()) {
                warn!(key = %key, "literal special key in checkpoint, skipping");
                report.skipped.push(key.clone());
                continue;
            }
            match target.shape(key).map(<[usize]>::to_vec) {
                None => report.unexpected_keys.push(key.clone()),
                Some(shape) if shape.as_slice() != value.shape() => {
                    warn!(
                        key = %key,
                        expected = ?shape,
                        actual = ?value.shape(),
                        "shape mismatch, skipping"
                    );
                    report.skipped.push(key.clone());
                }
                Some(_) => {
                    target.assign(key, (*value).clone())?;
                    debug!(key = %key, "loaded");
                    report.copied.push(key.clone());
                }
            }
        }

        report.missing_keys = target
            .keys()
            .filter(|k| !special_targets.contains(k) && !renamed.contains_key(*k))
            .map(str::to_string)
            .collect();

        info!("{}", report.summary());
        Ok(report)
    }
}

/// Load `source` into `target` with the default key rules.
pub fn adapt<R: Rng + ?Sized>(
    source: &ParamMap,
    target: &mut ParamStore,
    rng: &mut R,
) -> Result<AdaptReport> {
    CheckpointAdapter::default().adapt(source, target, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::Init;
    use ndarray::ArrayD;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn target() -> ParamStore {
        let mut rng = StdRng::seed_from_u64(0);
        let mut store = ParamStore::new();
        store.register("cls_token", &[1, 1, 4], Init::TruncNormal { std: 0.02 }, &mut rng);
        store.register("pos_embed", &[1, 5, 4], Init::TruncNormal { std: 0.02 }, &mut rng);
        store.register("encoder.layers.0.norm1.weight", &[4], Init::Ones, &mut rng);
        store.register("encoder.layers.0.norm1.bias", &[4], Init::Zeros, &mut rng);
        store.register("head.weight", &[2, 4], Init::linear(4, 2), &mut rng);
        store.register("head.bias", &[2], Init::Zeros, &mut rng);
        store
    }

    #[test]
    fn test_generic_assignment_is_non_strict() {
        let mut source = ParamMap::new();
        source.insert("embeddings.cls_token".into(), ArrayD::from_elem(vec![1, 1, 4], 3.0));
        source.insert(
            "encoder.layer.0.layernorm_before.weight".into(),
            ArrayD::from_elem(vec![4], 2.0),
        );
        source.insert(
            "encoder.layer.0.layernorm_before.bias".into(),
            ArrayD::from_elem(vec![5], 2.0),
        );
        source.insert("layernorm.weight".into(), ArrayD::from_elem(vec![4], 1.0));
        source.insert("pooler.dense.weight".into(), ArrayD::zeros(vec![4, 4]));

        let mut target = target();
        let mut rng = StdRng::seed_from_u64(1);
        let report = adapt(&source, &mut target, &mut rng).unwrap();

        assert_eq!(
            report.copied,
            vec!["cls_token", "encoder.layers.0.norm1.weight"]
        );
        assert!(target.get("cls_token").unwrap().iter().all(|&v| v == 3.0));
        assert_eq!(report.skipped.len(), 4);
        assert!(report.skipped.contains(&"encoder.layers.0.norm1.bias".to_string()));
        assert_eq!(report.unexpected_keys, vec!["layernorm.weight"]);
        assert!(report.missing_keys.is_empty());
        assert_eq!(report.dropped, 1);
        assert_eq!(report.outcome("pos_embed"), Some(&Outcome::Missing));
    }

    #[test]
    fn test_literal_head_key_does_not_override_reinit() {
        let mut source = ParamMap::new();
        source.insert("head/kernel".into(), ArrayD::zeros(vec![4, 1000]));
        source.insert("head.weight".into(), ArrayD::from_elem(vec![2, 4], 7.0));

        let mut target = target();
        let report = adapt(&source, &mut target, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(report.reinitialized, vec!["head.weight"]);
        assert!(!report.copied.contains(&"head.weight".to_string()));
        assert!(report.skipped.contains(&"head.weight".to_string()));
        assert!(target.get("head.weight").unwrap().iter().all(|&v| v != 7.0));
    }

    #[test]
    fn test_missing_keys_exclude_special_keys() {
        let source = ParamMap::new();
        let mut target = target();
        let report = adapt(&source, &mut target, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(
            report.missing_keys,
            vec![
                "cls_token",
                "encoder.layers.0.norm1.bias",
                "encoder.layers.0.norm1.weight"
            ]
        );
        assert_eq!(report.skipped, vec!["head.weight", "head.bias", "pos_embed"]);
        assert_eq!(report.num_reinitialized(), 0);
    }

    #[test]
    fn test_report_lines() {
        let mut source = ParamMap::new();
        source.insert("head/kernel".into(), ArrayD::zeros(vec![4, 1000]));
        let mut target = target();
        let report = adapt(&source, &mut target, &mut StdRng::seed_from_u64(1)).unwrap();
        let lines = report.lines();
        assert!(lines[0].contains("shape mismatch") && lines[0].contains("reinitializing"));
        assert!(lines[1].contains("'head/bias': key not found, skipping"));
        assert!(lines.last().unwrap().starts_with("loaded with message:"));
        assert_eq!(report.to_string().lines().count(), lines.len());
    }
}
