//! Named parameter collections.

use std::collections::BTreeMap;

use ndarray::ArrayD;
use rand::Rng;

use crate::error::{Error, Result};
use crate::init::Init;

/// Plain key to array mapping, as read from a checkpoint.
pub type ParamMap = BTreeMap<String, ArrayD<f32>>;

/// A model parameter with its initialization policy.
#[derive(Debug, Clone)]
struct Param {
    value: ArrayD<f32>,
    init: Init,
}

impl Param {
    fn value(&self) -> &ArrayD<f32> {
        &self.value
    }

    fn shape(&self) -> &[usize] {
        self.value.shape()
    }
}

/// Parameter storage of a model.
///
/// Keys and shapes are fixed when a parameter is registered; afterwards only
/// values change, either by assignment of a same-shaped array or by drawing
/// again from the parameter's [`Init`].
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    params: BTreeMap<String, Param>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter and initialize it.
    pub fn register<R: Rng + ?Sized>(
        &mut self,
        key: impl Into<String>,
        shape: &[usize],
        init: Init,
        rng: &mut R,
    ) {
        let value = init.sample(shape, rng);
        self.params.insert(key.into(), Param { value, init });
    }

    pub fn get(&self, key: &str) -> Option<&ArrayD<f32>> {
        self.params.get(key).map(Param::value)
    }

    pub fn shape(&self, key: &str) -> Option<&[usize]> {
        self.params.get(key).map(Param::shape)
    }

    /// Overwrite the value of `key`; the shape must match exactly.
    pub fn assign(&mut self, key: &str, value: ArrayD<f32>) -> Result<()> {
        let param = self
            .params
            .get_mut(key)
            .ok_or_else(|| Error::UnknownParam(key.to_string()))?;
        if param.value.shape() != value.shape() {
            return Err(Error::ShapeMismatch {
                key: key.to_string(),
                expected: param.value.shape().to_vec(),
                actual: value.shape().to_vec(),
            });
        }
        param.value = value;
        Ok(())
    }

    /// Redraw `key` from its initialization policy.
    pub fn reinitialize<R: Rng + ?Sized>(&mut self, key: &str, rng: &mut R) -> Result<()> {
        let param = self
            .params
            .get_mut(key)
            .ok_or_else(|| Error::UnknownParam(key.to_string()))?;
        param.value = param.init.sample(param.value.shape(), rng);
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArrayD<f32>)> {
        self.params.iter().map(|(k, p)| (k.as_str(), &p.value))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Total number of scalar values.
    pub fn num_params(&self) -> usize {
        self.params.values().map(|p| p.value.len()).sum()
    }

    /// Copy values out into a plain mapping.
    pub fn to_param_map(&self) -> ParamMap {
        self.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }
}
