//! Rewriting of checkpoint parameter names onto this model's layout.
//!
//! Rules are an ordered list evaluated until the first match; a key that no
//! rule matches keeps its name and is matched against the target as-is.

use std::collections::BTreeMap;

use ndarray::ArrayD;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::params::ParamMap;

/// Outcome of remapping a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remapped {
    Key(String),
    Drop,
}

#[derive(Debug, Clone)]
enum Rule {
    /// Replace `prefix` with `replacement`.
    Rename {
        prefix: &'static str,
        replacement: &'static str,
    },
    /// `<prefix>.<i>.<component>...` to `<replacement>.<i>.<renamed component>...`
    Layer {
        prefix: &'static str,
        replacement: &'static str,
        components: &'static [(&'static str, &'static str)],
    },
    Drop { prefix: &'static str },
}

const VIT_LAYER_COMPONENTS: &[(&str, &str)] = &[
    ("attention.attention.query", "attn.query_dense"),
    ("attention.attention.key", "attn.key_dense"),
    ("attention.attention.value", "attn.value_dense"),
    ("attention.output.dense", "attn.output_dense"),
    ("intermediate.dense", "mlp.fc1"),
    ("output.dense", "mlp.fc2"),
    ("layernorm_before", "norm1"),
    ("layernorm_after", "norm2"),
];

/// Ordered key rewriting rules.
#[derive(Debug, Clone)]
pub struct KeyRemapper {
    rules: Vec<Rule>,
}

impl Default for KeyRemapper {
    fn default() -> Self {
        Self::huggingface_vit()
    }
}

/// Renamed view of a source mapping. Arrays are borrowed, never copied.
pub type RenamedParams<'a> = BTreeMap<String, &'a ArrayD<f32>>;

impl KeyRemapper {
    /// Rules for checkpoints exported from Hugging Face `ViTModel`.
    pub fn huggingface_vit() -> Self {
        Self {
            rules: vec![
                Rule::Rename {
                    prefix: "embeddings.patch_embeddings.projection",
                    replacement: "patch_embed.proj",
                },
                Rule::Rename {
                    prefix: "embeddings.cls_token",
                    replacement: "cls_token",
                },
                Rule::Rename {
                    prefix: "embeddings.position_embeddings",
                    replacement: "pos_embed",
                },
                Rule::Layer {
                    prefix: "encoder.layer",
                    replacement: "encoder.layers",
                    components: VIT_LAYER_COMPONENTS,
                },
                Rule::Drop { prefix: "pooler" },
            ],
        }
    }

    /// Remap one source key.
    pub fn remap(&self, key: &str) -> Result<Remapped> {
        for rule in &self.rules {
            match rule {
                Rule::Rename {
                    prefix,
                    replacement,
                } => {
                    if let Some(rest) = key.strip_prefix(prefix) {
                        return Ok(Remapped::Key(format!("{replacement}{rest}")));
                    }
                }
                Rule::Layer {
                    prefix,
                    replacement,
                    components,
                } => {
                    if let Some(rest) = key.strip_prefix(prefix).and_then(|r| r.strip_prefix('.'))
                    {
                        return remap_layer_key(key, rest, replacement, components);
                    }
                }
                Rule::Drop { prefix } => {
                    if key.starts_with(prefix) {
                        return Ok(Remapped::Drop);
                    }
                }
            }
        }
        Ok(Remapped::Key(key.to_string()))
    }

    /// Remap every key of `source`, skipping dropped keys.
    ///
    /// Returns the renamed view and the number of dropped keys. When two
    /// source keys land on the same name the later one (in key order) wins.
    pub fn remap_all<'a>(&self, source: &'a ParamMap) -> Result<(RenamedParams<'a>, usize)> {
        let mut renamed = RenamedParams::new();
        let mut dropped = 0;
        for (key, value) in source {
            match self.remap(key)? {
                Remapped::Key(new_key) => {
                    if renamed.insert(new_key.clone(), value).is_some() {
                        warn!(key = %key, renamed = %new_key, "duplicate target key, overriding");
                    }
                }
                Remapped::Drop => {
                    debug!(key = %key, "dropping unused checkpoint key");
                    dropped += 1;
                }
            }
        }
        Ok((renamed, dropped))
    }
}

fn remap_layer_key(
    key: &str,
    rest: &str,
    replacement: &str,
    components: &[(&str, &str)],
) -> Result<Remapped> {
    let (index, component) = match rest.split_once('.') {
        Some((index, component)) => (index, Some(component)),
        None => (rest, None),
    };
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidLayerKey {
            key: key.to_string(),
        });
    }

    let Some(component) = component else {
        return Ok(Remapped::Key(format!("{replacement}.{index}")));
    };
    let component = components
        .iter()
        .find_map(|(from, to)| {
            component
                .strip_prefix(from)
                .map(|tail| format!("{to}{tail}"))
        })
        .unwrap_or_else(|| component.to_string());
    Ok(Remapped::Key(format!("{replacement}.{index}.{component}")))
}
