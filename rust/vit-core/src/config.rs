//! ViT classifier configuration and named presets.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the encoder output is reduced before the head.
///
/// Only class-token pooling is supported: the positional embedding always
/// carries the class token that the resampler sets aside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Classifier {
    #[default]
    Token,
}

/// Built-in model sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    B16,
    B32,
    L16,
    L32,
    H14,
}

impl Preset {
    pub const ALL: [Preset; 5] = [Preset::B16, Preset::B32, Preset::L16, Preset::L32, Preset::H14];

    /// Canonical name, e.g. `ViT-B_16`.
    pub fn name(&self) -> &'static str {
        match self {
            Preset::B16 => "ViT-B_16",
            Preset::B32 => "ViT-B_32",
            Preset::L16 => "ViT-L_16",
            Preset::L32 => "ViT-L_32",
            Preset::H14 => "ViT-H_14",
        }
    }

    /// Build the configuration for this preset with ImageNet defaults.
    pub fn config(&self) -> ViTConfig {
        let (patch, hidden_size, ffn_hidden_size, num_attention_heads, depth, attention_dropout) =
            match self {
                Preset::B16 => (16, 768, 3072, 12, 12, 0.1),
                Preset::B32 => (32, 768, 3072, 12, 12, 0.1),
                Preset::L16 => (16, 1024, 4096, 16, 24, 0.0),
                Preset::L32 => (32, 1024, 4096, 16, 24, 0.0),
                Preset::H14 => (14, 1280, 5120, 16, 32, 0.0),
            };
        ViTConfig {
            in_channels: default_in_channels(),
            img_size: default_img_size(),
            patch_size: [patch, patch],
            num_classes: default_num_classes(),
            depth,
            hidden_size,
            ffn_hidden_size,
            num_attention_heads,
            hidden_dropout: default_dropout(),
            attention_dropout,
            classifier: Classifier::Token,
            representation_size: None,
        }
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .trim_start_matches("vit")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "b16" => Ok(Preset::B16),
            "b32" => Ok(Preset::B32),
            "l16" => Ok(Preset::L16),
            "l32" => Ok(Preset::L32),
            "h14" => Ok(Preset::H14),
            _ => Err(Error::UnknownPreset(s.to_string())),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Vision Transformer classifier configuration.
///
/// Every parameter shape of [`crate::VisionTransformer`] is a function of
/// this struct, so two models built from equal configs share a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViTConfig {
    // Inputs
    #[serde(default = "default_in_channels")]
    pub in_channels: usize,
    #[serde(default = "default_img_size")]
    pub img_size: [usize; 2],
    pub patch_size: [usize; 2],

    // Transformer architecture
    pub depth: usize,
    pub hidden_size: usize,
    pub ffn_hidden_size: usize,
    pub num_attention_heads: usize,

    #[serde(default = "default_dropout")]
    pub hidden_dropout: f32,
    #[serde(default = "default_dropout")]
    pub attention_dropout: f32,

    // Head
    #[serde(default)]
    pub classifier: Classifier,
    #[serde(default)]
    pub representation_size: Option<usize>,
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,
}

fn default_in_channels() -> usize {
    3
}
fn default_img_size() -> [usize; 2] {
    [224, 224]
}
fn default_dropout() -> f32 {
    0.1
}
fn default_num_classes() -> usize {
    1000
}

impl ViTConfig {
    /// Load a ViTConfig from a YAML file.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_yaml_str(&content)
    }

    /// Parse a ViTConfig from a YAML string.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: ViTConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        for (img, patch) in self.img_size.iter().zip(self.patch_size.iter()) {
            if *patch == 0 || img % patch != 0 {
                return Err(Error::Validation(format!(
                    "img_size {} must be divisible by patch_size {}",
                    img, patch
                )));
            }
        }

        // The positional embedding is a square grid plus the class token
        let [rows, cols] = self.grid_size();
        if rows != cols {
            return Err(Error::Validation(format!(
                "patch grid must be square, got {}x{}",
                rows, cols
            )));
        }

        if self.num_attention_heads == 0 || self.hidden_size % self.num_attention_heads != 0 {
            return Err(Error::Validation(format!(
                "hidden_size ({}) must be divisible by num_attention_heads ({})",
                self.hidden_size, self.num_attention_heads
            )));
        }

        if self.depth == 0 {
            return Err(Error::Validation("depth must be > 0".to_string()));
        }
        if self.in_channels == 0 {
            return Err(Error::Validation("in_channels must be > 0".to_string()));
        }
        if self.ffn_hidden_size == 0 {
            return Err(Error::Validation("ffn_hidden_size must be > 0".to_string()));
        }
        if self.num_classes == 0 {
            return Err(Error::Validation("num_classes must be > 0".to_string()));
        }
        if self.representation_size == Some(0) {
            return Err(Error::Validation(
                "representation_size must be > 0 when set".to_string(),
            ));
        }

        for (name, rate) in [
            ("hidden_dropout", self.hidden_dropout),
            ("attention_dropout", self.attention_dropout),
        ] {
            if !(0.0..1.0).contains(&rate) {
                return Err(Error::Validation(format!(
                    "{} must be in [0, 1), got {}",
                    name, rate
                )));
            }
        }

        Ok(())
    }

    /// Patch grid size as `[rows, cols]`.
    pub fn grid_size(&self) -> [usize; 2] {
        [
            self.img_size[0] / self.patch_size[0].max(1),
            self.img_size[1] / self.patch_size[1].max(1),
        ]
    }

    /// Compute the number of tokens after patch embedding.
    pub fn num_patches(&self) -> usize {
        self.grid_size().iter().product()
    }

    /// Sequence length including the class token.
    pub fn seq_length(&self) -> usize {
        self.num_patches() + 1
    }

    /// Get the head dimension.
    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }

    /// Input width of the classification head.
    pub fn head_in_features(&self) -> usize {
        self.representation_size.unwrap_or(self.hidden_size)
    }

    /// Compute a summary of the model's architecture and parameters.
    pub fn compute_summary(&self) -> ModelSummary {
        let h = self.hidden_size;
        let m = self.ffn_hidden_size;

        // Conv weight + bias
        let patch_embed_params = self.in_channels * h * self.patch_size.iter().product::<usize>() + h;

        let token_params = h;
        let pos_embed_params = self.seq_length() * h;

        // q, k, v and output projections
        let attn_params = 4 * (h * h + h);
        let mlp_params = (h * m + m) + (m * h + h);
        // LayerNorm has weight and bias, two per layer
        let norm_params = 2 * 2 * h;
        let params_per_layer = attn_params + mlp_params + norm_params;
        let encoder_params = params_per_layer * self.depth;

        let final_norm_params = 2 * h;

        let pre_logits_params = self.representation_size.map_or(0, |r| h * r + r);
        let head_params = self.head_in_features() * self.num_classes + self.num_classes;

        let total_params = patch_embed_params
            + token_params
            + pos_embed_params
            + encoder_params
            + final_norm_params
            + pre_logits_params
            + head_params;

        ModelSummary {
            total_params,
            patch_embed_params,
            token_params,
            pos_embed_params,
            params_per_layer,
            encoder_params,
            final_norm_params,
            pre_logits_params,
            head_params,
            depth: self.depth,
            hidden_size: h,
            ffn_hidden_size: m,
            num_attention_heads: self.num_attention_heads,
            head_dim: self.head_dim(),
            num_patches: self.num_patches(),
            seq_length: self.seq_length(),
            num_classes: self.num_classes,
            classifier: self.classifier,
        }
    }
}

/// Summary of model architecture and parameter counts.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub total_params: usize,
    pub patch_embed_params: usize,
    pub token_params: usize,
    pub pos_embed_params: usize,
    pub params_per_layer: usize,
    pub encoder_params: usize,
    pub final_norm_params: usize,
    pub pre_logits_params: usize,
    pub head_params: usize,
    pub depth: usize,
    pub hidden_size: usize,
    pub ffn_hidden_size: usize,
    pub num_attention_heads: usize,
    pub head_dim: usize,
    pub num_patches: usize,
    pub seq_length: usize,
    pub num_classes: usize,
    pub classifier: Classifier,
}

impl ModelSummary {
    /// Memory for model parameters in bytes, stored as f32.
    pub fn param_memory_bytes(&self) -> usize {
        self.total_params * std::mem::size_of::<f32>()
    }

    /// Format the summary as a human-readable string.
    pub fn display(&self) -> String {
        let param_mb = self.param_memory_bytes() as f64 / 1_000_000.0;
        let total_m = self.total_params as f64 / 1_000_000.0;

        format!(
            r#"Model Summary
=============
Architecture:
  Depth:              {}
  Hidden Size:        {}
  MLP Size:           {}
  Attention Heads:    {}
  Head Dimension:     {}
  Classifier:         {:?}
  Classes:            {}

Sequence:
  Num Patches:        {}
  Sequence Length:    {}

Parameters:
  Total:              {:.2}M
  Patch Embedding:    {}
  Class Token:        {}
  Position Embedding: {}
  Encoder:            {}
  Per Layer:          {}
  Final Norm:         {}
  Pre-logits:         {}
  Head:               {}

Memory:
  Parameters:         {:.2} MB (f32)"#,
            self.depth,
            self.hidden_size,
            self.ffn_hidden_size,
            self.num_attention_heads,
            self.head_dim,
            self.classifier,
            self.num_classes,
            self.num_patches,
            self.seq_length,
            total_m,
            self.patch_embed_params,
            self.token_params,
            self.pos_embed_params,
            self.encoder_params,
            self.params_per_layer,
            self.final_norm_params,
            self.pre_logits_params,
            self.head_params,
            param_mb,
        )
    }
}
