//! Parameter layout of the ViT classifier.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::adapter::{AdaptReport, CheckpointAdapter};
use crate::config::ViTConfig;
use crate::error::Result;
use crate::init::Init;
use crate::params::{ParamMap, ParamStore};

/// Vision Transformer classifier parameters.
///
/// Owns its parameter storage and the RNG used for initialization, so a
/// model built twice from the same config and seed is identical.
#[derive(Debug, Clone)]
pub struct VisionTransformer {
    config: ViTConfig,
    params: ParamStore,
    rng: StdRng,
}

impl VisionTransformer {
    /// Build and initialize a model. The config is validated first.
    pub fn new(config: ViTConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let params = build_params(&config, &mut rng);
        Ok(Self {
            config,
            params,
            rng,
        })
    }

    pub fn config(&self) -> &ViTConfig {
        &self.config
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    /// Load pretrained weights from a foreign checkpoint (non-strict).
    pub fn load_pretrained(&mut self, source: &ParamMap) -> Result<AdaptReport> {
        self.load_pretrained_with(&CheckpointAdapter::default(), source)
    }

    pub fn load_pretrained_with(
        &mut self,
        adapter: &CheckpointAdapter,
        source: &ParamMap,
    ) -> Result<AdaptReport> {
        adapter.adapt(source, &mut self.params, &mut self.rng)
    }
}

fn build_params(config: &ViTConfig, rng: &mut StdRng) -> ParamStore {
    let h = config.hidden_size;
    let m = config.ffn_hidden_size;
    let [ph, pw] = config.patch_size;
    let mut params = ParamStore::new();

    params.register(
        "patch_embed.proj.weight",
        &[h, config.in_channels, ph, pw],
        Init::KaimingNormal { fan_out: h * ph * pw },
        rng,
    );
    params.register("patch_embed.proj.bias", &[h], Init::Zeros, rng);

    let tokens = Init::TruncNormal { std: 0.02 };
    params.register("cls_token", &[1, 1, h], tokens, rng);
    params.register("pos_embed", &[1, config.seq_length(), h], tokens, rng);

    for layer in 0..config.depth {
        let prefix = format!("encoder.layers.{}", layer);
        register_norm(&mut params, &format!("{prefix}.norm1"), h, rng);
        for proj in ["query_dense", "key_dense", "value_dense", "output_dense"] {
            register_linear(&mut params, &format!("{prefix}.attn.{proj}"), h, h, rng);
        }
        register_norm(&mut params, &format!("{prefix}.norm2"), h, rng);
        register_linear(&mut params, &format!("{prefix}.mlp.fc1"), h, m, rng);
        register_linear(&mut params, &format!("{prefix}.mlp.fc2"), m, h, rng);
    }
    register_norm(&mut params, "encoder.encoder_norm", h, rng);

    if let Some(r) = config.representation_size {
        register_linear(&mut params, "pre_logits.fc", h, r, rng);
    }
    register_linear(
        &mut params,
        "head",
        config.head_in_features(),
        config.num_classes,
        rng,
    );

    params
}

fn register_linear(
    params: &mut ParamStore,
    prefix: &str,
    in_features: usize,
    out_features: usize,
    rng: &mut StdRng,
) {
    params.register(
        format!("{prefix}.weight"),
        &[out_features, in_features],
        Init::linear(in_features, out_features),
        rng,
    );
    params.register(format!("{prefix}.bias"), &[out_features], Init::Zeros, rng);
}

fn register_norm(params: &mut ParamStore, prefix: &str, size: usize, rng: &mut StdRng) {
    params.register(format!("{prefix}.weight"), &[size], Init::Ones, rng);
    params.register(format!("{prefix}.bias"), &[size], Init::Zeros, rng);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preset;

    fn tiny_config() -> ViTConfig {
        ViTConfig {
            img_size: [32, 32],
            patch_size: [8, 8],
            depth: 2,
            hidden_size: 16,
            ffn_hidden_size: 32,
            num_attention_heads: 4,
            num_classes: 5,
            ..Preset::B16.config()
        }
    }

    #[test]
    fn test_schema_shapes() {
        let model = VisionTransformer::new(tiny_config(), 0).unwrap();
        let params = model.params();
        assert_eq!(params.shape("patch_embed.proj.weight"), Some(&[16, 3, 8, 8][..]));
        assert_eq!(params.shape("cls_token"), Some(&[1, 1, 16][..]));
        assert_eq!(params.shape("pos_embed"), Some(&[1, 17, 16][..]));
        assert_eq!(
            params.shape("encoder.layers.1.attn.output_dense.weight"),
            Some(&[16, 16][..])
        );
        assert_eq!(params.shape("encoder.layers.0.mlp.fc1.weight"), Some(&[32, 16][..]));
        assert_eq!(params.shape("encoder.layers.0.mlp.fc2.weight"), Some(&[16, 32][..]));
        assert_eq!(params.shape("encoder.encoder_norm.bias"), Some(&[16][..]));
        assert_eq!(params.shape("head.weight"), Some(&[5, 16][..]));
        assert_eq!(params.shape("head.bias"), Some(&[5][..]));
        assert_eq!(params.shape("pre_logits.fc.weight"), None);
        assert_eq!(params.shape("encoder.layers.2.norm1.weight"), None);
    }

    #[test]
    fn test_param_count_matches_summary() {
        for representation_size in [None, Some(8)] {
            let config = ViTConfig {
                representation_size,
                ..tiny_config()
            };
            let summary = config.compute_summary();
            let model = VisionTransformer::new(config, 0).unwrap();
            assert_eq!(model.params().num_params(), summary.total_params);
        }
    }

    #[test]
    fn test_pre_logits_feed_head() {
        let config = ViTConfig {
            representation_size: Some(8),
            ..tiny_config()
        };
        let model = VisionTransformer::new(config, 0).unwrap();
        assert_eq!(model.params().shape("pre_logits.fc.weight"), Some(&[8, 16][..]));
        assert_eq!(model.params().shape("head.weight"), Some(&[5, 8][..]));
    }

    #[test]
    fn test_initialization() {
        let model = VisionTransformer::new(tiny_config(), 0).unwrap();
        let params = model.params();
        assert!(params.get("head.bias").unwrap().iter().all(|&v| v == 0.0));
        assert!(params
            .get("encoder.layers.0.norm1.weight")
            .unwrap()
            .iter()
            .all(|&v| v == 1.0));
        assert!(params.get("pos_embed").unwrap().iter().all(|v| v.abs() <= 0.04));
    }

    #[test]
    fn test_seed_reproducible() {
        let a = VisionTransformer::new(tiny_config(), 11).unwrap();
        let b = VisionTransformer::new(tiny_config(), 11).unwrap();
        let c = VisionTransformer::new(tiny_config(), 12).unwrap();
        assert_eq!(a.params().to_param_map(), b.params().to_param_map());
        assert_ne!(a.params().to_param_map(), c.params().to_param_map());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ViTConfig {
            num_attention_heads: 5,
            ..tiny_config()
        };
        assert!(VisionTransformer::new(config, 0).is_err());
    }
}
