//! Validate command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use vit_core::{HEAD_BIAS, HEAD_WEIGHT, POS_EMBED, ViTConfig, grid_side};

/// Shape a pretrained checkpoint is reconciled against.
#[derive(Debug, Serialize)]
struct AdaptTarget {
    key: &'static str,
    shape: Vec<usize>,
}

/// Target shapes of the keys the adapter reconciles instead of copying.
fn adapt_targets(config: &ViTConfig) -> Vec<AdaptTarget> {
    vec![
        AdaptTarget {
            key: HEAD_WEIGHT.target,
            shape: vec![config.num_classes, config.head_in_features()],
        },
        AdaptTarget {
            key: HEAD_BIAS.target,
            shape: vec![config.num_classes],
        },
        AdaptTarget {
            key: POS_EMBED.target,
            shape: vec![1, config.seq_length(), config.hidden_size],
        },
    ]
}

/// Run the validate command.
pub fn run(config: &ViTConfig, source: &str, format: &str) -> Result<()> {
    config
        .validate()
        .with_context(|| format!("Configuration validation failed for {}", source))?;

    // A valid config always yields a grid the resampler accepts
    let side = grid_side(config.seq_length())
        .with_context(|| "Positional embedding grid is not square")?;
    let summary = config.compute_summary();
    let targets = adapt_targets(config);

    match format {
        "json" => {
            let result = serde_json::json!({
                "valid": true,
                "source": source,
                "grid": [side, side],
                "seq_length": summary.seq_length,
                "head_in_features": config.head_in_features(),
                "num_classes": summary.num_classes,
                "total_params": summary.total_params,
                "adapt_targets": targets,
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Config is valid: {}", source);
            println!("  Patch Grid: {}x{} ({} tokens)", side, side, summary.seq_length);
            println!("  Head: {} -> {} classes", config.head_in_features(), summary.num_classes);
            println!("  Parameters: {}", summary.total_params);
            println!("  Adapted keys:");
            for target in &targets {
                println!("    {:<12} {:?}", target.key, target.shape);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vit_core::{Preset, VisionTransformer};

    #[test]
    fn test_adapt_targets_match_model_shapes() {
        let mut config = Preset::B16.config();
        config.img_size = [32, 32];
        config.depth = 1;
        config.hidden_size = 16;
        config.ffn_hidden_size = 32;
        config.num_attention_heads = 4;
        config.num_classes = 10;
        config.representation_size = Some(8);

        let model = VisionTransformer::new(config.clone(), 0).unwrap();
        for target in adapt_targets(&config) {
            assert_eq!(model.params().shape(target.key), Some(target.shape.as_slice()));
        }
    }

    #[test]
    fn test_run_rejects_invalid_config() {
        let mut config = Preset::B32.config();
        config.img_size = [224, 192];
        assert!(run(&config, "b32", "text").is_err());
        assert!(run(&Preset::B32.config(), "b32", "json").is_ok());
    }
}
