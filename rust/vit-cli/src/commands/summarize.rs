//! Summarize command implementation.

use anyhow::{Context, Result};
use vit_core::ViTConfig;

/// Run the summarize command.
pub fn run(config: &ViTConfig, format: &str) -> Result<()> {
    config
        .validate()
        .with_context(|| "Configuration validation failed")?;

    let summary = config.compute_summary();

    match format {
        "json" => {
            let result = serde_json::json!({
                "architecture": {
                    "depth": summary.depth,
                    "hidden_size": summary.hidden_size,
                    "ffn_hidden_size": summary.ffn_hidden_size,
                    "num_attention_heads": summary.num_attention_heads,
                    "head_dim": summary.head_dim,
                    "classifier": summary.classifier,
                    "num_classes": summary.num_classes,
                },
                "sequence": {
                    "num_patches": summary.num_patches,
                    "seq_length": summary.seq_length,
                },
                "parameters": {
                    "total": summary.total_params,
                    "total_millions": summary.total_params as f64 / 1_000_000.0,
                    "patch_embed": summary.patch_embed_params,
                    "class_token": summary.token_params,
                    "pos_embed": summary.pos_embed_params,
                    "encoder": summary.encoder_params,
                    "per_layer": summary.params_per_layer,
                    "final_norm": summary.final_norm_params,
                    "pre_logits": summary.pre_logits_params,
                    "head": summary.head_params,
                },
                "memory": {
                    "params_bytes": summary.param_memory_bytes(),
                    "params_mb": summary.param_memory_bytes() as f64 / 1_000_000.0,
                },
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("{}", summary.display());
        }
    }

    Ok(())
}
