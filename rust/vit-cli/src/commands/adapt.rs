//! Adapt command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use vit_core::{ViTConfig, VisionTransformer, checkpoint};

/// Run the adapt command.
pub fn run(
    config: ViTConfig,
    checkpoint_path: &Path,
    output_path: &Path,
    seed: u64,
    format: &str,
) -> Result<()> {
    let mut model =
        VisionTransformer::new(config, seed).with_context(|| "Configuration validation failed")?;

    let source = checkpoint::load(checkpoint_path)
        .with_context(|| format!("Failed to load checkpoint from {:?}", checkpoint_path))?;
    info!(tensors = source.len(), "adapting checkpoint");

    let report = model
        .load_pretrained(&source)
        .with_context(|| format!("Failed to adapt checkpoint {:?}", checkpoint_path))?;

    checkpoint::save(model.params().iter(), output_path)
        .with_context(|| format!("Failed to write adapted parameters to {:?}", output_path))?;

    match format {
        "json" => {
            let result = serde_json::json!({
                "checkpoint": checkpoint_path.display().to_string(),
                "output": output_path.display().to_string(),
                "num_params": model.params().num_params(),
                "report": report,
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print!("{}", report);
            println!("Wrote {} tensors to {:?}", model.params().len(), output_path);
        }
    }

    Ok(())
}
