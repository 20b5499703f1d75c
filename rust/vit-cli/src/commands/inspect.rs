//! Inspect command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use vit_core::{KeyRemapper, Remapped, checkpoint};

/// Run the inspect command.
pub fn run(checkpoint_path: &Path, format: &str) -> Result<()> {
    let params = checkpoint::load(checkpoint_path)
        .with_context(|| format!("Failed to load checkpoint from {:?}", checkpoint_path))?;
    let remapper = KeyRemapper::default();

    let mut rows = Vec::with_capacity(params.len());
    for (key, value) in &params {
        let target = match remapper.remap(key)? {
            Remapped::Key(target) => Some(target),
            Remapped::Drop => None,
        };
        rows.push((key.as_str(), value.shape().to_vec(), target));
    }

    match format {
        "json" => {
            let tensors: Vec<_> = rows
                .iter()
                .map(|(key, shape, target)| {
                    serde_json::json!({ "key": key, "shape": shape, "target": target })
                })
                .collect();
            let result = serde_json::json!({
                "checkpoint": checkpoint_path.display().to_string(),
                "num_tensors": rows.len(),
                "num_params": params.values().map(|v| v.len()).sum::<usize>(),
                "tensors": tensors,
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Checkpoint: {:?} ({} tensors)", checkpoint_path, rows.len());
            for (key, shape, target) in &rows {
                let target = target.as_deref().unwrap_or("(dropped)");
                println!("  {:<60} {:<20} -> {}", key, format!("{:?}", shape), target);
            }
        }
    }

    Ok(())
}
