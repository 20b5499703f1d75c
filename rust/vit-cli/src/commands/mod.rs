pub mod adapt;
pub mod inspect;
pub mod summarize;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result, bail};
use vit_core::{Preset, ViTConfig};

/// Load a config from a YAML file or a named preset.
pub fn resolve_config(config: Option<&Path>, preset: Option<&str>) -> Result<ViTConfig> {
    match (config, preset) {
        (Some(path), None) => ViTConfig::from_yaml(path)
            .with_context(|| format!("Failed to load config from {:?}", path)),
        (None, Some(name)) => {
            let preset: Preset = name.parse()?;
            Ok(preset.config())
        }
        _ => bail!("Specify exactly one of --config or --preset"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_preset() {
        let config = resolve_config(None, Some("ViT-L_16")).unwrap();
        assert_eq!(config.depth, 24);
        assert!(resolve_config(None, Some("tiny")).is_err());
    }

    #[test]
    fn test_resolve_requires_one_source() {
        assert!(resolve_config(None, None).is_err());
        assert!(resolve_config(Some(Path::new("a.yaml")), Some("b16")).is_err());
    }
}
