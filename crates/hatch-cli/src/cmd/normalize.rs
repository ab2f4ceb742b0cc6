use crate::output::print_json;
use anyhow::Context;
use hatch_core::{config::PipelineConfig, normalize::normalize_file, paths};
use std::path::Path;

pub fn run(root: &Path, file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let path = match file {
        Some(f) => {
            let cwd = std::env::current_dir().context("cannot read current directory")?;
            paths::resolve_lexically(&cwd, f)
        }
        None => PipelineConfig::load(root)
            .context("failed to load .hatch.yaml")?
            .dictionary_path(root),
    };

    let changed = normalize_file(&path)
        .with_context(|| format!("failed to normalize {}", path.display()))?;

    if json {
        print_json(&serde_json::json!({
            "path": path.display().to_string(),
            "changed": changed,
        }))?;
    } else if changed {
        println!("Normalized {}", path.display());
    } else {
        println!("{} already normalized", path.display());
    }

    Ok(())
}
