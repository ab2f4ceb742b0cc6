use crate::output::print_json;
use anyhow::Context;
use hatch_core::{config::PipelineConfig, origin::Resolver, paths, runner::ProcessRunner};
use std::path::Path;

pub fn run(
    root: &Path,
    template: &str,
    output_dir: Option<&Path>,
    checkout: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let config = PipelineConfig::load(root).context("failed to load .hatch.yaml")?;
    let cwd = std::env::current_dir().context("cannot read current directory")?;
    let output_dir = match output_dir {
        Some(dir) => paths::resolve(&cwd, dir),
        None => cwd,
    };

    let origin = Resolver::new(&ProcessRunner, &config.tools.git)
        .with_timeout(config.step_timeout())
        .resolve(template, &output_dir, checkout)
        .with_context(|| format!("cannot resolve template '{template}'"))?;

    if json {
        print_json(&origin)?;
    } else {
        println!("kind:        {}", origin.kind);
        println!("location:    {}", origin.location);
        println!("branch:      {}", origin.branch);
        println!("commit hash: {}", origin.commit_hash);
        println!("dirty:       {}", origin.dirty);
    }

    Ok(())
}
