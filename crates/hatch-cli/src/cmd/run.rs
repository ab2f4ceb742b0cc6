use crate::output::{print_json, print_table};
use anyhow::Context;
use hatch_core::{
    bootstrap::{Aborted, Bootstrap},
    config::{EnvOverrides, PipelineConfig, WarnLevel},
    context::GenerationContext,
    paths,
    runner::ProcessRunner,
    step::Decision,
    HatchError,
};
use std::path::Path;
use tracing::{error, warn};

pub fn run(root: &Path, context: Option<&Path>, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let env = EnvOverrides::from_env();
    if !env.run_post_hook {
        warn!("RUN_POST_HOOK=false; skipping post-generation bootstrap");
        return Ok(());
    }

    let root = root
        .canonicalize()
        .with_context(|| format!("project root {} does not exist", root.display()))?;

    let config = PipelineConfig::load(&root).context("failed to load .hatch.yaml")?;
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => warn!("config: {}", w.message),
            WarnLevel::Error => error!("config: {}", w.message),
        }
    }
    config.ensure_valid()?;

    let seed = match context {
        Some(p) => {
            let cwd = std::env::current_dir().context("cannot read current directory")?;
            paths::resolve(&cwd, p)
        }
        None => paths::context_path(&root),
    };
    let ctx = GenerationContext::load(&seed)
        .with_context(|| format!("failed to load generation context {}", seed.display()))?;

    let runner = ProcessRunner;
    let bootstrap = Bootstrap::new(&root, config, env, ctx, &runner).with_seed_file(seed);

    if dry_run {
        let plan = bootstrap.plan();
        if json {
            print_json(&plan)?;
        } else {
            let rows = plan
                .iter()
                .map(|p| {
                    let decision = match p.decision {
                        Decision::Run => "run".to_string(),
                        Decision::Skip(reason) => format!("skip ({reason})"),
                    };
                    vec![p.step.to_string(), p.policy.as_str().to_string(), decision]
                })
                .collect();
            print_table(&["STEP", "POLICY", "DECISION"], rows);
        }
        return Ok(());
    }

    let report = match bootstrap.run() {
        Ok(report) => report,
        Err(aborted) => {
            log_abort(&aborted);
            return Err(aborted.into());
        }
    };

    if json {
        print_json(&report)?;
    } else {
        for notice in &report.notices {
            println!("{notice}");
        }
        println!("Bootstrapped {}", root.display());
    }

    Ok(())
}

fn log_abort(aborted: &Aborted) {
    match &aborted.source {
        HatchError::Process(failure) => error!(
            step = %aborted.step,
            exit_code = ?failure.exit_code,
            stdout = failure.stdout_or_placeholder(),
            stderr = failure.stderr_or_placeholder(),
            "{failure}"
        ),
        other => error!(step = %aborted.step, error = %other, "bootstrap step failed"),
    }
}
