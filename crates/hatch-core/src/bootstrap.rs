//! The post-generation bootstrap pipeline.
//!
//! Steps run strictly in [`StepId::ALL`] order against the generated project
//! root. Each step is guarded by the environment snapshot and produces a
//! [`StepOutcome`]; the driver records it and either continues or aborts:
//!
//! - must-succeed step fails: the run stops with [`Aborted`]
//! - best-effort step fails: a warning is logged and the run continues
//! - guard says skip: nothing is executed
//!
//! The pipeline is forward-only. Running it twice on the same directory is
//! not supported.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{EnvOverrides, PipelineConfig};
use crate::context::GenerationContext;
use crate::error::{HatchError, Result};
use crate::normalize::normalize_file;
use crate::notify;
use crate::origin::Resolver;
use crate::paths;
use crate::provenance::ProvenanceRecord;
use crate::runner::{run_checked, CommandRunner, Invocation};
use crate::step::{Decision, PlannedStep, Policy, StepId, StepOutcome, StepRecord, StepStatus};

const GITHUB_ORG_KEY: &str = "github_org";
const PROJECT_NAME_KEY: &str = "project_name";

#[derive(Debug, Clone, Default, Serialize)]
pub struct BootstrapReport {
    pub steps: Vec<StepRecord>,
    /// Operator-facing notices to print once the run is over.
    pub notices: Vec<String>,
}

impl BootstrapReport {
    pub fn status_of(&self, step: StepId) -> Option<&StepStatus> {
        self.steps
            .iter()
            .find(|r| r.step == step)
            .map(|r| &r.status)
    }
}

/// A must-succeed step failed. `report` holds the steps that completed.
#[derive(Debug, Error)]
#[error("bootstrap aborted at step '{step}': {source}")]
pub struct Aborted {
    pub step: StepId,
    #[source]
    pub source: HatchError,
    pub report: BootstrapReport,
}

pub struct Bootstrap<'a> {
    root: PathBuf,
    config: PipelineConfig,
    env: EnvOverrides,
    context: GenerationContext,
    runner: &'a dyn CommandRunner,
    seed_file: Option<PathBuf>,
    clock: fn() -> DateTime<Utc>,
    record: Option<ProvenanceRecord>,
}

impl<'a> Bootstrap<'a> {
    pub fn new(
        root: &Path,
        config: PipelineConfig,
        env: EnvOverrides,
        context: GenerationContext,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            env,
            context,
            runner,
            seed_file: None,
            clock: Utc::now,
            record: None,
        }
    }

    /// Delete the seed context once provenance is written, so the build-only
    /// answers it holds are not committed. Files outside the root are kept.
    pub fn with_seed_file(mut self, path: PathBuf) -> Self {
        self.seed_file = Some(path);
        self
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Every step with its policy and guard decision, without running any.
    pub fn plan(&self) -> Vec<PlannedStep> {
        StepId::ALL
            .into_iter()
            .map(|step| PlannedStep {
                step,
                policy: step.policy(),
                decision: self.guard(step),
            })
            .collect()
    }

    pub fn run(mut self) -> std::result::Result<BootstrapReport, Aborted> {
        let mut report = BootstrapReport::default();

        for step in StepId::ALL {
            let outcome = match self.guard(step) {
                Decision::Skip(reason) => StepOutcome::Skipped { reason },
                Decision::Run => {
                    info!(step = %step, "running step");
                    self.execute(step, &mut report)
                }
            };

            let status = match outcome {
                StepOutcome::Ok => StepStatus::Done,
                StepOutcome::Skipped { reason } => {
                    info!(step = %step, reason, "skipping step");
                    StepStatus::Skipped { reason }
                }
                StepOutcome::SoftFailure { detail } => {
                    warn!(step = %step, detail = %detail, "best-effort step failed; continuing");
                    StepStatus::SoftFailed { detail }
                }
                StepOutcome::HardFailure(source) => {
                    return Err(Aborted {
                        step,
                        source,
                        report,
                    });
                }
            };
            report.steps.push(StepRecord { step, status });
        }

        info!("bootstrap complete");
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Guards
    // -----------------------------------------------------------------------

    fn guard(&self, step: StepId) -> Decision {
        match step {
            StepId::ConfigureIdentity if !self.env.is_upstream_ci(&self.config.ci_repository) => {
                Decision::Skip("not running in the upstream template CI")
            }
            StepId::Push | StepId::ForceReconcileRelease | StepId::CutRelease
                if self.env.skip_push =>
            {
                Decision::Skip("SKIP_GIT_PUSH=true")
            }
            StepId::ForceReconcileRelease if !self.env.allow_force_push => {
                Decision::Skip("force push not allowed")
            }
            StepId::NotifyOptionalIntegration if !self.registry_enabled() => {
                Decision::Skip("registry publishing not enabled")
            }
            _ => Decision::Run,
        }
    }

    fn registry_enabled(&self) -> bool {
        match &self.record {
            Some(record) => notify::registry_publishing_enabled(record),
            None => self.context.get_str(notify::REGISTRY_ANSWER) == Some("yes"),
        }
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    fn execute(&mut self, step: StepId, report: &mut BootstrapReport) -> StepOutcome {
        let result = match step {
            StepId::Init => self.init(step),
            StepId::Normalize => self.normalize(),
            StepId::ConfigureIdentity => self.configure_identity(step),
            StepId::RecordProvenance => self.record_provenance(),
            StepId::Lock => self.lock(step),
            StepId::StageAll => self.check(step, self.git().args(["add", "-A"])),
            StepId::ConfigureRemote => self.configure_remote(step),
            StepId::Commit => self.commit(step),
            StepId::Push => self.push(step),
            StepId::ForceReconcileRelease => return self.reconcile_release(step),
            StepId::CutRelease => self.check(step, self.task().arg("release")),
            StepId::BestEffortInit => self.check(step, self.task().arg("init")),
            StepId::NotifyOptionalIntegration => {
                report.notices.push(notify::registry_notice());
                Ok(())
            }
        };

        match (result, step.policy()) {
            (Ok(()), _) => StepOutcome::Ok,
            (Err(e), Policy::MustSucceed) => StepOutcome::HardFailure(e),
            (Err(e), Policy::BestEffort) => StepOutcome::SoftFailure {
                detail: describe(&e),
            },
        }
    }

    fn init(&self, step: StepId) -> Result<()> {
        let branch = format!("--initial-branch={}", self.config.initial_branch);
        self.check(step, self.git().args(["init", branch.as_str()]))
    }

    fn normalize(&self) -> Result<()> {
        let path = self.config.dictionary_path(&self.root);
        let changed = normalize_file(&path)?;
        debug!(path = %path.display(), changed, "normalized word list");
        Ok(())
    }

    fn configure_identity(&self, step: StepId) -> Result<()> {
        let identity = &self.config.identity;
        self.check(
            step,
            self.git()
                .args(["config", "--global", "user.name", identity.name.as_str()]),
        )?;
        self.check(
            step,
            self.git()
                .args(["config", "--global", "user.email", identity.email.as_str()]),
        )
    }

    fn record_provenance(&mut self) -> Result<()> {
        let output_dir = self.root.join(self.context.output_dir()?);
        let origin = Resolver::new(self.runner, &self.config.tools.git)
            .with_timeout(self.config.step_timeout())
            .resolve(self.context.template()?, &output_dir, self.context.checkout())?;
        let record = ProvenanceRecord::from_context(&self.context, origin, (self.clock)())?;
        record.write(&self.root)?;
        info!(
            path = %paths::provenance_path(&self.root).display(),
            commit = %record.origin.template.commit_hash,
            "wrote provenance record"
        );

        if let Some(seed) = self.seed_file.as_deref().filter(|s| s.starts_with(&self.root)) {
            if crate::io::remove_if_exists(seed)? {
                debug!(path = %seed.display(), "removed seed context");
            }
        }

        self.record = Some(record);
        Ok(())
    }

    fn lock(&self, step: StepId) -> Result<()> {
        let (program, args) = self
            .config
            .tools
            .lock
            .split_first()
            .ok_or_else(|| HatchError::InvalidConfig("'tools.lock' must name a program".into()))?;
        self.check(step, self.cmd(program).args(args.iter().cloned()))
    }

    fn configure_remote(&self, step: StepId) -> Result<()> {
        let record = self
            .record
            .as_ref()
            .ok_or_else(|| HatchError::ProvenanceNotFound(paths::provenance_path(&self.root)))?;
        let url = self.config.remote_url(
            record.require_parameter(GITHUB_ORG_KEY)?,
            record.require_parameter(PROJECT_NAME_KEY)?,
        );
        info!(url = %url, "adding origin remote");
        self.check(
            step,
            self.git().args(["remote", "add", "origin", url.as_str()]),
        )
    }

    fn commit(&self, step: StepId) -> Result<()> {
        let author = format!("--author={}", self.config.identity.author());
        self.check(
            step,
            self.git().args([
                "commit",
                "-m",
                self.config.commit_message.as_str(),
                author.as_str(),
            ]),
        )
    }

    fn push(&self, step: StepId) -> Result<()> {
        let mut inv = self.git().args([
            "push",
            "--set-upstream",
            "origin",
            self.config.initial_branch.as_str(),
        ]);
        if self.env.allow_force_push {
            inv = inv.arg("--force");
        }
        self.check(step, inv)
    }

    /// Delete the release tag remotely and, when the release CLI is installed,
    /// the hosted release. Both attempts always run; the tag may not exist.
    fn reconcile_release(&self, step: StepId) -> StepOutcome {
        let tag = self.config.release_tag.as_str();
        let mut failures = Vec::new();

        let inv = self
            .git()
            .args(["push", "--delete", "origin", tag])
            .discard_output();
        if let Err(e) = run_checked(self.runner, step.as_str(), &inv) {
            failures.push(e.to_string());
        }

        let cli = self.config.tools.release_cli.as_str();
        if self.runner.is_available(cli) {
            let inv = self
                .cmd(cli)
                .args(["release", "delete", tag, "--yes"])
                .discard_output();
            if let Err(e) = run_checked(self.runner, step.as_str(), &inv) {
                failures.push(e.to_string());
            }
        } else {
            debug!(program = cli, "release CLI not found; leaving hosted release alone");
        }

        if failures.is_empty() {
            StepOutcome::Ok
        } else {
            StepOutcome::SoftFailure {
                detail: failures.join("; "),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Invocation helpers
    // -----------------------------------------------------------------------

    fn cmd(&self, program: &str) -> Invocation {
        Invocation::new(program, &self.root).timeout(self.config.step_timeout())
    }

    fn git(&self) -> Invocation {
        self.cmd(&self.config.tools.git)
    }

    fn task(&self) -> Invocation {
        self.cmd(&self.config.tools.task)
    }

    fn check(&self, step: StepId, invocation: Invocation) -> Result<()> {
        run_checked(self.runner, step.as_str(), &invocation)?;
        Ok(())
    }
}

fn describe(err: &HatchError) -> String {
    match err {
        HatchError::Process(failure) => {
            format!("{failure}: {}", failure.stderr_or_placeholder().trim())
        }
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
