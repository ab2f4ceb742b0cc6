use crate::error::{HatchError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Environment variables
// ---------------------------------------------------------------------------

pub const RUN_POST_HOOK_ENV: &str = "RUN_POST_HOOK";
pub const SKIP_GIT_PUSH_ENV: &str = "SKIP_GIT_PUSH";
pub const ALLOW_FORCE_PUSH_ENV: &str = "ALLOW_FORCE_PUSH";
pub const GITHUB_ACTIONS_ENV: &str = "GITHUB_ACTIONS";
pub const GITHUB_REPOSITORY_ENV: &str = "GITHUB_REPOSITORY";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Name and email used for the initial commit and CI git configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default = "default_identity_name")]
    pub name: String,
    #[serde(default = "default_identity_email")]
    pub email: String,
}

fn default_identity_name() -> String {
    "Zenable Automation".to_string()
}

fn default_identity_email() -> String {
    "automation@zenable.io".to_string()
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: default_identity_name(),
            email: default_identity_email(),
        }
    }
}

impl Identity {
    /// `Name <email>`, the form git expects for `--author`.
    pub fn author(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

// ---------------------------------------------------------------------------
// ToolsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_git")]
    pub git: String,
    /// Full command line that regenerates the dependency lock file.
    #[serde(default = "default_lock")]
    pub lock: Vec<String>,
    #[serde(default = "default_task")]
    pub task: String,
    /// Hosted-release CLI; only used when found on `PATH`.
    #[serde(default = "default_release_cli")]
    pub release_cli: String,
}

fn default_git() -> String {
    "git".to_string()
}

fn default_lock() -> Vec<String> {
    vec!["uv".to_string(), "lock".to_string(), "--upgrade".to_string()]
}

fn default_task() -> String {
    "task".to_string()
}

fn default_release_cli() -> String {
    "gh".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            git: default_git(),
            lock: default_lock(),
            task: default_task(),
            release_cli: default_release_cli(),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_initial_branch")]
    pub initial_branch: String,
    #[serde(default)]
    pub identity: Identity,
    /// `owner/repo` whose own CI runs get the automation identity.
    #[serde(default = "default_ci_repository")]
    pub ci_repository: String,
    /// Formatted with `{github_org}` and `{project_name}` answers.
    #[serde(default = "default_remote_template")]
    pub remote_template: String,
    #[serde(default = "default_release_tag")]
    pub release_tag: String,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
    /// Word list normalized before the first commit, relative to the root.
    #[serde(default = "default_dictionary")]
    pub dictionary: PathBuf,
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Upper bound for each external command; unbounded when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_timeout_secs: Option<u64>,
}

fn default_initial_branch() -> String {
    "main".to_string()
}

fn default_ci_repository() -> String {
    "Zenable-io/ai-native-python".to_string()
}

fn default_remote_template() -> String {
    "https://github.com/{github_org}/{project_name}".to_string()
}

fn default_release_tag() -> String {
    "v0.1.0".to_string()
}

fn default_commit_message() -> String {
    "feat(project): initial project generation".to_string()
}

fn default_dictionary() -> PathBuf {
    PathBuf::from(paths::DICTIONARY_FILE)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            initial_branch: default_initial_branch(),
            identity: Identity::default(),
            ci_repository: default_ci_repository(),
            remote_template: default_remote_template(),
            release_tag: default_release_tag(),
            commit_message: default_commit_message(),
            dictionary: default_dictionary(),
            tools: ToolsConfig::default(),
            step_timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Load `.hatch.yaml` from `root`, or defaults when it does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: PipelineConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }

    pub fn dictionary_path(&self, root: &Path) -> PathBuf {
        root.join(&self.dictionary)
    }

    pub fn remote_url(&self, github_org: &str, project_name: &str) -> String {
        self.remote_template
            .replace("{github_org}", github_org)
            .replace("{project_name}", project_name)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        for (field, value) in [
            ("initial_branch", &self.initial_branch),
            ("release_tag", &self.release_tag),
            ("commit_message", &self.commit_message),
            ("tools.git", &self.tools.git),
            ("tools.task", &self.tools.task),
            ("tools.release_cli", &self.tools.release_cli),
        ] {
            if value.trim().is_empty() {
                error(format!("'{field}' must not be empty"));
            }
        }

        if self.tools.lock.first().map_or(true, |p| p.trim().is_empty()) {
            error("'tools.lock' must name a program".to_string());
        }

        if self.step_timeout_secs == Some(0) {
            error("'step_timeout_secs' must be greater than zero".to_string());
        }

        for placeholder in ["{github_org}", "{project_name}"] {
            if !self.remote_template.contains(placeholder) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "'remote_template' does not use {placeholder}; every project gets the same remote"
                    ),
                });
            }
        }

        warnings
    }

    /// Fail on the first error-level warning.
    pub fn ensure_valid(&self) -> Result<()> {
        match self
            .validate()
            .into_iter()
            .find(|w| w.level == WarnLevel::Error)
        {
            Some(w) => Err(HatchError::InvalidConfig(w.message)),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// EnvOverrides
// ---------------------------------------------------------------------------

/// Snapshot of the environment switches the pipeline honours.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// False only when `RUN_POST_HOOK=false`.
    pub run_post_hook: bool,
    pub skip_push: bool,
    pub allow_force_push: bool,
    pub github_actions: bool,
    pub github_repository: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_true = |key: &str| lookup(key).as_deref() == Some("true");
        Self {
            run_post_hook: lookup(RUN_POST_HOOK_ENV).as_deref() != Some("false"),
            skip_push: is_true(SKIP_GIT_PUSH_ENV),
            allow_force_push: is_true(ALLOW_FORCE_PUSH_ENV),
            github_actions: is_true(GITHUB_ACTIONS_ENV),
            github_repository: lookup(GITHUB_REPOSITORY_ENV),
        }
    }

    /// True inside the upstream template's own CI runs.
    pub fn is_upstream_ci(&self, upstream: &str) -> bool {
        self.github_actions && self.github_repository.as_deref() == Some(upstream)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
