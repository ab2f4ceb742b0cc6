//! Template source resolution.
//!
//! A template identifier is classified by prefix first: URLs, SSH remotes and
//! provider shorthands (`gh:`, `gl:`, `bb:`) are remote, everything else is a
//! filesystem path. Remote templates are pinned with `git ls-remote`; local
//! templates are inspected in place. A local path that is not a git work-tree
//! root degrades to `unknown` facts instead of failing.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HatchError, Result};
use crate::paths;
use crate::runner::{run_checked, CommandRunner, Invocation, ProcessFailure};

pub const UNKNOWN: &str = "unknown";
pub const DEFAULT_BRANCH: &str = "main";

const STEP: &str = "resolve-template-origin";

const REMOTE_PREFIXES: [&str; 6] = ["http://", "https://", "git@", "gh:", "gl:", "bb:"];

const ABBREVIATIONS: [(&str, &str); 3] = [
    ("gh", "https://github.com/{0}.git"),
    ("gl", "https://gitlab.com/{0}.git"),
    ("bb", "https://bitbucket.org/{0}"),
];

// ---------------------------------------------------------------------------
// CommitHash
// ---------------------------------------------------------------------------

/// A full 40-character hex object id, or the `unknown` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitHash(String);

static HEX40_RE: OnceLock<Regex> = OnceLock::new();

fn hex40_re() -> &'static Regex {
    HEX40_RE.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{40}$").unwrap())
}

impl CommitHash {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw == UNKNOWN || hex40_re().is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(HatchError::InvalidCommitHash(raw.to_string()))
        }
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CommitHash {
    type Error = HatchError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<CommitHash> for String {
    fn from(hash: CommitHash) -> Self {
        hash.0
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// TemplateOrigin
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginKind {
    Remote,
    Local,
}

impl fmt::Display for OriginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginKind::Remote => f.write_str("remote"),
            OriginKind::Local => f.write_str("local"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateOrigin {
    pub kind: OriginKind,
    pub location: String,
    pub branch: String,
    pub commit_hash: CommitHash,
    pub dirty: bool,
}

impl TemplateOrigin {
    /// Facts recorded when a local template is not a git repository.
    pub fn unknown_local(location: &Path) -> Self {
        Self {
            kind: OriginKind::Local,
            location: location.display().to_string(),
            branch: UNKNOWN.to_string(),
            commit_hash: CommitHash::unknown(),
            dirty: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

pub fn is_remote(template: &str) -> bool {
    REMOTE_PREFIXES.iter().any(|p| template.starts_with(p))
}

pub fn classify(template: &str) -> OriginKind {
    if is_remote(template) {
        OriginKind::Remote
    } else {
        OriginKind::Local
    }
}

/// Expand a provider shorthand (`gh:org/repo`) into its clone URL.
/// Identifiers without a known shorthand are returned unchanged.
pub fn expand_abbreviations(template: &str) -> String {
    if let Some((_, url)) = ABBREVIATIONS.iter().find(|(abbr, _)| *abbr == template) {
        return url.to_string();
    }
    if let Some((prefix, rest)) = template.split_once(':') {
        if let Some((_, url)) = ABBREVIATIONS.iter().find(|(abbr, _)| *abbr == prefix) {
            return url.replace("{0}", rest);
        }
    }
    template.to_string()
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

pub struct Resolver<'a> {
    runner: &'a dyn CommandRunner,
    git: &'a str,
    timeout: Option<Duration>,
}

impl<'a> Resolver<'a> {
    pub fn new(runner: &'a dyn CommandRunner, git: &'a str) -> Self {
        Self {
            runner,
            git,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve `template` into origin facts.
    ///
    /// `output_dir` anchors relative local paths. `checkout` is the ref the
    /// generation run asked for; remote lookups fall back to `main`.
    pub fn resolve(
        &self,
        template: &str,
        output_dir: &Path,
        checkout: Option<&str>,
    ) -> Result<TemplateOrigin> {
        match classify(template) {
            OriginKind::Remote => {
                let branch = checkout
                    .filter(|c| !c.is_empty())
                    .unwrap_or(DEFAULT_BRANCH);
                self.resolve_remote(template, branch)
            }
            OriginKind::Local => {
                let path = paths::resolve(output_dir, Path::new(template));
                self.resolve_local(&path)
            }
        }
    }

    /// Git queries run under the C locale so diagnostics can be matched.
    fn git(&self, cwd: &Path) -> Invocation {
        Invocation::new(self.git, cwd)
            .timeout(self.timeout)
            .env("LC_ALL", "C")
            .env("LANGUAGE", "")
    }

    fn resolve_remote(&self, template: &str, branch: &str) -> Result<TemplateOrigin> {
        let url = expand_abbreviations(template);
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let inv = self.git(&cwd).args(["ls-remote", url.as_str(), branch]);
        let stdout = run_checked(self.runner, STEP, &inv)?.stdout_text();

        let head: String = stdout.trim_start().chars().take(40).collect();
        let commit_hash = match CommitHash::parse(&head) {
            Ok(hash) if !hash.is_unknown() => hash,
            _ => {
                warn!(
                    location = %url,
                    branch,
                    "ref not advertised by remote; recording unknown commit"
                );
                CommitHash::unknown()
            }
        };

        info!(location = %url, branch, commit = %commit_hash, "resolved remote template");
        Ok(TemplateOrigin {
            kind: OriginKind::Remote,
            location: url,
            branch: branch.to_string(),
            commit_hash,
            dirty: false,
        })
    }

    fn resolve_local(&self, path: &Path) -> Result<TemplateOrigin> {
        if !self.is_repository_root(path)? {
            warn!(
                location = %path.display(),
                "template is not a git repository; recording unknown origin"
            );
            return Ok(TemplateOrigin::unknown_local(path));
        }

        let branch = {
            let inv = self.git(path).args(["symbolic-ref", "--short", "-q", "HEAD"]);
            let out = self
                .runner
                .run(&inv)
                .map_err(|e| ProcessFailure::spawn(STEP, &inv, &e))?;
            if !out.success() {
                return Err(HatchError::DetachedHead(path.to_path_buf()));
            }
            out.stdout_text().trim().to_string()
        };

        let dirty = {
            let inv = self
                .git(path)
                .args(["status", "--porcelain", "--untracked-files=all"]);
            !run_checked(self.runner, STEP, &inv)?
                .stdout_text()
                .trim()
                .is_empty()
        };

        let commit_hash = {
            let inv = self.git(path).args(["rev-parse", "HEAD"]);
            let out = run_checked(self.runner, STEP, &inv)?;
            CommitHash::parse(out.stdout_text().trim())?
        };

        info!(
            location = %path.display(),
            branch = %branch,
            dirty,
            commit = %commit_hash,
            "resolved local template"
        );
        Ok(TemplateOrigin {
            kind: OriginKind::Local,
            location: path.display().to_string(),
            branch,
            commit_hash,
            dirty,
        })
    }

    /// True only when `path` itself is the top of a git work tree. A
    /// directory nested inside an unrelated repository does not count.
    fn is_repository_root(&self, path: &Path) -> Result<bool> {
        if !path.is_dir() {
            return Ok(false);
        }
        let inv = self.git(path).args(["rev-parse", "--show-toplevel"]);
        let out = self
            .runner
            .run(&inv)
            .map_err(|e| ProcessFailure::spawn(STEP, &inv, &e))?;
        if !out.success() {
            if out.stderr_text().contains("not a git repository") {
                return Ok(false);
            }
            return Err(ProcessFailure::from_output(STEP, &inv, out).into());
        }
        let toplevel = PathBuf::from(out.stdout_text().trim());
        let toplevel = toplevel.canonicalize().unwrap_or(toplevel);
        let here = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Ok(toplevel == here)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::{Reply, ScriptedRunner};
    use crate::runner::ProcessRunner;
    use tempfile::TempDir;

    const SHA: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn remote_identifiers() {
        for t in [
            "https://example.com/x.git",
            "http://example.com/x.git",
            "gh:org/repo",
            "gl:org/repo",
            "bb:org/repo",
            "git@host:org/repo.git",
        ] {
            assert_eq!(classify(t), OriginKind::Remote, "expected remote: {t}");
        }
    }

    #[test]
    fn local_identifiers() {
        for t in ["./template", "../ai-native-python", "/srv/templates/py", "gh-pages"] {
            assert_eq!(classify(t), OriginKind::Local, "expected local: {t}");
        }
    }

    #[test]
    fn shorthand_expansion() {
        assert_eq!(
            expand_abbreviations("gh:org/repo"),
            "https://github.com/org/repo.git"
        );
        assert_eq!(
            expand_abbreviations("gl:org/repo"),
            "https://gitlab.com/org/repo.git"
        );
        assert_eq!(
            expand_abbreviations("bb:org/repo"),
            "https://bitbucket.org/org/repo"
        );
        assert_eq!(
            expand_abbreviations("git@host:org/repo.git"),
            "git@host:org/repo.git"
        );
        assert_eq!(
            expand_abbreviations("https://example.com/x.git"),
            "https://example.com/x.git"
        );
    }

    #[test]
    fn commit_hash_accepts_only_full_hex_or_unknown() {
        assert!(CommitHash::parse(SHA).is_ok());
        assert!(CommitHash::parse(&SHA.to_uppercase()).is_ok());
        assert!(CommitHash::parse("unknown").unwrap().is_unknown());
        for bad in ["", "abc123", &SHA[..39], "g123456789abcdef0123456789abcdef01234567"] {
            assert!(CommitHash::parse(bad).is_err(), "expected invalid: {bad}");
        }
    }

    #[test]
    fn commit_hash_rejected_on_deserialize() {
        let err = serde_yaml::from_str::<CommitHash>("deadbeef");
        assert!(err.is_err());
    }

    #[test]
    fn remote_shorthand_pins_first_forty_chars() {
        let runner = ScriptedRunner::new().on(
            &["git", "ls-remote"],
            Reply::ok(&format!("{SHA}\trefs/heads/main\n")),
        );
        let origin = Resolver::new(&runner, "git")
            .resolve("gh:org/repo", Path::new("/tmp"), None)
            .unwrap();
        assert_eq!(origin.kind, OriginKind::Remote);
        assert_eq!(origin.location, "https://github.com/org/repo.git");
        assert_eq!(origin.branch, "main");
        assert_eq!(origin.commit_hash.as_str(), SHA);
        assert!(!origin.dirty);
        assert!(runner.ran(&["git", "ls-remote", "https://github.com/org/repo.git", "main"]));
    }

    #[test]
    fn remote_uses_requested_checkout() {
        let runner = ScriptedRunner::new().on(
            &["git", "ls-remote"],
            Reply::ok(&format!("{SHA}\trefs/heads/develop\n")),
        );
        let origin = Resolver::new(&runner, "git")
            .resolve("https://example.com/x.git", Path::new("/tmp"), Some("develop"))
            .unwrap();
        assert_eq!(origin.branch, "develop");
        assert!(runner.ran(&["ls-remote", "https://example.com/x.git", "develop"]));
    }

    #[test]
    fn remote_missing_ref_records_unknown_commit() {
        let runner = ScriptedRunner::new().on(&["git", "ls-remote"], Reply::ok(""));
        let origin = Resolver::new(&runner, "git")
            .resolve("gh:org/repo", Path::new("/tmp"), None)
            .unwrap();
        assert_eq!(origin.kind, OriginKind::Remote);
        assert_eq!(origin.location, "https://github.com/org/repo.git");
        assert_eq!(origin.branch, "main");
        assert!(origin.commit_hash.is_unknown());
        assert!(!origin.dirty);
    }

    #[test]
    fn git_queries_run_under_c_locale() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("template")).unwrap();
        let runner = ScriptedRunner::new().on(
            &["git", "rev-parse", "--show-toplevel"],
            Reply::fail(128, "", "fatal: not a git repository"),
        );
        Resolver::new(&runner, "git")
            .resolve("template", dir.path(), None)
            .unwrap();
        let inv = &runner.invocations()[0];
        assert!(inv.env.contains(&("LC_ALL".to_string(), "C".to_string())));
        assert!(inv.env.contains(&("LANGUAGE".to_string(), String::new())));
    }

    #[test]
    fn remote_lookup_failure_propagates() {
        let runner = ScriptedRunner::new().on(
            &["git", "ls-remote"],
            Reply::fail(128, "", "fatal: unable to access: Could not resolve host"),
        );
        let err = Resolver::new(&runner, "git")
            .resolve("git@host:org/repo.git", Path::new("/tmp"), None)
            .unwrap_err();
        match err {
            HatchError::Process(failure) => {
                assert_eq!(failure.exit_code, Some(128));
                assert!(failure.stderr_or_placeholder().contains("Could not resolve host"));
            }
            other => panic!("expected process failure, got {other:?}"),
        }
    }

    #[test]
    fn missing_local_path_degrades_to_unknown() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new();
        let origin = Resolver::new(&runner, "git")
            .resolve("no-such-template", dir.path(), None)
            .unwrap();
        assert_eq!(origin.kind, OriginKind::Local);
        assert_eq!(
            (origin.branch.as_str(), origin.dirty, origin.commit_hash.as_str()),
            ("unknown", false, "unknown")
        );
        assert!(origin.location.ends_with("no-such-template"));
        assert!(runner.command_lines().is_empty());
    }

    #[test]
    fn local_directory_outside_repository_degrades_to_unknown() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("template")).unwrap();
        let runner = ScriptedRunner::new().on(
            &["git", "rev-parse", "--show-toplevel"],
            Reply::fail(
                128,
                "",
                "fatal: not a git repository (or any of the parent directories): .git",
            ),
        );
        let origin = Resolver::new(&runner, "git")
            .resolve("template", dir.path(), None)
            .unwrap();
        assert!(origin.commit_hash.is_unknown());
        assert_eq!(origin.branch, UNKNOWN);
    }

    #[test]
    fn nested_directory_of_another_repository_is_not_a_repository() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("outer/template");
        std::fs::create_dir_all(&nested).unwrap();
        let outer = dir.path().join("outer").canonicalize().unwrap();
        let runner = ScriptedRunner::new().on(
            &["git", "rev-parse", "--show-toplevel"],
            Reply::ok(&format!("{}\n", outer.display())),
        );
        let origin = Resolver::new(&runner, "git")
            .resolve(nested.to_str().unwrap(), Path::new("/unused"), None)
            .unwrap();
        assert!(origin.commit_hash.is_unknown());
    }

    #[test]
    fn local_repository_reports_branch_dirty_and_head() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let runner = ScriptedRunner::new()
            .on(
                &["git", "rev-parse", "--show-toplevel"],
                Reply::ok(&format!("{}\n", root.display())),
            )
            .on(&["git", "symbolic-ref"], Reply::ok("feature/x\n"))
            .on(&["git", "status", "--porcelain"], Reply::ok("?? new.txt\n"))
            .on(&["git", "rev-parse", "HEAD"], Reply::ok(&format!("{SHA}\n")));
        let origin = Resolver::new(&runner, "git")
            .resolve(root.to_str().unwrap(), Path::new("/unused"), Some("ignored"))
            .unwrap();
        assert_eq!(origin.kind, OriginKind::Local);
        assert_eq!(origin.branch, "feature/x");
        assert!(origin.dirty);
        assert_eq!(origin.commit_hash.as_str(), SHA);
        assert_eq!(origin.location, root.display().to_string());
        assert!(runner
            .invocations()
            .iter()
            .all(|inv| inv.cwd == root));
    }

    #[test]
    fn detached_head_is_an_error() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let runner = ScriptedRunner::new()
            .on(
                &["git", "rev-parse", "--show-toplevel"],
                Reply::ok(&format!("{}\n", root.display())),
            )
            .on(&["git", "symbolic-ref"], Reply::fail(1, "", ""));
        let err = Resolver::new(&runner, "git")
            .resolve(root.to_str().unwrap(), Path::new("/unused"), None)
            .unwrap_err();
        assert!(matches!(err, HatchError::DetachedHead(_)));
    }

    #[test]
    fn unexpected_git_error_is_not_swallowed() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new().on(
            &["git", "rev-parse", "--show-toplevel"],
            Reply::fail(128, "", "fatal: detected dubious ownership in repository"),
        );
        let err = Resolver::new(&runner, "git")
            .resolve(dir.path().to_str().unwrap(), Path::new("/unused"), None)
            .unwrap_err();
        assert!(matches!(err, HatchError::Process(_)));
    }

    #[test]
    fn missing_git_binary_is_an_error() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new().on(&["git"], Reply::not_found());
        let err = Resolver::new(&runner, "git")
            .resolve(dir.path().to_str().unwrap(), Path::new("/unused"), None)
            .unwrap_err();
        assert!(matches!(err, HatchError::Process(f) if f.exit_code.is_none()));
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(["-c", "user.name=hatch", "-c", "user.email=hatch@example.com"])
            .args(args)
            .current_dir(dir)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    #[test]
    fn plain_directory_is_unknown_under_foreign_language() {
        if which::which("git").is_err() {
            return;
        }
        std::env::set_var("LANGUAGE", "de");
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("template")).unwrap();
        let origin = Resolver::new(&ProcessRunner, "git")
            .resolve("template", dir.path(), None)
            .unwrap();
        assert!(origin.commit_hash.is_unknown());
        assert_eq!(origin.branch, UNKNOWN);
        assert!(!origin.dirty);
    }

    #[test]
    fn real_local_repository_tracks_working_tree_state() {
        if which::which("git").is_err() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("template");
        std::fs::create_dir(&repo).unwrap();
        git(&repo, &["init", "--initial-branch=main"]);
        std::fs::write(repo.join("cookiecutter.json"), "{}\n").unwrap();
        git(&repo, &["add", "-A"]);
        git(&repo, &["commit", "-m", "init"]);

        let resolver = Resolver::new(&ProcessRunner, "git");
        let clean = resolver.resolve("template", dir.path(), None).unwrap();
        assert_eq!(clean.kind, OriginKind::Local);
        assert_eq!(clean.branch, "main");
        assert!(!clean.dirty);
        assert!(!clean.commit_hash.is_unknown());

        std::fs::write(repo.join("untracked.txt"), "x\n").unwrap();
        let dirty = resolver.resolve("template", dir.path(), None).unwrap();
        assert!(dirty.dirty);
        assert_eq!(dirty.commit_hash, clean.commit_hash);
    }
}
