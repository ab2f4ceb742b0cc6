//! Subprocess invocation for the bootstrap pipeline.
//!
//! Every external tool the pipeline touches (git, the lock tool, the task
//! runner, the hosted-release CLI) is spawned through [`CommandRunner`].
//! [`ProcessRunner`] runs real processes; tests drive the pipeline with a
//! scripted runner that records each invocation instead.
//!
//! # Capture
//! Output is captured by default so a failing step can report both streams.
//! Steps whose output is irrelevant (release-tag cleanup) discard it.
//!
//! # Timeouts
//! An invocation may carry a bounded wait. On expiry the child is killed and
//! the output reports `timed_out`, which the caller treats as a failure.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

pub const NO_STDOUT: &str = "No stdout";
pub const NO_STDERR: &str = "No stderr";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    Piped,
    Discard,
}

/// One external command: program, arguments, working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub capture: Capture,
    pub timeout: Option<Duration>,
    /// Variables set on top of the inherited environment.
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            capture: Capture::Piped,
            timeout: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn discard_output(mut self) -> Self {
        self.capture = Capture::Discard;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Space-joined command line, for logs and diagnostics.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What a finished (or killed) process left behind.
///
/// `stdout`/`stderr` are `None` when the stream was not captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: Option<Vec<u8>>,
    pub stderr: Option<Vec<u8>>,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        decode(self.stdout.as_deref())
    }

    pub fn stderr_text(&self) -> String {
        decode(self.stderr.as_deref())
    }
}

fn decode(bytes: Option<&[u8]>) -> String {
    bytes
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default()
}

/// A must-succeed command that exited non-zero, timed out, or never started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{command}` failed during {step}")]
pub struct ProcessFailure {
    pub step: String,
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl ProcessFailure {
    pub fn from_output(step: &str, invocation: &Invocation, output: CommandOutput) -> Self {
        // Empty streams count as absent so the log shows the placeholder.
        let text = |bytes: Option<Vec<u8>>| {
            bytes
                .filter(|b| !b.is_empty())
                .map(|b| String::from_utf8_lossy(&b).into_owned())
        };
        let mut stderr = text(output.stderr);
        if output.timed_out {
            let secs = invocation.timeout.map(|t| t.as_secs()).unwrap_or_default();
            let note = format!("timed out after {secs}s");
            stderr = Some(match stderr {
                Some(s) => format!("{s}\n{note}"),
                None => note,
            });
        }
        Self {
            step: step.to_string(),
            command: invocation.command_line(),
            exit_code: output.exit_code,
            stdout: text(output.stdout),
            stderr,
        }
    }

    pub fn spawn(step: &str, invocation: &Invocation, err: &std::io::Error) -> Self {
        Self {
            step: step.to_string(),
            command: invocation.command_line(),
            exit_code: None,
            stdout: None,
            stderr: Some(format!("failed to spawn '{}': {err}", invocation.program)),
        }
    }

    pub fn stdout_or_placeholder(&self) -> &str {
        self.stdout.as_deref().unwrap_or(NO_STDOUT)
    }

    pub fn stderr_or_placeholder(&self) -> &str {
        self.stderr.as_deref().unwrap_or(NO_STDERR)
    }
}

pub trait CommandRunner {
    /// Run `invocation` to completion. `Err` means it could not be spawned.
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput>;

    /// Whether `program` resolves on `PATH`.
    fn is_available(&self, program: &str) -> bool;
}

/// Run `invocation` and require a zero exit status.
pub fn run_checked(
    runner: &dyn CommandRunner,
    step: &str,
    invocation: &Invocation,
) -> Result<CommandOutput, ProcessFailure> {
    debug!(step, command = %invocation.command_line(), "spawning");
    let output = runner
        .run(invocation)
        .map_err(|e| ProcessFailure::spawn(step, invocation, &e))?;
    if output.success() {
        Ok(output)
    } else {
        Err(ProcessFailure::from_output(step, invocation, output))
    }
}

/// Spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null());
        match invocation.capture {
            Capture::Piped => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            Capture::Discard => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let mut child = cmd.spawn()?;
        let child_pid = child.id();

        // Drain both pipes on their own threads so a chatty tool cannot stall
        // on a full pipe buffer while we wait on it.
        let stdout_thread = child.stdout.take().map(spawn_reader);
        let stderr_thread = child.stderr.take().map(spawn_reader);

        let status = match invocation.timeout {
            None => child.wait()?,
            Some(limit) => {
                let (tx, rx) = std::sync::mpsc::channel();
                std::thread::spawn(move || {
                    let _ = tx.send(child.wait());
                });
                match rx.recv_timeout(limit) {
                    Ok(result) => result?,
                    Err(_) => {
                        // Grandchildren may still hold the pipes open, so the
                        // reader threads are abandoned rather than joined.
                        kill_process(child_pid);
                        return Ok(CommandOutput {
                            exit_code: None,
                            stdout: None,
                            stderr: None,
                            timed_out: true,
                        });
                    }
                }
            }
        };

        let stdout = stdout_thread.map(|h| h.join().unwrap_or_default());
        let stderr = stderr_thread.map(|h| h.join().unwrap_or_default());

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr,
            timed_out: false,
        })
    }

    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

/// Terminate a process by PID using SIGKILL. Errors are ignored.
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}


#[cfg(test)]
mod tests {
    use super::*;

    fn echo(cwd: &Path) -> Invocation {
        Invocation::new("git", cwd).args(["commit", "-m", "feat: x"])
    }

    #[test]
    fn command_line_joins_program_and_args() {
        let inv = echo(Path::new("/tmp"));
        assert_eq!(inv.command_line(), "git commit -m feat: x");
    }

    #[test]
    fn failure_uses_placeholders_for_empty_streams() {
        let inv = echo(Path::new("/tmp"));
        let failure = ProcessFailure::from_output(
            "commit",
            &inv,
            CommandOutput {
                exit_code: Some(1),
                stdout: Some(Vec::new()),
                stderr: None,
                timed_out: false,
            },
        );
        assert_eq!(failure.stdout_or_placeholder(), NO_STDOUT);
        assert_eq!(failure.stderr_or_placeholder(), NO_STDERR);
        assert_eq!(failure.exit_code, Some(1));
    }

    #[test]
    fn failure_keeps_captured_streams() {
        let inv = echo(Path::new("/tmp"));
        let failure = ProcessFailure::from_output(
            "commit",
            &inv,
            CommandOutput {
                exit_code: Some(128),
                stdout: Some(b"partial".to_vec()),
                stderr: Some(b"fatal: boom".to_vec()),
                timed_out: false,
            },
        );
        assert_eq!(failure.stdout_or_placeholder(), "partial");
        assert_eq!(failure.stderr_or_placeholder(), "fatal: boom");
        assert_eq!(failure.to_string(), "`git commit -m feat: x` failed during commit");
    }

    #[test]
    fn timeout_is_reported_in_stderr() {
        let inv = echo(Path::new("/tmp")).timeout(Some(Duration::from_secs(3)));
        let failure = ProcessFailure::from_output(
            "commit",
            &inv,
            CommandOutput {
                timed_out: true,
                ..Default::default()
            },
        );
        assert_eq!(failure.stderr_or_placeholder(), "timed out after 3s");
    }

    #[test]
    fn timed_out_output_is_not_success() {
        let out = CommandOutput {
            exit_code: Some(0),
            timed_out: true,
            ..Default::default()
        };
        assert!(!out.success());
    }

    #[test]
    fn missing_program_is_a_spawn_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let inv = Invocation::new("hatch-definitely-not-a-real-program", dir.path());
        let err = run_checked(&ProcessRunner, "init", &inv).unwrap_err();
        assert_eq!(err.exit_code, None);
        assert_eq!(err.stdout_or_placeholder(), NO_STDOUT);
        assert!(err.stderr_or_placeholder().contains("failed to spawn"));
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_captures_both_streams() {
        let dir = tempfile::TempDir::new().unwrap();
        let inv = Invocation::new("sh", dir.path()).args(["-c", "echo out; echo err >&2; exit 3"]);
        let out = ProcessRunner.run(&inv).unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout_text(), "out\n");
        assert_eq!(out.stderr_text(), "err\n");
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_applies_invocation_env() {
        let dir = tempfile::TempDir::new().unwrap();
        let inv = Invocation::new("sh", dir.path())
            .args(["-c", "printf '%s|%s' \"$LC_ALL\" \"$HATCH_RUNNER_VAR\""])
            .env("LC_ALL", "C")
            .env("HATCH_RUNNER_VAR", "set");
        let out = ProcessRunner.run(&inv).unwrap();
        assert_eq!(out.stdout_text(), "C|set");
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_kills_on_timeout() {
        let dir = tempfile::TempDir::new().unwrap();
        let inv = Invocation::new("sleep", dir.path())
            .arg("5")
            .timeout(Some(Duration::from_millis(200)));
        let out = ProcessRunner.run(&inv).unwrap();
        assert!(out.timed_out);
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[test]
    fn discarded_output_is_absent() {
        let dir = tempfile::TempDir::new().unwrap();
        let inv = Invocation::new("sh", dir.path())
            .args(["-c", "echo hidden"])
            .discard_output();
        let out = ProcessRunner.run(&inv).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, None);
    }
}
