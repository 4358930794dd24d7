//! Process invocation seam.
//!
//! The runner builds an [`Invocation`] per step and hands it to a
//! [`CommandRunner`]. Production code uses [`SystemCommandRunner`]; dry runs use
//! [`DryRunner`]; tests script their own implementations.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::process::Command;

/// A fully resolved external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
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

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

impl fmt::Display for Invocation {
    /// Shell-like rendering, for logs and `show`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{}={} ", key, shell_quote(value))?;
        }
        f.write_str(&shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@+,~".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Structured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl From<std::process::Output> for ProcessOutput {
    fn from(out: std::process::Output) -> Self {
        Self {
            exit_code: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        }
    }
}

/// Runs an [`Invocation`] to completion.
pub trait CommandRunner {
    /// Whether `program` can be started at all. Checked before [`CommandRunner::run`].
    fn program_available(&self, program: &str) -> bool;

    /// Block until the process exits. `Err` only when it could not be started.
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn program_available(&self, program: &str) -> bool {
        (**self).program_available(program)
    }

    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        (**self).run(invocation)
    }
}

/// Spawns real processes with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn program_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        let mut cmd = Command::new(&invocation.program);
        let out = cmd.args(&invocation.args).envs(&invocation.env).output()?;
        Ok(ProcessOutput::from(out))
    }
}

/// Logs invocations instead of spawning them; every command "succeeds".
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunner;

impl CommandRunner for DryRunner {
    fn program_available(&self, _program: &str) -> bool {
        true
    }

    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        tracing::info!("[dry-run] {}", invocation);
        Ok(ProcessOutput::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_display_quotes_when_needed() {
        let mut env = BTreeMap::new();
        env.insert("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string());
        let inv = Invocation::new("apt-get")
            .args(["install", "-y"])
            .arg("python3-pil")
            .arg("it's odd")
            .envs(&env);
        assert_eq!(
            inv.to_string(),
            r"DEBIAN_FRONTEND=noninteractive apt-get install -y python3-pil 'it'\''s odd'"
        );
    }

    #[test]
    fn test_process_output_success() {
        assert!(ProcessOutput::success().is_success());
        assert!(!ProcessOutput::failure(100, "E: nope").is_success());
        let signalled = ProcessOutput {
            exit_code: None,
            ..ProcessOutput::default()
        };
        assert!(!signalled.is_success());
    }

    #[test]
    fn test_dry_runner_never_fails() {
        let inv = Invocation::new("definitely-not-a-real-program-xyz");
        assert!(DryRunner.program_available(&inv.program));
        assert!(DryRunner.run(&inv).unwrap().is_success());
    }

    #[test]
    fn test_system_runner_reports_missing_program() {
        assert!(!SystemCommandRunner.program_available("definitely-not-a-real-program-xyz"));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_status_and_output() {
        let inv = Invocation::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);
        let out = SystemCommandRunner.run(&inv).unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }
}
