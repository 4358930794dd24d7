//! Error taxonomy for bootstrap runs.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::step::StepKind;

/// Exit code for plan and usage errors (matches clap's usage exit code).
pub const EXIT_PLAN_ERROR: i32 = 2;

/// Exit code when no more specific code is available.
pub const EXIT_FAILURE: i32 = 1;

/// Errors raised while loading or validating a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Failed to read plan {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid plan {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Plan has no steps")]
    Empty,

    #[error("Step #{} ({kind}): {message}", .step + 1)]
    InvalidStep {
        step: usize,
        kind: StepKind,
        message: String,
    },
}

/// Why a step failed. Carries the underlying tool's message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// Process exited with a non-zero status
    ExitStatus { code: i32, stderr: String },
    /// Process was terminated by a signal
    Signalled { stderr: String },
    /// Clone was rejected by the remote (bad credentials, no access)
    AuthenticationFailed { stderr: String },
    /// Program is not on PATH
    ProgramNotFound { program: String },
    /// Process could not be started
    Spawn { message: String },
    /// Clone destination exists and holds files
    DestinationNotEmpty,
    /// Clone destination exists and is not a directory
    DestinationNotDirectory,
    /// Filesystem error while preparing the step
    Io { message: String },
}

impl FailureReason {
    /// Exit code of the underlying tool, if it exited with one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExitStatus { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitStatus { code, stderr } => {
                write!(f, "exited with status {code}")?;
                write_stderr(f, stderr)
            }
            Self::Signalled { stderr } => {
                f.write_str("terminated by signal")?;
                write_stderr(f, stderr)
            }
            Self::AuthenticationFailed { stderr } => {
                f.write_str(
                    "authentication failed; for private repositories check credentials \
                     (SSH: ssh -T git@github.com, HTTPS: credential helper)",
                )?;
                write_stderr(f, stderr)
            }
            Self::ProgramNotFound { program } => write!(f, "'{program}' not found on PATH"),
            Self::Spawn { message } => write!(f, "could not start process: {message}"),
            Self::DestinationNotEmpty => f.write_str("destination already exists and is not empty"),
            Self::DestinationNotDirectory => {
                f.write_str("destination already exists and is not a directory")
            }
            Self::Io { message } => f.write_str(message),
        }
    }
}

fn write_stderr(f: &mut fmt::Formatter<'_>, stderr: &str) -> fmt::Result {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        Ok(())
    } else {
        write!(f, ": {stderr}")
    }
}

/// Errors surfaced to the operator by a bootstrap run.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Elevated privileges required (effective uid {euid}); re-run as root")]
    Privilege { euid: u32 },

    #[error("Step #{} ({kind}) failed to install {}: {reason}", .step + 1, .targets.join(" "))]
    PackageInstall {
        step: usize,
        kind: StepKind,
        targets: Vec<String>,
        reason: FailureReason,
    },

    #[error("Step #{} (repository-clone) failed to clone {url} into {}: {reason}", .step + 1, .destination.display())]
    Clone {
        step: usize,
        url: String,
        destination: PathBuf,
        reason: FailureReason,
    },

    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl BootstrapError {
    /// Zero-based index of the failed step, when the error belongs to one.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::PackageInstall { step, .. } | Self::Clone { step, .. } => Some(*step),
            Self::Privilege { .. } | Self::Plan(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            Self::PackageInstall { reason, .. } | Self::Clone { reason, .. } => Some(reason),
            Self::Privilege { .. } | Self::Plan(_) => None,
        }
    }

    /// Process exit code for this error: the tool's own code when it has one.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Plan(_) => EXIT_PLAN_ERROR,
            Self::Privilege { .. } => EXIT_FAILURE,
            Self::PackageInstall { reason, .. } | Self::Clone { reason, .. } => reason
                .exit_code()
                .filter(|code| *code != 0)
                .unwrap_or(EXIT_FAILURE),
        }
    }
}
