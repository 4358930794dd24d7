//! Bootstrap runner: executes a plan's steps strictly in order.
//!
//! Each step goes `Pending → Running → {Succeeded, Failed}`; the run is
//! Succeeded only if every step is. Nothing is retried and nothing is rolled
//! back. Under fail-fast the first failure leaves every later step Pending.

use serde::{Serialize, Serializer};
use std::path::Path;
use std::time::Instant;

use envstrap_core::observability::{self, AuditLog};

use crate::destination::{self, CloneDecision, DestinationState};
use crate::error::{BootstrapError, FailureReason};
use crate::plan::{ClonePolicy, FailurePolicy, Installers, Plan};
use crate::privilege::Privilege;
use crate::process::{CommandRunner, DryRunner, Invocation, ProcessOutput, SystemCommandRunner};
use crate::step::{BootstrapStep, StepAction, StepKind};


/// Lifecycle of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Lifecycle of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

fn serialize_error<S: Serializer>(
    error: &Option<BootstrapError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub kind: StepKind,
    pub label: String,
    pub targets: Vec<String>,
    pub status: StepStatus,
    /// Succeeded without doing anything (existing working copy)
    pub skipped: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invocation: Option<Invocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ProcessOutput>,
    #[serde(
        serialize_with = "serialize_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<BootstrapError>,
}

impl StepReport {
    fn pending(index: usize, step: &BootstrapStep) -> Self {
        Self {
            index,
            kind: step.kind(),
            label: step.label(),
            targets: step.targets(),
            status: StepStatus::Pending,
            skipped: false,
            duration_ms: 0,
            invocation: None,
            output: None,
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub dry_run: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepReport>,
    /// Failure raised before any step ran (privilege)
    #[serde(
        serialize_with = "serialize_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub preflight_error: Option<BootstrapError>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// The first failure in execution order.
    pub fn first_error(&self) -> Option<&BootstrapError> {
        self.preflight_error
            .as_ref()
            .or_else(|| self.steps.iter().find_map(|s| s.error.as_ref()))
    }

    /// Index of the first failed step.
    pub fn failed_step(&self) -> Option<usize> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::Failed)
            .map(|s| s.index)
    }

    /// Steps that left `Pending`.
    pub fn executed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.status != StepStatus::Pending)
    }

    /// `Ok(self)` on success, otherwise the first failure.
    pub fn into_result(mut self) -> Result<Self, BootstrapError> {
        if let Some(e) = self.preflight_error.take() {
            return Err(e);
        }
        match self.steps.iter_mut().find_map(|s| s.error.take()) {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}

/// Command line for a step under the given installers.
///
/// Clones always receive the destination as an explicit argument; the working
/// directory of the process is never changed.
pub fn build_invocation(installers: &Installers, step: &BootstrapStep) -> Invocation {
    match &step.action {
        StepAction::PackageInstall { targets } => Invocation::new(&installers.package.program)
            .args(installers.package.args.iter().cloned())
            .args(targets.iter().cloned())
            .envs(&installers.package.env),
        StepAction::LibraryInstall { targets } => Invocation::new(&installers.library.program)
            .args(installers.library.args.iter().cloned())
            .args(targets.iter().cloned())
            .envs(&installers.library.env),
        StepAction::RepositoryClone {
            url,
            destination,
            branch,
            depth,
        } => {
            let mut inv = Invocation::new(&installers.git.program).arg("clone");
            if let Some(b) = branch {
                inv = inv.args(["--branch", b.as_str()]);
            }
            if let Some(d) = depth {
                inv = inv.arg("--depth").arg(d.to_string());
            }
            inv.arg(url.as_str())
                .arg(destination.to_string_lossy().into_owned())
        }
    }
}

/// git reports rejected credentials on stderr only. Local filesystem errors
/// (`could not create work tree dir ...: Permission denied`) are not matched.
fn is_authentication_failure(stderr: &str) -> bool {
    const REMOTE_PHRASES: [&str; 4] = [
        "authentication failed",
        "could not read username",
        "permission denied (publickey",
        "repository not found",
    ];
    let lower = stderr.to_lowercase();
    REMOTE_PHRASES.iter().any(|p| lower.contains(p))
}

/// Executes plans through a [`CommandRunner`].
pub struct BootstrapRunner<R> {
    commands: R,
    privilege: Privilege,
    dry_run: bool,
    audit: Option<AuditLog>,
}

impl BootstrapRunner<SystemCommandRunner> {
    /// Real processes, real privilege probe.
    pub fn system() -> Self {
        Self::new(SystemCommandRunner)
    }
}

impl BootstrapRunner<DryRunner> {
    /// Logs every command, spawns nothing, skips the privilege check.
    pub fn dry_run() -> Self {
        Self {
            commands: DryRunner,
            privilege: Privilege::Elevated,
            dry_run: true,
            audit: observability::audit_log().cloned(),
        }
    }
}

impl<R: CommandRunner> BootstrapRunner<R> {
    pub fn new(commands: R) -> Self {
        Self {
            commands,
            privilege: Privilege::detect(),
            dry_run: false,
            audit: observability::audit_log().cloned(),
        }
    }

    /// Override the probed privilege (tests, unprivileged sandboxes).
    pub fn with_privilege(mut self, privilege: Privilege) -> Self {
        self.privilege = privilege;
        self
    }

    /// Write step records to `log` instead of the process-wide audit log.
    pub fn with_audit_log(mut self, log: AuditLog) -> Self {
        self.audit = Some(log);
        self
    }

    pub fn commands(&self) -> &R {
        &self.commands
    }

    /// Run every step of `plan` in declaration order.
    pub fn run(&self, plan: &Plan) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport {
            status: RunStatus::Pending,
            dry_run: self.dry_run,
            duration_ms: 0,
            steps: plan
                .steps
                .iter()
                .enumerate()
                .map(|(i, s)| StepReport::pending(i, s))
                .collect(),
            preflight_error: None,
        };

        if plan.require_privilege && !self.dry_run {
            if let Err(e) = self.privilege.ensure_elevated() {
                tracing::error!("{}", e);
                report.status = RunStatus::Failed;
                report.preflight_error = Some(e);
                return report;
            }
        }

        report.status = RunStatus::Running;
        let total = plan.steps.len();
        for (index, step) in plan.steps.iter().enumerate() {
            tracing::info!("[{}/{}] {}", index + 1, total, step.label());
            let step_started = Instant::now();
            let step_report = &mut report.steps[index];
            step_report.status = StepStatus::Running;
            if let Some(log) = &self.audit {
                let invocation = build_invocation(&plan.installers, step);
                log.step_started(index, step.kind().as_str(), &invocation.program, &invocation.args);
            }

            let result = self.execute_step(plan, index, step, step_report);
            step_report.duration_ms = step_started.elapsed().as_millis() as u64;
            if let Some(log) = &self.audit {
                log.step_completed(
                    index,
                    step.kind().as_str(),
                    result.is_ok(),
                    step_report.skipped,
                    step_report.output.as_ref().and_then(|o| o.exit_code),
                    step_report.duration_ms,
                );
            }

            match result {
                Ok(()) => {
                    step_report.status = StepStatus::Succeeded;
                    tracing::debug!("step #{} succeeded in {}ms", index + 1, step_report.duration_ms);
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    step_report.status = StepStatus::Failed;
                    step_report.error = Some(e);
                    if plan.failure_policy == FailurePolicy::FailFast {
                        if index + 1 < total {
                            tracing::warn!(
                                "Stopping after step #{}; {} step(s) not executed",
                                index + 1,
                                total - index - 1
                            );
                        }
                        break;
                    }
                }
            }
        }

        report.status = if report.steps.iter().all(|s| s.status == StepStatus::Succeeded) {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        report.duration_ms = started.elapsed().as_millis() as u64;
        report
    }

    fn execute_step(
        &self,
        plan: &Plan,
        index: usize,
        step: &BootstrapStep,
        report: &mut StepReport,
    ) -> Result<(), BootstrapError> {
        match &step.action {
            StepAction::PackageInstall { targets } | StepAction::LibraryInstall { targets } => {
                let fail = |reason: FailureReason| BootstrapError::PackageInstall {
                    step: index,
                    kind: step.kind(),
                    targets: targets.clone(),
                    reason,
                };
                let invocation = build_invocation(&plan.installers, step);
                self.spawn(invocation, report).map_err(fail)
            }
            StepAction::RepositoryClone {
                url, destination, ..
            } => {
                let fail = |reason: FailureReason| BootstrapError::Clone {
                    step: index,
                    url: url.clone(),
                    destination: destination.clone(),
                    reason,
                };
                match self.prepare_destination(destination, plan.clone_policy) {
                    Ok(CloneDecision::Skip) => {
                        tracing::info!(
                            "{} already holds a working copy, skipping clone",
                            destination.display()
                        );
                        report.skipped = true;
                        return Ok(());
                    }
                    Ok(CloneDecision::Clone) => {}
                    Err(reason) => return Err(fail(reason)),
                }
                let invocation = build_invocation(&plan.installers, step);
                self.spawn(invocation, report)
                    .map_err(|reason| match reason {
                        FailureReason::ExitStatus { stderr, .. }
                        | FailureReason::Signalled { stderr }
                            if is_authentication_failure(&stderr) =>
                        {
                            fail(FailureReason::AuthenticationFailed { stderr })
                        }
                        other => fail(other),
                    })
            }
        }
    }

    /// Inspect the destination and create its parent so git can write there.
    fn prepare_destination(
        &self,
        destination: &Path,
        policy: ClonePolicy,
    ) -> Result<CloneDecision, FailureReason> {
        let io_err = |e: std::io::Error| FailureReason::Io {
            message: format!("{}: {}", destination.display(), e),
        };
        let state = DestinationState::inspect(destination).map_err(io_err)?;
        let decision = destination::decide(state, policy)?;
        if decision == CloneDecision::Clone && !self.dry_run {
            if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        Ok(decision)
    }

    /// Run one invocation and translate its outcome.
    fn spawn(&self, invocation: Invocation, report: &mut StepReport) -> Result<(), FailureReason> {
        if !self.commands.program_available(&invocation.program) {
            return Err(FailureReason::ProgramNotFound {
                program: invocation.program.clone(),
            });
        }
        tracing::debug!("exec: {}", invocation);

        let result = self.commands.run(&invocation);
        report.invocation = Some(invocation);
        let output = result.map_err(|e| FailureReason::Spawn {
            message: e.to_string(),
        })?;
        let outcome = if output.is_success() {
            Ok(())
        } else {
            let stderr = output.stderr.trim().to_string();
            Err(match output.exit_code {
                Some(code) => FailureReason::ExitStatus { code, stderr },
                None => FailureReason::Signalled { stderr },
            })
        };
        report.output = Some(output);
        outcome
    }
}
