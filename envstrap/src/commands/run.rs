//! `envstrap run`: execute a plan on this host.

use anyhow::{Context, Result};
use std::time::Instant;

use envstrap_core::observability;
use envstrap_runner::{
    resolve_plan, BootstrapError, BootstrapRunner, FailurePolicy, Plan, PlanSource, RunReport,
    StepStatus,
};

use crate::cli::RunArgs;

/// Apply CLI overrides on top of the plan's own settings.
pub(crate) fn apply_overrides(plan: &mut Plan, args: &RunArgs) {
    if args.keep_going {
        plan.failure_policy = FailurePolicy::BestEffort;
    }
    if let Some(policy) = args.clone_policy {
        plan.clone_policy = policy.into();
    }
    if args.allow_unprivileged {
        plan.require_privilege = false;
    }
}

pub fn cmd_run(args: &RunArgs) -> Result<()> {
    let (mut plan, source) = resolve_plan(args.plan.as_deref()).map_err(BootstrapError::from)?;
    apply_overrides(&mut plan, args);

    tracing::info!(
        "Running {} plan: {} step(s), {:?}, clone policy {:?}{}",
        source,
        plan.steps.len(),
        plan.failure_policy,
        plan.clone_policy,
        if args.dry_run { " (dry run)" } else { "" }
    );
    observability::audit_run_started(&source.to_string(), plan.steps.len(), args.dry_run);

    let started = Instant::now();
    let report = if args.dry_run {
        BootstrapRunner::dry_run().run(&plan)
    } else {
        BootstrapRunner::system().run(&plan)
    };
    observability::audit_run_completed(
        report.succeeded(),
        report.failed_step(),
        started.elapsed().as_millis() as u64,
    );

    print_summary(&report, &source);
    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Serialize run report")?;
        println!("{}", json);
    }

    report.into_result()?;
    Ok(())
}

fn print_summary(report: &RunReport, source: &PlanSource) {
    eprintln!();
    for step in &report.steps {
        let mark = match step.status {
            StepStatus::Succeeded if step.skipped => "↷",
            StepStatus::Succeeded => "✓",
            StepStatus::Failed => "✗",
            StepStatus::Pending | StepStatus::Running => "·",
        };
        let note = if step.skipped {
            " (already present)".to_string()
        } else if step.status == StepStatus::Pending {
            " (not run)".to_string()
        } else {
            format!(" ({} ms)", step.duration_ms)
        };
        eprintln!("  {} #{} {}{}", mark, step.index + 1, step.label, note);
    }
    eprintln!();
    if report.succeeded() {
        eprintln!(
            "✓ Environment ready ({} plan, {} step(s){})",
            source,
            report.steps.len(),
            if report.dry_run { ", dry run" } else { "" }
        );
    } else if let Some(err) = report.first_error() {
        eprintln!("✗ Bootstrap failed: {}", err);
    }
}
