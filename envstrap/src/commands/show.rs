//! `envstrap show`: print the resolved plan without touching the host.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use envstrap_runner::{
    build_invocation, resolve_plan, BootstrapError, ClonePolicy, CommandRunner, FailurePolicy,
    Plan, StepKind, SystemCommandRunner,
};

#[derive(Debug, Serialize)]
struct PlanView {
    source: String,
    require_privilege: bool,
    failure_policy: FailurePolicy,
    clone_policy: ClonePolicy,
    steps: Vec<StepView>,
}

#[derive(Debug, Serialize)]
struct StepView {
    index: usize,
    kind: StepKind,
    label: String,
    targets: Vec<String>,
    idempotent: bool,
    command: String,
    program_available: bool,
}

fn plan_view(plan: &Plan, source: String, commands: &impl CommandRunner) -> PlanView {
    let steps = plan
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let invocation = build_invocation(&plan.installers, step);
            StepView {
                index,
                kind: step.kind(),
                label: step.label(),
                targets: step.targets(),
                idempotent: step.is_idempotent(plan.clone_policy),
                program_available: commands.program_available(&invocation.program),
                command: invocation.to_string(),
            }
        })
        .collect();
    PlanView {
        source,
        require_privilege: plan.require_privilege,
        failure_policy: plan.failure_policy,
        clone_policy: plan.clone_policy,
        steps,
    }
}

pub fn cmd_show(plan_path: Option<&Path>, json: bool) -> Result<()> {
    let (plan, source) = resolve_plan(plan_path).map_err(BootstrapError::from)?;
    let view = plan_view(&plan, source.to_string(), &SystemCommandRunner);

    if json {
        let out = serde_json::to_string_pretty(&view).context("Serialize plan")?;
        println!("{}", out);
        return Ok(());
    }

    println!("Plan: {} ({} step(s))", view.source, view.steps.len());
    println!(
        "  privilege: {}  on failure: {:?}  existing clone destination: {:?}",
        if view.require_privilege { "root required" } else { "not required" },
        view.failure_policy,
        view.clone_policy
    );
    println!();
    for step in &view.steps {
        println!("#{} {} [{}]", step.index + 1, step.label, step.kind);
        println!("    $ {}", step.command);
        if !step.program_available {
            println!("    ⚠ program not found on PATH");
        }
        if !step.idempotent {
            println!("    ⚠ not idempotent: a second run fails once the destination exists");
        }
    }
    Ok(())
}
