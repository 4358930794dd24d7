//! envstrap CLI library: argument parsing, command dispatch, exit codes.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use envstrap_runner::error::{BootstrapError, EXIT_FAILURE};

/// Parse args and dispatch. No subcommand runs the built-in plan.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    envstrap_core::observability::init_tracing();

    match cli.command {
        None => commands::run::cmd_run(&RunArgs::default()),
        Some(Commands::Run(args)) => commands::run::cmd_run(&args),
        Some(Commands::Show { plan, json }) => commands::show::cmd_show(plan.as_deref(), json),
    }
}

/// Process exit code for an error returned by [`run_cli`].
///
/// Step failures carry the failing tool's own code when it has one.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<BootstrapError>()
        .map(BootstrapError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}
