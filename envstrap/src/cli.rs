use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use envstrap_runner::ClonePolicy;

/// envstrap - install packages and libraries, then clone the application sources
#[derive(Parser, Debug)]
#[command(name = "envstrap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Defaults to `run` with the built-in plan
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a plan (the built-in one unless --plan is given). Requires root.
    Run(RunArgs),

    /// Print the resolved plan and the command each step would run
    Show {
        /// YAML plan file
        #[arg(long, value_name = "FILE")]
        plan: Option<PathBuf>,

        /// Output as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// YAML plan file
    #[arg(long, value_name = "FILE")]
    pub plan: Option<PathBuf>,

    /// Keep executing after a failed step (the run still fails)
    #[arg(long, default_value = "false")]
    pub keep_going: bool,

    /// What to do when a clone destination already holds files (default: from plan, else fail)
    #[arg(long, value_enum)]
    pub clone_policy: Option<ClonePolicyArg>,

    /// Log every command without executing it
    #[arg(long, default_value = "false")]
    pub dry_run: bool,

    /// Do not require root (installers may still fail on their own)
    #[arg(long, default_value = "false")]
    pub allow_unprivileged: bool,

    /// Print the run report as JSON on stdout
    #[arg(long, default_value = "false")]
    pub json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClonePolicyArg {
    /// Existing non-empty destination is an error
    Fail,
    /// Existing git working copy counts as already cloned
    SkipIfExists,
}

impl From<ClonePolicyArg> for ClonePolicy {
    fn from(arg: ClonePolicyArg) -> Self {
        match arg {
            ClonePolicyArg::Fail => ClonePolicy::Fail,
            ClonePolicyArg::SkipIfExists => ClonePolicy::SkipIfExists,
        }
    }
}
