//! Sequential environment bootstrap.
//!
//! A [`Plan`] is an ordered list of [`BootstrapStep`]s (package installs,
//! library installs, repository clones). [`BootstrapRunner`] executes it
//! top to bottom through a [`CommandRunner`] and returns a [`RunReport`].

pub mod destination;
pub mod error;
pub mod plan;
pub mod privilege;
pub mod process;
pub mod runner;
pub mod step;

pub use error::{BootstrapError, FailureReason, PlanError};
pub use plan::{
    resolve_plan, ClonePolicy, FailurePolicy, GitSpec, InstallerSpec, Installers, Plan, PlanSource,
};
pub use privilege::Privilege;
pub use process::{CommandRunner, DryRunner, Invocation, ProcessOutput, SystemCommandRunner};
pub use runner::{build_invocation, BootstrapRunner, RunReport, RunStatus, StepReport, StepStatus};
pub use step::{BootstrapStep, StepAction, StepKind};
