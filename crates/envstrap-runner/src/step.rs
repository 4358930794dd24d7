//! Bootstrap step model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::plan::ClonePolicy;

/// What a step does to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    /// System package manager (e.g. `apt-get install`)
    PackageInstall,
    /// Language package installer (e.g. `pip3 install`)
    LibraryInstall,
    /// Source-control clone into an explicit destination
    RepositoryClone,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PackageInstall => "package-install",
            Self::LibraryInstall => "library-install",
            Self::RepositoryClone => "repository-clone",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload of a step. Serialized with a `kind` tag; unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", deny_unknown_fields)]
pub enum StepAction {
    PackageInstall {
        targets: Vec<String>,
    },
    LibraryInstall {
        targets: Vec<String>,
    },
    RepositoryClone {
        url: String,
        destination: PathBuf,
        /// Branch or tag passed to `git clone --branch`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
        /// Shallow clone depth (`git clone --depth`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        depth: Option<u32>,
    },
}

/// One unit of environment setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapStep {
    /// Human-readable label used in logs and reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub action: StepAction,
}

impl BootstrapStep {
    pub fn package_install<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            action: StepAction::PackageInstall {
                targets: targets.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn library_install<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            action: StepAction::LibraryInstall {
                targets: targets.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn repository_clone(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            action: StepAction::RepositoryClone {
                url: url.into(),
                destination: destination.into(),
                branch: None,
                depth: None,
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(&self) -> StepKind {
        match self.action {
            StepAction::PackageInstall { .. } => StepKind::PackageInstall,
            StepAction::LibraryInstall { .. } => StepKind::LibraryInstall,
            StepAction::RepositoryClone { .. } => StepKind::RepositoryClone,
        }
    }

    /// Ordered identifiers: package/library names, or `[url, destination]` for a clone.
    pub fn targets(&self) -> Vec<String> {
        match &self.action {
            StepAction::PackageInstall { targets } | StepAction::LibraryInstall { targets } => {
                targets.clone()
            }
            StepAction::RepositoryClone {
                url, destination, ..
            } => vec![url.clone(), destination.display().to_string()],
        }
    }

    /// Whether running the step a second time leaves the host unchanged.
    ///
    /// Installs always are; a clone only when an existing working copy is skipped.
    pub fn is_idempotent(&self, clone_policy: ClonePolicy) -> bool {
        match self.action {
            StepAction::PackageInstall { .. } | StepAction::LibraryInstall { .. } => true,
            StepAction::RepositoryClone { .. } => clone_policy == ClonePolicy::SkipIfExists,
        }
    }

    /// `name` if set, otherwise `"<kind> <targets>"`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{} {}", self.kind(), self.targets().join(" ")),
        }
    }
}
