//! Plan: the static, ordered definition of a bootstrap run.
//!
//! A plan comes either from [`Plan::builtin`] or from a YAML file:
//!
//! ```yaml
//! clone_policy: skip-if-exists
//! installers:
//!   library: { program: pip3, args: [install, --break-system-packages] }
//! steps:
//!   - kind: package-install
//!     targets: [git, python3-pip]
//!   - kind: repository-clone
//!     url: https://github.com/TomBric/stratux-radar-display.git
//!     destination: ~/stratux-radar-display
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::PlanError;
use crate::step::{BootstrapStep, StepAction};

/// Repository cloned by the built-in plan.
pub const DEFAULT_REPOSITORY_URL: &str = "https://github.com/TomBric/stratux-radar-display.git";

/// Destination of the built-in clone.
pub const DEFAULT_CLONE_DESTINATION: &str = "/home/pi/stratux-radar-display";

/// OS packages needed by the radar display (imaging libraries, pip, git).
pub const DEFAULT_SYSTEM_PACKAGES: &[&str] = &[
    "git",
    "python3-pip",
    "python3-pil",
    "python3-numpy",
    "libopenjp2-7",
    "libtiff5",
];

/// Python libraries imported by the radar display and its display drivers.
pub const DEFAULT_LIBRARIES: &[&str] = &["websockets", "luma.oled", "RPi.GPIO", "spidev"];

/// What to do once a step has failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failed step (default)
    #[default]
    FailFast,
    /// Keep executing remaining steps; the run still fails
    BestEffort,
}

/// What to do when a clone destination already holds files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClonePolicy {
    /// Report a clone error (default)
    #[default]
    Fail,
    /// Treat an existing git working copy as already cloned
    SkipIfExists,
}

/// Program + fixed leading arguments used for an install step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallerSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the installer process
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl InstallerSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// `apt-get install -y`, non-interactive.
    pub fn default_package() -> Self {
        Self::new("apt-get", ["install", "-y"]).with_env("DEBIAN_FRONTEND", "noninteractive")
    }

    /// `pip3 install`
    pub fn default_library() -> Self {
        Self::new("pip3", ["install"])
    }
}

/// Source-control client used for clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitSpec {
    pub program: String,
}

impl Default for GitSpec {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

/// How each step kind reaches the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Installers {
    #[serde(default = "InstallerSpec::default_package")]
    pub package: InstallerSpec,
    #[serde(default = "InstallerSpec::default_library")]
    pub library: InstallerSpec,
    #[serde(default)]
    pub git: GitSpec,
}

impl Default for Installers {
    fn default() -> Self {
        Self {
            package: InstallerSpec::default_package(),
            library: InstallerSpec::default_library(),
            git: GitSpec::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Ordered steps plus the policies they run under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    #[serde(default = "default_true")]
    pub require_privilege: bool,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub clone_policy: ClonePolicy,
    #[serde(default)]
    pub installers: Installers,
    pub steps: Vec<BootstrapStep>,
}

impl Plan {
    /// Plan with default installers and policies.
    pub fn new(steps: Vec<BootstrapStep>) -> Self {
        Self {
            require_privilege: true,
            failure_policy: FailurePolicy::default(),
            clone_policy: ClonePolicy::default(),
            installers: Installers::default(),
            steps,
        }
    }

    /// Dependencies of the radar display, then the display sources.
    pub fn builtin() -> Self {
        Self::new(vec![
            BootstrapStep::package_install(DEFAULT_SYSTEM_PACKAGES.iter().copied())
                .with_name("system packages"),
            BootstrapStep::library_install(DEFAULT_LIBRARIES.iter().copied())
                .with_name("python libraries"),
            BootstrapStep::repository_clone(DEFAULT_REPOSITORY_URL, DEFAULT_CLONE_DESTINATION)
                .with_name("radar display sources"),
        ])
    }

    /// Parse and validate a YAML plan. `origin` names the source in errors.
    pub fn from_yaml_str(content: &str, origin: &str) -> Result<Self, PlanError> {
        let mut plan: Plan = serde_yaml::from_str(content).map_err(|source| PlanError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        plan.expand_home_destinations(crate::privilege::invoking_user_home().as_deref());
        plan.validate()?;
        Ok(plan)
    }

    /// Read, parse and validate a YAML plan file.
    pub fn load(path: &Path) -> Result<Self, PlanError> {
        let content = std::fs::read_to_string(path).map_err(|source| PlanError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let plan = Self::from_yaml_str(&content, &path.display().to_string())?;
        tracing::debug!("Loaded plan {} ({} steps)", path.display(), plan.steps.len());
        Ok(plan)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Check structural invariants; run before any step executes.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.steps.is_empty() {
            return Err(PlanError::Empty);
        }
        for (index, step) in self.steps.iter().enumerate() {
            let invalid = |message: &str| PlanError::InvalidStep {
                step: index,
                kind: step.kind(),
                message: message.to_string(),
            };
            match &step.action {
                StepAction::PackageInstall { targets } | StepAction::LibraryInstall { targets } => {
                    if targets.is_empty() {
                        return Err(invalid("at least one target is required"));
                    }
                    if targets.iter().any(|t| t.trim().is_empty()) {
                        return Err(invalid("targets must not be blank"));
                    }
                    if targets.iter().any(|t| t.starts_with('-')) {
                        return Err(invalid("targets must be names, not options"));
                    }
                }
                StepAction::RepositoryClone {
                    url,
                    destination,
                    depth,
                    ..
                } => {
                    if url.trim().is_empty() {
                        return Err(invalid("url must not be blank"));
                    }
                    if destination.as_os_str().is_empty() {
                        return Err(invalid("destination must not be empty"));
                    }
                    if *depth == Some(0) {
                        return Err(invalid("depth must be greater than zero"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Rewrite clone destinations starting with `~/` against `home`
    /// (the `sudo` caller's home when parsing from a file).
    pub fn expand_home_destinations(&mut self, home: Option<&Path>) {
        let Some(home) = home else {
            return;
        };
        for step in &mut self.steps {
            if let StepAction::RepositoryClone { destination, .. } = &mut step.action {
                if let Ok(rest) = destination.strip_prefix("~") {
                    *destination = home.join(rest);
                }
            }
        }
    }

    /// Distinct programs this plan will invoke, in first-use order.
    pub fn programs(&self) -> Vec<&str> {
        let mut programs: Vec<&str> = Vec::new();
        for step in &self.steps {
            let program = match step.action {
                StepAction::PackageInstall { .. } => self.installers.package.program.as_str(),
                StepAction::LibraryInstall { .. } => self.installers.library.program.as_str(),
                StepAction::RepositoryClone { .. } => self.installers.git.program.as_str(),
            };
            if !programs.contains(&program) {
                programs.push(program);
            }
        }
        programs
    }
}

/// Where a plan came from, for logs and the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanSource {
    Builtin,
    File(PathBuf),
}

impl std::fmt::Display for PlanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin => f.write_str("builtin"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Load the plan at `path`, or the built-in plan when `None`.
pub fn resolve_plan(path: Option<&Path>) -> Result<(Plan, PlanSource), PlanError> {
    match path {
        Some(path) => Ok((Plan::load(path)?, PlanSource::File(path.to_path_buf()))),
        None => Ok((Plan::builtin(), PlanSource::Builtin)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepKind;

    #[test]
    fn test_builtin_plan_is_valid() {
        let plan = Plan::builtin();
        plan.validate().unwrap();
        let kinds: Vec<StepKind> = plan.steps.iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                StepKind::PackageInstall,
                StepKind::LibraryInstall,
                StepKind::RepositoryClone
            ]
        );
        assert!(plan.require_privilege);
        assert_eq!(plan.programs(), vec!["apt-get", "pip3", "git"]);
    }

    #[test]
    fn test_from_yaml_minimal_uses_defaults() {
        let yaml = r#"
steps:
  - kind: package-install
    targets: [git]
  - kind: repository-clone
    url: https://example.com/repo.git
    destination: /root/repo
    branch: main
"#;
        let plan = Plan::from_yaml_str(yaml, "test").unwrap();
        assert_eq!(plan.failure_policy, FailurePolicy::FailFast);
        assert_eq!(plan.clone_policy, ClonePolicy::Fail);
        assert_eq!(plan.installers, Installers::default());
        assert_eq!(plan.steps[0], BootstrapStep::package_install(["git"]));
        match &plan.steps[1].action {
            StepAction::RepositoryClone {
                url,
                destination,
                branch,
                depth,
            } => {
                assert_eq!(url, "https://example.com/repo.git");
                assert_eq!(destination, Path::new("/root/repo"));
                assert_eq!(branch.as_deref(), Some("main"));
                assert_eq!(*depth, None);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_from_yaml_policies_and_installers() {
        let yaml = r#"
require_privilege: false
failure_policy: best-effort
clone_policy: skip-if-exists
installers:
  library:
    program: pip
    args: [install, --user]
steps:
  - name: libs
    kind: library-install
    targets: [websockets]
"#;
        let plan = Plan::from_yaml_str(yaml, "test").unwrap();
        assert!(!plan.require_privilege);
        assert_eq!(plan.failure_policy, FailurePolicy::BestEffort);
        assert_eq!(plan.clone_policy, ClonePolicy::SkipIfExists);
        assert_eq!(plan.installers.library, InstallerSpec::new("pip", ["install", "--user"]));
        assert_eq!(plan.installers.package, InstallerSpec::default_package());
        assert_eq!(plan.steps[0].name.as_deref(), Some("libs"));
    }

    #[test]
    fn test_validate_rejects_bad_plans() {
        assert!(matches!(
            Plan::from_yaml_str("steps: []", "test"),
            Err(PlanError::Empty)
        ));
        assert!(matches!(
            Plan::from_yaml_str("steps:\n  - kind: package-install\n    targets: []\n", "test"),
            Err(PlanError::InvalidStep { step: 0, .. })
        ));
        assert!(matches!(
            Plan::from_yaml_str(
                "steps:\n  - kind: library-install\n    targets: [ok]\n  - kind: library-install\n    targets: ['--index-url']\n",
                "test"
            ),
            Err(PlanError::InvalidStep { step: 1, .. })
        ));
        assert!(matches!(
            Plan::from_yaml_str(
                "steps:\n  - kind: repository-clone\n    url: ' '\n    destination: /x\n",
                "test"
            ),
            Err(PlanError::InvalidStep { step: 0, kind: StepKind::RepositoryClone, .. })
        ));
    }

    #[test]
    fn test_from_yaml_rejects_unknown_kind_and_fields() {
        assert!(matches!(
            Plan::from_yaml_str("steps:\n  - kind: reboot\n", "test"),
            Err(PlanError::Parse { .. })
        ));
        assert!(matches!(
            Plan::from_yaml_str("retries: 3\nsteps:\n  - kind: package-install\n    targets: [git]\n", "test"),
            Err(PlanError::Parse { .. })
        ));
    }

    #[test]
    fn test_from_yaml_rejects_misspelled_step_fields() {
        let yaml = "steps:\n  - name: radar sources\n    kind: repository-clone\n    url: https://example.com/repo.git\n    destination: /opt/radar\n    brnach: release\n    depht: 1\n";
        let err = Plan::from_yaml_str(yaml, "test").unwrap_err();
        assert!(matches!(err, PlanError::Parse { .. }));
        assert!(err.to_string().contains("test"));

        let plan = Plan::from_yaml_str(
            "steps:\n  - name: radar sources\n    kind: repository-clone\n    url: https://example.com/repo.git\n    destination: /opt/radar\n    branch: release\n    depth: 1\n",
            "test",
        )
        .unwrap();
        assert_eq!(plan.steps[0].label(), "radar sources");
        assert!(matches!(
            &plan.steps[0].action,
            StepAction::RepositoryClone { branch: Some(b), depth: Some(1), .. } if b == "release"
        ));
    }

    #[test]
    fn test_expand_home_destinations() {
        let mut plan = Plan::new(vec![
            BootstrapStep::repository_clone("https://example.com/a.git", "~/a"),
            BootstrapStep::repository_clone("https://example.com/b.git", "/opt/b"),
        ]);
        plan.expand_home_destinations(Some(Path::new("/home/pi")));
        assert_eq!(plan.steps[0].targets()[1], "/home/pi/a");
        assert_eq!(plan.steps[1].targets()[1], "/opt/b");
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Plan::load(&tmp.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, PlanError::Read { .. }));
    }

    #[test]
    fn test_resolve_plan_from_file_roundtrips_builtin() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("plan.yaml");
        std::fs::write(&path, Plan::builtin().to_yaml().unwrap()).unwrap();
        let (plan, source) = resolve_plan(Some(&path)).unwrap();
        assert_eq!(plan, Plan::builtin());
        assert_eq!(source, PlanSource::File(path));

        let (_, source) = resolve_plan(None).unwrap();
        assert_eq!(source.to_string(), "builtin");
    }
}
