//! Privilege precondition. The runner checks for root but never escalates.

use std::path::PathBuf;

use envstrap_core::config::HostConfig;

use crate::error::BootstrapError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Effective uid 0
    Elevated,
    Unprivileged { euid: u32 },
}

impl Privilege {
    /// Probe the effective uid of the current process.
    #[cfg(unix)]
    pub fn detect() -> Self {
        let euid = nix::unistd::geteuid();
        if euid.is_root() {
            Self::Elevated
        } else {
            Self::Unprivileged {
                euid: euid.as_raw(),
            }
        }
    }

    /// No uid model off unix; the installers report their own access errors.
    #[cfg(not(unix))]
    pub fn detect() -> Self {
        tracing::debug!("privilege probe unsupported on this platform, assuming elevated");
        Self::Elevated
    }

    pub fn is_elevated(self) -> bool {
        matches!(self, Self::Elevated)
    }

    pub fn ensure_elevated(self) -> Result<(), BootstrapError> {
        match self {
            Self::Elevated => Ok(()),
            Self::Unprivileged { euid } => Err(BootstrapError::Privilege { euid }),
        }
    }
}

/// Home directory of the user who started envstrap.
///
/// Under `sudo` the process home is root's; the `SUDO_USER` account's home is
/// returned instead. Falls back to the process home.
pub fn invoking_user_home() -> Option<PathBuf> {
    home_of(HostConfig::read_env().sudo_user.as_deref()).or_else(dirs::home_dir)
}

/// Passwd home directory of `user`, if the account exists.
#[cfg(unix)]
fn home_of(user: Option<&str>) -> Option<PathBuf> {
    let name = user?;
    match nix::unistd::User::from_name(name) {
        Ok(Some(account)) => Some(account.dir),
        Ok(None) => {
            tracing::warn!("SUDO_USER {} has no passwd entry, using process home", name);
            None
        }
        Err(e) => {
            tracing::warn!("passwd lookup for {} failed: {}", name, e);
            None
        }
    }
}

#[cfg(not(unix))]
fn home_of(_user: Option<&str>) -> Option<PathBuf> {
    None
}
